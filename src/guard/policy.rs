//! Per-route policy descriptors and the evaluation pipeline.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rangehub_trust::{resolve, AuthError, CapabilitySet, Identity, Site, SiteId, SiteRole};

use crate::error::GuardError;
use crate::server::AppState;

/// Largest body the signature guard will buffer for canonicalization.
/// Larger signed payloads are rejected, not truncated.
const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

/// Whether a missing bearer credential fails the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerMode {
    /// Absence is a `Missing` failure.
    Required,
    /// Absence yields an anonymous context. This is the only fail-open
    /// exception anywhere in the guard layer, and it must be declared
    /// per route; a token that is present but bad still fails closed.
    Optional,
}

/// One checkpoint in a route's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Authenticate the end user from `Authorization: Bearer`.
    Bearer(BearerMode),
    /// Require the authenticated identity to be a global admin.
    GlobalAdmin,
    /// Resolve capabilities for the site named in the request path and
    /// require at least the given role.
    SiteRole(SiteRole),
    /// Authenticate the calling site from its request signature.
    SignedSite,
}

/// The authenticated context a passed pipeline attaches to the request.
///
/// Downstream handlers must take the acting site from `trusted_site` and
/// never from a client-supplied id.
#[derive(Debug, Default, Clone)]
pub struct RequestAuth {
    /// End-user identity, if a bearer policy ran and a token was presented.
    pub identity: Option<Identity>,
    /// Capabilities resolved by a `SiteRole` policy.
    pub capabilities: Option<CapabilitySet>,
    /// Site authenticated by a `SignedSite` policy.
    pub trusted_site: Option<Site>,
}

/// An ordered list of policies for one route.
///
/// Composed once at router-build time; evaluation order is exactly the
/// declaration order, and the first failure stops the pipeline.
#[derive(Debug)]
pub struct PolicyPipeline {
    policies: Vec<RoutePolicy>,
}

impl PolicyPipeline {
    /// Build a pipeline from an ordered policy list.
    pub fn new(policies: Vec<RoutePolicy>) -> Self {
        Self { policies }
    }

    /// The declared evaluation order.
    pub fn policies(&self) -> &[RoutePolicy] {
        &self.policies
    }

    /// True when any policy needs the request body buffered.
    pub fn requires_body(&self) -> bool {
        self.policies.contains(&RoutePolicy::SignedSite)
    }

    /// Run every policy in order against the request head and buffered body.
    pub fn evaluate(
        &self,
        state: &AppState,
        parts: &Parts,
        body: &[u8],
    ) -> Result<RequestAuth, GuardError> {
        let mut auth = RequestAuth::default();
        for policy in &self.policies {
            match policy {
                RoutePolicy::Bearer(mode) => {
                    auth.identity = super::bearer::authenticate(state, &parts.headers, *mode)?;
                }
                RoutePolicy::GlobalAdmin => {
                    let identity = auth.identity.as_ref().ok_or(AuthError::Missing)?;
                    if !identity.is_global_admin {
                        return Err(GuardError::Denied { required: "all" });
                    }
                }
                RoutePolicy::SiteRole(role) => {
                    let identity = auth.identity.as_ref().ok_or(AuthError::Missing)?;
                    let site_id = path_site_id(parts.uri.path())?;
                    let site = state
                        .sites
                        .lookup(site_id)
                        .ok_or(AuthError::SiteUnknown)?;
                    let caps = resolve(identity, &site);
                    if !caps.grants(*role) {
                        return Err(GuardError::Denied { required: role.as_str() });
                    }
                    auth.capabilities = Some(caps);
                }
                RoutePolicy::SignedSite => {
                    let site = super::site::authenticate(state, parts, body)?;
                    auth.trusted_site = Some(site);
                }
            }
        }
        Ok(auth)
    }
}

/// Extract the site id from a `/v1/range/{id}/...` path.
///
/// Only used for capability checks; the signature guard takes its site id
/// from the signed `site-id` header instead.
fn path_site_id(path: &str) -> Result<SiteId, AuthError> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments
        .by_ref()
        .find(|s| *s == "range")
        .and_then(|_| segments.next())
        .and_then(|raw| raw.parse::<SiteId>().ok())
        .filter(|id| *id > 0)
        .ok_or(AuthError::Invalid)
}

/// Middleware entry point: buffer the body if a policy needs it, evaluate
/// the pipeline, and either attach the [`RequestAuth`] context and continue
/// or answer with the uniform rejection.
pub async fn apply(
    state: Arc<AppState>,
    pipeline: Arc<PolicyPipeline>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, raw_body) = req.into_parts();

    let (bytes, body) = if pipeline.requires_body() {
        match axum::body::to_bytes(raw_body, MAX_SIGNED_BODY_BYTES).await {
            Ok(b) => {
                let replay = Body::from(b.clone());
                (b, replay)
            }
            Err(_) => return GuardError::Auth(AuthError::Invalid).into_response(),
        }
    } else {
        (Bytes::new(), raw_body)
    };

    match pipeline.evaluate(&state, &parts, &bytes) {
        Ok(auth) => {
            let mut req = Request::from_parts(parts, body);
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AccountDirectory, AccountRecord, SiteDirectory};
    use crate::security::password::hash_password;
    use rangehub_trust::{SitePublicKey, TokenSecret};

    fn test_state() -> AppState {
        let accounts = AccountDirectory::default();
        accounts.insert(AccountRecord {
            id: 1,
            username: "alice".into(),
            email: "alice@example.net".into(),
            password_hash: hash_password("pw").unwrap(),
            global_admin: true,
        });
        accounts.insert(AccountRecord {
            id: 2,
            username: "bob".into(),
            email: "bob@example.net".into(),
            password_hash: hash_password("pw").unwrap(),
            global_admin: false,
        });

        let sites = SiteDirectory::default();
        sites.upsert(Site {
            id: 7,
            public_key: SitePublicKey::from_bytes(vec![0u8; 32]).unwrap(),
            owner_ids: vec![2],
            security_guard_ids: vec![],
        });

        AppState::new(
            "hub.test",
            &TokenSecret::new(*b"pipeline-tests-need-32-byte-key!"),
            accounts,
            sites,
        )
    }

    fn parts(uri: &str, bearer: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn required_bearer_without_token_is_missing() {
        let state = test_state();
        let pipeline = PolicyPipeline::new(vec![RoutePolicy::Bearer(BearerMode::Required)]);
        let err = pipeline
            .evaluate(&state, &parts("/v1/auth/session", None), b"")
            .unwrap_err();
        assert_eq!(err, GuardError::Auth(AuthError::Missing));
    }

    #[test]
    fn optional_bearer_without_token_is_anonymous() {
        let state = test_state();
        let pipeline = PolicyPipeline::new(vec![RoutePolicy::Bearer(BearerMode::Optional)]);
        let auth = pipeline
            .evaluate(&state, &parts("/v1/auth/session", None), b"")
            .unwrap();
        assert!(auth.identity.is_none());
    }

    #[test]
    fn optional_bearer_with_bad_token_still_fails_closed() {
        let state = test_state();
        let pipeline = PolicyPipeline::new(vec![RoutePolicy::Bearer(BearerMode::Optional)]);
        let err = pipeline
            .evaluate(&state, &parts("/v1/auth/session", Some("garbage")), b"")
            .unwrap_err();
        assert_eq!(err, GuardError::Auth(AuthError::Invalid));
    }

    #[test]
    fn first_failure_stops_evaluation() {
        let state = test_state();
        // With no token, Bearer fails first; GlobalAdmin is never consulted,
        // so the reported reason is Missing rather than a capability denial.
        let pipeline = PolicyPipeline::new(vec![
            RoutePolicy::Bearer(BearerMode::Required),
            RoutePolicy::GlobalAdmin,
        ]);
        assert_eq!(
            pipeline.policies(),
            &[RoutePolicy::Bearer(BearerMode::Required), RoutePolicy::GlobalAdmin],
        );
        let err = pipeline
            .evaluate(&state, &parts("/v1/admin", None), b"")
            .unwrap_err();
        assert_eq!(err, GuardError::Auth(AuthError::Missing));
    }

    #[test]
    fn global_admin_policy_denies_plain_users() {
        let state = test_state();
        let token = state.tokens.issue(2);
        let pipeline = PolicyPipeline::new(vec![
            RoutePolicy::Bearer(BearerMode::Required),
            RoutePolicy::GlobalAdmin,
        ]);
        let err = pipeline
            .evaluate(&state, &parts("/v1/admin", Some(&token)), b"")
            .unwrap_err();
        assert_eq!(err, GuardError::Denied { required: "all" });
    }

    #[test]
    fn site_role_resolves_from_the_path_site() {
        let state = test_state();
        let token = state.tokens.issue(2);
        let pipeline = PolicyPipeline::new(vec![
            RoutePolicy::Bearer(BearerMode::Required),
            RoutePolicy::SiteRole(SiteRole::Owner),
        ]);

        let auth = pipeline
            .evaluate(&state, &parts("/v1/range/7/live/camera", Some(&token)), b"")
            .unwrap();
        assert!(auth.capabilities.unwrap().has_owner_or_higher());

        // Same token, unknown site.
        let err = pipeline
            .evaluate(&state, &parts("/v1/range/8/live/camera", Some(&token)), b"")
            .unwrap_err();
        assert_eq!(err, GuardError::Auth(AuthError::SiteUnknown));
    }

    #[test]
    fn path_site_id_wants_a_positive_integer() {
        assert_eq!(path_site_id("/v1/range/7/api/camera"), Ok(7));
        assert!(path_site_id("/v1/range/abc/api/camera").is_err());
        assert!(path_site_id("/v1/range/-2/api/camera").is_err());
        assert!(path_site_id("/v1/range/0/api/camera").is_err());
        assert!(path_site_id("/v1/auth/login").is_err());
    }
}
