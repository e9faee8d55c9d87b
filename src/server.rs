//! Application state, router construction, and request handlers.
//!
//! Every route is registered together with its guard pipeline; the pairing
//! lives here, in one place, so the effective policy of the whole surface
//! can be read (and tested) top to bottom.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::routing::{get, post, MethodRouter};
use axum::{Extension, Json, Router};
use rangehub_trust::{
    resolve, AuthError, CapabilitySet, Identity, SiteId, SiteRole, TokenAuthenticator, TokenSecret,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::{Config, ConfigError};
use crate::directory::{AccountDirectory, SiteDirectory};
use crate::error::GuardError;
use crate::guard::{self, PolicyPipeline, RequestAuth, RoutePolicy};
use crate::realtime::{gateway, ConnectionRegistry, EventChannel, EventTopic};
use crate::telemetry::RequestTimer;

/// Shared state behind every handler.
pub struct AppState {
    /// Hub name, for logs and diagnostics.
    pub server_name: String,
    /// Bearer token issue/verify.
    pub tokens: TokenAuthenticator,
    /// Account directory (boot-loaded, runtime-mutable).
    pub accounts: AccountDirectory,
    /// Site directory (boot-loaded, runtime-mutable).
    pub sites: SiteDirectory,
    /// Live realtime connections.
    pub registry: ConnectionRegistry,
}

impl AppState {
    /// Assemble state from its parts.
    pub fn new(
        server_name: impl Into<String>,
        token_secret: &TokenSecret,
        accounts: AccountDirectory,
        sites: SiteDirectory,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            tokens: TokenAuthenticator::new(token_secret),
            accounts,
            sites,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Build state from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.server.name.clone(),
            &TokenSecret::new(config.security.token_secret.as_bytes().to_vec()),
            AccountDirectory::from_blocks(&config.accounts),
            SiteDirectory::from_blocks(&config.sites)?,
        ))
    }
}

/// Attach a guard pipeline to a route.
///
/// The pipeline is composed here, at registration time; nothing about a
/// route's policy is looked up while requests are in flight.
fn policed(
    route: MethodRouter<Arc<AppState>>,
    state: &Arc<AppState>,
    policies: Vec<RoutePolicy>,
) -> MethodRouter<Arc<AppState>> {
    let pipeline = Arc::new(PolicyPipeline::new(policies));
    route.route_layer(middleware::from_fn_with_state(
        state.clone(),
        move |state: State<Arc<AppState>>, req: Request, next: Next| {
            let pipeline = pipeline.clone();
            async move { guard::apply(state.0, pipeline, req, next).await }
        },
    ))
}

/// Build the hub's API router.
pub fn router(state: Arc<AppState>) -> Router {
    use crate::guard::BearerMode::{Optional, Required};
    use crate::guard::RoutePolicy::{Bearer, SignedSite, SiteRole as SiteRolePolicy};

    Router::new()
        .route("/v1/auth/login", post(login))
        .route(
            "/v1/auth/session",
            policed(get(session), &state, vec![Bearer(Optional)]),
        )
        .route(
            "/v1/range/:site_id/capabilities",
            policed(get(capabilities), &state, vec![Bearer(Required)]),
        )
        .route(
            "/v1/range/:site_id/api/camera",
            policed(post(ingest_camera), &state, vec![SignedSite]),
        )
        .route(
            "/v1/range/:site_id/api/payment",
            policed(post(ingest_payment), &state, vec![SignedSite]),
        )
        .route(
            "/v1/range/:site_id/live/:topic",
            policed(
                get(gateway::live_events),
                &state,
                vec![Bearer(Required), SiteRolePolicy(SiteRole::SecurityGuard)],
            ),
        )
        .with_state(state)
}

/// Serve the API on an already-bound listener.
pub async fn serve(
    state: Arc<AppState>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    tracing::info!(server = %state.server_name, "serving API");
    axum::serve(listener, router(state)).await
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    identity: Identity,
}

/// Exchange credentials for a bearer token.
///
/// Unknown username and wrong password are indistinguishable to the caller.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, GuardError> {
    let _timer = RequestTimer::new("login");
    let Some(identity) = state.accounts.authenticate(&request.username, &request.password) else {
        return Err(GuardError::Auth(AuthError::Invalid));
    };

    crate::metrics::record_token_issued();
    tracing::info!(username = %identity.username, "login");
    Ok(Json(LoginResponse {
        token: state.tokens.issue(identity.id),
        identity,
    }))
}

#[derive(Debug, Serialize)]
struct SessionView {
    authenticated: bool,
    identity: Option<Identity>,
}

/// Who the caller is, if anyone. The one optional-auth route.
async fn session(Extension(auth): Extension<RequestAuth>) -> Json<SessionView> {
    Json(SessionView {
        authenticated: auth.identity.is_some(),
        identity: auth.identity,
    })
}

#[derive(Debug, Serialize)]
struct CapabilityView {
    site: SiteId,
    capabilities: CapabilitySet,
}

/// The caller's capabilities at a site, resolved fresh for this request.
async fn capabilities(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<SiteId>,
    Extension(auth): Extension<RequestAuth>,
) -> Result<Json<CapabilityView>, GuardError> {
    let _timer = RequestTimer::new("capabilities");
    let identity = auth.identity.as_ref().ok_or(AuthError::Missing)?;
    let site = state.sites.lookup(site_id).ok_or(AuthError::SiteUnknown)?;
    Ok(Json(CapabilityView {
        site: site_id,
        capabilities: resolve(identity, &site),
    }))
}

#[derive(Debug, Serialize)]
struct IngestAck {
    channel: String,
    delivered: usize,
}

async fn ingest_camera(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<RequestAuth>,
    body: Bytes,
) -> Result<Json<IngestAck>, GuardError> {
    ingest(state, auth, EventTopic::Camera, body).await
}

async fn ingest_payment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<RequestAuth>,
    body: Bytes,
) -> Result<Json<IngestAck>, GuardError> {
    ingest(state, auth, EventTopic::Payment, body).await
}

/// Fan a signed site event out to the channel's live viewers.
async fn ingest(
    state: Arc<AppState>,
    auth: RequestAuth,
    topic: EventTopic,
    body: Bytes,
) -> Result<Json<IngestAck>, GuardError> {
    let _timer = RequestTimer::new("ingest");
    // The acting site is the one the signature authenticated, never the id
    // in the request path.
    let site = auth.trusted_site.as_ref().ok_or(AuthError::Missing)?;

    let payload: serde_json::Value = if body.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| serde_json::json!({ "content_length": body.len() }))
    };
    let event = payload
        .get("event")
        .and_then(|v| v.as_str())
        .unwrap_or("added")
        .to_string();

    let channel = EventChannel { site: site.id, topic };
    let span = crate::telemetry::spans::site_ingest(site.id, topic.as_str());
    let delivered = state
        .registry
        .broadcast(channel, &event, payload)
        .instrument(span)
        .await;
    Ok(Json(IngestAck {
        channel: channel.to_string(),
        delivered,
    }))
}
