//! WebSocket gateway for realtime viewers.
//!
//! Upgrades `GET /v1/range/{site}/live/{topic}` to a WebSocket, joins the
//! connection to the channel's registry entry, and pumps broadcast events
//! to the socket. The route's policy pipeline has already authenticated the
//! viewer and checked capabilities before the upgrade happens.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use rangehub_trust::SiteId;
use tracing::Instrument;
use uuid::Uuid;

use crate::realtime::{EventChannel, EventTopic};
use crate::server::AppState;

/// Upgrade handler for live event streams.
pub async fn live_events(
    ws: WebSocketUpgrade,
    Path((site_id, topic)): Path<(SiteId, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(topic) = EventTopic::parse(&topic) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let channel = EventChannel { site: site_id, topic };
    ws.on_upgrade(move |socket| {
        let id = Uuid::new_v4();
        let span =
            crate::telemetry::spans::live_connection(&channel.to_string(), &id.to_string());
        viewer_session(state, channel, id, socket).instrument(span)
    })
}

/// Pump events to one viewer until either side goes away.
///
/// Exactly one registry disconnect happens on every exit path; the registry
/// tolerates a second call if the socket teardown races a force-close.
async fn viewer_session(
    state: Arc<AppState>,
    channel: EventChannel,
    id: Uuid,
    socket: WebSocket,
) {
    let mut events = state.registry.connect(channel, id);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Registry force-closed this connection.
                    break;
                };
                let text = match serde_json::to_string(&*event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    // Viewers are receive-only; pings are answered by axum.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.disconnect(channel, id);
    let _ = sink.close().await;
}
