use crate::actor::RoomEvent;
use crate::error::GatewayError;
use crate::registry::Registry;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use holdem_types::{ClientMessage, Intent, IntentKind, PlayerId, ServerMessage, WireIntentKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// The `GET /ws?roomId=<id>` query parameters.
#[derive(serde::Deserialize)]
pub struct WsQuery {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

/// Build the axum router: a liveness probe and the single WebSocket upgrade
/// route the Session/Socket Gateway is built around. One `axum` handler per
/// connection, matching the split-sink/split-stream-plus-writer-task pattern
/// used throughout the pack's websocket examples.
///
/// CORS and per-IP rate limiting follow the teacher's `simulator::router`
/// layering almost exactly; unlike the teacher's "effectively unlimited for
/// local sims" burst, a real multi-tenant game server needs the limiter to
/// actually bite, so the rate here is tuned to a legitimate client's traffic
/// (one upgrade/health check at a time, not a sustained flood).
pub fn router(registry: Registry) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("static governor config is always valid"),
    );

    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_upgrade))
        .layer(cors)
        .layer(GovernorLayer { config: governor_conf })
        .with_state(registry)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn ws_upgrade(
    State(registry): State<Registry>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(room_id) = query.room_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, GatewayError::MissingRoomId.to_string()).into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, registry, room_id))
        .into_response()
}

/// Per-socket context: which room and, once joined, which player this
/// connection speaks for.
struct Session {
    room_id: String,
    player_id: Option<PlayerId>,
}

/// Drive one WebSocket connection end to end: read `ClientMessage` frames,
/// translate them into `RoomEvent`s posted to the room's mailbox, and relay
/// the mailbox's outbound `ServerMessage`s back as text frames via a
/// dedicated writer task.
async fn handle_socket(socket: WebSocket, registry: Registry, room_id: String) {
    let conn_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let mailbox = registry.get_or_create(&room_id).await;

    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        room_id: room_id.clone(),
        player_id: None,
    };

    mailbox
        .send(RoomEvent::Subscribe {
            conn_id,
            player_id: None,
            tx: out_tx.clone(),
        })
        .await;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_client_message(&text, &mut session, &registry, conn_id, &out_tx).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        }
    }

    mailbox.send(RoomEvent::Unsubscribe { conn_id }).await;
    writer.abort();
    info!(room_id = %session.room_id, player_id = ?session.player_id, "socket disconnected");
}

async fn handle_client_message(
    text: &str,
    session: &mut Session,
    registry: &Registry,
    conn_id: Uuid,
    out_tx: &mpsc::Sender<ServerMessage>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(m) => m,
        Err(err) => {
            let _ = out_tx
                .send(ServerMessage::Error {
                    message: GatewayError::InvalidMessage(err).to_string(),
                })
                .await;
            return;
        }
    };

    match message {
        ClientMessage::JoinRoom {
            room_id,
            nickname,
            player_id,
        } => {
            let mailbox = registry.get_or_create(&room_id).await;
            session.room_id = room_id.clone();
            let assigned = player_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            session.player_id = Some(assigned.clone());

            mailbox
                .send(RoomEvent::Subscribe {
                    conn_id,
                    player_id: Some(assigned.clone()),
                    tx: out_tx.clone(),
                })
                .await;
            mailbox
                .send(RoomEvent::Join {
                    player_id: assigned.clone(),
                    name: nickname,
                })
                .await;

            let _ = out_tx
                .send(ServerMessage::JoinedRoom {
                    room_id,
                    player_id: assigned,
                })
                .await;
        }
        ClientMessage::StartGame => {
            let Some(player_id) = session.player_id.clone() else {
                let _ = out_tx
                    .send(ServerMessage::Error {
                        message: GatewayError::NotInRoom.to_string(),
                    })
                    .await;
                return;
            };
            let mailbox = registry.get_or_create(&session.room_id).await;
            mailbox.send(RoomEvent::Start { player_id }).await;
        }
        ClientMessage::SendIntent { kind, amount } => {
            let Some(player_id) = session.player_id.clone() else {
                let _ = out_tx
                    .send(ServerMessage::Error {
                        message: GatewayError::NotInRoom.to_string(),
                    })
                    .await;
                return;
            };
            let intent = to_intent(kind, amount);
            let mailbox = registry.get_or_create(&session.room_id).await;
            mailbox.send(RoomEvent::Intent { player_id, intent }).await;
        }
    }
}

/// `PASS` is a client-facing synonym for `CHECK`; the machine itself only
/// knows `Check`/`Commit`/`Fold`.
fn to_intent(kind: WireIntentKind, amount: Option<u64>) -> Intent {
    let kind = match kind {
        WireIntentKind::Check | WireIntentKind::Pass => IntentKind::Check,
        WireIntentKind::Commit => IntentKind::Commit,
        WireIntentKind::Fold => IntentKind::Fold,
    };
    Intent {
        kind,
        amount: amount.unwrap_or(0),
    }
}
