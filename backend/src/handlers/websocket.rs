use actix_web::{web, HttpRequest, HttpResponse, Result};
use actix_ws::Message;
use futures::StreamExt;
use uuid::Uuid;

use crate::handlers::fleets::authorized_for_owner;
use crate::models::AppState;
use crate::services::fleets as fleet_service;
use crate::services::tokens;
use crate::services::websocket::{fleet_group, vehicle_group};
use shared::{WsClientMessage, WsServerMessage};

/// Configure the WebSocket route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/ws", web::get().to(ws_handler));
}

/// WebSocket connection handler
async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (response, session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let session_id = Uuid::new_v4();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WsServerMessage>();

    // Register session
    state.hub.register(session_id, tx).await;

    let state_clone = state.clone();

    // Spawn task to handle incoming messages
    actix_rt::spawn(async move {
        let mut session = session;

        // Spawn task to send outgoing messages
        let mut session_clone = session.clone();
        let send_task = actix_rt::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if session_clone.text(json).await.is_err() {
                        break;
                    }
                }
            }
        });

        // Handle incoming messages
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(client_msg) = serde_json::from_str::<WsClientMessage>(&text) {
                        handle_client_message(&session_id, client_msg, &state_clone).await;
                    } else {
                        state_clone
                            .hub
                            .send_to_session(
                                &session_id,
                                WsServerMessage::Error {
                                    code: "invalid_message".to_string(),
                                    message: "Failed to parse message".to_string(),
                                },
                            )
                            .await;
                    }
                }
                Message::Ping(bytes) => {
                    let _ = session.pong(&bytes).await;
                }
                Message::Close(_) => {
                    break;
                }
                _ => {}
            }
        }

        // Cleanup
        state_clone.hub.disconnect(&session_id).await;
        send_task.abort();
        let _ = session.close(None).await;
    });

    Ok(response)
}

/// Handle incoming WebSocket messages from clients
async fn handle_client_message(session_id: &Uuid, message: WsClientMessage, state: &AppState) {
    match message {
        WsClientMessage::Authenticate { token } => {
            match tokens::verify_access_token(&state.config.jwt, &token) {
                Ok(principal) => {
                    state.hub.authenticate(session_id, principal).await;
                }
                Err(_) => {
                    state
                        .hub
                        .send_to_session(
                            session_id,
                            WsServerMessage::Error {
                                code: "auth_failed".to_string(),
                                message: "Invalid token".to_string(),
                            },
                        )
                        .await;
                }
            }
        }

        WsClientMessage::JoinFleet { fleet_id } => {
            let principal = match state.hub.principal(session_id).await {
                Some(principal) => principal,
                None => {
                    state
                        .hub
                        .send_to_session(
                            session_id,
                            WsServerMessage::Error {
                                code: "not_authenticated".to_string(),
                                message: "You must authenticate first".to_string(),
                            },
                        )
                        .await;
                    return;
                }
            };

            // The fleet must exist and belong to the caller's tenant
            let fleet = match fleet_service::get_fleet(&state.db, &fleet_id).await {
                Ok(Some(fleet)) => fleet,
                _ => {
                    state
                        .hub
                        .send_to_session(
                            session_id,
                            WsServerMessage::Error {
                                code: "not_found".to_string(),
                                message: "Fleet not found".to_string(),
                            },
                        )
                        .await;
                    return;
                }
            };

            if !authorized_for_owner(&principal, &fleet.owner_id) {
                state
                    .hub
                    .send_to_session(
                        session_id,
                        WsServerMessage::Error {
                            code: "forbidden".to_string(),
                            message: "You do not have access to this fleet".to_string(),
                        },
                    )
                    .await;
                return;
            }

            state.hub.join_group(session_id, &fleet_group(&fleet_id)).await;
        }

        WsClientMessage::LeaveFleet { fleet_id } => {
            state
                .hub
                .leave_group(session_id, &fleet_group(&fleet_id))
                .await;
        }

        WsClientMessage::SubscribeVehicles { vehicle_ids } => {
            if state.hub.principal(session_id).await.is_none() {
                state
                    .hub
                    .send_to_session(
                        session_id,
                        WsServerMessage::Error {
                            code: "not_authenticated".to_string(),
                            message: "You must authenticate first".to_string(),
                        },
                    )
                    .await;
                return;
            }

            for vehicle_id in &vehicle_ids {
                state
                    .hub
                    .join_group(session_id, &vehicle_group(vehicle_id))
                    .await;
            }
            state
                .hub
                .send_to_session(session_id, WsServerMessage::Subscribed { vehicle_ids })
                .await;
        }

        WsClientMessage::UnsubscribeVehicles { vehicle_ids } => {
            for vehicle_id in &vehicle_ids {
                state
                    .hub
                    .leave_group(session_id, &vehicle_group(vehicle_id))
                    .await;
            }
            state
                .hub
                .send_to_session(session_id, WsServerMessage::Unsubscribed { vehicle_ids })
                .await;
        }

        WsClientMessage::Ping => {
            state
                .hub
                .send_to_session(session_id, WsServerMessage::Pong)
                .await;
        }
    }
}
