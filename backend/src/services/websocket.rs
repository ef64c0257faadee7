use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::services::tokens::AuthenticatedUser;
use shared::WsServerMessage;

/// Sender for WebSocket messages
pub type WsSender = mpsc::UnboundedSender<WsServerMessage>;

pub fn owner_group(owner_id: &Uuid) -> String {
    format!("owner-{}", owner_id)
}

pub fn fleet_group(fleet_id: &Uuid) -> String {
    format!("fleet-{}", fleet_id)
}

pub fn vehicle_group(vehicle_id: &Uuid) -> String {
    format!("vehicle-{}", vehicle_id)
}

/// Client connection state
#[derive(Debug)]
pub struct ClientSession {
    pub sender: WsSender,
    pub principal: Option<AuthenticatedUser>,
    pub groups: HashSet<String>,
}

/// Connection-group registry and fan-out for domain events. Nothing is
/// persisted: memberships are rebuilt from the access token on reconnect.
pub struct FleetHub {
    /// Map of session_id -> ClientSession
    sessions: RwLock<HashMap<Uuid, ClientSession>>,
    /// Map of group key -> set of session_ids
    groups: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl FleetHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        })
    }

    /// Register a new WebSocket session
    pub async fn register(&self, session_id: Uuid, sender: WsSender) {
        let session = ClientSession {
            sender,
            principal: None,
            groups: HashSet::new(),
        };
        self.sessions.write().await.insert(session_id, session);
        log::debug!("WebSocket session registered: {}", session_id);
    }

    /// Attach a verified principal to a session. When the principal carries
    /// a tenant claim the connection is auto-subscribed to its owner group.
    pub async fn authenticate(&self, session_id: &Uuid, principal: AuthenticatedUser) -> bool {
        let owner_id = principal.owner_id;

        {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return false;
            };
            session.principal = Some(principal);
            let _ = session.sender.send(WsServerMessage::Connected { owner_id });
        }

        if let Some(owner_id) = owner_id {
            self.add_to_group(session_id, &owner_group(&owner_id)).await;
        }

        log::debug!("WebSocket session authenticated: {}", session_id);
        true
    }

    /// Get the principal attached to a session, if authenticated
    pub async fn principal(&self, session_id: &Uuid) -> Option<AuthenticatedUser> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).and_then(|s| s.principal.clone())
    }

    /// Join a group. Idempotent; requires an authenticated session.
    pub async fn join_group(&self, session_id: &Uuid, group: &str) -> bool {
        {
            let sessions = self.sessions.read().await;
            let Some(session) = sessions.get(session_id) else {
                return false;
            };
            if session.principal.is_none() {
                let _ = session.sender.send(WsServerMessage::Error {
                    code: "not_authenticated".to_string(),
                    message: "You must authenticate before joining a group".to_string(),
                });
                return false;
            }
        }

        self.add_to_group(session_id, group).await;
        self.send_to_session(
            session_id,
            WsServerMessage::JoinedGroup {
                group: group.to_string(),
            },
        )
        .await;

        log::debug!("Session {} joined group {}", session_id, group);
        true
    }

    /// Leave a group. Idempotent; leaving a group the session is not in is
    /// a no-op apart from the confirmation.
    pub async fn leave_group(&self, session_id: &Uuid, group: &str) {
        {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return;
            };
            session.groups.remove(group);
        }

        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(session_id);
            if members.is_empty() {
                groups.remove(group);
            }
        }
        drop(groups);

        self.send_to_session(
            session_id,
            WsServerMessage::LeftGroup {
                group: group.to_string(),
            },
        )
        .await;

        log::debug!("Session {} left group {}", session_id, group);
    }

    /// Disconnect a session and drop all of its group memberships
    pub async fn disconnect(&self, session_id: &Uuid) {
        let member_of = {
            let mut sessions = self.sessions.write().await;
            match sessions.remove(session_id) {
                Some(session) => session.groups,
                None => return,
            }
        };

        let mut groups = self.groups.write().await;
        for group in member_of {
            if let Some(members) = groups.get_mut(&group) {
                members.remove(session_id);
                if members.is_empty() {
                    groups.remove(&group);
                }
            }
        }

        log::debug!("WebSocket session disconnected: {}", session_id);
    }

    /// Send a message to a specific session
    pub async fn send_to_session(&self, session_id: &Uuid, message: WsServerMessage) {
        let sessions = self.sessions.read().await;
        if let Some(session) = sessions.get(session_id) {
            let _ = session.sender.send(message);
        }
    }

    /// Broadcast a message to every session in a group. Best-effort: a dead
    /// receiver is skipped without affecting the rest of the group.
    pub async fn broadcast(&self, group: &str, message: WsServerMessage) {
        let groups = self.groups.read().await;
        if let Some(session_ids) = groups.get(group) {
            let sessions = self.sessions.read().await;
            for session_id in session_ids {
                if let Some(session) = sessions.get(session_id) {
                    let _ = session.sender.send(message.clone());
                }
            }
        }
    }

    /// Fan a domain event out to one or more groups. The envelope is built
    /// once, so a client subscribed to overlapping groups can use the shared
    /// `event_id` to drop the duplicate delivery.
    pub async fn publish_event(&self, groups: &[String], event: &str, payload: serde_json::Value) {
        let message = WsServerMessage::Event {
            event: event.to_string(),
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            payload,
        };

        for group in groups {
            self.broadcast(group, message.clone()).await;
        }
    }

    async fn add_to_group(&self, session_id: &Uuid, group: &str) {
        {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return;
            };
            session.groups.insert(group.to_string());
        }

        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_string())
            .or_default()
            .insert(*session_id);
    }

    /// Number of sessions currently in a group
    #[allow(dead_code)]
    pub async fn group_size(&self, group: &str) -> usize {
        let groups = self.groups.read().await;
        groups.get(group).map(|members| members.len()).unwrap_or(0)
    }
}
