//! Connection Broadcast Hub
//!
//! Thread-safe set of live clients. Membership is self-healing: a client
//! whose connection reports closed, or whose send fails, is dropped as part
//! of the same delivery call. There is no separate sweep.

mod connection;

pub use connection::{ChannelConnection, ClientConnection, OutboundFrame};

use crate::models::{BroadcastMessage, StampedMessage};
use crate::utils::{lock, now_utc};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Close code used for orderly shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close reason sent to every client on shutdown.
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// A registered client connection.
#[derive(Clone)]
pub struct LiveClient {
    pub id: String,
    pub connection: Arc<dyn ClientConnection>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connected_clients: usize,
    pub total_updates: u64,
    pub last_update: Option<String>,
}

#[derive(Default)]
pub struct ConnectionBroadcastHub {
    /// Map: client_id -> LiveClient
    clients: DashMap<String, LiveClient>,
    total_updates: AtomicU64,
    last_update: Mutex<Option<String>>,
}

impl ConnectionBroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and greet it with a `connected` message.
    ///
    /// The transport owner must call [`remove_client`](Self::remove_client)
    /// when the connection closes or errors.
    pub fn add_client(&self, connection: Arc<dyn ClientConnection>) -> String {
        let id = format!("hmr_{}", uuid::Uuid::new_v4().simple());
        self.clients.insert(
            id.clone(),
            LiveClient {
                id: id.clone(),
                connection,
                connected_at: Utc::now(),
            },
        );
        log::info!(
            "[hmr:hub] Client connected: {} ({} total)",
            id,
            self.clients.len()
        );

        self.send_to_client(&id, &BroadcastMessage::connected());
        id
    }

    /// Deregister a client. Idempotent.
    pub fn remove_client(&self, client_id: &str) -> bool {
        let removed = self.clients.remove(client_id).is_some();
        if removed {
            log::info!(
                "[hmr:hub] Client disconnected: {} ({} remaining)",
                client_id,
                self.clients.len()
            );
        }
        removed
    }

    /// Stamp, serialize once, and deliver to every open client.
    ///
    /// Returns the number of clients the message was handed to.
    pub fn broadcast(&self, message: &BroadcastMessage) -> usize {
        let timestamp = now_utc();
        let payload = match serde_json::to_string(&StampedMessage::new(message.clone(), timestamp.clone())) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[hmr:hub] Failed to serialize {} message: {}", message.type_tag(), e);
                return 0;
            }
        };

        self.total_updates.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_update) = Some(timestamp);

        // Snapshot so no shard lock is held while sending
        let targets: Vec<(String, Arc<dyn ClientConnection>)> = self
            .clients
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().connection)))
            .collect();

        let mut delivered = 0;
        for (client_id, connection) in targets {
            if deliver(&client_id, connection.as_ref(), &payload) {
                delivered += 1;
            } else {
                self.clients.remove(&client_id);
            }
        }

        log::debug!(
            "[hmr:hub] Broadcast {} to {} client(s)",
            message.type_tag(),
            delivered
        );
        delivered
    }

    /// Deliver to a single client, pruning it if the send fails.
    pub fn send_to_client(&self, client_id: &str, message: &BroadcastMessage) -> bool {
        let Some(connection) = self
            .clients
            .get(client_id)
            .map(|entry| Arc::clone(&entry.value().connection))
        else {
            return false;
        };

        let payload = match serde_json::to_string(&StampedMessage::new(message.clone(), now_utc())) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[hmr:hub] Failed to serialize {} message: {}", message.type_tag(), e);
                return false;
            }
        };

        if deliver(client_id, connection.as_ref(), &payload) {
            true
        } else {
            self.clients.remove(client_id);
            false
        }
    }

    /// Attempt a graceful close on every client, then clear the set.
    pub fn close_all_connections(&self, code: u16, reason: &str) {
        for entry in self.clients.iter() {
            let client = entry.value();
            if !client.connection.is_open() {
                continue;
            }
            if let Err(e) = client.connection.close(code, reason) {
                log::debug!("[hmr:hub] Failed to close client {}: {}", client.id, e);
            }
        }
        let count = self.clients.len();
        self.clients.clear();
        if count > 0 {
            log::info!("[hmr:hub] Closed {} client connection(s)", count);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connected_clients: self.clients.len(),
            total_updates: self.total_updates.load(Ordering::Relaxed),
            last_update: lock(&self.last_update).clone(),
        }
    }
}

/// Best-effort single delivery. `false` means the client is dead.
fn deliver(client_id: &str, connection: &dyn ClientConnection, payload: &str) -> bool {
    if !connection.is_open() {
        log::debug!("[hmr:hub] Pruning closed client {}", client_id);
        return false;
    }
    match connection.send(payload) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("[hmr:hub] Pruning client {} after failed send: {}", client_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleId;
    use std::sync::atomic::AtomicBool;

    /// Records frames; can be flipped to closed or failing.
    #[derive(Default)]
    struct RecordingConnection {
        frames: Mutex<Vec<String>>,
        closed: AtomicBool,
        failing: AtomicBool,
        close_calls: Mutex<Vec<(u16, String)>>,
    }

    impl RecordingConnection {
        fn frames(&self) -> Vec<serde_json::Value> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| serde_json::from_str(f).unwrap())
                .collect()
        }
    }

    impl ClientConnection for RecordingConnection {
        fn send(&self, text: &str) -> Result<(), String> {
            if self.failing.load(Ordering::SeqCst) {
                return Err("broken pipe".to_string());
            }
            self.frames.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn close(&self, code: u16, reason: &str) -> Result<(), String> {
            self.close_calls.lock().unwrap().push((code, reason.to_string()));
            if self.failing.load(Ordering::SeqCst) {
                return Err("broken pipe".to_string());
            }
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn reload() -> BroadcastMessage {
        BroadcastMessage::reload("index.html", "h", &ModuleId::new("index.html"), "Document changed")
    }

    #[test]
    fn test_add_client_sends_connected() {
        let hub = ConnectionBroadcastHub::new();
        let conn = Arc::new(RecordingConnection::default());
        let id = hub.add_client(conn.clone());

        assert!(id.starts_with("hmr_"));
        let frames = conn.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "connected");
        assert_eq!(frames[0]["message"], "HMR client connected successfully");
        assert!(frames[0]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_add_then_remove_restores_count() {
        let hub = ConnectionBroadcastHub::new();
        let before = hub.client_count();
        let id = hub.add_client(Arc::new(RecordingConnection::default()));
        assert_eq!(hub.client_count(), before + 1);

        assert!(hub.remove_client(&id));
        assert!(!hub.remove_client(&id));
        assert_eq!(hub.client_count(), before);
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let hub = ConnectionBroadcastHub::new();
        let a = Arc::new(RecordingConnection::default());
        let b = Arc::new(RecordingConnection::default());
        hub.add_client(a.clone());
        hub.add_client(b.clone());

        assert_eq!(hub.broadcast(&reload()), 2);
        assert_eq!(a.frames()[1]["type"], "reload");
        assert_eq!(b.frames()[1]["moduleId"], "index.html");
        assert_eq!(a.frames()[1]["updateType"], "reload");
    }

    #[test]
    fn test_broadcast_prunes_closed_and_failing_clients() {
        let hub = ConnectionBroadcastHub::new();
        let healthy = Arc::new(RecordingConnection::default());
        let closed = Arc::new(RecordingConnection::default());
        let failing = Arc::new(RecordingConnection::default());
        hub.add_client(healthy.clone());
        hub.add_client(closed.clone());
        hub.add_client(failing.clone());

        closed.closed.store(true, Ordering::SeqCst);
        failing.failing.store(true, Ordering::SeqCst);

        assert_eq!(hub.broadcast(&reload()), 1);
        assert_eq!(hub.client_count(), 1);
        assert_eq!(healthy.frames().len(), 2);
    }

    #[test]
    fn test_send_to_client_prunes_dead_client() {
        let hub = ConnectionBroadcastHub::new();
        let conn = Arc::new(RecordingConnection::default());
        let id = hub.add_client(conn.clone());

        assert!(hub.send_to_client(&id, &reload()));
        conn.closed.store(true, Ordering::SeqCst);
        assert!(!hub.send_to_client(&id, &reload()));
        assert_eq!(hub.client_count(), 0);
        assert!(!hub.send_to_client("hmr_missing", &reload()));
    }

    #[test]
    fn test_close_all_connections_clears_even_on_failure() {
        let hub = ConnectionBroadcastHub::new();
        let ok = Arc::new(RecordingConnection::default());
        let failing = Arc::new(RecordingConnection::default());
        hub.add_client(ok.clone());
        hub.add_client(failing.clone());
        failing.failing.store(true, Ordering::SeqCst);

        hub.close_all_connections(CLOSE_NORMAL, SHUTDOWN_REASON);

        assert_eq!(hub.client_count(), 0);
        assert_eq!(
            ok.close_calls.lock().unwrap().as_slice(),
            &[(1000, "Server shutting down".to_string())]
        );
        assert_eq!(failing.close_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stats_track_broadcasts() {
        let hub = ConnectionBroadcastHub::new();
        assert_eq!(hub.stats().total_updates, 0);
        assert!(hub.stats().last_update.is_none());

        hub.add_client(Arc::new(RecordingConnection::default()));
        hub.broadcast(&reload());
        hub.broadcast(&reload());

        let stats = hub.stats();
        assert_eq!(stats.connected_clients, 1);
        assert_eq!(stats.total_updates, 2);
        assert!(stats.last_update.is_some());
    }

    #[test]
    fn test_channel_connection_is_pruned_after_receiver_drop() {
        let hub = ConnectionBroadcastHub::new();
        let (conn, rx) = ChannelConnection::new();
        hub.add_client(Arc::new(conn));
        drop(rx);

        assert_eq!(hub.broadcast(&reload()), 0);
        assert_eq!(hub.client_count(), 0);
    }
}
