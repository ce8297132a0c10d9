//! The connection table (§4.7 "online vs offline delivery"): a process-wide
//! map from identity id to a live, authenticated socket's outbound channel.
//! `Arc<RwLock<HashMap<..>>>` rather than anything fancier — this process
//! is the only node, so there's no cluster-wide presence problem to solve.

use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
pub struct ConnectionTable {
    inner: Arc<RwLock<HashMap<i64, mpsc::UnboundedSender<Message>>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the live socket for `id`, replacing whatever was there
    /// (a stale entry from a connection that hasn't noticed it's dead yet).
    pub fn insert(&self, id: i64, sender: mpsc::UnboundedSender<Message>) {
        self.inner.write().expect("connection table lock poisoned").insert(id, sender);
    }

    /// Removes the entry for `id`, but only if it is still `sender` — so a
    /// socket tearing down never evicts a newer connection that reconnected
    /// under the same identity first.
    pub fn remove_if_current(&self, id: i64, sender: &mpsc::UnboundedSender<Message>) {
        let mut table = self.inner.write().expect("connection table lock poisoned");
        if table.get(&id).is_some_and(|current| current.same_channel(sender)) {
            table.remove(&id);
        }
    }

    /// Sends `bytes` as a binary frame to `id`'s live socket, if any.
    /// Returns `false` (without error) when there is no live socket or the
    /// live socket's channel has already closed — the caller falls back to
    /// the durable queue in either case.
    pub fn send_binary(&self, id: i64, bytes: Vec<u8>) -> bool {
        let sender = self.inner.read().expect("connection table lock poisoned").get(&id).cloned();
        match sender {
            Some(sender) => sender.send(Message::Binary(bytes.into())).is_ok(),
            None => false,
        }
    }
}
