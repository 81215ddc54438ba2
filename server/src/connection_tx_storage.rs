use crate::connection::ConnectionEvent;
use crate::server_state::ConnectionId;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

/// Outbound queues of the connection actors, keyed by connection.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Waits for queue space; membership events must not be lost.
    pub async fn send(&self, to: &ConnectionId, event: ConnectionEvent) {
        if let Some(tx) = self.connection_txs.get(to) {
            if tx.send(event).await.is_err() {
                log::debug!("Connection {} is already gone", to);
            }
        } else {
            log::warn!("No outbound queue for connection {}", to);
        }
    }

    /// Drops the event when the queue is full. Used for cursor relays, where a
    /// newer sample will follow anyway.
    pub fn try_send(&self, to: &ConnectionId, event: ConnectionEvent) {
        if let Some(tx) = self.connection_txs.get(to) {
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::debug!("Connection {} is slow, dropping event", to)
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("Connection {} is already gone", to)
                }
            }
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }
}
