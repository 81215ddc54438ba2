use std::sync::Arc;
use tokio::sync::mpsc::{channel, Sender};

use presence_system::{ClientMessage, DiagramId, JoinAck, JoinError, Position, ServerMessage};

use crate::admin::AdminCommand;
use crate::auth::CredentialVerifier;
use crate::config::ServerConfig;
use crate::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::server_state::{ConnectionId, Joined, Left, ServerState};

pub type ServerTx = Sender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Admin(AdminCommand),
}

/// The room broker. Owns every room and is the only place they change, so
/// whatever it queues for one connection arrives in the order it was decided.
struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
    verifier: Arc<dyn CredentialVerifier>,
}

impl Server {
    fn new(room_capacity: usize, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            server_state: ServerState::new(room_capacity),
            connections: ConnectionTxStorage::new(),
            verifier,
        }
    }

    async fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command).await,
            ServerCommand::Admin(AdminCommand::DescribeRooms { tx }) => {
                let _ = tx.send(self.server_state.describe_rooms());
            }
        }
    }

    async fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx, credential } => {
                let connection_id = self.server_state.create_connection(credential);
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                    .await;
            }
            ConnectionCommand::Disconnect { from } => {
                if let Some(left) = self.server_state.disconnect(&from) {
                    self.broadcast_left(left).await;
                }
                self.connections.remove(&from);
            }
            ConnectionCommand::ClientMessage { from, message } => match message {
                ClientMessage::Join { diagram_id } => self.handle_join(&from, diagram_id).await,
                ClientMessage::Cursor { x, y } => self.handle_cursor(&from, Position::new(x, y)),
            },
        }
    }

    fn try_join(&mut self, from: &ConnectionId, diagram_id: DiagramId) -> Result<Joined, JoinError> {
        let entry = self
            .server_state
            .connection(from)
            .ok_or(JoinError::CredentialRejected)?;
        if entry.room.is_some() {
            return Err(JoinError::AlreadyJoined);
        }
        if let Err(err) = diagram_id.validate() {
            log::info!("Connection {} asked for a bad diagram id: {}", from, err);
            return Err(JoinError::DiagramInaccessible);
        }
        let identity = self.verifier.verify(&entry.credential, &diagram_id)?;
        self.server_state.join_room(from, diagram_id, identity)
    }

    async fn handle_join(&mut self, from: &ConnectionId, diagram_id: DiagramId) {
        match self.try_join(from, diagram_id) {
            Ok(Joined {
                participant,
                others,
                peers,
            }) => {
                let ack = JoinAck::Accepted {
                    self_id: participant.id.clone(),
                    participants: others,
                };
                self.connections
                    .send(from, ConnectionEvent::Message(ServerMessage::JoinAck(ack)))
                    .await;
                for peer in &peers {
                    let event = ServerMessage::ParticipantJoined(participant.clone());
                    self.connections
                        .send(peer, ConnectionEvent::Message(event))
                        .await;
                }
            }
            Err(error) => {
                log::info!("Rejecting join of connection {}: {}", from, error);
                let ack = JoinAck::Rejected { error };
                self.connections
                    .send(from, ConnectionEvent::Message(ServerMessage::JoinAck(ack)))
                    .await;
            }
        }
    }

    fn handle_cursor(&mut self, from: &ConnectionId, position: Position) {
        if !position.is_finite() {
            log::warn!("Ignoring non-finite cursor from connection {}", from);
            return;
        }
        match self.server_state.cursor_event(from, position) {
            Ok((event, targets)) => {
                for target in &targets {
                    self.connections.try_send(
                        target,
                        ConnectionEvent::Message(ServerMessage::Cursor(event.clone())),
                    );
                }
            }
            Err(err) => log::debug!("Ignoring cursor: {}", err),
        }
    }

    async fn broadcast_left(&mut self, left: Left) {
        for peer in &left.peers {
            let event = ServerMessage::ParticipantLeft {
                id: left.participant_id.clone(),
            };
            self.connections
                .send(peer, ConnectionEvent::Message(event))
                .await;
        }
        log::debug!(
            "Told {} connection(s) in {} that {} left",
            left.peers.len(),
            left.diagram_id,
            left.participant_id
        );
    }
}

pub fn spawn_server(config: &ServerConfig, verifier: Arc<dyn CredentialVerifier>) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(config.broker_buffer.max(1));
    let room_capacity = config.room_capacity;

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(room_capacity, verifier));
        log::info!("room broker - started");

        while let Some(command) = srv_rx.recv().await {
            server.handle_command(command).await;
        }
        log::info!("room broker - terminated");
    });

    srv_tx
}
