use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::http::header;
use actix_web::{error, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use serde::Deserialize;
use tokio::sync::mpsc::error::TrySendError;

use presence_system::codec::{self, CodecError, Frame, WireFormat};
use presence_system::{ClientMessage, ServerMessage};

use crate::connection_tx_storage::ConnectionTx;
use crate::server::{ServerCommand, ServerTx};
use crate::server_state::ConnectionId;

const CONNECTION_BUFFER: usize = 64;
const MAX_PENDING_BEFORE_CONNECTED: usize = 16;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
        credential: String,
    },
    Disconnect {
        from: ConnectionId,
    },
    ClientMessage {
        from: ConnectionId,
        message: ClientMessage,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Message(ServerMessage),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
    credential: String,
    /// Set by the first frame the client sends; replies use the same format.
    wire_format: Option<WireFormat>,
    /// Messages that arrived before the broker assigned a connection id.
    pending: Vec<ClientMessage>,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, credential: String) -> Self {
        Self {
            state: ConnectionState::Idle,
            srv_tx,
            credential,
            wire_format: None,
            pending: Vec::new(),
        }
    }

    fn ingress(
        &mut self,
        decoded: Result<ClientMessage, CodecError>,
        format: WireFormat,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let message = match decoded {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Closing connection after undecodable frame: {}", err);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Invalid,
                    description: None,
                }));
                ctx.stop();
                return;
            }
        };
        self.wire_format.get_or_insert(format);
        log::debug!("Ingress {:?}", message);

        match self.state {
            ConnectionState::Connected(from) => self.forward(from, message),
            ConnectionState::Idle => {
                if self.pending.len() < MAX_PENDING_BEFORE_CONNECTED {
                    self.pending.push(message);
                } else {
                    log::warn!("Dropping message received before connection was registered");
                }
            }
        }
    }

    fn forward(&self, from: ConnectionId, message: ClientMessage) {
        let is_cursor = matches!(message, ClientMessage::Cursor { .. });
        let command = ServerCommand::Connection(ConnectionCommand::ClientMessage { from, message });
        match self.srv_tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) if is_cursor => {
                log::debug!("Broker busy, dropping cursor from connection {}", from)
            }
            Err(TrySendError::Full(command)) => {
                let srv_tx = self.srv_tx.clone();
                tokio::spawn(async move {
                    let _ = srv_tx.send(command).await;
                });
            }
            Err(TrySendError::Closed(_)) => log::error!("Room broker is not running"),
        }
    }

    fn notify_disconnect(&self, from: ConnectionId) {
        let command = ServerCommand::Connection(ConnectionCommand::Disconnect { from });
        if let Err(TrySendError::Full(command)) = self.srv_tx.try_send(command) {
            let srv_tx = self.srv_tx.clone();
            tokio::spawn(async move {
                let _ = srv_tx.send(command).await;
            });
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(CONNECTION_BUFFER);

        let connect = ServerCommand::Connection(ConnectionCommand::Connect {
            tx,
            credential: std::mem::take(&mut self.credential),
        });
        match self.srv_tx.try_send(connect) {
            Ok(()) => {}
            Err(TrySendError::Full(connect)) => {
                log::debug!("Broker busy, queueing connection");
                let srv_tx = self.srv_tx.clone();
                tokio::spawn(async move {
                    let _ = srv_tx.send(connect).await;
                });
            }
            Err(TrySendError::Closed(_)) => {
                log::error!("Room broker is not running");
                ctx.stop();
                return;
            }
        }

        let addr = ctx.address().recipient();
        let srv_tx = self.srv_tx.clone();

        tokio::spawn(async move {
            log::debug!("connection green thread - started");
            let mut registered = None;
            while let Some(event) = rx.recv().await {
                if let ConnectionEvent::Connected { connection_id } = event {
                    registered = Some(connection_id);
                }
                if addr.send(ConnectionActorMessage(event)).await.is_err() {
                    // The actor stopped before it learned its id and could not
                    // report the disconnect itself.
                    if let Some(from) = registered {
                        let command =
                            ServerCommand::Connection(ConnectionCommand::Disconnect { from });
                        let _ = srv_tx.send(command).await;
                    }
                    break;
                }
            }
            log::debug!("connection green thread - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            self.notify_disconnect(id);
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ingress size: {}", bin.len());
                self.ingress(codec::decode_binary(&bin), WireFormat::Binary, ctx);
            }
            Ok(ws::Message::Text(text)) => {
                self.ingress(codec::decode_text(&text), WireFormat::Json, ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(err) => {
                log::warn!("Websocket protocol error: {}", err);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                self.state = ConnectionState::Connected(connection_id);
                for message in std::mem::take(&mut self.pending) {
                    self.forward(connection_id, message);
                }
            }
            ConnectionEvent::Message(message) => {
                log::debug!("Egress {:?}", message);
                match codec::encode(&message, self.wire_format.unwrap_or_default()) {
                    Ok(Frame::Binary(bytes)) => ctx.binary(bytes),
                    Ok(Frame::Text(text)) => ctx.text(text),
                    Err(err) => log::error!("Failed to encode {:?}: {}", message, err),
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct CredentialQuery {
    access_token: Option<String>,
}

/// Bearer credential from the `Authorization` header, or from the
/// `access_token` query parameter for browsers, which cannot set headers on
/// websocket handshakes.
fn bearer_credential(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, credential)| credential.trim())
        .filter(|credential| !credential.is_empty())
        .map(String::from);

    from_header.or_else(|| {
        web::Query::<CredentialQuery>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().access_token)
            .filter(|credential| !credential.is_empty())
    })
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    let credential =
        bearer_credential(&req).ok_or_else(|| error::ErrorUnauthorized("missing credential"))?;
    ws::start(
        ConnectionActor::new(srv_tx.get_ref().clone(), credential),
        &req,
        stream,
    )
}
