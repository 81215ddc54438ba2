//! Session channel: one websocket per (diagram, credential).
//!
//! [`open`] connects, attaches the credential to the handshake and spawns the
//! connection task on the current `LocalSet`. The task and the presentation
//! side share the session state through `Rc<RefCell<_>>`; both run on the same
//! thread and the task never holds a borrow across an await point, so state
//! mutations are serialized without a lock.
//!
//! The returned [`ChannelHandle`] owns the connection. Closing it, explicitly
//! or by dropping it, empties the registry and cancels the task before
//! returning.

use crate::config::ChannelConfig;
use crate::membership::MembershipState;
use crate::presence_registry::Participant;
use crate::session_state::SessionState;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use presence_system::codec::{self, CodecError, Frame, WireFormat};
use presence_system::{ClientMessage, DiagramId, JoinError, ParticipantId, ServerMessage};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Supplies the bearer credential of the current user, if any.
pub trait CredentialProvider {
    fn credential(&self) -> Option<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String>,
{
    fn credential(&self) -> Option<String> {
        self()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelStatus {
    /// Opened without a credential or diagram; never connects.
    Inert,
    Connecting,
    AwaitingJoin,
    Joined,
    Rejected(JoinError),
    Disconnected,
    Closed,
}

impl ChannelStatus {
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ChannelStatus::Connecting | ChannelStatus::AwaitingJoin | ChannelStatus::Joined
        )
    }
}

impl From<&MembershipState> for ChannelStatus {
    fn from(state: &MembershipState) -> Self {
        match state {
            MembershipState::Connecting => ChannelStatus::Connecting,
            MembershipState::AwaitingAck => ChannelStatus::AwaitingJoin,
            MembershipState::Joined { .. } => ChannelStatus::Joined,
            MembershipState::Rejected(error) => ChannelStatus::Rejected(*error),
            MembershipState::Disconnected => ChannelStatus::Disconnected,
            MembershipState::Closed => ChannelStatus::Closed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("credential cannot be sent as a header value")]
    InvalidCredential,
    #[error("timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Read-only view of a session for the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct PresenceView {
    state: Option<Rc<RefCell<SessionState>>>,
}

impl PresenceView {
    pub fn participants(&self) -> Vec<Participant> {
        self.state
            .as_ref()
            .map(|state| state.borrow().registry().participants())
            .unwrap_or_default()
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.state
            .as_ref()
            .and_then(|state| state.borrow().registry().get(id).cloned())
    }

    pub fn status(&self) -> ChannelStatus {
        self.state
            .as_ref()
            .map(|state| ChannelStatus::from(state.borrow().membership_state()))
            .unwrap_or(ChannelStatus::Inert)
    }

    pub fn self_id(&self) -> Option<ParticipantId> {
        self.state
            .as_ref()
            .and_then(|state| state.borrow().self_id().cloned())
    }
}

pub struct ChannelHandle {
    diagram_id: Option<DiagramId>,
    view: PresenceView,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    fn inert() -> Self {
        Self {
            diagram_id: None,
            view: PresenceView::default(),
            task: None,
        }
    }

    pub fn diagram_id(&self) -> Option<&DiagramId> {
        self.diagram_id.as_ref()
    }

    pub fn view(&self) -> PresenceView {
        self.view.clone()
    }

    pub fn status(&self) -> ChannelStatus {
        self.view.status()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.view.participants()
    }

    /// Local pointer sample in diagram space. Never blocks; silently dropped
    /// unless the room has been joined.
    pub fn publish(&self, x: f64, y: f64) {
        if let Some(state) = &self.view.state {
            state.borrow_mut().publish(x, y, Instant::now());
        }
    }

    /// Idempotent. Nothing touches the registry once this returns.
    pub fn close(&mut self) {
        if let Some(state) = &self.view.state {
            let mut state = state.borrow_mut();
            if !state.is_closed() {
                state.close();
                if let Some(diagram_id) = &self.diagram_id {
                    log::info!("presence channel for diagram {} closed", diagram_id);
                }
            }
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a presence channel for `diagram_id`.
///
/// Must be called from within a `tokio::task::LocalSet`. Returns an inert
/// handle when there is no valid diagram id or no credential, and a
/// disconnected one when the connection cannot be established.
pub async fn open<C>(
    config: &ChannelConfig,
    diagram_id: Option<&str>,
    credentials: &C,
) -> ChannelHandle
where
    C: CredentialProvider + ?Sized,
{
    let diagram_id = match diagram_id.map(DiagramId::parse) {
        Some(Ok(diagram_id)) => diagram_id,
        Some(Err(err)) => {
            log::debug!("no presence channel: {}", err);
            return ChannelHandle::inert();
        }
        None => return ChannelHandle::inert(),
    };
    let credential = match credentials.credential() {
        Some(credential) if !credential.is_empty() => credential,
        _ => {
            log::debug!("no presence channel for {}: no credential", diagram_id);
            return ChannelHandle::inert();
        }
    };

    let state = Rc::new(RefCell::new(SessionState::new(
        diagram_id.clone(),
        config.throttle_window,
    )));
    let view = PresenceView {
        state: Some(state.clone()),
    };

    let task = match connect(config, &credential).await {
        Ok(stream) => {
            log::info!("presence channel for diagram {} connected", diagram_id);
            Some(tokio::task::spawn_local(run_channel(
                stream,
                state,
                config.frame_interval,
                config.wire_format,
            )))
        }
        Err(err) => {
            log::warn!(
                "presence channel for diagram {} failed to connect: {}",
                diagram_id,
                err
            );
            state.borrow_mut().on_disconnected();
            None
        }
    };

    ChannelHandle {
        diagram_id: Some(diagram_id),
        view,
        task,
    }
}

async fn connect(config: &ChannelConfig, credential: &str) -> Result<WsStream, ChannelError> {
    let mut request = config.server_url.as_str().into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", credential))
        .map_err(|_| ChannelError::InvalidCredential)?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (stream, _response) = tokio::time::timeout(
        config.connect_timeout,
        tokio_tungstenite::connect_async(request),
    )
    .await
    .map_err(|_| ChannelError::ConnectTimeout(config.connect_timeout))??;
    Ok(stream)
}

async fn run_channel(
    stream: WsStream,
    state: Rc<RefCell<SessionState>>,
    frame_interval: Duration,
    format: WireFormat,
) {
    let (mut sink, mut source) = stream.split();

    let join = state.borrow_mut().on_connected();
    if let Some(join) = join {
        if let Err(err) = send(&mut sink, &join, format).await {
            log::warn!("failed to send join: {}", err);
            state.borrow_mut().on_disconnected();
            return;
        }
    }

    if let Err(err) = pump(&mut sink, &mut source, &state, frame_interval, format).await {
        log::warn!("presence channel dropped: {}", err);
    }
    state.borrow_mut().on_disconnected();
    let _ = sink.close().await;
}

/// Runs until the transport ends. Inbound frames and flush attempts are
/// interleaved on this one task.
async fn pump(
    sink: &mut SplitSink<WsStream, Message>,
    source: &mut SplitStream<WsStream>,
    state: &Rc<RefCell<SessionState>>,
    frame_interval: Duration,
    format: WireFormat,
) -> Result<(), ChannelError> {
    let mut frames = tokio::time::interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            inbound = source.next() => match inbound {
                Some(Ok(message)) => {
                    if !handle_inbound(state, message) {
                        return Ok(());
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(()),
            },
            _ = frames.tick() => {
                let outbound = state.borrow_mut().poll_outbound(Instant::now());
                if let Some(message) = outbound {
                    send(sink, &message, format).await?;
                }
            }
        }
    }
}

/// Returns false when the peer closed the channel.
fn handle_inbound(state: &Rc<RefCell<SessionState>>, message: Message) -> bool {
    let decoded = match message {
        Message::Binary(bytes) => codec::decode_binary::<ServerMessage>(&bytes),
        Message::Text(text) => codec::decode_text::<ServerMessage>(&text),
        Message::Close(frame) => {
            log::info!("presence channel closed by server: {:?}", frame);
            return false;
        }
        _ => return true,
    };
    match decoded {
        Ok(message) => {
            log::debug!("Ingress {:?}", message);
            state.borrow_mut().handle_server_message(message);
        }
        Err(err) => log::warn!("ignoring undecodable frame: {}", err),
    }
    true
}

async fn send(
    sink: &mut SplitSink<WsStream, Message>,
    message: &ClientMessage,
    format: WireFormat,
) -> Result<(), ChannelError> {
    log::debug!("Egress {:?}", message);
    let frame = match codec::encode(message, format)? {
        Frame::Binary(bytes) => Message::Binary(bytes),
        Frame::Text(text) => Message::Text(text),
    };
    sink.send(frame).await?;
    Ok(())
}
