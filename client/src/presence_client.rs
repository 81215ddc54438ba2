use crate::channel::{self, ChannelHandle, ChannelStatus, CredentialProvider, PresenceView};
use crate::config::ChannelConfig;
use crate::presence_registry::Participant;
use presence_system::DiagramId;

struct ActiveSession {
    diagram_id: DiagramId,
    credential: String,
    handle: ChannelHandle,
}

/// Owns the presence channel of the diagram currently on screen.
///
/// Switching diagrams always closes the previous channel completely before the
/// next one is opened, so two rooms never share one client's state.
pub struct PresenceClient<C> {
    config: ChannelConfig,
    credentials: C,
    requested: Option<DiagramId>,
    active: Option<ActiveSession>,
}

impl<C: CredentialProvider> PresenceClient<C> {
    pub fn new(config: ChannelConfig, credentials: C) -> Self {
        Self {
            config,
            credentials,
            requested: None,
            active: None,
        }
    }

    /// Follows the active diagram. `None`, or an id that is not a valid
    /// diagram id, tears presence down.
    pub async fn set_diagram(&mut self, diagram_id: Option<&str>) {
        let diagram_id = diagram_id.and_then(|id| match DiagramId::parse(id) {
            Ok(diagram_id) => Some(diagram_id),
            Err(err) => {
                log::debug!("ignoring diagram id {:?}: {}", id, err);
                None
            }
        });
        self.requested = diagram_id;
        self.sync(true).await;
    }

    /// Re-reads the credential: losing it closes the channel, a new one
    /// reopens it. A rejected or disconnected session with an unchanged
    /// credential is left as it is.
    pub async fn revalidate(&mut self) {
        self.sync(false).await;
    }

    /// `reopen_dead` lets an unchanged request replace a session that is no
    /// longer live. Only an explicit diagram request does that.
    async fn sync(&mut self, reopen_dead: bool) {
        let credential = self
            .credentials
            .credential()
            .filter(|credential| !credential.is_empty());

        if let (Some(active), Some(diagram_id), Some(credential)) =
            (&self.active, &self.requested, &credential)
        {
            if active.diagram_id == *diagram_id
                && active.credential == *credential
                && (!reopen_dead || active.handle.status().is_live())
            {
                return;
            }
        }

        self.close();

        let (diagram_id, credential) = match (self.requested.clone(), credential) {
            (Some(diagram_id), Some(credential)) => (diagram_id, credential),
            _ => return,
        };
        let provider = || Some(credential.clone());
        let handle = channel::open(&self.config, Some(diagram_id.as_str()), &provider).await;
        self.active = Some(ActiveSession {
            diagram_id,
            credential,
            handle,
        });
    }

    pub fn publish(&self, x: f64, y: f64) {
        if let Some(active) = &self.active {
            active.handle.publish(x, y);
        }
    }

    pub fn diagram_id(&self) -> Option<&DiagramId> {
        self.active.as_ref().map(|active| &active.diagram_id)
    }

    pub fn view(&self) -> PresenceView {
        self.active
            .as_ref()
            .map(|active| active.handle.view())
            .unwrap_or_default()
    }

    pub fn status(&self) -> ChannelStatus {
        self.view().status()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.view().participants()
    }

    pub fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.close();
        }
    }
}
