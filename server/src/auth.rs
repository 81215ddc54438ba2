use presence_system::{DiagramId, JoinError};

pub const MAX_CREDENTIAL_LEN: usize = 256;

/// Durable identity behind a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

/// Resolves the credential a connection presented at handshake time.
///
/// Called once per join, so an implementation can also refuse access to a
/// particular diagram with [`JoinError::DiagramInaccessible`].
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str, diagram_id: &DiagramId) -> Result<Identity, JoinError>;
}

/// Takes the credential at face value as `<user id>[:<display name>]`.
///
/// Meant for deployments where the session provider already checked the
/// bearer token in front of this server.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueCredentialVerifier;

impl CredentialVerifier for OpaqueCredentialVerifier {
    fn verify(&self, credential: &str, _diagram_id: &DiagramId) -> Result<Identity, JoinError> {
        if credential.is_empty()
            || credential.len() > MAX_CREDENTIAL_LEN
            || credential.chars().any(char::is_control)
        {
            return Err(JoinError::CredentialRejected);
        }
        let (user_id, display_name) = match credential.split_once(':') {
            Some((user_id, display_name)) => (user_id.trim(), display_name.trim()),
            None => (credential.trim(), credential.trim()),
        };
        if user_id.is_empty() {
            return Err(JoinError::CredentialRejected);
        }
        Ok(Identity {
            user_id: user_id.to_owned(),
            display_name: if display_name.is_empty() {
                user_id.to_owned()
            } else {
                display_name.to_owned()
            },
        })
    }
}
