//! Frame encoding shared by both ends of a channel.
//!
//! Binary websocket frames carry bincode, text frames carry JSON. Native
//! clients use the compact binary form; browser tooling can speak JSON to the
//! same endpoint.

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Binary,
    Json,
}

/// An encoded message, ready to become a websocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Binary(Vec<u8>),
    Text(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("bincode: {0}")]
    Binary(#[from] bincode::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode<T: Serialize>(message: &T, format: WireFormat) -> Result<Frame, CodecError> {
    Ok(match format {
        WireFormat::Binary => Frame::Binary(bincode::serialize(message)?),
        WireFormat::Json => Frame::Text(serde_json::to_string(message)?),
    })
}

pub fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}
