//! Payload codec
//!
//! Payloads travel either as plain JSON or as a JSON string holding the
//! base64 text of the JSON bytes (`"eyJ0eXBlIjoi..."`). Consumers accept both.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::wallet::{CommandType, EventKind, WalletCommand, WalletEvent};

/// Wire representation used when producing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
    #[default]
    Json,
    Base64,
}

impl FromStr for PayloadEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(PayloadEncoding::Json),
            "base64" => Ok(PayloadEncoding::Base64),
            other => Err(format!("unknown payload encoding: {other}")),
        }
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadEncoding::Json => write!(f, "json"),
            PayloadEncoding::Base64 => write!(f, "base64"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("payload encoding error: {0}")]
    Encoding(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown type: {0}")]
    UnknownType(String),
}

impl DecodeError {
    /// Unknown types are dropped, everything else is worth another attempt
    pub fn is_permanent(&self) -> bool {
        matches!(self, DecodeError::UnknownType(_))
    }
}

/// Serialize `value` into a channel payload
pub fn encode<T: Serialize>(
    value: &T,
    encoding: PayloadEncoding,
) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    match encoding {
        PayloadEncoding::Json => Ok(json),
        PayloadEncoding::Base64 => serde_json::to_vec(&STANDARD.encode(json)),
    }
}

/// Strip the base64 wrapper if present, returning the inner JSON bytes
pub fn unwrap_payload(payload: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    let trimmed = payload.trim_ascii();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    if trimmed.first() == Some(&b'{') {
        return Ok(Cow::Borrowed(trimmed));
    }

    let text = std::str::from_utf8(trimmed)
        .map_err(|e| DecodeError::Encoding(e.to_string()))?
        .trim_matches('"')
        .trim();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }

    STANDARD
        .decode(text)
        .map(Cow::Owned)
        .map_err(|e| DecodeError::Encoding(e.to_string()))
}

#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Read the `type` discriminant without committing to a shape
fn peek_type(json: &[u8]) -> Result<String, DecodeError> {
    let tag: TypeTag =
        serde_json::from_slice(json).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    tag
        .kind
        .ok_or_else(|| DecodeError::Malformed("missing type".to_string()))
}

fn decode_body<T: DeserializeOwned>(json: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(json).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Decode a command channel payload (plain or base64-wrapped)
pub fn decode_command(payload: &[u8]) -> Result<WalletCommand, DecodeError> {
    let json = unwrap_payload(payload)?;
    let kind = peek_type(&json)?;
    kind.parse::<CommandType>()
        .map_err(|_| DecodeError::UnknownType(kind.clone()))?;
    decode_body(&json)
}

/// Decode an event channel payload (plain or base64-wrapped)
pub fn decode_event(payload: &[u8]) -> Result<WalletEvent, DecodeError> {
    let json = unwrap_payload(payload)?;
    let kind = peek_type(&json)?;
    kind.parse::<EventKind>()
        .map_err(|_| DecodeError::UnknownType(kind.clone()))?;
    decode_body(&json)
}
