//! Canonical binary encoding for everything that crosses the core/shell boundary.
//!
//! Layout is bincode with fixed-width little-endian integers, u64 length
//! prefixes on sequences and u32 variant tags. Decoding is strict: a message
//! must consume the whole input, so truncation and trailing garbage both fail.

use bincode::Options;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::message::{Effect, Event, HttpResponse, Request, SseResponse, ViewModel};

/// Upper bound on a single encoded message (16 MiB).
pub const MAX_MESSAGE_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Input was truncated, had trailing bytes, or held a different type.
    /// Indicates a core/shell protocol mismatch; never retried.
    #[error("malformed {kind} message: {source}")]
    MalformedMessage {
        kind: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to encode {kind} message: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: bincode::Error,
    },
}

impl CodecError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedMessage { kind, .. } | Self::Encode { kind, .. } => kind,
        }
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_MESSAGE_BYTES)
        .reject_trailing_bytes()
}

pub fn encode<T: Serialize>(kind: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    options()
        .serialize(value)
        .map_err(|source| CodecError::Encode { kind, source })
}

pub fn decode<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    options()
        .deserialize(bytes)
        .map_err(|source| CodecError::MalformedMessage { kind, source })
}

/// A type with a canonical wire form.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Name used in diagnostics when a message of this type fails to decode.
    const KIND: &'static str;

    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode(Self::KIND, self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        decode(Self::KIND, bytes)
    }
}

impl WireMessage for Event {
    const KIND: &'static str = "event";
}

impl WireMessage for Effect {
    const KIND: &'static str = "effect";
}

impl WireMessage for Request {
    const KIND: &'static str = "request";
}

/// A batch of requests returned from one Core call.
impl WireMessage for Vec<Request> {
    const KIND: &'static str = "requests";
}

impl WireMessage for HttpResponse {
    const KIND: &'static str = "http_response";
}

impl WireMessage for SseResponse {
    const KIND: &'static str = "sse_response";
}

impl WireMessage for ViewModel {
    const KIND: &'static str = "view_model";
}
