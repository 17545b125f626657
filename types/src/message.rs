//! Messages exchanged across the core/shell boundary.
//!
//! Everything here travels through the wire codec. Field order and variant
//! order are part of the encoding: append new variants, never reorder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// External stimulus the Core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Subscribe to server-side counter changes. Dispatched once at startup.
    StartWatch,
    Increment,
    Decrement,
    /// Refresh the counter from the server.
    Get,
}

impl Event {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartWatch => "start_watch",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::Get => "get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<HttpHeader>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Bodyless request with no extra headers.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HttpHeader {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseRequest {
    pub url: String,
}

/// Side effect the Core asks the shell to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Render,
    Http(HttpRequest),
    ServerSentEvents(SseRequest),
}

impl Effect {
    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::Render => EffectKind::Render,
            Self::Http(_) => EffectKind::Http,
            Self::ServerSentEvents(_) => EffectKind::ServerSentEvents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Render,
    Http,
    ServerSentEvents,
}

impl EffectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Http => "http",
            Self::ServerSentEvents => "sse",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub effect: Effect,
}

impl Request {
    #[must_use]
    pub fn new(id: RequestId, effect: Effect) -> Self {
        Self { id, effect }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SseResponse {
    Chunk(Vec<u8>),
}

/// A response on its way back to the Core.
///
/// Only the inner response is encoded on the wire; the Core tells the two
/// apart by the id it is paired with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Http(HttpResponse),
    Sse(SseResponse),
}

impl Outcome {
    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::Http(_) => EffectKind::Http,
            Self::Sse(_) => EffectKind::ServerSentEvents,
        }
    }
}

/// Materialized state handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub text: String,
}

impl ViewModel {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
