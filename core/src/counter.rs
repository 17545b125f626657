//! Counter Core backed by a remote count server.
//!
//! Every HTTP or SSE request the Core issues is remembered until it can no
//! longer be answered from the Core's side. HTTP ids are dropped when their
//! response arrives; watch ids are never dropped. The shell does not tell the
//! Core when it abandons a request (transport failure, stream end), so each
//! such request leaves one entry behind for the life of the Core.
//! [`CounterCore::outstanding`] reports the current size.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    Core, CoreError, Effect, Event, HttpMethod, HttpRequest, HttpResponse, Request, RequestId,
    SseRequest, SseResponse, ViewModel, WireMessage,
};

/// Public counter server used when no base URL is configured.
pub const DEFAULT_API_BASE: &str = "https://crux-counter.fly.dev";

/// What an outstanding request will answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    /// One HTTP response carrying the server count.
    Count,
    /// A stream of count updates; never closes from the Core's side.
    Watch,
}

/// Server representation of the counter. Extra fields (timestamps) are ignored.
#[derive(Debug, Deserialize)]
struct CountPayload {
    value: i64,
}

#[derive(Debug)]
pub struct CounterCore {
    api_base: String,
    count: i64,
    confirmed: bool,
    outstanding: HashMap<RequestId, Awaiting>,
}

impl Default for CounterCore {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl CounterCore {
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            api_base,
            count: 0,
            confirmed: false,
            outstanding: HashMap::new(),
        }
    }

    #[must_use]
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Whether the current value came from the server rather than an optimistic update.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn fresh_id() -> RequestId {
        RequestId::new(Uuid::new_v4().as_bytes().to_vec())
    }

    fn render() -> Request {
        Request::new(Self::fresh_id(), Effect::Render)
    }

    fn issue(&mut self, awaiting: Awaiting, effect: Effect) -> Request {
        let id = Self::fresh_id();
        self.outstanding.insert(id.clone(), awaiting);
        Request::new(id, effect)
    }

    fn update(&mut self, event: Event) -> Vec<Request> {
        match event {
            Event::StartWatch => {
                let url = self.endpoint("/sse");
                vec![self.issue(Awaiting::Watch, Effect::ServerSentEvents(SseRequest { url }))]
            }
            Event::Get => {
                let request = HttpRequest::new(HttpMethod::Get, self.endpoint(""));
                vec![self.issue(Awaiting::Count, Effect::Http(request))]
            }
            Event::Increment => {
                self.count = self.count.saturating_add(1);
                self.confirmed = false;
                let request = HttpRequest::new(HttpMethod::Post, self.endpoint("/inc"));
                vec![
                    Self::render(),
                    self.issue(Awaiting::Count, Effect::Http(request)),
                ]
            }
            Event::Decrement => {
                self.count = self.count.saturating_sub(1);
                self.confirmed = false;
                let request = HttpRequest::new(HttpMethod::Post, self.endpoint("/dec"));
                vec![
                    Self::render(),
                    self.issue(Awaiting::Count, Effect::Http(request)),
                ]
            }
        }
    }

    fn apply_count(&mut self, value: Option<i64>) -> Vec<Request> {
        let Some(value) = value else {
            return Vec::new();
        };
        self.count = value;
        self.confirmed = true;
        vec![Self::render()]
    }
}

fn parse_http_count(response: &HttpResponse) -> Option<i64> {
    if !response.is_success() {
        return None;
    }
    serde_json::from_slice::<CountPayload>(&response.body)
        .ok()
        .map(|payload| payload.value)
}

/// Last `data:` line of a chunk that parses as a count wins.
fn parse_chunk_count(chunk: &[u8]) -> Option<i64> {
    let text = String::from_utf8_lossy(chunk);
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<CountPayload>(data.trim()).ok())
        .map(|payload| payload.value)
        .last()
}

impl Core for CounterCore {
    fn process_event(&mut self, event: &[u8]) -> Result<Vec<u8>, CoreError> {
        let event = Event::from_bytes(event)?;
        let requests = self.update(event);
        Ok(requests.to_bytes()?)
    }

    fn handle_response(&mut self, id: &[u8], response: &[u8]) -> Result<Vec<u8>, CoreError> {
        let id = RequestId::from(id);
        let requests = match self.outstanding.get(&id).copied() {
            None => return Err(CoreError::UnknownRequest { id }),
            Some(Awaiting::Count) => {
                let response = HttpResponse::from_bytes(response)?;
                self.outstanding.remove(&id);
                self.apply_count(parse_http_count(&response))
            }
            Some(Awaiting::Watch) => {
                let SseResponse::Chunk(chunk) = SseResponse::from_bytes(response)?;
                self.apply_count(parse_chunk_count(&chunk))
            }
        };
        Ok(requests.to_bytes()?)
    }

    fn view(&self) -> Result<Vec<u8>, CoreError> {
        Ok(ViewModel::new(self.count.to_string()).to_bytes()?)
    }
}
