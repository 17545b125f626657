//! Reference counter Core for Tether.
//!
//! A pure state machine that keeps a shared counter in sync with a counter
//! server. It performs no IO: every side effect leaves as a [`Request`] and
//! every result comes back through [`Core::handle_response`].
//!
//! # Endpoints
//!
//! | Event        | Effect                                 |
//! |--------------|----------------------------------------|
//! | `StartWatch` | `ServerSentEvents {api_base}/sse`      |
//! | `Get`        | `Http GET {api_base}`                  |
//! | `Increment`  | `Render`, then `Http POST {api_base}/inc` |
//! | `Decrement`  | `Render`, then `Http POST {api_base}/dec` |
//!
//! Increment and decrement apply optimistically; the server's answer (over
//! HTTP or the SSE stream) overwrites the local value.
//!
//! # Underflow
//!
//! The counter is a signed 64-bit value and moves freely below zero:
//! decrementing 0 yields -1. Arithmetic saturates at the `i64` extremes.

mod counter;

pub use counter::{CounterCore, DEFAULT_API_BASE};

pub(crate) use tether_types::{
    Core, CoreError, Effect, Event, HttpMethod, HttpRequest, HttpResponse, Request, RequestId,
    SseRequest, SseResponse, ViewModel, WireMessage,
};
