//! Wire-level domain types for Tether.
//!
//! This crate contains the messages that cross the core/shell boundary, their
//! canonical binary codec, and the [`Core`] trait the shell drives. No IO, no
//! async; both sides of the boundary can depend on it.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod bridge;
pub mod codec;
mod ids;
mod message;

pub use bridge::{Core, CoreError};
pub use codec::{CodecError, WireMessage};
pub use ids::RequestId;
pub use message::{
    Effect, EffectKind, Event, HttpHeader, HttpMethod, HttpRequest, HttpResponse, Outcome,
    Request, SseRequest, SseResponse, ViewModel,
};
