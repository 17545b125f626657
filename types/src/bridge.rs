//! The contract between the shell and the Core.
//!
//! The Core is a black box the shell only talks to in bytes. Any
//! deterministic state machine that implements [`Core`] can be driven by the
//! dispatch loop. Calls take `&mut self`: the shell owns the Core exclusively
//! and never invokes it from two places at once.

use thiserror::Error;

use crate::codec::CodecError;
use crate::ids::RequestId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A response arrived for an id the Core never issued or already closed.
    #[error("core has no outstanding request {id}")]
    UnknownRequest { id: RequestId },
}

pub trait Core: Send {
    /// Feed an encoded [`crate::Event`]; returns an encoded `Vec<Request>`.
    fn process_event(&mut self, event: &[u8]) -> Result<Vec<u8>, CoreError>;

    /// Feed the encoded response to request `id`; returns an encoded `Vec<Request>`.
    ///
    /// `response` holds an encoded [`crate::HttpResponse`] or
    /// [`crate::SseResponse`], depending on which effect `id` was issued for.
    fn handle_response(&mut self, id: &[u8], response: &[u8]) -> Result<Vec<u8>, CoreError>;

    /// Encoded [`crate::ViewModel`] of the current state.
    fn view(&self) -> Result<Vec<u8>, CoreError>;
}

impl<C: Core + ?Sized> Core for Box<C> {
    fn process_event(&mut self, event: &[u8]) -> Result<Vec<u8>, CoreError> {
        (**self).process_event(event)
    }

    fn handle_response(&mut self, id: &[u8], response: &[u8]) -> Result<Vec<u8>, CoreError> {
        (**self).handle_response(id, response)
    }

    fn view(&self) -> Result<Vec<u8>, CoreError> {
        (**self).view()
    }
}
