use tether_providers::TransportError;
use tether_types::{CodecError, CoreError, EffectKind, RequestId};

/// Everything that can end a dispatch chain.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Core rejected input: {0}")]
    Core(#[from] CoreError),
    #[error("Request id {id} is already outstanding")]
    DuplicateRequest { id: RequestId },
    #[error("Received {received} response for {expected} request {id}")]
    MismatchedResponse {
        id: RequestId,
        expected: EffectKind,
        received: EffectKind,
    },
    #[error("{effect} effect for request {id} failed: {source}")]
    Transport {
        id: RequestId,
        effect: EffectKind,
        #[source]
        source: TransportError,
    },
    #[error("Dispatch loop has shut down")]
    Closed,
}

impl ShellError {
    /// Protocol violations between shell and core, as opposed to a network
    /// effect that could not be carried out.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transport { .. })
    }
}
