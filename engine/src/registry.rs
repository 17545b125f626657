//! Outstanding request bookkeeping.
//!
//! Each id moves `Open -> Closed` exactly once:
//!
//! | Effect  | Closed when                                  |
//! |---------|----------------------------------------------|
//! | Render  | immediately (never registered)               |
//! | Http    | its single response is admitted, or it fails |
//! | Sse     | its stream ends or fails                     |
//!
//! Closed ids are forgotten, so a response arriving for one is late.

use std::collections::HashMap;

use tether_types::{EffectKind, RequestId};

use crate::ShellError;

/// What happened to a response handed to the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Passed to the Core.
    Forwarded,
    /// Its request was already closed; dropped without reaching the Core.
    Late,
}

#[derive(Debug, Default)]
pub(crate) struct RequestRegistry {
    open: HashMap<RequestId, EffectKind>,
}

impl RequestRegistry {
    /// Register a request the Core just emitted.
    pub(crate) fn open(&mut self, id: &RequestId, kind: EffectKind) -> Result<(), ShellError> {
        if self.open.contains_key(id) {
            return Err(ShellError::DuplicateRequest { id: id.clone() });
        }
        if kind != EffectKind::Render {
            self.open.insert(id.clone(), kind);
        }
        Ok(())
    }

    /// Decide whether a response may reach the Core, closing one-shot requests.
    pub(crate) fn admit(
        &mut self,
        id: &RequestId,
        received: EffectKind,
    ) -> Result<Delivery, ShellError> {
        let Some(&expected) = self.open.get(id) else {
            return Ok(Delivery::Late);
        };
        if expected != received {
            return Err(ShellError::MismatchedResponse {
                id: id.clone(),
                expected,
                received,
            });
        }
        if expected == EffectKind::Http {
            self.open.remove(id);
        }
        Ok(Delivery::Forwarded)
    }

    /// Close a request without a response. Returns whether it was open.
    pub(crate) fn close(&mut self, id: &RequestId) -> bool {
        self.open.remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.open.len()
    }
}
