//! Latest rendered view, shared with the presentation layer.
//!
//! One writer (the Render handler inside the dispatch loop), any number of
//! readers. Snapshots are swapped whole, so a reader never sees a partial one.

use tokio::sync::watch;

use tether_types::ViewModel;

use crate::ShellError;

#[derive(Debug)]
pub struct ViewStore {
    tx: watch::Sender<ViewModel>,
}

/// Read side handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    rx: watch::Receiver<ViewModel>,
}

impl ViewStore {
    #[must_use]
    pub fn new() -> (Self, ViewHandle) {
        let (tx, rx) = watch::channel(ViewModel::default());
        (Self { tx }, ViewHandle { rx })
    }

    pub fn replace(&self, view: ViewModel) {
        self.tx.send_replace(view);
    }

    #[must_use]
    pub fn subscribe(&self) -> ViewHandle {
        ViewHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl ViewHandle {
    #[must_use]
    pub fn latest(&self) -> ViewModel {
        self.rx.borrow().clone()
    }

    /// Wait for the next Render, then return its snapshot.
    pub async fn changed(&mut self) -> Result<ViewModel, ShellError> {
        self.rx.changed().await.map_err(|_| ShellError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
