//! Carries out the effects the Core asks for.
//!
//! `Render` runs inline. Network effects run as tasks in a [`JoinSet`] owned
//! by the dispatch loop and re-enter it as [`Command`]s. Tasks hold a weak
//! handle to the command queue, so they never keep a finished loop alive.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use tether_providers::{Capabilities, TransportError};
use tether_types::{
    Core, EffectKind, HttpRequest, Outcome, RequestId, SseRequest, SseResponse, ViewModel,
    WireMessage,
};

use crate::ShellError;
use crate::dispatch::Command;
use crate::view::ViewStore;

pub(crate) struct EffectExecutor {
    capabilities: Capabilities,
    view: ViewStore,
    inbox: mpsc::WeakSender<Command>,
    tasks: JoinSet<()>,
}

impl EffectExecutor {
    pub(crate) fn new(
        capabilities: Capabilities,
        view: ViewStore,
        inbox: mpsc::WeakSender<Command>,
    ) -> Self {
        Self {
            capabilities,
            view,
            inbox,
            tasks: JoinSet::new(),
        }
    }

    /// Read the Core's view and publish it. Never suspends.
    pub(crate) fn render(&self, core: &dyn Core) -> Result<(), ShellError> {
        let bytes = core.view()?;
        let view = ViewModel::from_bytes(&bytes)?;
        tracing::debug!(text = %view.text, "Render");
        self.view.replace(view);
        Ok(())
    }

    pub(crate) fn spawn_http(&mut self, id: RequestId, request: HttpRequest) {
        let http = Arc::clone(&self.capabilities.http);
        let inbox = self.inbox.clone();

        self.tasks.spawn(async move {
            let command = match http.send(&request).await {
                Ok(response) => Command::Response {
                    id,
                    outcome: Outcome::Http(response),
                    reply: None,
                },
                Err(source) => abandoned(id, EffectKind::Http, source),
            };
            deliver(&inbox, command).await;
        });
    }

    pub(crate) fn spawn_sse(&mut self, id: RequestId, request: SseRequest) {
        let sse = Arc::clone(&self.capabilities.sse);
        let inbox = self.inbox.clone();

        self.tasks.spawn(async move {
            let mut chunks = match sse.subscribe(&request).await {
                Ok(chunks) => chunks,
                Err(source) => {
                    deliver(&inbox, abandoned(id, EffectKind::ServerSentEvents, source)).await;
                    return;
                }
            };

            // Each send completes before the next line is read, so chunks of
            // one stream reach the Core in arrival order.
            while let Some(item) = chunks.next().await {
                let command = match item {
                    Ok(chunk) => Command::Response {
                        id: id.clone(),
                        outcome: Outcome::Sse(SseResponse::Chunk(chunk)),
                        reply: None,
                    },
                    Err(source) => {
                        deliver(&inbox, abandoned(id, EffectKind::ServerSentEvents, source))
                            .await;
                        return;
                    }
                };
                if !deliver(&inbox, command).await {
                    return;
                }
            }

            tracing::info!(id = %id, url = %request.url, "SSE stream ended");
            deliver(&inbox, Command::Closed { id, error: None }).await;
        });
    }

    /// Collect finished tasks so the set does not grow without bound.
    pub(crate) fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(err) = result
                && err.is_panic()
            {
                tracing::error!("Effect task panicked: {err}");
            }
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn shutdown(&mut self) {
        self.tasks.abort_all();
    }
}

fn abandoned(id: RequestId, effect: EffectKind, source: TransportError) -> Command {
    Command::Closed {
        error: Some(ShellError::Transport {
            id: id.clone(),
            effect,
            source,
        }),
        id,
    }
}

async fn deliver(inbox: &mpsc::WeakSender<Command>, command: Command) -> bool {
    let Some(tx) = inbox.upgrade() else {
        tracing::debug!("Dispatch loop gone; dropping effect result");
        return false;
    };
    if tx.send(command).await.is_err() {
        tracing::debug!("Dispatch loop gone; dropping effect result");
        return false;
    }
    true
}
