//! The dispatch loop actor and its handles.
//!
//! A single task owns the Core, the request registry and the effect executor.
//! Everything that reaches the Core goes through its bounded command queue:
//! user events from [`Shell::dispatch`], and responses from effect tasks or
//! [`Shell::dispatch_response`]. Each command runs to completion before the
//! next is taken, so Core calls never overlap.

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

use tether_providers::Capabilities;
use tether_types::{Core, Effect, Event, Outcome, Request, RequestId, WireMessage};

use crate::ShellError;
use crate::config::DispatchConfig;
use crate::executor::EffectExecutor;
use crate::registry::{Delivery, RequestRegistry};
use crate::view::{ViewHandle, ViewStore};

type Reply<T> = oneshot::Sender<Result<T, ShellError>>;

#[derive(Debug)]
pub(crate) enum Command {
    Event {
        event: Event,
        reply: Option<Reply<()>>,
    },
    Response {
        id: RequestId,
        outcome: Outcome,
        reply: Option<Reply<Delivery>>,
    },
    /// A network effect finished without a response for the Core.
    Closed {
        id: RequestId,
        error: Option<ShellError>,
    },
    Shutdown,
}

struct DispatchLoop {
    core: Box<dyn Core>,
    registry: RequestRegistry,
    executor: EffectExecutor,
    commands: mpsc::Receiver<Command>,
    faults: mpsc::UnboundedSender<ShellError>,
}

impl DispatchLoop {
    async fn run(mut self) {
        tracing::info!("Dispatch loop started");
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Event { event, reply } => {
                    let result = self.process_event(event);
                    self.settle(reply, result);
                }
                Command::Response { id, outcome, reply } => {
                    let result = self.process_response(&id, &outcome);
                    self.settle(reply, result);
                }
                Command::Closed { id, error } => self.close(&id, error),
                Command::Shutdown => break,
            }
            self.executor.reap();
        }

        let aborted = self.executor.in_flight();
        self.executor.shutdown();
        tracing::info!(
            outstanding = self.registry.len(),
            aborted,
            "Dispatch loop stopped"
        );
    }

    fn process_event(&mut self, event: Event) -> Result<(), ShellError> {
        tracing::debug!(event = event.name(), "Dispatching event");
        let bytes = event.to_bytes()?;
        let output = self.core.process_event(&bytes)?;
        self.route(&output)
    }

    fn process_response(
        &mut self,
        id: &RequestId,
        outcome: &Outcome,
    ) -> Result<Delivery, ShellError> {
        let effect = outcome.kind();
        if self.registry.admit(id, effect)? == Delivery::Late {
            tracing::warn!(id = %id, effect = %effect, "Dropping response for closed request");
            return Ok(Delivery::Late);
        }

        let bytes = match outcome {
            Outcome::Http(response) => response.to_bytes()?,
            Outcome::Sse(response) => response.to_bytes()?,
        };
        let output = self.core.handle_response(id.as_bytes(), &bytes)?;
        self.route(&output)?;
        Ok(Delivery::Forwarded)
    }

    /// Route a batch in Core order. The first failure drops the rest.
    fn route(&mut self, output: &[u8]) -> Result<(), ShellError> {
        let requests = Vec::<Request>::from_bytes(output)?;
        for Request { id, effect } in requests {
            let kind = effect.kind();
            self.registry.open(&id, kind)?;
            tracing::debug!(id = %id, effect = %kind, "Routing request");
            match effect {
                Effect::Render => self.executor.render(&*self.core)?,
                Effect::Http(request) => self.executor.spawn_http(id, request),
                Effect::ServerSentEvents(request) => self.executor.spawn_sse(id, request),
            }
        }
        Ok(())
    }

    fn close(&mut self, id: &RequestId, error: Option<ShellError>) {
        let was_open = self.registry.close(id);
        tracing::debug!(id = %id, was_open, "Request closed");
        if let Some(error) = error {
            self.report(error);
        }
    }

    /// Hand a result to whoever is waiting, or report it if nobody is.
    fn settle<T>(&self, reply: Option<Reply<T>>, result: Result<T, ShellError>) {
        match reply {
            Some(reply) => {
                if let Err(Err(error)) = reply.send(result) {
                    self.report(error);
                }
            }
            None => {
                if let Err(error) = result {
                    self.report(error);
                }
            }
        }
    }

    fn report(&self, error: ShellError) {
        if error.is_fatal() {
            tracing::error!(error = %error, "Dispatch chain failed");
        } else {
            tracing::warn!(error = %error, "Effect abandoned");
        }
        let _ = self.faults.send(error);
    }
}

/// Cloneable entry point into the dispatch loop.
#[derive(Debug, Clone)]
pub struct Shell {
    commands: mpsc::Sender<Command>,
}

impl Shell {
    /// Run `event` through the Core and route what it returns.
    ///
    /// Resolves once the synchronous part of the chain, including any
    /// `Render`, has finished. Network effects continue in the background.
    pub async fn dispatch(&self, event: Event) -> Result<(), ShellError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Event {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| ShellError::Closed)?;
        rx.await.map_err(|_| ShellError::Closed)?
    }

    /// Feed a response for request `id` back into the Core.
    pub async fn dispatch_response(
        &self,
        id: RequestId,
        outcome: Outcome,
    ) -> Result<Delivery, ShellError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Response {
                id,
                outcome,
                reply: Some(reply),
            })
            .await
            .map_err(|_| ShellError::Closed)?;
        rx.await.map_err(|_| ShellError::Closed)?
    }

    /// Stop the loop after the commands already queued. In-flight effects are aborted.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Errors from chains nobody is awaiting: effect results and transport failures.
#[derive(Debug)]
pub struct Faults {
    rx: mpsc::UnboundedReceiver<ShellError>,
}

impl Faults {
    /// `None` once the loop has stopped and every fault was taken.
    pub async fn next(&mut self) -> Option<ShellError> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<ShellError> {
        self.rx.try_recv().ok()
    }
}

/// A running dispatch loop and the handles around it.
#[derive(Debug)]
pub struct Runtime {
    pub shell: Shell,
    pub view: ViewHandle,
    pub faults: Faults,
    task: JoinHandle<()>,
}

impl Runtime {
    /// Spawn the loop without bootstrapping it. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(core: Box<dyn Core>, capabilities: Capabilities, options: &DispatchConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(options.queue_capacity.max(1));
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        let (store, view) = ViewStore::new();

        let dispatch = DispatchLoop {
            core,
            registry: RequestRegistry::default(),
            executor: EffectExecutor::new(capabilities, store, commands_tx.downgrade()),
            commands: commands_rx,
            faults: faults_tx,
        };
        let task = tokio::spawn(dispatch.run());

        Self {
            shell: Shell {
                commands: commands_tx,
            },
            view,
            faults: Faults { rx: faults_rx },
            task,
        }
    }

    /// Dispatch the startup event.
    pub async fn bootstrap(&self) -> Result<(), ShellError> {
        self.shell.dispatch(Event::StartWatch).await
    }

    /// Shut the loop down and wait for it to finish.
    pub async fn stop(self) -> Result<(), JoinError> {
        self.shell.shutdown().await;
        self.task.await
    }
}
