//! Line-oriented presentation layer.
//!
//! | Input | Action                 |
//! |-------|------------------------|
//! | `+`   | increment              |
//! | `-`   | decrement              |
//! | `g`   | refresh from server    |
//! | `q`   | quit                   |
//!
//! Every Render is printed as it lands in the view store.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use tether_engine::Runtime;
use tether_engine::tether_types::Event;

const HELP: &str = "+ increment, - decrement, g refresh, q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Dispatch(Event),
    Quit,
}

pub(crate) fn parse_action(line: &str) -> Option<Action> {
    match line.trim() {
        "+" => Some(Action::Dispatch(Event::Increment)),
        "-" => Some(Action::Dispatch(Event::Decrement)),
        "g" => Some(Action::Dispatch(Event::Get)),
        "q" => Some(Action::Quit),
        _ => None,
    }
}

async fn print<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

/// Drive the shell from `input` until quit, end of input, or a fatal fault.
pub(crate) async fn run<R, W>(runtime: &mut Runtime, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut view = runtime.view.clone();

    print(&mut output, HELP).await?;
    print(&mut output, &format!("count: {}", view.latest().text)).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                match parse_action(&line) {
                    Some(Action::Quit) => break,
                    Some(Action::Dispatch(event)) => {
                        runtime
                            .shell
                            .dispatch(event)
                            .await
                            .with_context(|| format!("{} failed", event.name()))?;
                    }
                    None if line.trim().is_empty() => {}
                    None => print(&mut output, &format!("unknown command {line:?}; {HELP}")).await?,
                }
            }
            changed = view.changed() => {
                let Ok(snapshot) = changed else {
                    break;
                };
                print(&mut output, &format!("count: {}", snapshot.text)).await?;
            }
            fault = runtime.faults.next() => {
                match fault {
                    Some(fault) if fault.is_fatal() => {
                        return Err(anyhow::Error::new(fault).context("dispatch loop failed"));
                    }
                    Some(fault) => print(&mut output, &format!("warning: {fault}")).await?,
                    None => break,
                }
            }
        }
    }

    Ok(())
}
