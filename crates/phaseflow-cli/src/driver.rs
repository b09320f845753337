//! Frame loop feeding console commands into a flow graph.

use std::ops::ControlFlow;
use std::time::Duration;

use phaseflow_core::id::NodeId;
use phaseflow_engine::{FlowGraph, FlowStatus};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::command::Command;
use crate::console::ConsoleCollaborators;
use crate::error::AppError;

/// Why the driver stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A terminal node was reached.
    Finished {
        /// The terminal node.
        node: NodeId,
    },
    /// The user asked to quit.
    Quit,
    /// Input reached end of file.
    InputClosed,
}

/// A flow graph plus the console collaborators it was built with.
#[derive(Debug)]
pub struct Driver {
    graph: FlowGraph,
    console: ConsoleCollaborators,
}

impl Driver {
    /// Wraps a graph assembled with `console.collaborators()`.
    #[must_use]
    pub fn new(graph: FlowGraph, console: ConsoleCollaborators) -> Self {
        Self { graph, console }
    }

    /// The driven graph.
    #[must_use]
    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// The console collaborators.
    #[must_use]
    pub fn console(&self) -> &ConsoleCollaborators {
        &self.console
    }

    /// Activates the start node.
    pub fn start(&mut self) {
        self.graph.start();
    }

    /// Applies one command.
    pub fn handle(&mut self, command: Command) -> ControlFlow<Outcome> {
        match command {
            Command::Near => self.console.probes.answer(true),
            Command::Far => self.console.probes.answer(false),
            Command::Reset => {
                if let Err(err) = self.graph.reset_progress() {
                    warn!(error = %err, "progress reset failed");
                }
            }
            Command::Quit => return ControlFlow::Break(Outcome::Quit),
            other => {
                if let Some(signal) = other.signal() {
                    self.graph.publish(signal);
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Parses and applies one input line. Blank and unknown lines are
    /// skipped.
    pub fn handle_line(&mut self, line: &str) -> ControlFlow<Outcome> {
        if line.trim().is_empty() {
            return ControlFlow::Continue(());
        }
        match line.parse::<Command>() {
            Ok(command) => self.handle(command),
            Err(err) => {
                warn!(error = %err, commands = ?Command::ALL, "ignoring input");
                ControlFlow::Continue(())
            }
        }
    }

    /// Advances collaborators by `elapsed`, then runs one graph frame.
    pub fn frame(&mut self, elapsed: Duration) -> FlowStatus {
        self.console.advance(elapsed);
        self.graph.tick(elapsed)
    }

    /// Stops the graph.
    pub fn shutdown(&mut self) {
        self.graph.shutdown();
    }
}

/// Starts the graph and runs frames every `frame` until the flow finishes,
/// the user quits, or `input` closes.
///
/// # Errors
///
/// Returns `AppError::Io` if reading input fails.
pub async fn run<R>(driver: &mut Driver, input: R, frame: Duration) -> Result<Outcome, AppError>
where
    R: AsyncBufRead + Unpin,
{
    driver.start();
    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let FlowStatus::Finished { node } = driver.frame(frame) {
                    info!(node = %node, "flow finished");
                    return Ok(Outcome::Finished { node });
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("input closed");
                    return Ok(Outcome::InputClosed);
                };
                if let ControlFlow::Break(outcome) = driver.handle_line(&line) {
                    return Ok(outcome);
                }
            }
        }
    }
}
