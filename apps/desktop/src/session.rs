//! A headless dashboard session: the same store the GUI uses, driven from the
//! terminal and rendered as plain log lines.

use std::time::Duration;

use anyhow::{bail, Result};
use client_core::{
    logs::LogEntry, Command, CommandDispatcher, CommandOutcome, DashboardState, TransportEvent,
};
use tokio::{
    sync::{broadcast, mpsc},
    time::Instant,
};

enum Step {
    Transport(TransportEvent),
    Outcome(CommandOutcome),
    Lagged(u64),
    Closed,
}

/// Prints visible log rows that appeared since the last flush.
#[derive(Debug, Default)]
pub struct LogPrinter {
    next_seq: u64,
}

impl LogPrinter {
    pub fn format(entry: &LogEntry) -> String {
        format!("[{}] {:<7} {}", entry.timestamp, entry.level, entry.message)
    }

    pub fn pending(&mut self, state: &DashboardState) -> Vec<String> {
        let logs = state.logs();
        let lines = logs
            .visible_since(self.next_seq)
            .map(Self::format)
            .collect();
        self.next_seq = logs.next_seq();
        lines
    }

    pub fn flush(&mut self, state: &DashboardState) {
        for line in self.pending(state) {
            println!("{line}");
        }
    }
}

pub struct Session {
    pub state: DashboardState,
    dispatcher: CommandDispatcher,
    events: broadcast::Receiver<TransportEvent>,
    outcomes: mpsc::UnboundedReceiver<CommandOutcome>,
    printer: LogPrinter,
}

impl Session {
    pub fn new(
        state: DashboardState,
        dispatcher: CommandDispatcher,
        events: broadcast::Receiver<TransportEvent>,
        outcomes: mpsc::UnboundedReceiver<CommandOutcome>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            events,
            outcomes,
            printer: LogPrinter::default(),
        }
    }

    async fn next_step(&mut self) -> Step {
        tokio::select! {
            event = self.events.recv() => match event {
                Ok(event) => Step::Transport(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => Step::Lagged(skipped),
                Err(broadcast::error::RecvError::Closed) => Step::Closed,
            },
            outcome = self.outcomes.recv() => match outcome {
                Some(outcome) => Step::Outcome(outcome),
                None => Step::Closed,
            },
        }
    }

    /// Applies one step. Returns `false` once the session cannot make progress.
    fn apply(&mut self, step: Step) -> bool {
        let alive = match step {
            Step::Transport(event) => {
                let gave_up = matches!(event, TransportEvent::GaveUp { .. });
                self.state.apply_transport(event);
                !gave_up
            }
            Step::Outcome(outcome) => {
                self.state.apply_outcome(outcome);
                true
            }
            Step::Lagged(skipped) => {
                tracing::warn!(skipped, "terminal fell behind realtime events");
                true
            }
            Step::Closed => false,
        };
        self.printer.flush(&self.state);
        alive
    }

    pub fn dispatch(&mut self, command: Command) {
        self.state.note_dispatched(&command);
        self.printer.flush(&self.state);
        self.dispatcher.dispatch(command);
    }

    /// Processes events for `window`, so the roster and initial configuration
    /// arrive before a one-shot command is built.
    pub async fn settle(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        while let Ok(step) = tokio::time::timeout_at(deadline, self.next_step()).await {
            if !self.apply(step) {
                return;
            }
        }
    }

    /// Dispatches `command` and waits for its outcome.
    pub async fn run(&mut self, command: Command) -> Result<()> {
        let kind = command.kind();
        self.dispatch(command);
        loop {
            match self.next_step().await {
                Step::Outcome(outcome) if outcome.kind == kind => {
                    let result = outcome.result.clone();
                    self.apply(Step::Outcome(outcome));
                    if let Some(alert) = self.state.dismiss_alert() {
                        println!("{}", alert.message);
                    }
                    return match result {
                        Ok(_) => Ok(()),
                        Err(err) => bail!("{} failed: {err}", kind.name()),
                    };
                }
                step => {
                    if !self.apply(step) {
                        bail!("{} did not complete: realtime channel is gone", kind.name());
                    }
                }
            }
        }
    }

    /// Streams the dashboard log until interrupted or the channel gives up.
    pub async fn monitor(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                step = self.next_step() => {
                    if !self.apply(step) {
                        bail!("realtime channel closed");
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    return Ok(());
                }
            }
        }
    }
}
