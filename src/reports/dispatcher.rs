use std::io::{BufRead, Write};

use tracing::{error, info};

use crate::error::Result;
use crate::render::RenderSink;
use crate::storage::SqliteStore;

use super::{engine, report_by_id, CATALOG};

/// Dispatcher states. There is no resting "running" state to observe from
/// outside; a report runs to completion within one `handle` round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuState {
    AwaitingSelection,
    Terminated,
}

/// A parsed menu selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    Report(u8),
    Exit,
    Invalid,
}

/// Menu id of the exit entry, one past the last report.
pub fn exit_id() -> u8 {
    CATALOG.len() as u8 + 1
}

impl Selection {
    /// Maps one input line to a selection.
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<u8>() {
            Ok(id) if id == exit_id() => Selection::Exit,
            Ok(id) if report_by_id(id).is_some() => Selection::Report(id),
            _ => Selection::Invalid,
        }
    }
}

/// What the menu loop should do next for a given selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Run(u8),
    Reprompt,
    Quit,
}

/// Finite-state selection dispatcher, decoupled from any transport.
#[derive(Debug)]
pub struct Dispatcher {
    state: MenuState,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            state: MenuState::AwaitingSelection,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    /// Advances the state machine by one selection. Invalid selections
    /// leave the state untouched; only the exit selection terminates.
    pub fn handle(&mut self, selection: Selection) -> Action {
        match (self.state, selection) {
            (MenuState::Terminated, _) => Action::Quit,
            (_, Selection::Exit) => {
                self.state = MenuState::Terminated;
                Action::Quit
            }
            (_, Selection::Report(id)) => Action::Run(id),
            (_, Selection::Invalid) => Action::Reprompt,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn write_menu(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "\n===== Prescription Analytics =====")?;
    for spec in CATALOG.iter() {
        writeln!(out, "{}. {}", spec.id, spec.menu_label)?;
    }
    writeln!(out, "{}. Exit", exit_id())?;
    write!(out, "\nEnter your choice (1-{}): ", exit_id())?;
    out.flush()
}

/// Drives the dispatcher against arbitrary input/output transports until
/// the exit selection or input runs out. Each selected report's series is
/// forwarded to the sink with the report's chart style; a failing report
/// aborts only its own invocation. Returns the ids of the reports invoked.
pub fn run_menu<I, O, S>(
    store: &SqliteStore,
    sink: &mut S,
    input: I,
    out: &mut O,
) -> Result<Vec<u8>>
where
    I: BufRead,
    O: Write,
    S: RenderSink,
{
    let mut dispatcher = Dispatcher::new();
    let mut invoked = Vec::new();
    let mut lines = input.lines();

    while dispatcher.state() == MenuState::AwaitingSelection {
        write_menu(out)?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        match dispatcher.handle(Selection::parse(&line)) {
            Action::Run(id) => {
                let Some(spec) = report_by_id(id) else { continue };
                invoked.push(id);
                info!(report = spec.style.name, "report selected");
                match engine::run_report(spec, store) {
                    Ok(series) => {
                        if let Err(err) = sink.render(&series, &spec.style) {
                            error!(report = spec.style.name, error = %err, "render failed");
                            writeln!(out, "Report failed: {err}")?;
                        }
                    }
                    Err(err) => {
                        error!(report = spec.style.name, error = %err, "report failed");
                        writeln!(out, "Report failed: {err}")?;
                    }
                }
            }
            Action::Reprompt => {
                writeln!(out, "Invalid choice! Please try again.")?;
            }
            Action::Quit => {
                writeln!(out, "Exiting...")?;
            }
        }
    }
    Ok(invoked)
}
