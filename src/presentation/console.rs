use std::io::{self, Write};

use crate::domain::models::{MessageSeverity, OperationOutcome};

const GREEN: &str = "\x1b[1;32m";
const RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Status banner for terminal output, one line per outcome
pub struct Console<W: Write> {
    out: W,
    ansi_colors: bool,
}

impl Console<io::Stdout> {
    pub fn stdout(ansi_colors: bool) -> Self {
        Self::new(io::stdout(), ansi_colors)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, ansi_colors: bool) -> Self {
        Self { out, ansi_colors }
    }

    pub fn status_banner(&mut self, outcome: &OperationOutcome) -> io::Result<()> {
        let (tag, color) = match outcome.severity() {
            MessageSeverity::Success => ("  OK  ", GREEN),
            MessageSeverity::Error => (" FAIL ", RED),
        };
        let text = if outcome.message.is_empty() {
            "done"
        } else {
            outcome.message.as_str()
        };

        if self.ansi_colors {
            writeln!(self.out, "{}[{}]{} {}", color, tag, RESET, text)
        } else {
            writeln!(self.out, "[{}] {}", tag, text)
        }
    }

    /// Render every outcome and report whether all of them succeeded
    pub fn report(&mut self, outcomes: &[OperationOutcome]) -> io::Result<bool> {
        for outcome in outcomes {
            self.status_banner(outcome)?;
        }
        self.out.flush()?;
        Ok(outcomes.iter().all(|o| o.succeeded))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
