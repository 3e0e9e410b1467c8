//! Choosing among generated candidates.
//!
//! The [`Selector`] is a small state machine. Interactive runs suspend in
//! [`ChoiceInput::request`] until a valid number arrives; invalid input is
//! rejected and requested again without limit.

use std::io::{self, BufRead, Write};

use colored::Colorize;
use serde::Serialize;

use crate::error::SelectionError;
use crate::report::Reporter;
use crate::response::format_detailed;
use crate::validate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    /// Dry runs and machine-readable output: every candidate is returned.
    NonInteractive,
}

/// The chosen artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Message(String),
    Candidates(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    AwaitingGeneration,
    Presenting { candidates: Vec<String> },
    Selected(Selection),
}

/// Source of the user's choice.
pub trait ChoiceInput {
    fn present(&mut self, candidates: &[String]) -> io::Result<()>;

    /// Read one answer for the range `1..=max`. `None` means input is closed.
    fn request(&mut self, max: usize) -> io::Result<Option<String>>;

    fn reject(&mut self, input: &str, max: usize) -> io::Result<()>;
}

pub struct Selector<'r> {
    mode: Mode,
    reporter: &'r dyn Reporter,
    state: State,
}

impl<'r> Selector<'r> {
    pub fn new(mode: Mode, reporter: &'r dyn Reporter) -> Self {
        Self {
            mode,
            reporter,
            state: State::AwaitingGeneration,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Hand over the generated candidates.
    pub fn offer(&mut self, mut candidates: Vec<String>) -> Result<(), SelectionError> {
        if candidates.is_empty() {
            return Err(SelectionError::NoCandidates);
        }

        self.state = if candidates.len() == 1 {
            State::Selected(Selection::Message(candidates.remove(0)))
        } else {
            match self.mode {
                Mode::NonInteractive => State::Selected(Selection::Candidates(candidates)),
                Mode::Interactive => State::Presenting { candidates },
            }
        };
        Ok(())
    }

    /// Apply one answer. Returns false (and stays put) when it is not a
    /// number in range.
    pub fn submit(&mut self, input: &str) -> bool {
        let State::Presenting { candidates } = &self.state else {
            return false;
        };

        match input.trim().parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => {
                let chosen = candidates[n - 1].clone();
                self.state = State::Selected(Selection::Message(chosen));
                true
            }
            _ => false,
        }
    }

    /// Drive the machine to `Selected`, asking `input` as often as needed.
    pub fn run(&mut self, input: &mut dyn ChoiceInput) -> Result<Selection, SelectionError> {
        if let State::Presenting { candidates } = &self.state {
            input.present(candidates)?;
        }

        while let State::Presenting { candidates } = &self.state {
            let max = candidates.len();
            let Some(answer) = input.request(max)? else {
                return Err(SelectionError::InputClosed);
            };
            if !self.submit(&answer) {
                input.reject(answer.trim(), max)?;
            }
        }

        match &self.state {
            State::Selected(selection) => Ok(self.finalize(selection.clone())),
            _ => Err(SelectionError::NoCandidates),
        }
    }

    fn finalize(&self, selection: Selection) -> Selection {
        match selection {
            Selection::Message(message) => {
                let message = format_detailed(&message).unwrap_or(message);
                self.check(&message, None);
                Selection::Message(message)
            }
            Selection::Candidates(candidates) => {
                for (idx, candidate) in candidates.iter().enumerate() {
                    self.check(candidate, Some(idx + 1));
                }
                Selection::Candidates(candidates)
            }
        }
    }

    fn check(&self, message: &str, position: Option<usize>) {
        let result = validate(message);
        if let Some(err) = result.error {
            let which = position
                .map(|n| format!("Candidate {n}"))
                .unwrap_or_else(|| "Commit message".to_string());
            self.reporter
                .warn(&format!("{which} is not a Conventional Commit: {err}"));
        }
    }
}

/// Offer `candidates` and run selection to completion.
pub fn select(
    candidates: Vec<String>,
    mode: Mode,
    input: &mut dyn ChoiceInput,
    reporter: &dyn Reporter,
) -> Result<Selection, SelectionError> {
    let mut selector = Selector::new(mode, reporter);
    selector.offer(candidates)?;
    selector.run(input)
}

/// Reads choices from a line-oriented reader, prompting on a writer.
pub struct TerminalInput<R, W> {
    reader: R,
    writer: W,
}

impl TerminalInput<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalInput<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> ChoiceInput for TerminalInput<R, W> {
    fn present(&mut self, candidates: &[String]) -> io::Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", "Choose a commit message:".bold())?;
        for (idx, candidate) in candidates.iter().enumerate() {
            let mut lines = candidate.lines();
            let header = lines.next().unwrap_or_default();
            writeln!(self.writer, "  {} {header}", format!("{})", idx + 1).cyan())?;
            for line in lines {
                writeln!(self.writer, "     {line}")?;
            }
        }
        Ok(())
    }

    fn request(&mut self, max: usize) -> io::Result<Option<String>> {
        write!(self.writer, "Enter choice [1-{max}]: ")?;
        self.writer.flush()?;

        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim().to_string()))
    }

    fn reject(&mut self, _input: &str, max: usize) -> io::Result<()> {
        writeln!(
            self.writer,
            "Invalid choice. Please enter a number from 1 to {max}."
        )
    }
}
