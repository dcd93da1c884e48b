//! Terminal side of the pipeline: prompts (dialoguer) and progress bars (indicatif).

use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use nsdl_core::fetch::{CorruptAction, IntegrityPolicy};
use nsdl_core::progress::Progress;
use nsdl_core::resolver::ResolvedEntry;
use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

fn to_io(e: dialoguer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

fn interactive() -> bool {
    io::stdin().is_terminal()
}

/// One answer line from `input`, without the line terminator. EOF is an
/// empty answer.
pub fn read_answer(prompt: &str, input: &mut impl BufRead) -> io::Result<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// `y`/`yes` in any case; everything else (including blank) is no.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask for the bearer token. Input is hidden on a terminal and never stored.
pub fn prompt_token() -> io::Result<String> {
    const PROMPT: &str = "nuScenes bearer token (not written to disk)";
    if !interactive() {
        return read_answer(PROMPT, &mut io::stdin().lock());
    }
    Password::new()
        .with_prompt(PROMPT)
        .allow_empty_password(true)
        .interact()
        .map_err(to_io)
}

/// Read the selection line.
pub fn prompt_selection() -> io::Result<String> {
    const PROMPT: &str = "Your choice";
    if !interactive() {
        return read_answer(PROMPT, &mut io::stdin().lock());
    }
    Input::<String>::new()
        .with_prompt(PROMPT)
        .allow_empty(true)
        .interact_text()
        .map_err(to_io)
}

fn confirm(prompt: &str) -> io::Result<bool> {
    if !interactive() {
        return read_answer(&format!("{} [y/N]", prompt), &mut io::stdin().lock()).map(|a| is_yes(&a));
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(to_io)
}

/// What to do with corrupt files that are already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OnCorrupt {
    /// Ask for each corrupt file.
    Ask,
    /// Keep the corrupt file and move on.
    Skip,
    /// Delete and download again without asking.
    Redownload,
}

impl IntegrityPolicy for OnCorrupt {
    fn on_corrupt(&mut self, entry: &ResolvedEntry, path: &Path) -> CorruptAction {
        println!("{}: checksum mismatch, {} is corrupt", entry.filename, path.display());
        match self {
            OnCorrupt::Skip => CorruptAction::Skip,
            OnCorrupt::Redownload => CorruptAction::Redownload,
            OnCorrupt::Ask => match confirm("Download this file again?") {
                Ok(true) => CorruptAction::Redownload,
                Ok(false) => CorruptAction::Skip,
                Err(e) => {
                    tracing::warn!(error = %e, "confirm prompt failed; keeping file");
                    println!("Cannot ask ({}); keeping the existing file.", e);
                    CorruptAction::Skip
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BarKind {
    Files,
    Bytes,
}

/// `Progress` rendered as one indicatif bar per unit of work.
pub struct BarProgress {
    kind: BarKind,
    bar: RefCell<Option<ProgressBar>>,
}

impl BarProgress {
    /// Counts items (the probe loop).
    pub fn files() -> Self {
        Self {
            kind: BarKind::Files,
            bar: RefCell::new(None),
        }
    }

    /// Counts bytes (downloads and checksums).
    pub fn bytes() -> Self {
        Self {
            kind: BarKind::Bytes,
            bar: RefCell::new(None),
        }
    }

    /// Print a line above the active bar, or plainly when none is active.
    pub fn println(&self, line: impl AsRef<str>) {
        match &*self.bar.borrow() {
            Some(bar) => bar.println(line.as_ref()),
            None => println!("{}", line.as_ref()),
        }
    }

    fn style(&self, known_total: bool) -> ProgressStyle {
        let template = match (self.kind, known_total) {
            (BarKind::Files, _) => "{msg} [{bar:40.cyan/blue}] {pos}/{len} files",
            (BarKind::Bytes, true) => {
                "{msg:<28} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} ETA {eta}"
            }
            (BarKind::Bytes, false) => "{spinner:.cyan} {msg:<28} {bytes} @ {bytes_per_sec}",
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-")
    }
}

impl Progress for BarProgress {
    fn begin(&self, label: &str, total: Option<u64>) {
        let bar = match total {
            Some(n) => ProgressBar::new(n),
            None => ProgressBar::new_spinner(),
        };
        bar.set_style(self.style(total.is_some()));
        bar.set_message(label.to_string());
        if let Some(old) = self.bar.borrow_mut().replace(bar) {
            old.finish_and_clear();
        }
    }

    fn advance(&self, delta: u64) {
        if let Some(bar) = &*self.bar.borrow() {
            bar.inc(delta);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.borrow_mut().take() {
            bar.finish();
        }
    }
}
