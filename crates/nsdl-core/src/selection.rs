//! Stage 2: let the operator pick which resolved archives to fetch.

use crate::fetch::existing_copy;
use crate::resolver::ResolvedSet;
use std::fmt;
use std::io;
use std::num::IntErrorKind;

/// Whether an archive is already present at its local path (or as `.tar`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStatus {
    Exists,
    Missing,
}

impl fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalStatus::Exists => write!(f, "exists"),
            LocalStatus::Missing => write!(f, "missing"),
        }
    }
}

/// One line of the selection menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuRow {
    pub index: usize,
    pub filename: &'static str,
    pub status: LocalStatus,
}

/// Menu rows for every resolved entry, indexed in resolution order.
pub fn menu_rows(resolved: &ResolvedSet) -> Vec<MenuRow> {
    resolved
        .iter()
        .enumerate()
        .map(|(index, entry)| MenuRow {
            index,
            filename: entry.filename,
            status: if existing_copy(&entry.local_path).is_some() {
                LocalStatus::Exists
            } else {
                LocalStatus::Missing
            },
        })
        .collect()
}

/// Result of interpreting the operator's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Nothing was resolved, so nothing was asked.
    NothingAvailable,
    /// Operator entered `q`.
    Quit,
    /// A token was not an integer; nothing is selected.
    Invalid { token: String },
    /// Filenames to process in order (duplicates kept) and the out-of-range
    /// index tokens that were dropped.
    Chosen {
        filenames: Vec<String>,
        skipped: Vec<String>,
    },
}

impl Selection {
    /// Selected filenames; empty for every variant but `Chosen`.
    pub fn filenames(&self) -> &[String] {
        match self {
            Selection::Chosen { filenames, .. } => filenames,
            _ => &[],
        }
    }
}

/// Interpret one line of operator input against the resolved set.
///
/// `q` quits, `all` picks every entry in order, otherwise the line is a
/// whitespace-separated list of menu indices.
pub fn parse_selection(input: &str, resolved: &ResolvedSet) -> Selection {
    let choice = input.trim().to_lowercase();
    if choice == "q" {
        return Selection::Quit;
    }
    let names = resolved.filenames();
    if choice == "all" {
        return Selection::Chosen {
            filenames: names,
            skipped: Vec::new(),
        };
    }

    let mut filenames = Vec::new();
    let mut skipped = Vec::new();
    for token in choice.split_whitespace() {
        let index = match token.parse::<i64>() {
            Ok(i) => usize::try_from(i).ok(),
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => None,
                _ => {
                    return Selection::Invalid {
                        token: token.to_string(),
                    }
                }
            },
        };
        match index.and_then(|i| names.get(i)) {
            Some(name) => filenames.push(name.clone()),
            None => skipped.push(token.to_string()),
        }
    }
    Selection::Chosen { filenames, skipped }
}

/// Run the selection stage: short-circuits on an empty set, otherwise reads
/// one line with `read_line` and parses it.
pub fn select<R>(resolved: &ResolvedSet, read_line: R) -> io::Result<Selection>
where
    R: FnOnce() -> io::Result<String>,
{
    if resolved.is_empty() {
        return Ok(Selection::NothingAvailable);
    }
    let line = read_line()?;
    let selection = parse_selection(&line, resolved);
    tracing::debug!(?selection, "operator selection");
    Ok(selection)
}
