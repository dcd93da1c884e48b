//! Fetch command: resolve download links, choose archives, download and verify.

use anyhow::{Context as _, Result};
use nsdl_core::catalog::CATALOG;
use nsdl_core::config::Settings;
use nsdl_core::fetch::{FetchEvent, Fetcher, IntegrityPolicy, Outcome, Summary};
use nsdl_core::http::{CurlTransport, Transport};
use nsdl_core::resolver::{self, ResolvedSet};
use nsdl_core::selection::{self, Selection};
use std::io;

use crate::cli::terminal::{self, BarProgress, OnCorrupt};
use crate::cli::Context;

/// Source of the operator's answers.
pub trait Operator {
    /// Bearer token, asked only when no other source has one.
    fn token(&mut self) -> io::Result<String>;
    /// Selection line for a non-empty resolved set.
    fn selection(&mut self, resolved: &ResolvedSet) -> io::Result<String>;
}

/// Terminal prompts, or a selection given up front with `--select`.
struct Prompts<'a> {
    preset: Option<&'a str>,
}

impl Operator for Prompts<'_> {
    fn token(&mut self) -> io::Result<String> {
        terminal::prompt_token()
    }

    fn selection(&mut self, resolved: &ResolvedSet) -> io::Result<String> {
        if let Some(line) = self.preset {
            return Ok(line.to_string());
        }
        println!("{:<5} | {:<28} | local", "index", "filename");
        for row in selection::menu_rows(resolved) {
            println!("{:<5} | {:<28} | {}", row.index, row.filename, row.status);
        }
        println!("Enter indices separated by spaces, `all` for everything, or `q` to quit.");
        terminal::prompt_selection()
    }
}

pub fn run_fetch(ctx: &Context, select: Option<&str>, on_corrupt: OnCorrupt) -> Result<()> {
    fetch_with(
        &CurlTransport::new(),
        ctx,
        |key| std::env::var(key).ok(),
        &mut Prompts { preset: select },
        on_corrupt,
    )
}

/// Run all three stages. Per-file failures are reported, not returned; only
/// configuration problems make this fail.
pub fn fetch_with<E, P>(
    transport: &dyn Transport,
    ctx: &Context,
    env: E,
    operator: &mut dyn Operator,
    policy: P,
) -> Result<()>
where
    E: Fn(&str) -> Option<String>,
    P: IntegrityPolicy,
{
    let settings = Settings::resolve(env, &ctx.stored, &ctx.overrides, || operator.token())
        .context("cannot start without a bearer token")?;
    tracing::info!(?settings, "settings resolved");

    println!("Step 1/3: resolving download links ({} region)", settings.region);
    let resolved = resolve(transport, &settings);
    println!("Resolved {}/{} archives.", resolved.len(), CATALOG.len());

    println!("Step 2/3: choosing archives");
    let selection = match selection::select(&resolved, || operator.selection(&resolved)) {
        Ok(selection) => selection,
        Err(e) => {
            tracing::warn!(error = %e, "could not read selection");
            println!("[WARN] could not read your choice ({}); nothing selected.", e);
            return Ok(());
        }
    };
    let selected = match &selection {
        Selection::NothingAvailable => {
            println!("No files available to download.");
            return Ok(());
        }
        Selection::Quit => {
            println!("Quit; nothing downloaded.");
            return Ok(());
        }
        Selection::Invalid { token } => {
            println!("Invalid input {:?}: enter indices separated by spaces, `all` or `q`.", token);
            return Ok(());
        }
        Selection::Chosen { filenames, skipped } => {
            for token in skipped {
                println!("[WARN] index {} is out of range; skipped", token);
            }
            filenames
        }
    };
    if selected.is_empty() {
        println!("Nothing selected.");
        return Ok(());
    }

    println!("Step 3/3: downloading and verifying {} archive(s)", selected.len());
    let progress = BarProgress::bytes();
    let mut fetcher = Fetcher::new(transport, &progress, policy);
    let reports = fetcher.run(selected, &resolved, |event| match event {
        FetchEvent::Existing { filename, path } => {
            progress.println(format!("{}: found {}, checking MD5", filename, path.display()))
        }
        FetchEvent::Downloading { filename } => progress.println(format!("{}: downloading", filename)),
        FetchEvent::Done(report) => progress.println(describe(&report.filename, &report.outcome)),
    });

    let s = Summary::from_reports(&reports);
    println!(
        "Done: {} already valid, {} downloaded, {} corrupt, {} kept corrupt, {} failed",
        s.already_valid, s.downloaded, s.corrupt, s.skipped, s.failed
    );
    tracing::info!(?s, "fetch finished");
    Ok(())
}

fn resolve(transport: &dyn Transport, settings: &Settings) -> ResolvedSet {
    let probe = BarProgress::files();
    resolver::resolve_all(transport, settings, CATALOG, &probe, |spec, result| {
        if let Err(e) = result {
            probe.println(format!("[WARN] {}: {}", spec.filename, e));
        }
    })
}

fn describe(filename: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::AlreadyValid { path } => format!("{}: already present and valid ({})", filename, path.display()),
        Outcome::CorruptKept { path } => format!("{}: corrupt copy kept at {}", filename, path.display()),
        Outcome::Downloaded { path } => format!("{}: downloaded and verified ({})", filename, path.display()),
        Outcome::DownloadCorrupt { path } => format!(
            "[WARN] {}: MD5 mismatch after download ({}); the network may be unstable, try again",
            filename,
            path.display()
        ),
        Outcome::Failed(e) => format!("[ERROR] {}: {}", filename, e),
    }
}
