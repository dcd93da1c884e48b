//! Verify command: MD5-check local archives without touching the network.

use anyhow::{bail, Result};
use nsdl_core::inventory::{self, LocalCheck};

use crate::cli::terminal::BarProgress;
use crate::cli::Context;

/// Check `files` (all catalog archives when empty). Fails if any present copy
/// is corrupt or unreadable.
pub fn run_verify(ctx: &Context, files: &[String]) -> Result<()> {
    let output_dir = ctx.output_dir();
    let specs = inventory::specs_named(files)?;
    let progress = BarProgress::bytes();

    let mut bad = 0usize;
    let mut present = 0usize;
    inventory::verify_local(&output_dir, &specs, &progress, |spec, check| {
        let line = match check {
            LocalCheck::Valid { path } => {
                present += 1;
                format!("OK       {}", path.display())
            }
            LocalCheck::Corrupt { path } => {
                present += 1;
                bad += 1;
                format!("CORRUPT  {}", path.display())
            }
            LocalCheck::Unreadable { path, error } => {
                present += 1;
                bad += 1;
                format!("ERROR    {} ({:#})", path.display(), error)
            }
            LocalCheck::Missing if files.is_empty() => return,
            LocalCheck::Missing => format!("MISSING  {}", spec.filename),
        };
        progress.println(line);
    });

    println!("{} checked, {} bad", present, bad);
    if bad > 0 {
        bail!("{} archive(s) failed verification", bad);
    }
    Ok(())
}
