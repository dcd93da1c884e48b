//! Checksum command: MD5 (or SHA-256) of any file.

use anyhow::Result;
use nsdl_core::checksum;
use std::path::Path;

use crate::cli::terminal::BarProgress;

/// Compute and print the digest of `path`, `md5sum`-style.
pub fn run_checksum(path: &Path, sha256: bool) -> Result<()> {
    let progress = BarProgress::bytes();
    let digest = if sha256 {
        checksum::sha256_path(path, &progress)?
    } else {
        checksum::md5_path(path, &progress)?
    };
    println!("{}  {}", digest, path.display());
    Ok(())
}
