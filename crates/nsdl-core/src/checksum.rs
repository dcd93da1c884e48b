//! Checksum computation for archives on disk.
//!
//! Digests are always recomputed from the file after a download completes,
//! never inline with the transfer.

use crate::progress::Progress;
use anyhow::{Context, Result};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Hash a file with digest `D` and return lowercase hex.
/// Reads in fixed-size chunks and reports bytes read to `progress`.
pub fn digest_path<D: Digest>(path: &Path, progress: &dyn Progress) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let total = f.metadata().map(|m| m.len()).ok();
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    progress.begin(&label, total);

    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        progress.advance(n as u64);
    }
    progress.finish();
    Ok(hex::encode(hasher.finalize()))
}

/// MD5 of a file as lowercase hex.
pub fn md5_path(path: &Path, progress: &dyn Progress) -> Result<String> {
    digest_path::<Md5>(path, progress)
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_path(path: &Path, progress: &dyn Progress) -> Result<String> {
    digest_path::<Sha256>(path, progress)
}

/// True if the file's MD5 equals `expected_md5` (hex, case-insensitive).
pub fn verify_md5(path: &Path, expected_md5: &str, progress: &dyn Progress) -> Result<bool> {
    let actual = md5_path(path, progress)?;
    tracing::debug!(path = %path.display(), %actual, expected = expected_md5, "md5 computed");
    Ok(actual.eq_ignore_ascii_case(expected_md5.trim()))
}
