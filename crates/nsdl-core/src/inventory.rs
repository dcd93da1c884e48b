//! Offline view of the output directory: which catalog archives are present
//! and whether their checksums hold. No network access.

use crate::catalog::{self, FileSpec, CATALOG};
use crate::checksum;
use crate::fetch::existing_copy;
use crate::progress::Progress;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Presence of one catalog archive in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub index: usize,
    pub spec: &'static FileSpec,
    /// Existing copy (`.tgz`, or the `.tar` variant), if any.
    pub present: Option<PathBuf>,
}

/// Every catalog archive with its local presence in `output_dir`.
pub fn inventory(output_dir: &Path) -> Vec<InventoryRow> {
    CATALOG
        .iter()
        .enumerate()
        .map(|(index, spec)| InventoryRow {
            index,
            spec,
            present: existing_copy(&output_dir.join(spec.filename)),
        })
        .collect()
}

/// Result of checking one local archive.
#[derive(Debug)]
pub enum LocalCheck {
    Valid { path: PathBuf },
    Corrupt { path: PathBuf },
    Missing,
    Unreadable { path: PathBuf, error: anyhow::Error },
}

/// Resolve operator-supplied names against the catalog; empty means all.
pub fn specs_named(names: &[String]) -> Result<Vec<&'static FileSpec>> {
    if names.is_empty() {
        return Ok(CATALOG.iter().collect());
    }
    let mut specs = Vec::with_capacity(names.len());
    for name in names {
        match catalog::find(name) {
            Some(spec) => specs.push(spec),
            None => bail!("{} is not a known archive (see `nsdl list`)", name),
        }
    }
    Ok(specs)
}

/// MD5-check the given archives in `output_dir`.
pub fn verify_local(
    output_dir: &Path,
    specs: &[&'static FileSpec],
    progress: &dyn Progress,
    mut on_result: impl FnMut(&FileSpec, &LocalCheck),
) -> Vec<(&'static FileSpec, LocalCheck)> {
    let mut out = Vec::with_capacity(specs.len());
    for &spec in specs {
        let check = match existing_copy(&output_dir.join(spec.filename)) {
            None => LocalCheck::Missing,
            Some(path) => match checksum::verify_md5(&path, spec.expected_md5, progress) {
                Ok(true) => LocalCheck::Valid { path },
                Ok(false) => LocalCheck::Corrupt { path },
                Err(error) => LocalCheck::Unreadable { path, error },
            },
        };
        on_result(spec, &check);
        out.push((spec, check));
    }
    out
}
