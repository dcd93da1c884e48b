//! Stage 1: turn catalog entries into signed download URLs.
//!
//! Each archive is probed independently against the archive API; failures are
//! reported per file and never stop the batch.

use crate::catalog::FileSpec;
use crate::config::Settings;
use crate::error::ResolveError;
use crate::http::Transport;
use crate::progress::Progress;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Total timeout for one signed-URL request.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Project name sent with every signed-URL request.
pub const PROJECT: &str = "nuScenes";

/// A catalog archive with its signed URL and target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub filename: &'static str,
    pub expected_md5: &'static str,
    pub signed_url: String,
    pub local_path: PathBuf,
}

impl ResolvedEntry {
    pub fn new(spec: &'static FileSpec, signed_url: String, output_dir: &Path) -> Self {
        Self {
            filename: spec.filename,
            expected_md5: spec.expected_md5,
            signed_url,
            local_path: output_dir.join(spec.filename),
        }
    }
}

/// Successfully resolved archives, in resolution (catalog) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSet {
    entries: Vec<ResolvedEntry>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; a second entry for the same filename replaces the first
    /// in place.
    pub fn insert(&mut self, entry: ResolvedEntry) {
        match self.entries.iter_mut().find(|e| e.filename == entry.filename) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, filename: &str) -> Option<&ResolvedEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.entries.iter()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.filename.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlBody {
    url: Option<String>,
}

/// `{api_base}/archives/v1.0/{filename}?region={region}&project=nuScenes`
pub fn endpoint_url(api_base: &str, filename: &str, region: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(api_base)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push("archives")
        .push("v1.0")
        .push(filename);
    url.query_pairs_mut()
        .append_pair("region", region)
        .append_pair("project", PROJECT);
    Ok(url)
}

/// Request a signed URL for one archive.
pub fn resolve_one(
    transport: &dyn Transport,
    settings: &Settings,
    spec: &'static FileSpec,
) -> Result<ResolvedEntry, ResolveError> {
    let url = endpoint_url(&settings.api_base, spec.filename, &settings.region)?;
    let auth = format!("Bearer {}", settings.credential);
    let headers = [
        ("Authorization", auth.as_str()),
        ("Content-Type", "application/json"),
    ];

    let resp = transport.get(url.as_str(), &headers, RESOLVE_TIMEOUT)?;
    match resp.status {
        200 => {
            let signed = serde_json::from_slice::<SignedUrlBody>(&resp.body)
                .ok()
                .and_then(|b| b.url)
                .ok_or(ResolveError::MissingUrl)?;
            Ok(ResolvedEntry::new(spec, signed, &settings.output_dir))
        }
        401 | 403 => Err(ResolveError::Unauthorized {
            status: resp.status,
        }),
        status => Err(ResolveError::Http { status }),
    }
}

/// Probe every spec in order and collect the successes.
///
/// `on_result` sees each outcome as soon as it is known, so the caller can
/// surface failures while the probe is still running.
pub fn resolve_all<F>(
    transport: &dyn Transport,
    settings: &Settings,
    specs: &'static [FileSpec],
    progress: &dyn Progress,
    mut on_result: F,
) -> ResolvedSet
where
    F: FnMut(&FileSpec, &Result<ResolvedEntry, ResolveError>),
{
    tracing::info!(region = %settings.region, count = specs.len(), "probing archive api");
    progress.begin("resolving download links", Some(specs.len() as u64));

    let mut resolved = ResolvedSet::new();
    for spec in specs {
        let result = resolve_one(transport, settings, spec);
        match &result {
            Ok(_) => tracing::debug!(file = spec.filename, "signed url issued"),
            Err(e) => tracing::warn!(file = spec.filename, error = %e, "resolution failed"),
        }
        on_result(spec, &result);
        if let Ok(entry) = result {
            resolved.insert(entry);
        }
        progress.advance(1);
    }
    progress.finish();

    tracing::info!(resolved = resolved.len(), total = specs.len(), "probe finished");
    resolved
}
