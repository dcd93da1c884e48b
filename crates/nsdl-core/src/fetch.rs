//! Stage 3: download selected archives and verify their MD5.
//!
//! Files already on disk are checksummed first and only fetched again when
//! corrupt and the `IntegrityPolicy` asks for it. Every failure is scoped to
//! its file; the loop always moves on to the next selection.

use crate::checksum;
use crate::error::{FetchError, TransportError};
use crate::http::{BodySink, ResponseHead, Transport};
use crate::progress::Progress;
use crate::resolver::{ResolvedEntry, ResolvedSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Media type the storage backend uses when it serves an uncompressed tar.
pub const TAR_MIME: &str = "application/x-tar";

/// What to do with a pre-existing file whose checksum does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptAction {
    Redownload,
    Skip,
}

/// Decides how to handle a corrupt pre-existing archive.
pub trait IntegrityPolicy {
    fn on_corrupt(&mut self, entry: &ResolvedEntry, path: &Path) -> CorruptAction;
}

impl<F> IntegrityPolicy for F
where
    F: FnMut(&ResolvedEntry, &Path) -> CorruptAction,
{
    fn on_corrupt(&mut self, entry: &ResolvedEntry, path: &Path) -> CorruptAction {
        self(entry, path)
    }
}

/// Keep corrupt files as they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSkip;

impl IntegrityPolicy for AlwaysSkip {
    fn on_corrupt(&mut self, _entry: &ResolvedEntry, _path: &Path) -> CorruptAction {
        CorruptAction::Skip
    }
}

/// Replace corrupt files without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRedownload;

impl IntegrityPolicy for AlwaysRedownload {
    fn on_corrupt(&mut self, _entry: &ResolvedEntry, _path: &Path) -> CorruptAction {
        CorruptAction::Redownload
    }
}

/// Final state of one selected archive.
#[derive(Debug)]
pub enum Outcome {
    /// Already on disk with the expected checksum; not downloaded.
    AlreadyValid { path: PathBuf },
    /// Already on disk, corrupt, and kept because the policy said skip.
    CorruptKept { path: PathBuf },
    /// Downloaded and verified.
    Downloaded { path: PathBuf },
    /// Downloaded but the checksum does not match. Not retried.
    DownloadCorrupt { path: PathBuf },
    Failed(FetchError),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::AlreadyValid { .. } | Outcome::Downloaded { .. })
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub filename: String,
    pub outcome: Outcome,
}

/// Progress notifications emitted while the stage runs.
#[derive(Debug)]
pub enum FetchEvent<'a> {
    /// A copy already exists at `path` and is being checksummed.
    Existing { filename: &'a str, path: &'a Path },
    /// Download of `filename` is starting.
    Downloading { filename: &'a str },
    /// `filename` is finished.
    Done(&'a FileReport),
}

/// Counts of outcomes over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub already_valid: usize,
    pub downloaded: usize,
    pub corrupt: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut s = Summary::default();
        for r in reports {
            match r.outcome {
                Outcome::AlreadyValid { .. } => s.already_valid += 1,
                Outcome::Downloaded { .. } => s.downloaded += 1,
                Outcome::DownloadCorrupt { .. } => s.corrupt += 1,
                Outcome::CorruptKept { .. } => s.skipped += 1,
                Outcome::Failed(_) => s.failed += 1,
            }
        }
        s
    }
}

/// Path the body is written to. A `.tgz` target served as an uncompressed tar
/// is stored with a `.tar` extension instead.
pub fn archive_path_for(target: &Path, head: &ResponseHead) -> PathBuf {
    let is_tar = head.mime_type().as_deref() == Some(TAR_MIME);
    if is_tar && has_extension(target, "tgz") {
        target.with_extension("tar")
    } else {
        target.to_path_buf()
    }
}

/// Existing copy of an archive: the target itself or its `.tar` variant.
pub fn existing_copy(target: &Path) -> Option<PathBuf> {
    if target.is_file() {
        return Some(target.to_path_buf());
    }
    if has_extension(target, "tgz") {
        let tar = target.with_extension("tar");
        if tar.is_file() {
            return Some(tar);
        }
    }
    None
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().map(|e| e == ext).unwrap_or(false)
}

/// Streams a response body into the archive file, created lazily once the
/// response head is known.
struct ArchiveSink<'a> {
    target: &'a Path,
    label: &'a str,
    progress: &'a dyn Progress,
    path: Option<PathBuf>,
    file: Option<BufWriter<File>>,
}

impl<'a> ArchiveSink<'a> {
    fn new(target: &'a Path, label: &'a str, progress: &'a dyn Progress) -> Self {
        Self {
            target,
            label,
            progress,
            path: None,
            file: None,
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.path.is_some() {
            self.progress.finish();
        }
        match self.file.take() {
            Some(mut f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl BodySink for ArchiveSink<'_> {
    fn open(&mut self, head: &ResponseHead) -> io::Result<()> {
        let path = archive_path_for(self.target, head);
        if path != self.target {
            tracing::info!(
                from = %self.target.display(),
                to = %path.display(),
                "server sent an uncompressed tar; saving with .tar extension"
            );
        }
        let file = File::create(&path);
        self.path = Some(path);
        self.file = Some(BufWriter::new(file?));
        self.progress.begin(self.label, head.content_length);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "write before open"))?;
        file.write_all(chunk)?;
        self.progress.advance(chunk.len() as u64);
        Ok(())
    }
}

/// Runs the fetch-and-verify stage.
pub struct Fetcher<'a, P> {
    transport: &'a dyn Transport,
    progress: &'a dyn Progress,
    policy: P,
}

impl<'a, P: IntegrityPolicy> Fetcher<'a, P> {
    pub fn new(transport: &'a dyn Transport, progress: &'a dyn Progress, policy: P) -> Self {
        Self {
            transport,
            progress,
            policy,
        }
    }

    /// Process `selected` in order. Names missing from `resolved` are reported
    /// as failed.
    pub fn run<F>(
        &mut self,
        selected: &[String],
        resolved: &ResolvedSet,
        mut on_event: F,
    ) -> Vec<FileReport>
    where
        F: FnMut(FetchEvent<'_>),
    {
        let mut reports = Vec::with_capacity(selected.len());
        for name in selected {
            let outcome = match resolved.get(name) {
                Some(entry) => self.fetch_one(entry, &mut on_event),
                None => Outcome::Failed(FetchError::NotResolved(name.clone())),
            };
            if let Outcome::Failed(e) = &outcome {
                tracing::warn!(file = %name, error = %e, "archive failed");
            }
            let report = FileReport {
                filename: name.clone(),
                outcome,
            };
            on_event(FetchEvent::Done(&report));
            reports.push(report);
        }
        reports
    }

    /// Check, download if needed, and verify one archive.
    pub fn fetch_one<F>(&mut self, entry: &ResolvedEntry, on_event: &mut F) -> Outcome
    where
        F: FnMut(FetchEvent<'_>),
    {
        if let Some(dir) = entry.local_path.parent() {
            if !dir.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(dir) {
                    return Outcome::Failed(FetchError::io(dir, e));
                }
            }
        }

        if let Some(existing) = existing_copy(&entry.local_path) {
            on_event(FetchEvent::Existing {
                filename: entry.filename,
                path: &existing,
            });
            match self.verify(&existing, entry.expected_md5) {
                Ok(true) => {
                    tracing::info!(file = entry.filename, "existing copy verified; skipping download");
                    return Outcome::AlreadyValid { path: existing };
                }
                Ok(false) => {
                    tracing::warn!(file = entry.filename, path = %existing.display(), "existing copy is corrupt");
                    match self.policy.on_corrupt(entry, &existing) {
                        CorruptAction::Skip => return Outcome::CorruptKept { path: existing },
                        CorruptAction::Redownload => {
                            if let Err(e) = fs::remove_file(&existing) {
                                return Outcome::Failed(FetchError::io(&existing, e));
                            }
                        }
                    }
                }
                Err(e) => return Outcome::Failed(e),
            }
        }

        on_event(FetchEvent::Downloading {
            filename: entry.filename,
        });
        let path = match self.download(entry) {
            Ok(path) => path,
            Err(e) => return Outcome::Failed(e),
        };

        match self.verify(&path, entry.expected_md5) {
            Ok(true) => {
                tracing::info!(file = entry.filename, path = %path.display(), "downloaded and verified");
                Outcome::Downloaded { path }
            }
            Ok(false) => {
                tracing::warn!(file = entry.filename, path = %path.display(), "checksum mismatch after download");
                Outcome::DownloadCorrupt { path }
            }
            Err(e) => Outcome::Failed(e),
        }
    }

    fn verify(&self, path: &Path, expected_md5: &str) -> Result<bool, FetchError> {
        checksum::verify_md5(path, expected_md5, self.progress).map_err(|e| {
            let source = e
                .downcast::<io::Error>()
                .unwrap_or_else(|e| io::Error::new(io::ErrorKind::Other, format!("{:#}", e)));
            FetchError::io(path, source)
        })
    }

    /// Stream the signed URL to disk and return the path actually written.
    fn download(&self, entry: &ResolvedEntry) -> Result<PathBuf, FetchError> {
        tracing::info!(file = entry.filename, "downloading");
        let mut sink = ArchiveSink::new(&entry.local_path, entry.filename, self.progress);
        let result = self.transport.download(&entry.signed_url, &mut sink);
        let flushed = sink.finish();
        let written = sink.path.take();

        let head = match result {
            Ok(head) => head,
            Err(e) => {
                if let Some(partial) = &written {
                    if fs::remove_file(partial).is_ok() {
                        tracing::debug!(path = %partial.display(), "removed partial download");
                    }
                }
                return Err(match e {
                    TransportError::Sink(source) => {
                        FetchError::io(written.as_deref().unwrap_or(entry.local_path.as_path()), source)
                    }
                    other => FetchError::Transport(other),
                });
            }
        };
        if !head.is_success() {
            return Err(FetchError::Http {
                status: head.status,
            });
        }
        let path = written.unwrap_or_else(|| archive_path_for(&entry.local_path, &head));
        flushed.map_err(|e| FetchError::io(&path, e))?;
        Ok(path)
    }
}
