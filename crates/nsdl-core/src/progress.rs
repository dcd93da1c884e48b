//! Progress reporting for probing, downloading and checksumming.
//!
//! Core stages only talk to this trait; the CLI renders it with progress
//! bars, tests use `Silent` or a recorder.

/// Receiver of progress updates for one unit of work at a time.
///
/// `begin` starts a new unit (a file being hashed, a body being streamed, the
/// probe loop). `total` is `None` when the size is unknown (no Content-Length).
pub trait Progress {
    fn begin(&self, label: &str, total: Option<u64>);
    fn advance(&self, delta: u64);
    fn finish(&self);
}

/// Discards all progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Progress for Silent {
    fn begin(&self, _label: &str, _total: Option<u64>) {}
    fn advance(&self, _delta: u64) {}
    fn finish(&self) {}
}
