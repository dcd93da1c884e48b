//! CLI command handlers, one per file.

mod checksum;
mod completions;
mod fetch;
mod list;
mod verify;

pub use checksum::run_checksum;
pub use completions::run_completions;
pub use fetch::run_fetch;
pub use list::run_list;
pub use verify::run_verify;
