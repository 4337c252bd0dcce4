// Crash-consistent metadata journaling for VSFS images
pub mod journal;
pub mod vsfs;

pub use journal::{
    AppendReport, BlockWrite, InstallReport, Journal, JournalConfig, JournalHeader, JournalScan,
    JournalStatus, PendingView,
};
pub use vsfs::{create_file, format, list_root, CreatePolicy, CreateReport};
