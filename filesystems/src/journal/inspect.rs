// Journal inspection
// Read-only summary of what install would do

use super::replay::IncompleteRun;
use super::Journal;
use serde::Serialize;
use vsfs_core::{BlockDevice, Result};

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub start_offset: u32,
    pub end_offset: u32,
    pub home_blocks: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalStatus {
    /// The region carries the journal magic
    pub initialized: bool,
    pub used_bytes: u32,
    pub capacity_bytes: usize,
    pub free_bytes: usize,
    pub committed: Vec<TransactionSummary>,
    pub incomplete: Option<IncompleteRun>,
}

impl JournalStatus {
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.incomplete.is_none()
    }
}

impl<D: BlockDevice> Journal<D> {
    /// Describe the journal without initializing or modifying it
    pub fn status(&mut self) -> Result<JournalStatus> {
        let capacity = self.capacity();
        let header = self.read_header()?;

        if !header.is_initialized() {
            return Ok(JournalStatus {
                initialized: false,
                used_bytes: 0,
                capacity_bytes: capacity,
                free_bytes: capacity,
                committed: Vec::new(),
                incomplete: None,
            });
        }

        let scan = self.scan()?;
        let committed = scan
            .committed
            .iter()
            .map(|txn| TransactionSummary {
                start_offset: txn.start_offset,
                end_offset: txn.end_offset,
                home_blocks: txn.home_blocks(),
            })
            .collect();

        Ok(JournalStatus {
            initialized: true,
            used_bytes: scan.used_bytes,
            capacity_bytes: capacity,
            free_bytes: capacity - scan.used_bytes as usize,
            committed,
            incomplete: scan.incomplete,
        })
    }
}
