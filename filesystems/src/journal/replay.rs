// Journal replay ("install")
// Scans [header, used_bytes), replays committed transactions to their home blocks, checkpoints

use super::header::JournalHeader;
use super::record::{DataRecord, RecordHeader, RecordKind, REC_HEADER_SIZE};
use super::region::JournalRegion;
use super::{check_home_block, Journal};
use log::{debug, info, warn};
use serde::Serialize;
use vsfs_core::{BlockDevice, Result, VsfsError};

/// A run of DATA records sealed by a COMMIT
#[derive(Debug, Clone)]
pub struct CommittedTransaction {
    /// Offset of the first DATA record
    pub start_offset: u32,
    /// Offset just past the COMMIT record
    pub end_offset: u32,
    pub records: Vec<DataRecord>,
}

impl CommittedTransaction {
    pub fn home_blocks(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.home_block).collect()
    }
}

/// DATA records left at the end of the scan with no COMMIT after them
#[derive(Debug, Clone, Serialize)]
pub struct IncompleteRun {
    pub start_offset: u32,
    pub records: usize,
}

/// Structural decode of the journal, nothing applied yet
#[derive(Debug, Clone, Default)]
pub struct JournalScan {
    pub used_bytes: u32,
    pub committed: Vec<CommittedTransaction>,
    pub incomplete: Option<IncompleteRun>,
}

impl JournalScan {
    pub fn committed_blocks(&self) -> usize {
        self.committed.iter().map(|t| t.records.len()).sum()
    }
}

/// Outcome of an install pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// The journal held nothing to replay; no scan, no header write
    pub was_empty: bool,
    pub bytes_scanned: u32,
    pub transactions_replayed: usize,
    pub blocks_written: usize,
    pub records_discarded: usize,
}

/// Scan `[JournalHeader::SIZE, used_bytes)` and group records into transactions.
///
/// Every record header is checked against `used_bytes` before its payload is
/// read. Any malformed record fails the whole scan.
pub fn scan_region<D, F>(
    region: &mut JournalRegion<'_, D>,
    used_bytes: u32,
    check_home: F,
) -> Result<JournalScan>
where
    D: BlockDevice + ?Sized,
    F: Fn(u32) -> std::result::Result<(), String>,
{
    let end = used_bytes as usize;
    let mut cursor = JournalHeader::SIZE;
    let mut run_start = cursor;
    let mut pending: Vec<DataRecord> = Vec::new();
    let mut committed = Vec::new();

    while cursor < end {
        if end - cursor < REC_HEADER_SIZE {
            return Err(VsfsError::corrupt(format!(
                "{} trailing bytes at offset {} cannot hold a record header",
                end - cursor,
                cursor
            )));
        }

        let header = RecordHeader::decode(&region.read_at(cursor, REC_HEADER_SIZE)?)?;
        let size = header.size as usize;
        if size > end - cursor {
            return Err(VsfsError::corrupt(format!(
                "record at offset {} declares {} bytes, runs past used_bytes {}",
                cursor, size, end
            )));
        }
        let kind = header.checked_kind().map_err(|e| match e {
            VsfsError::Corrupt(msg) => VsfsError::corrupt(format!("offset {}: {}", cursor, msg)),
            other => other,
        })?;

        match kind {
            RecordKind::Data => {
                let record = DataRecord::decode(&region.read_at(cursor, size)?)?;
                check_home(record.home_block).map_err(|msg| {
                    VsfsError::corrupt(format!("DATA record at offset {}: {}", cursor, msg))
                })?;
                pending.push(record);
            }
            RecordKind::Commit => {
                if pending.is_empty() {
                    debug!("Empty transaction committed at offset {}", cursor);
                }
                committed.push(CommittedTransaction {
                    start_offset: run_start as u32,
                    end_offset: (cursor + size) as u32,
                    records: std::mem::take(&mut pending),
                });
                // The next run begins right after this COMMIT
                run_start = cursor + size;
            }
        }
        cursor += size;
    }

    let incomplete = if pending.is_empty() {
        None
    } else {
        Some(IncompleteRun {
            start_offset: run_start as u32,
            records: pending.len(),
        })
    };

    Ok(JournalScan {
        used_bytes,
        committed,
        incomplete,
    })
}

impl<D: BlockDevice> Journal<D> {
    /// Decode the journal without modifying anything
    pub fn scan(&mut self) -> Result<JournalScan> {
        let header = self.read_valid_header()?;
        self.scan_to(header.used_bytes)
    }

    pub(crate) fn scan_to(&mut self, used_bytes: u32) -> Result<JournalScan> {
        let block_count = self.device.block_count();
        let config = self.config.clone();
        let check_home = move |block: u32| check_home_block(&config, block_count, block);
        scan_region(&mut self.region(), used_bytes, check_home)
    }

    /// Replay every committed transaction, drop any incomplete tail, and
    /// reset the journal to empty.
    ///
    /// The whole journal is decoded before the first home block is written,
    /// so a corrupt record means nothing is replayed and the header is left
    /// as found.
    pub fn install(&mut self) -> Result<InstallReport> {
        self.initialize_if_needed()?;
        let header = self.read_valid_header()?;

        if header.is_empty() {
            info!("Journal empty, nothing to install");
            return Ok(InstallReport {
                was_empty: true,
                ..InstallReport::default()
            });
        }

        info!("Installing journal ({} bytes used)", header.used_bytes);
        let scan = self.scan_to(header.used_bytes)?;

        let mut report = InstallReport {
            was_empty: false,
            bytes_scanned: header.used_bytes - JournalHeader::SIZE as u32,
            ..InstallReport::default()
        };

        for txn in &scan.committed {
            // Append order: a later image of the same block overwrites an earlier one
            for record in &txn.records {
                self.device_mut().write_block(record.home_block, &record.image)?;
                report.blocks_written += 1;
            }
            report.transactions_replayed += 1;
            debug!(
                "Replayed transaction at offset {} -> blocks {:?}",
                txn.start_offset,
                txn.home_blocks()
            );
        }

        if let Some(run) = &scan.incomplete {
            warn!(
                "Discarding {} uncommitted record(s) starting at offset {}",
                run.records, run.start_offset
            );
            report.records_discarded = run.records;
        }

        // Home blocks must be durable before the journal forgets them
        self.sync_if_configured()?;
        self.write_header(&JournalHeader {
            used_bytes: JournalHeader::SIZE as u32,
            ..header
        })?;
        self.sync_if_configured()?;

        info!(
            "Checkpointed journal: {} transaction(s), {} block(s) installed",
            report.transactions_replayed, report.blocks_written
        );
        Ok(report)
    }
}
