// Transaction writer
// Appends DATA records and a COMMIT, then publishes them with a single header write

use super::header::JournalHeader;
use super::record::{DataRecord, Record};
use super::region::JournalRegion;
use super::{check_home_block, Journal};
use log::{debug, info, warn};
use serde::Serialize;
use vsfs_core::layout::BLOCK_SIZE;
use vsfs_core::{BlockDevice, Result, VsfsError};

/// New image for one home block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWrite {
    pub home_block: u32,
    pub image: Vec<u8>,
}

impl BlockWrite {
    pub fn new(home_block: u32, image: Vec<u8>) -> Self {
        Self { home_block, image }
    }
}

impl From<(u32, Vec<u8>)> for BlockWrite {
    fn from((home_block, image): (u32, Vec<u8>)) -> Self {
        Self { home_block, image }
    }
}

/// Outcome of a journaled transaction
#[derive(Debug, Clone, Serialize)]
pub struct AppendReport {
    pub data_records: usize,
    /// Offset of the first record of this transaction
    pub start_offset: u32,
    /// `used_bytes` as published in the header
    pub used_bytes: u32,
}

impl AppendReport {
    pub fn bytes_appended(&self) -> u32 {
        self.used_bytes - self.start_offset
    }
}

/// Append one DATA record at `cursor` and return the advanced cursor
pub fn append_data_record<D: BlockDevice + ?Sized>(
    region: &mut JournalRegion<'_, D>,
    cursor: u32,
    home_block: u32,
    image: &[u8],
) -> Result<u32> {
    let bytes = Record::Data(DataRecord {
        home_block,
        image: image.to_vec(),
    })
    .encode()?;
    region.append(cursor, &bytes)
}

/// Append the COMMIT record sealing the run before `cursor`
pub fn append_commit_record<D: BlockDevice + ?Sized>(
    region: &mut JournalRegion<'_, D>,
    cursor: u32,
) -> Result<u32> {
    region.append(cursor, &Record::Commit.encode()?)
}

impl<D: BlockDevice> Journal<D> {
    /// Journal one transaction.
    ///
    /// Home blocks are never written here. The header publishes the new
    /// `used_bytes` only after every record is in place; if anything fails
    /// before that the journal is unchanged as far as replay is concerned.
    pub fn append_transaction(&mut self, writes: &[BlockWrite]) -> Result<AppendReport> {
        if writes.is_empty() {
            return Err(VsfsError::InvalidInput(
                "a transaction needs at least one block image".to_string(),
            ));
        }
        for write in writes {
            if write.image.len() != BLOCK_SIZE {
                return Err(VsfsError::InvalidInput(format!(
                    "block image for block {} is {} bytes, expected {}",
                    write.home_block,
                    write.image.len(),
                    BLOCK_SIZE
                )));
            }
            check_home_block(&self.config, self.device.block_count(), write.home_block)
                .map_err(VsfsError::InvalidInput)?;
        }

        self.initialize_if_needed()?;
        let mut header = self.read_valid_header()?;

        // A new COMMIT must not seal records left behind by an interrupted
        // transaction; cut them off before appending after them
        if !header.is_empty() {
            if let Some(run) = self.scan_to(header.used_bytes)?.incomplete {
                warn!(
                    "Dropping {} uncommitted record(s) at offset {} before appending",
                    run.records, run.start_offset
                );
                header.used_bytes = run.start_offset;
                self.write_header(&header)?;
                self.sync_if_configured()?;
            }
        }
        let start_offset = header.used_bytes;

        let mut region = self.region();
        let mut cursor = start_offset;
        for write in writes {
            cursor = append_data_record(&mut region, cursor, write.home_block, &write.image)?;
            debug!(
                "Appended DATA record for block {} (cursor now {})",
                write.home_block, cursor
            );
        }
        cursor = append_commit_record(&mut region, cursor)?;

        // Records must be durable before the header makes them reachable
        self.sync_if_configured()?;
        self.write_header(&JournalHeader {
            used_bytes: cursor,
            ..header
        })?;
        self.sync_if_configured()?;

        info!(
            "Journaled transaction of {} block(s), {} bytes (used_bytes {} -> {})",
            writes.len(),
            cursor - start_offset,
            start_offset,
            cursor
        );

        Ok(AppendReport {
            data_records: writes.len(),
            start_offset,
            used_bytes: cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::record::{COMMIT_REC_SIZE, DATA_REC_SIZE};
    use vsfs_core::layout::{block_offset, JOURNAL_BYTES, TOTAL_BLOCKS};
    use vsfs_core::MemoryBlockDevice;

    fn image(fill: u8) -> Vec<u8> {
        vec![fill; BLOCK_SIZE]
    }

    fn journal() -> Journal<MemoryBlockDevice> {
        Journal::new(MemoryBlockDevice::new(TOTAL_BLOCKS)).unwrap()
    }

    #[test]
    fn test_append_publishes_used_bytes() {
        let mut journal = journal();
        let writes = vec![
            BlockWrite::new(17, image(1)),
            BlockWrite::new(19, image(2)),
            BlockWrite::new(21, image(3)),
        ];

        let report = journal.append_transaction(&writes).unwrap();
        assert_eq!(report.start_offset, 8);
        assert_eq!(report.used_bytes, 12324);
        assert_eq!(report.bytes_appended() as usize, 3 * DATA_REC_SIZE + COMMIT_REC_SIZE);
        assert_eq!(journal.read_header().unwrap().used_bytes, 12324);
    }

    #[test]
    fn test_append_never_touches_home_blocks() {
        let mut journal = journal();
        journal
            .append_transaction(&[BlockWrite::new(40, image(0xEE))])
            .unwrap();
        assert!(journal.device().block(40).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_append_syncs_before_and_after_header() {
        let mut journal = journal();
        journal
            .append_transaction(&[BlockWrite::new(17, image(1))])
            .unwrap();
        assert_eq!(journal.device().sync_count(), 2);
    }

    #[test]
    fn test_sequential_transactions_are_appended_back_to_back() {
        let mut journal = journal();
        let first = journal
            .append_transaction(&[BlockWrite::new(17, image(1))])
            .unwrap();
        let second = journal
            .append_transaction(&[BlockWrite::new(18, image(2))])
            .unwrap();
        assert_eq!(second.start_offset, first.used_bytes);
    }

    #[test]
    fn test_append_drops_uncommitted_tail_instead_of_sealing_it() {
        let mut journal = journal();
        let first = journal
            .append_transaction(&[BlockWrite::new(40, image(0xAA))])
            .unwrap();
        // Header that stops just short of the COMMIT: one dangling DATA record
        let header = journal.read_header().unwrap();
        journal
            .write_header(&JournalHeader {
                used_bytes: first.used_bytes - COMMIT_REC_SIZE as u32,
                ..header
            })
            .unwrap();
        assert!(journal.status().unwrap().incomplete.is_some());

        let second = journal
            .append_transaction(&[BlockWrite::new(41, image(0xBB))])
            .unwrap();
        assert_eq!(second.start_offset, 8);
        assert_eq!(second.used_bytes as usize, 8 + DATA_REC_SIZE + COMMIT_REC_SIZE);

        let scan = journal.scan().unwrap();
        assert_eq!(scan.committed.len(), 1);
        assert_eq!(scan.committed[0].home_blocks(), vec![41]);
        assert!(scan.incomplete.is_none());

        let report = journal.install().unwrap();
        assert_eq!(report.blocks_written, 1);
        assert_eq!(report.records_discarded, 0);
        assert!(journal.device().block(40).iter().all(|&b| b == 0));
        assert!(journal.device().block(41).iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn test_capacity_exceeded_leaves_header_unchanged() {
        let mut journal = journal();
        let txn: Vec<BlockWrite> = (0..3).map(|i| BlockWrite::new(21 + i, image(i as u8))).collect();

        // 8 + 5 * 12316 = 61588; a sixth transaction does not fit
        for _ in 0..5 {
            journal.append_transaction(&txn).unwrap();
        }
        let before = journal.read_header().unwrap();
        assert_eq!(before.used_bytes, 61588);

        let err = journal.append_transaction(&txn).unwrap_err();
        assert!(matches!(err, VsfsError::JournalFull { .. }));
        assert_eq!(journal.read_header().unwrap(), before);
    }

    #[test]
    fn test_oversized_transaction_fails_on_fresh_journal() {
        let mut journal = journal();
        let too_many = JOURNAL_BYTES / DATA_REC_SIZE + 1;
        let txn: Vec<BlockWrite> = (0..too_many)
            .map(|i| BlockWrite::new(21 + i as u32, image(0x11)))
            .collect();

        assert!(matches!(
            journal.append_transaction(&txn),
            Err(VsfsError::JournalFull { .. })
        ));
        assert!(journal.read_header().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_input_before_writing() {
        let mut journal = journal();
        assert!(matches!(
            journal.append_transaction(&[]),
            Err(VsfsError::InvalidInput(_))
        ));
        assert!(matches!(
            journal.append_transaction(&[BlockWrite::new(17, vec![0u8; 10])]),
            Err(VsfsError::InvalidInput(_))
        ));
        assert!(matches!(
            journal.append_transaction(&[BlockWrite::new(5, image(1))]),
            Err(VsfsError::InvalidInput(_))
        ));
        assert!(matches!(
            journal.append_transaction(&[BlockWrite::new(TOTAL_BLOCKS, image(1))]),
            Err(VsfsError::InvalidInput(_))
        ));

        // Nothing was initialized, let alone appended
        let journal_start = block_offset(1) as usize;
        let dev = journal.into_inner();
        assert!(dev.as_bytes()[journal_start..journal_start + 8]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_named_record_appends() {
        let mut dev = MemoryBlockDevice::new(TOTAL_BLOCKS);
        let mut region = JournalRegion::new(&mut dev, block_offset(1), JOURNAL_BYTES);

        let cursor = append_data_record(&mut region, 8, 17, &image(9)).unwrap();
        assert_eq!(cursor as usize, 8 + DATA_REC_SIZE);
        let cursor = append_commit_record(&mut region, cursor).unwrap();
        assert_eq!(cursor as usize, 8 + DATA_REC_SIZE + COMMIT_REC_SIZE);
    }
}
