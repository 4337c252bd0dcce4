// Pending view
// Read-only block view: committed journal images layered over the home blocks

use super::Journal;
use std::collections::HashMap;
use vsfs_core::{BlockDevice, Result};

/// Blocks as they will look once the journal is installed.
///
/// Only committed transactions contribute; an incomplete tail is ignored,
/// exactly as install would ignore it.
pub struct PendingView<'a, D: BlockDevice> {
    journal: &'a mut Journal<D>,
    overlay: HashMap<u32, Vec<u8>>,
}

impl<'a, D: BlockDevice> PendingView<'a, D> {
    pub fn new(journal: &'a mut Journal<D>) -> Result<Self> {
        let mut overlay = HashMap::new();

        let header = journal.read_header()?;
        if header.is_initialized() && !header.is_empty() {
            let scan = journal.scan()?;
            for txn in scan.committed {
                for record in txn.records {
                    overlay.insert(record.home_block, record.image);
                }
            }
        }

        log::debug!("Pending view overlays {} block(s)", overlay.len());
        Ok(Self { journal, overlay })
    }

    /// Number of blocks whose pending image differs from home
    pub fn overlaid_blocks(&self) -> usize {
        self.overlay.len()
    }

    pub fn read_block(&mut self, block: u32) -> Result<Vec<u8>> {
        match self.overlay.get(&block) {
            Some(image) => Ok(image.clone()),
            None => self.journal.device_mut().read_block(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{BlockWrite, JournalHeader, JOURNAL_MAGIC};
    use vsfs_core::layout::{BLOCK_SIZE, TOTAL_BLOCKS};
    use vsfs_core::MemoryBlockDevice;

    #[test]
    fn test_view_prefers_latest_committed_image() {
        let mut journal = Journal::new(MemoryBlockDevice::new(TOTAL_BLOCKS)).unwrap();
        journal
            .device_mut()
            .write_block(30, &vec![0x01; BLOCK_SIZE])
            .unwrap();
        journal
            .append_transaction(&[BlockWrite::new(31, vec![0x02; BLOCK_SIZE])])
            .unwrap();
        journal
            .append_transaction(&[BlockWrite::new(31, vec![0x03; BLOCK_SIZE])])
            .unwrap();

        let mut view = PendingView::new(&mut journal).unwrap();
        assert_eq!(view.overlaid_blocks(), 1);
        assert!(view.read_block(30).unwrap().iter().all(|&b| b == 0x01));
        assert!(view.read_block(31).unwrap().iter().all(|&b| b == 0x03));
    }

    #[test]
    fn test_view_ignores_uncommitted_tail() {
        let mut journal = Journal::new(MemoryBlockDevice::new(TOTAL_BLOCKS)).unwrap();
        let report = journal
            .append_transaction(&[BlockWrite::new(40, vec![0x09; BLOCK_SIZE])])
            .unwrap();
        journal
            .write_header(&JournalHeader {
                magic: JOURNAL_MAGIC,
                used_bytes: report.used_bytes - 4,
            })
            .unwrap();

        let mut view = PendingView::new(&mut journal).unwrap();
        assert_eq!(view.overlaid_blocks(), 0);
        assert!(view.read_block(40).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_view_over_blank_region() {
        let mut journal = Journal::new(MemoryBlockDevice::new(TOTAL_BLOCKS)).unwrap();
        let view = PendingView::new(&mut journal).unwrap();
        assert_eq!(view.overlaid_blocks(), 0);
    }
}
