// VSFS metadata journal
// Redo-only write-ahead log of full block images, replayed by `install`

pub mod header;
pub mod inspect;
pub mod record;
pub mod region;
pub mod replay;
pub mod view;
pub mod writer;

pub use header::{JournalHeader, JOURNAL_MAGIC};
pub use inspect::JournalStatus;
pub use record::{DataRecord, Record, RecordHeader, RecordKind, COMMIT_REC_SIZE, DATA_REC_SIZE};
pub use region::JournalRegion;
pub use replay::{CommittedTransaction, IncompleteRun, InstallReport, JournalScan};
pub use view::PendingView;
pub use writer::{append_commit_record, append_data_record, AppendReport, BlockWrite};

use log::info;
use vsfs_core::layout::{block_offset, BLOCK_SIZE, JOURNAL_NBLOCKS, JOURNAL_START_BLK};
use vsfs_core::{BlockDevice, Result, VsfsError};

/// Journal placement and write behaviour
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// First block of the journal region
    pub start_block: u32,
    /// Journal size in blocks
    pub blocks: u32,
    /// Flush the device at each ordering point (records before header,
    /// home blocks before checkpoint)
    pub sync_writes: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            start_block: JOURNAL_START_BLK,
            blocks: JOURNAL_NBLOCKS,
            sync_writes: true,
        }
    }
}

impl JournalConfig {
    pub fn capacity_bytes(&self) -> usize {
        self.blocks as usize * BLOCK_SIZE
    }

    pub fn contains_block(&self, block: u32) -> bool {
        block >= self.start_block && block - self.start_block < self.blocks
    }
}

/// Journal over a block device.
///
/// The device is exclusively owned for the lifetime of the journal; callers
/// get it back with [`Journal::into_inner`].
pub struct Journal<D: BlockDevice> {
    device: D,
    config: JournalConfig,
}

impl<D: BlockDevice> Journal<D> {
    pub fn new(device: D) -> Result<Self> {
        Self::with_config(device, JournalConfig::default())
    }

    pub fn with_config(device: D, config: JournalConfig) -> Result<Self> {
        if config.blocks == 0 || config.capacity_bytes() > u32::MAX as usize {
            return Err(VsfsError::InvalidInput(format!(
                "journal of {} blocks is not representable",
                config.blocks
            )));
        }
        let end = config.start_block as u64 + config.blocks as u64;
        if end > device.block_count() as u64 {
            return Err(VsfsError::InvalidInput(format!(
                "journal blocks {}..{} do not fit a device of {} blocks",
                config.start_block,
                end,
                device.block_count()
            )));
        }
        Ok(Self { device, config })
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity_bytes()
    }

    pub(crate) fn region(&mut self) -> JournalRegion<'_, D> {
        let base = block_offset(self.config.start_block);
        let capacity = self.config.capacity_bytes();
        JournalRegion::new(&mut self.device, base, capacity)
    }

    pub fn read_header(&mut self) -> Result<JournalHeader> {
        self.region().read_header()
    }

    pub fn write_header(&mut self, header: &JournalHeader) -> Result<()> {
        self.region().write_header(header)
    }

    /// Write an empty header if the region does not carry the journal magic.
    ///
    /// Returns whether a header was written.
    pub fn initialize_if_needed(&mut self) -> Result<bool> {
        let header = self.read_header()?;
        if header.is_initialized() {
            return Ok(false);
        }

        info!(
            "Initializing journal at block {} ({} blocks)",
            self.config.start_block, self.config.blocks
        );
        self.write_header(&JournalHeader::empty())?;
        Ok(true)
    }

    /// Read the header and reject values outside `[SIZE, capacity]`
    pub(crate) fn read_valid_header(&mut self) -> Result<JournalHeader> {
        let header = self.read_header()?;
        header.validate(self.capacity())?;
        Ok(header)
    }

    pub(crate) fn sync_if_configured(&mut self) -> Result<()> {
        if self.config.sync_writes {
            self.device.sync()?;
        }
        Ok(())
    }
}

/// Whether `block` may be the home of a journaled image
pub(crate) fn check_home_block(
    config: &JournalConfig,
    block_count: u32,
    block: u32,
) -> std::result::Result<(), String> {
    if block >= block_count {
        return Err(format!(
            "home block {} is outside a device of {} blocks",
            block, block_count
        ));
    }
    if config.contains_block(block) {
        return Err(format!("home block {} lies inside the journal region", block));
    }
    Ok(())
}
