// Block store
// Fixed-size block I/O over a random-access byte store, addressed by absolute block index

use crate::error::{Result, VsfsError};
use crate::layout::{block_offset, BLOCK_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Random-access storage holding a VSFS image.
///
/// Every transfer is all-or-error: implementations either move exactly the
/// requested number of bytes or fail. Nothing is retried.
pub trait BlockDevice {
    /// Number of whole blocks the device holds
    fn block_count(&self) -> u32;

    /// Fill `buf` from absolute byte `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` at absolute byte `offset`
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Flush written data to stable storage
    fn sync(&mut self) -> Result<()>;

    fn read_block(&mut self, block: u32) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; BLOCK_SIZE];
        self.read_at(block_offset(block), &mut buffer)?;
        Ok(buffer)
    }

    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        if data.len() != BLOCK_SIZE {
            return Err(VsfsError::InvalidInput(format!(
                "Invalid block size: expected {}, got {}",
                BLOCK_SIZE,
                data.len()
            )));
        }
        self.write_at(block_offset(block), data)
    }

    /// Size of the device in bytes
    fn capacity_bytes(&self) -> u64 {
        block_offset(self.block_count())
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn block_count(&self) -> u32 {
        (**self).block_count()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        (**self).write_at(offset, data)
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}

fn check_range(offset: u64, len: usize, limit: u64) -> Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= limit => Ok(()),
        _ => Err(VsfsError::OutOfBounds { offset, len, limit }),
    }
}

/// Disk image backed by a regular file
pub struct FileBlockDevice {
    path: PathBuf,
    file: File,
    blocks: u32,
}

impl FileBlockDevice {
    /// Open an existing image for reading and writing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        let blocks = u32::try_from(len / BLOCK_SIZE as u64).map_err(|_| {
            VsfsError::InvalidInput(format!("{} is too large to be an image", path.display()))
        })?;

        log::debug!("Opened {} ({} blocks)", path.display(), blocks);
        Ok(Self { path, file, blocks })
    }

    /// Create (or truncate) an image of `blocks` zeroed blocks
    pub fn create(path: impl AsRef<Path>, blocks: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(block_offset(blocks))?;

        log::debug!("Created {} ({} blocks)", path.display(), blocks);
        Ok(Self { path, file, blocks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileBlockDevice {
    fn block_count(&self) -> u32 {
        self.blocks
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.capacity_bytes())?;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled != buf.len() {
            return Err(VsfsError::ShortTransfer {
                what: "read",
                expected: buf.len(),
                actual: filled,
            });
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(offset, data.len(), self.capacity_bytes())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data).map_err(|e| match e.kind() {
            ErrorKind::WriteZero => VsfsError::ShortTransfer {
                what: "write",
                expected: data.len(),
                actual: 0,
            },
            _ => VsfsError::Io(e),
        })
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// In-memory image, used by tests and dry runs
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    bytes: Vec<u8>,
    syncs: u64,
}

impl MemoryBlockDevice {
    pub fn new(blocks: u32) -> Self {
        Self {
            bytes: vec![0u8; block_offset(blocks) as usize],
            syncs: 0,
        }
    }

    /// Wrap an existing image; trailing bytes past the last whole block are ignored
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        let whole = bytes.len() - bytes.len() % BLOCK_SIZE;
        bytes.truncate(whole);
        Self { bytes, syncs: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow one block without going through the trait
    pub fn block(&self, block: u32) -> &[u8] {
        let start = block_offset(block) as usize;
        &self.bytes[start..start + BLOCK_SIZE]
    }

    /// Number of times `sync` has been called
    pub fn sync_count(&self) -> u64 {
        self.syncs
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn block_count(&self) -> u32 {
        (self.bytes.len() / BLOCK_SIZE) as u32
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.bytes.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(offset, data.len(), self.bytes.len() as u64)?;
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.syncs += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_memory_block_roundtrip() {
        let mut dev = MemoryBlockDevice::new(4);
        let block = vec![0xABu8; BLOCK_SIZE];
        dev.write_block(2, &block).unwrap();

        assert_eq!(dev.read_block(2).unwrap(), block);
        assert!(dev.read_block(1).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_out_of_range_block_is_rejected() {
        let mut dev = MemoryBlockDevice::new(4);
        let err = dev.read_block(4).unwrap_err();
        assert!(matches!(err, VsfsError::OutOfBounds { .. }));

        let err = dev.write_block(9, &vec![0u8; BLOCK_SIZE]).unwrap_err();
        assert!(matches!(err, VsfsError::OutOfBounds { .. }));
    }

    #[test]
    fn test_partial_block_write_is_rejected() {
        let mut dev = MemoryBlockDevice::new(2);
        let err = dev.write_block(0, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, VsfsError::InvalidInput(_)));
    }

    #[test]
    fn test_file_device_persists_blocks() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let mut dev = FileBlockDevice::create(temp_file.path(), 8).unwrap();
            dev.write_block(7, &vec![0x5Au8; BLOCK_SIZE]).unwrap();
            dev.sync().unwrap();
        }

        let mut dev = FileBlockDevice::open(temp_file.path()).unwrap();
        assert_eq!(dev.block_count(), 8);
        assert!(dev.read_block(7).unwrap().iter().all(|&b| b == 0x5A));
        assert!(matches!(
            dev.read_block(8).unwrap_err(),
            VsfsError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn test_file_device_reports_short_read() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut dev = FileBlockDevice::create(temp_file.path(), 2).unwrap();
        // Shrink the file underneath the device
        temp_file.as_file().set_len(BLOCK_SIZE as u64 + 10).unwrap();

        let err = dev.read_block(1).unwrap_err();
        match err {
            VsfsError::ShortTransfer { what, expected, actual } => {
                assert_eq!(what, "read");
                assert_eq!(expected, BLOCK_SIZE);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
