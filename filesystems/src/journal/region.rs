// Journal region
// Byte-addressed view over the journal's blocks; every access is bounded by its capacity

use super::header::JournalHeader;
use vsfs_core::{BlockDevice, Result, VsfsError};

/// Fixed-capacity byte array living at a block offset of a device
pub struct JournalRegion<'a, D: BlockDevice + ?Sized> {
    device: &'a mut D,
    base: u64,
    capacity: usize,
}

impl<'a, D: BlockDevice + ?Sized> JournalRegion<'a, D> {
    pub fn new(device: &'a mut D, base: u64, capacity: usize) -> Self {
        Self {
            device,
            base,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(VsfsError::OutOfBounds {
                offset: offset as u64,
                len,
                limit: self.capacity as u64,
            }),
        }
    }

    /// Read `len` bytes at `offset` within the region
    pub fn read_at(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.check(offset, len)?;
        let mut buffer = vec![0u8; len];
        self.device.read_at(self.base + offset as u64, &mut buffer)?;
        Ok(buffer)
    }

    /// Write `bytes` at `offset` within the region
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check(offset, bytes.len())?;
        self.device.write_at(self.base + offset as u64, bytes)
    }

    /// Append `bytes` at `used_bytes` and return the advanced cursor.
    ///
    /// Fails with `JournalFull` before touching the device if the bytes do
    /// not fit; the caller's cursor is left as it was.
    pub fn append(&mut self, used_bytes: u32, bytes: &[u8]) -> Result<u32> {
        let used = used_bytes as usize;
        let available = self.capacity.saturating_sub(used);
        if bytes.len() > available {
            return Err(VsfsError::JournalFull {
                needed: bytes.len(),
                available,
            });
        }

        self.write_at(used, bytes)?;
        Ok((used + bytes.len()) as u32)
    }

    pub fn read_header(&mut self) -> Result<JournalHeader> {
        let bytes = self.read_at(0, JournalHeader::SIZE)?;
        JournalHeader::decode(&bytes)
    }

    pub fn write_header(&mut self, header: &JournalHeader) -> Result<()> {
        self.write_at(0, &header.encode())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.device.sync()
    }
}
