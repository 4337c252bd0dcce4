// Journal header
// Fixed 8-byte struct at offset 0 of the journal region

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use vsfs_core::{Result, VsfsError};

/// "JRNL"
pub const JOURNAL_MAGIC: u32 = 0x4A52_4E4C;

/// Header of the journal region.
///
/// `used_bytes` counts every byte in use, the header included, so an empty
/// journal has `used_bytes == JournalHeader::SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    pub magic: u32,
    pub used_bytes: u32,
}

impl JournalHeader {
    pub const SIZE: usize = 8;

    /// A freshly initialized, empty header
    pub fn empty() -> Self {
        Self {
            magic: JOURNAL_MAGIC,
            used_bytes: Self::SIZE as u32,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.magic == JOURNAL_MAGIC
    }

    pub fn is_empty(&self) -> bool {
        self.used_bytes as usize == Self::SIZE
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.magic);
        LittleEndian::write_u32(&mut bytes[4..8], self.used_bytes);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(VsfsError::ShortTransfer {
                what: "journal header read",
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut reader = bytes;
        Ok(Self {
            magic: reader.read_u32::<LittleEndian>()?,
            used_bytes: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Check `SIZE <= used_bytes <= capacity`
    pub fn validate(&self, capacity: usize) -> Result<()> {
        let used = self.used_bytes as usize;
        if used < Self::SIZE || used > capacity {
            return Err(VsfsError::corrupt(format!(
                "journal header claims {} bytes used, valid range is {}..={}",
                used,
                Self::SIZE,
                capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = JournalHeader {
            magic: JOURNAL_MAGIC,
            used_bytes: 12324,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[..4], &[0x4C, 0x4E, 0x52, 0x4A]);
        assert_eq!(&bytes[4..], &12324u32.to_le_bytes());
        assert_eq!(JournalHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_empty_header() {
        let header = JournalHeader::empty();
        assert!(header.is_initialized());
        assert!(header.is_empty());
        assert_eq!(header.used_bytes, 8);
    }

    #[test]
    fn test_validate_rejects_implausible_used_bytes() {
        let capacity = 16 * 4096;
        let mut header = JournalHeader::empty();
        assert!(header.validate(capacity).is_ok());

        header.used_bytes = 4;
        assert!(matches!(header.validate(capacity), Err(VsfsError::Corrupt(_))));

        header.used_bytes = capacity as u32 + 1;
        assert!(matches!(header.validate(capacity), Err(VsfsError::Corrupt(_))));

        header.used_bytes = capacity as u32;
        assert!(header.validate(capacity).is_ok());
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = JournalHeader::decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, VsfsError::ShortTransfer { actual: 5, .. }));
    }
}
