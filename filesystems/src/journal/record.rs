// Journal record codec
// DATA and COMMIT records, little-endian, no padding

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use static_assertions::const_assert;
use vsfs_core::layout::BLOCK_SIZE;
use vsfs_core::{Result, VsfsError};

pub const REC_DATA: u16 = 1;
pub const REC_COMMIT: u16 = 2;

/// Size of the `{kind, size}` prefix every record starts with
pub const REC_HEADER_SIZE: usize = 4;
/// Header + home block number + full block image
pub const DATA_REC_SIZE: usize = REC_HEADER_SIZE + 4 + BLOCK_SIZE;
pub const COMMIT_REC_SIZE: usize = REC_HEADER_SIZE;

// The size field is 16 bits wide
const_assert!(DATA_REC_SIZE <= u16::MAX as usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Data,
    Commit,
}

impl RecordKind {
    pub fn tag(self) -> u16 {
        match self {
            RecordKind::Data => REC_DATA,
            RecordKind::Commit => REC_COMMIT,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            REC_DATA => Some(RecordKind::Data),
            REC_COMMIT => Some(RecordKind::Commit),
            _ => None,
        }
    }

    /// The only size a record of this kind may declare
    pub fn expected_size(self) -> usize {
        match self {
            RecordKind::Data => DATA_REC_SIZE,
            RecordKind::Commit => COMMIT_REC_SIZE,
        }
    }
}

/// Raw `{kind, size}` prefix as it sits on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: u16,
    pub size: u16,
}

impl RecordHeader {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind: kind.tag(),
            size: kind.expected_size() as u16,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < REC_HEADER_SIZE {
            return Err(VsfsError::corrupt(format!(
                "record header truncated to {} bytes",
                bytes.len()
            )));
        }
        let mut reader = bytes;
        Ok(Self {
            kind: reader.read_u16::<LittleEndian>()?,
            size: reader.read_u16::<LittleEndian>()?,
        })
    }

    /// Resolve the kind tag and check the declared size matches it
    pub fn checked_kind(&self) -> Result<RecordKind> {
        let kind = RecordKind::from_tag(self.kind)
            .ok_or_else(|| VsfsError::corrupt(format!("unknown record kind {}", self.kind)))?;

        if self.size as usize != kind.expected_size() {
            return Err(VsfsError::corrupt(format!(
                "{:?} record declares size {}, expected {}",
                kind,
                self.size,
                kind.expected_size()
            )));
        }
        Ok(kind)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        // Writes into a Vec never fail
        out.write_u16::<LittleEndian>(self.kind).ok();
        out.write_u16::<LittleEndian>(self.size).ok();
    }
}

/// Intent to write `image` to `home_block`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub home_block: u32,
    pub image: Vec<u8>,
}

impl DataRecord {
    /// Decode a complete DATA record (header included)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = RecordHeader::decode(bytes)?;
        if header.checked_kind()? != RecordKind::Data {
            return Err(VsfsError::corrupt("expected a DATA record"));
        }
        if bytes.len() != DATA_REC_SIZE {
            return Err(VsfsError::corrupt(format!(
                "DATA record body is {} bytes, expected {}",
                bytes.len(),
                DATA_REC_SIZE
            )));
        }

        let mut reader = &bytes[REC_HEADER_SIZE..];
        let home_block = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            home_block,
            image: reader.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Data(DataRecord),
    Commit,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Data(_) => RecordKind::Data,
            Record::Commit => RecordKind::Commit,
        }
    }

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        self.kind().expected_size()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        RecordHeader::new(self.kind()).write_to(&mut out);

        if let Record::Data(data) = self {
            if data.image.len() != BLOCK_SIZE {
                return Err(VsfsError::InvalidInput(format!(
                    "block image for block {} is {} bytes, expected {}",
                    data.home_block,
                    data.image.len(),
                    BLOCK_SIZE
                )));
            }
            out.write_u32::<LittleEndian>(data.home_block)?;
            out.extend_from_slice(&data.image);
        }
        Ok(out)
    }
}
