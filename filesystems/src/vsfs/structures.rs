// VSFS on-disk structures
// Superblock, inodes, directory entries and allocation bitmaps

use byteorder::{ByteOrder, LittleEndian};
use static_assertions::const_assert;
use vsfs_core::layout::*;
use vsfs_core::{Result, VsfsError};

/// "VSFS"
pub const VSFS_MAGIC: u32 = 0x5653_4653;

pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / INODE_SIZE) as u32;
pub const INODE_COUNT: u32 = INODES_PER_BLOCK * INODE_TBL_NBLOCKS;
pub const ROOT_INODE: u32 = 0;
pub const DIRECT_POINTERS: usize = 8;

pub const DIRENT_SIZE: usize = 32;
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;
/// Longest name that still leaves a terminating NUL
pub const NAME_MAX: usize = DIRENT_SIZE - 4 - 1;

const_assert!(BLOCK_SIZE % INODE_SIZE == 0);
const_assert!(INODE_COUNT as usize <= BLOCK_SIZE * 8);
const_assert!(DATA_NBLOCKS as usize <= BLOCK_SIZE * 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    pub journal_start: u32,
    pub journal_blocks: u32,
    pub inode_bitmap: u32,
    pub data_bitmap: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    pub data_start: u32,
    pub data_blocks: u32,
    pub inode_count: u32,
    pub root_inode: u32,
}

impl Superblock {
    /// The only geometry this implementation formats and accepts
    pub fn standard() -> Self {
        Self {
            magic: VSFS_MAGIC,
            block_size: BLOCK_SIZE as u32,
            total_blocks: TOTAL_BLOCKS,
            journal_start: JOURNAL_START_BLK,
            journal_blocks: JOURNAL_NBLOCKS,
            inode_bitmap: INODE_BMAP_BLK,
            data_bitmap: DATA_BMAP_BLK,
            inode_table_start: INODE_TBL_START_BLK,
            inode_table_blocks: INODE_TBL_NBLOCKS,
            data_start: DATA_START_BLK,
            data_blocks: DATA_NBLOCKS,
            inode_count: INODE_COUNT,
            root_inode: ROOT_INODE,
        }
    }

    fn fields(&self) -> [u32; 13] {
        [
            self.magic,
            self.block_size,
            self.total_blocks,
            self.journal_start,
            self.journal_blocks,
            self.inode_bitmap,
            self.data_bitmap,
            self.inode_table_start,
            self.inode_table_blocks,
            self.data_start,
            self.data_blocks,
            self.inode_count,
            self.root_inode,
        ]
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        for (i, value) in self.fields().iter().enumerate() {
            LittleEndian::write_u32(&mut block[i * 4..i * 4 + 4], *value);
        }
        block
    }

    pub fn decode(block: &[u8]) -> Result<Self> {
        let mut f = [0u32; 13];
        LittleEndian::read_u32_into(&block[..52], &mut f);
        let sb = Self {
            magic: f[0],
            block_size: f[1],
            total_blocks: f[2],
            journal_start: f[3],
            journal_blocks: f[4],
            inode_bitmap: f[5],
            data_bitmap: f[6],
            inode_table_start: f[7],
            inode_table_blocks: f[8],
            data_start: f[9],
            data_blocks: f[10],
            inode_count: f[11],
            root_inode: f[12],
        };

        if sb.magic != VSFS_MAGIC {
            return Err(VsfsError::NotFormatted);
        }
        if sb != Self::standard() {
            return Err(VsfsError::corrupt(format!(
                "superblock geometry {:?} does not match the VSFS layout",
                sb
            )));
        }
        Ok(sb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InodeKind {
    Free = 0,
    File = 1,
    Directory = 2,
}

impl InodeKind {
    fn from_raw(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(InodeKind::Free),
            1 => Ok(InodeKind::File),
            2 => Ok(InodeKind::Directory),
            other => Err(VsfsError::corrupt(format!("unknown inode kind {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub kind: InodeKind,
    pub links: u16,
    pub size: u32,
    pub direct: [u32; DIRECT_POINTERS],
}

impl Inode {
    pub fn new_file() -> Self {
        Self {
            kind: InodeKind::File,
            links: 1,
            size: 0,
            direct: [0; DIRECT_POINTERS],
        }
    }

    pub fn new_directory(data_block: u32) -> Self {
        let mut direct = [0; DIRECT_POINTERS];
        direct[0] = data_block;
        Self {
            kind: InodeKind::Directory,
            links: 2,
            size: BLOCK_SIZE as u32,
            direct,
        }
    }

    /// Block of the inode table holding inode `inum`
    pub fn table_block(inum: u32) -> u32 {
        INODE_TBL_START_BLK + inum / INODES_PER_BLOCK
    }

    fn slot_offset(inum: u32) -> usize {
        (inum % INODES_PER_BLOCK) as usize * INODE_SIZE
    }

    /// Decode inode `inum` out of its inode table block
    pub fn read_from(block: &[u8], inum: u32) -> Result<Self> {
        let raw = &block[Self::slot_offset(inum)..Self::slot_offset(inum) + INODE_SIZE];
        let mut direct = [0u32; DIRECT_POINTERS];
        LittleEndian::read_u32_into(&raw[8..8 + DIRECT_POINTERS * 4], &mut direct);
        Ok(Self {
            kind: InodeKind::from_raw(LittleEndian::read_u16(&raw[0..2]))?,
            links: LittleEndian::read_u16(&raw[2..4]),
            size: LittleEndian::read_u32(&raw[4..8]),
            direct,
        })
    }

    /// Encode this inode into slot `inum` of its inode table block
    pub fn write_into(&self, block: &mut [u8], inum: u32) {
        let raw = &mut block[Self::slot_offset(inum)..Self::slot_offset(inum) + INODE_SIZE];
        raw.fill(0);
        LittleEndian::write_u16(&mut raw[0..2], self.kind as u16);
        LittleEndian::write_u16(&mut raw[2..4], self.links);
        LittleEndian::write_u32(&mut raw[4..8], self.size);
        LittleEndian::write_u32_into(&self.direct, &mut raw[8..8 + DIRECT_POINTERS * 4]);
    }
}

/// One 32-byte slot of a directory block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub name: String,
}

impl DirEntry {
    pub fn new(inode: u32, name: &str) -> Self {
        Self {
            inode,
            name: name.to_string(),
        }
    }

    /// Decode slot `slot`; `None` if the slot is free
    pub fn read_slot(block: &[u8], slot: usize) -> Option<Self> {
        let raw = &block[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE];
        let name_bytes = &raw[4..];
        let len = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        if len == 0 {
            return None;
        }
        Some(Self {
            inode: LittleEndian::read_u32(&raw[0..4]),
            name: String::from_utf8_lossy(&name_bytes[..len]).into_owned(),
        })
    }

    pub fn write_slot(&self, block: &mut [u8], slot: usize) {
        let raw = &mut block[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE];
        raw.fill(0);
        LittleEndian::write_u32(&mut raw[0..4], self.inode);
        let name = self.name.as_bytes();
        let len = name.len().min(NAME_MAX);
        raw[4..4 + len].copy_from_slice(&name[..len]);
    }

    /// All occupied slots of a directory block, in slot order
    pub fn read_block(block: &[u8]) -> Vec<(usize, Self)> {
        (0..DIRENTS_PER_BLOCK)
            .filter_map(|slot| Self::read_slot(block, slot).map(|entry| (slot, entry)))
            .collect()
    }
}

/// Reject names that cannot be stored in a root directory entry
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VsfsError::InvalidInput("file name is empty".to_string()));
    }
    if name.len() > NAME_MAX {
        return Err(VsfsError::InvalidInput(format!(
            "file name '{}' is {} bytes, limit is {}",
            name,
            name.len(),
            NAME_MAX
        )));
    }
    if name == "." || name == ".." {
        return Err(VsfsError::InvalidInput(format!("'{}' is reserved", name)));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(VsfsError::InvalidInput(format!(
            "file name '{}' contains '/' or NUL",
            name.escape_default()
        )));
    }
    Ok(())
}

pub fn bitmap_test(bitmap: &[u8], bit: u32) -> bool {
    bitmap[(bit / 8) as usize] & (1 << (bit % 8)) != 0
}

pub fn bitmap_set(bitmap: &mut [u8], bit: u32) {
    bitmap[(bit / 8) as usize] |= 1 << (bit % 8);
}

/// First clear bit below `limit`
pub fn bitmap_first_free(bitmap: &[u8], limit: u32) -> Option<u32> {
    (0..limit).find(|&bit| !bitmap_test(bitmap, bit))
}
