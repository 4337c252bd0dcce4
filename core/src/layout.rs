// VSFS disk image layout
// Every region is addressed by absolute block index; blocks are 4 KiB.

use static_assertions::const_assert;

/// Size of every block in the image
pub const BLOCK_SIZE: usize = 4096;
/// Total number of blocks in a VSFS image
pub const TOTAL_BLOCKS: u32 = 85;
/// Size of a whole image in bytes
pub const IMAGE_BYTES: u64 = TOTAL_BLOCKS as u64 * BLOCK_SIZE as u64;

pub const SUPERBLOCK_BLK: u32 = 0;

pub const JOURNAL_START_BLK: u32 = 1;
pub const JOURNAL_NBLOCKS: u32 = 16;
/// Capacity of the journal region in bytes, header included
pub const JOURNAL_BYTES: usize = JOURNAL_NBLOCKS as usize * BLOCK_SIZE;

pub const INODE_BMAP_BLK: u32 = 17;
pub const DATA_BMAP_BLK: u32 = 18;
pub const INODE_TBL_START_BLK: u32 = 19;
pub const INODE_TBL_NBLOCKS: u32 = 2;
pub const DATA_START_BLK: u32 = 21;
pub const DATA_NBLOCKS: u32 = 64;

const_assert!(JOURNAL_START_BLK + JOURNAL_NBLOCKS == INODE_BMAP_BLK);
const_assert!(INODE_TBL_START_BLK + INODE_TBL_NBLOCKS == DATA_START_BLK);
const_assert!(DATA_START_BLK + DATA_NBLOCKS == TOTAL_BLOCKS);
// used_bytes is a u32 on disk
const_assert!(JOURNAL_BYTES <= u32::MAX as usize);

/// Byte offset of a block within the image
pub fn block_offset(block: u32) -> u64 {
    block as u64 * BLOCK_SIZE as u64
}

/// Whether `block` lies inside the journal region
pub fn is_journal_block(block: u32) -> bool {
    (JOURNAL_START_BLK..JOURNAL_START_BLK + JOURNAL_NBLOCKS).contains(&block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_boundaries() {
        assert_eq!(block_offset(JOURNAL_START_BLK), 4096);
        assert_eq!(JOURNAL_BYTES, 65536);
        assert!(is_journal_block(1));
        assert!(is_journal_block(16));
        assert!(!is_journal_block(0));
        assert!(!is_journal_block(INODE_BMAP_BLK));
    }
}
