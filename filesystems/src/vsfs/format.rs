// VSFS formatter
// Lays out a fresh image: superblock, empty journal, bitmaps, root directory

use super::structures::*;
use crate::journal::Journal;
use log::info;
use vsfs_core::layout::*;
use vsfs_core::{BlockDevice, Result, VsfsError};

/// Format `device` as an empty VSFS image with an initialized, empty journal.
///
/// Everything previously on the device is overwritten.
pub fn format<D: BlockDevice>(device: &mut D) -> Result<()> {
    if device.block_count() < TOTAL_BLOCKS {
        return Err(VsfsError::InvalidInput(format!(
            "device holds {} blocks, VSFS needs {}",
            device.block_count(),
            TOTAL_BLOCKS
        )));
    }

    let zero = vec![0u8; BLOCK_SIZE];
    for block in 0..TOTAL_BLOCKS {
        device.write_block(block, &zero)?;
    }

    device.write_block(SUPERBLOCK_BLK, &Superblock::standard().encode())?;

    let mut inode_bitmap = vec![0u8; BLOCK_SIZE];
    bitmap_set(&mut inode_bitmap, ROOT_INODE);
    device.write_block(INODE_BMAP_BLK, &inode_bitmap)?;

    let root_dir_block = DATA_START_BLK;
    let mut data_bitmap = vec![0u8; BLOCK_SIZE];
    bitmap_set(&mut data_bitmap, root_dir_block - DATA_START_BLK);
    device.write_block(DATA_BMAP_BLK, &data_bitmap)?;

    let mut inode_table = vec![0u8; BLOCK_SIZE];
    Inode::new_directory(root_dir_block).write_into(&mut inode_table, ROOT_INODE);
    device.write_block(Inode::table_block(ROOT_INODE), &inode_table)?;

    let mut dir = vec![0u8; BLOCK_SIZE];
    DirEntry::new(ROOT_INODE, ".").write_slot(&mut dir, 0);
    DirEntry::new(ROOT_INODE, "..").write_slot(&mut dir, 1);
    device.write_block(root_dir_block, &dir)?;

    Journal::new(&mut *device)?.initialize_if_needed()?;
    device.sync()?;

    info!(
        "Formatted VSFS image: {} blocks, {} inodes, root directory in block {}",
        TOTAL_BLOCKS, INODE_COUNT, root_dir_block
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalHeader;
    use vsfs_core::MemoryBlockDevice;

    #[test]
    fn test_format_lays_out_root() {
        let mut dev = MemoryBlockDevice::new(TOTAL_BLOCKS);
        format(&mut dev).unwrap();

        Superblock::decode(dev.block(SUPERBLOCK_BLK)).unwrap();
        assert!(bitmap_test(dev.block(INODE_BMAP_BLK), ROOT_INODE));
        assert_eq!(bitmap_first_free(dev.block(INODE_BMAP_BLK), INODE_COUNT), Some(1));
        assert!(bitmap_test(dev.block(DATA_BMAP_BLK), 0));

        let root = Inode::read_from(dev.block(INODE_TBL_START_BLK), ROOT_INODE).unwrap();
        assert_eq!(root.kind, InodeKind::Directory);
        assert_eq!(root.direct[0], DATA_START_BLK);

        let names: Vec<String> = DirEntry::read_block(dev.block(DATA_START_BLK))
            .into_iter()
            .map(|(_, e)| e.name)
            .collect();
        assert_eq!(names, vec![".", ".."]);

        let mut journal = Journal::new(dev).unwrap();
        assert_eq!(journal.read_header().unwrap(), JournalHeader::empty());
    }

    #[test]
    fn test_format_erases_previous_contents() {
        let mut dev = MemoryBlockDevice::new(TOTAL_BLOCKS);
        dev.write_block(60, &vec![0xFF; BLOCK_SIZE]).unwrap();
        format(&mut dev).unwrap();
        assert!(dev.block(60).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_format_rejects_small_device() {
        let mut dev = MemoryBlockDevice::new(TOTAL_BLOCKS - 1);
        assert!(matches!(format(&mut dev), Err(VsfsError::InvalidInput(_))));
    }
}
