// File creation
// Computes the metadata blocks that change when a file is added to the root
// directory, and hands them to the journal as one transaction

use super::structures::*;
use crate::journal::{AppendReport, BlockWrite, Journal, PendingView};
use log::{debug, info};
use serde::Serialize;
use vsfs_core::layout::*;
use vsfs_core::{BlockDevice, Result, VsfsError};

/// Which on-disk state `create` computes its pre-images from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatePolicy {
    /// Read through committed-but-uninstalled journal images, so several
    /// creates can be journaled before a single install
    #[default]
    Overlay,
    /// Refuse to journal anything while the journal holds records
    RequireEmpty,
}

/// Metadata images for one create, not yet journaled
#[derive(Debug, Clone)]
pub struct CreatePlan {
    pub inode: u32,
    pub dir_slot: usize,
    pub root_dir_block: u32,
    /// Inode bitmap, inode table block, root directory block, in that order
    pub writes: Vec<BlockWrite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub name: String,
    pub inode: u32,
    pub policy: CreatePolicy,
    pub append: AppendReport,
}

/// Data block of the root directory, checked against the data region
fn root_dir_block(root: &Inode) -> Result<u32> {
    if root.kind != InodeKind::Directory {
        return Err(VsfsError::corrupt(format!(
            "root inode is {:?}, not a directory",
            root.kind
        )));
    }
    let block = root.direct[0];
    if !(DATA_START_BLK..DATA_START_BLK + DATA_NBLOCKS).contains(&block) {
        return Err(VsfsError::corrupt(format!(
            "root directory block {} is outside the data region",
            block
        )));
    }
    Ok(block)
}

/// Work out the new images of every metadata block touched by creating
/// `name` in the root directory. Nothing is written.
pub fn plan_create<D: BlockDevice>(view: &mut PendingView<'_, D>, name: &str) -> Result<CreatePlan> {
    validate_name(name)?;
    Superblock::decode(&view.read_block(SUPERBLOCK_BLK)?)?;

    let root_table = view.read_block(Inode::table_block(ROOT_INODE))?;
    let root = Inode::read_from(&root_table, ROOT_INODE)?;
    let dir_block = root_dir_block(&root)?;

    let mut dir = view.read_block(dir_block)?;
    let entries = DirEntry::read_block(&dir);
    if entries.iter().any(|(_, entry)| entry.name == name) {
        return Err(VsfsError::AlreadyExists(format!("/{}", name)));
    }
    let dir_slot = (0..DIRENTS_PER_BLOCK)
        .find(|slot| !entries.iter().any(|(used, _)| used == slot))
        .ok_or_else(|| VsfsError::NoSpace("root directory is full".to_string()))?;

    let mut inode_bitmap = view.read_block(INODE_BMAP_BLK)?;
    let inum = bitmap_first_free(&inode_bitmap, INODE_COUNT)
        .ok_or_else(|| VsfsError::NoSpace("no free inodes".to_string()))?;
    bitmap_set(&mut inode_bitmap, inum);

    let table_block = Inode::table_block(inum);
    let mut inode_table = view.read_block(table_block)?;
    if Inode::read_from(&inode_table, inum)?.kind != InodeKind::Free {
        return Err(VsfsError::corrupt(format!(
            "inode {} is free in the bitmap but in use in the inode table",
            inum
        )));
    }
    Inode::new_file().write_into(&mut inode_table, inum);

    DirEntry::new(inum, name).write_slot(&mut dir, dir_slot);

    debug!(
        "Planned create of '{}': inode {} (table block {}), directory slot {}",
        name, inum, table_block, dir_slot
    );

    Ok(CreatePlan {
        inode: inum,
        dir_slot,
        root_dir_block: dir_block,
        writes: vec![
            BlockWrite::new(INODE_BMAP_BLK, inode_bitmap),
            BlockWrite::new(table_block, inode_table),
            BlockWrite::new(dir_block, dir),
        ],
    })
}

/// Journal the creation of `name` in the root directory.
///
/// Home blocks are left untouched; the file appears once the journal is
/// installed.
pub fn create_file<D: BlockDevice>(
    journal: &mut Journal<D>,
    name: &str,
    policy: CreatePolicy,
) -> Result<CreateReport> {
    if policy == CreatePolicy::RequireEmpty {
        let header = journal.read_header()?;
        if header.is_initialized() && !header.is_empty() {
            return Err(VsfsError::DirtyJournal {
                used_bytes: header.used_bytes,
            });
        }
    }

    let plan = {
        let mut view = PendingView::new(journal)?;
        plan_create(&mut view, name)?
    };
    let append = journal.append_transaction(&plan.writes)?;

    info!(
        "Journaled create of '{}' as inode {} ({} bytes used)",
        name, plan.inode, append.used_bytes
    );
    Ok(CreateReport {
        name: name.to_string(),
        inode: plan.inode,
        policy,
        append,
    })
}

/// Root directory entries as the home blocks currently record them
pub fn list_root<D: BlockDevice>(device: &mut D) -> Result<Vec<DirEntry>> {
    Superblock::decode(&device.read_block(SUPERBLOCK_BLK)?)?;
    let table = device.read_block(Inode::table_block(ROOT_INODE))?;
    let root = Inode::read_from(&table, ROOT_INODE)?;
    let dir = device.read_block(root_dir_block(&root)?)?;
    Ok(DirEntry::read_block(&dir).into_iter().map(|(_, e)| e).collect())
}
