// VSFS metadata layer
// Knows the filesystem structures; produces block images for the journal to stage

pub mod create;
pub mod format;
pub mod structures;

pub use create::{create_file, list_root, plan_create, CreatePlan, CreatePolicy, CreateReport};
pub use format::format;
pub use structures::{DirEntry, Inode, InodeKind, Superblock, NAME_MAX, ROOT_INODE, VSFS_MAGIC};
