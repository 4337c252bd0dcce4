pub mod device;
pub mod error;
pub mod layout;

pub use device::{BlockDevice, FileBlockDevice, MemoryBlockDevice};
pub use error::{ErrorPhase, Result, VsfsError};
