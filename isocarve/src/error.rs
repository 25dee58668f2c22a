//! Structural errors distinct from plain I/O failures.
//!
//! A `CarveError` means the device was read successfully but its contents do not look like
//! what we expect (bad MBR signature, bad superblock magic, a backup superblock that doesn't
//! match). These are reported with a specific message and treated as fatal, same as I/O errors,
//! but they are not spurious OS failures so they get their own type.

use std::fmt;
use std::io;

/// A structural mismatch detected while interpreting on-disk metadata.
#[derive(Debug)]
pub enum CarveError {
	/// The requested partition table slot does not exist (index out of range or empty).
	InvalidPartition(u32),
	/// The MBR signature at bytes 510-511 was not `0xAA55`.
	InvalidMbr,
	/// The ext superblock magic at byte 56 was not `0xEF53`.
	InvalidSuperblock,
	/// A backup superblock used for the bitmap integrity cross-check did not match.
	InvalidBackupSuperblock { addr: u64 },
}

impl fmt::Display for CarveError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidPartition(n) => {
				write!(f, "Invalid Partition: Partition {} does not exist.", n)
			}
			Self::InvalidMbr => write!(f, "Invalid MBR: Exiting program."),
			Self::InvalidSuperblock => write!(f, "Invalid superblock: Exiting program."),
			Self::InvalidBackupSuperblock { addr } => {
				write!(f, "Invalid Superblock at 0x{:x}", addr)
			}
		}
	}
}

impl std::error::Error for CarveError {}

impl From<CarveError> for io::Error {
	fn from(e: CarveError) -> Self {
		io::Error::new(io::ErrorKind::InvalidData, e.to_string())
	}
}
