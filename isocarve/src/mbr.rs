//! Parses the master boot record to locate partitions.
//!
//! Layout mirrors `fdisk`'s `MBRTable`/`MBRPartition`: a packed struct cast directly over
//! the 512-byte sector buffer, since byte-alignment padding would otherwise make the Rust
//! struct larger than the on-disk record.

use crate::safeio::read_at;
use std::io::{self, Read, Seek};
use std::mem::size_of;

/// The signature of the MBR partition table, stored little-endian at bytes 510-511.
pub const MBR_SIGNATURE: u16 = 0xaa55;

/// One of the four primary partition table entries.
#[repr(C, packed)]
#[derive(Clone, Copy, Default)]
struct RawPartitionEntry {
	boot_flag: u8,
	chs_start: [u8; 3],
	partition_type: u8,
	chs_end: [u8; 3],
	lba_start: u32,
	sectors_count: u32,
}

/// The 512-byte master boot record.
#[repr(C, packed)]
struct RawMbr {
	boot_code: [u8; 440],
	disk_signature: u32,
	null_padding: u16,
	partitions: [RawPartitionEntry; 4],
	signature: u16,
}

/// A parsed master boot record.
///
/// Only the partition table and the signature are kept; the boot code is not interpreted
/// by the recovery engine.
pub struct Mbr {
	partitions: [RawPartitionEntry; 4],
	signature: u16,
}

impl Mbr {
	/// Reads the 512-byte MBR at device offset 0.
	///
	/// Does not validate the signature -- the caller decides whether a mismatch should be
	/// treated as "not an MBR at all" or surfaced differently.
	pub fn read<D: Read + Seek>(dev: &mut D) -> io::Result<Self> {
		let mut buf = [0u8; size_of::<RawMbr>()];
		read_at(dev, 0, &mut buf)?;

		// Safety: `RawMbr` is `repr(C, packed)` over exactly `size_of::<RawMbr>()` bytes,
		// and every field is read by value below, never borrowed, so misaligned packed
		// fields are never referenced directly.
		let raw = unsafe { &*(buf.as_ptr() as *const RawMbr) };

		Ok(Self {
			partitions: raw.partitions,
			signature: raw.signature,
		})
	}

	/// Whether the MBR signature is the expected `0xAA55`.
	pub fn is_valid(&self) -> bool {
		self.signature == MBR_SIGNATURE
	}

	/// Returns the byte offset of partition `index`, or `None` if the index is out of
	/// range `[0, 3]` or the slot is empty (LBA `0`).
	///
	/// The LBA is read in on-disk (little-endian) order, which is native order on the
	/// target platforms; no byte-swap is performed, matching the original's comment that
	/// `ntohl` is not required here.
	pub fn partition_addr(&self, index: i32) -> Option<u64> {
		if !(0..=3).contains(&index) {
			return None;
		}
		let entry = self.partitions[index as usize];
		let lba = entry.lba_start;
		if lba == 0 {
			return None;
		}
		Some(lba as u64 * 512)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Cursor;

	fn synthetic_mbr(lba: [u32; 4], signature: u16) -> Vec<u8> {
		let mut buf = vec![0u8; 512];
		for (i, l) in lba.iter().enumerate() {
			let off = 446 + i * 16 + 8;
			buf[off..off + 4].copy_from_slice(&l.to_le_bytes());
		}
		buf[510..512].copy_from_slice(&signature.to_le_bytes());
		buf
	}

	#[test]
	fn valid_signature_is_recognised() {
		let buf = synthetic_mbr([2048, 0, 0, 0], MBR_SIGNATURE);
		let mut dev = Cursor::new(buf);
		let mbr = Mbr::read(&mut dev).unwrap();
		assert!(mbr.is_valid());
	}

	#[test]
	fn invalid_signature_is_rejected() {
		let buf = synthetic_mbr([2048, 0, 0, 0], 0x1234);
		let mut dev = Cursor::new(buf);
		let mbr = Mbr::read(&mut dev).unwrap();
		assert!(!mbr.is_valid());
	}

	#[test]
	fn partition_addr_round_trip() {
		let lba = [2048, 4096, 0, 1_000_000];
		let buf = synthetic_mbr(lba, MBR_SIGNATURE);
		let mut dev = Cursor::new(buf);
		let mbr = Mbr::read(&mut dev).unwrap();

		assert_eq!(mbr.partition_addr(0), Some(2048 * 512));
		assert_eq!(mbr.partition_addr(1), Some(4096 * 512));
		assert_eq!(mbr.partition_addr(2), None); // empty slot
		assert_eq!(mbr.partition_addr(3), Some(1_000_000 * 512));
	}

	#[test]
	fn partition_addr_out_of_range() {
		let buf = synthetic_mbr([2048, 0, 0, 0], MBR_SIGNATURE);
		let mut dev = Cursor::new(buf);
		let mbr = Mbr::read(&mut dev).unwrap();

		assert_eq!(mbr.partition_addr(-1), None);
		assert_eq!(mbr.partition_addr(4), None);
	}
}
