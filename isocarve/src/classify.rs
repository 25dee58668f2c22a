//! Per-block classification: first-block candidate, indirect-block candidate, or neither.
//!
//! Grounded on `recover.c`'s `isLikelyFirstBlock`/`hasISOSignature`/`isIndirectBlock`/
//! `verifyTrailingZeroes`; the heuristics are carried over unchanged, only expressed as
//! safe slice operations instead of raw pointer walks.

use crate::safeio::read_at;
use std::io::{self, Read, Seek};

/// The ISO 9660 volume descriptor signature, found at byte offset 1 of a volume descriptor.
const ISO_SIGNATURE: &[u8; 5] = b"CD001";
/// Volume descriptor type byte identifying a Primary Volume Descriptor.
const PRIMARY_VOLUME_DESCRIPTOR_TYPE: u8 = 0x01;
/// Offset of the system area / volume descriptor region from the start of an ISO 9660 image.
const ISO_SYSTEM_AREA_SIZE: u64 = 0x8000;
/// MBR signature bytes, at offset 510-511 of a 512-byte sector.
const MBR_SIGNATURE: u16 = 0xaa55;

/// `size_hint` bit set on a first-block candidate when a Primary Volume Descriptor was found
/// at the block's system-area offset.
pub const FIRST_BLOCK_FLAG_PVD: u32 = 0b01;
/// `size_hint` bit set on a first-block candidate when a volume descriptor (not necessarily
/// primary) was found alongside an MBR-like signature on the block itself.
pub const FIRST_BLOCK_FLAG_MBR: u32 = 0b10;

/// One recoverable block: its address, block number, and a size/likelihood hint whose
/// meaning depends on which list it was placed in (on a first-block candidate, a bitflag --
/// see [`FIRST_BLOCK_FLAG_PVD`]/[`FIRST_BLOCK_FLAG_MBR`] -- of which signal matched; on a
/// recovered data block it records the block's byte size).
#[derive(Clone, Copy, Debug)]
pub struct BlockEntry {
	pub addr: u64,
	pub block_num: u32,
	pub size_hint: u32,
}

/// Returns a bitflag (`0` meaning "not a match") of which signals suggest the block at `addr`
/// is the first block of a deleted ISO 9660 image: bit 0 if its volume descriptor (read
/// 0x8000 bytes further in, where the system area ends) is specifically a Primary Volume
/// Descriptor; bit 1 if it has some volume descriptor and the raw block itself carries an
/// MBR-like signature at bytes 510-511 (as a hybrid ISO's first block would). A nonzero
/// result of either flag means the block is a first-block candidate.
pub fn is_likely_first_block<D: Read + Seek>(dev: &mut D, block: &[u8], addr: u64) -> io::Result<u32> {
	let block_size = block.len();
	let mut descriptor = vec![0u8; block_size];
	read_at(dev, addr + ISO_SYSTEM_AREA_SIZE, &mut descriptor)?;

	let has_mbr_signature = block.len() >= 512 && u16::from_le_bytes([block[510], block[511]]) == MBR_SIGNATURE;
	let is_descriptor = has_iso_signature(&descriptor);
	let is_primary_descriptor = is_descriptor && descriptor[0] == PRIMARY_VOLUME_DESCRIPTOR_TYPE;

	let mut flags = 0u32;
	if is_primary_descriptor {
		flags |= FIRST_BLOCK_FLAG_PVD;
	}
	if is_descriptor && has_mbr_signature {
		flags |= FIRST_BLOCK_FLAG_MBR;
	}
	Ok(flags)
}

/// Whether `block` carries the ISO 9660 volume descriptor signature `"CD001"` at byte 1.
pub fn has_iso_signature(block: &[u8]) -> bool {
	block.len() >= 6 && &block[1..6] == ISO_SIGNATURE
}

/// Reinterprets a raw block buffer as little-endian `u32` block pointers, the layout every
/// indirect block uses.
pub fn block_as_u32s(block: &[u8]) -> Vec<u32> {
	block
		.chunks_exact(4)
		.map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
		.collect()
}

/// Returns whether `block` (read as `u32` little-endian block numbers) looks like an
/// indirect block: a run of consecutive increasing block numbers, possibly followed by an
/// all-zero tail if the pointer array is only partially filled.
///
/// `total_blocks` bounds plausible block numbers -- any pointer above it rules the block out
/// immediately, since a real indirect block can only ever point within its own filesystem.
pub fn is_indirect_block(block: &[u32], total_blocks: u32) -> bool {
	let first = block[0];
	if first == 0 || first > total_blocks {
		return false;
	}

	let mut expected = first;
	let mut consecutive = 0u32;

	for i in 1..6.min(block.len()) {
		let value = block[i];

		if value > total_blocks {
			return false;
		} else if value == expected + 1 {
			expected += 1;
			consecutive += 1;
		} else if value == 0 {
			return verify_trailing_zeroes(&block[i..]);
		} else if consecutive >= 3 {
			return true;
		} else {
			consecutive = 0;
		}
	}

	consecutive > 3
}

/// Whether every remaining `u32` in `tail` is zero.
fn verify_trailing_zeroes(tail: &[u32]) -> bool {
	tail.iter().all(|&v| v == 0)
}
