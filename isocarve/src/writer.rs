//! Writes a recovered block list out to a new file, trimming the final block to match the
//! volume size recorded in the image's own Primary Volume Descriptor.
//!
//! Grounded on `recover.c`'s `recordVolumeSize`/`writeBlocks`.

use crate::classify::BlockEntry;
use crate::safeio::read_at;
use std::io::{self, Read, Seek, Write};

/// Offset of the Primary Volume Descriptor from the start of an ISO 9660 image.
const PRIMARY_DESCRIPTOR_OFFSET: u64 = 0x8000;
/// Volume descriptors are always exactly 2048 bytes.
const VOLUME_DESCRIPTOR_SIZE: usize = 2048;
/// Offset within the PVD of the logical volume size, in logical blocks (`u32`).
const VOLUME_SIZE_OFFSET: usize = 80;
/// Offset within the PVD of the logical block size in bytes (`u16`).
const LOGICAL_BLOCK_SIZE_OFFSET: usize = 128;

/// Reads the recovered file's declared size straight from its own Primary Volume
/// Descriptor: `logical block count * logical block size`.
pub fn read_volume_size<D: Read + Seek>(dev: &mut D, first_block_addr: u64) -> io::Result<u64> {
	let mut descriptor = [0u8; VOLUME_DESCRIPTOR_SIZE];
	read_at(dev, first_block_addr + PRIMARY_DESCRIPTOR_OFFSET, &mut descriptor)?;

	let logical_size_in_blocks = u32::from_le_bytes(descriptor[VOLUME_SIZE_OFFSET..VOLUME_SIZE_OFFSET + 4].try_into().unwrap());
	let logical_block_size = u16::from_le_bytes(
		descriptor[LOGICAL_BLOCK_SIZE_OFFSET..LOGICAL_BLOCK_SIZE_OFFSET + 2]
			.try_into()
			.unwrap(),
	);

	Ok(logical_size_in_blocks as u64 * logical_block_size as u64)
}

/// Writes every block in `recovered` out to `sink`, in order, trimming the final block so
/// the total bytes written match the volume size read from the first block's PVD.
///
/// Returns the total number of bytes written.
pub fn write_recovered<D: Read + Seek, W: Write>(
	dev: &mut D,
	sink: &mut W,
	recovered: &[BlockEntry],
	block_size: u32,
) -> io::Result<u64> {
	let volume_size = match recovered.first() {
		Some(first) => read_volume_size(dev, first.addr)?,
		None => return Ok(0),
	};

	let mut buffer = vec![0u8; block_size as usize];
	let mut written = 0u64;

	for (i, block) in recovered.iter().enumerate() {
		read_at(dev, block.addr, &mut buffer)?;

		if i + 1 == recovered.len() {
			let remaining = volume_size.saturating_sub(written);
			if remaining > 0 && remaining < block_size as u64 {
				sink.write_all(&buffer[..remaining as usize])?;
				written += remaining;
				break;
			}
		}

		sink.write_all(&buffer)?;
		written += block_size as u64;
	}

	Ok(written)
}
