//! Locates a partition via the MBR, reads its superblock, then walks every block it
//! describes, filtering by allocation status and invoking a callback for each one kept.
//!
//! Grounded on `scan.c`'s `scanPartitionAndProcess`/`processPartition`/`processBlocks`/
//! `isBlockIncluded`; the function-pointer callback becomes a generic closure.

use crate::bitmap::BitmapOracle;
use crate::context::PartitionContext;
use crate::error::CarveError;
use crate::safeio::read_block;
use crate::superblock::{SuperBlock, SUPERBLOCK_OFFSET};
use crate::mbr::Mbr;
use std::io::{self, Read, Seek};

/// Which blocks a scan should hand to its callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
	AllBlocks,
	AllocatedOnly,
	UnallocatedOnly,
}

/// Summary counters produced by a completed scan, for the post-scan sanity print.
#[derive(Clone, Copy, Debug)]
pub struct ScanReport {
	pub scanned: u32,
	pub allocated: u32,
	pub free_blocks_reported: u32,
}

/// Resolves partition table slot `index` (`0`-based) to its absolute byte address.
///
/// Fails with [`CarveError::InvalidMbr`] if the MBR signature doesn't check out, or
/// [`CarveError::InvalidPartition`] if the slot is out of range or empty.
pub fn parse_partition_addr<D: Read + Seek>(dev: &mut D, index: i32) -> io::Result<u64> {
	let mbr = Mbr::read(dev)?;
	if !mbr.is_valid() {
		return Err(CarveError::InvalidMbr.into());
	}
	mbr.partition_addr(index)
		.ok_or_else(|| CarveError::InvalidPartition((index + 1).max(0) as u32).into())
}

/// Reads the partition's superblock, then walks every block in it in order, invoking
/// `on_block` for each block kept under `mode`. Returns the resolved [`PartitionContext`]
/// (needed by later stages) alongside scan counters.
///
/// `progress`, if given, is called once per block with `(blocks processed so far, total)`
/// before that block's allocation status is checked; it lets a CLI front end print a
/// progress bar without coupling this function to any particular output format.
///
/// `on_block` receives a reborrow of the device (some classifiers need to read elsewhere on
/// it, e.g. a block's system area) and the partition context alongside each kept block, so
/// it can bound block numbers against `total_blocks` without waiting for the scan to finish.
pub fn scan_partition<D, F, P>(
	dev: &mut D,
	partition_addr: u64,
	mode: ScanMode,
	mut on_block: F,
	mut progress: Option<P>,
) -> io::Result<(PartitionContext, ScanReport)>
where
	D: Read + Seek,
	F: FnMut(&mut D, &[u8], u64, u32, &PartitionContext) -> io::Result<()>,
	P: FnMut(u32, u32),
{
	let sb = SuperBlock::read(dev, partition_addr + SUPERBLOCK_OFFSET)?;
	if !sb.is_valid() {
		return Err(CarveError::InvalidSuperblock.into());
	}

	let ctx = PartitionContext {
		partition_addr,
		block_size: sb.block_size(),
		total_blocks: sb.total_blocks(),
	};

	let mut oracle = BitmapOracle::new();
	let mut allocated = 0u32;

	for block_num in 0..ctx.total_blocks {
		if let Some(p) = progress.as_mut() {
			p(block_num, ctx.total_blocks);
		}

		let is_alloc = oracle.is_allocated(dev, &ctx, block_num)?;
		if is_alloc {
			allocated += 1;
		}

		let include = match mode {
			ScanMode::AllBlocks => true,
			ScanMode::AllocatedOnly => is_alloc,
			ScanMode::UnallocatedOnly => !is_alloc,
		};

		if include {
			let addr = ctx.block_addr(block_num);
			let block = read_block(dev, addr, ctx.block_size as usize)?;
			on_block(dev, &block, addr, block_num, &ctx)?;
		}
	}

	if let Some(p) = progress.as_mut() {
		p(ctx.total_blocks, ctx.total_blocks);
	}

	Ok((
		ctx,
		ScanReport {
			scanned: ctx.total_blocks,
			allocated,
			free_blocks_reported: sb.free_blocks(),
		},
	))
}
