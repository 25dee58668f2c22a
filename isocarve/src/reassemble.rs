//! Pieces a deleted file's data blocks back together from a first-block candidate and the
//! pool of indirect-block candidates found during the scan.
//!
//! Grounded on `recover.c`'s `mapBlocks`/`recover`/`recoverIndirectBlocks`/
//! `recoverIndirectFor`/`addBlocksFrom`. The original threads `recoveredBlocks` as a single
//! module-level list reused (and never cleared) across every first-block match; here each
//! call to [`Reassembler::recover`] returns a fresh `Vec`, so one candidate's data can never
//! leak into the next.

use crate::classify::{block_as_u32s, is_indirect_block, is_likely_first_block, BlockEntry};
use crate::context::PartitionContext;
use crate::safeio::read_block;
use std::io::{self, Read, Seek};

/// Classifies one scanned block, appending it to `first_blocks` or `indirect_blocks` as
/// appropriate. Blocks that are neither are silently dropped, matching `mapBlocks`.
pub fn map_block<D: Read + Seek>(
	dev: &mut D,
	block: &[u8],
	addr: u64,
	block_num: u32,
	ctx: &PartitionContext,
	first_blocks: &mut Vec<BlockEntry>,
	indirect_blocks: &mut Vec<BlockEntry>,
) -> io::Result<()> {
	let first_block_flags = is_likely_first_block(dev, block, addr)?;
	if first_block_flags != 0 {
		first_blocks.push(BlockEntry {
			addr,
			block_num,
			size_hint: first_block_flags,
		});
	} else if is_indirect_block(&block_as_u32s(block), ctx.total_blocks) {
		indirect_blocks.push(BlockEntry {
			addr,
			block_num,
			size_hint: 1,
		});
	}
	Ok(())
}

/// Reassembles data blocks for first-block candidates found during a scan.
pub struct Reassembler {
	ctx: PartitionContext,
}

impl Reassembler {
	pub fn new(ctx: PartitionContext) -> Self {
		Self { ctx }
	}

	/// Recovers the full block list for one first-block candidate: its 12 direct blocks
	/// (assumed contiguous on disk), then whatever single/double/triple indirect layers
	/// can be matched against `indirect_blocks`.
	pub fn recover<D: Read + Seek>(
		&self,
		dev: &mut D,
		first_block: &BlockEntry,
		indirect_blocks: &[BlockEntry],
	) -> io::Result<Vec<BlockEntry>> {
		let mut recovered = Vec::new();

		for i in 0..12u32 {
			recovered.push(BlockEntry {
				addr: first_block.addr + i as u64 * self.ctx.block_size as u64,
				block_num: first_block.block_num + i,
				size_hint: 0,
			});
		}

		let next = first_block.block_num + 12;
		self.recover_indirect_layers(dev, next, indirect_blocks, &mut recovered)?;
		Ok(recovered)
	}

	/// Recovers the single, then double, then triple indirect layers in sequence, each
	/// layer picking up where the previous left off via `last_entry`.
	fn recover_indirect_layers<D: Read + Seek>(
		&self,
		dev: &mut D,
		next_block: u32,
		indirect_blocks: &[BlockEntry],
		recovered: &mut Vec<BlockEntry>,
	) -> io::Result<()> {
		let mut last_entry = 0u32;
		self.recover_indirect_for(dev, next_block, indirect_blocks, recovered, &mut last_entry)?;
		self.recover_indirect_for(dev, last_entry + 1, indirect_blocks, recovered, &mut last_entry)?;
		self.recover_indirect_for(dev, last_entry + 1, indirect_blocks, recovered, &mut last_entry)?;
		Ok(())
	}

	/// Searches `indirect_blocks` for a candidate whose *content* begins with
	/// `next_block_num` -- i.e. one whose first referenced data block would continue the
	/// file's data sequence right where the previous layer left off. On a match, recurses
	/// using that candidate's own block number as the new target, walking up toward the
	/// indirect tree's root; once a candidate has no parent (the recursive call returns
	/// `0`), it is the root, and [`Self::add_blocks_from`] walks back down from it
	/// (pre-order, depth-first) appending data blocks to `recovered`.
	///
	/// Returns the block number of the matched candidate, or `0` if none was found
	/// (including the base case `next_block_num == 1`, which marks "no more blocks" the
	/// same way a zero pointer does elsewhere).
	fn recover_indirect_for<D: Read + Seek>(
		&self,
		dev: &mut D,
		next_block_num: u32,
		indirect_blocks: &[BlockEntry],
		recovered: &mut Vec<BlockEntry>,
		last_entry_out: &mut u32,
	) -> io::Result<u32> {
		if next_block_num == 1 {
			return Ok(0);
		}

		let journal_threshold = self.ctx.blocks_per_group_bitmap();

		for entry in indirect_blocks {
			let buffer = read_block(dev, entry.addr, self.ctx.block_size as usize)?;
			let first_pointer = u32::from_le_bytes(buffer[0..4].try_into().unwrap());
			let is_in_journal = entry.block_num < journal_threshold;

			if first_pointer == next_block_num && !is_in_journal {
				let parent = self.recover_indirect_for(dev, entry.block_num, indirect_blocks, recovered, last_entry_out)?;
				if parent == 0 {
					*last_entry_out = self.add_blocks_from(dev, &buffer, recovered)?;
				}
				return Ok(entry.block_num);
			}
		}

		Ok(0)
	}

	/// Pre-order depth-first walk of an indirect block's tree: every non-zero pointer that
	/// is itself an indirect block is recursed into; every pointer that is a leaf is pushed
	/// to `recovered`. Returns the last pointer value in `block`, which is the block number
	/// the next indirect layer should pick up from.
	fn add_blocks_from<D: Read + Seek>(&self, dev: &mut D, block: &[u8], recovered: &mut Vec<BlockEntry>) -> io::Result<u32> {
		let pointers = block_as_u32s(block);
		let last = *pointers.last().expect("block is non-empty");

		for (i, &block_num) in pointers.iter().enumerate() {
			if block_num == 0 {
				continue;
			}

			let addr = self.ctx.partition_addr + block_num as u64 * self.ctx.block_size as u64;
			let child = read_block(dev, addr, self.ctx.block_size as usize)?;

			if is_indirect_block(&block_as_u32s(&child), self.ctx.total_blocks) {
				let last_entry = self.add_blocks_from(dev, &child, recovered)?;
				if i + 1 == pointers.len() {
					return Ok(last_entry);
				}
			} else {
				recovered.push(BlockEntry {
					addr,
					block_num,
					size_hint: self.ctx.block_size,
				});
			}
		}

		Ok(last)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Cursor;

	fn ctx(block_size: u32, total_blocks: u32) -> PartitionContext {
		PartitionContext {
			partition_addr: 0,
			block_size,
			total_blocks,
		}
	}

	#[test]
	fn recovers_direct_blocks_only_when_no_indirect_matches() {
		let block_size = 1024;
		let c = ctx(block_size, 100_000);
		let buf = vec![0u8; block_size as usize * 20];
		let mut dev = Cursor::new(buf);

		let reassembler = Reassembler::new(c);
		let first_block = BlockEntry {
			addr: 0,
			block_num: 0,
			size_hint: 1,
		};

		let recovered = reassembler.recover(&mut dev, &first_block, &[]).unwrap();
		assert_eq!(recovered.len(), 12);
		assert_eq!(recovered[0].block_num, 0);
		assert_eq!(recovered[11].block_num, 11);
		assert_eq!(recovered[5].addr, 5 * block_size as u64);
	}

	#[test]
	fn recovers_single_indirect_layer() {
		let block_size = 1024;
		let c = ctx(block_size, 100_000);
		let journal_threshold = c.blocks_per_group_bitmap();

		// Blocks 0..11 are direct. The single indirect block sits past the journal
		// threshold (a candidate below it would be rejected by the journal heuristic --
		// see `indirect_block_inside_journal_region_is_ignored`); its content's first two
		// pointers (12, 13) continue the expected data-block sequence right after the
		// direct blocks.
		let indirect_block_num = journal_threshold + 8;
		let mut disk = vec![0u8; block_size as usize * (indirect_block_num as usize + 4)];

		let indirect_off = indirect_block_num as usize * block_size as usize;
		disk[indirect_off..indirect_off + 4].copy_from_slice(&12u32.to_le_bytes());
		disk[indirect_off + 4..indirect_off + 8].copy_from_slice(&13u32.to_le_bytes());

		let mut dev = Cursor::new(disk);
		let reassembler = Reassembler::new(c);

		let first_block = BlockEntry {
			addr: 0,
			block_num: 0,
			size_hint: 1,
		};
		let indirect_blocks = vec![BlockEntry {
			addr: indirect_block_num as u64 * block_size as u64,
			block_num: indirect_block_num,
			size_hint: 1,
		}];

		let recovered = reassembler.recover(&mut dev, &first_block, &indirect_blocks).unwrap();

		// 12 direct blocks + 2 data blocks recovered from the single indirect layer.
		assert_eq!(recovered.len(), 14);
		assert_eq!(recovered[12].block_num, 12);
		assert_eq!(recovered[13].block_num, 13);
	}

	#[test]
	fn indirect_block_inside_journal_region_is_ignored() {
		let block_size = 1024;
		let c = ctx(block_size, 100_000);
		let journal_threshold = c.blocks_per_group_bitmap();

		let mut disk = vec![0u8; block_size as usize * (journal_threshold as usize + 4)];
		// A candidate sitting inside the journal region whose first pointer matches.
		let off = 5 * block_size as usize;
		disk[off..off + 4].copy_from_slice(&12u32.to_le_bytes());

		let mut dev = Cursor::new(disk);
		let reassembler = Reassembler::new(c);
		let first_block = BlockEntry {
			addr: 0,
			block_num: 0,
			size_hint: 1,
		};
		let indirect_blocks = vec![BlockEntry {
			addr: 5 * block_size as u64,
			block_num: 5, // well under journal_threshold
			size_hint: 1,
		}];

		let recovered = reassembler.recover(&mut dev, &first_block, &indirect_blocks).unwrap();
		// Journal-region candidate must be skipped -- only the 12 direct blocks recovered.
		assert_eq!(recovered.len(), 12);
	}

	#[test]
	fn add_blocks_from_recurses_into_a_nested_indirect_child() {
		let block_size = 1024;
		let c = ctx(block_size, 100_000);

		// Indirect block I (9000) holds two leaf pointers (12, 13) and, in its own last
		// slot, a pointer to a nested indirect block (9001) -- the only slot position where
		// `add_blocks_from` must override its own last-pointer bookkeeping with the child's.
		// Nested block 9001 is itself a run of 4 leaf pointers (2001..2004) followed by an
		// all-zero tail, which is exactly what `is_indirect_block` classifies as indirect.
		let i_block_num = 9000u32;
		let nested_block_num = 9001u32;
		let mut disk = vec![0u8; block_size as usize * (nested_block_num as usize + 1)];

		let i_off = i_block_num as usize * block_size as usize;
		disk[i_off..i_off + 4].copy_from_slice(&12u32.to_le_bytes());
		disk[i_off + 4..i_off + 8].copy_from_slice(&13u32.to_le_bytes());
		let last_slot_off = i_off + 255 * 4;
		disk[last_slot_off..last_slot_off + 4].copy_from_slice(&nested_block_num.to_le_bytes());

		let nested_off = nested_block_num as usize * block_size as usize;
		for (slot, value) in [2001u32, 2002, 2003, 2004].into_iter().enumerate() {
			let off = nested_off + slot * 4;
			disk[off..off + 4].copy_from_slice(&value.to_le_bytes());
		}

		let mut dev = Cursor::new(disk);
		let reassembler = Reassembler::new(c);
		let first_block = BlockEntry {
			addr: 0,
			block_num: 0,
			size_hint: 1,
		};
		let indirect_blocks = vec![BlockEntry {
			addr: i_off as u64,
			block_num: i_block_num,
			size_hint: 1,
		}];

		let recovered = reassembler.recover(&mut dev, &first_block, &indirect_blocks).unwrap();

		// 12 direct + [12, 13] from I's own leaves + [2001, 2002, 2003, 2004] from the
		// nested child reached through I's last slot.
		assert_eq!(recovered.len(), 18);
		let tail: Vec<u32> = recovered[12..].iter().map(|e| e.block_num).collect();
		assert_eq!(tail, vec![12, 13, 2001, 2002, 2003, 2004]);
	}

	#[test]
	fn recovers_double_indirect_layer_after_single() {
		let block_size = 1024;
		let c = ctx(block_size, 100_000);

		// Single indirect S (9000): leaves 12, 13, and a nonzero last slot (14) that is
		// itself a plain leaf, not a nested indirect block -- so the single layer's
		// `last_entry` comes out as 14, which is exactly what the double indirect layer D
		// (9500) must pick up from.
		let s_block_num = 9000u32;
		let d_block_num = 9500u32;
		let mut disk = vec![0u8; block_size as usize * (d_block_num as usize + 1)];

		let s_off = s_block_num as usize * block_size as usize;
		disk[s_off..s_off + 4].copy_from_slice(&12u32.to_le_bytes());
		disk[s_off + 4..s_off + 8].copy_from_slice(&13u32.to_le_bytes());
		let s_last_slot_off = s_off + 255 * 4;
		disk[s_last_slot_off..s_last_slot_off + 4].copy_from_slice(&14u32.to_le_bytes());

		let d_off = d_block_num as usize * block_size as usize;
		disk[d_off..d_off + 4].copy_from_slice(&15u32.to_le_bytes());
		disk[d_off + 4..d_off + 8].copy_from_slice(&16u32.to_le_bytes());

		let mut dev = Cursor::new(disk);
		let reassembler = Reassembler::new(c);
		let first_block = BlockEntry {
			addr: 0,
			block_num: 0,
			size_hint: 1,
		};
		let indirect_blocks = vec![
			BlockEntry {
				addr: s_off as u64,
				block_num: s_block_num,
				size_hint: 1,
			},
			BlockEntry {
				addr: d_off as u64,
				block_num: d_block_num,
				size_hint: 1,
			},
		];

		let recovered = reassembler.recover(&mut dev, &first_block, &indirect_blocks).unwrap();

		// 12 direct + [12, 13, 14] (single) + [15, 16] (double).
		assert_eq!(recovered.len(), 17);
		let tail: Vec<u32> = recovered[12..].iter().map(|e| e.block_num).collect();
		assert_eq!(tail, vec![12, 13, 14, 15, 16]);
	}
}
