//! Lazily loads block-group data bitmaps to answer "is this block allocated?".
//!
//! Grounded on `mkfs::ext2::BlockGroupDescriptor::get_disk_offset`/`read` for the
//! descriptor-table addressing arithmetic, generalized here from "the group containing a
//! fixed inode" to "an arbitrary group requested during a linear block scan".

use crate::context::PartitionContext;
use crate::error::CarveError;
use crate::safeio::{read_at, read_block};
use crate::superblock::{SuperBlock, SUPERBLOCK_OFFSET};
use std::io::{self, Read, Seek};

/// Size in bytes of one block group descriptor; only the first 4 bytes (the block bitmap's
/// block number) are used here.
const GROUP_DESC_SIZE: u32 = 32;

/// Caches one block group's data bitmap at a time and answers allocation queries against it.
pub struct BitmapOracle {
	current_group: Option<u32>,
	bitmap: Vec<u8>,
}

impl BitmapOracle {
	/// Creates an oracle with nothing cached; the first query always triggers a load.
	pub fn new() -> Self {
		Self {
			current_group: None,
			bitmap: Vec::new(),
		}
	}

	/// Returns whether `block_num` is allocated, reloading the bitmap if the block belongs
	/// to a different group than the one currently cached.
	///
	/// Fails with [`CarveError::InvalidBackupSuperblock`] (via its `io::Error` conversion) if
	/// the integrity cross-check rejects this group; any other I/O error is a plain device
	/// read failure.
	pub fn is_allocated<D: Read + Seek>(
		&mut self,
		dev: &mut D,
		ctx: &PartitionContext,
		block_num: u32,
	) -> io::Result<bool> {
		let blocks_per_group = ctx.blocks_per_group_bitmap();
		let group = block_num / blocks_per_group;

		if self.current_group != Some(group) {
			self.reload(dev, ctx, group, block_num)?;
		}

		let bit = block_num % blocks_per_group;
		let byte = self.bitmap[(bit / 8) as usize];
		Ok((byte >> (bit % 8)) & 1 != 0)
	}

	fn reload<D: Read + Seek>(
		&mut self,
		dev: &mut D,
		ctx: &PartitionContext,
		group: u32,
		block_num: u32,
	) -> io::Result<()> {
		self.integrity_check(dev, ctx, group, block_num)?;

		let bitmap_addr = Self::bitmap_addr(dev, ctx, group)?;
		self.bitmap = read_block(dev, bitmap_addr, ctx.block_size as usize)?;
		self.current_group = Some(group);
		Ok(())
	}

	/// Rereads the backup superblock for groups `{0, 1}` and pure powers of 3, 5, or 7, as a
	/// sanity check that the partition table points into the right region. Returns an error
	/// (treated as fatal by the caller) if the magic doesn't match.
	fn integrity_check<D: Read + Seek>(
		&self,
		dev: &mut D,
		ctx: &PartitionContext,
		group: u32,
		block_num: u32,
	) -> io::Result<()> {
		let is_checked_group =
			group == 0 || group == 1 || is_power_of(group, 3) || is_power_of(group, 5) || is_power_of(group, 7);
		if !is_checked_group {
			return Ok(());
		}

		let mut addr = ctx.partition_addr + block_num as u64 * ctx.block_size as u64;
		if group == 0 {
			addr += SUPERBLOCK_OFFSET;
		}

		let backup = SuperBlock::read(dev, addr)?;
		if !backup.is_valid() {
			return Err(CarveError::InvalidBackupSuperblock { addr }.into());
		}
		Ok(())
	}

	/// Computes the address of block group `group`'s data bitmap, by locating its group
	/// descriptor (striding through the descriptor table a block at a time) and reading the
	/// block-bitmap field at offset 0.
	fn bitmap_addr<D: Read + Seek>(dev: &mut D, ctx: &PartitionContext, group: u32) -> io::Result<u64> {
		let descs_per_block = ctx.block_size / GROUP_DESC_SIZE;
		let table_block_addr =
			ctx.partition_addr + ctx.block_size as u64 + (group / descs_per_block) as u64 * ctx.block_size as u64;

		let offset = (group % descs_per_block) as usize * GROUP_DESC_SIZE as usize;
		let mut bitmap_block_num_buf = [0u8; 4];
		read_at(dev, table_block_addr + offset as u64, &mut bitmap_block_num_buf)?;
		let bitmap_block_num = u32::from_le_bytes(bitmap_block_num_buf);

		Ok(ctx.partition_addr + bitmap_block_num as u64 * ctx.block_size as u64)
	}
}

impl Default for BitmapOracle {
	fn default() -> Self {
		Self::new()
	}
}

/// Returns whether `num` is an exact power of `base` (`base > 1`).
fn is_power_of(num: u32, base: u32) -> bool {
	if base <= 1 {
		return num == 1;
	}
	let mut power: u64 = 1;
	while power < num as u64 {
		power *= base as u64;
	}
	power == num as u64
}
