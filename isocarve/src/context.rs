//! Immutable-after-init state shared by every component of a single scan/recovery run.
//!
//! The original threads `deviceID`, `partition_addr`, `blockSize`, and `totalBlocks` through
//! module-level globals. This crate bundles the read-only ones into `PartitionContext` and
//! passes it by reference; the device handle, bitmap cache, and pools stay as ordinary owned
//! values held by the caller.

/// The address of a partition, its block size, and its total block count -- everything
/// derived once from the MBR and superblock that every later component needs.
#[derive(Clone, Copy, Debug)]
pub struct PartitionContext {
	/// Absolute byte offset of the partition on the device.
	pub partition_addr: u64,
	/// Block size in bytes (always a power of two, >= 1024).
	pub block_size: u32,
	/// Total number of blocks in the partition's filesystem.
	pub total_blocks: u32,
}

impl PartitionContext {
	/// The absolute byte address of block `block_num` within this partition.
	pub fn block_addr(&self, block_num: u32) -> u64 {
		self.partition_addr + block_num as u64 * self.block_size as u64
	}

	/// Number of blocks covered by one block-group bitmap (one bit per block, one block
	/// of bitmap bits per group): `block_size * 8`.
	pub fn blocks_per_group_bitmap(&self) -> u32 {
		self.block_size * 8
	}
}
