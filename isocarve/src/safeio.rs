//! Positioned reads against a device handle.
//!
//! Every other module goes through [`read_at`] rather than calling `seek`/`read_exact`
//! directly, so there is exactly one place that defines what a "block read" means. A
//! partial read (short read, past end-of-device) surfaces as `io::ErrorKind::UnexpectedEof`
//! the same way `read_exact` already reports it; callers at the CLI boundary are expected
//! to treat any `io::Error` here as fatal, mirroring the original's `safeRead`/`exit_err`.

use std::io::{self, Read, Seek, SeekFrom};

/// Reads exactly `buf.len()` bytes from `dev` starting at absolute byte offset `addr`.
pub fn read_at<D: Read + Seek>(dev: &mut D, addr: u64, buf: &mut [u8]) -> io::Result<()> {
	dev.seek(SeekFrom::Start(addr))?;
	dev.read_exact(buf)
}

/// Reads a single block (`block_size` bytes) at `addr`.
pub fn read_block<D: Read + Seek>(dev: &mut D, addr: u64, block_size: usize) -> io::Result<Vec<u8>> {
	let mut buf = vec![0u8; block_size];
	read_at(dev, addr, &mut buf)?;
	Ok(buf)
}
