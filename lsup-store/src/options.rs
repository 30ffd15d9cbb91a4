use std::fs;
use std::path::Path;

use error::{ErrorKind, Result};
use hash::Seed;

// LMDB's main data file inside the environment directory.
const DATA_FILE: &'static str = "data.mdb";

/// Store options.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
	/// Maximum size of the memory map in bytes. Must be at least as large as
	/// the existing data file when reopening a store.
	pub map_size: usize,
	/// Number of reader slots.
	pub readers_max: u32,
	/// Skip fsync on commit. Trades durability for write throughput.
	pub no_sync: bool,
	/// Term hash seed. Must not change after bootstrap.
	pub hash_seed: Seed,
}

impl Default for Options {
	fn default() -> Self {
		Options {
			map_size: 1024 * 1024 * 1024,
			readers_max: 126,
			no_sync: false,
			hash_seed: Seed::default(),
		}
	}
}

impl Options {
	/// Replaces the hash seed with one parsed from 32 hex characters.
	pub fn with_seed_hex(mut self, hex: &str) -> Result<Options> {
		self.hash_seed = Seed::from_hex(hex)?;
		Ok(self)
	}

	pub(crate) fn validate<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		if self.map_size == 0 {
			bail!(ErrorKind::InvalidOptions("map_size", "must not be 0.".into()));
		}
		if self.readers_max == 0 {
			bail!(ErrorKind::InvalidOptions("readers_max", "must not be 0.".into()));
		}

		let data_file = path.as_ref().join(DATA_FILE);
		if let Ok(meta) = fs::metadata(&data_file) {
			if meta.len() > self.map_size as u64 {
				bail!(ErrorKind::InvalidOptions(
					"map_size",
					format!("{} is smaller than the existing data file ({} bytes)", self.map_size, meta.len())
				));
			}
		}

		Ok(())
	}
}
