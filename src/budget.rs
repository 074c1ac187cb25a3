//! Size limits for a single repository run.

use crate::error::{Error, Result};
use crate::filter::SkipReason;

const BYTES_PER_KB: u64 = 1024;

/// Default cap on the knowledge file body, in KB.
pub const DEFAULT_MAX_OUTPUT_SIZE_KB: u64 = 500;

/// Default cap on an individual source file, in KB.
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 50;

/// Per-file and cumulative byte limits.
///
/// Both limits are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBudget {
    max_file_bytes: u64,
    max_output_bytes: u64,
}

impl SizeBudget {
    /// Builds a budget from kilobyte limits.
    ///
    /// # Errors
    ///
    /// Returns an error if either limit is zero or overflows when converted
    /// to bytes.
    pub fn from_kb(max_file_size_kb: u64, max_output_size_kb: u64) -> Result<Self> {
        Ok(Self {
            max_file_bytes: kb_to_bytes("max_file_size_kb", max_file_size_kb)?,
            max_output_bytes: kb_to_bytes("max_output_size_kb", max_output_size_kb)?,
        })
    }

    /// Largest file, in bytes, that may be read.
    #[must_use]
    pub const fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Output size, in bytes, at which a run stops.
    #[must_use]
    pub const fn max_output_bytes(&self) -> u64 {
        self.max_output_bytes
    }

    /// Rejects a file whose on-disk size exceeds the per-file limit.
    ///
    /// # Errors
    ///
    /// Returns [`SkipReason::Oversized`] when the file is too large.
    pub fn check_file_size(&self, size: u64) -> std::result::Result<(), SkipReason> {
        if size > self.max_file_bytes {
            return Err(SkipReason::Oversized {
                size,
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Returns true if a block of `projected` bytes still fits after
    /// `running` bytes have been accumulated.
    #[must_use]
    pub const fn fits(&self, running: u64, projected: u64) -> bool {
        running.saturating_add(projected) <= self.max_output_bytes
    }

    /// Returns true once the accumulated output has reached the limit.
    #[must_use]
    pub const fn is_exhausted(&self, running: u64) -> bool {
        running >= self.max_output_bytes
    }
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_SIZE_KB * BYTES_PER_KB,
            max_output_bytes: DEFAULT_MAX_OUTPUT_SIZE_KB * BYTES_PER_KB,
        }
    }
}

fn kb_to_bytes(name: &str, kb: u64) -> Result<u64> {
    if kb == 0 {
        return Err(Error::config(format!("{name} must be greater than 0")));
    }
    kb.checked_mul(BYTES_PER_KB)
        .ok_or_else(|| Error::config(format!("{name} ({kb}) is too large")))
}
