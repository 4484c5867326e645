use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;

/// 64-bit digest of one fingerprint window, shown as 16 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashToken(pub u64);

impl HashToken {
    /// Digest a window of fingerprint values.
    ///
    /// Every value goes into MD5 as four little-endian bytes and the first
    /// eight digest bytes become the token, so the result is the same on every
    /// machine and in every process.
    pub fn from_window(window: &[u32]) -> Self {
        let mut context = md5::Context::new();
        for value in window {
            context.consume(value.to_le_bytes());
        }
        let digest = context.compute();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.0[..8]);
        HashToken(u64::from_be_bytes(head))
    }

    /// Bit pattern used for the SQLite `INTEGER` column.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn from_i64(raw: i64) -> Self {
        HashToken(raw as u64)
    }
}

impl fmt::Display for HashToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub hash: HashToken,
    pub offset: f64,
}

/// Slide the configured window across `fingerprint` one position at a time.
///
/// Window `i` is stamped with offset `i * unit_time`. Fingerprints shorter
/// than the window yield nothing. `ScoringConfig` guarantees a window of at
/// least one value.
pub fn generate_tokens(fingerprint: &[u32], config: &ScoringConfig) -> Vec<Token> {
    let window_size = config.window_size();
    let unit_time = config.unit_time();
    if fingerprint.len() < window_size {
        return vec![];
    }

    fingerprint
        .par_windows(window_size)
        .enumerate()
        .map(|(i, window)| Token {
            hash: HashToken::from_window(window),
            offset: i as f64 * unit_time,
        })
        .collect()
}
