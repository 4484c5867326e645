//! Upstream fingerprint extraction.
//!
//! Decoding audio and computing the raw acoustic fingerprint is delegated to
//! Chromaprint's `fpcalc`. This module only runs it and parses what it prints.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;

use crate::errors::{ResonateError, Result};

/// Raw fingerprint plus the clip duration reported by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub fingerprint: Vec<u32>,
    pub duration: f64,
}

#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Extracted>;
}

/// Runs `fpcalc -raw -json <file>`.
#[derive(Debug, Clone)]
pub struct Fpcalc {
    program: PathBuf,
}

impl Fpcalc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait::async_trait]
impl Extractor for Fpcalc {
    async fn extract(&self, path: &Path) -> Result<Extracted> {
        let output = Command::new(&self.program)
            .arg("-raw")
            .arg("-json")
            .arg(path)
            .output()
            .await
            .map_err(|e| ResonateError::Extract(
                format!("failed to run {}: {e}", self.program.display())
            ))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResonateError::Extract(
                format!("{} exited with {}: {}", path.display(), output.status, stderr.trim())
            ));
        }

        parse_fpcalc_json(&output.stdout)
    }
}

#[derive(Deserialize)]
struct FpcalcOutput {
    duration: f64,
    fingerprint: Vec<i64>,
}

/// Parse `fpcalc -raw -json` output.
///
/// Items printed as signed integers are taken as their 32-bit pattern.
pub fn parse_fpcalc_json(bytes: &[u8]) -> Result<Extracted> {
    let raw: FpcalcOutput = serde_json::from_slice(bytes)?;

    let fingerprint = raw.fingerprint
        .into_iter()
        .map(|item| {
            u32::try_from(item)
                .or_else(|_| i32::try_from(item).map(|signed| signed as u32))
                .map_err(|_| ResonateError::Parse(
                    format!("fingerprint item {item} does not fit in 32 bits")
                ))
        })
        .collect::<Result<Vec<u32>>>()?;

    Ok(Extracted { fingerprint, duration: raw.duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unsigned_output() {
        let extracted = parse_fpcalc_json(
            br#"{"duration": 12.34, "fingerprint": [1, 4294967295, 7]}"#
        ).unwrap();

        assert_eq!(extracted.duration, 12.34);
        assert_eq!(extracted.fingerprint, vec![1, u32::MAX, 7]);
    }

    #[test]
    fn signed_items_keep_their_bit_pattern() {
        let extracted = parse_fpcalc_json(
            br#"{"duration": 1.0, "fingerprint": [-1, -2147483648]}"#
        ).unwrap();

        assert_eq!(extracted.fingerprint, vec![u32::MAX, 0x8000_0000]);
    }

    #[test]
    fn oversized_items_are_rejected() {
        let err = parse_fpcalc_json(
            br#"{"duration": 1.0, "fingerprint": [8589934592]}"#
        ).unwrap_err();
        assert!(matches!(err, ResonateError::Parse(_)));
    }

    #[test]
    fn compressed_fingerprints_are_rejected() {
        // fpcalc without -raw prints a base64 string instead of an array
        let err = parse_fpcalc_json(
            br#"{"duration": 1.0, "fingerprint": "AQAAT0mUaEkSRZEGAA"}"#
        ).unwrap_err();
        assert!(matches!(err, ResonateError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_program_is_an_extract_error() {
        let fpcalc = Fpcalc::new("/nonexistent/fpcalc-binary");
        let err = fpcalc.extract(Path::new("clip.wav")).await.unwrap_err();
        assert!(matches!(err, ResonateError::Extract(_)));
    }
}
