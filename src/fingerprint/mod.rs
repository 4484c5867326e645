//! Fingerprint boundary.
//!
//! Raw fingerprints arrive from an external extractor as ordered `u32`
//! sequences; `hashing` turns them into the tokens the index is keyed on.

pub mod extraction;
pub mod hashing;
