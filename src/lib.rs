//! Resonate: identify short, noisy audio clips against a catalog of tracks.
//!
//! Raw acoustic fingerprints (from Chromaprint's `fpcalc`) are cut into
//! overlapping windows, each window hashed into a token, and the tokens
//! indexed per track. A query clip is tokenised the same way; tracks sharing
//! tokens with it are scored on coverage and time alignment and the best one
//! above the acceptance threshold wins.

pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod persistance;
pub mod routes;
pub mod server;
