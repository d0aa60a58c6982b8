//! Top-level module for the cache-backed Markov model.
//!
//! This module provides the whole write and read path of the model:
//! - Tokenization and display reconstruction (`token`)
//! - A bounded history window (`look_behind`)
//! - Context addressing across orders (`context`)
//! - The cache-backed follower statistics (`follower_store`)
//! - Ingestion (`trainer`) and sampling (`generator`)

/// Shared tunables and the cleanup trigger policy.
pub mod config;

/// Context keys and predecessor enumeration.
///
/// Maps ordered token suffixes to compact, order-disambiguated cache
/// keys.
pub mod context;

/// Cache-backed representation of "given context C, which tokens
/// followed, how often".
///
/// Provides the accumulate, weighted-lookup and reconciliation
/// operations.
pub mod follower_store;

/// Multi-order weighted sampling of new token sequences.
pub mod generator;

/// Bounded, order-preserving window over recently observed tokens.
pub mod look_behind;

/// Tokens, sentinels, tokenization and detokenization.
pub mod token;

/// Ingestion of text streams into the follower store.
pub mod trainer;
