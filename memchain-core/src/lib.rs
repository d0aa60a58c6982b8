//! Cache-backed Markov chain text model.
//!
//! This crate provides a variable-order Markov text model whose only
//! persistent state lives in an external, lossy key-value cache:
//! - Token-level ingestion with follower statistics keyed by context
//! - Multi-order weighted sampling (longer contexts dominate)
//! - A cache abstraction with memcached-style per-key primitives
//!
//! The cache is allowed to evict any entry at any time. Every read path
//! treats a missing entry exactly like one that was never written, so
//! the model degrades gracefully instead of failing as entries
//! disappear.

/// Cache client abstraction and the in-process backend.
///
/// Defines the per-key primitives the model relies on (create-if-absent,
/// atomic increment, append, batched reads) and an in-memory
/// implementation used by demos and tests.
pub mod cache;

/// Error types shared across the crate.
pub mod error;

/// Core model: tokens, history, context addressing, storage, training
/// and generation.
pub mod model;
