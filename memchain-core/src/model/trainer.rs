use log::debug;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cache::CacheClient;
use crate::error::ChainResult;
use super::config::{ChainConfig, CleanupPolicy};
use super::context::predecessor_keys;
use super::follower_store::FollowerStore;
use super::look_behind::LookBehind;
use super::token::tokenize;

/// Feeds observed text into the follower store.
///
/// # Responsibilities
/// - Tokenize each text unit with sentinels.
/// - Roll a history window over the token stream and write every
///   (predecessor context, next token) pair through the store.
/// - Trigger the cleanup policy on a fraction of writes.
///
/// Any number of trainers may run against the same cache from
/// independent processes with no coordination; the store's primitives
/// keep arbitrarily interleaved writes safe.
pub struct Trainer<C: CacheClient, R: Rng> {
	store: FollowerStore<C>,
	config: ChainConfig,
	cleanup: CleanupPolicy,
	rng: R,
}

impl<C: CacheClient> Trainer<C, StdRng> {
	/// Creates a trainer with OS-seeded randomness and the default
	/// cleanup policy.
	pub fn new(store: FollowerStore<C>, config: ChainConfig) -> Self {
		Self::with_cleanup(store, config, CleanupPolicy::default())
	}

	/// Creates a trainer with OS-seeded randomness and an explicit
	/// cleanup policy.
	pub fn with_cleanup(store: FollowerStore<C>, config: ChainConfig, cleanup: CleanupPolicy) -> Self {
		Self::with_rng(store, config, cleanup, StdRng::from_os_rng())
	}
}

impl<C: CacheClient, R: Rng> Trainer<C, R> {
	/// Creates a trainer with an explicit random source and cleanup
	/// policy. Tests pass a seeded source and a deterministic policy.
	pub fn with_rng(
		store: FollowerStore<C>,
		config: ChainConfig,
		cleanup: CleanupPolicy,
		rng: R,
	) -> Self {
		Self { store, config, cleanup, rng }
	}

	/// Trains on one text unit.
	///
	/// # Returns
	/// The number of (context, follower) pairs written.
	///
	/// # Errors
	/// - `UnknownTokenKind` if the text holds an unclassifiable
	///   fragment; nothing at or after the fragment is written.
	/// - Cache failures surface as-is. Pairs already written stay
	///   written, and repeating the call is safe.
	pub fn train(&mut self, text: &str) -> ChainResult<usize> {
		let mut window = LookBehind::new(self.config.max_order);
		let mut written = 0;

		for token in tokenize(text, true) {
			let token = token?;
			if !window.is_empty() {
				for ctx in predecessor_keys(&window) {
					self.store.record(&ctx, token.text())?;
					written += 1;
					if self.cleanup.should_run(&mut self.rng) {
						self.store.reconcile(&ctx)?;
					}
				}
			}
			window.append(token);
		}

		debug!("trained {} pairs from {} bytes of text", written, text.len());
		Ok(written)
	}

	/// Trains on a stream of text units, stopping at the first error.
	///
	/// The stream may be lazy and arbitrarily long; units are consumed
	/// one at a time in arrival order.
	///
	/// # Returns
	/// The total number of pairs written across all units.
	pub fn train_all<I>(&mut self, texts: I) -> ChainResult<usize>
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let mut written = 0;
		for text in texts {
			written += self.train(text.as_ref())?;
		}
		Ok(written)
	}
}
