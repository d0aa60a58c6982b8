use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cache::CacheClient;
use crate::error::ChainResult;
use super::config::ChainConfig;
use super::context::predecessor_keys;
use super::follower_store::FollowerStore;
use super::look_behind::LookBehind;
use super::token::{END_MARK, Token, detokenize};

/// Samples new token sequences from the follower store.
///
/// Each chain starts from a `Begin` sentinel and walks forward: every
/// predecessor context of the rolling history is queried in one batched
/// read, follower counts are combined across orders with longer
/// contexts weighted more heavily, and the next token is drawn from the
/// combined weights.
///
/// A chain ends when the end sentinel is drawn, or when no context
/// resolves to any follower. The latter is the expected
/// end-of-knowledge condition of a lossy cache, not an error.
pub struct Generator<C: CacheClient, R: Rng> {
	store: FollowerStore<C>,
	config: ChainConfig,
	rng: R,
}

impl<C: CacheClient> Generator<C, StdRng> {
	/// Creates a generator with OS-seeded randomness.
	pub fn new(store: FollowerStore<C>, config: ChainConfig) -> Self {
		Self::with_rng(store, config, StdRng::from_os_rng())
	}
}

impl<C: CacheClient, R: Rng> Generator<C, R> {
	/// Creates a generator with an explicit random source. Tests pass a
	/// seeded source for reproducible draws.
	pub fn with_rng(store: FollowerStore<C>, config: ChainConfig, rng: R) -> Self {
		Self { store, config, rng }
	}

	/// Lazy chain of generated tokens.
	///
	/// Potentially unbounded; callers cap the number of tokens they
	/// take in addition to the two intrinsic stopping conditions.
	pub fn tokens(&mut self) -> TokenChain<'_, C, R> {
		let mut window = LookBehind::new(self.config.max_order);
		window.append(Token::Begin);
		TokenChain { generator: self, window, done: false }
	}

	/// Generates one sentence, capped at `limit` tokens.
	pub fn sentence(&mut self, limit: usize) -> ChainResult<String> {
		let mut tokens = Vec::new();
		for token in self.tokens().take(limit) {
			tokens.push(token?);
		}
		Ok(detokenize(tokens))
	}

	/// Lazy, infinite stream of independently generated sentences.
	///
	/// Consumers impose their own per-item filtering (length limits and
	/// the like) before use.
	pub fn sentences(&mut self, limit: usize) -> Sentences<'_, C, R> {
		Sentences { generator: self, limit }
	}

	/// One sampling step against the current history.
	fn step(&mut self, window: &LookBehind<Token>) -> ChainResult<Option<Token>> {
		let contexts = predecessor_keys(window);
		let resolved = self.store.followers_for(&contexts)?;
		if resolved.is_empty() {
			// Expected once the cache evicts every relevant follower
			// list: a live context always holds at least an end
			// sentinel follower.
			debug!("no followers across {} contexts, ending chain", contexts.len());
			return Ok(None);
		}

		// Combine counts across orders into one weight per follower
		// text, scaled by the context's order so longer contexts
		// dominate. The accumulation is keyed (not order-dependent),
		// and the map iterates sorted by text, so equal draws resolve
		// identically on every run.
		let mut weights: BTreeMap<String, u64> = BTreeMap::new();
		for (ctx, followers) in resolved {
			let order_weight = ctx.order() as u64;
			for (text, count) in followers {
				*weights.entry(text).or_insert(0) += count * order_weight;
			}
		}

		match pick_weighted(&mut self.rng, &weights) {
			Some(text) if text == END_MARK => Ok(None),
			Some(text) => Ok(Some(Token::plain(text)?)),
			None => Ok(None),
		}
	}
}

/// Draws a key with probability proportional to its weight, as if every
/// key were replicated weight-many times in a flat list and one entry
/// drawn uniformly.
///
/// Weights are non-negative integers by type; zero-weight entries can
/// never be drawn, and an empty or all-zero map yields nothing.
fn pick_weighted<'w, R: Rng>(rng: &mut R, weights: &'w BTreeMap<String, u64>) -> Option<&'w str> {
	let total: u64 = weights.values().sum();
	if total == 0 {
		return None;
	}
	let mut draw = rng.random_range(0..total);
	for (text, weight) in weights {
		if draw < *weight {
			return Some(text);
		}
		draw -= *weight;
	}
	None
}

/// Iterator over one generated chain. See [`Generator::tokens`].
pub struct TokenChain<'g, C: CacheClient, R: Rng> {
	generator: &'g mut Generator<C, R>,
	window: LookBehind<Token>,
	done: bool,
}

impl<C: CacheClient, R: Rng> Iterator for TokenChain<'_, C, R> {
	type Item = ChainResult<Token>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.generator.step(&self.window) {
			Ok(Some(token)) => {
				self.window.append(token.clone());
				Some(Ok(token))
			}
			Ok(None) => {
				self.done = true;
				None
			}
			Err(e) => {
				self.done = true;
				Some(Err(e))
			}
		}
	}
}

/// Infinite stream of generated sentences. See
/// [`Generator::sentences`].
pub struct Sentences<'g, C: CacheClient, R: Rng> {
	generator: &'g mut Generator<C, R>,
	limit: usize,
}

impl<C: CacheClient, R: Rng> Iterator for Sentences<'_, C, R> {
	type Item = ChainResult<String>;

	fn next(&mut self) -> Option<Self::Item> {
		Some(self.generator.sentence(self.limit))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pick_weighted_matches_the_two_to_three_ratio() {
		let mut rng = StdRng::seed_from_u64(42);
		let weights: BTreeMap<String, u64> =
			[("a".to_owned(), 2), ("b".to_owned(), 3)].into_iter().collect();

		let draws = 50_000;
		let mut hits_a = 0u32;
		for _ in 0..draws {
			if pick_weighted(&mut rng, &weights) == Some("a") {
				hits_a += 1;
			}
		}

		// Expected 2/5 of the draws, with a band wide enough for noise.
		let ratio = f64::from(hits_a) / f64::from(draws);
		assert!((0.38..=0.42).contains(&ratio), "ratio was {}", ratio);
	}

	#[test]
	fn pick_weighted_skips_zero_weights() {
		let mut rng = StdRng::seed_from_u64(0);
		let weights: BTreeMap<String, u64> =
			[("dead".to_owned(), 0), ("live".to_owned(), 1)].into_iter().collect();
		for _ in 0..50 {
			assert_eq!(pick_weighted(&mut rng, &weights), Some("live"));
		}
	}

	#[test]
	fn pick_weighted_yields_nothing_without_weight() {
		let mut rng = StdRng::seed_from_u64(0);
		assert_eq!(pick_weighted(&mut rng, &BTreeMap::new()), None);
		let all_zero: BTreeMap<String, u64> = [("a".to_owned(), 0)].into_iter().collect();
		assert_eq!(pick_weighted(&mut rng, &all_zero), None);
	}
}
