use std::collections::{HashMap, HashSet};

use log::{debug, trace, warn};

use crate::cache::CacheClient;
use crate::error::ChainResult;
use super::context::ContextKey;

/// Delimiter of the follower-list cell. No token class may ever
/// produce it.
const LIST_DELIMITER: char = '|';

/// Cache-backed representation of "given context C, which tokens
/// followed, how often".
///
/// A follower record is split across cache cells because the cache
/// offers only whole-value operations on single keys: the follower
/// texts live in one delimited list cell under the context key, and
/// each (context, follower) pair gets its own counter cell. Counts stay
/// cheaply incrementable and the list stays discoverable from the
/// context key alone.
///
/// # Invariants
/// - The list is a superset of the followers holding a live counter;
///   eviction can only widen that gap, reconciliation closes it.
/// - Counters only grow while they live. An absent counter reads as
///   zero.
pub struct FollowerStore<C: CacheClient> {
	cache: C,
}

impl<C: CacheClient> FollowerStore<C> {
	/// Wraps a cache client.
	pub fn new(cache: C) -> Self {
		Self { cache }
	}

	/// Records one observation of `follower` after the context `ctx`.
	///
	/// # Behavior
	/// - Ensures the list cell exists, then appends the follower text.
	///   The list may accumulate duplicates; deduplication is deferred
	///   to [`reconcile`](Self::reconcile).
	/// - Ensures the counter cell exists, then increments it.
	///
	/// Only create-if-absent and atomic increment/append are used, so
	/// arbitrarily interleaved writers never corrupt state: at worst
	/// they race on creation, which `add` resolves, or interleave
	/// increments, which stay commutative.
	pub fn record(&self, ctx: &ContextKey, follower: &str) -> ChainResult<()> {
		let list_key = ctx.cache_key();
		self.cache.add(&list_key, "")?;
		self.cache.append(&list_key, &format!("{}{}", LIST_DELIMITER, follower))?;

		let count_key = ctx.count_key(follower);
		self.cache.add(&count_key, "0")?;
		let count = self.cache.increment(&count_key)?;
		trace!("recorded {} -> {:?} (count {})", list_key, follower, count);
		Ok(())
	}

	/// Returns the followers of `ctx` holding a live, positive counter.
	///
	/// A missing context, or one whose counters were all evicted,
	/// yields an empty map. Never an error: absence and zero are
	/// indistinguishable by design.
	pub fn weighted_followers(&self, ctx: &ContextKey) -> ChainResult<HashMap<String, u64>> {
		let mut resolved = self.followers_for(std::slice::from_ref(ctx))?;
		Ok(resolved.pop().map(|(_, followers)| followers).unwrap_or_default())
	}

	/// Batched [`weighted_followers`](Self::weighted_followers) across
	/// several contexts.
	///
	/// Reads every follower list in one round trip and every counter
	/// cell in a second one, then keeps only the contexts that resolved
	/// to at least one positive counter.
	pub fn followers_for(
		&self,
		contexts: &[ContextKey],
	) -> ChainResult<Vec<(ContextKey, HashMap<String, u64>)>> {
		let list_keys: Vec<String> = contexts.iter().map(ContextKey::cache_key).collect();
		let lists = self.cache.get_multi(&list_keys)?;

		// One counter key may be referenced several times by a
		// duplicated list entry; resolve each exactly once.
		let mut count_keys = Vec::new();
		let mut owners: HashMap<String, (usize, String)> = HashMap::new();
		for (i, ctx) in contexts.iter().enumerate() {
			let Some(raw) = lists.get(&list_keys[i]) else { continue };
			for follower in split_followers(raw) {
				let count_key = ctx.count_key(follower);
				if owners.insert(count_key.clone(), (i, follower.to_owned())).is_none() {
					count_keys.push(count_key);
				}
			}
		}
		if count_keys.is_empty() {
			return Ok(Vec::new());
		}

		let counts = self.cache.get_multi(&count_keys)?;

		let mut per_context: Vec<HashMap<String, u64>> = vec![HashMap::new(); contexts.len()];
		for (count_key, raw) in &counts {
			let Some((i, follower)) = owners.get(count_key) else { continue };
			match raw.parse::<u64>() {
				Ok(count) if count > 0 => {
					per_context[*i].insert(follower.clone(), count);
				}
				Ok(_) => (),
				Err(_) => warn!("counter cell {} holds non-numeric {:?}", count_key, raw),
			}
		}

		Ok(contexts
			.iter()
			.cloned()
			.zip(per_context)
			.filter(|(_, followers)| !followers.is_empty())
			.collect())
	}

	/// Rebuilds the follower list of `ctx` from its surviving counters.
	///
	/// Deduplicates the list, drops followers whose counter cell is
	/// gone, and either rewrites the list cell or deletes it when
	/// nothing survives. Idempotent, and never required for read
	/// correctness; it only bounds the long-run growth of stale list
	/// entries.
	pub fn reconcile(&self, ctx: &ContextKey) -> ChainResult<()> {
		let list_key = ctx.cache_key();
		let Some(raw) = self.cache.get(&list_key)? else {
			return Ok(());
		};

		let mut seen = HashSet::new();
		let followers: Vec<&str> = split_followers(&raw)
			.filter(|follower| seen.insert(*follower))
			.collect();
		let count_keys: Vec<String> = followers
			.iter()
			.map(|follower| ctx.count_key(follower))
			.collect();
		let counts = self.cache.get_multi(&count_keys)?;

		let survivors: Vec<&str> = followers
			.iter()
			.zip(&count_keys)
			.filter(|(_, count_key)| {
				counts
					.get(*count_key)
					.and_then(|raw| raw.parse::<u64>().ok())
					.unwrap_or(0) > 0
			})
			.map(|(follower, _)| *follower)
			.collect();

		if survivors.is_empty() {
			debug!("reconcile {}: nothing survived, deleting list", list_key);
			self.cache.delete(&list_key)?;
		} else {
			debug!(
				"reconcile {}: kept {} of {} list entries",
				list_key,
				survivors.len(),
				followers.len()
			);
			let mut joined = String::new();
			for survivor in survivors {
				joined.push(LIST_DELIMITER);
				joined.push_str(survivor);
			}
			self.cache.set(&list_key, &joined)?;
		}
		Ok(())
	}
}

/// Splits a raw list cell into follower texts, dropping empty
/// segments.
fn split_followers(raw: &str) -> impl Iterator<Item = &str> {
	raw.split(LIST_DELIMITER).filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
	use crate::cache::MemoryCache;
	use crate::model::token::Token;

	use super::*;

	fn context(texts: &[&str]) -> ContextKey {
		let tokens: Vec<Token> = texts.iter().map(|t| Token::plain(t).unwrap()).collect();
		let refs: Vec<&Token> = tokens.iter().collect();
		ContextKey::from_tokens(&refs)
	}

	#[test]
	fn record_accumulates_counts() {
		let cache = MemoryCache::new();
		let store = FollowerStore::new(cache);
		let ctx = context(&["hello"]);

		store.record(&ctx, "world").unwrap();
		store.record(&ctx, "world").unwrap();
		store.record(&ctx, "there").unwrap();

		let followers = store.weighted_followers(&ctx).unwrap();
		assert_eq!(followers.get("world"), Some(&2));
		assert_eq!(followers.get("there"), Some(&1));
		assert_eq!(followers.len(), 2);
	}

	#[test]
	fn unknown_context_reads_empty() {
		let store = FollowerStore::new(MemoryCache::new());
		let followers = store.weighted_followers(&context(&["never", "seen"])).unwrap();
		assert!(followers.is_empty());
	}

	#[test]
	fn evicted_counter_is_excluded_from_reads() {
		let cache = MemoryCache::new();
		let store = FollowerStore::new(cache.clone());
		let ctx = context(&["hello"]);

		store.record(&ctx, "world").unwrap();
		store.record(&ctx, "there").unwrap();
		cache.delete(&ctx.count_key("there")).unwrap();

		let followers = store.weighted_followers(&ctx).unwrap();
		assert_eq!(followers.get("world"), Some(&1));
		assert!(!followers.contains_key("there"));
	}

	#[test]
	fn reconcile_drops_evicted_and_deduplicates() {
		let cache = MemoryCache::new();
		let store = FollowerStore::new(cache.clone());
		let ctx = context(&["hello"]);

		store.record(&ctx, "world").unwrap();
		store.record(&ctx, "world").unwrap();
		store.record(&ctx, "there").unwrap();
		cache.delete(&ctx.count_key("there")).unwrap();

		store.reconcile(&ctx).unwrap();

		let raw = cache.get(&ctx.cache_key()).unwrap().unwrap();
		let entries: Vec<&str> = split_followers(&raw).collect();
		assert_eq!(entries, ["world"]);
	}

	#[test]
	fn reconcile_is_idempotent() {
		let cache = MemoryCache::new();
		let store = FollowerStore::new(cache.clone());
		let ctx = context(&["hello"]);

		store.record(&ctx, "world").unwrap();
		store.record(&ctx, "there").unwrap();
		cache.delete(&ctx.count_key("there")).unwrap();

		store.reconcile(&ctx).unwrap();
		let once = cache.get(&ctx.cache_key()).unwrap();
		let followers_once = store.weighted_followers(&ctx).unwrap();

		store.reconcile(&ctx).unwrap();
		assert_eq!(cache.get(&ctx.cache_key()).unwrap(), once);
		assert_eq!(store.weighted_followers(&ctx).unwrap(), followers_once);
	}

	#[test]
	fn reconcile_deletes_fully_evicted_lists() {
		let cache = MemoryCache::new();
		let store = FollowerStore::new(cache.clone());
		let ctx = context(&["hello"]);

		store.record(&ctx, "world").unwrap();
		cache.delete(&ctx.count_key("world")).unwrap();

		store.reconcile(&ctx).unwrap();
		assert_eq!(cache.get(&ctx.cache_key()).unwrap(), None);

		// Reconciling a now-missing context stays a no-op.
		store.reconcile(&ctx).unwrap();
	}

	#[test]
	fn followers_for_keeps_contexts_separate() {
		let cache = MemoryCache::new();
		let store = FollowerStore::new(cache);
		let short = context(&["b"]);
		let long = context(&["a", "b"]);

		store.record(&short, "x").unwrap();
		store.record(&long, "y").unwrap();
		store.record(&long, "y").unwrap();

		let resolved = store.followers_for(&[short.clone(), long.clone(), context(&["c"])]).unwrap();
		assert_eq!(resolved.len(), 2);
		assert_eq!(resolved[0].0, short);
		assert_eq!(resolved[0].1.get("x"), Some(&1));
		assert_eq!(resolved[1].0, long);
		assert_eq!(resolved[1].1.get("y"), Some(&2));
	}
}
