use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Failure of a single cache operation.
///
/// Operations have at-most-one-attempt semantics: a failed call may or
/// may not have taken effect on the server, and no retry happens at
/// this layer.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	/// The backing cache could not be reached, or the call failed in
	/// transit.
	#[error("cache transport failure: {0}")]
	Transport(String),

	/// An `append` or `increment` target does not exist. The cell may
	/// have been evicted between creation and use.
	#[error("cache cell {key} is missing")]
	Missing {
		/// The key that was targeted.
		key: String,
	},

	/// An `increment` target does not hold a decimal counter.
	#[error("cache cell {key} is not a counter")]
	NotCounter {
		/// The key that was targeted.
		key: String,
	},
}

/// Per-key primitives required from the backing cache.
///
/// Modeled on the memcached command set: whole-value operations on
/// single keys plus batched reads and writes. There are no
/// transactions and no multi-key atomicity. The cache may evict any
/// entry at any time; a missing entry must be treated exactly like one
/// that was never written.
///
/// Writers coordinate only through these primitives: `add` makes
/// racing creation safe, `increment` and `append` make racing updates
/// safe. That is the entire concurrency model.
pub trait CacheClient {
	/// Reads one value. A missing key yields `None`.
	fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

	/// Reads many values in one round trip. Missing keys are absent
	/// from the result.
	fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, String>, CacheError>;

	/// Unconditionally writes one value.
	fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

	/// Writes many values in one round trip.
	fn set_multi(&self, entries: &HashMap<String, String>) -> Result<(), CacheError>;

	/// Creates the entry only if it is absent. Returns whether this
	/// call created it.
	fn add(&self, key: &str, value: &str) -> Result<bool, CacheError>;

	/// Appends `suffix` to an existing value.
	fn append(&self, key: &str, suffix: &str) -> Result<(), CacheError>;

	/// Atomically increments a decimal counter cell and returns the
	/// new value.
	fn increment(&self, key: &str) -> Result<u64, CacheError>;

	/// Removes the entry. Removing a missing entry is not an error.
	fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process [`CacheClient`] with memcached-like semantics.
///
/// Clones share one backing map, the way network cache clients share a
/// connection, so a trainer and a generator built from clones of the
/// same `MemoryCache` see the same state. `delete` doubles as an
/// eviction simulator in tests.
#[derive(Clone, Default)]
pub struct MemoryCache {
	cells: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, CacheError> {
		self.cells
			.lock()
			.map_err(|_| CacheError::Transport("cache mutex poisoned".to_owned()))
	}
}

impl CacheClient for MemoryCache {
	fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
		Ok(self.lock()?.get(key).cloned())
	}

	fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, String>, CacheError> {
		let cells = self.lock()?;
		Ok(keys
			.iter()
			.filter_map(|key| cells.get(key).map(|value| (key.clone(), value.clone())))
			.collect())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
		self.lock()?.insert(key.to_owned(), value.to_owned());
		Ok(())
	}

	fn set_multi(&self, entries: &HashMap<String, String>) -> Result<(), CacheError> {
		let mut cells = self.lock()?;
		for (key, value) in entries {
			cells.insert(key.clone(), value.clone());
		}
		Ok(())
	}

	fn add(&self, key: &str, value: &str) -> Result<bool, CacheError> {
		let mut cells = self.lock()?;
		if cells.contains_key(key) {
			Ok(false)
		} else {
			cells.insert(key.to_owned(), value.to_owned());
			Ok(true)
		}
	}

	fn append(&self, key: &str, suffix: &str) -> Result<(), CacheError> {
		let mut cells = self.lock()?;
		match cells.get_mut(key) {
			Some(value) => {
				value.push_str(suffix);
				Ok(())
			}
			None => Err(CacheError::Missing { key: key.to_owned() }),
		}
	}

	fn increment(&self, key: &str) -> Result<u64, CacheError> {
		let mut cells = self.lock()?;
		match cells.get_mut(key) {
			Some(value) => {
				let current: u64 = value
					.parse()
					.map_err(|_| CacheError::NotCounter { key: key.to_owned() })?;
				let next = current + 1;
				*value = next.to_string();
				Ok(next)
			}
			None => Err(CacheError::Missing { key: key.to_owned() }),
		}
	}

	fn delete(&self, key: &str) -> Result<(), CacheError> {
		self.lock()?.remove(key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn add_creates_only_once() {
		let cache = MemoryCache::new();
		assert!(cache.add("k", "first").unwrap());
		assert!(!cache.add("k", "second").unwrap());
		assert_eq!(cache.get("k").unwrap().as_deref(), Some("first"));
	}

	#[test]
	fn append_requires_existing_cell() {
		let cache = MemoryCache::new();
		assert!(matches!(
			cache.append("k", "|x"),
			Err(CacheError::Missing { .. })
		));
		cache.add("k", "").unwrap();
		cache.append("k", "|x").unwrap();
		cache.append("k", "|y").unwrap();
		assert_eq!(cache.get("k").unwrap().as_deref(), Some("|x|y"));
	}

	#[test]
	fn increment_counts_upward() {
		let cache = MemoryCache::new();
		cache.add("n", "0").unwrap();
		assert_eq!(cache.increment("n").unwrap(), 1);
		assert_eq!(cache.increment("n").unwrap(), 2);
		assert_eq!(cache.get("n").unwrap().as_deref(), Some("2"));
	}

	#[test]
	fn increment_rejects_non_counters() {
		let cache = MemoryCache::new();
		cache.set("n", "not a number").unwrap();
		assert!(matches!(
			cache.increment("n"),
			Err(CacheError::NotCounter { .. })
		));
		assert!(matches!(
			cache.increment("gone"),
			Err(CacheError::Missing { .. })
		));
	}

	#[test]
	fn get_multi_omits_missing_keys() {
		let cache = MemoryCache::new();
		cache.set("a", "1").unwrap();
		cache.set("b", "2").unwrap();
		let got = cache
			.get_multi(&["a".to_owned(), "b".to_owned(), "c".to_owned()])
			.unwrap();
		assert_eq!(got.len(), 2);
		assert_eq!(got.get("a").map(String::as_str), Some("1"));
		assert!(!got.contains_key("c"));
	}

	#[test]
	fn set_multi_writes_every_entry() {
		let cache = MemoryCache::new();
		let entries: HashMap<String, String> = [("a", "1"), ("b", "2")]
			.into_iter()
			.map(|(k, v)| (k.to_owned(), v.to_owned()))
			.collect();
		cache.set_multi(&entries).unwrap();
		assert_eq!(cache.get("a").unwrap().as_deref(), Some("1"));
		assert_eq!(cache.get("b").unwrap().as_deref(), Some("2"));
	}

	#[test]
	fn clones_share_state() {
		let cache = MemoryCache::new();
		let other = cache.clone();
		cache.set("k", "v").unwrap();
		assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
		other.delete("k").unwrap();
		assert_eq!(cache.get("k").unwrap(), None);
	}
}
