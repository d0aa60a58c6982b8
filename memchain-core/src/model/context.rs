use std::hash::{BuildHasher, Hasher};

use foldhash::fast::FixedState;

use super::look_behind::LookBehind;
use super::token::Token;

// Every process sharing a cache must produce the same key for the same
// context, so the checksum seed is fixed rather than per-process.
const CHECKSUM_SEED: u64 = 0x6368_6169_6e73;

/// Identifier of a context: a content checksum paired with the
/// context's order (its length in tokens).
///
/// # Invariants
/// - Two contexts of different order never share a key, even when their
///   concatenated text is identical; the order is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
	hash: u64,
	order: usize,
}

impl ContextKey {
	/// Derives the key for an ordered token sequence.
	pub fn from_tokens(tokens: &[&Token]) -> Self {
		let mut hasher = FixedState::with_seed(CHECKSUM_SEED).build_hasher();
		for token in tokens {
			hasher.write(token.text().as_bytes());
		}
		Self { hash: hasher.finish(), order: tokens.len() }
	}

	/// The context's order.
	pub fn order(&self) -> usize {
		self.order
	}

	/// Cache key of the context's follower-list cell.
	pub fn cache_key(&self) -> String {
		format!("{:016x}.{}", self.hash, self.order)
	}

	/// Cache key of the counter cell for `follower`.
	///
	/// The follower text is hashed so counter keys stay short and
	/// cache-safe whatever the token content is.
	pub fn count_key(&self, follower: &str) -> String {
		let mut hasher = FixedState::with_seed(CHECKSUM_SEED).build_hasher();
		hasher.write(follower.as_bytes());
		format!("{}_{:016x}", self.cache_key(), hasher.finish())
	}
}

/// Yields every suffix of the window ending at its most recent token,
/// shortest first.
///
/// A window holding `[a, b, c]` yields `[c]`, `[b, c]`, `[a, b, c]`.
pub fn predecessors(window: &LookBehind<Token>) -> impl Iterator<Item = Vec<&Token>> {
	let ordered = window.ordered();
	let len = ordered.len();
	(1..=len).map(move |order| ordered[len - order..].to_vec())
}

/// Derives the context key of every predecessor context of the window,
/// shortest first.
pub fn predecessor_keys(window: &LookBehind<Token>) -> Vec<ContextKey> {
	predecessors(window)
		.map(|context| ContextKey::from_tokens(&context))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn window(texts: &[&str]) -> LookBehind<Token> {
		let mut window = LookBehind::new(25);
		for text in texts {
			window.append(Token::plain(text).unwrap());
		}
		window
	}

	#[test]
	fn predecessors_are_suffixes_shortest_first() {
		let window = window(&["a", "b", "c"]);
		let contexts: Vec<Vec<String>> = predecessors(&window)
			.map(|ctx| ctx.iter().map(|t| t.text().to_owned()).collect())
			.collect();
		assert_eq!(contexts, [vec!["c"], vec!["b", "c"], vec!["a", "b", "c"]]);
	}

	#[test]
	fn predecessors_cover_every_order_once() {
		for len in 1..=6 {
			let texts: Vec<String> = (0..len).map(|i| format!("t{}", i)).collect();
			let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
			let window = window(&refs);
			let orders: Vec<usize> = predecessor_keys(&window)
				.iter()
				.map(ContextKey::order)
				.collect();
			assert_eq!(orders, (1..=len).collect::<Vec<_>>());
		}
	}

	#[test]
	fn empty_window_has_no_predecessors() {
		let window: LookBehind<Token> = LookBehind::new(25);
		assert!(predecessor_keys(&window).is_empty());
	}

	#[test]
	fn different_orders_never_alias() {
		// Same concatenated content, different order: the keys must
		// still differ.
		let joined = Token::plain("ab").unwrap();
		let first = Token::plain("a").unwrap();
		let second = Token::plain("b").unwrap();
		let one = ContextKey::from_tokens(&[&joined]);
		let two = ContextKey::from_tokens(&[&first, &second]);
		assert_ne!(one.cache_key(), two.cache_key());
	}

	#[test]
	fn identical_contexts_share_a_key() {
		let a = Token::plain("hello").unwrap();
		let b = Token::plain("hello").unwrap();
		assert_eq!(
			ContextKey::from_tokens(&[&a]).cache_key(),
			ContextKey::from_tokens(&[&b]).cache_key()
		);
	}

	#[test]
	fn count_keys_embed_the_context_key() {
		let token = Token::plain("hello").unwrap();
		let ctx = ContextKey::from_tokens(&[&token]);
		let count_key = ctx.count_key("world");
		assert!(count_key.starts_with(&ctx.cache_key()));
		assert_ne!(count_key, ctx.count_key("other"));
	}
}
