use rand::Rng;

use crate::error::{ChainError, ChainResult};

/// Tunables shared by the trainer and the generator.
///
/// Both sides of a deployment must agree on `max_order`: it bounds the
/// history window, and with it the set of contexts that ever get keys.
#[derive(Debug, Clone)]
pub struct ChainConfig {
	/// Maximum context order (history window size in tokens).
	pub max_order: usize,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self { max_order: 25 }
	}
}

/// Decides when a write should be followed by a cleanup pass.
///
/// Cleanup is never required for read correctness (reads filter by
/// counter presence on their own); it only bounds the growth of stale
/// follower-list entries. Keeping the trigger a value instead of an
/// inline random draw makes training deterministic under test.
#[derive(Debug, Clone)]
pub enum CleanupPolicy {
	/// Never reconcile inline.
	Never,
	/// Reconcile on every n-th write.
	EveryNth {
		/// Interval between cleanup passes.
		n: u64,
		/// Writes seen since the last pass.
		seen: u64,
	},
	/// Reconcile each write with probability `p`.
	Sampled {
		/// Probability in [0.0, 1.0].
		p: f64,
	},
}

impl CleanupPolicy {
	/// Every n-th write. An `n` of zero disables cleanup.
	pub fn every(n: u64) -> Self {
		if n == 0 { Self::Never } else { Self::EveryNth { n, seen: 0 } }
	}

	/// Sampled with probability `p` per write.
	///
	/// # Errors
	/// Rejects probabilities outside [0.0, 1.0].
	pub fn sampled(p: f64) -> ChainResult<Self> {
		if !(0.0..=1.0).contains(&p) {
			return Err(ChainError::Config(format!(
				"cleanup probability must be between 0.0 and 1.0, got {}",
				p
			)));
		}
		Ok(Self::Sampled { p })
	}

	/// Consults the policy for one write.
	pub(crate) fn should_run<R: Rng>(&mut self, rng: &mut R) -> bool {
		match self {
			Self::Never => false,
			Self::EveryNth { n, seen } => {
				*seen += 1;
				if *seen >= *n {
					*seen = 0;
					true
				} else {
					false
				}
			}
			Self::Sampled { p } => rng.random_bool(*p),
		}
	}
}

impl Default for CleanupPolicy {
	/// Roughly one cleanup per hundred writes.
	fn default() -> Self {
		Self::Sampled { p: 1.0 / 101.0 }
	}
}

#[cfg(test)]
mod tests {
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	use super::*;

	#[test]
	fn every_nth_fires_on_schedule() {
		let mut rng = StdRng::seed_from_u64(0);
		let mut policy = CleanupPolicy::every(3);
		let fired: Vec<bool> = (0..6).map(|_| policy.should_run(&mut rng)).collect();
		assert_eq!(fired, [false, false, true, false, false, true]);
	}

	#[test]
	fn every_zero_never_fires() {
		let mut rng = StdRng::seed_from_u64(0);
		let mut policy = CleanupPolicy::every(0);
		assert!((0..100).all(|_| !policy.should_run(&mut rng)));
	}

	#[test]
	fn sampled_extremes_are_deterministic() {
		let mut rng = StdRng::seed_from_u64(0);
		let mut never = CleanupPolicy::sampled(0.0).unwrap();
		let mut always = CleanupPolicy::sampled(1.0).unwrap();
		assert!((0..100).all(|_| !never.should_run(&mut rng)));
		assert!((0..100).all(|_| always.should_run(&mut rng)));
	}

	#[test]
	fn sampled_rejects_out_of_range() {
		assert!(matches!(CleanupPolicy::sampled(1.5), Err(ChainError::Config(_))));
		assert!(matches!(CleanupPolicy::sampled(-0.1), Err(ChainError::Config(_))));
	}
}
