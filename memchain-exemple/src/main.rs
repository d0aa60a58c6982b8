use memchain_core::cache::MemoryCache;
use memchain_core::model::config::{ChainConfig, CleanupPolicy};
use memchain_core::model::follower_store::FollowerStore;
use memchain_core::model::generator::Generator;
use memchain_core::model::trainer::Trainer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // The only persistent state lives in the cache. The in-process
    // backend keeps this demo self-contained; against a real deployment
    // a networked client implementing the same trait takes its place,
    // and trainers/generators in other processes share the state.
    let cache = MemoryCache::new();

    // Both sides must agree on the maximum context order
    let config = ChainConfig::default();

    // Reconcile follower lists on every 10th write. The default policy
    // samples instead (roughly one cleanup per hundred writes)
    let mut trainer = Trainer::with_cleanup(
        FollowerStore::new(cache.clone()),
        config.clone(),
        CleanupPolicy::every(10),
    );

    // A small corpus; a real deployment feeds a lazy stream of
    // messages through the same call
    let written = trainer.train_all([
        "Hello from the demo corpus.",
        "Hello again, this corpus is tiny.",
        "The cache forgets, the model shrugs.",
        "Sentences end. New sentences begin.",
    ])?;
    println!("Wrote {} (context, follower) pairs", written);

    // Sentences are generated independently; 100 tokens is the cap on
    // each one
    let mut generator = Generator::new(FollowerStore::new(cache), config);
    for (i, sentence) in generator.sentences(100).take(10).enumerate() {
        println!("Generated sentence {}: {}", i + 1, sentence?);
    }

    Ok(())
}
