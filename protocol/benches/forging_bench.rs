// Forging engine benchmarks for the Meridian protocol.
//
// Covers both hit-derivation branches, the eligibility predicate, and a
// full engine tick over rosters of increasing size.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use meridian_protocol::account::{AccountLedger, MemoryLedger};
use meridian_protocol::chain::{BlockRef, ChainState, ChainView, PARENT_CHAIN};
use meridian_protocol::config;
use meridian_protocol::crypto::Keypair;
use meridian_protocol::forging::{
    compute_hit, is_eligible, BlockGenerator, ForgingEngine, GenerationError,
};

struct NoopGenerator;

impl BlockGenerator for NoopGenerator {
    fn generate_block(&self, _forger: &Keypair) -> Result<(), GenerationError> {
        Ok(())
    }
}

fn tip_at(height: u32) -> BlockRef {
    BlockRef {
        id: 1,
        height,
        timestamp: 0,
        generation_signature: [0x5Au8; 32],
        base_target: config::INITIAL_BASE_TARGET,
    }
}

fn bench_hit_computation(c: &mut Criterion) {
    let keypair = Keypair::from_secret_phrase("forging-bench");

    // Legacy branch: sign the generation signature, then digest.
    let legacy_tip = tip_at(config::TRANSPARENT_FORGING_HEIGHT - 1);
    c.bench_function("forging/hit_legacy", |b| {
        b.iter(|| compute_hit(&keypair, &legacy_tip));
    });

    // Modern branch: digest of generation signature and public key.
    let modern_tip = tip_at(config::TRANSPARENT_FORGING_HEIGHT);
    c.bench_function("forging/hit_modern", |b| {
        b.iter(|| compute_hit(&keypair, &modern_tip));
    });
}

fn bench_eligibility(c: &mut Criterion) {
    let keypair = Keypair::from_secret_phrase("forging-bench");
    let tip = tip_at(100_000);
    let hit = compute_hit(&keypair, &tip);

    c.bench_function("forging/eligibility", |b| {
        b.iter(|| is_eligible(hit, tip.base_target, 1_000_000, 30));
    });
}

fn bench_engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("forging/tick");

    for forger_count in [1, 8, 64] {
        group.throughput(Throughput::Elements(forger_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(forger_count),
            &forger_count,
            |b, &n| {
                let ledger = Arc::new(MemoryLedger::new());
                let chain = Arc::new(ChainState::with_manual_clock(tip_at(100_000), 600));
                let engine = ForgingEngine::new(
                    Arc::clone(&ledger) as Arc<dyn AccountLedger>,
                    chain as Arc<dyn ChainView>,
                    Arc::new(NoopGenerator),
                );
                for i in 0..n {
                    let keypair = Keypair::from_secret_phrase(&format!("bench-forger-{i}"));
                    ledger.seed_balance(
                        PARENT_CHAIN,
                        keypair.account_id(),
                        1_000_000 * config::BALANCE_SCALE,
                    );
                    engine.start_forging(keypair);
                }
                // First tick computes and caches every hit; the measured
                // ticks exercise the cached path plus eligibility.
                engine.tick();

                b.iter(|| engine.tick());
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hit_computation,
    bench_eligibility,
    bench_engine_tick,
);
criterion_main!(benches);
