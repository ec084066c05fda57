// src/main.rs
//
// Minimal demo node that wires up the conductor library:
//
// - RocksDB-backed storage
// - a trusted-dealer threshold context for a single-validator set
// - the VDF engine advancing one day at a time, reaching local quorum
//   with itself (n = 1, f = 0) before persisting each day proof
// - Prometheus metrics exporter on /metrics
//
// A real deployment runs `n` of these behind the peer gossip layer with
// an `n`-way `ThresholdContext::deal` split across processes; this demo
// collapses that down to `n = 1` so it can run standalone.

use std::sync::Arc;

use conductor::crypto::identity::Identity;
use conductor::crypto::threshold::ThresholdContext;
use conductor::day::DayAdvancementTracker;
use conductor::types::{DayProof, ValidatorMember, ValidatorSet};
use conductor::vdf::VdfEngine;
use conductor::{run_prometheus_http_server, ConductorConfig, ConductorStore, MetricsRegistry, RocksDbStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = run_node().await {
        tracing::error!(%err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = ConductorConfig::default();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!(%e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    // ---------------------------
    // Storage backend (RocksDB)
    // ---------------------------

    let store = RocksDbStore::open(&cfg.storage)
        .map_err(|e| format!("failed to open RocksDB store at {}: {e}", cfg.storage.path))?;

    // ---------------------------
    // Validator identity + single-validator threshold context (demo)
    // ---------------------------

    let identity = Identity::generate();
    let ctx = ThresholdContext::deal(1, 0)
        .into_iter()
        .next()
        .expect("deal(1, 0) yields exactly one context");

    let validator_set = ValidatorSet::new(
        0,
        vec![ValidatorMember {
            validator_id: identity.validator_id(),
            join_epoch: 0,
            public_key_bytes: identity.public_key_bytes().to_vec(),
        }],
    );
    tracing::info!(validators = validator_set.len(), "validator set initialized");

    // ---------------------------
    // VDF engine
    // ---------------------------

    let genesis_seed = [0u8; 32];
    let engine = VdfEngine::new(genesis_seed, cfg.vdf.progress_interval);
    let difficulty = cfg.vdf.difficulty_initial;

    tracing::info!(difficulty, "starting node, advancing day counter");

    // ---------------------------
    // Day-advancement loop (demo)
    // ---------------------------

    let mut day = recover_start_day(&store)?;
    loop {
        let seed = engine.derive_seed(day);
        let output = engine.compute_blocking(&seed, difficulty);

        let mut proof = DayProof {
            day_number: day,
            seed,
            difficulty,
            output,
            proposer: identity.validator_id(),
            proposer_signature: Vec::new(),
        };
        proof.proposer_signature = identity.sign(&proof.signing_bytes());
        let digest = *proof.digest().as_bytes();

        let mut tracker = DayAdvancementTracker::new();
        tracker
            .record(proof, &identity.public_key_bytes(), &engine)
            .map_err(|e| format!("day {day} proof failed local verification: {e}"))?;

        let quorum_output = tracker
            .quorum_output(1)
            .expect("single-validator set reaches quorum with its own proof");
        let share = ctx
            .sign_share(&digest)
            .map_err(|e| format!("failed to sign day proof share: {e}"))?;
        let canonical = tracker
            .commit(&ctx, quorum_output, &[share], 1, 0)
            .map_err(|e| format!("failed to commit day {day}: {e}"))?;

        store
            .put_day_proof(canonical)
            .map_err(|e| format!("failed to persist day proof for day {day}: {e}"))?;

        tracing::info!(day, output = %hex::encode(output), "advanced to next day");
        day += 1;
    }
}

fn recover_start_day(store: &dyn ConductorStore) -> Result<u64, String> {
    let mut day = 0;
    while store
        .get_day_proof(day)
        .map_err(|e| format!("failed to read day proof for day {day}: {e}"))?
        .is_some()
    {
        day += 1;
    }
    Ok(day)
}
