//! Settlement pipeline: consensus, mint gate, and ledger together.

use shadow_twin::audit::{AuditLog, JsonlAuditLog, MemoryAuditLog};
use shadow_twin::consensus::{
    Committee, CoordinatorConfig, PredictorTwin, RoundCoordinator, TwinClient,
};
use shadow_twin::core::TwinId;
use shadow_twin::ledger::{LedgerConfig, TokenLedger};
use shadow_twin::minting::{MintConfig, MintFactor, MintValidator};
use shadow_twin::predictor::{FixedPredictor, Prediction};
use shadow_twin::SettlementEngine;
use std::path::PathBuf;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn committee(observations: &[f64]) -> Committee {
    let clients: Vec<Arc<dyn TwinClient>> = observations
        .iter()
        .enumerate()
        .map(|(i, &obs)| {
            Arc::new(PredictorTwin::new(
                TwinId::new(&format!("twin-{}", i)),
                Arc::new(FixedPredictor::new(obs, 0.9)),
                5.0,
            )) as Arc<dyn TwinClient>
        })
        .collect();
    Committee::new(clients, 3)
}

fn engine_with_audit(
    observations: &[f64],
    baseline: f64,
    audit: Arc<dyn AuditLog>,
) -> SettlementEngine {
    let coordinator = RoundCoordinator::new(
        committee(observations),
        audit.clone(),
        CoordinatorConfig::default(),
    )
    .unwrap();
    let validator = MintValidator::new(MintConfig {
        baseline,
        conversion_rate: 1.0,
        ..Default::default()
    });
    let ledger = Arc::new(TokenLedger::new(LedgerConfig::default(), audit.clone()).unwrap());
    SettlementEngine::new(coordinator, validator, ledger, audit)
}

#[tokio::test]
async fn settlement_then_transfer_preserves_supply() {
    init_tracing();
    let audit = Arc::new(MemoryAuditLog::new());
    let coordinator = RoundCoordinator::new(
        committee(&[100.5, 99.0, 101.0]),
        audit.clone(),
        CoordinatorConfig::default(),
    )
    .unwrap();
    let validator = MintValidator::new(MintConfig {
        baseline: 120.0,
        conversion_rate: 1.0,
        ..Default::default()
    });
    let ledger = Arc::new(TokenLedger::new(LedgerConfig::default(), audit.clone()).unwrap());
    let mut engine = SettlementEngine::new(
        coordinator,
        validator,
        ledger.clone(),
        audit.clone(),
    );

    let report = engine
        .settle(
            &TwinId::new("twin-0"),
            Prediction {
                value: 100.0,
                confidence: 0.97,
            },
            99.0,
            "plant-7",
        )
        .await
        .unwrap();

    // baseline 120 - observed 99, rate 1.0
    assert!(report.mint_record.is_some());
    assert!((ledger.balance("plant-7") - 21.0).abs() < 1e-9);

    // Transfer 10 at 2% burn: recipient gets 9.8, supply drops by 0.2.
    ledger.transfer("plant-7", "grid-op", 10.0).unwrap();
    assert!((ledger.balance("plant-7") - 11.0).abs() < 1e-9);
    assert!((ledger.balance("grid-op") - 9.8).abs() < 1e-9);
    assert!((ledger.total_supply() - 20.8).abs() < 1e-9);

    // Balances always sum to supply.
    let sum: f64 = ledger.balances().values().sum();
    assert!((sum - ledger.total_supply()).abs() < 1e-9);
    assert!(audit.verify());
}

#[tokio::test]
async fn energy_mismatch_refuses_before_confidence() {
    init_tracing();
    // Committed 100 vs observed 80: 25% divergence, well past 5%.
    let audit = Arc::new(MemoryAuditLog::new());
    let mut engine = engine_with_audit(&[100.5, 99.0, 101.0], 120.0, audit);

    let report = engine
        .settle(
            &TwinId::new("twin-0"),
            Prediction {
                value: 100.0,
                confidence: 0.50,
            },
            80.0,
            "plant-7",
        )
        .await
        .unwrap();

    let decision = report.decision.unwrap();
    assert!(!decision.should_mint);
    // Factor order is fixed: the energy gate trips before confidence does.
    assert_eq!(decision.failed_factor, Some(MintFactor::EnergyMatch));
    assert!(report.mint_record.is_none());
}

#[tokio::test]
async fn repeated_settlements_accumulate_metrics() {
    init_tracing();
    let audit = Arc::new(MemoryAuditLog::new());
    let mut engine = engine_with_audit(&[100.5, 99.0, 101.0], 120.0, audit);
    let leader = TwinId::new("twin-0");

    for _ in 0..3 {
        engine
            .settle(
                &leader,
                Prediction {
                    value: 100.0,
                    confidence: 0.97,
                },
                99.0,
                "plant-7",
            )
            .await
            .unwrap();
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.rounds_run, 3);
    assert_eq!(metrics.rounds_committed, 3);
    assert_eq!(metrics.mints_approved, 3);
    assert!((metrics.total_minted - 63.0).abs() < 1e-9);
}

#[tokio::test]
async fn jsonl_audit_survives_the_pipeline() {
    init_tracing();
    let path: PathBuf =
        std::env::temp_dir().join(format!("shadow-twin-settle-{}.jsonl", uuid::Uuid::new_v4()));
    let audit = Arc::new(JsonlAuditLog::open(&path).unwrap());
    let mut engine = engine_with_audit(&[100.5, 99.0, 101.0], 120.0, audit.clone());

    engine
        .settle(
            &TwinId::new("twin-0"),
            Prediction {
                value: 100.0,
                confidence: 0.97,
            },
            99.0,
            "plant-7",
        )
        .await
        .unwrap();

    let events = audit.read_all().unwrap();
    let labels: Vec<&str> = events.iter().map(|e| e.label()).collect();
    // Proposal first; the mint decision precedes the ledger mutation.
    assert_eq!(labels.first(), Some(&"proposal_logged"));
    let decided = labels.iter().position(|l| *l == "mint_decided").unwrap();
    let mutated = labels.iter().position(|l| *l == "ledger_mutation").unwrap();
    assert!(decided < mutated);
    assert!(labels.contains(&"round_closed"));

    std::fs::remove_file(&path).ok();
}
