//! Fuzz target for DropService under storage failures
//!
//! Drives a simulated service through arbitrary sequences of creates,
//! fetches, downloads, deletes, clock jumps and sweeps, with ChaoticStore
//! injecting failures into both backends.
//!
//! # Invariants
//!
//! - The service NEVER panics, whatever fails underneath
//! - A drop is never delivered more often than its scan ceiling allows
//! - An until-first-scan drop is delivered at most once
//! - A token is never redeemed twice

#![no_main]

use std::{collections::HashSet, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vanish_core::{
    DropService, Environment,
    model::{DropId, ExpiryPolicy, FetchOutcome, FetchRequest, NewDrop, NewFile, PlainContent, TokenValue},
    storage::{MemoryDropStore, MemoryObjectStore, PointerSigner},
};
use vanish_harness::{SIM_BASE_URL, SimEnv, test_config};
use vanish_server::storage::ChaoticStore;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    /// Seed for the simulated environment
    seed: u64,
    /// Seed for ChaoticStore RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-45%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Policy {
    Deadline { minutes: u8 },
    UntilFirstScan,
    Session,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Create { policy: Policy, max_scans: Option<u8>, file: bool },
    RequestToken { drop_idx: u8 },
    Redeem { token_idx: u8 },
    Download { drop_idx: u8 },
    Delete { drop_idx: u8 },
    Advance { seconds: u16 },
    Sweep,
}

struct Tracked {
    id: DropId,
    policy: Policy,
    max_scans: Option<u64>,
    deliveries: u64,
}

fuzz_target!(|scenario: Scenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 20.0;
    let env = SimEnv::with_seed(scenario.seed);
    let store = ChaoticStore::with_seed(MemoryDropStore::new(), failure_rate, scenario.chaos_seed);
    let objects = ChaoticStore::with_seed(
        MemoryObjectStore::new(PointerSigner::new(SIM_BASE_URL, [9; 32])),
        failure_rate,
        scenario.chaos_seed.wrapping_add(1),
    );
    let service = DropService::new(env.clone(), store, objects, test_config());

    let mut drops: Vec<Tracked> = Vec::new();
    let mut tokens: Vec<(TokenValue, usize)> = Vec::new();
    let mut redeemed: HashSet<TokenValue> = HashSet::new();

    for op in scenario.operations {
        match op {
            Operation::Create { policy, max_scans, file } => {
                let expiry = match policy {
                    Policy::Deadline { minutes } => ExpiryPolicy::At {
                        expires_at_ms: env.wall_clock_millis() + (u64::from(minutes) + 1) * 60_000,
                    },
                    Policy::UntilFirstScan => ExpiryPolicy::UntilFirstScan,
                    Policy::Session => ExpiryPolicy::Session,
                };
                let content = if file {
                    PlainContent::File(NewFile {
                        name: "f.bin".into(),
                        mime_type: "application/octet-stream".into(),
                        bytes: vec![1, 2, 3],
                    })
                } else {
                    PlainContent::Text("fuzz".into())
                };
                let max_scans = max_scans.map(|m| u64::from(m % 4) + 1);
                let mut request = NewDrop::standard(content, expiry);
                request.max_scans = max_scans;

                if let Ok(id) = service.create_drop(request) {
                    drops.push(Tracked { id, policy, max_scans, deliveries: 0 });
                }
            },
            Operation::RequestToken { drop_idx } => {
                let Some(index) = pick(drops.len(), drop_idx) else { continue };
                let request = FetchRequest { drop_id: drops[index].id, token: None, session: None };
                if let Ok(FetchOutcome::TokenIssued { token, .. }) = service.fetch_drop(request) {
                    tokens.push((token, index));
                }
            },
            Operation::Redeem { token_idx } => {
                let Some(slot) = pick(tokens.len(), token_idx) else { continue };
                let (token, index) = tokens[slot];
                let request =
                    FetchRequest { drop_id: drops[index].id, token: Some(token), session: None };
                if let Ok(FetchOutcome::Delivered(_)) = service.fetch_drop(request) {
                    assert!(redeemed.insert(token), "token redeemed twice");
                    let tracked = &mut drops[index];
                    tracked.deliveries += 1;
                    if let Some(max) = tracked.max_scans {
                        assert!(tracked.deliveries <= max, "scan ceiling exceeded");
                    }
                    if matches!(tracked.policy, Policy::UntilFirstScan) {
                        assert_eq!(tracked.deliveries, 1, "until-first-scan delivered twice");
                    }
                }
            },
            Operation::Download { drop_idx } => {
                let Some(index) = pick(drops.len(), drop_idx) else { continue };
                let _ = service.download(drops[index].id, None);
            },
            Operation::Delete { drop_idx } => {
                let Some(index) = pick(drops.len(), drop_idx) else { continue };
                let _ = service.delete_drop(drops[index].id);
            },
            Operation::Advance { seconds } => env.advance(Duration::from_secs(u64::from(seconds))),
            Operation::Sweep => {
                let _ = service.sweep();
            },
        }
    }
});

fn pick(len: usize, raw: u8) -> Option<usize> {
    (len > 0).then(|| usize::from(raw) % len)
}
