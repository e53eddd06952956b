//! Chaos property tests for the drop service
//!
//! These tests verify that the service keeps its invariants when its storage
//! is wrapped in `ChaoticStore`:
//! - A create either fully succeeds or leaves nothing behind
//! - Injected failures surface as `DropError::Storage`, never as another kind
//! - Bounded retries absorb sparse failures
//! - A token is never redeemed twice, however often storage fails

use proptest::prelude::*;
use vanish_core::{
    DropError, DropService,
    model::{ExpiryPolicy, FetchOutcome, FetchRequest, NewDrop, NewFile, PlainContent},
    storage::{DropStore, MemoryDropStore, MemoryObjectStore, PointerSigner},
};
use vanish_harness::{SIM_BASE_URL, SimEnv, test_config};
use vanish_server::storage::ChaoticStore;

type ChaosService = DropService<SimEnv, ChaoticStore<MemoryDropStore>, MemoryObjectStore>;

fn chaos_service(seed: u64, failure_rate: f64) -> (ChaosService, ChaoticStore<MemoryDropStore>, MemoryObjectStore) {
    let env = SimEnv::with_seed(seed);
    let store = ChaoticStore::with_seed(MemoryDropStore::new(), failure_rate, seed);
    let objects = MemoryObjectStore::new(PointerSigner::new(SIM_BASE_URL, [1; 32]));
    let service = DropService::new(env, store.clone(), objects.clone(), test_config());
    (service, store, objects)
}

fn file_drop(len: usize) -> NewDrop {
    let file = NewFile { name: "f.bin".into(), mime_type: "application/octet-stream".into(), bytes: vec![7; len] };
    NewDrop::standard(PlainContent::File(file), ExpiryPolicy::Session)
}

#[test]
fn prop_chaos_create_is_all_or_nothing() {
    proptest!(|(
        failure_rate in 0.0..0.9,
        seed in any::<u64>(),
        creates in 1usize..20,
    )| {
        let (service, store, objects) = chaos_service(seed, failure_rate);

        let mut created = Vec::new();
        for i in 0..creates {
            match service.create_drop(file_drop(i + 1)) {
                Ok(id) => created.push(id),
                Err(DropError::Storage(e)) => prop_assert!(e.is_transient()),
                Err(other) => prop_assert!(false, "unexpected error under chaos: {other:?}"),
            }
        }

        // Every successful create is visible, and no blob outlives a failed one.
        for id in &created {
            prop_assert!(store.inner().load_drop(*id).unwrap().is_some());
        }
        prop_assert_eq!(store.inner().drop_count(), created.len());
        prop_assert_eq!(objects.len(), created.len());
    });
}

#[test]
fn prop_chaos_token_never_redeemed_twice() {
    proptest!(|(
        failure_rate in 0.0..0.5,
        seed in any::<u64>(),
        attempts in 2usize..10,
    )| {
        let (service, store, _) = chaos_service(seed, 0.0);
        let id = service
            .create_drop(NewDrop::standard(PlainContent::Text("x".into()), ExpiryPolicy::Session))
            .unwrap();
        let FetchOutcome::TokenIssued { token, .. } =
            service.fetch_drop(FetchRequest { drop_id: id, token: None, session: None }).unwrap()
        else {
            return Err(TestCaseError::fail("tokenless fetch must mint"));
        };

        // Same backing store, now failing.
        let chaotic = ChaoticStore::with_seed(store.inner().clone(), failure_rate, seed ^ 0xA5A5);
        let objects = MemoryObjectStore::new(PointerSigner::new(SIM_BASE_URL, [1; 32]));
        let flaky = DropService::new(SimEnv::with_seed(seed), chaotic, objects, test_config());

        let request = FetchRequest { drop_id: id, token: Some(token), session: None };
        let delivered = (0..attempts)
            .filter(|_| matches!(flaky.fetch_drop(request), Ok(FetchOutcome::Delivered(_))))
            .count();

        prop_assert!(delivered <= 1);
    });
}

#[test]
fn sparse_failures_are_absorbed_by_retries() {
    // One failure in ten with three attempts per call: almost every create lands.
    let (service, store, _) = chaos_service(42, 0.1);

    let successes = (0..100).filter(|i| service.create_drop(file_drop(i + 1)).is_ok()).count();

    assert!(successes >= 90, "only {successes} creates succeeded");
    assert!(store.operation_count() > 200);
}

#[test]
fn total_failure_surfaces_storage_error() {
    let (service, _, objects) = chaos_service(7, 1.0);

    let err = service.create_drop(file_drop(4)).unwrap_err();

    assert!(matches!(err, DropError::Storage(_)));
    assert_eq!(err.status_code(), 500);
    assert!(objects.is_empty());
}
