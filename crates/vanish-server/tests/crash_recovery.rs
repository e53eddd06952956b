//! Crash recovery tests for `RedbDropStore` and `FsObjectStore`.
//!
//! These tests verify that drops, tokens, counters and blobs persist across
//! close/reopen cycles, simulating server restarts.

use std::path::Path;

use tempfile::tempdir;
use vanish_core::{
    DropError, DropService,
    model::{
        Clearance, Counter, DeliveredContent, DropId, ExpiryPolicy, FetchOutcome, FetchRequest,
        NewDrop, NewFile, PlainContent, SessionId,
    },
    storage::{DropStore, PointerSigner},
};
use vanish_harness::{SIM_BASE_URL, SimEnv, test_config};
use vanish_server::storage::{FsObjectStore, RedbDropStore};

type DiskService = DropService<SimEnv, RedbDropStore, FsObjectStore>;

fn open(dir: &Path, env: &SimEnv) -> (DiskService, RedbDropStore) {
    let store = RedbDropStore::open(dir.join("drops.redb")).unwrap();
    let objects =
        FsObjectStore::open(dir.join("objects"), PointerSigner::new(SIM_BASE_URL, [7; 32])).unwrap();
    let service = DropService::new(env.clone(), store.clone(), objects, test_config());
    (service, store)
}

#[test]
fn test_drop_survives_restart() {
    let dir = tempdir().unwrap();
    let env = SimEnv::with_seed(1);

    let id = {
        let (service, _) = open(dir.path(), &env);
        let request =
            NewDrop::standard(PlainContent::Text("kept".into()), ExpiryPolicy::Session);
        service.create_drop(request).unwrap()
        // Database dropped
    };

    {
        let (service, _) = open(dir.path(), &env);
        let FetchOutcome::TokenIssued { token, .. } =
            service.fetch_drop(FetchRequest { drop_id: id, token: None, session: None }).unwrap()
        else {
            panic!("tokenless fetch must mint");
        };
        let FetchOutcome::Delivered(delivery) = service
            .fetch_drop(FetchRequest { drop_id: id, token: Some(token), session: None })
            .unwrap()
        else {
            panic!("tokened fetch must deliver");
        };
        assert_eq!(delivery.content, DeliveredContent::Text("kept".into()));
        assert_eq!(delivery.status.scan_count, 1);
    }

    {
        let (service, _) = open(dir.path(), &env);
        assert_eq!(service.check_drop(id).unwrap().scan_count, 1);
    }
}

#[test]
fn test_token_survives_restart_and_stays_single_use() {
    let dir = tempdir().unwrap();
    let env = SimEnv::with_seed(2);

    let (id, token) = {
        let (service, _) = open(dir.path(), &env);
        let id = service
            .create_drop(NewDrop::standard(PlainContent::Text("t".into()), ExpiryPolicy::Session))
            .unwrap();
        let FetchOutcome::TokenIssued { token, .. } =
            service.fetch_drop(FetchRequest { drop_id: id, token: None, session: None }).unwrap()
        else {
            panic!("tokenless fetch must mint");
        };
        (id, token)
    };

    let (service, _) = open(dir.path(), &env);
    let request = FetchRequest { drop_id: id, token: Some(token), session: None };
    assert!(matches!(service.fetch_drop(request), Ok(FetchOutcome::Delivered(_))));
    assert_eq!(service.fetch_drop(request), Err(DropError::AccessDenied));
}

#[test]
fn test_file_blob_survives_restart() {
    let dir = tempdir().unwrap();
    let env = SimEnv::with_seed(3);

    let id = {
        let (service, _) = open(dir.path(), &env);
        let file = NewFile {
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            bytes: b"on disk".to_vec(),
        };
        service
            .create_drop(NewDrop::standard(PlainContent::File(file), ExpiryPolicy::Session))
            .unwrap()
    };

    let (service, _) = open(dir.path(), &env);
    let pointers = service.download(id, None).unwrap();
    assert_eq!(pointers.len(), 1);

    let url = &pointers[0].url;
    let (path, query) = url.split_once('?').unwrap();
    let key = path.split_once("/objects/").unwrap().1;
    let mut expires = 0;
    let mut sig = "";
    for pair in query.split('&') {
        match pair.split_once('=').unwrap() {
            ("expires", value) => expires = value.parse().unwrap(),
            ("sig", value) => sig = value,
            _ => {},
        }
    }

    let body = service.open_pointer(key, expires, sig).unwrap();
    assert_eq!(body.bytes, b"on disk");
    assert!(!body.sealed);
}

#[test]
fn test_delete_cascade_on_disk() {
    let dir = tempdir().unwrap();
    let env = SimEnv::with_seed(4);
    let (service, store) = open(dir.path(), &env);

    let file = NewFile { name: "a.bin".into(), mime_type: "application/octet-stream".into(), bytes: vec![1; 64] };
    let id = service
        .create_drop(NewDrop::standard(PlainContent::Bundle(vec![file.clone(), file]), ExpiryPolicy::Session))
        .unwrap();
    assert!(dir.path().join("objects").join("drops").join(id.to_string()).exists());

    service.delete_drop(id).unwrap();

    assert!(store.load_drop(id).unwrap().is_none());
    assert!(!dir.path().join("objects").join("drops").join(id.to_string()).exists());
    service.delete_drop(id).unwrap();
}

#[test]
fn test_clearances_range_delete() {
    let dir = tempdir().unwrap();
    let store = RedbDropStore::open(dir.path().join("drops.redb")).unwrap();

    let a = DropId::from_u128(1);
    let b = DropId::from_u128(2);
    for (drop_id, session) in [(a, 1), (a, 2), (a, u128::MAX), (b, 1)] {
        let session = SessionId::from_u128(session);
        store.put_clearance(&Clearance { drop_id, session, expires_at_ms: 10 }).unwrap();
    }

    assert_eq!(store.delete_clearances(a).unwrap(), 3);
    assert_eq!(store.list_clearances().unwrap().len(), 1);
    assert!(store.load_clearance(b, SessionId::from_u128(1)).unwrap().is_some());
}

#[test]
fn test_counter_on_missing_drop() {
    let dir = tempdir().unwrap();
    let store = RedbDropStore::open(dir.path().join("drops.redb")).unwrap();

    assert_eq!(store.increment_counter(DropId::from_u128(9), Counter::Scans).unwrap(), None);
}
