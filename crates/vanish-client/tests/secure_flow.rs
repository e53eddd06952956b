//! End-to-end secure drops: drafted and opened on the client, stored and
//! delivered by a simulated service that never sees the master key.

use std::time::Duration;

use vanish_client::{
    FragmentSlot, FragmentVault, MemoryVaultBackend, OpenedContent, SecureDraft, ShareLink,
    ShareLinks, open_object, open_sealed,
};
use vanish_core::{
    DropError,
    model::{
        DeliveredContent, Delivery, DropId, ExpiryPolicy, FetchOutcome, FetchRequest, NewFile,
        PlainContent,
    },
};
use vanish_crypto::KeyMaterial;
use vanish_harness::{SIM_BASE_URL, SimService, sim_service};

const VIEWER_BASE: &str = "https://vanish.example";

fn fetch(sim: &SimService, drop_id: DropId) -> Result<Delivery, DropError> {
    let FetchOutcome::TokenIssued { token, .. } =
        sim.service.fetch_drop(FetchRequest { drop_id, token: None, session: None })?
    else {
        panic!("tokenless fetch must mint");
    };
    match sim.service.fetch_drop(FetchRequest { drop_id, token: Some(token), session: None })? {
        FetchOutcome::Delivered(delivery) => Ok(delivery),
        FetchOutcome::TokenIssued { .. } => panic!("fetch with a token must not mint"),
    }
}

/// Viewer opens both links, in either order, through the vault.
fn master_from_links(
    vault: &FragmentVault<vanish_harness::SimEnv, MemoryVaultBackend>,
    first: &str,
    second: &str,
) -> (DropId, KeyMaterial) {
    let first = ShareLink::parse(first).unwrap();
    let second = ShareLink::parse(second).unwrap();
    assert_eq!(first.drop_id(), second.drop_id());

    let id = first.drop_id();
    vault.hold(id, first.slot().unwrap(), first.key().unwrap()).unwrap();
    let master = vault.complete(id, second.slot().unwrap(), second.key().unwrap()).unwrap();
    (id, master)
}

#[test]
fn secure_text_round_trip_through_the_service() {
    let sim = sim_service(1);
    let draft = SecureDraft::new(sim.env.clone())
        .seal(PlainContent::Text("meet at noon".into()), ExpiryPolicy::UntilFirstScan);
    let links = ShareLinks::new(VIEWER_BASE, &draft.fragments);

    let id = sim.service.create_drop(draft.request).unwrap();
    assert_eq!(id, draft.fragments.drop_id);

    let vault = FragmentVault::new(sim.env.clone(), MemoryVaultBackend::new());
    let (link_id, master) =
        master_from_links(&vault, &links.secondary.to_url(), &links.primary.to_url());
    assert_eq!(link_id, id);

    let delivery = fetch(&sim, id).unwrap();
    assert!(matches!(delivery.content, DeliveredContent::SealedText(_)));
    assert_eq!(open_sealed(delivery, &master).unwrap(), OpenedContent::Text("meet at noon".into()));

    // Until-first-scan: the second viewer finds nothing.
    assert_eq!(fetch(&sim, id), Err(DropError::Expired));
}

#[test]
fn one_fragment_alone_opens_nothing() {
    let sim = sim_service(2);
    let draft = SecureDraft::new(sim.env.clone())
        .seal(PlainContent::Text("half".into()), ExpiryPolicy::Session);
    let k1 = draft.fragments.k1.clone();
    let id = sim.service.create_drop(draft.request).unwrap();

    let delivery = fetch(&sim, id).unwrap();
    assert_eq!(open_sealed(delivery, &k1), Err(DropError::DecryptionFailed));
}

#[test]
fn secure_bundle_downloads_and_opens() {
    let sim = sim_service(3);
    let files = vec![
        NewFile { name: "a.txt".into(), mime_type: "text/plain".into(), bytes: b"alpha".to_vec() },
        NewFile { name: "b.txt".into(), mime_type: "text/plain".into(), bytes: b"beta".to_vec() },
    ];
    let mut draft = SecureDraft::new(sim.env.clone()).seal(PlainContent::Bundle(files), ExpiryPolicy::Session);
    draft.request = draft.request.with_max_downloads(1);
    let links = ShareLinks::new(VIEWER_BASE, &draft.fragments);
    let id = sim.service.create_drop(draft.request).unwrap();

    let vault = FragmentVault::new(sim.env.clone(), MemoryVaultBackend::new());
    let (_, master) = master_from_links(&vault, &links.primary.to_url(), &links.secondary.to_url());

    let OpenedContent::Files { pointers, sealed } = open_sealed(fetch(&sim, id).unwrap(), &master).unwrap()
    else {
        panic!("bundle delivers file pointers");
    };
    assert!(sealed);
    assert_eq!(pointers.len(), 2);

    let pointers = sim.service.download(id, None).unwrap();
    for (index, (pointer, expected)) in pointers.iter().zip([&b"alpha"[..], &b"beta"[..]]).enumerate() {
        assert!(pointer.url.starts_with(SIM_BASE_URL));
        let body = open_pointer(&sim, &pointer.url);
        assert!(body.sealed);
        assert_eq!(open_object(&body.bytes, &master, id, index).unwrap(), expected);
    }

    assert_eq!(sim.service.download(id, None), Err(DropError::Expired));
}

#[test]
fn fragment_session_lapses() {
    let sim = sim_service(4);
    let draft = SecureDraft::new(sim.env.clone())
        .seal(PlainContent::Text("late".into()), ExpiryPolicy::Session);
    let links = ShareLinks::new(VIEWER_BASE, &draft.fragments);
    let vault =
        FragmentVault::with_ttl(sim.env.clone(), MemoryVaultBackend::new(), Duration::from_secs(120));

    let id = links.primary.drop_id();
    vault.hold(id, FragmentSlot::First, links.primary.key().unwrap()).unwrap();
    sim.advance(Duration::from_secs(121));

    assert_eq!(vault.pending(id).unwrap(), None);
}

fn open_pointer(sim: &SimService, url: &str) -> vanish_core::model::ObjectBody {
    let (path, query) = url.split_once('?').unwrap();
    let key = path.split_once("/objects/").unwrap().1;
    let value = |name: &str| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')))
            .unwrap()
            .to_string()
    };
    let expires: u64 = value("expires").parse().unwrap();
    sim.service.open_pointer(key, expires, &value("sig")).unwrap()
}
