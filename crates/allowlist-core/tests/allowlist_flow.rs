//! End-to-end allowlist flows against the mock contract

use allowlist_core::{
    AllowlistError, AllowlistManager, AllowlistStore, Grant, ImportMode, ImportPayload,
    JsonFileBackend, MockContract, SyncStatus, ZERO_ROOT,
};

const OWNER: &str = "0x00000000000000000000000000000000000000aa";
const ALICE: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";
const CAROL: &str = "0x3333333333333333333333333333333333333333";

fn owner_contract() -> MockContract {
    MockContract::owned_by(OWNER.parse().unwrap())
}

#[tokio::test]
async fn test_request_approve_mint_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path(), "allowlist").unwrap();
    let manager = AllowlistManager::new(AllowlistStore::open(backend).unwrap(), owner_contract());

    manager.add_many(&[ALICE, BOB]).await.unwrap();

    // Carol is not a member yet
    assert!(matches!(
        manager.check_mint(CAROL).await,
        Err(AllowlistError::LeafNotFound(_))
    ));

    assert!(manager.submit_request(CAROL, "collector").await.unwrap());
    let request = manager.pending_requests().pop().unwrap();
    manager.approve(&request.id).await.unwrap();

    for who in [ALICE, BOB, CAROL] {
        let check = manager.check_mint(who).await.unwrap();
        assert_eq!(check.grant, Grant::Member);
        assert_eq!(check.onchain_verdict, Some(true), "{who}");
        assert!(check.is_clean());
    }

    let report = manager.sync_report().await.unwrap();
    assert_eq!(report.status, SyncStatus::Published);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let root = {
        let backend = JsonFileBackend::new(dir.path(), "allowlist").unwrap();
        let manager =
            AllowlistManager::new(AllowlistStore::open(backend).unwrap(), owner_contract());
        manager.add_many(&[ALICE, BOB]).await.unwrap();
        manager.submit_request(CAROL, "later").await.unwrap();
        manager.read(AllowlistStore::root).unwrap()
    };

    let backend = JsonFileBackend::new(dir.path(), "allowlist").unwrap();
    let store = AllowlistStore::open(backend).unwrap();
    assert_eq!(store.root(), Some(root));
    assert_eq!(store.published_root(), Some(root));
    assert_eq!(store.pending_requests().len(), 1);
}

#[tokio::test]
async fn test_export_import_round_trip_preserves_root() {
    let source = AllowlistManager::new(
        AllowlistStore::open(allowlist_core::MemoryBackend::default()).unwrap(),
        owner_contract(),
    );
    source.add_many(&[ALICE, BOB, CAROL]).await.unwrap();
    let exported = serde_json::to_string(&source.export()).unwrap();

    let payload: ImportPayload = serde_json::from_str(&exported).unwrap();
    let target = AllowlistManager::new(
        AllowlistStore::open(allowlist_core::MemoryBackend::default()).unwrap(),
        owner_contract(),
    );
    let outcome = target
        .import(&payload.addresses, ImportMode::Merge)
        .await
        .unwrap();

    assert_eq!(outcome.value.added, 3);
    assert_eq!(
        source.read(AllowlistStore::root),
        target.read(AllowlistStore::root)
    );
}

#[tokio::test]
async fn test_import_drops_malformed_and_rejects_all_bad() {
    let manager = AllowlistManager::new(
        AllowlistStore::open(allowlist_core::MemoryBackend::default()).unwrap(),
        owner_contract(),
    );

    let payload: ImportPayload = serde_json::from_value(serde_json::json!({
        "addresses": [ALICE, "0x123", 42, BOB.to_uppercase().replacen("0X", "0x", 1)]
    }))
    .unwrap();
    let outcome = manager
        .import(&payload.addresses, ImportMode::Merge)
        .await
        .unwrap();
    assert_eq!(outcome.value.accepted, 2);
    assert_eq!(outcome.value.rejected, 2);

    let bad = vec![serde_json::json!("nope"), serde_json::json!(null)];
    assert!(matches!(
        manager.import(&bad, ImportMode::Merge).await,
        Err(AllowlistError::NoValidAddresses)
    ));
    assert_eq!(manager.list().len(), 2);
}

#[tokio::test]
async fn test_replace_import_then_clear_publishes_zero() {
    let manager = AllowlistManager::new(
        AllowlistStore::open(allowlist_core::MemoryBackend::default()).unwrap(),
        owner_contract(),
    );
    manager.add_many(&[ALICE, BOB]).await.unwrap();

    let entries = vec![serde_json::json!(CAROL)];
    manager.import(&entries, ImportMode::Replace).await.unwrap();
    assert_eq!(manager.list(), vec![CAROL.parse().unwrap()]);

    manager.remove(CAROL).await.unwrap();
    assert_eq!(manager.contract().stored_root(), ZERO_ROOT);
    assert_eq!(
        manager.sync_report().await.unwrap().status,
        SyncStatus::Published
    );
}

#[tokio::test]
async fn test_stale_proof_after_removal_is_rejected_onchain() {
    let manager = AllowlistManager::new(
        AllowlistStore::open(allowlist_core::MemoryBackend::default()).unwrap(),
        owner_contract(),
    );
    manager.add_many(&[ALICE, BOB, CAROL]).await.unwrap();
    let stale = manager.proof(BOB).unwrap();

    manager.remove(BOB).await.unwrap();

    let verdict = {
        use allowlist_core::AllowlistContract;
        manager
            .contract()
            .is_whitelisted(stale.address, &stale.proof)
            .await
            .unwrap()
    };
    assert!(!verdict);
    assert!(stale.is_self_consistent());
}
