#![allow(non_snake_case)]
use case_opener::{
    gateway::CallIntent,
    objects::ObjectId,
    synchronizer::SyncError,
    test_helpers::*,
};

#[tokio::test]
async fn discard__deletes_skin_and_refreshes() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[Some(1), Some(3)]));
    let ledger = ctx.ledger();
    let mut sync = ctx.refreshed_synchronizer().await;
    let skin = ledger.skin_ids()[0].clone();

    // when
    sync.discard(skin.clone()).await.unwrap();

    // then
    let calls = ledger.calls();
    assert_eq!(calls[0], LedgerCall::Submit(CallIntent::delete_skin(skin.clone())));
    assert_eq!(ledger.query_count(), 2);
    assert!(!sync.snapshot().contains_skin(&skin));
    assert_eq!(sync.skins().len(), 1);
    assert_eq!(sync.cases().len(), 1);
}

#[tokio::test]
async fn discard__failure_leaves_state_untouched() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[Some(2)]));
    let ledger = ctx.ledger();
    let mut sync = ctx.refreshed_synchronizer().await;
    sync.select(Some(ledger.case_ids()[0].clone())).unwrap();
    let snapshot_before = sync.snapshot().clone();
    let selection_before = sync.selection().cloned();

    // given
    let unowned = ObjectId::new("0xf00").unwrap();

    // when
    let result = sync.discard(unowned).await;

    // then
    assert!(matches!(result, Err(SyncError::Transaction(_))));
    assert_eq!(sync.snapshot(), &snapshot_before);
    assert_eq!(sync.selection().cloned(), selection_before);
    assert_eq!(ledger.query_count(), 0);
}

#[tokio::test]
async fn discard__keeps_case_selection_across_refresh() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[Some(4)]));
    let ledger = ctx.ledger();
    let mut sync = ctx.refreshed_synchronizer().await;
    let case = ledger.case_ids()[0].clone();
    sync.select(Some(case.clone())).unwrap();

    // when
    sync.discard(ledger.skin_ids()[0].clone()).await.unwrap();

    // then
    assert_eq!(sync.selection(), Some(&case));
    assert!(sync.skins().is_empty());
}
