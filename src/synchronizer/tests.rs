#![allow(non_snake_case)]

use super::*;
use crate::test_helpers::{
    FakeLedger,
    TestContext,
};

#[tokio::test]
async fn select__accepts_case_from_current_snapshot() {
    // given
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(2, &[]));
    let mut sync = ctx.refreshed_synchronizer().await;
    let target = ctx.ledger().case_ids()[1].clone();

    // when
    sync.select(Some(target.clone())).unwrap();

    // then
    assert_eq!(sync.selection(), Some(&target));
    assert_eq!(ctx.ledger().total_calls(), 0);
}

#[tokio::test]
async fn select__rejects_unknown_case_and_keeps_previous_selection() {
    // given
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[]));
    let mut sync = ctx.refreshed_synchronizer().await;
    let owned = ctx.ledger().case_ids()[0].clone();
    sync.select(Some(owned.clone())).unwrap();
    let stranger = ObjectId::new("0xdeadbeef").unwrap();

    // when
    let result = sync.select(Some(stranger.clone()));

    // then
    assert!(matches!(result, Err(SyncError::InvalidSelection(id)) if id == stranger));
    assert_eq!(sync.selection(), Some(&owned));
}

#[tokio::test]
async fn select__rejects_skin_ids() {
    // given
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(0, &[Some(1)]));
    let mut sync = ctx.refreshed_synchronizer().await;
    let skin = ctx.ledger().skin_ids()[0].clone();

    // when
    let result = sync.select(Some(skin));

    // then
    assert!(matches!(result, Err(SyncError::InvalidSelection(_))));
    assert_eq!(sync.selection(), None);
}

#[tokio::test]
async fn select__none_clears_selection() {
    // given
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[]));
    let mut sync = ctx.refreshed_synchronizer().await;
    sync.select(Some(ctx.ledger().case_ids()[0].clone())).unwrap();

    // when
    sync.select(None).unwrap();

    // then
    assert_eq!(sync.selection(), None);
}

#[test]
fn select__rejects_everything_before_first_refresh() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[]));
    let mut sync = ctx.synchronizer();
    let case = ctx.ledger().case_ids()[0].clone();

    assert!(matches!(
        sync.select(Some(case)),
        Err(SyncError::InvalidSelection(_))
    ));
}

#[tokio::test]
async fn open__clears_stale_selection_without_submitting() {
    // given
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[]));
    let mut sync = ctx.refreshed_synchronizer().await;
    let case = ctx.ledger().case_ids()[0].clone();
    sync.select(Some(case.clone())).unwrap();
    // selection outlived its case
    sync.snapshot.cases.clear();

    // when
    let result = sync.open(None).await;

    // then
    assert!(matches!(result, Err(SyncError::InvalidSelection(id)) if id == case));
    assert_eq!(sync.selection(), None);
    assert_eq!(ctx.ledger().submit_count(), 0);
}
