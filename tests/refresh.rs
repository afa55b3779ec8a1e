#![allow(non_snake_case)]
use case_opener::{
    gateway::{
        CallIntent,
        GatewayError,
        LedgerGateway,
        TransactionError,
        TxOutcome,
    },
    objects::{
        ObjectId,
        ObjectKind,
        OwnedObject,
        SuiAddress,
    },
    synchronizer::{
        InventorySynchronizer,
        SyncError,
    },
    test_helpers::*,
};
use proptest::prelude::*;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    runtime::Runtime,
    sync::Barrier,
};

/// Answers each query only once the other one is also waiting.
struct RendezvousLedger {
    barrier: Arc<Barrier>,
}

impl LedgerGateway for RendezvousLedger {
    async fn query_owned_objects(
        &self,
        _owner: &SuiAddress,
        kind: ObjectKind,
    ) -> Result<Vec<OwnedObject>, GatewayError> {
        self.barrier.wait().await;
        let id = ObjectId::new(format!("0x{kind}")).unwrap();
        Ok(match kind {
            ObjectKind::Case => vec![OwnedObject::case(id)],
            ObjectKind::Skin => vec![OwnedObject::skin(id, Some(2))],
        })
    }

    async fn submit_call(&self, _call: &CallIntent) -> Result<TxOutcome, TransactionError> {
        Err(TransactionError::Signer(String::from("read-only ledger")))
    }
}

prop_compose! {
    fn rarities()(raw in prop::collection::vec(prop::option::of(0u64..=9), 0..6)) -> Vec<Option<u64>> {
        raw
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn refresh__keeps_previous_snapshot_when_either_query_fails(
        (cases, skins, fail_cases) in (0usize..6, rarities(), any::<bool>())
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            _refresh__keeps_previous_snapshot_when_either_query_fails(cases, skins, fail_cases)
                .await
                .unwrap()
        });
    }
}

async fn _refresh__keeps_previous_snapshot_when_either_query_fails(
    cases: usize,
    skins: Vec<Option<u64>>,
    fail_cases: bool,
) -> Result<(), TestCaseError> {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(cases, &skins));
    let ledger = ctx.ledger();

    // given
    let mut sync = ctx.refreshed_synchronizer().await;
    if let Some(case) = ledger.case_ids().first() {
        sync.select(Some(case.clone())).unwrap();
    }
    // the ledger moves on, so a partial overwrite would be visible
    let mut minting = ctx.synchronizer();
    minting.mint().await.unwrap();
    let before = sync.snapshot().clone();
    let selection_before = sync.selection().cloned();
    let failing = if fail_cases {
        ObjectKind::Case
    } else {
        ObjectKind::Skin
    };
    ledger.fail_queries_for(failing);

    // when
    let result = sync.refresh().await;

    // then
    prop_assert!(matches!(result, Err(SyncError::Gateway(_))));
    prop_assert_eq!(sync.snapshot(), &before);
    prop_assert_eq!(sync.selection().cloned(), selection_before);
    Ok(())
}

#[tokio::test]
async fn refresh__queries_both_collections_once() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(2, &[Some(1)]));
    let ledger = ctx.ledger();
    let mut sync = ctx.synchronizer();

    // when
    sync.refresh().await.unwrap();

    // then
    let mut calls = ledger.calls();
    calls.sort_by_key(|c| format!("{c:?}"));
    assert_eq!(
        calls,
        vec![
            LedgerCall::Query(ObjectKind::Case),
            LedgerCall::Query(ObjectKind::Skin),
        ]
    );
    assert_eq!(sync.snapshot(), &ledger.inventory());
}

#[tokio::test]
async fn refresh__runs_both_queries_concurrently() {
    // given
    let ledger = RendezvousLedger {
        barrier: Arc::new(Barrier::new(2)),
    };
    let mut sync = InventorySynchronizer::new(
        ledger,
        Some(TestContext::alice()),
        TestContext::random_object(),
    );

    // when
    let result = tokio::time::timeout(Duration::from_secs(2), sync.refresh()).await;

    // then
    assert!(
        matches!(result, Ok(Ok(()))),
        "queries ran one after the other"
    );
    assert_eq!(sync.cases().len(), 1);
    assert_eq!(sync.skins().len(), 1);
}

#[tokio::test]
async fn refresh__replaces_snapshot_wholesale_in_ledger_order() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(3, &[Some(2), None]));
    let ledger = ctx.ledger();
    let mut sync = ctx.refreshed_synchronizer().await;

    // given
    let gone = ledger.case_ids()[0].clone();
    ledger.remove_case(&gone);

    // when
    sync.refresh().await.unwrap();

    // then
    let ids: Vec<_> = sync.cases().iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, ledger.case_ids());
    assert_eq!(sync.skins().len(), 2);
}

#[tokio::test]
async fn refresh__clears_selection_when_case_leaves_the_ledger() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(2, &[]));
    let ledger = ctx.ledger();
    let mut sync = ctx.refreshed_synchronizer().await;

    // given
    let selected = ledger.case_ids()[1].clone();
    sync.select(Some(selected.clone())).unwrap();
    ledger.remove_case(&selected);

    // when
    sync.refresh().await.unwrap();

    // then
    assert_eq!(sync.selection(), None);
    assert_eq!(sync.cases().len(), 1);
}

#[tokio::test]
async fn refresh__keeps_selection_when_case_is_still_owned() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(2, &[]));
    let ledger = ctx.ledger();
    let mut sync = ctx.refreshed_synchronizer().await;

    // given
    let selected = ledger.case_ids()[0].clone();
    sync.select(Some(selected.clone())).unwrap();
    ledger.remove_case(&ledger.case_ids()[1]);

    // when
    sync.refresh().await.unwrap();

    // then
    assert_eq!(sync.selection(), Some(&selected));
}

#[tokio::test]
async fn refresh__without_wallet_empties_inventory_without_queries() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(2, &[Some(4)]));
    let ledger = ctx.ledger();
    let mut sync = ctx.anonymous_synchronizer();

    // when
    let result = sync.refresh().await;

    // then
    assert!(result.is_ok());
    assert!(sync.snapshot().is_empty());
    assert_eq!(sync.selection(), None);
    assert_eq!(ledger.total_calls(), 0);
}

#[tokio::test]
async fn refresh__recovers_after_transient_failure() {
    let ctx = TestContext::new_with_ledger(FakeLedger::with_inventory(1, &[Some(3)]));
    let ledger = ctx.ledger();
    let mut sync = ctx.synchronizer();

    // given
    ledger.fail_queries_for(ObjectKind::Skin);
    assert!(sync.refresh().await.is_err());
    assert!(sync.snapshot().is_empty());

    // when
    ledger.restore_queries();
    sync.refresh().await.unwrap();

    // then
    assert_eq!(sync.snapshot(), &ledger.inventory());
}
