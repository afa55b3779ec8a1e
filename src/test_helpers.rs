use crate::{
    gateway::{
        CallIntent,
        EntryPoint,
        GatewayError,
        LedgerGateway,
        TransactionError,
        TxOutcome,
    },
    objects::{
        InventorySnapshot,
        ObjectId,
        ObjectKind,
        OwnedObject,
        SuiAddress,
    },
    synchronizer::InventorySynchronizer,
};
use rand::Rng;
use std::{
    collections::{
        HashSet,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};

pub const RANDOM_OBJECT_ID: &str = "0x8";

/// Everything the fake ledger was asked to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    Query(ObjectKind),
    Submit(CallIntent),
}

#[derive(Default)]
struct LedgerState {
    cases: Vec<OwnedObject>,
    skins: Vec<OwnedObject>,
    calls: Vec<LedgerCall>,
    failing_queries: HashSet<ObjectKind>,
    failing_submits: VecDeque<String>,
    queued_rarities: VecDeque<u64>,
    issued_ids: HashSet<ObjectId>,
}

/// In-memory stand-in for the chain and the case opener contract.
///
/// Clones share state, so a test can keep a handle while the synchronizer
/// owns another.
#[derive(Clone, Default)]
pub struct FakeLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(cases: usize, skins: &[Option<u64>]) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.lock();
            for _ in 0..cases {
                let id = fresh_id(&mut state);
                state.cases.push(OwnedObject::case(id));
            }
            for rarity in skins {
                let id = fresh_id(&mut state);
                state.skins.push(OwnedObject::skin(id, *rarity));
            }
        }
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    pub fn inventory(&self) -> InventorySnapshot {
        let state = self.lock();
        InventorySnapshot {
            cases: state.cases.clone(),
            skins: state.skins.clone(),
        }
    }

    pub fn case_ids(&self) -> Vec<ObjectId> {
        self.lock().cases.iter().map(|c| c.id.clone()).collect()
    }

    pub fn skin_ids(&self) -> Vec<ObjectId> {
        self.lock().skins.iter().map(|s| s.id.clone()).collect()
    }

    /// Removes a case behind the client's back, as another session would.
    pub fn remove_case(&self, id: &ObjectId) {
        self.lock().cases.retain(|c| &c.id != id);
    }

    pub fn fail_queries_for(&self, kind: ObjectKind) {
        self.lock().failing_queries.insert(kind);
    }

    pub fn restore_queries(&self) {
        self.lock().failing_queries.clear();
    }

    pub fn fail_next_submit(&self, reason: impl Into<String>) {
        self.lock().failing_submits.push_back(reason.into());
    }

    pub fn queue_rarity(&self, rarity: u64) {
        self.lock().queued_rarities.push_back(rarity);
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn query_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, LedgerCall::Query(_)))
            .count()
    }

    pub fn submit_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, LedgerCall::Submit(_)))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }
}

fn fresh_id(state: &mut LedgerState) -> ObjectId {
    loop {
        let bytes = rand::rng().random::<[u8; 32]>();
        let id = ObjectId::new(format!("0x{}", hex::encode(bytes)))
            .expect("hex id is never empty");
        if state.issued_ids.insert(id.clone()) {
            return id;
        }
    }
}

fn rejected(reason: impl Into<String>) -> TransactionError {
    TransactionError::Rejected {
        digest: None,
        status: reason.into(),
    }
}

fn execute(state: &mut LedgerState, call: &CallIntent) -> Result<(), TransactionError> {
    match call.entry_point {
        EntryPoint::CreateCase => {
            let id = fresh_id(state);
            state.cases.push(OwnedObject::case(id));
        }
        EntryPoint::OpenCase => {
            let case_id = call
                .args
                .first()
                .ok_or_else(|| rejected("open_case needs a case"))?;
            if call.args.get(1).map(ObjectId::as_str) != Some(RANDOM_OBJECT_ID) {
                return Err(rejected("open_case needs the random object"));
            }
            let idx = state
                .cases
                .iter()
                .position(|c| &c.id == case_id)
                .ok_or_else(|| rejected(format!("case {case_id} not owned")))?;
            state.cases.remove(idx);
            let rarity = state
                .queued_rarities
                .pop_front()
                .unwrap_or_else(|| rand::rng().random_range(1..=4));
            let id = fresh_id(state);
            state.skins.push(OwnedObject::skin(id, Some(rarity)));
        }
        EntryPoint::DeleteSkin => {
            let skin_id = call
                .args
                .first()
                .ok_or_else(|| rejected("delete_skin needs a skin"))?;
            let idx = state
                .skins
                .iter()
                .position(|s| &s.id == skin_id)
                .ok_or_else(|| rejected(format!("skin {skin_id} not owned")))?;
            state.skins.remove(idx);
        }
    }
    Ok(())
}

impl LedgerGateway for FakeLedger {
    async fn query_owned_objects(
        &self,
        _owner: &SuiAddress,
        kind: ObjectKind,
    ) -> Result<Vec<OwnedObject>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(LedgerCall::Query(kind));
        if state.failing_queries.contains(&kind) {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: format!("{kind} query unavailable"),
            });
        }
        Ok(match kind {
            ObjectKind::Case => state.cases.clone(),
            ObjectKind::Skin => state.skins.clone(),
        })
    }

    async fn submit_call(&self, call: &CallIntent) -> Result<TxOutcome, TransactionError> {
        let mut state = self.lock();
        state.calls.push(LedgerCall::Submit(call.clone()));
        if let Some(reason) = state.failing_submits.pop_front() {
            return Err(rejected(reason));
        }
        execute(&mut state, call)?;
        let digest = hex::encode(rand::rng().random::<[u8; 16]>());
        Ok(TxOutcome { digest })
    }
}

pub type TestSynchronizer = InventorySynchronizer<FakeLedger, Option<SuiAddress>>;

pub struct TestContext {
    ledger: FakeLedger,
}

impl TestContext {
    pub fn new() -> Self {
        Self::new_with_ledger(FakeLedger::new())
    }

    pub fn new_with_ledger(ledger: FakeLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> FakeLedger {
        self.ledger.clone()
    }

    pub fn alice() -> SuiAddress {
        SuiAddress::new("0xa11ce").unwrap()
    }

    pub fn random_object() -> ObjectId {
        ObjectId::new(RANDOM_OBJECT_ID).unwrap()
    }

    /// Synchronizer signed in as alice.
    pub fn synchronizer(&self) -> TestSynchronizer {
        InventorySynchronizer::new(
            self.ledger.clone(),
            Some(Self::alice()),
            Self::random_object(),
        )
    }

    /// Synchronizer with no wallet connected.
    pub fn anonymous_synchronizer(&self) -> TestSynchronizer {
        InventorySynchronizer::new(self.ledger.clone(), None, Self::random_object())
    }

    /// Signed-in synchronizer that has already loaded the ledger once; the
    /// call log starts empty.
    pub async fn refreshed_synchronizer(&self) -> TestSynchronizer {
        let mut sync = self.synchronizer();
        sync.refresh().await.unwrap();
        self.ledger.clear_calls();
        sync
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
