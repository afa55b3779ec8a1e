use crate::{
    gateway::{
        CallIntent,
        GatewayError,
        LedgerGateway,
        TransactionError,
        TxOutcome,
    },
    identity::IdentityProvider,
    objects::{
        InventorySnapshot,
        ObjectId,
        ObjectKind,
        OwnedObject,
        SuiAddress,
    },
};
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no wallet connected")]
    NotAuthenticated,
    #[error("no case selected")]
    NoSelection,
    #[error("case {0} is not in the current inventory")]
    InvalidSelection(ObjectId),
    #[error("inventory query failed")]
    Gateway(#[source] GatewayError),
    #[error("transaction failed")]
    Transaction(#[source] TransactionError),
    #[error(
        "transaction {} committed but the inventory could not be reloaded",
        outcome.digest
    )]
    StaleAfterCommit {
        outcome: TxOutcome,
        #[source]
        source: GatewayError,
    },
}

/// Keeps the caller's cases and skins in step with the ledger.
///
/// The snapshot is only ever replaced as a whole by a successful refresh, and
/// every successful transaction is followed by one. The selection always names
/// a case from the current snapshot, or nothing.
pub struct InventorySynchronizer<Gateway, Identity> {
    gateway: Gateway,
    identity: Identity,
    random_object: ObjectId,
    snapshot: InventorySnapshot,
    selection: Option<ObjectId>,
}

impl<Gateway, Identity> InventorySynchronizer<Gateway, Identity> {
    /// `random_object` is the shared randomness object `open_case` consumes.
    pub fn new(gateway: Gateway, identity: Identity, random_object: ObjectId) -> Self {
        Self {
            gateway,
            identity,
            random_object,
            snapshot: InventorySnapshot::default(),
            selection: None,
        }
    }

    pub fn snapshot(&self) -> &InventorySnapshot {
        &self.snapshot
    }

    pub fn cases(&self) -> &[OwnedObject] {
        &self.snapshot.cases
    }

    pub fn skins(&self) -> &[OwnedObject] {
        &self.snapshot.skins
    }

    pub fn selection(&self) -> Option<&ObjectId> {
        self.selection.as_ref()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    /// Selects a case for the next `open`, or clears the selection with `None`.
    ///
    /// Ids missing from the current snapshot are rejected and the previous
    /// selection is kept.
    pub fn select(&mut self, case_id: Option<ObjectId>) -> Result<(), SyncError> {
        match case_id {
            None => {
                self.selection = None;
                Ok(())
            }
            Some(id) if self.snapshot.contains_case(&id) => {
                self.selection = Some(id);
                Ok(())
            }
            Some(id) => Err(SyncError::InvalidSelection(id)),
        }
    }
}

impl<Gateway, Identity> InventorySynchronizer<Gateway, Identity>
where
    Gateway: LedgerGateway,
    Identity: IdentityProvider,
{
    /// Reloads both collections from the ledger.
    ///
    /// Without a connected wallet the inventory is emptied and no query is
    /// made. If either query fails the previous snapshot is kept untouched.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        let Some(owner) = self.identity.current_address() else {
            debug!("no wallet connected; clearing inventory");
            self.snapshot = InventorySnapshot::default();
            self.selection = None;
            return Ok(());
        };
        self.reload(&owner).await.map_err(SyncError::Gateway)
    }

    /// Mints a fresh case into the caller's account.
    pub async fn mint(&mut self) -> Result<TxOutcome, SyncError> {
        let owner = self.require_identity()?;
        let outcome = self.submit(CallIntent::create_case()).await?;
        self.reload_after_commit(&owner, outcome).await
    }

    /// Opens `case_id`, or the selected case when `None` is given.
    ///
    /// The id is checked against the current snapshot before anything is
    /// submitted. The selection is cleared only once the transaction succeeds.
    pub async fn open(&mut self, case_id: Option<ObjectId>) -> Result<TxOutcome, SyncError> {
        let owner = self.require_identity()?;
        let case_id = case_id
            .or_else(|| self.selection.clone())
            .ok_or(SyncError::NoSelection)?;
        if !self.snapshot.contains_case(&case_id) {
            if self.selection.as_ref() == Some(&case_id) {
                self.selection = None;
            }
            return Err(SyncError::InvalidSelection(case_id));
        }

        let call = CallIntent::open_case(case_id, self.random_object.clone());
        let outcome = self.submit(call).await?;
        self.selection = None;
        self.reload_after_commit(&owner, outcome).await
    }

    /// Burns a skin.
    pub async fn discard(&mut self, skin_id: ObjectId) -> Result<TxOutcome, SyncError> {
        let owner = self.require_identity()?;
        let outcome = self.submit(CallIntent::delete_skin(skin_id)).await?;
        self.reload_after_commit(&owner, outcome).await
    }

    fn require_identity(&self) -> Result<SuiAddress, SyncError> {
        self.identity
            .current_address()
            .ok_or(SyncError::NotAuthenticated)
    }

    async fn submit(&self, call: CallIntent) -> Result<TxOutcome, SyncError> {
        match self.gateway.submit_call(&call).await {
            Ok(outcome) => {
                info!(
                    entry_point = %call.entry_point,
                    digest = %outcome.digest,
                    "transaction executed"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    entry_point = %call.entry_point,
                    error = %err,
                    "transaction failed"
                );
                Err(SyncError::Transaction(err))
            }
        }
    }

    async fn reload_after_commit(
        &mut self,
        owner: &SuiAddress,
        outcome: TxOutcome,
    ) -> Result<TxOutcome, SyncError> {
        match self.reload(owner).await {
            Ok(()) => Ok(outcome),
            Err(source) => Err(SyncError::StaleAfterCommit { outcome, source }),
        }
    }

    async fn reload(&mut self, owner: &SuiAddress) -> Result<(), GatewayError> {
        let queried = futures::try_join!(
            self.gateway.query_owned_objects(owner, ObjectKind::Case),
            self.gateway.query_owned_objects(owner, ObjectKind::Skin),
        );
        let (cases, skins) = match queried {
            Ok(collections) => collections,
            Err(err) => {
                warn!(%owner, error = %err, "inventory refresh failed; keeping previous snapshot");
                return Err(err);
            }
        };

        self.snapshot = InventorySnapshot { cases, skins };
        if self
            .selection
            .as_ref()
            .is_some_and(|id| !self.snapshot.contains_case(id))
        {
            debug!("selected case left the inventory; clearing selection");
            self.selection = None;
        }
        info!(
            %owner,
            cases = self.snapshot.cases.len(),
            skins = self.snapshot.skins.len(),
            "inventory refreshed"
        );
        Ok(())
    }
}
