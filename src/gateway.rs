use crate::objects::{
    ObjectId,
    ObjectKind,
    OwnedObject,
    SuiAddress,
};
use std::fmt;
use thiserror::Error;

pub mod rpc;

/// Move module that hosts every entry point the client calls.
pub const MODULE_NAME: &str = "case_opener";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    CreateCase,
    OpenCase,
    DeleteSkin,
}

impl EntryPoint {
    pub fn function_name(self) -> &'static str {
        match self {
            EntryPoint::CreateCase => "create_case",
            EntryPoint::OpenCase => "open_case",
            EntryPoint::DeleteSkin => "delete_skin",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// A transaction intent: which entry point to call and the objects it takes,
/// by id, in argument order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallIntent {
    pub entry_point: EntryPoint,
    pub args: Vec<ObjectId>,
}

impl CallIntent {
    pub fn create_case() -> Self {
        Self {
            entry_point: EntryPoint::CreateCase,
            args: Vec::new(),
        }
    }

    pub fn open_case(case_id: ObjectId, random_object: ObjectId) -> Self {
        Self {
            entry_point: EntryPoint::OpenCase,
            args: vec![case_id, random_object],
        }
    }

    pub fn delete_skin(skin_id: ObjectId) -> Self {
        Self {
            entry_point: EntryPoint::DeleteSkin,
            args: vec![skin_id],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutcome {
    pub digest: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ledger returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected ledger payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction {digest:?} was not executed successfully: {status}")]
    Rejected {
        digest: Option<String>,
        status: String,
    },
    #[error("wallet refused to sign: {0}")]
    Signer(String),
    #[error("failed to run wallet command")]
    Io(#[from] std::io::Error),
    #[error("unreadable wallet output")]
    Decode(#[from] serde_json::Error),
}

/// Read and write access to the ledger, as seen by the inventory.
pub trait LedgerGateway {
    /// Every object of `kind` owned by `owner`, in ledger response order.
    fn query_owned_objects(
        &self,
        owner: &SuiAddress,
        kind: ObjectKind,
    ) -> impl Future<Output = Result<Vec<OwnedObject>, GatewayError>> + Send;

    /// Signs, submits and awaits execution of a single entry point call.
    fn submit_call(
        &self,
        call: &CallIntent,
    ) -> impl Future<Output = Result<TxOutcome, TransactionError>> + Send;
}
