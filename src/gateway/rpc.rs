use super::{
    CallIntent,
    GatewayError,
    LedgerGateway,
    MODULE_NAME,
    TransactionError,
    TxOutcome,
};
use crate::{
    objects::{
        ObjectId,
        ObjectKind,
        OwnedObject,
        SuiAddress,
    },
    wallet::{
        MoveCall,
        WalletSigner,
    },
};
use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use std::{
    collections::HashSet,
    time::Duration,
};
use tracing::{
    debug,
    warn,
};

const PAGE_LIMIT: usize = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks JSON-RPC to a Sui full node for reads and hands writes to a wallet.
#[derive(Clone)]
pub struct SuiRpcGateway<W> {
    rpc_url: String,
    http: reqwest::Client,
    package: ObjectId,
    wallet: W,
}

impl<W> SuiRpcGateway<W> {
    pub fn new(
        rpc_url: impl Into<String>,
        package: ObjectId,
        wallet: W,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            rpc_url: rpc_url.into(),
            http,
            package,
            wallet,
        })
    }

    pub fn struct_type(&self, kind: ObjectKind) -> String {
        struct_type(&self.package, kind)
    }

    async fn owned_objects_page(
        &self,
        owner: &SuiAddress,
        kind: ObjectKind,
        cursor: Option<&str>,
    ) -> Result<OwnedObjectsPage, GatewayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "suix_getOwnedObjects",
            "params": [
                owner.as_str(),
                {
                    "filter": { "StructType": self.struct_type(kind) },
                    "options": { "showType": true, "showContent": true },
                },
                cursor,
                PAGE_LIMIT,
            ],
        });
        let response: RpcResponse<OwnedObjectsPage> = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_result()
    }
}

pub fn struct_type(package: &ObjectId, kind: ObjectKind) -> String {
    format!("{package}::{MODULE_NAME}::{}", kind.struct_name())
}

impl<W: WalletSigner + Sync> LedgerGateway for SuiRpcGateway<W> {
    async fn query_owned_objects(
        &self,
        owner: &SuiAddress,
        kind: ObjectKind,
    ) -> Result<Vec<OwnedObject>, GatewayError> {
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();
        loop {
            let page = self
                .owned_objects_page(owner, kind, cursor.as_deref())
                .await?;
            objects.extend(page.data.iter().filter_map(|entry| entry.to_object(kind)));
            match page.next_unseen_cursor(&mut seen_cursors) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(%owner, %kind, count = objects.len(), "fetched owned objects");
        Ok(objects)
    }

    async fn submit_call(&self, call: &CallIntent) -> Result<TxOutcome, TransactionError> {
        let move_call = MoveCall {
            package: self.package.clone(),
            module: MODULE_NAME.to_string(),
            function: call.entry_point.function_name().to_string(),
            args: call.args.clone(),
        };
        self.wallet.sign_and_execute(&move_call).await
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorDto>,
}

#[derive(Deserialize)]
struct RpcErrorDto {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<T, GatewayError> {
        if let Some(err) = self.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| GatewayError::Decode("response had neither result nor error".into()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedObjectsPage {
    #[serde(default)]
    data: Vec<ObjectResponseDto>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

impl OwnedObjectsPage {
    /// Cursor for the following page, if the node says there is one.
    fn continuation(&self) -> Option<&str> {
        if self.has_next_page {
            self.next_cursor.as_deref()
        } else {
            None
        }
    }

    /// Like `continuation`, but stops on a cursor already followed once.
    fn next_unseen_cursor(&self, seen: &mut HashSet<String>) -> Option<String> {
        let next = self.continuation()?;
        if !seen.insert(next.to_string()) {
            warn!(cursor = next, "node repeated a page cursor; stopping pagination");
            return None;
        }
        Some(next.to_string())
    }
}

#[derive(Deserialize)]
struct ObjectResponseDto {
    data: Option<ObjectDataDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectDataDto {
    object_id: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

impl ObjectResponseDto {
    fn to_object(&self, kind: ObjectKind) -> Option<OwnedObject> {
        let data = self.data.as_ref()?;
        let id = ObjectId::new(data.object_id.clone()?).ok()?;
        Some(match kind {
            ObjectKind::Case => OwnedObject::case(id),
            ObjectKind::Skin => {
                let rarity = data
                    .content
                    .as_ref()
                    .and_then(|c| c.pointer("/fields/rarity"))
                    .and_then(parse_rarity);
                OwnedObject::skin(id, rarity)
            }
        })
    }
}

// Move integers up to u32 come back as JSON numbers, wider ones as strings.
fn parse_rarity(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
