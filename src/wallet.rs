use crate::{
    gateway::{
        TransactionError,
        TxOutcome,
    },
    objects::{
        ObjectId,
        SuiAddress,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_GAS_BUDGET: u64 = 10_000_000;
const SUI_BINARY: &str = "sui";

/// A fully resolved Move call, ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub args: Vec<ObjectId>,
}

/// Whatever holds the keys: signs a call, submits it and reports the result.
pub trait WalletSigner {
    fn sign_and_execute(
        &self,
        call: &MoveCall,
    ) -> impl Future<Output = Result<TxOutcome, TransactionError>> + Send;
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".sui")
        .join("sui_config")
        .join("client.yaml"))
}

pub fn resolve_config_path(path: Option<&str>) -> Result<PathBuf> {
    match path {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_config_path(),
    }
}

/// Signs through the `sui` command line client, which owns the keystore.
#[derive(Clone, Debug)]
pub struct SuiCliWallet {
    binary: String,
    config_path: PathBuf,
    gas_budget: u64,
}

impl SuiCliWallet {
    pub fn new(config_path: PathBuf, gas_budget: u64) -> Self {
        Self {
            binary: SUI_BINARY.to_string(),
            config_path,
            gas_budget,
        }
    }

    fn client_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("client")
            .arg("--client.config")
            .arg(&self.config_path)
            .kill_on_drop(true);
        cmd
    }

    /// Address the wallet currently signs with, if it has one.
    pub async fn active_address(&self) -> Result<Option<SuiAddress>> {
        let output = self
            .client_command()
            .arg("active-address")
            .output()
            .await
            .wrap_err_with(|| format!("failed to run `{} client active-address`", self.binary))?;
        if !output.status.success() {
            return Err(eyre!(
                "`{} client active-address` exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(parse_active_address(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl WalletSigner for SuiCliWallet {
    async fn sign_and_execute(&self, call: &MoveCall) -> Result<TxOutcome, TransactionError> {
        let mut cmd = self.client_command();
        cmd.arg("call")
            .arg("--package")
            .arg(call.package.as_str())
            .arg("--module")
            .arg(&call.module)
            .arg("--function")
            .arg(&call.function);
        if !call.args.is_empty() {
            cmd.arg("--args");
            cmd.args(call.args.iter().map(ObjectId::as_str));
        }
        cmd.arg("--gas-budget")
            .arg(self.gas_budget.to_string())
            .arg("--json");

        debug!(function = %call.function, args = ?call.args, "submitting move call");
        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransactionError::Signer(format!(
                "`{} client call` exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        parse_call_output(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_active_address(stdout: &str) -> Option<SuiAddress> {
    let line = stdout.lines().map(str::trim).rfind(|l| !l.is_empty())?;
    let line = line.trim_matches('"');
    if line.eq_ignore_ascii_case("none") {
        return None;
    }
    SuiAddress::new(line).ok()
}

/// Reads the `--json` transaction block response printed by `sui client call`.
///
/// The CLI may print warnings ahead of the JSON body, so parsing starts at the
/// first `{`.
pub(crate) fn parse_call_output(stdout: &str) -> Result<TxOutcome, TransactionError> {
    let start = stdout.find('{').ok_or_else(|| {
        TransactionError::Signer(format!("no JSON in wallet output: {}", stdout.trim()))
    })?;
    let response: Value = serde_json::from_str(&stdout[start..])?;
    let digest = response
        .get("digest")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let status = response
        .pointer("/effects/status/status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match (status, digest) {
        ("success", Some(digest)) => Ok(TxOutcome { digest }),
        ("success", None) => Err(TransactionError::Rejected {
            digest: None,
            status: String::from("executed without a digest"),
        }),
        (status, digest) => {
            let reason = response
                .pointer("/effects/status/error")
                .and_then(Value::as_str)
                .map(|e| format!("{status}: {e}"))
                .unwrap_or_else(|| status.to_string());
            Err(TransactionError::Rejected {
                digest,
                status: reason,
            })
        }
    }
}
