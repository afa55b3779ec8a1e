use crate::ui;
use case_opener::{
    InventorySynchronizer,
    SuiRpcGateway,
    SyncError,
    deployment::{
        self,
        DeploymentEnv,
        DeploymentStore,
    },
    identity::{
        IdentityProvider,
        WalletSession,
    },
    objects::{
        ObjectId,
        OwnedObject,
        SuiAddress,
    },
    wallet::SuiCliWallet,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    error::Error,
    path::PathBuf,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_DEVNET_RPC_URL: &str = "https://fullnode.devnet.sui.io:443";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";
pub const DEFAULT_MAINNET_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:9000";
/// Sui's shared `Random` object.
pub const DEFAULT_RANDOM_OBJECT_ID: &str = "0x8";
/// `case_opener` as published on testnet.
pub const TESTNET_PACKAGE_ID: &str =
    "0xe259ae9e0ed8ffdca328add794eb3c58f0e7d88c8e0e779339aaaa3e46bfe5e2";
const MAX_ERRORS: usize = 50;
const VISIBLE_ERRORS: usize = 5;

type Synchronizer = InventorySynchronizer<SuiRpcGateway<SuiCliWallet>, WalletSession>;

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Devnet { url: String },
    Testnet { url: String },
    Mainnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Devnet { url }
            | NetworkTarget::Testnet { url }
            | NetworkTarget::Mainnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Mainnet { .. } => DeploymentEnv::Main,
            NetworkTarget::LocalNode { .. } => DeploymentEnv::Local,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub package: Option<String>,
    pub random_object: Option<String>,
    pub client_config: PathBuf,
    pub gas_budget: u64,
    pub save_deployment: bool,
}

/// Everything the UI renders. Rebuilt from worker reports, never from the chain directly.
#[derive(Clone, Debug, Default)]
pub struct AppSnapshot {
    pub network: String,
    pub package: String,
    pub address: Option<String>,
    pub connected: bool,
    pub cases: Vec<OwnedObject>,
    pub skins: Vec<OwnedObject>,
    pub selection: Option<ObjectId>,
    pub pending: Option<String>,
    pub status: String,
    pub errors: Vec<String>,
}

/// Work the inventory worker performs on the synchronizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Refresh,
    Mint,
    Open(ObjectId),
    Discard(ObjectId),
    Select(Option<ObjectId>),
    Connect,
    Disconnect,
}

impl Operation {
    /// Operations that submit a transaction.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::Mint | Operation::Open(_) | Operation::Discard(_)
        )
    }

    fn progress_message(&self) -> String {
        match self {
            Operation::Refresh => String::from("Refreshing inventory..."),
            Operation::Mint => String::from("Minting case..."),
            Operation::Open(id) => format!("Opening case {}...", ui::short_id(id.as_str(), 18)),
            Operation::Discard(id) => {
                format!("Deleting skin {}...", ui::short_id(id.as_str(), 18))
            }
            Operation::Select(_) => String::from("Selecting..."),
            Operation::Connect => String::from("Connecting wallet..."),
            Operation::Disconnect => String::from("Disconnecting wallet..."),
        }
    }
}

/// What the worker saw after running an operation.
#[derive(Clone, Debug)]
struct InventoryView {
    address: Option<String>,
    connected: bool,
    cases: Vec<OwnedObject>,
    skins: Vec<OwnedObject>,
    selection: Option<ObjectId>,
}

impl InventoryView {
    fn capture(sync: &Synchronizer) -> Self {
        let session = sync.identity();
        Self {
            address: session.known_address().map(ToString::to_string),
            connected: session.current_address().is_some(),
            cases: sync.cases().to_vec(),
            skins: sync.skins().to_vec(),
            selection: sync.selection().cloned(),
        }
    }
}

enum WorkerCommand {
    Run(Operation),
    Shutdown,
}

enum WorkerEvent {
    Finished {
        operation: Operation,
        outcome: std::result::Result<String, String>,
        view: InventoryView,
    },
}

/// Owns the UI-side state and the single in-flight transaction slot.
pub struct AppController {
    snapshot: AppSnapshot,
    in_flight: Option<Operation>,
    commands: mpsc::UnboundedSender<WorkerCommand>,
}

impl AppController {
    fn new(
        snapshot: AppSnapshot,
        commands: mpsc::UnboundedSender<WorkerCommand>,
    ) -> Self {
        Self {
            snapshot,
            in_flight: None,
            commands,
        }
    }

    pub fn snapshot(&self) -> &AppSnapshot {
        &self.snapshot
    }

    /// Hands an operation to the worker.
    ///
    /// While a transaction is pending, further transactions are refused rather
    /// than queued; reads and selection changes still go through.
    pub fn request(&mut self, operation: Operation) {
        if let (true, Some(pending)) = (operation.is_mutating(), &self.in_flight) {
            let msg = format!(
                "Still waiting on: {} Try again once it completes.",
                pending.progress_message()
            );
            warn!(?operation, ?pending, "rejected transaction while another is pending");
            self.push_errors(vec![msg]);
            return;
        }
        let progress = operation.progress_message();
        if operation.is_mutating() {
            self.in_flight = Some(operation.clone());
            self.snapshot.pending = Some(progress.clone());
        }
        if self.commands.send(WorkerCommand::Run(operation)).is_err() {
            self.push_errors(vec![String::from("inventory worker is not running")]);
            self.in_flight = None;
            self.snapshot.pending = None;
            return;
        }
        self.set_status(progress);
    }

    fn shutdown(&self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
    }

    fn apply(&mut self, event: WorkerEvent) {
        let WorkerEvent::Finished {
            operation,
            outcome,
            view,
        } = event;
        if operation.is_mutating() {
            self.in_flight = None;
            self.snapshot.pending = None;
        }
        self.snapshot.address = view.address;
        self.snapshot.connected = view.connected;
        self.snapshot.cases = view.cases;
        self.snapshot.skins = view.skins;
        self.snapshot.selection = view.selection;
        match outcome {
            Ok(status) => self.set_status(status),
            Err(msg) => {
                self.set_status(String::from("Last action failed"));
                self.push_errors(vec![msg]);
            }
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.snapshot.status = status.into();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.snapshot.errors.append(&mut items);
        if self.snapshot.errors.len() > MAX_ERRORS {
            let drain = self.snapshot.errors.len() - MAX_ERRORS;
            self.snapshot.errors.drain(0..drain);
        }
    }

    fn visible_snapshot(&self) -> AppSnapshot {
        let mut snapshot = self.snapshot.clone();
        let skip = snapshot.errors.len().saturating_sub(VISIBLE_ERRORS);
        snapshot.errors = snapshot.errors.split_off(skip);
        snapshot
    }

    fn dismiss_errors(&mut self) {
        self.snapshot.errors.clear();
    }
}

/// Display form of an error and every cause beneath it.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn describe_failure(operation: &Operation, err: &SyncError) -> String {
    let action = match operation {
        Operation::Refresh => "Refresh",
        Operation::Mint => "Mint",
        Operation::Open(_) => "Open",
        Operation::Discard(_) => "Delete",
        Operation::Select(_) => "Select",
        Operation::Connect => "Connect",
        Operation::Disconnect => "Disconnect",
    };
    match err {
        SyncError::NotAuthenticated => format!("{action} failed: connect a wallet first (w)"),
        SyncError::NoSelection => format!("{action} failed: select a case first"),
        SyncError::StaleAfterCommit { .. } => {
            format!("{action}: {} (press r to retry the refresh)", error_chain(err))
        }
        other => format!("{action} failed: {}", error_chain(other)),
    }
}

async fn run_operation(
    sync: &mut Synchronizer,
    wallet: &SuiCliWallet,
    operation: &Operation,
) -> std::result::Result<String, SyncError> {
    match operation {
        Operation::Refresh => {
            sync.refresh().await?;
            Ok(format!(
                "Inventory refreshed: {} case(s), {} skin(s)",
                sync.cases().len(),
                sync.skins().len()
            ))
        }
        Operation::Mint => {
            let outcome = sync.mint().await?;
            Ok(format!("Minted a case (tx {})", ui::short_id(&outcome.digest, 14)))
        }
        Operation::Open(case_id) => {
            let skins_before: Vec<ObjectId> =
                sync.skins().iter().map(|s| s.id.clone()).collect();
            let outcome = sync.open(Some(case_id.clone())).await?;
            let unboxed: Vec<String> = sync
                .skins()
                .iter()
                .filter(|s| !skins_before.contains(&s.id))
                .map(|s| s.rarity_label().into_owned())
                .collect();
            let tx = ui::short_id(&outcome.digest, 14);
            Ok(if unboxed.is_empty() {
                format!("Opened case (tx {tx})")
            } else {
                format!("Unboxed {} (tx {tx})", unboxed.join(", "))
            })
        }
        Operation::Discard(skin_id) => {
            let outcome = sync.discard(skin_id.clone()).await?;
            Ok(format!(
                "Deleted skin {} (tx {})",
                ui::short_id(skin_id.as_str(), 18),
                ui::short_id(&outcome.digest, 14)
            ))
        }
        Operation::Select(case_id) => {
            sync.select(case_id.clone())?;
            Ok(match case_id {
                Some(id) => format!("Selected case {}", ui::short_id(id.as_str(), 18)),
                None => String::from("Selection cleared"),
            })
        }
        Operation::Connect => {
            let active = active_account(wallet).await;
            if !sync.identity_mut().reconnect(active) {
                return Err(SyncError::NotAuthenticated);
            }
            sync.refresh().await?;
            let address = sync
                .identity()
                .known_address()
                .map(ToString::to_string)
                .unwrap_or_default();
            Ok(format!("Connected as {}", ui::short_id(&address, 18)))
        }
        Operation::Disconnect => {
            sync.identity_mut().disconnect();
            sync.refresh().await?;
            Ok(String::from("Wallet disconnected"))
        }
    }
}

async fn inventory_worker(
    mut sync: Synchronizer,
    wallet: SuiCliWallet,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) -> Result<()> {
    while let Some(cmd) = cmd_rx.recv().await {
        let operation = match cmd {
            WorkerCommand::Run(operation) => operation,
            WorkerCommand::Shutdown => break,
        };
        let outcome = run_operation(&mut sync, &wallet, &operation)
            .await
            .map_err(|err| describe_failure(&operation, &err));
        let view = InventoryView::capture(&sync);
        event_tx
            .send(WorkerEvent::Finished {
                operation,
                outcome,
                view,
            })
            .map_err(|_| eyre!("inventory event receiver dropped"))?;
    }
    Ok(())
}

fn resolve_package(config: &AppConfig) -> Result<(ObjectId, ObjectId)> {
    let env = config.network.env();
    let store = DeploymentStore::new(env)?;
    let recorded = store.latest()?;

    let package = match (&config.package, &recorded) {
        (Some(explicit), _) => explicit.clone(),
        (None, Some(record)) => record.package_id.clone(),
        (None, None) if env == DeploymentEnv::Test => TESTNET_PACKAGE_ID.to_string(),
        (None, None) => {
            return Err(eyre!(
                "No case_opener package recorded for {env} in {}.\n\
                 Pass --package <id> (add --save-deployment to remember it).",
                store.path().display()
            ));
        }
    };
    let random_object = config
        .random_object
        .clone()
        .or_else(|| recorded.and_then(|r| r.random_object_id))
        .unwrap_or_else(|| DEFAULT_RANDOM_OBJECT_ID.to_string());

    if config.save_deployment {
        let record = deployment::record_deployment(
            &store,
            &package,
            config.network.url(),
            Some(&random_object),
        )?;
        info!(package = %record.package_id, path = %store.path().display(), "saved deployment record");
    }

    let package = package
        .parse::<ObjectId>()
        .wrap_err("invalid package id")?;
    let random_object = random_object
        .parse::<ObjectId>()
        .wrap_err("invalid random object id")?;
    Ok((package, random_object))
}

/// Asks the wallet which account it signs with; failures are logged and read as "none".
async fn active_account(wallet: &SuiCliWallet) -> Option<SuiAddress> {
    match wallet.active_address().await {
        Ok(Some(address)) => {
            info!(%address, "using active wallet address");
            Some(address)
        }
        Ok(None) => {
            warn!("wallet has no active address");
            None
        }
        Err(err) => {
            warn!(?err, "could not read active wallet address");
            None
        }
    }
}

async fn build_synchronizer(
    config: &AppConfig,
) -> Result<(Synchronizer, SuiCliWallet, ObjectId)> {
    let (package, random_object) = resolve_package(config)?;
    let wallet = SuiCliWallet::new(config.client_config.clone(), config.gas_budget);
    let session = match active_account(&wallet).await {
        Some(address) => WalletSession::connected(address),
        None => WalletSession::disconnected(),
    };
    let gateway = SuiRpcGateway::new(config.network.url(), package.clone(), wallet.clone())
        .wrap_err("failed to build ledger client")?;
    Ok((
        InventorySynchronizer::new(gateway, session, random_object),
        wallet,
        package,
    ))
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    info!(network = %config.network.env(), url = config.network.url(), "connecting");
    let (sync, wallet, package) = build_synchronizer(&config).await?;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let initial = AppSnapshot {
        network: format!("{} ({})", config.network.env(), config.network.url()),
        package: package.to_string(),
        status: String::from("Loading inventory..."),
        ..AppSnapshot::default()
    };
    let mut controller = AppController::new(initial, cmd_tx);
    let worker = tokio::spawn(inventory_worker(sync, wallet, cmd_rx, event_tx));
    controller.request(Operation::Refresh);

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();
    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, event_rx, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;

    controller.shutdown();
    match worker.await {
        Ok(Err(err)) => warn!(?err, "inventory worker stopped with an error"),
        Err(err) => warn!(?err, "inventory worker panicked"),
        Ok(Ok(())) => {}
    }
    res
}

async fn run_loop(
    controller: &mut AppController,
    mut event_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    ui::draw(ui_state, &controller.visible_snapshot()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    warn!("inventory worker channel closed");
                    break;
                };
                controller.apply(event);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, controller.snapshot(), event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::DismissErrors => controller.dismiss_errors(),
                    ui::UserEvent::Refresh => controller.request(Operation::Refresh),
                    ui::UserEvent::Mint => controller.request(Operation::Mint),
                    ui::UserEvent::OpenSelected => match controller.snapshot().selection.clone() {
                        Some(case_id) => controller.request(Operation::Open(case_id)),
                        None => controller.push_errors(vec![
                            String::from("Open failed: select a case first"),
                        ]),
                    },
                    ui::UserEvent::SelectCase(case_id) => {
                        controller.request(Operation::Select(Some(case_id)))
                    }
                    ui::UserEvent::ClearSelection => controller.request(Operation::Select(None)),
                    ui::UserEvent::Discard(skin_id) => {
                        controller.request(Operation::Discard(skin_id))
                    }
                    ui::UserEvent::ToggleWallet => {
                        let operation = if controller.snapshot().connected {
                            Operation::Disconnect
                        } else {
                            Operation::Connect
                        };
                        controller.request(operation);
                    }
                }
            }
        }
        ui::draw(ui_state, &controller.visible_snapshot()).wrap_err("draw failed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn controller() -> (AppController, mpsc::UnboundedReceiver<WorkerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AppController::new(AppSnapshot::default(), tx), rx)
    }

    fn id(raw: &str) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn finished(operation: Operation, outcome: std::result::Result<String, String>) -> WorkerEvent {
        WorkerEvent::Finished {
            operation,
            outcome,
            view: InventoryView {
                address: Some(String::from("0xa11ce")),
                connected: true,
                cases: vec![OwnedObject::case(id("0xc1"))],
                skins: Vec::new(),
                selection: None,
            },
        }
    }

    #[test]
    fn request__rejects_second_transaction_while_one_is_pending() {
        // given
        let (mut controller, mut rx) = controller();
        controller.request(Operation::Mint);

        // when
        controller.request(Operation::Discard(id("0x5")));

        // then
        assert!(matches!(
            rx.try_recv(),
            Ok(WorkerCommand::Run(Operation::Mint))
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(controller.snapshot().errors.len(), 1);
        assert_eq!(controller.in_flight, Some(Operation::Mint));
    }

    #[test]
    fn request__lets_reads_through_while_transaction_is_pending() {
        // given
        let (mut controller, mut rx) = controller();
        controller.request(Operation::Mint);

        // when
        controller.request(Operation::Refresh);

        // then
        assert!(matches!(rx.try_recv(), Ok(WorkerCommand::Run(Operation::Mint))));
        assert!(matches!(rx.try_recv(), Ok(WorkerCommand::Run(Operation::Refresh))));
        assert!(controller.snapshot().errors.is_empty());
    }

    #[test]
    fn apply__frees_slot_and_copies_inventory_view() {
        // given
        let (mut controller, _rx) = controller();
        controller.request(Operation::Mint);

        // when
        controller.apply(finished(Operation::Mint, Ok(String::from("Minted a case"))));

        // then
        assert_eq!(controller.in_flight, None);
        assert_eq!(controller.snapshot().pending, None);
        assert_eq!(controller.snapshot().cases.len(), 1);
        assert_eq!(controller.snapshot().status, "Minted a case");
        controller.request(Operation::Mint);
        assert_eq!(controller.in_flight, Some(Operation::Mint));
    }

    #[test]
    fn apply__records_failures_in_error_list() {
        // given
        let (mut controller, _rx) = controller();
        controller.request(Operation::Open(id("0xc1")));

        // when
        controller.apply(finished(
            Operation::Open(id("0xc1")),
            Err(String::from("Open failed: transaction failed")),
        ));

        // then
        assert_eq!(controller.in_flight, None);
        assert_eq!(
            controller.snapshot().errors,
            vec![String::from("Open failed: transaction failed")]
        );
    }

    #[test]
    fn visible_snapshot__shows_only_latest_errors() {
        let (mut controller, _rx) = controller();
        controller.push_errors((0..8).map(|i| format!("e{i}")).collect());

        let visible = controller.visible_snapshot();

        assert_eq!(visible.errors, vec!["e3", "e4", "e5", "e6", "e7"]);
        assert_eq!(controller.snapshot().errors.len(), 8);
    }

    #[test]
    fn describe_failure__includes_underlying_cause() {
        let err = SyncError::Transaction(case_opener::gateway::TransactionError::Rejected {
            digest: None,
            status: String::from("InsufficientGas"),
        });

        let msg = describe_failure(&Operation::Mint, &err);

        assert_eq!(
            msg,
            "Mint failed: transaction failed: transaction None was not executed successfully: InsufficientGas"
        );
    }
}
