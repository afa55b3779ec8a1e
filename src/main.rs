use case_opener::{
    deployment,
    wallet,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

mod client;
mod ui;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "case-opener.log";

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: case-opener [--devnet | --testnet | --mainnet | --local] [--rpc-url <url>]\n\
         [--package <id>] [--random-object <id>] [--save-deployment]\n\
         [--client-config <path>] [--gas-budget <mist>]\n\
         \n\
         Flags:\n\
           --devnet                Connect to Sui devnet (default RPC {})\n\
           --testnet               Connect to Sui testnet (default RPC {}, the default network)\n\
           --mainnet               Connect to Sui mainnet (default RPC {})\n\
           --local                 Connect to a local Sui node (default RPC {})\n\
           --rpc-url <url>         Override the RPC URL for the selected network\n\
           --package <id>          case_opener package id (defaults to the latest deployment record)\n\
           --random-object <id>    Shared Random object passed to open_case (default {})\n\
           --save-deployment       Record the resolved package under .deployments/<env>/\n\
           --client-config <path>  Sui client config used for signing (default ~/.sui/sui_config/client.yaml)\n\
           --gas-budget <mist>     Gas budget per transaction (default {})",
        client::DEFAULT_DEVNET_RPC_URL,
        client::DEFAULT_TESTNET_RPC_URL,
        client::DEFAULT_MAINNET_RPC_URL,
        client::DEFAULT_LOCAL_RPC_URL,
        client::DEFAULT_RANDOM_OBJECT_ID,
        wallet::DEFAULT_GAS_BUDGET,
    );
    std::process::exit(0);
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Mainnet,
        Local,
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut package: Option<String> = None;
    let mut random_object: Option<String> = None;
    let mut client_config: Option<String> = None;
    let mut gas_budget: Option<u64> = None;
    let mut save_deployment = false;

    let mut set_network = |flag: NetworkFlag| -> Result<()> {
        if network_flag.is_some() {
            return Err(eyre!(
                "Multiple network flags provided; choose one of --devnet/--testnet/--mainnet/--local"
            ));
        }
        network_flag = Some(flag);
        Ok(())
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" => set_network(NetworkFlag::Devnet)?,
            "--testnet" => set_network(NetworkFlag::Testnet)?,
            "--mainnet" => set_network(NetworkFlag::Mainnet)?,
            "--local" => set_network(NetworkFlag::Local)?,
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                custom_url = Some(url);
            }
            "--package" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--package requires an object id"))?;
                if package.is_some() {
                    return Err(eyre!("--package may only be specified once"));
                }
                package = Some(id);
            }
            "--random-object" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--random-object requires an object id"))?;
                if random_object.is_some() {
                    return Err(eyre!("--random-object may only be specified once"));
                }
                random_object = Some(id);
            }
            "--client-config" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--client-config requires a path argument"))?;
                if client_config.is_some() {
                    return Err(eyre!("--client-config may only be specified once"));
                }
                client_config = Some(path);
            }
            "--gas-budget" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--gas-budget requires an amount"))?;
                let budget = raw
                    .parse::<u64>()
                    .wrap_err_with(|| format!("invalid --gas-budget value: {raw}"))?;
                gas_budget = Some(budget);
            }
            "--save-deployment" => save_deployment = true,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag.unwrap_or(NetworkFlag::Testnet) {
        NetworkFlag::Devnet => client::NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        NetworkFlag::Testnet => client::NetworkTarget::Testnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        NetworkFlag::Mainnet => client::NetworkTarget::Mainnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_MAINNET_RPC_URL.to_string()),
        },
        NetworkFlag::Local => client::NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let client_config = wallet::resolve_config_path(client_config.as_deref())?;

    Ok(client::AppConfig {
        network,
        package,
        random_object,
        client_config,
        gas_budget: gas_budget.unwrap_or(wallet::DEFAULT_GAS_BUDGET),
        save_deployment,
    })
}

/// Logs go to a daily file; the terminal belongs to the UI.
fn init_tracing() -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_appender = rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Flags first: --help and bad input must not touch the filesystem
    let app_config = parse_cli_args(std::env::args().skip(1))?;
    let _log_guard = init_tracing();
    tracing::info!("starting case-opener client");
    deployment::ensure_structure()?;
    client::run_app(app_config).await
}
