//! MetaNode staking shell.
//!
//! Drives the staking controller against an in-memory pool, one command per
//! line.

mod command;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use metastake_chain::{ChannelNotifier, SimulatedPool, StakingController};
use metastake_core::{Address, Amount, AppConfig, config};
use shell::Shell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEMO_ACCOUNT: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

/// MetaNode staking shell - stake, unstake, withdraw and claim from the prompt.
#[derive(Parser, Debug)]
#[command(name = "metastake")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Account to connect with (defaults to the last used account)
    #[arg(short, long)]
    account: Option<Address>,

    /// Starting wallet balance of the account
    #[arg(short, long, default_value = "10")]
    balance: Amount,

    /// Pool id of the native-token pool
    #[arg(long, default_value_t = 0)]
    pool_id: u64,

    /// Seconds to wait for a transaction to be included
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Config file to use instead of the platform default
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_app_config(path: Option<&PathBuf>) -> AppConfig {
    let result = match path {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default config: {}", e);
            if let Some(path) = path.cloned().or_else(|| config::get_config_path().ok())
                && path.exists()
            {
                match config::backup_corrupted_config(&path) {
                    Ok(backup) => tracing::info!("Backed up config to {}", backup.display()),
                    Err(e) => tracing::warn!("Could not back up config: {}", e),
                }
            }
            AppConfig::default()
        }
    }
}

fn save_app_config(path: Option<&PathBuf>, app_config: &AppConfig) {
    let result = match path {
        Some(path) => config::save_config_to(app_config, path),
        None => config::save_config(app_config),
    };
    if let Err(e) = result {
        tracing::warn!("Failed to save config: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::install()?;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("metastake=info".parse()?)
        .add_directive("metastake_chain=info".parse()?)
        .add_directive("metastake_core=info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut app_config = load_app_config(args.config.as_ref());
    if let Some(timeout) = args.timeout_secs {
        app_config.controller.confirmation_timeout_secs = timeout;
    }
    app_config
        .controller
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration: {}", e))?;

    let account = match args.account.or(app_config.last_account) {
        Some(account) => account,
        None => DEMO_ACCOUNT.parse()?,
    };
    tracing::info!("Using account {}", account);

    let pool = Arc::new(SimulatedPool::new(args.pool_id));
    pool.set_wallet_balance(account, args.balance);
    pool.connect(account);

    let (notifier, notes) = ChannelNotifier::new();
    let controller = StakingController::new(
        pool.collaborators(Arc::new(notifier)),
        app_config.controller.clone(),
    );
    if let Err(e) = controller.sync_account().await {
        tracing::warn!("Initial sync incomplete: {}", e);
    }

    Shell::new(controller, pool, account).run(notes).await?;

    app_config.last_account = Some(account);
    save_app_config(args.config.as_ref(), &app_config);
    Ok(())
}
