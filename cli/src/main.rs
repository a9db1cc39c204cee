//! VitalWatch: reports growth-token collateralization to a Telegram chat.
//!
//! Every interval the daemon reads each lending token's lent and borrowed
//! reserves over HTTP and posts one line per token. Optionally it also
//! watches new blocks and decodes contract events over a supervised
//! WebSocket connection.
//!
//! ```text
//! TELEGRAM_BOT_API_KEY=... TELEGRAM_BOT_CHAT_ID=... \
//!   vitalwatch --network kovan --infura-project-id <id> \
//!              --event 'Transfer(address,address,uint256)' --watch-blocks
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use vitalwatch_core::{DecodedEvent, HandlerError};
use vitalwatch_monitor::{LendingToken, TelegramNotifier, VitalsMonitor};
use vitalwatch_rpc::{
    FailFast, HttpRpcClient, LogAndContinue, RpcTransport, Supervisor, WsConnector,
};
use vitalwatch_stream::{EventSubscriber, Subscription};

mod artifacts;
mod logging;
mod networks;

use logging::LogConfig;
use networks::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailureMode {
    /// Any transport or handler failure stops the daemon.
    FailFast,
    /// Log failures, drop the offending event and keep going.
    LogAndContinue,
}

#[derive(Parser)]
#[command(
    name = "vitalwatch",
    about = "Lending-token vitals monitor with Telegram reports",
    version
)]
struct Cli {
    /// Network to watch
    #[arg(long, env = "NETWORK", value_enum, default_value_t = Network::Development)]
    network: Network,

    /// Infura project id (public networks)
    #[arg(long, env = "INFURA_PROJECT_ID", hide_env_values = true)]
    infura_project_id: Option<String>,

    /// Node host for the `testing` network
    #[arg(long, env = "TEST_SERVER")]
    test_server: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_API_KEY", hide_env_values = true)]
    telegram_bot_api_key: String,

    #[arg(long, env = "TELEGRAM_BOT_CHAT_ID")]
    telegram_bot_chat_id: String,

    /// Directory holding the truffle build artifacts
    #[arg(long, env = "VITALWATCH_BUILD_DIR", default_value = "build/contracts")]
    build_dir: PathBuf,

    /// Lending tokens to report on, by artifact name
    #[arg(
        long,
        env = "VITALWATCH_TOKENS",
        value_delimiter = ',',
        default_value = "gcDAI,gcUSDC,gcUSDT"
    )]
    tokens: Vec<String>,

    /// Seconds between reports
    #[arg(long, env = "VITALWATCH_INTERVAL_SECS", default_value_t = 60)]
    interval: u64,

    /// Event signature to decode, e.g. 'Transfer(address indexed,address indexed,uint256)'
    #[arg(long = "event", env = "VITALWATCH_EVENTS", value_delimiter = ';')]
    events: Vec<String>,

    /// Log every new block number
    #[arg(long, env = "VITALWATCH_WATCH_BLOCKS")]
    watch_blocks: bool,

    /// What a transport or handler failure does to the daemon
    #[arg(long, env = "VITALWATCH_FAILURE_MODE", value_enum, default_value_t = FailureMode::FailFast)]
    failure_mode: FailureMode,

    /// Global log level
    #[arg(long, env = "VITALWATCH_LOG", default_value = "info")]
    log_level: String,

    /// Per-crate level override, e.g. vitalwatch_rpc=debug
    #[arg(long = "log-component", value_parser = logging::parse_component)]
    log_components: Vec<(String, String)>,

    /// Emit JSON logs
    #[arg(long, env = "VITALWATCH_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            components: self.log_components.iter().cloned().collect(),
            json: self.log_json,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_config());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("vitalwatch stopped: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let endpoints = cli
        .network
        .endpoints(cli.infura_project_id.as_deref(), cli.test_server.as_deref())?;
    let network_id = cli.network.network_id();
    tracing::info!(network = %cli.network, network_id, "starting");

    let addresses = cli
        .tokens
        .iter()
        .map(|name| {
            artifacts::deployed_address(&cli.build_dir, name, network_id)
                .map(|address| (name.as_str(), address))
        })
        .collect::<Result<Vec<_>>>()?;

    let connector = WsConnector::new(endpoints.ws.clone());
    let (supervisor, handle) = match cli.failure_mode {
        FailureMode::FailFast => Supervisor::new(connector, FailFast),
        FailureMode::LogAndContinue => Supervisor::new(connector, LogAndContinue),
    };
    let mut supervisor = tokio::spawn(supervisor.run());

    let subscriber = EventSubscriber::new(handle);
    let mut subscriptions: Vec<Subscription> = Vec::new();
    if cli.watch_blocks {
        let blocks = subscriber
            .subscribe_blocks(|number: u64| async move {
                tracing::info!(block = number, "new block");
                Ok::<_, HandlerError>(())
            })
            .await
            .context("subscribe to new blocks")?;
        subscriptions.push(blocks);
    }
    if !cli.events.is_empty() {
        let logs = subscriber
            .subscribe_logs(cli.events.as_slice(), |event: DecodedEvent| async move {
                log_event(&event);
                Ok::<_, HandlerError>(())
            })
            .await
            .context("subscribe to events")?;
        subscriptions.push(logs);
    }

    let queries: Arc<dyn RpcTransport> = Arc::new(HttpRpcClient::new(endpoints.http));
    let mut tokens = Vec::with_capacity(addresses.len());
    for (name, address) in addresses {
        let token = LendingToken::connect(queries.clone(), address)
            .await
            .with_context(|| format!("connect {name} at {address}"))?;
        tokens.push(token);
    }

    let notifier = TelegramNotifier::new(cli.telegram_bot_api_key, cli.telegram_bot_chat_id);
    let monitor = VitalsMonitor::new(tokens, notifier, Duration::from_secs(cli.interval));

    let outcome = tokio::select! {
        res = monitor.run() => res.context("vitals monitor failed"),
        res = &mut supervisor => match res {
            Ok(Ok(())) => Err(anyhow!("connection supervisor stopped")),
            Ok(Err(failure)) => Err(failure).context("connection supervisor terminated"),
            Err(join) => Err(join).context("connection supervisor panicked"),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(())
        }
    };

    if outcome.is_ok() {
        for subscription in subscriptions {
            let kind = subscription.kind();
            if let Err(e) = subscription.cancel().await {
                tracing::warn!(kind, error = %e, "unsubscribe failed");
            }
        }
    }
    outcome
}

fn log_event(event: &DecodedEvent) {
    let values: Vec<String> = event.values.iter().map(|v| v.to_string()).collect();
    tracing::info!(
        event = %event.name,
        contract = %event.address,
        block = event.block_number,
        values = %values.join(", "),
        "event"
    );
}
