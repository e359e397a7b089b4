use arena_client::{
    Address,
    ArenaClient,
    ArenaConfig,
    GatewayLedger,
    Network,
    Wallet,
    commitment::CommitmentGenerator,
    config::SPIN_SECRET_ENV,
    encoder::CallPayload,
    error::SubmissionError,
    model::{
        GameMode,
        SessionHandle,
    },
    wallet::SessionStatus,
};
use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::PathBuf,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "arena-inspect",
    about = "Read-only view of the arena contract: open games, winners, spin commitments",
    version
)]
struct Args {
    /// JSON config file (`~` is expanded)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network preset, used when no config file is given
    #[arg(long, default_value = "devnet")]
    network: Network,

    /// Contract address, required without a config file
    #[arg(long)]
    contract: Option<Address>,

    /// Override the gateway URL
    #[arg(long)]
    gateway: Option<String>,

    /// Write daily rolling logs into this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List open and matched games
    Games,
    /// Show who won a game
    Winner { id: u64 },
    /// Compute the spin commitment for an address at the current epoch
    Commitment { address: Address },
    /// Print the active games on every refresh until interrupted
    Watch,
}

/// Identity for read-only use. Refuses to sign anything.
struct ReadOnlyWallet;

impl Wallet for ReadOnlyWallet {
    fn address(&self) -> Address {
        Address::new([0u8; 32])
    }

    async fn submit(
        &self,
        _payloads: &[CallPayload],
    ) -> Result<Option<SessionHandle>, SubmissionError> {
        Err(SubmissionError::Wallet("arena-inspect cannot sign".to_string()))
    }

    async fn session_status(
        &self,
        _handle: &SessionHandle,
    ) -> Result<SessionStatus, SubmissionError> {
        Ok(SessionStatus::Pending)
    }
}

fn init_tracing(log_dir: Option<&PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, "arena-inspect.log"));
            let _ = LOG_GUARD.set(guard);
            let _ = fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .try_init();
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

fn load_config(args: &Args) -> Result<ArenaConfig> {
    let mut config = match &args.config {
        Some(path) => ArenaConfig::load(path)
            .wrap_err_with(|| format!("loading config {}", path.display()))?,
        None => {
            let contract = args
                .contract
                .ok_or_else(|| eyre!("pass --contract <address> or --config <path>"))?;
            let mut config = ArenaConfig::for_network(args.network, contract);
            config.spin_secret = std::env::var(SPIN_SECRET_ENV).ok();
            config
        }
    };
    if let Some(gateway) = &args.gateway {
        config.gateway_url = gateway.clone();
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(args.log_dir.as_ref());
    let config = load_config(&args)?;
    tracing::info!(network = %config.network, gateway = %config.gateway_url, "starting arena-inspect");

    let ledger = GatewayLedger::new(
        config.gateway_url.clone(),
        config.address_hrp.clone(),
        config.contract,
        config.request_timeout,
        config.epoch_cache_ttl,
    )
    .wrap_err("building gateway client")?;
    let client = ArenaClient::new(ledger, ReadOnlyWallet, config);

    match args.command {
        Command::Games => print_games(&client).await,
        Command::Winner { id } => {
            match client.winner(id).await? {
                Some(winner) => println!("game {id}: won by {}", bech32(&client, &winner)?),
                None => println!("game {id}: no winner yet"),
            }
            Ok(())
        }
        Command::Commitment { address } => {
            let secret = client
                .config()
                .spin_secret
                .as_deref()
                .ok_or_else(|| eyre!("set {SPIN_SECRET_ENV} or spin_secret in the config"))?;
            let hrp = &client.config().address_hrp;
            let commitment = CommitmentGenerator::new(client.ledger(), secret, hrp)
                .generate(&address)
                .await?;
            println!("epoch {}: {}", commitment.epoch, commitment.hash_hex());
            Ok(())
        }
        Command::Watch => watch(&client).await,
    }
}

fn bech32(client: &ArenaClient<GatewayLedger, ReadOnlyWallet>, address: &Address) -> Result<String> {
    Ok(address.to_bech32(&client.config().address_hrp)?)
}

async fn print_games(client: &ArenaClient<GatewayLedger, ReadOnlyWallet>) -> Result<()> {
    let batch = client.active_games().await?;
    print_records(client, &batch.records)?;
    if !batch.errors.is_empty() {
        println!("({} malformed records skipped)", batch.errors.len());
    }
    Ok(())
}

fn print_records(
    client: &ArenaClient<GatewayLedger, ReadOnlyWallet>,
    games: &[arena_client::GameRecord],
) -> Result<()> {
    if games.is_empty() {
        println!("no active games");
    }
    for game in games {
        let rival = match &game.rival {
            Some(rival) => bech32(client, rival)?,
            None => "open".to_string(),
        };
        println!(
            "#{:<6} {:<6} {:>14} {:<14} {} vs {}",
            game.id,
            game.side.label(GameMode::CoinFlip),
            client.display_amount(game),
            game.token,
            bech32(client, &game.creator)?,
            rival,
        );
    }
    Ok(())
}

async fn watch(client: &ArenaClient<GatewayLedger, ReadOnlyWallet>) -> Result<()> {
    let mut watch = client.watch_active_games();
    loop {
        tokio::select! {
            snapshot = watch.next() => {
                let Some(snapshot) = snapshot else {
                    tracing::warn!("active games watcher closed");
                    break;
                };
                println!("-- {} --", snapshot.fetched_at.format("%H:%M:%S"));
                print_records(client, &snapshot.games)?;
            }
            _ = tokio::signal::ctrl_c() => {
                watch.shutdown().await;
                break;
            }
        }
    }
    Ok(())
}
