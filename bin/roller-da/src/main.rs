//! DA light-client setup CLI.
//!
//! Drives the DA side of a rollapp home:
//! - initializes the light node and anchors it at a trusted DA block
//! - waits for the DA account to be funded
//! - prints the DA config the rollapp engine starts with

use anyhow::{Context, Result};
use chain_client::{ChainClient, RemoteChainClient};
use chain_queries::BlockInfoResolver;
use clap::{Parser, Subcommand};
use da_layer::DaManager;
use light_client::{
    initialize_light_client, FundingGate, NonInteractivePrompter, Prompter, RpcRecoveryPolicy,
    StdinPrompter, TrustBootstrap,
};
use roller_config::{executables::DEFAULT_BIN_DIR, Executables, NetworkPresets, NodeType, RollappConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "roller-da")]
#[command(about = "DA light-client setup for rollapps")]
struct Cli {
    /// Rollapp home directory (holds roller.toml)
    #[arg(long, env = "ROLLER_HOME", default_value = ".roller")]
    home: PathBuf,

    /// Directory holding the chain binaries
    #[arg(long, env = "ROLLER_BIN_DIR", default_value = DEFAULT_BIN_DIR)]
    bin_dir: PathBuf,

    /// Log level
    #[arg(long, env = "ROLLER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Upper bound for each chain command or RPC call, in seconds
    #[arg(long, env = "ROLLER_COMMAND_TIMEOUT_SECS", default_value_t = 60)]
    command_timeout_secs: u64,

    /// How many replacement DA RPC URLs to ask for when the current one fails
    #[arg(long, env = "ROLLER_MAX_RPC_RETRIES", default_value_t = 3)]
    max_rpc_retries: u32,

    /// Never prompt; fail instead
    #[arg(long, env = "ROLLER_NON_INTERACTIVE")]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the DA light client, anchor it and wait for funding
    Init,
    /// Re-establish the light client's trust checkpoint
    Bootstrap,
    /// Wait until the DA account is funded
    Fund,
    /// Print the DA config for the rollapp engine
    DaConfig {
        /// Node type (defaults to the one in roller.toml)
        #[arg(long)]
        node_type: Option<NodeType>,
    },
    /// Show DA connection status
    Status,
    /// Show the DA account address
    Address,
    /// Show a DA block (latest by default)
    Block {
        #[arg(long)]
        height: Option<u64>,
    },
    /// Remove the light-node store
    Reset,
    /// List known DA networks
    Networks,
}

/// Everything a command needs, built from the CLI flags.
struct Session {
    config: RollappConfig,
    client: Arc<dyn ChainClient>,
    bins: Executables,
    prompter: Arc<dyn Prompter>,
    policy: RpcRecoveryPolicy,
}

impl Session {
    fn load(cli: &Cli) -> Result<Self> {
        let config = RollappConfig::load(&cli.home)
            .with_context(|| format!("failed to load rollapp config from {}", cli.home.display()))?;

        let prompter: Arc<dyn Prompter> = if cli.non_interactive {
            Arc::new(NonInteractivePrompter)
        } else {
            Arc::new(StdinPrompter)
        };

        Ok(Self {
            config,
            client: Arc::new(RemoteChainClient::with_timeout(Duration::from_secs(
                cli.command_timeout_secs,
            ))),
            bins: Executables::in_dir(&cli.bin_dir),
            prompter,
            policy: RpcRecoveryPolicy {
                max_attempts: cli.max_rpc_retries,
            },
        })
    }

    fn da_manager(&self) -> Result<DaManager> {
        Ok(DaManager::new(&self.config, self.client.clone(), &self.bins)?)
    }

    fn bootstrap(&self) -> TrustBootstrap {
        TrustBootstrap::new(
            self.client.clone(),
            &self.bins,
            self.prompter.clone(),
            self.policy,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Networks = cli.command {
        list_networks();
        return Ok(());
    }

    let mut ctx = Session::load(&cli)?;
    match cli.command {
        Commands::Init => init(&mut ctx).await?,
        Commands::Bootstrap => bootstrap(&mut ctx).await?,
        Commands::Fund => fund(&ctx).await?,
        Commands::DaConfig { node_type } => da_config(&mut ctx, node_type).await?,
        Commands::Status => status(&ctx).await?,
        Commands::Address => address(&ctx).await?,
        Commands::Block { height } => block(&ctx, height).await?,
        Commands::Reset => reset(&ctx)?,
        Commands::Networks => {}
    }

    Ok(())
}

async fn init(ctx: &mut Session) -> Result<()> {
    info!(
        "Initializing {} light client for {}",
        ctx.config.da.backend, ctx.config.rollapp_id
    );

    let mut da = ctx.da_manager()?;
    let bootstrap = ctx.bootstrap();
    let result = initialize_light_client(&mut ctx.config, &mut da, &bootstrap).await?;

    println!("DA light client initialized:");
    println!("  Key: {}", result.key.name);
    println!("  Address: {}", result.key.address);
    if let Some(mnemonic) = &result.mnemonic {
        println!("  Mnemonic (store it safely, it is shown only once):");
        println!("    {}", mnemonic);
    }
    if let Some(bootstrapped) = &result.bootstrap {
        println!(
            "  Trusted height: {} ({:?})",
            bootstrapped.checkpoint.height, bootstrapped.source
        );
        println!("  Trusted hash: {}", bootstrapped.checkpoint.hash);
    }

    FundingGate::new(ctx.prompter.clone())
        .wait_until_funded(&*da)
        .await?;
    println!("DA account is funded");

    Ok(())
}

async fn bootstrap(ctx: &mut Session) -> Result<()> {
    let da = ctx.da_manager()?;
    let path = da
        .light_client_config_path()
        .with_context(|| format!("{} has no light client trust anchor", da.backend()))?;

    let result = ctx.bootstrap().run(&mut ctx.config, &path).await?;

    println!("Trust checkpoint written to {}:", path.display());
    println!("  Height: {}", result.checkpoint.height);
    println!("  Hash: {}", result.checkpoint.hash);
    println!("  Source: {:?}", result.source);

    Ok(())
}

async fn fund(ctx: &Session) -> Result<()> {
    let da = ctx.da_manager()?;
    FundingGate::new(ctx.prompter.clone())
        .wait_until_funded(&*da)
        .await?;
    println!("DA account is funded");
    Ok(())
}

async fn da_config(ctx: &mut Session, node_type: Option<NodeType>) -> Result<()> {
    let mut da = ctx.da_manager()?;
    let node_type = node_type.unwrap_or(ctx.config.node_type);
    let blob = da.sequencer_da_config(node_type).await?;

    let namespace = da.namespace_id();
    if !namespace.is_empty() && ctx.config.da.namespace_id.as_deref() != Some(namespace.as_str()) {
        info!("Saving namespace {} to roller.toml", namespace);
        ctx.config.da.namespace_id = Some(namespace);
        ctx.config.save()?;
    }

    println!("{}", blob);
    Ok(())
}

async fn status(ctx: &Session) -> Result<()> {
    let da = ctx.da_manager()?;

    println!("DA Status:");
    println!("  Backend: {}", da.backend());
    println!("  Network: {}", ctx.config.da.id);
    println!("  Status: {}", da.status().await);
    match da.light_node_endpoint() {
        Ok(endpoint) if !endpoint.is_empty() => println!("  Endpoint: {}", endpoint),
        Ok(_) => {}
        Err(e) => println!("  Endpoint: <unavailable: {}>", e),
    }
    let namespace = da.namespace_id();
    if !namespace.is_empty() {
        println!("  Namespace: {}", namespace);
    }
    if da.app_id() != 0 {
        println!("  App ID: {}", da.app_id());
    }

    Ok(())
}

async fn address(ctx: &Session) -> Result<()> {
    let key = ctx.da_manager()?.da_account_address().await?;
    println!("{}: {}", key.name, key.address);
    Ok(())
}

async fn block(ctx: &Session, height: Option<u64>) -> Result<()> {
    let resolver = BlockInfoResolver::new(ctx.client.clone(), &ctx.bins.celestia_app);
    let block = match height {
        Some(h) => resolver.block_by_height(h, &ctx.config.da).await?,
        None => resolver.latest_block(&ctx.config.da).await?,
    };

    println!("Height: {}", block.height);
    println!("Hash: {}", block.hash);
    Ok(())
}

fn reset(ctx: &Session) -> Result<()> {
    let da = ctx.da_manager()?;
    da.reset_store()?;
    println!("Removed {}", da.store().display());
    Ok(())
}

fn list_networks() {
    let presets = NetworkPresets::builtin();
    for da in presets.iter() {
        println!("{:<16} {:<12} {}", da.id, da.backend.as_str(), da.rpc_url);
    }
}
