use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use position_resolver::{get_balances_with_config, Balance, BalanceQuery, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "position-resolver")]
#[command(about = "Resolve staked, pooled and lent positions into underlying token balances", long_about = None)]
struct Args {
    /// The wallet address to query
    #[arg(short, long)]
    address: String,

    /// Chain to query (ethereum, fantom, etc.)
    #[arg(short, long, default_value = "ethereum")]
    chain: String,

    /// Only resolve this protocol (frax-finance, geist, etc.)
    #[arg(short, long)]
    protocol: Option<String>,

    /// Give up after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Print balances as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file to use instead of the built-in one
    #[arg(long)]
    config: Option<String>,

    /// Override the chain's RPC endpoint
    #[arg(long)]
    rpc: Option<String>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "position_resolver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_balance(balance: &Balance, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = balance.symbol.clone().unwrap_or_else(|| balance.address.to_string());
    let mut tag = match balance.stable {
        Some(true) => format!("{:?} (stable)", balance.category),
        Some(false) => format!("{:?} (variable)", balance.category),
        None => format!("{:?}", balance.category),
    };
    if let Some(provider) = &balance.provider {
        tag = format!("{tag} [{provider}]");
    }

    println!(
        "{indent}{:12} | {:>28} | {} (raw: {})",
        label,
        balance.formatted(),
        tag,
        balance.amount
    );
    for underlying in &balance.underlyings {
        print_balance(underlying, depth + 1);
    }
    for reward in &balance.rewards {
        print_balance(reward, depth + 1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_path(path).with_context(|| format!("loading configuration from {path}"))?,
        None => Config::load()?,
    };
    if let Some(rpc) = &args.rpc {
        if let Some(chain) = config.chains.get_mut(&args.chain) {
            chain.rpc = rpc.clone();
        }
    }

    let query = BalanceQuery {
        protocol: args.protocol.clone(),
        timeout: args.timeout.map(Duration::from_secs),
    };
    let balances = get_balances_with_config(&config, &args.chain, &args.address, &query)
        .await
        .with_context(|| format!("resolving balances for {} on {}", args.address, args.chain))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&balances)?);
        return Ok(());
    }

    println!("Querying balances for address: {}\n", args.address);
    println!("Chain: {}", args.chain);
    println!("{}", "=".repeat(80));

    for balance in &balances {
        print_balance(balance, 0);
    }

    println!("{}", "=".repeat(80));

    Ok(())
}
