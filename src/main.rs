// src/main.rs
//! hdwallet-cli
//! Offline tooling around the hardware wallet abstraction: account path
//! planning, xpub assembly/decoding and vendor error classification.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdwallet_bridge::core::config::WalletConfig;
use hdwallet_bridge::core::logging::init_logging;
use hdwallet_bridge::hardware::accounts;
use hdwallet_bridge::hardware::catalog::{self, InputScriptType};
use hdwallet_bridge::hardware::status;
use hdwallet_bridge::hardware::xpub::{self, ExtendedPublicKey, XpubParts};
use hdwallet_bridge::hardware::Vendor;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "hdwallet-cli")]
#[command(about = "Hardware wallet account and key tooling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// TOML config file; defaults plus env overrides when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate account paths for a coin, most preferred first
    AccountPaths {
        #[arg(long, default_value = "Bitcoin")]
        coin: String,
        #[arg(long, default_value_t = 0)]
        account: u32,
        /// e.g. SpendWitness, SpendP2SHWitness
        #[arg(long, value_parser = parse_script_type)]
        script_type: Option<InputScriptType>,
    },
    /// Assemble an xpub from raw parent/child keys (hex)
    Xpub {
        #[arg(long)]
        parent: String,
        #[arg(long)]
        child: String,
        #[arg(long)]
        chain_code: String,
        #[arg(long, default_value = "Bitcoin")]
        coin: String,
        #[arg(long, default_value_t = 3)]
        depth: u8,
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Non-hardened child
        #[arg(long)]
        soft: bool,
    },
    /// Decode and print the fields of an xpub
    DecodeXpub { xpub: String },
    /// Classify a vendor failure payload
    Classify {
        #[arg(long, value_parser = parse_vendor)]
        vendor: Vendor,
        #[arg(long, default_value = "Bitcoin")]
        coin: String,
        payload: String,
    },
}

fn parse_script_type(raw: &str) -> Result<InputScriptType, String> {
    InputScriptType::ALL
        .into_iter()
        .find(|st| format!("{:?}", st).eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("unknown script type: {}", raw))
}

fn parse_vendor(raw: &str) -> Result<Vendor, String> {
    [Vendor::Ledger, Vendor::Trezor, Vendor::KeepKey]
        .into_iter()
        .find(|v| v.name().eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("unknown vendor: {}", raw))
}

fn load_config(path: Option<&PathBuf>) -> Result<WalletConfig> {
    match path {
        Some(p) => WalletConfig::from_file(p)?.with_env_overrides(),
        None => WalletConfig::from_env(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    init_logging(&config.log_filter);
    debug!(?config, "configuration loaded");

    match args.command {
        Commands::AccountPaths {
            coin,
            account,
            script_type,
        } => {
            let paths = accounts::get_account_paths(&coin, account, script_type)?;
            info!(coin = %coin, account, count = paths.len(), "account paths");
            for ap in &paths {
                println!("{:?}\t{}", ap.script_type, ap.address_n_list);
            }
            println!(
                "same account: {}",
                accounts::is_same_account(&paths)
            );
        }
        Commands::Xpub {
            parent,
            child,
            chain_code,
            coin,
            depth,
            index,
            soft,
        } => {
            let info = catalog::coin(&coin)?;
            let parent = hex::decode(parent.trim_start_matches("0x")).context("parent key")?;
            let child = hex::decode(child.trim_start_matches("0x")).context("child key")?;
            let chain = hex::decode(chain_code.trim_start_matches("0x")).context("chain code")?;

            let encoded = xpub::build_encoded(XpubParts {
                parent_public_key: &parent,
                child_public_key: &child,
                chain_code: &chain,
                version: info.xpub_version,
                depth,
                index,
                hardened: !soft,
            })?;
            println!("{}", encoded);
        }
        Commands::DecodeXpub { xpub } => {
            let key = ExtendedPublicKey::decode(xpub.trim())?;
            println!("version:            {:#010x}", key.version);
            println!("depth:              {}", key.depth);
            println!("parent fingerprint: {:08x}", key.parent_fingerprint);
            println!(
                "child number:       {}{}",
                key.child_number & 0x7fff_ffff,
                if key.is_hardened() { "'" } else { "" }
            );
            println!("chain code:         {}", hex::encode(key.chain_code));
            println!("public key:         {}", hex::encode(key.public_key));
        }
        Commands::Classify {
            vendor,
            coin,
            payload,
        } => {
            let raw = status::raw_payload(&serde_json::Value::String(payload));
            let err = status::classify(vendor, &coin, "Device operation failed", raw);
            println!("{:?}", err);
            println!("{}", err);
        }
    }

    Ok(())
}
