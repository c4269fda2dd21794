//! sluice-cli — Scenario driver for the Sluice ledger engine.
//!
//! Executes a JSON-described operation sequence against a fresh in-memory
//! hub and prints every result. The driver plays the collaborator role the
//! engine expects: it keeps the authoritative receiver lists between calls,
//! since the ledger stores only their commitments.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use sluice_core::constants::{AMT_PER_SEC_MULTIPLIER, DEFAULT_CYCLE_SECS};
use sluice_core::types::{AccountId, AssetId, SplitsReceiver, StreamConfig, StreamReceiver};
use sluice_engine::Hub;

/// Sluice streaming-and-splitting ledger, driven from scenario files.
#[derive(Parser)]
#[command(name = "sluice-cli")]
#[command(version, about = "Drive the Sluice ledger from scenario files.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file against a fresh in-memory ledger.
    Run(RunArgs),
    /// Print the commitment of a stream-receiver list.
    HashStreams(HashArgs),
    /// Print the commitment of a split-receiver list.
    HashSplits(HashArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the scenario JSON file.
    file: PathBuf,
}

#[derive(Args)]
struct HashArgs {
    /// Path to a JSON file holding a receiver array.
    file: PathBuf,
}

#[derive(Deserialize)]
struct Scenario {
    #[serde(default = "default_cycle_secs")]
    cycle_secs: u64,
    ops: Vec<Op>,
}

fn default_cycle_secs() -> u64 {
    DEFAULT_CYCLE_SECS
}

#[derive(Deserialize)]
struct StreamReceiverSpec {
    account_id: AccountId,
    #[serde(default)]
    stream_id: u32,
    /// Rate in whole units per second.
    #[serde(default)]
    units_per_sec: u64,
    /// Raw fixed-point rate; takes precedence when non-zero.
    #[serde(default)]
    amt_per_sec: u64,
    #[serde(default)]
    start: u64,
    #[serde(default)]
    duration: u64,
}

impl StreamReceiverSpec {
    fn to_receiver(&self) -> StreamReceiver {
        let amt_per_sec = if self.amt_per_sec != 0 {
            self.amt_per_sec as u128
        } else {
            self.units_per_sec as u128 * AMT_PER_SEC_MULTIPLIER
        };
        StreamReceiver {
            account_id: self.account_id,
            config: StreamConfig {
                stream_id: self.stream_id,
                amt_per_sec,
                start: self.start,
                duration: self.duration,
            },
        }
    }
}

#[derive(Deserialize)]
struct SplitsReceiverSpec {
    account_id: AccountId,
    weight: u32,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op {
    SetStreams {
        account: AccountId,
        asset: AssetId,
        at: u64,
        balance_delta: i64,
        receivers: Vec<StreamReceiverSpec>,
    },
    ReceiveStreams {
        account: AccountId,
        asset: AssetId,
        at: u64,
        max_cycles: Option<u64>,
    },
    Give {
        #[serde(default)]
        from: AccountId,
        to: AccountId,
        asset: AssetId,
        amount: u64,
    },
    SetSplits {
        account: AccountId,
        receivers: Vec<SplitsReceiverSpec>,
    },
    Split {
        account: AccountId,
        asset: AssetId,
    },
    Collect {
        account: AccountId,
        asset: AssetId,
    },
    BalanceAt {
        account: AccountId,
        asset: AssetId,
        at: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Commands::Run(args) => run_scenario(&args),
        Commands::HashStreams(args) => hash_streams(&args),
        Commands::HashSplits(args) => hash_splits(&args),
    }
}

fn load<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn run_scenario(args: &RunArgs) -> Result<()> {
    let scenario: Scenario = load(&args.file)?;
    info!(cycle_secs = scenario.cycle_secs, ops = scenario.ops.len(), "running scenario");
    let mut hub = Hub::new(scenario.cycle_secs);

    // The authoritative receiver lists, carried between calls.
    let mut stream_lists: HashMap<(AccountId, AssetId), Vec<StreamReceiver>> = HashMap::new();
    let mut split_lists: HashMap<AccountId, Vec<SplitsReceiver>> = HashMap::new();

    for (index, op) in scenario.ops.iter().enumerate() {
        match op {
            Op::SetStreams { account, asset, at, balance_delta, receivers } => {
                let new: Vec<StreamReceiver> =
                    receivers.iter().map(StreamReceiverSpec::to_receiver).collect();
                let curr = stream_lists.get(&(*account, *asset)).cloned().unwrap_or_default();
                let real = hub
                    .set_streams(*account, *asset, &curr, i128::from(*balance_delta), &new, &[], *at)
                    .with_context(|| format!("op {index}: set_streams"))?;
                let state = hub.streams_state(*account, *asset);
                stream_lists.insert((*account, *asset), new);
                println!(
                    "[{index}] set_streams account={account} asset={asset} \
                     real_delta={real} balance={} max_end={}",
                    state.balance, state.max_end,
                );
            }
            Op::ReceiveStreams { account, asset, at, max_cycles } => {
                let max_cycles = max_cycles.unwrap_or(u64::MAX);
                let amt = hub
                    .receive_streams(*account, *asset, max_cycles, *at)
                    .with_context(|| format!("op {index}: receive_streams"))?;
                println!(
                    "[{index}] receive_streams account={account} asset={asset} received={amt} \
                     splittable={}",
                    hub.splittable(*account, *asset),
                );
            }
            Op::Give { from, to, asset, amount } => {
                hub.give(*from, *to, *asset, u128::from(*amount))
                    .with_context(|| format!("op {index}: give"))?;
                println!(
                    "[{index}] give from={from} to={to} asset={asset} amount={amount} splittable={}",
                    hub.splittable(*to, *asset),
                );
            }
            Op::SetSplits { account, receivers } => {
                let new: Vec<SplitsReceiver> = receivers
                    .iter()
                    .map(|r| SplitsReceiver::new(r.account_id, r.weight))
                    .collect();
                let curr = split_lists.get(account).cloned().unwrap_or_default();
                hub.set_splits(*account, &curr, &new)
                    .with_context(|| format!("op {index}: set_splits"))?;
                split_lists.insert(*account, new);
                println!("[{index}] set_splits account={account} hash={}", hub.splits_hash_of(*account));
            }
            Op::Split { account, asset } => {
                let curr = split_lists.get(account).cloned().unwrap_or_default();
                let (collectable_amt, split_amt) = hub
                    .split(*account, *asset, &curr)
                    .with_context(|| format!("op {index}: split"))?;
                println!(
                    "[{index}] split account={account} asset={asset} \
                     collectable={collectable_amt} forwarded={split_amt}",
                );
            }
            Op::Collect { account, asset } => {
                let amt = hub.collect(*account, *asset);
                println!("[{index}] collect account={account} asset={asset} amount={amt}");
            }
            Op::BalanceAt { account, asset, at } => {
                let curr = stream_lists.get(&(*account, *asset)).cloned().unwrap_or_default();
                let balance = hub
                    .balance_at(*account, *asset, &curr, *at)
                    .with_context(|| format!("op {index}: balance_at"))?;
                println!("[{index}] balance_at account={account} asset={asset} t={at} balance={balance}");
            }
        }
    }
    Ok(())
}

fn hash_streams(args: &HashArgs) -> Result<()> {
    let specs: Vec<StreamReceiverSpec> = load(&args.file)?;
    let receivers: Vec<StreamReceiver> =
        specs.iter().map(StreamReceiverSpec::to_receiver).collect();
    println!("{}", Hub::hash_streams(&receivers));
    Ok(())
}

fn hash_splits(args: &HashArgs) -> Result<()> {
    let specs: Vec<SplitsReceiverSpec> = load(&args.file)?;
    let receivers: Vec<SplitsReceiver> = specs
        .iter()
        .map(|r| SplitsReceiver::new(r.account_id, r.weight))
        .collect();
    println!("{}", Hub::hash_splits(&receivers));
    Ok(())
}
