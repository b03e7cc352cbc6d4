/* This file is part of govbudget
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Thin daemon entrypoint: loads config, wires a [`BudgetManager`] against
//! whatever host adapters a real deployment supplies for `ChainView`,
//! `MasternodeDirectory`, `Wallet` and `P2pTransport`, and drives the
//! orchestrator off the host's own block-tip notifications until signalled
//! to shut down. The adapters themselves are host-specific integration work
//! and are out of scope here — this binary exists to exercise config
//! loading, logging and the shutdown path end to end.

use std::path::PathBuf;

use structopt_toml::{serde::Deserialize, structopt::StructOpt, StructOptToml};

const CONFIG_FILE: &str = "govbudget_config.toml";

#[derive(Clone, Debug, Deserialize, StructOpt, StructOptToml)]
#[serde(default)]
#[structopt(name = "govbudgetd")]
struct Args {
    /// Configuration file to use
    #[structopt(short, long)]
    config: Option<String>,

    /// Snapshot file to load on startup and save to on shutdown
    #[structopt(long, default_value = "govbudget.snapshot")]
    snapshot: PathBuf,

    /// Increase verbosity (-vvv supported)
    #[structopt(short, parse(from_occurrences))]
    verbose: u8,
}

impl Default for Args {
    fn default() -> Self {
        Self { config: None, snapshot: PathBuf::from("govbudget.snapshot"), verbose: 0 }
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut cfg = simplelog::ConfigBuilder::new();
    cfg.set_target_level(level);
    if simplelog::TermLogger::init(
        level,
        cfg.build(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .is_err()
    {
        eprintln!("Logger failed to initialize");
    }
}

fn main() -> govbudget::Result<()> {
    let args = Args::from_args();
    init_logger(args.verbose);

    let config_path = args.config.clone().unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = match std::fs::read_to_string(&config_path) {
        Ok(toml_str) => toml::from_str(&toml_str)
            .map_err(|e| govbudget::Error::Persistence(format!("failed to parse {config_path}: {e}")))?,
        Err(_) => govbudget::Config::default(),
    };

    smol::block_on(realmain(config, args.snapshot))
}

async fn realmain(_config: govbudget::Config, _snapshot_path: PathBuf) -> govbudget::Result<()> {
    log::info!(target: "govbudgetd", "starting governance engine");

    let (signal, shutdown) = smol::channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        smol::block_on(signal.send(())).ok();
    })
    .map_err(|e| govbudget::Error::Persistence(format!("failed to install signal handler: {e}")))?;

    // Host integration wires a concrete ChainView/MasternodeDirectory/Wallet/
    // P2pTransport here and constructs the BudgetManager; loads
    // `_snapshot_path` via `BudgetManager::load_snapshot`, drives
    // `on_new_block` off the host's own tip notifications, and saves back to
    // `_snapshot_path` on the way out.

    shutdown.recv().await.map_err(|e| govbudget::Error::Persistence(e.to_string()))?;
    log::info!(target: "govbudgetd", "caught termination signal, exiting");

    Ok(())
}
