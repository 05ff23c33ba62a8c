use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rift_switch::common::config::SwitcherSettings;
use rift_switch::common::log::init_logging;
use rift_switch::common::settings_store::{MemorySettingsStore, SettingsStore, TomlSettingsStore};
use rift_switch::replay::{self, Script};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "rift-switch",
    version = env!("CARGO_PKG_VERSION"),
    about = "MRU process switcher with a long-press picker"
)]
struct Cli {
    /// Settings file. Defaults to the user configuration directory.
    #[arg(long, value_name = "PATH", global = true)]
    settings: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, value_name = "FILTER", default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective settings as TOML.
    Settings,
    /// Run an event script against the headless platform.
    Replay {
        script: PathBuf,
        /// Write setting changes made by the script back to the settings file.
        #[arg(long)]
        persist: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let path = cli.settings.unwrap_or_else(TomlSettingsStore::default_path);
    let store = TomlSettingsStore::open(&path)
        .with_context(|| format!("opening settings at {}", path.display()))?;

    match cli.command {
        Command::Settings => {
            let settings = SwitcherSettings::load(&store);
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        Command::Replay { script, persist } => {
            let parsed = Script::load(&script)?;
            let store: Box<dyn SettingsStore> = if persist {
                Box::new(store)
            } else {
                Box::new(MemorySettingsStore::from(store.table().clone()))
            };
            let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
            let calls = runtime.block_on(replay::run(parsed, store));
            info!(requests = calls.len(), "replay finished");
            for call in calls {
                println!("{call:?}");
            }
        }
    }
    Ok(())
}
