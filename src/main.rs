mod client;
mod config;
mod export;
mod harvest;
mod hero;

use anyhow::Context as _;
use env_logger::{Env, Target};
use tracing::{error, info, warn};

use client::StatsClient;
use config::{load_config, Settings};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            error!("ignoring unreadable .env file: {e}");
        }
    }
    let settings = Settings::from_env();

    let (maps, ranks) = load_config(&settings.config_path);
    info!(
        maps = maps.len(),
        ranks = ranks.len(),
        path = %settings.config_path.display(),
        "configuration loaded"
    );
    if maps.is_empty() || ranks.is_empty() {
        error!("configuration load failed, cannot continue");
        return Ok(());
    }

    let client = StatsClient::new(&settings).context("could not build HTTP client")?;
    let table = harvest::harvest(&client, &maps, &ranks);
    if table.is_empty() {
        warn!("no usable rows fetched, writing header only");
    } else {
        info!(rows = table.len(), "harvest finished");
    }

    export::export_table(&table, &settings.output_dir)
        .context("could not save the result spreadsheet")?;

    Ok(())
}
