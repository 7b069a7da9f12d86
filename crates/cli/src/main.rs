mod app;
mod cli;
mod error;
mod signals;

use crate::{app::App, cli::Cli, signals::wait_for_signal};
use clap::Parser;
use config::Config;
use flume::bounded;
use tracing::{debug, warn};
use tracing_log::AsTrace;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.log_level_filter().as_trace())
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    debug!(args = ?cli);

    let mut config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => Config::new(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.system.data_dir = data_dir;
    }

    let report = config.validate();
    if cli.validate {
        println!("{report}");
        anyhow::ensure!(report.is_ok(), "configuration has errors");
        return Ok(());
    }
    anyhow::ensure!(report.is_ok(), "configuration has errors:\n{report}");
    for warning in &report.warnings {
        warn!("{warning}");
    }

    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let app = App::bootstrap(config).await?;
    let (events_tx, events_rx) = bounded(8);

    tokio::select! {
        err = wait_for_signal(&events_tx) => {
            tracing::error!(error = ?err, "error while waiting for signal");
            err?;
        }
        () = app.run(events_rx) => {}
    }

    Ok(())
}
