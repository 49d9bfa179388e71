mod cli;
mod terminal_ui;

use clap::Parser;
use rgo_config::logging;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let config = cli.load_config()?;
    logging::initialize(&config.logging);

    // Everything runs on one event loop
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::run(cli, config))
}
