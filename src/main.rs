use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portcall2rss::config::{Args, Settings};
use portcall2rss::{fetch, pipeline};

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(4);
        }
    }
}

fn run(args: &Args) -> portcall2rss::Result<()> {
    let settings = Settings::from(args);
    let fetcher = fetch::from_args(args)?;

    let summary = pipeline::run(&settings, fetcher.as_ref())?;
    info!(
        ships = summary.ships,
        without_events = summary.ships_without_events,
        new_items = summary.new_items,
        "feeds written"
    );
    Ok(())
}
