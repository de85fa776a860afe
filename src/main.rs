//! CineStream - resilient catalog resolution and stream cleanup
//!
//! Resolves content across unreliable catalog backends, strips ad segments
//! from HLS manifests and matches timed comment tracks.
//!
//! # Usage
//!
//! ```bash
//! cinestream search "blade runner"
//! cinestream resolve cms_4521 --api https://backend.example/api.php/provide/vod
//! cinestream manifest https://cdn.example/index.m3u8 -o clean.m3u8
//! cinestream comments "Show Name" --episode 3 --json
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cinestream::app::App;
use cinestream::cli::{Cli, Command, ExitCode, Output};
use cinestream::commands;
use cinestream::config::Config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

/// Structured logs go to stderr so stdout stays machine-readable
fn init_tracing(verbose: bool) {
    let default = if verbose { "cinestream=debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let app = App::new(config);

    match cli.command {
        Command::Search(cmd) => commands::search_cmd(cmd, &app, &output).await,

        Command::Resolve(cmd) => commands::resolve_cmd(cmd, &app, &output).await,

        Command::Manifest(cmd) => commands::manifest_cmd(cmd, &app, &output).await,

        Command::Comments(cmd) => commands::comments_cmd(cmd, &app, &output).await,

        Command::Progress(cmd) => commands::progress_cmd(cmd, &app, &output),

        Command::Skip(cmd) => commands::skip_cmd(cmd, &app, &output),

        Command::Sources(cmd) => commands::sources_cmd(cmd, &app, &output),

        Command::History(cmd) => commands::history_cmd(cmd, &app, &output),

        Command::Cache(cmd) => commands::cache_cmd(cmd, &app, &output),
    }
}
