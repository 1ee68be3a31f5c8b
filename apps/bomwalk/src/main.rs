//! # bomwalk - product structure resolver
//!
//! The main binary for bomwalk.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/bomwalk (THE BINARY)              │
//! │                                                       │
//! │  ┌─────────────┐   ┌──────────────┐   ┌────────────┐  │
//! │  │    CLI      │   │   Config     │   │  Logging   │  │
//! │  │   (clap)    │   │   (toml)     │   │ (tracing)  │  │
//! │  └──────┬──────┘   └──────┬───────┘   └─────┬──────┘  │
//! │         └─────────────────┼─────────────────┘         │
//! │                           ▼                           │
//! │                   ┌───────────────┐                   │
//! │                   │ bomwalk-core  │                   │
//! │                   │ (THE RESOLVER)│                   │
//! │                   └───────────────┘                   │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! bomwalk init
//! bomwalk import -f catalog.json
//! bomwalk resolve --ci BIKE-CI --policy effective --serial 120
//! bomwalk baseline create --ci BIKE-CI -n v1.0 -t released
//! ```

use bomwalk::cli::{self, Cli};
use bomwalk::config::{FileConfig, LogFormat, Overrides, Settings, process_env};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    // A broken config file still gets logged, with default settings.
    let file = FileConfig::load(cli.config.as_deref());
    let overrides = Overrides {
        database: cli.database.clone(),
        workspace: cli.workspace.clone(),
    };
    let settings = Settings::resolve(
        overrides,
        file.as_ref().cloned().unwrap_or_default(),
        process_env,
        cli.json_mode,
    );

    // BOMWALK_LOG_FORMAT=json (or log_format = "json") enables machine-parseable output.
    init_tracing(settings.log_format);

    if !cli.quiet && !settings.json_mode {
        print_banner();
    }

    let result = file.and_then(|_| cli::execute(cli.command, &settings));
    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bomwalk=info,bomwalk_core=info".into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Print the startup banner.
fn print_banner() {
    eprintln!("bomwalk v{} - product structure resolver", env!("CARGO_PKG_VERSION"));
}
