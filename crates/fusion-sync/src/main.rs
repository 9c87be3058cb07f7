//! Fusion Sync - download and load the fusion-gene reference databases

use clap::Parser;
use fusion_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use fusion_sync::{CosmicCredentials, HttpFetcher, SyncConfig, SyncOrchestrator, SyncReport};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "fusion-sync")]
#[command(author, version, about = "Synchronize FusionGDB, FusionGDB2, Mitelman and COSMIC into local SQLite databases")]
struct Cli {
    /// Directory the databases are written to
    #[arg(short, long, env = "FUSION_SYNC_OUTPUT")]
    output: Option<PathBuf>,

    /// Pre-encoded COSMIC token, base64 of `user:password`
    #[arg(long, env = "COSMIC_TOKEN", hide_env_values = true)]
    cosmic_token: Option<String>,

    /// COSMIC account e-mail, used with --cosmic-passwd
    #[arg(long, env = "COSMIC_USR")]
    cosmic_usr: Option<String>,

    /// COSMIC account password, used with --cosmic-usr
    #[arg(long, env = "COSMIC_PASSWD", hide_env_values = true)]
    cosmic_passwd: Option<String>,

    /// Skip COSMIC; no credentials needed
    #[arg(long)]
    no_cosmic: bool,

    /// Concurrent FusionGDB downloads
    #[arg(short = 't', long)]
    thread_num: Option<usize>,

    /// Do not draw download progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn credentials(&self) -> CosmicCredentials {
        CosmicCredentials {
            token: self.cosmic_token.clone(),
            username: self.cosmic_usr.clone(),
            password: self.cosmic_passwd.clone(),
        }
    }

    /// Environment configuration with command-line overrides applied
    fn sync_config(&self) -> fusion_sync::Result<SyncConfig> {
        let mut config = SyncConfig::from_env()?;
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(n) = self.thread_num {
            config.thread_num = n;
        }
        config.skip_cosmic = self.no_cosmic;
        config.show_progress = !self.no_progress;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("fusion-sync")
        .build();

    // Environment variables take precedence over flags
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The sync still runs if logging cannot be installed
    let _guard = init_logging(&log_config).ok().flatten();

    if let Err(e) = run(&cli).await {
        error!(error = %e, "Sync failed");
        eprintln!("Error: {}", e);
        for failure in e.failures() {
            eprintln!("  - {}", failure);
        }
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> fusion_sync::Result<SyncReport> {
    let config = cli.sync_config()?;
    let fetcher = Arc::new(HttpFetcher::new(config.timeout(), config.show_progress)?);

    let report = SyncOrchestrator::new(config, cli.credentials(), fetcher)
        .run()
        .await?;

    for source in &report.sources {
        info!(
            source = %source.source,
            database = %source.database.display(),
            rows = source.total_rows(),
            "Database ready"
        );
    }
    println!(
        "Synchronized {} source(s); manifest at {}",
        report.sources.len(),
        report.manifest.display()
    );
    Ok(report)
}
