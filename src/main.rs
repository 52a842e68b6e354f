use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use healwatch::config::Config;
use healwatch::scheduler::Watch;
use healwatch::{pipeline, report};

#[derive(Parser)]
#[command(
    name = "healwatch",
    about = "Healing-metrics monitor: success-rate history, trends and degradation alerts",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (default: $HEALWATCH_CONFIG, then ./healwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect suite results, append them to the history and write the healing report
    Monitor,

    /// Long-run trend analysis
    Trends {
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the degradation rules
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Send the alerts through the configured channels
        #[arg(long)]
        dispatch: bool,
    },

    /// Analyse the history and dispatch alerts, honouring the cooldown
    Alert,

    /// Serve the dashboard JSON API
    Serve {
        /// Bind address (default: server.bind from the config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run monitor + alert cycles on a cron schedule
    Watch {
        /// Cron expression, 5 to 7 fields
        #[arg(long)]
        cron: String,

        /// Only print the upcoming fire times
        #[arg(long)]
        dry_run: bool,

        /// Hours covered by --dry-run
        #[arg(long, default_value = "24")]
        hours: u64,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the merged configuration
    Show,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Monitor => "monitor",
            Commands::Trends { .. } => "trends",
            Commands::Check { .. } => "check",
            Commands::Alert => "alert",
            Commands::Serve { .. } => "serve",
            Commands::Watch { .. } => "watch",
            Commands::Config { .. } => "config",
        }
    }
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(command: Commands, cfg: &Config, config_path: &std::path::Path) -> Result<i32> {
    let now = Utc::now();
    match command {
        Commands::Monitor => pipeline::monitor(cfg, now).await,
        Commands::Trends { json } => pipeline::trends(cfg, now, json),
        Commands::Check { json, dispatch } => pipeline::check(cfg, now, json, dispatch).await,
        Commands::Alert => pipeline::alert(cfg, now).await,
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            tracing::info!(%bind, "starting healwatch API");
            healwatch::serve(cfg, &bind).await?;
            Ok(0)
        }
        Commands::Watch {
            cron,
            dry_run,
            hours,
        } => {
            let watch = Watch::parse(&cron)?;
            if dry_run {
                println!("Next runs for '{}' in the next {hours}h:", watch.expr());
                for at in watch.preview(now, hours) {
                    println!("  {}", at.to_rfc3339());
                }
                return Ok(0);
            }
            watch.run(|at| pipeline::run_cycle(cfg, at)).await?;
            Ok(0)
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                Config::default().save(config_path)?;
                println!("Wrote {}", config_path.display());
                Ok(0)
            }
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(cfg)?);
                Ok(0)
            }
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config_path = Config::resolve_path(cli.config.as_deref());
    let cfg = match &cli.command {
        // `config init` must not create the file it is about to write.
        Commands::Config {
            action: ConfigAction::Init { .. },
        } => Config::default(),
        _ => Config::load_or_init(&config_path),
    };

    let name = cli.command.name();
    match run(cli.command, &cfg, &config_path).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            tracing::error!(command = name, error = %format!("{e:#}"), "command failed");
            match report::write_error_log(&cfg.paths.reports_dir, name, &e, Utc::now()) {
                Ok(path) => tracing::info!(path = %path.display(), "error log written"),
                Err(log_err) => tracing::warn!(error = %log_err, "could not write error log"),
            }
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
