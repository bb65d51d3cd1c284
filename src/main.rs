use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lifekit::config::{EnvSettings, LifekitConfig};
use lifekit::envcheck::EnvReport;
use lifekit::ratelimit::GuardedOperation;
use lifekit::service::LifekitService;

#[derive(Parser, Debug)]
#[command(name = "lifekit")]
#[command(about = "Operational tooling for the Lifekit backend", version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the required environment variables are set
    CheckEnv,
    /// Print the effective rate limit policies
    Policies,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::CheckEnv => {
            if let Ok(path) = dotenvy::dotenv() {
                info!(path = %path.display(), "Loaded .env file");
            }
            let report = EnvReport::check(&EnvSettings::from_env()?);
            report.log();
            std::process::exit(report.exit_code());
        }
        Command::Policies => {
            let config = LifekitConfig::load(cli.config.as_deref())?;
            let service = LifekitService::from_config(&config)?;
            let policies = service.policies();

            info!(scope = ?policies.scope, "Admission scope");
            for op in GuardedOperation::ALL {
                info!(operation = %op, policy = %policies.policy(op), "Rate limit policy");
            }
        }
    }

    Ok(())
}
