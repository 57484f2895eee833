mod jobs;
mod leads;
mod webhooks;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use leadgen_core::{JobType, Platform};
use leadgen_pipeline::{ExportFormat, PgStore, Store};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "leadgen-cli")]
#[command(about = "Lead generation pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run scrape jobs
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
    /// Export stored leads
    Leads {
        #[command(subcommand)]
        command: LeadsCommands,
    },
    /// Outbound webhook maintenance
    Webhooks {
        #[command(subcommand)]
        command: WebhooksCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[derive(Debug, Subcommand)]
enum CampaignCommands {
    /// Trigger a job for one campaign and run it to completion
    Run {
        #[arg(long)]
        campaign: Uuid,
        /// Restrict the job to these platforms (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
        #[arg(long, default_value = "manual")]
        job_type: JobType,
        /// Print the targets that would be scraped and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Trigger and run every recurring campaign that is due now
    Due,
}

#[derive(Debug, Subcommand)]
enum LeadsCommands {
    Export {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum WebhooksCommands {
    /// Re-send failed deliveries whose retry time has passed
    Retry {
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("leadgen-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = leadgen_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = leadgen_db::PoolConfig::from_app_config(&config);
    let pool = leadgen_db::connect_pool(&config.database_url, pool_config).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                leadgen_db::health_check(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = leadgen_db::run_migrations(&pool).await?;
                println!("migrations up to date ({applied} applied)");
            }
        },
        Commands::Campaign { command } => match command {
            CampaignCommands::Run {
                campaign,
                platforms,
                job_type,
                dry_run,
            } => {
                if dry_run {
                    jobs::print_plan(&*store, campaign, &platforms).await?;
                } else {
                    let runner = jobs::runner(store, &config)?;
                    jobs::run_campaign(&runner, campaign, job_type, &platforms).await?;
                }
            }
            CampaignCommands::Due => {
                let runner = jobs::runner(store, &config)?;
                jobs::run_due(&runner).await?;
            }
        },
        Commands::Leads { command } => match command {
            LeadsCommands::Export {
                campaign,
                format,
                output,
            } => {
                leads::export(&*store, campaign, format, output.as_deref()).await?;
            }
        },
        Commands::Webhooks { command } => match command {
            WebhooksCommands::Retry { limit } => {
                webhooks::retry(store, &config, limit).await?;
            }
        },
    }

    Ok(())
}
