use clap::{Parser, Subcommand};
use fitmarket_api::{config, db, migrator::Migrator};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the fitmarket schema")]
struct Cli {
    /// Overrides APP__DATABASE_URL / config files
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Roll back the last N migrations
    Down {
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing("info", false);

    let cli = Cli::parse();
    let database_url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("APP__DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "sqlite://fitmarket.db?mode=rwc".to_string()),
    };

    info!("Starting database migration");
    let pool = db::establish_connection(&database_url).await?;

    let result = match cli.command.unwrap_or(Command::Up) {
        Command::Up => Migrator::up(&pool, None).await,
        Command::Down { steps } => Migrator::down(&pool, Some(steps)).await,
        Command::Status => Migrator::status(&pool).await,
    };

    if let Err(e) = result {
        error!("Migration failed: {}", e);
        return Err(e.into());
    }

    info!("Migration completed successfully");
    Ok(())
}
