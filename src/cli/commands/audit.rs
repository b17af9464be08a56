use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;

use crate::audit::{AuditLogger, AUDIT_POOL};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{PgConnector, PoolRegistry};

#[derive(Subcommand)]
pub enum AuditCommands {
    #[command(about = "Delete audit entries older than the retention window")]
    Prune {
        #[arg(long, help = "Override AUDIT_RETENTION_DAYS")]
        days: Option<i64>,
    },
}

pub async fn handle(cmd: AuditCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Prune { days } => prune(days, output_format).await,
    }
}

async fn prune(days: Option<i64>, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(days) = days {
        anyhow::ensure!(days > 0, "--days must be positive");
        config.audit.retention_days = days;
    }
    let Some(url) = config.pool_url(AUDIT_POOL).map(String::from) else {
        anyhow::bail!("{}_DB_URL is not set", AUDIT_POOL);
    };

    let registry = Arc::new(PoolRegistry::new(Arc::new(PgConnector::from_config(&config.database))));
    let audit = AuditLogger::new(registry.clone(), Some(url), &config.audit);
    let result = audit.prune().await;
    registry.close_all().await;

    let removed = result?;
    output_success(
        output_format,
        &format!("Removed {} audit entries older than {} days", removed, config.audit.retention_days),
        Some(json!({ "removed": removed, "retention_days": config.audit.retention_days })),
    )
}
