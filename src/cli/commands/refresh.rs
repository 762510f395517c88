use clap::Args;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{DatabaseManager, PgConnector, PgMetricsStore, SecretUrlResolver};
use crate::services::{RefreshCache, RefreshReport, RefreshResult, RefreshService};

#[derive(Args, Debug)]
pub struct RefreshArgs {
    #[arg(long, help = "Tenant ID")]
    pub tenant: Uuid,

    #[arg(long, help = "Ignore the refresh cache")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RefreshAllArgs {
    #[arg(long, help = "Tenants refreshed concurrently per batch (default: REFRESH_BATCH_SIZE)")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Ignore the refresh cache")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[arg(long, help = "Tenant ID")]
    pub tenant: Uuid,
}

/// Service wired to the system database and real tenant connections
async fn build_service() -> anyhow::Result<RefreshService> {
    DatabaseManager::health_check().await?;
    let store = Arc::new(PgMetricsStore::from_main_pool().await?);
    Ok(RefreshService::new(
        store.clone(),
        Arc::new(SecretUrlResolver::new(store)),
        Arc::new(PgConnector::from_config()),
        Arc::new(RefreshCache::from_config()),
    ))
}

fn print_result(result: &RefreshResult) {
    if result.success {
        println!(
            "✓ {}  total={}  paid={}{}",
            result.tenant_id,
            display_metric(result.total_users),
            display_metric(result.paid_users),
            if result.cached { "  (cached)" } else { "" }
        );
    } else {
        println!(
            "✗ {}  {}",
            result.tenant_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

pub async fn handle_refresh(args: RefreshArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = build_service().await?;
    let result = service.refresh_one(args.tenant, args.force).await;

    match output_format {
        OutputFormat::Json => output_json(&result)?,
        OutputFormat::Text => print_result(&result),
    }

    if !result.success {
        anyhow::bail!("refresh failed for tenant {}", args.tenant);
    }
    Ok(())
}

pub async fn handle_refresh_all(args: RefreshAllArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = build_service().await?;
    let batch_size = args.batch_size.unwrap_or(config().refresh.batch_size);
    let results = service.refresh_all(batch_size, args.force).await?;
    let report = RefreshReport::from_results(&results);

    match output_format {
        OutputFormat::Json => output_json(&json!({ "report": report, "results": results }))?,
        OutputFormat::Text => {
            for result in &results {
                print_result(result);
            }
            output_success(&format!(
                "{} tenants: {} succeeded, {} failed, {} cached",
                report.total, report.succeeded, report.failed, report.cached
            ));
        }
    }
    Ok(())
}

pub async fn handle_snapshot(args: SnapshotArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = build_service().await?;
    let result = service.snapshot_one(args.tenant).await;

    match (&output_format, &result.snapshot) {
        (OutputFormat::Json, _) => output_json(&result)?,
        (OutputFormat::Text, Some(snapshot)) => {
            println!("Snapshot for {} at {}", args.tenant, snapshot.date.format("%Y-%m-%d %H:%M:%S"));
            println!("  Total users:    {}", display_metric(snapshot.total_users));
            println!("  Paid users:     {}", display_metric(snapshot.paid_users));
            println!("  Active (7d):    {}", display_metric(snapshot.active_users));
            println!("  New (30d):      {}", snapshot.new_signups);
            println!("  Churned (30d):  {}", display_metric(snapshot.churned_users));
        }
        (OutputFormat::Text, None) => {
            output_error(result.error.as_deref().unwrap_or("snapshot failed"));
        }
    }

    if !result.success {
        anyhow::bail!("snapshot failed for tenant {}", args.tenant);
    }
    Ok(())
}
