mod cli_args;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dqsync_catalog::{build_adapter, CatalogAdapter, CatalogKind};
use dqsync_monitor::AnomaloClient;
use dqsync_sync::{run_catalog_sync, SyncRunReport};
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::Cli;

const EXIT_FAILURE: u8 = 1;
const EXIT_MISSING_CATALOG: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_path = dotenv::dotenv().ok();
    init_tracing();
    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "loaded environment from .env");
    }
    let cli = Cli::parse();

    if cli.list_catalogs {
        println!("{}", available_catalogs_line());
        return ExitCode::SUCCESS;
    }

    if cli.list_organizations {
        return match list_organizations(&cli).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(EXIT_FAILURE)
            }
        };
    }

    let Some(catalog) = cli.catalog else {
        eprintln!(
            "--catalog <catalog_name> argument required; use --catalogs to list available options"
        );
        return ExitCode::from(EXIT_MISSING_CATALOG);
    };

    match run_sync(&cli, catalog.into()).await {
        Ok(report) => {
            println!("{}", report.summary_line());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn available_catalogs_line() -> String {
    let names = CatalogKind::all()
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>();
    format!("Available catalogs: {}", names.join(", "))
}

async fn list_organizations(cli: &Cli) -> Result<()> {
    let client = AnomaloClient::connect(cli.anomalo_config()).await?;
    let organizations = client.list_organizations().await?;
    println!("Available organizations:");
    for organization in organizations {
        let active = if organization.id == client.organization_id() {
            " (active)"
        } else {
            ""
        };
        println!("  {}: {}{}", organization.id, organization.name, active);
    }
    Ok(())
}

async fn run_sync(cli: &Cli, kind: CatalogKind) -> Result<SyncRunReport> {
    let mut adapter = build_adapter(kind, &cli.catalog_settings(), cli.sync_options())?;
    adapter
        .configure()
        .await
        .with_context(|| format!("failed to configure {kind} catalog"))?;
    let client = AnomaloClient::connect(cli.anomalo_config()).await?;
    tracing::info!(
        catalog = %kind,
        organization_id = client.organization_id(),
        origin = client.origin(),
        "starting catalog sync"
    );

    let config = cli.run_config();
    let report = run_until_interrupted(&client, adapter.as_ref(), &config).await?;

    if let Some(path) = cli.report_path.as_deref() {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "wrote sync run report");
    }
    Ok(report)
}

async fn run_until_interrupted(
    client: &AnomaloClient,
    adapter: &dyn CatalogAdapter,
    config: &dqsync_sync::SyncRunConfig,
) -> Result<SyncRunReport> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let run = run_catalog_sync(client, adapter, config, cancel_rx);
    tokio::pin!(run);

    let mut interrupted = false;
    loop {
        tokio::select! {
            report = &mut run => return report,
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("failed to listen for ctrl-c")?;
                interrupted = true;
                tracing::warn!("interrupt received; finishing in-flight tables before exiting");
                let _ = cancel_tx.send(true);
            }
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
