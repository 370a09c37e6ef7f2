use std::sync::Arc;

use anyhow::Context;

use mail_ticket_bridge::config::BridgeConfig;
use mail_ticket_bridge::error;
use mail_ticket_bridge::mailbox::{ImapMailbox, Mailbox};
use mail_ticket_bridge::scheduler;
use mail_ticket_bridge::sync::SyncOrchestrator;
use mail_ticket_bridge::tracker::{JiraTracker, Tracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BridgeConfig::from_env().context("loading configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        jira = %config.tracker.base_url,
        imap = %config.mailbox.host,
        folder = %config.mailbox.folder,
        processed_keyword = %config.mailbox.processed_keyword,
        done_folder = ?config.mailbox.done_folder,
        "Mail ticket bridge starting"
    );

    let orchestrator = build_orchestrator(&config).context("building collaborators")?;

    if config.schedule.run_once {
        let summary = orchestrator
            .run_once()
            .await
            .context("sync cycle aborted")?;
        tracing::info!(?summary, "Single run finished");
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    scheduler::run_forever(&orchestrator, &config.schedule.cron, shutdown).await;

    Ok(())
}

/// Wire the Jira tracker and IMAP mailbox into the sync engine.
fn build_orchestrator(config: &BridgeConfig) -> error::Result<SyncOrchestrator> {
    let tracker: Arc<dyn Tracker> = Arc::new(JiraTracker::from_config(&config.tracker)?);
    let mailbox: Arc<dyn Mailbox> = Arc::new(ImapMailbox::new(&config.mailbox));
    Ok(SyncOrchestrator::new(mailbox, tracker))
}
