//! Herald daemon entry point: timers, the chat event pump, and shutdown.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use herald_chat::{ChatTransport, TelegramTransport};
use herald_core::{current_unix_timestamp_ms, IdentityDirectory};
use herald_runtime::{
    notify_due_tasks, parse_timezone, sweep_retention, sync_all_sources, watch_support_comments,
    ActionCoordinator, AdapterMap, CycleGate, NoticeRunner, PolicyConfig,
};
use herald_store::TaskStore;
use herald_tracker::JiraSourceAdapter;

use crate::config::HeraldConfig;

#[derive(Debug, Parser)]
#[command(name = "herald", about = "Mirrors tracker issues into a chat channel")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "herald.toml")]
    config: PathBuf,
    /// Run one sync / notify / watch / sweep pass and exit.
    #[arg(long)]
    once: bool,
    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = HeraldConfig::load(&cli.config)?;
    run(config, cli.once).await
}

async fn run(config: HeraldConfig, once: bool) -> Result<()> {
    let timezone = parse_timezone(&config.reference_timezone)?;
    let store = Arc::new(TaskStore::open(&config.store_path)?);
    let identities = Arc::new(IdentityDirectory::new(config.identities.clone()));
    if identities.is_empty() {
        warn!("no identities configured; interactive actions will be refused");
    }

    let mut adapters: AdapterMap = AdapterMap::new();
    for source in &config.sources {
        let adapter = JiraSourceAdapter::new(source.clone(), identities.clone())
            .with_context(|| format!("failed to build adapter for source '{}'", source.id))?;
        adapters.insert(source.id.clone(), Arc::new(adapter));
    }

    let transport = Arc::new(TelegramTransport::new(
        config.telegram.api_base.clone(),
        config.telegram.token.clone(),
        config.telegram.channel_id.clone(),
        config.telegram.request_timeout_ms,
        config.telegram.poll_timeout_s,
    )?);

    let policy = PolicyConfig {
        support_department: config.policy.support_department.clone(),
        infra_issue_types: config.policy.infra_issue_types.clone(),
        reference_timezone: timezone,
    };

    if once {
        run_sync_cycle(&store, &adapters, transport.as_ref(), &policy).await;
        run_watch_cycle(&store, &adapters, transport.as_ref(), &policy).await;
        if let Err(error) =
            sweep_retention(&store, config.retention_days, current_unix_timestamp_ms())
        {
            warn!(%error, "retention sweep failed");
        }
        return Ok(());
    }

    let coordinator = Arc::new(ActionCoordinator::new(
        store.clone(),
        adapters.clone(),
        identities,
        transport.clone(),
    ));
    let mut notices = NoticeRunner::new(&config.notices, timezone, current_unix_timestamp_ms())?;

    let pump = tokio::spawn(poll_loop(transport.clone(), coordinator));

    let sync_gate = CycleGate::new();
    let watch_gate = CycleGate::new();
    let mut sync_interval =
        tokio::time::interval(Duration::from_secs(config.intervals.sync_secs.max(1)));
    let mut watch_interval =
        tokio::time::interval(Duration::from_secs(config.intervals.comment_watch_secs.max(1)));
    let mut sweep_interval =
        tokio::time::interval(Duration::from_secs(config.intervals.retention_sweep_secs.max(1)));
    let mut notice_interval =
        tokio::time::interval(Duration::from_secs(config.intervals.notice_tick_secs.max(1)));

    info!(
        sources = config.sources.len(),
        store = %config.store_path.display(),
        "herald started"
    );

    loop {
        tokio::select! {
            _ = sync_interval.tick() => {
                let Some(guard) = sync_gate.try_enter() else {
                    warn!("previous sync cycle still running; skipping tick");
                    continue;
                };
                let store = store.clone();
                let adapters = adapters.clone();
                let transport = transport.clone();
                let policy = policy.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    run_sync_cycle(&store, &adapters, transport.as_ref(), &policy).await;
                });
            }
            _ = watch_interval.tick() => {
                let Some(guard) = watch_gate.try_enter() else {
                    warn!("previous comment-watch cycle still running; skipping tick");
                    continue;
                };
                let store = store.clone();
                let adapters = adapters.clone();
                let transport = transport.clone();
                let policy = policy.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    run_watch_cycle(&store, &adapters, transport.as_ref(), &policy).await;
                });
            }
            _ = sweep_interval.tick() => {
                if let Err(error) =
                    sweep_retention(&store, config.retention_days, current_unix_timestamp_ms())
                {
                    warn!(%error, "retention sweep failed");
                }
            }
            _ = notice_interval.tick() => {
                notices
                    .fire_due(transport.as_ref(), current_unix_timestamp_ms())
                    .await;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "ctrl-c handler failed; shutting down anyway");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    pump.abort();
    Ok(())
}

/// One fetch + reconcile + notify pass over every source.
async fn run_sync_cycle(
    store: &TaskStore,
    adapters: &AdapterMap,
    transport: &dyn ChatTransport,
    policy: &PolicyConfig,
) {
    let now = current_unix_timestamp_ms();
    let sync = sync_all_sources(store, adapters, now).await;
    match notify_due_tasks(store, adapters, transport, policy, now).await {
        Ok(report) => info!(
            synced = sync.sources_synced,
            fetch_failures = sync.sources_failed,
            upserted = sync.upserted,
            archived = sync.archived,
            sent = report.sent,
            send_failures = report.failed,
            "sync cycle complete"
        ),
        Err(error) => warn!(%error, "notification pass failed"),
    }
}

async fn run_watch_cycle(
    store: &TaskStore,
    adapters: &AdapterMap,
    transport: &dyn ChatTransport,
    policy: &PolicyConfig,
) {
    match watch_support_comments(store, adapters, transport, &policy.support_department, current_unix_timestamp_ms())
        .await
    {
        Ok(report) if report.comments_forwarded > 0 => info!(
            tasks = report.tasks_checked,
            forwarded = report.comments_forwarded,
            "comment watch forwarded new replies"
        ),
        Ok(_) => {}
        Err(error) => warn!(%error, "comment watch failed"),
    }
}

/// Long-poll pump translating chat updates into coordinator calls. Poll
/// failures back off and retry; the pump never exits on its own.
async fn poll_loop(transport: Arc<TelegramTransport>, coordinator: Arc<ActionCoordinator>) {
    let mut offset = 0_i64;
    loop {
        match transport.poll_events(offset).await {
            Ok((events, next_offset)) => {
                offset = next_offset;
                let now = current_unix_timestamp_ms();
                for event in events {
                    coordinator.handle_event(event, now).await;
                }
                coordinator.expire_stale_dialogs(now).await;
            }
            Err(error) => {
                warn!(%error, "update poll failed; backing off");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

fn init_tracing(default_level: &str) {
    let default = default_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
