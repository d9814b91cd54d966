use std::{sync::Arc, time::Duration};

use engine::{BudgetResetScheduler, CacheStore, MemoryCache};
use migration::{Migrator, MigratorTrait};
use queue::{ConsumerConfig, ConsumerGroup, DbQueue, ReportProducer};
use report_service::{ReportConsumer, ReportResultSender};
use server::ResultDispatcher;
use settings::{CacheBackend, Database};
use teloxide::types::UserId;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

mod settings;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "budget={level},engine={level},queue={level},report_service={level},server={level},telegram_bot={level}",
            level = settings.app.level
        ))
        .init();

    if settings.telegram.is_none() && settings.report_service.is_none() {
        tracing::warn!("neither [telegram] nor [report_service] is configured, nothing to run");
        return Ok(());
    }

    let db = parse_database(&settings.database).await?;
    let cache = parse_cache(&settings.cache.backend).await?;
    let engine = engine::Engine::builder()
        .database(db.clone())
        .cache(cache)
        .cache_ttl(Duration::from_secs(settings.cache.ttl_secs))
        .build()
        .await?;
    let queue = DbQueue::new(db, settings.queue.topic.clone(), settings.queue.partitions);

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    if let Some(metrics) = settings.metrics {
        let handle = telegram_bot::observability::install_recorder()?;
        let listener = tokio::net::TcpListener::bind(metrics.listen).await?;
        let metrics_shutdown = shutdown.clone();
        tasks.spawn(async move {
            if let Err(err) = server::run_metrics(listener, handle, metrics_shutdown).await {
                tracing::error!("metrics server failed: {err}");
            }
        });
    }

    if let Some(telegram) = settings.telegram {
        tracing::info!("Found telegram settings...");
        // Checked by `Settings::new`.
        let rpc = settings.rpc.ok_or("[rpc] settings missing")?;

        let scheduler = BudgetResetScheduler::start(engine.clone(), &shutdown).await?;
        tasks.spawn(scheduler.join());

        let (results_tx, results_rx) = mpsc::channel(rpc.channel_capacity);
        let listener = tokio::net::TcpListener::bind(rpc.listen).await?;
        let server_shutdown = shutdown.clone();
        tasks.spawn(async move {
            if let Err(err) = server::run_with_listener(listener, results_tx, server_shutdown).await
            {
                tracing::error!("RPC server failed: {err}");
            }
        });

        let notifier = telegram_bot::TelegramNotifier::new(&telegram.token);
        tasks.spawn(ResultDispatcher::new(notifier).run(results_rx));

        let bot = telegram_bot::Bot::builder()
            .token(&telegram.token)
            .allowed_users(telegram.allowed_users.into_iter().map(UserId).collect())
            .engine(engine.clone())
            .producer(ReportProducer::new(queue.clone()))
            .build()?;
        let bot_shutdown = shutdown.clone();
        tasks.spawn(async move { bot.run(bot_shutdown).await });
    }

    if let Some(report) = settings.report_service {
        tracing::info!("Found report service settings...");
        let config = ConsumerConfig {
            group: report.group,
            poll_interval: Duration::from_millis(report.poll_interval_ms),
            lease: Duration::from_secs(report.lease_secs),
            batch_size: report.batch_size,
        };
        let sender = ReportResultSender::new(reqwest::Client::new(), report.rpc_url);
        let group = ConsumerGroup::spawn(
            queue.clone(),
            config,
            Arc::new(ReportConsumer::new(engine.clone(), sender)),
            shutdown.clone(),
        );
        tasks.spawn(group.join());
    }

    tokio::select! {
        () = shutdown_signal() => tracing::info!("shutdown requested"),
        Some(result) = tasks.join_next() => {
            if let Err(err) = result {
                tracing::error!("task panicked: {err}");
            }
            tracing::warn!("a task exited early, shutting down");
        }
    }
    shutdown.cancel();

    let grace = settings.app.shutdown_grace();
    let drained = tokio::time::timeout(grace, async {
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                tracing::error!("task panicked: {err}");
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!("shutdown grace of {grace:?} elapsed, aborting remaining tasks");
        tasks.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn parse_database(config: &Database) -> Result<sea_orm::DatabaseConnection, BoxError> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

async fn parse_cache(backend: &CacheBackend) -> Result<Arc<dyn CacheStore>, BoxError> {
    match backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "redis")]
        CacheBackend::Redis { url } => {
            let cache = engine::RedisCache::new(url)?;
            cache.ping().await?;
            tracing::info!("report cache on redis");
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis { .. } => {
            Err("the redis cache backend needs the `redis` feature".into())
        }
    }
}
