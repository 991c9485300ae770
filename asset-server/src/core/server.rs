//! Server Implementation
//!
//! Wires the pipeline onto one message bus and one ledger database:
//!
//! | Task | Kind | Subscription |
//! |------|------|--------------|
//! | `command_router` | Worker | command topic / command group |
//! | `event_router` | Worker | event topic / event group |
//! | `retry_router` | Worker | retry topic / event group |
//! | `schedule_worker` | Periodic | (schedule mode only) |
//! | `attempt_pruner` | Periodic | |
//! | `ingress` | Listener | (when `INGRESS_ADDR` is set) |

use std::sync::Arc;
use std::time::Duration;

use crate::commands::{
    AssetService, CommandProducer, CommandRouter, DeferMode, ScheduleWorker, TransferScheduler,
};
use crate::core::{BackgroundTasks, Config, TaskKind};
use crate::events::{AttemptPruner, Escalator, EventJournal, EventRouter};
use crate::message::{IngressServer, MessageBus, MessageHandler, Publisher};
use crate::storage::LedgerStorage;
use crate::utils::AppResult;

const HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
const ATTEMPT_PRUNE_INTERVAL_SECS: u64 = 3600;

pub struct AssetServer {
    config: Config,
    bus: MessageBus,
    storage: LedgerStorage,
    producer: CommandProducer,
    tasks: BackgroundTasks,
}

impl AssetServer {
    /// Build every component and spawn the background tasks
    pub async fn start(config: Config, storage: LedgerStorage) -> AppResult<Self> {
        let bus = MessageBus::with_capacity(config.channel_capacity);
        let publisher: Arc<dyn Publisher> = Arc::new(bus.clone());
        let ledger = Arc::new(storage.clone());

        let journal = EventJournal::new(publisher.clone(), config.event_topic.clone())
            .with_encoding(config.event_encoding);
        let assets = AssetService::new(journal);
        let producer = CommandProducer::new(publisher.clone(), config.command_topic.clone())
            .with_encoding(config.command_encoding);

        let scheduler = TransferScheduler::new(assets.clone(), producer.clone(), ledger.clone())
            .with_horizon(config.transfer_horizon_secs)
            .with_mode(config.transfer_defer_mode);
        let command_router = Arc::new(CommandRouter::new(assets, Arc::new(scheduler)));

        let escalator = Escalator::new(
            publisher.clone(),
            ledger.clone(),
            config.retry_topic.clone(),
            config.dlq_topic.clone(),
        )
        .with_max_attempts(config.max_retry_attempts);
        let event_router = Arc::new(EventRouter::new(ledger.clone(), ledger.clone(), escalator));

        // One token for the bus and every task
        let mut tasks = BackgroundTasks::with_token(bus.shutdown_token().clone());
        let token = tasks.shutdown_token();

        tasks.spawn(
            "command_router",
            TaskKind::Worker,
            MessageHandler::new(
                bus.subscribe(&config.command_topic, &config.command_group_id),
                command_router,
                token.clone(),
            )
            .run(),
        );
        tasks.spawn(
            "event_router",
            TaskKind::Worker,
            MessageHandler::new(
                bus.subscribe(&config.event_topic, &config.event_group_id),
                event_router.clone(),
                token.clone(),
            )
            .run(),
        );
        tasks.spawn(
            "retry_router",
            TaskKind::Worker,
            MessageHandler::new(
                bus.subscribe(&config.retry_topic, &config.event_group_id),
                event_router,
                token.clone(),
            )
            .run(),
        );

        let pruner = AttemptPruner::new(
            ledger.clone(),
            Duration::from_secs(config.attempt_retention_secs),
            Duration::from_secs(ATTEMPT_PRUNE_INTERVAL_SECS),
        );
        tasks.spawn("attempt_pruner", TaskKind::Periodic, pruner.run(token.clone()));

        if config.transfer_defer_mode == DeferMode::Schedule {
            let worker = ScheduleWorker::new(
                ledger,
                producer.clone(),
                Duration::from_secs(config.schedule_scan_interval_secs),
            );
            tasks.spawn("schedule_worker", TaskKind::Periodic, worker.run(token.clone()));
        }

        if let Some(addr) = &config.ingress_addr {
            let listener = IngressServer::bind(addr).await?;
            let ingress = IngressServer::new(
                publisher,
                vec![config.command_topic.clone()],
                token.clone(),
            );
            tasks.spawn("ingress", TaskKind::Listener, ingress.serve(listener));
        }

        tasks.log_summary();

        Ok(Self {
            config,
            bus,
            storage,
            producer,
            tasks,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn storage(&self) -> &LedgerStorage {
        &self.storage
    }

    /// Producer bound to the command topic
    pub fn producer(&self) -> &CommandProducer {
        &self.producer
    }

    /// Run until ctrl-c, then shut down gracefully
    pub async fn run(self) -> AppResult<()> {
        let mut health = tokio::time::interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));
        health.tick().await;

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Shutting down...");
                    break;
                }
                _ = health.tick() => {
                    self.tasks.check_health();
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close the bus and wait for every task to stop
    pub async fn shutdown(self) {
        self.bus.shutdown();
        self.tasks.shutdown().await;

        match self.storage.get_stats() {
            Ok(stats) => tracing::info!(?stats, "Ledger state at shutdown"),
            Err(e) => tracing::warn!(error = %e, "Failed to read ledger stats"),
        }
    }
}
