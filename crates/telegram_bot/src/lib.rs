//! Telegram bot.
//!
//! The bot is the chat side of the budget tracker: spends and settings go
//! straight to the engine, report requests are enqueued and answered later
//! through [`TelegramNotifier`].

use std::time::Duration;

use engine::Engine;
use queue::ReportProducer;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;

mod handlers;
mod notifier;
pub mod observability;
mod parsing;

pub use notifier::TelegramNotifier;

#[derive(Clone)]
pub struct ConfigParameters {
    allowed_users: Option<Vec<UserId>>,
    engine: Engine,
    producer: ReportProducer,
}

pub struct Bot {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    engine: Engine,
    producer: ReportProducer,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    /// Long-polls updates until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);
        let parameters = ConfigParameters {
            allowed_users: self.allowed_users.clone(),
            engine: self.engine.clone(),
            producer: self.producer.clone(),
        };

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handlers::handle_message));

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::warn!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .build();

        let token = dispatcher.shutdown_token();
        let stopper = tokio::spawn(async move {
            shutdown.cancelled().await;
            // The dispatcher refuses to stop before it has started polling.
            loop {
                match token.shutdown() {
                    Ok(done) => {
                        done.await;
                        break;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        dispatcher.dispatch().await;
        stopper.abort();
        tracing::info!("telegram bot stopped");
    }
}

#[derive(Default)]
pub struct BotBuilder {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    engine: Option<Engine>,
    producer: Option<ReportProducer>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn allowed_users(mut self, allowed_users: Vec<UserId>) -> BotBuilder {
        if !allowed_users.is_empty() {
            self.allowed_users = Some(allowed_users);
        }
        self
    }

    pub fn engine(mut self, engine: Engine) -> BotBuilder {
        self.engine = Some(engine);
        self
    }

    pub fn producer(mut self, producer: ReportProducer) -> BotBuilder {
        self.producer = Some(producer);
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.is_empty() {
            return Err("telegram token is missing".to_string());
        }
        let engine = self.engine.ok_or("engine is missing")?;
        let producer = self.producer.ok_or("report producer is missing")?;
        Ok(Bot {
            token: self.token,
            allowed_users: self.allowed_users,
            engine,
            producer,
        })
    }
}
