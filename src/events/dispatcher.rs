use anyhow::Result;
use futures::future::BoxFuture;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::config::AppConfig;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

pub type EventHandlerFn =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Topic-multiplexed broker consumer.
///
/// Polls the broker on its own OS thread and hands each decoded message body
/// to the handler registered for its topic, scheduled onto the application's
/// tokio runtime. The poll thread blocks on each handler with a bounded wait,
/// so handlers run one at a time; a slow handler delays subsequent polls and
/// acts as backpressure on the consumer group.
pub struct EventDispatcher {
    bootstrap_servers: String,
    group_id: String,
    handlers: HashMap<String, EventHandlerFn>,
    worker: Option<Worker>,
}

struct Worker {
    thread: std::thread::JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl EventDispatcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            bootstrap_servers: config.kafka_bootstrap_servers.clone(),
            group_id: config.kafka_group_id.clone(),
            handlers: HashMap::new(),
            worker: None,
        }
    }

    /// Associate the handler for a topic. Must be called before `start`.
    /// Registering a topic twice replaces the earlier handler.
    pub fn register_handler(&mut self, topic: &str, handler: EventHandlerFn) {
        if self.handlers.insert(topic.to_string(), handler).is_some() {
            warn!(topic, "replacing previously registered event handler");
        } else {
            info!(topic, "registered event handler");
        }
    }

    /// Begin consuming on a dedicated background thread. No-op when already
    /// running or when no handlers are registered.
    pub fn start(&mut self, runtime: Handle) -> Result<()> {
        if self.worker.is_some() || self.handlers.is_empty() {
            return Ok(());
        }

        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;

        let topics: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        consumer.subscribe(&topics)?;
        info!(topics = ?topics, group_id = %self.group_id, "event dispatcher started");

        let shutdown = Arc::new(AtomicBool::new(false));
        let handlers = self.handlers.clone();
        let flag = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name("event-dispatcher".to_string())
            .spawn(move || poll_loop(consumer, handlers, runtime, flag))?;

        self.worker = Some(Worker { thread, shutdown });
        Ok(())
    }

    /// Signal the poll thread to exit and wait for it. The wait is bounded by
    /// the poll timeout plus the handler wait. Safe to call when `start` was
    /// never called or did not succeed.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.shutdown.store(true, Ordering::Relaxed);
        if worker.thread.join().is_err() {
            error!("event dispatcher thread panicked");
        }
        info!("event dispatcher stopped");
    }
}

fn poll_loop(
    consumer: BaseConsumer,
    handlers: HashMap<String, EventHandlerFn>,
    runtime: Handle,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let message = match consumer.poll(POLL_TIMEOUT) {
            None => continue,
            Some(Err(KafkaError::PartitionEOF(_))) => continue,
            Some(Err(err)) => {
                error!(error = %err, "consumer poll error");
                continue;
            }
            Some(Ok(message)) => message,
        };

        let topic = message.topic().to_string();
        let Some(handler) = handlers.get(&topic) else {
            continue;
        };

        let Some(payload) = message.payload() else {
            warn!(topic = %topic, "message without payload, dropping");
            continue;
        };
        let body: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(body) => body,
            Err(err) => {
                warn!(topic = %topic, error = %err, "undecodable message body, dropping");
                continue;
            }
        };

        // Hand the handler future to the runtime and block this thread on its
        // completion. This is the pipeline's single serialization point; the
        // bounded wait keeps a wedged handler from stalling the consumer
        // forever. On timeout the task keeps running uncancelled.
        let future = handler(body);
        let (done_tx, done_rx) = mpsc::channel();
        runtime.spawn(async move {
            future.await;
            let _ = done_tx.send(());
        });

        match done_rx.recv_timeout(HANDLER_TIMEOUT) {
            Ok(()) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(topic = %topic, timeout = ?HANDLER_TIMEOUT, "handler still running, resuming poll loop");
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                error!(topic = %topic, "handler task dropped before completion");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn test_config() -> AppConfig {
        std::env::set_var("DATABASE_URL", "postgres://unused/unused");
        std::env::set_var(
            "PASETO_ACCESS_KEY",
            "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=",
        );
        std::env::set_var(
            "PASETO_REFRESH_KEY",
            "ZmVkY2JhOTg3NjU0MzIxMGZlZGNiYTk4NzY1NDMyMTA=",
        );
        AppConfig::from_env().expect("test config")
    }

    #[tokio::test]
    async fn start_without_handlers_is_a_noop() {
        let mut dispatcher = EventDispatcher::new(&test_config());
        dispatcher
            .start(Handle::current())
            .expect("start should succeed");
        assert!(dispatcher.worker.is_none());
    }

    #[tokio::test]
    async fn stop_without_start_is_safe() {
        let mut dispatcher = EventDispatcher::new(&test_config());
        dispatcher.stop();
        dispatcher.stop();
    }

    #[tokio::test]
    async fn duplicate_registration_replaces() {
        let mut dispatcher = EventDispatcher::new(&test_config());
        let noop: EventHandlerFn = Arc::new(|_| async {}.boxed());
        dispatcher.register_handler(crate::events::topics::USER_EVENTS, noop.clone());
        dispatcher.register_handler(crate::events::topics::USER_EVENTS, noop);
        assert_eq!(dispatcher.handlers.len(), 1);
    }
}
