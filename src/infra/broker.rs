use anyhow::{anyhow, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Producing side of the event pipeline. Delivery failure is returned to the
/// caller; producing code paths log it and carry on, the broker is a
/// side-channel and never the request's source of truth.
#[derive(Clone)]
pub struct EventProducer {
    producer: Option<FutureProducer>,
}

impl EventProducer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_bootstrap_servers)
            .set("client.id", "aerovia-api")
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self {
            producer: Some(producer),
        })
    }

    /// Producer without a broker connection: every publish is skipped with a
    /// warning. Used where no broker is available (tests, local tooling).
    pub fn disabled() -> Self {
        Self { producer: None }
    }

    pub async fn publish<T: Serialize>(&self, topic: &str, event: &T) -> Result<()> {
        let Some(producer) = &self.producer else {
            warn!(topic, "event producer disabled, message skipped");
            return Ok(());
        };

        let payload = serde_json::to_vec(event)?;
        let record = FutureRecord::<(), _>::to(topic).payload(&payload);

        match producer.send(record, Timeout::After(DELIVERY_TIMEOUT)).await {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "event published");
                Ok(())
            }
            Err((err, _)) => Err(anyhow!("failed to publish to {}: {}", topic, err)),
        }
    }
}
