use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use lib_runtime::{
    open_stream, ConfigTree, Consumer, JsonSchema, Message, Service, ServiceContext, ServiceError,
    TopicRegistry,
};

use super::error::RoutingError;
use super::health::{EntityCounters, HEALTH_CHECK_PERIOD};
use super::model::{Order, ENTITY_ORDER, ENTITY_PRODUCT, TYPE_ADD, TYPE_END_OF_STREAM};
use super::{stream_kind, ORDER_TOPIC};

pub const ORDER_FILE: &str = "order.csv";

/// Appends `Order` messages as CSV rows to `<data_dir>/target/order.csv`.
/// A new or empty file gets the header row first.
pub struct Loader {
    consumer: Arc<dyn Consumer<Order>>,
    target_dir: PathBuf,
}

impl Loader {
    pub fn new(consumer: Arc<dyn Consumer<Order>>, data_dir: &Path) -> anyhow::Result<Self> {
        let target_dir = data_dir.join("target");
        std::fs::create_dir_all(&target_dir)
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;
        Ok(Self {
            consumer,
            target_dir,
        })
    }

    /// Factory constructor: subscribes to the order topic as `instance`.
    pub fn from_config(
        instance: &str,
        config: &ConfigTree,
        registry: &TopicRegistry,
    ) -> Result<Arc<dyn Service>, ServiceError> {
        let data_dir = config.require_str("crisp.data_dir")?;
        let stream = open_stream(stream_kind(config)?, registry, ORDER_TOPIC, JsonSchema::<Order>::new())?;
        let consumer = stream.create_consumer(instance);
        Ok(Arc::new(Self::new(consumer, Path::new(data_dir))?))
    }

    pub fn order_file(&self) -> PathBuf {
        self.target_dir.join(ORDER_FILE)
    }

    async fn handle(&self, message: &Message<Order>, counters: &mut EntityCounters) -> ControlFlow<()> {
        match message.property("type") {
            Some(TYPE_ADD) => {
                let entity = message.property("entity");
                match entity {
                    Some(ENTITY_ORDER) => {
                        counters.record(ENTITY_ORDER);
                        if let Err(e) = self.load_order(message).await {
                            error!("Order in message {} not loaded: {:#}", message, e);
                        }
                    }
                    Some(ENTITY_PRODUCT) => {
                        counters.record(ENTITY_PRODUCT);
                        debug!("{} message {} ignored", ENTITY_PRODUCT, message);
                    }
                    _ => warn!("Message {} skipped: {}", message, RoutingError::entity(entity)),
                }
                ControlFlow::Continue(())
            }
            Some(TYPE_END_OF_STREAM) => ControlFlow::Break(()),
            other => {
                warn!("Message {} skipped: {}", message, RoutingError::message_type(other));
                ControlFlow::Continue(())
            }
        }
    }

    async fn load_order(&self, message: &Message<Order>) -> anyhow::Result<()> {
        let order = message.value()?;
        let path = self.order_file();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut lines = String::new();
        if file.metadata().await?.len() == 0 {
            lines.push_str(&Order::csv_header());
            lines.push('\n');
        }
        lines.push_str(&order.to_csv_record());
        lines.push('\n');
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Service for Loader {
    fn run(&self, ctx: ServiceContext) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            let mut counters = EntityCounters::new(ctx.name(), &[ENTITY_ORDER, ENTITY_PRODUCT]);
            let mut health = tokio::time::interval(HEALTH_CHECK_PERIOD);
            health.set_missed_tick_behavior(MissedTickBehavior::Delay);
            health.tick().await;

            loop {
                tokio::select! {
                    _ = health.tick() => {
                        counters.report();
                    }
                    next = ctx.guard(self.consumer.recv()) => {
                        let Some(message) = next? else {
                            info!("Consumer '{}' terminated", self.consumer.name());
                            return Ok(());
                        };
                        let flow = self.handle(&message, &mut counters).await;
                        self.consumer.ack(&message)?;
                        if flow.is_break() {
                            counters.report();
                            info!("End of stream reached, orders written to {}", self.order_file().display());
                            return Ok(());
                        }
                    }
                }
            }
        })
    }
}
