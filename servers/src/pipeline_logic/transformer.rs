use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use lib_runtime::{Consumer, Message, Producer, Service, ServiceContext, ServiceError};

use super::error::RoutingError;
use super::health::{EntityCounters, HEALTH_CHECK_PERIOD};
use super::model::{
    properties, Order, Row, ENTITY_ORDER, ENTITY_ORDER_ROW, ENTITY_PRODUCT_ROW, TYPE_ADD,
    TYPE_END_OF_STREAM,
};
use super::rules::Rules;

/// Turns `OrderRow` messages into `Order` messages.
pub struct Transformer {
    consumer: Arc<dyn Consumer<Row>>,
    producer: Arc<dyn Producer<Order>>,
    rules: Rules,
}

impl Transformer {
    pub fn new(consumer: Arc<dyn Consumer<Row>>, producer: Arc<dyn Producer<Order>>, rules: Rules) -> Self {
        Self {
            consumer,
            producer,
            rules,
        }
    }

    async fn handle(
        &self,
        ctx: &ServiceContext,
        message: &Message<Row>,
        counters: &mut EntityCounters,
    ) -> Result<ControlFlow<()>, ServiceError> {
        match message.property("type") {
            Some(TYPE_ADD) => {
                let entity = message.property("entity");
                match entity {
                    Some(ENTITY_ORDER_ROW) => {
                        counters.record(ENTITY_ORDER_ROW);
                        self.transform_order_row(ctx, message).await?;
                    }
                    Some(ENTITY_PRODUCT_ROW) => {
                        counters.record(ENTITY_PRODUCT_ROW);
                        info!("No transformation for {} message {}", ENTITY_PRODUCT_ROW, message);
                    }
                    _ => warn!("Message {} skipped: {}", message, RoutingError::entity(entity)),
                }
                Ok(ControlFlow::Continue(()))
            }
            Some(TYPE_END_OF_STREAM) => {
                let props = properties(TYPE_END_OF_STREAM, None);
                ctx.guard(self.producer.send(&Order::default(), props, Some(Utc::now())))
                    .await??;
                Ok(ControlFlow::Break(()))
            }
            other => {
                warn!("Message {} skipped: {}", message, RoutingError::message_type(other));
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    async fn transform_order_row(
        &self,
        ctx: &ServiceContext,
        message: &Message<Row>,
    ) -> Result<(), ServiceError> {
        let row = match message.value() {
            Ok(row) => row,
            Err(e) => {
                error!("Message {} cannot be decoded: {}", message, e);
                return Ok(());
            }
        };
        let order = match self.rules.apply(row) {
            Ok(order) => order,
            Err(e) => {
                warn!("Row in message {} skipped: {}", message, e);
                return Ok(());
            }
        };

        let props = properties(TYPE_ADD, Some(ENTITY_ORDER));
        ctx.guard(self.producer.send(&order, props, message.timestamp()))
            .await??;
        Ok(())
    }
}

impl Service for Transformer {
    fn run(&self, ctx: ServiceContext) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            let mut counters =
                EntityCounters::new(ctx.name(), &[ENTITY_ORDER_ROW, ENTITY_PRODUCT_ROW]);
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
                        let flow = self.handle(&ctx, &message, &mut counters).await?;
                        self.consumer.ack(&message)?;
                        if flow.is_break() {
                            counters.report();
                            info!("End of stream forwarded");
                            return Ok(());
                        }
                    }
                }
            }
        })
    }
}
