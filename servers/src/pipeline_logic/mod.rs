pub mod config;
pub mod error;
pub mod extracter;
pub mod health;
pub mod loader;
pub mod model;
pub mod rules;
pub mod transformer;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use lib_runtime::{
    open_stream, ConfigTree, JsonSchema, ServiceError, ServiceFactory, ServiceManager,
    ServiceSpec, StopHandle, Stream, StreamKind, TopicRegistry,
};

use extracter::Extracter;
use loader::Loader;
use model::{Order, Row};
use rules::Rules;
use transformer::Transformer;

/// Topic carrying raw CSV rows from the extracter to the transformer.
pub const ROW_TOPIC: &str = "OrderRow";
/// Topic carrying orders from the transformer to the loader.
pub const ORDER_TOPIC: &str = "order";

/// Service identifier resolved through the factory.
pub const LOADER_IDENTIFIER: &str = "Loader[loader]";

pub fn stream_kind(config: &ConfigTree) -> Result<StreamKind, ServiceError> {
    Ok(config
        .get_str("crisp.stream_kind")
        .map(str::parse::<StreamKind>)
        .transpose()?
        .unwrap_or_default())
}

/// The extract → transform → load group and the streams wiring it.
pub struct Pipeline {
    manager: ServiceManager,
    rows: Arc<dyn Stream<Row>>,
    orders: Arc<dyn Stream<Order>>,
}

impl Pipeline {
    /// Opens both topics on `registry`, then builds and registers the three
    /// services. `config` must already hold the merged `crisp` section.
    pub fn build(config: ConfigTree, registry: &TopicRegistry) -> Result<Self, ServiceError> {
        let kind = stream_kind(&config)?;
        let data_dir = config.require_str("crisp.data_dir")?.to_string();
        let rules = match config.get_str("crisp.transformations_file") {
            Some(path) => {
                let rules = Rules::load(Path::new(path)).map_err(anyhow::Error::from)?;
                info!("Loaded {} transformation rule(s) from {}", rules.len(), path);
                rules
            }
            None => Rules::default(),
        };
        if rules.is_empty() {
            warn!("No transformation rules, every order will carry default values");
        }

        let rows = open_stream(kind, registry, ROW_TOPIC, JsonSchema::<Row>::new())?;
        let orders = open_stream(kind, registry, ORDER_TOPIC, JsonSchema::<Order>::new())?;

        let mut factory = ServiceFactory::new(config);
        {
            let registry = registry.clone();
            factory.register("Loader", move |instance, config| {
                Loader::from_config(instance, config, &registry)
            });
        }
        let mut manager = ServiceManager::with_factory(factory);

        let extracter = Extracter::new(rows.create_producer(), Path::new(&data_dir))?;
        manager.register(ServiceSpec::instance(extracter), None)?;

        let transformer = Transformer::new(
            rows.create_consumer("transformer"),
            orders.create_producer(),
            rules,
        );
        manager.register(ServiceSpec::instance(transformer), None)?;

        manager.register(LOADER_IDENTIFIER, None)?;

        Ok(Self {
            manager,
            rows,
            orders,
        })
    }

    pub fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.manager.stop_handle()
    }

    pub async fn run(&self) -> Result<(), ServiceError> {
        info!(
            "Starting services: {}",
            self.manager.names().collect::<Vec<_>>().join(", ")
        );
        self.manager.run().await
    }

    /// Closes both producers and releases the stream handles.
    pub fn shutdown(&self) {
        self.rows.create_producer().close();
        self.orders.create_producer().close();
        self.rows.close();
        self.orders.close();
    }
}
