//! # Service Manager
//!
//! Registers named services and runs them as one supervised group.
//!
//! ## Supervision loop
//!
//! `run` spawns one task per service on a `JoinSet`, then repeatedly waits for
//! the first task to finish:
//!
//! - **Success**: the task leaves the wait set and the loop continues. When the
//!   set is empty the group has succeeded.
//! - **Failure** (an error or a panic): the group token is cancelled so every
//!   sibling sees its `ServiceContext` fire, the manager waits until each of
//!   them has actually returned, and only then hands back that first error.
//!   Whatever the siblings return afterwards is logged and dropped.
//!
//! A sibling that has not returned `cancel_grace` after the token fired is
//! dropped at whatever await it is suspended on and reports
//! `ServiceError::Cancelled`. Services that never look at their context are
//! stopped this way too.
//!
//! A panicking service is reported as `ServiceError::Panicked` only when the
//! binary unwinds on panic. With `panic = "abort"` the process ends instead.
//!
//! Services are never retried.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::{ServiceContext, StopHandle};
use super::error::ServiceError;
use super::factory::ServiceFactory;
use super::Service;

/// What to register: a live service, or an identifier resolved through the
/// manager's `ServiceFactory`.
pub enum ServiceSpec {
    Instance(Arc<dyn Service>),
    Identifier(String),
}

impl ServiceSpec {
    pub fn instance<S: Service>(service: S) -> Self {
        ServiceSpec::Instance(Arc::new(service))
    }
}

impl From<Arc<dyn Service>> for ServiceSpec {
    fn from(service: Arc<dyn Service>) -> Self {
        ServiceSpec::Instance(service)
    }
}

impl From<&str> for ServiceSpec {
    fn from(identifier: &str) -> Self {
        ServiceSpec::Identifier(identifier.to_string())
    }
}

impl From<String> for ServiceSpec {
    fn from(identifier: String) -> Self {
        ServiceSpec::Identifier(identifier)
    }
}

/// How long a cancelled service may take to wind down on its own.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

pub struct ServiceManager {
    services: Vec<(String, Arc<dyn Service>)>,
    factory: ServiceFactory,
    group: Mutex<CancellationToken>,
    cancel_grace: Duration,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::with_factory(ServiceFactory::default())
    }

    pub fn with_factory(factory: ServiceFactory) -> Self {
        Self {
            services: Vec::new(),
            factory,
            group: Mutex::new(CancellationToken::new()),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    pub fn set_cancel_grace(&mut self, grace: Duration) {
        self.cancel_grace = grace;
    }

    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    /// Adds a service to the group.
    ///
    /// Without an explicit `name`, an instance is registered under its
    /// `Service::kind()` and an identifier under the identifier itself. The
    /// name is checked for uniqueness before an identifier is resolved.
    pub fn register(
        &mut self,
        spec: impl Into<ServiceSpec>,
        name: Option<&str>,
    ) -> Result<Arc<dyn Service>, ServiceError> {
        let spec = spec.into();
        let name = match (name, &spec) {
            (Some(name), _) => name.to_string(),
            (None, ServiceSpec::Instance(service)) => service.kind().to_string(),
            (None, ServiceSpec::Identifier(identifier)) => identifier.clone(),
        };

        if name.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("service name is empty".to_string()));
        }
        if self.contains(&name) {
            return Err(ServiceError::DuplicateName(name));
        }

        let service = match spec {
            ServiceSpec::Instance(service) => service,
            ServiceSpec::Identifier(identifier) => self.factory.create(&identifier)?,
        };

        self.services.push((name.clone(), Arc::clone(&service)));
        info!("Service '{}' registered", name);
        Ok(service)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.services
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, service)| service)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|(name, _)| name.as_str())
    }

    pub fn factory(&self) -> &ServiceFactory {
        &self.factory
    }

    /// Requests cancellation of the running group as a whole.
    pub fn stop(&self) {
        info!("Stop requested for the service group");
        self.lock_group().cancel();
    }

    /// A handle that stops the group from another task. It targets the next
    /// (or current) run only.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.lock_group().clone())
    }

    /// Runs every registered service and blocks until the whole group has
    /// terminated. Returns the first error, if any.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let group = self.lock_group().clone();
        let result = self.supervise(&group).await;

        if group.is_cancelled() {
            *self.lock_group() = CancellationToken::new();
        }
        result
    }

    async fn supervise(&self, group: &CancellationToken) -> Result<(), ServiceError> {
        let mut tasks = JoinSet::new();
        for (name, service) in &self.services {
            let token = group.child_token();
            let ctx = ServiceContext::new(name.clone(), token.clone());
            let service = Arc::clone(service);
            let task_name = name.clone();
            let grace = self.cancel_grace;
            tasks.spawn(async move {
                let mut running = service.run(ctx);
                let result = tokio::select! {
                    biased;
                    result = &mut running => result,
                    _ = async {
                        token.cancelled().await;
                        tokio::time::sleep(grace).await;
                    } => {
                        warn!("Service '{}' ignored cancellation for {:?}, dropping it", task_name, grace);
                        Err(ServiceError::Cancelled)
                    }
                };
                (task_name, result)
            });
            info!("Service '{}' started", name);
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!("Service '{}' terminated", name),
                Ok((name, Err(err))) => {
                    error!("Service '{}' terminated with an error: {}", name, err);
                    failure = Some(err);
                    break;
                }
                Err(join_err) => {
                    error!("Service task aborted: {}", join_err);
                    failure = Some(ServiceError::Panicked {
                        detail: join_err.to_string(),
                    });
                    break;
                }
            }
        }

        let Some(failure) = failure else {
            return Ok(());
        };

        if !tasks.is_empty() {
            info!("Cancel the {} pending service(s)", tasks.len());
            group.cancel();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => debug!("Service '{}' completed during cancellation", name),
                    Ok((name, Err(err))) => debug!("Service '{}' stopped: {}", name, err),
                    Err(join_err) => warn!("Service task aborted during cancellation: {}", join_err),
                }
            }
        }
        Err(failure)
    }

    fn lock_group(&self) -> MutexGuard<'_, CancellationToken> {
        self.group.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;

    struct Idle;

    impl Service for Idle {
        fn run(&self, _ctx: ServiceContext) -> BoxFuture<'_, Result<(), ServiceError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn factory() -> ServiceFactory {
        let mut factory = ServiceFactory::default();
        factory.register("Idle", |_, _| Ok(Arc::new(Idle)));
        factory
    }

    #[test]
    fn instance_defaults_to_its_kind() {
        let mut manager = ServiceManager::new();
        manager.register(ServiceSpec::instance(Idle), None).unwrap();
        assert!(manager.contains("Idle"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn identifier_defaults_to_itself() {
        let mut manager = ServiceManager::with_factory(factory());
        manager.register("Idle[first]", None).unwrap();
        manager.register("Idle", Some("second")).unwrap();
        assert_eq!(manager.names().collect::<Vec<_>>(), vec!["Idle[first]", "second"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut manager = ServiceManager::with_factory(factory());
        manager.register(ServiceSpec::instance(Idle), None).unwrap();

        let err = manager.register("Idle", None).err().unwrap();
        assert!(matches!(err, ServiceError::DuplicateName(ref name) if name == "Idle"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn unresolvable_identifier_is_invalid() {
        let mut manager = ServiceManager::with_factory(factory());
        assert!(matches!(manager.register("Nope", None), Err(ServiceError::InvalidArgument(_))));
        assert!(matches!(manager.register("Idle[", None), Err(ServiceError::InvalidArgument(_))));
        assert!(matches!(
            manager.register(ServiceSpec::instance(Idle), Some(" ")),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn cancel_grace_is_adjustable() {
        let mut manager = ServiceManager::new();
        assert_eq!(manager.cancel_grace(), DEFAULT_CANCEL_GRACE);
        manager.set_cancel_grace(Duration::from_millis(50));
        assert_eq!(manager.cancel_grace(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn empty_group_succeeds() {
        assert!(ServiceManager::new().run().await.is_ok());
    }
}
