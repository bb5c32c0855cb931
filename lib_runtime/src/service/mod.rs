//! # Services
//!
//! A `Service` is a long-running asynchronous unit of work, typically a user of
//! a stream producer or consumer. The `ServiceManager` runs a named group of
//! them concurrently and supervises the group as one failure domain: the first
//! failure cancels every sibling and is returned to the caller once all of them
//! have finished.
//!
//! ## Components:
//!
//! - **`context`**: `ServiceContext` (name + cancellation) and `StopHandle`.
//! - **`factory`**: `ServiceFactory`, the kind → constructor table used to
//!   register services by textual identifier.
//! - **`manager`**: `ServiceManager`, registration and group supervision.

mod context;
mod error;
mod factory;
mod manager;

use futures_util::future::BoxFuture;

pub use context::{ServiceContext, StopHandle};
pub use error::ServiceError;
pub use factory::ServiceFactory;
pub use manager::{ServiceManager, ServiceSpec, DEFAULT_CANCEL_GRACE};

/// # Service
///
/// The capability contract the `ServiceManager` drives.
///
/// `run` returns `Ok(())` on graceful completion and an error on failure. It
/// must watch `ctx` for cancellation at its suspension points (see
/// `ServiceContext::guard`) and return `Err(ServiceError::Cancelled)` promptly
/// once cancelled, never swallowing it.
pub trait Service: Send + Sync + 'static {
    fn run(&self, ctx: ServiceContext) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Name used when the service is registered without an explicit one.
    /// Defaults to the concrete type's short name.
    fn kind(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Extracter;

    impl Service for Extracter {
        fn run(&self, _ctx: ServiceContext) -> BoxFuture<'_, Result<(), ServiceError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn default_kind_is_the_short_type_name() {
        assert_eq!(Extracter.kind(), "Extracter");
    }

    #[test]
    fn short_type_name_strips_paths_and_generics() {
        assert_eq!(short_type_name("a::b::Loader<c::D>"), "Loader");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
