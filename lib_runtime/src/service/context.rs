use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::error::ServiceError;

/// # Service Context
///
/// Handed to `Service::run`. Carries the name the service was registered under
/// and a child of the group's cancellation token.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    name: String,
    token: CancellationToken,
}

impl ServiceContext {
    pub fn new(name: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            name: name.into(),
            token,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the group asks this service to stop.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Races `future` against cancellation. Cancellation wins ties and yields
    /// `Err(ServiceError::Cancelled)`.
    pub async fn guard<F>(&self, future: F) -> Result<F::Output, ServiceError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ServiceError::Cancelled),
            output = future => Ok(output),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Cancels a running `ServiceManager` group from another task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}
