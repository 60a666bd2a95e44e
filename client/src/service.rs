//! The business logic guarded by the license check.

use thiserror::Error;
use tracing::{debug, info};

/// Business service errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// [`BusinessService::execute`] was called before `initialize` or after `shutdown`.
    #[error("service not initialized")]
    NotInitialized,
}

/// Placeholder application service. Only reachable after a valid license.
#[derive(Debug, Default)]
pub struct BusinessService {
    customer: Option<String>,
}

impl BusinessService {
    /// Uninitialized service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the service for `customer`, the licensee.
    pub fn initialize(&mut self, customer: &str) {
        info!("business service initialized for {customer}");
        self.customer = Some(customer.to_string());
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.customer.is_some()
    }

    /// Runs the licensed functionality.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotInitialized`] before [`BusinessService::initialize`].
    pub fn execute(&self) -> Result<String, ServiceError> {
        let customer = self.customer.as_deref().ok_or(ServiceError::NotInitialized)?;
        debug!("executing business logic");
        Ok(format!("Hello World! Welcome, {customer}!"))
    }

    /// Releases the service; `execute` fails until initialized again.
    pub fn shutdown(&mut self) {
        if self.customer.take().is_some() {
            info!("business service shut down");
        }
    }
}
