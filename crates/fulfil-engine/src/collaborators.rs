//! # External Collaborators
//!
//! The two things the engine asks the outside world for, as traits so the
//! application (and tests) can plug in their own.
//!
//! ```text
//! place_order
//!     │
//!     ├──► LocationProvider::resolve_coordinates(address)
//!     │        Ok(lat, lng)  → haversine distance from the hub
//!     │        Err(_)        → caller's fallback distance, else LocationUnavailable
//!     │
//!     └──► PaymentGateway::authorize(total, method)
//!              Ok(reference) → order persisted with the reference
//!              │               (insert fails → PaymentGateway::void(reference))
//!              Err(_)        → PaymentDeclined, nothing persisted
//! ```
//!
//! Both calls happen before any write, so a slow collaborator never holds a
//! database lock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fulfil_core::{Coordinates, Money, PaymentMethod};

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator answered, and the answer is no.
    #[error("declined: {0}")]
    Declined(String),

    /// The collaborator could not be reached or could not answer.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a delivery address to coordinates.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn resolve_coordinates(&self, address: &str) -> Result<Coordinates, CollaboratorError>;
}

/// A successful payment authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    /// Gateway reference stored on the order.
    pub reference: String,
}

/// Authorizes the order total before the order exists.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentAuthorization, CollaboratorError>;

    /// Releases an authorization whose order was never stored.
    async fn void(&self, authorization: &PaymentAuthorization) -> Result<(), CollaboratorError>;
}

/// Location provider for deployments without geocoding; every order must
/// carry coordinates or a fallback distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoding;

#[async_trait]
impl LocationProvider for NoGeocoding {
    async fn resolve_coordinates(&self, _address: &str) -> Result<Coordinates, CollaboratorError> {
        Err(CollaboratorError::Unavailable("geocoding is not configured".into()))
    }
}
