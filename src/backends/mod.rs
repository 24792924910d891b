use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};
use crate::mapping::card::CardDetails;
use crate::mapping::response::GatewayResponse;
use crate::resources::{
    Charge, ChargeRef, ChargeRequest, Customer, CustomerRequest, Refund, Source, SourceRequest,
    Token,
};

pub mod braintree;
pub mod stripe;

pub use braintree::{BraintreeAdmin, BraintreeBackend};
pub use stripe::StripeBackend;

/// Closed set of backend names `configure` accepts
pub const SUPPORTED_BACKENDS: [&str; 2] = ["stripe", "braintree"];

/// Source types the Source/Token adapters can vault
pub const SUPPORTED_SOURCE_TYPES: [&str; 1] = ["card"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendName {
    Stripe,
    Braintree,
}

impl FromStr for BackendName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stripe" => Ok(BackendName::Stripe),
            "braintree" => Ok(BackendName::Braintree),
            other => Err(AppError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendName::Stripe => f.write_str("stripe"),
            BackendName::Braintree => f.write_str("braintree"),
        }
    }
}

pub(crate) fn validate_source_kind(kind: &str) -> Result<()> {
    if SUPPORTED_SOURCE_TYPES.contains(&kind) {
        Ok(())
    } else {
        Err(AppError::UnsupportedSourceType(kind.to_string()))
    }
}

#[async_trait]
pub trait CustomerOps: Send + Sync {
    async fn create(&self, request: CustomerRequest) -> Result<Customer>;
    async fn retrieve(&self, id: &str) -> Result<Customer>;
}

#[async_trait]
pub trait SourceOps: Send + Sync {
    async fn create(&self, request: SourceRequest) -> Result<Source>;
    async fn retrieve(&self, id: &str) -> Result<Source>;
}

#[async_trait]
pub trait TokenOps: Send + Sync {
    /// Always vaults a new stored card; the assigned token is the id
    async fn create(&self, card: CardDetails) -> Result<Token>;

    /// Delegates to Source retrieval: same underlying entity
    async fn retrieve(&self, id: &str) -> Result<Token>;
}

#[async_trait]
pub trait ChargeOps: Send + Sync {
    async fn create(&self, request: ChargeRequest) -> Result<Charge>;
    async fn retrieve(&self, id: &str) -> Result<Charge>;
}

#[async_trait]
pub trait RefundOps: Send + Sync {
    /// `amount` in integer minor units; `None` refunds in full
    async fn create(&self, charge: ChargeRef, amount: Option<i64>) -> Result<Refund>;
    async fn retrieve(&self, id: &str) -> Result<Refund>;
}

/// A configured payment backend. The registry resolves one of these per
/// process; adapters never branch on backend identity.
pub trait PaymentBackend: Send + Sync {
    fn name(&self) -> BackendName;

    fn customers(&self) -> &dyn CustomerOps;
    fn sources(&self) -> &dyn SourceOps;
    fn tokens(&self) -> &dyn TokenOps;
    fn charges(&self) -> &dyn ChargeOps;
    fn refunds(&self) -> &dyn RefundOps;
}

/// Raw administrative handle for operations outside the uniform surface.
/// Only some backends expose one (Braintree: sandbox settlement).
#[async_trait]
pub trait AdminOps: Send + Sync {
    /// Force settlement of a not-yet-settled transaction
    async fn settle(&self, transaction_id: &str) -> Result<GatewayResponse>;
}
