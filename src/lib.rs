//! Processor-agnostic payment operations over Stripe and Braintree.
//!
//! Application code issues payment operations (create customer, store a
//! payment source, charge, refund) through one vocabulary; the configured
//! backend translates each request into its native call sequence and
//! normalizes the native response back into a canonical resource.
//!
//! ```no_run
//! use paygate::{CardDetails, SourceInput, ChargeRequest};
//! use serde_json::json;
//!
//! # async fn run() -> paygate::Result<()> {
//! let backend = paygate::configure(
//!     "braintree",
//!     json!({
//!         "environment": "sandbox",
//!         "merchant_id": "merchant",
//!         "public_key": "public",
//!         "private_key": "private",
//!     }),
//!     None,
//! )?;
//!
//! let token = backend
//!     .tokens()
//!     .create(CardDetails::new("4242424242424242", 11, 2025, "314"))
//!     .await?;
//!
//! let charge = backend
//!     .charges()
//!     .create(ChargeRequest {
//!         source: SourceInput::Token(token.id),
//!         amount: 1000,
//!         currency: "usd".to_string(),
//!         auth_only: false,
//!         description: Some("Simple Charge Order".to_string()),
//!     })
//!     .await?;
//! println!("charged: {}", charge.id);
//! # Ok(())
//! # }
//! ```
//!
//! Reconfiguring the default registry while calls are in flight swaps the
//! backend for subsequent calls only; callers are responsible for not
//! reconfiguring concurrently with requests they care about.

pub mod backends;
pub mod config;
pub mod core;
pub mod mapping;
pub mod registry;
pub mod resources;

// Re-export the common surface
pub use backends::{
    AdminOps, BackendName, ChargeOps, CustomerOps, PaymentBackend, RefundOps, SourceOps,
    TokenOps, SUPPORTED_BACKENDS, SUPPORTED_SOURCE_TYPES,
};
pub use config::{BraintreeConfig, BraintreeEnvironment, StripeConfig};
pub use crate::core::{AppError, Result};
pub use mapping::{CardDetails, GatewayResponse};
pub use registry::{admin_handle, configure, current_backend, default_registry, Registry};
pub use resources::{
    BillingAddress, Charge, ChargeRef, ChargeRequest, Customer, CustomerRequest, Refund, Source,
    SourceInput, SourceRequest, Token, TokenInput,
};
