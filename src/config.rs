use serde::Deserialize;
use std::env;

use crate::core::{AppError, Result};

/// Braintree environment selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BraintreeEnvironment {
    Sandbox,
    Production,
}

/// Braintree native client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BraintreeConfig {
    pub environment: BraintreeEnvironment,
    pub merchant_id: String,
    pub public_key: String,
    pub private_key: String,

    /// Override the API host, mostly for pointing tests at a local server
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Stripe native client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub api_key: String,

    #[serde(default)]
    pub base_url: Option<String>,
}

impl BraintreeConfig {
    /// Load from environment variables (BRAINTREE_*)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = match env::var("BRAINTREE_ENVIRONMENT")
            .unwrap_or_else(|_| "sandbox".to_string())
            .as_str()
        {
            "sandbox" => BraintreeEnvironment::Sandbox,
            "production" => BraintreeEnvironment::Production,
            other => {
                return Err(AppError::Configuration(format!(
                    "Invalid BRAINTREE_ENVIRONMENT '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            environment,
            merchant_id: env::var("BRAINTREE_MERCHANT_ID").map_err(|_| {
                AppError::Configuration("BRAINTREE_MERCHANT_ID not set".to_string())
            })?,
            public_key: env::var("BRAINTREE_PUBLIC_KEY").map_err(|_| {
                AppError::Configuration("BRAINTREE_PUBLIC_KEY not set".to_string())
            })?,
            private_key: env::var("BRAINTREE_PRIVATE_KEY").map_err(|_| {
                AppError::Configuration("BRAINTREE_PRIVATE_KEY not set".to_string())
            })?,
            base_url: env::var("BRAINTREE_BASE_URL").ok(),
        })
    }
}

impl StripeConfig {
    /// Load from environment variables (STRIPE_*)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_key: env::var("STRIPE_API_KEY")
                .map_err(|_| AppError::Configuration("STRIPE_API_KEY not set".to_string()))?,
            base_url: env::var("STRIPE_BASE_URL").ok(),
        })
    }
}
