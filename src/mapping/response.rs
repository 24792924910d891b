use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::{AppError, Result};

/// Canonical parameter keys. Backends populate these whenever the native
/// response carries the data, because the adapters build canonical resources
/// out of them.
pub const PARAM_CUSTOMER_ID: &str = "customer_id";
pub const PARAM_PAYMENT_METHOD_TOKEN: &str = "payment_method_token";
pub const PARAM_AMOUNT: &str = "amount";
pub const PARAM_CVV_RESULT_MESSAGE: &str = "cvv_result_message";

/// Canonical response record wrapping a native success/failure result
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResponse {
    /// Whether the native call reported success
    pub success: bool,

    /// Human-readable message from the backend
    pub message: String,

    /// Authorization/reference id assigned by the backend
    pub authorization: Option<String>,

    /// Backend-specific response attributes, string-keyed
    pub params: Map<String, Value>,
}

impl GatewayResponse {
    pub fn ok(message: impl Into<String>, authorization: Option<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            authorization,
            params: Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            authorization: None,
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Surface an unsuccessful native result as the opaque backend error,
    /// preserving the backend's own message.
    pub fn into_success(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(AppError::Gateway(self.message))
        }
    }

    /// Fetch a parameter the downstream adapter cannot proceed without.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::gateway(format!("Backend response is missing '{}'", key))
            })
    }
}
