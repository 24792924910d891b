use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{AppError, Result};
use crate::mapping::card::CardDetails;
use crate::mapping::response::{
    GatewayResponse, PARAM_CUSTOMER_ID, PARAM_PAYMENT_METHOD_TOKEN,
};

/// A vaulted customer, keyed by the backend's vault id
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: String,
    pub attributes: Map<String, Value>,
}

impl Customer {
    pub(crate) fn from_response(response: GatewayResponse) -> Result<Self> {
        let id = response.require_str(PARAM_CUSTOMER_ID)?.to_string();
        Ok(Self {
            id,
            attributes: response.params,
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A stored payment method, keyed by the token the backend's vault assigned
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: String,
    pub attributes: Map<String, Value>,
}

/// A Token and a Source are the same stored-payment-method entity,
/// distinguished only by creation intent.
pub type Token = Source;

impl Source {
    pub(crate) fn from_response(response: GatewayResponse) -> Result<Self> {
        let id = response.require_str(PARAM_PAYMENT_METHOD_TOKEN)?.to_string();
        Ok(Self {
            id,
            attributes: response.params,
        })
    }

    /// Vault id of the customer this payment method is stored under
    pub fn customer_id(&self) -> Option<&str> {
        self.attributes.get(PARAM_CUSTOMER_ID).and_then(Value::as_str)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A charge (authorization or settled sale), keyed by the backend's
/// authorization id
#[derive(Debug, Clone, Serialize)]
pub struct Charge {
    pub id: String,
    pub attributes: Map<String, Value>,
}

impl Charge {
    pub(crate) fn from_response(response: GatewayResponse) -> Result<Self> {
        let id = response
            .authorization
            .clone()
            .ok_or_else(|| AppError::gateway("Backend response carried no authorization id"))?;
        Ok(Self {
            id,
            attributes: response.params,
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Refund {
    pub id: String,
    pub attributes: Map<String, Value>,
}

impl Refund {
    pub(crate) fn from_response(response: GatewayResponse) -> Result<Self> {
        let id = response
            .authorization
            .clone()
            .ok_or_else(|| AppError::gateway("Backend response carried no authorization id"))?;
        Ok(Self {
            id,
            attributes: response.params,
        })
    }
}

/// The payment source handed to Customer/Charge creation. Absence is
/// expressed with `Option<SourceInput>` on the request.
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// An existing payment-method token
    Token(String),

    /// Raw card details to vault
    Card(CardDetails),

    /// A previously created Source/Token resource
    Prior(Source),
}

impl From<CardDetails> for SourceInput {
    fn from(card: CardDetails) -> Self {
        SourceInput::Card(card)
    }
}

impl From<Source> for SourceInput {
    fn from(source: Source) -> Self {
        SourceInput::Prior(source)
    }
}

impl From<&str> for SourceInput {
    fn from(token: &str) -> Self {
        SourceInput::Token(token.to_string())
    }
}

/// A charge to refund: either its id or the resource itself
#[derive(Debug, Clone)]
pub enum ChargeRef {
    Id(String),
    Resource(Charge),
}

impl ChargeRef {
    pub fn into_id(self) -> String {
        match self {
            ChargeRef::Id(id) => id,
            ChargeRef::Resource(charge) => charge.id,
        }
    }
}

impl From<&Charge> for ChargeRef {
    fn from(charge: &Charge) -> Self {
        ChargeRef::Resource(charge.clone())
    }
}

impl From<&str> for ChargeRef {
    fn from(id: &str) -> Self {
        ChargeRef::Id(id.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl BillingAddress {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.street_address.is_none()
            && self.locality.is_none()
            && self.region.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}

/// Customer creation request
///
/// `options` is a string-keyed bag forwarded to the backend's vault call;
/// recognized keys include `verify_card`, `make_default`,
/// `fail_on_duplicate_payment_method`, `verification_amount` and
/// `verification_merchant_account_id`.
#[derive(Debug, Clone, Default)]
pub struct CustomerRequest {
    pub email: Option<String>,
    pub source: Option<SourceInput>,
    pub description: Option<String>,
    pub billing_address: Option<BillingAddress>,
    pub options: Map<String, Value>,
}

/// Charge creation request. `amount` is in integer minor units.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub source: SourceInput,
    pub amount: i64,
    pub currency: String,
    pub auth_only: bool,
    pub description: Option<String>,
}

/// Token input to Source creation: an existing token id, or card details
/// to vault first
#[derive(Debug, Clone)]
pub enum TokenInput {
    Id(String),
    Card(CardDetails),
}

/// Source creation request. `kind` must be one of the supported source
/// types (currently only "card").
#[derive(Debug, Clone)]
pub struct SourceRequest {
    pub kind: String,
    pub token: Option<TokenInput>,
    pub card: Option<CardDetails>,
}
