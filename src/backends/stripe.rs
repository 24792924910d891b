use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    validate_source_kind, BackendName, ChargeOps, CustomerOps, PaymentBackend, RefundOps,
    SourceOps, TokenOps,
};
use crate::config::StripeConfig;
use crate::core::{AppError, Result};
use crate::mapping::response::{
    GatewayResponse, PARAM_AMOUNT, PARAM_CUSTOMER_ID, PARAM_PAYMENT_METHOD_TOKEN,
};
use crate::mapping::{to_stripe_card, CardDetails};
use crate::resources::{
    Charge, ChargeRef, ChargeRequest, Customer, CustomerRequest, Refund, Source, SourceInput,
    SourceRequest, Token, TokenInput,
};

type Params = Vec<(String, String)>;

// Native API objects (the subset of fields the adapters read)

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StCard {
    pub id: String,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub exp_month: Option<u32>,
    #[serde(default)]
    pub exp_year: Option<u32>,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StToken {
    pub id: String,
    #[serde(default)]
    pub card: Option<StCard>,
    #[serde(default)]
    pub used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub default_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StCharge {
    pub id: String,
    /// Stripe amounts are already integer minor units
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StRefund {
    pub id: String,
    pub amount: i64,
    pub charge: String,
    pub status: String,
}

/// Native Stripe call surface, one method per endpoint the adapters use.
/// Stripe reports declines as transport-level errors, so these return plain
/// results rather than a success-flagged envelope.
#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn token_create(&self, params: Params) -> Result<StToken>;
    async fn token_retrieve(&self, id: &str) -> Result<StToken>;

    async fn customer_create(&self, params: Params) -> Result<StCustomer>;
    async fn customer_update(&self, id: &str, params: Params) -> Result<StCustomer>;
    async fn customer_retrieve(&self, id: &str) -> Result<StCustomer>;

    /// Update a stored card/source (billing details)
    async fn source_update(&self, id: &str, params: Params) -> Result<StCard>;

    async fn charge_create(&self, params: Params) -> Result<StCharge>;
    async fn charge_retrieve(&self, id: &str) -> Result<StCharge>;

    async fn refund_create(&self, params: Params) -> Result<StRefund>;
    async fn refund_retrieve(&self, id: &str) -> Result<StRefund>;
}

/// Stripe API client (form-encoded v1 endpoints)
pub struct StripeHttp {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StripeHttp {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            api_key: config.api_key.clone(),
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, params: &Params) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AppError::gateway(format!("Stripe gateway unavailable: {}", e))
                } else {
                    AppError::gateway(format!("Stripe API request failed: {}", e))
                }
            })?;
        Self::parse(response, path).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, resource: &str, id: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("Stripe API request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!("{} {}", resource, id)));
        }
        Self::parse(response, path).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::gateway(format!("Failed to read Stripe response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(text);
            return Err(AppError::gateway(format!(
                "Stripe API error on {} - HTTP {} ({})",
                path,
                status.as_u16(),
                message
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| AppError::gateway(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[async_trait]
impl StripeApi for StripeHttp {
    async fn token_create(&self, params: Params) -> Result<StToken> {
        self.post("/v1/tokens", &params).await
    }

    async fn token_retrieve(&self, id: &str) -> Result<StToken> {
        self.get(&format!("/v1/tokens/{}", id), "token", id).await
    }

    async fn customer_create(&self, params: Params) -> Result<StCustomer> {
        self.post("/v1/customers", &params).await
    }

    async fn customer_update(&self, id: &str, params: Params) -> Result<StCustomer> {
        self.post(&format!("/v1/customers/{}", id), &params).await
    }

    async fn customer_retrieve(&self, id: &str) -> Result<StCustomer> {
        self.get(&format!("/v1/customers/{}", id), "customer", id)
            .await
    }

    async fn source_update(&self, id: &str, params: Params) -> Result<StCard> {
        self.post(&format!("/v1/sources/{}", id), &params).await
    }

    async fn charge_create(&self, params: Params) -> Result<StCharge> {
        self.post("/v1/charges", &params).await
    }

    async fn charge_retrieve(&self, id: &str) -> Result<StCharge> {
        self.get(&format!("/v1/charges/{}", id), "charge", id).await
    }

    async fn refund_create(&self, params: Params) -> Result<StRefund> {
        self.post("/v1/refunds", &params).await
    }

    async fn refund_retrieve(&self, id: &str) -> Result<StRefund> {
        self.get(&format!("/v1/refunds/{}", id), "refund", id).await
    }
}

// Response normalization

fn token_response(token: StToken) -> GatewayResponse {
    let mut response = GatewayResponse::ok("OK", Some(token.id.clone()))
        .with_param(PARAM_PAYMENT_METHOD_TOKEN, token.id.clone());
    if let Some(card) = &token.card {
        if let Some(customer) = &card.customer {
            response = response.with_param(PARAM_CUSTOMER_ID, customer.clone());
        }
        if let Ok(raw) = serde_json::to_value(card) {
            response = response.with_param("card", raw);
        }
    }
    response
}

fn customer_response(customer: StCustomer) -> GatewayResponse {
    let mut response = GatewayResponse::ok("OK", Some(customer.id.clone()))
        .with_param(PARAM_CUSTOMER_ID, customer.id.clone());
    if let Some(source) = &customer.default_source {
        response = response.with_param(PARAM_PAYMENT_METHOD_TOKEN, source.clone());
    }
    if let Some(email) = &customer.email {
        response = response.with_param("email", email.clone());
    }
    response
}

fn charge_response(charge: StCharge) -> GatewayResponse {
    let mut response = GatewayResponse::ok(charge.status.clone(), Some(charge.id.clone()))
        .with_param(PARAM_AMOUNT, charge.amount)
        .with_param("currency", charge.currency.clone())
        .with_param("status", charge.status.clone())
        .with_param("captured", charge.captured);
    if let Some(created) = charge.created {
        if let Some(timestamp) = DateTime::<Utc>::from_timestamp(created, 0) {
            response = response.with_param("created_at", timestamp.to_rfc3339());
        }
    }
    response
}

fn refund_response(refund: StRefund) -> GatewayResponse {
    GatewayResponse::ok(refund.status.clone(), Some(refund.id.clone()))
        .with_param(PARAM_AMOUNT, refund.amount)
        .with_param("charge_id", refund.charge.clone())
        .with_param("status", refund.status)
}

/// Stripe backend: the resource adapters over a native API client
pub struct StripeBackend<A: StripeApi = StripeHttp> {
    api: Arc<A>,
}

impl StripeBackend<StripeHttp> {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            api: Arc::new(StripeHttp::new(config)),
        }
    }
}

impl<A: StripeApi> StripeBackend<A> {
    pub fn with_api(api: Arc<A>) -> Self {
        Self { api }
    }
}

impl<A: StripeApi> PaymentBackend for StripeBackend<A> {
    fn name(&self) -> BackendName {
        BackendName::Stripe
    }

    fn customers(&self) -> &dyn CustomerOps {
        self
    }

    fn sources(&self) -> &dyn SourceOps {
        self
    }

    fn tokens(&self) -> &dyn TokenOps {
        self
    }

    fn charges(&self) -> &dyn ChargeOps {
        self
    }

    fn refunds(&self) -> &dyn RefundOps {
        self
    }
}

fn billing_address_params(request: &CustomerRequest) -> Params {
    let mut params = Params::new();
    if let Some(address) = &request.billing_address {
        if let Some(line1) = &address.street_address {
            params.push(("owner[address][line1]".to_string(), line1.clone()));
        }
        if let Some(city) = &address.locality {
            params.push(("owner[address][city]".to_string(), city.clone()));
        }
        if let Some(state) = &address.region {
            params.push(("owner[address][state]".to_string(), state.clone()));
        }
        if let Some(postal_code) = &address.postal_code {
            params.push(("owner[address][postal_code]".to_string(), postal_code.clone()));
        }
        if let Some(country) = &address.country {
            params.push(("owner[address][country]".to_string(), country.clone()));
        }
    }
    params
}

#[async_trait]
impl<A: StripeApi> CustomerOps for StripeBackend<A> {
    async fn create(&self, request: CustomerRequest) -> Result<Customer> {
        let mut params = Params::new();
        if let Some(email) = &request.email {
            params.push(("email".to_string(), email.clone()));
        }
        if let Some(description) = &request.description {
            params.push(("description".to_string(), description.clone()));
        }

        match &request.source {
            // Card details: tokenize first, then create the customer with
            // the fresh token attached.
            Some(SourceInput::Card(card)) => {
                let token = self.api.token_create(to_stripe_card(card)?).await?;
                params.push(("source".to_string(), token.id));
                let customer = self.api.customer_create(params).await?;
                Customer::from_response(customer_response(customer))
            }

            Some(SourceInput::Token(token)) => {
                params.push(("source".to_string(), token.clone()));
                let customer = self.api.customer_create(params).await?;
                Customer::from_response(customer_response(customer))
            }

            // Prior Source/Token: refresh its billing details, then the
            // customer's email. A failed source update aborts the flow
            // before the customer update.
            Some(SourceInput::Prior(source)) => {
                let address_params = billing_address_params(&request);
                self.api
                    .source_update(&source.id, address_params)
                    .await
                    .map_err(|e| {
                        AppError::operation_failed(format!("Payment method update failed: {}", e))
                    })?;

                let customer_id = source.customer_id().ok_or_else(|| {
                    AppError::validation("Prior source carries no customer id")
                })?;
                let customer = self.api.customer_update(customer_id, params).await?;
                Customer::from_response(customer_response(customer))
            }

            None => {
                let customer = self.api.customer_create(params).await?;
                Customer::from_response(customer_response(customer))
            }
        }
    }

    async fn retrieve(&self, id: &str) -> Result<Customer> {
        let customer = self.api.customer_retrieve(id).await?;
        Customer::from_response(customer_response(customer))
    }
}

#[async_trait]
impl<A: StripeApi> SourceOps for StripeBackend<A> {
    async fn create(&self, request: SourceRequest) -> Result<Source> {
        validate_source_kind(&request.kind)?;

        let response = match (request.token, request.card) {
            (Some(TokenInput::Id(id)), _) => token_response(self.api.token_retrieve(&id).await?),
            (Some(TokenInput::Card(card)), _) => {
                token_response(self.api.token_create(to_stripe_card(&card)?).await?)
            }
            (None, Some(card)) => {
                token_response(self.api.token_create(to_stripe_card(&card)?).await?)
            }
            (None, None) => {
                return Err(AppError::validation(
                    "Source creation requires either a token or card details",
                ))
            }
        };
        Source::from_response(response)
    }

    async fn retrieve(&self, id: &str) -> Result<Source> {
        let token = self.api.token_retrieve(id).await?;
        Source::from_response(token_response(token))
    }
}

#[async_trait]
impl<A: StripeApi> TokenOps for StripeBackend<A> {
    async fn create(&self, card: CardDetails) -> Result<Token> {
        let token = self.api.token_create(to_stripe_card(&card)?).await?;
        Token::from_response(token_response(token))
    }

    async fn retrieve(&self, id: &str) -> Result<Token> {
        SourceOps::retrieve(self, id).await
    }
}

#[async_trait]
impl<A: StripeApi> ChargeOps for StripeBackend<A> {
    async fn create(&self, request: ChargeRequest) -> Result<Charge> {
        let mut params = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.to_ascii_lowercase()),
            // capture=false leaves an uncaptured authorization
            ("capture".to_string(), (!request.auth_only).to_string()),
        ];
        if let Some(description) = &request.description {
            params.push(("description".to_string(), description.clone()));
        }

        match request.source {
            SourceInput::Card(card) => params.extend(to_stripe_card(&card)?),
            SourceInput::Token(token) => params.push(("source".to_string(), token)),
            SourceInput::Prior(source) => params.push(("source".to_string(), source.id)),
        }

        info!(
            backend = "stripe",
            amount = request.amount,
            auth_only = request.auth_only,
            "Creating charge"
        );
        let charge = self.api.charge_create(params).await?;
        Charge::from_response(charge_response(charge))
    }

    async fn retrieve(&self, id: &str) -> Result<Charge> {
        // Stripe already reports integer minor units; no scaling needed.
        let charge = self.api.charge_retrieve(id).await?;
        Charge::from_response(charge_response(charge))
    }
}

#[async_trait]
impl<A: StripeApi> RefundOps for StripeBackend<A> {
    async fn create(&self, charge: ChargeRef, amount: Option<i64>) -> Result<Refund> {
        // Stripe settles purchases immediately, so there is no unsettled
        // state to force a full refund around.
        let mut params = vec![("charge".to_string(), charge.into_id())];
        if let Some(minor) = amount {
            params.push(("amount".to_string(), minor.to_string()));
        }
        let refund = self.api.refund_create(params).await?;
        Refund::from_response(refund_response(refund))
    }

    async fn retrieve(&self, id: &str) -> Result<Refund> {
        let refund = self.api.refund_retrieve(id).await?;
        Refund::from_response(refund_response(refund))
    }
}
