use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use super::{
    validate_source_kind, AdminOps, BackendName, ChargeOps, CustomerOps, PaymentBackend,
    RefundOps, SourceOps, TokenOps,
};
use crate::config::{BraintreeConfig, BraintreeEnvironment};
use crate::core::{AppError, Result};
use crate::mapping::response::{
    GatewayResponse, PARAM_AMOUNT, PARAM_CUSTOMER_ID, PARAM_CVV_RESULT_MESSAGE,
    PARAM_PAYMENT_METHOD_TOKEN,
};
use crate::mapping::{merge_options, to_braintree_card, CardDetails};
use crate::resources::{
    Charge, ChargeRef, ChargeRequest, Customer, CustomerRequest, Refund, Source, SourceInput,
    SourceRequest, Token, TokenInput,
};

// Native vault entities

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtCreditCard {
    pub token: String,
    pub customer_id: String,
    #[serde(default)]
    pub last_4: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub expiration_month: Option<String>,
    #[serde(default)]
    pub expiration_year: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub credit_cards: Vec<BtCreditCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtTransaction {
    pub id: String,
    pub status: String,
    /// Major-unit amount as Braintree reports it ("10.00")
    pub amount: Decimal,
    #[serde(default)]
    pub currency_iso_code: Option<String>,
    #[serde(default)]
    pub cvv_response_code: Option<String>,
}

/// Outcome of a native mutation. Braintree reports processor-level failure
/// (declined card, duplicate payment method) as result data, not as a
/// transport error.
#[derive(Debug, Clone)]
pub struct BtResult<T> {
    pub success: bool,
    pub message: String,
    pub entity: Option<T>,
}

impl<T> BtResult<T> {
    pub fn ok(entity: T) -> Self {
        Self {
            success: true,
            message: "OK".to_string(),
            entity: Some(entity),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            entity: None,
        }
    }
}

/// Native Braintree call surface: one method per vault/transaction call the
/// adapters issue. A trait so the adapter flows can run against a recording
/// double in tests.
#[async_trait]
pub trait BraintreeApi: Send + Sync {
    async fn customer_create(&self, fields: Value) -> Result<BtResult<BtCustomer>>;
    async fn customer_update(&self, id: &str, fields: Value) -> Result<BtResult<BtCustomer>>;
    async fn customer_find(&self, id: &str) -> Result<BtCustomer>;

    /// Vault a payment method, creating a customer around it when no
    /// existing customer is referenced (the "store" call)
    async fn vault_store(&self, fields: Value) -> Result<BtResult<BtCustomer>>;
    async fn payment_method_update(&self, token: &str, fields: Value)
        -> Result<BtResult<BtCreditCard>>;
    async fn credit_card_find(&self, token: &str) -> Result<BtCreditCard>;

    async fn transaction_sale(&self, fields: Value) -> Result<BtResult<BtTransaction>>;
    async fn transaction_find(&self, id: &str) -> Result<BtTransaction>;
    async fn transaction_refund(&self, id: &str, fields: Value)
        -> Result<BtResult<BtTransaction>>;

    /// Sandbox-only: push an authorized transaction to settled
    async fn settle(&self, transaction_id: &str) -> Result<BtTransaction>;
}

/// Braintree API client over HTTPS
pub struct BraintreeHttp {
    client: Client,
    base_url: String,
    public_key: String,
    private_key: String,
}

impl BraintreeHttp {
    pub fn new(config: &BraintreeConfig) -> Self {
        let host = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match config.environment {
                BraintreeEnvironment::Sandbox => {
                    "https://api.sandbox.braintreegateway.com".to_string()
                }
                BraintreeEnvironment::Production => "https://api.braintreegateway.com".to_string(),
            },
        };

        Self {
            client: Client::new(),
            base_url: format!("{}/merchants/{}", host, config.merchant_id),
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.public_key, Some(&self.private_key))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                AppError::gateway(format!("Braintree gateway unavailable: {}", e))
            } else {
                AppError::gateway(format!("Braintree API request failed: {}", e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::gateway(format!("Failed to read Braintree response: {}", e)))?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }

    /// Issue a mutating call. HTTP 422 carries a processor-level failure
    /// and becomes an unsuccessful `BtResult`, not an error.
    async fn mutate<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
        key: &str,
    ) -> Result<BtResult<T>> {
        let (status, response) = self.request(method, path, Some(&body)).await?;

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let message = response
                .pointer("/api_error_response/message")
                .or_else(|| response.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Braintree rejected the request")
                .to_string();
            return Ok(BtResult::failure(message));
        }
        if !status.is_success() {
            return Err(AppError::gateway(format!(
                "Braintree API error - HTTP {} ({})",
                status.as_u16(),
                response
            )));
        }

        let entity = response.get(key).cloned().ok_or_else(|| {
            AppError::gateway(format!("Braintree response is missing '{}'", key))
        })?;
        Ok(BtResult::ok(serde_json::from_value(entity)?))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        resource: &str,
        id: &str,
    ) -> Result<T> {
        let (status, response) = self.request(Method::GET, path, None).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!("{} {}", resource, id)));
        }
        if !status.is_success() {
            return Err(AppError::gateway(format!(
                "Braintree API error - HTTP {} ({})",
                status.as_u16(),
                response
            )));
        }

        let entity = response.get(key).cloned().ok_or_else(|| {
            AppError::gateway(format!("Braintree response is missing '{}'", key))
        })?;
        Ok(serde_json::from_value(entity)?)
    }
}

#[async_trait]
impl BraintreeApi for BraintreeHttp {
    async fn customer_create(&self, fields: Value) -> Result<BtResult<BtCustomer>> {
        self.mutate(Method::POST, "/customers", json!({ "customer": fields }), "customer")
            .await
    }

    async fn customer_update(&self, id: &str, fields: Value) -> Result<BtResult<BtCustomer>> {
        self.mutate(
            Method::PUT,
            &format!("/customers/{}", id),
            json!({ "customer": fields }),
            "customer",
        )
        .await
    }

    async fn customer_find(&self, id: &str) -> Result<BtCustomer> {
        self.fetch(&format!("/customers/{}", id), "customer", "customer", id)
            .await
    }

    async fn vault_store(&self, fields: Value) -> Result<BtResult<BtCustomer>> {
        self.mutate(Method::POST, "/customers", json!({ "customer": fields }), "customer")
            .await
    }

    async fn payment_method_update(
        &self,
        token: &str,
        fields: Value,
    ) -> Result<BtResult<BtCreditCard>> {
        self.mutate(
            Method::PUT,
            &format!("/payment_methods/any/{}", token),
            json!({ "payment_method": fields }),
            "credit_card",
        )
        .await
    }

    async fn credit_card_find(&self, token: &str) -> Result<BtCreditCard> {
        self.fetch(
            &format!("/payment_methods/any/{}", token),
            "credit_card",
            "payment method",
            token,
        )
        .await
    }

    async fn transaction_sale(&self, fields: Value) -> Result<BtResult<BtTransaction>> {
        self.mutate(
            Method::POST,
            "/transactions",
            json!({ "transaction": fields }),
            "transaction",
        )
        .await
    }

    async fn transaction_find(&self, id: &str) -> Result<BtTransaction> {
        self.fetch(&format!("/transactions/{}", id), "transaction", "transaction", id)
            .await
    }

    async fn transaction_refund(
        &self,
        id: &str,
        fields: Value,
    ) -> Result<BtResult<BtTransaction>> {
        self.mutate(
            Method::POST,
            &format!("/transactions/{}/refund", id),
            json!({ "transaction": fields }),
            "transaction",
        )
        .await
    }

    async fn settle(&self, transaction_id: &str) -> Result<BtTransaction> {
        let result: BtResult<BtTransaction> = self
            .mutate(
                Method::PUT,
                &format!("/transactions/{}/settle", transaction_id),
                json!({}),
                "transaction",
            )
            .await?;
        match result.entity {
            Some(transaction) if result.success => Ok(transaction),
            _ => Err(AppError::gateway(result.message)),
        }
    }
}

// Response normalization

fn vault_response(result: BtResult<BtCustomer>) -> GatewayResponse {
    match result.entity {
        Some(customer) if result.success => {
            let mut response = GatewayResponse::ok(result.message, Some(customer.id.clone()))
                .with_param(PARAM_CUSTOMER_ID, customer.id.clone());
            if let Some(card) = customer.credit_cards.first() {
                response = response.with_param(PARAM_PAYMENT_METHOD_TOKEN, card.token.clone());
            }
            match serde_json::to_value(&customer) {
                Ok(raw) => response.with_param("braintree_customer", raw),
                Err(_) => response,
            }
        }
        _ => GatewayResponse::failed(result.message),
    }
}

fn card_response(card: BtCreditCard) -> GatewayResponse {
    let mut response = GatewayResponse::ok("OK", Some(card.token.clone()))
        .with_param(PARAM_PAYMENT_METHOD_TOKEN, card.token.clone())
        .with_param(PARAM_CUSTOMER_ID, card.customer_id.clone());
    if let Ok(raw) = serde_json::to_value(&card) {
        response = response.with_param("credit_card", raw);
    }
    response
}

fn transaction_response(result: BtResult<BtTransaction>) -> GatewayResponse {
    match result.entity {
        Some(transaction) if result.success => {
            let mut response =
                GatewayResponse::ok(result.message, Some(transaction.id.clone()))
                    .with_param("status", transaction.status.clone());
            if let Some(currency) = &transaction.currency_iso_code {
                response = response.with_param("currency", currency.clone());
            }
            match serde_json::to_value(&transaction) {
                Ok(raw) => response.with_param("braintree_transaction", raw),
                Err(_) => response,
            }
        }
        _ => GatewayResponse::failed(result.message),
    }
}

fn major_amount(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Braintree backend: the resource adapters over a native API client
pub struct BraintreeBackend<A: BraintreeApi = BraintreeHttp> {
    api: Arc<A>,
}

impl BraintreeBackend<BraintreeHttp> {
    pub fn new(config: &BraintreeConfig) -> Self {
        Self {
            api: Arc::new(BraintreeHttp::new(config)),
        }
    }
}

impl<A: BraintreeApi> BraintreeBackend<A> {
    pub fn with_api(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Merge email and billing address into the caller's option bag for
    /// vault calls
    fn vault_fields(&self, request: &CustomerRequest) -> Result<Map<String, Value>> {
        let mut extra = Map::new();
        if let Some(email) = &request.email {
            extra.insert("email".to_string(), Value::String(email.clone()));
        }
        if let Some(address) = &request.billing_address {
            extra.insert("billing_address".to_string(), serde_json::to_value(address)?);
        }
        Ok(merge_options(&request.options, &extra))
    }

    /// Vault a new card, optionally with customer-level fields merged in
    async fn create_card(
        &self,
        card: &CardDetails,
        fields: Map<String, Value>,
    ) -> Result<GatewayResponse> {
        let native_card = to_braintree_card(card)?;
        let mut fields = fields;
        fields.insert("credit_card".to_string(), native_card);
        let result = self.api.vault_store(Value::Object(fields)).await?;
        vault_response(result).into_success()
    }

    async fn fetch_card(&self, token: &str) -> Result<GatewayResponse> {
        let card = self.api.credit_card_find(token).await?;
        Ok(card_response(card))
    }
}

impl<A: BraintreeApi> PaymentBackend for BraintreeBackend<A> {
    fn name(&self) -> BackendName {
        BackendName::Braintree
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

// TODO: forward `description` once a custom field for it is provisioned in
// the Braintree control panel.
#[async_trait]
impl<A: BraintreeApi> CustomerOps for BraintreeBackend<A> {
    async fn create(&self, request: CustomerRequest) -> Result<Customer> {
        match &request.source {
            // Card details: vault the card (which creates the customer),
            // then retrieve the customer by the vault id it reports.
            Some(SourceInput::Card(card)) => {
                let fields = self.vault_fields(&request)?;
                let response = self.create_card(card, fields).await?;
                let customer_id = response.require_str(PARAM_CUSTOMER_ID)?.to_string();
                CustomerOps::retrieve(self, &customer_id).await
            }

            // Existing payment-method token: store it on a new customer.
            Some(SourceInput::Token(token)) => {
                let mut fields = self.vault_fields(&request)?;
                fields.insert(
                    "payment_method_token".to_string(),
                    Value::String(token.clone()),
                );
                let result = self.api.vault_store(Value::Object(fields)).await?;
                Customer::from_response(vault_response(result).into_success()?)
            }

            // Prior Source/Token: update its billing address, then the
            // customer's email. Strictly sequential; the email update is
            // never attempted when the payment-method update fails.
            Some(SourceInput::Prior(source)) => {
                let fields = match &request.billing_address {
                    Some(address) if !address.is_empty() => {
                        let mut address = serde_json::to_value(address)?;
                        address["options"] = json!({ "update_existing": true });
                        json!({ "billing_address": address })
                    }
                    _ => json!({}),
                };
                let result = self.api.payment_method_update(&source.id, fields).await?;
                if !result.success {
                    error!(
                        token = %source.id,
                        message = %result.message,
                        "Payment method update failed"
                    );
                    return Err(AppError::operation_failed(format!(
                        "Payment method update failed: {}",
                        result.message
                    )));
                }

                let customer_id = source.customer_id().ok_or_else(|| {
                    AppError::validation("Prior source carries no customer id")
                })?;
                let result = self
                    .api
                    .customer_update(customer_id, json!({ "email": request.email }))
                    .await?;
                Customer::from_response(vault_response(result).into_success()?)
            }

            None => {
                let mut fields = Map::new();
                if let Some(email) = &request.email {
                    fields.insert("email".to_string(), Value::String(email.clone()));
                }
                if let Some(address) = &request.billing_address {
                    fields.insert(
                        "billing_address".to_string(),
                        serde_json::to_value(address)?,
                    );
                }
                let result = self.api.customer_create(Value::Object(fields)).await?;
                Customer::from_response(vault_response(result).into_success()?)
            }
        }
    }

    async fn retrieve(&self, id: &str) -> Result<Customer> {
        let customer = self.api.customer_find(id).await?;
        Customer::from_response(vault_response(BtResult::ok(customer)))
    }
}

#[async_trait]
impl<A: BraintreeApi> SourceOps for BraintreeBackend<A> {
    async fn create(&self, request: SourceRequest) -> Result<Source> {
        validate_source_kind(&request.kind)?;

        let response = match (request.token, request.card) {
            (Some(TokenInput::Id(token)), _) => self.fetch_card(&token).await?,
            (Some(TokenInput::Card(card)), _) => self.create_card(&card, Map::new()).await?,
            (None, Some(card)) => self.create_card(&card, Map::new()).await?,
            (None, None) => {
                return Err(AppError::validation(
                    "Source creation requires either a token or card details",
                ))
            }
        };
        Source::from_response(response)
    }

    async fn retrieve(&self, id: &str) -> Result<Source> {
        Source::from_response(self.fetch_card(id).await?)
    }
}

#[async_trait]
impl<A: BraintreeApi> TokenOps for BraintreeBackend<A> {
    async fn create(&self, card: CardDetails) -> Result<Token> {
        // The vault token assigned to the stored card is the id.
        let response = self.create_card(&card, Map::new()).await?;
        Token::from_response(response)
    }

    async fn retrieve(&self, id: &str) -> Result<Token> {
        SourceOps::retrieve(self, id).await
    }
}

#[async_trait]
impl<A: BraintreeApi> ChargeOps for BraintreeBackend<A> {
    async fn create(&self, request: ChargeRequest) -> Result<Charge> {
        let mut fields = Map::new();
        fields.insert(
            "amount".to_string(),
            Value::String(major_amount(request.amount).to_string()),
        );
        if !request.currency.is_empty() {
            fields.insert(
                "currency_iso_code".to_string(),
                Value::String(request.currency.to_ascii_uppercase()),
            );
        }

        match request.source {
            SourceInput::Card(card) => {
                fields.insert("credit_card".to_string(), to_braintree_card(&card)?);
            }
            SourceInput::Token(token) => {
                fields.insert("payment_method_token".to_string(), Value::String(token));
            }
            SourceInput::Prior(source) => {
                fields.insert(
                    "payment_method_token".to_string(),
                    Value::String(source.id),
                );
            }
        }

        // Authorization-only holds the funds; a purchase submits for
        // settlement in the same call.
        if !request.auth_only {
            fields.insert(
                "options".to_string(),
                json!({ "submit_for_settlement": true }),
            );
        }

        info!(
            backend = "braintree",
            amount = request.amount,
            auth_only = request.auth_only,
            "Creating charge"
        );
        let result = self.api.transaction_sale(Value::Object(fields)).await?;
        Charge::from_response(transaction_response(result).into_success()?)
    }

    async fn retrieve(&self, id: &str) -> Result<Charge> {
        let transaction = self.api.transaction_find(id).await?;

        // Braintree reports major-unit amounts; canonical amounts are
        // integer minor units.
        let minor = (transaction.amount * Decimal::from(100))
            .to_i64()
            .ok_or_else(|| {
                AppError::gateway(format!(
                    "Transaction amount {} is not representable in minor units",
                    transaction.amount
                ))
            })?;

        let response = transaction_response(BtResult::ok(transaction))
            .with_param(PARAM_AMOUNT, minor)
            // The native layer pre-populates a verification message from the
            // original sale; it is stale on lookups.
            .with_param(PARAM_CVV_RESULT_MESSAGE, "");
        Charge::from_response(response)
    }
}

#[async_trait]
impl<A: BraintreeApi> RefundOps for BraintreeBackend<A> {
    async fn create(&self, charge: ChargeRef, amount: Option<i64>) -> Result<Refund> {
        let charge_id = charge.into_id();

        let mut fields = Map::new();
        if let Some(minor) = amount {
            fields.insert(
                "amount".to_string(),
                Value::String(major_amount(minor).to_string()),
            );
        }
        fields.insert(
            "options".to_string(),
            json!({ "force_full_refund_if_unsettled": true }),
        );

        let result = self
            .api
            .transaction_refund(&charge_id, Value::Object(fields))
            .await?;
        Refund::from_response(transaction_response(result).into_success()?)
    }

    async fn retrieve(&self, id: &str) -> Result<Refund> {
        let transaction = self.api.transaction_find(id).await?;
        Refund::from_response(transaction_response(BtResult::ok(transaction)))
    }
}

/// Raw administrative handle; sandbox-only settlement lives here rather
/// than on the uniform surface.
pub struct BraintreeAdmin<A: BraintreeApi = BraintreeHttp> {
    api: Arc<A>,
}

impl<A: BraintreeApi> BraintreeAdmin<A> {
    pub fn with_api(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: BraintreeApi> AdminOps for BraintreeAdmin<A> {
    async fn settle(&self, transaction_id: &str) -> Result<GatewayResponse> {
        let transaction = self.api.settle(transaction_id).await?;
        info!(
            transaction = %transaction.id,
            status = %transaction.status,
            "Forced settlement"
        );
        Ok(transaction_response(BtResult::ok(transaction)))
    }
}
