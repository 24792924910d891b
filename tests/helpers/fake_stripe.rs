use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use paygate::backends::stripe::{StCard, StCharge, StCustomer, StRefund, StToken, StripeApi};
use paygate::{AppError, Result};

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// In-memory Stripe API that records every native call it receives
#[derive(Default)]
pub struct FakeStripe {
    pub calls: Mutex<Vec<String>>,
    tokens: Mutex<HashMap<String, StToken>>,
    customers: Mutex<HashMap<String, StCustomer>>,
    charges: Mutex<HashMap<String, StCharge>>,
    refunds: Mutex<HashMap<String, StRefund>>,
    seq: AtomicUsize,

    /// Make the next source_update fail (processor rejection)
    pub fail_source_update: AtomicBool,
}

impl FakeStripe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Seed a token whose card is already attached to a customer
    pub fn seed_attached_token(&self, token_id: &str, customer_id: &str) {
        let token = StToken {
            id: token_id.to_string(),
            card: Some(StCard {
                id: self.next_id("card"),
                last4: None,
                brand: None,
                exp_month: None,
                exp_year: None,
                customer: Some(customer_id.to_string()),
            }),
            used: false,
        };
        self.tokens
            .lock()
            .unwrap()
            .insert(token_id.to_string(), token);
        let customer = StCustomer {
            id: customer_id.to_string(),
            email: None,
            default_source: Some(token_id.to_string()),
        };
        self.customers
            .lock()
            .unwrap()
            .insert(customer_id.to_string(), customer);
    }
}

#[async_trait]
impl StripeApi for FakeStripe {
    async fn token_create(&self, params: Vec<(String, String)>) -> Result<StToken> {
        self.record("token_create");
        let number = param(&params, "card[number]").unwrap_or_default();
        let token = StToken {
            id: self.next_id("tok"),
            card: Some(StCard {
                id: self.next_id("card"),
                last4: Some(number[number.len().saturating_sub(4)..].to_string()),
                brand: None,
                exp_month: param(&params, "card[exp_month]").and_then(|m| m.parse().ok()),
                exp_year: param(&params, "card[exp_year]").and_then(|y| y.parse().ok()),
                customer: None,
            }),
            used: false,
        };
        self.tokens
            .lock()
            .unwrap()
            .insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn token_retrieve(&self, id: &str) -> Result<StToken> {
        self.record("token_retrieve");
        self.tokens
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("token {}", id)))
    }

    async fn customer_create(&self, params: Vec<(String, String)>) -> Result<StCustomer> {
        self.record("customer_create");
        let customer = StCustomer {
            id: self.next_id("cus"),
            email: param(&params, "email").map(str::to_string),
            default_source: param(&params, "source").map(str::to_string),
        };
        self.customers
            .lock()
            .unwrap()
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn customer_update(&self, id: &str, params: Vec<(String, String)>) -> Result<StCustomer> {
        self.record("customer_update");
        let mut customers = self.customers.lock().unwrap();
        let customer = customers
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("customer {}", id)))?;
        if let Some(email) = param(&params, "email") {
            customer.email = Some(email.to_string());
        }
        Ok(customer.clone())
    }

    async fn customer_retrieve(&self, id: &str) -> Result<StCustomer> {
        self.record("customer_retrieve");
        self.customers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("customer {}", id)))
    }

    async fn source_update(&self, id: &str, _params: Vec<(String, String)>) -> Result<StCard> {
        self.record("source_update");
        if self.fail_source_update.load(Ordering::SeqCst) {
            return Err(AppError::gateway("The card was declined"));
        }
        let tokens = self.tokens.lock().unwrap();
        tokens
            .get(id)
            .and_then(|t| t.card.clone())
            .ok_or_else(|| AppError::not_found(format!("source {}", id)))
    }

    async fn charge_create(&self, params: Vec<(String, String)>) -> Result<StCharge> {
        self.record("charge_create");
        let charge = StCharge {
            id: self.next_id("ch"),
            amount: param(&params, "amount")
                .and_then(|a| a.parse().ok())
                .unwrap_or_default(),
            currency: param(&params, "currency").unwrap_or("usd").to_string(),
            status: "succeeded".to_string(),
            captured: param(&params, "capture") != Some("false"),
            created: Some(1_700_000_000),
        };
        self.charges
            .lock()
            .unwrap()
            .insert(charge.id.clone(), charge.clone());
        Ok(charge)
    }

    async fn charge_retrieve(&self, id: &str) -> Result<StCharge> {
        self.record("charge_retrieve");
        self.charges
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("charge {}", id)))
    }

    async fn refund_create(&self, params: Vec<(String, String)>) -> Result<StRefund> {
        self.record("refund_create");
        let charge_id = param(&params, "charge").unwrap_or_default().to_string();
        let original = self
            .charges
            .lock()
            .unwrap()
            .get(&charge_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("charge {}", charge_id)))?;
        let refund = StRefund {
            id: self.next_id("re"),
            amount: param(&params, "amount")
                .and_then(|a| a.parse().ok())
                .unwrap_or(original.amount),
            charge: charge_id,
            status: "succeeded".to_string(),
        };
        self.refunds
            .lock()
            .unwrap()
            .insert(refund.id.clone(), refund.clone());
        Ok(refund)
    }

    async fn refund_retrieve(&self, id: &str) -> Result<StRefund> {
        self.record("refund_retrieve");
        self.refunds
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("refund {}", id)))
    }
}
