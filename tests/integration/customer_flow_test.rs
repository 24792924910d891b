// Customer adapter flows: the four source dispatch branches, the strictly
// sequential multi-step update, and round-trip retrieval.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use helpers::fake_braintree::FakeBraintree;
use helpers::fake_stripe::FakeStripe;
use paygate::backends::braintree::BraintreeBackend;
use paygate::backends::stripe::StripeBackend;
use paygate::{
    AppError, BillingAddress, CustomerRequest, PaymentBackend, SourceInput,
};

fn braintree() -> (Arc<FakeBraintree>, BraintreeBackend<FakeBraintree>) {
    let api = Arc::new(FakeBraintree::new());
    (api.clone(), BraintreeBackend::with_api(api))
}

fn address() -> BillingAddress {
    BillingAddress {
        street_address: Some("1 Main St".to_string()),
        locality: Some("Oakland".to_string()),
        region: Some("CA".to_string()),
        postal_code: Some("94607".to_string()),
        country: Some("US".to_string()),
        ..BillingAddress::default()
    }
}

#[tokio::test]
async fn test_create_from_card_vaults_then_retrieves() {
    let (api, backend) = braintree();

    let customer = backend
        .customers()
        .create(CustomerRequest {
            email: Some("johnny@appleseed.com".to_string()),
            source: Some(SourceInput::Card(helpers::visa())),
            billing_address: Some(address()),
            ..CustomerRequest::default()
        })
        .await
        .unwrap();

    // Exactly two native calls: vault the card, then look the customer up
    // by the vault id the store call reported.
    assert_eq!(
        api.recorded_calls(),
        vec!["vault_store".to_string(), "customer_find".to_string()]
    );

    let fetched = backend.customers().retrieve(&customer.id).await.unwrap();
    assert_eq!(fetched.id, customer.id);
}

#[tokio::test]
async fn test_create_from_token_string_is_a_single_store_call() {
    let (api, backend) = braintree();

    let customer = backend
        .customers()
        .create(CustomerRequest {
            email: Some("johnny@appleseed.com".to_string()),
            source: Some(SourceInput::Token("existing-token".to_string())),
            ..CustomerRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(api.recorded_calls(), vec!["vault_store".to_string()]);
    assert_eq!(
        customer.attribute("payment_method_token").unwrap(),
        "existing-token"
    );
}

#[tokio::test]
async fn test_create_without_source_is_a_bare_customer_call() {
    let (api, backend) = braintree();

    let customer = backend
        .customers()
        .create(CustomerRequest {
            email: Some("bare@example.com".to_string()),
            ..CustomerRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(api.recorded_calls(), vec!["customer_create".to_string()]);
    assert_eq!(customer.attribute("customer_id").unwrap(), &customer.id);
}

#[tokio::test]
async fn test_create_from_prior_token_updates_method_then_customer() {
    let (api, backend) = braintree();

    let token = backend.tokens().create(helpers::visa()).await.unwrap();
    api.calls.lock().unwrap().clear();

    let customer = backend
        .customers()
        .create(CustomerRequest {
            email: Some("renamed@example.com".to_string()),
            source: Some(SourceInput::Prior(token)),
            billing_address: Some(address()),
            ..CustomerRequest::default()
        })
        .await
        .unwrap();

    // Strictly sequential: payment method first, then the customer email.
    assert_eq!(
        api.recorded_calls(),
        vec![
            "payment_method_update".to_string(),
            "customer_update".to_string()
        ]
    );
    assert_eq!(
        customer.attribute("braintree_customer").unwrap()["email"],
        "renamed@example.com"
    );
}

#[tokio::test]
async fn test_failed_method_update_aborts_before_the_customer_update() {
    let (api, backend) = braintree();

    let token = backend.tokens().create(helpers::visa()).await.unwrap();
    api.calls.lock().unwrap().clear();
    api.fail_payment_method_update.store(true, Ordering::SeqCst);

    let err = backend
        .customers()
        .create(CustomerRequest {
            email: Some("renamed@example.com".to_string()),
            source: Some(SourceInput::Prior(token)),
            billing_address: Some(address()),
            ..CustomerRequest::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::OperationFailed(_)));
    // No compensating rollback and no further steps: at most one call.
    assert_eq!(
        api.recorded_calls(),
        vec!["payment_method_update".to_string()]
    );
}

#[tokio::test]
async fn test_retrieve_missing_customer_is_not_found() {
    let (_api, backend) = braintree();
    let err = backend.customers().retrieve("cust-missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_stripe_create_from_card_tokenizes_first() {
    let api = Arc::new(FakeStripe::new());
    let backend = StripeBackend::with_api(api.clone());

    let customer = backend
        .customers()
        .create(CustomerRequest {
            email: Some("johnny@appleseed.com".to_string()),
            source: Some(SourceInput::Card(helpers::visa())),
            ..CustomerRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(
        api.recorded_calls(),
        vec!["token_create".to_string(), "customer_create".to_string()]
    );
    let fetched = backend.customers().retrieve(&customer.id).await.unwrap();
    assert_eq!(fetched.id, customer.id);
}

#[tokio::test]
async fn test_stripe_failed_source_update_aborts_the_sequence() {
    let api = Arc::new(FakeStripe::new());
    let backend = StripeBackend::with_api(api.clone());

    api.seed_attached_token("tok_prior", "cus_prior");
    let prior = backend.sources().retrieve("tok_prior").await.unwrap();
    api.calls.lock().unwrap().clear();
    api.fail_source_update.store(true, Ordering::SeqCst);

    let err = backend
        .customers()
        .create(CustomerRequest {
            email: Some("renamed@example.com".to_string()),
            source: Some(SourceInput::Prior(prior)),
            billing_address: Some(address()),
            ..CustomerRequest::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::OperationFailed(_)));
    assert_eq!(api.recorded_calls(), vec!["source_update".to_string()]);
}
