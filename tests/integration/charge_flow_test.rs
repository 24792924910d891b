// Charge and refund adapter flows: authorize vs purchase, minor-unit
// amount scaling on retrieval, refunds against unsettled charges, and the
// sandbox settlement escape hatch.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;

use helpers::fake_braintree::FakeBraintree;
use helpers::fake_stripe::FakeStripe;
use paygate::backends::braintree::{BraintreeAdmin, BraintreeBackend};
use paygate::backends::stripe::StripeBackend;
use paygate::{
    AdminOps, AppError, Charge, ChargeRef, ChargeRequest, PaymentBackend, SourceInput,
};

fn braintree() -> (Arc<FakeBraintree>, BraintreeBackend<FakeBraintree>) {
    let api = Arc::new(FakeBraintree::new());
    (api.clone(), BraintreeBackend::with_api(api))
}

fn charge_request(source: SourceInput, auth_only: bool) -> ChargeRequest {
    ChargeRequest {
        source,
        amount: 1000,
        currency: "usd".to_string(),
        auth_only,
        description: Some("Simple Charge Order".to_string()),
    }
}

async fn charge_with_card(backend: &dyn PaymentBackend, auth_only: bool) -> Charge {
    backend
        .charges()
        .create(charge_request(
            SourceInput::Card(helpers::visa()),
            auth_only,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_purchase_submits_for_settlement() {
    let (api, backend) = braintree();
    let charge = charge_with_card(&backend, false).await;

    assert_eq!(api.recorded_calls(), vec!["transaction_sale".to_string()]);
    assert_eq!(
        charge.attribute("status").unwrap(),
        "submitted_for_settlement"
    );
}

#[tokio::test]
async fn test_authorization_only_does_not_settle() {
    let (_api, backend) = braintree();
    let charge = charge_with_card(&backend, true).await;
    assert_eq!(charge.attribute("status").unwrap(), "authorized");
}

#[tokio::test]
async fn test_retrieve_scales_major_units_to_minor() {
    let (_api, backend) = braintree();

    // The fake stores the major-unit amount ("10.00") the way Braintree
    // reports it; the canonical amount comes back as integer minor units.
    let charge = charge_with_card(&backend, false).await;
    let fetched = backend.charges().retrieve(&charge.id).await.unwrap();

    assert_eq!(fetched.id, charge.id);
    assert_eq!(fetched.attribute("amount").unwrap(), 1000);
}

#[tokio::test]
async fn test_retrieve_clears_the_stale_verification_message() {
    let (_api, backend) = braintree();
    let charge = charge_with_card(&backend, false).await;
    let fetched = backend.charges().retrieve(&charge.id).await.unwrap();
    assert_eq!(fetched.attribute("cvv_result_message").unwrap(), "");
}

#[tokio::test]
async fn test_charge_with_token_source() {
    let (api, backend) = braintree();
    let token = backend.tokens().create(helpers::visa()).await.unwrap();
    api.calls.lock().unwrap().clear();

    let charge = backend
        .charges()
        .create(charge_request(SourceInput::Token(token.id), false))
        .await
        .unwrap();

    assert_eq!(api.recorded_calls(), vec!["transaction_sale".to_string()]);
    let fetched = backend.charges().retrieve(&charge.id).await.unwrap();
    assert_eq!(fetched.id, charge.id);
}

#[tokio::test]
async fn test_refund_accepts_id_or_resource() {
    let (api, backend) = braintree();
    let charge = charge_with_card(&backend, false).await;
    api.calls.lock().unwrap().clear();

    let by_resource = backend
        .refunds()
        .create(ChargeRef::from(&charge), None)
        .await
        .unwrap();
    let by_id = backend
        .refunds()
        .create(ChargeRef::Id(charge.id.clone()), Some(250))
        .await
        .unwrap();

    assert_eq!(
        api.recorded_calls(),
        vec![
            "transaction_refund".to_string(),
            "transaction_refund".to_string()
        ]
    );
    assert_ne!(by_resource.id, by_id.id);

    let fetched = backend.refunds().retrieve(&by_resource.id).await.unwrap();
    assert_eq!(fetched.id, by_resource.id);
}

#[tokio::test]
async fn test_refund_of_unknown_charge_is_not_found() {
    let (_api, backend) = braintree();
    let err = backend
        .refunds()
        .create(ChargeRef::Id("txn-missing".to_string()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_settlement_escape_hatch() {
    let api = Arc::new(FakeBraintree::new());
    let backend = BraintreeBackend::with_api(api.clone());
    let admin = BraintreeAdmin::with_api(api.clone());

    let charge = charge_with_card(&backend, false).await;
    let settled = admin.settle(&charge.id).await.unwrap();
    assert_eq!(settled.param("status").unwrap(), "settled");

    // Refunds still force a full refund when unsettled; after settlement
    // the normal path applies. Either way the charge is refundable.
    backend
        .refunds()
        .create(ChargeRef::Id(charge.id), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stripe_amounts_are_already_minor_units() {
    let api = Arc::new(FakeStripe::new());
    let backend = StripeBackend::with_api(api.clone());

    let charge = charge_with_card(&backend, false).await;
    let fetched = backend.charges().retrieve(&charge.id).await.unwrap();

    assert_eq!(fetched.id, charge.id);
    assert_eq!(fetched.attribute("amount").unwrap(), 1000);
    // Raw card details go straight onto the charge call, no tokenize step.
    assert_eq!(
        api.recorded_calls(),
        vec!["charge_create".to_string(), "charge_retrieve".to_string()]
    );
}

#[tokio::test]
async fn test_stripe_full_refund_round_trip() {
    let api = Arc::new(FakeStripe::new());
    let backend = StripeBackend::with_api(api.clone());

    let charge = charge_with_card(&backend, false).await;
    let refund = backend
        .refunds()
        .create(ChargeRef::from(&charge), None)
        .await
        .unwrap();

    assert_eq!(refund.attributes["amount"], 1000);
    assert_eq!(refund.attributes["charge_id"], charge.id);

    let fetched = backend.refunds().retrieve(&refund.id).await.unwrap();
    assert_eq!(fetched.id, refund.id);
}
