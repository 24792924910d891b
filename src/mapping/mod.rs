pub mod card;
pub mod response;

pub use card::{to_braintree_card, to_stripe_card, CardDetails};
pub use response::GatewayResponse;

use serde_json::{Map, Value};

/// Deep-merge two string-keyed option bags, `extra` winning on conflicts.
/// Nested objects merge recursively; everything else is replaced wholesale.
pub fn merge_options(base: &Map<String, Value>, extra: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in extra {
        match (merged.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                *existing = merge_options(existing, incoming);
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}
