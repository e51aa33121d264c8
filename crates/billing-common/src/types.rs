//! Small value types shared across the billing core that aren't part of a single
//! component's public contract (money lives in `billing-core::money`, not here).

use serde::{Deserialize, Serialize};

/// Collection method for an invoice (GLOSSARY: "selects whether the payment provider
/// auto-pays or emails a payable invoice").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMethod {
    ChargeAutomatically,
    SendInvoice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_method_serde() {
        let json = serde_json::to_string(&CollectionMethod::ChargeAutomatically).unwrap();
        assert_eq!(json, "\"charge_automatically\"");
    }
}
