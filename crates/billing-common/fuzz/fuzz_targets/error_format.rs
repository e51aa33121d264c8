//! Fuzz test for error message formatting.
//!
//! Tests that `BillingError`'s `Display`/`Debug` impls handle arbitrary hint strings and
//! details payloads without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use billing_common::BillingError;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let errors = [
            BillingError::validation("bad_input", s),
            BillingError::not_found("missing", s),
            BillingError::already_exists("dup", s),
            BillingError::invalid_operation("forbidden", s),
            BillingError::database(s),
            BillingError::internal(s),
        ];

        for err in &errors {
            let _ = format!("{}", err);
            let _ = format!("{:?}", err);
            let with_details = err.clone().with_details(serde_json::json!({ "raw": s }));
            let _ = format!("{}", with_details);
        }
    }
});
