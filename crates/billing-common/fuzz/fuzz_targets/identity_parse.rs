//! Fuzz test for identity string parsing.
//!
//! Exercises `InvoiceId`/`CouponId::from_str` against arbitrary strings, including ones
//! that almost but don't quite match the `"prefix:<uuid>"` shape.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str::FromStr;
use billing_common::{CouponId, InvoiceId};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = InvoiceId::from_str(s);
        let _ = CouponId::from_str(s);
    }
});
