//! Fuzz target for log position text parsing.
//!
//! Parsing must never panic, and anything that parses must format back to
//! a string that parses to the same position.

#![no_main]

use cdc_consumer::LogPosition;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(position) = data.parse::<LogPosition>() {
        let text = position.to_string();
        assert_eq!(text.parse::<LogPosition>(), Ok(position));
    }
});
