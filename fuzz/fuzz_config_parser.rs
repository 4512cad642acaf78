//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text through `ClientConfig::parse()`, covering TOML
//! decoding, validation, and error-message key parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = fqapi_config::ClientConfig::parse(s) {
            // validated configs must yield a usable message table
            let _ = config.errors.parsed_messages().unwrap();
        }
    }
});
