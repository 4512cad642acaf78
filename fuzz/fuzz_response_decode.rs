//! Fuzz target for the daemon response decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_response_decode
//!
//! Arbitrary bytes are treated as a complete response stream: status line,
//! headers, framing (Content-Length, chunked, read-to-close), and JSON body.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let _ = runtime.block_on(fqapi_core::codec::decode(data));
    let _ = fqapi_core::codec::decode_body(data);
});
