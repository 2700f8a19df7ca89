//! Fuzz target for SFTP message decoding.
//!
//! This fuzzer tests the packet framer and message decoder against random
//! input to find:
//! - Panics
//! - Unbounded allocations from hostile length prefixes
//! - Round-trip mismatches
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run sftp_message -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use usftp_proto::sftp::SftpMessage;

fuzz_target!(|data: &[u8]| {
    // If decoding succeeds, re-encoding must decode to the same message
    if let Ok(message) = SftpMessage::from_bytes(data) {
        if let Ok(serialized) = message.to_bytes() {
            let reparsed =
                SftpMessage::from_bytes(&serialized).expect("Round-trip decoding should never fail");
            assert_eq!(message, reparsed);
        }
    }
});
