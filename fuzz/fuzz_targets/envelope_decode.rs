//! Fuzz target for the CBOR documents
//!
//! Envelopes, bundles and device lists all arrive from untrusted peers.
//! Decoding must reject oversized and malformed input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use omemo_proto::{BundleDocument, DeviceListDocument, EncryptedEnvelope};

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = EncryptedEnvelope::from_bytes(data) {
        let bytes = envelope.to_bytes().expect("decoded envelope re-encodes");
        assert_eq!(EncryptedEnvelope::from_bytes(&bytes).ok(), Some(envelope));
    }

    let _ = BundleDocument::from_bytes(data);
    let _ = DeviceListDocument::from_bytes(data);
});
