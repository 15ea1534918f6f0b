#![no_main]

use libfuzzer_sys::fuzz_target;
use turretctl_proto::{crc16_ccitt_false, decode, encode};

fuzz_target!(|data: &[u8]| {
    // Raw bytes: almost always rejected by the checksum.
    let _ = decode(data);

    // Resealed bytes reach the version, tag and payload checks.
    let mut sealed = data.to_vec();
    let crc = crc16_ccitt_false(&sealed);
    sealed.extend_from_slice(&crc.to_le_bytes());
    if let Ok(message) = decode(&sealed) {
        assert_eq!(encode(&message).as_ref(), sealed.as_slice());
    }
});
