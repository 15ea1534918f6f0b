#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use turretctl_frame::{decode_frame, wire_size, DEFAULT_MAX_FRAME_SIZE};

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);
    let mut consumed = 0;
    // Drain every complete frame; stop at the first error or partial frame.
    while let Ok(Some(body)) = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE) {
        assert!(body.len() <= DEFAULT_MAX_FRAME_SIZE);
        consumed += wire_size(body.len());
    }
    assert_eq!(consumed + buf.len(), data.len());
});
