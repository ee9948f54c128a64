//! Framing must not depend on how the byte stream is chunked.

use bytes::Bytes;
use oscwire_slip::{wrap, SlipDecoder, END, ESC};
use proptest::prelude::*;

fn packet() -> impl Strategy<Value = Vec<u8>> {
    // Bias toward the bytes that need escaping.
    prop::collection::vec(
        prop_oneof![Just(END), Just(ESC), Just(0xDC), Just(0xDD), any::<u8>()],
        1..64,
    )
}

fn unwrap_chunks(chunks: &[&[u8]]) -> Vec<Bytes> {
    let mut decoder = SlipDecoder::new();
    let mut out = Vec::new();
    for chunk in chunks {
        decoder.feed_slice(chunk, |p| out.push(p));
    }
    out
}

proptest! {
    #[test]
    fn wrap_then_unwrap_is_identity(packets in prop::collection::vec(packet(), 1..6)) {
        let wire: Vec<u8> = packets.iter().flat_map(|p| wrap(p).to_vec()).collect();
        let got = unwrap_chunks(&[&wire]);
        prop_assert_eq!(got.len(), packets.len());
        for (g, p) in got.iter().zip(&packets) {
            prop_assert_eq!(g.as_ref(), p.as_slice());
        }
    }

    #[test]
    fn any_split_point_gives_same_packets(
        packets in prop::collection::vec(packet(), 1..4),
        split in any::<prop::sample::Index>(),
    ) {
        let wire: Vec<u8> = packets.iter().flat_map(|p| wrap(p).to_vec()).collect();
        let at = split.index(wire.len() + 1);
        let whole = unwrap_chunks(&[&wire]);
        let split = unwrap_chunks(&[&wire[..at], &wire[at..]]);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn byte_at_a_time_gives_same_packets(packets in prop::collection::vec(packet(), 1..4)) {
        let wire: Vec<u8> = packets.iter().flat_map(|p| wrap(p).to_vec()).collect();
        let chunks: Vec<&[u8]> = wire.chunks(1).collect();
        prop_assert_eq!(unwrap_chunks(&[&wire]), unwrap_chunks(&chunks));
    }

    #[test]
    fn escaped_payload_has_no_raw_end(p in packet()) {
        let framed = wrap(&p);
        let inner = &framed[1..framed.len() - 1];
        prop_assert!(!inner.contains(&END));
    }

    #[test]
    fn noise_never_panics(noise in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut decoder = SlipDecoder::with_max_frame_size(32);
        decoder.feed_slice(&noise, |p| assert!(p.len() <= 32));
    }
}
