//! MT general frame codec.
//!
//! ```text
//! +------+------+------+------+----------------+------+
//! | 0xFE | LEN  | CMD0 | CMD1 | PAYLOAD[LEN]    | FCS  |
//! +------+------+------+------+----------------+------+
//! ```
//! `FCS` is the XOR of every byte from `LEN` through the end of `PAYLOAD`
//! inclusive. The decoder is a byte-fed state machine; on an FCS mismatch the
//! partial frame is discarded and the decoder returns to `AwaitSof` without
//! speculatively reinterpreting any of the consumed bytes.

use thiserror::Error;

use super::header::CommandHeader;

pub const SOF: u8 = 0xfe;
pub const MAX_PAYLOAD: usize = 250;

/// A decoded (or about-to-be-encoded) general frame: header plus raw payload.
/// Parameter (de)serialization into a typed [`crate::mt::command`] happens one
/// layer up; this type only knows about framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralFrame {
    pub header: CommandHeader,
    pub payload: Vec<u8>,
}

impl GeneralFrame {
    pub fn new(header: CommandHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Serialize to the exact bytes that go on the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge(self.payload.len()));
        }

        let len = self.payload.len() as u8;
        let cmd0 = self.header.cmd0();
        let cmd1 = self.header.id();

        let mut fcs = len ^ cmd0 ^ cmd1;
        for &b in &self.payload {
            fcs ^= b;
        }

        let mut out = Vec::with_capacity(4 + self.payload.len() + 1);
        out.push(SOF);
        out.push(len);
        out.push(cmd0);
        out.push(cmd1);
        out.extend_from_slice(&self.payload);
        out.push(fcs);
        Ok(out)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the 250-byte MT frame limit")]
    PayloadTooLarge(usize),

    #[error("frame check sequence mismatch")]
    BadFcs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitSof,
    AwaitLen,
    AwaitHeader0,
    AwaitHeader1,
    AwaitPayload,
    AwaitFcs,
}

/// Byte-fed frame decoder. Feed it one byte at a time via [`Decoder::push`];
/// it reports a completed frame, a bad-FCS drop, or nothing yet.
pub struct Decoder {
    state: State,
    len: u8,
    cmd0: u8,
    cmd1: u8,
    payload: Vec<u8>,
    fcs_acc: u8,
}

/// What happened as a result of feeding one byte to the decoder.
pub enum DecodeEvent {
    /// No frame is complete yet.
    Pending,
    /// A frame decoded and passed its FCS check.
    Frame(GeneralFrame),
    /// A frame's FCS did not match; it was discarded.
    BadFcs,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: State::AwaitSof,
            len: 0,
            cmd0: 0,
            cmd1: 0,
            payload: Vec::new(),
            fcs_acc: 0,
        }
    }

    /// Feed one byte. Bytes seen before the first SOF are dropped silently,
    /// as are any not-yet-SOF bytes between frames.
    pub fn push(&mut self, byte: u8) -> DecodeEvent {
        match self.state {
            State::AwaitSof => {
                if byte == SOF {
                    self.state = State::AwaitLen;
                }
                DecodeEvent::Pending
            }
            State::AwaitLen => {
                self.len = byte;
                self.fcs_acc = byte;
                self.payload = Vec::with_capacity(byte as usize);
                self.state = State::AwaitHeader0;
                DecodeEvent::Pending
            }
            State::AwaitHeader0 => {
                self.cmd0 = byte;
                self.fcs_acc ^= byte;
                self.state = State::AwaitHeader1;
                DecodeEvent::Pending
            }
            State::AwaitHeader1 => {
                self.cmd1 = byte;
                self.fcs_acc ^= byte;
                self.state = if self.len == 0 {
                    State::AwaitFcs
                } else {
                    State::AwaitPayload
                };
                DecodeEvent::Pending
            }
            State::AwaitPayload => {
                self.payload.push(byte);
                self.fcs_acc ^= byte;
                if self.payload.len() == self.len as usize {
                    self.state = State::AwaitFcs;
                }
                DecodeEvent::Pending
            }
            State::AwaitFcs => {
                self.state = State::AwaitSof;
                if byte != self.fcs_acc {
                    return DecodeEvent::BadFcs;
                }
                let header =
                    CommandHeader(u16::from(self.cmd0) | (u16::from(self.cmd1) << 8));
                let frame = GeneralFrame::new(header, std::mem::take(&mut self.payload));
                DecodeEvent::Frame(frame)
            }
        }
    }

    /// Discard any partial frame in progress, as on `connection_lost`.
    pub fn reset(&mut self) {
        self.state = State::AwaitSof;
        self.payload.clear();
    }
}

/// Feed a whole byte slice through a fresh decoder, returning every frame
/// event produced in order. Convenience for tests and the transport's read
/// loop, which otherwise calls [`Decoder::push`] one byte at a time.
pub fn decode_all(decoder: &mut Decoder, bytes: &[u8]) -> Vec<DecodeEvent> {
    bytes.iter().map(|&b| decoder.push(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::header::{CommandType, Subsystem};

    fn ping_req_frame() -> GeneralFrame {
        GeneralFrame::new(
            CommandHeader::new(Subsystem::Sys, CommandType::Sreq, 0x01),
            vec![],
        )
    }

    #[test]
    fn ping_request_matches_known_wire_bytes() {
        // FE 00 21 01 20
        let bytes = ping_req_frame().to_bytes().unwrap();
        assert_eq!(bytes, vec![0xfe, 0x00, 0x21, 0x01, 0x20]);
    }

    #[test]
    fn ping_response_decodes_from_known_wire_bytes() {
        // FE 02 61 01 59 06 3D
        let bytes = [0xfeu8, 0x02, 0x61, 0x01, 0x59, 0x06, 0x3d];
        let mut decoder = Decoder::new();
        let mut frames = Vec::new();
        for &b in &bytes {
            if let DecodeEvent::Frame(f) = decoder.push(b) {
                frames.push(f);
            }
        }
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.header.0, 0x0161);
        assert_eq!(frame.payload, vec![0x59, 0x06]);
    }

    #[test]
    fn round_trip_for_every_payload_length() {
        for len in [0usize, 1, 10, 250] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let frame = GeneralFrame::new(
                CommandHeader::new(Subsystem::Af, CommandType::Areq, 0x05),
                payload,
            );
            let bytes = frame.to_bytes().unwrap();

            let mut decoder = Decoder::new();
            let mut decoded = None;
            for &b in &bytes {
                if let DecodeEvent::Frame(f) = decoder.push(b) {
                    decoded = Some(f);
                }
            }
            assert_eq!(decoded, Some(frame));
        }
    }

    #[test]
    fn payload_over_250_bytes_is_rejected() {
        let frame = GeneralFrame::new(
            CommandHeader::new(Subsystem::Sys, CommandType::Sreq, 0x01),
            vec![0u8; 251],
        );
        assert_eq!(frame.to_bytes(), Err(FrameError::PayloadTooLarge(251)));
    }

    #[test]
    fn flipping_any_single_bit_breaks_decode() {
        let frame = GeneralFrame::new(
            CommandHeader::new(Subsystem::Zdo, CommandType::Sreq, 0x02),
            vec![0x11, 0x22, 0x33],
        );
        let good = frame.to_bytes().unwrap();

        for bit_index in 0..(good.len() * 8) {
            let byte_index = bit_index / 8;
            let bit = bit_index % 8;
            // Flipping a bit in SOF just delays sync; every other field
            // flip must prevent that frame from validating.
            if byte_index == 0 {
                continue;
            }

            let mut corrupted = good.clone();
            corrupted[byte_index] ^= 1 << bit;

            let mut decoder = Decoder::new();
            let mut frames = Vec::new();
            let mut saw_bad_fcs = false;
            for &b in &corrupted {
                match decoder.push(b) {
                    DecodeEvent::Frame(f) => frames.push(f),
                    DecodeEvent::BadFcs => saw_bad_fcs = true,
                    DecodeEvent::Pending => {}
                }
            }

            assert!(
                frames.is_empty() || frames[0] != frame,
                "corrupting byte {byte_index} bit {bit} produced the original frame"
            );
            if frames.is_empty() && byte_index != 1 {
                // Corrupting the length byte itself can desync framing
                // entirely (the decoder waits forever for payload bytes
                // that never arrive) rather than surfacing a bad-FCS
                // event; every other field flip must produce one.
                assert!(saw_bad_fcs, "corrupting byte {byte_index} bit {bit} produced neither a frame nor a bad-FCS event");
            }
        }
    }

    #[test]
    fn bad_fcs_returns_decoder_to_await_sof_without_eating_next_frame() {
        let good_frame = ping_req_frame();
        let mut good_bytes = good_frame.to_bytes().unwrap();
        *good_bytes.last_mut().unwrap() ^= 0xff; // corrupt FCS

        let next_frame = GeneralFrame::new(
            CommandHeader::new(Subsystem::Sys, CommandType::Sreq, 0x02),
            vec![0xaa],
        );
        let next_bytes = next_frame.to_bytes().unwrap();

        let mut decoder = Decoder::new();
        let mut events = Vec::new();
        for &b in good_bytes.iter().chain(next_bytes.iter()) {
            events.push(decoder.push(b));
        }

        let bad_fcs_count = events
            .iter()
            .filter(|e| matches!(e, DecodeEvent::BadFcs))
            .count();
        assert_eq!(bad_fcs_count, 1);

        let frames: Vec<_> = events
            .into_iter()
            .filter_map(|e| match e {
                DecodeEvent::Frame(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![next_frame]);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut decoder = Decoder::new();
        // Feed SOF, LEN, CMD0 only - then reset, as on connection_lost.
        decoder.push(SOF);
        decoder.push(0x05);
        decoder.push(0x21);
        decoder.reset();

        let frame = ping_req_frame();
        let bytes = frame.to_bytes().unwrap();
        let mut decoded = None;
        for &b in &bytes {
            if let DecodeEvent::Frame(f) = decoder.push(b) {
                decoded = Some(f);
            }
        }
        assert_eq!(decoded, Some(frame));
    }
}
