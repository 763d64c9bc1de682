//! AX.25 UI-frame address encoding/decoding, framing and CRC validation. (C7)
//!
//! Two independent layers, matching the split between `ax25_sendVia`/
//! `ax25_sendCall` (encode) and `ax25_poll`/`ax25_decode` (decode) in the
//! reference firmware:
//! - [`encode_ui_frame`] serialises an [`AddressList`] + info payload into a
//!   FLAG-delimited, CRC-terminated, `ESC`-escaped byte stream pushed to a
//!   transmit sink.
//! - [`FrameParser`] consumes the already bit-destuffed, `ESC`-escaped byte
//!   stream the HDLC receiver produces, accumulates one frame at a time,
//!   and validates its trailing FCS against [`crc::MAGIC`] before handing
//!   the raw bytes to [`parse_ui`].
//!
//! The `ESC` byte here is the *same* escape convention the HDLC layer uses
//! bit-for-bit: a destuffed byte that happens to equal `FLAG`/`RESET`/`ESC`
//! is never ambiguous with a real control byte, because one layer always
//! precedes it with an `ESC` marker that the other strips.

use crate::crc;
use crate::fifo::{ByteSink, ByteSource};
use crate::hdlc::{ESC, FLAG, RESET};

pub const CTRL_UI: u8 = 0x03;
pub const PID_NO_LAYER3: u8 = 0xF0;

pub const MIN_FRAME_LEN: usize = 18;
pub const MAX_REPEATERS: usize = 8;

/// Default accumulation buffer size for [`FrameParser`], matching
/// `ModemConfig::default().max_frame_len`.
pub const DEFAULT_MAX_FRAME: usize = 330;

/// A single AX.25 station call sign and SSID.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    /// Space-padded, upper-case call sign, up to 6 characters.
    pub call: [u8; 6],
    pub ssid: u8,
}

impl Address {
    pub fn new(call: &str, ssid: u8) -> Self {
        let mut bytes = [b' '; 6];
        for (dst, src) in bytes.iter_mut().zip(call.as_bytes().iter().take(6)) {
            *dst = src.to_ascii_uppercase();
        }
        Self { call: bytes, ssid: ssid & 0x0F }
    }

    /// Call sign with trailing padding spaces stripped.
    pub fn call_str(&self) -> &str {
        let len = self.call.iter().rposition(|&c| c != b' ').map_or(0, |i| i + 1);
        core::str::from_utf8(&self.call[..len]).unwrap_or("")
    }

    fn encode_into(&self, last: bool, repeated: bool, crc_acc: &mut u16, out: &mut impl ByteSink) -> bool {
        for &c in &self.call {
            if !push_escaped(c << 1, crc_acc, out) {
                return false;
            }
        }
        let ssid_byte = 0x60 | if repeated { 0x80 } else { 0 } | (self.ssid << 1) | (last as u8);
        push_escaped(ssid_byte, crc_acc, out)
    }

    fn decode_from(bytes: &[u8; 7]) -> (Self, bool, bool) {
        let mut call = [0u8; 6];
        for (dst, &src) in call.iter_mut().zip(bytes[..6].iter()) {
            *dst = src >> 1;
        }
        let ssid_byte = bytes[6];
        let addr = Self { call, ssid: (ssid_byte >> 1) & 0x0F };
        let last = ssid_byte & 0x01 != 0;
        let repeated = ssid_byte & 0x80 != 0;
        (addr, last, repeated)
    }
}

/// Destination, source and up to [`MAX_REPEATERS`] digipeater addresses.
#[derive(Clone, Copy, Debug)]
pub struct AddressList {
    pub dst: Address,
    pub src: Address,
    repeaters: [Address; MAX_REPEATERS],
    repeated: [bool; MAX_REPEATERS],
    repeater_count: usize,
}

impl AddressList {
    pub fn new(dst: Address, src: Address) -> Self {
        Self {
            dst,
            src,
            repeaters: [Address { call: [b' '; 6], ssid: 0 }; MAX_REPEATERS],
            repeated: [false; MAX_REPEATERS],
            repeater_count: 0,
        }
    }

    /// Append a digipeater address. Returns `false` (no-op) if already at `MAX_REPEATERS`.
    pub fn push_repeater(&mut self, addr: Address, repeated: bool) -> bool {
        if self.repeater_count >= MAX_REPEATERS {
            return false;
        }
        self.repeaters[self.repeater_count] = addr;
        self.repeated[self.repeater_count] = repeated;
        self.repeater_count += 1;
        true
    }

    pub fn repeaters(&self) -> &[Address] {
        &self.repeaters[..self.repeater_count]
    }

    pub fn repeater_repeated(&self, i: usize) -> bool {
        self.repeated[i]
    }

    fn encode_into(&self, crc_acc: &mut u16, out: &mut impl ByteSink) -> bool {
        let no_repeaters = self.repeater_count == 0;
        if !self.dst.encode_into(false, false, crc_acc, out) {
            return false;
        }
        if !self.src.encode_into(no_repeaters, false, crc_acc, out) {
            return false;
        }
        for i in 0..self.repeater_count {
            let last = i + 1 == self.repeater_count;
            if !self.repeaters[i].encode_into(last, self.repeated[i], crc_acc, out) {
                return false;
            }
        }
        true
    }
}

fn push_escaped(byte: u8, crc_acc: &mut u16, out: &mut impl ByteSink) -> bool {
    if matches!(byte, FLAG | RESET | ESC) && !out.push(ESC) {
        return false;
    }
    *crc_acc = crc::update(*crc_acc, byte);
    out.push(byte)
}

/// Encode a complete UI frame (address field + control + PID + info + FCS,
/// delimited by literal, unescaped FLAG bytes) to a transmit sink.
pub fn encode_ui_frame(addrs: &AddressList, info: &[u8], out: &mut impl ByteSink) -> bool {
    if !out.push(FLAG) {
        return false;
    }
    let mut crc_acc = crc::INIT;
    if !addrs.encode_into(&mut crc_acc, out) {
        return false;
    }
    if !push_escaped(CTRL_UI, &mut crc_acc, out) {
        return false;
    }
    if !push_escaped(PID_NO_LAYER3, &mut crc_acc, out) {
        return false;
    }
    for &b in info {
        if !push_escaped(b, &mut crc_acc, out) {
            return false;
        }
    }
    let fcs = crc::fcs_bytes(crc_acc);
    if !push_escaped(fcs[0], &mut crc_acc, out) || !push_escaped(fcs[1], &mut crc_acc, out) {
        return false;
    }
    out.push(FLAG)
}

/// Frame an already-assembled frame body (address field + control + PID +
/// info, exactly as a host KISS client hands it over) with flags, escaping
/// and a freshly computed FCS — matching `ax25_sendRaw`. Unlike
/// [`encode_ui_frame`], this does not build the address field itself; the
/// host is assumed to have already done so, which is the normal KISS
/// division of labour (the host owns the AX.25 stack, the TNC just frames
/// bytes onto the air).
pub fn encode_raw_frame(body: &[u8], out: &mut impl ByteSink) -> bool {
    if !out.push(FLAG) {
        return false;
    }
    let mut crc_acc = crc::INIT;
    for &b in body {
        if !push_escaped(b, &mut crc_acc, out) {
            return false;
        }
    }
    let fcs = crc::fcs_bytes(crc_acc);
    if !push_escaped(fcs[0], &mut crc_acc, out) || !push_escaped(fcs[1], &mut crc_acc, out) {
        return false;
    }
    out.push(FLAG)
}

/// A decoded UI frame, borrowing its info payload from the caller-provided buffer.
#[derive(Debug)]
pub struct UiFrame<'a> {
    pub addrs: AddressList,
    pub info: &'a [u8],
}

/// Reject reasons for a CRC-valid frame whose contents don't parse as UI.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    TooShort,
    TooManyRepeaters,
    NotUnnumberedInformation,
    UnsupportedProtocolId,
}

/// Parse a CRC-validated frame body (address field through info, *including*
/// its trailing 2 FCS bytes, exactly as accumulated by [`FrameParser`]) into
/// destination/source/repeater addresses and an info payload.
pub fn parse_ui(buf: &[u8]) -> Result<UiFrame<'_>, ParseError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(ParseError::TooShort);
    }
    let mut pos = 0;
    let take7 = |buf: &[u8], pos: &mut usize| -> Option<[u8; 7]> {
        if *pos + 7 > buf.len() {
            return None;
        }
        let mut out = [0u8; 7];
        out.copy_from_slice(&buf[*pos..*pos + 7]);
        *pos += 7;
        Some(out)
    };

    let dst_bytes = take7(buf, &mut pos).ok_or(ParseError::TooShort)?;
    let (dst, dst_last, _) = Address::decode_from(&dst_bytes);
    let src_bytes = take7(buf, &mut pos).ok_or(ParseError::TooShort)?;
    let (src, mut last, _) = Address::decode_from(&src_bytes);
    last = last || dst_last;

    let mut addrs = AddressList::new(dst, src);
    while !last {
        let rpt_bytes = take7(buf, &mut pos).ok_or(ParseError::TooShort)?;
        let (rpt, rpt_last, repeated) = Address::decode_from(&rpt_bytes);
        if !addrs.push_repeater(rpt, repeated) {
            return Err(ParseError::TooManyRepeaters);
        }
        last = rpt_last;
    }

    if pos + 2 + 2 > buf.len() {
        return Err(ParseError::TooShort);
    }
    let ctrl = buf[pos];
    pos += 1;
    if ctrl != CTRL_UI {
        return Err(ParseError::NotUnnumberedInformation);
    }
    let pid = buf[pos];
    pos += 1;
    if pid != PID_NO_LAYER3 {
        return Err(ParseError::UnsupportedProtocolId);
    }

    let info_end = buf.len() - 2; // strip trailing FCS
    let info = &buf[pos..info_end];
    Ok(UiFrame { addrs, info })
}

/// Byte-level frame accumulator sitting downstream of the HDLC bit
/// deframer: tracks FLAG/RESET/ESC at the byte level and validates the
/// running CRC against [`crc::MAGIC`] before exposing a completed frame.
pub struct FrameParser<const N: usize> {
    buf: [u8; N],
    len: usize,
    crc_acc: u16,
    sync: bool,
    escape: bool,
}

impl<const N: usize> FrameParser<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
            crc_acc: crc::INIT,
            sync: false,
            escape: false,
        }
    }

    /// Feed one byte from the receive stream. Returns `Some(&buf)` when a
    /// CRC-valid frame just completed (the slice is the frame body
    /// including its trailing 2 FCS bytes, ready for [`parse_ui`]).
    pub fn byte(&mut self, b: u8) -> Option<&[u8]> {
        if !self.escape && b == FLAG {
            let completed = self.len >= MIN_FRAME_LEN && self.crc_acc == crc::MAGIC;
            self.sync = true;
            self.crc_acc = crc::INIT;
            let frame_len = self.len;
            self.len = 0;
            return if completed { Some(&self.buf[..frame_len]) } else { None };
        }
        if !self.escape && b == RESET {
            self.sync = false;
            self.escape = false;
            return None;
        }
        if !self.escape && b == ESC {
            self.escape = true;
            return None;
        }
        self.escape = false;
        if self.sync {
            if self.len < N {
                self.buf[self.len] = b;
                self.len += 1;
                self.crc_acc = crc::update(self.crc_acc, b);
            } else {
                self.sync = false;
            }
        }
        None
    }
}

impl<const N: usize> Default for FrameParser<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub type DefaultFrameParser = FrameParser<DEFAULT_MAX_FRAME>;

/// Feed a [`FrameParser`] from a byte source (typically the receive FIFO
/// the HDLC layer has been pushing into) until it is drained.
pub fn pump_frames<const N: usize>(
    parser: &mut FrameParser<N>,
    source: &mut impl ByteSource,
    mut on_frame: impl FnMut(&[u8]),
) {
    while let Some(b) = source.pop() {
        if let Some(frame) = parser.byte(b) {
            on_frame(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::Fifo;

    fn feed_through_parser<const N: usize>(bytes: &[u8], parser: &mut FrameParser<N>) -> Option<usize> {
        let mut result = None;
        for &b in bytes {
            if let Some(frame) = parser.byte(b) {
                result = Some(frame.len());
            }
        }
        result
    }

    #[test]
    fn address_roundtrips_call_and_ssid() {
        let addr = Address::new("NOCALL", 5);
        assert_eq!(addr.call_str(), "NOCALL");
        assert_eq!(addr.ssid, 5);
    }

    #[test]
    fn short_call_pads_with_spaces() {
        let addr = Address::new("N0", 0);
        assert_eq!(addr.call_str(), "N0");
        assert_eq!(&addr.call, b"N0    ");
    }

    #[test]
    fn encode_then_parse_roundtrips_no_repeaters() {
        let dst = Address::new("DEST", 0);
        let src = Address::new("MYCALL", 1);
        let addrs = AddressList::new(dst, src);
        let info = b"hello packet radio";

        let mut tx: Fifo<128> = Fifo::new();
        assert!(encode_ui_frame(&addrs, info, &mut tx));

        let mut parser: FrameParser<128> = FrameParser::new();
        let mut frames = 0;
        while let Some(b) = tx.pop() {
            if let Some(frame) = parser.byte(b) {
                let ui = parse_ui(frame).unwrap();
                assert_eq!(ui.addrs.dst.call_str(), "DEST");
                assert_eq!(ui.addrs.src.call_str(), "MYCALL");
                assert_eq!(ui.addrs.src.ssid, 1);
                assert_eq!(ui.info, info);
                frames += 1;
            }
        }
        assert_eq!(frames, 1);
    }

    #[test]
    fn encode_then_parse_roundtrips_with_repeaters() {
        let dst = Address::new("DEST", 0);
        let src = Address::new("SRC", 0);
        let mut addrs = AddressList::new(dst, src);
        addrs.push_repeater(Address::new("DIGI1", 1), false);
        addrs.push_repeater(Address::new("DIGI2", 2), true);
        let info = b"";

        let mut tx: Fifo<128> = Fifo::new();
        assert!(encode_ui_frame(&addrs, info, &mut tx));

        let mut parser: FrameParser<128> = FrameParser::new();
        let mut found = false;
        while let Some(b) = tx.pop() {
            if let Some(frame) = parser.byte(b) {
                let ui = parse_ui(frame).unwrap();
                assert_eq!(ui.addrs.repeaters().len(), 2);
                assert_eq!(ui.addrs.repeaters()[0].call_str(), "DIGI1");
                assert!(!ui.addrs.repeater_repeated(0));
                assert!(ui.addrs.repeater_repeated(1));
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn corrupted_frame_fails_crc_and_is_dropped() {
        let dst = Address::new("DEST", 0);
        let src = Address::new("SRC", 0);
        let addrs = AddressList::new(dst, src);
        let mut tx: Fifo<128> = Fifo::new();
        assert!(encode_ui_frame(&addrs, b"data", &mut tx));

        let mut bytes = [0u8; 128];
        let mut n = 0;
        while let Some(b) = tx.pop() {
            bytes[n] = b;
            n += 1;
        }
        // Flip a bit in the middle of the info field.
        bytes[n / 2] ^= 0x01;

        let mut parser: FrameParser<128> = FrameParser::new();
        assert_eq!(feed_through_parser(&bytes[..n], &mut parser), None);
    }

    #[test]
    fn rejects_non_ui_control_byte() {
        // A syntactically valid address field but a non-UI control byte
        // should still close on CRC (if correct) yet fail to parse as UI.
        let mut crc_acc = crc::INIT;
        let mut tx: Fifo<128> = Fifo::new();
        tx.push(FLAG);
        let addrs = AddressList::new(Address::new("DEST", 0), Address::new("SRC", 0));
        addrs.encode_into(&mut crc_acc, &mut tx);
        push_escaped(0x00, &mut crc_acc, &mut tx); // bogus control byte
        push_escaped(PID_NO_LAYER3, &mut crc_acc, &mut tx);
        let fcs = crc::fcs_bytes(crc_acc);
        push_escaped(fcs[0], &mut crc_acc, &mut tx);
        push_escaped(fcs[1], &mut crc_acc, &mut tx);
        tx.push(FLAG);

        let mut parser: FrameParser<128> = FrameParser::new();
        let mut got = None;
        while let Some(b) = tx.pop() {
            if let Some(frame) = parser.byte(b) {
                got = Some(parse_ui(frame).err());
            }
        }
        assert_eq!(got, Some(Some(ParseError::NotUnnumberedInformation)));
    }
}
