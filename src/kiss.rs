//! KISS host-serial framing: the default way a TNC talks to a host
//! computer. (C8)
//!
//! Grounded on `kiss_serialCallback`/`kiss_messageCallback` in the
//! reference firmware, reworked from global-mutating callbacks into an
//! event-emitting parser: feeding [`KissParser::byte`] one host-serial byte
//! at a time unescapes `CMD_DATA` payload bytes straight into a sink and
//! returns a [`KissEvent`] whenever a command byte or a completed frame is
//! recognised.

use crate::fifo::ByteSink;

pub const FEND: u8 = 0xC0;
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

const CMD_UNKNOWN: u8 = 0xFE;
const CMD_DATA: u8 = 0x00;
const CMD_TXDELAY: u8 = 0x01;
const CMD_P: u8 = 0x02;
const CMD_SLOTTIME: u8 = 0x03;
const CMD_TXTAIL: u8 = 0x04;
const CMD_FULLDUPLEX: u8 = 0x05;
const CMD_SETHARDWARE: u8 = 0x06;
const CMD_READY: u8 = 0x0F;

/// One recognised KISS host-command, or a completed data frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KissEvent {
    /// A `CMD_DATA` frame just closed; the unescaped bytes were already
    /// pushed to the sink passed to `byte`.
    FrameComplete,
    /// `TXDELAY`, in units of 10 ms (as the reference firmware scales it).
    TxDelay(u8),
    /// p-persistence parameter, 0..=255.
    Persistence(u8),
    /// Slot time, in units of 10 ms.
    SlotTime(u8),
    /// TX tail, in units of 10 ms.
    TxTail(u8),
    FullDuplex(bool),
    /// Vendor-specific hardware command; payload bytes are not interpreted.
    SetHardware,
    /// Vendor Ready/flow-control extension (command nibble `0x0F`).
    Ready(bool),
}

/// Streaming KISS frame parser. One instance per host-serial link.
pub struct KissParser {
    in_frame: bool,
    command: u8,
    escape: bool,
}

impl KissParser {
    pub const fn new() -> Self {
        Self {
            in_frame: false,
            command: CMD_UNKNOWN,
            escape: false,
        }
    }

    /// Feed one byte from the host-serial link. `CMD_DATA` payload bytes
    /// are unescaped and pushed to `sink` as they arrive; an event is
    /// returned when a command byte selects a non-data command, or when a
    /// data frame closes.
    pub fn byte(&mut self, b: u8, sink: &mut impl ByteSink) -> Option<KissEvent> {
        if self.in_frame && b == FEND && self.command == CMD_DATA {
            self.in_frame = false;
            return Some(KissEvent::FrameComplete);
        }
        if b == FEND {
            self.in_frame = true;
            self.command = CMD_UNKNOWN;
            self.escape = false;
            return None;
        }
        if !self.in_frame {
            return None;
        }
        if self.command == CMD_UNKNOWN {
            // Strip the port nibble; a single-TNC link only has port 0.
            self.command = b & 0x0F;
            return None;
        }
        match self.command {
            CMD_DATA => {
                if b == FESC {
                    self.escape = true;
                } else {
                    let byte = if self.escape {
                        self.escape = false;
                        match b {
                            TFEND => FEND,
                            TFESC => FESC,
                            other => other,
                        }
                    } else {
                        b
                    };
                    sink.push(byte);
                }
                None
            }
            CMD_TXDELAY => Some(KissEvent::TxDelay(b)),
            CMD_P => Some(KissEvent::Persistence(b)),
            CMD_SLOTTIME => Some(KissEvent::SlotTime(b)),
            CMD_TXTAIL => Some(KissEvent::TxTail(b)),
            CMD_FULLDUPLEX => Some(KissEvent::FullDuplex(b != 0)),
            CMD_SETHARDWARE => Some(KissEvent::SetHardware),
            CMD_READY => Some(KissEvent::Ready(b != 0)),
            _ => None,
        }
    }
}

impl Default for KissParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a decoded AX.25 frame as a host-bound `CMD_DATA` KISS frame,
/// matching `kiss_messageCallback` (port 0, `FEND`/`FESC` escaping).
pub fn encode_data_frame(frame: &[u8], out: &mut impl ByteSink) -> bool {
    if !out.push(FEND) || !out.push(CMD_DATA) {
        return false;
    }
    for &b in frame {
        match b {
            FEND => {
                if !out.push(FESC) || !out.push(TFEND) {
                    return false;
                }
            }
            FESC => {
                if !out.push(FESC) || !out.push(TFESC) {
                    return false;
                }
            }
            other => {
                if !out.push(other) {
                    return false;
                }
            }
        }
    }
    out.push(FEND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::Fifo;

    #[test]
    fn data_frame_with_escapes_roundtrips() {
        let original = [0x01u8, FEND, 0x02, FESC, 0x03];
        let mut wire: Fifo<32> = Fifo::new();
        assert!(encode_data_frame(&original, &mut wire));

        let mut parser = KissParser::new();
        let mut decoded: Fifo<32> = Fifo::new();
        let mut completed = false;
        while let Some(b) = wire.pop() {
            if let Some(KissEvent::FrameComplete) = parser.byte(b, &mut decoded) {
                completed = true;
            }
        }
        assert!(completed);
        let mut out = [0u8; 8];
        let mut n = 0;
        while let Some(b) = decoded.pop() {
            out[n] = b;
            n += 1;
        }
        assert_eq!(&out[..n], &original);
    }

    #[test]
    fn txdelay_command_emits_event() {
        let mut parser = KissParser::new();
        let mut sink: Fifo<8> = Fifo::new();
        assert_eq!(parser.byte(FEND, &mut sink), None);
        assert_eq!(parser.byte(0x01, &mut sink), None); // command nibble: TXDELAY
        assert_eq!(parser.byte(25, &mut sink), Some(KissEvent::TxDelay(25)));
        assert_eq!(parser.byte(FEND, &mut sink), None);
    }

    #[test]
    fn ready_vendor_command_emits_event() {
        let mut parser = KissParser::new();
        let mut sink: Fifo<8> = Fifo::new();
        parser.byte(FEND, &mut sink);
        parser.byte(0x0F, &mut sink);
        assert_eq!(parser.byte(0x01, &mut sink), Some(KissEvent::Ready(true)));
        parser.byte(FEND, &mut sink);
    }

    #[test]
    fn command_nibble_strips_port() {
        let mut parser = KissParser::new();
        let mut sink: Fifo<8> = Fifo::new();
        parser.byte(FEND, &mut sink);
        // Port 1, command TXDELAY (0x1 in high nibble, 0x01 in low nibble)
        parser.byte(0x11, &mut sink);
        assert_eq!(parser.byte(7, &mut sink), Some(KissEvent::TxDelay(7)));
    }
}
