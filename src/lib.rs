//! Bell-202 AFSK modem and AX.25/KISS TNC core for amateur packet radio.
//!
//! This crate is a `no_std` port of the signal processing and protocol
//! handling found in small-microcontroller packet TNC firmware (the
//! reference being a Bell-202-over-AVR implementation): a DDS-driven AFSK
//! modulator and delay-multiply demodulator (C3-C5), HDLC bit framing (C6),
//! AX.25 UI-frame encode/decode (C7), a KISS host-serial link (C8) and
//! p-persistent CSMA channel arbitration (C9), composed here into one
//! [`Modem`] type a host loop can drive sample-by-sample and byte-by-byte.
//!
//! Everything below [`Modem`] is independently usable; `Modem` just wires
//! the pieces together the way a TNC's main loop would.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod ax25;
pub mod config;
pub mod crc;
pub mod csma;
pub mod dds;
pub mod demod;
pub mod error;
pub mod fifo;
pub mod hdlc;
pub mod kiss;
pub mod modulate;
pub mod status;
#[cfg(feature = "textual")]
pub mod textual;

pub use ax25::{Address, AddressList, ParseError as Ax25ParseError, UiFrame};
pub use config::ModemConfig;
pub use error::{ConfigError, PersistError};
pub use kiss::KissEvent;
pub use status::Status;

use ax25::FrameParser;
use config::PersistConfig;
use csma::{Csma, CsmaOutcome};
use demod::Demodulator;
use fifo::{ByteSink, Fifo};
use kiss::KissParser;
use modulate::Modulator;

fn write_address_raw(addr: &Address, last: bool, repeated: bool, out: &mut [u8], pos: &mut usize) -> bool {
    if *pos + 7 > out.len() {
        return false;
    }
    for &c in &addr.call {
        out[*pos] = c << 1;
        *pos += 1;
    }
    out[*pos] = 0x60 | if repeated { 0x80 } else { 0 } | (addr.ssid << 1) | (last as u8);
    *pos += 1;
    true
}

/// Assemble destination + source + repeater addresses, control and PID
/// bytes and `info` into a raw (unescaped, uncrc'd) frame body, matching the
/// address-field layout `ax25_sendVia` builds before framing. Used to buffer
/// a locally-originated frame until CSMA clears it for transmission.
fn write_ui_body(addrs: &AddressList, info: &[u8], out: &mut [u8]) -> Option<usize> {
    let mut pos = 0;
    let reps = addrs.repeaters();
    let no_repeaters = reps.is_empty();
    if !write_address_raw(&addrs.dst, false, false, out, &mut pos) {
        return None;
    }
    if !write_address_raw(&addrs.src, no_repeaters, false, out, &mut pos) {
        return None;
    }
    for (i, rpt) in reps.iter().enumerate() {
        let last = i + 1 == reps.len();
        if !write_address_raw(rpt, last, addrs.repeater_repeated(i), out, &mut pos) {
            return None;
        }
    }
    if pos + 2 + info.len() > out.len() {
        return None;
    }
    out[pos] = ax25::CTRL_UI;
    pos += 1;
    out[pos] = ax25::PID_NO_LAYER3;
    pos += 1;
    out[pos..pos + info.len()].copy_from_slice(info);
    pos += info.len();
    Some(pos)
}

/// The complete modem + TNC stack for one radio link.
///
/// `RX_CAP`/`TX_CAP` size the sample-rate-context byte FIFOs between the
/// demodulator/modulator and the frame layer; `FRAME_CAP` sizes the AX.25
/// frame accumulation buffer; `INFO_CAP` bounds the info payload (and raw
/// frame body) a single [`Modem::queue_ui_frame`]/[`Modem::queue_raw_frame`]
/// call can hold pending CSMA clearance.
pub struct Modem<const RX_CAP: usize, const TX_CAP: usize, const FRAME_CAP: usize, const INFO_CAP: usize> {
    config: ModemConfig,
    local: AddressList,
    demod: Demodulator,
    modulator: Modulator,
    frame_parser: FrameParser<FRAME_CAP>,
    csma: Csma,
    kiss: KissParser,
    kiss_rx: Fifo<INFO_CAP>,
    rx_bytes: Fifo<RX_CAP>,
    tx_bytes: Fifo<TX_CAP>,
    pending: Option<([u8; INFO_CAP], usize)>,
    full_duplex: bool,
    status: Status,
}

impl<const RX_CAP: usize, const TX_CAP: usize, const FRAME_CAP: usize, const INFO_CAP: usize>
    Modem<RX_CAP, TX_CAP, FRAME_CAP, INFO_CAP>
{
    pub fn new(config: ModemConfig, local: AddressList) -> Result<Self, ConfigError> {
        config.validate()?;
        let samples_per_bit = config.samples_per_bit();
        Ok(Self {
            demod: Demodulator::new(samples_per_bit, config.phase_threshold_num, config.phase_threshold_den),
            modulator: Modulator::new(samples_per_bit, config.sample_rate, config.preamble_ms, config.tail_ms),
            frame_parser: FrameParser::new(),
            csma: Csma::new(config.persistence),
            kiss: KissParser::new(),
            kiss_rx: Fifo::new(),
            rx_bytes: Fifo::new(),
            tx_bytes: Fifo::new(),
            pending: None,
            full_duplex: false,
            status: Status::new(),
            config,
            local,
        })
    }

    /// Build a modem from a persisted configuration blob, falling back to
    /// [`ModemConfig::default`] (and setting [`Status::config_fallback`]) if
    /// the blob is absent, truncated or fails validation.
    pub fn from_persisted(bytes: &[u8], local: AddressList) -> Self {
        let (config, fell_back) = match PersistConfig::decode(bytes) {
            Ok(cfg) => (cfg, false),
            Err(_) => (ModemConfig::default(), true),
        };
        let mut modem = Self::new(config, local).expect("ModemConfig::default always validates");
        if fell_back {
            modem.status.set_config_fallback();
            log_warn!("persisted config rejected, falling back to defaults");
        }
        modem
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn local(&self) -> &AddressList {
        &self.local
    }

    pub fn set_local(&mut self, local: AddressList) {
        self.local = local;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Read and clear the sticky status flags.
    pub fn take_status(&mut self) -> Status {
        let s = self.status;
        self.status.clear();
        s
    }

    /// Whether the HDLC receiver is currently mid-frame (a transmitter
    /// should treat this as "channel busy" for CSMA purposes).
    pub fn is_receiving(&self) -> bool {
        self.demod.is_receiving()
    }

    pub fn is_transmitting(&self) -> bool {
        self.modulator.is_sending()
    }

    /// Number of flag bytes the next transmission's preamble will send,
    /// given the live `preamble_ms` — useful for verifying a KISS `TXDELAY`
    /// change actually lengthens the preamble before keying up.
    pub fn preamble_flag_bytes(&self) -> u16 {
        self.modulator.preamble_flag_bytes()
    }

    // --- receive path -----------------------------------------------------

    /// Process one signed 8-bit ADC sample. Destuffed HDLC bytes accumulate
    /// into the internal receive FIFO for [`Modem::poll_rx_frames`] /
    /// [`Modem::poll_rx_to_host`] to drain; an overrun flushes that FIFO and
    /// sets [`Status::rx_overrun`], matching `AFSK_adc_isr`'s overrun path.
    pub fn process_rx_sample(&mut self, sample: i8) {
        if !self.demod.sample(sample, &mut self.rx_bytes) {
            self.status.set_rx_overrun();
            self.rx_bytes.flush();
            log_warn!("rx fifo overrun, flushing");
        }
    }

    /// Drain any complete, CRC-valid frames, handing each parsed as a
    /// [`UiFrame`] (or the reason it didn't parse as UI) to `on_frame`.
    pub fn poll_rx_frames(&mut self, mut on_frame: impl FnMut(Result<UiFrame<'_>, Ax25ParseError>)) {
        let frame_parser = &mut self.frame_parser;
        let rx_bytes = &mut self.rx_bytes;
        ax25::pump_frames(frame_parser, rx_bytes, |frame| on_frame(ax25::parse_ui(frame)));
    }

    /// Drain any complete, CRC-valid frames straight to a KISS `CMD_DATA`
    /// host frame (FCS stripped), matching `kiss_messageCallback`. Forwards
    /// the raw frame body regardless of control/PID, since the host — not
    /// this TNC — owns the AX.25 stack on that side of the link.
    pub fn poll_rx_to_host(&mut self, host_out: &mut impl ByteSink) {
        let frame_parser = &mut self.frame_parser;
        let rx_bytes = &mut self.rx_bytes;
        ax25::pump_frames(frame_parser, rx_bytes, |frame| {
            let body_len = frame.len().saturating_sub(2);
            kiss::encode_data_frame(&frame[..body_len], host_out);
        });
    }

    // --- transmit path ------------------------------------------------

    /// Queue an info payload as a UI frame addressed via [`Modem::local`],
    /// pending CSMA clearance. Returns `false` if a frame is already
    /// pending or the assembled body would overflow `INFO_CAP`.
    pub fn queue_ui_frame(&mut self, info: &[u8]) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let mut body = [0u8; INFO_CAP];
        match write_ui_body(&self.local, info, &mut body) {
            Some(len) => {
                self.pending = Some((body, len));
                self.csma.request_send();
                true
            }
            None => false,
        }
    }

    /// Queue an already-assembled frame body (address field through info,
    /// no flags/FCS) for transmission, pending CSMA clearance — the normal
    /// path for a KISS `CMD_DATA` frame from the host, which supplies its
    /// own addressing. Returns `false` if a frame is already pending or
    /// `body` is longer than `INFO_CAP`.
    pub fn queue_raw_frame(&mut self, body: &[u8]) -> bool {
        if self.pending.is_some() || body.len() > INFO_CAP {
            return false;
        }
        let mut buf = [0u8; INFO_CAP];
        buf[..body.len()].copy_from_slice(body);
        self.pending = Some((buf, body.len()));
        self.csma.request_send();
        true
    }

    pub fn has_pending_tx(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop a pending transmit request without keying up.
    pub fn cancel_pending_tx(&mut self) {
        self.pending = None;
        self.csma.cancel();
    }

    /// Evaluate one CSMA slot tick. `channel_busy` should reflect
    /// [`Modem::is_receiving`]; ignored when full duplex is enabled. Returns
    /// `true` if a pending frame was just handed to the modulator.
    pub fn poll_csma(&mut self, channel_busy: bool, rand_byte: u8) -> bool {
        let busy = channel_busy && !self.full_duplex;
        match self.csma.poll_slot(busy, rand_byte) {
            CsmaOutcome::Wait => false,
            CsmaOutcome::Transmit => {
                if let Some((body, len)) = self.pending.take() {
                    if ax25::encode_raw_frame(&body[..len], &mut self.tx_bytes) {
                        self.modulator.notify_tx_activity();
                        log_debug!("keying up, {} body bytes", len);
                    }
                }
                true
            }
        }
    }

    /// Produce the next outgoing DAC sample, or `None` once the transmitter
    /// has finished its tail and should release the channel.
    pub fn next_tx_sample(&mut self) -> Option<u8> {
        self.modulator.next_sample(&mut self.tx_bytes)
    }

    // --- KISS host link -----------------------------------------------

    /// Feed one byte from the host-serial KISS link. `CMD_DATA` frames are
    /// queued for transmission automatically on completion; other commands
    /// are applied to the live configuration and also returned for the
    /// caller's own bookkeeping (e.g. persisting the change).
    pub fn feed_kiss_byte(&mut self, b: u8) -> Option<KissEvent> {
        let event = self.kiss.byte(b, &mut self.kiss_rx);
        match event {
            Some(KissEvent::FrameComplete) => {
                let mut buf = [0u8; INFO_CAP];
                let mut len = 0;
                while let Some(byte) = self.kiss_rx.pop() {
                    if len < INFO_CAP {
                        buf[len] = byte;
                        len += 1;
                    }
                }
                self.queue_raw_frame(&buf[..len]);
            }
            Some(other) => self.apply_kiss_event(other),
            None => {}
        }
        event
    }

    fn apply_kiss_event(&mut self, event: KissEvent) {
        match event {
            KissEvent::Persistence(p) => {
                // 0 is a legal, if pathological, p-value: spec §4.8/§4.9 define
                // the range as 0..=255, and a 0 roll simply never clears the
                // channel rather than being an error state.
                self.config.persistence = p;
                self.csma.set_persistence(p);
            }
            KissEvent::SlotTime(t) => self.config.slot_time_ms = t as u16 * 10,
            KissEvent::TxDelay(d) => {
                self.config.preamble_ms = d as u16 * 10;
                self.modulator.set_preamble_ms(self.config.preamble_ms, self.config.sample_rate);
            }
            KissEvent::TxTail(t) => {
                self.config.tail_ms = t as u16 * 10;
                self.modulator.set_tail_ms(self.config.tail_ms, self.config.sample_rate);
            }
            KissEvent::FullDuplex(on) => self.full_duplex = on,
            KissEvent::SetHardware | KissEvent::Ready(_) | KissEvent::FrameComplete => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestModem = Modem<256, 256, 330, 256>;

    fn local() -> AddressList {
        AddressList::new(Address::new("DEST", 0), Address::new("MYCALL", 1))
    }

    #[test]
    fn default_config_builds_a_modem() {
        assert!(TestModem::new(ModemConfig::default(), local()).is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = ModemConfig { sample_rate: 10000, ..Default::default() };
        match TestModem::new(bad, local()) {
            Err(e) => assert_eq!(e, ConfigError::SampleRateNotDivisible),
            Ok(_) => panic!("expected a ConfigError"),
        }
    }

    #[test]
    fn from_persisted_falls_back_on_garbage() {
        let modem = TestModem::from_persisted(&[0, 1, 2], local());
        assert!(modem.status().config_fallback());
    }

    #[test]
    fn queue_ui_frame_then_csma_clears_and_transmitter_drains() {
        let mut modem = TestModem::new(ModemConfig::default(), local()).unwrap();
        assert!(modem.queue_ui_frame(b"hello"));
        assert!(!modem.queue_ui_frame(b"again")); // one pending at a time

        assert!(modem.poll_csma(false, 0)); // max persistence (63) beats rand_byte=0
        assert!(modem.is_transmitting());

        let mut samples = 0;
        while modem.next_tx_sample().is_some() {
            samples += 1;
            assert!(samples < 1_000_000, "transmitter never drained");
        }
        assert!(!modem.is_transmitting());
    }

    #[test]
    fn busy_channel_defers_csma() {
        let mut modem = TestModem::new(ModemConfig::default(), local()).unwrap();
        modem.queue_ui_frame(b"x");
        assert!(!modem.poll_csma(true, 0));
        assert!(modem.has_pending_tx());
    }

    #[test]
    fn transmitted_frame_round_trips_back_through_the_receiver() {
        let mut modem = TestModem::new(ModemConfig::default(), local()).unwrap();
        modem.queue_ui_frame(b"round trip");
        modem.poll_csma(false, 0);

        // Run the modulator's DAC samples straight into this modem's own
        // demodulator, as if the signal looped back over the air.
        let mut samples = 0;
        while let Some(sample) = modem.next_tx_sample() {
            modem.process_rx_sample((sample as i16 - 128) as i8);
            samples += 1;
            assert!(samples < 1_000_000, "transmitter never drained");
        }

        let mut dst_call: Option<[u8; 6]> = None;
        let mut info_buf = [0u8; 64];
        let mut info_len = 0usize;
        modem.poll_rx_frames(|frame| {
            if let Ok(ui) = frame {
                dst_call = Some(ui.addrs.dst.call);
                info_len = ui.info.len().min(64);
                info_buf[..info_len].copy_from_slice(&ui.info[..info_len]);
            }
        });
        let dst_call = dst_call.expect("a UI frame should have been received");
        assert_eq!(&dst_call, b"DEST  ");
        assert_eq!(&info_buf[..info_len], b"round trip");
    }

    #[test]
    fn kiss_data_frame_from_host_is_queued_for_transmission() {
        let mut modem = TestModem::new(ModemConfig::default(), local()).unwrap();
        let mut wire: Fifo<64> = Fifo::new();
        // A host-assembled AX.25 body (addresses + ctrl + pid + info) carried as KISS CMD_DATA.
        let body = [0x01u8, 0x02, 0x03, ax25::CTRL_UI, ax25::PID_NO_LAYER3, b'h', b'i'];
        kiss::encode_data_frame(&body, &mut wire);

        while let Some(b) = wire.pop() {
            modem.feed_kiss_byte(b);
        }
        assert!(modem.has_pending_tx());
    }

    #[test]
    fn txdelay_command_updates_preamble_and_modulator_reload() {
        let mut modem = TestModem::new(ModemConfig::default(), local()).unwrap();
        let mut wire: Fifo<16> = Fifo::new();
        wire.push(kiss::FEND);
        wire.push(0x01); // TXDELAY
        wire.push(10); // 100 ms
        wire.push(kiss::FEND);
        let mut seen = None;
        while let Some(b) = wire.pop() {
            if let Some(event) = modem.feed_kiss_byte(b) {
                seen = Some(event);
            }
        }
        assert_eq!(seen, Some(KissEvent::TxDelay(10)));
        assert_eq!(modem.config().preamble_ms, 100);
    }
}
