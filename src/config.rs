//! Runtime-tunable modem parameters and their persisted-bytes encoding. (§6)

use crate::ax25::MIN_FRAME_LEN;
use crate::error::{ConfigError, PersistError};

/// Minimum sample rate able to represent the 2200 Hz space tone (Nyquist
/// with headroom for the demodulator's band-pass filters).
pub const MIN_SAMPLE_RATE: u32 = 4800;

/// Ceiling imposed by the demodulator's fixed-capacity delay line
/// (`demod::MAX_DELAY_LEN`); see `ModemConfig::validate`.
pub const MAX_SAMPLE_RATE: u32 = 19200;

const SYMBOL_RATE: u32 = 1200;

/// All host-tunable parameters for one `Modem` instance. `Default` gives the
/// values the reference firmware hardcodes; everything else is explicit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModemConfig {
    /// ADC/DAC sample rate in Hz. Must divide evenly into the 1200 baud symbol rate.
    pub sample_rate: u32,
    /// Flag preamble duration sent before a frame, in milliseconds.
    pub preamble_ms: u16,
    /// Trailing flag duration sent after a frame, in milliseconds.
    pub tail_ms: u16,
    /// p-persistent CSMA transmit probability, 0..=255 (out of 256). `0`
    /// means every slot roll is lost, so the channel never clears.
    pub persistence: u8,
    /// p-persistent CSMA slot duration, in milliseconds.
    pub slot_time_ms: u16,
    /// PLL bit-sync correction fraction numerator.
    pub phase_threshold_num: u8,
    /// PLL bit-sync correction fraction denominator (must be nonzero).
    pub phase_threshold_den: u8,
    /// Largest AX.25 frame (address + control + PID + info + FCS) accepted or sent.
    pub max_frame_len: u16,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: 9600,
            preamble_ms: 350,
            tail_ms: 50,
            persistence: 63,
            slot_time_ms: 100,
            phase_threshold_num: 1,
            phase_threshold_den: 2,
            max_frame_len: 330,
        }
    }
}

impl ModemConfig {
    /// Samples per 1200-baud bit period, given `sample_rate`. Only meaningful
    /// once `validate` has confirmed divisibility.
    pub fn samples_per_bit(&self) -> u32 {
        self.sample_rate / SYMBOL_RATE
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate < MIN_SAMPLE_RATE {
            return Err(ConfigError::SampleRateTooLow);
        }
        if self.sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::SampleRateTooHigh);
        }
        if self.sample_rate % SYMBOL_RATE != 0 {
            return Err(ConfigError::SampleRateNotDivisible);
        }
        if self.phase_threshold_den == 0 {
            return Err(ConfigError::PhaseThresholdZeroDenominator);
        }
        if self.max_frame_len < MIN_FRAME_LEN as u16 || self.max_frame_len > 4096 {
            return Err(ConfigError::FrameLenOutOfRange);
        }
        Ok(())
    }
}

/// Fixed-size wire encoding of `ModemConfig` for storage in flash/EEPROM,
/// guarded by a magic byte so a blank or foreign blob is rejected rather
/// than silently producing nonsense parameters.
pub struct PersistConfig;

impl PersistConfig {
    pub const PERSIST_MAGIC: u8 = 0xA5;
    pub const ENCODED_LEN: usize = 13;

    pub fn encode(cfg: &ModemConfig) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = Self::PERSIST_MAGIC;
        out[1..5].copy_from_slice(&cfg.sample_rate.to_le_bytes());
        out[5..7].copy_from_slice(&cfg.preamble_ms.to_le_bytes());
        out[7..9].copy_from_slice(&cfg.tail_ms.to_le_bytes());
        out[9] = cfg.persistence;
        out[10..12].copy_from_slice(&cfg.slot_time_ms.to_le_bytes());
        out[12] = cfg.phase_threshold_num;
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<ModemConfig, PersistError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(PersistError::Truncated);
        }
        if bytes[0] != Self::PERSIST_MAGIC {
            return Err(PersistError::BadMagic);
        }
        let cfg = ModemConfig {
            sample_rate: u32::from_le_bytes(bytes[1..5].try_into().unwrap()),
            preamble_ms: u16::from_le_bytes(bytes[5..7].try_into().unwrap()),
            tail_ms: u16::from_le_bytes(bytes[7..9].try_into().unwrap()),
            persistence: bytes[9],
            slot_time_ms: u16::from_le_bytes(bytes[10..12].try_into().unwrap()),
            phase_threshold_num: bytes[12],
            phase_threshold_den: ModemConfig::default().phase_threshold_den,
            max_frame_len: ModemConfig::default().max_frame_len,
        };
        cfg.validate().map_err(PersistError::Invalid)?;
        Ok(cfg)
    }
}
