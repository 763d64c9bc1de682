//! AFSK demodulator: frequency-discriminator mixer, Chebyshev-style IIR
//! smoothing filter, majority-vote bit slicer and a phase-locked sampling
//! window. (C4)
//!
//! Grounded directly on `AFSK_adc_isr` in the reference firmware: each
//! incoming sample is multiplied against a sample delayed by half a bit
//! period (a frequency discriminator — mark and space differ in how fast
//! the signal rotates, so this product's sign tracks the tone), the product
//! is smoothed by a two-pole IIR filter, and a majority vote over the last
//! three filtered polarities produces one "sampled bit" per ADC sample.
//! Those sampled bits are then corrected for phase against a software PLL
//! and decimated down to one "actual bit" per 1200-baud bit period, fed to
//! the HDLC receiver after NRZI decoding.

use crate::hdlc;
use crate::fifo::ByteSink;

/// Largest `samples_per_bit / 2` across the supported sample-rate range (up
/// to 19200 Hz / 1200 baud = 16 samples/bit).
pub const MAX_DELAY_LEN: usize = 8;

struct DelayLine {
    buf: [i8; MAX_DELAY_LEN],
    cap: usize,
    pos: usize,
}

impl DelayLine {
    fn new(cap: usize) -> Self {
        debug_assert!(cap > 0 && cap <= MAX_DELAY_LEN);
        Self {
            buf: [0; MAX_DELAY_LEN],
            cap,
            pos: 0,
        }
    }

    /// Push a new sample, returning the one it displaces (delayed by `cap` samples).
    fn push_pop(&mut self, sample: i8) -> i8 {
        let delayed = self.buf[self.pos];
        self.buf[self.pos] = sample;
        self.pos += 1;
        if self.pos == self.cap {
            self.pos = 0;
        }
        delayed
    }
}

const PHASE_BITS: u16 = 8;
/// Per-sample PLL phase nudge, exposed for verifying convergence tolerance.
pub const PHASE_INC: u16 = 1;

fn signal_transitioned(sampled_bits: u8) -> bool {
    ((sampled_bits ^ (sampled_bits >> 2)) & 0x03) == 0x03
}

fn transition_found(actual_bits: u8) -> bool {
    ((actual_bits ^ (actual_bits >> 1)) & 0x01) != 0
}

pub struct Demodulator {
    delay: DelayLine,
    iir_x: [i16; 2],
    iir_y: [i16; 2],
    sampled_bits: u8,
    current_phase: u16,
    phase_max: u16,
    phase_threshold: u16,
    actual_bits: u8,
    hdlc: hdlc::Receiver,
}

impl Demodulator {
    pub fn new(samples_per_bit: u32, phase_threshold_num: u8, phase_threshold_den: u8) -> Self {
        let samples_per_bit = samples_per_bit as usize;
        let delay_cap = samples_per_bit / 2;
        let phase_max = (samples_per_bit as u16) * PHASE_BITS;
        let phase_threshold =
            (phase_max as u32 * phase_threshold_num as u32 / phase_threshold_den as u32) as u16;
        Self {
            delay: DelayLine::new(delay_cap),
            iir_x: [0; 2],
            iir_y: [0; 2],
            sampled_bits: 0,
            current_phase: 0,
            phase_max,
            phase_threshold,
            actual_bits: 0,
            hdlc: hdlc::Receiver::new(),
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.hdlc.is_receiving()
    }

    /// Current PLL phase accumulator value, for diagnostics and testing PLL convergence.
    pub fn current_phase(&self) -> u16 {
        self.current_phase
    }

    /// The phase value the PLL nudges `current_phase` toward on each transition.
    pub fn phase_threshold(&self) -> u16 {
        self.phase_threshold
    }

    /// Process one signed 8-bit ADC sample. Returns `false` if the HDLC
    /// layer rejected a decoded byte (sink full); the caller should flush
    /// its receive buffer in that case, matching `AFSK_adc_isr`'s overrun path.
    pub fn sample(&mut self, current_sample: i8, sink: &mut impl ByteSink) -> bool {
        let delayed = self.delay.push_pop(current_sample);

        self.iir_x[0] = self.iir_x[1];
        self.iir_x[1] = ((delayed as i16) * (current_sample as i16)) >> 2;

        self.iir_y[0] = self.iir_y[1];
        self.iir_y[1] = self.iir_x[0] + self.iir_x[1] + (self.iir_y[0] >> 1);

        self.sampled_bits <<= 1;
        self.sampled_bits |= (self.iir_y[1] > 0) as u8;

        if signal_transitioned(self.sampled_bits) {
            if self.current_phase < self.phase_threshold {
                self.current_phase += PHASE_INC;
            } else {
                self.current_phase -= PHASE_INC;
            }
        }

        self.current_phase += PHASE_BITS;

        let mut ok = true;
        if self.current_phase >= self.phase_max {
            self.current_phase %= self.phase_max;

            self.actual_bits <<= 1;
            let bits = self.sampled_bits & 0x07;
            if matches!(bits, 0x07 | 0x06 | 0x05 | 0x03) {
                self.actual_bits |= 1;
            }

            let nrzi_bit = !transition_found(self.actual_bits);
            ok = self.hdlc.bit(nrzi_bit, sink);
        }
        ok
    }
}
