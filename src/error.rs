//! Ambient error types. Plain enums, no `Error` trait impl — matching the
//! teacher's `status.rs`/`eratta.rs` convention of returning a small error
//! enum from fallible setup calls rather than pulling in `thiserror`.

/// Rejected `ModemConfig` field combination.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `sample_rate` isn't an integer multiple of the 1200 baud symbol rate,
    /// so no integral `samples_per_bit` exists.
    SampleRateNotDivisible,
    /// `sample_rate` is below the minimum needed to represent both tones.
    SampleRateTooLow,
    /// `sample_rate` exceeds the fixed-capacity delay line used by the demodulator.
    SampleRateTooHigh,
    /// `max_frame_len` is below the minimum frame length or implausibly large
    /// for the address+CRC overhead.
    FrameLenOutOfRange,
    /// `phase_threshold_den` is zero, which would divide by zero in the PLL.
    PhaseThresholdZeroDenominator,
}

/// Loading a persisted configuration blob that fails its magic-byte check.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// First byte didn't match `PersistConfig::PERSIST_MAGIC`; the blob is
    /// from an incompatible version or uninitialized storage.
    BadMagic,
    /// Blob length didn't match the expected encoded size.
    Truncated,
    /// Decoded fields didn't pass `ModemConfig::validate`.
    Invalid(ConfigError),
}
