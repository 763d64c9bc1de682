//! Sticky status flags exposed to the host, modelled as a bitfield the way
//! the teacher's own `status.rs` tracks radio IRQ/command status: a `u8`
//! wrapper with named bit accessors rather than a struct of `bool`s, so it
//! stays copyable and fits in the same register the teacher used.

const RX_OVERRUN: u8 = 1 << 0;
const CONFIG_FALLBACK: u8 = 1 << 1;

/// Sticky condition flags. Set by the modem when the condition occurs,
/// cleared only by an explicit host read-and-clear (`Modem::take_status`).
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    pub const fn new() -> Self {
        Self(0)
    }

    /// The receive FIFO was full when a decoded byte arrived; that byte was dropped.
    pub fn rx_overrun(self) -> bool {
        self.0 & RX_OVERRUN != 0
    }

    /// A persisted configuration failed validation and the default was used instead.
    pub fn config_fallback(self) -> bool {
        self.0 & CONFIG_FALLBACK != 0
    }

    pub(crate) fn set_rx_overrun(&mut self) {
        self.0 |= RX_OVERRUN;
    }

    pub(crate) fn set_config_fallback(&mut self) {
        self.0 |= CONFIG_FALLBACK;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_clear(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        assert!(Status::new().is_clear());
    }

    #[test]
    fn flags_are_independent_and_sticky() {
        let mut s = Status::new();
        s.set_rx_overrun();
        assert!(s.rx_overrun());
        assert!(!s.config_fallback());
        s.set_config_fallback();
        assert!(s.rx_overrun());
        assert!(s.config_fallback());
    }

    #[test]
    fn clear_resets_all_flags() {
        let mut s = Status::new();
        s.set_rx_overrun();
        s.set_config_fallback();
        s.clear();
        assert!(s.is_clear());
    }
}
