//! Lock-free single-producer/single-consumer byte ring buffer. (C1)
//!
//! No dynamic growth. A full buffer blocks the producer (the transmit side,
//! which busy-waits in host/task context) or is reported as an overrun (the
//! receive side, which must never block the sample-rate context).

use core::sync::atomic::{AtomicU16, Ordering};

/// Fixed-capacity ring buffer. `head` is owned by the consumer, `tail` by the
/// producer; each side only ever reads the other's index, never writes it,
/// so the two can live in different execution contexts (ISR vs. task)
/// without a lock, as long as `u16` loads/stores are atomic on the target.
pub struct Fifo<const N: usize> {
    buf: [u8; N],
    head: AtomicU16,
    tail: AtomicU16,
}

impl<const N: usize> Fifo<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: AtomicU16::new(0),
            tail: AtomicU16::new(0),
        }
    }

    fn advance(i: u16) -> u16 {
        if (i as usize) + 1 == N { 0 } else { i + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        Self::advance(self.tail.load(Ordering::Acquire)) == self.head.load(Ordering::Acquire)
    }

    /// Push one byte. Returns `false` (without pushing) if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = Self::advance(tail);
        if next == self.head.load(Ordering::Acquire) {
            return false;
        }
        self.buf[tail as usize] = byte;
        self.tail.store(next, Ordering::Release);
        true
    }

    /// Pop one byte, or `None` if empty.
    pub fn pop(&mut self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        let byte = self.buf[head as usize];
        self.head.store(Self::advance(head), Ordering::Release);
        Some(byte)
    }

    /// Drop all buffered bytes. Only safe to call from the consumer side
    /// (it only moves `head`, matching `fifo_flush` in the reference
    /// firmware, which is likewise consumer-only).
    pub fn flush(&mut self) {
        self.head.store(self.tail.load(Ordering::Acquire), Ordering::Release);
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire) as usize;
        let tail = self.tail.load(Ordering::Acquire) as usize;
        if tail >= head { tail - head } else { N - head + tail }
    }
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side: a decoded byte to enqueue.
pub trait ByteSink {
    /// Returns `false` if the byte could not be enqueued (buffer full).
    fn push(&mut self, byte: u8) -> bool;
}

impl<const N: usize> ByteSink for Fifo<N> {
    fn push(&mut self, byte: u8) -> bool {
        Fifo::push(self, byte)
    }
}

/// Transmit side: bytes queued up for the modulator to consume.
pub trait ByteSource {
    fn pop(&mut self) -> Option<u8>;
    fn is_empty(&self) -> bool;
}

impl<const N: usize> ByteSource for Fifo<N> {
    fn pop(&mut self) -> Option<u8> {
        Fifo::pop(self)
    }
    fn is_empty(&self) -> bool {
        Fifo::is_empty(self)
    }
}

/// Variant for environments where the index width is not natively atomic
/// (e.g. 8-bit MCUs with a 16-bit capacity). Identical API and semantics,
/// but the caller is responsible for mutual exclusion between producer and
/// consumer (mask interrupts, or only call from one context at a time).
pub struct LockedFifo<const N: usize> {
    buf: [u8; N],
    head: u16,
    tail: u16,
}

impl<const N: usize> LockedFifo<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
        }
    }

    fn advance(i: u16) -> u16 {
        if (i as usize) + 1 == N { 0 } else { i + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        Self::advance(self.tail) == self.head
    }

    pub fn push(&mut self, byte: u8) -> bool {
        let next = Self::advance(self.tail);
        if next == self.head {
            return false;
        }
        self.buf[self.tail as usize] = byte;
        self.tail = next;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.head as usize];
        self.head = Self::advance(self.head);
        Some(byte)
    }

    pub fn flush(&mut self) {
        self.head = self.tail;
    }
}

impl<const N: usize> Default for LockedFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
