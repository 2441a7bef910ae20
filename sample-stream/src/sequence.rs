//! # Packet Sequencer
//!
//! One wrapping 8-bit counter shared by every packet kind. Each packet write
//! stamps the current value and advances it, so the host sees consecutive
//! numbers across data and time packets alike and can spot a lost packet
//! as a gap.

use core::sync::atomic::{AtomicU8, Ordering};

/// Shared sequence counter for all outgoing packets
///
/// The counter is an atomic so packets may be written from both the
/// interrupt and the main loop without duplicating or skipping numbers.
///
/// ```rust
/// use sample_stream::PacketSequencer;
///
/// static SEQUENCER: PacketSequencer = PacketSequencer::new();
///
/// assert_eq!(SEQUENCER.next(), 0);
/// assert_eq!(SEQUENCER.next(), 1);
/// SEQUENCER.reset();
/// assert_eq!(SEQUENCER.next(), 0);
/// ```
#[derive(Debug, Default)]
pub struct PacketSequencer {
    count: AtomicU8,
}

impl PacketSequencer {
    /// Create a sequencer starting at zero
    pub const fn new() -> Self {
        Self {
            count: AtomicU8::new(0),
        }
    }

    /// Claim the current sequence number and advance (wraps at 256)
    #[inline]
    pub fn next(&self) -> u8 {
        self.count.fetch_add(1, Ordering::Relaxed)
    }

    /// The number the next packet will carry
    #[inline]
    pub fn peek(&self) -> u8 {
        self.count.load(Ordering::Relaxed)
    }

    /// Restart numbering at zero, e.g. when the link is re-opened
    pub fn reset(&self) {
        let previous = self.count.swap(0, Ordering::Relaxed);
        debug!("packet sequence reset (was {})", previous);
    }
}
