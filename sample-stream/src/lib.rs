//! # Sample Stream Core
//!
//! This crate provides the data path between a sampling interrupt and the
//! serial link of an analog acquisition device:
//!
//! - **Ring Buffers**: Lock-free SPSC buffers handing samples from the
//!   sampling interrupt (producer) to the main loop (consumer)
//! - **Packet Protocol**: Self-framing binary packets multiplexed over one byte stream
//! - **Packet Sequencer**: One shared wrapping counter stamped on every packet,
//!   letting the host detect lost packets
//!
//! ## Architecture
//!
//! ```text
//! ADC interrupt ──► RingBuffer (ch 0) ──┐
//!                                        ├──► DataPacket ──► serial sink
//! ADC interrupt ──► RingBuffer (ch 1) ──┘        │
//!                                                 │
//!         TimePacket / FirstSampleTimePacket ─────┤
//!         LatestUsbFrameTimePacket ───────────────┘
//!                     (all stamped by one PacketSequencer)
//! ```
//!
//! ## Real-Time Constraints
//!
//! The producer side runs in interrupt context, so nothing here blocks,
//! allocates or retries:
//! 1. Buffers and packet frames have compile-time capacities
//! 2. Buffer cursors are atomics with acquire/release ordering, no locks
//! 3. Full buffers and short sink writes are reported, never waited on
//! 4. Loss is detected by the host through sequence gaps, never recovered

#![cfg_attr(not(feature = "std"), no_std)]

// Must come first so the logging macros are visible to the other modules.
#[macro_use]
mod fmt;

pub mod buffer;
pub mod config;
pub mod protocol;
pub mod sequence;

// Re-export main types for convenience
pub use buffer::{BufferError, Consumer, Producer, RingBuffer};
pub use config::{ConfigError, StreamConfig};
pub use protocol::{
    DataPacket, FirstSampleTimePacket, Frame, LatestUsbFrameTimePacket, PacketError, PacketState,
    PacketType, TimeFields, TimePacket, WriteError, MAX_FRAME_LEN,
};
pub use sequence::PacketSequencer;

/// Library version for protocol compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One reading from one analog channel
pub type Sample = i16;

/// Number of analog channels carried by every data point
pub const CHANNEL_COUNT: usize = 2;

/// Storage capacity of a data packet, in points
pub const MAX_POINTS_PER_PACKET: usize = 10;

/// Points per packet used until the host configures otherwise
pub const DEFAULT_POINTS_PER_PACKET: u8 = 1;

/// Magic prefix the host scans for to find packet boundaries
pub const MAGIC: [u8; 2] = [b'P', 0xA0];
