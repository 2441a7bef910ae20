//! # Packet Definitions
//!
//! This module defines the packets written to the serial link. Every packet
//! is self-framing so the host can find packet boundaries in the raw byte
//! stream.
//!
//! ## Frame Format
//!
//! ```text
//! ┌─────────┬────────┬──────────┬──────────────────┐
//! │  Magic  │  Type  │ Sequence │     Payload      │
//! │ 2 bytes │ 1 byte │  1 byte  │  Variable size   │
//! └─────────┴────────┴──────────┴──────────────────┘
//! ```
//!
//! Multi-byte fields are sent in the device's native byte order with no
//! padding. There is no checksum: the shared sequence number is the only
//! loss signal.
//!
//! ## Packet Types
//!
//! - **`D` / `M`**: Sample data, one or several points of `CHANNEL_COUNT` samples
//! - **`N`**: Current tick time, answering a host time request
//! - **`F`**: Tick time of the first sample after streaming starts
//! - **`L`**: Tick time plus the latest USB start-of-frame number and time

use core::fmt;

use embedded_io::Write;
use heapless::Vec;

use crate::buffer::Consumer;
use crate::config::StreamConfig;
use crate::sequence::PacketSequencer;
use crate::{Sample, CHANNEL_COUNT, MAGIC, MAX_POINTS_PER_PACKET};

/// Magic, type tag and sequence byte
pub const HEADER_LEN: usize = 4;

/// Largest data payload a packet can carry
pub const MAX_DATA_PAYLOAD_LEN: usize =
    MAX_POINTS_PER_PACKET * CHANNEL_COUNT * core::mem::size_of::<Sample>();

/// Largest encoded packet of any type
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DATA_PAYLOAD_LEN;

/// Request byte plus tick
pub const TIME_PAYLOAD_LEN: usize = 1 + 4;

/// Tick only
pub const FIRST_SAMPLE_TIME_PAYLOAD_LEN: usize = 4;

/// Request byte, tick, frame number and frame time
pub const USB_FRAME_TIME_PAYLOAD_LEN: usize = TIME_PAYLOAD_LEN + 2 + 4;

const _: () = assert!(HEADER_LEN + TIME_PAYLOAD_LEN <= MAX_FRAME_LEN);
const _: () = assert!(HEADER_LEN + FIRST_SAMPLE_TIME_PAYLOAD_LEN <= MAX_FRAME_LEN);
const _: () = assert!(HEADER_LEN + USB_FRAME_TIME_PAYLOAD_LEN <= MAX_FRAME_LEN);

/// An encoded packet, ready for the sink
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// Packet type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Data packet holding a single point
    SingleSample = b'D',
    /// Data packet holding several points
    MultiSample = b'M',
    /// Time ("now") in reply to a host request
    Time = b'N',
    /// Time of the first sample
    FirstSampleTime = b'F',
    /// Time of the latest USB start of frame
    LatestUsbFrameTime = b'L',
}

impl PacketType {
    /// Payload length in bytes for this type
    ///
    /// `points_per_packet` only matters for the data types.
    pub const fn payload_len(self, points_per_packet: usize) -> usize {
        match self {
            PacketType::SingleSample | PacketType::MultiSample => {
                points_per_packet * CHANNEL_COUNT * core::mem::size_of::<Sample>()
            }
            PacketType::Time => TIME_PAYLOAD_LEN,
            PacketType::FirstSampleTime => FIRST_SAMPLE_TIME_PAYLOAD_LEN,
            PacketType::LatestUsbFrameTime => USB_FRAME_TIME_PAYLOAD_LEN,
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'D' => Ok(Self::SingleSample),
            b'M' => Ok(Self::MultiSample),
            b'N' => Ok(Self::Time),
            b'F' => Ok(Self::FirstSampleTime),
            b'L' => Ok(Self::LatestUsbFrameTime),
            _ => Err(()),
        }
    }
}

/// Errors from filling or encoding a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Every configured point already holds samples
    PacketFull,
    /// Channel index is not below `CHANNEL_COUNT`
    ChannelOutOfRange,
    /// Nothing has been added since the last reset
    Empty,
    /// Packet was already written; reset it before reuse
    AlreadyWritten,
    /// Encoded packet does not fit in a [`Frame`]
    FrameOverflow,
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::PacketFull => f.write_str("packet holds all configured points"),
            PacketError::ChannelOutOfRange => f.write_str("channel index out of range"),
            PacketError::Empty => f.write_str("packet has no samples"),
            PacketError::AlreadyWritten => f.write_str("packet already written"),
            PacketError::FrameOverflow => f.write_str("packet exceeds frame capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

/// Errors from writing a packet to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteError<E> {
    /// The packet could not be written in its current state
    Packet(PacketError),
    /// The sink failed
    Sink(E),
}

impl<E> From<PacketError> for WriteError<E> {
    fn from(e: PacketError) -> Self {
        WriteError::Packet(e)
    }
}

impl<E: fmt::Debug> fmt::Display for WriteError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Packet(e) => write!(f, "{}", e),
            WriteError::Sink(e) => write!(f, "sink error: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for WriteError<E> {}

fn push_bytes(frame: &mut Frame, bytes: &[u8]) -> Result<(), PacketError> {
    frame
        .extend_from_slice(bytes)
        .map_err(|_| PacketError::FrameOverflow)
}

fn start_frame(packet_type: PacketType, sequence: u8) -> Result<Frame, PacketError> {
    let mut frame = Frame::new();
    push_bytes(&mut frame, &MAGIC)?;
    push_bytes(&mut frame, &[packet_type.into(), sequence])?;
    Ok(frame)
}

fn write_frame<W: Write>(sink: &mut W, frame: &Frame) -> Result<usize, W::Error> {
    sink.write(frame)
}

async fn write_frame_async<W: embedded_io_async::Write>(
    sink: &mut W,
    frame: &Frame,
) -> Result<usize, W::Error> {
    sink.write(frame).await
}

/// Offset of the sequence byte in every frame
const SEQUENCE_OFFSET: usize = 3;

/// Claims the next sequence number for an already-built frame.
fn stamp(mut frame: Frame, sequencer: &PacketSequencer) -> Result<Frame, PacketError> {
    let byte = frame
        .get_mut(SEQUENCE_OFFSET)
        .ok_or(PacketError::FrameOverflow)?;
    *byte = sequencer.next();
    Ok(frame)
}

/// Keeps every index into the sample storage in bounds.
const fn clamp_points(points_per_packet: usize) -> usize {
    if points_per_packet > MAX_POINTS_PER_PACKET {
        MAX_POINTS_PER_PACKET
    } else {
        points_per_packet
    }
}

/// Lifecycle of a [`DataPacket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketState {
    /// Nothing added since construction or reset
    Empty,
    /// Some samples added, points still free
    Filling,
    /// Every configured point has been advanced past
    Ready,
    /// Sent; must be reset before reuse
    Written,
}

/// Packet of interleaved samples for all channels
///
/// Storage is sized for [`MAX_POINTS_PER_PACKET`] points but only the
/// configured number of points is filled and sent.
///
/// # Example
///
/// ```rust
/// use sample_stream::{DataPacket, PacketSequencer, StreamConfig};
///
/// let sequencer = PacketSequencer::new();
/// let mut packet = DataPacket::new(StreamConfig::default());
/// packet.add_sample(0, 100).unwrap();
/// packet.add_sample(1, -50).unwrap();
/// packet.advance_point();
///
/// let mut out: Vec<u8> = Vec::new();
/// let written = packet.write(&mut out, &sequencer).unwrap();
/// assert_eq!(written, 8);
/// assert_eq!(&out[..4], &[b'P', 0xA0, b'D', 0]);
/// ```
#[derive(Debug, Clone)]
pub struct DataPacket {
    samples: [[Sample; CHANNEL_COUNT]; MAX_POINTS_PER_PACKET],
    point: usize,
    points_per_packet: usize,
    state: PacketState,
}

impl DataPacket {
    /// Create an empty packet for the given configuration
    pub const fn new(config: StreamConfig) -> Self {
        Self {
            samples: [[0; CHANNEL_COUNT]; MAX_POINTS_PER_PACKET],
            point: 0,
            points_per_packet: clamp_points(config.points_per_packet()),
            state: PacketState::Empty,
        }
    }

    /// Store `value` for `channel` in the current point
    ///
    /// Writing the same channel twice before [`advance_point`](Self::advance_point)
    /// keeps the last value.
    pub fn add_sample(&mut self, channel: usize, value: Sample) -> Result<(), PacketError> {
        if self.state == PacketState::Written {
            return Err(PacketError::AlreadyWritten);
        }
        if self.point >= self.points_per_packet {
            return Err(PacketError::PacketFull);
        }
        let slot = self.samples[self.point]
            .get_mut(channel)
            .ok_or(PacketError::ChannelOutOfRange)?;
        *slot = value;
        self.state = PacketState::Filling;
        Ok(())
    }

    /// Move on to the next point
    pub fn advance_point(&mut self) {
        if self.state == PacketState::Written {
            return;
        }
        self.point = self.point.saturating_add(1);
        self.state = if self.point >= self.points_per_packet {
            PacketState::Ready
        } else {
            PacketState::Filling
        };
    }

    /// Pull whole points from per-channel buffers until the packet is
    /// full or a channel runs dry; returns the number of points added
    ///
    /// A point is only taken when every channel has a sample for it, so the
    /// channels stay aligned.
    pub fn fill_from<const N: usize>(
        &mut self,
        channels: &mut [Consumer<'_, Sample, N>; CHANNEL_COUNT],
    ) -> Result<usize, PacketError> {
        if self.state == PacketState::Written {
            return Err(PacketError::AlreadyWritten);
        }

        let mut filled = 0;
        while self.point < self.points_per_packet && channels.iter().all(|c| !c.is_empty()) {
            for (channel, consumer) in channels.iter_mut().enumerate() {
                if let Some(sample) = consumer.pop() {
                    self.add_sample(channel, sample)?;
                }
            }
            self.advance_point();
            filled += 1;
        }
        Ok(filled)
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> PacketState {
        self.state
    }

    /// Check if every configured point has been filled
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == PacketState::Ready
    }

    /// Index of the point being filled
    #[inline]
    pub fn point(&self) -> usize {
        self.point
    }

    /// Points sent per packet
    #[inline]
    pub fn points_per_packet(&self) -> usize {
        self.points_per_packet
    }

    /// Tag this packet is sent with
    pub fn packet_type(&self) -> PacketType {
        if self.points_per_packet == 1 {
            PacketType::SingleSample
        } else {
            PacketType::MultiSample
        }
    }

    /// Start over at point zero with cleared samples
    pub fn reset(&mut self) {
        self.samples = [[0; CHANNEL_COUNT]; MAX_POINTS_PER_PACKET];
        self.point = 0;
        self.state = PacketState::Empty;
    }

    /// Reset and adopt a new configuration
    pub fn reconfigure(&mut self, config: StreamConfig) {
        self.points_per_packet = clamp_points(config.points_per_packet());
        self.reset();
    }

    /// Encode with an explicit sequence byte
    ///
    /// Does not touch the packet state or any sequencer.
    pub fn frame(&self, sequence: u8) -> Result<Frame, PacketError> {
        match self.state {
            PacketState::Empty => return Err(PacketError::Empty),
            PacketState::Written => return Err(PacketError::AlreadyWritten),
            PacketState::Filling | PacketState::Ready => {}
        }

        let mut frame = start_frame(self.packet_type(), sequence)?;
        for point in &self.samples[..self.points_per_packet] {
            for sample in point {
                push_bytes(&mut frame, &sample.to_ne_bytes())?;
            }
        }
        Ok(frame)
    }

    /// Write the packet; returns the number of bytes the sink accepted
    ///
    /// Claims a sequence number even if the sink then fails, and marks the
    /// packet written.
    pub fn write<W: Write>(
        &mut self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = self.seal(sequencer)?;
        write_frame(sink, &frame).map_err(WriteError::Sink)
    }

    /// Async variant of [`write`](Self::write)
    pub async fn write_async<W: embedded_io_async::Write>(
        &mut self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = self.seal(sequencer)?;
        write_frame_async(sink, &frame).await.map_err(WriteError::Sink)
    }

    fn seal(&mut self, sequencer: &PacketSequencer) -> Result<Frame, PacketError> {
        // Validate before claiming so a rejected packet leaves no gap.
        if self.state == PacketState::Empty {
            return Err(PacketError::Empty);
        }
        if self.state == PacketState::Written {
            return Err(PacketError::AlreadyWritten);
        }
        let sequence = sequencer.next();
        let frame = self.frame(sequence)?;
        self.state = PacketState::Written;
        trace!("data packet {} with {} points", sequence, self.point);
        Ok(frame)
    }
}

impl Default for DataPacket {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

/// Request byte and tick shared by the time-reporting packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeFields {
    /// Echo of the host's request number
    pub request: u8,
    /// Device tick counter
    pub tick: u32,
}

impl TimeFields {
    fn encode(&self, frame: &mut Frame) -> Result<(), PacketError> {
        push_bytes(frame, &[self.request])?;
        push_bytes(frame, &self.tick.to_ne_bytes())
    }
}

/// Current tick time, sent in reply to a host time request (`N`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePacket {
    fields: TimeFields,
}

impl TimePacket {
    /// Create a reply to host request `request` at `tick`
    pub const fn new(tick: u32, request: u8) -> Self {
        Self {
            fields: TimeFields { request, tick },
        }
    }

    /// Request byte and tick carried by the packet
    pub fn fields(&self) -> TimeFields {
        self.fields
    }

    /// Encode with an explicit sequence byte
    pub fn frame(&self, sequence: u8) -> Result<Frame, PacketError> {
        let mut frame = start_frame(PacketType::Time, sequence)?;
        self.fields.encode(&mut frame)?;
        Ok(frame)
    }

    /// Write the packet; returns the number of bytes the sink accepted
    pub fn write<W: Write>(
        self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = stamp(self.frame(0)?, sequencer)?;
        write_frame(sink, &frame).map_err(WriteError::Sink)
    }

    /// Async variant of [`write`](Self::write)
    pub async fn write_async<W: embedded_io_async::Write>(
        self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = stamp(self.frame(0)?, sequencer)?;
        write_frame_async(sink, &frame).await.map_err(WriteError::Sink)
    }
}

/// Tick time of the first sample after streaming starts (`F`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstSampleTimePacket {
    tick: u32,
}

impl FirstSampleTimePacket {
    /// Create a packet for the first sample taken at `tick`
    pub const fn new(tick: u32) -> Self {
        Self { tick }
    }

    /// Tick of the first sample
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Encode with an explicit sequence byte
    pub fn frame(&self, sequence: u8) -> Result<Frame, PacketError> {
        let mut frame = start_frame(PacketType::FirstSampleTime, sequence)?;
        push_bytes(&mut frame, &self.tick.to_ne_bytes())?;
        Ok(frame)
    }

    /// Write the packet; returns the number of bytes the sink accepted
    pub fn write<W: Write>(
        self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = stamp(self.frame(0)?, sequencer)?;
        write_frame(sink, &frame).map_err(WriteError::Sink)
    }

    /// Async variant of [`write`](Self::write)
    pub async fn write_async<W: embedded_io_async::Write>(
        self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = stamp(self.frame(0)?, sequencer)?;
        write_frame_async(sink, &frame).await.map_err(WriteError::Sink)
    }
}

/// Tick time extended with the latest USB start-of-frame (`L`)
///
/// Carries the same request byte and tick as [`TimePacket`] followed by the
/// USB frame number and the tick at which that frame started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestUsbFrameTimePacket {
    time: TimeFields,
    frame_number: u16,
    frame_tick: u32,
}

impl LatestUsbFrameTimePacket {
    /// Create a reply to host request `request` at `tick`, reporting USB
    /// frame `frame_number` which started at `frame_tick`
    pub const fn new(tick: u32, request: u8, frame_number: u16, frame_tick: u32) -> Self {
        Self {
            time: TimeFields { request, tick },
            frame_number,
            frame_tick,
        }
    }

    /// Request byte and tick shared with [`TimePacket`]
    pub fn time(&self) -> TimeFields {
        self.time
    }

    /// USB start-of-frame number
    pub fn frame_number(&self) -> u16 {
        self.frame_number
    }

    /// Tick at which the USB frame started
    pub fn frame_tick(&self) -> u32 {
        self.frame_tick
    }

    /// Encode with an explicit sequence byte
    pub fn frame(&self, sequence: u8) -> Result<Frame, PacketError> {
        let mut frame = start_frame(PacketType::LatestUsbFrameTime, sequence)?;
        self.time.encode(&mut frame)?;
        push_bytes(&mut frame, &self.frame_number.to_ne_bytes())?;
        push_bytes(&mut frame, &self.frame_tick.to_ne_bytes())?;
        Ok(frame)
    }

    /// Write the packet; returns the number of bytes the sink accepted
    pub fn write<W: Write>(
        self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = stamp(self.frame(0)?, sequencer)?;
        write_frame(sink, &frame).map_err(WriteError::Sink)
    }

    /// Async variant of [`write`](Self::write)
    pub async fn write_async<W: embedded_io_async::Write>(
        self,
        sink: &mut W,
        sequencer: &PacketSequencer,
    ) -> Result<usize, WriteError<W::Error>> {
        let frame = stamp(self.frame(0)?, sequencer)?;
        write_frame_async(sink, &frame).await.map_err(WriteError::Sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(points: u8) -> StreamConfig {
        StreamConfig::new(points).unwrap()
    }

    #[test]
    fn test_single_point_packet() {
        let sequencer = PacketSequencer::new();
        let mut packet = DataPacket::new(config(1));
        packet.add_sample(0, 100).unwrap();
        packet.add_sample(1, -50).unwrap();

        let mut out: std::vec::Vec<u8> = std::vec::Vec::new();
        let written = packet.write(&mut out, &sequencer).unwrap();

        let mut expected = std::vec![b'P', 0xA0, b'D', 0];
        expected.extend_from_slice(&100i16.to_ne_bytes());
        expected.extend_from_slice(&(-50i16).to_ne_bytes());
        assert_eq!(written, 8);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_multi_point_payload_length() {
        let mut packet = DataPacket::new(config(5));
        for point in 0..5 {
            packet.add_sample(0, point).unwrap();
            packet.add_sample(1, -point).unwrap();
            packet.advance_point();
        }
        assert!(packet.is_ready());

        let frame = packet.frame(9).unwrap();
        assert_eq!(frame[2], b'M');
        assert_eq!(frame[3], 9);
        assert_eq!(frame.len(), HEADER_LEN + 5 * CHANNEL_COUNT * 2);
        assert_eq!(&frame[8..10], &1i16.to_ne_bytes());
        assert_eq!(&frame[10..12], &(-1i16).to_ne_bytes());
    }

    #[test]
    fn test_add_sample_overwrites_same_slot() {
        let mut packet = DataPacket::new(config(1));
        packet.add_sample(0, 1).unwrap();
        packet.add_sample(0, 2).unwrap();

        let frame = packet.frame(0).unwrap();
        assert_eq!(&frame[4..6], &2i16.to_ne_bytes());
    }

    #[test]
    fn test_add_sample_when_full() {
        let mut packet = DataPacket::new(config(2));
        packet.add_sample(0, 1).unwrap();
        packet.advance_point();
        packet.add_sample(0, 2).unwrap();
        packet.advance_point();

        assert_eq!(packet.add_sample(0, 3), Err(PacketError::PacketFull));
        let frame = packet.frame(0).unwrap();
        assert_eq!(&frame[4..6], &1i16.to_ne_bytes());
        assert_eq!(&frame[8..10], &2i16.to_ne_bytes());
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut packet = DataPacket::new(config(1));
        assert_eq!(
            packet.add_sample(CHANNEL_COUNT, 1),
            Err(PacketError::ChannelOutOfRange)
        );
        assert_eq!(packet.state(), PacketState::Empty);
    }

    #[test]
    fn test_state_transitions() {
        let sequencer = PacketSequencer::new();
        let mut packet = DataPacket::new(config(2));
        assert_eq!(packet.state(), PacketState::Empty);

        packet.add_sample(0, 1).unwrap();
        assert_eq!(packet.state(), PacketState::Filling);
        packet.advance_point();
        assert_eq!(packet.state(), PacketState::Filling);
        packet.advance_point();
        assert_eq!(packet.state(), PacketState::Ready);

        let mut out: std::vec::Vec<u8> = std::vec::Vec::new();
        packet.write(&mut out, &sequencer).unwrap();
        assert_eq!(packet.state(), PacketState::Written);
    }

    #[test]
    fn test_written_packet_needs_reset() {
        let sequencer = PacketSequencer::new();
        let mut packet = DataPacket::new(config(1));
        packet.add_sample(0, 1).unwrap();

        let mut out: std::vec::Vec<u8> = std::vec::Vec::new();
        packet.write(&mut out, &sequencer).unwrap();

        assert_eq!(
            packet.write(&mut out, &sequencer),
            Err(WriteError::Packet(PacketError::AlreadyWritten))
        );
        assert_eq!(packet.add_sample(0, 2), Err(PacketError::AlreadyWritten));
        // Rejected writes do not consume sequence numbers
        assert_eq!(sequencer.peek(), 1);

        packet.reset();
        packet.add_sample(0, 2).unwrap();
        out.clear();
        packet.write(&mut out, &sequencer).unwrap();
        assert_eq!(out[3], 1);
    }

    #[test]
    fn test_empty_packet_is_not_written() {
        let sequencer = PacketSequencer::new();
        let mut packet = DataPacket::default();
        let mut out: std::vec::Vec<u8> = std::vec::Vec::new();
        assert_eq!(
            packet.write(&mut out, &sequencer),
            Err(WriteError::Packet(PacketError::Empty))
        );
        assert!(out.is_empty());
        assert_eq!(sequencer.peek(), 0);
    }

    #[test]
    fn test_reconfigure() {
        let mut packet = DataPacket::new(config(1));
        packet.add_sample(0, 5).unwrap();
        packet.reconfigure(config(3));

        assert_eq!(packet.state(), PacketState::Empty);
        assert_eq!(packet.points_per_packet(), 3);
        assert_eq!(packet.packet_type(), PacketType::MultiSample);
    }

    #[test]
    fn test_time_packet_layout() {
        let frame = TimePacket::new(0x0102_0304, 7).frame(3).unwrap();
        assert_eq!(&frame[..4], &[b'P', 0xA0, b'N', 3]);
        assert_eq!(frame[4], 7);
        assert_eq!(&frame[5..9], &0x0102_0304u32.to_ne_bytes());
        assert_eq!(frame.len(), HEADER_LEN + TIME_PAYLOAD_LEN);
    }

    #[test]
    fn test_first_sample_time_layout() {
        let frame = FirstSampleTimePacket::new(123_456).frame(0).unwrap();
        assert_eq!(&frame[..4], &[b'P', 0xA0, b'F', 0]);
        assert_eq!(&frame[4..], &123_456u32.to_ne_bytes());
    }

    #[test]
    fn test_usb_frame_time_layout() {
        let packet = LatestUsbFrameTimePacket::new(1000, 2, 0x0304, 990);
        let frame = packet.frame(4).unwrap();

        assert_eq!(&frame[..4], &[b'P', 0xA0, b'L', 4]);
        // Same fields as a time packet, then the frame fields
        let base = TimePacket::new(1000, 2).frame(4).unwrap();
        assert_eq!(&frame[4..9], &base[4..9]);
        assert_eq!(&frame[9..11], &0x0304u16.to_ne_bytes());
        assert_eq!(&frame[11..15], &990u32.to_ne_bytes());
        assert_eq!(frame.len(), HEADER_LEN + USB_FRAME_TIME_PAYLOAD_LEN);
    }

    #[test]
    fn test_time_packets_write_whole_frames() {
        let sequencer = PacketSequencer::new();
        let mut out: std::vec::Vec<u8> = std::vec::Vec::new();

        assert_eq!(
            TimePacket::new(1, 2).write(&mut out, &sequencer),
            Ok(HEADER_LEN + TIME_PAYLOAD_LEN)
        );
        assert_eq!(
            FirstSampleTimePacket::new(3).write(&mut out, &sequencer),
            Ok(HEADER_LEN + FIRST_SAMPLE_TIME_PAYLOAD_LEN)
        );
        assert_eq!(
            LatestUsbFrameTimePacket::new(4, 5, 6, 7).write(&mut out, &sequencer),
            Ok(HEADER_LEN + USB_FRAME_TIME_PAYLOAD_LEN)
        );

        // Each frame carries the number it claimed, not the placeholder
        assert_eq!(out[3], 0);
        assert_eq!(out[HEADER_LEN + TIME_PAYLOAD_LEN + 3], 1);
        assert_eq!(out[2 * HEADER_LEN + TIME_PAYLOAD_LEN + FIRST_SAMPLE_TIME_PAYLOAD_LEN + 3], 2);
        assert_eq!(sequencer.peek(), 3);
    }

    #[test]
    fn test_largest_decoded_config_stays_in_bounds() {
        let config: StreamConfig = postcard::from_bytes(&[MAX_POINTS_PER_PACKET as u8]).unwrap();
        let mut packet = DataPacket::new(config);
        for point in 0..MAX_POINTS_PER_PACKET as i16 {
            packet.add_sample(0, point).unwrap();
            packet.add_sample(1, point).unwrap();
            packet.advance_point();
        }

        assert_eq!(packet.add_sample(0, 1), Err(PacketError::PacketFull));
        assert_eq!(packet.frame(0).unwrap().len(), MAX_FRAME_LEN);
    }

    #[test]
    fn test_packet_type_conversion() {
        assert_eq!(PacketType::try_from(b'D'), Ok(PacketType::SingleSample));
        assert_eq!(PacketType::try_from(b'L'), Ok(PacketType::LatestUsbFrameTime));
        assert!(PacketType::try_from(b'X').is_err());
        assert_eq!(u8::from(PacketType::FirstSampleTime), b'F');
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(PacketType::SingleSample.payload_len(1), 4);
        assert_eq!(PacketType::MultiSample.payload_len(10), 40);
        assert_eq!(PacketType::Time.payload_len(10), 5);
        assert_eq!(PacketType::FirstSampleTime.payload_len(1), 4);
        assert_eq!(PacketType::LatestUsbFrameTime.payload_len(1), 11);
    }
}
