//! # Stream Configuration
//!
//! Runtime settings for the outgoing data stream. The host may send a new
//! configuration over the link; it is encoded with `postcard` and validated
//! again on decode.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::PacketType;
use crate::{DEFAULT_POINTS_PER_PACKET, MAX_POINTS_PER_PACKET};

/// Errors from building or decoding a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Points per packet outside `1..=MAX_POINTS_PER_PACKET`
    InvalidPointsPerPacket(u8),
    /// Encoded configuration could not be parsed
    Decode,
    /// Output buffer too small for the encoded configuration
    Encode,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPointsPerPacket(n) => write!(
                f,
                "points per packet must be 1..={}, got {}",
                MAX_POINTS_PER_PACKET, n
            ),
            ConfigError::Decode => f.write_str("malformed stream configuration"),
            ConfigError::Encode => f.write_str("buffer too small for stream configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Configuration of the sample stream
///
/// Encodes as the single points-per-packet byte; every decode path goes
/// through [`StreamConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    points_per_packet: u8,
}

impl StreamConfig {
    /// Create a configuration sending `points_per_packet` points per data packet
    pub const fn new(points_per_packet: u8) -> Result<Self, ConfigError> {
        if points_per_packet == 0 || points_per_packet as usize > MAX_POINTS_PER_PACKET {
            return Err(ConfigError::InvalidPointsPerPacket(points_per_packet));
        }
        Ok(Self { points_per_packet })
    }

    /// Points carried by each data packet
    #[inline]
    pub const fn points_per_packet(&self) -> usize {
        self.points_per_packet as usize
    }

    /// Tag data packets are sent with under this configuration
    pub const fn packet_type(&self) -> PacketType {
        if self.points_per_packet == 1 {
            PacketType::SingleSample
        } else {
            PacketType::MultiSample
        }
    }

    /// Serialize into `buffer` with postcard
    pub fn to_slice<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Encode)
    }

    /// Deserialize and validate a configuration received from the host
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let points_per_packet: u8 = postcard::from_bytes(data).map_err(|_| {
            warn!("rejected stream configuration ({} bytes)", data.len());
            ConfigError::Decode
        })?;
        Self::new(points_per_packet).map_err(|e| {
            warn!("rejected stream configuration: {} points per packet", points_per_packet);
            e
        })
    }
}

impl TryFrom<u8> for StreamConfig {
    type Error = ConfigError;

    fn try_from(points_per_packet: u8) -> Result<Self, Self::Error> {
        Self::new(points_per_packet)
    }
}

impl From<StreamConfig> for u8 {
    fn from(config: StreamConfig) -> Self {
        config.points_per_packet
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            points_per_packet: DEFAULT_POINTS_PER_PACKET,
        }
    }
}
