//! Per-channel bandpass statistics and their packed wire layout.
//!
//! A [`Bandpass`] is the channel-ordered table of `(frequency, mean, std)`
//! produced by [`crate::filterbank::extract`] and published as an opaque
//! blob. The byte layout is stable so readers in any language can unpack it.
//!
//! # Wire layout
//! ```text
//! [record 0] [record 1] ... [record N-1]
//!
//! Record (12 bytes, tightly packed, no padding):
//!   frequency: f32 little-endian   (Hz)
//!   mean:      f32 little-endian
//!   std:       f32 little-endian
//! ```

use bytes::{Buf, BufMut};

/// Size in bytes of one packed channel record.
pub const RECORD_SIZE: usize = 12;

/// Statistics for a single frequency channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStat {
    /// Channel center frequency in Hz.
    pub frequency: f32,
    /// Mean sample value over all time samples.
    pub mean: f32,
    /// Population standard deviation over all time samples.
    pub std: f32,
}

/// A channel-ordered table of per-channel statistics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bandpass {
    channels: Vec<ChannelStat>,
}

impl Bandpass {
    /// Wrap a channel-ordered statistics table.
    pub fn new(channels: Vec<ChannelStat>) -> Self {
        Self { channels }
    }

    /// The per-channel records, in channel order.
    pub fn channels(&self) -> &[ChannelStat] {
        &self.channels
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when the table holds no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Pack the table into the wire layout documented at module level.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.channels.len() * RECORD_SIZE);
        for chan in &self.channels {
            buf.put_f32_le(chan.frequency);
            buf.put_f32_le(chan.mean);
            buf.put_f32_le(chan.std);
        }
        buf
    }

    /// Unpack a table from the wire layout.
    ///
    /// Returns `None` for a blob that is not a whole number of records;
    /// readers treat that the same as "no data yet".
    pub fn from_bytes(mut buf: &[u8]) -> Option<Self> {
        if buf.len() % RECORD_SIZE != 0 {
            return None;
        }
        let mut channels = Vec::with_capacity(buf.len() / RECORD_SIZE);
        while buf.has_remaining() {
            channels.push(ChannelStat {
                frequency: buf.get_f32_le(),
                mean: buf.get_f32_le(),
                std: buf.get_f32_le(),
            });
        }
        Some(Self { channels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Bandpass {
        Bandpass::new(vec![
            ChannelStat {
                frequency: 1.28e9,
                mean: 96.5,
                std: 3.2,
            },
            ChannelStat {
                frequency: 1.284e9,
                mean: 97.1,
                std: 2.9,
            },
            ChannelStat {
                frequency: 1.288e9,
                mean: 95.8,
                std: 3.4,
            },
        ])
    }

    #[test]
    fn packs_twelve_bytes_per_channel() {
        let table = sample_table();
        assert_eq!(table.to_bytes().len(), 3 * RECORD_SIZE);
    }

    #[test]
    fn round_trip_preserves_values() {
        let table = sample_table();
        let unpacked = Bandpass::from_bytes(&table.to_bytes()).unwrap();
        assert_eq!(unpacked, table);
    }

    #[test]
    fn layout_is_little_endian_triples() {
        let table = Bandpass::new(vec![ChannelStat {
            frequency: 1.0,
            mean: 2.0,
            std: 3.0,
        }]);
        let bytes = table.to_bytes();
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3.0f32.to_le_bytes());
    }

    #[test]
    fn rejects_partial_records() {
        assert!(Bandpass::from_bytes(&[0u8; 13]).is_none());
        assert!(Bandpass::from_bytes(&[0u8; 11]).is_none());
    }

    #[test]
    fn empty_blob_unpacks_to_empty_table() {
        let table = Bandpass::from_bytes(&[]).unwrap();
        assert!(table.is_empty());
    }
}
