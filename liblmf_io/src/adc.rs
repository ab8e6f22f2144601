use std::io::{Read, Seek};

use super::cursor::ByteCursor;

/// Upper bound on the samples of one packet, guards against corrupt lengths
const MAX_SAMPLES_PER_PACKET: u64 = 1 << 24;

/// One waveform packet of an fADC4 or fADC8 event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdcPacket {
    pub channel: i32,
    pub card: i32,
    pub packet_type: i32,
    pub flags: i32,
    pub timestamp: u64,
    pub samples: Vec<i16>,
}

impl AdcPacket {
    /// Logical channel number: card times channels per card plus channel
    pub fn logical_channel(&self, channels_per_card: i32) -> i64 {
        self.card as i64 * channels_per_card as i64 + self.channel as i64
    }

    /// fADC4: four u8 descriptors, u32 length in 64-bit words, u64 timestamp, i16 samples
    pub fn read_fadc4<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<Self> {
        let channel = cursor.read_u8()? as i32;
        let card = cursor.read_u8()? as i32;
        let packet_type = cursor.read_u8()? as i32;
        let flags = cursor.read_u8()? as i32;
        let length = cursor.read_u32()? as u64;
        let timestamp = cursor.read_u64()?;
        let samples = read_samples(cursor, 4 * length)?;
        Ok(Self {
            channel,
            card,
            packet_type,
            flags,
            timestamp,
            samples,
        })
    }

    /// fADC8: four i32 descriptors, u64 timestamp, u32 sample count, i16 samples
    pub fn read_fadc8<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<Self> {
        let channel = cursor.read_i32()?;
        let card = cursor.read_i32()?;
        let packet_type = cursor.read_i32()?;
        let flags = cursor.read_i32()?;
        let timestamp = cursor.read_u64()?;
        let count = cursor.read_u32()? as u64;
        let samples = read_samples(cursor, count)?;
        Ok(Self {
            channel,
            card,
            packet_type,
            flags,
            timestamp,
            samples,
        })
    }
}

fn read_samples<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    count: u64,
) -> std::io::Result<Vec<i16>> {
    if count > MAX_SAMPLES_PER_PACKET {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("ADC packet with {count} samples"),
        ));
    }
    let mut samples = Vec::with_capacity(count as usize);
    for _ in 0..count {
        samples.push(cursor.read_i16()?);
    }
    Ok(samples)
}
