use super::adc::AdcPacket;
use super::hit_array::{HitArray, HitPush};

/// The most recently read event. Buffers are overwritten in place by every read.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub hits: HitArray,
    /// Raw timestamp in ticks
    pub timestamp: u64,
    /// Counter stored in variable length records
    pub event_counter: u64,
    pub adc_packets: Vec<AdcPacket>,
    pub camac: Vec<u32>,
    /// Words of RAW32BIT records and TDC8HP group mode records
    pub raw_words: Vec<u32>,
    pub post_event_data: Vec<u8>,
}

impl EventData {
    pub fn new(max_channels: usize, max_hits: usize) -> Self {
        Self {
            hits: HitArray::new(max_channels, max_hits),
            timestamp: 0,
            event_counter: 0,
            adc_packets: Vec::new(),
            camac: Vec::new(),
            raw_words: Vec::new(),
            post_event_data: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.timestamp = 0;
        self.adc_packets.clear();
        self.camac.clear();
        self.raw_words.clear();
        self.post_event_data.clear();
    }
}

/// Hits that did not fit the session capacity while reading one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Truncation {
    pub hits_dropped: usize,
    pub channels_dropped: usize,
}

impl Truncation {
    pub fn note(&mut self, push: HitPush) {
        match push {
            HitPush::Stored => (),
            HitPush::HitDropped => self.hits_dropped += 1,
            HitPush::ChannelDropped => self.channels_dropped += 1,
        }
    }

    pub fn any(&self) -> bool {
        self.hits_dropped > 0 || self.channels_dropped > 0
    }
}
