//! Decoder for the raw 32-bit words of the TDC8HP high resolution group mode.
//!
//! Word classes by their top bits:
//!
//! | pattern | meaning |
//! |---|---|
//! | `11xx ...` | rising edge hit |
//! | `10xx ...` | falling edge hit |
//! | `0000 ...` | group marker, low 24 bits are the time fragment |
//! | `0001 0...` | rollover marker, low 24 bits are the rollover count |
//! | `0001 1...` | level info, slot in bits 24-26 |
//!
//! Hits carry a 6-bit raw channel in bits 24-29 and a signed 24-bit time.
use log::debug;

use super::constants::{GROUP_FRAGMENT_MASK, ROLLOVER_PERIOD};
use super::hit_array::{HitArray, HitPush};

const HIT_MASK: u32 = 0xC000_0000;
const RISING_PATTERN: u32 = 0xC000_0000;
const FALLING_PATTERN: u32 = 0x8000_0000;
const GROUP_MASK: u32 = 0xF000_0000;
const MARKER_MASK: u32 = 0xF800_0000;
const ROLLOVER_PATTERN: u32 = 0x1000_0000;
const LEVEL_INFO_PATTERN: u32 = 0x1800_0000;

/// A classified group mode word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupWord {
    Hit {
        channel: u32,
        value: i32,
        rising: bool,
    },
    /// Hit on a raw channel outside the three numbering bands
    UnmappedHit(u32),
    GroupMarker(u32),
    Rollover(u32),
    LevelInfo {
        slot: u32,
        payload: u32,
    },
    Ignored(u32),
}

/// Map a raw hardware channel to a logical one: 0-23 are the TDC inputs, 32-34 the card
/// trigger inputs (24-26) and 40-47 the digital inputs (27-34).
pub fn map_channel(raw: u32) -> Option<u32> {
    match raw {
        0..=23 => Some(raw),
        32..=34 => Some(raw - 8),
        40..=47 => Some(raw - 13),
        _ => None,
    }
}

/// Sign-extend the low 24 bits
fn sign_extend_24(word: u32) -> i32 {
    ((word << 8) as i32) >> 8
}

pub fn classify(word: u32) -> GroupWord {
    let hit = word & HIT_MASK;
    if hit == RISING_PATTERN || hit == FALLING_PATTERN {
        let raw = (word >> 24) & 0x3F;
        return match map_channel(raw) {
            Some(channel) => GroupWord::Hit {
                channel,
                value: sign_extend_24(word),
                rising: hit == RISING_PATTERN,
            },
            None => GroupWord::UnmappedHit(raw),
        };
    }
    if word & GROUP_MASK == 0 {
        return GroupWord::GroupMarker(word & GROUP_FRAGMENT_MASK);
    }
    match word & MARKER_MASK {
        ROLLOVER_PATTERN => GroupWord::Rollover(word & GROUP_FRAGMENT_MASK),
        LEVEL_INFO_PATTERN => GroupWord::LevelInfo {
            slot: (word >> 24) & 0x7,
            payload: word & GROUP_FRAGMENT_MASK,
        },
        _ => GroupWord::Ignored(word),
    }
}

/// What decoding one buffer of words did to the hit array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupSummary {
    pub hits_stored: usize,
    pub hits_dropped: usize,
    pub channels_dropped: usize,
}

/// Rollover and level-info state that persists across the events of one input
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupDecoder {
    pub rollover_counter: u64,
    pub last_rollover: u32,
    pub fragment: u32,
    pub level_info: u64,
    pub channel_offset_for_rising_transitions: i32,
}

impl GroupDecoder {
    /// Forget all state, as on opening a new input
    pub fn reset(&mut self) {
        let offset = self.channel_offset_for_rising_transitions;
        *self = Self {
            channel_offset_for_rising_transitions: offset,
            ..Default::default()
        };
    }

    /// Absolute time of the current group: `rollover_counter * 2^24 + fragment`
    pub fn absolute_timestamp(&self) -> u64 {
        self.rollover_counter
            .wrapping_mul(ROLLOVER_PERIOD)
            .wrapping_add(self.fragment as u64)
    }

    fn apply_rollover(&mut self, value: u32) {
        if value >= self.last_rollover {
            self.rollover_counter += (value - self.last_rollover) as u64;
        } else {
            self.rollover_counter += value as u64 + ROLLOVER_PERIOD - self.last_rollover as u64;
        }
        self.last_rollover = value;
    }

    fn apply_level_info(&mut self, slot: u32, payload: u32) {
        if slot > 2 {
            return;
        }
        let shift = 24 * slot;
        let width = 24.min(64 - shift);
        let field = (1u64 << width) - 1;
        self.level_info = (self.level_info & !(field << shift)) | ((payload as u64 & field) << shift);
    }

    /// Decode one buffer of words into the hit array
    pub fn decode(&mut self, words: &[u32], hits: &mut HitArray) -> GroupSummary {
        let mut summary = GroupSummary::default();
        for word in words {
            match classify(*word) {
                GroupWord::Hit {
                    channel,
                    value,
                    rising,
                } => {
                    let mut channel = channel as i64;
                    if rising {
                        channel += self.channel_offset_for_rising_transitions as i64;
                    }
                    let push = match usize::try_from(channel) {
                        Ok(channel) => hits.push_edge(channel, value as i64, !rising),
                        Err(_) => HitPush::ChannelDropped,
                    };
                    match push {
                        HitPush::Stored => summary.hits_stored += 1,
                        HitPush::HitDropped => summary.hits_dropped += 1,
                        HitPush::ChannelDropped => summary.channels_dropped += 1,
                    }
                }
                GroupWord::UnmappedHit(raw) => debug!("Discarding hit on raw channel {raw}"),
                GroupWord::GroupMarker(fragment) => self.fragment = fragment,
                GroupWord::Rollover(value) => self.apply_rollover(value),
                GroupWord::LevelInfo { slot, payload } => self.apply_level_info(slot, payload),
                GroupWord::Ignored(word) => debug!("Ignoring group mode word {word:#010x}"),
            }
        }
        summary
    }
}
