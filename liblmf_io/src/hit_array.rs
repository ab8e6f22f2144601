use ndarray::{s, Array1, Array2, ArrayView1};

/// Outcome of storing one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPush {
    Stored,
    /// The channel already holds the maximum number of hits
    HitDropped,
    /// The channel index is beyond the capacity
    ChannelDropped,
}

/// Per-event hit storage sized to the session capacity (channels x hits).
///
/// Values are kept both as integers and as doubles so that any of the typed accessors can
/// serve them without a second pass over the file. Hits beyond the capacity are dropped,
/// never reallocated.
#[derive(Debug, Clone, PartialEq)]
pub struct HitArray {
    counts: Array1<u32>,
    ints: Array2<i64>,
    doubles: Array2<f64>,
    falling: Array2<bool>,
}

impl HitArray {
    pub fn new(max_channels: usize, max_hits: usize) -> Self {
        Self {
            counts: Array1::zeros(max_channels),
            ints: Array2::zeros((max_channels, max_hits)),
            doubles: Array2::zeros((max_channels, max_hits)),
            falling: Array2::from_elem((max_channels, max_hits), false),
        }
    }

    pub fn max_channels(&self) -> usize {
        self.counts.len()
    }

    pub fn max_hits(&self) -> usize {
        self.ints.ncols()
    }

    /// Forget the previous event. Only the counts are reset, stale values are never exposed.
    pub fn clear(&mut self) {
        self.counts.fill(0);
    }

    pub fn push_int(&mut self, channel: usize, value: i64) -> HitPush {
        self.push(channel, value, value as f64, false)
    }

    pub fn push_double(&mut self, channel: usize, value: f64) -> HitPush {
        self.push(channel, value as i64, value, false)
    }

    /// Store a group mode hit with its edge polarity
    pub fn push_edge(&mut self, channel: usize, value: i64, falling: bool) -> HitPush {
        self.push(channel, value, value as f64, falling)
    }

    fn push(&mut self, channel: usize, int: i64, double: f64, falling: bool) -> HitPush {
        if channel >= self.max_channels() {
            return HitPush::ChannelDropped;
        }
        let hit = self.counts[channel] as usize;
        if hit >= self.max_hits() {
            return HitPush::HitDropped;
        }
        self.ints[[channel, hit]] = int;
        self.doubles[[channel, hit]] = double;
        self.falling[[channel, hit]] = falling;
        self.counts[channel] += 1;
        HitPush::Stored
    }

    /// Number of stored hits of a channel. Zero for channels beyond the capacity.
    pub fn count(&self, channel: usize) -> u32 {
        self.counts.get(channel).copied().unwrap_or(0)
    }

    /// Integer hit values of a channel
    pub fn ints(&self, channel: usize) -> ArrayView1<'_, i64> {
        row(&self.ints, channel, self.count(channel) as usize, &[])
    }

    pub fn doubles(&self, channel: usize) -> ArrayView1<'_, f64> {
        row(&self.doubles, channel, self.count(channel) as usize, &[])
    }

    pub fn falling(&self, channel: usize) -> ArrayView1<'_, bool> {
        row(&self.falling, channel, self.count(channel) as usize, &[])
    }

    /// Integer value of one hit, `None` outside the stored hits
    pub fn int(&self, channel: usize, hit: usize) -> Option<i64> {
        if hit < self.count(channel) as usize {
            self.ints.get([channel, hit]).copied()
        } else {
            None
        }
    }

    pub fn double(&self, channel: usize, hit: usize) -> Option<f64> {
        if hit < self.count(channel) as usize {
            self.doubles.get([channel, hit]).copied()
        } else {
            None
        }
    }

    pub fn is_falling(&self, channel: usize, hit: usize) -> Option<bool> {
        if hit < self.count(channel) as usize {
            self.falling.get([channel, hit]).copied()
        } else {
            None
        }
    }

    /// Copy the hits into a flat `channel * stride + hit` array, zero filling unused slots
    pub fn copy_flat<T: Copy + Default>(
        &self,
        target: &mut [T],
        stride: usize,
        convert: impl Fn(i64, f64) -> T,
    ) {
        target.fill(T::default());
        if stride == 0 {
            return;
        }
        for channel in 0..self.max_channels() {
            let count = (self.count(channel) as usize).min(stride);
            for hit in 0..count {
                let Some(slot) = target.get_mut(channel * stride + hit) else {
                    return;
                };
                *slot = convert(self.ints[[channel, hit]], self.doubles[[channel, hit]]);
            }
        }
    }
}

fn row<'a, T>(
    array: &'a Array2<T>,
    channel: usize,
    count: usize,
    empty: &'a [T],
) -> ArrayView1<'a, T> {
    if channel < array.nrows() {
        array.slice(s![channel, ..count])
    } else {
        ArrayView1::from(empty)
    }
}
