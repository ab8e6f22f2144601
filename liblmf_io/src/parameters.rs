use bitvec::prelude::*;
use std::io::{Read, Seek, Write};

use super::constants::*;
use super::cursor::ByteCursor;

/// Bit `i` marks parameter `901 + i` as changed
pub type ChangedMask = BitArr!(for CHANGED_MASK_PARAMETERS, in u32, Lsb0);

/// The flat parameter table carried alongside the event stream.
///
/// Slots 901 to 932 are transmitted per event as deltas: a 32-bit mask naming the slots
/// that changed followed by only their values. `written` shadows what the output stream
/// last saw, so a writer only emits what changed since its previous event.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    values: Vec<f64>,
    written: Vec<f64>,
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self {
            values: vec![0.0; NUMBER_OF_PARAMETERS],
            written: vec![0.0; CHANGED_MASK_PARAMETERS],
        }
    }
}

impl ParameterTable {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Set a slot. Returns false for an index outside the table.
    pub fn set(&mut self, index: usize, value: f64) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Slots whose value differs bit-wise from what was last written
    pub fn changed_mask(&self) -> ChangedMask {
        let mut mask = ChangedMask::ZERO;
        for bit in 0..CHANGED_MASK_PARAMETERS {
            let current = self.values[CHANGED_MASK_FIRST_PARAMETER + bit];
            mask.set(bit, current.to_bits() != self.written[bit].to_bits());
        }
        mask
    }

    /// Read a changed-parameter block and update only the named slots
    pub fn read_changes<T: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
    ) -> std::io::Result<ChangedMask> {
        let mask = ChangedMask::new([cursor.read_u32()?]);
        for bit in mask.iter_ones() {
            let value = cursor.read_f64()?;
            self.values[CHANGED_MASK_FIRST_PARAMETER + bit] = value;
        }
        Ok(mask)
    }

    /// Write the changed-parameter block and remember the written values
    pub fn write_changes<T: Write + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
    ) -> std::io::Result<ChangedMask> {
        let mask = self.changed_mask();
        cursor.write_u32(mask.into_inner()[0])?;
        for bit in mask.iter_ones() {
            let value = self.values[CHANGED_MASK_FIRST_PARAMETER + bit];
            cursor.write_f64(value)?;
            self.written[bit] = value;
        }
        Ok(mask)
    }

    /// Encoded size of the next changed-parameter block
    pub fn changes_size(&self) -> u64 {
        4 + 8 * self.changed_mask().count_ones() as u64
    }

    /// Start a new output stream: nothing has been written yet
    pub fn reset_written(&mut self) {
        self.written.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_only_deltas_are_written() {
        let mut table = ParameterTable::default();
        table.set(903, 1.0);
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        let mask = table.write_changes(&mut cursor).unwrap();
        assert_eq!(mask.into_inner()[0], 1 << 2);
        // Nothing changed since
        let mask = table.write_changes(&mut cursor).unwrap();
        assert!(mask.not_any());
        table.set(905, -2.5);
        let mask = table.write_changes(&mut cursor).unwrap();
        assert_eq!(mask.into_inner()[0], 1 << 4);
        assert_eq!(cursor.tell(), (4 + 8) + 4 + (4 + 8));
    }

    #[test]
    fn test_read_updates_named_slots_only() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&((1u32 << 0) | (1u32 << 31)).to_le_bytes());
        bytes.extend_from_slice(&4.0f64.to_le_bytes());
        bytes.extend_from_slice(&8.0f64.to_le_bytes());
        let mut table = ParameterTable::default();
        table.set(910, 3.0);
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        table.read_changes(&mut cursor).unwrap();
        assert_eq!(table.get(901), Some(4.0));
        assert_eq!(table.get(932), Some(8.0));
        assert_eq!(table.get(910), Some(3.0));
        assert_eq!(table.get(10_000), None);
    }
}
