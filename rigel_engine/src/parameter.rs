//! Per-plugin parameter table: ranges, hints, MIDI-CC bindings (§3, §6).

use rigel_shared::{parameter_hints, ParameterType};

#[derive(Debug, Clone, Copy)]
pub struct ParameterRanges {
    pub def: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub step_small: f32,
    pub step_large: f32,
}

impl ParameterRanges {
    /// Repairs the `max - min == 0` broken-plugin case by bumping `max`
    /// by 0.1, preserved deliberately (spec.md §9 "bugs to preserve").
    pub fn fix(&mut self) {
        if self.max - self.min == 0.0 {
            self.max += 0.1;
        }
        if self.def < self.min {
            self.def = self.min;
        }
        if self.def > self.max {
            self.def = self.max;
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn normalize(&self, value: f32) -> f32 {
        if self.max <= self.min {
            return 0.0;
        }
        (value - self.min) / (self.max - self.min)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterData {
    pub param_type: ParameterType,
    /// Index within this table.
    pub index: u32,
    /// Index into the native plugin's own port list.
    pub rindex: i32,
    pub hints: u32,
    /// `0..15`, or a sentinel outside that range when unbound.
    pub midi_channel: u8,
    /// `-1..95`; `-1` means "not bound to a CC".
    pub midi_cc: i16,
}

impl ParameterData {
    pub fn has_hint(&self, hint: u32) -> bool {
        self.hints & hint != 0
    }

    pub fn is_bound_to_cc(&self, channel: u8, cc: u8) -> bool {
        self.midi_channel == channel && self.midi_cc == cc as i16
    }
}

pub struct ParameterTable {
    data: Vec<ParameterData>,
    ranges: Vec<ParameterRanges>,
    values: Vec<f32>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self { data: Vec::new(), ranges: Vec::new(), values: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.ranges.clear();
        self.values.clear();
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn push(&mut self, data: ParameterData, mut ranges: ParameterRanges) {
        ranges.fix();
        let initial = ranges.def;
        self.data.push(data);
        self.ranges.push(ranges);
        self.values.push(initial);
    }

    pub fn data(&self, index: usize) -> Option<&ParameterData> {
        self.data.get(index)
    }

    pub fn ranges(&self, index: usize) -> Option<&ParameterRanges> {
        self.ranges.get(index)
    }

    pub fn value(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Clamps into the parameter's documented range before storing,
    /// satisfying the round-trip law `getValue(set(p, v)) ==
    /// clamp(v, min, max)`.
    pub fn set_value(&mut self, index: usize, value: f32) -> Option<f32> {
        let ranges = *self.ranges.get(index)?;
        let mut clamped = ranges.clamp(value);
        if let Some(data) = self.data.get(index) {
            if data.has_hint(parameter_hints::BOOLEAN) {
                clamped = if clamped >= (ranges.min + ranges.max) / 2.0 { ranges.max } else { ranges.min };
            } else if data.has_hint(parameter_hints::INTEGER) {
                clamped = clamped.round();
            }
        }
        self.values[index] = clamped;
        Some(clamped)
    }

    pub fn find_bound_to_cc(&self, channel: u8, cc: u8) -> Option<usize> {
        self.data.iter().position(|d| d.is_bound_to_cc(channel, cc))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterData, &ParameterRanges, &f32)> {
        self.data.iter().zip(self.ranges.iter()).zip(self.values.iter()).map(|((d, r), v)| (d, r, v))
    }
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_default(table: &mut ParameterTable, min: f32, max: f32, hints: u32) {
        table.push(
            ParameterData { param_type: ParameterType::Input, index: 0, rindex: 0, hints, midi_channel: 0, midi_cc: -1 },
            ParameterRanges { def: min, min, max, step: 0.01, step_small: 0.001, step_large: 0.1 },
        );
    }

    #[test]
    fn zero_width_range_is_repaired() {
        let mut table = ParameterTable::new();
        push_default(&mut table, 1.0, 1.0, 0);
        assert_eq!(table.ranges(0).unwrap().max, 1.1);
    }

    #[test]
    fn set_value_clamps() {
        let mut table = ParameterTable::new();
        push_default(&mut table, 0.0, 1.0, 0);
        assert_eq!(table.set_value(0, 5.0), Some(1.0));
        assert_eq!(table.set_value(0, -5.0), Some(0.0));
    }

    #[test]
    fn boolean_hint_snaps_to_extremes() {
        let mut table = ParameterTable::new();
        push_default(&mut table, 0.0, 1.0, parameter_hints::BOOLEAN);
        assert_eq!(table.set_value(0, 0.6), Some(1.0));
        assert_eq!(table.set_value(0, 0.4), Some(0.0));
    }
}
