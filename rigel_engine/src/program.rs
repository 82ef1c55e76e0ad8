//! Program and MIDI-program tables, plus the reload-programs selection
//! heuristic (§3, §4.4).

use rigel_shared::MidiProgramData;

pub struct ProgramTable {
    names: Vec<String>,
    current: i32,
}

impl ProgramTable {
    pub fn new() -> Self {
        Self { names: Vec::new(), current: -1 }
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn set_names(&mut self, names: Vec<String>) {
        self.names = names;
    }

    /// Selects `index`, clamped to `{-1} U [0, count)`.
    pub fn set_current(&mut self, index: i32) {
        self.current = if index < 0 || index as usize >= self.names.len() { -1 } else { index };
    }
}

impl Default for ProgramTable {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MidiProgramTable {
    programs: Vec<MidiProgramData>,
    current: i32,
}

impl MidiProgramTable {
    pub fn new() -> Self {
        Self { programs: Vec::new(), current: -1 }
    }

    pub fn count(&self) -> usize {
        self.programs.len()
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&MidiProgramData> {
        self.programs.get(index)
    }

    pub fn set_programs(&mut self, programs: Vec<MidiProgramData>) {
        self.programs = programs;
    }

    pub fn set_current(&mut self, index: i32) {
        self.current = if index < 0 || index as usize >= self.programs.len() { -1 } else { index };
    }

    /// Searches for `(bank, program)`, used when a `MidiBankChange` then
    /// `MidiProgramChange` control event pair arrives (§4.4 step 2).
    pub fn find(&self, bank: u32, program: u32) -> Option<usize> {
        self.programs.iter().position(|p| p.bank == bank && p.program == program)
    }
}

impl Default for MidiProgramTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects the post-reload program index per the heuristic in §4.4.
/// Order matters: "current >= new count -> 0" is checked before "new
/// count == old count + 1 -> user added one", matching the ambiguous
/// case the source resolves that way (spec.md §9, preserved on purpose).
pub fn select_reload_program(current: i32, old_count: usize, new_count: usize) -> i32 {
    if new_count == 0 {
        return -1;
    }
    if current >= new_count as i32 {
        return 0;
    }
    if new_count == old_count + 1 {
        return old_count as i32;
    }
    if current < 0 {
        return 0;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_exceeding_new_count_wins_over_append_heuristic() {
        // Both rules would fire (new_count == old_count + 1 AND current
        // >= new_count); "current >= new_count -> 0" must win.
        assert_eq!(select_reload_program(5, 4, 5), 0);
    }

    #[test]
    fn append_heuristic_selects_new_slot() {
        assert_eq!(select_reload_program(2, 4, 5), 2);
        assert_eq!(select_reload_program(4, 4, 5), 4);
    }

    #[test]
    fn unset_current_with_programs_selects_zero() {
        assert_eq!(select_reload_program(-1, 0, 3), 0);
    }

    #[test]
    fn no_programs_unsets_current() {
        assert_eq!(select_reload_program(0, 1, 0), -1);
    }

    #[test]
    fn midi_program_lookup_by_bank_and_program() {
        let mut table = MidiProgramTable::new();
        table.set_programs(vec![
            MidiProgramData { bank: 0, program: 0, name: "Piano".into() },
            MidiProgramData { bank: 0, program: 1, name: "Bass".into() },
        ]);
        assert_eq!(table.find(0, 1), Some(1));
        assert_eq!(table.find(1, 0), None);
    }
}
