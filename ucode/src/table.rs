use std::collections::BTreeMap;

use common::{ControlWord, Signal};

use crate::layout::{AddressLayout, FieldKind};
use crate::RomError;

/// Per-step control words of one opcode, always exactly `steps` long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MicroSequence {
    words: Vec<ControlWord>,
}

impl MicroSequence {
    fn new(mut words: Vec<ControlWord>, steps: usize) -> MicroSequence {
        words.resize(steps, ControlWord::NOP);
        MicroSequence { words }
    }

    pub fn word(&self, step: usize) -> Option<ControlWord> {
        self.words.get(step).copied()
    }

    pub fn words(&self) -> &[ControlWord] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Steps up to and including the last one that asserts anything.
    pub fn defined_len(&self) -> usize {
        self.words.iter().rposition(|w| !w.is_nop()).map(|i| i + 1).unwrap_or(0)
    }

    fn overwrite(&mut self, from: usize, words: &[ControlWord]) {
        self.words[from..from + words.len()].copy_from_slice(words);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub opcode: u8,
    pub mnemonic: String,
    /// False for opcodes that fell back to the fetch-only sequence.
    pub assigned: bool,
    pub sequence: MicroSequence,
}

/// Every opcode of the address space mapped to its micro-step sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionTable {
    steps: usize,
    entries: Vec<TableEntry>,
}

impl InstructionTable {
    pub fn builder(opcode_bits: u32, step_bits: u32) -> Result<TableBuilder, RomError> {
        AddressLayout::check_widths(&[(FieldKind::Opcode, opcode_bits), (FieldKind::Step, step_bits)])?;
        Ok(TableBuilder {
            opcode_bits,
            steps: 1 << step_bits,
            fetch: Vec::new(),
            defs: BTreeMap::new(),
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn opcode_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn entry(&self, opcode: u8) -> Option<&TableEntry> {
        self.entries.get(opcode as usize)
    }

    pub fn sequence(&self, opcode: u8) -> Option<&MicroSequence> {
        self.entry(opcode).map(|e| &e.sequence)
    }

    pub fn word(&self, opcode: u8, step: u8) -> Option<ControlWord> {
        self.sequence(opcode).and_then(|s| s.word(step as usize))
    }

    /// Overwrites `words.len()` steps of `opcode` starting at `from`.
    pub(crate) fn patch(&mut self, opcode: u8, from: usize, words: &[ControlWord]) -> Result<(), RomError> {
        let steps = self.steps;
        let entry = self.entries.get_mut(opcode as usize).ok_or(RomError::UnknownOpcode(opcode))?;
        if from + words.len() > steps {
            return Err(RomError::SequenceOverflow {
                opcode,
                mnemonic: entry.mnemonic.clone(),
                len: from + words.len(),
                max: steps,
            });
        }
        entry.sequence.overwrite(from, words);
        Ok(())
    }
}

pub struct TableBuilder {
    opcode_bits: u32,
    steps: usize,
    fetch: Vec<ControlWord>,
    defs: BTreeMap<u8, (String, Vec<ControlWord>)>,
}

pub fn words(steps: &[&[Signal]]) -> Vec<ControlWord> {
    steps.iter().map(|s| ControlWord::from_signals(s)).collect()
}

impl TableBuilder {
    /// The steps every opcode starts with.
    pub fn fetch(mut self, steps: &[&[Signal]]) -> TableBuilder {
        self.fetch = words(steps);
        self
    }

    pub fn fetch_len(&self) -> usize {
        self.fetch.len()
    }

    /// Defines `opcode` as the fetch steps followed by `body`.
    pub fn define(&mut self, opcode: u8, mnemonic: &str, body: &[&[Signal]]) -> Result<(), RomError> {
        self.define_words(opcode, mnemonic, words(body))
    }

    pub fn define_words(&mut self, opcode: u8, mnemonic: &str, body: Vec<ControlWord>) -> Result<(), RomError> {
        if opcode as usize >= 1 << self.opcode_bits {
            return Err(RomError::OpcodeOutOfRange { opcode, bits: self.opcode_bits });
        }
        if self.defs.contains_key(&opcode) {
            return Err(RomError::DuplicateOpcode(opcode));
        }

        let mut sequence = self.fetch.clone();
        sequence.extend(body);
        if sequence.len() > self.steps {
            return Err(RomError::SequenceOverflow {
                opcode,
                mnemonic: mnemonic.to_string(),
                len: sequence.len(),
                max: self.steps,
            });
        }

        log::trace!("{:#04x} {} {:?}", opcode, mnemonic, sequence);
        self.defs.insert(opcode, (mnemonic.to_string(), sequence));
        Ok(())
    }

    pub fn build(self) -> Result<InstructionTable, RomError> {
        if self.fetch.len() > self.steps {
            return Err(RomError::SequenceOverflow {
                opcode: 0,
                mnemonic: "fetch".to_string(),
                len: self.fetch.len(),
                max: self.steps,
            });
        }

        let mut defs = self.defs;
        let entries = (0..1usize << self.opcode_bits).map(|op| {
            let opcode = op as u8;
            match defs.remove(&opcode) {
                Some((mnemonic, words)) => TableEntry {
                    opcode,
                    mnemonic,
                    assigned: true,
                    sequence: MicroSequence::new(words, self.steps),
                },
                None => TableEntry {
                    opcode,
                    mnemonic: format!("OP{}", opcode),
                    assigned: false,
                    sequence: MicroSequence::new(self.fetch.clone(), self.steps),
                },
            }
        }).collect();

        Ok(InstructionTable {
            steps: self.steps,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Signal::*;

    fn builder() -> TableBuilder {
        InstructionTable::builder(4, 3).unwrap().fetch(&[&[Mi, Co], &[Ro, Ii, Ce]])
    }

    #[test]
    fn unassigned_opcodes_fetch_only() {
        let mut b = builder();
        b.define(0x1, "LDA", &[&[Io, Mi], &[Ro, Ai]]).unwrap();
        let table = b.build().unwrap();

        assert_eq!(16, table.opcode_count());
        assert_eq!(8, table.steps());

        let lda = table.entry(1).unwrap();
        assert!(lda.assigned);
        assert_eq!(4, lda.sequence.defined_len());

        let op9 = table.entry(9).unwrap();
        assert!(!op9.assigned);
        assert_eq!("OP9", op9.mnemonic);
        assert_eq!(2, op9.sequence.defined_len());
        assert_eq!(Some(ControlWord::from_signals(&[Ro, Ii, Ce])), table.word(9, 1));
        for step in 2..8 {
            assert_eq!(Some(ControlWord::NOP), table.word(9, step));
        }
        assert_eq!(None, table.word(9, 8));
        assert_eq!(None, table.word(16, 0));
    }

    #[test]
    fn overflow_is_rejected() {
        let mut b = builder();
        let hlt: &[Signal] = &[Hlt];
        let body = vec![hlt; 7];
        match b.define(0xF, "HLT", &body) {
            Err(RomError::SequenceOverflow { opcode, len, max, .. }) => {
                assert_eq!((0xF, 9, 8), (opcode, len, max));
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = vec![hlt; 6];
        b.define(0xF, "HLT", &body).unwrap();
    }

    #[test]
    fn bad_opcodes() {
        let mut b = builder();
        assert!(matches!(b.define(0x10, "ADI", &[]), Err(RomError::OpcodeOutOfRange { opcode: 0x10, bits: 4 })));
        b.define(0x2, "ADD", &[]).unwrap();
        assert!(matches!(b.define(0x2, "ADD", &[]), Err(RomError::DuplicateOpcode(2))));
    }

    #[test]
    fn opcode_field_fits_a_byte() {
        assert!(matches!(
            InstructionTable::builder(9, 3),
            Err(RomError::FieldTooWide { field: FieldKind::Opcode, width: 9, .. })));

        let table = InstructionTable::builder(8, 3).unwrap().build().unwrap();
        assert_eq!(256, table.opcode_count());
        assert_eq!("OP255", table.entry(0xFF).unwrap().mnemonic);
    }

    #[test]
    fn patch_stays_in_bounds() {
        let mut table = builder().build().unwrap();
        let jump = words(&[&[Io, J]]);
        table.patch(7, 2, &jump).unwrap();
        assert_eq!(3, table.sequence(7).unwrap().defined_len());
        assert!(matches!(table.patch(7, 8, &jump), Err(RomError::SequenceOverflow { .. })));
        assert!(matches!(table.patch(16, 2, &jump), Err(RomError::UnknownOpcode(16))));
    }
}
