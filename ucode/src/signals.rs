use std::collections::{HashMap, HashSet};

use common::{ControlWord, Signal, MAX_WORDS, WORD_BITS};
use strum::IntoEnumIterator;

use crate::RomError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalSpec {
    pub name: &'static str,
    pub word: u8,
    pub bit: u8,
}

impl SignalSpec {
    pub fn mask(&self) -> u32 {
        1 << (self.word as u32 * WORD_BITS + self.bit as u32)
    }
}

impl From<Signal> for SignalSpec {
    fn from(signal: Signal) -> SignalSpec {
        SignalSpec {
            name: signal.name(),
            word: signal.word(),
            bit: signal.bit(),
        }
    }
}

/// A validated signal catalogue. Catalogue order is declaration order and is
/// the order decoded names come back in.
#[derive(Clone, Debug)]
pub struct SignalSet {
    specs: Vec<SignalSpec>,
}

impl SignalSet {
    pub fn new<I: IntoIterator<Item = SignalSpec>>(specs: I) -> Result<SignalSet, RomError> {
        let mut owners: HashMap<(u8, u8), &'static str> = HashMap::new();
        let mut names = HashSet::new();
        let mut validated = Vec::new();

        for spec in specs {
            if spec.bit as u32 >= WORD_BITS || spec.word as usize >= MAX_WORDS {
                return Err(RomError::BitOutOfRange {
                    name: spec.name.to_string(),
                    word: spec.word,
                    bit: spec.bit,
                });
            }
            if !names.insert(spec.name) {
                return Err(RomError::DuplicateSignal(spec.name.to_string()));
            }
            if let Some(first) = owners.insert((spec.word, spec.bit), spec.name) {
                return Err(RomError::BitCollision {
                    word: spec.word,
                    bit: spec.bit,
                    first: first.to_string(),
                    second: spec.name.to_string(),
                });
            }
            validated.push(spec);
        }

        log::debug!("signal catalogue: {} signals in {} word(s)", validated.len(),
            validated.iter().map(|s| s.word as usize + 1).max().unwrap_or(0));

        Ok(SignalSet { specs: validated })
    }

    /// The compiled-in catalogue from `common::Signal`.
    pub fn standard() -> Result<SignalSet, RomError> {
        SignalSet::new(Signal::iter().map(SignalSpec::from))
    }

    pub fn specs(&self) -> &[SignalSpec] {
        &self.specs
    }

    /// Number of words spanned by the catalogue.
    pub fn word_count(&self) -> usize {
        self.specs.iter().map(|s| s.word as usize + 1).max().unwrap_or(0)
    }

    pub fn pack(&self, names: &[&str]) -> Result<ControlWord, RomError> {
        let mut bits = 0;
        for name in names {
            let spec = self.specs.iter()
                .find(|s| s.name == *name)
                .ok_or_else(|| RomError::UnknownSignal(name.to_string()))?;
            bits |= spec.mask();
        }
        Ok(ControlWord::from_bits(bits))
    }

    /// Asserted signal names in catalogue order. Bits with no signal are ignored.
    pub fn decode(&self, word: ControlWord) -> Vec<&'static str> {
        self.specs.iter()
            .filter(|s| word.bits() & s.mask() != 0)
            .map(|s| s.name)
            .collect()
    }

    /// The first asserted signal that lives in a word at or beyond `words`.
    pub fn beyond(&self, word: ControlWord, words: usize) -> Option<&SignalSpec> {
        self.specs.iter()
            .find(|s| s.word as usize >= words && word.bits() & s.mask() != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &'static str, word: u8, bit: u8) -> SignalSpec {
        SignalSpec { name, word, bit }
    }

    #[test]
    fn standard_catalogue() {
        let set = SignalSet::standard().unwrap();
        assert_eq!(3, set.word_count());
        assert_eq!("HLT", set.specs()[0].name);
        assert_eq!(Signal::Co.mask(), set.pack(&["CO"]).unwrap().bits());
    }

    #[test]
    fn collision_names_both() {
        let err = SignalSet::new(vec![
            spec("HLT", 0, 7),
            spec("MI", 0, 6),
            spec("XX", 0, 7),
        ]).unwrap_err();

        match err {
            RomError::BitCollision { word, bit, first, second } => {
                assert_eq!((0, 7), (word, bit));
                assert_eq!("HLT", first);
                assert_eq!("XX", second);
            }
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn same_bit_other_word_is_fine() {
        let set = SignalSet::new(vec![spec("A", 0, 3), spec("B", 1, 3)]).unwrap();
        assert_eq!(2, set.word_count());
    }

    #[test]
    fn out_of_range_bit() {
        assert!(matches!(
            SignalSet::new(vec![spec("A", 0, 8)]),
            Err(RomError::BitOutOfRange { .. })));
        assert!(matches!(
            SignalSet::new(vec![spec("A", 0, 1), spec("A", 1, 1)]),
            Err(RomError::DuplicateSignal(_))));
    }

    #[test]
    fn decode_is_catalogue_ordered() {
        let set = SignalSet::standard().unwrap();
        let w = set.pack(&["CE", "RO", "II"]).unwrap();
        assert_eq!(vec!["RO", "II", "CE"], set.decode(w));
        assert!(set.decode(ControlWord::NOP).is_empty());
        assert!(matches!(set.pack(&["ZZ"]), Err(RomError::UnknownSignal(_))));
    }

    #[test]
    fn pack_decode_roundtrip() {
        let set = SignalSet::standard().unwrap();
        for bits in 0u32..=0xFFFF {
            let w = ControlWord::from_bits(bits);
            assert_eq!(w, set.pack(&set.decode(w)).unwrap());
        }
        for bits in [0x0000_0000u32, 0x0080_0000, 0x0040_0000, 0x00C0_FFFF] {
            let w = ControlWord::from_bits(bits);
            assert_eq!(w, set.pack(&set.decode(w)).unwrap());
        }
    }

    #[test]
    fn words_beyond_plane() {
        let set = SignalSet::standard().unwrap();
        let w = ControlWord::from_signals(&[Signal::Io, Signal::J, Signal::Sr]);
        assert_eq!(None, set.beyond(w, 3).map(|s| s.name));
        assert_eq!(Some("SR"), set.beyond(w, 2).map(|s| s.name));
        assert_eq!(Some("J"), set.beyond(w, 1).map(|s| s.name));
    }
}
