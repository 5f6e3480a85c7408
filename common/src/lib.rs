extern crate strum;
#[macro_use]
extern crate strum_macros;

extern crate packed_struct;
extern crate packed_struct_codegen;
use packed_struct::prelude::*;

#[macro_use]
extern crate bitflags;

use std::{fmt, ops::BitOr};

use strum::IntoEnumIterator;

pub mod hexfile;

pub const WORD_BITS: u32 = 8;
pub const MAX_WORDS: usize = 4;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const CARRY = 0b01;
        const ZERO = 0b10;
    }
}

impl Flags {
    /// Every (zero, carry) combination, ordered by the raw flag bits.
    pub fn combinations() -> impl Iterator<Item = Flags> {
        (0..=Flags::all().bits()).map(Flags::from_bits_truncate)
    }

    pub fn label(self) -> String {
        let z = if self.contains(Flags::ZERO) { 'Z' } else { '-' };
        let c = if self.contains(Flags::CARRY) { 'C' } else { '-' };
        format!("{}{}", z, c)
    }
}

/// A branch condition: taken when `flag` is set (or clear, when `when_set` is false).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Condition {
    pub flag: Flags,
    pub when_set: bool,
}

impl Condition {
    pub fn holds(&self, flags: Flags) -> bool {
        flags.contains(self.flag) == self.when_set
    }
}

#[derive(Clone, Copy, Display, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(EnumCount, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Signal {
    // word 0
    Hlt, // halt the clock
    Mi,  // memory address register in
    Ri,  // RAM in
    Ro,  // RAM out
    Io,  // instruction register out (operand nibble)
    Ii,  // instruction register in
    Ai,  // A register in
    Ao,  // A register out

    // word 1
    Eo, // ALU sum out
    Su, // ALU subtract
    Bi, // B register in
    Oi, // output display in
    Ce, // program counter enable (increment)
    Co, // program counter out
    J,  // jump: program counter in
    Fi, // flags register in

    // word 2
    Sr, // reset the micro-step counter
    Bo, // B register out
}

impl Signal {
    /// Index of the 8-bit word this signal lives in.
    pub const fn word(self) -> u8 {
        match self {
            Signal::Hlt | Signal::Mi | Signal::Ri | Signal::Ro
            | Signal::Io | Signal::Ii | Signal::Ai | Signal::Ao => 0,
            Signal::Eo | Signal::Su | Signal::Bi | Signal::Oi
            | Signal::Ce | Signal::Co | Signal::J | Signal::Fi => 1,
            Signal::Sr | Signal::Bo => 2,
        }
    }

    /// Bit position inside `word()`.
    pub const fn bit(self) -> u8 {
        match self {
            Signal::Hlt | Signal::Eo | Signal::Sr => 7,
            Signal::Mi | Signal::Su | Signal::Bo => 6,
            Signal::Ri | Signal::Bi => 5,
            Signal::Ro | Signal::Oi => 4,
            Signal::Io | Signal::Ce => 3,
            Signal::Ii | Signal::Co => 2,
            Signal::Ai | Signal::J => 1,
            Signal::Ao | Signal::Fi => 0,
        }
    }

    pub const fn mask(self) -> u32 {
        1 << (self.word() as u32 * WORD_BITS + self.bit() as u32)
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// The set of signals asserted during one micro-step, packed into the logical
/// control word. Word `i` occupies bits `8*i..8*i+7`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ControlWord(u32);

impl ControlWord {
    pub const NOP: ControlWord = ControlWord(0);

    pub const fn from_bits(bits: u32) -> ControlWord {
        ControlWord(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn from_signals(signals: &[Signal]) -> ControlWord {
        signals.iter().fold(ControlWord::NOP, |w, s| w.with(*s))
    }

    pub fn with(self, signal: Signal) -> ControlWord {
        ControlWord(self.0 | signal.mask())
    }

    pub fn without(self, signal: Signal) -> ControlWord {
        ControlWord(self.0 & !signal.mask())
    }

    pub fn contains(self, signal: Signal) -> bool {
        self.0 & signal.mask() != 0
    }

    pub fn is_nop(self) -> bool {
        self.0 == 0
    }

    /// The 8-bit slice for `word`.
    pub fn byte(self, word: usize) -> u8 {
        self.0.checked_shr(word as u32 * WORD_BITS).unwrap_or(0) as u8
    }

    /// Asserted signals in catalogue order.
    pub fn signals(self) -> impl Iterator<Item = Signal> {
        Signal::iter().filter(move |s| self.contains(*s))
    }
}

impl BitOr for ControlWord {
    type Output = ControlWord;

    fn bitor(self, rhs: ControlWord) -> ControlWord {
        ControlWord(self.0 | rhs.0)
    }
}

impl From<Signal> for ControlWord {
    fn from(signal: Signal) -> ControlWord {
        ControlWord(signal.mask())
    }
}

impl fmt::Debug for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}[", self.0)?;
        for (i, s) in self.signals().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}

#[derive(Clone, Copy, Display, Debug, PartialEq, Eq, Hash)]
#[derive(EnumCount, EnumIter, EnumString, IntoStaticStr)]
#[derive(PrimitiveEnum_u8)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Opcode {
    Nop = 0x00, // no operation
    Lda = 0x01, // MEM[operand] -> A
    Add = 0x02, // A + MEM[operand] -> A + FLAGS
    Sub = 0x03, // A - MEM[operand] -> A + FLAGS
    Sta = 0x04, // A -> MEM[operand]
    Ldi = 0x05, // operand -> A
    Jmp = 0x06, // operand -> PC
    Jc = 0x07,  // if CARRY { operand -> PC }
    Jz = 0x08,  // if ZERO { operand -> PC }
    Out = 0x0E, // A -> display
    Hlt = 0x0F, // stop the clock

    Adi = 0x10, // A + operand -> A + FLAGS
    Sbi = 0x11, // A - operand -> A + FLAGS
    Jnc = 0x12, // if !CARRY { operand -> PC }
    Jnz = 0x13, // if !ZERO { operand -> PC }
    Tba = 0x14, // B -> A
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Opcode> {
        Opcode::from_primitive(value)
    }

    pub fn value(self) -> u8 {
        self.to_primitive()
    }

    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Whether the opcode value is addressable with `opcode_bits` bits.
    pub fn fits(self, opcode_bits: u32) -> bool {
        (self.value() as u32) < (1 << opcode_bits)
    }

    /// The flag test of a conditional jump.
    pub fn condition(self) -> Option<Condition> {
        match self {
            Opcode::Jc => Some(Condition { flag: Flags::CARRY, when_set: true }),
            Opcode::Jz => Some(Condition { flag: Flags::ZERO, when_set: true }),
            Opcode::Jnc => Some(Condition { flag: Flags::CARRY, when_set: false }),
            Opcode::Jnz => Some(Condition { flag: Flags::ZERO, when_set: false }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::EnumCount;

    #[test]
    fn signal_positions_unique() {
        let mut seen = 0u32;
        for s in Signal::iter() {
            assert!(s.bit() < 8);
            assert_eq!(0, seen & s.mask(), "{} reuses a bit", s);
            seen |= s.mask();
        }
        assert_eq!(Signal::COUNT as u32, seen.count_ones());
    }

    #[test]
    fn control_word_slices() {
        let w = ControlWord::from_signals(&[Signal::Mi, Signal::Co, Signal::Sr]);
        assert_eq!(0b0100_0000, w.byte(0));
        assert_eq!(0b0000_0100, w.byte(1));
        assert_eq!(0b1000_0000, w.byte(2));
        assert_eq!(0, w.byte(3));

        let w = w.without(Signal::Co).without(Signal::Fi);
        assert_eq!(ControlWord::from_signals(&[Signal::Mi, Signal::Sr]), w);
    }

    #[test]
    fn signals_in_catalogue_order() {
        let w = ControlWord::from_signals(&[Signal::Ce, Signal::Ii, Signal::Ro]);
        let names: Vec<_> = w.signals().map(Signal::name).collect();
        assert_eq!(vec!["RO", "II", "CE"], names);
        assert_eq!("000814[RO II CE]", format!("{:?}", w));
    }

    #[test]
    fn opcode_lookup() {
        assert_eq!(Some(Opcode::Hlt), Opcode::from_u8(0x0F));
        assert_eq!(None, Opcode::from_u8(0x09));
        assert_eq!("JNZ", Opcode::Jnz.mnemonic());
        assert!(Opcode::Out.fits(4));
        assert!(!Opcode::Adi.fits(4));
        assert_eq!(Opcode::COUNT, Opcode::iter().count());
    }

    #[test]
    fn conditions() {
        let jc = Opcode::Jc.condition().unwrap();
        assert!(jc.holds(Flags::CARRY));
        assert!(jc.holds(Flags::all()));
        assert!(!jc.holds(Flags::ZERO));

        let jnz = Opcode::Jnz.condition().unwrap();
        assert!(jnz.holds(Flags::empty()));
        assert!(!jnz.holds(Flags::ZERO));
        assert_eq!(None, Opcode::Jmp.condition());
    }

    #[test]
    fn flag_combinations() {
        let labels: Vec<_> = Flags::combinations().map(Flags::label).collect();
        assert_eq!(vec!["--", "-C", "Z-", "ZC"], labels);
    }
}
