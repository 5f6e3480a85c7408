use std::path::PathBuf;

use thiserror::Error;

use crate::layout::FieldKind;

/// Everything that can go wrong while building control-store images. All of
/// these are detected before any artifact is written.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("signals '{first}' and '{second}' both claim bit {bit} of word {word}")]
    BitCollision { word: u8, bit: u8, first: String, second: String },
    #[error("signal '{name}' is declared at bit {bit} of word {word}, outside the 8-bit word range")]
    BitOutOfRange { name: String, word: u8, bit: u8 },
    #[error("signal '{0}' declared more than once")]
    DuplicateSignal(String),
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("opcode {opcode:#04x} ({mnemonic}) has {len} steps but only {max} fit the step field")]
    SequenceOverflow { opcode: u8, mnemonic: String, len: usize, max: usize },
    #[error("opcode {opcode:#04x} does not fit in {bits} opcode bits")]
    OpcodeOutOfRange { opcode: u8, bits: u32 },
    #[error("opcode {0:#04x} defined more than once")]
    DuplicateOpcode(u8),
    #[error("opcode {0:#04x} is not in the instruction table")]
    UnknownOpcode(u8),
    #[error("branch for opcode {opcode:#04x} patches step {step}, which is part of the fetch cycle")]
    BranchIntoFetch { opcode: u8, step: usize },
    #[error("opcode {0:#04x} has more than one branch rule")]
    DuplicateBranch(u8),
    #[error("branch for opcode {opcode:#04x} must test exactly one flag, found {flags}")]
    BranchFlag { opcode: u8, flags: String },

    #[error("address fields are {fields} bits wide but the address is declared as {address_bits} bits")]
    LayoutWidth { fields: u32, address_bits: u32 },
    #[error("address field {0} overlaps another field")]
    LayoutOverlap(FieldKind),
    #[error("address layout has no {0} field")]
    MissingField(FieldKind),
    #[error("address field {0} appears more than once")]
    DuplicateField(FieldKind),
    #[error("the {width}-bit {field} field is wider than the {max}-bit maximum")]
    FieldTooWide { field: FieldKind, width: u32, max: u32 },
    #[error("a {0}-bit address is wider than any supported ROM")]
    AddressTooWide(u32),
    #[error("flag field must be 0 or {expected} bits wide, not {found}")]
    FlagWidth { expected: u32, found: u32 },
    #[error("a {bits}-bit select field addresses {selectable} words but the control word has {words}")]
    SelectMismatch { bits: u32, selectable: usize, words: usize },
    #[error("control word must have between 1 and {max} words, not {found}")]
    WordCount { max: usize, found: usize },

    #[error("address {address:#x} is outside the {size}-entry address range")]
    AddressOutOfRange { address: u32, size: usize },
    #[error("value {value} does not fit the {width}-bit {field} field")]
    FieldOverflow { field: FieldKind, value: u32, width: u32 },
    #[error("instruction tables do not match the address layout: {0}")]
    LayoutMismatch(String),
    #[error("opcode {opcode:#04x} step {step} asserts {signal}, which lives in word {word} but only {words} word(s) are materialized")]
    SignalOutOfPlane { opcode: u8, step: usize, signal: String, word: u8, words: usize },
    #[error("image '{image}': address {address:#x} decodes like an earlier address, so some address tuple is never written")]
    IncompleteCoverage { image: String, address: usize },

    #[error("invalid ROM configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
