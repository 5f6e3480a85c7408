use std::path::Path;

use common::{Flags, MAX_WORDS};
use serde::Deserialize;

use crate::layout::{AddressLayout, FieldKind};
use crate::RomError;

/// Largest control word the microprogram knows how to fill.
pub const MAX_CONTROL_WORDS: usize = 3;

/// Shape of one hardware revision of the control store.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RomConfig {
    pub name: String,
    /// 8-bit words in the logical control word.
    pub words: usize,
    /// Address lines above the flags that are wired but carry no meaning.
    #[serde(default)]
    pub unused_bits: u32,
    pub flag_bits: u32,
    #[serde(default)]
    pub select_bits: u32,
    pub opcode_bits: u32,
    pub step_bits: u32,
    /// When present, must equal the sum of the field widths.
    #[serde(default)]
    pub address_bits: Option<u32>,
}

#[derive(Clone, Copy, Display, Debug, PartialEq, Eq)]
#[derive(EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Revision {
    /// Two 2 KiB left/right ROMs, 4-bit opcodes, no flags, A7..A10 unused.
    Legacy,
    /// One 1 KiB ROM, two words behind a select bit, 4-bit opcodes.
    #[strum(to_string = "dual-4bit")]
    Dual4Bit,
    /// One 2 KiB ROM, two words behind a select bit, 5-bit opcodes.
    Dual,
    /// Three 1 KiB ROMs, one per word, 5-bit opcodes.
    Triple,
}

impl Revision {
    pub fn config(self) -> RomConfig {
        let (words, unused_bits, flag_bits, select_bits, opcode_bits) = match self {
            Revision::Legacy => (2, 4, 0, 0, 4),
            Revision::Dual4Bit => (2, 0, 2, 1, 4),
            Revision::Dual => (2, 0, 2, 1, 5),
            Revision::Triple => (3, 0, 2, 0, 5),
        };
        RomConfig {
            name: self.to_string(),
            words,
            unused_bits,
            flag_bits,
            select_bits,
            opcode_bits,
            step_bits: 3,
            address_bits: None,
        }
    }
}

impl RomConfig {
    pub fn from_toml(text: &str) -> Result<RomConfig, RomError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<RomConfig, RomError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| RomError::Io { path: path.to_path_buf(), source })?;
        RomConfig::from_toml(&text)
    }

    /// Whether images share one address space through the select field.
    pub fn uses_select(&self) -> bool {
        self.select_bits > 0
    }

    /// Checks the word count against the select field and builds the address
    /// layout: unused, flags, select, opcode, step from most to least
    /// significant.
    pub fn layout(&self) -> Result<AddressLayout, RomError> {
        if self.words == 0 || self.words > MAX_CONTROL_WORDS.min(MAX_WORDS) {
            return Err(RomError::WordCount { max: MAX_CONTROL_WORDS, found: self.words });
        }
        if self.uses_select() {
            let selectable = 1usize.checked_shl(self.select_bits).unwrap_or(0);
            if selectable != self.words {
                return Err(RomError::SelectMismatch {
                    bits: self.select_bits,
                    selectable,
                    words: self.words,
                });
            }
        }
        let flag_width = Flags::all().bits().count_ones();
        if self.flag_bits != 0 && self.flag_bits != flag_width {
            return Err(RomError::FlagWidth { expected: flag_width, found: self.flag_bits });
        }

        let widths = [
            (FieldKind::Unused, self.unused_bits),
            (FieldKind::Flags, self.flag_bits),
            (FieldKind::Select, self.select_bits),
            (FieldKind::Opcode, self.opcode_bits),
            (FieldKind::Step, self.step_bits),
        ];
        AddressLayout::check_widths(&widths)?;
        let fields = AddressLayout::stack(&widths);
        let sum = widths.iter().map(|(_, w)| *w).sum();
        AddressLayout::new(fields, self.address_bits.unwrap_or(sum))
    }
}
