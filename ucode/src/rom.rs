use std::collections::HashSet;

use common::ControlWord;

use crate::expand::FlagVariants;
use crate::layout::{AddressLayout, AddressParts, FieldKind};
use crate::signals::SignalSet;
use crate::RomError;

/// One byte-addressable ROM, exactly `2^address_bits` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RomImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RomImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn check_shape(layout: &AddressLayout, variants: &FlagVariants, signals: &SignalSet, words: usize) -> Result<(), RomError> {
    let select = layout.width(FieldKind::Select);
    if select > 0 && 1usize << select != words {
        return Err(RomError::LayoutMismatch(format!(
            "{}-bit select field for {} word(s)", select, words)));
    }

    for (flags, table) in variants.iter() {
        if table.opcode_count() != layout.opcode_count() || table.steps() != layout.step_count() {
            return Err(RomError::LayoutMismatch(format!(
                "table {} is {}x{} but the address space is {}x{}",
                flags.label(), table.opcode_count(), table.steps(),
                layout.opcode_count(), layout.step_count())));
        }

        for entry in table.entries() {
            for (step, word) in entry.sequence.words().iter().enumerate() {
                if let Some(spec) = signals.beyond(*word, words) {
                    return Err(RomError::SignalOutOfPlane {
                        opcode: entry.opcode,
                        step,
                        signal: spec.name.to_string(),
                        word: spec.word,
                        words,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Every address must decode to its own tuple, otherwise some tuple has no
/// address and is never written.
fn check_coverage(image: &str, decoded: &[AddressParts]) -> Result<(), RomError> {
    let mut seen = HashSet::with_capacity(decoded.len());
    match decoded.iter().position(|parts| !seen.insert(*parts)) {
        Some(address) => Err(RomError::IncompleteCoverage { image: image.to_string(), address }),
        None => Ok(()),
    }
}

/// Walks every address of `layout` and stores the selected 8-bit slice of
/// the control word found there. Addresses with any unused line set hold
/// the zero word.
///
/// With a select field there is one image and the select bits pick the
/// word. Without one, each of the `words` words gets its own image.
pub fn materialize(layout: &AddressLayout, variants: &FlagVariants, signals: &SignalSet, words: usize) -> Result<Vec<RomImage>, RomError> {
    check_shape(layout, variants, signals, words)?;

    let selected = layout.width(FieldKind::Select) > 0;
    let names: Vec<String> = if selected || words == 1 {
        vec!["control".to_string()]
    } else {
        (0..words).map(|i| format!("word{}", i)).collect()
    };

    let decoded = (0..layout.size())
        .map(|address| layout.decode(address as u32))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(name) = names.first() {
        check_coverage(name, &decoded)?;
    }

    let mut images = Vec::with_capacity(names.len());
    for (plane, name) in names.into_iter().enumerate() {
        let bytes = decoded.iter().map(|parts| {
            let word = if selected { parts.select as usize } else { plane };
            if parts.unused != 0 {
                return Ok(ControlWord::NOP.byte(word));
            }
            variants.get(parts.flags)
                .word(parts.opcode, parts.step)
                .map(|control| control.byte(word))
                .ok_or_else(|| RomError::LayoutMismatch(format!(
                    "no control word for opcode {:#04x} step {}", parts.opcode, parts.step)))
        }).collect::<Result<Vec<u8>, RomError>>()?;

        log::info!("{}: {} bytes", name, bytes.len());
        images.push(RomImage { name, bytes });
    }

    Ok(images)
}
