use common::ControlWord;

use crate::expand::FlagVariants;
use crate::layout::{AddressLayout, FieldKind};
use crate::signals::SignalSet;

pub const SIGNAL_SEPARATOR: &str = "|";
const COLUMN_SEPARATOR: &str = ";";

/// Label used for rows taken straight from the base table.
pub const BASE_FLAGS: &str = "-";

/// Catalogue-ordered signal names of `word`, joined with `|`. The zero word
/// is the empty string.
pub fn describe(signals: &SignalSet, word: ControlWord) -> String {
    signals.decode(word).join(SIGNAL_SEPARATOR)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeRow {
    pub mnemonic: String,
    pub opcode: String,
    pub flags: String,
    pub steps: Vec<String>,
}

impl DecodeRow {
    fn cells(&self) -> impl Iterator<Item = &str> {
        [self.mnemonic.as_str(), self.opcode.as_str(), self.flags.as_str()]
            .into_iter()
            .chain(self.steps.iter().map(String::as_str))
    }
}

/// The human-readable verification table: one row per opcode, plus one row
/// per flag combination under which a flag-dependent opcode differs from the
/// base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeTable {
    header: Vec<String>,
    rows: Vec<DecodeRow>,
}

impl DecodeTable {
    pub fn new(signals: &SignalSet, layout: &AddressLayout, variants: &FlagVariants) -> DecodeTable {
        let opcode_bits = layout.width(FieldKind::Opcode) as usize;
        let base = variants.base();

        let mut header = vec!["mnemonic".to_string(), "opcode".to_string(), "flags".to_string()];
        header.extend((0..base.steps()).map(|s| format!("T{}", s)));

        let row = |mnemonic: &str, opcode: u8, flags: String, words: &[ControlWord]| DecodeRow {
            mnemonic: mnemonic.to_string(),
            opcode: format!("{:0width$b}", opcode, width = opcode_bits),
            flags,
            steps: words.iter().map(|w| describe(signals, *w)).collect(),
        };

        let has_flags = layout.width(FieldKind::Flags) > 0;
        let mut rows = Vec::new();
        for entry in base.entries() {
            rows.push(row(&entry.mnemonic, entry.opcode, BASE_FLAGS.to_string(), entry.sequence.words()));
            if !has_flags {
                continue;
            }
            for (flags, table) in variants.iter() {
                if let Some(variant) = table.sequence(entry.opcode) {
                    if *variant != entry.sequence {
                        rows.push(row(&entry.mnemonic, entry.opcode, flags.label(), variant.words()));
                    }
                }
            }
        }

        DecodeTable { header, rows }
    }

    pub fn rows(&self) -> &[DecodeRow] {
        &self.rows
    }

    pub fn to_csv(&self) -> String {
        let mut out = self.header.join(COLUMN_SEPARATOR);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.cells().collect::<Vec<_>>().join(COLUMN_SEPARATOR));
            out.push('\n');
        }
        out
    }

    /// Space-padded columns for a terminal. Trailing empty steps are kept so
    /// every row has the same number of columns.
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row.cells()) {
                *w = (*w).max(cell.len());
            }
        }

        let line = |cells: Vec<&str>| {
            let padded: Vec<String> = cells.iter().zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect();
            let mut l = padded.join("  ").trim_end().to_string();
            l.push('\n');
            l
        };

        let mut out = line(self.header.iter().map(String::as_str).collect());
        for row in &self.rows {
            out.push_str(&line(row.cells().collect()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Revision;
    use crate::program::{base_table, branch_rules};
    use common::Signal::*;

    fn table(revision: Revision) -> DecodeTable {
        let config = revision.config();
        let variants = FlagVariants::new(base_table(&config).unwrap(), &branch_rules(&config)).unwrap();
        DecodeTable::new(&SignalSet::standard().unwrap(), &config.layout().unwrap(), &variants)
    }

    #[test]
    fn describe_words() {
        let signals = SignalSet::standard().unwrap();
        assert_eq!("", describe(&signals, ControlWord::NOP));
        assert_eq!("MI|CO", describe(&signals, ControlWord::from_signals(&[Co, Mi])));
        assert_eq!("IO|J|SR", describe(&signals, ControlWord::from_signals(&[Sr, J, Io])));
    }

    #[test]
    fn csv_rows() {
        let csv = table(Revision::Dual4Bit).to_csv();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!("mnemonic;opcode;flags;T0;T1;T2;T3;T4;T5;T6;T7", lines[0]);
        assert_eq!("NOP;0000;-;MI|CO;RO|II|CE;;;;;;", lines[1]);
        assert!(lines.contains(&"HLT;1111;-;MI|CO;RO|II|CE;HLT;HLT;;;;"));
        // JC and JZ each differ from the base under two flag combinations
        assert_eq!(1 + 16 + 4, lines.len());
        assert!(lines.contains(&"JC;0111;-C;MI|CO;RO|II|CE;IO|J;;;;;"));
        assert!(lines.contains(&"JZ;1000;ZC;MI|CO;RO|II|CE;IO|J;;;;;"));
    }

    #[test]
    fn no_flag_rows_without_flags() {
        let t = table(Revision::Legacy);
        assert_eq!(16, t.rows().len());
        assert!(t.rows().iter().all(|r| r.flags == BASE_FLAGS));
    }

    #[test]
    fn text_is_aligned() {
        let text = table(Revision::Dual).to_text();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("mnemonic  opcode  flags  T0"));
        let lda = lines.find(|l| l.starts_with("LDA")).unwrap();
        assert!(lda.starts_with("LDA       00001   -      MI|CO"));
    }
}
