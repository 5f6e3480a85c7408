use common::{ControlWord, Opcode, Signal};
use strum::IntoEnumIterator;

use crate::config::RomConfig;
use crate::expand::{BranchRule, FETCH_STEPS};
use crate::table::{words, InstructionTable};
use crate::RomError;

use Signal::*;

const FETCH: [&[Signal]; FETCH_STEPS] = [
    &[Mi, Co],
    &[Ro, Ii, Ce],
];

/// Execute steps of `op`, following the shared fetch. Conditional jumps get
/// their not-taken body here; the taken body comes from `branch_rules`.
fn execute(op: Opcode) -> Vec<&'static [Signal]> {
    match op {
        Opcode::Nop => vec![],
        Opcode::Lda => vec![&[Io, Mi], &[Ro, Ai]],
        Opcode::Add => vec![&[Io, Mi], &[Ro, Bi], &[Eo, Ai, Fi]],
        Opcode::Sub => vec![&[Io, Mi], &[Ro, Bi], &[Eo, Su, Ai, Fi]],
        Opcode::Sta => vec![&[Io, Mi], &[Ao, Ri]],
        Opcode::Ldi => vec![&[Io, Ai]],
        Opcode::Jmp => vec![&[Io, J]],
        Opcode::Jc | Opcode::Jz | Opcode::Jnc | Opcode::Jnz => vec![],
        Opcode::Out => vec![&[Ao, Oi]],
        Opcode::Hlt => vec![&[Hlt], &[Hlt]],
        Opcode::Adi => vec![&[Io, Bi], &[Eo, Ai, Fi]],
        Opcode::Sbi => vec![&[Io, Bi], &[Eo, Su, Ai, Fi]],
        Opcode::Tba => vec![&[Bo, Ai]],
    }
}

fn has_step_reset(config: &RomConfig) -> bool {
    (Sr.word() as usize) < config.words
}

/// Whether every signal `op` asserts lives in a word the revision materializes.
fn available(config: &RomConfig, op: Opcode) -> bool {
    execute(op).iter()
        .flat_map(|step| step.iter())
        .all(|s| (s.word() as usize) < config.words)
}

/// The flag-independent microprogram for `config`'s revision. Without flag
/// inputs there is no flags register to load, so `FI` is left out.
pub fn base_table(config: &RomConfig) -> Result<InstructionTable, RomError> {
    let mut builder = InstructionTable::builder(config.opcode_bits, config.step_bits)?.fetch(&FETCH);
    let sr = has_step_reset(config);
    let fi = config.flag_bits > 0;

    for op in Opcode::iter() {
        if !op.fits(config.opcode_bits) || !available(config, op) {
            log::debug!("{}: {} left out", config.name, op);
            continue;
        }

        let mut body = words(&execute(op));
        if !fi {
            body.iter_mut().for_each(|w| *w = w.without(Fi));
        }
        if op.condition().is_some() {
            if sr {
                body.push(ControlWord::from(Sr));
            }
        } else if sr && op != Opcode::Hlt {
            if let Some(last) = body.last_mut() {
                *last = last.with(Sr);
            }
        }
        builder.define_words(op.value(), op.mnemonic(), body)?;
    }

    builder.build()
}

/// Taken sequences for the conditional jumps present in `config`'s revision.
/// Revisions without flag inputs have none.
pub fn branch_rules(config: &RomConfig) -> Vec<BranchRule> {
    if config.flag_bits == 0 {
        return Vec::new();
    }

    let mut taken = vec![ControlWord::from_signals(&[Io, J])];
    if has_step_reset(config) {
        taken.push(ControlWord::from(Sr));
    }

    Opcode::iter()
        .filter(|op| op.fits(config.opcode_bits))
        .filter_map(|op| op.condition().map(|condition| BranchRule {
            opcode: op.value(),
            condition,
            decision_step: FETCH_STEPS,
            taken: taken.clone(),
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Revision;
    use crate::expand::FlagVariants;
    use crate::table::TableEntry;

    fn table(revision: Revision) -> InstructionTable {
        base_table(&revision.config()).unwrap()
    }

    #[test]
    fn nop_is_fetch_only() {
        for revision in Revision::iter() {
            let t = table(revision);
            let nop = t.sequence(Opcode::Nop.value()).unwrap();
            assert_eq!(Some(ControlWord::from_signals(&[Mi, Co])), nop.word(0));
            assert_eq!(Some(ControlWord::from_signals(&[Ro, Ii, Ce])), nop.word(1));
            assert!(nop.words()[2..].iter().all(|w| w.is_nop()), "{}", revision);
        }
    }

    #[test]
    fn halt_holds() {
        for revision in Revision::iter() {
            let hlt = table(revision).sequence(Opcode::Hlt.value()).unwrap().clone();
            let held = hlt.words().windows(2).any(|w| w[0].contains(Hlt) && w[1].contains(Hlt));
            assert!(held, "{}", revision);
        }
    }

    /// Steps the revision should give `entry`: fetch, the execute body, and
    /// a trailing `SR` step for a not-taken conditional jump.
    fn declared_len(config: &RomConfig, entry: &TableEntry) -> usize {
        match Opcode::from_u8(entry.opcode).filter(|_| entry.assigned) {
            Some(op) => {
                let reset = op.condition().is_some() && has_step_reset(config);
                FETCH.len() + execute(op).len() + reset as usize
            }
            None => FETCH.len(),
        }
    }

    #[test]
    fn sequences_end_where_declared() {
        for revision in Revision::iter() {
            let config = revision.config();
            let t = table(revision);
            for entry in t.entries() {
                let len = declared_len(&config, entry);
                let words = entry.sequence.words();
                assert_eq!(t.steps(), words.len());
                assert!(!words[len - 1].is_nop(), "{} {} step {}", revision, entry.mnemonic, len - 1);
                assert!(words[len..].iter().all(|w| w.is_nop()), "{} {} past step {}", revision, entry.mnemonic, len);
            }
        }
    }

    #[test]
    fn non_branching_identical_per_revision() {
        for revision in Revision::iter() {
            let config = revision.config();
            let variants = FlagVariants::new(table(revision), &branch_rules(&config)).unwrap();
            for (flags, t) in variants.iter() {
                for entry in t.entries() {
                    let branching = Opcode::from_u8(entry.opcode).and_then(Opcode::condition).is_some();
                    if !branching {
                        assert_eq!(variants.base().entry(entry.opcode), Some(entry),
                            "{} {} under {}", revision, entry.mnemonic, flags.label());
                    }
                }
            }
        }
    }

    #[test]
    fn flags_loaded_only_with_flag_inputs() {
        let fi_steps = |revision: Revision, op: Opcode| -> Vec<usize> {
            table(revision).sequence(op.value()).unwrap().words().iter()
                .enumerate()
                .filter(|(_, w)| w.contains(Fi))
                .map(|(i, _)| i)
                .collect()
        };
        assert!(fi_steps(Revision::Legacy, Opcode::Add).is_empty());
        assert!(fi_steps(Revision::Legacy, Opcode::Sub).is_empty());
        assert_eq!(vec![4], fi_steps(Revision::Dual, Opcode::Add));
        assert_eq!(vec![4], fi_steps(Revision::Dual4Bit, Opcode::Sub));
        assert_eq!(vec![3], fi_steps(Revision::Triple, Opcode::Adi));

        let legacy = table(Revision::Legacy);
        assert_eq!(Some(ControlWord::from_signals(&[Eo, Ai])), legacy.word(Opcode::Add.value(), 4));
    }

    #[test]
    fn step_reset_only_with_third_word() {
        let dual = table(Revision::Dual);
        assert!(dual.entries().iter().all(|e| e.sequence.words().iter().all(|w| !w.contains(Sr))));

        let triple = table(Revision::Triple);
        let lda = triple.sequence(Opcode::Lda.value()).unwrap();
        assert_eq!(Some(ControlWord::from_signals(&[Ro, Ai, Sr])), lda.word(3));
        let jc = triple.sequence(Opcode::Jc.value()).unwrap();
        assert_eq!(Some(ControlWord::from(Sr)), jc.word(2));
        let hlt = triple.sequence(Opcode::Hlt.value()).unwrap();
        assert!(!hlt.words().iter().any(|w| w.contains(Sr)));
    }

    #[test]
    fn opcodes_follow_revision() {
        let legacy = table(Revision::Legacy);
        assert_eq!(16, legacy.opcode_count());
        assert_eq!("OP9", legacy.entry(9).unwrap().mnemonic);
        assert_eq!("OUT", legacy.entry(0xE).unwrap().mnemonic);

        let dual = table(Revision::Dual);
        assert_eq!(32, dual.opcode_count());
        assert!(dual.entry(Opcode::Adi.value()).unwrap().assigned);
        assert!(!dual.entry(Opcode::Tba.value()).unwrap().assigned);

        let triple = table(Revision::Triple);
        assert!(triple.entry(Opcode::Tba.value()).unwrap().assigned);
    }

    #[test]
    fn rules_per_revision() {
        assert!(branch_rules(&Revision::Legacy.config()).is_empty());

        let dual4: Vec<_> = branch_rules(&Revision::Dual4Bit.config()).iter().map(|r| r.opcode).collect();
        assert_eq!(vec![0x07, 0x08], dual4);

        let triple = branch_rules(&Revision::Triple.config());
        assert_eq!(4, triple.len());
        assert!(triple.iter().all(|r| r.taken == vec![ControlWord::from_signals(&[Io, J]), ControlWord::from(Sr)]));
    }
}
