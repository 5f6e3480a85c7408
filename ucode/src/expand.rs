use common::{Condition, ControlWord, Flags};

use crate::table::InstructionTable;
use crate::RomError;

/// Steps before this are the fetch cycle and are shared by every opcode.
pub const FETCH_STEPS: usize = 2;

/// Patches `opcode` from `decision_step` on with `taken` whenever
/// `condition` holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchRule {
    pub opcode: u8,
    pub condition: Condition,
    pub decision_step: usize,
    pub taken: Vec<ControlWord>,
}

fn check_rules(base: &InstructionTable, rules: &[BranchRule]) -> Result<(), RomError> {
    let mut seen = Vec::new();
    for rule in rules {
        if seen.contains(&rule.opcode) {
            return Err(RomError::DuplicateBranch(rule.opcode));
        }
        seen.push(rule.opcode);

        if rule.condition.flag.bits().count_ones() != 1 {
            return Err(RomError::BranchFlag {
                opcode: rule.opcode,
                flags: rule.condition.flag.label(),
            });
        }
        if rule.decision_step < FETCH_STEPS {
            return Err(RomError::BranchIntoFetch { opcode: rule.opcode, step: rule.decision_step });
        }

        let entry = base.entry(rule.opcode).ok_or(RomError::UnknownOpcode(rule.opcode))?;
        let len = rule.decision_step + rule.taken.len();
        if len > base.steps() {
            return Err(RomError::SequenceOverflow {
                opcode: rule.opcode,
                mnemonic: entry.mnemonic.clone(),
                len,
                max: base.steps(),
            });
        }
    }
    Ok(())
}

/// A fresh copy of `base` with every rule whose condition holds under `flags`
/// applied. `base` itself is never modified.
pub fn expand(base: &InstructionTable, rules: &[BranchRule], flags: Flags) -> Result<InstructionTable, RomError> {
    check_rules(base, rules)?;

    let mut table = base.clone();
    for rule in rules.iter().filter(|r| r.condition.holds(flags)) {
        log::trace!("flags {}: branch {:#04x} taken from step {}", flags.label(), rule.opcode, rule.decision_step);
        table.patch(rule.opcode, rule.decision_step, &rule.taken)?;
    }
    Ok(table)
}

/// One instruction table per flag combination, indexed by the raw flag bits.
#[derive(Clone, Debug)]
pub struct FlagVariants {
    base: InstructionTable,
    tables: Vec<InstructionTable>,
}

impl FlagVariants {
    pub fn new(base: InstructionTable, rules: &[BranchRule]) -> Result<FlagVariants, RomError> {
        let tables = Flags::combinations()
            .map(|flags| expand(&base, rules, flags))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("expanded {} branch rule(s) into {} flag tables", rules.len(), tables.len());
        Ok(FlagVariants { base, tables })
    }

    pub fn base(&self) -> &InstructionTable {
        &self.base
    }

    pub fn get(&self, flags: Flags) -> &InstructionTable {
        &self.tables[flags.bits() as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flags, &InstructionTable)> {
        Flags::combinations().zip(self.tables.iter())
    }
}
