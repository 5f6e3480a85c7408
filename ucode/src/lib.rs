extern crate strum;
#[macro_use]
extern crate strum_macros;

use std::path::Path;

pub mod config;
pub mod error;
pub mod expand;
pub mod export;
pub mod layout;
pub mod output;
pub mod program;
pub mod rom;
pub mod signals;
pub mod table;

pub use config::{Revision, RomConfig};
pub use error::RomError;
pub use expand::{expand, BranchRule, FlagVariants};
pub use export::{describe, DecodeTable};
pub use layout::{AddressLayout, AddressParts, FieldKind};
pub use output::{write_artifacts, Artifact, ImageFormat};
pub use rom::{materialize, RomImage};
pub use signals::SignalSet;
pub use table::InstructionTable;

/// A revision's complete control store: validated layout, catalogue and the
/// four flag tables. Everything fallible happens in `build`.
#[derive(Clone, Debug)]
pub struct Microcode {
    config: RomConfig,
    layout: AddressLayout,
    signals: SignalSet,
    variants: FlagVariants,
}

impl Microcode {
    pub fn build(config: RomConfig) -> Result<Microcode, RomError> {
        let layout = config.layout()?;
        let signals = SignalSet::standard()?;
        let base = program::base_table(&config)?;
        let variants = FlagVariants::new(base, &program::branch_rules(&config))?;

        log::info!("{}: {} word(s), {}-bit address", config.name, config.words, layout.address_bits());
        Ok(Microcode { config, layout, signals, variants })
    }

    pub fn config(&self) -> &RomConfig {
        &self.config
    }

    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    pub fn variants(&self) -> &FlagVariants {
        &self.variants
    }

    pub fn images(&self) -> Result<Vec<RomImage>, RomError> {
        materialize(&self.layout, &self.variants, &self.signals, self.config.words)
    }

    pub fn decode_table(&self) -> DecodeTable {
        DecodeTable::new(&self.signals, &self.layout, &self.variants)
    }

    /// Every image plus `<prefix>-decode.csv`, rendered but not yet written.
    pub fn artifacts(&self, dir: &Path, prefix: &str, format: ImageFormat) -> Result<Vec<Artifact>, RomError> {
        let mut artifacts: Vec<Artifact> = self.images()?
            .iter()
            .map(|image| Artifact::image(dir, prefix, image, format))
            .collect::<Result<_, _>>()?;
        artifacts.push(Artifact {
            path: dir.join(format!("{}-decode.csv", prefix)),
            contents: self.decode_table().to_csv().into_bytes(),
        });
        Ok(artifacts)
    }
}
