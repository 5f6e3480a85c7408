use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use ucode::{write_artifacts, Artifact, ImageFormat, Microcode, Revision, RomConfig, RomImage};

#[derive(Parser)]
#[command(name = "romgen")]
#[command(about = "Generates control store and display ROM images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the control ROM image(s) and the decode table
    Ucode {
        #[command(flatten)]
        source: Source,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// File name prefix (defaults to the revision name)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Image format: "bin" or "hex"
        #[arg(short, long, default_value = "bin")]
        format: ImageFormat,
    },
    /// Print the decode table
    Table {
        #[command(flatten)]
        source: Source,
    },
    /// Write the seven-segment display ROM
    Segment {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Image format: "bin" or "hex"
        #[arg(short, long, default_value = "bin")]
        format: ImageFormat,
    },
}

#[derive(Args)]
struct Source {
    /// Built-in revision: legacy, dual-4bit, dual or triple
    #[arg(short, long, default_value = "dual", conflicts_with = "config")]
    revision: Revision,

    /// TOML file describing the revision
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Source {
    fn config(&self) -> anyhow::Result<RomConfig> {
        match &self.config {
            Some(path) => RomConfig::load(path)
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(self.revision.config()),
        }
    }
}

fn segment(out: &Path, format: ImageFormat) -> anyhow::Result<()> {
    let bytes = segment::segment_rom().map_err(|e| anyhow!("packing segment entry: {:?}", e))?;
    let image = RomImage { name: "segment".to_string(), bytes };
    let path = out.join(format!("segment-rom.{}", format.extension()));
    let contents = format.render(&image).with_context(|| format!("rendering {}", path.display()))?;
    let artifact = Artifact { path, contents };
    write_artifacts(&[artifact])?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Ucode { source, out, prefix, format } => {
            let config = source.config()?;
            let prefix = prefix.unwrap_or_else(|| config.name.clone());
            let microcode = Microcode::build(config).context("building microcode")?;
            let artifacts = microcode.artifacts(&out, &prefix, format)?;
            write_artifacts(&artifacts).context("writing artifacts")?;
        }
        Command::Table { source } => {
            let microcode = Microcode::build(source.config()?).context("building microcode")?;
            print!("{}", microcode.decode_table().to_text());
        }
        Command::Segment { out, format } => {
            segment(&out, format)?;
        }
    }

    Ok(())
}
