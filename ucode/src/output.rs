use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use common::hexfile::HexFile;

use crate::rom::RomImage;
use crate::RomError;

#[derive(Clone, Copy, Display, Debug, PartialEq, Eq)]
#[derive(EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    /// Raw bytes, no header.
    Bin,
    /// Logisim "v2.0 raw" text.
    Hex,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Bin => "bin",
            ImageFormat::Hex => "hex",
        }
    }

    pub fn render(self, image: &RomImage) -> io::Result<Vec<u8>> {
        match self {
            ImageFormat::Bin => Ok(image.bytes.clone()),
            ImageFormat::Hex => {
                let mut out = Vec::new();
                HexFile::from_bytes(Some(&image.name), &image.bytes).write(&mut out)?;
                Ok(out)
            }
        }
    }
}

/// A fully rendered output file, waiting to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn image(dir: &Path, prefix: &str, image: &RomImage, format: ImageFormat) -> Result<Artifact, RomError> {
        let path = dir.join(format!("{}-{}.{}", prefix, image.name, format.extension()));
        let contents = format.render(image).map_err(io_error(&path))?;
        Ok(Artifact { path, contents })
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn partial_path(path: &Path) -> PathBuf {
    with_suffix(path, ".partial")
}

fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".previous")
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> RomError + '_ {
    move |source| RomError::Io { path: path.to_path_buf(), source }
}

fn write_partials(artifacts: &[Artifact], written: &mut Vec<PathBuf>) -> Result<(), RomError> {
    for artifact in artifacts {
        if let Some(dir) = artifact.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(io_error(dir))?;
            }
        }
        let partial = partial_path(&artifact.path);
        fs::write(&partial, &artifact.contents).map_err(io_error(&partial))?;
        written.push(partial);
    }
    Ok(())
}

/// Files moved so far by `place`, so a failed run can be undone.
#[derive(Default)]
struct Placed {
    targets: Vec<PathBuf>,
    backups: Vec<(PathBuf, PathBuf)>,
}

impl Placed {
    fn rollback(&self, artifacts: &[Artifact]) {
        for target in &self.targets {
            if let Err(e) = fs::remove_file(target) {
                log::warn!("rollback: cannot remove {}: {}", target.display(), e);
            }
        }
        for (backup, target) in &self.backups {
            if let Err(e) = fs::rename(backup, target) {
                log::warn!("rollback: cannot restore {}: {}", target.display(), e);
            }
        }
        for artifact in artifacts {
            let partial = partial_path(&artifact.path);
            if partial.exists() {
                let _ = fs::remove_file(&partial);
            }
        }
    }

    fn discard_backups(&self) {
        for (backup, _) in &self.backups {
            if let Err(e) = fs::remove_file(backup) {
                log::warn!("cannot remove {}: {}", backup.display(), e);
            }
        }
    }
}

fn place(artifacts: &[Artifact], placed: &mut Placed) -> Result<(), RomError> {
    for artifact in artifacts {
        let target = &artifact.path;
        if target.is_file() {
            let backup = backup_path(target);
            fs::rename(target, &backup).map_err(io_error(target))?;
            placed.backups.push((backup, target.clone()));
        }
        fs::rename(partial_path(target), target).map_err(io_error(target))?;
        placed.targets.push(target.clone());
    }
    Ok(())
}

/// Writes every artifact or none. Contents go to `*.partial` files first.
/// Once all of them exist they are renamed into place, and existing files
/// are kept as `*.previous` until the last rename succeeds. On any failure
/// the files already placed are removed and the previous ones restored.
pub fn write_artifacts(artifacts: &[Artifact]) -> Result<(), RomError> {
    let mut written = Vec::new();
    if let Err(e) = write_partials(artifacts, &mut written) {
        for partial in &written {
            let _ = fs::remove_file(partial);
        }
        return Err(e);
    }

    let mut placed = Placed::default();
    if let Err(e) = place(artifacts, &mut placed) {
        placed.rollback(artifacts);
        return Err(e);
    }
    placed.discard_backups();

    for artifact in artifacts {
        log::info!("wrote {} ({} bytes)", artifact.path.display(), artifact.contents.len());
    }
    Ok(())
}
