//! Machine-level errors.

use std::path::PathBuf;

use format_sna::SnaError;
use format_z80::Z80Error;

use crate::SpectrumModel;

#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    #[error("ROM image is empty")]
    EmptyRom,
    #[error("ROM image is {actual} bytes, this model takes at most {expected}")]
    RomTooLarge { expected: usize, actual: usize },
    #[error("the SmartCard only fits a 48K machine")]
    SmartCardModel,
    #[error("no SmartCard ROM configured")]
    NoSmartCard,
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: file is empty", .0.display())]
    EmptyFile(PathBuf),
    #[error("{}: not a .sna or .z80 snapshot", .0.display())]
    UnknownFormat(PathBuf),
    #[error("snapshot needs a {needed:?}, this machine is a {machine:?}")]
    ModelMismatch {
        needed: SpectrumModel,
        machine: SpectrumModel,
    },
    #[error("SNA snapshots can only hold a 48K machine")]
    SnaRequires48K,
    #[error(transparent)]
    Sna(#[from] SnaError),
    #[error(transparent)]
    Z80(#[from] Z80Error),
}
