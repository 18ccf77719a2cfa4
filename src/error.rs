#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open {}: {source}", path.display())]
    Root { path: PathBuf, source: io::Error },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("root {} disappeared", .0.display())]
    RootGone(PathBuf),

    #[error("unknown printer '{0}' (available: {known})", known = crate::ui::PRINTERS.join(", "))]
    UnknownPrinter(String),

    #[error("no such flag '{0}'")]
    UnknownFlag(char),

    #[error("printer {printer} rejected command '{command}'")]
    PrinterCommand { printer: String, command: String },

    #[error("cannot read {}: {source}", path.display())]
    Script { path: PathBuf, source: io::Error },

    #[error("terminal setup failed: {0}")]
    Terminal(io::Error),

    #[error("input failed: {0}")]
    Input(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
