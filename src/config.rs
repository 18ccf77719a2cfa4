#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::ignore::IgnoreList;
use crate::model::Flags;

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Interactive, vi-style tree browser for the terminal.
#[derive(Debug, Parser, Clone)]
#[command(name = "treest", version, about)]
pub struct Args {
    /// Directory to browse
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Printer used to draw the tree (`ascii` or `fancy`)
    #[arg(short, long, default_value = "ascii")]
    pub printer: String,

    /// Flags to toggle at startup, one letter each (e.g. `-t FA`)
    #[arg(short, long = "toggle", value_name = "FLAGS")]
    pub toggles: Vec<String>,

    /// Printer command to run at startup
    #[arg(short = 'x', long = "command", value_name = "CMD")]
    pub commands: Vec<String>,

    /// Ignore pattern; turns ignore filtering on
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// File of ignore patterns, one per line
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,

    /// Commands to run before reading the keyboard
    #[arg(short, long, value_name = "FILE")]
    pub rcfile: Option<PathBuf>,

    /// Reload when watched directories change
    #[arg(short, long)]
    pub watch: bool,

    /// Print the key bindings and exit
    #[arg(long)]
    pub keys: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub printer: String,
    pub toggles: Vec<u8>,
    pub printer_commands: Vec<String>,
    pub ignore: Vec<String>,
    pub rcfile: Option<PathBuf>,
    pub watch: bool,
    pub shell: PathBuf,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Config> {
        let root = fs::canonicalize(&args.root).map_err(|source| Error::Root {
            path: args.root.clone(),
            source,
        })?;
        let mut ignore = args.ignore;
        if let Some(file) = &args.ignore_file {
            let text = fs::read_to_string(file).map_err(|source| Error::Script {
                path: file.clone(),
                source,
            })?;
            ignore.extend(text.lines().map(str::to_owned));
        }
        let shell = env::var_os("TREEST_SHELL")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL));
        Ok(Config {
            root,
            printer: args.printer,
            toggles: args.toggles.concat().into_bytes(),
            printer_commands: args.commands,
            ignore,
            rcfile: args.rcfile,
            watch: args.watch,
            shell,
        })
    }

    /// Ignore patterns are rooted at the browsed directory.
    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::new(self.root.clone(), &self.ignore)
    }

    /// Starting flags, before any `--toggle`.
    pub fn flags(&self) -> Flags {
        Flags {
            ignore: !self.ignore_list().is_empty(),
            watch: self.watch,
            ..Flags::default()
        }
    }
}
