#![forbid(unsafe_code)]

use std::ffi::OsStr;
use std::fs::Metadata;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::PathBuf;

/// Handle to a node slot in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Unknown,
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    Regular,
    Symlink,
    Socket,
    Executable,
}

impl Kind {
    /// Classifies from `lstat` metadata; a regular file with any exec bit is `Executable`.
    pub fn classify(meta: &Metadata) -> Kind {
        let ft = meta.file_type();
        if ft.is_symlink() {
            Kind::Symlink
        } else if ft.is_dir() {
            Kind::Directory
        } else if ft.is_file() {
            if meta.mode() & 0o111 != 0 {
                Kind::Executable
            } else {
                Kind::Regular
            }
        } else if ft.is_fifo() {
            Kind::Fifo
        } else if ft.is_char_device() {
            Kind::CharDevice
        } else if ft.is_block_device() {
            Kind::BlockDevice
        } else if ft.is_socket() {
            Kind::Socket
        } else {
            Kind::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub mode: u32,
}

impl From<&Metadata> for Stat {
    fn from(meta: &Metadata) -> Self {
        Self {
            size: meta.size(),
            atime: meta.atime(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
            mode: meta.mode(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dir {
    pub unfolded: bool,
    pub children: Option<Vec<NodeId>>,
}

#[derive(Debug, Clone, Default)]
pub struct Link {
    /// Raw `readlink` text, or the error text when the link could not be read.
    pub readpath: String,
    pub target: Option<NodeId>,
    pub tail: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Dir(Dir),
    Link(Link),
    Plain,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub path: PathBuf,
    pub kind: Kind,
    pub stat: Stat,
    pub payload: Payload,
    pub parent: Option<NodeId>,
    pub index: usize,
    pub count: usize,
}

impl Node {
    /// Last path component; empty for `/`.
    pub fn name(&self) -> &OsStr {
        self.path.file_name().unwrap_or_default()
    }

    pub fn name_bytes(&self) -> &[u8] {
        self.name().as_bytes()
    }

    pub fn dir(&self) -> Option<&Dir> {
        match &self.payload {
            Payload::Dir(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn dir_mut(&mut self) -> Option<&mut Dir> {
        match &mut self.payload {
            Payload::Dir(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&Link> {
        match &self.payload {
            Payload::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn link_mut(&mut self) -> Option<&mut Link> {
        match &mut self.payload {
            Payload::Link(link) => Some(link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Extension,
    ATime,
    MTime,
    CTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOrder {
    pub key: SortKey,
    pub reverse: bool,
    pub dirs_first: bool,
}

impl SortOrder {
    pub fn by(key: SortKey) -> Self {
        Self { key, ..Self::default() }
    }

    /// Switches to `key`, or back to name order when `key` is already active.
    pub fn toggle_key(&mut self, key: SortKey) {
        self.key = if self.key == key { SortKey::Name } else { key };
    }
}

/// Process-wide display flags; they only affect future scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub show_hidden: bool,
    pub ignore_backups: bool,
    pub ignore: bool,
    pub sort: SortOrder,
    pub watch: bool,
}

impl Flags {
    pub fn toggle(&mut self, flag: u8) -> bool {
        match flag {
            b'A' | b'a' => self.show_hidden = !self.show_hidden,
            b'B' => self.ignore_backups = !self.ignore_backups,
            b'I' => self.ignore = !self.ignore,
            b'S' => self.sort.toggle_key(SortKey::Size),
            b'X' => self.sort.toggle_key(SortKey::Extension),
            b'c' => self.sort.toggle_key(SortKey::CTime),
            b't' => self.sort.toggle_key(SortKey::MTime),
            b'u' => self.sort.toggle_key(SortKey::ATime),
            b'd' => self.sort.dirs_first = !self.sort.dirs_first,
            b'r' => self.sort.reverse = !self.sort.reverse,
            b'w' => self.watch = !self.watch,
            _ => return false,
        }
        true
    }
}
