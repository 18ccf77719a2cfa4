#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use treest::ascii::AsciiPrinter;
use treest::ignore::IgnoreList;
use treest::model::{Flags, NodeId};
use treest::session::Session;
use treest::tree::Tree;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Writer whose bytes stay readable after being boxed away.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds a directory tree from `entries`: a trailing `/` makes a directory,
/// anything else an empty file.
pub fn fixture(entries: &[&str]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for entry in entries {
        let path = root.join(entry.trim_end_matches('/'));
        if entry.ends_with('/') {
            fs::create_dir_all(&path).unwrap();
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, b"").unwrap();
        }
    }
    (dir, root)
}

pub fn open(root: &Path) -> Tree {
    open_with(root, Flags::default(), &[])
}

pub fn open_with(root: &Path, flags: Flags, patterns: &[&str]) -> Tree {
    let filter = IgnoreList::new(root.to_path_buf(), patterns);
    Tree::open(root.to_path_buf(), flags, Box::new(filter)).unwrap()
}

pub struct Harness {
    pub session: Session,
    pub screen: SharedBuf,
    pub echo: SharedBuf,
}

pub fn session(root: &Path) -> Harness {
    let screen = SharedBuf::default();
    let echo = SharedBuf::default();
    let printer = Box::new(AsciiPrinter::new(screen.clone()));
    let session = Session::detached(open(root), printer, Box::new(echo.clone()));
    Harness { session, screen, echo }
}

impl Harness {
    /// Feeds `bytes` and steps until they are consumed or a quit is requested.
    /// Running out of input counts as quitting with 0.
    pub fn keys(&mut self, bytes: &[u8]) -> i32 {
        self.session.quit = None;
        self.session.input.feed(bytes);
        self.session.run_to_end().unwrap()
    }

    pub fn cursor_name(&self) -> String {
        name(&self.session.tree, self.session.cursor)
    }
}

pub fn name(tree: &Tree, id: NodeId) -> String {
    tree.node(id).name().to_string_lossy().into_owned()
}

pub fn names(tree: &Tree, id: NodeId) -> Vec<String> {
    tree.children(id).iter().map(|&c| name(tree, c)).collect()
}

pub fn child(tree: &Tree, id: NodeId, wanted: &str) -> NodeId {
    tree.find_child(id, wanted.as_bytes())
        .unwrap_or_else(|| panic!("no child {wanted}"))
}
