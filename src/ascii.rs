#![forbid(unsafe_code)]

use std::io::{self, Write};

use crate::fs_ops::format_time;
use crate::model::{Kind, NodeId};
use crate::tree::{MAX_LINK_DEPTH, ROOT};
use crate::ui::{Frame, Glyphs, Indent, Printer};

const GLYPHS: Glyphs = Glyphs {
    indent: "|   ",
    indent_last: "    ",
    branch: "|-- ",
    branch_last: "`-- ",
};

#[derive(Debug, Default, Clone, Copy)]
struct AsciiFlags {
    classify: bool,
    relative: bool,
    index: bool,
    mtime: bool,
}

/// Colorless printer: one line per visible node, `> ` marks the cursor.
pub struct AsciiPrinter<W: Write> {
    out: W,
    flags: AsciiFlags,
    indent: Indent,
}

impl<W: Write> AsciiPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, flags: AsciiFlags::default(), indent: Indent::default() }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn label(&self, frame: &Frame, id: NodeId) -> String {
        let node = frame.tree.node(id);
        if self.flags.relative {
            let root = &frame.tree.node(ROOT).path;
            if let Ok(rel) = node.path.strip_prefix(root) {
                if !rel.as_os_str().is_empty() {
                    return rel.to_string_lossy().into_owned();
                }
            }
            return node.path.to_string_lossy().into_owned();
        }
        node.name().to_string_lossy().into_owned()
    }
}

impl<W: Write> Printer for AsciiPrinter<W> {
    fn name(&self) -> &'static str {
        "ascii"
    }

    fn toggle(&mut self, flag: u8) -> bool {
        let flags = &mut self.flags;
        match flag {
            b'F' => flags.classify = !flags.classify,
            b'P' => flags.relative = !flags.relative,
            b'i' => flags.index = !flags.index,
            b'm' => flags.mtime = !flags.mtime,
            _ => return false,
        }
        true
    }

    fn begin(&mut self, frame: &Frame) -> io::Result<()> {
        self.indent.reset();
        self.out.write_all(frame.newline().as_bytes())
    }

    fn node(&mut self, frame: &Frame, id: NodeId) -> io::Result<()> {
        let mut line = String::new();
        if id != ROOT {
            line.push_str(&self.indent.prefix(frame.is_last(id), &GLYPHS));
        }
        if id == frame.cursor {
            line.push_str("> ");
        }
        if self.flags.mtime {
            line.push_str(&format_time(frame.tree.node(id).stat.mtime));
            line.push(' ');
        }
        if self.flags.index {
            line.push_str(&format!("[{:2}] ", frame.tree.node(id).index));
        }

        let mut shown = id;
        for _ in 0..=MAX_LINK_DEPTH {
            let node = frame.tree.node(shown);
            line.push_str(&self.label(frame, shown));
            if self.flags.index && matches!(node.kind, Kind::Directory | Kind::Symlink) {
                line.push_str(&format!(" [/{}] ", node.count));
            }
            if !self.flags.classify {
                break;
            }
            match node.kind {
                Kind::Symlink => {
                    line.push_str("@ -> ");
                    let Some(link) = node.link() else { break };
                    match link.target {
                        Some(target) => {
                            shown = target;
                            continue;
                        }
                        None => line.push_str(&link.readpath),
                    }
                }
                Kind::Directory => line.push('/'),
                Kind::Fifo => line.push('|'),
                Kind::Socket => line.push('='),
                Kind::Executable => line.push('*'),
                _ => {}
            }
            break;
        }

        line.push_str(frame.newline());
        self.out.write_all(line.as_bytes())
    }

    fn enter(&mut self, frame: &Frame, id: NodeId) -> io::Result<()> {
        self.indent.push(frame.is_last(id));
        Ok(())
    }

    fn leave(&mut self, _frame: &Frame, _id: NodeId) -> io::Result<()> {
        self.indent.pop();
        Ok(())
    }

    fn end(&mut self, _frame: &Frame) -> io::Result<()> {
        self.out.flush()
    }
}
