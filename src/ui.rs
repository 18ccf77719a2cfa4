#![forbid(unsafe_code)]

use std::io::{self, Write};

use crate::ascii::AsciiPrinter;
use crate::fancy::FancyPrinter;
use crate::ignore::Filter;
use crate::model::NodeId;
use crate::tree::{ROOT, Tree};

pub const PRINTERS: [&str; 2] = ["ascii", "fancy"];

/// State handed to every printer callback during one render pass.
pub struct Frame<'a> {
    pub tree: &'a Tree,
    pub cursor: NodeId,
    /// Output goes to a raw-mode terminal: lines end with `\r\n`.
    pub raw: bool,
}

impl Frame<'_> {
    pub fn newline(&self) -> &'static str {
        if self.raw { "\r\n" } else { "\n" }
    }

    /// Whether `id` is the last child of its parent.
    pub fn is_last(&self, id: NodeId) -> bool {
        let node = self.tree.node(id);
        match node.parent {
            Some(parent) => self.tree.node(parent).count.saturating_sub(1) == node.index,
            None => true,
        }
    }
}

/// Renderer contract. Toggles a printer does not recognise fall back to the
/// global flags; `command` handles printer-specific sub-commands.
pub trait Printer {
    fn name(&self) -> &'static str;

    fn setup(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn teardown(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn toggle(&mut self, _flag: u8) -> bool {
        false
    }

    fn command(&mut self, _text: &str) -> bool {
        false
    }

    /// Replaces the ignore-pattern matcher during scans when present.
    fn filter(&self) -> Option<Box<dyn Filter>> {
        None
    }

    fn begin(&mut self, frame: &Frame) -> io::Result<()>;
    fn node(&mut self, frame: &Frame, id: NodeId) -> io::Result<()>;
    fn enter(&mut self, frame: &Frame, id: NodeId) -> io::Result<()>;
    fn leave(&mut self, frame: &Frame, id: NodeId) -> io::Result<()>;
    fn end(&mut self, frame: &Frame) -> io::Result<()>;
}

pub fn printer_by_name(name: &str, out: Box<dyn Write>) -> Option<Box<dyn Printer>> {
    match name {
        "ascii" => Some(Box::new(AsciiPrinter::new(out))),
        "fancy" => Some(Box::new(FancyPrinter::new(out))),
        _ => None,
    }
}

/// Depth-first pre-order over the visible tree.
pub fn draw(printer: &mut dyn Printer, frame: &Frame) -> io::Result<()> {
    printer.begin(frame)?;
    walk(printer, frame, ROOT)?;
    printer.end(frame)
}

fn walk(printer: &mut dyn Printer, frame: &Frame, id: NodeId) -> io::Result<()> {
    printer.node(frame, id)?;
    if frame.tree.is_unfolded(id) {
        printer.enter(frame, id)?;
        for &child in frame.tree.children(id) {
            walk(printer, frame, child)?;
        }
        printer.leave(frame, id)?;
    }
    Ok(())
}

/// Shared indentation state for the line-based printers.
#[derive(Debug, Default)]
pub struct Indent {
    lasts: Vec<bool>,
}

impl Indent {
    pub fn reset(&mut self) {
        self.lasts.clear();
    }

    pub fn push(&mut self, last: bool) {
        self.lasts.push(last);
    }

    pub fn pop(&mut self) {
        self.lasts.pop();
    }

    /// Prefix for a non-root node: one column per open ancestor, then the branch.
    pub fn prefix(&self, last: bool, glyphs: &Glyphs) -> String {
        let mut out = String::new();
        // the root's own level has no column
        for &ancestor_last in self.lasts.iter().skip(1) {
            out.push_str(if ancestor_last { glyphs.indent_last } else { glyphs.indent });
        }
        out.push_str(if last { glyphs.branch_last } else { glyphs.branch });
        out
    }
}

pub struct Glyphs {
    pub indent: &'static str,
    pub indent_last: &'static str,
    pub branch: &'static str,
    pub branch_last: &'static str,
}
