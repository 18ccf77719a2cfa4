#![forbid(unsafe_code)]

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::model::{Kind, NodeId};
use crate::tree::{MAX_LINK_DEPTH, ROOT, Tree};
use crate::ui::{Frame, Glyphs, Indent, Printer};

const GLYPHS: Glyphs = Glyphs {
    indent: "\u{2502}\u{a0}\u{a0} ",
    indent_last: "\u{a0}\u{a0}\u{a0} ",
    branch: "\u{251c}\u{2500}\u{2500} ",
    branch_last: "\u{2514}\u{2500}\u{2500} ",
};

/// Full-screen printer: redraws from the top-left. With colors toggled on it
/// colors by kind and shows the cursor in reverse video.
pub struct FancyPrinter<W: Write> {
    out: W,
    classify: bool,
    colors: bool,
    indent: Indent,
}

impl<W: Write> FancyPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, classify: false, colors: false, indent: Indent::default() }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn name_of(&mut self, tree: &Tree, id: NodeId) -> io::Result<()> {
        let node = tree.node(id);
        let name = node.name().to_string_lossy().into_owned();
        if self.colors {
            let (color, bold) = color_of(tree, id);
            if bold {
                queue!(self.out, SetAttribute(Attribute::Bold))?;
            }
            queue!(self.out, SetForegroundColor(color), Print(name), ResetColor, SetAttribute(Attribute::Reset))
        } else {
            queue!(self.out, Print(name))
        }
    }

    fn decorate(&mut self, tree: &Tree, id: NodeId) -> io::Result<()> {
        let mut shown = id;
        for _ in 0..MAX_LINK_DEPTH {
            let node = tree.node(shown);
            match node.kind {
                Kind::Symlink => {
                    queue!(self.out, Print("@ -> "))?;
                    let Some(link) = node.link() else { return Ok(()) };
                    let Some(tail) = link.tail else {
                        return queue!(self.out, Print(&link.readpath));
                    };
                    self.name_of(tree, tail)?;
                    shown = tail;
                }
                Kind::Directory => {
                    queue!(self.out, Print("/"))?;
                    if tree.is_unfolded(shown) && tree.children(shown).is_empty() {
                        queue!(self.out, Print(" (/)"))?;
                    }
                    return Ok(());
                }
                Kind::Fifo => return queue!(self.out, Print("|")),
                Kind::Socket => return queue!(self.out, Print("=")),
                Kind::Executable => return queue!(self.out, Print("*")),
                _ => return Ok(()),
            }
        }
        Ok(())
    }
}

fn color_of(tree: &Tree, id: NodeId) -> (Color, bool) {
    let node = tree.node(id);
    match node.kind {
        Kind::Directory => (Color::Blue, true),
        Kind::Symlink => match node.link().and_then(|link| link.tail) {
            Some(_) => (Color::Cyan, true),
            None => (Color::Red, true),
        },
        Kind::Fifo => (Color::Yellow, false),
        Kind::Socket => (Color::Magenta, true),
        Kind::BlockDevice | Kind::CharDevice => (Color::Yellow, true),
        Kind::Executable => (Color::Green, true),
        Kind::Regular => (Color::Reset, false),
        Kind::Unknown => (Color::DarkRed, false),
    }
}

impl<W: Write> Printer for FancyPrinter<W> {
    fn name(&self) -> &'static str {
        "fancy"
    }

    fn teardown(&mut self) -> io::Result<()> {
        queue!(self.out, Show, ResetColor)?;
        self.out.flush()
    }

    fn toggle(&mut self, flag: u8) -> bool {
        match flag {
            b'F' => self.classify = !self.classify,
            b'c' => self.colors = !self.colors,
            _ => return false,
        }
        true
    }

    fn begin(&mut self, _frame: &Frame) -> io::Result<()> {
        self.indent.reset();
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::All), Clear(ClearType::Purge), Hide)
    }

    fn node(&mut self, frame: &Frame, id: NodeId) -> io::Result<()> {
        if id != ROOT {
            let prefix = self.indent.prefix(frame.is_last(id), &GLYPHS);
            queue!(self.out, Print(prefix))?;
        }
        if id == frame.cursor {
            if self.colors {
                queue!(self.out, SetAttribute(Attribute::Reverse))?;
            } else {
                queue!(self.out, Print("> "))?;
            }
        }
        self.name_of(frame.tree, id)?;
        if id == frame.cursor && self.colors {
            queue!(self.out, SetAttribute(Attribute::NoReverse))?;
        }
        if self.classify {
            self.decorate(frame.tree, id)?;
        }
        queue!(self.out, Print(frame.newline()))
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
        queue!(self.out, Show)?;
        self.out.flush()
    }
}
