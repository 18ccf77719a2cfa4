#![forbid(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;

use crate::actions;
use crate::commands::{Command, LAST, Registers};
use crate::error::Result;
use crate::input::{Incoming, Input};
use crate::model::NodeId;
use crate::term::Terminal;
use crate::tree::{ROOT, Tree};
use crate::ui::{self, Frame, Printer};

/// Deepest chain of registers and control-flow bodies allowed to run.
pub const MAX_NESTING: usize = 64;

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const CTRL_G: u8 = 0x07;
const CTRL_H: u8 = 0x08;
const CTRL_L: u8 = 0x0c;
const CTRL_W: u8 = 0x17;
const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    StartsWith,
    Contains,
    EndsWith,
}

impl Match {
    pub fn test(self, name: &[u8], pattern: &[u8]) -> bool {
        match self {
            Match::StartsWith => name.starts_with(pattern),
            Match::Contains => pattern.is_empty() || name.windows(pattern.len()).any(|w| w == pattern),
            Match::EndsWith => name.ends_with(pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub kind: Match,
    pub pattern: Vec<u8>,
}

/// Everything the interpreter mutates: the tree, the cursor, registers and
/// the I/O endpoints. Handlers in `actions` receive it whole.
pub struct Session {
    pub tree: Tree,
    pub cursor: NodeId,
    pub registers: Registers,
    pub search: Option<Search>,
    pub input: Input,
    pub quit: Option<i32>,
    pub(crate) printer: Box<dyn Printer>,
    pub(crate) term: Terminal,
    pub(crate) shell: PathBuf,
    echo: Box<dyn Write>,
}

impl Session {
    pub fn new(
        tree: Tree,
        printer: Box<dyn Printer>,
        input: Input,
        term: Terminal,
        echo: Box<dyn Write>,
        shell: PathBuf,
    ) -> Self {
        Self {
            tree,
            cursor: ROOT,
            registers: Registers::default(),
            search: None,
            input,
            quit: None,
            printer,
            term,
            shell,
            echo,
        }
    }

    /// No terminal and no background input; bytes come from `input.feed`.
    pub fn detached(tree: Tree, printer: Box<dyn Printer>, echo: Box<dyn Write>) -> Self {
        Self::new(tree, printer, Input::detached(), Terminal::detached(), echo, PathBuf::from("/bin/sh"))
    }

    pub fn printer_mut(&mut self) -> &mut dyn Printer {
        self.printer.as_mut()
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal {
        &mut self.term
    }

    pub fn set_shell(&mut self, shell: PathBuf) {
        self.shell = shell;
    }

    fn newline(&self) -> &'static str {
        if self.term.is_raw() { "\r\n" } else { "\n" }
    }

    fn echo_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.echo.write_all(bytes)?;
        self.echo.flush()?;
        Ok(())
    }

    /// One line on the echo stream, e.g. `! path not found`.
    pub fn message(&mut self, text: &str) -> Result<()> {
        log::info!("{text}");
        let line = format!("{text}{}", self.newline());
        self.echo_bytes(line.as_bytes())
    }

    pub fn render(&mut self) -> Result<()> {
        let frame = Frame { tree: &self.tree, cursor: self.cursor, raw: self.term.is_raw() };
        ui::draw(self.printer.as_mut(), &frame)?;
        Ok(())
    }

    pub fn reload_root(&mut self) -> Result<()> {
        self.tree.reload(ROOT, &mut self.cursor)
    }

    /// Next command or prompt byte. Filesystem changes reload and redraw
    /// in place; `None` once every source is closed.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.input.read()? {
                Incoming::Byte(byte) => return Ok(Some(byte)),
                Incoming::Changed => {
                    log::debug!("filesystem changed, reloading");
                    self.reload_root()?;
                    self.render()?;
                }
                Incoming::Closed => return Ok(None),
            }
        }
    }

    fn aborted(&mut self) -> Result<()> {
        let line = format!("- aborted{}", self.newline());
        self.echo_bytes(line.as_bytes())
    }

    fn record(&mut self, bytes: &[u8]) {
        if self.input.depth() == 0 {
            self.registers.append(LAST, bytes);
        }
    }

    /// Line prompt. Accepted answers are appended to the last-command
    /// register, each terminated by a tab.
    pub fn prompt(&mut self, label: &str) -> Result<Option<Vec<u8>>> {
        let answer = self.prompt_line(label)?;
        if let Some(answer) = &answer {
            self.record(answer);
            self.record(b"\t");
        }
        Ok(answer)
    }

    fn prompt_line(&mut self, label: &str) -> Result<Option<Vec<u8>>> {
        self.echo_bytes(format!("{label}: ").as_bytes())?;
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let Some(byte) = self.read_byte()? else {
                self.aborted()?;
                return Ok(None);
            };
            match byte {
                CTRL_L => {
                    self.render()?;
                    let mut again = format!("{label}: ").into_bytes();
                    again.extend_from_slice(&buf);
                    self.echo_bytes(&again)?;
                }
                CTRL_C | CTRL_D | CTRL_G | ESC => {
                    self.aborted()?;
                    return Ok(None);
                }
                CTRL_H | DEL => {
                    if buf.pop().is_some() {
                        self.echo_bytes(b"\x08 \x08")?;
                    }
                }
                CTRL_W => {
                    while buf.pop().is_some() {
                        self.echo_bytes(b"\x08 \x08")?;
                        if buf.last() == Some(&b' ') {
                            break;
                        }
                    }
                }
                b'\t' if self.input.was_programmatic() => break,
                b'\n' | b'\r' => break,
                _ => {
                    self.echo_bytes(&[byte])?;
                    buf.push(byte);
                }
            }
        }
        self.echo_bytes(self.newline().as_bytes())?;
        Ok(Some(buf))
    }

    /// Single-byte prompt; also aborts on a newline.
    pub fn prompt1(&mut self, label: &str) -> Result<Option<u8>> {
        loop {
            self.echo_bytes(format!("{label}: ").as_bytes())?;
            let Some(byte) = self.read_byte()? else {
                self.aborted()?;
                return Ok(None);
            };
            match byte {
                CTRL_L => {
                    self.render()?;
                    continue;
                }
                CTRL_C | CTRL_D | CTRL_G | ESC | b'\n' | b'\r' => {
                    self.aborted()?;
                    return Ok(None);
                }
                _ => {
                    let mut shown = vec![byte];
                    shown.extend_from_slice(self.newline().as_bytes());
                    self.echo_bytes(&shown)?;
                    self.record(&[byte]);
                    return Ok(Some(byte));
                }
            }
        }
    }

    /// Unmapped bytes are no-ops that report failure.
    pub fn run_command(&mut self, byte: u8) -> Result<bool> {
        let Some(command) = Command::from_byte(byte) else { return Ok(false) };
        actions::run(self, command)
    }

    /// Runs `bytes` as commands. Prompts issued by those commands read their
    /// answers from the remaining bytes first.
    pub fn run_commands(&mut self, bytes: &[u8]) -> Result<bool> {
        let level = self.input.depth();
        if level >= MAX_NESTING {
            self.message("! commands nested too deeply")?;
            return Ok(false);
        }
        self.input.push_frame(bytes);
        let mut outcome = Ok(true);
        while self.quit.is_none() {
            let Some(byte) = self.input.frame_byte(level) else { break };
            if let Err(err) = self.run_command(byte) {
                outcome = Err(err);
                break;
            }
        }
        self.input.pop_frame();
        outcome
    }

    /// Reads and runs one top-level command. The last-command register is
    /// restarted with the byte when it names a command other than the repeat
    /// itself; unmapped bytes leave it alone.
    pub fn step(&mut self) -> Result<()> {
        let Some(byte) = self.read_byte()? else {
            log::info!("every input source closed");
            self.quit = Some(0);
            return Ok(());
        };
        if matches!(Command::from_byte(byte), Some(command) if command != Command::Rerun) {
            self.registers.set(LAST, vec![byte]);
        }
        let done = self.run_command(byte)?;
        log::debug!("command {:?} -> {done}", char::from(byte));
        Ok(())
    }

    /// Steps until a quit is requested, without rendering.
    pub fn run_to_end(&mut self) -> Result<i32> {
        while self.quit.is_none() {
            self.step()?;
        }
        Ok(self.quit.unwrap_or(0))
    }
}
