#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread;

use inotify::Inotify;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Keyboard,
    Watch,
}

pub(crate) enum Event {
    Keys(Vec<u8>),
    Changed,
    Closed(Source),
    Failed(Source, io::Error),
}

/// What the interpreter gets when it asks for the next byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    Byte(u8),
    /// The filesystem changed under a watched directory.
    Changed,
    /// Every source is exhausted.
    Closed,
}

/// Byte sources, read in priority order: nested command frames (innermost
/// first), the loopback queue, then the keyboard and watch threads.
///
/// The keyboard thread only reads after receiving a permit, so it never
/// swallows keys meant for a child process while a shell command runs.
pub struct Input {
    frames: Vec<VecDeque<u8>>,
    loopback: VecDeque<u8>,
    typed: VecDeque<u8>,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    permit: Option<SyncSender<()>>,
    armed: bool,
    sources: usize,
    programmatic: bool,
}

impl Input {
    /// No background sources: only fed bytes are ever returned.
    pub fn detached() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            frames: Vec::new(),
            loopback: VecDeque::new(),
            typed: VecDeque::new(),
            tx,
            rx,
            permit: None,
            armed: false,
            sources: 0,
            programmatic: false,
        }
    }

    pub fn with_keyboard<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let mut input = Self::detached();
        let (permit, permits) = mpsc::sync_channel(1);
        let tx = input.tx.clone();
        thread::Builder::new()
            .name("keyboard".into())
            .spawn(move || read_keys(reader, permits, tx))
            .map_err(|err| Error::Input(format!("cannot start keyboard reader: {err}")))?;
        input.permit = Some(permit);
        input.sources += 1;
        Ok(input)
    }

    pub fn attach_watch(&mut self, inotify: Inotify) -> Result<()> {
        crate::watch::spawn(inotify, self.tx.clone())
            .map_err(|err| Error::Input(format!("cannot start watcher: {err}")))?;
        self.sources += 1;
        Ok(())
    }

    /// Queues bytes as if they had been typed by a program.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.loopback.extend(bytes);
    }

    /// Queues a startup script ahead of the keyboard.
    pub fn feed_file(&mut self, path: &Path) -> Result<()> {
        let script = fs::read(path).map_err(|source| Error::Script {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("queued {} bytes from {}", script.len(), path.display());
        self.feed(&script);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self, bytes: &[u8]) {
        self.frames.push(bytes.iter().copied().collect());
    }

    /// Next byte of the frame at `level`, whatever nested prompts left of it.
    pub fn frame_byte(&mut self, level: usize) -> Option<u8> {
        self.frames.get_mut(level)?.pop_front()
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Whether the last byte came from a command string rather than the keyboard.
    pub fn was_programmatic(&self) -> bool {
        self.programmatic
    }

    pub fn read(&mut self) -> Result<Incoming> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(byte) = frame.pop_front() {
                self.programmatic = true;
                return Ok(Incoming::Byte(byte));
            }
        }
        if let Some(byte) = self.loopback.pop_front() {
            self.programmatic = true;
            return Ok(Incoming::Byte(byte));
        }
        loop {
            if let Some(byte) = self.typed.pop_front() {
                self.programmatic = false;
                return Ok(Incoming::Byte(byte));
            }
            if self.sources == 0 {
                return Ok(Incoming::Closed);
            }
            if !self.armed {
                if let Some(permit) = &self.permit {
                    self.armed = permit.send(()).is_ok();
                }
            }
            let Ok(event) = self.rx.recv() else {
                return Ok(Incoming::Closed);
            };
            match event {
                Event::Keys(bytes) => {
                    self.armed = false;
                    self.typed.extend(bytes);
                }
                Event::Changed => return Ok(Incoming::Changed),
                Event::Closed(source) => {
                    log::info!("{source:?} input closed");
                    if source == Source::Keyboard {
                        self.permit = None;
                        self.armed = false;
                    }
                    self.sources = self.sources.saturating_sub(1);
                }
                Event::Failed(source, err) => {
                    return Err(Error::Input(format!("{source:?}: {err}")));
                }
            }
        }
    }
}

fn read_keys<R: Read>(mut reader: R, permits: Receiver<()>, tx: Sender<Event>) {
    let mut buf = [0u8; 256];
    while permits.recv().is_ok() {
        let read = loop {
            match reader.read(&mut buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Event::Keys(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(err) => {
                let _ = tx.send(Event::Failed(Source::Keyboard, err));
                return;
            }
        }
    }
    let _ = tx.send(Event::Closed(Source::Keyboard));
}
