#![forbid(unsafe_code)]

use std::io;
use std::panic;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;

/// Raw-mode guard for the controlling terminal. Cooked mode comes back on
/// drop, so every exit path out of the event loop restores the terminal.
#[derive(Debug)]
pub struct Terminal {
    enabled: bool,
    raw: bool,
}

impl Terminal {
    /// Raw mode is only used when stdout is a terminal.
    pub fn detect() -> Self {
        Self { enabled: io::stdout().is_tty(), raw: false }
    }

    /// Never touches the terminal.
    pub fn detached() -> Self {
        Self { enabled: false, raw: false }
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn enter_raw(&mut self) -> io::Result<()> {
        if self.enabled && !self.raw {
            enable_raw_mode()?;
            self.raw = true;
        }
        Ok(())
    }

    pub fn restore(&mut self) -> io::Result<()> {
        if self.raw {
            disable_raw_mode()?;
            self.raw = false;
        }
        Ok(())
    }

    /// Runs `f` with the terminal in cooked mode, then goes back to raw if it was raw.
    pub fn suspended<T>(&mut self, f: impl FnOnce() -> T) -> io::Result<T> {
        let was_raw = self.raw;
        self.restore()?;
        let out = f();
        if was_raw {
            self.enter_raw()?;
        }
        Ok(out)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Restores cooked mode before the default hook prints the panic message.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        previous(info);
    }));
}
