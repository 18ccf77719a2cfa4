#![forbid(unsafe_code)]

use std::io;

use inotify::Inotify;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ignore::Filter;
use crate::input::Input;
use crate::session::Session;
use crate::term::Terminal;
use crate::tree::Tree;
use crate::ui::printer_by_name;

/// Startup wiring and the render / dispatch loop.
pub struct App {
    session: Session,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let mut printer = printer_by_name(&config.printer, Box::new(io::stdout()))
            .ok_or_else(|| Error::UnknownPrinter(config.printer.clone()))?;
        printer.setup()?;

        let mut flags = config.flags();
        for &flag in &config.toggles {
            if !(printer.toggle(flag) || flags.toggle(flag)) {
                return Err(Error::UnknownFlag(char::from(flag)));
            }
        }
        for command in &config.printer_commands {
            if !printer.command(command) {
                return Err(Error::PrinterCommand {
                    printer: printer.name().to_string(),
                    command: command.clone(),
                });
            }
        }

        let filter: Box<dyn Filter> = match printer.filter() {
            Some(filter) => filter,
            None => Box::new(config.ignore_list()),
        };
        let mut tree = Tree::open(config.root.clone(), flags, filter)?;
        let mut input = Input::with_keyboard(io::stdin())?;

        if tree.flags.watch {
            match Inotify::init() {
                Ok(inotify) => {
                    tree.set_watches(inotify.watches());
                    input.attach_watch(inotify)?;
                }
                Err(err) => {
                    log::warn!("watching disabled: {err}");
                    tree.flags.watch = false;
                }
            }
        }

        if let Some(path) = &config.rcfile {
            input.feed_file(path)?;
        }

        let mut term = Terminal::detect();
        term.enter_raw().map_err(Error::Terminal)?;

        let mut session = Session::new(tree, printer, input, term, Box::new(io::stderr()), config.shell);
        if session.tree.flags.watch {
            // directories scanned before the watcher existed get registered now
            session.reload_root()?;
        }
        log::info!("browsing {}", config.root.display());
        Ok(Self { session })
    }

    pub fn run(&mut self) -> Result<i32> {
        loop {
            self.session.render()?;
            self.session.step()?;
            if let Some(code) = self.session.quit {
                log::info!("quit with status {code}");
                return Ok(code);
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.session.printer_mut().teardown();
        let _ = self.session.terminal_mut().restore();
    }
}
