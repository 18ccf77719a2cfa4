mod common;

use std::fs;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{fixture, init, names, open_with};
use inotify::Inotify;
use treest::ascii::AsciiPrinter;
use treest::commands::LAST;
use treest::input::Input;
use treest::model::Flags;
use treest::session::Session;
use treest::term::Terminal;
use treest::tree::ROOT;

/// Keyboard stand-in: each `read` hands out the next chunk sent by the test.
struct Keys(Receiver<Vec<u8>>);

impl Read for Keys {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(chunk) = self.0.recv() else { return Ok(0) };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }
}

#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<u8>>>);

impl Screen {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Screen {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn filesystem_changes_reload_and_redraw() {
    init();
    let (_dir, root) = fixture(&["old"]);
    let flags = Flags { watch: true, ..Flags::default() };
    let mut tree = open_with(&root, flags, &[]);

    let (typed, keys) = mpsc::channel();
    let mut input = Input::with_keyboard(Keys(keys)).unwrap();
    let inotify = Inotify::init().unwrap();
    tree.set_watches(inotify.watches());
    input.attach_watch(inotify).unwrap();

    let screen = Screen::default();
    let printer = Box::new(AsciiPrinter::new(screen.clone()));
    let mut session = Session::new(
        tree,
        printer,
        input,
        Terminal::detached(),
        Box::new(io::sink()),
        "/bin/sh".into(),
    );
    // registers the root, scanned before the watcher existed
    session.reload_root().unwrap();

    let watched = root.clone();
    let seen = screen.clone();
    let helper = thread::spawn(move || {
        fs::write(watched.join("new"), b"").unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !seen.text().contains("|-- new") && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        typed.send(b"q".to_vec()).unwrap();
        seen.text().contains("|-- new")
    });

    assert_eq!(session.run_to_end().unwrap(), 0);
    assert!(helper.join().unwrap(), "no redraw after the change");
    assert_eq!(names(&session.tree, ROOT), ["new", "old"]);
    assert!(screen.text().contains("`-- old"));
    // the change consumed no input: `q` was the command that ran
    assert_eq!(session.registers.get(LAST), Some(&b"q"[..]));
}
