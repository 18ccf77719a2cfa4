mod common;

use std::os::unix::fs::symlink;

use common::{child, fixture, init, name, open};
use treest::ascii::AsciiPrinter;
use treest::error::Error;
use treest::fancy::FancyPrinter;
use treest::model::NodeId;
use treest::tree::{ROOT, Tree};
use treest::ui::{self, Frame, Printer};

fn ascii(tree: &Tree, cursor: NodeId, toggles: &[u8]) -> String {
    let mut printer = AsciiPrinter::new(Vec::new());
    for &flag in toggles {
        assert!(printer.toggle(flag));
    }
    ui::draw(&mut printer, &Frame { tree, cursor, raw: false }).unwrap();
    String::from_utf8(printer.into_inner()).unwrap()
}

#[test]
fn ascii_draws_branches() {
    init();
    let (_dir, root) = fixture(&["a/x", "b"]);
    let mut tree = open(&root);
    let a = child(&tree, ROOT, "a");
    tree.unfold(a);

    let out = ascii(&tree, ROOT, &[]);
    let expected = format!("\n> {}\n|-- a\n|   `-- x\n`-- b\n", name(&tree, ROOT));
    assert_eq!(out, expected);

    let x = child(&tree, a, "x");
    let out = ascii(&tree, x, &[]);
    assert!(out.contains("|   `-- > x\n"));
}

#[test]
fn ascii_classify_marks_kinds() {
    init();
    let (_dir, root) = fixture(&["a/"]);
    symlink("/nonexistent", root.join("dangling")).unwrap();
    symlink("a", root.join("link")).unwrap();
    let tree = open(&root);

    let out = ascii(&tree, ROOT, b"F");
    assert!(out.contains("|-- a/\n"));
    assert!(out.contains("dangling@ -> /nonexistent\n"));
    assert!(out.contains("link@ -> a/\n"));
}

#[test]
fn ascii_relative_paths_and_indices() {
    init();
    let (_dir, root) = fixture(&["a/x"]);
    let mut tree = open(&root);
    let a = child(&tree, ROOT, "a");
    tree.unfold(a);

    let out = ascii(&tree, ROOT, b"P");
    assert!(out.contains("`-- a/x\n"));

    let out = ascii(&tree, ROOT, b"i");
    assert!(out.contains("[ 0] a [/1] \n"));
}

#[test]
fn ascii_rejects_foreign_toggles() {
    let mut printer = AsciiPrinter::new(Vec::new());
    assert!(!printer.toggle(b'a'));
    assert!(!printer.command("anything"));
    assert!(printer.filter().is_none());
}

#[test]
fn fancy_without_colors_is_plain_text() {
    init();
    let (_dir, root) = fixture(&["b", "empty/"]);
    let mut tree = open(&root);
    let empty = child(&tree, ROOT, "empty");
    tree.unfold(empty);

    let mut printer = FancyPrinter::new(Vec::new());
    assert!(printer.toggle(b'F'));
    ui::draw(&mut printer, &Frame { tree: &tree, cursor: empty, raw: true }).unwrap();
    let out = String::from_utf8(printer.into_inner()).unwrap();
    assert!(out.contains("\u{251c}\u{2500}\u{2500} b\r\n"));
    assert!(out.contains("\u{2514}\u{2500}\u{2500} > empty/ (/)\r\n"));
}

#[test]
fn fancy_colors_are_toggled_on() {
    init();
    let (_dir, root) = fixture(&["b"]);
    let tree = open(&root);
    let cursor = child(&tree, ROOT, "b");

    let mut printer = FancyPrinter::new(Vec::new());
    assert!(printer.toggle(b'c'));
    ui::draw(&mut printer, &Frame { tree: &tree, cursor, raw: false }).unwrap();
    let out = String::from_utf8(printer.into_inner()).unwrap();
    // reverse video on, then off again after the name
    assert!(out.contains("\x1b[7m"));
    assert!(out.contains("\x1b[27m"));
    assert!(!out.contains("> b"));
}

#[test]
fn printers_are_found_by_name() {
    for name in ui::PRINTERS {
        let printer = ui::printer_by_name(name, Box::new(Vec::new())).unwrap();
        assert_eq!(printer.name(), name);
    }
    assert!(ui::printer_by_name("nope", Box::new(Vec::new())).is_none());
    let err = Error::UnknownPrinter("nope".into()).to_string();
    assert!(err.contains("ascii, fancy"));
}
