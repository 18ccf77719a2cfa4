#![forbid(unsafe_code)]

use std::ffi::OsStr;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::process;

use crate::commands::{Command, LAST, Registers, key_name};
use crate::error::Result;
use crate::model::NodeId;
use crate::session::{Match, Search, Session};
use crate::tree::ROOT;

/// Placeholder replaced by the quoted path of the node at the cursor.
const PLACEHOLDER: &[u8] = b"{}";

pub fn run(s: &mut Session, command: Command) -> Result<bool> {
    match command {
        Command::Quit => {
            s.quit = Some(0);
            Ok(true)
        }
        Command::QuitWithCode => quit_with_code(s),
        Command::ToggleIgnore => {
            s.tree.flags.ignore = !s.tree.flags.ignore;
            Ok(true)
        }
        Command::Refresh => {
            s.render()?;
            Ok(true)
        }
        Command::VisibleNext => Ok(visible_next(s)),
        Command::VisiblePrevious => Ok(visible_previous(s)),
        Command::Reload => reload(s),
        Command::ReloadRoot => {
            s.reload_root()?;
            Ok(true)
        }
        Command::Shell => shell(s, false),
        Command::Pipe => shell(s, true),
        Command::FillRegister => fill_register(s),
        Command::RunRegister => run_register(s),
        Command::Comment => {
            s.prompt("ignore")?;
            Ok(false)
        }
        Command::Rerun => rerun(s),
        Command::If => when(s, "if-command", true),
        Command::IfNot => when(s, "ifnot-command", false),
        Command::While => repeat(s, "while-command", true),
        Command::WhileNot => repeat(s, "whilenot-command", false),
        Command::ToggleFlag => toggle_flag(s),
        Command::PrinterCommand => printer_command(s),
        Command::FoldRecursive => Ok(s.tree.fold_recursive(s.cursor)),
        Command::Help => help(s),
        Command::Fold => Ok(s.tree.fold(s.cursor)),
        Command::Unfold => Ok(s.tree.unfold(s.cursor)),
        Command::Parent => Ok(go_parent(s)),
        Command::Next => Ok(go_next(s)),
        Command::Previous => Ok(go_previous(s)),
        Command::Child => Ok(go_child(s)),
        Command::FirstSibling => Ok(go_sibling_edge(s, true)),
        Command::LastSibling => Ok(go_sibling_edge(s, false)),
        Command::Root => {
            s.cursor = ROOT;
            Ok(true)
        }
        Command::FindStartsWith => find(s, "find-startswith", Match::StartsWith),
        Command::FindContains => find(s, "find-contains", Match::Contains),
        Command::FindEndsWith => find(s, "find-endswith", Match::EndsWith),
        Command::SearchNext => Ok(search(s, true)),
        Command::SearchPrevious => Ok(search(s, false)),
        Command::PromptUnfold => at_path(s, "unfold-path", PathAction::Unfold),
        Command::PromptFold => at_path(s, "fold-path", PathAction::Fold),
        Command::GoUnfold => at_path(s, "gounfold-path", PathAction::GoUnfold),
        Command::GoFold => at_path(s, "gofold-path", PathAction::GoFold),
    }
}

fn quit_with_code(s: &mut Session) -> Result<bool> {
    let code = match s.prompt1("exit-code")? {
        Some(byte) if byte.is_ascii_digit() => i32::from(byte - b'0'),
        Some(byte) => i32::from(byte),
        None => 1,
    };
    s.quit = Some(code);
    Ok(true)
}

fn go_parent(s: &mut Session) -> bool {
    let Some(parent) = s.tree.parent(s.cursor) else { return false };
    s.cursor = parent;
    true
}

fn go_next(s: &mut Session) -> bool {
    let Some(parent) = s.tree.parent(s.cursor) else { return false };
    let index = s.tree.node(s.cursor).index;
    let Some(&next) = s.tree.children(parent).get(index + 1) else { return false };
    s.cursor = next;
    true
}

fn go_previous(s: &mut Session) -> bool {
    let Some(parent) = s.tree.parent(s.cursor) else { return false };
    let index = s.tree.node(s.cursor).index;
    let Some(previous) = index.checked_sub(1) else { return false };
    let Some(&previous) = s.tree.children(parent).get(previous) else { return false };
    s.cursor = previous;
    true
}

/// Unfolds, then moves to the first child when there is one.
fn go_child(s: &mut Session) -> bool {
    if !s.tree.unfold(s.cursor) {
        return false;
    }
    if let Some(&first) = s.tree.children(s.cursor).first() {
        s.cursor = first;
    }
    true
}

fn go_sibling_edge(s: &mut Session, first: bool) -> bool {
    let Some(parent) = s.tree.parent(s.cursor) else { return false };
    let children = s.tree.children(parent);
    let edge = if first { children.first() } else { children.last() };
    let Some(&edge) = edge else { return false };
    s.cursor = edge;
    true
}

fn visible_child(s: &mut Session) -> bool {
    if !s.tree.is_unfolded(s.cursor) {
        return false;
    }
    let Some(&first) = s.tree.children(s.cursor).first() else { return false };
    s.cursor = first;
    true
}

fn visible_previous(s: &mut Session) -> bool {
    if go_previous(s) {
        while visible_child(s) {
            go_sibling_edge(s, false);
        }
        return true;
    }
    go_parent(s)
}

fn visible_next(s: &mut Session) -> bool {
    if visible_child(s) || go_next(s) {
        return true;
    }
    if s.tree.parent(s.cursor).is_none() {
        return false;
    }
    let start = s.cursor;
    while go_parent(s) && !go_next(s) {}
    if s.cursor != ROOT {
        return true;
    }
    s.cursor = start;
    false
}

fn reload(s: &mut Session) -> Result<bool> {
    if !s.tree.is_dir(s.cursor) {
        return Ok(false);
    }
    let at = s.cursor;
    s.tree.reload(at, &mut s.cursor)?;
    Ok(true)
}

fn toggle_flag(s: &mut Session) -> Result<bool> {
    let Some(flag) = s.prompt1("toggle")? else { return Ok(false) };
    if !(s.printer.toggle(flag) || s.tree.flags.toggle(flag)) {
        s.message("! no such flag")?;
        return Ok(false);
    }
    s.reload_root()?;
    Ok(true)
}

fn printer_command(s: &mut Session) -> Result<bool> {
    let Some(text) = s.prompt("command")? else { return Ok(false) };
    Ok(s.printer.command(&String::from_utf8_lossy(&text)))
}

fn help(s: &mut Session) -> Result<bool> {
    let Some(byte) = s.prompt1("help-command")? else { return Ok(false) };
    match Command::from_byte(byte) {
        Some(command) => s.message(&format!("{}: {}", key_name(byte), command.help()))?,
        None => s.message("! not a command")?,
    }
    Ok(false)
}

fn register_name(s: &mut Session) -> Result<Option<u8>> {
    let Some(name) = s.prompt1("register-name")? else { return Ok(None) };
    if !Registers::is_valid(name) {
        s.message("! not a valid register name")?;
        return Ok(None);
    }
    Ok(Some(name))
}

/// An aborted prompt leaves the register empty.
fn fill_register(s: &mut Session) -> Result<bool> {
    let Some(name) = register_name(s)? else { return Ok(false) };
    s.registers.clear(name);
    let Some(commands) = s.prompt("register-commands")? else { return Ok(false) };
    s.registers.set(name, commands);
    Ok(true)
}

fn run_register(s: &mut Session) -> Result<bool> {
    let Some(name) = register_name(s)? else { return Ok(false) };
    let Some(commands) = s.registers.get(name).map(<[u8]>::to_vec) else { return Ok(false) };
    s.run_commands(&commands)?;
    Ok(true)
}

fn rerun(s: &mut Session) -> Result<bool> {
    let last = s.registers.get(LAST).map(<[u8]>::to_vec).unwrap_or_default();
    if last.is_empty() {
        return Ok(false);
    }
    s.run_commands(&last)?;
    Ok(true)
}

/// `if`/`ifnot`: the trigger's outcome is the command's outcome.
fn when(s: &mut Session, label: &str, expect: bool) -> Result<bool> {
    let Some(trigger) = s.prompt1(label)? else { return Ok(false) };
    let hit = s.run_command(trigger)? == expect;
    if hit {
        let Some(body) = s.prompt("then-commands")? else { return Ok(false) };
        s.run_commands(&body)?;
    }
    Ok(hit)
}

/// `while`/`whilenot`: the body is read once, after the first hit, then run
/// until the trigger stops matching.
fn repeat(s: &mut Session, label: &str, expect: bool) -> Result<bool> {
    let Some(trigger) = s.prompt1(label)? else { return Ok(false) };
    if s.run_command(trigger)? != expect {
        return Ok(false);
    }
    let Some(body) = s.prompt("do-commands")? else { return Ok(false) };
    loop {
        s.run_commands(&body)?;
        if s.quit.is_some() || s.run_command(trigger)? != expect {
            break;
        }
    }
    Ok(true)
}

fn find(s: &mut Session, label: &str, kind: Match) -> Result<bool> {
    let Some(pattern) = s.prompt(label)? else { return Ok(false) };
    s.search = Some(Search { kind, pattern });
    Ok(search(s, true))
}

/// Circular scan over the cursor's siblings, the cursor itself excluded.
fn search(s: &mut Session, forward: bool) -> bool {
    let Some(Search { kind, pattern }) = s.search.clone() else { return false };
    let Some(parent) = s.tree.parent(s.cursor) else { return false };
    let siblings = s.tree.children(parent);
    let at = s.tree.node(s.cursor).index;
    let order: Vec<usize> = if forward {
        (at + 1..siblings.len()).chain(0..at.min(siblings.len())).collect()
    } else {
        (0..at.min(siblings.len())).rev().chain((at + 1..siblings.len()).rev()).collect()
    };
    let found = order
        .into_iter()
        .map(|k| siblings[k])
        .find(|&id| kind.test(s.tree.node(id).name_bytes(), &pattern));
    match found {
        Some(id) => {
            s.cursor = id;
            true
        }
        None => false,
    }
}

/// Walks `path` from the root one segment at a time. Directories passed
/// through only to list them are folded back; every ancestor of the result
/// is left unfolded.
pub fn locate(s: &mut Session, path: &[u8]) -> Result<Option<NodeId>> {
    if !path.starts_with(b"/") {
        s.message("! absolute path must start with a /")?;
        return Ok(None);
    }
    let root = s.tree.node(ROOT).path.as_os_str().as_bytes().to_vec();
    let rest = if root == b"/" {
        path
    } else {
        match path.strip_prefix(root.as_slice()) {
            Some(rest) if rest.is_empty() || rest.starts_with(b"/") => rest,
            _ => {
                s.message("! unrelated root")?;
                return Ok(None);
            }
        }
    };

    let mut curr = ROOT;
    for segment in rest.split(|&c| c == b'/') {
        match segment {
            b"" | b"." => continue,
            b".." => {
                let Some(parent) = s.tree.parent(curr) else {
                    s.message("! '..' goes above root")?;
                    return Ok(None);
                };
                curr = parent;
            }
            name => {
                if !s.tree.is_dir(curr) {
                    s.message("! path element is not a directory")?;
                    return Ok(None);
                }
                if !s.tree.is_unfolded(curr) {
                    s.tree.unfold(curr);
                    s.tree.fold(curr);
                }
                let Some(child) = s.tree.find_child(curr, name) else {
                    s.message("! path not found")?;
                    return Ok(None);
                };
                curr = child;
            }
        }
    }

    let mut up = curr;
    while let Some(parent) = s.tree.parent(up) {
        s.tree.unfold(parent);
        up = parent;
    }
    Ok(Some(curr))
}

#[derive(Debug, Clone, Copy)]
enum PathAction {
    Unfold,
    Fold,
    GoUnfold,
    GoFold,
}

fn at_path(s: &mut Session, label: &str, action: PathAction) -> Result<bool> {
    let Some(path) = s.prompt(label)? else { return Ok(false) };
    let Some(found) = locate(s, &path)? else { return Ok(false) };
    match action {
        PathAction::Unfold => {
            s.tree.unfold(found);
        }
        PathAction::Fold => {
            s.tree.fold(found);
        }
        PathAction::GoUnfold => {
            s.cursor = found;
            s.tree.unfold(found);
        }
        PathAction::GoFold => {
            s.cursor = found;
            s.tree.fold(found);
        }
    }
    Ok(true)
}

/// POSIX single-quoting: `'` becomes `'\''`.
pub fn quote(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 2);
    out.push(b'\'');
    for &c in text {
        if c == b'\'' {
            out.extend_from_slice(b"'\\''");
        } else {
            out.push(c);
        }
    }
    out.push(b'\'');
    out
}

/// Replaces every placeholder in `template` with `quoted`.
pub fn substitute(template: &[u8], quoted: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len() + quoted.len());
    let mut rest = template;
    while let Some(at) = rest.windows(PLACEHOLDER.len()).position(|w| w == PLACEHOLDER) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(quoted);
        rest = &rest[at + PLACEHOLDER.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn shell(s: &mut Session, pipe: bool) -> Result<bool> {
    if !s.shell.is_file() {
        s.message("! no shell available")?;
        return Ok(false);
    }
    let label = if pipe { "pipe-command" } else { "shell-command" };
    let Some(template) = s.prompt(label)? else { return Ok(false) };
    let quoted = quote(s.tree.node(s.cursor).path.as_os_str().as_bytes());
    let mut line = substitute(&template, &quoted);
    if pipe {
        line.push(b'<');
        line.extend_from_slice(&quoted);
    }

    log::info!("running {}", String::from_utf8_lossy(&line));
    std::io::stdout().flush()?;
    let shell = s.shell.clone();
    let status = s.term.suspended(|| {
        process::Command::new(&shell).arg("-c").arg(OsStr::from_bytes(&line)).status()
    })?;
    let ok = match status {
        Ok(status) => status.success(),
        Err(err) => {
            s.message(&format!("! shell failed: {err}"))?;
            false
        }
    };

    s.prompt1("! done")?;
    s.reload_root()?;
    Ok(ok)
}
