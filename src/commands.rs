#![forbid(unsafe_code)]

/// Register that records the bytes of the last top-level command, prompt answers included.
pub const LAST: u8 = b'.';

const CTRL_C: u8 = 0x03;
const CTRL_H: u8 = 0x08;
const CTRL_L: u8 = 0x0c;
const CTRL_N: u8 = 0x0e;
const CTRL_P: u8 = 0x10;
const CTRL_R: u8 = 0x12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    QuitWithCode,
    ToggleIgnore,
    Refresh,
    VisibleNext,
    VisiblePrevious,
    Reload,
    ReloadRoot,
    Shell,
    Pipe,
    FillRegister,
    RunRegister,
    Comment,
    Rerun,
    If,
    IfNot,
    While,
    WhileNot,
    ToggleFlag,
    PrinterCommand,
    FoldRecursive,
    Help,
    Fold,
    Unfold,
    Parent,
    Next,
    Previous,
    Child,
    FirstSibling,
    LastSibling,
    Root,
    FindStartsWith,
    FindContains,
    FindEndsWith,
    SearchNext,
    SearchPrevious,
    PromptUnfold,
    PromptFold,
    GoUnfold,
    GoFold,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Command> {
        let command = match byte {
            CTRL_C | b'q' => Command::Quit,
            b'Q' => Command::QuitWithCode,
            CTRL_H => Command::ToggleIgnore,
            CTRL_L | b';' => Command::Refresh,
            CTRL_N => Command::VisibleNext,
            CTRL_P => Command::VisiblePrevious,
            CTRL_R => Command::Reload,
            b'~' => Command::ReloadRoot,
            b'!' => Command::Shell,
            b'|' => Command::Pipe,
            b'"' => Command::FillRegister,
            b'\\' => Command::RunRegister,
            b'#' => Command::Comment,
            b'.' => Command::Rerun,
            b'(' => Command::If,
            b')' => Command::IfNot,
            b'{' => Command::While,
            b'}' => Command::WhileNot,
            b'-' => Command::ToggleFlag,
            b':' => Command::PrinterCommand,
            b'=' => Command::FoldRecursive,
            b'?' => Command::Help,
            b'H' => Command::Fold,
            b'L' => Command::Unfold,
            b'h' => Command::Parent,
            b'j' => Command::Next,
            b'k' => Command::Previous,
            b'l' => Command::Child,
            b'[' => Command::FirstSibling,
            b']' => Command::LastSibling,
            b'`' => Command::Root,
            b'^' => Command::FindStartsWith,
            b'/' => Command::FindContains,
            b'$' => Command::FindEndsWith,
            b'n' => Command::SearchNext,
            b'N' => Command::SearchPrevious,
            b'O' => Command::PromptUnfold,
            b'C' => Command::PromptFold,
            b'o' => Command::GoUnfold,
            b'c' => Command::GoFold,
            _ => return None,
        };
        Some(command)
    }

    pub fn help(self) -> &'static str {
        match self {
            Command::Quit => "quit",
            Command::QuitWithCode => "quit with the exit code given by the next key",
            Command::ToggleIgnore => "toggle the ignore patterns (applies to future scans)",
            Command::Refresh => "redraw the tree",
            Command::VisibleNext => "next visible node, depth first",
            Command::VisiblePrevious => "previous visible node, depth first",
            Command::Reload => "reload the directory at the cursor",
            Command::ReloadRoot => "reload the whole tree",
            Command::Shell => "run a shell command, {} is replaced with the quoted path",
            Command::Pipe => "run a shell command with the node piped on its input",
            Command::FillRegister => "store a command string in a register (abort empties it)",
            Command::RunRegister => "run the commands stored in a register",
            Command::Comment => "read a line and ignore it",
            Command::Rerun => "repeat the last command",
            Command::If => "run a command, then the prompted commands if it succeeded",
            Command::IfNot => "run a command, then the prompted commands if it failed",
            Command::While => "repeat prompted commands while a command succeeds",
            Command::WhileNot => "repeat prompted commands while a command fails",
            Command::ToggleFlag => "toggle a flag and reload",
            Command::PrinterCommand => "send a command to the printer",
            Command::FoldRecursive => "fold the directory and everything below it",
            Command::Help => "describe the command bound to the next key",
            Command::Fold => "fold the directory at the cursor",
            Command::Unfold => "unfold the directory at the cursor",
            Command::Parent => "go to the parent",
            Command::Next => "go to the next sibling",
            Command::Previous => "go to the previous sibling",
            Command::Child => "unfold and go to the first child",
            Command::FirstSibling => "go to the first sibling",
            Command::LastSibling => "go to the last sibling",
            Command::Root => "go to the root",
            Command::FindStartsWith => "find a sibling starting with the pattern",
            Command::FindContains => "find a sibling containing the pattern",
            Command::FindEndsWith => "find a sibling ending with the pattern",
            Command::SearchNext => "repeat the last search forward",
            Command::SearchPrevious => "repeat the last search backward",
            Command::PromptUnfold => "unfold at a path, the cursor stays",
            Command::PromptFold => "fold at a path, the cursor stays",
            Command::GoUnfold => "go to a path and unfold it",
            Command::GoFold => "go to a path and fold it",
        }
    }
}

/// Every bound byte with its command, in byte order.
pub fn bindings() -> impl Iterator<Item = (u8, Command)> {
    (0u8..128).filter_map(|byte| Command::from_byte(byte).map(|command| (byte, command)))
}

/// One `key  help` line per binding, as printed by `--keys`.
pub fn key_table() -> String {
    bindings()
        .map(|(byte, command)| format!("{:<4}{}\n", key_name(byte), command.help()))
        .collect()
}

/// Printable form of a key for help output: `^X` for control bytes.
pub fn key_name(byte: u8) -> String {
    match byte {
        0..=0x1f => format!("^{}", (byte + b'@') as char),
        0x7f => "^?".to_string(),
        _ => (byte as char).to_string(),
    }
}

/// One optional command string per ASCII byte.
#[derive(Debug, Clone)]
pub struct Registers {
    slots: Vec<Option<Vec<u8>>>,
}

impl Default for Registers {
    fn default() -> Self {
        Self { slots: vec![None; 128] }
    }
}

impl Registers {
    pub fn is_valid(name: u8) -> bool {
        name < 128
    }

    pub fn get(&self, name: u8) -> Option<&[u8]> {
        self.slots.get(usize::from(name))?.as_deref()
    }

    pub fn set(&mut self, name: u8, value: Vec<u8>) -> bool {
        let Some(slot) = self.slots.get_mut(usize::from(name)) else { return false };
        *slot = Some(value);
        true
    }

    pub fn clear(&mut self, name: u8) -> bool {
        let Some(slot) = self.slots.get_mut(usize::from(name)) else { return false };
        *slot = None;
        true
    }

    pub fn append(&mut self, name: u8, bytes: &[u8]) {
        if let Some(slot) = self.slots.get_mut(usize::from(name)) {
            slot.get_or_insert_with(Vec::new).extend_from_slice(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vi_keys_are_bound() {
        assert_eq!(Command::from_byte(b'j'), Some(Command::Next));
        assert_eq!(Command::from_byte(b'k'), Some(Command::Previous));
        assert_eq!(Command::from_byte(0x03), Some(Command::Quit));
        assert_eq!(Command::from_byte(b'x'), None);
        assert_eq!(Command::from_byte(0xff), None);
    }

    #[test]
    fn every_binding_has_help() {
        let all: Vec<_> = bindings().collect();
        assert_eq!(all.len(), 42);
        assert!(all.iter().all(|(_, command)| !command.help().is_empty()));
    }

    #[test]
    fn key_table_lists_every_binding() {
        let table = key_table();
        assert_eq!(table.lines().count(), 42);
        assert!(table.contains("j   go to the next sibling\n"));
        assert!(table.lines().any(|line| line.starts_with("^R  ")));
    }

    #[test]
    fn control_keys_print_with_caret() {
        assert_eq!(key_name(0x12), "^R");
        assert_eq!(key_name(b'q'), "q");
        assert_eq!(key_name(0x7f), "^?");
    }

    #[test]
    fn registers_store_and_append() {
        let mut regs = Registers::default();
        assert!(regs.get(b'a').is_none());
        assert!(regs.set(b'a', b"jj".to_vec()));
        regs.append(b'a', b"l");
        assert_eq!(regs.get(b'a'), Some(&b"jjl"[..]));
        assert!(regs.clear(b'a'));
        assert!(regs.get(b'a').is_none());
        assert!(!regs.set(200, Vec::new()));
        assert!(!Registers::is_valid(200));
    }
}
