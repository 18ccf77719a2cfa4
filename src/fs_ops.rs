#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::model::{Flags, Kind, Node, SortKey, SortOrder};

/// Lists the names in `dir` that survive the hidden and backup filters.
/// Entries that fail to read mid-listing are skipped.
pub fn read_names(dir: &Path, flags: &Flags) -> io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for item in fs::read_dir(dir)? {
        let Ok(item) = item else { continue };
        let name = item.file_name();
        if keep_name(name.as_bytes(), flags) {
            names.push(name);
        }
    }
    Ok(names)
}

pub fn keep_name(name: &[u8], flags: &Flags) -> bool {
    if name == b"." || name == b".." {
        return false;
    }
    if name.starts_with(b".") && !flags.show_hidden {
        return false;
    }
    !(flags.ignore_backups && name.ends_with(b"~"))
}

/// Name ordering picked from the process locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collation {
    /// `C`/`POSIX`: plain byte order.
    Bytes,
    /// Any other locale: case-folded, bytes breaking ties.
    Folded,
}

impl Collation {
    /// The first of `LC_ALL`, `LC_COLLATE`, `LANG` that is set and non-empty
    /// decides, as `setlocale(LC_ALL, "")` would.
    pub fn from_locale(lookup: impl Fn(&str) -> Option<String>) -> Collation {
        let locale = ["LC_ALL", "LC_COLLATE", "LANG"]
            .into_iter()
            .filter_map(|var| lookup(var))
            .find(|value| !value.is_empty());
        match locale.as_deref() {
            None | Some("C") | Some("POSIX") => Collation::Bytes,
            Some(value) if value.starts_with("C.") => Collation::Bytes,
            Some(_) => Collation::Folded,
        }
    }

    pub fn current() -> Collation {
        static CURRENT: OnceLock<Collation> = OnceLock::new();
        *CURRENT.get_or_init(|| Collation::from_locale(|var| env::var(var).ok()))
    }

    /// Distinct names never compare equal.
    pub fn compare(self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            Collation::Bytes => a.cmp(b),
            Collation::Folded => {
                let la = String::from_utf8_lossy(a).to_lowercase();
                let lb = String::from_utf8_lossy(b).to_lowercase();
                la.cmp(&lb).then_with(|| a.cmp(b))
            }
        }
    }
}

pub fn collate(a: &[u8], b: &[u8]) -> Ordering {
    Collation::current().compare(a, b)
}

pub fn cmp_name(a: &Node, b: &Node) -> Ordering {
    collate(a.name_bytes(), b.name_bytes())
}

pub fn extension(name: &[u8]) -> Option<&[u8]> {
    let dot = name.iter().rposition(|&c| c == b'.')?;
    Some(&name[dot + 1..])
}

pub fn cmp_ext(a: &Node, b: &Node) -> Ordering {
    match (extension(a.name_bytes()), extension(b.name_bytes())) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(xa), Some(xb)) => collate(xa, xb),
    }
}

/// Size and times sort larger/newer first before `reverse` is applied.
pub fn compare(a: &Node, b: &Node, order: SortOrder) -> Ordering {
    let a_dir = a.kind == Kind::Directory;
    let b_dir = b.kind == Kind::Directory;
    let ord = if order.dirs_first && a_dir != b_dir {
        if a_dir { Ordering::Less } else { Ordering::Greater }
    } else {
        match order.key {
            SortKey::Name => cmp_name(a, b),
            SortKey::Size => b.stat.size.cmp(&a.stat.size),
            SortKey::Extension => cmp_ext(a, b),
            SortKey::ATime => b.stat.atime.cmp(&a.stat.atime),
            SortKey::MTime => b.stat.mtime.cmp(&a.stat.mtime),
            SortKey::CTime => b.stat.ctime.cmp(&a.stat.ctime),
        }
    };
    if order.reverse { ord.reverse() } else { ord }
}

/// Active order first, plain name order to break ties.
pub fn compare_with_tiebreak(a: &Node, b: &Node, order: SortOrder) -> Ordering {
    compare(a, b, order).then_with(|| cmp_name(a, b))
}

/// Textual resolution of a link's text against the directory holding `link`.
/// Returns `None` when a `..` would climb above `/`. The target need not exist.
pub fn normalize_link(link: &Path, text: &Path) -> Option<PathBuf> {
    let text = text.as_os_str().as_bytes();
    let mut parts: Vec<&[u8]> = Vec::new();
    if !text.starts_with(b"/") {
        let base = link.parent()?.as_os_str().as_bytes();
        for seg in base.split(|&c| c == b'/') {
            push_segment(&mut parts, seg)?;
        }
    }
    for seg in text.split(|&c| c == b'/') {
        push_segment(&mut parts, seg)?;
    }

    let mut out = Vec::new();
    for part in parts {
        out.push(b'/');
        out.extend_from_slice(part);
    }
    if out.is_empty() {
        out.push(b'/');
    }
    Some(PathBuf::from(OsString::from_vec(out)))
}

fn push_segment<'a>(parts: &mut Vec<&'a [u8]>, seg: &'a [u8]) -> Option<()> {
    match seg {
        b"" | b"." => {}
        b".." => {
            parts.pop()?;
        }
        _ => parts.push(seg),
    }
    Some(())
}

pub fn format_time(secs: i64) -> String {
    let Ok(dt) = time::OffsetDateTime::from_unix_timestamp(secs) else {
        return String::new();
    };
    let Ok(fmt) = time::format_description::parse("[year]-[month]-[day] [hour]:[minute]") else {
        return String::new();
    };
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    dt.to_offset(offset).format(&fmt).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Payload, Stat};

    fn node(name: &str, kind: Kind, size: u64, mtime: i64) -> Node {
        Node {
            path: PathBuf::from("/t").join(name),
            kind,
            stat: Stat { size, mtime, ..Stat::default() },
            payload: Payload::Plain,
            parent: None,
            index: 0,
            count: 0,
        }
    }

    #[test]
    fn hidden_and_backup_names() {
        let mut flags = Flags::default();
        assert!(!keep_name(b".", &flags));
        assert!(!keep_name(b".profile", &flags));
        assert!(keep_name(b"notes~", &flags));
        flags.show_hidden = true;
        flags.ignore_backups = true;
        assert!(keep_name(b".profile", &flags));
        assert!(!keep_name(b"..", &flags));
        assert!(!keep_name(b"notes~", &flags));
    }

    #[test]
    fn size_sorts_largest_first() {
        let big = node("a", Kind::Regular, 10, 0);
        let small = node("b", Kind::Regular, 1, 0);
        let order = SortOrder::by(SortKey::Size);
        assert_eq!(compare(&big, &small, order), Ordering::Less);
        let reversed = SortOrder { reverse: true, ..order };
        assert_eq!(compare(&big, &small, reversed), Ordering::Greater);
    }

    #[test]
    fn dirs_first_beats_the_key() {
        let dir = node("zzz", Kind::Directory, 0, 0);
        let file = node("aaa", Kind::Regular, 0, 0);
        let order = SortOrder { dirs_first: true, ..SortOrder::default() };
        assert_eq!(compare(&dir, &file, order), Ordering::Less);
        assert_eq!(compare(&file, &dir, SortOrder::default()), Ordering::Less);
    }

    #[test]
    fn missing_extension_sorts_first() {
        let plain = node("Makefile", Kind::Regular, 0, 0);
        let rs = node("main.rs", Kind::Regular, 0, 0);
        let c = node("main.c", Kind::Regular, 0, 0);
        let order = SortOrder::by(SortKey::Extension);
        assert_eq!(compare(&plain, &rs, order), Ordering::Less);
        assert_eq!(compare(&c, &rs, order), Ordering::Less);
        assert_eq!(compare(&c, &c, order), Ordering::Equal);
    }

    #[test]
    fn ties_fall_back_to_name() {
        let a = node("a", Kind::Regular, 0, 5);
        let b = node("b", Kind::Regular, 0, 5);
        let order = SortOrder::by(SortKey::MTime);
        assert_eq!(compare(&a, &b, order), Ordering::Equal);
        assert_eq!(compare_with_tiebreak(&a, &b, order), Ordering::Less);
    }

    #[test]
    fn folded_collation_stays_total() {
        let folded = Collation::Folded;
        assert_eq!(folded.compare(b"apple", b"Banana"), Ordering::Less);
        assert_ne!(folded.compare(b"A", b"a"), Ordering::Equal);
        assert_eq!(Collation::Bytes.compare(b"apple", b"Banana"), Ordering::Greater);
    }

    #[test]
    fn collation_follows_locale_variables() {
        fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
            move |var| pairs.iter().find(|(k, _)| *k == var).map(|(_, v)| v.to_string())
        }
        assert_eq!(Collation::from_locale(env(&[])), Collation::Bytes);
        assert_eq!(Collation::from_locale(env(&[("LANG", "en_US.UTF-8")])), Collation::Folded);
        assert_eq!(
            Collation::from_locale(env(&[("LC_ALL", "C"), ("LANG", "en_US.UTF-8")])),
            Collation::Bytes
        );
        assert_eq!(
            Collation::from_locale(env(&[("LC_ALL", ""), ("LC_COLLATE", "POSIX")])),
            Collation::Bytes
        );
        assert_eq!(Collation::from_locale(env(&[("LANG", "C.UTF-8")])), Collation::Bytes);
    }

    #[test]
    fn normalize_relative_and_absolute() {
        let link = Path::new("/srv/data/link");
        assert_eq!(
            normalize_link(link, Path::new("../other/./x")),
            Some(PathBuf::from("/srv/other/x"))
        );
        assert_eq!(
            normalize_link(link, Path::new("/etc//hosts/")),
            Some(PathBuf::from("/etc/hosts"))
        );
        assert_eq!(normalize_link(link, Path::new("../..")), Some(PathBuf::from("/")));
    }

    #[test]
    fn normalize_above_root_is_broken() {
        let link = Path::new("/top/link");
        assert_eq!(normalize_link(link, Path::new("../../x")), None);
        assert_eq!(normalize_link(link, Path::new("/..")), None);
    }
}
