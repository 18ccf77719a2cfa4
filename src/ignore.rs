#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::model::{Kind, Node};

/// Decides whether a freshly allocated node is left out of its directory.
pub trait Filter {
    fn ignore(&self, node: &Node) -> bool;
}

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    negate: bool,
    dir_only: bool,
    rooted: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Rule> {
        let mut text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            return None;
        }
        let negate = text.starts_with('!');
        if negate {
            text = &text[1..];
        } else if let Some(rest) = text.strip_prefix('\\') {
            text = rest;
        }
        let mut rooted = false;
        if let Some(rest) = text.strip_prefix('/') {
            rooted = true;
            text = rest;
        }
        let dir_only = text.ends_with('/');
        if dir_only {
            text = &text[..text.len() - 1];
        }
        rooted |= text.contains('/');
        match Pattern::new(text) {
            Ok(pattern) => Some(Rule { pattern, negate, dir_only, rooted }),
            Err(err) => {
                log::warn!("ignoring pattern '{line}': {err}");
                None
            }
        }
    }

    fn matches(&self, node: &Node, base: &Path) -> bool {
        if self.dir_only && node.kind != Kind::Directory {
            return false;
        }
        if self.rooted {
            let Ok(rel) = node.path.strip_prefix(base) else { return false };
            self.pattern.matches_with(&rel.to_string_lossy(), MATCH)
        } else {
            self.pattern.matches_with(&node.name().to_string_lossy(), MATCH)
        }
    }
}

/// Ignore-file style patterns: `/` anchors to `base`, a trailing `/` only
/// matches directories, `!` re-includes. The last matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    base: PathBuf,
    rules: Vec<Rule>,
}

impl IgnoreList {
    pub fn new<S: AsRef<str>>(base: PathBuf, patterns: &[S]) -> Self {
        let rules = patterns.iter().filter_map(|p| Rule::parse(p.as_ref())).collect();
        Self { base, rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Filter for IgnoreList {
    fn ignore(&self, node: &Node) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.matches(node, &self.base) {
                ignored = !rule.negate;
            }
        }
        ignored
    }
}
