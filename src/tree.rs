#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fs;
use std::path::PathBuf;

use inotify::{WatchMask, Watches};

use crate::error::{Error, Result};
use crate::fs_ops::{compare_with_tiebreak, normalize_link, read_names};
use crate::ignore::Filter;
use crate::model::{Dir, Flags, Kind, Link, Node, NodeId, Payload, Stat};

pub const ROOT: NodeId = NodeId(0);

/// Hops followed before a symlink chain is treated as broken.
pub const MAX_LINK_DEPTH: usize = 40;

/// Arena of filesystem nodes. `ROOT` always addresses the tree root; a root
/// reload swaps the slot's contents instead of moving the handle.
pub struct Tree {
    slots: Vec<Option<Node>>,
    vacant: Vec<usize>,
    pub flags: Flags,
    filter: Box<dyn Filter>,
    watches: Option<Watches>,
    scans: usize,
}

impl Tree {
    /// Allocates the root for `path` (expected absolute and canonical) and unfolds it.
    pub fn open(path: PathBuf, flags: Flags, filter: Box<dyn Filter>) -> Result<Tree> {
        let meta = fs::symlink_metadata(&path).map_err(|source| Error::Root {
            path: path.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path));
        }
        let mut tree = Tree {
            slots: Vec::new(),
            vacant: Vec::new(),
            flags,
            filter,
            watches: None,
            scans: 0,
        };
        if tree.alloc(None, path.clone()).is_none() {
            return Err(Error::RootGone(path));
        }
        tree.unfold(ROOT);
        Ok(tree)
    }

    pub fn set_filter(&mut self, filter: Box<dyn Filter>) {
        self.filter = filter;
    }

    /// Directories allocated from now on are registered with `watches`.
    pub fn set_watches(&mut self, watches: Watches) {
        self.watches = Some(watches);
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        match self.slots.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale node handle {id:?}"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale node handle {id:?}"),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of directory scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The directory node behind `id`: itself, or the tail of a link chain ending in a directory.
    pub fn dir_of(&self, id: NodeId) -> Option<NodeId> {
        match &self.get(id)?.payload {
            Payload::Dir(_) => Some(id),
            Payload::Link(link) => {
                let tail = link.tail?;
                matches!(self.node(tail).payload, Payload::Dir(_)).then_some(tail)
            }
            Payload::Plain => None,
        }
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        self.dir_of(id).is_some()
    }

    pub fn is_unfolded(&self, id: NodeId) -> bool {
        self.dir_of(id)
            .and_then(|dir| self.node(dir).dir())
            .is_some_and(|dir| dir.unfolded)
    }

    /// Loaded children of the directory behind `id`; empty when never scanned.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.dir_of(id)
            .and_then(|dir| self.node(dir).dir())
            .and_then(|dir| dir.children.as_deref())
            .unwrap_or(&[])
    }

    pub fn find_child(&self, id: NodeId, name: &[u8]) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.node(child).name_bytes() == name)
    }

    pub fn unfold(&mut self, id: NodeId) -> bool {
        let Some(dir) = self.dir_of(id) else { return false };
        let needs_scan = match self.node_mut(dir).dir_mut() {
            Some(state) => {
                state.unfolded = true;
                state.children.is_none()
            }
            None => return false,
        };
        if needs_scan {
            self.scan(dir, id);
        }
        true
    }

    pub fn fold(&mut self, id: NodeId) -> bool {
        let Some(dir) = self.dir_of(id) else { return false };
        if let Some(state) = self.node_mut(dir).dir_mut() {
            state.unfolded = false;
        }
        true
    }

    /// Folds `id` and every loaded directory below it.
    pub fn fold_recursive(&mut self, id: NodeId) -> bool {
        let Some(dir) = self.dir_of(id) else { return false };
        for child in self.children(dir).to_vec() {
            if self.is_dir(child) {
                self.fold_recursive(child);
            }
        }
        self.fold(dir)
    }

    /// Rescans the directory behind `id`, carrying fold state and the cursor
    /// over to the new subtree. A vanished non-root node is removed from its
    /// parent; a vanished root is fatal.
    pub fn reload(&mut self, id: NodeId, cursor: &mut NodeId) -> Result<()> {
        let Some(dir) = self.dir_of(id) else { return Ok(()) };
        let was_unfolded = self.is_unfolded(dir);
        let (path, parent, index) = {
            let node = self.node(id);
            (node.path.clone(), node.parent, node.index)
        };
        let carry = !was_unfolded && *cursor != id && self.lies_under(*cursor, id);
        log::debug!("reloading {}", path.display());

        if id == ROOT {
            let fresh = self
                .alloc(None, path.clone())
                .ok_or_else(|| Error::RootGone(path.clone()))?;
            if self.node(fresh).kind != Kind::Directory {
                let doomed = self.subtree(fresh);
                self.discard(&doomed);
                return Err(Error::NotADirectory(path));
            }
            // previous root contents now live in `old`
            self.slots.swap(ROOT.0, fresh.0);
            let old = fresh;
            if was_unfolded || carry {
                self.unfold(ROOT);
            }
            self.reconcile(old, ROOT, cursor);
            if carry {
                self.fold(ROOT);
            }
            self.release(old, cursor, ROOT);
            return Ok(());
        }

        let Some(fresh) = self.alloc(parent, path) else {
            self.detach(id);
            self.release(id, cursor, parent.unwrap_or(ROOT));
            return Ok(());
        };
        self.set_index(fresh, index);
        if let Some(pdir) = parent.and_then(|p| self.dir_of(p)) {
            let slot = self
                .node_mut(pdir)
                .dir_mut()
                .and_then(|state| state.children.as_mut())
                .and_then(|children| children.get_mut(index));
            if let Some(slot) = slot {
                *slot = fresh;
            }
        }
        if was_unfolded || carry {
            self.unfold(fresh);
        }
        if *cursor == id {
            *cursor = fresh;
        }
        self.reconcile(id, fresh, cursor);
        if carry {
            self.fold(fresh);
        }
        self.release(id, cursor, fresh);
        Ok(())
    }

    /// Children are matched by exact name since the rescan may have shifted
    /// positions. Quadratic per level. A cursor below a folded directory is
    /// carried over too, leaving the directory folded; a cursor below a
    /// vanished entry lands on the closest surviving ancestor.
    fn reconcile(&mut self, old: NodeId, new: NodeId, cursor: &mut NodeId) {
        let (Some(old_dir), Some(new_dir)) = (self.dir_of(old), self.dir_of(new)) else {
            return;
        };
        for old_child in self.children(old_dir).to_vec() {
            let holds_cursor = self.lies_under(*cursor, old_child);
            let Some(new_child) = self.find_child(new_dir, self.node(old_child).name_bytes()) else {
                if holds_cursor {
                    *cursor = new;
                }
                continue;
            };
            if *cursor == old_child {
                *cursor = new_child;
            }
            let unfolded = self.is_unfolded(old_child);
            if unfolded || (holds_cursor && *cursor != new_child) {
                self.unfold(new_child);
                self.reconcile(old_child, new_child, cursor);
                if !unfolded {
                    self.fold(new_child);
                }
            }
            if holds_cursor && self.lies_under(*cursor, old_child) {
                *cursor = new_child;
            }
        }
    }

    /// Whether `ancestor` is `id` or one of its parents.
    fn lies_under(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut next = Some(id);
        while let Some(id) = next {
            if id == ancestor {
                return true;
            }
            next = self.get(id).and_then(|node| node.parent);
        }
        false
    }

    fn alloc(&mut self, parent: Option<NodeId>, path: PathBuf) -> Option<NodeId> {
        self.alloc_at(parent, path, 0)
    }

    fn alloc_at(&mut self, parent: Option<NodeId>, path: PathBuf, depth: usize) -> Option<NodeId> {
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                log::debug!("skipping {}: {err}", path.display());
                return None;
            }
        };
        let kind = Kind::classify(&meta);
        let payload = match kind {
            Kind::Directory => Payload::Dir(Dir::default()),
            Kind::Symlink => Payload::Link(Link::default()),
            _ => Payload::Plain,
        };
        let id = self.insert(Node {
            path,
            kind,
            stat: Stat::from(&meta),
            payload,
            parent,
            index: 0,
            count: 0,
        });
        match kind {
            Kind::Symlink => self.resolve_link(id, depth),
            Kind::Directory => self.watch(id),
            _ => {}
        }
        Some(id)
    }

    fn resolve_link(&mut self, id: NodeId, depth: usize) {
        let (path, parent) = {
            let node = self.node(id);
            (node.path.clone(), node.parent)
        };
        let text = match fs::read_link(&path) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("cannot read link {}: {err}", path.display());
                self.set_link(id, Link { readpath: err.to_string(), target: None, tail: None });
                return;
            }
        };
        let readpath = text.to_string_lossy().into_owned();
        let target = if depth >= MAX_LINK_DEPTH {
            log::warn!("{}: too many levels of symbolic links", path.display());
            None
        } else {
            normalize_link(&path, &text).and_then(|resolved| self.alloc_at(parent, resolved, depth + 1))
        };
        let tail = target.and_then(|t| match &self.node(t).payload {
            Payload::Link(link) => link.tail,
            _ => Some(t),
        });
        self.set_link(id, Link { readpath, target, tail });
    }

    fn set_link(&mut self, id: NodeId, link: Link) {
        if let Some(slot) = self.node_mut(id).link_mut() {
            *slot = link;
        }
    }

    fn watch(&mut self, id: NodeId) {
        if !self.flags.watch {
            return;
        }
        let path = self.node(id).path.clone();
        let Some(watches) = self.watches.as_mut() else { return };
        let mask = WatchMask::ATTRIB | WatchMask::CREATE | WatchMask::DELETE | WatchMask::MOVE;
        if let Err(err) = watches.add(&path, mask) {
            log::warn!("cannot watch {}: {err}", path.display());
        }
    }

    fn scan(&mut self, dir: NodeId, via: NodeId) {
        self.scans += 1;
        let path = self.node(dir).path.clone();
        let flags = self.flags;
        let names = match read_names(&path, &flags) {
            Ok(names) => names,
            Err(err) => {
                log::warn!("cannot read {}: {err}", path.display());
                Vec::new()
            }
        };

        let mut children: Vec<NodeId> = Vec::with_capacity(names.len());
        for name in names {
            let Some(id) = self.alloc(Some(via), path.join(&name)) else { continue };
            if flags.ignore && self.filter.ignore(self.node(id)) {
                let doomed = self.subtree(id);
                self.discard(&doomed);
                continue;
            }
            let pos = children
                .iter()
                .rposition(|&c| {
                    compare_with_tiebreak(self.node(c), self.node(id), flags.sort) == Ordering::Less
                })
                .map_or(0, |p| p + 1);
            children.insert(pos, id);
        }

        for (k, &child) in children.iter().enumerate() {
            self.set_index(child, k);
        }
        let count = children.len();
        if let Some(state) = self.node_mut(dir).dir_mut() {
            state.children = Some(children);
        }
        self.set_count(via, count);
        log::debug!("scanned {} ({count} entries)", path.display());
    }

    /// Every link of a chain shares the sibling index of its head.
    fn set_index(&mut self, id: NodeId, index: usize) {
        let mut next = Some(id);
        while let Some(id) = next {
            let node = self.node_mut(id);
            node.index = index;
            next = node.link().and_then(|link| link.target);
        }
    }

    /// Mirrors a directory's child count onto every link leading to it from `via`.
    fn set_count(&mut self, via: NodeId, count: usize) {
        let mut next = Some(via);
        while let Some(id) = next {
            let node = self.node_mut(id);
            node.count = count;
            next = node.link().and_then(|link| link.target);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let (Some(parent), index) = (self.node(id).parent, self.node(id).index) else {
            return;
        };
        let Some(pdir) = self.dir_of(parent) else { return };
        let Some(children) = self
            .node_mut(pdir)
            .dir_mut()
            .and_then(|state| state.children.as_mut())
        else {
            return;
        };
        if children.get(index) != Some(&id) {
            return;
        }
        children.remove(index);
        let shifted = children[index..].to_vec();
        let count = children.len();
        for (k, child) in shifted.into_iter().enumerate() {
            self.set_index(child, index + k);
        }
        self.set_count(parent, count);
    }

    fn release(&mut self, id: NodeId, cursor: &mut NodeId, fallback: NodeId) {
        let doomed = self.subtree(id);
        if doomed.contains(cursor) {
            *cursor = fallback;
        }
        self.discard(&doomed);
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            out.push(id);
            match &self.node(id).payload {
                Payload::Dir(dir) => stack.extend(dir.children.iter().flatten()),
                Payload::Link(link) => stack.extend(link.target),
                Payload::Plain => {}
            }
        }
        out
    }

    fn discard(&mut self, ids: &[NodeId]) {
        for &id in ids {
            if let Some(slot) = self.slots.get_mut(id.0) {
                if slot.take().is_some() {
                    self.vacant.push(id.0);
                }
            }
        }
    }

    fn insert(&mut self, node: Node) -> NodeId {
        match self.vacant.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }
}
