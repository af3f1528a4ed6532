//! Persistent update logs.
//!
//! An [`UpdateLog`] is a root [`Array`] plus a singly linked list of writes,
//! newest first. Update nodes are hash-consed like expressions, so extending a
//! log never copies it and two logs with structurally equal writes share nodes.

use std::cmp::Ordering;

use log::debug;

use crate::array::Array;
use crate::builder::ExprBuilder;
use crate::reference::{ArrayRef, ExprRef, UpdateRef};
use crate::types::{DOMAIN, RANGE};
use crate::utils::{hash3, mix, MyHash};

/// One write `array[index] = value`, linked to the previous writes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UpdateNode {
    pub index: ExprRef,
    pub value: ExprRef,
    pub next: Option<UpdateRef>,
}

#[derive(Debug, Clone)]
pub(crate) struct UpdateData {
    pub node: UpdateNode,
    pub hash: u64,
    pub len: u32,
}

impl PartialEq for UpdateData {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for UpdateData {}

impl MyHash for UpdateData {
    fn hash(&self) -> u64 {
        self.hash
    }
}

/// Writes to one array, newest first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UpdateLog {
    root: ArrayRef,
    head: Option<UpdateRef>,
}

impl UpdateLog {
    /// An empty log over `root`.
    pub fn new(root: ArrayRef) -> Self {
        Self { root, head: None }
    }

    pub fn root(&self) -> ArrayRef {
        self.root
    }
    pub fn head(&self) -> Option<UpdateRef> {
        self.head
    }
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// The log consisting of `head` and everything older, over the same root.
    pub fn suffix(&self, head: Option<UpdateRef>) -> Self {
        Self {
            root: self.root,
            head,
        }
    }
}

impl ExprBuilder {
    pub fn update(&self, u: UpdateRef) -> UpdateNode {
        self.updates.borrow().value(u.index()).node
    }

    fn update_hash(&self, u: Option<UpdateRef>) -> u64 {
        u.map_or(0, |u| self.updates.borrow().value(u.index()).hash)
    }

    /// Number of writes in the log.
    pub fn log_len(&self, log: UpdateLog) -> u32 {
        log.head
            .map_or(0, |u| self.updates.borrow().value(u.index()).len)
    }

    pub(crate) fn log_hash(&self, log: UpdateLog) -> u64 {
        mix(self.array(log.root).hash(), self.update_hash(log.head))
    }

    /// Update nodes of the log, newest first.
    pub fn log_nodes(&self, log: UpdateLog) -> Vec<(UpdateRef, UpdateNode)> {
        let mut nodes = Vec::with_capacity(self.log_len(log) as usize);
        let mut cur = log.head;
        while let Some(u) = cur {
            let node = self.update(u);
            nodes.push((u, node));
            cur = node.next;
        }
        nodes
    }

    /// `(index, value)` pairs of the log, newest first.
    pub fn log_entries(&self, log: UpdateLog) -> Vec<(ExprRef, ExprRef)> {
        self.log_nodes(log)
            .into_iter()
            .map(|(_, n)| (n.index, n.value))
            .collect()
    }

    /// Return a new log with the write `index := value` in front of `log`.
    ///
    /// `log` itself is unchanged and shares its nodes with the result.
    pub fn extend(&self, log: UpdateLog, index: ExprRef, value: ExprRef) -> UpdateLog {
        assert_eq!(self.width(index), DOMAIN, "Update index should be {} bits", DOMAIN);
        assert_eq!(self.width(value), RANGE, "Update value should be {} bits", RANGE);

        let node = UpdateNode {
            index,
            value,
            next: log.head,
        };
        let hash = hash3(self.hash(index), self.hash(value), self.update_hash(log.head));
        let len = self.log_len(log) + 1;
        let (i, _) = self
            .updates
            .borrow_mut()
            .put(UpdateData { node, hash, len });
        UpdateLog {
            root: log.root,
            head: Some(UpdateRef::new(i as u32)),
        }
    }

    /// Build a log from a history of writes, oldest first.
    ///
    /// When `root` is constant, the longest prefix of writes with constant index
    /// and value is applied to a copy of its contents, which becomes the root of
    /// the returned log. The remaining writes are linked as usual.
    pub fn log_from_writes(&self, root: ArrayRef, writes: &[(ExprRef, ExprRef)]) -> UpdateLog {
        let array = self.array(root);
        let prefix = match array.bytes() {
            Some(_) => writes
                .iter()
                .take_while(|&&(i, v)| self.is_const(i) && self.is_const(v))
                .count(),
            None => 0,
        };

        let mut log = UpdateLog::new(root);
        if let (Some(bytes), true) = (array.bytes(), prefix > 0) {
            let mut bytes = bytes.to_vec();
            for &(i, v) in &writes[..prefix] {
                let index = self.as_const(i).and_then(|c| c.to_u64());
                let value = self.as_const(v).map(|c| c.low_u64() as u8);
                match (index.and_then(|i| usize::try_from(i).ok()), value) {
                    (Some(index), Some(value)) if index < bytes.len() => bytes[index] = value,
                    _ => panic!("Write out of bounds of array '{}'", array.name()),
                }
            }
            let n = self.next_flushed_array.get();
            self.next_flushed_array.set(n + 1);
            let flushed = self.unique_array(Array::constant(format!("simpl_arr{}", n), bytes));
            debug!(
                "log_from_writes: flushed {} constant writes into {}",
                prefix,
                self.array(flushed)
            );
            log = UpdateLog::new(flushed);
        }

        writes[prefix..]
            .iter()
            .fold(log, |log, &(i, v)| self.extend(log, i, v))
    }

    /// Order logs by root, then length, then entry by entry from the newest.
    pub fn compare_logs(&self, a: UpdateLog, b: UpdateLog) -> Ordering {
        let ord = self
            .compare_arrays(a.root, b.root)
            .then_with(|| self.log_len(a).cmp(&self.log_len(b)));
        if ord != Ordering::Equal {
            return ord;
        }
        let (mut x, mut y) = (a.head, b.head);
        while let (Some(u), Some(v)) = (x, y) {
            if u == v {
                // Shared tail.
                break;
            }
            let (un, vn) = (self.update(u), self.update(v));
            let ord = self
                .compare(un.index, vn.index)
                .then_with(|| self.compare(un.value, vn.value));
            if ord != Ordering::Equal {
                return ord;
            }
            x = un.next;
            y = vn.next;
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_extend_is_persistent() {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 4));
        let empty = UpdateLog::new(a);
        let one = b.extend(empty, b.mk_const(0, 32), b.mk_const(7, 8));
        let two = b.extend(one, b.mk_const(1, 32), b.mk_const(8, 8));
        assert_eq!(b.log_len(empty), 0);
        assert_eq!(b.log_len(one), 1);
        assert_eq!(b.log_len(two), 2);
        assert_eq!(b.update(two.head().unwrap()).next, one.head());
    }

    #[test]
    fn test_extend_hash_consed() {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 4));
        let i = b.mk_const(0, 32);
        let v = b.mk_const(7, 8);
        let l1 = b.extend(UpdateLog::new(a), i, v);
        let l2 = b.extend(UpdateLog::new(a), i, v);
        assert_eq!(l1, l2);
        assert_eq!(b.compare_logs(l1, l2), Ordering::Equal);
    }

    #[test]
    fn test_log_entries_newest_first() {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 4));
        let (i0, i1) = (b.mk_const(0, 32), b.mk_const(1, 32));
        let (v0, v1) = (b.mk_const(5, 8), b.mk_const(6, 8));
        let log = b.extend(b.extend(UpdateLog::new(a), i0, v0), i1, v1);
        assert_eq!(b.log_entries(log), vec![(i1, v1), (i0, v0)]);
    }

    #[test]
    fn test_compare_logs() {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 4));
        let i = b.mk_const(0, 32);
        let l1 = b.extend(UpdateLog::new(a), i, b.mk_const(1, 8));
        let l2 = b.extend(UpdateLog::new(a), i, b.mk_const(2, 8));
        let l0 = UpdateLog::new(a);
        assert_eq!(b.compare_logs(l0, l1), Ordering::Less);
        assert_eq!(b.compare_logs(l1, l2), b.compare_logs(l2, l1).reverse());
        assert_ne!(b.compare_logs(l1, l2), Ordering::Equal);
    }

    #[test]
    fn test_from_writes_flushes_constant_prefix() {
        let b = ExprBuilder::default();
        let root = b.mk_array(Array::constant("buf", vec![0; 4]));
        let sym = b.mk_array(Array::symbolic("s", 4));
        let k = b.mk_read(UpdateLog::new(sym), b.mk_const(0, 32));
        let ki = b.mk_zext(k, 32);
        let writes = vec![
            (b.mk_const(1, 32), b.mk_const(9, 8)),
            (b.mk_const(2, 32), b.mk_const(8, 8)),
            (ki, b.mk_const(3, 8)),
            (b.mk_const(3, 32), b.mk_const(4, 8)),
        ];
        let log = b.log_from_writes(root, &writes);
        assert_eq!(b.log_len(log), 2);
        let flushed = b.array(log.root());
        assert_eq!(flushed.bytes(), Some(&[0u8, 9, 8, 0][..]));
        assert!(flushed.name().starts_with("simpl_arr"));

        // The same contents are unified.
        let again = b.log_from_writes(root, &writes[..2]);
        assert_eq!(again.root(), log.root());
        assert!(again.is_empty());
    }

    #[test]
    fn test_from_writes_symbolic_root() {
        let b = ExprBuilder::default();
        let root = b.mk_array(Array::symbolic("s", 4));
        let writes = vec![(b.mk_const(1, 32), b.mk_const(9, 8))];
        let log = b.log_from_writes(root, &writes);
        assert_eq!(log.root(), root);
        assert_eq!(b.log_len(log), 1);
    }

    #[test]
    #[should_panic(expected = "Update index should be 32 bits")]
    fn test_extend_bad_index() {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 4));
        b.extend(UpdateLog::new(a), b.mk_const(0, 8), b.mk_const(0, 8));
    }
}
