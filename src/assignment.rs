//! Concrete contents for symbolic arrays.
//!
//! An [`Assignment`] maps arrays to byte vectors. Arrays can also be marked
//! *free*: they belong to the assignment but have no contents yet, and are
//! filled later by one of the `bind_free*` policies. The counterexample cache
//! uses this to try cheap candidate models before asking a solver.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{BufRead, Read, Write};

use log::debug;

use crate::builder::ExprBuilder;
use crate::error::AssignmentError;
use crate::eval::{Evaluator, InitialValues};
use crate::reference::{ArrayRef, ExprRef};
use crate::types::{DOMAIN, RANGE};
use crate::updates::UpdateLog;

/// Length of a persisted binding above which `load` refuses it.
const MAX_BINDING_LEN: usize = 16 << 20;

#[derive(Debug, Clone, Default)]
pub struct Assignment {
    allow_free_values: bool,
    bindings: BTreeMap<ArrayRef, Vec<u8>>,
    free: BTreeSet<ArrayRef>,
}

// Two assignments are the same model when they bind the same bytes.
impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Eq for Assignment {}

impl Hash for Assignment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bindings.hash(state);
    }
}

impl Assignment {
    /// An empty assignment.
    ///
    /// With `allow_free_values`, reads of unbound arrays evaluate to themselves
    /// instead of zero.
    pub fn new(allow_free_values: bool) -> Self {
        Self {
            allow_free_values,
            ..Default::default()
        }
    }

    /// Build an assignment binding `arrays[i]` to `values[i]`.
    pub fn from_bindings(
        b: &ExprBuilder,
        arrays: &[ArrayRef],
        values: Vec<Vec<u8>>,
    ) -> Self {
        assert_eq!(arrays.len(), values.len(), "Each array should have one binding");
        let mut a = Assignment::new(false);
        for (&array, bytes) in arrays.iter().zip(values) {
            a.bind(b, array, bytes);
        }
        a
    }

    pub fn allow_free_values(&self) -> bool {
        self.allow_free_values
    }

    /// Bind `array` to `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `array` is already bound or `bytes` does not match its size.
    pub fn bind(&mut self, b: &ExprBuilder, array: ArrayRef, bytes: Vec<u8>) {
        let arr = b.array(array);
        assert_eq!(
            bytes.len(),
            arr.size() as usize,
            "Binding for '{}' should have {} bytes",
            arr.name(),
            arr.size()
        );
        assert!(
            !self.bindings.contains_key(&array),
            "Array '{}' is already bound",
            arr.name()
        );
        self.bindings.insert(array, bytes);
    }

    /// Add `array` to the free set, to be bound by a `bind_free*` call.
    pub fn mark_free(&mut self, array: ArrayRef) {
        assert!(!self.bindings.contains_key(&array), "Bound arrays cannot be free");
        self.free.insert(array);
    }

    /// Bind one free array, removing it from the free set.
    pub fn bind_free(&mut self, b: &ExprBuilder, array: ArrayRef, bytes: Vec<u8>) {
        assert!(self.free.remove(&array), "Array should be free");
        self.bind(b, array, bytes);
    }

    /// Bind every free array to `size` copies of `byte`.
    pub fn bind_free_to_u8(&mut self, b: &ExprBuilder, byte: u8) {
        self.bind_free_to_sequence(b, &[byte]);
    }

    /// Bind every free array to `seq` repeated over its whole size.
    pub fn bind_free_to_sequence(&mut self, b: &ExprBuilder, seq: &[u8]) {
        assert!(!seq.is_empty(), "Fill sequence should not be empty");
        for array in std::mem::take(&mut self.free) {
            let size = b.array(array).size() as usize;
            let bytes = seq.iter().copied().cycle().take(size).collect();
            self.bind(b, array, bytes);
        }
    }

    pub fn bind_free_to_zero(&mut self, b: &ExprBuilder) {
        self.bind_free_to_u8(b, 0);
    }

    pub fn binding(&self, array: ArrayRef) -> Option<&[u8]> {
        self.bindings.get(&array).map(Vec::as_slice)
    }

    /// Bound arrays with their contents, ordered by handle.
    pub fn bindings(&self) -> impl Iterator<Item = (ArrayRef, &[u8])> + '_ {
        self.bindings.iter().map(|(&a, v)| (a, v.as_slice()))
    }

    pub fn free_arrays(&self) -> impl Iterator<Item = ArrayRef> + '_ {
        self.free.iter().copied()
    }

    pub fn num_bindings(&self) -> usize {
        self.bindings.len()
    }
    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    /// Total number of bound bytes.
    pub fn binding_bytes(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Evaluate `e`, replacing reads of bound arrays by their contents.
    pub fn evaluate(&self, b: &ExprBuilder, e: ExprRef) -> ExprRef {
        Evaluator::new(b, self).evaluate(e)
    }

    /// Evaluate `e`, giving up after visiting `budget` nodes.
    pub fn evaluate_costly(&self, b: &ExprBuilder, e: ExprRef, budget: usize) -> Option<ExprRef> {
        Evaluator::new(b, self).with_budget(budget).evaluate_costly(e)
    }

    /// Whether every expression evaluates to `true`.
    pub fn satisfies(&self, b: &ExprBuilder, exprs: &[ExprRef]) -> bool {
        let mut ev = Evaluator::new(b, self);
        exprs.iter().all(|&e| b.is_true(ev.evaluate(e)))
    }

    /// Whether some expression evaluates to `false`.
    pub fn refutes(&self, b: &ExprBuilder, exprs: &[ExprRef]) -> bool {
        let mut ev = Evaluator::new(b, self);
        exprs.iter().any(|&e| b.is_false(ev.evaluate(e)))
    }

    /// Write the bindings: per array a line `name len`, then the raw bytes and
    /// a newline.
    pub fn save<W: Write>(&self, b: &ExprBuilder, mut w: W) -> Result<(), AssignmentError> {
        // Bindings are matched by name on load, so names must be distinct.
        let mut names = BTreeSet::new();
        for &array in self.bindings.keys() {
            let name = b.array(array).name().to_string();
            if !names.insert(name.clone()) {
                return Err(AssignmentError::DuplicateName(name));
            }
        }

        for (&array, bytes) in &self.bindings {
            writeln!(w, "{} {}", b.array(array).name(), bytes.len())?;
            w.write_all(bytes)?;
            writeln!(w)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Read bindings written by [`save`][Self::save] for the given arrays,
    /// matched by name.
    pub fn load<R: BufRead>(
        b: &ExprBuilder,
        mut r: R,
        arrays: &[ArrayRef],
    ) -> Result<Assignment, AssignmentError> {
        let by_name: BTreeMap<String, ArrayRef> = arrays
            .iter()
            .map(|&a| (b.array(a).name().to_string(), a))
            .collect();

        let mut assignment = Assignment::new(false);
        let mut header = String::new();
        let mut line = 0;
        loop {
            header.clear();
            if r.read_line(&mut header)? == 0 {
                break;
            }
            line += 1;
            let parse = |reason: &str| AssignmentError::Parse {
                line,
                reason: reason.to_string(),
            };

            let mut parts = header.trim_end_matches('\n').split(' ');
            let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| parse("missing name"))?;
            let len: usize = parts
                .next()
                .ok_or_else(|| parse("missing length"))?
                .parse()
                .map_err(|_| parse("invalid length"))?;
            if parts.next().is_some() {
                return Err(parse("trailing data after length"));
            }
            if len > MAX_BINDING_LEN {
                return Err(parse("binding too large"));
            }

            let array = *by_name
                .get(name)
                .ok_or_else(|| AssignmentError::UnknownArray(name.to_string()))?;
            let size = b.array(array).size() as usize;
            if size != len {
                return Err(parse(&format!("length {} does not match array size {}", len, size)));
            }
            if assignment.bindings.contains_key(&array) {
                return Err(AssignmentError::DuplicateName(name.to_string()));
            }

            let mut bytes = Vec::with_capacity(len);
            let found = (&mut r).take(len as u64).read_to_end(&mut bytes)?;
            if found < len {
                return Err(AssignmentError::Truncated {
                    name: name.to_string(),
                    expected: len,
                    found,
                });
            }
            if r.fill_buf()?.first() == Some(&b'\n') {
                r.consume(1);
            }
            line += 1;

            assignment.bindings.insert(array, bytes);
        }

        debug!("load: read {} bindings", assignment.num_bindings());
        Ok(assignment)
    }

    /// Display adaptor naming arrays through `b`.
    pub fn display<'a>(&'a self, b: &'a ExprBuilder) -> impl fmt::Display + 'a {
        AssignmentDisplay { a: self, b }
    }
}

impl InitialValues for Assignment {
    fn initial_value(&self, b: &ExprBuilder, array: ArrayRef, index: u64) -> ExprRef {
        let byte = usize::try_from(index)
            .ok()
            .and_then(|i| self.bindings.get(&array)?.get(i).copied());
        match byte {
            Some(byte) => b.mk_const(byte as u64, RANGE),
            None if self.allow_free_values => {
                b.mk_read(UpdateLog::new(array), b.mk_const(index, DOMAIN))
            }
            None => b.mk_const(0, RANGE),
        }
    }
}

struct AssignmentDisplay<'a> {
    a: &'a Assignment,
    b: &'a ExprBuilder,
}

impl fmt::Display for AssignmentDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (array, bytes) in self.a.bindings() {
            writeln!(f, "{} = {:?}", self.b.array(array).name(), bytes)?;
        }
        for array in self.a.free_arrays() {
            writeln!(f, "{} = <free>", self.b.array(array).name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::types::{INT32, INT8};
    use std::io::Cursor;
    use test_log::test;

    fn setup() -> (ExprBuilder, ArrayRef, ArrayRef) {
        let b = ExprBuilder::default();
        let x = b.mk_array(Array::symbolic("x", 2));
        let y = b.mk_array(Array::symbolic("y", 3));
        (b, x, y)
    }

    fn byte(b: &ExprBuilder, a: ArrayRef, i: u64) -> ExprRef {
        b.mk_read(UpdateLog::new(a), b.mk_const(i, INT32))
    }

    #[test]
    fn test_evaluate_bound() {
        let (b, x, _) = setup();
        let mut a = Assignment::new(false);
        a.bind(&b, x, vec![3, 4]);
        let e = b.mk_add(byte(&b, x, 0), byte(&b, x, 1));
        assert_eq!(a.evaluate(&b, e), b.mk_const(7, INT8));
    }

    #[test]
    fn test_unbound_defaults() {
        let (b, _, y) = setup();
        let e = byte(&b, y, 1);
        assert_eq!(Assignment::new(false).evaluate(&b, e), b.mk_const(0, INT8));
        assert_eq!(Assignment::new(true).evaluate(&b, e), e);
    }

    #[test]
    fn test_satisfies_and_refutes() {
        let (b, x, _) = setup();
        let mut a = Assignment::new(false);
        a.bind(&b, x, vec![3, 4]);
        let lt = b.mk_ult(byte(&b, x, 0), byte(&b, x, 1));
        let gt = b.mk_ugt(byte(&b, x, 0), byte(&b, x, 1));
        assert!(a.satisfies(&b, &[lt]));
        assert!(!a.satisfies(&b, &[lt, gt]));
        assert!(a.refutes(&b, &[lt, gt]));
        assert!(!a.refutes(&b, &[lt]));
        assert!(a.satisfies(&b, &[]));
    }

    #[test]
    fn test_free_policies() {
        let (b, x, y) = setup();
        let mut a = Assignment::new(false);
        a.mark_free(x);
        a.mark_free(y);
        a.bind_free(&b, x, vec![1, 2]);
        assert_eq!(a.num_free(), 1);
        a.bind_free_to_sequence(&b, &[9, 8]);
        assert_eq!(a.binding(x), Some(&[1u8, 2][..]));
        assert_eq!(a.binding(y), Some(&[9u8, 8, 9][..]));
        assert_eq!(a.num_free(), 0);
        assert_eq!(a.binding_bytes(), 5);

        let mut z = Assignment::new(false);
        z.mark_free(y);
        z.bind_free_to_zero(&b);
        assert_eq!(z.binding(y), Some(&[0u8, 0, 0][..]));
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn test_bind_twice() {
        let (b, x, _) = setup();
        let mut a = Assignment::new(false);
        a.bind(&b, x, vec![0, 0]);
        a.bind(&b, x, vec![1, 1]);
    }

    #[test]
    #[should_panic(expected = "Array should be free")]
    fn test_bind_free_not_free() {
        let (b, x, _) = setup();
        let mut a = Assignment::new(false);
        a.bind_free(&b, x, vec![0, 0]);
    }

    #[test]
    fn test_equality_ignores_free() {
        let (b, x, y) = setup();
        let mut a1 = Assignment::new(false);
        a1.bind(&b, x, vec![1, 2]);
        let mut a2 = Assignment::new(true);
        a2.bind(&b, x, vec![1, 2]);
        a2.mark_free(y);
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_save_load() {
        let (b, x, y) = setup();
        let mut a = Assignment::new(false);
        a.bind(&b, x, vec![b'\n', 0]);
        a.bind(&b, y, vec![1, 2, 3]);
        let mut buf = Vec::new();
        a.save(&b, &mut buf).unwrap();
        assert!(buf.starts_with(b"x 2\n\n\0\ny 3\n"));

        let loaded = Assignment::load(&b, Cursor::new(buf), &[x, y]).unwrap();
        assert_eq!(loaded, a);
    }

    #[test]
    fn test_save_rejects_duplicate_names() {
        let b = ExprBuilder::default();
        let first = b.mk_array(Array::symbolic("in", 1));
        let second = b.mk_array(Array::symbolic("in", 1));
        assert_ne!(first, second);
        let mut a = Assignment::new(false);
        a.bind(&b, first, vec![1]);
        a.bind(&b, second, vec![2]);

        let mut buf = Vec::new();
        let err = a.save(&b, &mut buf).unwrap_err();
        assert!(matches!(err, AssignmentError::DuplicateName(name) if name == "in"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_load_errors() {
        let (b, x, y) = setup();
        let err = Assignment::load(&b, Cursor::new(b"x 2\n\x01".to_vec()), &[x]).unwrap_err();
        assert!(matches!(err, AssignmentError::Truncated { expected: 2, found: 1, .. }));

        let err = Assignment::load(&b, Cursor::new(b"z 2\n\0\0\n".to_vec()), &[x]).unwrap_err();
        assert!(matches!(err, AssignmentError::UnknownArray(name) if name == "z"));

        let err = Assignment::load(&b, Cursor::new(b"x 2\n\0\0\nx 2\n\0\0\n".to_vec()), &[x]).unwrap_err();
        assert!(matches!(err, AssignmentError::DuplicateName(_)));

        let err = Assignment::load(&b, Cursor::new(b"y\n".to_vec()), &[y]).unwrap_err();
        assert!(matches!(err, AssignmentError::Parse { line: 1, .. }));

        let err = Assignment::load(&b, Cursor::new(b"y 2\n\0\0\n".to_vec()), &[y]).unwrap_err();
        assert!(matches!(err, AssignmentError::Parse { .. }));
    }

    #[test]
    fn test_display() {
        let (b, x, y) = setup();
        let mut a = Assignment::new(false);
        a.bind(&b, x, vec![1, 2]);
        a.mark_free(y);
        assert_eq!(a.display(&b).to_string(), "x = [1, 2]\ny = <free>\n");
    }
}
