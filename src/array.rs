//! Symbolic arrays: named byte-addressed memories that reads are rooted at.

use std::fmt;

use crate::utils::{hash3, hash_name};

/// Identifies the allocation an array was created for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AllocKey {
    pub alloc_site: u64,
    pub iteration: u64,
    pub size: u64,
}

impl AllocKey {
    pub fn new(alloc_site: u64, iteration: u64, size: u64) -> Self {
        Self {
            alloc_site,
            iteration,
            size,
        }
    }

    fn hash(&self) -> u64 {
        hash3(self.alloc_site, self.iteration, self.size)
    }
}

/// Contents of an array.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ArrayContents {
    /// Unknown contents, to be decided by the solver.
    Symbolic,
    /// Known contents, one byte per index.
    Constant(Vec<u8>),
}

/// A fixed-size mapping from 32-bit indices to bytes.
///
/// Arrays are immutable once registered with the builder.
#[derive(Debug, Clone)]
pub struct Array {
    name: String,
    size: u32,
    alloc_key: Option<AllocKey>,
    contents: ArrayContents,
    hash: u64,
}

/// What two arrays must agree on to be unified by
/// [`ExprBuilder::unique_array`][crate::builder::ExprBuilder::unique_array].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) enum ArrayKey {
    Constant(Vec<u8>),
    Alloc(AllocKey),
    Name(String, u32),
}

impl Array {
    pub fn symbolic(name: impl Into<String>, size: u32) -> Self {
        Self::build(name.into(), size, None, ArrayContents::Symbolic)
    }

    pub fn constant(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        Self::build(name.into(), size, None, ArrayContents::Constant(bytes))
    }

    /// Attach the allocation this array was created for.
    pub fn with_alloc_key(self, key: AllocKey) -> Self {
        Self::build(self.name, self.size, Some(key), self.contents)
    }

    fn build(name: String, size: u32, alloc_key: Option<AllocKey>, contents: ArrayContents) -> Self {
        assert!(size > 0, "Array '{}' should not be empty", name);
        let hash = match &contents {
            // size + sum(value * (i + 1))
            ArrayContents::Constant(bytes) => bytes
                .iter()
                .enumerate()
                .fold(size as u64, |h, (i, &b)| {
                    h.wrapping_add((b as u64).wrapping_mul(i as u64 + 1))
                }),
            ArrayContents::Symbolic => match &alloc_key {
                Some(key) => key.hash(),
                None => hash_name(&name),
            },
        };
        Self {
            name,
            size,
            alloc_key,
            contents,
            hash,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn size(&self) -> u32 {
        self.size
    }
    pub fn alloc_key(&self) -> Option<AllocKey> {
        self.alloc_key
    }
    pub fn contents(&self) -> &ArrayContents {
        &self.contents
    }
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.contents, ArrayContents::Symbolic)
    }
    pub fn is_constant(&self) -> bool {
        !self.is_symbolic()
    }

    /// Constant bytes, if the array is constant.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            ArrayContents::Constant(bytes) => Some(bytes),
            ArrayContents::Symbolic => None,
        }
    }

    /// The constant byte at `index`, if known.
    pub fn value(&self, index: u64) -> Option<u8> {
        self.bytes()
            .and_then(|bytes| bytes.get(usize::try_from(index).ok()?).copied())
    }

    pub(crate) fn key(&self) -> ArrayKey {
        match (&self.contents, self.alloc_key) {
            (ArrayContents::Constant(bytes), _) => ArrayKey::Constant(bytes.clone()),
            (ArrayContents::Symbolic, Some(key)) => ArrayKey::Alloc(key),
            (ArrayContents::Symbolic, None) => ArrayKey::Name(self.name.clone(), self.size),
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.size)?;
        if self.is_constant() {
            write!(f, " = const")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_constant_hash() {
        let a = Array::constant("a", vec![1, 2, 3]);
        assert_eq!(a.hash(), 3 + 1 + 2 * 2 + 3 * 3);
        let b = Array::constant("b", vec![1, 2, 3]);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_symbolic_key() {
        let a = Array::symbolic("x", 4);
        let b = Array::symbolic("x", 4);
        assert_eq!(a.key(), b.key());

        let key = AllocKey::new(10, 0, 4);
        let c = Array::symbolic("x", 4).with_alloc_key(key);
        let d = Array::symbolic("y", 4).with_alloc_key(key);
        assert_eq!(c.key(), d.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_value() {
        let a = Array::constant("a", vec![7, 8]);
        assert_eq!(a.value(1), Some(8));
        assert_eq!(a.value(2), None);
        assert_eq!(Array::symbolic("s", 2).value(0), None);
        assert_eq!(a.to_string(), "a[2] = const");
    }

    #[test]
    #[should_panic(expected = "should not be empty")]
    fn test_empty() {
        Array::symbolic("e", 0);
    }
}
