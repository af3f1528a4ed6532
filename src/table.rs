use std::ops::Index;

use crate::utils::MyHash;

struct Entry<T> {
    value: T,
    next: usize,
}

/// Hash-consing table.
///
/// Values are stored in insertion order and never move, so the index returned by
/// [`Table::put`] is a stable handle. Equal values (by `Eq`) always get the same index.
/// Index 0 is reserved as the chain terminator and never holds a value.
pub struct Table<T> {
    data: Vec<Option<Entry<T>>>,

    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T> {
    /// Create a new table with `2^bits` initial buckets.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Table bits should be in the range 0..=31");

        let buckets_size = 1 << bits;
        let mut data = Vec::with_capacity(buckets_size);
        data.push(None); // 0th cell is the sentry.

        Self {
            data,
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
        }
    }

    /// Get the number of stored values.
    pub fn len(&self) -> usize {
        self.data.len() - 1
    }
    /// Check whether the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Get the number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn entry(&self, index: usize) -> &Entry<T> {
        assert_ne!(index, 0, "Index is 0");
        match &self.data[index] {
            Some(entry) => entry,
            None => panic!("Index {} is empty", index),
        }
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        &self.entry(index).value
    }

    /// Get the index of the next cell in the same bucket.
    pub fn next(&self, index: usize) -> usize {
        self.entry(index).next
    }

    /// Iterate over `(index, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, &e.value)))
    }

    fn add(&mut self, value: T) -> usize {
        let index = self.data.len();
        self.data.push(Some(Entry { value, next: 0 }));
        index
    }
}

impl<T> Table<T>
where
    T: MyHash,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Double the number of buckets once chains get too long on average.
    fn maybe_grow(&mut self) {
        if self.len() < 2 * self.buckets.len() {
            return;
        }
        let size = self.buckets.len() * 2;
        self.buckets = vec![0; size];
        self.bitmask = (size - 1) as u64;
        for index in 1..self.data.len() {
            let bucket = match &self.data[index] {
                Some(entry) => (entry.value.hash() & self.bitmask) as usize,
                None => continue,
            };
            let head = self.buckets[bucket];
            if let Some(entry) = &mut self.data[index] {
                entry.next = head;
            }
            self.buckets[bucket] = index;
        }
    }

    /// Find the index of a value equal to `value`, if present.
    pub fn find(&self, value: &T) -> Option<usize>
    where
        T: Eq,
    {
        let mut index = self.buckets[self.bucket_index(value)];
        while index != 0 {
            if value == self.value(index) {
                return Some(index);
            }
            index = self.next(index);
        }
        None
    }

    /// Put a value into the table and return its index.
    ///
    /// Returns `(index, true)` if the value was freshly inserted,
    /// or `(index, false)` if an equal value already existed.
    pub fn put(&mut self, value: T) -> (usize, bool)
    where
        T: Eq,
    {
        if let Some(index) = self.find(&value) {
            return (index, false);
        }

        let bucket_index = self.bucket_index(&value);
        let head = self.buckets[bucket_index];
        let i = self.add(value);
        if let Some(entry) = &mut self.data[i] {
            entry.next = head;
        }
        self.buckets[bucket_index] = i;
        self.maybe_grow();
        (i, true)
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
