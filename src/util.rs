use core::hash::Hash;
use std::collections::HashSet;
use std::fmt::Debug;

/// Insertion-ordered set: iterable as a slice, testable in constant time.
#[derive(Clone, Eq)]
pub struct VecSet<T: Hash> {
    vec: Vec<T>,
    set: HashSet<T>,
}

impl<T: Hash + Eq + Clone> VecSet<T> {
    /// Returns true iff the element was not yet present.
    pub fn insert(&mut self, element: T) -> bool {
        let success = self.set.insert(element.clone());
        if success {
            self.vec.push(element);
        }
        success
    }
    pub fn contains(&self, element: &T) -> bool {
        self.set.contains(element)
    }
    pub fn extend(&mut self, elements: impl IntoIterator<Item = T>) {
        for x in elements.into_iter() {
            self.insert(x);
        }
    }
}
impl<T: Hash + Eq + Clone> FromIterator<T> for VecSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut c = VecSet::default();
        c.extend(iter);
        c
    }
}
impl<T: Hash> VecSet<T> {
    pub fn as_slice(&self) -> &[T] {
        self.vec.as_slice()
    }
    pub fn len(&self) -> usize {
        self.vec.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

impl<T: Debug + Hash> Debug for VecSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

impl<T: Hash + PartialEq> PartialEq for VecSet<T> {
    fn eq(&self, other: &VecSet<T>) -> bool {
        self.vec == other.vec
    }
}

impl<T: Hash> Default for VecSet<T> {
    fn default() -> Self {
        Self { vec: Default::default(), set: Default::default() }
    }
}

#[test]
fn vec_set_keeps_first_insertion_only() {
    let mut set = VecSet::default();
    assert!(set.insert(3));
    assert!(set.insert(1));
    assert!(!set.insert(3));
    assert_eq!(set.as_slice(), &[3, 1]);
    assert!(set.contains(&1));
}
