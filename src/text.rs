use core::fmt::{Debug, Formatter};
use std::collections::HashMap;

type TextIndex = u32;

/// Dense id of an interned relation name.
#[derive(Hash, PartialOrd, Ord, Eq, PartialEq, Clone, Copy)]
pub struct Text(TextIndex);

/// Interning table owned by whoever needs stable ids, e.g. one stratification run.
#[derive(Default)]
pub struct TextMap {
    val_to_idx: HashMap<String, Text>,
    idx_to_val: Vec<String>,
}

impl Text {
    pub fn index(self) -> usize {
        self.0 as usize
    }
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as TextIndex)
    }
}

impl TextMap {
    pub fn intern(&mut self, val: &str) -> Text {
        if let Some(&idx) = self.val_to_idx.get(val) {
            idx
        } else {
            let idx = Text(self.idx_to_val.len() as TextIndex);
            self.val_to_idx.insert(val.to_string(), idx);
            self.idx_to_val.push(val.to_string());
            idx
        }
    }
    pub fn get(&self, val: &str) -> Option<Text> {
        self.val_to_idx.get(val).copied()
    }
    pub fn get_str(&self, idx: Text) -> &str {
        &self.idx_to_val[idx.index()]
    }
    pub fn len(&self) -> usize {
        self.idx_to_val.len()
    }
    pub fn is_empty(&self) -> bool {
        self.idx_to_val.is_empty()
    }
}

impl Debug for Text {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Debug for TextMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.idx_to_val.iter().enumerate()).finish()
    }
}

#[test]
fn interning_is_stable() {
    let mut map = TextMap::default();
    let edge = map.intern("edge");
    let path = map.intern("path");
    assert_eq!(map.intern("edge"), edge);
    assert_eq!(map.get("path"), Some(path));
    assert_eq!(map.get_str(path), "path");
    assert_eq!(map.len(), 2);
}
