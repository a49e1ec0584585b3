use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};

/// A mapping from input names to values, consumed by a forward pass.
///
/// Entries that no input node asks for are ignored.
pub trait Feed {
    fn get(&self, name: &str) -> Option<f64>;
}

impl<K, S> Feed for HashMap<K, f64, S>
where
    K: Borrow<str> + Hash + Eq,
    S: BuildHasher,
{
    fn get(&self, name: &str) -> Option<f64> {
        HashMap::get(self, name).copied()
    }
}

impl<K> Feed for BTreeMap<K, f64>
where
    K: Borrow<str> + Ord,
{
    fn get(&self, name: &str) -> Option<f64> {
        BTreeMap::get(self, name).copied()
    }
}

impl Feed for [(&str, f64)] {
    fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(key, _)| *key == name).map(|(_, v)| *v)
    }
}

impl<const N: usize> Feed for [(&str, f64); N] {
    fn get(&self, name: &str) -> Option<f64> {
        Feed::get(self.as_slice(), name)
    }
}

impl<F: Feed + ?Sized> Feed for &F {
    fn get(&self, name: &str) -> Option<f64> {
        (**self).get(name)
    }
}
