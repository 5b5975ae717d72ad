use std::iter::Zip;

/// Insertion-ordered map with a small number of keys; lookups are linear
#[derive(Debug)]
pub struct KeyedVec<K, V>
where
    K: PartialEq,
{
    keys: Vec<K>,
    values: Vec<V>,
}
impl<K, V> Default for KeyedVec<K, V>
where
    K: PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
impl<K, V> KeyedVec<K, V>
where
    K: PartialEq,
{
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }
    /// Append a new entry, returning its position, or `None` if the key exists
    pub fn add(&mut self, key: K, value: V) -> Option<usize> {
        if self.keys.contains(&key) {
            return None;
        }
        self.keys.push(key);
        self.values.push(value);
        Some(self.values.len() - 1)
    }
    pub fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
    pub fn get(&self, key: &K) -> Option<&V> {
        self.position(key).map(|idx| &self.values[idx])
    }
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.position(key).map(|idx| &mut self.values[idx])
    }
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.position(key)?;
        self.keys.remove(idx);
        Some(self.values.remove(idx))
    }
    pub fn len(&self) -> usize {
        self.keys.len()
    }
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
    pub fn values(&self) -> &[V] {
        &self.values
    }
    pub fn values_mut(&mut self) -> &mut [V] {
        &mut self.values
    }
    pub fn value_at(&self, idx: usize) -> &V {
        &self.values[idx]
    }
    pub fn value_at_mut(&mut self, idx: usize) -> &mut V {
        &mut self.values[idx]
    }
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.keys.iter().zip(self.values.iter())
    }
}

impl<K, V> IntoIterator for KeyedVec<K, V>
where
    K: PartialEq,
{
    type IntoIter = Zip<std::vec::IntoIter<K>, std::vec::IntoIter<V>>;
    type Item = (K, V);
    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter().zip(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_keys_and_keeps_order() {
        let mut kv: KeyedVec<String, i32> = KeyedVec::new();
        assert_eq!(kv.add("a".into(), 1), Some(0));
        assert_eq!(kv.add("b".into(), 2), Some(1));
        assert_eq!(kv.add("a".into(), 3), None);
        assert_eq!(kv.get(&"a".into()), Some(&1));
        assert_eq!(kv.remove(&"a".into()), Some(1));
        assert_eq!(kv.position(&"b".into()), Some(0));
    }
}
