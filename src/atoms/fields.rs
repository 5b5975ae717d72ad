//! Runtime-registered per-atom data.
//!
//! A style that needs its own per-atom state (charges, bond history, ...)
//! registers a [`PerAtomField`] with the [`AtomStore`](super::AtomStore).
//! The store keeps the field sized to the number of owned + ghost atoms and
//! moves its values along with the atoms during compaction, sorting,
//! migration and ghost communication, without knowing what they mean.
use std::{any::Any, fmt};

use crate::{utils::KeyedVec, Error};

/// Callbacks the store uses to maintain a registered field
pub trait PerAtomField: Any + Send + Sync {
    /// Number of `f64` values per atom on the wire
    fn width(&self) -> usize;
    fn len(&self) -> usize;
    /// Grow (zero-filled) or shrink to `n` atoms
    fn resize(&mut self, n: usize);
    fn copy(&mut self, from: usize, to: usize);
    /// Append `width()` values describing atom `i`
    fn pack(&self, i: usize, buf: &mut Vec<f64>);
    /// Overwrite atom `i` from `width()` values
    fn unpack(&mut self, i: usize, buf: &[f64]);
    /// Add `width()` values into atom `i` (reverse communication)
    fn accumulate(&mut self, i: usize, buf: &[f64]) {
        let mut current = Vec::with_capacity(self.width());
        self.pack(i, &mut current);
        for (c, b) in current.iter_mut().zip(buf) {
            *c += b;
        }
        self.unpack(i, &current);
    }
    /// Replicate onto ghost atoms
    fn comm_ghost(&self) -> bool {
        false
    }
    /// Ghost contributions are summed back into the owning atom
    fn reverse_accumulate(&self) -> bool {
        false
    }
    /// Clear accumulated values before a new force evaluation
    fn reset_accumulated(&mut self) {}
    /// Reorder the first `order.len()` atoms so that new atom `k` is old atom `order[k]`
    fn permute(&mut self, order: &[usize]) {
        let w = self.width();
        if w == 0 {
            return;
        }
        let mut buf = Vec::with_capacity(order.len() * w);
        for &i in order {
            self.pack(i, &mut buf);
        }
        for (k, chunk) in buf.chunks(w).enumerate() {
            self.unpack(k, chunk);
        }
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Fixed-width block of floats per atom
#[derive(Clone, Debug, PartialEq)]
pub struct FloatField {
    width: usize,
    ghost: bool,
    accumulate: bool,
    data: Vec<f64>,
}
impl FloatField {
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "Field width should be positive");
        Self {
            width,
            ghost: false,
            accumulate: false,
            data: Vec::new(),
        }
    }
    /// Also send values to ghost atoms
    pub fn with_ghosts(mut self) -> Self {
        self.ghost = true;
        self
    }
    /// Sum ghost values back into their owners during reverse communication
    pub fn with_reverse(mut self) -> Self {
        self.accumulate = true;
        self
    }
    pub fn get(&self, i: usize) -> &[f64] {
        &self.data[i * self.width..(i + 1) * self.width]
    }
    pub fn get_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.width..(i + 1) * self.width]
    }
    pub fn set(&mut self, i: usize, values: &[f64]) {
        self.get_mut(i).copy_from_slice(values);
    }
}
impl PerAtomField for FloatField {
    fn width(&self) -> usize {
        self.width
    }
    fn len(&self) -> usize {
        self.data.len() / self.width
    }
    fn resize(&mut self, n: usize) {
        self.data.resize(n * self.width, 0.0);
    }
    fn copy(&mut self, from: usize, to: usize) {
        let w = self.width;
        self.data.copy_within(from * w..(from + 1) * w, to * w);
    }
    fn pack(&self, i: usize, buf: &mut Vec<f64>) {
        buf.extend_from_slice(self.get(i));
    }
    fn unpack(&mut self, i: usize, buf: &[f64]) {
        self.set(i, &buf[..self.width]);
    }
    fn accumulate(&mut self, i: usize, buf: &[f64]) {
        for (v, b) in self.get_mut(i).iter_mut().zip(buf) {
            *v += b;
        }
    }
    fn comm_ghost(&self) -> bool {
        self.ghost
    }
    fn reverse_accumulate(&self) -> bool {
        self.accumulate
    }
    fn reset_accumulated(&mut self) {
        if self.accumulate {
            self.data.iter_mut().for_each(|v| *v = 0.0);
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handle returned when a field is registered; stays valid until the field is removed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldId(usize);

struct Entry {
    id: FieldId,
    field: Box<dyn PerAtomField>,
}

/// The registered fields of one store, in registration order
#[derive(Default)]
pub struct FieldSet {
    entries: KeyedVec<String, Entry>,
    next_id: usize,
}
impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
impl FieldSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn names(&self) -> &[String] {
        self.entries.keys()
    }
    pub fn id_of(&self, name: &str) -> Option<FieldId> {
        self.entries.get(&name.to_string()).map(|e| e.id)
    }
    pub fn get(&self, name: &str) -> Option<&dyn PerAtomField> {
        self.entries.get(&name.to_string()).map(|e| e.field.as_ref())
    }
    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn PerAtomField> {
        self.entries
            .get_mut(&name.to_string())
            .map(|e| e.field.as_mut())
    }
    pub fn by_id(&self, id: FieldId) -> Option<&dyn PerAtomField> {
        self.entries
            .values()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.field.as_ref())
    }
    pub fn by_id_mut(&mut self, id: FieldId) -> Option<&mut dyn PerAtomField> {
        self.entries
            .values_mut()
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| e.field.as_mut())
    }
    /// Downcast a field to its concrete type
    pub fn get_as<T: PerAtomField>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref::<T>()
    }
    pub fn get_as_mut<T: PerAtomField>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name)?.as_any_mut().downcast_mut::<T>()
    }

    pub(crate) fn insert(
        &mut self,
        name: &str,
        field: Box<dyn PerAtomField>,
    ) -> Result<FieldId, Error> {
        let id = FieldId(self.next_id);
        if self
            .entries
            .add(name.to_string(), Entry { id, field })
            .is_none()
        {
            return Err(Error::config(format!(
                "Per-atom field '{}' is already registered",
                name
            )));
        }
        self.next_id += 1;
        Ok(id)
    }
    pub(crate) fn remove(&mut self, name: &str) -> Option<Box<dyn PerAtomField>> {
        self.entries.remove(&name.to_string()).map(|e| e.field)
    }
    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn PerAtomField> {
        self.entries.values().iter().map(|e| e.field.as_ref())
    }
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn PerAtomField>> {
        self.entries.values_mut().iter_mut().map(|e| &mut e.field)
    }

    /// Floats per atom when moving whole atoms
    pub(crate) fn exchange_width(&self) -> usize {
        self.iter().map(|f| f.width()).sum()
    }
    pub(crate) fn ghost_width(&self) -> usize {
        self.iter()
            .filter(|f| f.comm_ghost())
            .map(|f| f.width())
            .sum()
    }
    pub(crate) fn reverse_width(&self) -> usize {
        self.iter()
            .filter(|f| f.reverse_accumulate())
            .map(|f| f.width())
            .sum()
    }
    pub(crate) fn resize(&mut self, n: usize) {
        self.iter_mut().for_each(|f| f.resize(n));
    }
    pub(crate) fn copy(&mut self, from: usize, to: usize) {
        self.iter_mut().for_each(|f| f.copy(from, to));
    }
    pub(crate) fn permute(&mut self, order: &[usize]) {
        self.iter_mut().for_each(|f| f.permute(order));
    }
    pub(crate) fn reset_accumulated(&mut self) {
        self.iter_mut().for_each(|f| f.reset_accumulated());
    }
}
