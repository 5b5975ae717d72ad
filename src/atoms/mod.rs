//! Per-rank atom storage.
//!
//! Owned atoms occupy local indices `0..nlocal`; ghost atoms follow at
//! `nlocal..nall`. Every core array and every registered field holds `nall`
//! entries. Local indices are only stable between migrations and ghost
//! exchanges; tags are the stable identity.
mod buffer;
mod fields;
mod view;

pub use buffer::{AtomBuffer, ForwardBuffer, GhostBuffer, ReverseBuffer};
pub use fields::{FieldId, FieldSet, FloatField, PerAtomField};
pub use view::{AtomsRef, ForceAccumulator};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    utils::{self, add_assign},
    Error,
};

/// Topological distance of a special-bond partner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialLevel {
    /// Directly bonded
    Bond12,
    /// Separated by two bonds
    Bond13,
    /// Separated by three bonds
    Bond14,
}
impl SpecialLevel {
    pub const ALL: [SpecialLevel; 3] = [Self::Bond12, Self::Bond13, Self::Bond14];

    pub fn index(&self) -> usize {
        match self {
            Self::Bond12 => 0,
            Self::Bond13 => 1,
            Self::Bond14 => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Special {
    pub tag: u64,
    pub level: SpecialLevel,
}

/// Everything needed to create one owned atom
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub tag: u64,
    pub atom_type: usize,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub image: [i32; 3],
    pub molecule: Option<u64>,
    pub specials: Vec<Special>,
}
impl Atom {
    pub fn new(tag: u64, atom_type: usize, position: [f64; 3]) -> Self {
        Self {
            tag,
            atom_type,
            position,
            velocity: [0.0; 3],
            image: [0; 3],
            molecule: None,
            specials: Vec::new(),
        }
    }
    pub fn with_velocity(mut self, velocity: [f64; 3]) -> Self {
        self.velocity = velocity;
        self
    }
    pub fn with_image(mut self, image: [i32; 3]) -> Self {
        self.image = image;
        self
    }
    pub fn with_molecule(mut self, molecule: u64) -> Self {
        self.molecule = Some(molecule);
        self
    }
    pub fn with_special(mut self, tag: u64, level: SpecialLevel) -> Self {
        self.specials.push(Special { tag, level });
        self
    }
}

/// Atom properties of one rank: owned atoms followed by ghosts
#[derive(Debug)]
pub struct AtomStore {
    tags: Vec<u64>,
    types: Vec<usize>,
    positions: Vec<[f64; 3]>,
    velocities: Vec<[f64; 3]>,
    forces: Vec<[f64; 3]>,
    images: Vec<[i32; 3]>,
    molecules: Vec<Option<u64>>,
    /// Owned atoms only
    specials: Vec<Vec<Special>>,
    nlocal: usize,
    /// Indexed by `type - 1`
    masses: Vec<f64>,
    fields: FieldSet,
    tag_map: HashMap<u64, usize>,
}
impl AtomStore {
    /// Create an empty store for `num_types` atom types of unit mass
    pub fn new(num_types: usize) -> Self {
        assert!(num_types > 0, "At least one atom type is required");
        Self {
            tags: Vec::new(),
            types: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
            forces: Vec::new(),
            images: Vec::new(),
            molecules: Vec::new(),
            specials: Vec::new(),
            nlocal: 0,
            masses: vec![1.0; num_types],
            fields: FieldSet::default(),
            tag_map: HashMap::new(),
        }
    }

    // Sizes and types

    pub fn nlocal(&self) -> usize {
        self.nlocal
    }
    pub fn nghost(&self) -> usize {
        self.tags.len() - self.nlocal
    }
    pub fn nall(&self) -> usize {
        self.tags.len()
    }
    pub fn num_types(&self) -> usize {
        self.masses.len()
    }
    pub fn set_mass(&mut self, atom_type: usize, mass: f64) -> Result<(), Error> {
        self.check_type(atom_type)?;
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(Error::config(format!(
                "Mass of type {} should be positive, got {}",
                atom_type, mass
            )));
        }
        self.masses[atom_type - 1] = mass;
        Ok(())
    }
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }
    pub fn mass_of_type(&self, atom_type: usize) -> f64 {
        self.masses[atom_type - 1]
    }
    pub fn mass(&self, i: usize) -> f64 {
        self.masses[self.types[i] - 1]
    }
    fn check_type(&self, atom_type: usize) -> Result<(), Error> {
        if atom_type == 0 || atom_type > self.num_types() {
            return Err(Error::InvalidType {
                atom_type,
                num_types: self.num_types(),
            });
        }
        Ok(())
    }

    // Array access

    pub fn tags(&self) -> &[u64] {
        &self.tags
    }
    pub fn types(&self) -> &[usize] {
        &self.types
    }
    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }
    pub fn positions_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.positions
    }
    pub fn velocities(&self) -> &[[f64; 3]] {
        &self.velocities
    }
    pub fn velocities_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.velocities
    }
    pub fn forces(&self) -> &[[f64; 3]] {
        &self.forces
    }
    pub fn forces_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.forces
    }
    pub fn images(&self) -> &[[i32; 3]] {
        &self.images
    }
    pub fn images_mut(&mut self) -> &mut [[i32; 3]] {
        &mut self.images
    }
    pub fn molecules(&self) -> &[Option<u64>] {
        &self.molecules
    }
    pub fn specials(&self, i: usize) -> &[Special] {
        &self.specials[i]
    }
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
    pub fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }
    /// Highest owned tag on this rank
    pub fn max_tag(&self) -> Option<u64> {
        self.tags[..self.nlocal].iter().copied().max()
    }

    /// Local index of a tag. An owned atom wins over ghost images of itself;
    /// among ghosts the first received image is returned.
    pub fn tag_to_local(&self, tag: u64) -> Option<usize> {
        self.tag_map.get(&tag).copied()
    }

    pub fn rebuild_tag_map(&mut self) {
        self.tag_map.clear();
        self.tag_map.reserve(self.tags.len());
        for (i, &tag) in self.tags.iter().enumerate() {
            self.tag_map.entry(tag).or_insert(i);
        }
    }

    // Owned atoms

    /// Append an owned atom, discarding any ghosts first
    pub fn insert(&mut self, atom: Atom) -> Result<usize, Error> {
        self.check_type(atom.atom_type)?;
        self.clear_ghosts();
        if self.tag_map.contains_key(&atom.tag) {
            return Err(Error::DuplicateTag(atom.tag));
        }
        let i = self.push_owned(
            atom.tag,
            atom.atom_type,
            atom.position,
            atom.velocity,
            atom.image,
            atom.molecule,
            atom.specials,
        );
        self.fields.resize(self.nall());
        Ok(i)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_owned(
        &mut self,
        tag: u64,
        atom_type: usize,
        position: [f64; 3],
        velocity: [f64; 3],
        image: [i32; 3],
        molecule: Option<u64>,
        specials: Vec<Special>,
    ) -> usize {
        debug_assert_eq!(self.nghost(), 0);
        self.tags.push(tag);
        self.types.push(atom_type);
        self.positions.push(position);
        self.velocities.push(velocity);
        self.forces.push([0.0; 3]);
        self.images.push(image);
        self.molecules.push(molecule);
        self.specials.push(specials);
        self.tag_map.insert(tag, self.nlocal);
        self.nlocal += 1;
        self.nlocal - 1
    }

    /// Remove owned atom `i` by moving the last owned atom into its slot.
    /// Ghosts are discarded.
    pub fn remove(&mut self, i: usize) {
        assert!(
            i < self.nlocal,
            "Cannot remove atom {} with only {} owned atoms",
            i,
            self.nlocal
        );
        self.clear_ghosts();
        let last = self.nlocal - 1;
        let tag = self.tags[i];
        self.tags.swap_remove(i);
        self.types.swap_remove(i);
        self.positions.swap_remove(i);
        self.velocities.swap_remove(i);
        self.forces.swap_remove(i);
        self.images.swap_remove(i);
        self.molecules.swap_remove(i);
        self.specials.swap_remove(i);
        if i != last {
            self.fields.copy(last, i);
        }
        self.nlocal -= 1;
        self.fields.resize(self.nlocal);

        self.tag_map.remove(&tag);
        if i != last {
            self.tag_map.insert(self.tags[i], i);
        }
    }

    /// Drop every ghost atom
    pub fn clear_ghosts(&mut self) {
        if self.nghost() == 0 {
            return;
        }
        let n = self.nlocal;
        self.tags.truncate(n);
        self.types.truncate(n);
        self.positions.truncate(n);
        self.velocities.truncate(n);
        self.forces.truncate(n);
        self.images.truncate(n);
        self.molecules.truncate(n);
        self.fields.resize(n);
        self.rebuild_tag_map();
    }

    pub fn zero_forces(&mut self) {
        self.forces.iter_mut().for_each(|f| *f = [0.0; 3]);
        self.fields.reset_accumulated();
    }

    /// Reorder the owned atoms by `keys` (one key per owned atom, e.g. a bin
    /// index) using a stable counting sort. Ghosts are discarded.
    pub fn sort_owned_by(&mut self, keys: &[usize]) {
        self.clear_ghosts();
        assert_eq!(keys.len(), self.nlocal, "One sort key per owned atom");
        let order = utils::counting_sort_order(keys);
        utils::apply_order(&order, &mut self.tags);
        utils::apply_order(&order, &mut self.types);
        utils::apply_order(&order, &mut self.positions);
        utils::apply_order(&order, &mut self.velocities);
        utils::apply_order(&order, &mut self.forces);
        utils::apply_order(&order, &mut self.images);
        utils::apply_order(&order, &mut self.molecules);
        utils::apply_order(&order, &mut self.specials);
        self.fields.permute(&order);
        self.rebuild_tag_map();
    }

    // Per-atom fields

    /// Register a field; it is sized to `nall` immediately
    pub fn register_field(
        &mut self,
        name: &str,
        mut field: Box<dyn PerAtomField>,
    ) -> Result<FieldId, Error> {
        field.resize(self.nall());
        self.fields.insert(name, field)
    }
    pub fn unregister_field(&mut self, name: &str) -> Option<Box<dyn PerAtomField>> {
        self.fields.remove(name)
    }
    pub fn field<T: PerAtomField>(&self, name: &str) -> Option<&T> {
        self.fields.get_as::<T>(name)
    }
    pub fn field_mut<T: PerAtomField>(&mut self, name: &str) -> Option<&mut T> {
        self.fields.get_as_mut::<T>(name)
    }

    /// Read-only view of the atoms alongside add-only access to forces and
    /// mutable access to the registered fields
    pub fn split_forces(&mut self) -> (AtomsRef<'_>, ForceAccumulator<'_>, &mut FieldSet) {
        let atoms = AtomsRef {
            tags: &self.tags,
            types: &self.types,
            positions: &self.positions,
            velocities: &self.velocities,
            images: &self.images,
            molecules: &self.molecules,
            specials: &self.specials,
            nlocal: self.nlocal,
            masses: &self.masses,
        };
        (atoms, ForceAccumulator::new(&mut self.forces), &mut self.fields)
    }

    // Migration

    /// Append owned atom `i` to a migration buffer
    pub fn pack_exchange(&self, i: usize, buf: &mut AtomBuffer) {
        buf.extra_width = self.fields.exchange_width();
        buf.tags.push(self.tags[i]);
        buf.types.push(self.types[i]);
        buf.positions.push(self.positions[i]);
        buf.velocities.push(self.velocities[i]);
        buf.images.push(self.images[i]);
        buf.molecules.push(self.molecules[i]);
        buf.specials.push(self.specials[i].clone());
        for field in self.fields.iter() {
            field.pack(i, &mut buf.extra);
        }
    }

    /// Append received atoms as owned atoms. Requires that no ghosts exist.
    pub fn unpack_exchange(&mut self, buf: AtomBuffer) -> Result<(), Error> {
        if self.nghost() != 0 {
            return Err(Error::protocol("Cannot receive migrating atoms while ghosts exist"));
        }
        let n = buf.len();
        let width = self.fields.exchange_width();
        if buf.extra.len() != n * width || (n > 0 && buf.extra_width != width) {
            return Err(Error::protocol(format!(
                "Migration buffer carries {} field values for {} atoms, expected width {}",
                buf.extra.len(),
                n,
                width
            )));
        }
        for &tag in &buf.tags {
            if self.tag_map.contains_key(&tag) {
                return Err(Error::DuplicateTag(tag));
            }
        }
        let first = self.nlocal;
        let AtomBuffer {
            tags,
            types,
            positions,
            velocities,
            images,
            molecules,
            specials,
            extra,
            ..
        } = buf;
        for (k, special) in specials.into_iter().enumerate() {
            self.push_owned(
                tags[k],
                types[k],
                positions[k],
                velocities[k],
                images[k],
                molecules[k],
                special,
            );
        }
        self.fields.resize(self.nall());
        self.unpack_fields(first, n, width, &extra, |_| true);
        Ok(())
    }

    fn unpack_fields(
        &mut self,
        first: usize,
        n: usize,
        width: usize,
        extra: &[f64],
        select: impl Fn(&dyn PerAtomField) -> bool,
    ) {
        if width == 0 {
            return;
        }
        for k in 0..n {
            let mut offset = k * width;
            for field in self.fields.iter_mut() {
                if !select(&**field) {
                    continue;
                }
                let w = field.width();
                field.unpack(first + k, &extra[offset..offset + w]);
                offset += w;
            }
        }
    }

    // Ghosts

    /// Pack the atoms in `list` as ghosts for a neighbor, with `shift` added
    /// to their positions
    pub fn pack_border(&self, list: &[usize], shift: [f64; 3]) -> GhostBuffer {
        let mut buf = GhostBuffer {
            extra_width: self.fields.ghost_width(),
            ..Default::default()
        };
        for &i in list {
            let mut x = self.positions[i];
            add_assign(&mut x, &shift);
            buf.tags.push(self.tags[i]);
            buf.types.push(self.types[i]);
            buf.positions.push(x);
            buf.velocities.push(self.velocities[i]);
            buf.molecules.push(self.molecules[i]);
            for field in self.fields.iter().filter(|f| f.comm_ghost()) {
                field.pack(i, &mut buf.extra);
            }
        }
        buf
    }

    /// Append received ghosts, returning the index of the first one
    pub fn unpack_border(&mut self, buf: GhostBuffer) -> Result<usize, Error> {
        let n = buf.len();
        let width = self.fields.ghost_width();
        if buf.extra.len() != n * width {
            return Err(Error::protocol(format!(
                "Ghost buffer carries {} field values for {} atoms, expected width {}",
                buf.extra.len(),
                n,
                width
            )));
        }
        let first = self.nall();
        for (k, &tag) in buf.tags.iter().enumerate() {
            self.tag_map.entry(tag).or_insert(first + k);
        }
        self.tags.extend(buf.tags);
        self.types.extend(buf.types);
        self.positions.extend(buf.positions);
        self.velocities.extend(buf.velocities);
        self.molecules.extend(buf.molecules);
        self.forces.resize(self.tags.len(), [0.0; 3]);
        self.images.resize(self.tags.len(), [0; 3]);
        self.fields.resize(self.nall());
        self.unpack_fields(first, n, width, &buf.extra, |f| f.comm_ghost());
        Ok(first)
    }

    pub fn pack_forward(&self, list: &[usize], shift: [f64; 3]) -> ForwardBuffer {
        let mut buf = ForwardBuffer {
            extra_width: self.fields.ghost_width(),
            ..Default::default()
        };
        for &i in list {
            let mut x = self.positions[i];
            add_assign(&mut x, &shift);
            buf.positions.push(x);
            buf.velocities.push(self.velocities[i]);
            for field in self.fields.iter().filter(|f| f.comm_ghost()) {
                field.pack(i, &mut buf.extra);
            }
        }
        buf
    }

    /// Overwrite the ghosts `first..first + buf.len()` with refreshed state
    pub fn unpack_forward(&mut self, first: usize, expected: usize, buf: ForwardBuffer) -> Result<(), Error> {
        let n = buf.len();
        let width = self.fields.ghost_width();
        if n != expected || first + n > self.nall() || buf.extra.len() != n * width {
            return Err(Error::protocol(format!(
                "Forward buffer of {} atoms does not match the {} ghosts at {}",
                n, expected, first
            )));
        }
        self.positions[first..first + n].copy_from_slice(&buf.positions);
        self.velocities[first..first + n].copy_from_slice(&buf.velocities);
        self.unpack_fields(first, n, width, &buf.extra, |f| f.comm_ghost());
        Ok(())
    }

    /// Pack the forces and accumulated fields of ghosts `first..first + n`
    pub fn pack_reverse(&self, first: usize, n: usize) -> ReverseBuffer {
        let mut buf = ReverseBuffer {
            forces: self.forces[first..first + n].to_vec(),
            extra: Vec::new(),
            extra_width: self.fields.reverse_width(),
        };
        if buf.extra_width > 0 {
            for i in first..first + n {
                for field in self.fields.iter().filter(|f| f.reverse_accumulate()) {
                    field.pack(i, &mut buf.extra);
                }
            }
        }
        buf
    }

    /// Add returned ghost contributions into the atoms of `list`
    pub fn unpack_reverse(&mut self, list: &[usize], buf: ReverseBuffer) -> Result<(), Error> {
        let width = self.fields.reverse_width();
        if buf.len() != list.len() || buf.extra.len() != list.len() * width {
            return Err(Error::protocol(format!(
                "Reverse buffer of {} atoms does not match a send list of {}",
                buf.len(),
                list.len()
            )));
        }
        for (k, &i) in list.iter().enumerate() {
            add_assign(&mut self.forces[i], &buf.forces[k]);
        }
        if width > 0 {
            for (k, &i) in list.iter().enumerate() {
                let mut offset = k * width;
                for field in self.fields.iter_mut().filter(|f| f.reverse_accumulate()) {
                    let w = field.width();
                    field.accumulate(i, &buf.extra[offset..offset + w]);
                    offset += w;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: u64) -> AtomStore {
        let mut atoms = AtomStore::new(2);
        for tag in 1..=n {
            atoms
                .insert(Atom::new(tag, 1, [tag as f64, 0.0, 0.0]))
                .unwrap();
        }
        atoms
    }

    #[test]
    fn insert_rejects_duplicates_and_bad_types() {
        let mut atoms = store_with(3);
        assert!(matches!(
            atoms.insert(Atom::new(2, 1, [0.0; 3])),
            Err(Error::DuplicateTag(2))
        ));
        assert!(matches!(
            atoms.insert(Atom::new(9, 3, [0.0; 3])),
            Err(Error::InvalidType { atom_type: 3, .. })
        ));
        assert!(matches!(
            atoms.insert(Atom::new(9, 0, [0.0; 3])),
            Err(Error::InvalidType { .. })
        ));
        assert_eq!(atoms.nlocal(), 3);
    }

    #[test]
    fn remove_moves_last_atom_and_its_fields() {
        let mut atoms = store_with(4);
        atoms
            .register_field("q", Box::new(FloatField::new(1)))
            .unwrap();
        for i in 0..4 {
            let tag = atoms.tags()[i] as f64;
            atoms.field_mut::<FloatField>("q").unwrap().set(i, &[tag * 10.0]);
        }
        atoms.remove(1);
        assert_eq!(atoms.nlocal(), 3);
        assert_eq!(atoms.tags(), &[1, 4, 3]);
        assert_eq!(atoms.tag_to_local(4), Some(1));
        assert_eq!(atoms.tag_to_local(2), None);
        assert_eq!(atoms.field::<FloatField>("q").unwrap().get(1), &[40.0]);
        assert_eq!(atoms.field::<FloatField>("q").unwrap().len(), 3);
    }

    #[test]
    fn owned_atoms_take_priority_in_tag_map() {
        let mut atoms = store_with(2);
        let ghosts = atoms.pack_border(&[0, 1], [10.0, 0.0, 0.0]);
        let first = atoms.unpack_border(ghosts).unwrap();
        assert_eq!(first, 2);
        assert_eq!(atoms.nall(), 4);
        assert_eq!(atoms.tag_to_local(1), Some(0));
        assert_eq!(atoms.positions()[2], [11.0, 0.0, 0.0]);

        atoms.clear_ghosts();
        assert_eq!(atoms.nall(), 2);
        assert_eq!(atoms.tag_to_local(2), Some(1));
    }

    #[test]
    fn exchange_carries_fields_and_specials() {
        let mut src = AtomStore::new(1);
        src.register_field("q", Box::new(FloatField::new(2))).unwrap();
        src.insert(
            Atom::new(7, 1, [1.0, 2.0, 3.0])
                .with_velocity([0.5, 0.0, 0.0])
                .with_molecule(3)
                .with_special(8, SpecialLevel::Bond12),
        )
        .unwrap();
        src.field_mut::<FloatField>("q").unwrap().set(0, &[1.5, -2.5]);
        let mut buf = AtomBuffer::default();
        src.pack_exchange(0, &mut buf);
        src.remove(0);

        let mut dst = AtomStore::new(1);
        dst.register_field("q", Box::new(FloatField::new(2))).unwrap();
        dst.insert(Atom::new(1, 1, [0.0; 3])).unwrap();
        dst.unpack_exchange(buf).unwrap();
        let i = dst.tag_to_local(7).unwrap();
        assert_eq!(i, 1);
        assert_eq!(dst.velocities()[i], [0.5, 0.0, 0.0]);
        assert_eq!(dst.molecules()[i], Some(3));
        assert_eq!(dst.specials(i)[0].tag, 8);
        assert_eq!(dst.field::<FloatField>("q").unwrap().get(i), &[1.5, -2.5]);
    }

    #[test]
    fn reverse_adds_into_send_list() {
        let mut atoms = store_with(2);
        atoms
            .register_field("e", Box::new(FloatField::new(1).with_reverse()))
            .unwrap();
        let ghosts = atoms.pack_border(&[1], [0.0; 3]);
        let first = atoms.unpack_border(ghosts).unwrap();
        atoms.forces_mut()[first] = [1.0, 2.0, 3.0];
        atoms.field_mut::<FloatField>("e").unwrap().set(first, &[0.5]);

        let buf = atoms.pack_reverse(first, 1);
        atoms.unpack_reverse(&[1], buf).unwrap();
        assert_eq!(atoms.forces()[1], [1.0, 2.0, 3.0]);
        assert_eq!(atoms.field::<FloatField>("e").unwrap().get(1), &[0.5]);
        assert!(atoms.unpack_reverse(&[0, 1], ReverseBuffer::default()).is_err());
    }

    #[test]
    fn sort_owned_reorders_everything() {
        let mut atoms = store_with(3);
        atoms.sort_owned_by(&[2, 0, 1]);
        assert_eq!(atoms.tags(), &[2, 3, 1]);
        assert_eq!(atoms.positions()[0], [2.0, 0.0, 0.0]);
        assert_eq!(atoms.tag_to_local(1), Some(2));
    }
}
