use std::f64::consts::PI;

use rayon::prelude::*;
use tracing::{debug, info_span};

use super::{
    Bins, ListPolicy, NeighborSettings, SpecialBonds, SpecialTreatment, Stencil, UpdateSettings,
};
use crate::{
    atoms::{AtomStore, SpecialLevel},
    region::Rect,
    utils::distance_squared,
    Error,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// Local index of the partner, owned or ghost
    pub index: usize,
    /// Set for bonded partners whose interactions are scaled
    pub special: Option<SpecialLevel>,
}

/// Partners of every owned atom, stored compressed: the neighbors of atom
/// `i` are `entries[offsets[i]..offsets[i + 1]]`
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborList {
    offsets: Vec<usize>,
    entries: Vec<Neighbor>,
    policy: ListPolicy,
    cutoff: f64,
}
impl NeighborList {
    pub fn empty(policy: ListPolicy, cutoff: f64) -> Self {
        Self {
            offsets: vec![0],
            entries: Vec::new(),
            policy,
            cutoff,
        }
    }
    pub fn neighbors(&self, i: usize) -> &[Neighbor] {
        &self.entries[self.offsets[i]..self.offsets[i + 1]]
    }
    /// Number of owned atoms the list was built for
    pub fn num_atoms(&self) -> usize {
        self.offsets.len() - 1
    }
    /// Total number of listed pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn policy(&self) -> ListPolicy {
        self.policy
    }
    /// Interaction cutoff plus skin
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
    pub fn max_neighbors(&self) -> usize {
        self.offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }
}

/// `a` comes after `b` ordering by z, then y, then x
fn lexicographically_after(a: &[f64; 3], b: &[f64; 3]) -> bool {
    if a[2] != b[2] {
        return a[2] > b[2];
    }
    if a[1] != b[1] {
        return a[1] > b[1];
    }
    a[0] > b[0]
}

/// Decides when to rebuild and builds neighbor lists from owned + ghost atoms
#[derive(Clone, Debug)]
pub struct NeighborBuilder {
    settings: NeighborSettings,
    update: UpdateSettings,
    cutoff: f64,
    stencil: Option<Stencil>,
    last_positions: Vec<[f64; 3]>,
    requested: bool,
    num_builds: usize,
}
impl NeighborBuilder {
    pub fn new(settings: NeighborSettings) -> Result<Self, Error> {
        settings.validate()?;
        Ok(Self {
            update: UpdateSettings::new(&settings),
            settings,
            cutoff: 0.0,
            stencil: None,
            last_positions: Vec::new(),
            requested: true,
            num_builds: 0,
        })
    }
    pub fn settings(&self) -> &NeighborSettings {
        &self.settings
    }
    pub fn special(&self) -> &SpecialBonds {
        &self.settings.special
    }
    pub fn skin(&self) -> f64 {
        self.settings.skin
    }
    /// Largest interaction cutoff of any consumer
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
    pub fn set_cutoff(&mut self, cutoff: f64) -> Result<(), Error> {
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(Error::config(format!(
                "Neighbor cutoff should be positive, got {}",
                cutoff
            )));
        }
        self.cutoff = cutoff;
        self.requested = true;
        Ok(())
    }
    /// Distance within which pairs are listed
    pub fn list_cutoff(&self) -> f64 {
        self.cutoff + self.settings.skin
    }
    pub fn num_builds(&self) -> usize {
        self.num_builds
    }
    pub fn request_rebuild(&mut self) {
        self.requested = true;
    }

    /// Largest squared distance an owned atom moved since the last build
    pub fn max_displacement_sq(&self, atoms: &AtomStore) -> f64 {
        atoms.positions()[..atoms.nlocal()]
            .iter()
            .zip(self.last_positions.iter())
            .map(|(x, x0)| distance_squared(x, x0))
            .fold(0.0, f64::max)
    }

    /// This rank's vote on rebuilding at `step`; callers reduce it across ranks
    pub fn wants_rebuild(&self, step: usize, atoms: &AtomStore) -> bool {
        if self.requested || self.num_builds == 0 {
            return true;
        }
        if atoms.nlocal() != self.last_positions.len() {
            return true;
        }
        if !self.update.should_update_neighbors(step) {
            return false;
        }
        if !self.update.check {
            return true;
        }
        let half_skin = 0.5 * self.settings.skin;
        self.max_displacement_sq(atoms) > half_skin * half_skin
    }

    /// Refuse to build when the expected list size is unreasonable
    pub fn check_density(&self, nlocal: usize, volume: f64) -> Result<(), Error> {
        if nlocal == 0 || volume <= 0.0 {
            return Ok(());
        }
        let cutoff = self.list_cutoff();
        let density = nlocal as f64 / volume;
        let estimate = density * 4.0 / 3.0 * PI * cutoff.powi(3);
        if estimate > self.settings.max_neighbors_per_atom as f64 {
            return Err(Error::NeighborOverflow {
                cutoff,
                density,
                estimate,
                limit: self.settings.max_neighbors_per_atom,
            });
        }
        Ok(())
    }

    /// Build the list for the owned atoms. `region` should contain the owned
    /// atoms and their halo; `volume` is the owned region's volume.
    pub fn build(
        &mut self,
        step: usize,
        atoms: &AtomStore,
        region: &Rect,
        volume: f64,
    ) -> Result<NeighborList, Error> {
        let _span = info_span!("neighbor_build", step, nall = atoms.nall()).entered();
        let cutn = self.list_cutoff();
        if self.cutoff <= 0.0 {
            return Err(Error::config("Neighbor cutoff was never set"));
        }
        self.check_density(atoms.nlocal(), volume)?;

        let bins = Bins::new(region, cutn, atoms.positions());
        let stencil = match self.stencil.take() {
            Some(s) if s.matches(bins.bin_size(), cutn) => s,
            _ => {
                debug!(bin_size = ?bins.bin_size(), "Building stencil");
                Stencil::new(bins.bin_size(), cutn)
            }
        };

        let nlocal = atoms.nlocal();
        let positions = atoms.positions();
        let tags = atoms.tags();
        let policy = self.settings.policy;
        let special = self.settings.special;
        let cutn_sq = cutn * cutn;

        let per_atom: Vec<Vec<Neighbor>> = (0..nlocal)
            .into_par_iter()
            .map(|i| {
                let xi = &positions[i];
                let home = bins.coord_to_bin_3d(xi);
                let mut found = Vec::new();
                for offset in stencil.offsets() {
                    let Some(bin) = bins.offset_bin(&home, offset) else {
                        continue;
                    };
                    for &j in bins.atoms_in(bin) {
                        if j == i || tags[j] == tags[i] {
                            continue;
                        }
                        if policy == ListPolicy::Half {
                            let keep = if j < nlocal {
                                j > i
                            } else {
                                lexicographically_after(&positions[j], xi)
                            };
                            if !keep {
                                continue;
                            }
                        }
                        if distance_squared(xi, &positions[j]) >= cutn_sq {
                            continue;
                        }
                        let level = atoms
                            .specials(i)
                            .iter()
                            .find(|s| s.tag == tags[j])
                            .map(|s| s.level);
                        let marker = match level.map(|l| special.treatment(l)) {
                            None | Some(SpecialTreatment::Include) => None,
                            Some(SpecialTreatment::Exclude) => continue,
                            Some(SpecialTreatment::Scaled(l)) => Some(l),
                        };
                        found.push(Neighbor {
                            index: j,
                            special: marker,
                        });
                    }
                }
                found.sort_unstable_by_key(|n| n.index);
                found
            })
            .collect();

        let mut offsets = Vec::with_capacity(nlocal + 1);
        offsets.push(0);
        let mut entries = Vec::with_capacity(per_atom.iter().map(|v| v.len()).sum());
        for list in per_atom {
            entries.extend(list);
            offsets.push(entries.len());
        }
        let list = NeighborList {
            offsets,
            entries,
            policy,
            cutoff: cutn,
        };

        let max = list.max_neighbors();
        if max > self.settings.max_neighbors_per_atom {
            return Err(Error::NeighborOverflow {
                cutoff: cutn,
                density: nlocal as f64 / volume,
                estimate: max as f64,
                limit: self.settings.max_neighbors_per_atom,
            });
        }

        self.stencil = Some(stencil);
        self.last_positions = positions[..nlocal].to_vec();
        self.update.mark_updated(step);
        self.requested = false;
        self.num_builds += 1;
        debug!(pairs = list.len(), max, "Neighbor list built");
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::Atom;

    fn builder(policy: ListPolicy, special: SpecialBonds) -> NeighborBuilder {
        let mut b = NeighborBuilder::new(NeighborSettings {
            policy,
            special,
            ..Default::default()
        })
        .unwrap();
        b.set_cutoff(1.0).unwrap();
        b
    }

    fn chain() -> AtomStore {
        let mut atoms = AtomStore::new(1);
        atoms
            .insert(Atom::new(1, 1, [0.0, 0.0, 0.0]).with_special(2, SpecialLevel::Bond12))
            .unwrap();
        atoms
            .insert(
                Atom::new(2, 1, [1.0, 0.0, 0.0])
                    .with_special(1, SpecialLevel::Bond12)
                    .with_special(3, SpecialLevel::Bond12),
            )
            .unwrap();
        atoms
            .insert(Atom::new(3, 1, [2.0, 0.0, 0.0]).with_special(2, SpecialLevel::Bond12))
            .unwrap();
        atoms
    }

    fn region() -> Rect {
        Rect::new(-1.0, 3.0, -1.0, 1.0, -1.0, 1.0)
    }

    #[test]
    fn half_list_counts_each_pair_once() {
        let atoms = chain();
        let mut b = builder(ListPolicy::Half, SpecialBonds::new([1.0; 3], [1.0; 3]));
        let list = b.build(0, &atoms, &region(), 8.0).unwrap();
        assert_eq!(list.num_atoms(), 3);
        assert_eq!(list.len(), 2);
        assert_eq!(list.neighbors(0), &[Neighbor { index: 1, special: None }]);
        assert!(list.neighbors(2).is_empty());
    }

    #[test]
    fn full_list_with_exclusions() {
        let atoms = chain();
        let mut b = builder(ListPolicy::Full, SpecialBonds::default());
        let list = b.build(0, &atoms, &region(), 8.0).unwrap();
        assert!(list.is_empty());

        let mut b = builder(ListPolicy::Full, SpecialBonds::new([0.5; 3], [0.0; 3]));
        let list = b.build(0, &atoms, &region(), 8.0).unwrap();
        assert_eq!(list.neighbors(1).len(), 2);
        assert!(list
            .neighbors(1)
            .iter()
            .all(|n| n.special == Some(SpecialLevel::Bond12)));
    }

    #[test]
    fn rebuild_decision_follows_displacement() {
        let mut atoms = chain();
        let mut b = builder(ListPolicy::Half, SpecialBonds::default());
        assert!(b.wants_rebuild(0, &atoms));
        b.build(0, &atoms, &region(), 8.0).unwrap();
        assert!(!b.wants_rebuild(1, &atoms));
        // Less than half the skin is not enough
        atoms.positions_mut()[0][0] += 0.125;
        assert!(!b.wants_rebuild(1, &atoms));
        atoms.positions_mut()[0][0] += 0.05;
        assert!(b.wants_rebuild(1, &atoms));
        b.request_rebuild();
        assert!(b.wants_rebuild(1, &atoms));
    }

    #[test]
    fn overflow_is_reported_with_context() {
        let atoms = chain();
        let mut b = NeighborBuilder::new(NeighborSettings {
            max_neighbors_per_atom: 1,
            ..Default::default()
        })
        .unwrap();
        b.set_cutoff(1.0).unwrap();
        let err = b.build(0, &atoms, &region(), 0.1).unwrap_err();
        assert!(matches!(err, Error::NeighborOverflow { limit: 1, .. }));
    }
}
