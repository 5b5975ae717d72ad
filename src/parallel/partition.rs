//! Atom migration and the ghost halo.
//!
//! Both work one dimension at a time, x then y then z, exchanging only with
//! the two face neighbors. Ghosts received while sweeping x are forwarded
//! while sweeping y and z, which fills in edge and corner regions without
//! diagonal messages.
use tracing::debug;

use super::{Communicator, Payload, ProcGrid, Tag};
use crate::{
    atoms::{AtomBuffer, AtomStore},
    config::CommSettings,
    domain::{check_tiling, Domain, SubDomain},
    output::Operation,
    utils::{Axis, Direction},
    Error,
};

/// One recorded ghost transfer
#[derive(Clone, Debug, PartialEq)]
pub struct Swap {
    pub direction: Direction,
    /// Rank that receives `send_list` (None at a fixed boundary)
    pub send_to: Option<usize>,
    /// Rank whose atoms arrive as `first_recv..first_recv + num_recv`
    pub recv_from: Option<usize>,
    pub send_list: Vec<usize>,
    /// Added to sent positions when the swap crosses a periodic boundary
    pub shift: [f64; 3],
    pub first_recv: usize,
    pub num_recv: usize,
}

/// This rank's part of the spatial decomposition
#[derive(Clone, Debug)]
pub struct CommPartition {
    grid: ProcGrid,
    subdomain: SubDomain,
    ghost_cutoff: f64,
    /// Swaps per side in each dimension
    need: [usize; 3],
    swaps: Vec<Swap>,
    check_atom_count: bool,
    natoms: Option<usize>,
}
impl CommPartition {
    pub fn new(comm: &Communicator, domain: &Domain, settings: &CommSettings) -> Result<Self, Error> {
        let grid = ProcGrid::new(comm.nranks(), comm.rank(), domain, settings.grid)?;
        check_tiling(&grid.subdomains(domain))?;
        let subdomain = grid.subdomain(domain);
        Ok(Self {
            grid,
            subdomain,
            ghost_cutoff: 0.0,
            need: [0; 3],
            swaps: Vec::new(),
            check_atom_count: settings.check_atom_count,
            natoms: None,
        })
    }

    pub fn grid(&self) -> &ProcGrid {
        &self.grid
    }
    pub fn subdomain(&self) -> &SubDomain {
        &self.subdomain
    }
    pub fn swaps(&self) -> &[Swap] {
        &self.swaps
    }
    pub fn need(&self) -> [usize; 3] {
        self.need
    }
    pub fn ghost_cutoff(&self) -> f64 {
        self.ghost_cutoff
    }

    /// Set the halo width (interaction cutoff plus skin) and derive how many
    /// neighbors away ghosts must come from in each dimension
    pub fn set_ghost_cutoff(&mut self, domain: &Domain, cutoff: f64) -> Result<(), Error> {
        if !(cutoff >= 0.0 && cutoff.is_finite()) {
            return Err(Error::config(format!("Invalid ghost cutoff {}", cutoff)));
        }
        let lamda_cut = domain.lamda_cutoff(cutoff);
        let dims = self.grid.dims();
        for d in 0..3 {
            let mut need = (lamda_cut[d] * dims[d] as f64).ceil() as usize;
            if !domain.is_periodic(Axis::from_index(d)) {
                need = need.min(dims[d] - 1);
            }
            self.need[d] = need;
        }
        self.ghost_cutoff = cutoff;
        self.swaps.clear();
        debug!(cutoff, need = ?self.need, "Ghost cutoff set");
        Ok(())
    }

    /// Forget the expected global atom count, e.g. after atoms were added
    pub fn reset_atom_count(&mut self) {
        self.natoms = None;
    }

    /// Wrap owned atoms back into the box and hand every atom that left this
    /// sub-domain to the rank that now owns it. Ghosts are discarded.
    /// Returns the number of atoms this rank sent.
    pub fn migrate(
        &mut self,
        comm: &mut Communicator,
        domain: &Domain,
        atoms: &mut AtomStore,
    ) -> Result<usize, Error> {
        atoms.clear_ghosts();
        self.swaps.clear();
        for i in 0..atoms.nlocal() {
            let x = atoms.positions()[i];
            let remap = domain.remap(&x, &atoms.images()[i]);
            if remap.lost {
                return Err(Error::LostAtom {
                    tag: atoms.tags()[i],
                    position: x,
                    reason: if x.iter().all(|c| c.is_finite()) {
                        "left the box through a fixed boundary".to_string()
                    } else {
                        "position is not finite".to_string()
                    },
                });
            }
            atoms.positions_mut()[i] = remap.position;
            atoms.images_mut()[i] = remap.image;
        }

        let dims = self.grid.dims();
        let mut sent = 0;
        for d in 0..3 {
            if dims[d] == 1 {
                continue;
            }
            let axis = Axis::from_index(d);
            let lo_dir = axis.direction(true);
            let hi_dir = axis.direction(false);
            let my_idx = self.subdomain.grid_idx()[d];
            let periodic = domain.is_periodic(axis);
            let mut strays = comm.all_reduce_usize(self.count_strays(domain, atoms, d), Operation::Sum)?;
            let mut pass = 0;
            while strays > 0 {
                if pass == dims[d] {
                    return Err(Error::protocol(format!(
                        "{} atoms still outside their sub-domain along {:?} after {} passes",
                        strays, axis, pass
                    )));
                }
                let mut lo_buf = AtomBuffer::default();
                let mut hi_buf = AtomBuffer::default();
                let mut i = atoms.nlocal();
                while i > 0 {
                    i -= 1;
                    let lamda = domain.lamda_from_cartesian(&atoms.positions()[i])[d];
                    let owner = self.subdomain.owner_along(lamda, d);
                    if owner == my_idx {
                        continue;
                    }
                    if toward_lo(my_idx, owner, dims[d], periodic) {
                        atoms.pack_exchange(i, &mut lo_buf);
                    } else {
                        atoms.pack_exchange(i, &mut hi_buf);
                    }
                    atoms.remove(i);
                }
                sent += lo_buf.len() + hi_buf.len();

                for (direction, buf) in [(lo_dir, lo_buf), (hi_dir, hi_buf)] {
                    match self.grid.neighbor(direction) {
                        Some(dest) => comm.send(dest, Tag::Migrate { direction, pass }, Payload::Atoms(buf))?,
                        None if !buf.is_empty() => {
                            return Err(Error::LostAtom {
                                tag: buf.tags[0],
                                position: buf.positions[0],
                                reason: format!("no rank across {:?}", direction),
                            })
                        }
                        None => {}
                    }
                }
                // The hi neighbor's lo-bound atoms and the lo neighbor's hi-bound atoms
                for direction in [lo_dir, hi_dir] {
                    if let Some(source) = self.grid.neighbor(direction.opposite()) {
                        let buf = comm.recv_atoms(source, Tag::Migrate { direction, pass })?;
                        atoms.unpack_exchange(buf)?;
                    }
                }
                pass += 1;
                strays = comm.all_reduce_usize(self.count_strays(domain, atoms, d), Operation::Sum)?;
            }
        }
        atoms.rebuild_tag_map();
        debug!(sent, nlocal = atoms.nlocal(), "Migration complete");

        if self.check_atom_count {
            let total = comm.all_reduce_usize(atoms.nlocal(), Operation::Sum)?;
            match self.natoms {
                Some(expected) if expected != total => {
                    return Err(Error::LostAtoms {
                        expected,
                        found: total,
                    })
                }
                _ => self.natoms = Some(total),
            }
        }
        Ok(sent)
    }

    fn count_strays(&self, domain: &Domain, atoms: &AtomStore, d: usize) -> usize {
        atoms.positions()[..atoms.nlocal()]
            .iter()
            .filter(|x| {
                let lamda = domain.lamda_from_cartesian(x)[d];
                self.subdomain.is_below(lamda, d) || self.subdomain.is_above(lamda, d)
            })
            .count()
    }

    /// Rebuild the ghost halo from scratch and record the swap plan used by
    /// [`forward_comm`](Self::forward_comm) and
    /// [`reverse_communicate`](Self::reverse_communicate)
    pub fn exchange_ghosts(
        &mut self,
        comm: &mut Communicator,
        domain: &Domain,
        atoms: &mut AtomStore,
    ) -> Result<(), Error> {
        atoms.clear_ghosts();
        self.swaps.clear();
        let lamda_cut = domain.lamda_cutoff(self.ghost_cutoff);
        let dims = self.grid.dims();
        let sublo = self.subdomain.lo();
        let subhi = self.subdomain.hi();

        for d in 0..3 {
            let axis = Axis::from_index(d);
            let nfirst = atoms.nall();
            for lo in [true, false] {
                let direction = axis.direction(lo);
                let send_to = self.grid.neighbor(direction);
                let recv_from = self.grid.neighbor(direction.opposite());
                // Crossing the global boundary moves the copy by one box vector
                let mut shift = [0.0; 3];
                if lo && self.subdomain.is_first(d) {
                    shift = domain.box_vector(axis);
                } else if !lo && self.subdomain.is_last(d) {
                    let v = domain.box_vector(axis);
                    shift = [-v[0], -v[1], -v[2]];
                }
                let mut candidates = 0..nfirst;
                for _ in 0..self.need[d] {
                    let mut send_list = Vec::new();
                    if send_to.is_some() {
                        for i in candidates.clone() {
                            let lamda = domain.lamda_from_cartesian(&atoms.positions()[i])[d];
                            let inside = if lo {
                                lamda < sublo[d] + lamda_cut[d]
                            } else {
                                lamda >= subhi[d] - lamda_cut[d]
                            };
                            if inside {
                                send_list.push(i);
                            }
                        }
                    }
                    let swap = self.swaps.len();
                    if let Some(dest) = send_to {
                        let buf = atoms.pack_border(&send_list, shift);
                        comm.send(dest, Tag::Border { swap }, Payload::Ghosts(buf))?;
                    }
                    let first_recv = atoms.nall();
                    if let Some(source) = recv_from {
                        let buf = comm.recv_ghosts(source, Tag::Border { swap })?;
                        atoms.unpack_border(buf)?;
                    }
                    let num_recv = atoms.nall() - first_recv;
                    self.swaps.push(Swap {
                        direction,
                        send_to,
                        recv_from,
                        send_list,
                        shift,
                        first_recv,
                        num_recv,
                    });
                    // Later swaps on this side relay what just arrived
                    candidates = first_recv..first_recv + num_recv;
                }
            }
        }
        debug!(
            nlocal = atoms.nlocal(),
            nghost = atoms.nghost(),
            swaps = self.swaps.len(),
            dims = ?dims,
            "Ghost exchange complete"
        );
        Ok(())
    }

    /// Refresh ghost positions, velocities and ghost fields from their owners
    /// along the recorded swap plan
    pub fn forward_comm(&self, comm: &mut Communicator, atoms: &mut AtomStore) -> Result<(), Error> {
        for (swap, plan) in self.swaps.iter().enumerate() {
            if let Some(dest) = plan.send_to {
                let buf = atoms.pack_forward(&plan.send_list, plan.shift);
                comm.send(dest, Tag::Forward { swap }, Payload::Forward(buf))?;
            }
            if let Some(source) = plan.recv_from {
                let buf = comm.recv_forward(source, Tag::Forward { swap })?;
                atoms.unpack_forward(plan.first_recv, plan.num_recv, buf)?;
            }
        }
        Ok(())
    }

    /// Return ghost forces (and reverse-accumulated fields) to the atoms they
    /// were copied from, walking the swaps backwards so that contributions
    /// to relayed ghosts reach the owner exactly once
    pub fn reverse_communicate(
        &self,
        comm: &mut Communicator,
        atoms: &mut AtomStore,
    ) -> Result<(), Error> {
        for (swap, plan) in self.swaps.iter().enumerate().rev() {
            if let Some(dest) = plan.recv_from {
                let buf = atoms.pack_reverse(plan.first_recv, plan.num_recv);
                comm.send(dest, Tag::Reverse { swap }, Payload::Reverse(buf))?;
            }
            if let Some(source) = plan.send_to {
                let buf = comm.recv_reverse(source, Tag::Reverse { swap })?;
                atoms.unpack_reverse(&plan.send_list, buf)?;
            }
        }
        Ok(())
    }
}

/// Whether an atom owned by grid index `owner` leaves `my_idx` through the
/// lo face. Periodic dimensions take the shorter way round.
fn toward_lo(my_idx: usize, owner: usize, n: usize, periodic: bool) -> bool {
    if periodic {
        let down = (my_idx + n - owner) % n;
        let up = (owner + n - my_idx) % n;
        down <= up
    } else {
        owner < my_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{atoms::Atom, domain::BC, parallel::Universe};

    fn domain() -> Domain {
        Domain::orthogonal([0.0; 3], [10.0; 3], [BC::PP; 3]).unwrap()
    }

    #[test]
    fn single_rank_ghosts_are_periodic_images() {
        let result = Universe::run(1, |comm| {
            let domain = domain();
            let mut part = CommPartition::new(comm, &domain, &CommSettings::default())?;
            part.set_ghost_cutoff(&domain, 1.0)?;
            let mut atoms = AtomStore::new(1);
            atoms.insert(Atom::new(1, 1, [0.5, 5.0, 5.0]))?;
            atoms.insert(Atom::new(2, 1, [5.0, 5.0, 5.0]))?;
            part.migrate(comm, &domain, &mut atoms)?;
            part.exchange_ghosts(comm, &domain, &mut atoms)?;
            Ok((atoms.nghost(), atoms.positions()[2..].to_vec(), part.swaps().len()))
        })
        .unwrap();
        let (nghost, ghosts, nswaps) = &result[0];
        assert_eq!(*nswaps, 6);
        assert_eq!(*nghost, 1);
        assert_eq!(ghosts[0], [10.5, 5.0, 5.0]);
    }

    #[test]
    fn migration_moves_atoms_to_their_owner() {
        let tags = Universe::run(2, |comm| {
            let domain = domain();
            let mut part = CommPartition::new(comm, &domain, &CommSettings::default())?;
            let mut atoms = AtomStore::new(1);
            // Every rank starts with atoms on the wrong side
            let base = 10 * comm.rank() as u64;
            let x = if comm.rank() == 0 { 7.5 } else { 2.5 };
            atoms.insert(Atom::new(base + 1, 1, [x, 1.0, 1.0]))?;
            atoms.insert(Atom::new(base + 2, 1, [-1.0, 1.0, 1.0]))?;
            part.migrate(comm, &domain, &mut atoms)?;
            let sub = part.subdomain().clone();
            assert!(atoms.positions().iter().all(|x| sub.owns(&domain, x)));
            let mut tags = atoms.tags().to_vec();
            tags.sort();
            Ok(tags)
        })
        .unwrap();
        assert_eq!(tags[0], vec![11]);
        assert_eq!(tags[1], vec![1, 2, 12]);
    }

    #[test]
    fn fixed_boundary_loses_atoms() {
        let result = Universe::run(1, |comm| {
            let domain = Domain::orthogonal([0.0; 3], [10.0; 3], [BC::FF, BC::PP, BC::PP])?;
            let mut part = CommPartition::new(comm, &domain, &CommSettings::default())?;
            let mut atoms = AtomStore::new(1);
            atoms.insert(Atom::new(5, 1, [10.5, 1.0, 1.0]))?;
            part.migrate(comm, &domain, &mut atoms)
        });
        assert!(matches!(result, Err(Error::LostAtom { tag: 5, .. })));
    }

    #[test]
    fn second_migration_sends_nothing() {
        let sent = Universe::run(2, |comm| {
            let domain = domain();
            let mut part = CommPartition::new(comm, &domain, &CommSettings::default())?;
            let mut atoms = AtomStore::new(1);
            let base = 10 * comm.rank() as u64;
            let x = if comm.rank() == 0 { 8.0 } else { 1.0 };
            atoms.insert(Atom::new(base + 1, 1, [x, 1.0, 1.0]))?;
            atoms.insert(Atom::new(base + 2, 1, [10.0 - x, 1.0, 1.0]))?;
            let first = part.migrate(comm, &domain, &mut atoms)?;
            let mut before = atoms.tags().to_vec();
            let second = part.migrate(comm, &domain, &mut atoms)?;
            let mut after = atoms.tags().to_vec();
            before.sort();
            after.sort();
            assert_eq!(after, before);
            Ok((first, second))
        })
        .unwrap();
        assert_eq!(sent, vec![(1, 0), (1, 0)]);
    }

    #[test]
    fn wrapped_atoms_take_the_short_way() {
        assert!(toward_lo(0, 3, 4, true));
        assert!(!toward_lo(0, 1, 4, true));
        assert!(!toward_lo(0, 3, 4, false));
        assert!(toward_lo(2, 0, 3, false));

        let sent = Universe::run(4, |comm| {
            let domain = domain();
            let settings = CommSettings {
                grid: Some([4, 1, 1]),
                ..Default::default()
            };
            let mut part = CommPartition::new(comm, &domain, &settings)?;
            let mut atoms = AtomStore::new(1);
            if comm.rank() == 0 {
                // Owned by the last rank, one face away across the periodic boundary
                atoms.insert(Atom::new(1, 1, [9.0, 1.0, 1.0]))?;
            }
            let sent = part.migrate(comm, &domain, &mut atoms)?;
            Ok((sent, atoms.tags().to_vec()))
        })
        .unwrap();
        assert_eq!(sent.iter().map(|s| s.0).sum::<usize>(), 1);
        assert_eq!(sent[3].1, vec![1]);
    }

    #[test]
    fn ghost_forces_reach_their_owner_once_per_image() {
        // halo wider than a sub-domain: two relays along x plus periodic
        // self images along y and z
        let domain = Domain::orthogonal([0.0; 3], [4.0; 3], [BC::PP; 3]).unwrap();
        let results = Universe::run(2, |comm| {
            let settings = CommSettings {
                grid: Some([2, 1, 1]),
                ..Default::default()
            };
            let mut part = CommPartition::new(comm, &domain, &settings)?;
            part.set_ghost_cutoff(&domain, 2.8)?;
            assert_eq!(part.need(), [2, 1, 1]);
            let mut atoms = AtomStore::new(1);
            if comm.rank() == 0 {
                atoms.insert(Atom::new(1, 1, [0.5, 0.5, 0.5]))?;
                atoms.insert(Atom::new(2, 1, [1.6, 2.2, 3.7]))?;
            } else {
                atoms.insert(Atom::new(3, 1, [2.5, 1.7, 3.9]))?;
            }
            part.migrate(comm, &domain, &mut atoms)?;
            part.exchange_ghosts(comm, &domain, &mut atoms)?;

            let nlocal = atoms.nlocal();
            let ghost_tags = atoms.tags()[nlocal..].to_vec();
            for (i, f) in atoms.forces_mut().iter_mut().enumerate() {
                *f = if i < nlocal {
                    [0.0; 3]
                } else {
                    [ghost_tags[i - nlocal] as f64, 1.0, 0.0]
                };
            }
            part.reverse_communicate(comm, &mut atoms)?;
            let owned: Vec<(u64, [f64; 3])> = atoms.tags()[..nlocal]
                .iter()
                .copied()
                .zip(atoms.forces()[..nlocal].iter().copied())
                .collect();
            Ok((owned, ghost_tags))
        })
        .unwrap();

        let mut images = std::collections::BTreeMap::new();
        for (_, ghosts) in &results {
            for &tag in ghosts {
                *images.entry(tag).or_insert(0usize) += 1;
            }
        }
        let mut owners = 0;
        for (owned, _) in &results {
            for &(tag, f) in owned {
                let count = images.get(&tag).copied().unwrap_or(0);
                assert!(count >= 2, "atom {} has {} images", tag, count);
                assert_eq!(f, [(tag * count as u64) as f64, count as f64, 0.0]);
                owners += 1;
            }
        }
        assert_eq!(owners, 3);
    }

    #[test]
    fn every_grid_tiles_the_box() {
        let domain = Domain::triclinic([0.0; 3], [9.0, 7.0, 5.0], [1.0, 0.5, -0.5], [BC::PP; 3]).unwrap();
        for (nranks, grid) in [(3, [3, 1, 1]), (7, [1, 7, 1]), (12, [2, 3, 2])] {
            let parts = Universe::run(nranks, |comm| {
                let settings = CommSettings {
                    grid: Some(grid),
                    ..Default::default()
                };
                let part = CommPartition::new(comm, &domain, &settings)?;
                Ok(part.subdomain().clone())
            })
            .unwrap();
            check_tiling(&parts).unwrap();
        }
    }
}
