mod common;

use common::*;
use ddmd::{
    atoms::Atom,
    domain::{Domain, BC},
    neighbor::ListPolicy,
    parallel::Universe,
    Error, Simulation,
};

#[test]
fn neighbor_overflow_is_reported() {
    let domain = periodic_box(10.0);
    let atoms = vec![
        Atom::new(1, 1, [1.0, 1.0, 1.0]),
        Atom::new(2, 1, [2.0, 1.0, 1.0]),
        Atom::new(3, 1, [3.0, 1.0, 1.0]),
    ];
    let mut config = lj_config(None, ListPolicy::Half);
    config.neighbor.max_neighbors_per_atom = 1;
    let result = Universe::run(2, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.setup()
    });
    assert!(matches!(result, Err(Error::NeighborOverflow { limit: 1, .. })));
}

#[test]
fn atom_leaving_a_fixed_boundary_aborts_every_rank() {
    let domain = Domain::orthogonal([0.0; 3], [10.0; 3], [BC::FF, BC::PP, BC::PP]).unwrap();
    let atoms = vec![
        Atom::new(1, 1, [9.9, 5.0, 5.0]).with_velocity([100.0, 0.0, 0.0]),
        Atom::new(2, 1, [2.0, 5.0, 5.0]),
    ];
    let config = lj_config(Some([2, 1, 1]), ListPolicy::Half);
    let result = Universe::run(2, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.run(10)
    });
    assert!(matches!(result, Err(Error::LostAtom { tag: 1, .. })), "{:?}", result.err());
}

#[test]
fn creating_atoms_outside_a_fixed_box_fails() {
    let domain = Domain::orthogonal([0.0; 3], [10.0; 3], [BC::FF; 3]).unwrap();
    let config = lj_config(None, ListPolicy::Half);
    let result = Universe::run(2, |comm| {
        let mut sim = Simulation::new(comm, domain.clone(), &config)?;
        sim.create_atoms(vec![Atom::new(1, 1, [11.0, 5.0, 5.0])])
    });
    assert!(matches!(result, Err(Error::LostAtom { tag: 1, .. })));
}

#[test]
fn duplicate_tags_are_rejected() {
    let domain = periodic_box(10.0);
    let config = lj_config(None, ListPolicy::Half);
    let result = Universe::run(1, |comm| {
        let mut sim = Simulation::new(comm, domain.clone(), &config)?;
        sim.create_atoms(vec![Atom::new(4, 1, [1.0; 3])])?;
        sim.create_atoms(vec![Atom::new(4, 1, [5.0; 3])])
    });
    assert!(matches!(result, Err(Error::DuplicateTag(4))));
}

#[test]
fn tag_zero_clash_is_reported_on_every_rank() {
    let domain = periodic_box(10.0);
    let config = lj_config(None, ListPolicy::Half);
    let results = Universe::run(2, |comm| {
        let mut sim = Simulation::new(comm, domain.clone(), &config)?;
        sim.create_atoms(vec![Atom::new(0, 1, [1.0; 3])])?;
        Ok(sim.create_atoms(vec![Atom::new(0, 1, [6.0; 3])]))
    })
    .unwrap();
    for result in results {
        assert!(matches!(result, Err(Error::DuplicateTag(0))), "{:?}", result);
    }
}

#[test]
fn processor_grid_must_match_the_rank_count() {
    let domain = periodic_box(10.0);
    let config = lj_config(Some([3, 1, 1]), ListPolicy::Half);
    let result = Universe::run(2, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &[Atom::new(1, 1, [1.0; 3])])?;
        sim.setup()
    });
    assert!(matches!(result, Err(Error::Decomposition(_))), "{:?}", result.err());
}

#[test]
fn setup_without_a_pair_style_fails() {
    let domain = periodic_box(10.0);
    let config = lj_config(None, ListPolicy::Half);
    let result = Universe::run(1, |comm| {
        let mut sim = Simulation::new(comm, domain.clone(), &config)?;
        sim.create_atoms(vec![Atom::new(1, 1, [1.0; 3])])?;
        sim.setup()
    });
    assert!(matches!(result, Err(Error::Config(_))));
}
