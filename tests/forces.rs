mod common;

use std::collections::BTreeMap;

use common::*;
use ddmd::{atoms::Atom, neighbor::ListPolicy, parallel::Universe};

/// Three atoms in a box smaller than twice the cutoff, so every pair
/// interacts with several periodic images of its partner
fn small_box_atoms() -> Vec<Atom> {
    vec![
        Atom::new(1, 1, [0.5, 0.5, 0.5]),
        Atom::new(2, 1, [2.5, 0.7, 0.4]),
        Atom::new(3, 1, [1.4, 2.6, 3.1]),
    ]
}

fn setup_forces(nranks: usize, grid: Option<[usize; 3]>, policy: ListPolicy) -> BTreeMap<u64, [f64; 3]> {
    let domain = periodic_box(4.0);
    let atoms = small_box_atoms();
    let config = lj_config(grid, policy);
    let parts = Universe::run(nranks, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.setup()?;
        Ok(owned_by_tag(&sim, sim.atoms().forces()))
    })
    .unwrap();
    merge(parts)
}

#[test]
fn forces_include_every_periodic_image() {
    let domain = periodic_box(4.0);
    let positions: BTreeMap<u64, [f64; 3]> = small_box_atoms()
        .into_iter()
        .map(|a| (a.tag, a.position))
        .collect();
    let expected = brute_force_lj(&domain, &positions, 2.5);

    let net: f64 = (0..3).map(|d| expected.values().map(|f| f[d]).sum::<f64>().abs()).sum();
    assert!(net < 1e-10);

    assert_close(&setup_forces(1, None, ListPolicy::Half), &expected, 1e-10);
    assert_close(&setup_forces(1, None, ListPolicy::Full), &expected, 1e-10);
    // Two ranks along x: the halo spans more than one neighbor sub-domain
    assert_close(&setup_forces(2, Some([2, 1, 1]), ListPolicy::Half), &expected, 1e-10);
    assert_close(&setup_forces(4, Some([2, 2, 1]), ListPolicy::Half), &expected, 1e-10);
}

#[test]
fn each_pair_is_listed_exactly_once_across_ranks() {
    let domain = periodic_box(10.0);
    let atoms = spaced_atoms(&domain, 120, 0.9, 7);
    let config = lj_config(Some([2, 2, 1]), ListPolicy::Half);
    let cutn = 2.5 + config.neighbor.skin;

    let parts = Universe::run(4, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.setup()?;
        let tags = sim.atoms().tags();
        let list = sim.neighbor_list();
        let mut pairs = Vec::new();
        for i in 0..sim.atoms().nlocal() {
            for n in list.neighbors(i) {
                let (a, b) = (tags[i], tags[n.index]);
                pairs.push((a.min(b), a.max(b)));
            }
        }
        Ok(pairs)
    })
    .unwrap();
    let mut listed: Vec<(u64, u64)> = parts.into_iter().flatten().collect();
    listed.sort();

    // The box is wider than twice the list cutoff, so a pair has at most
    // one image in range
    let mut expected = Vec::new();
    for (i, a) in atoms.iter().enumerate() {
        for b in &atoms[i + 1..] {
            let d = domain.minimum_image(&[
                a.position[0] - b.position[0],
                a.position[1] - b.position[1],
                a.position[2] - b.position[2],
            ]);
            if d[0] * d[0] + d[1] * d[1] + d[2] * d[2] < cutn * cutn {
                expected.push((a.tag.min(b.tag), a.tag.max(b.tag)));
            }
        }
    }
    expected.sort();
    assert_eq!(listed, expected);
}
