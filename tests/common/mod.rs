#![allow(dead_code)]
use std::collections::BTreeMap;

use ddmd::{
    atoms::Atom,
    config::SimConfig,
    domain::{Domain, BC},
    neighbor::ListPolicy,
    styles::LjCut,
    Error, Simulation,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub fn periodic_box(len: f64) -> Domain {
    Domain::orthogonal([0.0; 3], [len; 3], [BC::PP; 3]).unwrap()
}

/// `n` atoms at random positions in `domain`, no two closer than `min_dist`
pub fn spaced_atoms(domain: &Domain, n: usize, min_dist: f64, seed: u64) -> Vec<Atom> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions: Vec<[f64; 3]> = Vec::with_capacity(n);
    while positions.len() < n {
        let lamda = [rng.gen(), rng.gen(), rng.gen()];
        let x = domain.cartesian_from_lamda(&lamda);
        let clear = positions.iter().all(|y| {
            let d = domain.minimum_image(&[x[0] - y[0], x[1] - y[1], x[2] - y[2]]);
            d[0] * d[0] + d[1] * d[1] + d[2] * d[2] >= min_dist * min_dist
        });
        if clear {
            positions.push(x);
        }
    }
    positions
        .into_iter()
        .enumerate()
        .map(|(k, x)| {
            let v = [rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5];
            Atom::new(k as u64 + 1, 1, x).with_velocity(v)
        })
        .collect()
}

pub fn lj_config(grid: Option<[usize; 3]>, policy: ListPolicy) -> SimConfig {
    let mut config = SimConfig::default();
    config.comm.grid = grid;
    config.neighbor.policy = policy;
    config
}

/// Simulation with `atoms` and a 2.5 cutoff Lennard-Jones pair style
pub fn lj_simulation<'c>(
    comm: &'c mut ddmd::parallel::Communicator,
    domain: &Domain,
    config: &SimConfig,
    atoms: &[Atom],
) -> Result<Simulation<'c>, Error> {
    let mut sim = Simulation::new(comm, domain.clone(), config)?;
    sim.create_atoms(atoms.to_vec())?;
    sim.add_plugin(Box::new(LjCut::new("pair", 1, 1.0, 1.0, 2.5, false)?))?;
    Ok(sim)
}

/// Owned atoms of one rank keyed by tag
pub fn owned_by_tag(sim: &Simulation, values: &[[f64; 3]]) -> BTreeMap<u64, [f64; 3]> {
    let n = sim.atoms().nlocal();
    sim.atoms().tags()[..n]
        .iter()
        .copied()
        .zip(values[..n].iter().copied())
        .collect()
}

pub fn unwrapped(sim: &Simulation) -> Vec<[f64; 3]> {
    let atoms = sim.atoms();
    (0..atoms.nlocal())
        .map(|i| sim.domain().unmap(&atoms.positions()[i], &atoms.images()[i]))
        .collect()
}

pub fn merge(parts: Vec<BTreeMap<u64, [f64; 3]>>) -> BTreeMap<u64, [f64; 3]> {
    let mut all = BTreeMap::new();
    for part in parts {
        for (tag, v) in part {
            assert!(all.insert(tag, v).is_none(), "tag {} owned twice", tag);
        }
    }
    all
}

pub fn assert_close(a: &BTreeMap<u64, [f64; 3]>, b: &BTreeMap<u64, [f64; 3]>, tol: f64) {
    assert_eq!(a.len(), b.len());
    for ((ta, va), (tb, vb)) in a.iter().zip(b.iter()) {
        assert_eq!(ta, tb);
        for d in 0..3 {
            assert!(
                (va[d] - vb[d]).abs() <= tol * (1.0 + va[d].abs()),
                "atom {}: {:?} vs {:?}",
                ta,
                va,
                vb
            );
        }
    }
}

/// Lennard-Jones forces summed over every periodic image within the cutoff
pub fn brute_force_lj(domain: &Domain, positions: &BTreeMap<u64, [f64; 3]>, rc: f64) -> BTreeMap<u64, [f64; 3]> {
    let prd = domain.prd();
    let mut forces = BTreeMap::new();
    for (&ti, xi) in positions {
        let mut f = [0.0; 3];
        for (&tj, xj) in positions {
            if ti == tj {
                continue;
            }
            for nx in -2..=2 {
                for ny in -2..=2 {
                    for nz in -2..=2 {
                        let d = [
                            xi[0] - xj[0] - nx as f64 * prd[0],
                            xi[1] - xj[1] - ny as f64 * prd[1],
                            xi[2] - xj[2] - nz as f64 * prd[2],
                        ];
                        let r2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
                        if r2 >= rc * rc {
                            continue;
                        }
                        let sr6 = 1.0 / (r2 * r2 * r2);
                        let fpair = 24.0 * sr6 * (2.0 * sr6 - 1.0) / r2;
                        for k in 0..3 {
                            f[k] += fpair * d[k];
                        }
                    }
                }
            }
        }
        forces.insert(ti, f);
    }
    forces
}
