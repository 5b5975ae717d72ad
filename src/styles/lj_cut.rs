use std::any::Any;

use serde::Deserialize;

use crate::{
    config::StyleConfig,
    neighbor::ListPolicy,
    plugin::{ForceContext, Hooks, Plugin},
    utils::{norm_squared, sub, Types},
    Error,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LJCutCoeff {
    sigma: f64,
    epsilon: f64,
    rcut: f64,
    sigma6: f64,
    rcut2: f64,
    /// Energy at the cutoff, subtracted when shifting
    offset: f64,
}
impl LJCutCoeff {
    pub fn new(sigma: f64, epsilon: f64, rcut: f64, shift: bool) -> Self {
        let sigma6 = sigma.powi(6);
        let rcut2 = rcut * rcut;
        let offset = if shift && rcut > 0.0 {
            let sr6 = sigma6 / (rcut2 * rcut2 * rcut2);
            4.0 * epsilon * sr6 * (sr6 - 1.0)
        } else {
            0.0
        };
        Self {
            sigma,
            epsilon,
            rcut,
            sigma6,
            rcut2,
            offset,
        }
    }
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
    pub fn rcut(&self) -> f64 {
        self.rcut
    }

    /// Pair energy and `F / r` at squared distance `r2`, or `None` beyond the cutoff
    fn evaluate(&self, r2: f64) -> Option<(f64, f64)> {
        if r2 >= self.rcut2 || r2 == 0.0 {
            return None;
        }
        // U(r) = 4 eps ((sig/r)^12 - (sig/r)^6) - offset
        // F(r) / r = 24 eps / r^2 (2 (sig/r)^12 - (sig/r)^6)
        let r2inv = 1.0 / r2;
        let sr6 = self.sigma6 * r2inv * r2inv * r2inv;
        let energy = 4.0 * self.epsilon * sr6 * (sr6 - 1.0) - self.offset;
        let fpair = 24.0 * self.epsilon * r2inv * sr6 * (2.0 * sr6 - 1.0);
        Some((energy, fpair))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LjCutParams {
    epsilon: f64,
    sigma: f64,
    cutoff: f64,
    shift: bool,
    /// Per-pair overrides of the global coefficients
    coeffs: Vec<LjPairParams>,
}
impl Default for LjCutParams {
    fn default() -> Self {
        Self {
            epsilon: 1.0,
            sigma: 1.0,
            cutoff: 2.5,
            shift: false,
            coeffs: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LjPairParams {
    /// Every type when omitted
    itype: Option<usize>,
    jtype: Option<usize>,
    epsilon: f64,
    sigma: f64,
    cutoff: Option<f64>,
}

/// Lennard-Jones 12-6 pair style, truncated at a cutoff
#[derive(Debug)]
pub struct LjCut {
    id: String,
    num_types: usize,
    shift: bool,
    coeffs: Vec<LJCutCoeff>,
    energy: f64,
}
impl LjCut {
    pub const STYLE: &'static str = "lj/cut";

    /// Every type pair starts with the same coefficients
    pub fn new(
        id: &str,
        num_types: usize,
        sigma: f64,
        epsilon: f64,
        rcut: f64,
        shift: bool,
    ) -> Result<Self, Error> {
        check_coeff(id, sigma, epsilon, rcut)?;
        Ok(Self {
            id: id.to_string(),
            num_types,
            shift,
            coeffs: vec![LJCutCoeff::new(sigma, epsilon, rcut, shift); num_types * num_types],
            energy: 0.0,
        })
    }

    pub fn from_config(config: &StyleConfig, num_types: usize) -> Result<Self, Error> {
        let params: LjCutParams = config.params()?;
        let mut style = Self::new(
            &config.id,
            num_types,
            params.sigma,
            params.epsilon,
            params.cutoff,
            params.shift,
        )?;
        for pair in &params.coeffs {
            let itypes = pair.itype.map_or(Types::All, Types::One);
            let jtypes = pair.jtype.map_or(Types::All, Types::One);
            style.set_coeff(
                itypes,
                jtypes,
                pair.sigma,
                pair.epsilon,
                pair.cutoff.unwrap_or(params.cutoff),
            )?;
        }
        Ok(style)
    }

    /// Set symmetric coefficients for every pair of selected types
    pub fn set_coeff(
        &mut self,
        type_i: Types,
        type_j: Types,
        sigma: f64,
        epsilon: f64,
        rcut: f64,
    ) -> Result<(), Error> {
        check_coeff(&self.id, sigma, epsilon, rcut)?;
        let itypes = type_i.to_vec(self.num_types);
        let jtypes = type_j.to_vec(self.num_types);
        if let Some(&bad) = itypes
            .iter()
            .chain(jtypes.iter())
            .find(|&&t| t == 0 || t > self.num_types)
        {
            return Err(Error::InvalidType {
                atom_type: bad,
                num_types: self.num_types,
            });
        }
        let coeff = LJCutCoeff::new(sigma, epsilon, rcut, self.shift);
        for &i in &itypes {
            for &j in &jtypes {
                let (ij, ji) = (self.type_idx(i, j), self.type_idx(j, i));
                self.coeffs[ij] = coeff;
                self.coeffs[ji] = coeff;
            }
        }
        Ok(())
    }
    pub fn coeff(&self, type_i: usize, type_j: usize) -> &LJCutCoeff {
        &self.coeffs[self.type_idx(type_i, type_j)]
    }
    /// This rank's share of the energy from the last force computation
    pub fn energy(&self) -> f64 {
        self.energy
    }

    fn type_idx(&self, type_i: usize, type_j: usize) -> usize {
        (type_i - 1) * self.num_types + (type_j - 1)
    }
}

fn check_coeff(id: &str, sigma: f64, epsilon: f64, rcut: f64) -> Result<(), Error> {
    if !(sigma > 0.0 && epsilon >= 0.0 && rcut > 0.0) {
        return Err(Error::plugin(
            id,
            format!(
                "invalid coefficients sigma={} epsilon={} cutoff={}",
                sigma, epsilon, rcut
            ),
        ));
    }
    Ok(())
}

impl Plugin for LjCut {
    fn id(&self) -> &str {
        &self.id
    }
    fn style(&self) -> &str {
        Self::STYLE
    }
    fn hooks(&self) -> Hooks {
        Hooks::COMPUTE_FORCE
    }
    fn cutoff(&self) -> Option<f64> {
        self.coeffs.iter().map(|c| c.rcut).reduce(f64::max)
    }

    fn compute_force(&mut self, ctx: &mut ForceContext) -> Result<f64, Error> {
        let atoms = ctx.atoms;
        let list = ctx.neighbors;
        let special = ctx.special;
        let half = list.policy() == ListPolicy::Half;
        let coeffs = &self.coeffs;
        let num_types = self.num_types;

        self.energy = ctx.forces.par_accumulate(0..atoms.nlocal(), |i, buf| {
            let xi = atoms.positions[i];
            let row = (atoms.types[i] - 1) * num_types;
            let mut energy = 0.0;
            for neighbor in list.neighbors(i) {
                let j = neighbor.index;
                let coeff = &coeffs[row + atoms.types[j] - 1];
                let delta = sub(&xi, &atoms.positions[j]);
                let Some((e, fpair)) = coeff.evaluate(norm_squared(&delta)) else {
                    continue;
                };
                let factor = neighbor.special.map_or(1.0, |l| special.lj_factor(l));
                let f = [
                    factor * fpair * delta[0],
                    factor * fpair * delta[1],
                    factor * fpair * delta[2],
                ];
                for d in 0..3 {
                    buf[i][d] += f[d];
                }
                if half {
                    for d in 0..3 {
                        buf[j][d] -= f[d];
                    }
                    energy += factor * e;
                } else {
                    energy += 0.5 * factor * e;
                }
            }
            energy
        });
        Ok(self.energy)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn force_vanishes_at_the_minimum() {
        let coeff = LJCutCoeff::new(1.0, 1.0, 2.5, false);
        let rmin2 = 2f64.powf(1.0 / 3.0);
        let (energy, fpair) = coeff.evaluate(rmin2).unwrap();
        assert_relative_eq!(energy, -1.0, epsilon = 1e-12);
        assert_relative_eq!(fpair, 0.0, epsilon = 1e-12);
        assert!(coeff.evaluate(6.25).is_none());
        // Repulsive inside sigma
        assert!(coeff.evaluate(0.81).unwrap().1 > 0.0);
    }

    #[test]
    fn shifted_energy_is_zero_at_cutoff() {
        let coeff = LJCutCoeff::new(1.0, 1.0, 2.5, true);
        let (energy, _) = coeff.evaluate(2.5 * 2.5 - 1e-9).unwrap();
        assert_relative_eq!(energy, 0.0, epsilon = 1e-8);
    }

    #[test]
    fn pair_coefficients_from_params() {
        let params: serde_yml::Value = serde_yml::from_str(
            "cutoff: 2.0\ncoeffs:\n  - { itype: 1, jtype: 2, epsilon: 0.5, sigma: 1.2, cutoff: 3.0 }\n",
        )
        .unwrap();
        let style = LjCut::from_config(&StyleConfig::new("pair", "lj/cut", params), 2).unwrap();
        assert_eq!(style.coeff(2, 1).epsilon(), 0.5);
        assert_eq!(style.coeff(1, 2).sigma(), 1.2);
        assert_eq!(style.coeff(2, 2).rcut(), 2.0);
        assert_eq!(style.cutoff(), Some(3.0));

        let mut style = LjCut::new("pair", 2, 1.0, 1.0, 2.5, false).unwrap();
        let err = style.set_coeff(Types::One(3), Types::All, 1.0, 1.0, 2.5);
        assert!(matches!(err, Err(Error::InvalidType { atom_type: 3, .. })));
    }
}
