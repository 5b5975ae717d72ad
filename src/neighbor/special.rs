use serde::{Deserialize, Serialize};

use crate::atoms::SpecialLevel;

/// How a bonded pair enters the neighbor list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialTreatment {
    /// Left out of the list entirely
    Exclude,
    /// Listed like any other pair
    Include,
    /// Listed with its level so styles can apply the scale factors
    Scaled(SpecialLevel),
}

/// Scale factors for 1-2, 1-3 and 1-4 partners, for van der Waals and
/// Coulomb interactions
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialBonds {
    pub lj: [f64; 3],
    pub coul: [f64; 3],
}
impl Default for SpecialBonds {
    fn default() -> Self {
        Self {
            lj: [0.0; 3],
            coul: [0.0; 3],
        }
    }
}
impl SpecialBonds {
    pub fn new(lj: [f64; 3], coul: [f64; 3]) -> Self {
        Self { lj, coul }
    }
    pub fn treatment(&self, level: SpecialLevel) -> SpecialTreatment {
        let k = level.index();
        match (self.lj[k], self.coul[k]) {
            (lj, coul) if lj == 0.0 && coul == 0.0 => SpecialTreatment::Exclude,
            (lj, coul) if lj == 1.0 && coul == 1.0 => SpecialTreatment::Include,
            _ => SpecialTreatment::Scaled(level),
        }
    }
    pub fn lj_factor(&self, level: SpecialLevel) -> f64 {
        self.lj[level.index()]
    }
}
