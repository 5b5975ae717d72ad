//! Global diagnostics reduced across ranks.
mod kinetic_energy;
mod temperature;

pub use kinetic_energy::kinetic_energy;
pub use temperature::{degrees_of_freedom, temperature};

use serde::{Deserialize, Serialize};

use crate::{
    atoms::AtomStore,
    output::{Operation, Value},
    parallel::Communicator,
    Error,
};

/// A thermodynamic quantity that can be printed or tested against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    Step,
    Atoms,
    Temp,
    Ke,
    Pe,
    Etotal,
}
impl Quantity {
    pub fn name(&self) -> &'static str {
        match self {
            Quantity::Step => "Step",
            Quantity::Atoms => "Atoms",
            Quantity::Temp => "Temp",
            Quantity::Ke => "KinEng",
            Quantity::Pe => "PotEng",
            Quantity::Etotal => "TotEng",
        }
    }
    pub fn value(&self, step: usize, state: &ThermoState) -> Value {
        match self {
            Quantity::Step => Value::Usize(step),
            Quantity::Atoms => Value::Usize(state.natoms),
            Quantity::Temp => Value::Float(state.temperature),
            Quantity::Ke => Value::Float(state.kinetic_energy),
            Quantity::Pe => Value::Float(state.potential_energy),
            Quantity::Etotal => Value::Float(state.total_energy()),
        }
    }
}

/// Global thermodynamic state, identical on every rank
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThermoState {
    pub natoms: usize,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub temperature: f64,
}
impl ThermoState {
    /// Collective: every rank must call this on the same step
    pub fn gather(
        comm: &mut Communicator,
        atoms: &AtomStore,
        potential_energy: f64,
    ) -> Result<Self, Error> {
        let reduced = comm.all_reduce_values(
            vec![
                Value::Usize(atoms.nlocal()),
                Value::Float(kinetic_energy(atoms)),
                Value::Float(potential_energy),
            ],
            &[Operation::Sum; 3],
        )?;
        let natoms = reduced[0]
            .as_usize()
            .ok_or_else(|| Error::protocol("Atom count reduced to a non-integer"))?;
        let kinetic_energy = reduced[1].as_f64();
        Ok(Self {
            natoms,
            kinetic_energy,
            potential_energy: reduced[2].as_f64(),
            temperature: temperature(kinetic_energy, natoms),
        })
    }
    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy + self.potential_energy
    }
}
