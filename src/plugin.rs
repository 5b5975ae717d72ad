//! Interface between the step pipeline and physics plugins (pair styles,
//! fixes, diagnostics).
use std::{any::Any, fmt, ops::BitOr};

use crate::{
    atoms::{AtomStore, AtomsRef, FieldSet, ForceAccumulator},
    domain::Domain,
    neighbor::{NeighborList, SpecialBonds},
    parallel::Communicator,
    Error,
};

/// Set of pipeline stages a plugin takes part in
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hooks(u8);
impl Hooks {
    pub const NONE: Hooks = Hooks(0);
    pub const PRE_EXCHANGE: Hooks = Hooks(1);
    pub const POST_INTEGRATE: Hooks = Hooks(1 << 1);
    pub const COMPUTE_FORCE: Hooks = Hooks(1 << 2);
    pub const MODIFY_FORCE: Hooks = Hooks(1 << 3);
    pub const END_OF_STEP: Hooks = Hooks(1 << 4);

    const NAMES: [(Hooks, &'static str); 5] = [
        (Hooks::PRE_EXCHANGE, "pre_exchange"),
        (Hooks::POST_INTEGRATE, "post_integrate"),
        (Hooks::COMPUTE_FORCE, "compute_force"),
        (Hooks::MODIFY_FORCE, "modify_force"),
        (Hooks::END_OF_STEP, "end_of_step"),
    ];

    pub fn contains(&self, other: Hooks) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
impl BitOr for Hooks {
    type Output = Hooks;
    fn bitor(self, rhs: Self) -> Self::Output {
        Hooks(self.0 | rhs.0)
    }
}
impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(h, _)| self.contains(*h))
            .map(|(_, n)| *n)
            .collect();
        write!(f, "Hooks({})", names.join(" | "))
    }
}

/// Returned from the end of every step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Passed to [`Plugin::setup`] before the first step of a run
pub struct SetupContext<'a> {
    pub domain: &'a Domain,
    pub atoms: &'a mut AtomStore,
    pub timestep: f64,
    pub special: &'a SpecialBonds,
}

/// State handed to the pre-exchange, post-integrate and modify-force hooks
pub struct StepContext<'a> {
    pub step: usize,
    pub timestep: f64,
    pub domain: &'a Domain,
    pub atoms: &'a mut AtomStore,
}

/// State handed to force computations. Forces can only be added to.
pub struct ForceContext<'a> {
    pub step: usize,
    pub domain: &'a Domain,
    pub atoms: AtomsRef<'a>,
    pub forces: ForceAccumulator<'a>,
    pub fields: &'a mut FieldSet,
    pub neighbors: &'a NeighborList,
    pub special: &'a SpecialBonds,
}

/// State handed to end-of-step hooks. Every rank calls these hooks on the
/// same step, so collectives on `comm` are allowed.
pub struct EndOfStepContext<'a> {
    pub step: usize,
    pub timestep: f64,
    pub domain: &'a Domain,
    pub atoms: &'a AtomStore,
    pub comm: &'a mut Communicator,
    /// Sum of this rank's force-computing plugins' energies for this step
    pub potential_energy: f64,
}

/// A physics or diagnostic extension driven by the step pipeline
pub trait Plugin: Any + Send {
    fn id(&self) -> &str;
    fn style(&self) -> &str;
    fn hooks(&self) -> Hooks;

    /// Interaction range this plugin needs neighbors and ghosts for
    fn cutoff(&self) -> Option<f64> {
        None
    }

    fn setup(&mut self, _ctx: &mut SetupContext) -> Result<(), Error> {
        Ok(())
    }
    fn pre_exchange(&mut self, _ctx: &mut StepContext) -> Result<(), Error> {
        Ok(())
    }
    fn post_integrate(&mut self, _ctx: &mut StepContext) -> Result<(), Error> {
        Ok(())
    }
    /// Accumulate forces; returns this rank's share of the potential energy
    fn compute_force(&mut self, _ctx: &mut ForceContext) -> Result<f64, Error> {
        Ok(0.0)
    }
    fn modify_force(&mut self, _ctx: &mut StepContext) -> Result<(), Error> {
        Ok(())
    }
    fn end_of_step(&mut self, _ctx: &mut EndOfStepContext) -> Result<Control, Error> {
        Ok(Control::Continue)
    }
    /// Called on every plugin once setup has computed the initial forces
    fn post_setup(&mut self, _ctx: &mut EndOfStepContext) -> Result<(), Error> {
        Ok(())
    }
    /// Undo `setup`, e.g. unregister per-atom fields
    fn teardown(&mut self, _atoms: &mut AtomStore) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
