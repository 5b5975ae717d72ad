use std::any::Any;

use serde::Deserialize;

use crate::{
    config::StyleConfig,
    plugin::{Hooks, Plugin, StepContext},
    Error,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ViscousParams {
    gamma: f64,
}

/// Damping force `-gamma * v` on every owned atom
#[derive(Debug)]
pub struct Viscous {
    id: String,
    gamma: f64,
}
impl Viscous {
    pub const STYLE: &'static str = "viscous";

    pub fn new(id: &str, gamma: f64) -> Result<Self, Error> {
        if !(gamma >= 0.0 && gamma.is_finite()) {
            return Err(Error::plugin(
                id,
                format!("gamma should be non-negative, got {}", gamma),
            ));
        }
        Ok(Self {
            id: id.to_string(),
            gamma,
        })
    }
    pub fn from_config(config: &StyleConfig) -> Result<Self, Error> {
        let params: ViscousParams = config.params()?;
        Self::new(&config.id, params.gamma)
    }
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Plugin for Viscous {
    fn id(&self) -> &str {
        &self.id
    }
    fn style(&self) -> &str {
        Self::STYLE
    }
    fn hooks(&self) -> Hooks {
        Hooks::MODIFY_FORCE
    }

    fn modify_force(&mut self, ctx: &mut StepContext) -> Result<(), Error> {
        let nlocal = ctx.atoms.nlocal();
        let velocities: Vec<[f64; 3]> = ctx.atoms.velocities()[..nlocal].to_vec();
        for (f, v) in ctx.atoms.forces_mut()[..nlocal].iter_mut().zip(velocities) {
            for d in 0..3 {
                f[d] -= self.gamma * v[d];
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
