use std::any::Any;

use serde::Deserialize;
use tracing::info;

use crate::{
    compute::{Quantity, ThermoState},
    config::StyleConfig,
    plugin::{Control, EndOfStepContext, Hooks, Plugin},
    Error,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HaltParams {
    #[serde(default = "default_every")]
    every: usize,
    quantity: Quantity,
    above: Option<f64>,
    below: Option<f64>,
}
fn default_every() -> usize {
    1
}

/// Stops the run once a global quantity crosses a threshold
#[derive(Debug)]
pub struct Halt {
    id: String,
    every: usize,
    quantity: Quantity,
    above: Option<f64>,
    below: Option<f64>,
    halted_at: Option<usize>,
}
impl Halt {
    pub const STYLE: &'static str = "halt";

    pub fn new(
        id: &str,
        every: usize,
        quantity: Quantity,
        above: Option<f64>,
        below: Option<f64>,
    ) -> Result<Self, Error> {
        if every == 0 {
            return Err(Error::plugin(id, "every should be at least 1"));
        }
        if above.is_none() && below.is_none() {
            return Err(Error::plugin(id, "needs a threshold, above or below"));
        }
        Ok(Self {
            id: id.to_string(),
            every,
            quantity,
            above,
            below,
            halted_at: None,
        })
    }
    pub fn from_config(config: &StyleConfig) -> Result<Self, Error> {
        let params: HaltParams = config.params()?;
        Self::new(
            &config.id,
            params.every,
            params.quantity,
            params.above,
            params.below,
        )
    }
    /// Step on which the threshold was crossed
    pub fn halted_at(&self) -> Option<usize> {
        self.halted_at
    }

    fn crossed(&self, value: f64) -> bool {
        self.above.is_some_and(|t| value > t) || self.below.is_some_and(|t| value < t)
    }
}

impl Plugin for Halt {
    fn id(&self) -> &str {
        &self.id
    }
    fn style(&self) -> &str {
        Self::STYLE
    }
    fn hooks(&self) -> Hooks {
        Hooks::END_OF_STEP
    }

    fn end_of_step(&mut self, ctx: &mut EndOfStepContext) -> Result<Control, Error> {
        if ctx.step % self.every != 0 {
            return Ok(Control::Continue);
        }
        let value = match self.quantity {
            Quantity::Step => ctx.step as f64,
            q => {
                let state = ThermoState::gather(ctx.comm, ctx.atoms, ctx.potential_energy)?;
                q.value(ctx.step, &state).as_f64()
            }
        };
        if !self.crossed(value) {
            return Ok(Control::Continue);
        }
        if ctx.comm.is_root() {
            info!(
                id = %self.id,
                "{} = {} crossed the threshold at step {}",
                self.quantity.name(),
                value,
                ctx.step
            );
        }
        self.halted_at = Some(ctx.step);
        Ok(Control::Stop)
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
    use super::*;

    #[test]
    fn thresholds() {
        let halt = Halt::new("h", 1, Quantity::Temp, Some(2.0), Some(0.5)).unwrap();
        assert!(halt.crossed(2.5));
        assert!(halt.crossed(0.1));
        assert!(!halt.crossed(1.0));
        assert!(Halt::new("h", 1, Quantity::Temp, None, None).is_err());
    }

    #[test]
    fn parses_params() {
        let params = serde_yml::from_str("{ quantity: step, above: 5 }").unwrap();
        let halt = Halt::from_config(&StyleConfig::new("h", "halt", params)).unwrap();
        assert_eq!(halt.quantity, Quantity::Step);
        assert_eq!(halt.every, 1);
        assert_eq!(halt.above, Some(5.0));
    }
}
