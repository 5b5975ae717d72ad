use std::any::Any;

use serde::Deserialize;
use tracing::info;

use crate::{
    compute::{Quantity, ThermoState},
    config::StyleConfig,
    output::{self, Value},
    plugin::{Control, EndOfStepContext, Hooks, Plugin},
    Error,
};

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ThermoParams {
    every: usize,
    columns: Vec<Quantity>,
}
impl Default for ThermoParams {
    fn default() -> Self {
        Self {
            every: 100,
            columns: Thermo::DEFAULT_COLUMNS.to_vec(),
        }
    }
}

/// Periodic thermodynamic output, logged on the root rank and kept on every rank
#[derive(Debug)]
pub struct Thermo {
    id: String,
    every: usize,
    columns: Vec<Quantity>,
    history: Vec<(usize, ThermoState)>,
}
impl Thermo {
    pub const STYLE: &'static str = "thermo";
    pub const DEFAULT_COLUMNS: [Quantity; 5] = [
        Quantity::Step,
        Quantity::Temp,
        Quantity::Pe,
        Quantity::Ke,
        Quantity::Etotal,
    ];

    pub fn new(id: &str, every: usize, columns: Vec<Quantity>) -> Result<Self, Error> {
        if every == 0 {
            return Err(Error::plugin(id, "every should be at least 1"));
        }
        if columns.is_empty() {
            return Err(Error::plugin(id, "needs at least one column"));
        }
        Ok(Self {
            id: id.to_string(),
            every,
            columns,
            history: Vec::new(),
        })
    }
    pub fn from_config(config: &StyleConfig) -> Result<Self, Error> {
        let params: ThermoParams = config.params()?;
        Self::new(&config.id, params.every, params.columns)
    }
    /// Every recorded step with its state
    pub fn history(&self) -> &[(usize, ThermoState)] {
        &self.history
    }
    pub fn last(&self) -> Option<&ThermoState> {
        self.history.last().map(|(_, s)| s)
    }

    fn record(&mut self, ctx: &mut EndOfStepContext) -> Result<(), Error> {
        let state = ThermoState::gather(ctx.comm, ctx.atoms, ctx.potential_energy)?;
        if ctx.comm.is_root() {
            let values: Vec<Value> = self
                .columns
                .iter()
                .map(|q| q.value(ctx.step, &state))
                .collect();
            info!("{}", output::row(&values));
        }
        self.history.push((ctx.step, state));
        Ok(())
    }
}

impl Plugin for Thermo {
    fn id(&self) -> &str {
        &self.id
    }
    fn style(&self) -> &str {
        Self::STYLE
    }
    fn hooks(&self) -> Hooks {
        Hooks::END_OF_STEP
    }

    fn post_setup(&mut self, ctx: &mut EndOfStepContext) -> Result<(), Error> {
        if ctx.comm.is_root() {
            let names: Vec<&str> = self.columns.iter().map(|q| q.name()).collect();
            info!("{}", output::header(&names));
        }
        self.record(ctx)
    }

    fn end_of_step(&mut self, ctx: &mut EndOfStepContext) -> Result<Control, Error> {
        if ctx.step % self.every == 0 {
            self.record(ctx)?;
        }
        Ok(Control::Continue)
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
    fn default_columns() {
        let thermo =
            Thermo::from_config(&StyleConfig::new("t", "thermo", serde_yml::Value::Null)).unwrap();
        assert_eq!(thermo.every, 100);
        assert_eq!(thermo.columns.len(), 5);
        assert!(thermo.history().is_empty());
        assert!(Thermo::new("t", 1, Vec::new()).is_err());
    }
}
