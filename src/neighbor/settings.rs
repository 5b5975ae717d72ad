use serde::{Deserialize, Serialize};

use super::SpecialBonds;
use crate::Error;

/// Which pairs an owned atom lists
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListPolicy {
    /// Each pair once, on one rank
    Half,
    /// Every partner of every owned atom
    Full,
}

/// Settings for computing and updating a neighbor list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborSettings {
    pub skin: f64,
    /// Only consider rebuilding on steps that are a multiple of `every`
    pub every: usize,
    /// Minimum number of steps between rebuilds
    pub delay: usize,
    /// Rebuild only when an atom moved more than half the skin
    pub check: bool,
    pub policy: ListPolicy,
    pub max_neighbors_per_atom: usize,
    pub special: SpecialBonds,
}
impl Default for NeighborSettings {
    fn default() -> Self {
        Self {
            skin: 0.3,
            every: 1,
            delay: 0,
            check: true,
            policy: ListPolicy::Half,
            max_neighbors_per_atom: 2000,
            special: SpecialBonds::default(),
        }
    }
}
impl NeighborSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.skin >= 0.0 && self.skin.is_finite()) {
            return Err(Error::config(format!(
                "Neighbor skin should be non-negative, got {}",
                self.skin
            )));
        }
        if self.every == 0 {
            return Err(Error::config("Neighbor 'every' should be at least 1"));
        }
        if self.max_neighbors_per_atom == 0 {
            return Err(Error::config("max_neighbors_per_atom should be at least 1"));
        }
        Ok(())
    }
}

/// Bookkeeping for the every/delay part of the rebuild decision
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateSettings {
    pub every: usize,
    pub delay: usize,
    pub check: bool,
    last_update_step: Option<usize>,
}
impl UpdateSettings {
    pub fn new(settings: &NeighborSettings) -> Self {
        Self {
            every: settings.every,
            delay: settings.delay,
            check: settings.check,
            last_update_step: None,
        }
    }
    pub fn should_update_neighbors(&self, step: usize) -> bool {
        match self.last_update_step {
            None => true,
            Some(last) => step % self.every == 0 && step.saturating_sub(last) >= self.delay,
        }
    }
    pub fn last_update_step(&self) -> Option<usize> {
        self.last_update_step
    }
    pub fn mark_updated(&mut self, step: usize) {
        self.last_update_step = Some(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_and_delay() {
        let settings = NeighborSettings {
            every: 2,
            delay: 4,
            ..Default::default()
        };
        let mut update = UpdateSettings::new(&settings);
        assert!(update.should_update_neighbors(3));
        update.mark_updated(0);
        assert!(!update.should_update_neighbors(2));
        assert!(!update.should_update_neighbors(5));
        assert!(update.should_update_neighbors(4));
        assert!(update.should_update_neighbors(6));
    }
}
