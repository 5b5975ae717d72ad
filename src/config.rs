//! Run configuration loaded from YAML.
//!
//! ```yaml
//! num_types: 1
//! timestep: 0.005
//! neighbor:
//!   skin: 0.3
//!   every: 1
//! domain:
//!   lo: [0.0, 0.0, 0.0]
//!   hi: [10.0, 10.0, 10.0]
//!   boundary: [PP, PP, PP]
//! create:
//!   - kind: random
//!     count: 100
//!     seed: 1
//! velocity: { temperature: 1.0, seed: 2 }
//! comm:
//!   grid: [2, 1, 1]
//! run:
//!   steps: 1000
//!   thermo_every: 100
//! styles:
//!   - id: pair
//!     style: lj/cut
//!     params: { epsilon: 1.0, sigma: 1.0, cutoff: 2.5 }
//! ```
use std::{fs, path::Path};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    domain::{Domain, BC},
    neighbor::NeighborSettings,
    Error,
};

/// Everything needed to set up one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub num_types: usize,
    /// One mass per type; unit masses when omitted
    pub masses: Option<Vec<f64>>,
    pub timestep: f64,
    pub domain: DomainConfig,
    /// Applied in order by every rank; each keeps the atoms it owns
    pub create: Vec<CreateConfig>,
    pub velocity: Option<VelocityConfig>,
    pub neighbor: NeighborSettings,
    pub comm: CommSettings,
    pub run: RunConfig,
    pub styles: Vec<StyleConfig>,
}
impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_types: 1,
            masses: None,
            timestep: 0.005,
            domain: DomainConfig::default(),
            create: Vec::new(),
            velocity: None,
            neighbor: NeighborSettings::default(),
            comm: CommSettings::default(),
            run: RunConfig::default(),
            styles: Vec::new(),
        }
    }
}
impl SimConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: SimConfig = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.num_types == 0 {
            return Err(Error::config("num_types should be at least 1"));
        }
        if let Some(masses) = &self.masses {
            if masses.len() != self.num_types {
                return Err(Error::config(format!(
                    "Expected {} masses, got {}",
                    self.num_types,
                    masses.len()
                )));
            }
        }
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(Error::config(format!(
                "Timestep should be positive, got {}",
                self.timestep
            )));
        }
        if self.comm.threads_per_rank == 0 {
            return Err(Error::config("threads_per_rank should be at least 1"));
        }
        self.domain.build()?;
        for create in &self.create {
            let atom_type = create.atom_type();
            if atom_type == 0 || atom_type > self.num_types {
                return Err(Error::InvalidType {
                    atom_type,
                    num_types: self.num_types,
                });
            }
        }
        if let Some(velocity) = &self.velocity {
            if !(velocity.temperature >= 0.0 && velocity.temperature.is_finite()) {
                return Err(Error::config(format!(
                    "Temperature should be non-negative, got {}",
                    velocity.temperature
                )));
            }
        }
        self.neighbor.validate()?;
        for (i, style) in self.styles.iter().enumerate() {
            if self.styles[..i].iter().any(|s| s.id == style.id) {
                return Err(Error::config(format!("Duplicate style id '{}'", style.id)));
            }
        }
        Ok(())
    }
}

/// Global box bounds and boundary conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub lo: [f64; 3],
    pub hi: [f64; 3],
    /// xy, xz, yz; an orthogonal box when omitted
    pub tilt: Option<[f64; 3]>,
    pub boundary: [BC; 3],
}
impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            lo: [0.0; 3],
            hi: [10.0; 3],
            tilt: None,
            boundary: [BC::PP; 3],
        }
    }
}
impl DomainConfig {
    pub fn build(&self) -> Result<Domain, Error> {
        match self.tilt {
            Some(tilt) => Domain::triclinic(self.lo, self.hi, tilt, self.boundary),
            None => Domain::orthogonal(self.lo, self.hi, self.boundary),
        }
    }
}

/// A batch of atoms to create before the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CreateConfig {
    /// Uniformly random positions in the whole box
    Random {
        count: usize,
        #[serde(default = "default_atom_type")]
        atom_type: usize,
        #[serde(default)]
        seed: u64,
    },
    /// Simple cubic lattice filling the box
    Lattice {
        spacing: f64,
        #[serde(default = "default_atom_type")]
        atom_type: usize,
    },
}
fn default_atom_type() -> usize {
    1
}
impl CreateConfig {
    pub fn atom_type(&self) -> usize {
        match self {
            CreateConfig::Random { atom_type, .. } | CreateConfig::Lattice { atom_type, .. } => {
                *atom_type
            }
        }
    }
}

/// Initial Gaussian velocities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    pub temperature: f64,
    #[serde(default)]
    pub seed: u64,
}

/// Domain decomposition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommSettings {
    /// Explicit processor grid; chosen automatically when omitted
    pub grid: Option<[usize; 3]>,
    /// Verify after every migration that no atom was lost
    pub check_atom_count: bool,
    /// Size of each rank's rayon pool
    pub threads_per_rank: usize,
}
impl Default for CommSettings {
    fn default() -> Self {
        Self {
            grid: None,
            check_atom_count: true,
            threads_per_rank: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub steps: usize,
    /// Print a thermo line every this many steps (0 disables)
    pub thermo_every: usize,
    /// Spatially sort owned atoms every this many neighbor rebuilds (0 disables)
    pub sort_every: usize,
}
impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 0,
            thermo_every: 0,
            sort_every: 0,
        }
    }
}

/// One plugin instance: a registered style name plus its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub id: String,
    pub style: String,
    #[serde(default)]
    pub params: serde_yml::Value,
}
impl StyleConfig {
    pub fn new(id: &str, style: &str, params: serde_yml::Value) -> Self {
        Self {
            id: id.to_string(),
            style: style.to_string(),
            params,
        }
    }
    /// Deserialize the parameters into a style's own settings type
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let params = if self.params.is_null() {
            serde_yml::Value::Mapping(serde_yml::Mapping::new())
        } else {
            self.params.clone()
        };
        serde_yml::from_value(params).map_err(|e| {
            Error::config(format!(
                "Invalid parameters for '{}' ({}): {}",
                self.id, self.style, e
            ))
        })
    }
}
