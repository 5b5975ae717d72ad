//! Flat message bodies for the four kinds of atom traffic.
//!
//! Core attributes travel as typed vectors; registered fields travel as one
//! `extra` block of `extra_width` floats per atom, packed in registration
//! order.
use super::Special;

/// Whole atoms leaving their owner
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AtomBuffer {
    pub tags: Vec<u64>,
    pub types: Vec<usize>,
    pub positions: Vec<[f64; 3]>,
    pub velocities: Vec<[f64; 3]>,
    pub images: Vec<[i32; 3]>,
    pub molecules: Vec<Option<u64>>,
    pub specials: Vec<Vec<Special>>,
    pub extra: Vec<f64>,
    pub extra_width: usize,
}
impl AtomBuffer {
    pub fn len(&self) -> usize {
        self.tags.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Read-only copies of atoms near a sub-domain face
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GhostBuffer {
    pub tags: Vec<u64>,
    pub types: Vec<usize>,
    pub positions: Vec<[f64; 3]>,
    pub velocities: Vec<[f64; 3]>,
    pub molecules: Vec<Option<u64>>,
    pub extra: Vec<f64>,
    pub extra_width: usize,
}
impl GhostBuffer {
    pub fn len(&self) -> usize {
        self.tags.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Refreshed ghost state on steps that reuse the neighbor list
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardBuffer {
    pub positions: Vec<[f64; 3]>,
    pub velocities: Vec<[f64; 3]>,
    pub extra: Vec<f64>,
    pub extra_width: usize,
}
impl ForwardBuffer {
    pub fn len(&self) -> usize {
        self.positions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Ghost contributions headed back to the rank that sent the ghosts
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReverseBuffer {
    pub forces: Vec<[f64; 3]>,
    pub extra: Vec<f64>,
    pub extra_width: usize,
}
impl ReverseBuffer {
    pub fn len(&self) -> usize {
        self.forces.len()
    }
    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }
}
