//! Simulation box geometry: orthogonal or triclinic, with per-axis periodicity.
//!
//! Fractional ("lamda") coordinates map the box onto the unit cube,
//! `x = h * lamda + lo`, where `h` is the upper-triangular matrix
//!
//! ```text
//! | xprd  xy   xz  |
//! |  0   yprd  yz  |
//! |  0    0   zprd |
//! ```
mod subdomain;

pub use subdomain::{check_tiling, SubDomain};

use serde::{Deserialize, Serialize};

use crate::{region::Rect, utils::Axis, Error};

/// Boundary conditions for simulation box.
///
/// PP: Periodic (must be set for both sides)
/// FF: Fixed boundary, atoms leaving the box are lost
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BC {
    PP,
    FF,
}
impl BC {
    /// Check whether the boundary condition is periodic
    pub fn is_periodic(&self) -> bool {
        matches!(self, BC::PP)
    }
}

/// A position after periodic wrapping
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Remap {
    pub position: [f64; 3],
    pub image: [i32; 3],
    pub image_delta: [i32; 3],
    /// The atom is outside a non-periodic boundary (position was clamped) or not finite
    pub lost: bool,
}

/// Geometric source of truth for the global box
#[derive(Clone, Debug, PartialEq)]
pub struct Domain {
    lo: [f64; 3],
    hi: [f64; 3],
    /// xy, xz, yz
    tilt: [f64; 3],
    bc: [BC; 3],
    triclinic: bool,
    /// xprd, yprd, zprd, yz, xz, xy
    h: [f64; 6],
    h_inv: [f64; 6],
}
impl Domain {
    // Creation

    /// Create an orthogonal box from its corners and boundary conditions
    pub fn orthogonal(lo: [f64; 3], hi: [f64; 3], bc: [BC; 3]) -> Result<Self, Error> {
        Self::build(lo, hi, [0.0; 3], bc, false)
    }
    /// Create a triclinic box; `tilt` holds the xy, xz and yz tilt factors
    pub fn triclinic(lo: [f64; 3], hi: [f64; 3], tilt: [f64; 3], bc: [BC; 3]) -> Result<Self, Error> {
        Self::build(lo, hi, tilt, bc, true)
    }
    /// Create a fully periodic orthogonal box from a given rectangular box
    pub fn from_rect_periodic(rect: &Rect) -> Result<Self, Error> {
        Self::orthogonal(rect.lo(), rect.hi(), [BC::PP; 3])
    }
    fn build(
        lo: [f64; 3],
        hi: [f64; 3],
        tilt: [f64; 3],
        bc: [BC; 3],
        triclinic: bool,
    ) -> Result<Self, Error> {
        for d in 0..3 {
            if !(lo[d].is_finite() && hi[d].is_finite()) || hi[d] <= lo[d] {
                return Err(Error::config(format!(
                    "Box bounds along axis {} must be finite with lo < hi, found [{}, {}]",
                    d, lo[d], hi[d]
                )));
            }
        }
        if tilt.iter().any(|t| !t.is_finite()) {
            return Err(Error::config(format!("Tilt factors must be finite, found {:?}", tilt)));
        }
        let [xy, xz, yz] = tilt;
        let prd = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
        let h = [prd[0], prd[1], prd[2], yz, xz, xy];
        let h_inv = [
            1.0 / h[0],
            1.0 / h[1],
            1.0 / h[2],
            -h[3] / (h[1] * h[2]),
            (h[3] * h[5] - h[1] * h[4]) / (h[0] * h[1] * h[2]),
            -h[5] / (h[0] * h[1]),
        ];
        Ok(Self {
            lo,
            hi,
            tilt,
            bc,
            triclinic,
            h,
            h_inv,
        })
    }

    // Getters

    pub fn lo(&self) -> [f64; 3] {
        self.lo
    }
    pub fn hi(&self) -> [f64; 3] {
        self.hi
    }
    /// Box lengths along each axis
    pub fn prd(&self) -> [f64; 3] {
        [self.h[0], self.h[1], self.h[2]]
    }
    pub fn tilt(&self) -> [f64; 3] {
        self.tilt
    }
    pub fn bc(&self) -> [BC; 3] {
        self.bc
    }
    pub fn is_triclinic(&self) -> bool {
        self.triclinic
    }
    /// Check whether the boundary condition along a given axis (X, Y, Z) is periodic
    pub fn is_periodic(&self, axis: Axis) -> bool {
        self.bc[axis.index()].is_periodic()
    }
    pub fn periodicity(&self) -> [bool; 3] {
        [
            self.bc[0].is_periodic(),
            self.bc[1].is_periodic(),
            self.bc[2].is_periodic(),
        ]
    }
    pub fn volume(&self) -> f64 {
        self.h[0] * self.h[1] * self.h[2]
    }
    /// Edge vector of the box along `axis` (a, b or c)
    pub fn box_vector(&self, axis: Axis) -> [f64; 3] {
        let h = &self.h;
        match axis {
            Axis::X => [h[0], 0.0, 0.0],
            Axis::Y => [h[5], h[1], 0.0],
            Axis::Z => [h[4], h[3], h[2]],
        }
    }

    // Transforms

    pub fn lamda_from_cartesian(&self, x: &[f64; 3]) -> [f64; 3] {
        let h_inv = &self.h_inv;
        let d = [x[0] - self.lo[0], x[1] - self.lo[1], x[2] - self.lo[2]];
        [
            h_inv[0] * d[0] + h_inv[5] * d[1] + h_inv[4] * d[2],
            h_inv[1] * d[1] + h_inv[3] * d[2],
            h_inv[2] * d[2],
        ]
    }
    pub fn cartesian_from_lamda(&self, lamda: &[f64; 3]) -> [f64; 3] {
        let h = &self.h;
        [
            h[0] * lamda[0] + h[5] * lamda[1] + h[4] * lamda[2] + self.lo[0],
            h[1] * lamda[1] + h[3] * lamda[2] + self.lo[1],
            h[2] * lamda[2] + self.lo[2],
        ]
    }
    /// Distance `cutoff` expressed in lamda units along each axis, measured
    /// perpendicular to the faces so that triclinic halos are wide enough
    pub fn lamda_cutoff(&self, cutoff: f64) -> [f64; 3] {
        let h_inv = &self.h_inv;
        [
            cutoff * (h_inv[0] * h_inv[0] + h_inv[5] * h_inv[5] + h_inv[4] * h_inv[4]).sqrt(),
            cutoff * (h_inv[1] * h_inv[1] + h_inv[3] * h_inv[3]).sqrt(),
            cutoff * h_inv[2],
        ]
    }
    pub fn contains(&self, x: &[f64; 3]) -> bool {
        self.lamda_from_cartesian(x)
            .iter()
            .all(|l| (0.0..=1.0).contains(l))
    }

    /// Wrap a position back into the box along every periodic axis.
    ///
    /// Along a non-periodic axis a position outside the box is clamped onto
    /// the boundary and reported as lost.
    pub fn remap(&self, x: &[f64; 3], image: &[i32; 3]) -> Remap {
        if x.iter().any(|c| !c.is_finite()) {
            return Remap {
                position: *x,
                image: *image,
                image_delta: [0; 3],
                lost: true,
            };
        }
        let lamda = self.lamda_from_cartesian(x);
        let mut position = *x;
        let mut image_delta = [0; 3];
        let mut lost = false;
        for axis in Axis::ALL {
            let d = axis.index();
            if self.bc[d].is_periodic() {
                let n = lamda[d].floor();
                if n != 0.0 {
                    let v = self.box_vector(axis);
                    for k in 0..3 {
                        position[k] -= n * v[k];
                    }
                    image_delta[d] = n as i32;
                }
            } else if lamda[d] < 0.0 || lamda[d] > 1.0 {
                lost = true;
            }
        }
        if lost {
            position = self.clamp_non_periodic(&position);
        }
        Remap {
            position,
            image: [
                image[0] + image_delta[0],
                image[1] + image_delta[1],
                image[2] + image_delta[2],
            ],
            image_delta,
            lost,
        }
    }
    fn clamp_non_periodic(&self, x: &[f64; 3]) -> [f64; 3] {
        if !self.triclinic {
            let mut out = *x;
            for d in 0..3 {
                if !self.bc[d].is_periodic() {
                    out[d] = out[d].clamp(self.lo[d], self.hi[d]);
                }
            }
            return out;
        }
        let mut lamda = self.lamda_from_cartesian(x);
        for d in 0..3 {
            if !self.bc[d].is_periodic() {
                lamda[d] = lamda[d].clamp(0.0, 1.0);
            }
        }
        self.cartesian_from_lamda(&lamda)
    }

    /// Unwrapped position from a wrapped one and its image flags
    pub fn unmap(&self, x: &[f64; 3], image: &[i32; 3]) -> [f64; 3] {
        let mut out = *x;
        for axis in Axis::ALL {
            let n = image[axis.index()] as f64;
            let v = self.box_vector(axis);
            for k in 0..3 {
                out[k] += n * v[k];
            }
        }
        out
    }

    /// Minimum-image displacement.
    ///
    /// Components are reduced z first so the tilt corrections carry into
    /// y and x; each periodic component ends in `[-L/2, L/2)`.
    pub fn minimum_image(&self, delta: &[f64; 3]) -> [f64; 3] {
        let mut d = *delta;
        let h = &self.h;
        if self.bc[2].is_periodic() {
            let n = ((d[2] + 0.5 * h[2]) / h[2]).floor();
            d[2] -= n * h[2];
            d[1] -= n * h[3];
            d[0] -= n * h[4];
        }
        if self.bc[1].is_periodic() {
            let n = ((d[1] + 0.5 * h[1]) / h[1]).floor();
            d[1] -= n * h[1];
            d[0] -= n * h[5];
        }
        if self.bc[0].is_periodic() {
            let n = ((d[0] + 0.5 * h[0]) / h[0]).floor();
            d[0] -= n * h[0];
        }
        d
    }
}
