//! Common data types for nugen: four-vectors, PDG code helpers, constants.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// Nucleon mass in GeV (average of proton and neutron, GENIE convention).
pub const NUCLEON_MASS: f64 = 0.9389187;
/// Proton mass in GeV.
pub const PROTON_MASS: f64 = 0.9382721;
/// Neutron mass in GeV.
pub const NEUTRON_MASS: f64 = 0.9395654;
/// Proton mass in kilograms, used in POT-based rate normalization.
pub const NUCLEON_MASS_KG: f64 = 1.6726e-27;
/// Electron mass in GeV.
pub const ELECTRON_MASS: f64 = 0.000_510_999;
/// Muon mass in GeV.
pub const MUON_MASS: f64 = 0.105_658_4;
/// Tau mass in GeV.
pub const TAU_MASS: f64 = 1.776_86;
/// Charged-pion mass in GeV.
pub const PION_MASS: f64 = 0.139_570_4;
/// Neutral-pion mass in GeV.
pub const PI0_MASS: f64 = 0.134_976_8;

/// A (t, x, y, z) four-vector with the (+,−,−,−) metric.
///
/// Used both for momenta (t = energy, GeV) and positions (t = time).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FourVector {
    /// x component (px for momenta).
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
    /// Time-like component (energy for momenta).
    pub t: f64,
}

impl FourVector {
    /// Construct from spatial components and a time-like component.
    pub fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }

    /// The zero four-vector.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a momentum four-vector from energy, direction and mass.
    ///
    /// `direction` need not be normalized; it is scaled to `|p| = sqrt(E² − m²)`.
    pub fn from_energy_direction(energy: f64, direction: [f64; 3], mass: f64) -> Self {
        let p = (energy * energy - mass * mass).max(0.0).sqrt();
        let norm =
            (direction[0].powi(2) + direction[1].powi(2) + direction[2].powi(2)).sqrt().max(1e-300);
        Self {
            x: p * direction[0] / norm,
            y: p * direction[1] / norm,
            z: p * direction[2] / norm,
            t: energy,
        }
    }

    /// Minkowski inner product `a·b = a.t b.t − a.x b.x − a.y b.y − a.z b.z`.
    pub fn dot(&self, other: &FourVector) -> f64 {
        self.t * other.t - self.x * other.x - self.y * other.y - self.z * other.z
    }

    /// Invariant mass squared `p·p`.
    pub fn m2(&self) -> f64 {
        self.dot(self)
    }

    /// Invariant mass, clamped at zero for space-like vectors.
    pub fn m(&self) -> f64 {
        self.m2().max(0.0).sqrt()
    }

    /// Magnitude of the spatial part.
    pub fn p(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Spatial components as an array.
    pub fn spatial(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Unit vector of the spatial part, or `[0, 0, 0]` for a zero vector.
    pub fn direction(&self) -> [f64; 3] {
        let p = self.p();
        if p <= 0.0 {
            return [0.0, 0.0, 0.0];
        }
        [self.x / p, self.y / p, self.z / p]
    }

    /// True if every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0 && self.t == 0.0
    }
}

impl Add for FourVector {
    type Output = FourVector;
    fn add(self, rhs: FourVector) -> FourVector {
        FourVector::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.t + rhs.t)
    }
}

impl Sub for FourVector {
    type Output = FourVector;
    fn sub(self, rhs: FourVector) -> FourVector {
        FourVector::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.t - rhs.t)
    }
}

impl Neg for FourVector {
    type Output = FourVector;
    fn neg(self) -> FourVector {
        FourVector::new(-self.x, -self.y, -self.z, -self.t)
    }
}

// ── PDG code helpers ───────────────────────────────────────────

/// True for ν_e, ν_μ, ν_τ and their antiparticles.
pub fn is_neutrino(pdg: i32) -> bool {
    matches!(pdg.abs(), 12 | 14 | 16)
}

/// True for e, μ, τ and their antiparticles.
pub fn is_charged_lepton(pdg: i32) -> bool {
    matches!(pdg.abs(), 11 | 13 | 15)
}

/// The charged lepton PDG produced by a CC interaction of this neutrino,
/// preserving lepton number (ν → ℓ⁻, ν̄ → ℓ⁺).
pub fn cc_partner(nu_pdg: i32) -> i32 {
    debug_assert!(is_neutrino(nu_pdg));
    nu_pdg - nu_pdg.signum()
}

/// Mass of a charged lepton or neutrino by PDG code; `None` for other codes.
pub fn lepton_mass(pdg: i32) -> Option<f64> {
    match pdg.abs() {
        11 => Some(ELECTRON_MASS),
        13 => Some(MUON_MASS),
        15 => Some(TAU_MASS),
        12 | 14 | 16 => Some(0.0),
        _ => None,
    }
}

/// 10LZZZAAAI nuclear PDG code for a nucleus with `z` protons and `a` nucleons.
pub fn ion_pdg(z: i32, a: i32) -> i32 {
    1_000_000_000 + z * 10_000 + a * 10
}

/// Decompose a 10LZZZAAAI nuclear PDG code into `(z, a)`; `None` for
/// non-nuclear codes.
pub fn ion_z_a(pdg: i32) -> Option<(i32, i32)> {
    if pdg < 1_000_000_000 {
        return None;
    }
    let z = (pdg / 10_000) % 1000;
    let a = (pdg / 10) % 1000;
    Some((z, a))
}

/// Nucleon mass by PDG code (2212 or 2112), GeV.
pub fn nucleon_mass(pdg: i32) -> f64 {
    match pdg {
        2212 => PROTON_MASS,
        2112 => NEUTRON_MASS,
        _ => NUCLEON_MASS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_four_vector_mass() {
        let p = FourVector::from_energy_direction(2.0, [0.0, 0.0, 1.0], MUON_MASS);
        assert_relative_eq!(p.m(), MUON_MASS, epsilon = 1e-9);
        assert_relative_eq!(p.t, 2.0);
        assert_eq!(p.direction(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_dot_metric() {
        let a = FourVector::new(1.0, 2.0, 3.0, 4.0);
        let b = FourVector::new(0.5, 0.5, 0.5, 0.5);
        assert_relative_eq!(a.dot(&b), 4.0 * 0.5 - 1.0 * 0.5 - 2.0 * 0.5 - 3.0 * 0.5);
    }

    #[test]
    fn test_ion_pdg_roundtrip() {
        let ar40 = ion_pdg(18, 40);
        assert_eq!(ar40, 1_000_180_400);
        assert_eq!(ion_z_a(ar40), Some((18, 40)));
        assert_eq!(ion_z_a(2212), None);
    }

    #[test]
    fn test_cc_partner() {
        assert_eq!(cc_partner(14), 13);
        assert_eq!(cc_partner(-14), -13);
        assert_eq!(cc_partner(12), 11);
    }
}
