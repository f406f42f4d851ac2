//! Flux drivers: sample an incoming neutrino's flavor, momentum and
//! starting position from a pre-computed flux.
//!
//! One driver per normalized flux tag; the driver also carries the
//! pass-through payload that ends up in the event's
//! [`FluxRecord`](ng_event::FluxRecord).

use crate::formula::Formula;
use crate::histogram::{EnergyHistogram, HistogramFile};
use crate::rotation::FluxRotation;
use ng_core::{Error, FourVector, Result};
use ng_event::{FluxData, FluxKind};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// One sampled flux ray.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxRay {
    /// Neutrino PDG code.
    pub pdg: i32,
    /// Neutrino four-momentum (GeV).
    pub p4: FourVector,
    /// Ray start position in detector coordinates (cm; t in ns).
    pub x4: FourVector,
    /// Flux weight of this ray.
    pub weight: f64,
    /// Distance from the parent decay point to the ray start (cm), when
    /// the flux schema knows it.
    pub dk2gen: f64,
    /// Beamline pass-through payload for the flux record.
    pub data: FluxData,
}

/// A flux driver.
pub trait FluxDriver: Send {
    /// The flux-record tag this driver produces.
    fn kind(&self) -> FluxKind;

    /// Sample the next ray. `Ok(None)` means the driver is exhausted for
    /// this spill (tree replays wrap around, so they never return `None`).
    fn generate_ray(&mut self, rng: &mut StdRng) -> Result<Option<FluxRay>>;

    /// Protons-on-target consumed so far, in the driver's own accounting.
    fn used_pot(&self) -> f64;

    /// Number of rays flown so far.
    fn n_flown(&self) -> u64;

    /// Upper end of the energy support (GeV), used for geometry scans.
    fn max_energy(&self) -> f64;
}

// ── mono ───────────────────────────────────────────────────────

/// Mono-energetic flux in a fixed direction; requested flavors are
/// weighted equally.
pub struct MonoFlux {
    flavors: Vec<i32>,
    energy: f64,
    origin: [f64; 3],
    direction: [f64; 3],
    n_flown: u64,
}

impl MonoFlux {
    /// New mono-energetic flux.
    pub fn new(flavors: Vec<i32>, energy: f64, origin: [f64; 3], direction: [f64; 3]) -> Result<Self> {
        if flavors.is_empty() {
            return Err(Error::Config("mono flux needs at least one flavor".into()));
        }
        if energy <= 0.0 {
            return Err(Error::Config(format!("mono flux energy must be > 0, got {energy}")));
        }
        Ok(Self { flavors, energy, origin, direction, n_flown: 0 })
    }
}

impl FluxDriver for MonoFlux {
    fn kind(&self) -> FluxKind {
        FluxKind::Simple
    }

    fn generate_ray(&mut self, rng: &mut StdRng) -> Result<Option<FluxRay>> {
        let pdg = self.flavors[rng.gen_range(0..self.flavors.len())];
        self.n_flown += 1;
        Ok(Some(FluxRay {
            pdg,
            p4: FourVector::from_energy_direction(self.energy, self.direction, 0.0),
            x4: FourVector::new(self.origin[0], self.origin[1], self.origin[2], 0.0),
            weight: 1.0,
            dk2gen: -1.0,
            data: FluxData::Simple,
        }))
    }

    fn used_pot(&self) -> f64 {
        self.n_flown as f64
    }

    fn n_flown(&self) -> u64 {
        self.n_flown
    }

    fn max_energy(&self) -> f64 {
        self.energy
    }
}

// ── histogram / function ───────────────────────────────────────

/// Beam geometry shared by the histogram-shaped modes.
#[derive(Debug, Clone, Copy)]
pub struct BeamGeometry {
    /// Beam axis direction (unit-normalized on use).
    pub direction: [f64; 3],
    /// Beam spot center in detector coordinates (cm).
    pub center: [f64; 3],
    /// Transverse disk radius around the center (cm).
    pub radius: f64,
}

impl BeamGeometry {
    /// Two unit vectors spanning the plane transverse to the beam.
    fn transverse_basis(&self) -> ([f64; 3], [f64; 3]) {
        let d = FourVector::new(self.direction[0], self.direction[1], self.direction[2], 0.0)
            .direction();
        // Pick the world axis least aligned with the beam.
        let seed = if d[2].abs() < 0.9 { [0.0, 0.0, 1.0] } else { [1.0, 0.0, 0.0] };
        let u = [
            seed[1] * d[2] - seed[2] * d[1],
            seed[2] * d[0] - seed[0] * d[2],
            seed[0] * d[1] - seed[1] * d[0],
        ];
        let un = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
        let u = [u[0] / un, u[1] / un, u[2] / un];
        let v = [
            d[1] * u[2] - d[2] * u[1],
            d[2] * u[0] - d[0] * u[2],
            d[0] * u[1] - d[1] * u[0],
        ];
        (u, v)
    }

    /// A ray start uniformly distributed on the transverse disk.
    fn sample_origin(&self, rng: &mut StdRng) -> [f64; 3] {
        if self.radius <= 0.0 {
            return self.center;
        }
        let (u, v) = self.transverse_basis();
        let r = self.radius * rng.gen::<f64>().sqrt();
        let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
        let (a, b) = (r * phi.cos(), r * phi.sin());
        [
            self.center[0] + a * u[0] + b * v[0],
            self.center[1] + a * u[1] + b * v[1],
            self.center[2] + a * u[2] + b * v[2],
        ]
    }
}

/// Per-flavor energy-histogram flux with a beam-disk geometry.
///
/// Serves both the `histogram` mode (histograms read from a file) and the
/// `function` mode (histogram built by binning a formula).
pub struct HistogramFlux {
    entries: Vec<(i32, EnergyHistogram)>,
    geometry: BeamGeometry,
    total_flux: f64,
    n_flown: u64,
}

impl HistogramFlux {
    /// Build from a histogram flux file, associating the fixed histogram
    /// names with the requested flavors. A flavor with no matching named
    /// histogram is a configuration error.
    pub fn from_file(path: &Path, flavors: &[i32], geometry: BeamGeometry) -> Result<Self> {
        let file = HistogramFile::open(path)?;
        let mut entries = Vec::with_capacity(flavors.len());
        for &pdg in flavors {
            entries.push((pdg, file.for_flavor(pdg)?.clone()));
        }
        Self::from_histograms(entries, geometry)
    }

    /// Build the `function` mode: evaluate `formula` into `n_bins` bins
    /// over `[e_min, e_max]` and attach the shape to every requested
    /// flavor.
    pub fn from_formula(
        formula: &Formula,
        e_min: f64,
        e_max: f64,
        n_bins: usize,
        flavors: &[i32],
        geometry: BeamGeometry,
    ) -> Result<Self> {
        let contents = formula.bin(e_min, e_max, n_bins)?;
        let mut entries = Vec::with_capacity(flavors.len());
        for &pdg in flavors {
            entries.push((
                pdg,
                EnergyHistogram::from_contents(format!("func_{pdg}"), e_min, e_max, contents.clone())?,
            ));
        }
        Self::from_histograms(entries, geometry)
    }

    /// Build directly from `(flavor, histogram)` pairs.
    pub fn from_histograms(
        entries: Vec<(i32, EnergyHistogram)>,
        geometry: BeamGeometry,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config("histogram flux needs at least one flavor".into()));
        }
        let total_flux: f64 = entries.iter().map(|(_, h)| h.integral()).sum();
        if total_flux <= 0.0 {
            return Err(Error::Config("histogram flux has zero total integral".into()));
        }
        Ok(Self { entries, geometry, total_flux, n_flown: 0 })
    }

    /// Sum of histogram integrals over the attached flavors
    /// (`totalHistFlux` in the POT-mode rate formula).
    pub fn total_flux(&self) -> f64 {
        self.total_flux
    }

    /// Energy flux per canonical flavor slot, for the flux record.
    fn flux_array(&self) -> [f64; 6] {
        let mut out = [0.0; 6];
        for (pdg, h) in &self.entries {
            let slot = match pdg {
                12 => 0,
                -12 => 1,
                14 => 2,
                -14 => 3,
                16 => 4,
                -16 => 5,
                _ => continue,
            };
            out[slot] = h.integral();
        }
        out
    }
}

impl FluxDriver for HistogramFlux {
    fn kind(&self) -> FluxKind {
        FluxKind::HistPlusFocus
    }

    fn generate_ray(&mut self, rng: &mut StdRng) -> Result<Option<FluxRay>> {
        // Flavor with probability proportional to its integral.
        let mut target = rng.gen::<f64>() * self.total_flux;
        let mut idx = self.entries.len() - 1;
        for (i, (_, h)) in self.entries.iter().enumerate() {
            let w = h.integral();
            if target < w {
                idx = i;
                break;
            }
            target -= w;
        }
        let (pdg, hist) = &self.entries[idx];
        let energy = hist.sample(rng);
        let origin = self.geometry.sample_origin(rng);
        self.n_flown += 1;
        Ok(Some(FluxRay {
            pdg: *pdg,
            p4: FourVector::from_energy_direction(energy, self.geometry.direction, 0.0),
            x4: FourVector::new(origin[0], origin[1], origin[2], 0.0),
            weight: 1.0,
            dk2gen: -1.0,
            data: FluxData::HistPlusFocus(ng_event::HistFluxInfo { flux: self.flux_array() }),
        }))
    }

    fn used_pot(&self) -> f64 {
        self.n_flown as f64
    }

    fn n_flown(&self) -> u64 {
        self.n_flown
    }

    fn max_energy(&self) -> f64 {
        self.entries.iter().map(|(_, h)| h.x_max).fold(0.0, f64::max)
    }
}

// ── tree replay ────────────────────────────────────────────────

/// One entry of a tree-family flux file (JSON-lines schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Neutrino PDG code.
    pub pdg: i32,
    /// Four-momentum (GeV).
    pub p4: FourVector,
    /// Ray start in detector coordinates (cm; t in ns).
    pub x4: FourVector,
    /// Flux weight.
    pub weight: f64,
    /// POT represented by this entry.
    pub pot: f64,
    /// Distance from decay point to ray start (cm), if known.
    #[serde(default = "default_dk2gen")]
    pub dk2gen: f64,
    /// Beamline pass-through payload.
    pub data: FluxData,
}

fn default_dk2gen() -> f64 {
    -1.0
}

/// Replays beamline ntuple entries from the resolved file list, cycling
/// across files and restricting to the requested flavors.
pub struct TreeFlux {
    kind: FluxKind,
    entries: Vec<TreeEntry>,
    cursor: usize,
    used_pot: f64,
    n_flown: u64,
    max_energy: f64,
}

impl TreeFlux {
    /// Load beam data from the resolved files.
    ///
    /// `detector_location` is a label recorded for diagnostics only; the
    /// entries are already projected to the detector by the beamline
    /// simulation. `upstream_z` shifts every ray start upstream along z.
    pub fn load(
        kind: FluxKind,
        files: &[PathBuf],
        detector_location: &str,
        flavors: &[i32],
        upstream_z: Option<f64>,
    ) -> Result<Self> {
        if !matches!(kind, FluxKind::NuMi | FluxKind::SimpleNtuple | FluxKind::Dk2nu) {
            return Err(Error::Config(format!("tree flux cannot serve {kind:?}")));
        }
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for path in files {
            let fh = std::fs::File::open(path).map_err(|e| {
                Error::Resource(format!("cannot open flux file '{}': {e}", path.display()))
            })?;
            for line in std::io::BufReader::new(fh).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let mut entry: TreeEntry = serde_json::from_str(&line)?;
                if entry.data.kind() != kind {
                    return Err(Error::Units(format!(
                        "flux file '{}' carries {:?} entries but the driver expects {:?}",
                        path.display(),
                        entry.data.kind(),
                        kind
                    )));
                }
                if !flavors.contains(&entry.pdg) {
                    skipped += 1;
                    continue;
                }
                if let Some(dz) = upstream_z {
                    entry.x4.z -= dz;
                }
                entries.push(entry);
            }
        }
        if entries.is_empty() {
            return Err(Error::Resource(format!(
                "flux files for location '{detector_location}' hold no entries for flavors {flavors:?}"
            )));
        }
        tracing::info!(
            n_entries = entries.len(),
            n_skipped = skipped,
            location = detector_location,
            "beam data loaded"
        );
        let max_energy = entries.iter().map(|e| e.p4.t).fold(0.0, f64::max);
        Ok(Self { kind, entries, cursor: 0, used_pot: 0.0, n_flown: 0, max_energy })
    }
}

impl FluxDriver for TreeFlux {
    fn kind(&self) -> FluxKind {
        self.kind
    }

    fn generate_ray(&mut self, _rng: &mut StdRng) -> Result<Option<FluxRay>> {
        let entry = &self.entries[self.cursor];
        self.cursor = (self.cursor + 1) % self.entries.len();
        self.used_pot += entry.pot;
        self.n_flown += 1;
        Ok(Some(FluxRay {
            pdg: entry.pdg,
            p4: entry.p4,
            x4: entry.x4,
            weight: entry.weight,
            dk2gen: entry.dk2gen,
            data: entry.data.clone(),
        }))
    }

    fn used_pot(&self) -> f64 {
        self.used_pot
    }

    fn n_flown(&self) -> u64 {
        self.n_flown
    }

    fn max_energy(&self) -> f64 {
        self.max_energy
    }
}

// ── atmospheric ────────────────────────────────────────────────

/// Atmospheric flux from per-flavor model tables.
///
/// Rays start on a sphere of radius `rl` and point inward; directions are
/// isotropic over the upper hemisphere unless a user coordinate rotation
/// is set. Exposure is computed by the driver from `n_flown` and `rt`.
pub struct AtmoFlux {
    entries: Vec<(i32, EnergyHistogram)>,
    e_min: f64,
    e_max: f64,
    rl: f64,
    rt: f64,
    rotation: Option<FluxRotation>,
    total_flux: f64,
    n_flown: u64,
}

impl AtmoFlux {
    /// Build from one table file per flavor (positional pairing).
    pub fn load(
        flavors: &[i32],
        files: &[PathBuf],
        e_min: f64,
        e_max: f64,
        rl: f64,
        rt: f64,
        rotation: Option<FluxRotation>,
    ) -> Result<Self> {
        if flavors.len() != files.len() {
            return Err(Error::Config(format!(
                "atmospheric mode needs one file per flavor: {} flavors, {} files",
                flavors.len(),
                files.len()
            )));
        }
        if !(e_min >= 0.0 && e_min < e_max) {
            return Err(Error::Config(format!(
                "atmospheric energy bounds must satisfy 0 <= Emin < Emax, got [{e_min}, {e_max}]"
            )));
        }
        if rt <= 0.0 {
            // Rt enters the exposure denominator.
            return Err(Error::Config("atmospheric transverse radius Rt must be > 0".into()));
        }
        if rl <= 0.0 {
            return Err(Error::Config("atmospheric longitudinal radius Rl must be > 0".into()));
        }
        let mut entries = Vec::with_capacity(flavors.len());
        for (&pdg, path) in flavors.iter().zip(files) {
            let table: EnergyHistogram = serde_json::from_str(
                &std::fs::read_to_string(path).map_err(|e| {
                    Error::Resource(format!("cannot open atmo table '{}': {e}", path.display()))
                })?,
            )?;
            if table.x_min > e_min || table.x_max < e_max {
                return Err(Error::Config(format!(
                    "atmo table '{}' covers [{}, {}] but [{e_min}, {e_max}] was requested",
                    path.display(),
                    table.x_min,
                    table.x_max
                )));
            }
            entries.push((pdg, table));
        }
        let total_flux: f64 = entries.iter().map(|(_, h)| h.integral()).sum();
        if total_flux <= 0.0 {
            return Err(Error::Config("atmospheric tables have zero total flux".into()));
        }
        Ok(Self { entries, e_min, e_max, rl, rt, rotation, total_flux, n_flown: 0 })
    }

    fn sample_energy(&self, hist: &EnergyHistogram, rng: &mut StdRng) -> f64 {
        // Rejection against the configured bounds; the table is validated
        // to cover them, so this terminates quickly.
        loop {
            let e = hist.sample(rng);
            if e >= self.e_min && e <= self.e_max {
                return e;
            }
        }
    }
}

impl FluxDriver for AtmoFlux {
    fn kind(&self) -> FluxKind {
        FluxKind::Simple
    }

    fn generate_ray(&mut self, rng: &mut StdRng) -> Result<Option<FluxRay>> {
        let mut target = rng.gen::<f64>() * self.total_flux;
        let mut idx = self.entries.len() - 1;
        for (i, (_, h)) in self.entries.iter().enumerate() {
            let w = h.integral();
            if target < w {
                idx = i;
                break;
            }
            target -= w;
        }
        let (pdg, hist) = (self.entries[idx].0, &self.entries[idx].1);
        let energy = self.sample_energy(hist, rng);

        // Downward-going isotropic direction in the flux frame.
        let cos_zenith = -rng.gen::<f64>();
        let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
        let sin_zenith = (1.0 - cos_zenith * cos_zenith).sqrt();
        let mut dir = [sin_zenith * phi.cos(), sin_zenith * phi.sin(), cos_zenith];
        if let Some(rot) = &self.rotation {
            dir = rot.apply(dir);
        }
        let origin = [-dir[0] * self.rl, -dir[1] * self.rl, -dir[2] * self.rl];
        self.n_flown += 1;
        Ok(Some(FluxRay {
            pdg,
            p4: FourVector::from_energy_direction(energy, dir, 0.0),
            x4: FourVector::new(origin[0], origin[1], origin[2], 0.0),
            weight: 1.0,
            dk2gen: -1.0,
            data: FluxData::Simple,
        }))
    }

    fn used_pot(&self) -> f64 {
        self.n_flown as f64
    }

    fn n_flown(&self) -> u64 {
        self.n_flown
    }

    fn max_energy(&self) -> f64 {
        self.e_max
    }
}

/// Transverse radius of an atmospheric driver, needed by the driver's
/// exposure accounting.
impl AtmoFlux {
    /// Transverse radius Rt (cm).
    pub fn rt(&self) -> f64 {
        self.rt
    }
}
