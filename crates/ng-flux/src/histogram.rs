//! 1-D energy histograms used by the histogram and function flux modes.
//!
//! Histogram flux files hold one named histogram per flavor
//! (`nue`, `nuebar`, `numu`, `numubar`, `nutau`, `nutaubar`) in a single
//! JSON document.

use ng_core::{Error, Result};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A 1-D histogram with uniform binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyHistogram {
    /// Histogram name.
    pub name: String,
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin (GeV).
    pub x_min: f64,
    /// Upper edge of the last bin (GeV).
    pub x_max: f64,
    /// Bin contents.
    pub bin_content: Vec<f64>,
}

impl EnergyHistogram {
    /// Build from bin contents over `[x_min, x_max]`.
    pub fn from_contents(
        name: impl Into<String>,
        x_min: f64,
        x_max: f64,
        bin_content: Vec<f64>,
    ) -> Result<Self> {
        if bin_content.is_empty() || !(x_min < x_max) {
            return Err(Error::Config("histogram needs bins and x_min < x_max".into()));
        }
        if bin_content.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::Config("histogram bin contents must be finite and >= 0".into()));
        }
        Ok(Self { name: name.into(), n_bins: bin_content.len(), x_min, x_max, bin_content })
    }

    /// Bin width.
    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.n_bins as f64
    }

    /// Center of bin `i`.
    pub fn bin_center(&self, i: usize) -> f64 {
        self.x_min + (i as f64 + 0.5) * self.bin_width()
    }

    /// Sum of bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Sample an energy: pick a bin with probability proportional to its
    /// content, then uniformly within the bin.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        let total = self.integral();
        if total <= 0.0 {
            return self.x_min;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut idx = self.n_bins - 1;
        for (i, &v) in self.bin_content.iter().enumerate() {
            if target < v {
                idx = i;
                break;
            }
            target -= v;
        }
        let lo = self.x_min + idx as f64 * self.bin_width();
        lo + rng.gen::<f64>() * self.bin_width()
    }

    /// Bin index containing `x`, or `None` outside the range.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if x < self.x_min || x >= self.x_max {
            return None;
        }
        Some(((x - self.x_min) / self.bin_width()) as usize)
    }
}

/// The fixed per-flavor histogram names, ordered
/// (νe, ν̄e, νμ, ν̄μ, ντ, ν̄τ).
pub const FLAVOR_HIST_NAMES: [(&str, i32); 6] = [
    ("nue", 12),
    ("nuebar", -12),
    ("numu", 14),
    ("numubar", -14),
    ("nutau", 16),
    ("nutaubar", -16),
];

/// The name a flavor's histogram must carry, or `None` for a non-neutrino
/// PDG code.
pub fn hist_name_for(pdg: i32) -> Option<&'static str> {
    FLAVOR_HIST_NAMES.iter().find(|(_, p)| *p == pdg).map(|(n, _)| *n)
}

/// A histogram flux file: named histograms keyed by flavor name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistogramFile {
    /// Histograms keyed by their fixed flavor names.
    pub histograms: BTreeMap<String, EnergyHistogram>,
}

impl HistogramFile {
    /// Open and parse a histogram flux file.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!("cannot open histogram flux file '{}': {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write to a file (used by tests and fixture tooling).
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The histogram for a flavor PDG code. A requested flavor with no
    /// matching named histogram is a configuration error, never a silent
    /// null.
    pub fn for_flavor(&self, pdg: i32) -> Result<&EnergyHistogram> {
        let name = hist_name_for(pdg)
            .ok_or_else(|| Error::Config(format!("PDG {pdg} is not a neutrino flavor")))?;
        self.histograms.get(name).ok_or_else(|| {
            Error::Config(format!("histogram flux file has no '{name}' histogram for PDG {pdg}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_sample_respects_support() {
        let h = EnergyHistogram::from_contents("numu", 0.0, 10.0, vec![1.0; 50]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let e = h.sample(&mut rng);
            assert!((0.0..10.0).contains(&e));
        }
    }

    #[test]
    fn test_sample_prefers_heavy_bins() {
        // All weight in the last bin.
        let mut contents = vec![0.0; 10];
        contents[9] = 5.0;
        let h = EnergyHistogram::from_contents("numu", 0.0, 10.0, contents).unwrap();
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..200 {
            assert!(h.sample(&mut rng) >= 9.0);
        }
    }

    #[test]
    fn test_missing_flavor_is_config_error() {
        let mut file = HistogramFile::default();
        file.histograms.insert(
            "numu".into(),
            EnergyHistogram::from_contents("numu", 0.0, 10.0, vec![1.0; 10]).unwrap(),
        );
        assert!(file.for_flavor(14).is_ok());
        assert!(matches!(file.for_flavor(12), Err(Error::Config(_))));
    }

    #[test]
    fn test_find_bin() {
        let h = EnergyHistogram::from_contents("nue", 0.0, 10.0, vec![1.0; 10]).unwrap();
        assert_eq!(h.find_bin(0.5), Some(0));
        assert_eq!(h.find_bin(9.99), Some(9));
        assert_eq!(h.find_bin(10.0), None);
        assert_eq!(h.find_bin(-0.1), None);
    }
}
