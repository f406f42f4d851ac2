//! Driver configuration: the flat key/value map consumed by the
//! generator driver, deserialized from JSON.

use ng_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn one() -> f64 {
    1.0
}

fn direct() -> String {
    "DIRECT".into()
}

fn never() -> String {
    "NEVER".into()
}

fn default_scratch() -> PathBuf {
    std::env::temp_dir().join("nugen-flux")
}

fn beam_z() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn argon_z() -> i32 {
    18
}

fn argon_a() -> i32 {
    40
}

/// Full driver configuration. Keys follow the configuration vocabulary
/// of the producing framework, hence the field renames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DriverConfig {
    /// Flux-type string, regularized at init.
    pub flux_type: String,
    /// Colon-separated flux search path.
    #[serde(default)]
    pub flux_search_paths: String,
    /// Wildcard flux-file patterns.
    #[serde(default)]
    pub flux_files: Vec<String>,
    /// Size cap over the accepted flux files (MB); 0 disables.
    #[serde(rename = "MaxFluxFileMB", default)]
    pub max_flux_file_mb: u64,
    /// Count cap over the accepted flux files; 0 disables.
    #[serde(default)]
    pub max_flux_file_number: usize,
    /// `DIRECT` or a remote-copy scheme tag.
    #[serde(default = "direct")]
    pub flux_copy_method: String,
    /// `ALWAYS`, `NEVER`, or a scratch prefix.
    #[serde(default = "never")]
    pub flux_cleanup: String,
    /// Scratch directory for staged flux copies.
    #[serde(default = "default_scratch")]
    pub flux_scratch_dir: PathBuf,

    /// Geometry top volume name.
    #[serde(default)]
    pub top_volume: String,
    /// Beamline detector-location label.
    #[serde(default)]
    pub detector_location: String,
    /// Active detector mass (kg), for histogram POT mode.
    #[serde(default)]
    pub detector_mass: f64,
    /// Surrounding material mass (kg), for histogram POT mode.
    #[serde(default)]
    pub surrounding_mass: f64,
    /// Fiducial-cut mini-DSL string, empty for none.
    #[serde(default)]
    pub fiducial_cut: String,
    /// Geometry-scan selector: `default`, `file:`, `box:` or `flux:`.
    #[serde(default)]
    pub geom_scan: String,

    /// Accepted events per spill; exactly one of this and
    /// `POTPerSpill` must be nonzero.
    #[serde(default)]
    pub events_per_spill: u64,
    /// Protons-on-target per spill.
    #[serde(rename = "POTPerSpill", default)]
    pub pot_per_spill: f64,

    /// Mono-mode neutrino energy (GeV).
    #[serde(default)]
    pub mono_energy: f64,
    /// Function-mode analytic formula over `x`.
    #[serde(default)]
    pub functional_flux: String,
    /// Function-mode bin count.
    #[serde(default)]
    pub functional_binning: usize,
    /// Lower energy bound for function mode (GeV).
    #[serde(default)]
    pub flux_emin: f64,
    /// Upper energy bound for function mode (GeV).
    #[serde(default)]
    pub flux_emax: f64,

    /// Beam-spot center (cm, detector frame).
    #[serde(default)]
    pub beam_center: [f64; 3],
    /// Beam axis direction.
    #[serde(default = "beam_z")]
    pub beam_direction: [f64; 3],
    /// Transverse beam radius (cm).
    #[serde(default)]
    pub beam_radius: f64,
    /// Upstream z shift applied to tree-mode ray starts (cm).
    #[serde(default)]
    pub upstream_z: Option<f64>,

    /// Requested neutrino flavors, signed PDG codes.
    #[serde(default)]
    pub gen_flavors: Vec<i32>,

    /// Target nucleus charge number.
    #[serde(default = "argon_z")]
    pub target_z: i32,
    /// Target nucleus mass number.
    #[serde(default = "argon_a")]
    pub target_a: i32,

    /// Atmospheric lower energy bound (GeV).
    #[serde(default)]
    pub atmo_emin: f64,
    /// Atmospheric upper energy bound (GeV).
    #[serde(default)]
    pub atmo_emax: f64,
    /// Atmospheric longitudinal radius (cm).
    #[serde(default)]
    pub rl: f64,
    /// Atmospheric transverse radius (cm).
    #[serde(default)]
    pub rt: f64,

    /// Fixed global time offset (ns), added on top of the spill model.
    #[serde(default)]
    pub global_time_offset: f64,
    /// Legacy uniform random-offset width (ns); superseded by
    /// `SpillTimeConfig` when both are set.
    #[serde(default)]
    pub random_time_offset: f64,
    /// Spill-time model selector string, empty for the legacy keys.
    #[serde(default)]
    pub spill_time_config: String,

    /// Cross-section spline table path. Fatal at init if unresolved.
    #[serde(rename = "XSecTable", default)]
    pub xsec_table: String,
    /// Generator tune name.
    #[serde(default)]
    pub tune_name: String,
    /// Event-generator list name.
    #[serde(default)]
    pub event_generator_list: String,

    /// Explicit XML search path, first link of the priority chain.
    #[serde(rename = "GXMLPATH", default)]
    pub gxmlpath: String,
    /// Message-logger layout name.
    #[serde(rename = "GMSGLAYOUT", default)]
    pub gmsglayout: String,
    /// Message-threshold file; empty selects the production profile.
    #[serde(rename = "GENIEMsgThresholds", default)]
    pub msg_thresholds: String,
    /// Event-record print verbosity, negative disables.
    #[serde(rename = "GHepPrintLevel", default)]
    pub print_level: i32,

    /// Flavor-mixer configuration string, empty for none.
    #[serde(default)]
    pub mixer_config: String,
    /// Oscillation baseline handed to the mixer (km).
    #[serde(default = "one")]
    pub mixer_baseline: f64,

    /// Flux-frame rotation selector: `none`, `newxyz`, `3x3` or `series`.
    #[serde(default)]
    pub flux_rot_cfg: String,
    /// Rotation values for the `newxyz`/`3x3` forms.
    #[serde(default)]
    pub flux_rot_values: Vec<f64>,

    /// Private RNG seed; absent draws system entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Diagnostic-print bit mask.
    #[serde(default)]
    pub debug_flags: u32,
}

/// Diagnostic-print bits of `DebugFlags`.
pub mod debug {
    /// Print each sampled flux ray.
    pub const RAY: u32 = 1 << 0;
    /// Print each produced generator record.
    pub const EVENT: u32 = 1 << 1;
    /// Print per-spill exposure bookkeeping.
    pub const EXPOSURE: u32 = 1 << 2;
}

impl DriverConfig {
    /// Load a configuration from a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: DriverConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the cross-field constraints that the flat map cannot
    /// express.
    pub fn validate(&self) -> Result<()> {
        if self.gen_flavors.is_empty() {
            return Err(Error::Config("GenFlavors must not be empty".into()));
        }
        let events = self.events_per_spill != 0;
        let pot = self.pot_per_spill != 0.0;
        if events == pot {
            return Err(Error::Config(
                "exactly one of EventsPerSpill and POTPerSpill must be nonzero".into(),
            ));
        }
        if self.pot_per_spill < 0.0 {
            return Err(Error::Config("POTPerSpill must be >= 0".into()));
        }
        if self.target_z < 1 || self.target_a < self.target_z {
            return Err(Error::Config(format!(
                "target nuclide (Z={}, A={}) is unphysical",
                self.target_z, self.target_a
            )));
        }
        Ok(())
    }

    /// The private RNG seed: the configured one, or system entropy
    /// reduced modulo 9e8 to stay within the legacy seed range.
    pub fn seed(&self) -> u64 {
        match self.random_seed {
            Some(s) => s,
            None => rand::random::<u64>() % 900_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(extra: &str) -> String {
        format!(
            r#"{{"FluxType": "mono", "MonoEnergy": 2.0, "GenFlavors": [14],
                "EventsPerSpill": 1{extra}}}"#
        )
    }

    #[test]
    fn test_minimal_config_parses() {
        let cfg = DriverConfig::from_json(&minimal("")).unwrap();
        assert_eq!(cfg.flux_type, "mono");
        assert_eq!(cfg.gen_flavors, vec![14]);
        assert_eq!(cfg.beam_direction, [0.0, 0.0, 1.0]);
        assert_eq!(cfg.flux_copy_method, "DIRECT");
    }

    #[test]
    fn test_both_termination_modes_rejected() {
        let err = DriverConfig::from_json(&minimal(r#", "POTPerSpill": 5e13"#));
        assert!(err.is_err());
    }

    #[test]
    fn test_neither_termination_mode_rejected() {
        let text = r#"{"FluxType": "mono", "GenFlavors": [14]}"#;
        assert!(DriverConfig::from_json(text).is_err());
    }

    #[test]
    fn test_empty_flavor_list_rejected() {
        let text = r#"{"FluxType": "mono", "GenFlavors": [], "EventsPerSpill": 1}"#;
        assert!(DriverConfig::from_json(text).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = DriverConfig::from_json(&minimal(r#", "FluxTipe": "mono""#));
        assert!(err.is_err());
    }

    #[test]
    fn test_target_nuclide_defaults_to_argon_and_is_overridable() {
        let cfg = DriverConfig::from_json(&minimal("")).unwrap();
        assert_eq!((cfg.target_z, cfg.target_a), (18, 40));
        let cfg =
            DriverConfig::from_json(&minimal(r#", "TargetZ": 26, "TargetA": 56"#)).unwrap();
        assert_eq!((cfg.target_z, cfg.target_a), (26, 56));
        assert!(DriverConfig::from_json(&minimal(r#", "TargetZ": 26, "TargetA": 12"#)).is_err());
    }

    #[test]
    fn test_seed_defaults_into_legacy_range() {
        let cfg = DriverConfig::from_json(&minimal("")).unwrap();
        assert!(cfg.seed() < 900_000_000);
        let cfg = DriverConfig::from_json(&minimal(r#", "RandomSeed": 42"#)).unwrap();
        assert_eq!(cfg.seed(), 42);
    }
}
