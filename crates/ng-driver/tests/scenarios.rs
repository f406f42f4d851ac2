//! End-to-end driver scenarios: function-flux spectral shape, histogram
//! POT mode rate bookkeeping, and flux-file caps flowing through the
//! driver configuration.

use approx::assert_relative_eq;
use ng_core::types::NUCLEON_MASS_KG;
use ng_driver::{DriverConfig, GeneratorDriver, KinematicsBackend};
use ng_driver::{BoundingBox, DetectorGeometry};
use ng_flux::{EnergyHistogram, HistogramFile};
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_table(dir: &Path) -> PathBuf {
    let path = dir.join("xsec.json");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"{{"channels": {{
            "cc_qe":  {{"energies": [0.1, 1.0, 10.0], "xsecs": [0.5, 1.0, 1.2]}},
            "cc_dis": {{"energies": [1.0, 5.0, 50.0], "xsecs": [0.0, 2.0, 8.0]}}
        }}}}"#
    )
    .unwrap();
    path
}

fn geometry() -> DetectorGeometry {
    DetectorGeometry {
        top_volume: "vDet".into(),
        bounds: BoundingBox { min: [-100.0, -100.0, 0.0], max: [100.0, 100.0, 200.0] },
        master_offset: [0.0; 3],
        detector_mass: 1.0,
        surrounding_mass: 0.0,
    }
}

#[test]
fn function_flux_linear_formula_tilts_the_spectrum_upward() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(dir.path());
    let cfg = DriverConfig::from_json(&format!(
        r#"{{"FluxType": "function", "FunctionalFlux": "x",
            "FunctionalBinning": 8, "FluxEmin": 1.0, "FluxEmax": 5.0,
            "GenFlavors": [14], "BeamCenter": [0.0, 0.0, -500.0],
            "EventsPerSpill": 800, "RandomSeed": 4,
            "XSecTable": "{}"}}"#,
        table.display()
    ))
    .unwrap();
    let mut driver =
        GeneratorDriver::configure(cfg, geometry(), Box::new(KinematicsBackend::new(18, 40)))
            .unwrap();

    let spill = driver.run_spill().unwrap();
    assert_eq!(spill.len(), 800);
    let mut counts = [0u32; 8];
    for (event, _, _) in &spill {
        let e = event.probe().unwrap().momentum().t;
        assert!((1.0..=5.0).contains(&e));
        let bin = (((e - 1.0) / 0.5) as usize).min(7);
        counts[bin] += 1;
    }
    // A flux density proportional to x fills the configured bins in
    // non-decreasing order; allow each adjacent pair a two-sigma
    // counting slack.
    for w in counts.windows(2) {
        let slack = 2.0 * (w[0].max(1) as f64).sqrt();
        assert!(
            w[1] as f64 >= w[0] as f64 - slack,
            "bin counts fell: {counts:?}"
        );
    }
    assert!(counts[7] > 2 * counts[0], "edge bins: {counts:?}");
}

#[test]
fn histogram_pot_mode_computes_the_expected_spill_mean() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(dir.path());

    let mut file = HistogramFile::default();
    file.histograms.insert(
        "numu".into(),
        EnergyHistogram::from_contents("numu", 0.5, 4.5, vec![2.0e17; 20]).unwrap(),
    );
    let flux_path = dir.path().join("flux_hist.json");
    file.write(&flux_path).unwrap();

    let pot = 5.0e13;
    let cfg = DriverConfig::from_json(&format!(
        r#"{{"FluxType": "histogram", "GenFlavors": [14],
            "FluxSearchPaths": "{}", "FluxFiles": ["flux_hist.json"],
            "POTPerSpill": {pot}, "DetectorMass": 1.0e-20,
            "RandomSeed": 12, "XSecTable": "{}"}}"#,
        dir.path().display(),
        table.display()
    ))
    .unwrap();
    let mut driver =
        GeneratorDriver::configure(cfg, geometry(), Box::new(KinematicsBackend::new(18, 40)))
            .unwrap();

    let total_flux = 20.0 * 2.0e17;
    assert_relative_eq!(driver.total_hist_flux(), total_flux, max_relative = 1e-12);
    let expected = total_flux * pot * 1e-38 * 1.0e-20 / NUCLEON_MASS_KG;
    let mean = driver.expected_events_per_spill().unwrap();
    assert_relative_eq!(mean, expected, max_relative = 1e-12);

    // The spill terminates on the Poisson-sampled count and folds the
    // configured POT into the exposure.
    let spill = driver.run_spill().unwrap();
    assert!(spill.len() < 10 * (expected.ceil() as usize + 1));
    assert_relative_eq!(driver.total_exposure(), pot, max_relative = 1e-12);
}

#[test]
fn flux_file_caps_flow_through_the_driver() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(dir.path());

    // Three flux files; the 1 MB cap can hold at most two.
    for (name, kb) in [("beam_a.jsonl", 500), ("beam_b.jsonl", 800), ("beam_c.jsonl", 900)] {
        let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
        // Entry lines padded to a known size via the location label.
        let entry = format!(
            r#"{{"pdg": 14, "p4": {{"x": 0.0, "y": 0.0, "z": 2.0, "t": 2.0}},
                "x4": {{"x": 0.0, "y": 0.0, "z": -1000.0, "t": 0.0}},
                "weight": 1.0, "pot": 1.0, "data": {{"NuMi": {{}}}}}}"#
        )
        .replace('\n', " ");
        let line = format!("{entry}\n");
        let repeats = kb * 1024 / line.len();
        for _ in 0..repeats {
            f.write_all(line.as_bytes()).unwrap();
        }
    }

    let cfg = DriverConfig::from_json(&format!(
        r#"{{"FluxType": "tree_numi", "GenFlavors": [14],
            "FluxSearchPaths": "{}", "FluxFiles": ["beam_*.jsonl"],
            "MaxFluxFileMB": 1, "EventsPerSpill": 2,
            "RandomSeed": 21, "XSecTable": "{}"}}"#,
        dir.path().display(),
        table.display()
    ))
    .unwrap();
    let mut driver =
        GeneratorDriver::configure(cfg, geometry(), Box::new(KinematicsBackend::new(18, 40)))
            .unwrap();

    // The capped selection still produced a usable driver; every probe
    // is the requested flavor at the recorded energy.
    let spill = driver.run_spill().unwrap();
    assert_eq!(spill.len(), 2);
    for (event, flux, _) in &spill {
        assert_eq!(event.probe().unwrap().pdg, 14);
        assert_eq!(flux.tag, ng_event::FluxKind::NuMi);
    }
    driver.teardown();
}
