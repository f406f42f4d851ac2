//! The generator driver: ordered initialization, the spill-by-spill
//! sample loop, and exposure accounting.
//!
//! Initialization is a single idempotent phase; every step that touches
//! process-wide state happens here, in a fixed order, and nothing may
//! reconfigure afterwards. All randomness flows through the private
//! `StdRng` owned by the driver.

use crate::backend::{resolve_xml_path, BackendConfig, GeneratorBackend};
use crate::config::{debug, DriverConfig};
use crate::fluxtype::{regularize, FluxTag};
use crate::geometry::{DetectorGeometry, FiducialCut, GeomScan};
use ng_core::types::NUCLEON_MASS_KG;
use ng_core::{Error, FourVector, Result};
use ng_event::{FluxRecord, GeneratorTruth, NeutrinoEvent, RayGeometry};
use ng_flux::{
    spill_from_config, BeamGeometry, Cleanup, CopyMethod, FlavorMixerFactory, FluxBlender,
    FluxDriver, FluxFileResolver, FluxRotation, Formula, HistogramFlux, MonoFlux, ResolvedFlux,
    ResolverConfig, SpillTime, TreeFlux,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use tracing::{debug as trace_debug, info, warn};

/// Fallback XML search path when neither the configuration nor the
/// environment supplies one.
pub const FRAMEWORK_XML_PATH: &str = "/usr/share/nugen/config";

/// Vertex-placement attempts per sample before the trial counts as
/// transient.
const MAX_VERTEX_TRIES: u32 = 1000;

/// One produced interaction: the persisted triple.
pub type SampledEvent = (NeutrinoEvent, FluxRecord, GeneratorTruth);

/// The driver. Owns the flux driver, the generator backend, the private
/// RNG and the exposure bookkeeping.
pub struct GeneratorDriver {
    cfg: DriverConfig,
    tag: FluxTag,
    geometry: DetectorGeometry,
    fiducial: Option<FiducialCut>,
    scan: GeomScan,
    flux: Box<dyn FluxDriver>,
    backend: Box<dyn GeneratorBackend>,
    spill_model: Box<dyn SpillTime>,
    rng: StdRng,
    resolved: Option<ResolvedFlux>,
    total_hist_flux: f64,
    hist_spill_mean: Option<f64>,
    spill_target: Option<u64>,
    spill_events: u64,
    total_exposure: f64,
    atmo_rt: Option<f64>,
}

impl GeneratorDriver {
    /// Run the ordered initialization protocol.
    ///
    /// `backend` arrives unconfigured; the driver applies the
    /// process-wide configuration exactly once, in the mandated order.
    pub fn configure(
        cfg: DriverConfig,
        geometry: DetectorGeometry,
        mut backend: Box<dyn GeneratorBackend>,
    ) -> Result<Self> {
        cfg.validate()?;

        // 1. Private uniform random source.
        let seed = cfg.seed();
        let mut rng = StdRng::seed_from_u64(seed);
        info!(seed, "driver RNG seeded");

        // 2. Regularize the flux type.
        let tag = regularize(&cfg.flux_type)?;
        info!(flux_type = tag.as_str(), "flux type regularized");

        // 3. Resolve flux files and build the flux rotation.
        let resolver = FluxFileResolver::new(ResolverConfig {
            search_paths: cfg.flux_search_paths.clone(),
            patterns: cfg.flux_files.clone(),
            max_mb: cfg.max_flux_file_mb,
            max_files: cfg.max_flux_file_number,
            copy_method: CopyMethod::parse(&cfg.flux_copy_method),
            cleanup: Cleanup::parse(&cfg.flux_cleanup),
            scratch_dir: cfg.flux_scratch_dir.clone(),
        });
        let resolved = if tag.is_tree() {
            Some(resolver.resolve_randomized(&mut rng, None)?)
        } else if !cfg.flux_files.is_empty() {
            Some(resolver.resolve_ordered()?)
        } else {
            None
        };
        let rotation = FluxRotation::from_config(&cfg.flux_rot_cfg, &cfg.flux_rot_values)?;

        // 4. XML search path priority chain; the environment is only
        // read, never written.
        let xml_path = resolve_xml_path(&cfg.gxmlpath, FRAMEWORK_XML_PATH);
        info!(xml_path = xml_path.as_str(), "XML search path resolved");

        // 5-7. Logger layout and thresholds, print verbosity, backend
        // seed. Gathered ahead of the backend construction so the
        // layout precedes the logger and the seed precedes first use.
        let backend_cfg = BackendConfig {
            xml_path,
            msg_layout: cfg.gmsglayout.clone(),
            msg_thresholds: cfg.msg_thresholds.clone(),
            print_level: cfg.print_level,
            tune: cfg.tune_name.clone(),
            generator_list: cfg.event_generator_list.clone(),
            xsec_table: cfg.xsec_table.clone().into(),
            seed,
        };

        // 8. Atmospheric pre-checks.
        if tag.is_atmo() {
            let n_files = resolved.as_ref().map(|r| r.files.len()).unwrap_or(0);
            if n_files != cfg.gen_flavors.len() {
                return Err(Error::Config(format!(
                    "atmospheric mode needs one file per flavor: {} flavors, {n_files} files",
                    cfg.gen_flavors.len()
                )));
            }
            if cfg.events_per_spill != 1 {
                return Err(Error::Config(
                    "atmospheric mode requires EventsPerSpill = 1".into(),
                ));
            }
        }

        // 9. Histogram pre-checks: every requested flavor must resolve
        // to a named histogram; their integrals sum to totalHistFlux.
        let mut total_hist_flux = 0.0;
        if tag == FluxTag::Histogram {
            let paths = resolved.as_ref().map(|r| r.paths()).unwrap_or_default();
            let path = paths
                .first()
                .ok_or_else(|| Error::Resource("histogram mode resolved no flux file".into()))?;
            let file = ng_flux::HistogramFile::open(path)?;
            for &pdg in &cfg.gen_flavors {
                total_hist_flux += file.for_flavor(pdg)?.integral();
            }
            info!(total_hist_flux, "histogram flux associated");
        }

        // 10. Configure the backend: generator list, tune, spline
        // table. An unresolvable table aborts here.
        backend.configure(&backend_cfg)?;

        // 11. Geometry: top volume plus optional fiducial selector.
        let fiducial = if cfg.fiducial_cut.trim().is_empty() {
            None
        } else {
            Some(FiducialCut::parse(&cfg.fiducial_cut)?)
        };
        info!(
            top_volume = geometry.top_volume.as_str(),
            fiducial = fiducial.is_some(),
            "geometry selected"
        );

        // 12. Flux driver, optionally wrapped by a flavor mixer.
        let mut flux = Self::build_flux(&cfg, tag, resolved.as_ref(), rotation)?;
        if !cfg.mixer_config.trim().is_empty() {
            let factory = FlavorMixerFactory::new();
            let mixer = factory.build(&cfg.mixer_config)?;
            flux = Box::new(FluxBlender::new(flux, mixer, cfg.mixer_baseline));
            info!(baseline = cfg.mixer_baseline, "flavor mixer attached");
        }
        let atmo_rt = if tag.is_atmo() { Some(cfg.rt) } else { None };

        // 13. Geometry scan.
        let scan = GeomScan::parse(&cfg.geom_scan)?;
        trace_debug!(?scan, "geometry scan configured");

        // 14. Spill-time model; the fixed global offset is added on top
        // per sample.
        let spill_model = if !cfg.spill_time_config.trim().is_empty() {
            spill_from_config(&cfg.spill_time_config)?
        } else if cfg.random_time_offset > 0.0 {
            spill_from_config(&format!("uniform: {}", cfg.random_time_offset))?
        } else {
            spill_from_config("none")?
        };

        // 15. Expected events per spill for histogram POT mode.
        let hist_spill_mean = if tag == FluxTag::Histogram && cfg.pot_per_spill > 0.0 {
            let mass = cfg.detector_mass + cfg.surrounding_mass;
            let mean = total_hist_flux * cfg.pot_per_spill * 1e-38 * mass / NUCLEON_MASS_KG;
            info!(mean, "expected events per spill");
            Some(mean)
        } else {
            None
        };

        Ok(Self {
            cfg,
            tag,
            geometry,
            fiducial,
            scan,
            flux,
            backend,
            spill_model,
            rng,
            resolved,
            total_hist_flux,
            hist_spill_mean,
            spill_target: None,
            spill_events: 0,
            total_exposure: 0.0,
            atmo_rt,
        })
    }

    fn build_flux(
        cfg: &DriverConfig,
        tag: FluxTag,
        resolved: Option<&ResolvedFlux>,
        rotation: Option<FluxRotation>,
    ) -> Result<Box<dyn FluxDriver>> {
        let paths = resolved.map(|r| r.paths()).unwrap_or_default();
        let beam = BeamGeometry {
            direction: cfg.beam_direction,
            center: cfg.beam_center,
            radius: cfg.beam_radius,
        };
        Ok(match tag {
            FluxTag::TreeNuMi | FluxTag::TreeSimple | FluxTag::TreeDk2nu => Box::new(
                TreeFlux::load(
                    tag.flux_kind(),
                    &paths,
                    &cfg.detector_location,
                    &cfg.gen_flavors,
                    cfg.upstream_z,
                )?,
            ),
            FluxTag::Histogram => {
                let path = paths.first().ok_or_else(|| {
                    Error::Resource("histogram mode resolved no flux file".into())
                })?;
                Box::new(HistogramFlux::from_file(path, &cfg.gen_flavors, beam)?)
            }
            FluxTag::Mono => Box::new(MonoFlux::new(
                cfg.gen_flavors.clone(),
                cfg.mono_energy,
                cfg.beam_center,
                cfg.beam_direction,
            )?),
            FluxTag::Function => {
                let formula = Formula::compile(&cfg.functional_flux)?;
                Box::new(HistogramFlux::from_formula(
                    &formula,
                    cfg.flux_emin,
                    cfg.flux_emax,
                    cfg.functional_binning,
                    &cfg.gen_flavors,
                    beam,
                )?)
            }
            FluxTag::AtmoFluka | FluxTag::AtmoBglrs | FluxTag::AtmoHakkm => Box::new(
                ng_flux::AtmoFlux::load(
                    &cfg.gen_flavors,
                    &paths,
                    cfg.atmo_emin,
                    cfg.atmo_emax,
                    cfg.rl,
                    cfg.rt,
                    rotation,
                )?,
            ),
        })
    }

    /// The normalized flux tag.
    pub fn flux_tag(&self) -> FluxTag {
        self.tag
    }

    /// The configured geometry scan.
    pub fn geom_scan(&self) -> &GeomScan {
        &self.scan
    }

    /// Sum of histogram integrals over the attached flavors.
    pub fn total_hist_flux(&self) -> f64 {
        self.total_hist_flux
    }

    /// Poisson mean of the per-spill event count in histogram POT mode.
    pub fn expected_events_per_spill(&self) -> Option<f64> {
        self.hist_spill_mean
    }

    fn sample_vertex(&mut self) -> Option<[f64; 3]> {
        let b = self.geometry.bounds;
        for _ in 0..MAX_VERTEX_TRIES {
            let v = [
                b.min[0] + (b.max[0] - b.min[0]) * self.rng.gen::<f64>(),
                b.min[1] + (b.max[1] - b.min[1]) * self.rng.gen::<f64>(),
                b.min[2] + (b.max[2] - b.min[2]) * self.rng.gen::<f64>(),
            ];
            match &self.fiducial {
                Some(cut) if !cut.accepts(v, &self.geometry) => continue,
                _ => return Some(v),
            }
        }
        None
    }

    /// Exposure consumed by the current spill so far: POT for beam
    /// modes, seconds for atmospheric modes.
    pub fn spill_exposure(&self) -> f64 {
        if let Some(rt) = self.atmo_rt {
            let live = (self.flux.n_flown() as f64 * 1e4) / (std::f64::consts::PI * rt * rt);
            return live - self.total_exposure;
        }
        if self.hist_spill_mean.is_some() {
            return self.cfg.pot_per_spill;
        }
        self.flux.used_pot() / self.backend.probability_scale() - self.total_exposure
    }

    /// Exposure accumulated over completed spills.
    pub fn total_exposure(&self) -> f64 {
        self.total_exposure
    }

    /// True when the spill termination predicate fires. Firing resets
    /// the per-spill counters and folds the spill into the total
    /// exposure.
    pub fn stop(&mut self) -> bool {
        let done = if self.cfg.events_per_spill != 0 {
            self.spill_events >= self.cfg.events_per_spill
        } else if let Some(mean) = self.hist_spill_mean {
            // Histogram POT mode: a Poisson count around the expected
            // mean, then the count-based rule.
            let target = *self.spill_target.get_or_insert_with(|| {
                if mean <= 0.0 {
                    return 0;
                }
                match Poisson::new(mean) {
                    Ok(p) => p.sample(&mut self.rng) as u64,
                    Err(_) => 0,
                }
            });
            self.spill_events >= target
        } else {
            self.spill_exposure() >= self.cfg.pot_per_spill
        };
        if done {
            let spill = self.spill_exposure();
            self.total_exposure += spill;
            if self.cfg.debug_flags & debug::EXPOSURE != 0 {
                info!(
                    spill_exposure = spill,
                    total_exposure = self.total_exposure,
                    n_events = self.spill_events,
                    "spill complete"
                );
            }
            self.spill_events = 0;
            self.spill_target = None;
        }
        done
    }

    /// Run one generator trial. `Ok(None)` is the transient no-event
    /// outcome; the spill loop retries.
    pub fn sample(&mut self) -> Result<Option<SampledEvent>> {
        let Some(ray) = self.flux.generate_ray(&mut self.rng)? else {
            return Ok(None);
        };
        if self.cfg.debug_flags & debug::RAY != 0 {
            trace_debug!(pdg = ray.pdg, energy = ray.p4.t, "flux ray");
        }

        let Some(vertex_cm) = self.sample_vertex() else {
            warn!("no fiducial vertex found; treating trial as transient");
            return Ok(None);
        };
        let vertex_m = FourVector::new(
            vertex_cm[0] / 100.0,
            vertex_cm[1] / 100.0,
            vertex_cm[2] / 100.0,
            0.0,
        );

        let Some(gen) = self.backend.generate(&ray, vertex_m, &mut self.rng)? else {
            return Ok(None);
        };
        if self.cfg.debug_flags & debug::EVENT != 0 {
            trace_debug!(
                n_particles = gen.particles.len(),
                xsec = gen.xsec,
                "generator record"
            );
        }

        let offset = self.cfg.global_time_offset + self.spill_model.next_offset(&mut self.rng);
        let event = ng_translate::fill_event(&gen, offset);
        let truth = ng_translate::fill_truth(&gen);

        let origin = ray.x4.spatial();
        let gen2vtx = ((vertex_cm[0] - origin[0]).powi(2)
            + (vertex_cm[1] - origin[1]).powi(2)
            + (vertex_cm[2] - origin[2]).powi(2))
        .sqrt();
        let flux_record = ng_translate::fill_flux(
            ray.data,
            RayGeometry { ray_origin: origin, vertex: vertex_cm, dk2gen: ray.dk2gen, gen2vtx },
        );

        self.spill_events += 1;
        Ok(Some((event, flux_record, truth)))
    }

    /// Produce one full spill: sample until the termination predicate
    /// fires, then return the accepted triples in production order.
    pub fn run_spill(&mut self) -> Result<Vec<SampledEvent>> {
        let mut out = Vec::new();
        while !self.stop() {
            if let Some(triple) = self.sample()? {
                out.push(triple);
            }
        }
        Ok(out)
    }

    /// Release staged flux files per the cleanup policy.
    pub fn teardown(&mut self) {
        if let Some(resolved) = &mut self.resolved {
            resolved.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KinematicsBackend;
    use crate::geometry::BoundingBox;
    use approx::assert_relative_eq;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn write_table(dir: &Path) -> PathBuf {
        let path = dir.join("xsec.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"channels": {{
                "cc_qe":  {{"energies": [0.1, 1.0, 10.0], "xsecs": [0.5, 1.0, 1.2]}},
                "cc_res": {{"energies": [0.5, 2.0, 10.0], "xsecs": [0.0, 0.8, 1.0]}}
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

    fn mono_config(table: &Path) -> DriverConfig {
        DriverConfig::from_json(&format!(
            r#"{{"FluxType": "mono", "MonoEnergy": 2.0, "GenFlavors": [14],
                "BeamCenter": [0.0, 0.0, -1000.0], "BeamDirection": [0.0, 0.0, 1.0],
                "EventsPerSpill": 3, "RandomSeed": 99,
                "XSecTable": "{}"}}"#,
            table.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_mono_spill_produces_requested_flavor_and_energy() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let driver = GeneratorDriver::configure(
            mono_config(&table),
            geometry(),
            Box::new(KinematicsBackend::new(18, 40)),
        );
        let mut driver = driver.unwrap();

        let spill = driver.run_spill().unwrap();
        assert_eq!(spill.len(), 3);
        for (event, flux, truth) in &spill {
            let probe = event.probe().expect("initial-state neutrino");
            assert_eq!(probe.pdg, 14);
            let p4 = probe.momentum();
            assert_relative_eq!(p4.t, 2.0, epsilon = 1e-12);
            let dir = p4.direction();
            assert_relative_eq!(dir[2], 1.0, epsilon = 1e-9);
            assert_eq!(flux.tag, ng_event::FluxKind::Simple);
            assert!(truth.probability > 0.0);
        }
        // Counters reset at the spill boundary.
        assert!(driver.total_exposure() > 0.0);
        let next = driver.run_spill().unwrap();
        assert_eq!(next.len(), 3);
    }

    #[test]
    fn test_triple_parity_over_spills() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let mut driver = GeneratorDriver::configure(
            mono_config(&table),
            geometry(),
            Box::new(KinematicsBackend::new(18, 40)),
        )
        .unwrap();
        let spill = driver.run_spill().unwrap();
        // One NeutrinoEvent, one FluxRecord, one GeneratorTruth per
        // accepted sample, associated by position.
        assert!(spill.iter().all(|(e, f, _)| {
            e.summary.is_some() && f.ray.vertex.iter().all(|c| c.is_finite())
        }));
    }

    #[test]
    fn test_fiducial_box_cut_constrains_vertices() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let mut cfg = mono_config(&table);
        cfg.fiducial_cut = "box:-50,-50,50,50,50,150".into();
        let mut driver = GeneratorDriver::configure(
            cfg,
            geometry(),
            Box::new(KinematicsBackend::new(18, 40)),
        )
        .unwrap();
        for (_, flux, _) in driver.run_spill().unwrap() {
            let v = flux.ray.vertex;
            assert!(v[0] >= -50.0 && v[0] <= 50.0);
            assert!(v[1] >= -50.0 && v[1] <= 50.0);
            assert!(v[2] >= 50.0 && v[2] <= 150.0);
        }
    }

    #[test]
    fn test_reverse_fiducial_box_excludes_vertices() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let mut cfg = mono_config(&table);
        cfg.fiducial_cut = "0box:-50,-50,50,50,50,150".into();
        let mut driver = GeneratorDriver::configure(
            cfg,
            geometry(),
            Box::new(KinematicsBackend::new(18, 40)),
        )
        .unwrap();
        for (_, flux, _) in driver.run_spill().unwrap() {
            let v = flux.ray.vertex;
            let inside = v[0] >= -50.0
                && v[0] <= 50.0
                && v[1] >= -50.0
                && v[1] <= 50.0
                && v[2] >= 50.0
                && v[2] <= 150.0;
            assert!(!inside);
        }
    }

    #[test]
    fn test_reproducible_from_seed() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let run = || {
            let mut driver = GeneratorDriver::configure(
                mono_config(&table),
                geometry(),
                Box::new(KinematicsBackend::new(18, 40)),
            )
            .unwrap();
            driver.run_spill().unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.len(), b.len());
        for ((ea, _, ta), (eb, _, tb)) in a.iter().zip(&b) {
            assert_eq!(ea, eb);
            assert_eq!(ta, tb);
        }
    }

    #[test]
    fn test_tree_mode_fails_on_empty_file_list() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let cfg = DriverConfig::from_json(&format!(
            r#"{{"FluxType": "tree_numi", "GenFlavors": [14], "EventsPerSpill": 1,
                "FluxSearchPaths": "{}", "FluxFiles": ["nothing_*.json"],
                "XSecTable": "{}"}}"#,
            dir.path().display(),
            table.display()
        ))
        .unwrap();
        let err = GeneratorDriver::configure(
            cfg,
            geometry(),
            Box::new(KinematicsBackend::new(18, 40)),
        );
        assert!(matches!(err, Err(Error::Resource(_))));
    }

    #[test]
    fn test_atmo_flavor_file_parity_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());
        let cfg = DriverConfig::from_json(&format!(
            r#"{{"FluxType": "atmo_HAKKM", "GenFlavors": [14, -14], "EventsPerSpill": 1,
                "AtmoEmin": 0.1, "AtmoEmax": 10.0, "Rl": 1.0e5, "Rt": 1.0e5,
                "XSecTable": "{}"}}"#,
            table.display()
        ))
        .unwrap();
        let err = GeneratorDriver::configure(
            cfg,
            geometry(),
            Box::new(KinematicsBackend::new(18, 40)),
        );
        assert!(err.is_err());
    }
}
