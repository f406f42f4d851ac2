//! Forward translation: generator record → framework-native triple.

use ng_core::types::{nucleon_mass, NUCLEON_MASS};
use ng_core::FourVector;
use ng_event::{
    CurrentKind, FluxRecord, GenEvent, GeneratorTruth, HadronCounts, InteractionMode, KineVar,
    NeutrinoEvent, NeutrinoSummary, Origin, Particle, ParticleStatus, RayGeometry, ScatteringType,
    TrajectoryPoint, TruthKinematics,
};

/// Meters per femtometer.
pub const FM_TO_M: f64 = 1e-15;
/// Centimeters per meter.
pub const M_TO_CM: f64 = 100.0;

/// Detector-frame position of a particle: the per-particle offset is in
/// femtometers relative to the nucleus center, the event vertex in
/// meters; the result is in centimeters.
fn detector_position(offset_fm: &FourVector, vertex_m: &FourVector, spill_time_ns: f64) -> FourVector {
    FourVector::new(
        M_TO_CM * (offset_fm.x * FM_TO_M + vertex_m.x),
        M_TO_CM * (offset_fm.y * FM_TO_M + vertex_m.y),
        M_TO_CM * (offset_fm.z * FM_TO_M + vertex_m.z),
        vertex_m.t * 1e9 + spill_time_ns,
    )
}

/// Interaction mode from the process predicates.
///
/// The chain is ordered: earlier predicates win when several would match
/// (MEC and Diffractive before the broad DIS/Res classes, the coherent
/// pair before both).
pub fn derive_mode(gen: &GenEvent) -> InteractionMode {
    let p = &gen.interaction.process;
    if p.is_quasi_elastic() {
        InteractionMode::QE
    } else if p.is_mec() {
        InteractionMode::MEC
    } else if p.scattering == ScatteringType::NuElectronElastic {
        InteractionMode::NuElectronElastic
    } else if p.scattering == ScatteringType::InverseMuDecay {
        InteractionMode::InverseMuDecay
    } else if p.scattering == ScatteringType::IMDAnnihilation {
        InteractionMode::IMDAnnihilation
    } else if p.scattering == ScatteringType::InverseBetaDecay {
        InteractionMode::InverseBetaDecay
    } else if p.scattering == ScatteringType::GlashowResonance {
        InteractionMode::GlashowResonance
    } else if p.scattering == ScatteringType::AMNuGamma {
        InteractionMode::AMNuGamma
    } else if p.is_coherent_elastic() {
        InteractionMode::CohElastic
    } else if p.is_coherent_production() {
        InteractionMode::Coh
    } else if p.scattering == ScatteringType::Diffractive {
        InteractionMode::Diffractive
    } else if p.is_deep_inelastic() {
        InteractionMode::DIS
    } else if p.is_resonant() {
        InteractionMode::Res
    } else if p.scattering == ScatteringType::ElectronScattering {
        InteractionMode::ElectronScattering
    } else {
        match p.interaction {
            ng_event::InteractionType::EM => InteractionMode::EM,
            ng_event::InteractionType::WeakMix => InteractionMode::WeakMix,
            _ => InteractionMode::Unknown,
        }
    }
}

/// Fill the framework-native event from a generator record.
///
/// `spill_time_ns` is the full per-event time offset (global fixed offset
/// plus the spill-time model draw).
pub fn fill_event(gen: &GenEvent, spill_time_ns: f64) -> NeutrinoEvent {
    let mut event = NeutrinoEvent::new(Origin::Beam);

    for gp in &gen.particles {
        let position = match gp.status {
            ParticleStatus::InitialState | ParticleStatus::StableFinalState => {
                detector_position(&gp.x4, &gen.vertex, spill_time_ns)
            }
            // Internal entries carry no per-particle offset worth
            // converting; pin them to the event vertex.
            _ => detector_position(&FourVector::zero(), &gen.vertex, spill_time_ns),
        };
        event.add_particle(Particle {
            track_id: 0,
            pdg: gp.pdg,
            status: gp.status,
            mother: gp.mother,
            mass: gp.p4.m(),
            trajectory: vec![TrajectoryPoint { position, momentum: gp.p4 }],
            polarization: gp.polarization,
            gen_vertex: Some(gp.x4),
            rescatter: gp.rescatter,
        });
    }

    let current = if gen.interaction.process.is_weak_nc() {
        CurrentKind::Neutral
    } else {
        CurrentKind::Charged
    };
    let mode = derive_mode(gen);

    // Experimentalist kinematics from the final-state lepton pair, not
    // the generator's selected values.
    let (q2, x, y, w) = match (gen.probe(), gen.final_lepton()) {
        (Some(probe), Some(lepton)) => {
            let k1 = probe.p4;
            let k2 = lepton.p4;
            let q = k1 - k2;
            let q2 = (-q.m2()).max(0.0);
            let y = if k1.t > 0.0 { q.t / k1.t } else { 0.0 };
            let want_hadronic = gen.interaction.initial_state.hit_nucleon.is_some()
                || gen.interaction.process.is_coherent_production()
                || gen.interaction.process.is_coherent_elastic();
            if want_hadronic {
                let m = gen
                    .interaction
                    .initial_state
                    .hit_nucleon
                    .as_ref()
                    .map(|n| nucleon_mass(n.pdg))
                    .unwrap_or(NUCLEON_MASS);
                let x = if q.t > 0.0 { q2 / (2.0 * m * q.t) } else { 0.0 };
                // For coherent production this reuses the nucleon-mass
                // expression; approximate there (physics review pending).
                let w2 = m * m + 2.0 * m * q.t - q2;
                (q2, x, y, w2.max(0.0).sqrt())
            } else {
                (q2, 0.0, y, 0.0)
            }
        }
        _ => {
            tracing::debug!("generator record lacks probe or final lepton; summary kinematics zeroed");
            (0.0, 0.0, 0.0, 0.0)
        }
    };

    let ist = &gen.interaction.initial_state;
    event.summary = Some(NeutrinoSummary {
        current,
        mode,
        reaction: mode.reaction_code(current),
        target: ist.target.pdg,
        hit_nucleon: ist.hit_nucleon.as_ref().map(|n| n.pdg).unwrap_or(0),
        hit_quark: ist.hit_quark.unwrap_or(0),
        w,
        x,
        y,
        q2,
    });
    event
}

/// Fill the generator-truth record from a generator record.
pub fn fill_truth(gen: &GenEvent) -> GeneratorTruth {
    let mut pre_fsi = HadronCounts::default();
    for gp in &gen.particles {
        if gp.status != ParticleStatus::HadronInNucleus {
            continue;
        }
        match gp.pdg {
            211 => pre_fsi.pi_plus += 1,
            -211 => pre_fsi.pi_minus += 1,
            111 => pre_fsi.pi_zero += 1,
            2212 => pre_fsi.proton += 1,
            2112 => pre_fsi.neutron += 1,
            _ => {}
        }
    }

    // Copy only the variables the generator flagged as set; everything
    // else keeps the sentinel so the reverse path can tell them apart.
    let kin = &gen.interaction.kinematics;
    let mut kinematics = TruthKinematics::default();
    if let Some(v) = kin.get(KineVar::Q2) {
        kinematics.q2 = v;
    }
    if let Some(v) = kin.get(KineVar::QSqr) {
        kinematics.q_sq = v;
    }
    if let Some(v) = kin.get(KineVar::W) {
        kinematics.w = v;
    }
    if let Some(v) = kin.get(KineVar::T) {
        kinematics.t = v;
    }
    if let Some(v) = kin.get(KineVar::X) {
        kinematics.x = v;
    }
    if let Some(v) = kin.get(KineVar::Y) {
        kinematics.y = v;
    }

    // Hadronic-system four-momentum: all stable final states except the
    // primary lepton.
    let lepton_idx = gen
        .particles
        .iter()
        .position(|p| {
            p.status == ParticleStatus::StableFinalState
                && (ng_core::types::is_neutrino(p.pdg) || ng_core::types::is_charged_lepton(p.pdg))
        })
        .unwrap_or(usize::MAX);
    let mut fs_hadronic_p4 = FourVector::zero();
    for (i, gp) in gen.particles.iter().enumerate() {
        if gp.status == ParticleStatus::StableFinalState && i != lepton_idx {
            fs_hadronic_p4 = fs_hadronic_p4 + gp.p4;
        }
    }

    let ist = &gen.interaction.initial_state;
    let excl = &gen.interaction.exclusive;
    GeneratorTruth {
        interaction_type: gen.interaction.process.interaction.id(),
        scattering_type: gen.interaction.process.scattering.id(),
        weight: gen.weight,
        probability: gen.probability,
        xsec: gen.xsec,
        diff_xsec: gen.diff_xsec,
        vertex: gen.vertex,
        pre_fsi,
        is_charm: excl.is_charm,
        resonance: excl.resonance,
        kinematics,
        fs_hadronic_p4,
        probe_pdg: ist.probe_pdg,
        probe_p4: ist.probe_p4,
        target_pdg: ist.target.pdg,
        target_z: ist.target.z,
        target_a: ist.target.a,
        is_sea_quark: ist.sea_quark,
        hit_nucleon_pdg: ist.hit_nucleon.as_ref().map(|n| n.pdg).unwrap_or(0),
        hit_nucleon_p4: ist.hit_nucleon.as_ref().map(|n| n.p4).unwrap_or_else(FourVector::zero),
    }
}

/// Fill the flux record: the driver's pass-through payload plus the
/// per-event ray geometry.
pub fn fill_flux(data: ng_event::FluxData, ray: RayGeometry) -> FluxRecord {
    FluxRecord::from_data(ray, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_event::{InteractionType, ProcessInfo};

    fn minimal_gen(scattering: ScatteringType, interaction: InteractionType) -> GenEvent {
        GenEvent {
            particles: Vec::new(),
            interaction: ng_event::Interaction {
                process: ProcessInfo::new(scattering, interaction),
                kinematics: ng_event::Kinematics::new(),
                exclusive: ng_event::ExclusiveTag::default(),
                initial_state: ng_event::InitialState {
                    probe_pdg: 14,
                    probe_p4: FourVector::zero(),
                    target: ng_event::Target { pdg: 1_000_180_400, z: 18, a: 40 },
                    hit_nucleon: None,
                    hit_quark: None,
                    sea_quark: false,
                },
            },
            weight: 1.0,
            probability: 0.1,
            xsec: 1.0,
            diff_xsec: 0.5,
            vertex: FourVector::zero(),
        }
    }

    #[test]
    fn test_mode_precedence_coherent_before_dis() {
        let coh = minimal_gen(ScatteringType::CoherentProduction, InteractionType::WeakCC);
        assert_eq!(derive_mode(&coh), InteractionMode::Coh);
        let cev = minimal_gen(ScatteringType::CoherentElastic, InteractionType::WeakNC);
        assert_eq!(derive_mode(&cev), InteractionMode::CohElastic);
        let dis = minimal_gen(ScatteringType::DeepInelastic, InteractionType::WeakCC);
        assert_eq!(derive_mode(&dis), InteractionMode::DIS);
    }

    #[test]
    fn test_current_from_nc_flag() {
        let nc = minimal_gen(ScatteringType::QuasiElastic, InteractionType::WeakNC);
        let ev = fill_event(&nc, 0.0);
        assert_eq!(ev.summary.unwrap().current, CurrentKind::Neutral);
        let cc = minimal_gen(ScatteringType::QuasiElastic, InteractionType::WeakCC);
        let ev = fill_event(&cc, 0.0);
        assert_eq!(ev.summary.unwrap().current, CurrentKind::Charged);
    }

    #[test]
    fn test_unit_conversion() {
        let offset = FourVector::new(2.0e15, 0.0, 0.0, 0.0); // 2 m in fm
        let vertex = FourVector::new(1.0, 0.0, 0.0, 0.0); // 1 m
        let p = detector_position(&offset, &vertex, 25.0);
        assert!((p.x - 300.0).abs() < 1e-9); // 3 m = 300 cm
        assert!((p.t - 25.0).abs() < 1e-12);
    }
}
