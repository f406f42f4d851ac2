//! Reverse translation: persisted framework triple → generator record.
//!
//! Used by the reweighter, which needs a full generator-side event to
//! query differential cross sections under tweaked parameters.

use crate::forward::{FM_TO_M, M_TO_CM};
use ng_core::types::ion_pdg;
use ng_core::{Error, FourVector, Result};
use ng_event::{
    kine_is_set, ExclusiveTag, GenEvent, GenParticle, GeneratorTruth, HitNucleon, InitialState,
    Interaction, InteractionType, KineVar, Kinematics, NeutrinoEvent, ProcessInfo, ScatteringType,
    Target,
};

/// Placeholder probe PDG used when the persisted probe code is unusable;
/// the generator's validation accepts a photon.
const PLACEHOLDER_PROBE: i32 = 22;

/// Project a detector-frame trajectory point back to a generator-frame
/// per-particle offset (inverse of the forward conversion).
fn generator_offset(position_cm: &FourVector, vertex_m: &FourVector) -> FourVector {
    FourVector::new(
        (position_cm.x / M_TO_CM - vertex_m.x) / FM_TO_M,
        (position_cm.y / M_TO_CM - vertex_m.y) / FM_TO_M,
        (position_cm.z / M_TO_CM - vertex_m.z) / FM_TO_M,
        0.0,
    )
}

/// Reconstruct a generator record from a persisted event/truth pair.
///
/// `use_last_point` selects which trajectory point is projected back when
/// the persisted generator-frame vertex is absent; the original tooling
/// leaves the correct choice undocumented, so it stays a flag with
/// "first" as the default.
///
/// A stored `gen_vertex` of exactly zero is treated the same as an absent
/// one and goes through the trajectory projection instead. The all-zero
/// four-vector doubles as the "not recorded" marker; a legitimately zero
/// offset loses nothing, since projecting its trajectory point back
/// reproduces the zero offset.
pub fn reconstruct(
    event: &NeutrinoEvent,
    truth: &GeneratorTruth,
    use_last_point: bool,
) -> Result<GenEvent> {
    let mut particles = Vec::with_capacity(event.particles.len());
    for p in &event.particles {
        let x4 = match p.gen_vertex {
            Some(v) if !v.is_zero() => v,
            _ => {
                let point = if use_last_point { p.end() } else { p.start() };
                match point {
                    Some(tp) => generator_offset(&tp.position, &truth.vertex),
                    None => {
                        tracing::debug!(pdg = p.pdg, "particle has no trajectory; zero offset");
                        FourVector::zero()
                    }
                }
            }
        };
        let momentum = match (if use_last_point { p.end() } else { p.start() }) {
            Some(tp) => tp.momentum,
            None => FourVector::zero(),
        };
        particles.push(GenParticle {
            pdg: p.pdg,
            status: p.status,
            mother: p.mother,
            p4: momentum,
            x4,
            polarization: p.polarization,
            rescatter: p.rescatter,
        });
    }
    if particles.is_empty() {
        return Err(Error::External("cannot reconstruct a generator record with no particles".into()));
    }

    let process = ProcessInfo::new(
        ScatteringType::from_id(truth.scattering_type),
        InteractionType::from_id(truth.interaction_type),
    );

    let exclusive = ExclusiveTag {
        resonance: truth.resonance,
        n_pi_plus: truth.pre_fsi.pi_plus,
        n_pi_minus: truth.pre_fsi.pi_minus,
        n_pi_zero: truth.pre_fsi.pi_zero,
        n_proton: truth.pre_fsi.proton,
        n_neutron: truth.pre_fsi.neutron,
        is_charm: truth.is_charm,
    };

    // Only restore variables that differ from the sentinel, so the
    // container's set flags stay truthful.
    let mut kinematics = Kinematics::new();
    let k = &truth.kinematics;
    if kine_is_set(k.q2) {
        kinematics.set(KineVar::Q2, k.q2);
    }
    if kine_is_set(k.q_sq) {
        kinematics.set(KineVar::QSqr, k.q_sq);
    }
    if kine_is_set(k.w) {
        kinematics.set(KineVar::W, k.w);
    }
    if kine_is_set(k.t) {
        kinematics.set(KineVar::T, k.t);
    }
    if kine_is_set(k.x) {
        kinematics.set(KineVar::X, k.x);
    }
    if kine_is_set(k.y) {
        kinematics.set(KineVar::Y, k.y);
    }

    let target = if truth.target_z == 0 && truth.target_a == 0 {
        // Placeholder pair: a free proton satisfies target validation.
        Target { pdg: ion_pdg(1, 1), z: 1, a: 1 }
    } else {
        Target { pdg: ion_pdg(truth.target_z, truth.target_a), z: truth.target_z, a: truth.target_a }
    };

    let probe_pdg = if truth.probe_pdg == 0 || truth.probe_pdg == -1 {
        PLACEHOLDER_PROBE
    } else {
        truth.probe_pdg
    };

    let hit_nucleon = if truth.hit_nucleon_pdg != 0 {
        if truth.hit_nucleon_p4.is_zero() {
            tracing::warn!(
                pdg = truth.hit_nucleon_pdg,
                "persisted hit-nucleon code has no four-momentum; record is inconsistent"
            );
        }
        Some(HitNucleon { pdg: truth.hit_nucleon_pdg, p4: truth.hit_nucleon_p4 })
    } else {
        None
    };

    let hit_quark = event.summary.as_ref().and_then(|s| {
        if s.hit_quark != 0 {
            Some(s.hit_quark)
        } else {
            None
        }
    });

    let initial_state = InitialState {
        probe_pdg,
        probe_p4: truth.probe_p4,
        target,
        hit_nucleon,
        hit_quark,
        sea_quark: truth.is_sea_quark,
    };

    Ok(GenEvent {
        particles,
        interaction: Interaction { process, kinematics, exclusive, initial_state },
        weight: truth.weight,
        probability: truth.probability,
        xsec: truth.xsec,
        diff_xsec: truth.diff_xsec,
        vertex: truth.vertex,
    })
}
