//! Fault faces and the fault interface that resolves them.
//!
//! A [`FaultFace`] is the run-time state of one fault face: friction law
//! and state, resolved traction, slip, and receiver quantities. The
//! [`FaultInterface`] turns the traces of the abutting elements into a
//! trial traction, delegates to the face's friction law, and integrates
//! slip over the time elapsed since the previous resolution.

use rupture_core::{FaceTrace, FaultId, FaultLink, FrictionSolveError, Traction};
use rupture_friction::{
    FrictionInput, FrictionLaw, FrictionState, NucleationPatch, SolverSettings,
};

use crate::config::SlipIntegration;

/// Setup description of one fault face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultSpec {
    /// The abutting elements.
    pub link: FaultLink,
    /// Face centroid, tested against nucleation regions.
    pub centroid: [f64; 3],
    /// Friction law and parameters.
    pub friction: FrictionLaw,
    /// Background (initial) traction; normal is compression positive.
    pub background: Traction,
}

/// Run-time state of one fault face.
#[derive(Clone, Debug)]
pub struct FaultFace {
    id: FaultId,
    link: FaultLink,
    centroid: [f64; 3],
    friction: FrictionLaw,
    background: Traction,
    state: FrictionState,
    traction: Traction,
    slip: f64,
    slip_rate: f64,
    peak_slip_rate: f64,
    rupture_time: Option<f64>,
    pub(crate) last_resolved_ticks: u64,
}

impl FaultFace {
    /// Build a face, applying every nucleation patch that covers its
    /// centroid in order.
    pub fn new(id: FaultId, spec: &FaultSpec, patches: &[NucleationPatch]) -> Self {
        let mut friction = spec.friction.clone();
        let mut background = spec.background;
        for patch in patches.iter().filter(|p| p.contains(spec.centroid)) {
            friction = patch.apply(&friction);
            background.shear += patch.shear_stress_perturbation;
        }
        let state = friction.initial_state();
        Self {
            id,
            link: spec.link,
            centroid: spec.centroid,
            friction,
            background,
            state,
            traction: background,
            slip: 0.0,
            slip_rate: 0.0,
            peak_slip_rate: 0.0,
            rupture_time: None,
            last_resolved_ticks: 0,
        }
    }

    /// Face ID.
    pub fn id(&self) -> FaultId {
        self.id
    }

    /// Abutting elements.
    pub fn link(&self) -> &FaultLink {
        &self.link
    }

    /// Face centroid.
    pub fn centroid(&self) -> [f64; 3] {
        self.centroid
    }

    /// Friction law after nucleation overrides.
    pub fn friction(&self) -> &FrictionLaw {
        &self.friction
    }

    /// Background traction after nucleation overrides.
    pub fn background(&self) -> Traction {
        self.background
    }

    /// Friction state (path length and `θ`).
    pub fn friction_state(&self) -> &FrictionState {
        &self.state
    }

    /// Traction resolved at the last synchronization.
    pub fn traction(&self) -> Traction {
        self.traction
    }

    /// Resolved traction relative to the background, as fed to the
    /// kernel.
    pub fn traction_change(&self) -> Traction {
        Traction {
            shear: self.traction.shear - self.background.shear,
            normal: self.traction.normal - self.background.normal,
        }
    }

    /// Signed slip.
    pub fn slip(&self) -> f64 {
        self.slip
    }

    /// Slip rate at the last synchronization.
    pub fn slip_rate(&self) -> f64 {
        self.slip_rate
    }

    /// Largest `|V|` seen so far.
    pub fn peak_slip_rate(&self) -> f64 {
        self.peak_slip_rate
    }

    /// First time `|V|` reached the rupture threshold.
    pub fn rupture_time(&self) -> Option<f64> {
        self.rupture_time
    }
}

/// Outcome of one face resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    /// Traction now stored on the face.
    pub traction: Traction,
    /// Slip rate now stored on the face.
    pub slip_rate: f64,
    /// The friction solve needed its relaxed retry.
    pub retried: bool,
}

/// Trial traction and combined impedance of a face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialTraction {
    /// Traction the face carries if it does not slip.
    pub traction: Traction,
    /// `η`, linking traction drop to slip rate.
    pub impedance: f64,
}

/// Elastic trial traction from the traces on either side.
///
/// `plus == None` is a one-sided face against a rigid boundary, the
/// `Z⁺ → ∞` limit: `η = Z⁻`, `τ_trial = τ₀ + σ⁻ − Z⁻v⁻`.
pub fn trial_traction(
    background: Traction,
    minus: &FaceTrace,
    plus: Option<&FaceTrace>,
) -> TrialTraction {
    match plus {
        Some(plus) => {
            let (zm, zp) = (minus.impedance, plus.impedance);
            let eta = zm * zp / (zm + zp);
            let shear = background.shear
                + eta * (minus.shear_stress / zm + plus.shear_stress / zp)
                + eta * (plus.velocity - minus.velocity);
            let normal_change = eta * (minus.normal_stress / zm + plus.normal_stress / zp);
            TrialTraction {
                traction: Traction {
                    shear,
                    normal: background.normal - normal_change,
                },
                impedance: eta,
            }
        }
        None => TrialTraction {
            traction: Traction {
                shear: background.shear + minus.shear_stress - minus.impedance * minus.velocity,
                normal: background.normal - minus.normal_stress,
            },
            impedance: minus.impedance,
        },
    }
}

/// Resolves fault faces at cluster synchronization points.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultInterface {
    solver: SolverSettings,
    integration: SlipIntegration,
    rupture_threshold: f64,
}

impl FaultInterface {
    /// Create an interface with the given settings.
    pub fn new(
        solver: SolverSettings,
        integration: SlipIntegration,
        rupture_threshold: f64,
    ) -> Self {
        Self {
            solver,
            integration,
            rupture_threshold,
        }
    }

    /// Resolve `face` at time `t`, `dt` after its previous resolution.
    ///
    /// On success the face's traction, slip rate, slip, friction state
    /// and receiver quantities are updated. On failure the face is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// [`FrictionSolveError`] when the friction law fails to converge
    /// even with the relaxed tolerance.
    pub fn resolve_face(
        &self,
        face: &mut FaultFace,
        t: f64,
        dt: f64,
        minus: &FaceTrace,
        plus: Option<&FaceTrace>,
    ) -> Result<Resolution, FrictionSolveError> {
        let trial = trial_traction(face.background, minus, plus);
        let input = FrictionInput {
            normal_stress: trial.traction.normal,
            trial_shear_stress: trial.traction.shear,
            slip_rate_prev: face.slip_rate,
            dt,
            impedance: trial.impedance,
        };
        let update = face
            .friction
            .update(&face.state, &input, &self.solver)
            .map_err(|failure| FrictionSolveError {
                fault: face.id,
                time: t,
                iterations: failure.iterations,
                residual: failure.residual,
                tolerance: failure.tolerance,
            })?;

        let v_prev = face.slip_rate;
        let v_new = update.output.slip_rate;
        let (slip_increment, path_increment) = match self.integration {
            SlipIntegration::Forward => (v_new * dt, v_new.abs() * dt),
            SlipIntegration::Trapezoidal => (
                0.5 * (v_prev + v_new) * dt,
                0.5 * (v_prev.abs() + v_new.abs()) * dt,
            ),
        };

        face.state = update.state;
        face.state.accumulated_slip += path_increment;
        face.slip += slip_increment;
        face.slip_rate = v_new;
        face.traction = Traction {
            shear: update.output.shear_stress,
            normal: trial.traction.normal,
        };
        face.peak_slip_rate = face.peak_slip_rate.max(v_new.abs());
        if face.rupture_time.is_none() && v_new.abs() >= self.rupture_threshold {
            face.rupture_time = Some(t);
        }

        Ok(Resolution {
            traction: face.traction,
            slip_rate: v_new,
            retried: update.retried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupture_core::FaceRef;
    use rupture_friction::{LinearSlipWeakening, RateAndState, Region};

    const Z: f64 = 2.0e6;

    fn spec(friction: FrictionLaw) -> FaultSpec {
        FaultSpec {
            link: FaultLink {
                minus: FaceRef::new(0, 1),
                plus: Some(FaceRef::new(1, 0)),
            },
            centroid: [0.0; 3],
            friction,
            background: Traction {
                shear: 70.0e6,
                normal: 120.0e6,
            },
        }
    }

    fn lsw() -> FrictionLaw {
        LinearSlipWeakening::builder()
            .static_friction(0.677)
            .dynamic_friction(0.525)
            .critical_slip(0.4)
            .build()
            .unwrap()
            .into()
    }

    fn trace(velocity: f64, shear: f64) -> FaceTrace {
        FaceTrace {
            velocity,
            shear_stress: shear,
            normal_stress: 0.0,
            impedance: Z,
        }
    }

    fn interface(integration: SlipIntegration) -> FaultInterface {
        FaultInterface::new(SolverSettings::default(), integration, 1e-3)
    }

    #[test]
    fn trial_traction_two_sided_averages_with_velocity_jump() {
        let t = trial_traction(
            Traction {
                shear: 1.0,
                normal: 10.0,
            },
            &trace(0.0, 2.0),
            Some(&trace(1.0, 4.0)),
        );
        assert_eq!(t.impedance, Z / 2.0);
        // τ₀ + (σ⁻ + σ⁺)/2 + Z/2 · Δv
        assert!((t.traction.shear - (1.0 + 3.0 + Z / 2.0)).abs() < 1e-6);
        assert_eq!(t.traction.normal, 10.0);
    }

    #[test]
    fn tensile_normal_trace_reduces_compression() {
        let mut m = trace(0.0, 0.0);
        m.normal_stress = 4.0;
        let mut p = trace(0.0, 0.0);
        p.normal_stress = 4.0;
        let t = trial_traction(
            Traction {
                shear: 0.0,
                normal: 10.0,
            },
            &m,
            Some(&p),
        );
        assert!((t.traction.normal - 6.0).abs() < 1e-12);
    }

    #[test]
    fn one_sided_face_uses_minus_impedance() {
        let t = trial_traction(Traction::default(), &trace(0.5, 3.0), None);
        assert_eq!(t.impedance, Z);
        assert!((t.traction.shear - (3.0 - Z * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn locked_face_carries_trial_traction() {
        let mut face = FaultFace::new(FaultId(0), &spec(lsw()), &[]);
        let iface = interface(SlipIntegration::Trapezoidal);
        let r = iface
            .resolve_face(&mut face, 0.1, 0.1, &trace(0.0, 0.0), Some(&trace(0.0, 0.0)))
            .unwrap();
        assert_eq!(r.slip_rate, 0.0);
        assert_eq!(r.traction.shear, 70.0e6);
        assert_eq!(face.traction_change(), Traction::default());
        assert_eq!(face.rupture_time(), None);
    }

    #[test]
    fn sliding_face_integrates_slip_and_records_rupture() {
        let mut face = FaultFace::new(FaultId(0), &spec(lsw()), &[]);
        let iface = interface(SlipIntegration::Trapezoidal);
        // Strength 0.677 * 120 MPa = 81.24 MPa; trial 90 MPa.
        let r = iface
            .resolve_face(&mut face, 0.2, 0.1, &trace(0.0, 20.0e6), Some(&trace(0.0, 20.0e6)))
            .unwrap();
        let expected_v = (90.0e6 - 81.24e6) / (Z / 2.0);
        assert!((r.slip_rate - expected_v).abs() < 1e-9);
        assert!((face.slip() - 0.5 * expected_v * 0.1).abs() < 1e-12);
        assert_eq!(face.rupture_time(), Some(0.2));
        assert_eq!(face.peak_slip_rate(), r.slip_rate);
        assert!(face.traction_change().shear > 0.0);
    }

    #[test]
    fn forward_integration_uses_new_rate_only() {
        let mut face = FaultFace::new(FaultId(0), &spec(lsw()), &[]);
        let iface = interface(SlipIntegration::Forward);
        let r = iface
            .resolve_face(&mut face, 0.1, 0.1, &trace(0.0, 20.0e6), Some(&trace(0.0, 20.0e6)))
            .unwrap();
        assert!((face.slip() - r.slip_rate * 0.1).abs() < 1e-12);
        assert!((face.friction_state().accumulated_slip - face.slip()).abs() < 1e-12);
    }

    #[test]
    fn rupture_time_recorded_once() {
        let mut face = FaultFace::new(FaultId(0), &spec(lsw()), &[]);
        let iface = interface(SlipIntegration::Trapezoidal);
        let hot = trace(0.0, 20.0e6);
        iface.resolve_face(&mut face, 0.1, 0.1, &hot, Some(&hot)).unwrap();
        iface.resolve_face(&mut face, 0.2, 0.1, &hot, Some(&hot)).unwrap();
        assert_eq!(face.rupture_time(), Some(0.1));
    }

    #[test]
    fn nucleation_patch_applies_inside_region_only() {
        let patch = NucleationPatch {
            region: Region::Sphere {
                center: [0.0; 3],
                radius: 1.0,
            },
            static_friction: Some(0.5),
            shear_stress_perturbation: 1.0e6,
        };
        let inside = FaultFace::new(FaultId(0), &spec(lsw()), std::slice::from_ref(&patch));
        assert_eq!(inside.background().shear, 71.0e6);
        match inside.friction() {
            FrictionLaw::LinearSlipWeakening(l) => assert_eq!(l.static_friction(), 0.5),
            other => panic!("expected slip weakening, got {other:?}"),
        }

        let mut far = spec(lsw());
        far.centroid = [5.0, 0.0, 0.0];
        let outside = FaultFace::new(FaultId(1), &far, &[patch]);
        assert_eq!(outside.background().shear, 70.0e6);
    }

    #[test]
    fn failed_solve_reports_face_and_time() {
        // θ = L / V_ini overflows to infinity; the Newton residual is NaN.
        let rs: FrictionLaw = RateAndState::builder()
            .initial_slip_rate(1e-320)
            .build()
            .unwrap()
            .into();
        let mut face = FaultFace::new(FaultId(3), &spec(rs), &[]);
        let iface = interface(SlipIntegration::Trapezoidal);
        let before = face.slip();
        match iface.resolve_face(&mut face, 0.4, 0.1, &trace(0.0, 0.0), Some(&trace(0.0, 0.0))) {
            Err(FrictionSolveError { fault, time, .. }) => {
                assert_eq!(fault, FaultId(3));
                assert_eq!(time, 0.4);
            }
            other => panic!("expected FrictionSolveError, got {other:?}"),
        }
        assert_eq!(face.slip(), before);
        assert_eq!(face.slip_rate(), 0.0);
    }
}
