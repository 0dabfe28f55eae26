use enum_dispatch::enum_dispatch;

use crate::{
    float::{INV_4_PI, PI},
    geometry::{Point2f, Vec3f},
    math::safe_sqrt,
    Float,
};

/// The result of importance-sampling a phase function: the sampled
/// incident direction with the phase value and PDF at it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseFunctionSample {
    pub p: Float,
    pub wi: Vec3f,
    pub pdf: Float,
}

#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum PhaseFunctionEnum {
    HG(HGPhaseFunction),
}

#[enum_dispatch(PhaseFunctionEnum)]
pub trait PhaseFunction {
    /// Value of the normalized phase density for the pair of directions.
    fn p(&self, wo: Vec3f, wi: Vec3f) -> Float;

    /// Given a 2D uniform sample `u`, draw an incident direction with
    /// density `p(wo, .)`.
    fn sample_p(&self, wo: Vec3f, u: Point2f) -> Option<PhaseFunctionSample>;

    fn pdf(&self, wo: Vec3f, wi: Vec3f) -> Float;
}

/// The Henyey-Greenstein phase density at `cos_theta` for asymmetry `g`.
#[inline]
pub fn henyey_greenstein(cos_theta: Float, g: Float) -> Float {
    let denom = 1.0 + g * g + 2.0 * g * cos_theta;
    INV_4_PI * (1.0 - g * g) / (denom * safe_sqrt(denom))
}

/// The Henyey-Greenstein phase function, parameterized by the mean
/// scattering cosine `g` in `(-1, 1)`: negative for back-scattering,
/// zero for isotropic, positive for forward-scattering media.
#[derive(Clone, Copy, Debug)]
pub struct HGPhaseFunction {
    g: Float,
}

impl HGPhaseFunction {
    pub fn new(g: Float) -> Self {
        assert!(
            g > -1.0 && g < 1.0,
            "HG asymmetry g should be within (-1, 1)"
        );
        Self { g }
    }
}

impl PhaseFunction for HGPhaseFunction {
    fn p(&self, wo: Vec3f, wi: Vec3f) -> Float {
        henyey_greenstein(wo.dot(wi), self.g)
    }

    fn sample_p(&self, wo: Vec3f, u: Point2f) -> Option<PhaseFunctionSample> {
        let g = self.g;

        // Compute cos(theta) for Henyey-Greenstein sample
        let cos_theta = if g.abs() < 1e-3 {
            1.0 - 2.0 * u.x
        } else {
            let sqr_term = (1.0 - g * g) / (1.0 - g + 2.0 * g * u.x);
            -(1.0 + g * g - sqr_term * sqr_term) / (2.0 * g)
        };

        // Compute direction wi in the coordinate system around wo
        let sin_theta = safe_sqrt(1.0 - cos_theta * cos_theta);
        let phi = 2.0 * PI * u.y;
        let (v2, v3) = wo.coordinate_system();
        let wi = v2 * (sin_theta * phi.cos()) + v3 * (sin_theta * phi.sin()) + wo * cos_theta;

        // Perfectly importance-sampled: the PDF is the phase value itself
        let pdf = henyey_greenstein(cos_theta, g);
        Some(PhaseFunctionSample { p: pdf, wi, pdf })
    }

    fn pdf(&self, wo: Vec3f, wi: Vec3f) -> Float {
        self.p(wo, wi)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use crate::util::Rng;

    use super::*;

    #[test]
    fn isotropic_phase_is_uniform() {
        let phase = HGPhaseFunction::new(0.0);
        let wo = Vec3f::new(0.0, 0.0, 1.0);
        for wi in [
            Vec3f::new(0.0, 0.0, 1.0),
            Vec3f::new(0.0, 0.0, -1.0),
            Vec3f::new(1.0, 0.0, 0.0),
            Vec3f::new(0.0, -0.6, 0.8),
        ] {
            assert_relative_eq!(phase.p(wo, wi), INV_4_PI, max_relative = 1e-6);
        }
    }

    #[test]
    fn sampled_direction_is_consistent_with_pdf() {
        let phase = HGPhaseFunction::new(0.6);
        let wo = Vec3f::new(0.48, -0.6, 0.64);
        let mut rng = Rng::default();

        for _ in 0..1000 {
            let u = Point2f::new(rng.uniform_float(), rng.uniform_float());
            let sample = phase.sample_p(wo, u).unwrap();

            assert_relative_eq!(sample.wi.length(), 1.0, epsilon = 1e-4);
            assert!(sample.pdf > 0.0);
            // The returned PDF equals the phase value at the sampled direction
            assert_relative_eq!(
                phase.p(wo, sample.wi),
                sample.pdf,
                max_relative = 1e-3
            );
            assert_relative_eq!(sample.p, sample.pdf);
        }
    }

    #[test]
    fn positive_g_prefers_continuing_forward() {
        // wo points back along the arriving ray, so continuing forward
        // means wi opposite wo
        let phase = HGPhaseFunction::new(0.8);
        let wo = Vec3f::new(0.0, 0.0, 1.0);

        let forward = phase.p(wo, Vec3f::new(0.0, 0.0, -1.0));
        let backward = phase.p(wo, Vec3f::new(0.0, 0.0, 1.0));
        assert!(forward > backward);
    }

    #[test]
    fn hg_integrates_to_one_over_sphere() {
        // Riemann sum of p over the sphere, for a moderately peaked g
        let phase = HGPhaseFunction::new(0.4);
        let wo = Vec3f::new(0.0, 0.0, 1.0);

        let n_theta = 256;
        let n_phi = 256;
        let mut integral: Float = 0.0;
        for i in 0..n_theta {
            let theta = PI * (i as Float + 0.5) / n_theta as Float;
            for j in 0..n_phi {
                let phi = 2.0 * PI * (j as Float + 0.5) / n_phi as Float;
                let wi = Vec3f::new(
                    theta.sin() * phi.cos(),
                    theta.sin() * phi.sin(),
                    theta.cos(),
                );
                integral += phase.p(wo, wi) * theta.sin();
            }
        }
        integral *= (PI / n_theta as Float) * (2.0 * PI / n_phi as Float);

        assert_relative_eq!(integral, 1.0, max_relative = 1e-3);
    }
}
