use std::fmt;

use crate::{
    geometry::{Bounds3f, Point3f, Point3i},
    math::{dnoise, noise},
    paramdict::ParameterDictionary,
    sampling::spectrum::{SampledSpectrum, SampledWavelengths},
    util::Error,
    Float,
};

use super::{cuboid::CuboidProvider, medium::MediumDensity};

/// Procedural cumulus-like density from layered gradient noise, shaped
/// to thin out with altitude. Non-emissive.
#[derive(Debug)]
pub struct CloudMediumProvider {
    bounds: Bounds3f,
    density: Float,
    wispiness: Float,
    frequency: Float,
}

impl CloudMediumProvider {
    pub fn new(bounds: Bounds3f, density: Float, wispiness: Float, frequency: Float) -> Self {
        Self {
            bounds,
            density,
            wispiness,
            frequency,
        }
    }

    pub fn create(params: &ParameterDictionary) -> Result<Self, Error> {
        let density = params.get_one_float("density", 1.0)?;
        let wispiness = params.get_one_float("wispiness", 1.0)?;
        let frequency = params.get_one_float("frequency", 5.0)?;

        let p0 = params
            .get_point3("p0")?
            .unwrap_or(Point3f::new(0.0, 0.0, 0.0));
        let p1 = params
            .get_point3("p1")?
            .unwrap_or(Point3f::new(1.0, 1.0, 1.0));
        if p0.x >= p1.x || p0.y >= p1.y || p0.z >= p1.z {
            return Err(params.error("p0", "bounds should have positive extent"));
        }

        Ok(Self::new(Bounds3f::new(p0, p1), density, wispiness, frequency))
    }
}

impl CuboidProvider for CloudMediumProvider {
    fn bounds(&self) -> Bounds3f {
        self.bounds
    }

    fn is_emissive(&self) -> bool {
        false
    }

    fn density(&self, p: Point3f, _lambda: &SampledWavelengths) -> MediumDensity {
        let mut pp = p * self.frequency;
        if self.wispiness > 0.0 {
            // Perturb the cloud lookup point with two octaves of
            // vector noise
            let mut vomega = 0.05 * self.wispiness;
            let mut vlambda: Float = 10.0;
            for _ in 0..2 {
                pp += dnoise(pp * vlambda) * vomega;
                vomega *= 0.5;
                vlambda *= 1.99;
            }
        }

        // Sum octaves of noise to approximate cloud density
        let mut d: Float = 0.0;
        let mut omega: Float = 0.5;
        let mut lambda: Float = 1.0;
        for _ in 0..5 {
            d += omega * noise(pp * lambda);
            omega *= 0.5;
            lambda *= 1.99;
        }

        // Model decrease in density with altitude and return final cloud density
        d = ((1.0 - p.y) * 4.5 * self.density * d).clamp(0.0, 1.0);
        d += 2.0 * (0.5 - p.y).max(0.0);

        MediumDensity::uniform(d.clamp(0.0, 1.0))
    }

    fn le(&self, _p: Point3f, _lambda: &SampledWavelengths) -> SampledSpectrum {
        SampledSpectrum::with_single_value(0.0)
    }

    fn max_density_grid(&self) -> (Vec<Float>, Point3i) {
        // A single medium-wide cell: the shaped density never exceeds 1
        (vec![1.0], Point3i::new(1, 1, 1))
    }
}

impl fmt::Display for CloudMediumProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ CloudMediumProvider bounds: {:?} density: {} wispiness: {} frequency: {} ]",
            self.bounds, self.density, self.wispiness, self.frequency
        )
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    use crate::{
        geometry::{Ray, Transform, Vec3f},
        media::{cuboid::CuboidMedium, medium::MediumEnum},
        sampling::spectrum::ConstantSpectrum,
        util::Rng,
    };

    use super::*;

    fn test_wavelengths() -> SampledWavelengths {
        SampledWavelengths::sample_uniform(0.3, None, None)
    }

    fn wide_bounds() -> Bounds3f {
        Bounds3f::new(Point3f::new(-1.0, -1.0, -1.0), Point3f::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn density_is_clamped_to_unit_range() {
        let provider = CloudMediumProvider::new(wide_bounds(), 1.0, 1.0, 5.0);
        let lambda = test_wavelengths();
        let mut rng = Rng::seed_from_u64(2);

        for _ in 0..500 {
            let p = Point3f::new(
                2.0 * rng.uniform_float() - 1.0,
                2.0 * rng.uniform_float() - 1.0,
                2.0 * rng.uniform_float() - 1.0,
            );
            let d = provider.density(p, &lambda);
            assert!(d.sigma_a[0] >= 0.0 && d.sigma_a[0] <= 1.0);
        }
    }

    #[test]
    fn low_altitude_is_saturated() {
        // Below y = 0 the altitude term alone is >= 1, so the clamped
        // density pegs at 1 regardless of noise
        let provider = CloudMediumProvider::new(wide_bounds(), 1.0, 1.0, 5.0);
        let lambda = test_wavelengths();

        for x in 0..10 {
            let p = Point3f::new(x as Float * 0.17 - 0.9, -0.25, 0.3);
            let d = provider.density(p, &lambda);
            assert_relative_eq!(d.sigma_a[0], 1.0);
        }
    }

    #[test]
    fn majorant_is_a_single_unit_cell() {
        let provider = CloudMediumProvider::new(wide_bounds(), 1.0, 1.0, 5.0);
        let (grid, res) = provider.max_density_grid();
        assert_eq!(res, Point3i::new(1, 1, 1));
        assert_eq!(grid, vec![1.0]);
    }

    #[test]
    fn majorant_bounds_density_everywhere() {
        let provider = CloudMediumProvider::new(wide_bounds(), 1.0, 2.0, 4.0);
        let lambda = test_wavelengths();
        let mut rng = Rng::seed_from_u64(9);

        for _ in 0..500 {
            let p = Point3f::new(
                2.0 * rng.uniform_float() - 1.0,
                2.0 * rng.uniform_float() - 1.0,
                2.0 * rng.uniform_float() - 1.0,
            );
            assert!(provider.density(p, &lambda).sigma_a[0] <= 1.0);
        }
    }

    #[test]
    fn ray_below_cloud_base_scatters_with_decreasing_t_maj() {
        // A ray crossing the saturated region: events fire, and the
        // per-segment majorant transmittances are all in (0, 1]
        let provider = CloudMediumProvider::new(wide_bounds(), 1.0, 1.0, 5.0);
        let medium = MediumEnum::Cuboid(CuboidMedium::new(
            provider.into(),
            &ConstantSpectrum::new(1.0),
            &ConstantSpectrum::new(1.0),
            1.0,
            0.0,
            Transform::IDENTITY,
        ));
        let lambda = test_wavelengths();
        let mut rng = Rng::seed_from_u64(4);

        let ray = Ray::new(
            Point3f::new(-2.0, -0.5, 0.0),
            Vec3f::new(1.0, 0.0, 0.0),
            0.0,
            None,
        );
        let mut calls = 0;
        let mut running: Float = 1.0;
        let mut products = Vec::new();
        // u = 0 pins the first event to the box entry
        medium.sample_t_maj(&ray, 10.0, 0.0, &mut rng, &lambda, |s| {
            calls += 1;
            assert!(s.t_maj[0] > 0.0 && s.t_maj[0] <= 1.0 + 1e-4);
            // Density below the cloud base is pegged at 1
            assert_relative_eq!(s.intr.sigma_a[0] + s.intr.sigma_s[0], 2.0, max_relative = 1e-4);
            running *= s.t_maj[0];
            products.push(running);
            true
        });

        assert!(calls > 0);
        // The cumulative majorant transmittance decreases monotonically
        for pair in products.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6);
        }
    }

    #[test]
    fn factory_uses_defaults() {
        let params = ParameterDictionary::new();
        let provider = CloudMediumProvider::create(&params).unwrap();
        assert_eq!(
            provider.bounds(),
            Bounds3f::new(Point3f::new(0.0, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0))
        );
        assert!(!provider.is_emissive());
    }
}
