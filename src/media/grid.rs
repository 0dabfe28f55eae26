use std::fmt;
use std::ops::{Add, Mul};

use itertools::iproduct;

use crate::{
    geometry::{Bounds3f, Point3f, Point3i},
    paramdict::ParameterDictionary,
    sampling::spectrum::{
        ConstantSpectrum, DenselySampledSpectrum, RgbSpectrum, SampledSpectrum,
        SampledWavelengths, Spectrum,
    },
    util::Error,
    Float,
};

use super::{
    cuboid::CuboidProvider,
    medium::MediumDensity,
};

/// Resolution of the majorant grid built over a uniform grid provider.
const MAJORANT_RES: i32 = 16;

/// A dense 3D grid of values at voxel centers over `[0, 1]^3`,
/// reconstructed with trilinear interpolation.
#[derive(Clone, Debug)]
pub struct SampledGrid<T> {
    nx: i32,
    ny: i32,
    nz: i32,
    values: Vec<T>,
}

impl<T: Copy + Default> SampledGrid<T> {
    pub fn new(values: Vec<T>, nx: i32, ny: i32, nz: i32) -> Self {
        assert!(nx > 0 && ny > 0 && nz > 0, "Grid resolution should be positive");
        assert_eq!(
            values.len(),
            (nx * ny * nz) as usize,
            "Grid value count should match its resolution"
        );

        Self { nx, ny, nz, values }
    }

    /// The value at integer voxel coordinates, or the default outside
    /// the grid.
    pub fn at(&self, p: Point3i) -> T {
        if p.x < 0 || p.x >= self.nx || p.y < 0 || p.y >= self.ny || p.z < 0 || p.z >= self.nz {
            return T::default();
        }

        self.values[(p.x + self.nx * (p.y + self.ny * p.z)) as usize]
    }

    /// Trilinear reconstruction at `p` in `[0, 1]^3`, after mapping the
    /// grid samples through `convert`.
    pub fn lookup_with<U>(&self, p: Point3f, convert: impl Fn(T) -> U) -> U
    where
        U: Add<Output = U> + Mul<Float, Output = U>,
    {
        // Compute voxel coordinates and offsets for p
        let p_samples = Point3f::new(
            p.x * self.nx as Float - 0.5,
            p.y * self.ny as Float - 0.5,
            p.z * self.nz as Float - 0.5,
        );
        let pf = p_samples.floor();
        let pi = Point3i::new(pf.x as i32, pf.y as i32, pf.z as i32);
        let d = p_samples - pf;

        // Trilinearly interpolate the grid samples around p
        let corner = |dx: i32, dy: i32, dz: i32| {
            convert(self.at(Point3i::new(pi.x + dx, pi.y + dy, pi.z + dz)))
        };
        let lerp = |a: U, b: U, t: Float| a * (1.0 - t) + b * t;

        let d00 = lerp(corner(0, 0, 0), corner(1, 0, 0), d.x);
        let d10 = lerp(corner(0, 1, 0), corner(1, 1, 0), d.x);
        let d01 = lerp(corner(0, 0, 1), corner(1, 0, 1), d.x);
        let d11 = lerp(corner(0, 1, 1), corner(1, 1, 1), d.x);
        let d0 = lerp(d00, d10, d.y);
        let d1 = lerp(d01, d11, d.y);

        lerp(d0, d1, d.z)
    }

    /// Trilinear reconstruction at `p` in `[0, 1]^3`.
    pub fn lookup(&self, p: Point3f) -> T
    where
        T: Add<Output = T> + Mul<Float, Output = T>,
    {
        self.lookup_with(p, |v| v)
    }

    /// An upper bound of `value` over the trilinear reconstruction
    /// restricted to `bounds` (in `[0, 1]^3`): the maximum over every
    /// grid sample whose support touches it.
    pub fn max_value_with(&self, bounds: Bounds3f, value: impl Fn(T) -> Float) -> Float {
        let ps = [
            Point3f::new(
                bounds.p_min.x * self.nx as Float - 0.5,
                bounds.p_min.y * self.ny as Float - 0.5,
                bounds.p_min.z * self.nz as Float - 0.5,
            ),
            Point3f::new(
                bounds.p_max.x * self.nx as Float - 0.5,
                bounds.p_max.y * self.ny as Float - 0.5,
                bounds.p_max.z * self.nz as Float - 0.5,
            ),
        ];
        let pi0 = Point3i::new(
            (ps[0].x.floor() as i32).max(0),
            (ps[0].y.floor() as i32).max(0),
            (ps[0].z.floor() as i32).max(0),
        );
        let pi1 = Point3i::new(
            (ps[1].x.floor() as i32 + 1).min(self.nx - 1),
            (ps[1].y.floor() as i32 + 1).min(self.ny - 1),
            (ps[1].z.floor() as i32 + 1).min(self.nz - 1),
        );

        let mut max_value = value(self.at(pi0));
        for (z, y, x) in iproduct!(pi0.z..=pi1.z, pi0.y..=pi1.y, pi0.x..=pi1.x) {
            max_value = max_value.max(value(self.at(Point3i::new(x, y, z))));
        }

        max_value
    }
}

impl SampledGrid<Float> {
    pub fn max_value(&self, bounds: Bounds3f) -> Float {
        self.max_value_with(bounds, |v| v)
    }
}

/// Spatially varying density from dense voxel grids: a scalar density
/// grid, a separate absorption/scattering pair, or an RGB grid; plus
/// optional emission with its own scale grid.
#[derive(Debug)]
pub struct UniformGridMediumProvider {
    bounds: Bounds3f,
    density_grid: Option<SampledGrid<Float>>,
    sigma_a_grid: Option<SampledGrid<Float>>,
    sigma_s_grid: Option<SampledGrid<Float>>,
    rgb_grid: Option<SampledGrid<RgbSpectrum>>,
    le_spec: DenselySampledSpectrum,
    le_scale: SampledGrid<Float>,
}

impl UniformGridMediumProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bounds: Bounds3f,
        density_grid: Option<SampledGrid<Float>>,
        sigma_a_grid: Option<SampledGrid<Float>>,
        sigma_s_grid: Option<SampledGrid<Float>>,
        rgb_grid: Option<SampledGrid<RgbSpectrum>>,
        le: &impl Spectrum,
        le_scale: SampledGrid<Float>,
    ) -> Self {
        let grid_kinds = [
            density_grid.is_some(),
            sigma_a_grid.is_some() && sigma_s_grid.is_some(),
            rgb_grid.is_some(),
        ];
        assert_eq!(
            grid_kinds.iter().filter(|&&k| k).count(),
            1,
            "Exactly one of density, sigma pair, or rgb grids should be given"
        );
        assert_eq!(
            sigma_a_grid.is_some(),
            sigma_s_grid.is_some(),
            "sigma_a and sigma_s grids should come as a pair"
        );
        assert!(!bounds.is_empty(), "Provider bounds should be non-empty");

        Self {
            bounds,
            density_grid,
            sigma_a_grid,
            sigma_s_grid,
            rgb_grid,
            le_spec: DenselySampledSpectrum::new(le, None, None),
            le_scale,
        }
    }

    /// A provider over a single scalar density grid, with no emission.
    pub fn from_density(
        bounds: Bounds3f,
        densities: Vec<Float>,
        nx: i32,
        ny: i32,
        nz: i32,
    ) -> Self {
        Self::new(
            bounds,
            Some(SampledGrid::new(densities, nx, ny, nz)),
            None,
            None,
            None,
            &ConstantSpectrum::new(0.0),
            SampledGrid::new(vec![1.0], 1, 1, 1),
        )
    }

    pub fn create(params: &ParameterDictionary) -> Result<Self, Error> {
        let nx = params.get_one_int("nx", 1)?;
        let ny = params.get_one_int("ny", 1)?;
        let nz = params.get_one_int("nz", 1)?;
        if nx <= 0 || ny <= 0 || nz <= 0 {
            return Err(params.error("nx", "grid resolution should be positive"));
        }
        let n = (nx * ny * nz) as usize;

        let check_len = |name: &str, len: usize| -> Result<(), Error> {
            if len == n {
                Ok(())
            } else {
                Err(params.error(name, format!("expected {n} values, got {len}")))
            }
        };

        // Exactly one source of density
        let density = params.float_array("density")?;
        let sigma_a = params.float_array("sigmaagrid")?;
        let sigma_s = params.float_array("sigmasgrid")?;
        let rgb = params.float_array("rgb")?;

        if sigma_a.is_some() != sigma_s.is_some() {
            return Err(params.error(
                "sigmaagrid",
                "sigmaagrid and sigmasgrid should be given together",
            ));
        }
        let n_kinds = [density.is_some(), sigma_a.is_some(), rgb.is_some()]
            .iter()
            .filter(|&&k| k)
            .count();
        if n_kinds == 0 {
            return Err(params.error(
                "density",
                "one of density, sigmaagrid/sigmasgrid, or rgb is required",
            ));
        }
        if n_kinds > 1 {
            return Err(params.error(
                "density",
                "density, sigmaagrid/sigmasgrid, and rgb are mutually exclusive",
            ));
        }

        let density_grid = density
            .map(|d| {
                check_len("density", d.len())?;
                Ok(SampledGrid::new(d.to_vec(), nx, ny, nz))
            })
            .transpose()?;
        let sigma_a_grid = sigma_a
            .map(|d| {
                check_len("sigmaagrid", d.len())?;
                Ok(SampledGrid::new(d.to_vec(), nx, ny, nz))
            })
            .transpose()?;
        let sigma_s_grid = sigma_s
            .map(|d| {
                check_len("sigmasgrid", d.len())?;
                Ok(SampledGrid::new(d.to_vec(), nx, ny, nz))
            })
            .transpose()?;
        let rgb_grid = rgb
            .map(|d| {
                if d.len() != 3 * n {
                    return Err(params.error("rgb", format!("expected {} values, got {}", 3 * n, d.len())));
                }
                let spectra: Vec<RgbSpectrum> = d
                    .chunks_exact(3)
                    .map(|c| RgbSpectrum::new(c[0], c[1], c[2]))
                    .collect();
                Ok(SampledGrid::new(spectra, nx, ny, nz))
            })
            .transpose()?;

        let p0 = params.get_point3("p0")?.unwrap_or(Point3f::new(0.0, 0.0, 0.0));
        let p1 = params.get_point3("p1")?.unwrap_or(Point3f::new(1.0, 1.0, 1.0));
        if p0.x >= p1.x || p0.y >= p1.y || p0.z >= p1.z {
            return Err(params.error("p0", "bounds should have positive extent"));
        }

        let le = params
            .get_one_spectrum("Le")?
            .cloned()
            .unwrap_or_else(|| ConstantSpectrum::new(0.0).into());
        let le_scale = match params.float_array("Lescale")? {
            Some(values) => {
                check_len("Lescale", values.len())?;
                SampledGrid::new(values.to_vec(), nx, ny, nz)
            }
            None => SampledGrid::new(vec![1.0], 1, 1, 1),
        };

        Ok(Self::new(
            Bounds3f::new(p0, p1),
            density_grid,
            sigma_a_grid,
            sigma_s_grid,
            rgb_grid,
            &le,
            le_scale,
        ))
    }
}

impl CuboidProvider for UniformGridMediumProvider {
    fn bounds(&self) -> Bounds3f {
        self.bounds
    }

    fn is_emissive(&self) -> bool {
        self.le_spec.max_value() > 0.0
    }

    fn density(&self, p: Point3f, lambda: &SampledWavelengths) -> MediumDensity {
        let pp = Point3f::from(self.bounds.offset(p));

        if let Some(density) = &self.density_grid {
            MediumDensity::uniform(density.lookup(pp))
        } else if let Some(sigma_a) = &self.sigma_a_grid {
            let sigma_s = self
                .sigma_s_grid
                .as_ref()
                .expect("sigma grids should come as a pair");
            MediumDensity::new(
                SampledSpectrum::with_single_value(sigma_a.lookup(pp)),
                SampledSpectrum::with_single_value(sigma_s.lookup(pp)),
            )
        } else {
            // Interpolate the sampled spectra of the RGB voxels
            let rgb = self.rgb_grid.as_ref().expect("one grid kind should be set");
            let d = rgb.lookup_with(pp, |s| s.sample(lambda));
            MediumDensity::new(d.clone(), d)
        }
    }

    fn le(&self, p: Point3f, lambda: &SampledWavelengths) -> SampledSpectrum {
        let pp = Point3f::from(self.bounds.offset(p));
        self.le_spec.sample(lambda) * self.le_scale.lookup(pp)
    }

    fn max_density_grid(&self) -> (Vec<Float>, Point3i) {
        let res = Point3i::new(MAJORANT_RES, MAJORANT_RES, MAJORANT_RES);
        let mut max_grid = Vec::with_capacity((res.x * res.y * res.z) as usize);

        // Compute maximum density over the cell bounds for each entry
        for (z, y, x) in iproduct!(0..res.z, 0..res.y, 0..res.x) {
            let cell = Bounds3f::new(
                Point3f::new(
                    x as Float / res.x as Float,
                    y as Float / res.y as Float,
                    z as Float / res.z as Float,
                ),
                Point3f::new(
                    (x + 1) as Float / res.x as Float,
                    (y + 1) as Float / res.y as Float,
                    (z + 1) as Float / res.z as Float,
                ),
            );

            max_grid.push(if let Some(density) = &self.density_grid {
                density.max_value(cell)
            } else if let Some(sigma_a) = &self.sigma_a_grid {
                let sigma_s = self
                    .sigma_s_grid
                    .as_ref()
                    .expect("sigma grids should come as a pair");
                // Conservative: the per-grid maxima may not coincide
                sigma_a.max_value(cell) + sigma_s.max_value(cell)
            } else {
                let rgb = self.rgb_grid.as_ref().expect("one grid kind should be set");
                rgb.max_value_with(cell, |s| s.max_value())
            });
        }

        (max_grid, res)
    }
}

impl fmt::Display for UniformGridMediumProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.density_grid.is_some() {
            "density"
        } else if self.sigma_a_grid.is_some() {
            "sigma_a/sigma_s"
        } else {
            "rgb"
        };
        write!(
            f,
            "[ UniformGridMediumProvider bounds: {:?} grids: {} ]",
            self.bounds, kind
        )
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use crate::{paramdict::Value, util::Rng};
    use rand::SeedableRng;

    use super::*;

    fn test_wavelengths() -> SampledWavelengths {
        SampledWavelengths::sample_uniform(0.3, None, None)
    }

    fn unit_bounds() -> Bounds3f {
        Bounds3f::new(Point3f::new(0.0, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn trilinear_center_averages_corners() {
        let grid = SampledGrid::new((0..8).map(|v| v as Float).collect(), 2, 2, 2);
        // The cube center is equidistant from all eight samples
        assert_relative_eq!(
            grid.lookup(Point3f::new(0.5, 0.5, 0.5)),
            3.5,
            max_relative = 1e-5
        );
    }

    #[test]
    fn lookup_clamps_outside_support_to_default() {
        let grid = SampledGrid::new(vec![4.0; 8], 2, 2, 2);
        // At a corner of [0,1]^3, only one sample has support; the
        // others read as the default 0
        assert_relative_eq!(
            grid.lookup(Point3f::new(0.0, 0.0, 0.0)),
            0.5,
            max_relative = 1e-5
        );
    }

    #[test]
    fn max_value_bounds_interpolant() {
        let values: Vec<Float> = (0..64).map(|i| ((i * 31 + 7) % 13) as Float).collect();
        let grid = SampledGrid::new(values, 4, 4, 4);
        let mut rng = Rng::seed_from_u64(5);

        for _ in 0..200 {
            let p = Point3f::new(
                rng.uniform_float(),
                rng.uniform_float(),
                rng.uniform_float(),
            );
            let cell = Bounds3f::new(
                Point3f::new(p.x - 0.05, p.y - 0.05, p.z - 0.05),
                Point3f::new(p.x + 0.05, p.y + 0.05, p.z + 0.05),
            );
            assert!(grid.lookup(p) <= grid.max_value(cell) + 1e-4);
        }
    }

    #[test]
    fn majorant_bounds_density_everywhere() {
        let values: Vec<Float> = (0..512).map(|i| ((i * 131 + 17) % 23) as Float).collect();
        let provider = UniformGridMediumProvider::from_density(unit_bounds(), values, 8, 8, 8);
        let (max_grid, res) = provider.max_density_grid();
        let lambda = test_wavelengths();
        let mut rng = Rng::seed_from_u64(23);

        for _ in 0..500 {
            let p = Point3f::new(
                rng.uniform_float(),
                rng.uniform_float(),
                rng.uniform_float(),
            );
            let cell = Point3i::new(
                ((p.x * res.x as Float) as i32).min(res.x - 1),
                ((p.y * res.y as Float) as i32).min(res.y - 1),
                ((p.z * res.z as Float) as i32).min(res.z - 1),
            );
            let majorant = max_grid[(cell.x + res.x * (cell.y + res.y * cell.z)) as usize];
            let d = provider.density(p, &lambda);
            assert!(
                d.sigma_a[0] <= majorant + 1e-4,
                "density {} above majorant {majorant}",
                d.sigma_a[0]
            );
        }
    }

    #[test]
    fn sigma_pair_grids_report_separate_densities() {
        let provider = UniformGridMediumProvider::new(
            unit_bounds(),
            None,
            Some(SampledGrid::new(vec![2.0], 1, 1, 1)),
            Some(SampledGrid::new(vec![3.0], 1, 1, 1)),
            None,
            &ConstantSpectrum::new(0.0),
            SampledGrid::new(vec![1.0], 1, 1, 1),
        );

        let d = provider.density(Point3f::new(0.5, 0.5, 0.5), &test_wavelengths());
        assert_relative_eq!(d.sigma_a[0], 2.0, max_relative = 1e-5);
        assert_relative_eq!(d.sigma_s[0], 3.0, max_relative = 1e-5);

        // The pair majorant is the (loose) sum of the per-grid maxima
        let (max_grid, _) = provider.max_density_grid();
        assert_relative_eq!(max_grid[0], 5.0, max_relative = 1e-5);
    }

    #[test]
    fn rgb_grid_density_varies_with_wavelength() {
        let provider = UniformGridMediumProvider::new(
            unit_bounds(),
            None,
            None,
            None,
            Some(SampledGrid::new(vec![RgbSpectrum::new(1.0, 2.0, 4.0)], 1, 1, 1)),
            &ConstantSpectrum::new(0.0),
            SampledGrid::new(vec![1.0], 1, 1, 1),
        );

        let d = provider.density(Point3f::new(0.5, 0.5, 0.5), &test_wavelengths());
        // Values come from the RGB bands, so they span [1, 4]
        assert!(d.sigma_a.min_component_value() >= 1.0 - 1e-4);
        assert!(d.sigma_a.max_component_value() <= 4.0 + 1e-4);
        assert_eq!(d.sigma_a, d.sigma_s);

        let (max_grid, _) = provider.max_density_grid();
        assert_relative_eq!(max_grid[0], 4.0, max_relative = 1e-5);
    }

    #[test]
    fn emission_scales_by_grid() {
        let provider = UniformGridMediumProvider::new(
            unit_bounds(),
            Some(SampledGrid::new(vec![1.0], 1, 1, 1)),
            None,
            None,
            None,
            &ConstantSpectrum::new(2.0),
            SampledGrid::new(vec![0.5], 1, 1, 1),
        );

        assert!(provider.is_emissive());
        let le = provider.le(Point3f::new(0.5, 0.5, 0.5), &test_wavelengths());
        assert_relative_eq!(le[0], 1.0, max_relative = 1e-5);
    }

    #[test]
    fn factory_validates_grid_shape() {
        let mut params = ParameterDictionary::new();
        params
            .insert("nx", Value::Int(2))
            .insert("ny", Value::Int(2))
            .insert("nz", Value::Int(2))
            .insert("density", Value::FloatArray(vec![1.0; 7]));

        let err = UniformGridMediumProvider::create(&params).unwrap_err();
        assert!(err.to_string().contains("expected 8 values"));
    }

    #[test]
    fn factory_rejects_contradictory_grids() {
        let mut params = ParameterDictionary::new();
        params
            .insert("density", Value::FloatArray(vec![1.0]))
            .insert("sigmaagrid", Value::FloatArray(vec![1.0]))
            .insert("sigmasgrid", Value::FloatArray(vec![1.0]));

        let err = UniformGridMediumProvider::create(&params).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn factory_builds_working_provider() {
        let mut params = ParameterDictionary::new();
        params
            .insert("nx", Value::Int(2))
            .insert("ny", Value::Int(1))
            .insert("nz", Value::Int(1))
            .insert("density", Value::FloatArray(vec![1.0, 3.0]))
            .insert("p0", Value::Point(Point3f::new(-1.0, -1.0, -1.0)))
            .insert("p1", Value::Point(Point3f::new(1.0, 1.0, 1.0)));

        let provider = UniformGridMediumProvider::create(&params).unwrap();
        assert_eq!(
            provider.bounds(),
            Bounds3f::new(Point3f::new(-1.0, -1.0, -1.0), Point3f::new(1.0, 1.0, 1.0))
        );
        let d = provider.density(Point3f::new(0.0, 0.0, 0.0), &test_wavelengths());
        assert_relative_eq!(d.sigma_a[0], 2.0, max_relative = 1e-5);
    }
}
