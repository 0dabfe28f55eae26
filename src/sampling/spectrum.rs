use delegate::delegate;
use enum_dispatch::enum_dispatch;
use ordered_float::NotNan;
use overload::overload;
use std::{
    array,
    ops::{self, Add, Index, IndexMut, Mul},
};

use crate::{
    math::{find_interval, lerp},
    Float,
};

pub const LAMBDA_MIN: Float = 360.0;
pub const LAMBDA_MAX: Float = 830.0;

/// Number of wavelengths evaluated together along one path. Also the
/// width of `SampledSpectrum` and `SampledWavelengths`.
pub const N_SPECTRUM_SAMPLES: usize = 4;

#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum SpectrumEnum {
    Constant(ConstantSpectrum),
    DenselySampled(DenselySampledSpectrum),
    PiecewiseLinear(PiecewiseLinearSpectrum),
    Blackbody(BlackbodySpectrum),
    Rgb(RgbSpectrum),
}

impl SpectrumEnum {
    delegate! {
        #[through(Spectrum)]
        to self {
            pub fn at(&self, lambda: Float) -> Float;
            pub fn max_value(&self) -> Float;
            pub fn sample(&self, wavelengths: &SampledWavelengths) -> SampledSpectrum;
        }
    }
}

/// A full spectral distribution, queryable at any wavelength in nm.
#[enum_dispatch(SpectrumEnum)]
pub trait Spectrum {
    fn at(&self, lambda: Float) -> Float;

    /// An upper bound on `at` over all wavelengths.
    fn max_value(&self) -> Float;

    /// Resolve the distribution at a path's sampled wavelengths.
    fn sample(&self, wavelengths: &SampledWavelengths) -> SampledSpectrum {
        SampledSpectrum::new(wavelengths.lambdas().map(|l| self.at(l)))
    }
}

/// The same value at every wavelength.
#[derive(Clone, Debug)]
pub struct ConstantSpectrum {
    c: Float,
}

impl ConstantSpectrum {
    pub fn new(c: Float) -> Self {
        Self { c }
    }
}

impl Spectrum for ConstantSpectrum {
    fn at(&self, _lambda: Float) -> Float {
        self.c
    }

    fn max_value(&self) -> Float {
        self.c
    }

    fn sample(&self, _wavelengths: &SampledWavelengths) -> SampledSpectrum {
        SampledSpectrum::with_single_value(self.c)
    }
}

/// A spectrum tabulated at 1 nm steps over a wavelength range; the form
/// media store their coefficient spectra in, with any construction-time
/// scale folded into the table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DenselySampledSpectrum {
    lambda_min: usize,
    values: Vec<NotNan<Float>>,
}

impl DenselySampledSpectrum {
    /// Tabulate `spec` over `[lambda_min, lambda_max]` (the visible
    /// range when not given).
    pub fn new(spec: &impl Spectrum, lambda_min: Option<usize>, lambda_max: Option<usize>) -> Self {
        let lambda_min = lambda_min.unwrap_or(LAMBDA_MIN as usize);
        let lambda_max = lambda_max.unwrap_or(LAMBDA_MAX as usize);
        assert!(lambda_max >= lambda_min, "Wavelength range is inverted");

        let values = (lambda_min..=lambda_max)
            .map(|lambda| {
                NotNan::new(spec.at(lambda as Float))
                    .expect("Source spectrum produced a NaN value")
            })
            .collect();

        Self { lambda_min, values }
    }

    /// Fold a scale factor into the tabulated values.
    pub fn scaled(self, factor: Float) -> Self {
        Self {
            lambda_min: self.lambda_min,
            values: self.values.into_iter().map(|v| v * factor).collect(),
        }
    }
}

impl Spectrum for DenselySampledSpectrum {
    fn at(&self, lambda: Float) -> Float {
        debug_assert!(lambda >= 0.0, "Negative wavelength");

        // Out-of-range wavelengths miss the table and read as zero
        let offset = (lambda.round() as usize).wrapping_sub(self.lambda_min);
        self.values.get(offset).map_or(0.0, |v| v.into_inner())
    }

    fn max_value(&self) -> Float {
        self.values.iter().max().map_or(0.0, |v| v.into_inner())
    }
}

/// A spectrum interpolated linearly between sorted (wavelength, value)
/// knots, zero outside them.
#[derive(Clone, Debug)]
pub struct PiecewiseLinearSpectrum {
    lambdas: Vec<Float>,
    values: Vec<Float>,
}

impl PiecewiseLinearSpectrum {
    pub fn from_points(points: &[(Float, Float)]) -> Self {
        assert!(
            points.windows(2).all(|w| w[0].0 < w[1].0),
            "Knot wavelengths should be strictly increasing"
        );

        Self {
            lambdas: points.iter().map(|&(lambda, _)| lambda).collect(),
            values: points.iter().map(|&(_, value)| value).collect(),
        }
    }

    /// Build from `[lambda_0, v_0, lambda_1, v_1, ...]` pairs, padding
    /// both ends so the visible range is covered.
    pub fn from_interleaved(interleaved: &[Float]) -> Self {
        assert_eq!(interleaved.len() % 2, 0, "Interleaved data should be pairs");
        assert!(!interleaved.is_empty());

        let mut points: Vec<(Float, Float)> =
            interleaved.chunks_exact(2).map(|c| (c[0], c[1])).collect();
        if points[0].0 > LAMBDA_MIN {
            points.insert(0, (LAMBDA_MIN - 1.0, points[0].1));
        }
        let last = *points.last().unwrap();
        if last.0 < LAMBDA_MAX {
            points.push((LAMBDA_MAX + 1.0, last.1));
        }

        Self::from_points(&points)
    }
}

impl Spectrum for PiecewiseLinearSpectrum {
    fn at(&self, lambda: Float) -> Float {
        if self.lambdas.is_empty()
            || lambda < self.lambdas[0]
            || lambda > *self.lambdas.last().unwrap()
        {
            return 0.0;
        }
        if self.lambdas.len() == 1 {
            return self.values[0];
        }

        // Bracket lambda between two knots and interpolate
        let i = find_interval(self.lambdas.len(), |i| self.lambdas[i] <= lambda)
            .expect("Checked to have at least two knots");
        let t = (lambda - self.lambdas[i]) / (self.lambdas[i + 1] - self.lambdas[i]);

        lerp(self.values[i], self.values[i + 1], t)
    }

    fn max_value(&self) -> Float {
        self.values.iter().fold(0.0, |m, &v| m.max(v))
    }
}

/// Planck's law: radiance emitted by a blackbody at `temp` kelvin, for
/// a wavelength in nm.
pub fn blackbody(lambda: Float, temp: Float) -> Float {
    if temp <= 0.0 {
        return 0.0;
    }

    // Speed of light, Planck, Boltzmann
    const C: Float = 299792458.0;
    #[cfg(feature = "use-f64")]
    const H: Float = 6.62606957e-34;
    #[cfg(not(feature = "use-f64"))]
    const H: Float = 6.6260697e-34;
    const K_B: Float = 1.3806488e-23;

    let l = lambda * 1e-9;
    let exponent = (H * C) / (l * K_B * temp);

    (2.0 * H * C * C) / (l.powi(5) * (exponent.exp() - 1.0))
}

/// Blackbody emission normalized so the peak wavelength has value 1;
/// emissive providers layer their own radiance scale on top.
#[derive(Clone, Debug)]
pub struct BlackbodySpectrum {
    temp: Float,
    inv_peak: Float,
}

impl BlackbodySpectrum {
    pub fn new(temp: Float) -> Self {
        // Wien's displacement law gives the radiance peak for this
        // temperature (constant in m*K)
        #[cfg(feature = "use-f64")]
        const WIEN_B: Float = 2.8977721e-3;
        #[cfg(not(feature = "use-f64"))]
        const WIEN_B: Float = 2.897772e-3;

        let lambda_peak = WIEN_B / temp * 1e9;
        Self {
            temp,
            inv_peak: 1.0 / blackbody(lambda_peak, temp),
        }
    }
}

impl Spectrum for BlackbodySpectrum {
    fn at(&self, lambda: Float) -> Float {
        blackbody(lambda, self.temp) * self.inv_peak
    }

    fn max_value(&self) -> Float {
        1.0
    }
}

/// An unbounded spectrum defined by a non-negative RGB triple over three
/// fixed wavelength bands.
///
/// Coefficients that are ratios rather than reflectances (scattering
/// presets, RGB density grids) only need a coarse spectral shape, so a
/// box basis stands in for a full spectral upsampling fit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RgbSpectrum {
    pub r: Float,
    pub g: Float,
    pub b: Float,
}

// Band edges, in nm
const RGB_BLUE_MAX: Float = 490.0;
const RGB_GREEN_MAX: Float = 600.0;

impl RgbSpectrum {
    pub fn new(r: Float, g: Float, b: Float) -> Self {
        assert!(
            r >= 0.0 && g >= 0.0 && b >= 0.0,
            "RGB spectrum coefficients should be non-negative"
        );
        Self { r, g, b }
    }
}

impl Spectrum for RgbSpectrum {
    fn at(&self, lambda: Float) -> Float {
        if lambda < RGB_BLUE_MAX {
            self.b
        } else if lambda < RGB_GREEN_MAX {
            self.g
        } else {
            self.r
        }
    }

    fn max_value(&self) -> Float {
        self.r.max(self.g).max(self.b)
    }
}

impl Add for RgbSpectrum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            r: self.r + rhs.r,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
        }
    }
}

impl Mul<Float> for RgbSpectrum {
    type Output = Self;

    fn mul(self, rhs: Float) -> Self {
        Self {
            r: self.r * rhs,
            g: self.g * rhs,
            b: self.b * rhs,
        }
    }
}

/// Spectral values carried along one path, one per sampled wavelength.
///
/// Free-flight sampling multiplies and exponentiates these heavily, so
/// only the operations the media actually perform are provided.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledSpectrum {
    values: [Float; N_SPECTRUM_SAMPLES],
}

impl SampledSpectrum {
    pub fn new(values: [Float; N_SPECTRUM_SAMPLES]) -> Self {
        Self { values }
    }

    pub fn with_single_value(c: Float) -> Self {
        Self {
            values: [c; N_SPECTRUM_SAMPLES],
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Componentwise `e^x` through the fast exponential approximation.
    pub fn fast_exp(&self) -> Self {
        Self {
            values: self.values.map(crate::math::fast_exp),
        }
    }

    pub fn max_component_value(&self) -> Float {
        self.values.iter().fold(Float::MIN, |m, &v| m.max(v))
    }

    pub fn min_component_value(&self) -> Float {
        self.values.iter().fold(Float::MAX, |m, &v| m.min(v))
    }

    pub fn average(&self) -> Float {
        self.values.iter().sum::<Float>() / N_SPECTRUM_SAMPLES as Float
    }
}

impl Index<usize> for SampledSpectrum {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl IndexMut<usize> for SampledSpectrum {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.values[index]
    }
}

overload!((lhs: ?SampledSpectrum) + (rhs: ?SampledSpectrum) -> SampledSpectrum {
    SampledSpectrum::new(array::from_fn(|i| lhs[i] + rhs[i]))
});

overload!((lhs: ?SampledSpectrum) * (rhs: ?SampledSpectrum) -> SampledSpectrum {
    SampledSpectrum::new(array::from_fn(|i| lhs[i] * rhs[i]))
});

overload!((lhs: &mut SampledSpectrum) *= (rhs: ?SampledSpectrum) {
    for i in 0..N_SPECTRUM_SAMPLES {
        lhs[i] *= rhs[i];
    }
});

impl Mul<Float> for &SampledSpectrum {
    type Output = SampledSpectrum;

    fn mul(self, rhs: Float) -> SampledSpectrum {
        SampledSpectrum::new(self.values.map(|v| v * rhs))
    }
}

impl Mul<Float> for SampledSpectrum {
    type Output = Self;

    fn mul(self, rhs: Float) -> Self {
        &self * rhs
    }
}

/// The wavelengths one path is being evaluated at, with the PDF each
/// was drawn with. Width matches `SampledSpectrum`.
#[derive(Clone, Debug)]
pub struct SampledWavelengths {
    lambdas: [Float; N_SPECTRUM_SAMPLES],
    pdf: [Float; N_SPECTRUM_SAMPLES],
}

impl SampledWavelengths {
    /// Stratified-uniform wavelengths over `[lambda_min, lambda_max]`
    /// (the visible range when not given): the first placed by `u`, the
    /// rest at equal strides with wraparound.
    pub fn sample_uniform(u: Float, lambda_min: Option<Float>, lambda_max: Option<Float>) -> Self {
        let lo = lambda_min.unwrap_or(LAMBDA_MIN);
        let hi = lambda_max.unwrap_or(LAMBDA_MAX);
        let range = hi - lo;
        let stride = range / N_SPECTRUM_SAMPLES as Float;

        let first = lerp(lo, hi, u);
        let lambdas = array::from_fn(|i| {
            let lambda = first + i as Float * stride;
            if lambda > hi {
                lambda - range
            } else {
                lambda
            }
        });

        Self {
            lambdas,
            pdf: [1.0 / range; N_SPECTRUM_SAMPLES],
        }
    }

    /// Wavelengths drawn from a distribution matched to the visual
    /// response curve.
    pub fn sample_visible(u: Float) -> Self {
        let lambdas: [Float; N_SPECTRUM_SAMPLES] = array::from_fn(|i| {
            // Offset u per slot, wrapping within [0, 1)
            let mut up = u + i as Float / N_SPECTRUM_SAMPLES as Float;
            if up > 1.0 {
                up -= 1.0;
            }
            sample_visible_wavelengths(up)
        });
        let pdf = lambdas.map(visible_wavelengths_pdf);

        Self { lambdas, pdf }
    }

    pub fn lambdas(&self) -> &[Float; N_SPECTRUM_SAMPLES] {
        &self.lambdas
    }

    pub fn pdf(&self) -> SampledSpectrum {
        SampledSpectrum::new(self.pdf)
    }

    /// Collapse to the hero wavelength only, once a wavelength-dependent
    /// event has invalidated the secondary wavelengths.
    pub fn terminate_secondary(&mut self) {
        if self.secondary_terminated() {
            return;
        }
        self.pdf[0] /= N_SPECTRUM_SAMPLES as Float;
        self.pdf[1..].fill(0.0);
    }

    pub fn secondary_terminated(&self) -> bool {
        self.pdf[1..].iter().all(|&p| p == 0.0)
    }
}

/// Sample a wavelength from the visual-response-shaped distribution,
/// from a uniform `u` in `[0, 1)`.
#[inline]
pub fn sample_visible_wavelengths(u: Float) -> Float {
    #[cfg(not(feature = "use-f64"))]
    return 538.0 - 138.88889 * (0.85691062 - 1.827502 * u).atanh();
    #[cfg(feature = "use-f64")]
    return 538.0 - 138.888889 * (0.85691062 - 1.82750197 * u).atanh();
}

/// PDF of `sample_visible_wavelengths`.
#[inline]
pub fn visible_wavelengths_pdf(lambda: Float) -> Float {
    if !(LAMBDA_MIN..=LAMBDA_MAX).contains(&lambda) {
        return 0.0;
    }
    #[cfg(not(feature = "use-f64"))]
    return 0.003939804 / (0.0072 * (lambda - 538.0)).cosh().powi(2);
    #[cfg(feature = "use-f64")]
    return 0.0039398042 / (0.0072 * (lambda - 538.0)).cosh().powi(2);
}
