use std::fmt;

use log::warn;

use crate::{
    geometry::{Point3f, Ray, Transform, Vec3f},
    paramdict::ParameterDictionary,
    sampling::{
        sample_exponential,
        spectrum::{
            ConstantSpectrum, DenselySampledSpectrum, SampledSpectrum, SampledWavelengths,
            Spectrum, SpectrumEnum,
        },
    },
    util::{Error, Rng},
    Float,
};

use super::{
    cloud::CloudMediumProvider,
    cuboid::CuboidMedium,
    grid::UniformGridMediumProvider,
    phase_function::{HGPhaseFunction, PhaseFunctionEnum},
    preset::scattering_preset,
    sparse::SparseGridMediumProvider,
};

/// Scattering and emission coefficients of a medium at a point,
/// resolved at a set of sampled wavelengths.
pub struct MediumProperties<'a> {
    pub sigma_a: SampledSpectrum,
    pub sigma_s: SampledSpectrum,
    pub phase: &'a PhaseFunctionEnum,
    pub le: SampledSpectrum,
}

/// Local density factors a provider reports for a point: separate
/// multipliers for the absorption and scattering coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct MediumDensity {
    pub sigma_a: SampledSpectrum,
    pub sigma_s: SampledSpectrum,
}

impl MediumDensity {
    pub fn new(sigma_a: SampledSpectrum, sigma_s: SampledSpectrum) -> Self {
        Self { sigma_a, sigma_s }
    }

    /// A single scalar density, applied to absorption and scattering alike.
    pub fn uniform(d: Float) -> Self {
        debug_assert!(d >= 0.0, "Provider densities should be non-negative");
        Self {
            sigma_a: SampledSpectrum::with_single_value(d),
            sigma_s: SampledSpectrum::with_single_value(d),
        }
    }
}

/// A tentative scattering event inside a medium, reported to the
/// free-flight sampling callback.
///
/// Borrows the medium and its phase function; the callback must not
/// retain these borrows past its return.
#[derive(Clone, Debug)]
pub struct MediumInteraction<'a> {
    /// The interaction point, in render space.
    pub p: Point3f,
    /// The direction the ray arrived from (unit length).
    pub wo: Vec3f,
    pub time: Float,
    pub sigma_a: SampledSpectrum,
    pub sigma_s: SampledSpectrum,
    /// The majorant extinction in effect at `p`.
    pub sigma_maj: SampledSpectrum,
    pub le: SampledSpectrum,
    pub medium: &'a MediumEnum,
    pub phase: &'a PhaseFunctionEnum,
}

#[derive(Clone, Debug)]
pub struct MediumSample<'a> {
    pub intr: MediumInteraction<'a>,
    /// Majorant transmittance along the segment since the previous
    /// reported event (or the start of traversal).
    pub t_maj: SampledSpectrum,
}

/// A participating medium. Shared read-only between ray-sampling
/// workers for the lifetime of the render.
#[derive(Debug)]
pub enum MediumEnum {
    Homogeneous(HomogeneousMedium),
    Cuboid(CuboidMedium),
}

/// Build a medium of the named kind from a parameter dictionary and its
/// render-from-medium transform.
pub fn create_medium(
    kind: &str,
    params: &ParameterDictionary,
    render_from_medium: &Transform,
) -> Result<MediumEnum, Error> {
    match kind {
        "homogeneous" => Ok(MediumEnum::Homogeneous(HomogeneousMedium::create(params)?)),
        "uniformgrid" => {
            let provider = UniformGridMediumProvider::create(params)?;
            Ok(MediumEnum::Cuboid(CuboidMedium::create(
                provider.into(),
                params,
                render_from_medium,
            )?))
        }
        "cloud" => {
            let provider = CloudMediumProvider::create(params)?;
            Ok(MediumEnum::Cuboid(CuboidMedium::create(
                provider.into(),
                params,
                render_from_medium,
            )?))
        }
        "sparsegrid" => {
            let provider = SparseGridMediumProvider::create(params)?;
            Ok(MediumEnum::Cuboid(CuboidMedium::create(
                provider.into(),
                params,
                render_from_medium,
            )?))
        }
        _ => Err(Error::UnknownMediumKind {
            loc: params.loc().cloned(),
            kind: kind.to_string(),
        }),
    }
}

impl MediumEnum {
    pub fn is_emissive(&self) -> bool {
        match self {
            Self::Homogeneous(m) => m.is_emissive(),
            Self::Cuboid(m) => m.is_emissive(),
        }
    }

    /// Resolve the medium's properties at the render-space point `p`.
    ///
    /// Pure and safe under concurrent invocation.
    pub fn sample_point(&self, p: Point3f, lambda: &SampledWavelengths) -> MediumProperties<'_> {
        match self {
            Self::Homogeneous(m) => m.sample_point(p, lambda),
            Self::Cuboid(m) => m.sample_point(p, lambda),
        }
    }

    /// Sample free-flight distances along `ray` through the medium with
    /// majorant transmittance sampling, reporting each tentative
    /// scattering event to `callback` in order of increasing distance.
    ///
    /// The callback returns `true` to continue past a null collision and
    /// `false` once a real collision is accepted; in the latter case the
    /// function immediately returns identity transmittance. Otherwise
    /// the return value is the majorant transmittance of the trailing
    /// unsampled segment.
    ///
    /// Distances reported to the callback and the `t_max` cutoff are in
    /// the normalized-direction parameterization of `ray`.
    pub fn sample_t_maj<F>(
        &self,
        ray: &Ray,
        t_max: Float,
        u: Float,
        rng: &mut Rng,
        lambda: &SampledWavelengths,
        callback: F,
    ) -> SampledSpectrum
    where
        F: FnMut(MediumSample) -> bool,
    {
        match self {
            Self::Homogeneous(m) => m.sample_t_maj(self, ray, t_max, u, lambda, callback),
            Self::Cuboid(m) => m.sample_t_maj(self, ray, t_max, u, rng, lambda, callback),
        }
    }
}

impl fmt::Display for MediumEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Homogeneous(m) => fmt::Display::fmt(m, f),
            Self::Cuboid(m) => fmt::Display::fmt(m, f),
        }
    }
}

/// A medium with spatially constant scattering and emission.
#[derive(Debug)]
pub struct HomogeneousMedium {
    sigma_a_spec: DenselySampledSpectrum,
    sigma_s_spec: DenselySampledSpectrum,
    le_spec: DenselySampledSpectrum,
    phase: PhaseFunctionEnum,
}

impl HomogeneousMedium {
    pub fn new(
        sigma_a: &impl Spectrum,
        sigma_s: &impl Spectrum,
        sigma_scale: Float,
        le: &impl Spectrum,
        le_scale: Float,
        g: Float,
    ) -> Self {
        let sigma_a_spec = DenselySampledSpectrum::new(sigma_a, None, None).scaled(sigma_scale);
        let sigma_s_spec = DenselySampledSpectrum::new(sigma_s, None, None).scaled(sigma_scale);
        let le_spec = DenselySampledSpectrum::new(le, None, None).scaled(le_scale);
        let phase = HGPhaseFunction::new(g).into();

        Self {
            sigma_a_spec,
            sigma_s_spec,
            le_spec,
            phase,
        }
    }

    pub fn create(params: &ParameterDictionary) -> Result<Self, Error> {
        let (sigma_a, sigma_s) = named_or_direct_scattering(params)?;
        let sigma_scale = params.get_one_float("scale", 1.0)?;
        let le = params
            .get_one_spectrum("Le")?
            .cloned()
            .unwrap_or_else(|| ConstantSpectrum::new(0.0).into());
        let le_scale = params.get_one_float("Lescale", 1.0)?;
        let g = params.get_one_float("g", 0.0)?;

        Ok(Self::new(&sigma_a, &sigma_s, sigma_scale, &le, le_scale, g))
    }

    pub fn is_emissive(&self) -> bool {
        self.le_spec.max_value() > 0.0
    }

    pub fn sample_point(
        &self,
        _p: Point3f,
        lambda: &SampledWavelengths,
    ) -> MediumProperties<'_> {
        MediumProperties {
            sigma_a: self.sigma_a_spec.sample(lambda),
            sigma_s: self.sigma_s_spec.sample(lambda),
            phase: &self.phase,
            le: self.le_spec.sample(lambda),
        }
    }

    /// Homogeneous free-flight sampling: a single exponential draw
    /// against the (constant) majorant, so at most one event is
    /// reported per invocation.
    pub fn sample_t_maj<F>(
        &self,
        handle: &MediumEnum,
        ray: &Ray,
        t_max: Float,
        u: Float,
        lambda: &SampledWavelengths,
        mut callback: F,
    ) -> SampledSpectrum
    where
        F: FnMut(MediumSample) -> bool,
    {
        // Normalize ray direction for homogeneous medium sampling
        let mut t_max = t_max * ray.d.length();
        let d = ray.d.normalized();

        // Compute scattering properties at the sampled wavelengths
        let sigma_a = self.sigma_a_spec.sample(lambda);
        let sigma_s = self.sigma_s_spec.sample(lambda);
        let sigma_maj = &sigma_a + &sigma_s;

        // Sample exponential to find t for the scattering event.
        // The hero wavelength drives the draw; the others contribute
        // through the returned transmittance only.
        if t_max.is_infinite() {
            t_max = Float::MAX;
        }
        if sigma_maj[0] == 0.0 {
            return (&sigma_maj * -t_max).fast_exp();
        }
        let t = sample_exponential(u, sigma_maj[0]);

        if t < t_max {
            // Report scattering event in homogeneous medium
            let t_maj = (&sigma_maj * -t).fast_exp();
            let le = self.le_spec.sample(lambda);
            let intr = MediumInteraction {
                p: ray.o + d * t,
                wo: -d,
                time: ray.time,
                sigma_a,
                sigma_s,
                sigma_maj,
                le,
                medium: handle,
                phase: &self.phase,
            };
            callback(MediumSample { intr, t_maj });

            SampledSpectrum::with_single_value(1.0)
        } else {
            (&sigma_maj * -t_max).fast_exp()
        }
    }
}

impl fmt::Display for HomogeneousMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ HomogeneousMedium sigma_a: {} sigma_s: {} Le: {} ]",
            self.sigma_a_spec.max_value(),
            self.sigma_s_spec.max_value(),
            self.le_spec.max_value(),
        )
    }
}

/// Resolve the scattering spectra for a medium: a named preset when one
/// is given and recognized, direct `sigma_a`/`sigma_s` spectra
/// otherwise, and unit constants as the last resort.
pub(super) fn named_or_direct_scattering(
    params: &ParameterDictionary,
) -> Result<(SpectrumEnum, SpectrumEnum), Error> {
    let preset = params.get_one_string("preset", "")?;
    if !preset.is_empty() {
        match scattering_preset(&preset) {
            Some(found) => return Ok(found),
            None => warn!("Material preset \"{preset}\" not found."),
        }
    }

    let sigma_a = params
        .get_one_spectrum("sigma_a")?
        .cloned()
        .unwrap_or_else(|| ConstantSpectrum::new(1.0).into());
    let sigma_s = params
        .get_one_spectrum("sigma_s")?
        .cloned()
        .unwrap_or_else(|| ConstantSpectrum::new(1.0).into());

    Ok((sigma_a, sigma_s))
}
