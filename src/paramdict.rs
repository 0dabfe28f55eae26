//! Typed parameter dictionaries, the configuration surface the medium
//! factories consume. The surrounding scene parser builds these;
//! nothing here reads scene files.

use std::collections::HashMap;

use enum_as_inner::EnumAsInner;
use strum::EnumDiscriminants;

use crate::{
    geometry::Point3f,
    sampling::spectrum::SpectrumEnum,
    util::{Error, FileLoc},
    Float,
};

#[derive(Clone, Debug, EnumAsInner, EnumDiscriminants)]
#[strum_discriminants(name(ValueType))]
#[strum_discriminants(derive(strum::Display))]
pub enum Value {
    Float(Float),
    Int(i32),
    Bool(bool),
    Str(String),
    Spectrum(SpectrumEnum),
    FloatArray(Vec<Float>),
    Point(Point3f),
}

/// A string-keyed map of typed parameter values, with an optional source
/// location for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct ParameterDictionary {
    params: HashMap<String, Value>,
    loc: Option<FileLoc>,
}

impl ParameterDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loc(loc: FileLoc) -> Self {
        Self {
            params: HashMap::new(),
            loc: Some(loc),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn loc(&self) -> Option<&FileLoc> {
        self.loc.as_ref()
    }

    /// Build a configuration error for parameter `param`.
    pub fn error(&self, param: &str, reason: impl Into<String>) -> Error {
        Error::Config {
            loc: self.loc.clone(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    fn wrong_type(&self, name: &str, expected: &str, got: &Value) -> Error {
        self.error(
            name,
            format!("expected {expected}, got {}", ValueType::from(got)),
        )
    }

    /// Look up a single float, falling back to `default` when absent.
    /// Integer values are accepted and widened.
    pub fn get_one_float(&self, name: &str, default: Float) -> Result<Float, Error> {
        match self.params.get(name) {
            None => Ok(default),
            Some(Value::Float(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v as Float),
            Some(other) => Err(self.wrong_type(name, "a float", other)),
        }
    }

    /// Look up a single integer, falling back to `default` when absent.
    pub fn get_one_int(&self, name: &str, default: i32) -> Result<i32, Error> {
        match self.params.get(name) {
            None => Ok(default),
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(self.wrong_type(name, "an integer", other)),
        }
    }

    /// Look up a single boolean, falling back to `default` when absent.
    pub fn get_one_bool(&self, name: &str, default: bool) -> Result<bool, Error> {
        match self.params.get(name) {
            None => Ok(default),
            Some(Value::Bool(v)) => Ok(*v),
            Some(other) => Err(self.wrong_type(name, "a bool", other)),
        }
    }

    /// Look up a single string, falling back to `default` when absent.
    pub fn get_one_string(&self, name: &str, default: &str) -> Result<String, Error> {
        match self.params.get(name) {
            None => Ok(default.to_string()),
            Some(Value::Str(v)) => Ok(v.clone()),
            Some(other) => Err(self.wrong_type(name, "a string", other)),
        }
    }

    /// Look up a spectrum; absent parameters are `None`, not an error.
    pub fn get_one_spectrum(&self, name: &str) -> Result<Option<&SpectrumEnum>, Error> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::Spectrum(v)) => Ok(Some(v)),
            Some(other) => Err(self.wrong_type(name, "a spectrum", other)),
        }
    }

    /// Look up a point; absent parameters are `None`, not an error.
    pub fn get_point3(&self, name: &str) -> Result<Option<Point3f>, Error> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::Point(v)) => Ok(Some(*v)),
            Some(other) => Err(self.wrong_type(name, "a point", other)),
        }
    }

    /// Look up a float array; absent parameters are `None`, not an error.
    pub fn float_array(&self, name: &str) -> Result<Option<&[Float]>, Error> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::FloatArray(v)) => Ok(Some(v)),
            Some(other) => Err(self.wrong_type(name, "a float array", other)),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::sampling::spectrum::ConstantSpectrum;

    use super::*;

    #[test]
    fn lookups_fall_back_to_defaults() {
        let dict = ParameterDictionary::new();
        assert_eq!(dict.get_one_float("scale", 1.0).unwrap(), 1.0);
        assert_eq!(dict.get_one_string("preset", "").unwrap(), "");
        assert!(dict.get_one_spectrum("sigma_a").unwrap().is_none());
    }

    #[test]
    fn type_mismatch_is_a_config_error() {
        let mut dict = ParameterDictionary::new();
        dict.insert("g", Value::Str("nope".to_string()));

        let err = dict.get_one_float("g", 0.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"g\""), "unexpected message: {msg}");
        assert!(msg.contains("expected a float"), "unexpected message: {msg}");
    }

    #[test]
    fn stored_values_come_back_typed() {
        let mut dict = ParameterDictionary::with_loc(FileLoc::new("scene.txt", 7));
        dict.insert("g", Value::Float(0.4))
            .insert("nx", Value::Int(16))
            .insert("singlemajorant", Value::Bool(true))
            .insert("density", Value::FloatArray(vec![1.0, 2.0]))
            .insert("p0", Value::Point(Point3f::new(0.0, 0.0, 0.0)))
            .insert(
                "sigma_a",
                Value::Spectrum(ConstantSpectrum::new(0.5).into()),
            );

        assert_eq!(dict.get_one_float("g", 0.0).unwrap(), 0.4);
        assert_eq!(dict.get_one_int("nx", 1).unwrap(), 16);
        assert!(dict.get_one_bool("singlemajorant", false).unwrap());
        assert_eq!(dict.float_array("density").unwrap().unwrap().len(), 2);
        assert!(dict.get_point3("p0").unwrap().is_some());
        assert!(dict.get_one_spectrum("sigma_a").unwrap().is_some());
        assert_eq!(dict.loc().unwrap().line, 7);
    }
}
