use crate::Float;

/// The PDF of the exponential distribution with rate `a`, at `x >= 0`.
#[inline]
pub fn exponential_pdf(x: Float, a: Float) -> Float {
    a * (-a * x).exp()
}

/// Draw from the exponential distribution with rate `a`,
/// using the uniform sample `u` in `[0, 1)`.
#[inline]
pub fn sample_exponential(u: Float, a: Float) -> Float {
    debug_assert!(a > 0.0, "Exponential rate should be positive");
    -(1.0 - u).ln() / a
}

/// For the exponential distribution with rate `a`, return the uniform
/// sample that maps to the value `x`.
#[inline]
pub fn invert_exponential_sample(x: Float, a: Float) -> Float {
    1.0 - (-a * x).exp()
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn exponential_sample_round_trips() {
        let a = 2.5;
        for u in [0.0, 0.1, 0.5, 0.9, 0.999] {
            let x = sample_exponential(u, a);
            assert_relative_eq!(invert_exponential_sample(x, a), u, epsilon = 1e-5);
        }
    }

    #[test]
    fn median_of_unit_rate_is_ln2() {
        assert_relative_eq!(
            sample_exponential(0.5, 1.0),
            std::f64::consts::LN_2 as Float,
            max_relative = 1e-6
        );
    }
}
