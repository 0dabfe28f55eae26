use crate::{float::MACHINE_EPSILON, Float};

#[inline]
pub fn lerp(v1: Float, v2: Float, t: Float) -> Float {
    (1.0 - t) * v1 + t * v2
}

/// Conservative bound on the relative error of `n` chained floating-point
/// operations.
pub fn gamma(n: i32) -> Float {
    let n = n as Float;
    (MACHINE_EPSILON * n) / (1.0 - n * MACHINE_EPSILON)
}

#[inline]
pub fn safe_sqrt(x: Float) -> Float {
    debug_assert!(x >= -1e-3, "sqrt of a significantly negative value");
    x.max(0.0).sqrt()
}

#[inline]
pub fn safe_asin(x: Float) -> Float {
    debug_assert!((-1.0001..=1.0001).contains(&x));
    x.clamp(-1.0, 1.0).asin()
}

#[inline]
pub fn safe_acos(x: Float) -> Float {
    debug_assert!((-1.0001..=1.0001).contains(&x));
    x.clamp(-1.0, 1.0).acos()
}

/// Evaluate the polynomial with the given coefficients
/// (constant term first) at `t`, via Horner's method.
#[inline]
pub fn evaluate_polynomial(t: Float, coefficients: &[Float]) -> Float {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |sum, &c| sum.mul_add(t, c))
}

/// Binary search for the last index in `[0, size - 2]` for which `pred` holds.
///
/// `pred` is assumed monotonic: true for a prefix of the indices, false after.
/// Returns `None` if `size < 2`; clamps to the valid range otherwise.
pub fn find_interval(size: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
    // If < 2, no valid result
    if size < 2 {
        return None;
    }

    // Perform a binary search
    let mut left = 0;
    let mut right = size - 1;

    while left < right {
        let mid = left + (right - left) / 2;

        // If pred is true, move left bound up
        if pred(mid) {
            left = mid + 1;
        } else {
            // Otherwise, move right bound down
            right = mid;
        }
    }

    if left == 0 {
        // No index satisfies pred, return 0
        Some(0)
    } else if left >= size - 1 {
        // All indices satisfy pred, return sz - 2 to stay in bounds
        Some(size - 2)
    } else {
        Some(left - 1)
    }
}
