/// Rounds `v` to the nearest f32 and widens it back.
pub fn quantize_to_f32(v: f64) -> f64 {
    v as f32 as f64
}

// lerp(a, b, t)
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn fract(v: f64) -> f64 {
    v - v.floor()
}

/// `floor(log2(v))` for a finite positive `v`, exact at powers of two.
pub fn floor_log2(v: f64) -> i32 {
    debug_assert!(v > 0.0 && v.is_finite(), "floor_log2 of {}", v);
    let bits = v.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    if exponent == 0 {
        // subnormal
        let mantissa = bits & ((1u64 << 52) - 1);
        return -1074 + (63 - mantissa.leading_zeros() as i32);
    }
    exponent - 1023
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_to_f32() {
        assert_eq!(quantize_to_f32(0.5), 0.5);
        assert_eq!(quantize_to_f32(0.1), 0.1f32 as f64);
        assert_ne!(quantize_to_f32(0.1), 0.1);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
    }

    #[test]
    fn test_fract() {
        assert_eq!(fract(1.25), 0.25);
        assert_eq!(fract(-0.25), 0.75);
        assert_eq!(fract(3.0), 0.0);
    }

    #[test]
    fn test_floor_log2() {
        assert_eq!(floor_log2(1.0), 0);
        assert_eq!(floor_log2(2.0), 1);
        assert_eq!(floor_log2(3.999), 1);
        assert_eq!(floor_log2(0.5), -1);
        assert_eq!(floor_log2(0.375), -2);
        assert_eq!(floor_log2(f64::MIN_POSITIVE), -1022);
        assert_eq!(floor_log2(f64::MIN_POSITIVE / 4.0), -1024);
    }
}
