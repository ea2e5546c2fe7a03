use super::*;

#[test]
fn test_neon_matches_scalar() {
    let a = [0.5f64, 1.5, -2.0, 4.0, 9.0];
    let b = [1.5f64, 0.5, 2.0, -4.0, 3.0];
    assert_eq!(
        squared_distance_f64(&a, &b).to_bits(),
        crate::simd::scalar::squared_distance_f64(&a, &b).to_bits()
    );
    assert_eq!(
        dot_f64(&a, &b).to_bits(),
        crate::simd::scalar::dot_f64(&a, &b).to_bits()
    );
}
