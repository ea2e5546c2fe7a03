pub fn squared_distance_f64(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0f64;
    for (&x, &y) in a.iter().zip(b) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0f64;
    for (&x, &y) in a.iter().zip(b) {
        sum += x * y;
    }
    sum
}

pub fn backend_name() -> &'static str {
    "scalar"
}

#[cfg(test)]
#[path = "../../tests/src_inline/simd/scalar.rs"]
mod tests;
