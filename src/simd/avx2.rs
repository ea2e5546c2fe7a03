#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

pub fn squared_distance_f64(a: &[f64], b: &[f64]) -> f64 {
    // Lane products are exact per element; accumulate them in index order
    // so the result matches the scalar path bit for bit.
    let n = a.len().min(b.len());
    let mut sum = 0f64;
    let mut i = 0usize;
    unsafe {
        while i + 4 <= n {
            let va = _mm256_loadu_pd(a.as_ptr().add(i));
            let vb = _mm256_loadu_pd(b.as_ptr().add(i));
            let d = _mm256_sub_pd(va, vb);
            let sq = _mm256_mul_pd(d, d);
            let mut lanes = [0f64; 4];
            _mm256_storeu_pd(lanes.as_mut_ptr(), sq);
            for lane in &lanes {
                sum += *lane;
            }
            i += 4;
        }
    }
    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}

pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let mut sum = 0f64;
    let mut i = 0usize;
    unsafe {
        while i + 4 <= n {
            let va = _mm256_loadu_pd(a.as_ptr().add(i));
            let vb = _mm256_loadu_pd(b.as_ptr().add(i));
            let prod = _mm256_mul_pd(va, vb);
            let mut lanes = [0f64; 4];
            _mm256_storeu_pd(lanes.as_mut_ptr(), prod);
            for lane in &lanes {
                sum += *lane;
            }
            i += 4;
        }
    }
    while i < n {
        sum += a[i] * b[i];
        i += 1;
    }
    sum
}

pub fn backend_name() -> &'static str {
    "avx2"
}
