use num_complex::Complex64;

pub const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Computes the infinity norm: `max(abs(a))`. Zero for an empty slice.
pub fn norm_inf(a: &[f64]) -> f64 {
    a.iter().fold(0.0, |max, v| f64::max(max, v.abs()))
}

/// Builds complex voltages from magnitude and angle (radians) vectors.
pub fn polar(vm: &[f64], va: &[f64]) -> Vec<Complex64> {
    vm.iter()
        .zip(va)
        .map(|(&m, &a)| Complex64::from_polar(m, a))
        .collect()
}

/// Euclidean distance between two canvas points.
pub fn distance(x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    f64::hypot(x1 - x0, y1 - y0)
}
