// Copyright (c) 2022-2024, Richard Lincoln

use num_complex::Complex64;
use pretty_dtoa::{dtoa, FmtFloatConfig};
use std::f64::consts::PI;

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(6);

fn format_polar(z: &Complex64) -> String {
    format!(
        "{}\u{2220}{}\u{00B0}",
        dtoa(z.norm(), FLOAT_CONFIG),
        dtoa(z.arg() * 180.0 / PI, FLOAT_CONFIG)
    )
}

/// Formats bus voltages as `|V|∠deg` pairs for debug logging.
pub fn format_polar_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_polar).collect();
    format!("[{}]", a.join(", "))
}

/// One line per bus: id, magnitude (pu) and angle (degrees).
pub fn format_bus_table(ids: &[&str], vm: &[f64], va: &[f64]) -> String {
    let mut s = String::from("bus           |V| (pu)    angle (deg)\n");
    for ((id, m), a) in ids.iter().zip(vm).zip(va) {
        s.push_str(&format!(
            "{:<12}  {:<10}  {}\n",
            id,
            dtoa(*m, FLOAT_CONFIG),
            dtoa(a * 180.0 / PI, FLOAT_CONFIG)
        ));
    }
    s
}
