use crate::network::Bus;
use crate::ybus::Ybus;
use num_complex::Complex64;

/// Builds the vector of complex bus power injections, that is, generation
/// minus load. Power is expressed in per-unit.
pub fn make_sbus(base_mva: f64, bus: &[Bus]) -> Vec<Complex64> {
    bus.iter()
        .map(|b| b.scheduled_injection() / base_mva)
        .collect()
}

/// Computed complex power injection `V .* conj(Ybus * V)`.
pub fn power_injection(y_bus: &Ybus, v: &[Complex64]) -> Vec<Complex64> {
    let i_bus = y_bus.mul_vec(v);
    v.iter().zip(&i_bus).map(|(v, i)| v * i.conj()).collect()
}

/// Power balance mismatch: computed minus scheduled injection.
pub fn power_mismatch(y_bus: &Ybus, v: &[Complex64], s_bus: &[Complex64]) -> Vec<Complex64> {
    power_injection(y_bus, v)
        .iter()
        .zip(s_bus)
        .map(|(s, sb)| s - sb)
        .collect()
}

/// Stacks `[real(mis[pvpq]); imag(mis[pq])]`.
pub fn mismatch_vector(mis: &[Complex64], pvpq: &[usize], pq: &[usize]) -> Vec<f64> {
    pvpq.iter()
        .map(|&i| mis[i].re)
        .chain(pq.iter().map(|&i| mis[i].im))
        .collect()
}
