use crate::network::{Bus, BusType};

/// Builds index lists for each type of bus (slack, PV, PQ).
///
/// PV buses whose generation is out of service are treated as PQ buses.
/// Slack buses keep their role regardless of generator status.
pub fn bus_types(bus: &[Bus]) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let slack = bus
        .iter()
        .enumerate()
        .filter(|(_, b)| b.bus_type == BusType::Slack)
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();
    let pv = bus
        .iter()
        .enumerate()
        .filter(|(_, b)| b.bus_type == BusType::PV && b.gen_online)
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();
    let pq = bus
        .iter()
        .enumerate()
        .filter(|(_, b)| b.bus_type == BusType::PQ || (b.bus_type == BusType::PV && !b.gen_online))
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();

    (slack, pv, pq)
}
