use crate::network::Network;
use std::collections::BTreeMap;

/// Marginal cost (€/MWh) assumed for a generator at a given voltage level.
pub fn marginal_cost(base_kv: f64) -> f64 {
    if base_kv >= 400.0 {
        30.0
    } else if base_kv >= 220.0 {
        50.0
    } else {
        80.0
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchResult {
    /// Generator bus id to output (MW).
    pub setpoints: BTreeMap<String, f64>,
    /// €/h.
    pub total_cost: f64,
    /// Cost of the last unit dispatched (€/MWh).
    pub marginal_price: f64,
    /// Demand that could not be covered (MW).
    pub unserved: f64,
}

/// Merit-order dispatch of online generators against the network's total
/// load. Units of equal cost are loaded in bus order.
pub fn economic_dispatch(network: &Network) -> DispatchResult {
    let mut units: Vec<(&str, f64, f64)> = network
        .buses()
        .iter()
        .filter(|b| b.gen_online && b.gen_p_max > 0.0)
        .map(|b| (b.id.as_str(), b.gen_p_max, marginal_cost(b.base_kv)))
        .collect();
    units.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut remaining = network.total_load();
    let mut result = DispatchResult::default();
    for (id, capacity, cost) in units {
        let p = capacity.min(remaining.max(0.0));
        if p > 0.0 {
            result.total_cost += p * cost;
            result.marginal_price = cost;
        }
        remaining -= p;
        result.setpoints.insert(id.to_string(), p);
    }
    result.unserved = remaining.max(0.0);

    if result.unserved > 0.0 {
        log::warn!(
            "insufficient generation capacity: {:.1} MW unserved",
            result.unserved
        );
    }
    log::info!("economic dispatch: {:.0} €/h total cost", result.total_cost);
    result
}
