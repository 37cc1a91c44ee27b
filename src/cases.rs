//! Built-in test networks.

use crate::error::Result;
use crate::network::{Branch, Bus, Network};

/// Slack at 1.05 p.u. feeding 500 MW over a single 600 MVA line of
/// 0.01 + j0.10 p.u. on a 1000 MVA base.
pub fn two_bus() -> Result<Network> {
    let mut net = Network::new(1000.0);
    net.add_bus(Bus::slack("slack", 400.0, 1.05).generation(0.0, 1000.0))?;
    net.add_bus(Bus::pq("load", 400.0, 500.0, 0.0))?;
    net.add_branch(Branch::new("line", "slack", "load", 0.01, 0.10, 0.0).rating(600.0))?;
    Ok(net)
}

/// A 110 kV slack bus supplying one 100 MW load.
pub fn radial_two_bus() -> Result<Network> {
    let mut net = Network::new(100.0);
    net.add_bus(Bus::slack("1", 110.0, 1.0).generation(0.0, 250.0))?;
    net.add_bus(Bus::pq("2", 110.0, 100.0, 30.0))?;
    net.add_branch(Branch::new("1-2", "1", "2", 0.01, 0.10, 0.02))?;
    Ok(net)
}

/// Four 220 kV buses in a ring with one slack, one PV and two loads.
pub fn ring() -> Result<Network> {
    let mut net = Network::new(100.0);
    net.add_bus(Bus::slack("A", 220.0, 1.02).generation(0.0, 800.0))?;
    net.add_bus(Bus::pv("B", 220.0, 1.01, 300.0).generation(300.0, 500.0))?;
    net.add_bus(Bus::pq("C", 220.0, 400.0, 100.0))?;
    net.add_bus(Bus::pq("D", 220.0, 300.0, 80.0))?;
    for (from, to) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")] {
        let id = format!("{}-{}", from, to);
        net.add_branch(Branch::new(id, from, to, 0.005, 0.05, 0.02))?;
    }
    Ok(net)
}

/// A 110 kV feeder of `n` buses with 10 MW at every load bus.
pub fn radial(n: usize) -> Result<Network> {
    let mut net = Network::new(100.0);
    net.add_bus(Bus::slack("r0", 110.0, 1.0).generation(0.0, 10.0 * n as f64))?;
    for i in 1..n {
        net.add_bus(Bus::pq(format!("r{}", i), 110.0, 10.0, 2.0))?;
        let (from, to) = (format!("r{}", i - 1), format!("r{}", i));
        net.add_branch(Branch::new(format!("{}-{}", from, to), from, to, 0.01, 0.05, 0.0))?;
    }
    Ok(net)
}

/// A 110 kV ring of `n` buses, large enough to use sparse admittance
/// storage. Every 20th bus after the slack is a PV bus.
pub fn large(n: usize) -> Result<Network> {
    let mut net = Network::new(100.0);
    let name = |i: usize| format!("b{:03}", i);
    for i in 0..n {
        let bus = if i == 0 {
            Bus::slack(name(i), 110.0, 1.0).generation(0.0, 400.0)
        } else if i % 20 == 0 {
            Bus::pv(name(i), 110.0, 1.0, 30.0)
                .generation(30.0, 60.0)
                .load(2.0, 0.5)
        } else {
            Bus::pq(name(i), 110.0, 2.0, 0.5)
        };
        net.add_bus(bus)?;
    }
    for i in 0..n {
        let (from, to) = (name(i), name((i + 1) % n));
        net.add_branch(Branch::new(format!("{}-{}", from, to), from, to, 0.002, 0.01, 0.0))?;
    }
    Ok(net)
}
