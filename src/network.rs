use crate::error::{GridError, Result};
use crate::standards::Standards;
use crate::ybus::{make_ybus, Ybus};
use num_complex::Complex64;
use num_traits::Zero;
use std::collections::{HashMap, VecDeque};

/// Branches with a smaller series impedance magnitude are ignored.
pub const MIN_IMPEDANCE: f64 = 1e-12;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BusType {
    /// Fixed active and reactive power.
    PQ,
    /// Fixed voltage magnitude and active power.
    PV,
    /// Reference voltage angle. Slack active and reactive power.
    Slack,
}

/// Bus is a node in the network graph. Generation and load connected to
/// the bus are aggregated into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: String,

    /// Nominal voltage (kV).
    pub base_kv: f64,

    pub bus_type: BusType,

    /// Voltage magnitude (p.u.). Setpoint for slack and PV buses.
    pub vm: f64,
    /// Voltage angle (radians).
    pub va: f64,

    /// Scheduled real power generation (MW).
    pub gen_p: f64,
    /// Scheduled reactive power generation (MVAr).
    pub gen_q: f64,
    pub gen_p_max: f64,
    pub gen_p_min: f64,
    /// Whether the connected generation is in service.
    pub gen_online: bool,

    /// Real power demand (MW).
    pub load_p: f64,
    /// Reactive power demand (MVAr).
    pub load_q: f64,

    /// Minimum operating voltage (p.u.).
    pub vmin: f64,
    /// Maximum operating voltage (p.u.). A zero band is filled in from the
    /// network's standards when the bus is added.
    pub vmax: f64,

    /// Computed net real power injection from the last converged solve (MW).
    pub p_inj: f64,
    /// Computed net reactive power injection from the last converged solve (MVAr).
    pub q_inj: f64,
}

impl Bus {
    /// Creates a bus at 1.0∠0. Its operating band is left unset so that
    /// the owning network supplies it.
    pub fn new(id: impl Into<String>, base_kv: f64, bus_type: BusType) -> Self {
        Self {
            id: id.into(),
            base_kv,
            bus_type,
            vm: 1.0,
            va: 0.0,
            gen_p: 0.0,
            gen_q: 0.0,
            gen_p_max: 0.0,
            gen_p_min: 0.0,
            gen_online: true,
            load_p: 0.0,
            load_q: 0.0,
            vmin: 0.0,
            vmax: 0.0,
            p_inj: 0.0,
            q_inj: 0.0,
        }
    }

    pub fn slack(id: impl Into<String>, base_kv: f64, vm: f64) -> Self {
        Self::new(id, base_kv, BusType::Slack).voltage(vm)
    }

    pub fn pv(id: impl Into<String>, base_kv: f64, vm: f64, p: f64) -> Self {
        Self::new(id, base_kv, BusType::PV)
            .voltage(vm)
            .generation(p, p)
    }

    pub fn pq(id: impl Into<String>, base_kv: f64, p: f64, q: f64) -> Self {
        Self::new(id, base_kv, BusType::PQ).load(p, q)
    }

    pub fn voltage(mut self, vm: f64) -> Self {
        self.vm = vm;
        self
    }

    pub fn generation(mut self, p: f64, p_max: f64) -> Self {
        self.gen_p = p;
        self.gen_p_max = p_max;
        self
    }

    pub fn load(mut self, p: f64, q: f64) -> Self {
        self.load_p = p;
        self.load_q = q;
        self
    }

    pub fn limits(mut self, vmin: f64, vmax: f64) -> Self {
        self.vmin = vmin;
        self.vmax = vmax;
        self
    }

    pub fn is_slack(&self) -> bool {
        self.bus_type == BusType::Slack
    }

    pub fn has_generator(&self) -> bool {
        self.gen_p_max > 0.0 || self.gen_p != 0.0
    }

    /// Scheduled complex power injection (generation minus load) in MVA.
    pub fn scheduled_injection(&self) -> Complex64 {
        let gen = if self.gen_online {
            Complex64::new(self.gen_p, self.gen_q)
        } else {
            Complex64::zero()
        };
        gen - Complex64::new(self.load_p, self.load_q)
    }

    /// Distance outside [vmin, vmax] (p.u.), zero when inside or when no
    /// band is set.
    pub fn voltage_violation(&self) -> f64 {
        if self.vmax <= 0.0 {
            0.0
        } else if self.vm < self.vmin {
            self.vmin - self.vm
        } else if self.vm > self.vmax {
            self.vm - self.vmax
        } else {
            0.0
        }
    }

    pub fn has_violation(&self) -> bool {
        self.voltage_violation() > 0.0
    }

    pub fn voltage_phasor(&self) -> Complex64 {
        Complex64::from_polar(self.vm, self.va)
    }
}

/// Branch is a transmission line connecting two buses, modelled as a
/// series impedance with the charging susceptance split between its ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: String,
    pub from_bus: String,
    pub to_bus: String,

    pub(crate) from: usize,
    pub(crate) to: usize,

    /// Resistance (p.u.).
    pub r: f64,
    /// Reactance (p.u.).
    pub x: f64,
    /// Total line charging susceptance (p.u.).
    pub b: f64,

    /// Thermal rating (MVA). Zero means "estimate from voltage level".
    pub rating: f64,

    pub online: bool,
    /// Breaker open.
    pub open: bool,

    /// Real power injected at "from" end (MW).
    pub p_from: f64,
    /// Reactive power injected at "from" end (MVAr).
    pub q_from: f64,
    /// Real power injected at "to" end (MW).
    pub p_to: f64,
    /// Reactive power injected at "to" end (MVAr).
    pub q_to: f64,
    /// Real power losses (MW).
    pub losses: f64,
    /// Apparent power flow at the "from" end as a percentage of rating.
    pub loading: f64,
}

impl Branch {
    pub fn new(
        id: impl Into<String>,
        from_bus: impl Into<String>,
        to_bus: impl Into<String>,
        r: f64,
        x: f64,
        b: f64,
    ) -> Self {
        Self {
            id: id.into(),
            from_bus: from_bus.into(),
            to_bus: to_bus.into(),
            from: 0,
            to: 0,
            r,
            x,
            b,
            rating: 0.0,
            online: true,
            open: false,
            p_from: 0.0,
            q_from: 0.0,
            p_to: 0.0,
            q_to: 0.0,
            losses: 0.0,
            loading: 0.0,
        }
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn impedance(&self) -> Complex64 {
        Complex64::new(self.r, self.x)
    }

    /// Online, closed and with a usable impedance.
    pub fn in_service(&self) -> bool {
        self.online && !self.open && self.impedance().norm() >= MIN_IMPEDANCE
    }

    pub fn from_index(&self) -> usize {
        self.from
    }

    pub fn to_index(&self) -> usize {
        self.to
    }

    pub(crate) fn clear_flows(&mut self) {
        self.p_from = 0.0;
        self.q_from = 0.0;
        self.p_to = 0.0;
        self.q_to = 0.0;
        self.losses = 0.0;
        self.loading = 0.0;
    }
}

/// Bus and branch state saved before an outage is applied.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    buses: Vec<Bus>,
    branches: Vec<Branch>,
}

/// Network models a power system as an undirected graph of buses and
/// branches. It owns the cached admittance matrix, which is rebuilt
/// lazily after any structural change.
#[derive(Debug, Clone)]
pub struct Network {
    /// System MVA base used for converting power into per-unit quantities.
    pub base_mva: f64,

    /// Above this many buses the admittance matrix is stored sparse.
    pub sparse_threshold: usize,

    standards: Standards,

    buses: Vec<Bus>,
    branches: Vec<Branch>,

    bus_index: HashMap<String, usize>,
    branch_index: HashMap<String, usize>,

    y_bus: Option<Ybus>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Network {
    pub fn new(base_mva: f64) -> Self {
        Self {
            base_mva,
            sparse_threshold: 100,
            standards: Standards::default(),
            buses: Vec::new(),
            branches: Vec::new(),
            bus_index: HashMap::new(),
            branch_index: HashMap::new(),
            y_bus: None,
        }
    }

    pub fn with_sparse_threshold(mut self, threshold: usize) -> Self {
        self.sparse_threshold = threshold;
        self.y_bus = None;
        self
    }

    pub fn with_standards(mut self, standards: Standards) -> Self {
        self.standards = standards;
        self
    }

    pub fn standards(&self) -> &Standards {
        &self.standards
    }

    /// Adds a bus. A bus without an operating band gets the band of its
    /// voltage level from the network's standards.
    pub fn add_bus(&mut self, mut bus: Bus) -> Result<usize> {
        if self.bus_index.contains_key(&bus.id) {
            return Err(GridError::DuplicateBus(bus.id));
        }
        if bus.vmax <= 0.0 {
            (bus.vmin, bus.vmax) = self.standards.voltage_limits(bus.base_kv);
        }
        if !self.standards.voltage.is_standard_level(bus.base_kv) {
            log::warn!(
                "bus {} uses non-standard voltage level {} kV",
                bus.id,
                bus.base_kv
            );
        }
        let idx = self.buses.len();
        self.bus_index.insert(bus.id.clone(), idx);
        self.buses.push(bus);
        self.invalidate();
        Ok(idx)
    }

    /// Adds a branch between two existing buses. A zero rating is replaced
    /// by the thermal limit of the from-bus voltage level.
    pub fn add_branch(&mut self, mut branch: Branch) -> Result<usize> {
        if self.branch_index.contains_key(&branch.id) {
            return Err(GridError::DuplicateBranch(branch.id));
        }
        let from = self.bus_position(&branch.from_bus)?;
        let to = self.bus_position(&branch.to_bus)?;
        branch.from = from;
        branch.to = to;

        if branch.rating <= 0.0 {
            branch.rating = self
                .standards
                .network
                .thermal_limit(self.buses[from].base_kv);
        }

        if branch.in_service() {
            let island = self.reachable_from(from);
            if !island[to] {
                let from_slack = self.island_has_slack(&island);
                let to_slack = self.island_has_slack(&self.reachable_from(to));
                if from_slack && to_slack {
                    return Err(GridError::MultipleSlack { element: branch.id });
                }
            }
        }

        let idx = self.branches.len();
        self.branch_index.insert(branch.id.clone(), idx);
        self.branches.push(branch);
        self.invalidate();
        Ok(idx)
    }

    /// Permanently removes a branch.
    pub fn remove_branch(&mut self, id: &str) -> Result<Branch> {
        let idx = self.branch_position(id)?;
        let branch = self.branches.remove(idx);
        self.branch_index = self
            .branches
            .iter()
            .enumerate()
            .map(|(i, br)| (br.id.clone(), i))
            .collect();
        self.invalidate();
        Ok(branch)
    }

    pub fn set_branch_online(&mut self, id: &str, online: bool) -> Result<()> {
        let idx = self.branch_position(id)?;
        self.branches[idx].online = online;
        self.invalidate();
        Ok(())
    }

    pub fn set_branch_open(&mut self, id: &str, open: bool) -> Result<()> {
        let idx = self.branch_position(id)?;
        self.branches[idx].open = open;
        self.invalidate();
        Ok(())
    }

    /// Takes the generation at a bus out of service.
    pub fn disable_generator(&mut self, bus_id: &str) -> Result<()> {
        let idx = self.bus_position(bus_id)?;
        let bus = &mut self.buses[idx];
        bus.gen_online = false;
        bus.gen_p = 0.0;
        bus.gen_q = 0.0;
        Ok(())
    }

    pub fn enable_generator(&mut self, bus_id: &str, p: f64) -> Result<()> {
        let idx = self.bus_position(bus_id)?;
        let bus = &mut self.buses[idx];
        bus.gen_online = true;
        bus.gen_p = p;
        Ok(())
    }

    /// Changes the role of a bus. Making a bus the slack fails when its
    /// island already has another slack bus.
    pub fn set_bus_type(&mut self, bus_id: &str, bus_type: BusType) -> Result<()> {
        let idx = self.bus_position(bus_id)?;
        if bus_type == BusType::Slack && !self.buses[idx].is_slack() {
            let island = self.reachable_from(idx);
            if self.island_has_slack(&island) {
                return Err(GridError::MultipleSlack {
                    element: bus_id.to_string(),
                });
            }
        }
        self.buses[idx].bus_type = bus_type;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.buses.clear();
        self.branches.clear();
        self.bus_index.clear();
        self.branch_index.clear();
        self.invalidate();
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub(crate) fn buses_mut(&mut self) -> &mut [Bus] {
        &mut self.buses
    }

    pub(crate) fn branches_mut(&mut self) -> &mut [Branch] {
        &mut self.branches
    }

    pub fn bus(&self, id: &str) -> Option<&Bus> {
        self.bus_index.get(id).map(|&i| &self.buses[i])
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branch_index.get(id).map(|&i| &self.branches[i])
    }

    pub fn bus_position(&self, id: &str) -> Result<usize> {
        self.bus_index
            .get(id)
            .copied()
            .ok_or_else(|| GridError::UnknownBus(id.to_string()))
    }

    fn branch_position(&self, id: &str) -> Result<usize> {
        self.branch_index
            .get(id)
            .copied()
            .ok_or_else(|| GridError::UnknownBranch(id.to_string()))
    }

    pub fn n_buses(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Drops the cached admittance matrix.
    pub fn invalidate(&mut self) {
        self.y_bus = None;
    }

    pub fn is_ybus_cached(&self) -> bool {
        self.y_bus.is_some()
    }

    /// Returns the bus admittance matrix, building and caching it if the
    /// network changed since it was last built.
    pub fn build_admittance_matrix(&mut self) -> &Ybus {
        let sparse = self.buses.len() > self.sparse_threshold;
        let (nb, branches) = (self.buses.len(), &self.branches);
        self.y_bus
            .get_or_insert_with(|| make_ybus(nb, branches, sparse))
    }

    fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.buses.len()];
        for br in self.branches.iter().filter(|br| br.in_service()) {
            adj[br.from].push(br.to);
            adj[br.to].push(br.from);
        }
        adj
    }

    fn reachable_from(&self, start: usize) -> Vec<bool> {
        let adj = self.adjacency();
        let mut seen = vec![false; self.buses.len()];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(i) = queue.pop_front() {
            for &j in &adj[i] {
                if !seen[j] {
                    seen[j] = true;
                    queue.push_back(j);
                }
            }
        }
        seen
    }

    fn island_has_slack(&self, island: &[bool]) -> bool {
        self.buses
            .iter()
            .zip(island)
            .any(|(b, &inside)| inside && b.is_slack())
    }

    /// Connected groups of bus indices over in-service branches.
    pub fn islands(&self) -> Vec<Vec<usize>> {
        let adj = self.adjacency();
        let mut label = vec![usize::MAX; self.buses.len()];
        let mut islands = Vec::new();
        for start in 0..self.buses.len() {
            if label[start] != usize::MAX {
                continue;
            }
            let id = islands.len();
            let mut members = vec![start];
            label[start] = id;
            let mut k = 0;
            while k < members.len() {
                let i = members[k];
                for &j in &adj[i] {
                    if label[j] == usize::MAX {
                        label[j] = id;
                        members.push(j);
                    }
                }
                k += 1;
            }
            members.sort_unstable();
            islands.push(members);
        }
        islands
    }

    /// Buses that can reach a slack bus through in-service branches.
    pub fn energized(&self) -> Vec<bool> {
        let mut energized = vec![false; self.buses.len()];
        for island in self.islands() {
            if island.iter().any(|&i| self.buses[i].is_slack()) {
                island.iter().for_each(|&i| energized[i] = true);
            }
        }
        energized
    }

    /// Demand on buses that are not energized (MW).
    pub fn unserved_load(&self) -> f64 {
        self.buses
            .iter()
            .zip(self.energized())
            .filter(|(_, e)| !e)
            .map(|(b, _)| b.load_p)
            .sum()
    }

    /// Copy of the network restricted to energized buses and the branches
    /// between them.
    pub fn energized_part(&self) -> Result<Network> {
        let energized = self.energized();
        let mut net = Network::new(self.base_mva)
            .with_sparse_threshold(self.sparse_threshold)
            .with_standards(self.standards.clone());
        for (bus, _) in self.buses.iter().zip(&energized).filter(|(_, &e)| e) {
            net.add_bus(bus.clone())?;
        }
        for br in &self.branches {
            if energized[br.from] && energized[br.to] {
                net.add_branch(br.clone())?;
            }
        }
        Ok(net)
    }

    pub fn total_load(&self) -> f64 {
        self.buses.iter().map(|b| b.load_p).sum()
    }

    /// Scheduled generation of in-service units (MW).
    pub fn total_generation(&self) -> f64 {
        self.buses
            .iter()
            .filter(|b| b.gen_online)
            .map(|b| b.gen_p)
            .sum()
    }

    pub fn total_losses(&self) -> f64 {
        self.branches.iter().map(|br| br.losses).sum()
    }

    /// Buses outside their operating band and by how much (p.u.).
    pub fn voltage_violations(&self) -> Vec<(String, f64)> {
        self.buses
            .iter()
            .filter(|b| b.has_violation())
            .map(|b| (b.id.clone(), b.voltage_violation()))
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            buses: self.buses.clone(),
            branches: self.branches.clone(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        self.buses = snapshot.buses;
        self.branches = snapshot.branches;
        self.invalidate();
    }
}
