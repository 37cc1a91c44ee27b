//! Continental Europe grid-code parameters (ENTSO-E SO GL) used as
//! defaults by every controller and analysis in the crate.

/// Frequency quality parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyStandards {
    /// Nominal frequency (Hz).
    pub nominal: f64,
    /// Normal-state band, ±Hz.
    pub standard_range: f64,
    /// Alert-state band, ±Hz.
    pub max_steady_state_deviation: f64,
    /// Emergency-state band, ±Hz.
    pub max_instantaneous_deviation: f64,
    /// Minutes allowed to return to the standard range before an alert
    /// escalates to emergency.
    pub time_to_restore: f64,
    /// Reliability score lost per step outside the standard range.
    pub reliability_decay: f64,

    /// FCR full activation time (s).
    pub fcr_full_activation_time: f64,
    /// Deviation at which FCR is fully activated (Hz).
    pub fcr_full_activation_deviation: f64,
    /// FCR deadband (Hz).
    pub fcr_deadband: f64,
}

impl Default for FrequencyStandards {
    fn default() -> Self {
        Self {
            nominal: 50.0,
            standard_range: 0.050,
            max_steady_state_deviation: 0.200,
            max_instantaneous_deviation: 0.800,
            time_to_restore: 15.0,
            reliability_decay: 0.1,
            fcr_full_activation_time: 30.0,
            fcr_full_activation_deviation: 0.200,
            fcr_deadband: 0.010,
        }
    }
}

/// Operational voltage bands, per unit of the nominal level.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageStandards {
    pub band_110_300kv: (f64, f64),
    pub band_300_400kv: (f64, f64),
    /// Standard nominal levels (kV).
    pub levels: Vec<u32>,
    /// Relative margin outside a band limit that makes a violation severe.
    pub severity_margin: f64,
}

impl Default for VoltageStandards {
    fn default() -> Self {
        Self {
            band_110_300kv: (0.90, 1.118),
            band_300_400kv: (0.90, 1.05),
            levels: vec![400, 220, 110, 50, 20, 10],
            severity_margin: 0.05,
        }
    }
}

impl VoltageStandards {
    /// Returns the (min, max) operating band for a nominal voltage level.
    /// Levels below 110 kV use the 110-300 kV band.
    pub fn limits(&self, kv: f64) -> (f64, f64) {
        if kv >= 300.0 {
            self.band_300_400kv
        } else {
            self.band_110_300kv
        }
    }

    pub fn is_standard_level(&self, kv: f64) -> bool {
        self.levels.iter().any(|&l| (l as f64 - kv).abs() < 1e-9)
    }
}

/// Balancing reserve parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveStandards {
    /// Dimensioning incident (MW).
    pub reference_incident: f64,
    /// Interval between FRR corrections (s).
    pub frr_activation_interval: f64,
    /// FRR requested per Hz of deviation (MW/Hz).
    pub frr_gain: f64,
    /// Share of available FRR that may be activated at once.
    pub frr_max_fraction: f64,
    /// Effective system inertia used by the stepping model (MW·s/Hz).
    pub inertia: f64,
    /// Inertia constant H used by the transient response model (s).
    pub inertia_constant: f64,
    /// FCR held as a share of online generation.
    pub fcr_share: f64,
    /// FCR activation above which an activation is counted.
    pub fcr_significant_activation: f64,
    /// FRR delivery above which an activation is counted (MW).
    pub frr_significant_activation: f64,
    /// Generation lost per Hz of immediate frequency drop (MW/Hz).
    pub trip_sensitivity: f64,
    /// Load added per Hz of immediate frequency drop (MW/Hz).
    pub load_step_sensitivity: f64,
    /// Governor droop damping of the transient model (1/s).
    pub governor_droop: f64,
}

impl Default for ReserveStandards {
    fn default() -> Self {
        Self {
            reference_incident: 3000.0,
            frr_activation_interval: 30.0,
            frr_gain: 10_000.0,
            frr_max_fraction: 0.8,
            inertia: 50_000.0,
            inertia_constant: 5.0,
            fcr_share: 0.02,
            fcr_significant_activation: 0.1,
            frr_significant_activation: 50.0,
            trip_sensitivity: 20_000.0,
            load_step_sensitivity: 30_000.0,
            governor_droop: 0.1,
        }
    }
}

/// Per-length line constants for one voltage class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineConstants {
    /// Series resistance (Ω/km).
    pub r: f64,
    /// Series reactance (Ω/km).
    pub x: f64,
    /// Thermal limit (MVA).
    pub thermal_limit: f64,
}

/// Network design and security parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStandards {
    pub line_400kv: LineConstants,
    pub line_220kv: LineConstants,
    pub line_110kv: LineConstants,
    /// Thermal limit below 110 kV (MVA).
    pub line_mv_thermal_limit: f64,
    /// Shunt susceptance of transmission lines (S/km).
    pub transmission_susceptance: f64,
    /// Shunt susceptance of distribution lines (S/km).
    pub distribution_susceptance: f64,

    /// Whether N-1 security counts towards compliance.
    pub n1_required: bool,
    /// Spare capacity, as a share of load, that must remain after the
    /// largest unit trips.
    pub n1_generation_margin: f64,
    /// Branches rated below this are not analysed (MVA).
    pub n1_branch_materiality: f64,
    /// Generators smaller than this are not analysed (MW).
    pub n1_generator_materiality: f64,
    /// Voltage violation above which an outage is critical (pu).
    pub n1_voltage_critical: f64,
    /// Overload above which an outage is critical (percentage points).
    pub n1_thermal_critical: f64,
}

impl Default for NetworkStandards {
    fn default() -> Self {
        Self {
            line_400kv: LineConstants {
                r: 0.03,
                x: 0.3,
                thermal_limit: 3000.0,
            },
            line_220kv: LineConstants {
                r: 0.05,
                x: 0.35,
                thermal_limit: 1000.0,
            },
            line_110kv: LineConstants {
                r: 0.1,
                x: 0.4,
                thermal_limit: 300.0,
            },
            line_mv_thermal_limit: 100.0,
            transmission_susceptance: 4e-6,
            distribution_susceptance: 2e-6,
            n1_required: true,
            n1_generation_margin: 0.10,
            n1_branch_materiality: 100.0,
            n1_generator_materiality: 100.0,
            n1_voltage_critical: 0.05,
            n1_thermal_critical: 20.0,
        }
    }
}

impl NetworkStandards {
    fn constants(&self, kv: f64) -> LineConstants {
        if kv >= 400.0 {
            self.line_400kv
        } else if kv >= 220.0 {
            self.line_220kv
        } else {
            self.line_110kv
        }
    }

    /// Default thermal rating for a branch at the given level (MVA).
    pub fn thermal_limit(&self, kv: f64) -> f64 {
        if kv >= 110.0 {
            self.constants(kv).thermal_limit
        } else {
            self.line_mv_thermal_limit
        }
    }

    /// Series impedance (Ω) and rating (MVA) of a line of `length_km`.
    pub fn line_parameters(&self, kv: f64, length_km: f64) -> LineParameters {
        let c = self.constants(kv);
        LineParameters {
            r: c.r * length_km,
            x: c.x * length_km,
            thermal_limit: self.thermal_limit(kv),
        }
    }
}

/// Physical parameters of a line section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParameters {
    pub r: f64,
    pub x: f64,
    pub thermal_limit: f64,
}

/// Restoration capability requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct BlackstartStandards {
    /// Blackstart capacity as a share of load needed for compliance.
    pub min_capacity_fraction: f64,
    /// Largest share of a load picked up in one step.
    pub max_load_pickup: f64,
    /// Duration of one load pickup step (minutes).
    pub load_pickup_step: f64,
}

impl Default for BlackstartStandards {
    fn default() -> Self {
        Self {
            min_capacity_fraction: 0.10,
            max_load_pickup: 0.25,
            load_pickup_step: 5.0,
        }
    }
}

/// Automatic voltage regulator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct AvrStandards {
    pub kp: f64,
    pub ki: f64,
    /// Exciter time constant (s).
    pub time_constant: f64,
    /// Voltage droop used for coordinated reactive dispatch.
    pub voltage_droop: f64,
    pub excitation_ceiling: f64,
    pub excitation_floor: f64,
    /// Reactive power per unit of controller output, as a share of capacity.
    pub reactive_gain: f64,
}

impl Default for AvrStandards {
    fn default() -> Self {
        Self {
            kp: 20.0,
            ki: 5.0,
            time_constant: 1.0,
            voltage_droop: 0.05,
            excitation_ceiling: 2.0,
            excitation_floor: -1.0,
            reactive_gain: 0.25,
        }
    }
}

/// The complete parameter table. Construct once and share by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Standards {
    pub frequency: FrequencyStandards,
    pub voltage: VoltageStandards,
    pub reserves: ReserveStandards,
    pub network: NetworkStandards,
    pub blackstart: BlackstartStandards,
    pub avr: AvrStandards,
}

impl Standards {
    /// Operating band (p.u.) for a nominal level in kV.
    pub fn voltage_limits(&self, kv: f64) -> (f64, f64) {
        self.voltage.limits(kv)
    }

    /// Whether `pu` lies inside the band for `kv` (inclusive).
    pub fn validate_voltage_level(&self, pu: f64, kv: f64) -> bool {
        let (min, max) = self.voltage_limits(kv);
        min <= pu && pu <= max
    }

    pub fn summary(&self) -> String {
        let f = &self.frequency;
        let (lo_min, lo_max) = self.voltage.band_110_300kv;
        let (hi_min, hi_max) = self.voltage.band_300_400kv;
        format!(
            "Continental Europe SO GL parameters\n\
             nominal frequency:     {} Hz\n\
             normal band:           ±{:.0} mHz\n\
             alert band:            ±{:.0} mHz\n\
             emergency band:        ±{:.0} mHz\n\
             FCR deadband:          ±{:.0} mHz, full at ±{:.0} mHz in {} s\n\
             reference incident:    {} MW\n\
             110-300 kV band:       {}-{} pu\n\
             300-400 kV band:       {}-{} pu\n\
             N-1 generation margin: {:.0} %\n",
            f.nominal,
            f.standard_range * 1000.0,
            f.max_steady_state_deviation * 1000.0,
            f.max_instantaneous_deviation * 1000.0,
            f.fcr_deadband * 1000.0,
            f.fcr_full_activation_deviation * 1000.0,
            f.fcr_full_activation_time,
            self.reserves.reference_incident,
            lo_min,
            lo_max,
            hi_min,
            hi_max,
            self.network.n1_generation_margin * 100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_bands_by_level() {
        let s = Standards::default();
        assert_eq!(s.voltage.limits(400.0), (0.90, 1.05));
        assert_eq!(s.voltage.limits(220.0), (0.90, 1.118));
        assert_eq!(s.voltage.limits(20.0), (0.90, 1.118));
        assert!(s.validate_voltage_level(1.10, 220.0));
        assert!(!s.validate_voltage_level(1.10, 400.0));
    }

    #[test]
    fn line_parameters_scale_with_length() {
        let n = NetworkStandards::default();
        let p = n.line_parameters(400.0, 100.0);
        assert!((p.r - 3.0).abs() < 1e-12);
        assert!((p.x - 30.0).abs() < 1e-12);
        assert_eq!(p.thermal_limit, 3000.0);
        assert_eq!(n.thermal_limit(220.0), 1000.0);
        assert_eq!(n.thermal_limit(110.0), 300.0);
        assert_eq!(n.thermal_limit(20.0), 100.0);
    }
}
