//! Per-edge telemetry channels.

use serde::{Deserialize, Serialize};

/// One named numeric telemetry channel exposed by every edge.
///
/// The order of [`Channel::ALL`] is fixed; telemetry matrices use it as the
/// column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Vehicles per lane-kilometer.
    Density,
    /// Vehicles per hour entering the edge.
    Flow,
    Co2Emission,
    CoEmission,
    HcEmission,
    PmxEmission,
    NoxEmission,
    FuelConsumption,
    Occupancy,
    MeanSpeed,
    MeanLength,
    WaitingTime,
    NoiseEmission,
    ElectricityConsumption,
}

impl Channel {
    pub const ALL: [Channel; 14] = [
        Channel::Density,
        Channel::Flow,
        Channel::Co2Emission,
        Channel::CoEmission,
        Channel::HcEmission,
        Channel::PmxEmission,
        Channel::NoxEmission,
        Channel::FuelConsumption,
        Channel::Occupancy,
        Channel::MeanSpeed,
        Channel::MeanLength,
        Channel::WaitingTime,
        Channel::NoiseEmission,
        Channel::ElectricityConsumption,
    ];

    /// Column position in [`Channel::ALL`].
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Density => "density",
            Channel::Flow => "flow",
            Channel::Co2Emission => "co2_emission",
            Channel::CoEmission => "co_emission",
            Channel::HcEmission => "hc_emission",
            Channel::PmxEmission => "pmx_emission",
            Channel::NoxEmission => "nox_emission",
            Channel::FuelConsumption => "fuel_consumption",
            Channel::Occupancy => "occupancy",
            Channel::MeanSpeed => "mean_speed",
            Channel::MeanLength => "mean_length",
            Channel::WaitingTime => "waiting_time",
            Channel::NoiseEmission => "noise_emission",
            Channel::ElectricityConsumption => "electricity_consumption",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
