//! Built-in edge-resolved traffic engine.
//!
//! Each edge carries a vehicle count and obeys a Greenshields speed-density
//! law. Every step, an edge sends up to its demand (scaled by its green
//! share) to its neighbor edges, limited by each receiver's supply; a fixed
//! share of the sent vehicles completes its trip and leaves the network.
//! Origin demand enters each region spread over its edges by lane-km.
//!
//! Used for offline calibration runs and tests. A vehicle-level simulator
//! plugs in through the same [`SimulationEngine`] trait.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rf_controls::{ActuatorCommand, CommandValue};
use rf_core::{EdgeId, Time, s, to_seconds};
use rf_model::DemandTensor;
use rf_network::{Channel, Network, RegionPartition};
use rf_results::TripRecord;
use serde::{Deserialize, Serialize};
use uom::si::velocity::meter_per_second;

use crate::engine::SimulationEngine;
use crate::error::{SimError, SimResult};

pub const VERSION: &str = "regional-0.1";
const VEHICLE_LENGTH_M: f64 = 5.0;

/// Emission factors per vehicle-km in milligrams: CO2, CO, HC, PMx, NOx, fuel.
const EMISSION_MG_PER_KM: [f64; 6] = [160_000.0, 500.0, 50.0, 5.0, 300.0, 55_000.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalEngineConfig {
    /// Integration step in seconds.
    pub step_s: f64,
    /// Vehicles per lane-km at standstill.
    pub jam_density: f64,
    /// Vehicles per lane-km on every edge at time zero.
    pub initial_density: f64,
    /// Share of sent vehicles that finish their trip.
    pub exit_share: f64,
    /// Relative uniform noise applied to injected demand.
    pub demand_noise: f64,
    pub seed: u64,
    /// Fail any advance past this time (seconds). Used to exercise teardown.
    pub fail_at_s: Option<f64>,
}

impl Default for RegionalEngineConfig {
    fn default() -> Self {
        Self {
            step_s: 1.0,
            jam_density: 140.0,
            initial_density: 10.0,
            exit_share: 0.1,
            demand_noise: 0.0,
            seed: 0,
            fail_at_s: None,
        }
    }
}

impl RegionalEngineConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.step_s.is_finite() && self.step_s > 0.0) {
            return Err(SimError::InvalidArg {
                what: "engine step must be positive",
            });
        }
        if !(self.jam_density.is_finite() && self.jam_density > 0.0) {
            return Err(SimError::InvalidArg {
                what: "jam density must be positive",
            });
        }
        if !(self.initial_density >= 0.0 && self.initial_density < self.jam_density) {
            return Err(SimError::InvalidArg {
                what: "initial density must lie in [0, jam density)",
            });
        }
        if !(self.exit_share > 0.0 && self.exit_share <= 1.0) {
            return Err(SimError::InvalidArg {
                what: "exit share must lie in (0, 1]",
            });
        }
        if !(self.demand_noise >= 0.0 && self.demand_noise < 1.0) {
            return Err(SimError::InvalidArg {
                what: "demand noise must lie in [0, 1)",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct EdgeState {
    vehicles: f64,
    free_speed_kmh: f64,
    green_share: f64,
    lanes: f64,
    lane_km: f64,
}

#[derive(Debug)]
pub struct RegionalEngine {
    config: RegionalEngineConfig,
    network: Network,
    /// Per region: (edge index, share of the region's lane-km).
    injection: Vec<Vec<(usize, f64)>>,
    demand: DemandTensor,
    edges: Vec<EdgeState>,
    time_s: f64,
    rng: SmallRng,
    pending_exits: f64,
    entered: f64,
    vehicle_seconds: f64,
    waiting_seconds: f64,
    trips: Vec<TripRecord>,
    closed: bool,
}

impl RegionalEngine {
    pub fn new(
        network: Network,
        partition: &RegionPartition,
        demand: DemandTensor,
        config: RegionalEngineConfig,
    ) -> SimResult<Self> {
        config.validate()?;
        if partition.labels().len() != network.len() {
            return Err(SimError::InvalidArg {
                what: "partition does not belong to this network",
            });
        }
        if demand.n_regions() != partition.n_regions() {
            return Err(SimError::InvalidArg {
                what: "demand tensor region count differs from the partition",
            });
        }

        let edges: Vec<EdgeState> = network
            .edges()
            .iter()
            .map(|e| EdgeState {
                vehicles: config.initial_density * e.lane_km(),
                free_speed_kmh: e.max_speed.get::<meter_per_second>() * 3.6,
                green_share: 1.0,
                lanes: e.lanes as f64,
                lane_km: e.lane_km(),
            })
            .collect();

        let injection = (0..partition.n_regions())
            .map(|r| {
                let total = partition.lane_km(&network, r);
                partition
                    .members(r)
                    .iter()
                    .map(|&e| (e.idx(), edges[e.idx()].lane_km / total))
                    .collect()
            })
            .collect();

        let entered = edges.iter().map(|e| e.vehicles).sum();
        let rng = SmallRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            network,
            injection,
            demand,
            edges,
            time_s: 0.0,
            rng,
            pending_exits: 0.0,
            entered,
            vehicle_seconds: 0.0,
            waiting_seconds: 0.0,
            trips: Vec::new(),
            closed: false,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    fn density(&self, e: usize) -> f64 {
        self.edges[e].vehicles / self.edges[e].lane_km
    }

    fn speed_kmh(&self, e: usize) -> f64 {
        let free = self.edges[e].free_speed_kmh;
        (free * (1.0 - self.density(e) / self.config.jam_density)).max(0.0)
    }

    /// Vehicles per hour crossing the edge.
    fn flow(&self, e: usize) -> f64 {
        self.edges[e].lanes * self.density(e) * self.speed_kmh(e)
    }

    fn lane_capacity(&self, e: usize) -> f64 {
        self.edges[e].free_speed_kmh * self.config.jam_density / 4.0
    }

    fn sending(&self, e: usize) -> f64 {
        if self.density(e) <= self.config.jam_density / 2.0 {
            self.flow(e)
        } else {
            self.edges[e].lanes * self.lane_capacity(e)
        }
    }

    fn receiving(&self, e: usize) -> f64 {
        if self.density(e) <= self.config.jam_density / 2.0 {
            self.edges[e].lanes * self.lane_capacity(e)
        } else {
            self.flow(e)
        }
    }

    fn idle_share(&self, e: usize) -> f64 {
        let free = self.edges[e].free_speed_kmh;
        if free > 0.0 {
            1.0 - self.speed_kmh(e) / free
        } else {
            1.0
        }
    }

    fn step(&mut self, dt: f64) {
        let n = self.edges.len();
        let dt_h = dt / 3600.0;
        let exit_share = self.config.exit_share;

        let send: Vec<f64> = (0..n)
            .map(|e| (self.sending(e) * self.edges[e].green_share * dt_h).min(self.edges[e].vehicles))
            .collect();

        let mut wish_in = vec![0.0; n];
        for (e, &sent) in send.iter().enumerate() {
            let neighbors = self.network.neighbors(EdgeId::from_usize(e));
            if neighbors.is_empty() {
                continue;
            }
            let share = sent * (1.0 - exit_share) / neighbors.len() as f64;
            for nb in neighbors {
                wish_in[nb.idx()] += share;
            }
        }
        let accept: Vec<f64> = (0..n)
            .map(|e| {
                if wish_in[e] > 0.0 {
                    (self.receiving(e) * dt_h / wish_in[e]).min(1.0)
                } else {
                    1.0
                }
            })
            .collect();

        let mut delta = vec![0.0; n];
        let mut exits = 0.0;
        for (e, &sent) in send.iter().enumerate() {
            let neighbors = self.network.neighbors(EdgeId::from_usize(e));
            if neighbors.is_empty() {
                delta[e] -= sent;
                exits += sent;
                continue;
            }
            let share = sent * (1.0 - exit_share) / neighbors.len() as f64;
            for nb in neighbors {
                let moved = share * accept[nb.idx()];
                delta[e] -= moved;
                delta[nb.idx()] += moved;
            }
            delta[e] -= sent * exit_share;
            exits += sent * exit_share;
        }

        let slot = self.time_s.floor() as usize;
        for (origin, targets) in self.injection.iter().enumerate() {
            let rate: f64 = (0..self.demand.n_regions())
                .map(|d| self.demand.get(origin, d, slot))
                .sum();
            if rate <= 0.0 {
                continue;
            }
            let noise = self.config.demand_noise;
            let factor = if noise > 0.0 {
                1.0 + self.rng.gen_range(-noise..=noise)
            } else {
                1.0
            };
            let vehicles = rate * dt * factor;
            for &(e, weight) in targets {
                delta[e] += vehicles * weight;
            }
            self.entered += vehicles;
        }

        for (e, d) in delta.into_iter().enumerate() {
            let cap = self.config.jam_density * self.edges[e].lane_km;
            self.edges[e].vehicles = (self.edges[e].vehicles + d).clamp(0.0, cap);
        }

        let mut occupancy = 0.0;
        let mut waiting = 0.0;
        for e in 0..n {
            occupancy += self.edges[e].vehicles;
            waiting += self.edges[e].vehicles * self.idle_share(e);
        }
        self.vehicle_seconds += occupancy * dt;
        self.waiting_seconds += waiting * dt;
        self.time_s += dt;

        self.pending_exits += exits;
        while self.pending_exits >= 1.0 {
            self.pending_exits -= 1.0;
            let trip = self.completed_trip();
            self.trips.push(trip);
        }
    }

    /// A finished trip with network-average travel and waiting times
    /// (Little's law over the run so far).
    fn completed_trip(&self) -> TripRecord {
        let entered = self.entered.max(1.0);
        let travel = self.vehicle_seconds / entered;
        let waiting = self.waiting_seconds / entered;

        let (moving, total) = (0..self.edges.len()).fold((0.0, 0.0), |(m, t), e| {
            (m + self.edges[e].vehicles * self.speed_kmh(e), t + self.edges[e].vehicles)
        });
        let mean_speed_kmh = if total > 0.0 { moving / total } else { 0.0 };
        let distance_km = mean_speed_kmh * travel / 3600.0;
        let idle = if travel > 0.0 { waiting / travel } else { 0.0 };
        let per_trip = |factor: f64| factor * distance_km * (1.0 + idle);

        TripRecord {
            vehicle: format!("veh{}", self.trips.len()),
            depart_s: (self.time_s - travel).max(0.0),
            travel_time_s: travel,
            waiting_time_s: waiting,
            co2_mg: per_trip(EMISSION_MG_PER_KM[0]),
            co_mg: per_trip(EMISSION_MG_PER_KM[1]),
            hc_mg: per_trip(EMISSION_MG_PER_KM[2]),
            pmx_mg: per_trip(EMISSION_MG_PER_KM[3]),
            nox_mg: per_trip(EMISSION_MG_PER_KM[4]),
            fuel_mg: per_trip(EMISSION_MG_PER_KM[5]),
        }
    }

    fn channel_value(&self, e: usize, channel: Channel) -> f64 {
        let veh_km_per_s = self.edges[e].vehicles * self.speed_kmh(e) / 3600.0;
        let emission = |i: usize| EMISSION_MG_PER_KM[i] * veh_km_per_s * (1.0 + self.idle_share(e));
        match channel {
            Channel::Density => self.density(e),
            Channel::Flow => self.flow(e),
            Channel::Co2Emission => emission(0),
            Channel::CoEmission => emission(1),
            Channel::HcEmission => emission(2),
            Channel::PmxEmission => emission(3),
            Channel::NoxEmission => emission(4),
            Channel::FuelConsumption => emission(5),
            Channel::Occupancy => 100.0 * self.density(e) / self.config.jam_density,
            Channel::MeanSpeed => self.speed_kmh(e) / 3.6,
            Channel::MeanLength => {
                if self.edges[e].vehicles > 0.0 {
                    VEHICLE_LENGTH_M
                } else {
                    0.0
                }
            }
            Channel::WaitingTime => self.edges[e].vehicles * self.idle_share(e) * self.config.step_s,
            Channel::NoiseEmission => {
                let q = self.flow(e);
                if q > 0.0 { 40.0 + 10.0 * q.log10() } else { 0.0 }
            }
            Channel::ElectricityConsumption => 0.0,
        }
    }

    fn ensure_open(&self) -> SimResult<()> {
        if self.closed {
            return Err(SimError::EngineClosed);
        }
        Ok(())
    }
}

impl SimulationEngine for RegionalEngine {
    fn version(&self) -> &str {
        VERSION
    }

    fn time(&self) -> Time {
        s(self.time_s)
    }

    fn advance(&mut self, to: Time) -> SimResult<()> {
        self.ensure_open()?;
        let target = to_seconds(to);
        if !target.is_finite() {
            return Err(SimError::InvalidArg {
                what: "advance target must be finite",
            });
        }
        if let Some(fail_at) = self.config.fail_at_s
            && target > fail_at
        {
            return Err(SimError::Engine {
                message: format!("engine failure injected at t = {fail_at} s"),
            });
        }
        while self.time_s < target - 1e-9 {
            let dt = self.config.step_s.min(target - self.time_s);
            self.step(dt);
        }
        Ok(())
    }

    fn read_edge_telemetry(&self, edge: EdgeId, channels: &[Channel]) -> SimResult<Vec<f64>> {
        self.ensure_open()?;
        let e = edge.idx();
        if e >= self.edges.len() {
            return Err(SimError::Engine {
                message: format!("unknown edge {edge}"),
            });
        }
        Ok(channels.iter().map(|&c| self.channel_value(e, c)).collect())
    }

    fn apply_actuator_command(&mut self, command: &ActuatorCommand) -> SimResult<()> {
        self.ensure_open()?;
        let e = command.edge.idx();
        let Some(state) = self.edges.get_mut(e) else {
            return Err(SimError::Engine {
                message: format!("command for unknown edge {}", command.edge),
            });
        };
        match &command.value {
            CommandValue::SignalProgram(phases) => {
                let active = phases.green + phases.red;
                if active > 0.0 {
                    state.green_share = phases.green / active;
                }
            }
            CommandValue::SpeedLimit(v) => {
                let kmh = v.get::<meter_per_second>() * 3.6;
                if !(kmh.is_finite() && kmh > 0.0) {
                    return Err(SimError::Engine {
                        message: format!("invalid speed limit {kmh} km/h on edge {}", command.edge),
                    });
                }
                state.free_speed_kmh = kmh;
            }
        }
        Ok(())
    }

    fn trip_records(&self) -> Vec<TripRecord> {
        self.trips.clone()
    }

    fn close(&mut self) -> SimResult<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}
