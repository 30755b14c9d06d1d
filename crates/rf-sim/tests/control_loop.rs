//! Closed-loop runs against the built-in engine and a recording engine.

use std::sync::{Arc, Mutex};

use rf_controls::{
    ActuatorClass, ActuatorCommand, ActuatorGroup, ActuatorPlacement, ControlClock, Controller,
    ControllerSpec, MpcConfig, SignalPlan,
};
use rf_core::{EdgeId, Time, m, s, to_seconds};
use rf_mfd::{OutputKind, Polynomial, Pwa, RegionMfd};
use rf_model::{CompletionRate, DemandTensor, LinearDynamicsModel, RoutingTable};
use rf_network::{Channel, Network, NetworkBuilder, RegionPartition};
use rf_results::TripRecord;
use rf_sim::*;

fn mfd(jam: f64) -> RegionMfd {
    // 0.5 x (jam - x)
    let curve = Polynomial::new(vec![0.0, 0.5 * jam, -0.5]);
    RegionMfd {
        pwa: Pwa::build(&curve, jam / 2.0, jam, 4).unwrap(),
        curve,
        critical_density: jam / 2.0,
        jam_density: jam,
    }
}

struct Setup {
    network: Network,
    partition: RegionPartition,
    model: LinearDynamicsModel,
    group: ActuatorGroup,
    demand: DemandTensor,
}

fn setup() -> Setup {
    let mut b = NetworkBuilder::new();
    let e: Vec<_> = (0..4).map(|i| b.add_edge(format!("e{i}"), m(400.0), 2)).collect();
    for i in 0..4 {
        b.connect(e[i], e[(i + 1) % 4]);
    }
    let network = b.build().unwrap();
    let partition = RegionPartition::from_labels(&network, &[0, 0, 1, 1]).unwrap();
    let routing = RoutingTable::uniform(partition.adjacency(), 0.4).unwrap();
    let model = LinearDynamicsModel::from_partition(
        &network,
        &partition,
        vec![mfd(120.0), mfd(140.0)],
        routing,
        CompletionRate::default(),
    )
    .unwrap();

    let plan = SignalPlan {
        cycle: 90.0,
        yellow: 3.0,
        red: 10.0,
        green: 32.0,
        n_green: 2,
        n_red: 2,
        n_yellow: 2,
    };
    let placements: Vec<_> = [("tls0", "e1"), ("tls1", "e2"), ("tls2", "e3")]
        .iter()
        .map(|(name, edge)| ActuatorPlacement {
            name: name.to_string(),
            edge: edge.to_string(),
        })
        .collect();
    let group = ActuatorGroup::new(
        ActuatorClass::TrafficLight { plan },
        &placements,
        &network,
        &partition,
    )
    .unwrap();

    let mut demand = DemandTensor::zeros(2, 1800);
    for t in 0..1800 {
        demand.set(0, 1, t, 0.4);
        demand.set(1, 0, t, 0.3);
    }

    Setup {
        network,
        partition,
        model,
        group,
        demand,
    }
}

fn config(end_s: f64, n_outputs: usize) -> LoopConfig {
    LoopConfig {
        clock: ControlClock::new(s(0.0), s(end_s), s(90.0)).unwrap(),
        output: OutputKind::Density,
        reference_horizon: 5,
        weights: ErrorWeights::identity(n_outputs),
    }
}

fn regional(setup: &Setup, fail_at_s: Option<f64>) -> EngineSession<RegionalEngine> {
    let engine = RegionalEngine::new(
        setup.network.clone(),
        &setup.partition,
        setup.demand.clone(),
        RegionalEngineConfig {
            fail_at_s,
            seed: 3,
            ..RegionalEngineConfig::default()
        },
    )
    .unwrap();
    EngineSession::open(engine, setup.partition.n_regions()).unwrap()
}

#[test]
fn no_control_records_zero_inputs_for_every_cycle() {
    let setup = setup();
    let controller = Controller::from_spec(&ControllerSpec::NoControl, 0).unwrap();
    let control = ControlLoop::new(
        &setup.partition,
        &setup.model,
        &setup.group,
        &setup.demand,
        controller,
        config(900.0, 2),
    )
    .unwrap();

    let bundle = control.run(regional(&setup, None)).unwrap();

    assert_eq!(bundle.n_rows(), 10);
    assert_eq!(bundle.density.len(), 10);
    assert_eq!(bundle.flow.len(), 10);
    assert_eq!(bundle.error.len(), 10);
    assert!(bundle.inputs.iter().flatten().all(|&u| u == 0.0));
    assert_eq!(bundle.actuator_names, vec!["tls0", "tls1", "tls2"]);
    assert_eq!(bundle.time_s.last().copied(), Some(900.0));
    assert!(bundle.validate().is_ok());
    assert!(bundle.summary.vehicle_count > 0);
}

#[test]
fn mpc_inputs_respect_the_safety_envelope() {
    let setup = setup();
    let controller =
        Controller::from_spec(&ControllerSpec::Mpc(MpcConfig::default()), 0).unwrap();
    let control = ControlLoop::new(
        &setup.partition,
        &setup.model,
        &setup.group,
        &setup.demand,
        controller,
        config(540.0, 2),
    )
    .unwrap();

    let bundle = control.run(regional(&setup, None)).unwrap();
    assert_eq!(bundle.n_rows(), 6);
    for row in &bundle.inputs {
        assert!(row.iter().all(|u| (0.6..=1.0).contains(u)), "{row:?}");
    }
    for row in &bundle.region_inputs {
        assert_eq!(row.len(), 2);
    }
}

#[test]
fn engine_failure_reports_cycle_and_stage() {
    let setup = setup();
    let controller = Controller::from_spec(&ControllerSpec::Random, 1).unwrap();
    let control = ControlLoop::new(
        &setup.partition,
        &setup.model,
        &setup.group,
        &setup.demand,
        controller,
        config(900.0, 2),
    )
    .unwrap();

    let err = control.run(regional(&setup, Some(200.0))).unwrap_err();
    match err {
        SimError::CycleFailed { cycle, stage, source } => {
            assert_eq!(cycle, 2);
            assert_eq!(stage, LoopStage::Stepping);
            assert!(matches!(*source, SimError::Engine { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Advance(f64),
    Read(f64),
    Command(f64),
    Close,
}

/// Engine that logs every call and serves constant telemetry.
struct RecordingEngine {
    time_s: f64,
    log: Arc<Mutex<Vec<Event>>>,
}

impl RecordingEngine {
    fn push(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }
}

impl SimulationEngine for RecordingEngine {
    fn version(&self) -> &str {
        "recording"
    }

    fn time(&self) -> Time {
        s(self.time_s)
    }

    fn advance(&mut self, to: Time) -> SimResult<()> {
        self.time_s = to_seconds(to);
        self.push(Event::Advance(self.time_s));
        Ok(())
    }

    fn read_edge_telemetry(&self, edge: EdgeId, channels: &[Channel]) -> SimResult<Vec<f64>> {
        self.push(Event::Read(self.time_s));
        Ok(channels
            .iter()
            .map(|c| match c {
                Channel::Density => 40.0 + edge.idx() as f64,
                _ => 100.0,
            })
            .collect())
    }

    fn apply_actuator_command(&mut self, _command: &ActuatorCommand) -> SimResult<()> {
        self.push(Event::Command(self.time_s));
        Ok(())
    }

    fn trip_records(&self) -> Vec<TripRecord> {
        Vec::new()
    }

    fn close(&mut self) -> SimResult<()> {
        self.push(Event::Close);
        Ok(())
    }
}

fn recording_run(spec: ControllerSpec) -> (SimResult<rf_results::ResultBundle>, Vec<Event>) {
    let setup = setup();
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = RecordingEngine {
        time_s: 0.0,
        log: Arc::clone(&log),
    };
    let session = EngineSession::open(engine, 2).unwrap();
    let controller = Controller::from_spec(&spec, 0).unwrap();
    let control = ControlLoop::new(
        &setup.partition,
        &setup.model,
        &setup.group,
        &setup.demand,
        controller,
        config(360.0, 2),
    )
    .unwrap();
    let result = control.run(session);
    let events = log.lock().unwrap().clone();
    (result, events)
}

#[test]
fn telemetry_is_read_between_advances() {
    let (result, events) = recording_run(ControllerSpec::TestStub {
        value: Some(0.9),
        fail_at_cycle: None,
    });
    assert_eq!(result.unwrap().n_rows(), 4);

    let advances: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Advance(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(advances.len(), 4);

    for (k, &start) in advances.iter().enumerate() {
        let end = advances.get(k + 1).copied().unwrap_or(events.len());
        let boundary = 90.0 * (k + 1) as f64;
        assert_eq!(events[start], Event::Advance(boundary));
        let window = &events[start + 1..end];
        let reads = window.iter().filter(|e| matches!(e, Event::Read(_))).count();
        assert_eq!(reads, 4, "cycle {k} reads every edge once");
        // all reads precede the cycle's commands and see the new boundary
        let first_command = window
            .iter()
            .position(|e| matches!(e, Event::Command(_)))
            .unwrap_or(window.len());
        assert!(window[..first_command].iter().all(|e| *e == Event::Read(boundary)));
        assert_eq!(
            window[first_command..]
                .iter()
                .filter(|e| matches!(e, Event::Command(_)))
                .count(),
            3
        );
    }
    assert_eq!(events.last(), Some(&Event::Close));
}

#[test]
fn controller_failure_tears_down_the_engine() {
    let (result, events) = recording_run(ControllerSpec::TestStub {
        value: None,
        fail_at_cycle: Some(1),
    });
    match result {
        Err(SimError::CycleFailed { cycle, stage, .. }) => {
            assert_eq!(cycle, 1);
            assert_eq!(stage, LoopStage::Deciding);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(events.iter().filter(|e| **e == Event::Close).count(), 1);
    assert_eq!(events.last(), Some(&Event::Close));
}

#[test]
fn calibration_samples_every_interval() {
    let setup = setup();
    let mut session = regional(&setup, None);
    let samples =
        collect_mfd_samples(&mut session, &setup.partition, s(0.0), s(600.0), s(60.0)).unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|set| set.len() == 10));
    assert!(samples.iter().all(|set| set.density.iter().all(|d| d.is_finite() && *d >= 0.0)));
    session.close().unwrap();
    assert!(matches!(session.close(), Err(SimError::EngineClosed)));
}
