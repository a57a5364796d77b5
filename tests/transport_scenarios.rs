use particle_transport::{
    CorrectionMode, CurrentField, GeoExtent, GeoPoint, RunParams, RunState, SedimentationParams, TransportEngine,
    TransportError,
};
use std::sync::Arc;
use transport_common::METERS_PER_DEGREE;

const STEP: f64 = 1800.0;

fn uniform_field(extent: GeoExtent, u: f64, v: f64) -> Arc<CurrentField> {
    Arc::new(CurrentField::uniform(extent, 21, 21, 50.0, u, v).unwrap())
}

/// Deep water west of lon 0.5, a shelf 60 m shallower east of it, current 1 m/s east.
fn shelf_field() -> Arc<CurrentField> {
    let (mut lon, mut lat, mut depth) = (Vec::new(), Vec::new(), Vec::new());
    for ix in 0..=10 {
        for iy in 0..=2 {
            let x = ix as f64 * 0.1;
            lon.push(x);
            lat.push(iy as f64 * 0.1);
            depth.push(if x < 0.5 { 100.0 } else { 40.0 });
        }
    }
    let n = lon.len();
    Arc::new(CurrentField::new(lon, lat, depth, vec![1.0; n], vec![0.0; n]).unwrap())
}

fn params(days: f64) -> RunParams {
    RunParams::for_days(days)
}

#[test]
fn eastward_drift_fills_one_day() {
    let field = uniform_field(GeoExtent::new(0.0, 2.0, 0.0, 1.0), 0.1, 0.0);
    let engine = TransportEngine::new(field, params(1.0)).unwrap();
    let particles: Vec<GeoPoint> = (0..10).map(|i| GeoPoint::new(0.1 + 0.1 * i as f64, 0.5, 3.0)).collect();

    let output = engine.run(&particles).unwrap();
    assert_eq!(output.trajectory.shape(), (10, 3, 48));
    assert_eq!(output.state, RunState::HorizonReached);
    assert_eq!(output.stop_times, vec![0; 10]);
    assert_eq!(output.full_cells().len(), 48);
    assert!(output.horizontal_cells().all(|cells| cells.len() == 10));
    assert_eq!(output.horizontal_cells().len(), 48);

    let expected = 0.1 * STEP / (METERS_PER_DEGREE * 0.5f64.to_radians().cos());
    for i in 0..10 {
        let track = output.trajectory.particle_track(i);
        for pair in track.windows(2) {
            assert!((pair[1].lon - pair[0].lon - expected).abs() < 1e-12);
            assert_eq!(pair[1].lat, pair[0].lat);
            assert_eq!(pair[1].depth, 3.0);
        }
    }
}

#[test]
fn leaving_the_grid_ends_the_run_early() {
    let field = uniform_field(GeoExtent::new(0.0, 1.0, -0.5, 0.5), 1.0, 0.0);
    let engine = TransportEngine::new(field, params(1.0)).unwrap();
    // Four moves stay inside, the fifth crosses lon 1.0.
    let delta = STEP / METERS_PER_DEGREE;
    let start = 1.0 - 4.5 * delta;
    let particles = vec![
        GeoPoint::new(start, -0.2, 0.0),
        GeoPoint::new(start, 0.0, 0.0),
        GeoPoint::new(start, 0.2, 0.0),
    ];

    let output = engine.run(&particles).unwrap();
    assert_eq!(output.state, RunState::AllStopped);
    assert_eq!(output.executed_steps, 6);
    assert_eq!(output.stop_times, vec![6, 6, 6]);
    assert_eq!(output.trajectory.shape(), (3, 3, 6));
    assert!(output.final_positions.lon.iter().all(|&lon| lon > 1.0));
    assert!(output.previous_positions.lon.iter().all(|&lon| lon < 1.0));
}

#[test]
fn still_water_with_forced_settling() {
    let field = uniform_field(GeoExtent::new(0.0, 1.0, 0.0, 1.0), 0.0, 0.0);
    let particles = vec![GeoPoint::new(0.25, 0.25, 1.0), GeoPoint::new(0.75, 0.5, 2.0)];

    let output = TransportEngine::new(field.clone(), params(1.0)).unwrap().run(&particles).unwrap();
    assert_eq!(output.stop_times, vec![0, 0]);
    for (i, particle) in particles.iter().enumerate() {
        assert!(output.trajectory.particle_track(i).iter().all(|p| p == particle));
    }

    let mut forced = params(1.0);
    forced.force_final_settling = true;
    let output = TransportEngine::new(field, forced).unwrap().run(&particles).unwrap();
    assert_eq!(output.stop_times, vec![48, 48]);
    assert_eq!(output.state, RunState::HorizonReached);
}

fn settling_params(seed: u64) -> RunParams {
    let mut run = params(1.0);
    run.sedimentation = true;
    run.sink_speed = transport_common::run_params::sink_speed_from_rate(100.0);
    run.seed = seed;
    run
}

fn settling_particles() -> Vec<GeoPoint> {
    (0..60).map(|i| GeoPoint::new(1.0 + 0.01 * (i % 10) as f64, 0.5 + 0.01 * (i / 10) as f64, 0.0)).collect()
}

#[test]
fn settled_particles_stay_put() {
    // 0.1 m/s is below the critical speed for fine sand.
    let field = uniform_field(GeoExtent::new(0.0, 5.0, 0.0, 1.0), 0.1, 0.0);
    let engine = TransportEngine::new(field, settling_params(3)).unwrap();
    let output = engine.run(&settling_particles()).unwrap();

    assert!(output.stopped_count() > 0);
    for (i, &stop) in output.stop_times.iter().enumerate() {
        assert!(stop <= output.executed_steps);
        if stop == 0 {
            continue;
        }
        assert!(stop >= 2, "particle {} stopped in its initial slot", i);
        let track = output.trajectory.particle_track(i);
        let resting = track[stop as usize - 1];
        assert!(track[stop as usize - 1..].iter().all(|p| *p == resting));
    }
}

#[test]
fn sedimentation_is_reproducible_for_a_seed() {
    let field = uniform_field(GeoExtent::new(0.0, 5.0, 0.0, 1.0), 0.0, 0.0);
    let particles = settling_particles();
    let run = |seed: u64| {
        TransportEngine::new(field.clone(), settling_params(seed))
            .unwrap()
            .run(&particles)
            .unwrap()
            .stop_times
    };

    let first = run(11);
    assert_eq!(first, run(11));
    assert_ne!(first, run(12));
}

#[test]
fn fast_current_prevents_settling() {
    // Far above the critical speed, the velocity deficit is zero everywhere.
    let field = uniform_field(GeoExtent::new(0.0, 50.0, 0.0, 1.0), 2.0, 0.0);
    let output = TransportEngine::new(field, settling_params(5)).unwrap().run(&settling_particles()).unwrap();
    assert_eq!(output.stopped_count(), 0);
}

#[test]
fn max_speed_column_drives_settling_when_requested() {
    let extent = GeoExtent::new(0.0, 5.0, 0.0, 1.0);
    let still = CurrentField::uniform(extent, 21, 21, 50.0, 0.0, 0.0).unwrap();
    let cells = still.len();
    let field = Arc::new(still.with_max_speed(vec![100.0; cells]).unwrap());
    let particles = settling_particles();

    let mut at_max = settling_params(9);
    at_max.sed_at_max_speed = true;
    let output = TransportEngine::new(field.clone(), at_max).unwrap().run(&particles).unwrap();
    assert_eq!(output.stopped_count(), 0);

    // Same field, local speed: still water settles.
    let output = TransportEngine::new(field, settling_params(9)).unwrap().run(&particles).unwrap();
    assert!(output.stopped_count() > 0);
}

#[test]
fn caller_supplied_settling_model_is_used() {
    let field = uniform_field(GeoExtent::new(0.0, 5.0, 0.0, 1.0), 0.0, 0.0);
    // Every occupant settles on the first move.
    let settle_all = SedimentationParams::new(1.0, Arc::new(|_: f64, n: usize| n as f64)).unwrap();
    let engine = TransportEngine::from_parts(field, settling_params(1), None, Some(settle_all)).unwrap();
    assert_eq!(engine.sedimentation().map(|p| p.critical_velocity_sq), Some(1.0));

    let output = engine.run(&settling_particles()).unwrap();
    assert_eq!(output.state, RunState::AllStopped);
    assert_eq!(output.executed_steps, 2);
    assert!(output.stop_times.iter().all(|&s| s == 2));
}

fn shelf_run(mode: CorrectionMode) -> Vec<GeoPoint> {
    let mut run = RunParams::default();
    run.horizon = 10;
    run.slope_threshold_m = Some(50.0);
    run.correction_mode = mode;
    let engine = TransportEngine::new(shelf_field(), run).unwrap();
    let output = engine.run(&[GeoPoint::new(0.42, 0.1, 0.0)]).unwrap();
    assert_eq!(output.stop_times, vec![0]);
    output.trajectory.particle_track(0)
}

#[test]
fn hard_policy_holds_particles_below_the_shelf() {
    let track = shelf_run(CorrectionMode::Hard);
    // The first move stays over deep water; every later one would climb the shelf.
    assert!(track[1].lon > 0.42);
    assert!(track[2..].iter().all(|p| *p == track[1]));
}

#[test]
fn mean_move_creeps_towards_the_shelf_edge() {
    let track = shelf_run(CorrectionMode::MeanMove);
    let delta = STEP / (METERS_PER_DEGREE * 0.1f64.to_radians().cos());
    assert!(track[2].lon > track[1].lon);
    assert!(track[2].lon < track[1].lon + delta);
    for pair in track.windows(2) {
        assert!(pair[1].lon >= pair[0].lon);
    }
    assert!(track.iter().all(|p| p.lon < 0.45));
}

#[test]
fn indices_are_shared_across_batches() {
    let field = uniform_field(GeoExtent::new(0.0, 2.0, 0.0, 1.0), 0.05, 0.05);
    let first = TransportEngine::new(field.clone(), params(0.5)).unwrap();
    let second = TransportEngine::from_parts(field, params(0.5), Some(first.indices().clone()), None).unwrap();

    let batch = vec![GeoPoint::new(0.5, 0.2, 0.0), GeoPoint::new(1.5, 0.4, 0.0)];
    let a = first.run(&batch).unwrap();
    let b = second.run(&batch).unwrap();
    assert_eq!(a.trajectory, b.trajectory);
    assert_eq!(a.stop_times, b.stop_times);
}

#[test]
fn trajectory_cap_is_checked_before_running() {
    let field = uniform_field(GeoExtent::new(0.0, 1.0, 0.0, 1.0), 0.0, 0.0);
    let mut run = params(1.0);
    run.max_trajectory_bytes = Some(1024);
    let engine = TransportEngine::new(field, run).unwrap();
    let particles = vec![GeoPoint::new(0.5, 0.5, 0.0); 100];
    assert!(matches!(engine.run(&particles), Err(TransportError::ResourceExhausted { .. })));
}

#[test]
fn rejects_empty_and_non_finite_particles() {
    let field = uniform_field(GeoExtent::new(0.0, 1.0, 0.0, 1.0), 0.0, 0.0);
    let engine = TransportEngine::new(field, params(1.0)).unwrap();
    assert!(engine.run(&[]).is_err());
    assert!(engine.run(&[GeoPoint::new(f64::NAN, 0.5, 0.0)]).is_err());
}
