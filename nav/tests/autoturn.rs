mod common;

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use common::{ManualClock, Turntable};
use nav::{
	AutoTurnConfig, AutoTurnController, AutoTurnSupervisor, BearingStatus, InputError, Outcome, SystemClock, Target,
	TimeoutReason, TurnState,
};

fn config() -> AutoTurnConfig {
	AutoTurnConfig {
		tolerance_deg: 5.0,
		gain: 0.5,
		min_step_deg: 1.0,
		max_step_deg: 30.0,
		miss_limit: 4,
		max_ticks: 50,
		max_duration_ms: 60_000,
		settle_ms: 10,
	}
}

#[test]
fn converges_within_predicted_ticks() {
	let table = Turntable::new(0.0, 80.0);
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	let mut session = ctl.session(Target::PlacedMarker);

	// Errors: 80 → 50 (clamped) → 25 → 12.5 → 6.25 → 3.125.
	let outcome = ctl.run(&mut session);
	assert_eq!(
		outcome,
		Outcome::Converged {
			ticks: 6,
			error_deg: 3.125
		}
	);
	assert_eq!(table.turns(), vec![30.0, 25.0, 12.5, 6.25, 3.125]);
	assert!(table.turns().iter().all(|t| t.abs() <= 30.0));
	assert_eq!(session.state, TurnState::Idle);
	assert_eq!(session.turns_issued, 5);
	// One settle wait after every command.
	assert_eq!(clock.elapsed(), Duration::from_millis(50));
}

#[test]
fn left_turns_are_negative() {
	let table = Turntable::new(90.0, 30.0);
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	let outcome = ctl.run(&mut ctl.session(Target::PlacedMarker));
	assert!(matches!(outcome, Outcome::Converged { .. }));
	assert!(table.turns().iter().all(|t| *t < 0.0));
}

#[test]
fn wraps_through_north() {
	// Facing 350, target at 20: the short way is 30 degrees to the right.
	let table = Turntable::new(350.0, 20.0);
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	ctl.run(&mut ctl.session(Target::PlacedMarker));
	assert_eq!(table.turns()[0], 15.0);
}

#[test]
fn invalid_samples_time_out_without_turning() {
	let table = Turntable::new(0.0, 90.0).failing(BearingStatus::PlayerNotFound);
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	let mut session = ctl.session(Target::PlacedMarker);

	let outcome = ctl.run(&mut session);
	assert_eq!(outcome, Outcome::TimedOut(TimeoutReason::Misses));
	assert_eq!(session.ticks, 4);
	assert_eq!(*table.samples.lock().unwrap(), 4);
	assert!(table.turns().is_empty());
	assert_eq!(session.state, TurnState::Idle);
}

#[test]
fn capture_failures_report_unavailable() {
	let table = Turntable::new(0.0, 90.0).failing(BearingStatus::DetectionUnavailable);
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	assert_eq!(
		ctl.run(&mut ctl.session(Target::PlacedMarker)),
		Outcome::TimedOut(TimeoutReason::Unavailable)
	);
	assert!(table.turns().is_empty());
}

#[test]
fn a_valid_sample_resets_the_miss_count() {
	let table = Turntable::new(0.0, 90.0);
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	let mut session = ctl.session(Target::Poi("nowhere".into()));
	for _ in 0..3 {
		assert_eq!(ctl.tick(&mut session), None);
	}
	assert_eq!(session.misses, 3);

	session.target = Target::PlacedMarker;
	assert_eq!(ctl.tick(&mut session), None);
	assert_eq!(session.misses, 0);
	assert_eq!(session.state, TurnState::Correcting);
}

#[test]
fn cancel_mid_correcting_stops_turning() {
	let table = Turntable::new(0.0, 170.0);
	let clock = ManualClock::new();
	let cfg = AutoTurnConfig {
		gain: 1.0,
		max_step_deg: 10.0,
		tolerance_deg: 2.0,
		..config()
	};
	let ctl = AutoTurnController::new(cfg, &table, &table, &clock);
	let mut session = ctl.session(Target::PlacedMarker);
	*table.cancel_after.lock().unwrap() = Some((2, session.cancel_token()));

	let outcome = ctl.run(&mut session);
	assert_eq!(outcome, Outcome::Cancelled);
	assert_eq!(table.turns(), vec![10.0, 10.0]);
	// The tick that observed the flag did not sample.
	assert_eq!(session.ticks, 2);
	assert_eq!(session.state, TurnState::Idle);
}

#[test]
fn tick_budget_is_enforced() {
	let table = Turntable::new(0.0, 120.0).frozen();
	let clock = ManualClock::new();
	let cfg = AutoTurnConfig {
		max_ticks: 3,
		..config()
	};
	let ctl = AutoTurnController::new(cfg, &table, &table, &clock);
	assert_eq!(
		ctl.run(&mut ctl.session(Target::PlacedMarker)),
		Outcome::TimedOut(TimeoutReason::Ticks)
	);
	assert_eq!(table.turns().len(), 3);
}

#[test]
fn wall_clock_budget_is_enforced() {
	let table = Turntable::new(0.0, 120.0).frozen();
	let clock = ManualClock::new();
	let cfg = AutoTurnConfig {
		max_duration_ms: 100,
		settle_ms: 40,
		..config()
	};
	let ctl = AutoTurnController::new(cfg, &table, &table, &clock);
	let mut session = ctl.session(Target::PlacedMarker);
	assert_eq!(ctl.run(&mut session), Outcome::TimedOut(TimeoutReason::Duration));
	assert_eq!(session.ticks, 3);
}

#[test]
fn rejected_input_ends_the_session() {
	let mut table = Turntable::new(0.0, 120.0);
	table.reject = true;
	let clock = ManualClock::new();
	let ctl = AutoTurnController::new(config(), &table, &table, &clock);
	let outcome = ctl.run(&mut ctl.session(Target::PlacedMarker));
	assert_eq!(outcome, Outcome::InputFailed(InputError::Rejected("device busy".into())));
	assert!(outcome.into_result().is_err());
}

#[test]
fn new_session_supersedes_the_old_one() {
	let mut table = Turntable::new(0.0, 120.0)
		.frozen()
		.with_target(Target::Poi("ahead".into()), 0.0);
	table.sample_delay = Duration::from_millis(5);
	let table = Arc::new(table);

	let supervisor = AutoTurnSupervisor::new(table.clone(), table.clone(), Arc::new(SystemClock));
	let (tx, rx) = mpsc::channel();

	let endless = AutoTurnConfig {
		max_ticks: u32::MAX,
		settle_ms: 5,
		..config()
	};
	let tx1 = tx.clone();
	supervisor
		.start(Target::PlacedMarker, endless, move |t, o| tx1.send((t.clone(), o)).unwrap())
		.unwrap();
	while table.turns().is_empty() {
		std::thread::sleep(Duration::from_millis(1));
	}
	assert!(supervisor.is_active());

	supervisor
		.start(Target::Poi("ahead".into()), config(), move |t, o| tx.send((t.clone(), o)).unwrap())
		.unwrap();

	// The first session is fully stopped before the second one starts.
	let (first, first_outcome) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
	assert_eq!(first, Target::PlacedMarker);
	assert_eq!(first_outcome, Outcome::Cancelled);

	let (second, second_outcome) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
	assert_eq!(second, Target::Poi("ahead".into()));
	assert!(matches!(second_outcome, Outcome::Converged { ticks: 1, .. }));

	supervisor.wait();
	assert!(!supervisor.is_active());
}

#[test]
fn explicit_cancel_is_idempotent() {
	let table = Arc::new(Turntable::new(0.0, 120.0).frozen());
	let supervisor = AutoTurnSupervisor::new(table.clone(), table.clone(), Arc::new(SystemClock));
	let cfg = AutoTurnConfig {
		max_ticks: u32::MAX,
		..config()
	};
	let (tx, rx) = mpsc::channel();
	supervisor.start(Target::PlacedMarker, cfg, move |_, o| tx.send(o).unwrap()).unwrap();

	assert!(supervisor.cancel());
	assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Outcome::Cancelled);
	let turns = table.turns().len();
	assert!(!supervisor.cancel());
	std::thread::sleep(Duration::from_millis(30));
	assert_eq!(table.turns().len(), turns);
}

#[test]
fn status_queries_do_not_wait_for_a_superseded_session() {
	let mut table = Turntable::new(0.0, 120.0).frozen();
	table.sample_delay = Duration::from_millis(400);
	let table = Arc::new(table);
	let supervisor = Arc::new(AutoTurnSupervisor::new(table.clone(), table.clone(), Arc::new(SystemClock)));

	let endless = AutoTurnConfig {
		max_ticks: u32::MAX,
		..config()
	};
	supervisor.start(Target::PlacedMarker, endless, |_, _| {}).unwrap();
	while *table.samples.lock().unwrap() == 0 {
		std::thread::sleep(Duration::from_millis(1));
	}

	// Superseding has to wait for the sample in flight.
	let starter = {
		let supervisor = supervisor.clone();
		std::thread::spawn(move || supervisor.start(Target::PlacedMarker, endless, |_, _| {}).unwrap())
	};
	std::thread::sleep(Duration::from_millis(50));
	let asked = Instant::now();
	let _ = supervisor.active_target();
	let _ = supervisor.is_active();
	assert!(asked.elapsed() < Duration::from_millis(200), "{:?}", asked.elapsed());

	starter.join().unwrap();
	assert_eq!(supervisor.active_target(), Some(Target::PlacedMarker));
	assert!(supervisor.cancel());
}
