//! End-to-end scheduling behaviour driven by a manual time source

use lockstep_core::{
    Callbacks, Clock, ClockConfig, Device, DeviceSpec, ManualTimeSource, Multiplier, TempoMode,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Schedule(f64, usize),
    Step(usize),
    Start,
    Stop,
}

/// Records every hook the clock invokes
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    notify: bool,
}

impl Recorder {
    fn with_steps() -> Self {
        Self {
            notify: true,
            ..Self::default()
        }
    }

    fn scheduled(&self) -> Vec<(f64, usize)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Schedule(t, s) => Some((*t, *s)),
                _ => None,
            })
            .collect()
    }

    fn steps(&self) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Step(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Device for Recorder {
    fn schedule(&mut self, time: f64, step: usize) {
        self.calls.lock().unwrap().push(Call::Schedule(time, step));
    }

    fn wants_step_notifications(&self) -> bool {
        self.notify
    }

    fn on_step(&mut self, step: usize) {
        self.calls.lock().unwrap().push(Call::Step(step));
    }

    fn on_start(&mut self) {
        self.calls.lock().unwrap().push(Call::Start);
    }

    fn on_stop(&mut self) {
        self.calls.lock().unwrap().push(Call::Stop);
    }
}

fn exact_clock() -> (Clock<ManualTimeSource>, ManualTimeSource) {
    let time = ManualTimeSource::new();
    let config = ClockConfig::default().with_epsilon(0.0);
    let clock = Clock::with_config(time.clone(), config).unwrap();
    (clock, time)
}

/// Poll at the configured cadence until `until`, firing notices on the way
fn run(clock: &mut Clock<ManualTimeSource>, time: &ManualTimeSource, until: f64) {
    let interval = clock.config().poll_interval_secs();
    while time.get() < until {
        clock.poll();
        clock.fire_due_steps();
        time.advance(interval);
    }
}

#[test]
fn test_step_duration_at_120_bpm() {
    let (mut clock, _time) = exact_clock();
    clock.register(DeviceSpec::new("tb303"), Recorder::default()).unwrap();
    assert_eq!(clock.device_step_duration("tb303"), Some(0.125));
}

#[test]
fn test_first_poll_schedules_two_steps() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    clock.poll();
    assert_eq!(tb303.scheduled(), vec![(0.0, 0), (0.125, 1)]);

    // Step 2 waits until the horizon reaches 0.25
    time.set(0.09);
    clock.poll();
    assert_eq!(tb303.scheduled().len(), 2);
    time.set(0.11);
    clock.poll();
    assert_eq!(tb303.scheduled().last(), Some(&(0.25, 2)));
}

#[test]
fn test_step_index_wraps_after_a_cycle() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    clock
        .register(DeviceSpec::new("tb303").with_step_count(16), tb303.clone())
        .unwrap();
    clock.start();
    run(&mut clock, &time, 2.5);

    let steps: Vec<usize> = tb303.scheduled().iter().map(|(_, s)| *s).collect();
    assert!(steps.len() >= 17);
    assert_eq!(steps[15], 15);
    assert_eq!(steps[16], 0);
    assert_eq!(&steps[..4], &[0, 1, 2, 3]);
}

#[test]
fn test_start_while_running_keeps_position() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    run(&mut clock, &time, 0.5);
    let before = clock.device("tb303").unwrap();

    assert!(!clock.start());
    assert_eq!(clock.device("tb303").unwrap(), before);
}

#[test]
fn test_paused_device_is_skipped() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    let tr808 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.register(DeviceSpec::new("tr808"), tr808.clone()).unwrap();
    clock.start();
    clock.pause_device("tb303");
    tb303.clear();

    run(&mut clock, &time, 1.0);
    assert!(tb303.scheduled().is_empty());
    assert!(tr808.scheduled().len() >= 8);
}

#[test]
fn test_times_advance_by_exactly_one_step() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    let tr909 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock
        .register(
            DeviceSpec::new("tr909").with_multiplier(Multiplier::new(3, 2)),
            tr909.clone(),
        )
        .unwrap();
    clock.start();
    run(&mut clock, &time, 3.0);

    for (recorder, step) in [(&tb303, 0.125), (&tr909, 0.125 / 1.5)] {
        let times: Vec<f64> = recorder.scheduled().iter().map(|(t, _)| *t).collect();
        assert!(times.len() > 10);
        for pair in times.windows(2) {
            assert!((pair[1] - pair[0] - step).abs() < 1e-9);
        }
    }
}

#[test]
fn test_default_epsilon_only_moves_the_first_step() {
    let time = ManualTimeSource::new();
    let mut clock = Clock::new(time.clone());
    let tb303 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    run(&mut clock, &time, 1.0);

    let times: Vec<f64> = tb303.scheduled().iter().map(|(t, _)| *t).collect();
    assert_eq!(times[0], 0.005);
    for (i, t) in times.iter().enumerate().skip(1) {
        assert!((t - 0.125 * i as f64).abs() < 1e-9);
    }
}

#[test]
fn test_tempo_changes_never_reorder_events() {
    let time = ManualTimeSource::new();
    let mut clock = Clock::new(time.clone());
    let devices: Vec<Recorder> = (0..3).map(|_| Recorder::default()).collect();
    let multipliers = [
        Multiplier::from_integer(1),
        Multiplier::from_integer(2),
        Multiplier::new(1, 2),
    ];
    for (i, (device, m)) in devices.iter().zip(multipliers).enumerate() {
        clock
            .register(
                DeviceSpec::new(format!("dev{i}")).with_multiplier(m),
                device.clone(),
            )
            .unwrap();
    }
    clock.start();

    // Sweep the tempo up and down while polling, with jittery cadence
    let tempos = [120.0, 300.0, 20.0, 180.0, 60.0, 240.0, 90.0, 300.0];
    for (round, bpm) in tempos.iter().enumerate() {
        for tick in 0..12 {
            clock.poll();
            let jitter = if tick % 3 == 0 { 0.011 } else { 0.0 };
            time.advance(0.025 + jitter);
            if tick == 5 {
                clock.set_master_bpm(*bpm);
            }
        }
        assert_eq!(clock.master_bpm(), tempos[round]);
    }

    for device in &devices {
        let times: Vec<f64> = device.scheduled().iter().map(|(t, _)| *t).collect();
        assert!(times.len() > 5);
        for pair in times.windows(2) {
            assert!(pair[1] > pair[0], "{} then {}", pair[0], pair[1]);
        }
    }
}

#[test]
fn test_tempo_change_preserves_phase() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    clock.poll();
    // Emitted 0.0 and 0.125; next at 0.25. At 0.1875 half of the current
    // step remains, which is 0.125s once the step lasts 0.25s.
    time.set(0.1875);
    clock.set_master_bpm(60.0);
    let next = clock.device("tb303").unwrap().next_event_time;
    assert!((next - 0.3125).abs() < 1e-12);
}

#[test]
fn test_resume_starts_a_stopped_clock() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    let tr808 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.register(DeviceSpec::new("tr808"), tr808.clone()).unwrap();

    time.set(1.0);
    assert!(clock.resume_device("tb303"));
    assert!(clock.is_running());
    clock.poll();
    assert_eq!(tb303.scheduled(), vec![(1.0, 0), (1.125, 1)]);
    // Still paused from registration
    assert!(tr808.scheduled().is_empty());
}

#[test]
fn test_stop_leaves_devices_unpaused() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    let tr808 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.register(DeviceSpec::new("tr808"), tr808.clone()).unwrap();
    clock.start();
    clock.pause_device("tr808");
    clock.stop();

    // Resuming one device brings the other back too, from where it stood
    tb303.clear();
    tr808.clear();
    time.set(2.0);
    clock.resume_device("tb303");
    clock.poll();
    assert!(!tb303.scheduled().is_empty());
    assert!(!tr808.scheduled().is_empty());
}

#[test]
fn test_step_notifications_follow_liveness() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::with_steps();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    run(&mut clock, &time, 0.3);
    assert_eq!(tb303.steps(), vec![0, 1, 2]);

    // Steps already emitted past the pause never reach on_step
    clock.poll();
    clock.pause_device("tb303");
    time.set(1.0);
    assert_eq!(clock.fire_due_steps(), 0);
    assert_eq!(tb303.steps(), vec![0, 1, 2]);

    // Nor do they after a stop and restart
    clock.resume_device("tb303");
    clock.poll();
    clock.stop();
    clock.start();
    time.set(2.0);
    assert_eq!(clock.fire_due_steps(), 0);
    assert_eq!(clock.pending_step_notices(), 0);
}

#[test]
fn test_unregister_drops_pending_notifications() {
    let (mut clock, _time) = exact_clock();
    let tb303 = Recorder::with_steps();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    clock.poll();
    assert_eq!(clock.pending_step_notices(), 2);
    clock.unregister("tb303");
    assert_eq!(clock.pending_step_notices(), 0);
}

#[test]
fn test_free_device_ignores_master_tempo() {
    let (mut clock, time) = exact_clock();
    let free = Recorder::default();
    let sync = Recorder::default();
    clock
        .register(
            DeviceSpec::new("free")
                .with_mode(TempoMode::Free)
                .with_free_bpm(60.0),
            free.clone(),
        )
        .unwrap();
    clock.register(DeviceSpec::new("sync"), sync.clone()).unwrap();
    clock.start();
    clock.set_master_bpm(240.0);
    run(&mut clock, &time, 2.0);

    let free_times: Vec<f64> = free.scheduled().iter().map(|(t, _)| *t).collect();
    for pair in free_times.windows(2) {
        assert!((pair[1] - pair[0] - 0.25).abs() < 1e-9);
    }
    let sync_times: Vec<f64> = sync.scheduled().iter().map(|(t, _)| *t).collect();
    for pair in sync_times.windows(2) {
        assert!((pair[1] - pair[0] - 0.0625).abs() < 1e-9);
    }
}

#[test]
fn test_mode_switch_takes_effect_from_next_event() {
    let (mut clock, time) = exact_clock();
    let tb303 = Recorder::default();
    clock
        .register(DeviceSpec::new("tb303").with_free_bpm(60.0), tb303.clone())
        .unwrap();
    clock.start();
    clock.poll();
    let next = clock.device("tb303").unwrap().next_event_time;

    clock.set_mode("tb303", TempoMode::Free);
    assert_eq!(clock.device("tb303").unwrap().next_event_time, next);
    tb303.clear();
    time.set(0.2);
    clock.poll();
    time.set(0.4);
    clock.poll();
    assert_eq!(tb303.scheduled(), vec![(0.25, 2), (0.5, 3)]);
}

#[test]
fn test_hooks_fire_on_transport_changes() {
    let (mut clock, _time) = exact_clock();
    let tb303 = Recorder::default();
    clock.register(DeviceSpec::new("tb303"), tb303.clone()).unwrap();
    clock.start();
    clock.pause_device("tb303");
    clock.resume_device("tb303");
    clock.stop();

    let hooks: Vec<Call> = tb303
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| matches!(c, Call::Start | Call::Stop))
        .cloned()
        .collect();
    assert_eq!(hooks, vec![Call::Start, Call::Stop, Call::Start, Call::Stop]);
}

#[test]
fn test_independent_clocks_do_not_interfere() {
    let (mut a, time_a) = exact_clock();
    let (mut b, _time_b) = exact_clock();
    a.register_callbacks(DeviceSpec::new("x"), Callbacks::new().on_schedule(|_, _| {}))
        .unwrap();
    b.register_callbacks(DeviceSpec::new("x"), Callbacks::new().on_schedule(|_, _| {}))
        .unwrap();
    a.start();
    a.set_master_bpm(90.0);
    run(&mut a, &time_a, 1.0);

    assert!(!b.is_running());
    assert_eq!(b.master_bpm(), 120.0);
    assert_eq!(b.device("x").unwrap().current_step, 0);
}
