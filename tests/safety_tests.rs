use rtuctl::config::ControllerConfig;
use rtuctl::control::*;
use rtuctl::safety::AlarmKind;

fn occupied_schedule() -> ScheduleInput {
    ScheduleInput {
        scheduled_occupied: true,
        holiday_override_active: false,
    }
}

fn unoccupied_schedule() -> ScheduleInput {
    ScheduleInput {
        scheduled_occupied: false,
        holiday_override_active: false,
    }
}

fn sensors(zone_f: f32, discharge_f: f32, fan_status: bool) -> SensorSnapshot {
    SensorSnapshot {
        zone_temp_f: zone_f,
        outdoor_temp_f: 65.0,
        discharge_air_temp_f: discharge_f,
        co2_ppm: Some(450),
        fan_status,
    }
}

fn inputs(schedule: ScheduleInput, snapshot: SensorSnapshot, emergency_stop: bool) -> ScanInputs {
    ScanInputs {
        schedule,
        sensors: snapshot,
        emergency_stop,
    }
}

#[test]
fn test_emergency_stop_precedence_over_everything() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();

    // Build up a worst case: heat call, fan mismatch in Timing, freeze
    // alarm, an operator override holding the compressor on.
    let snapshot = sensors(60.0, 35.0, false);
    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 0);

    let overrides = OutputOverrides {
        compressor: Some(true),
        damper_position: Some(80),
        ..Default::default()
    };
    let result = core.scan(&config, &inputs(occupied_schedule(), snapshot, true), &overrides, 1000);

    assert_eq!(result.outputs, ControlOutputs::ALL_OFF);
    assert_eq!(result.unit_state, UnitState::EmergencyStop);
}

#[test]
fn test_emergency_stop_auto_resumes() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();
    let snapshot = sensors(72.0, 55.0, true);

    let stopped = core.scan(&config, &inputs(occupied_schedule(), snapshot, true), &OutputOverrides::default(), 0);
    assert_eq!(stopped.outputs, ControlOutputs::ALL_OFF);

    // Deasserting resumes normal control on the very next scan.
    let resumed = core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 1000);
    assert!(resumed.outputs.fan);
    assert_eq!(resumed.outputs.damper_position, 20);
}

#[test]
fn test_fan_failure_shuts_unit_down_and_latches() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();
    // Hot zone so both fan and compressor are commanded; status never comes up.
    let snapshot = sensors(80.0, 55.0, false);

    let mut now = 0;
    while now < 30_000 {
        let result = core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), now);
        assert!(result.outputs.fan, "still watching/timing at {now}ms");
        assert!(!core.alarms().is_active(AlarmKind::FanFailure));
        now += 1000;
    }

    // 30.0s of mismatch: failed, alarm raised, unit shut down this scan.
    let failed = core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 30_000);
    assert!(!failed.outputs.fan);
    assert!(!failed.outputs.compressor);
    assert!(!failed.outputs.heat);
    assert_eq!(failed.unit_state, UnitState::FanFailure);
    assert!(core.alarms().is_active(AlarmKind::FanFailure));

    // A standing occupied call keeps the latch in place.
    let still_failed = core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 60_000);
    assert_eq!(still_failed.unit_state, UnitState::FanFailure);
}

#[test]
fn test_fan_failure_rearms_on_clean_off_cycle() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();
    let snapshot = sensors(80.0, 55.0, false);

    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 0);
    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 30_000);
    assert!(core.fan().is_failed());

    // Unoccupied, zone back in band: the request drops, status is off, the
    // machine re-arms and the alarm clears.
    let idle = sensors(72.0, 55.0, false);
    let rearmed = core.scan(&config, &inputs(unoccupied_schedule(), idle, false), &OutputOverrides::default(), 31_000);
    assert!(!core.fan().is_failed());
    assert!(!core.alarms().is_active(AlarmKind::FanFailure));
    assert_eq!(rearmed.unit_state, UnitState::Off);
}

#[test]
fn test_operator_reset_clears_fan_failure() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();
    let snapshot = sensors(80.0, 55.0, false);

    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 0);
    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 30_000);
    assert!(core.fan().is_failed());

    core.reset_fan_failure();
    assert!(!core.fan().is_failed());
}

#[test]
fn test_freeze_alarm_is_advisory_by_default() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();

    let result = core.scan(
        &config,
        &inputs(occupied_schedule(), sensors(72.0, 39.0, true), false),
        &OutputOverrides::default(),
        1000,
    );
    assert!(core.alarms().is_active(AlarmKind::LowDischargeTemp));
    // Alarm only: the fan keeps running.
    assert!(result.outputs.fan);
}

#[test]
fn test_freeze_alarm_level_triggered() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();

    core.scan(&config, &inputs(occupied_schedule(), sensors(72.0, 39.0, true), false), &OutputOverrides::default(), 1000);
    assert!(core.alarms().is_active(AlarmKind::LowDischargeTemp));

    core.scan(&config, &inputs(occupied_schedule(), sensors(72.0, 45.0, true), false), &OutputOverrides::default(), 2000);
    assert!(!core.alarms().is_active(AlarmKind::LowDischargeTemp));
}

#[test]
fn test_freeze_shutdown_policy_flag() {
    let config = ControllerConfig {
        freeze_shutdown_enabled: true,
        ..Default::default()
    };
    let mut core = ControlCore::new();

    let result = core.scan(
        &config,
        &inputs(occupied_schedule(), sensors(72.0, 35.0, true), false),
        &OutputOverrides::default(),
        1000,
    );
    assert!(core.alarms().is_active(AlarmKind::LowDischargeTemp));
    assert!(!result.outputs.fan);
    assert!(!result.outputs.compressor);
    assert!(!result.outputs.heat);
}

#[test]
fn test_high_zone_temp_hysteresis() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();
    let ovr = OutputOverrides::default();

    core.scan(&config, &inputs(occupied_schedule(), sensors(86.0, 55.0, true), false), &ovr, 1000);
    assert!(core.alarms().is_active(AlarmKind::HighZoneTemp));

    // Inside the hysteresis band the alarm holds.
    core.scan(&config, &inputs(occupied_schedule(), sensors(84.5, 55.0, true), false), &ovr, 2000);
    assert!(core.alarms().is_active(AlarmKind::HighZoneTemp));

    core.scan(&config, &inputs(occupied_schedule(), sensors(83.0, 55.0, true), false), &ovr, 3000);
    assert!(!core.alarms().is_active(AlarmKind::HighZoneTemp));
}

#[test]
fn test_alarm_acknowledgment() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();

    core.scan(&config, &inputs(occupied_schedule(), sensors(72.0, 35.0, true), false), &OutputOverrides::default(), 1000);
    assert!(core.alarms_mut().acknowledge(AlarmKind::LowDischargeTemp));
    assert!(core.alarms().records().iter().any(|r| r.acknowledged));

    // Nothing active of that kind: no-op.
    assert!(!core.alarms_mut().acknowledge(AlarmKind::HighZoneTemp));
}

#[test]
fn test_alarms_disabled_suppresses_and_clears() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();

    core.scan(&config, &inputs(occupied_schedule(), sensors(72.0, 35.0, true), false), &OutputOverrides::default(), 1000);
    assert!(core.alarms().is_active(AlarmKind::LowDischargeTemp));

    core.alarms_mut().set_enabled(false);
    core.scan(&config, &inputs(occupied_schedule(), sensors(72.0, 35.0, true), false), &OutputOverrides::default(), 2000);
    assert_eq!(core.alarms().active_count(), 0);
}

#[test]
fn test_override_cannot_defeat_fan_failure_shutdown() {
    let config = ControllerConfig::default();
    let mut core = ControlCore::new();
    let snapshot = sensors(80.0, 55.0, false);

    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 0);
    core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &OutputOverrides::default(), 30_000);
    assert!(core.fan().is_failed());

    let overrides = OutputOverrides {
        fan: Some(true),
        compressor: Some(true),
        ..Default::default()
    };
    let result = core.scan(&config, &inputs(occupied_schedule(), snapshot, false), &overrides, 31_000);
    assert!(!result.outputs.fan);
    assert!(!result.outputs.compressor);
    // The forced-on request also blocks re-arm: the latch holds.
    assert!(core.fan().is_failed());
}
