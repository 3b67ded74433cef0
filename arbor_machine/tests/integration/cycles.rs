//! Homing and probe cycles driven end-to-end through the dispatch
//! loop, including their interaction with program blocks.

use arbor_common::axis::{Axis, AxisFlags};
use arbor_common::gcode::{MotionMode, NextAction};
use arbor_common::state::CombinedState;
use arbor_common::status::Status;
use arbor_machine::model::GCodeInput;
use arbor_machine::normalize::execute_block;
use arbor_machine::report;

use super::{machine, run_to_idle, tick};

fn machine_with_switches() -> arbor_machine::machine::CanonicalMachine {
    let mut cm = machine();
    cm.runtime_mut().set_switch_position(Axis::X, Some(-400.0));
    cm.runtime_mut().set_switch_position(Axis::Y, Some(-400.0));
    cm.runtime_mut().set_switch_position(Axis::Z, Some(-240.0));
    cm.runtime_mut().set_switch_position(Axis::A, Some(-350.0));
    cm
}

#[test]
fn homing_block_homes_the_machine() {
    let mut cm = machine_with_switches();

    // G28.2 with no axis words: home everything capable.
    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::HomingCycle);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
    assert_eq!(cm.combined_state(), CombinedState::Homing);

    run_to_idle(&mut cm, 500);
    assert!(cm.homed().has(Axis::X));
    assert!(cm.homed().has(Axis::Z));
    assert_eq!(report::get(&cm, "home"), Some(serde_json::json!(1)));
    assert_eq!(cm.combined_state(), CombinedState::ProgramStop);
}

#[test]
fn probe_block_after_homing_captures_surface() {
    let mut cm = machine_with_switches();

    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::HomingCycle);
    execute_block(&mut cm, &b);
    run_to_idle(&mut cm, 500);

    // Raise the frame a little so the probe has room to travel down.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::Z, 20.0);
    execute_block(&mut cm, &b);
    run_to_idle(&mut cm, 20);

    // The probe surface sits at Z = 4.2.
    let mut trip = [0.0; arbor_common::consts::AXIS_COUNT];
    trip[Axis::Z as usize] = 4.2;
    cm.runtime_mut().set_probe_trip(Some(trip));

    // G38.2 Z0 F300.
    let mut b = GCodeInput::default();
    b.set_feed_rate(300.0);
    b.set_next_action(NextAction::StraightProbe);
    b.set_axis_word(Axis::Z, 0.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
    assert_eq!(cm.combined_state(), CombinedState::Probe);

    run_to_idle(&mut cm, 50);
    assert!(cm.probe_result().triggered);
    assert_eq!(cm.probe_result().position[Axis::Z as usize], 4.2);
    assert_eq!(report::get(&cm, "prbe"), Some(serde_json::json!(1)));
    assert_eq!(report::get(&cm, "prbz"), Some(serde_json::json!(4.2)));
    // The model tracks where the probe actually stopped.
    assert_eq!(cm.store().gmx.position[Axis::Z as usize], 4.2);
}

#[test]
fn probe_before_homing_is_refused() {
    let mut cm = machine_with_switches();
    let mut b = GCodeInput::default();
    b.set_feed_rate(300.0);
    b.set_next_action(NextAction::StraightProbe);
    b.set_axis_word(Axis::Z, -5.0);
    assert_eq!(execute_block(&mut cm, &b), Status::AxisNotHomed);
}

#[test]
fn homing_failure_alarms_and_blocks_motion() {
    let mut cm = machine_with_switches();
    cm.runtime_mut().set_switch_position(Axis::Z, None);

    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::HomingCycle);
    b.set_axis_word(Axis::Z, 0.0);
    execute_block(&mut cm, &b);
    run_to_idle(&mut cm, 500);

    assert_eq!(cm.combined_state(), CombinedState::Alarm);

    // Motion is refused until the alarm is cleared.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 10.0);
    assert_eq!(execute_block(&mut cm, &b), Status::MachineAlarmed);

    assert_eq!(cm.clear_alarm(), Status::Ok);
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 10.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
}

#[test]
fn program_continues_after_mid_program_homing() {
    let mut cm = machine_with_switches();

    // Some motion first.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 30.0);
    execute_block(&mut cm, &b);
    run_to_idle(&mut cm, 20);

    // G28.2 X: homing nests inside a program.
    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::HomingCycle);
    b.set_axis_word(Axis::X, 0.0);
    execute_block(&mut cm, &b);

    // Drive until homing hands back to machining.
    for _ in 0..500 {
        cm.dispatch_tick();
        if cm.homed().has(Axis::X) {
            break;
        }
    }
    assert!(cm.homed().has(Axis::X));
    assert_eq!(cm.store().gmx.position[Axis::X as usize], 0.0);

    // The next block feeds normally.
    let mut b = GCodeInput::default();
    b.set_feed_rate(600.0);
    b.set_motion_mode(MotionMode::Feed);
    b.set_axis_word(Axis::X, 12.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
    run_to_idle(&mut cm, 20);
    assert_eq!(cm.runtime().position(Axis::X), 12.0);
}

#[test]
fn feedhold_ignored_while_nothing_runs() {
    let mut cm = machine();
    cm.request_feedhold();
    tick(&mut cm, 2);
    assert_eq!(cm.combined_state(), CombinedState::Ready);
}
