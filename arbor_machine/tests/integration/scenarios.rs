//! End-to-end block scenarios: parser-shaped input through the
//! normalizer, the planner and the runtime, observing positions and
//! the combined state along the way.

use arbor_common::axis::Axis;
use arbor_common::gcode::{MotionMode, NextAction, Units};
use arbor_common::state::CombinedState;
use arbor_common::status::Status;
use arbor_machine::model::GCodeInput;
use arbor_machine::normalize::execute_block;
use arbor_machine::report;

use super::{machine, run_to_idle, tick};

#[test]
fn s1_rapid_reaches_target_through_the_states() {
    let mut cm = machine();
    assert_eq!(cm.combined_state(), CombinedState::Ready);

    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 10.0);
    b.set_axis_word(Axis::Y, 20.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);

    // Enqueued: the machine is in a running cycle.
    assert_eq!(cm.combined_state(), CombinedState::Run);

    // Runtime executes; the queue drains; the cycle ends.
    run_to_idle(&mut cm, 20);
    assert_eq!(cm.runtime().position(Axis::X), 10.0);
    assert_eq!(cm.runtime().position(Axis::Y), 20.0);
    assert_eq!(cm.runtime().position(Axis::Z), 0.0);
    assert_eq!(cm.combined_state(), CombinedState::ProgramStop);
}

#[test]
fn s2_inch_block_converts_mm_block_does_not() {
    let mut cm = machine();

    let mut b = GCodeInput::default();
    b.set_units(Units::Inches);
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 1.0);
    execute_block(&mut cm, &b);
    assert_eq!(cm.store().gmx.position[0], 25.4);

    let mut b = GCodeInput::default();
    b.set_units(Units::Millimeters);
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 1.0);
    execute_block(&mut cm, &b);
    assert_eq!(cm.store().gmx.position[0], 1.0);

    run_to_idle(&mut cm, 20);
    assert_eq!(cm.runtime().position(Axis::X), 1.0);
}

#[test]
fn s3_work_offset_moves_machine_reports_work_zero() {
    let mut cm = machine();

    // G54 G10 L2 P1 X5.
    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::SetCoordOffsets);
    b.set_l_word(2);
    b.set_parameter(1.0);
    b.set_axis_word(Axis::X, 5.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);

    // G0 X0.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 0.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
    run_to_idle(&mut cm, 20);

    assert_eq!(cm.store().gmx.position[0], 5.0);
    assert_eq!(report::get(&cm, "mpox"), Some(serde_json::json!(5.0)));
    assert_eq!(report::get(&cm, "posx"), Some(serde_json::json!(0.0)));
}

#[test]
fn s4_feed_without_rate_is_rejected_cleanly() {
    let mut cm = machine();
    let before = *cm.gm();

    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Feed);
    b.set_axis_word(Axis::X, 100.0);
    assert_eq!(execute_block(&mut cm, &b), Status::FeedRateNotSet);
    assert_eq!(cm.gm().target, before.target);
    assert!(cm.planner().queue_empty());
}

#[test]
fn s5_feedhold_and_resume_mid_move() {
    let mut cm = machine();

    let mut b = GCodeInput::default();
    b.set_feed_rate(600.0);
    b.set_motion_mode(MotionMode::Feed);
    b.set_axis_word(Axis::X, 50.0);
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
    tick(&mut cm, 1); // runtime starts the move
    assert_eq!(cm.combined_state(), CombinedState::Run);

    // `!` arrives from the input interrupt.
    cm.request_feedhold();
    tick(&mut cm, 3);
    assert_eq!(cm.combined_state(), CombinedState::Hold);
    let held_at = cm.runtime().position(Axis::X);
    assert!(held_at > 0.0 && held_at < 50.0, "held at {held_at}");

    // `~` resumes.
    cm.request_cycle_start();
    run_to_idle(&mut cm, 20);
    assert_eq!(cm.runtime().position(Axis::X), 50.0);
    assert_eq!(cm.combined_state(), CombinedState::ProgramStop);
}

#[test]
fn s6_origin_offset_suspend_resume() {
    let mut cm = machine();

    // Establish a nonzero origin: move to X3, then G92 X0.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 3.0);
    execute_block(&mut cm, &b);
    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::SetOriginOffsets);
    b.set_axis_word(Axis::X, 0.0);
    b.set_axis_word(Axis::Y, 0.0);
    execute_block(&mut cm, &b);

    // G0 X10 → machine X = 10 + 3.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 10.0);
    execute_block(&mut cm, &b);
    assert_eq!(cm.store().gmx.position[0], 13.0);

    // G92.2 then G0 X10 → machine X = 10; the offset is preserved.
    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::SuspendOriginOffsets);
    execute_block(&mut cm, &b);
    let mut b = GCodeInput::default();
    b.set_axis_word(Axis::X, 10.0);
    execute_block(&mut cm, &b);
    assert_eq!(cm.store().gmx.position[0], 10.0);

    // G92.3 restores the suspended offset.
    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::ResumeOriginOffsets);
    execute_block(&mut cm, &b);
    let mut b = GCodeInput::default();
    b.set_axis_word(Axis::X, 10.0);
    execute_block(&mut cm, &b);
    assert_eq!(cm.store().gmx.position[0], 13.0);

    run_to_idle(&mut cm, 30);
    assert_eq!(cm.runtime().position(Axis::X), 13.0);
}

#[test]
fn reports_follow_the_runtime_during_motion() {
    let mut cm = machine();

    let mut b = GCodeInput::default();
    b.set_line_number(7);
    b.set_feed_rate(600.0);
    b.set_motion_mode(MotionMode::Feed);
    b.set_axis_word(Axis::X, 40.0);
    execute_block(&mut cm, &b);

    // Parse ahead: a second block advances the canonical model while
    // the first is still the one executing.
    let mut b = GCodeInput::default();
    b.set_line_number(8);
    b.set_axis_word(Axis::X, 80.0);
    execute_block(&mut cm, &b);

    tick(&mut cm, 1); // first move starts
    assert!(cm.runtime().busy());
    // The report reads the executing move's snapshot, not the model.
    assert_eq!(report::get(&cm, "line"), Some(serde_json::json!(7)));
    assert_eq!(cm.gm().line_number, 8);

    run_to_idle(&mut cm, 20);
    assert_eq!(cm.runtime().position(Axis::X), 80.0);
}

#[test]
fn arc_block_executes_to_endpoint() {
    let mut cm = machine();

    let mut b = GCodeInput::default();
    b.set_feed_rate(1200.0);
    b.set_motion_mode(MotionMode::CounterclockwiseArc);
    b.set_axis_word(Axis::X, 10.0);
    b.set_axis_word(Axis::Y, 10.0);
    b.set_arc_offset(0, 0.0);
    b.set_arc_offset(1, 10.0); // center (0, 10)
    assert_eq!(execute_block(&mut cm, &b), Status::Ok);
    assert!(cm.planner().len() > 1);

    run_to_idle(&mut cm, 200);
    assert_eq!(cm.runtime().position(Axis::X), 10.0);
    assert_eq!(cm.runtime().position(Axis::Y), 10.0);
    assert_eq!(cm.combined_state(), CombinedState::ProgramStop);
}
