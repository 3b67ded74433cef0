//! Offset persistence: G10 writes flow through the config store on
//! idle, and a rebooted machine sees them again.

use arbor_common::axis::Axis;
use arbor_common::config::MachineConfig;
use arbor_common::gcode::{CoordinateSystem, MotionMode, NextAction};
use arbor_common::status::Status;
use arbor_machine::machine::CanonicalMachine;
use arbor_machine::model::GCodeInput;
use arbor_machine::normalize::execute_block;
use arbor_machine::persist::TomlOffsetStore;

use super::run_to_idle;

fn machine_with_store(path: &std::path::Path) -> CanonicalMachine {
    let store = TomlOffsetStore::new(path);
    let mut cm = CanonicalMachine::new(MachineConfig::default()).with_offset_store(Box::new(store));
    cm.init();
    cm
}

#[test]
fn g10_persists_on_idle_and_survives_reboot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offsets.toml");

    {
        let mut cm = machine_with_store(&path);

        // G10 L2 P2 X-7.5 Y4.
        let mut b = GCodeInput::default();
        b.set_next_action(NextAction::SetCoordOffsets);
        b.set_l_word(2);
        b.set_parameter(2.0);
        b.set_axis_word(Axis::X, -7.5);
        b.set_axis_word(Axis::Y, 4.0);
        assert_eq!(execute_block(&mut cm, &b), Status::Ok);
        assert!(cm.g10_persist_pending());

        // Idle pass performs the write-through.
        cm.dispatch_tick();
        assert!(!cm.g10_persist_pending());
        assert!(path.exists());
    }

    // Reboot: the table comes back from the store.
    let cm = machine_with_store(&path);
    let g55 = CoordinateSystem::G55.index();
    assert_eq!(cm.store().offset_table[g55][0], -7.5);
    assert_eq!(cm.store().offset_table[g55][1], 4.0);
}

#[test]
fn persistence_waits_for_motion_to_finish() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offsets.toml");
    let mut cm = machine_with_store(&path);

    // Queue motion, then program an offset while the queue is busy.
    let mut b = GCodeInput::default();
    b.set_motion_mode(MotionMode::Traverse);
    b.set_axis_word(Axis::X, 10.0);
    execute_block(&mut cm, &b);

    let mut b = GCodeInput::default();
    b.set_next_action(NextAction::SetCoordOffsets);
    b.set_l_word(2);
    b.set_parameter(1.0);
    b.set_axis_word(Axis::X, 5.0);
    execute_block(&mut cm, &b);

    // While the move is still queued/executing, nothing is written.
    cm.dispatch_tick();
    assert!(cm.g10_persist_pending() || path.exists());

    run_to_idle(&mut cm, 20);
    assert!(!cm.g10_persist_pending());
    assert!(path.exists());
}
