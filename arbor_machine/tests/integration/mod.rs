//! Shared helpers for the integration scenarios.

pub mod cycles;
pub mod persistence;
pub mod scenarios;

use arbor_common::config::MachineConfig;
use arbor_machine::machine::CanonicalMachine;

/// Call at the top of a test to see the controller's tracing output
/// (`RUST_LOG=arbor_machine=debug cargo test -- --nocapture`).
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A ready-to-run machine with the default profile.
pub fn machine() -> CanonicalMachine {
    let mut cm = CanonicalMachine::new(MachineConfig::default());
    cm.init();
    cm
}

/// Drive the dispatch loop.
pub fn tick(cm: &mut CanonicalMachine, passes: usize) {
    for _ in 0..passes {
        cm.dispatch_tick();
    }
}

/// Drive until the machine is fully idle (or the pass budget runs out).
pub fn run_to_idle(cm: &mut CanonicalMachine, max_passes: usize) {
    use arbor_common::state::MachineState;
    for _ in 0..max_passes {
        cm.dispatch_tick();
        if cm.planner().queue_empty()
            && !cm.runtime().busy()
            && cm.machine_state() != MachineState::Cycle
        {
            break;
        }
    }
}
