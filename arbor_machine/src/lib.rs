//! # Arbor Canonical Machine
//!
//! The semantic center of the Arbor CNC controller. The upstream
//! parser fills the input tier and calls [`normalize::execute_block`];
//! every G-/M-code becomes a call into the canonical command API,
//! which owns the model of where the machine is, what units it works
//! in, which coordinate system is active, and what cycle is in
//! progress. Downstream, each move is handed to the planner as a
//! by-value snapshot of the canonical model.
//!
//! ## Architecture
//!
//! 1. **Model** — three tiers: input block (gn/gf), canonical model
//!    (gm/gmx), runtime snapshot.
//! 2. **Normalizer** — validates and normalizes one block into the
//!    canonical model (mm, machine frame).
//! 3. **Command API** — the `cm_*` surface: motion, offsets, modal
//!    settings, overrides, cycles.
//! 4. **Automaton** — machine/cycle/motion state with feedhold and
//!    homing sub-machines.
//! 5. **Sequencer** — `!`/`%`/`~` request latches and the cooperative
//!    callbacks that drive feedhold, homing and probing.
//!
//! ## Dispatch loop
//!
//! All mutation happens on the single dispatcher context. The only
//! cross-context state is the three request latches, each a one-word
//! SPSC cell. The embedding firmware calls
//! [`machine::CanonicalMachine::dispatch_tick`] from its main loop.

pub mod arc;
pub mod homing;
pub mod machine;
pub mod model;
pub mod motion;
pub mod normalize;
pub mod offsets;
pub mod persist;
pub mod planner;
pub mod probe;
pub mod report;
pub mod runtime;
pub mod sequencer;
pub mod state;
