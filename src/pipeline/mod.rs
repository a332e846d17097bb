mod step;
mod waterfall;

use std::cell::Cell;

pub use step::*;
pub use waterfall::Waterfall;

/// Result of running a waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow<R> {
    /// False if some step returned without calling its continuation.
    pub ok: bool,
    /// The interrupting step's value, or the terminal's.
    pub value: R,
}

/// Runs `steps` in order, ending in `terminal` unless a step interrupts.
///
/// With no steps, `terminal` runs right away on `args`.
pub fn run_waterfall<A, R, F>(steps: &[Step<A, R>], args: A, terminal: F) -> Flow<R>
where
    F: FnOnce(A) -> R,
{
    let interrupted = Cell::new(false);
    let value = step::dispatch(steps, args, Box::new(terminal), &interrupted);
    Flow {
        ok: !interrupted.get(),
        value,
    }
}
