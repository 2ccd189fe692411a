//! Process-fatal panic policy.
//!
//! Any panic outside an explicitly contained section is an unrecoverable
//! bug: the hook logs it and takes the process down with exit code 1. This
//! covers spawned tasks too, which the runtime would otherwise swallow when
//! their join handles are dropped — the hook runs at panic time, before the
//! task-level unwind is caught. The contained marker lets the dispatcher
//! keep its fail-open handling of scorer panics.

use std::cell::Cell;

use tracing::error;

thread_local! {
    static CONTAINED: Cell<bool> = Cell::new(false);
}

/// True while the current thread is inside [`contained`].
pub fn is_contained() -> bool {
    CONTAINED.with(|flag| flag.get())
}

/// Run `f` with the fatal hook standing down, so a `catch_unwind` around
/// this call observes a panic instead of the process dying. The marker is
/// cleared on unwind as well.
pub fn contained<T>(f: impl FnOnce() -> T) -> T {
    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            CONTAINED.with(|flag| flag.set(false));
        }
    }

    CONTAINED.with(|flag| flag.set(true));
    let _reset = Reset;
    f()
}

/// Install the process-wide hook: any panic outside a contained section is
/// logged fatally and terminates the process with exit code 1.
pub fn install_exit_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if is_contained() {
            default_hook(info);
            return;
        }
        error!("fatal panic, terminating: {info}");
        default_hook(info);
        std::process::exit(1);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    // install_exit_hook is process-global and would tear down the test
    // harness; it is exercised end-to-end in tests/fatal_exit.rs instead.

    #[test]
    fn marker_is_scoped_to_the_closure() {
        assert!(!is_contained());
        assert!(contained(is_contained));
        assert!(!is_contained());
    }

    #[test]
    fn marker_clears_even_when_the_closure_panics() {
        let result = catch_unwind(AssertUnwindSafe(|| contained(|| panic!("boom"))));
        assert!(result.is_err());
        assert!(!is_contained());
    }
}
