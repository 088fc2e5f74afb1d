//! Bounded-concurrency admission gate.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::context::Context;
use crate::handler::Handler;

/// A counting admission gate limiting how many chains run at once.
///
/// [`acquire`][Self::acquire] blocks while the limit is reached
/// (backpressure); the returned [`GatePermit`] releases its slot on
/// drop, unconditionally, however the gated code exits.
///
/// Cloning shares the gate: all clones count against one limit.
#[derive(Clone)]
pub struct ConcurrencyGate {
    shared: Arc<Shared>,
}

struct Shared {
    max: usize,
    active: Mutex<usize>,
    released: Condvar,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `max` concurrent holders.
    ///
    /// A `max` of zero is treated as one: a gate that can never be
    /// entered would block every caller forever.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                max: max.max(1),
                active: Mutex::new(0),
                released: Condvar::new(),
            }),
        }
    }

    /// Acquire a slot, blocking until one is free.
    #[must_use]
    pub fn acquire(&self) -> GatePermit {
        let mut active = self.shared.active.lock();
        while *active >= self.shared.max {
            self.shared.released.wait(&mut active);
        }
        *active += 1;
        drop(active);
        GatePermit {
            shared: self.shared.clone(),
        }
    }

    /// Acquire a slot without blocking.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let mut active = self.shared.active.lock();
        if *active >= self.shared.max {
            return None;
        }
        *active += 1;
        drop(active);
        Some(GatePermit {
            shared: self.shared.clone(),
        })
    }

    /// Number of currently held slots.
    #[must_use]
    pub fn active(&self) -> usize {
        *self.shared.active.lock()
    }

    #[must_use]
    pub fn max(&self) -> usize {
        self.shared.max
    }

    /// Turn this gate into middleware that holds a slot for the whole
    /// downstream chain of each gated request.
    pub fn into_handler(self) -> impl Handler {
        move |cx: &mut Context| {
            let _permit = self.acquire();
            cx.advance();
        }
    }
}

/// Middleware admitting at most `max` simultaneously running chains.
///
/// Shortcut for [`ConcurrencyGate::new(max).into_handler()`].
///
/// [`ConcurrencyGate::new(max).into_handler()`]: ConcurrencyGate::into_handler
pub fn max_concurrent(max: usize) -> impl Handler {
    ConcurrencyGate::new(max).into_handler()
}

/// A held slot of a [`ConcurrencyGate`]; releases on drop.
pub struct GatePermit {
    shared: Arc<Shared>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let mut active = self.shared.active.lock();
        *active = active.saturating_sub(1);
        drop(active);
        self.shared.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_gate_admits_up_to_max() {
        let gate = ConcurrencyGate::new(2);
        let first = gate.try_acquire().unwrap();
        let _second = gate.try_acquire().unwrap();
        assert_eq!(gate.active(), 2);
        assert!(gate.try_acquire().is_none());

        drop(first);
        assert_eq!(gate.active(), 1);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_excess_caller_blocks_until_release() {
        let gate = ConcurrencyGate::new(2);
        let held = gate.acquire();
        let _also_held = gate.acquire();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || {
                let _permit = gate.acquire();
                tx.send(()).ok();
            })
        };

        // the third caller must not get through while both slots are held
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.max(), 1);
        let _permit = gate.acquire();
        assert!(gate.try_acquire().is_none());
    }

    #[test]
    fn test_middleware_releases_slot_when_the_chain_panics() {
        let gate = ConcurrencyGate::new(1);
        let middleware = gate.clone().into_handler();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut cx = Context::fresh();
            cx.reset(crate::request::Request::default());
            cx.install_chain(crate::handler::HandlerChain::from_parts(
                &[],
                vec![
                    Arc::new(middleware) as crate::handler::DynHandler,
                    Arc::new(|_: &mut Context| {
                        panic!("downstream blew up");
                    }),
                ],
            ));
            cx.advance();
        }));

        assert!(outcome.is_err());
        assert_eq!(gate.active(), 0);
        assert!(gate.try_acquire().is_some());
    }
}
