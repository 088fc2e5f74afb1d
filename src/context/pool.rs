//! Reuse of [`Context`] allocations across requests.

use parking_lot::Mutex;

use super::Context;

/// A concurrency-safe checkout/return pool of [`Context`] values.
///
/// A checked-out context is owned exclusively by the single request
/// driving it. The whole request-isolation guarantee rests on
/// [`Context::reset`] being run against every context before it serves
/// a request; the router does so right after checkout.
pub(crate) struct ContextPool {
    idle: Mutex<Vec<Box<Context>>>,
}

impl ContextPool {
    pub(crate) fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn checkout(&self) -> Box<Context> {
        self.idle.lock().pop().unwrap_or_else(Context::fresh)
    }

    pub(crate) fn release(&self, cx: Box<Context>) {
        self.idle.lock().push(cx);
    }

    #[cfg(test)]
    pub(crate) fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_reuses_released_contexts() {
        let pool = ContextPool::new();
        assert_eq!(pool.idle_len(), 0);

        let cx = pool.checkout();
        pool.release(cx);
        assert_eq!(pool.idle_len(), 1);

        let _cx = pool.checkout();
        assert_eq!(pool.idle_len(), 0);
    }
}
