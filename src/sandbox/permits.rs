use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Counted concurrency permit with strictly FIFO waiters. A limit of zero
/// means unbounded: `acquire` returns immediately and the guard is inert.
#[derive(Debug)]
pub struct Permits {
    limit: usize,
    state: Mutex<PermitState>,
    turn: Condvar,
}

#[derive(Debug)]
struct PermitState {
    in_use: usize,
    next_ticket: u64,
    waiting: VecDeque<u64>,
}

pub struct PermitGuard<'a> {
    permits: Option<&'a Permits>,
}

impl Permits {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Mutex::new(PermitState {
                in_use: 0,
                next_ticket: 0,
                waiting: VecDeque::new(),
            }),
            turn: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> PermitGuard<'_> {
        if self.limit == 0 {
            return PermitGuard { permits: None };
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiting.push_back(ticket);

        while state.waiting.front() != Some(&ticket) || state.in_use >= self.limit {
            state = self
                .turn
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }

        state.waiting.pop_front();
        state.in_use += 1;
        // Wake the next waiter in case another slot is also free.
        self.turn.notify_all();
        PermitGuard {
            permits: Some(self),
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_use = state.in_use.saturating_sub(1);
        drop(state);
        self.turn.notify_all();
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if let Some(permits) = self.permits {
            permits.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Permits;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn zero_limit_never_blocks() {
        let permits = Permits::new(0);
        let _a = permits.acquire();
        let _b = permits.acquire();
        let _c = permits.acquire();
    }

    #[test]
    fn limits_concurrent_holders() {
        let permits = Arc::new(Permits::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let permits = permits.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(thread::spawn(move || {
                let _guard = permits.acquire();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.join().expect("join");
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn waiters_are_served_in_arrival_order() {
        let permits = Arc::new(Permits::new(1));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = permits.acquire();
        let mut handles = Vec::new();
        for index in 0..4 {
            let permits = permits.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                let _guard = permits.acquire();
                order.lock().expect("order lock").push(index);
            }));
            // Give each waiter time to join the queue before the next.
            thread::sleep(Duration::from_millis(20));
        }

        drop(first);
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(*order.lock().expect("order lock"), vec![0, 1, 2, 3]);
    }
}
