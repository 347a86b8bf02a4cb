use std::time::{Duration, Instant};

/// Shortest delay a policy is allowed to produce
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Reconnect delay bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub floor: Duration,
    pub ceiling: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            floor: Duration::from_millis(1000),
            ceiling: Duration::from_millis(30_000),
        }
    }
}

/// Exponential backoff: floor, 2×floor, 4×floor, ... capped at the ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        // A zero floor would never grow; a floor above the ceiling would break the cap
        let ceiling = policy.ceiling.max(MIN_DELAY);
        let policy = BackoffPolicy {
            floor: policy.floor.clamp(MIN_DELAY, ceiling),
            ceiling,
        };
        Self {
            policy,
            next: policy.floor,
        }
    }

    /// Delay for the next attempt; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.policy.ceiling);
        delay
    }

    pub fn peek(&self) -> Duration {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = self.policy.floor;
    }
}

/// A scheduled reconnect. Dropping it cancels the reconnect.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectTimer {
    pub deadline: Instant,
    pub delay: Duration,
}

impl ReconnectTimer {
    pub fn schedule(now: Instant, delay: Duration) -> Self {
        Self {
            deadline: now + delay,
            delay,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(floor_ms: u64, ceiling_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            floor: Duration::from_millis(floor_ms),
            ceiling: Duration::from_millis(ceiling_ms),
        }
    }

    #[test]
    fn delays_double_until_capped() {
        let mut backoff = Backoff::new(policy(500, 5000));
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 5000, 5000, 5000]);
    }

    #[test]
    fn delay_never_exceeds_ceiling() {
        let mut backoff = Backoff::new(policy(1000, 30_000));
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_millis(30_000));
        }
    }

    #[test]
    fn reset_returns_to_floor() {
        let mut backoff = Backoff::new(policy(250, 10_000));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.peek(), Duration::from_millis(1000));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn floor_above_ceiling_is_clamped() {
        let mut backoff = Backoff::new(policy(9000, 2000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn zero_floor_still_backs_off() {
        let mut backoff = Backoff::new(policy(0, 8));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8]);

        let mut zero = Backoff::new(policy(0, 0));
        assert_eq!(zero.next_delay(), Duration::from_millis(1));
    }

    #[test]
    fn timer_due_after_full_delay() {
        let now = Instant::now();
        let timer = ReconnectTimer::schedule(now, Duration::from_secs(2));
        assert!(!timer.is_due(now + Duration::from_millis(1999)));
        assert!(timer.is_due(now + Duration::from_secs(2)));
        assert_eq!(timer.remaining(now + Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(timer.remaining(now + Duration::from_secs(5)), Duration::ZERO);
    }
}
