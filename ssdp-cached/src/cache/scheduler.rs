use chrono::{DateTime, Duration, Utc};

/// Gate for the sweep-and-rediscover cycle. However many searches arrive,
/// the cycle runs at most once per interval.
#[derive(Debug, Clone)]
pub struct Scheduler {
    last_sweep: DateTime<Utc>,
    interval: Duration,
}

impl Scheduler {
    /// `started` counts as a sweep; the startup discovery broadcast covers it.
    pub fn new(started: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            last_sweep: started,
            interval,
        }
    }

    /// Returns true, and restarts the interval, when a cycle is due.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if now - self.last_sweep < self.interval {
            return false;
        }
        self.last_sweep = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_right_after_start() {
        let start = Utc::now();
        let mut scheduler = Scheduler::new(start, Duration::minutes(30));

        assert!(!scheduler.poll(start + Duration::minutes(29)));
        assert!(scheduler.poll(start + Duration::minutes(30)));
    }

    #[test]
    fn test_due_after_interval() {
        let start = Utc::now();
        let mut scheduler = Scheduler::new(start, Duration::minutes(30));
        let later = start + Duration::minutes(30);

        assert!(scheduler.poll(later));
        assert!(!scheduler.poll(later + Duration::seconds(1)));
        assert!(!scheduler.poll(later + Duration::minutes(29)));
        assert!(scheduler.poll(later + Duration::minutes(30)));
    }

    #[test]
    fn test_burst_triggers_at_most_once() {
        let start = Utc::now();
        let mut scheduler = Scheduler::new(start, Duration::minutes(30));
        let burst_start = start + Duration::hours(1);

        let fired = (0..100)
            .filter(|i| scheduler.poll(burst_start + Duration::milliseconds(i * 10)))
            .count();

        assert_eq!(fired, 1);
    }
}
