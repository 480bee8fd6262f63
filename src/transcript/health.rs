//! Alignment health monitoring: watches for runs of failed alignments and
//! emits a warning once they become sustained, then a recovery notice once
//! alignment has been reliable again for a while.

const FAILURE_WARNING_THRESHOLD: u32 = 3;
const RECOVERY_SUCCESS_THRESHOLD: u32 = 5;

#[derive(Debug, PartialEq, Eq)]
pub enum HealthEvent {
    Warning {
        consecutive_failures: u32,
        total_failures: u32,
        last_failure_reason: String,
        is_recoverable: bool,
        recommendation: String,
    },
    Recovery {
        total_segments_processed: u64,
        previous_failures: u32,
    },
}

#[derive(Debug, Default)]
pub struct HealthMonitor {
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_failures: u32,
    total_segments: u64,
    warning_outstanding: bool,
}

impl HealthMonitor {
    /// Record a synthetic-fallback alignment: the only step in the chain
    /// that actually failed to attribute a speaker.
    pub fn record_failure(&mut self, reason: String) -> Option<HealthEvent> {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.total_failures += 1;
        self.total_segments += 1;

        if self.consecutive_failures >= FAILURE_WARNING_THRESHOLD && !self.warning_outstanding {
            self.warning_outstanding = true;
            return Some(HealthEvent::Warning {
                consecutive_failures: self.consecutive_failures,
                total_failures: self.total_failures,
                last_failure_reason: reason,
                is_recoverable: true,
                recommendation: "attribution will resume automatically once a matching or nearby speaker segment arrives".to_string(),
            });
        }
        None
    }

    pub fn record_success(&mut self) -> Option<HealthEvent> {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.total_segments += 1;

        if self.warning_outstanding && self.consecutive_successes > RECOVERY_SUCCESS_THRESHOLD {
            self.warning_outstanding = false;
            return Some(HealthEvent::Recovery {
                total_segments_processed: self.total_segments,
                previous_failures: self.total_failures,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason() -> String {
        "no speaker segment within tolerance and no last-known speaker".to_string()
    }

    #[test]
    fn warns_after_three_consecutive_failures() {
        let mut monitor = HealthMonitor::default();
        assert_eq!(monitor.record_failure(reason()), None);
        assert_eq!(monitor.record_failure(reason()), None);
        match monitor.record_failure(reason()).unwrap() {
            HealthEvent::Warning { consecutive_failures, total_failures, last_failure_reason, is_recoverable, .. } => {
                assert_eq!(consecutive_failures, 3);
                assert_eq!(total_failures, 3);
                assert_eq!(last_failure_reason, reason());
                assert!(is_recoverable);
            }
            HealthEvent::Recovery { .. } => panic!("expected a warning"),
        }
    }

    #[test]
    fn does_not_repeat_warning_while_outstanding() {
        let mut monitor = HealthMonitor::default();
        for _ in 0..3 {
            monitor.record_failure(reason());
        }
        assert_eq!(monitor.record_failure(reason()), None);
    }

    #[test]
    fn recovers_after_more_than_five_consecutive_successes() {
        let mut monitor = HealthMonitor::default();
        for _ in 0..3 {
            monitor.record_failure(reason());
        }
        for _ in 0..5 {
            assert_eq!(monitor.record_success(), None);
        }
        assert_eq!(
            monitor.record_success(),
            Some(HealthEvent::Recovery { total_segments_processed: 9, previous_failures: 3 })
        );
    }

    #[test]
    fn success_streak_without_prior_warning_emits_nothing() {
        let mut monitor = HealthMonitor::default();
        for _ in 0..10 {
            assert_eq!(monitor.record_success(), None);
        }
    }
}
