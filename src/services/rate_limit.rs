use chrono::{ DateTime, Local };
use log::info;
use serde::Serialize;

/// Outbound SMS budget. Counters grow after a batch by the number of
/// successful sends. The daily counter resets when the local calendar date
/// advances; the hourly counter only resets through `reset_counters`.
#[derive(Debug, Clone)]
pub struct SmsRateLimiter {
    max_per_hour: u32,
    max_per_day: u32,
    sent_hour: u32,
    sent_today: u32,
    last_reset: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub sms_sent_hour: u32,
    pub sms_sent_today: u32,
    pub max_per_hour: u32,
    pub max_per_day: u32,
}

impl SmsRateLimiter {
    pub fn new(max_per_hour: u32, max_per_day: u32) -> Self {
        Self::starting_at(max_per_hour, max_per_day, Local::now())
    }

    pub fn starting_at(max_per_hour: u32, max_per_day: u32, now: DateTime<Local>) -> Self {
        Self {
            max_per_hour,
            max_per_day,
            sent_hour: 0,
            sent_today: 0,
            last_reset: now,
        }
    }

    pub fn check(&mut self, additional: u32) -> bool {
        self.check_at(Local::now(), additional)
    }

    /// Whether a batch of `additional` messages may go out at `now`.
    /// A rejected batch leaves the counters untouched.
    pub fn check_at(&mut self, now: DateTime<Local>, additional: u32) -> bool {
        if now.date_naive() > self.last_reset.date_naive() {
            self.sent_today = 0;
            self.last_reset = now;
        }

        if self.sent_hour >= self.max_per_hour {
            return false;
        }
        if self.sent_today.saturating_add(additional) > self.max_per_day {
            return false;
        }
        true
    }

    pub fn record(&mut self, successful: u32) {
        self.sent_hour = self.sent_hour.saturating_add(successful);
        self.sent_today = self.sent_today.saturating_add(successful);
    }

    pub fn reset_counters(&mut self) {
        self.sent_hour = 0;
        self.sent_today = 0;
        self.last_reset = Local::now();
        info!("SMS counters reset");
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            sms_sent_hour: self.sent_hour,
            sms_sent_today: self.sent_today,
            max_per_hour: self.max_per_hour,
            max_per_day: self.max_per_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{ Duration, TimeZone };

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn hourly_cap_rejects_without_touching_counters() {
        let start = at(2024, 3, 10, 9, 0);
        let mut limiter = SmsRateLimiter::starting_at(3, 100, start);
        assert!(limiter.check_at(start, 3));
        limiter.record(3);

        assert!(!limiter.check_at(start + Duration::minutes(5), 1));
        let snap = limiter.snapshot();
        assert_eq!(snap.sms_sent_hour, 3);
        assert_eq!(snap.sms_sent_today, 3);
    }

    #[test]
    fn hourly_counter_survives_hour_boundaries() {
        let start = at(2024, 3, 10, 9, 0);
        let mut limiter = SmsRateLimiter::starting_at(2, 100, start);
        limiter.record(2);
        assert!(!limiter.check_at(start + Duration::hours(5), 1));
        // A new calendar day clears only the daily counter.
        assert!(!limiter.check_at(at(2024, 3, 11, 0, 1), 1));
        assert_eq!(limiter.snapshot().sms_sent_today, 0);
    }

    #[test]
    fn daily_counter_resets_on_date_rollover_not_elapsed_time() {
        let start = at(2024, 3, 10, 0, 30);
        let mut limiter = SmsRateLimiter::starting_at(1000, 5, start);
        assert!(limiter.check_at(start, 5));
        limiter.record(5);

        // 23 hours later, same calendar date.
        assert!(!limiter.check_at(at(2024, 3, 10, 23, 30), 1));
        // Two minutes later, but the date has rolled over.
        assert!(limiter.check_at(at(2024, 3, 11, 0, 1), 5));
    }

    #[test]
    fn whole_batch_is_rejected_when_it_would_overflow_the_day() {
        let start = at(2024, 3, 10, 12, 0);
        let mut limiter = SmsRateLimiter::starting_at(100, 10, start);
        limiter.record(8);
        assert!(limiter.check_at(start, 2));
        assert!(!limiter.check_at(start, 3));
    }

    #[test]
    fn reset_clears_both_counters() {
        let mut limiter = SmsRateLimiter::new(1, 1);
        limiter.record(1);
        assert!(!limiter.check(1));
        limiter.reset_counters();
        assert!(limiter.check(1));
    }
}
