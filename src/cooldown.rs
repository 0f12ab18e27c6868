//! Admission policy for motion readings.

use std::time::Duration;

use tokio::time::Instant;

/// Result of offering a motion reading to the [`CooldownWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Rejected; `remaining` is the time left until the window reopens.
    Suppressed { remaining: Duration },
}

/// Minimum spacing between admitted motion events.
///
/// The window is measured from the time of the last *admission*, not from when
/// that event's pipeline finished.
#[derive(Debug, Clone)]
pub struct CooldownWindow {
    duration: Duration,
    last_admitted_at: Option<Instant>,
}

impl CooldownWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_admitted_at: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn last_admitted_at(&self) -> Option<Instant> {
        self.last_admitted_at
    }

    /// Admit the reading if at least `duration` has elapsed since the last
    /// admission (or there has been none), recording `now` as the new
    /// admission time. Otherwise leave the window untouched.
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        if let Some(last) = self.last_admitted_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.duration {
                return Admission::Suppressed {
                    remaining: self.duration - elapsed,
                };
            }
        }

        self.last_admitted_at = Some(now);
        Admission::Admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_first_reading_is_admitted() {
        let mut window = CooldownWindow::new(secs(10));
        let now = Instant::now();

        assert_eq!(window.try_admit(now), Admission::Admitted);
        assert_eq!(window.last_admitted_at(), Some(now));
    }

    #[test]
    fn test_reading_inside_window_is_suppressed() {
        let mut window = CooldownWindow::new(secs(10));
        let t0 = Instant::now();
        window.try_admit(t0);

        assert_eq!(
            window.try_admit(t0 + secs(3)),
            Admission::Suppressed { remaining: secs(7) }
        );
        assert_eq!(window.last_admitted_at(), Some(t0));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut window = CooldownWindow::new(secs(10));
        let t0 = Instant::now();
        window.try_admit(t0);

        assert_eq!(window.try_admit(t0 + secs(10)), Admission::Admitted);
        assert_eq!(window.last_admitted_at(), Some(t0 + secs(10)));
    }

    #[test]
    fn test_suppression_does_not_extend_window() {
        let mut window = CooldownWindow::new(secs(10));
        let t0 = Instant::now();
        window.try_admit(t0);

        for s in 1..10 {
            assert!(matches!(
                window.try_admit(t0 + secs(s)),
                Admission::Suppressed { .. }
            ));
        }
        assert_eq!(window.try_admit(t0 + secs(11)), Admission::Admitted);
    }

    #[test]
    fn test_admissions_never_closer_than_duration() {
        let cooldown = Duration::from_millis(2500);
        let mut window = CooldownWindow::new(cooldown);
        let t0 = Instant::now();
        let mut admitted = Vec::new();

        for tick in 0..40u64 {
            let now = t0 + Duration::from_millis(tick * 700);
            if window.try_admit(now) == Admission::Admitted {
                admitted.push(now);
            }
        }

        assert!(admitted.len() > 1);
        for pair in admitted.windows(2) {
            assert!(pair[1] - pair[0] >= cooldown);
        }
    }

    #[test]
    fn test_zero_cooldown_admits_everything() {
        let mut window = CooldownWindow::new(Duration::ZERO);
        let t0 = Instant::now();

        assert_eq!(window.try_admit(t0), Admission::Admitted);
        assert_eq!(window.try_admit(t0), Admission::Admitted);
    }
}
