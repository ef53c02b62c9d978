use serde::Serialize;
use tokio::sync::watch;

/// Point-in-time progress of a running sync job, polled by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percent: u8,
    pub description: String,
}

impl Progress {
    fn idle() -> Self {
        Self {
            current: 0,
            total: 0,
            percent: 0,
            description: "waiting".to_string(),
        }
    }
}

/// Publishes progress snapshots over a watch channel. The reported percent
/// never decreases, even if phase boundaries would otherwise step backwards.
pub struct ProgressReporter {
    tx: watch::Sender<Progress>,
    high_water: u8,
}

impl ProgressReporter {
    pub fn new() -> (Self, watch::Receiver<Progress>) {
        let (tx, rx) = watch::channel(Progress::idle());
        (Self { tx, high_water: 0 }, rx)
    }

    /// Report `current` of `total` units done, mapped into the
    /// `[phase_start, phase_end]` percent range.
    pub fn report(
        &mut self,
        current: usize,
        total: usize,
        phase_start: u8,
        phase_end: u8,
        description: &str,
    ) {
        let span = phase_end.saturating_sub(phase_start) as usize;
        let offset = if total == 0 {
            span
        } else {
            (current.min(total) * span) / total
        };
        let percent = (phase_start as usize + offset).min(100) as u8;

        self.high_water = self.high_water.max(percent);
        let _ = self.tx.send(Progress {
            current,
            total,
            percent: self.high_water,
            description: description.to_string(),
        });
    }

    /// Jump straight to 100%
    pub fn finish(&mut self, description: &str) {
        self.report(1, 1, 100, 100, description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_monotonic() {
        let (mut reporter, rx) = ProgressReporter::new();
        reporter.report(5, 10, 0, 50, "delete");
        assert_eq!(rx.borrow().percent, 25);

        // A phase restart cannot move the needle backwards
        reporter.report(0, 10, 0, 50, "delete");
        assert_eq!(rx.borrow().percent, 25);

        reporter.report(10, 10, 0, 50, "delete");
        assert_eq!(rx.borrow().percent, 50);

        reporter.report(10, 10, 50, 100, "create");
        assert_eq!(rx.borrow().percent, 100);
    }

    #[test]
    fn empty_phase_completes_its_range() {
        let (mut reporter, rx) = ProgressReporter::new();
        reporter.report(0, 0, 0, 50, "delete");
        assert_eq!(rx.borrow().percent, 50);
    }
}
