use std::fmt;
use std::time::{Duration, Instant};

/// Frame reports are opt-in, so they log at a level the default filter shows.
pub const REPORT_LEVEL: log::Level = log::Level::Info;

/// Counts frames and reports the average frame rate once per `interval`.
pub struct FrameStats {
    interval: Duration,
    window_start: Instant,
    last_frame: Instant,
    frames: u32,
    slowest: Duration,
}

/// Frame timing over one reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frames_per_second: f32,
    pub slowest_frame: Duration,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} fps, slowest frame {:.1} ms",
            self.frames_per_second,
            self.slowest_frame.as_secs_f32() * 1000.0,
        )
    }
}

impl FrameStats {
    pub fn new(now: Instant, interval: Duration) -> FrameStats {
        FrameStats {
            interval,
            window_start: now,
            last_frame: now,
            frames: 0,
            slowest: Duration::ZERO,
        }
    }

    /// Records a finished frame. Returns a report when the interval is over,
    /// and starts the next one.
    pub fn frame_finished(&mut self, now: Instant) -> Option<FrameReport> {
        let frame_time = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.frames += 1;
        self.slowest = self.slowest.max(frame_time);

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        let report = FrameReport {
            frames_per_second: self.frames as f32 / elapsed.as_secs_f32(),
            slowest_frame: self.slowest,
        };
        self.window_start = now;
        self.frames = 0;
        self.slowest = Duration::ZERO;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start, Duration::from_secs(1));
        let ms = |n| start + Duration::from_millis(n);
        assert_eq!(stats.frame_finished(ms(100)), None);
        assert_eq!(stats.frame_finished(ms(600)), None);
        let report = stats.frame_finished(ms(1000)).unwrap();
        assert_eq!(report.frames_per_second, 3.0);
        assert_eq!(report.slowest_frame, Duration::from_millis(500));

        assert_eq!(stats.frame_finished(ms(1500)), None);
        let report = stats.frame_finished(ms(2000)).unwrap();
        assert_eq!(report.frames_per_second, 2.0);
        assert_eq!(report.slowest_frame, Duration::from_millis(500));
    }

    #[test]
    fn reports_show_with_the_default_filter() {
        assert!(REPORT_LEVEL <= crate::logging::DEFAULT_LEVEL);
        let report = FrameReport {
            frames_per_second: 59.94,
            slowest_frame: Duration::from_micros(16_700),
        };
        assert_eq!(report.to_string(), "59.9 fps, slowest frame 16.7 ms");
    }
}
