use std::time::Instant;

use super::constants::PROGRESS_INTERVAL;
use crate::{AppEvent, EventSink};

/// Format transfer speed from bytes and elapsed time
pub fn format_transfer_speed(bytes_transferred: u64, elapsed_secs: f64) -> String {
    if elapsed_secs <= 0.0 {
        return "Starting...".to_string();
    }

    let speed_bps = bytes_transferred as f64 / elapsed_secs;
    if speed_bps > 1_000_000.0 {
        format!("{:.2} MB/s", speed_bps / 1_000_000.0)
    } else if speed_bps > 1_000.0 {
        format!("{:.1} KB/s", speed_bps / 1_000.0)
    } else {
        format!("{:.0} B/s", speed_bps)
    }
}

/// Throttled `TransferProgress` emitter for one file.
pub struct ProgressReporter<'a> {
    events: Option<&'a EventSink>,
    file_name: String,
    total_bytes: u64,
    is_sending: bool,
    start_time: Instant,
    last_reported: u64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        events: Option<&'a EventSink>,
        file_name: &str,
        total_bytes: u64,
        is_sending: bool,
    ) -> Self {
        Self {
            events,
            file_name: file_name.to_string(),
            total_bytes,
            is_sending,
            start_time: Instant::now(),
            last_reported: 0,
        }
    }

    pub fn update(&mut self, bytes_done: u64) {
        let Some(events) = self.events else {
            return;
        };
        if bytes_done != self.total_bytes
            && bytes_done - self.last_reported < PROGRESS_INTERVAL
        {
            return;
        }
        self.last_reported = bytes_done;

        let elapsed = self.start_time.elapsed().as_secs_f64();
        events.emit(AppEvent::TransferProgress {
            file_name: self.file_name.clone(),
            bytes_done,
            total_bytes: self.total_bytes,
            speed: format_transfer_speed(bytes_done, elapsed),
            is_sending: self.is_sending,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_transfer_speed() {
        assert_eq!(format_transfer_speed(100, 0.0), "Starting...");
        assert_eq!(format_transfer_speed(500, 1.0), "500 B/s");
        assert_eq!(format_transfer_speed(2_500, 1.0), "2.5 KB/s");
        assert_eq!(format_transfer_speed(3_000_000, 1.0), "3.00 MB/s");
    }

    #[test]
    fn test_progress_is_throttled() {
        let (sink, mut rx) = EventSink::channel();
        let total = PROGRESS_INTERVAL * 3;
        let mut reporter = ProgressReporter::new(Some(&sink), "big.bin", total, true);

        reporter.update(1024);
        reporter.update(PROGRESS_INTERVAL);
        reporter.update(PROGRESS_INTERVAL + 1024);
        reporter.update(total);

        let mut reported = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::TransferProgress { bytes_done, .. } = event {
                reported.push(bytes_done);
            }
        }
        assert_eq!(reported, vec![PROGRESS_INTERVAL, total]);
    }
}
