//! Pacing loop

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::media::RasterFrame;
use crate::stats::RateWindow;

use super::pacing::{PaceOutcome, Pacer};
use super::segment::Segment;
use super::state::Shared;

/// Body of the recorder thread. Returns once `Shared::is_recording` is false,
/// with any open segment finalized.
pub(crate) fn run(shared: Arc<Shared>) {
    let config = &shared.config;
    let period = config.frame_period();
    let dir = shared.segment_dir();

    let mut segment: Option<Segment> = None;
    let mut pacer = Pacer::new(period, Instant::now());
    let mut window = RateWindow::new(config.target_fps, Instant::now());
    let mut last_written: Option<Arc<RasterFrame>> = None;
    let mut failures = 0u32;

    // The first pass always runs so a session stopped right away still
    // leaves a segment
    let mut first_pass = true;
    while first_pass || shared.is_recording() {
        first_pass = false;
        if segment.is_none() {
            let Some(frame) = shared.latest_frame() else {
                sleep_while_recording(&shared, config.error_backoff, period);
                continue;
            };

            match Segment::open(&dir, shared.factory.as_ref(), frame.dimensions(), config.target_fps) {
                Ok(opened) => {
                    tracing::info!(
                        source = %shared.source,
                        path = %opened.provisional_path().display(),
                        "Segment opened"
                    );
                    segment = Some(opened);
                    let now = Instant::now();
                    pacer = Pacer::new(period, now);
                    window.reset(now);
                    last_written = None;
                }
                Err(e) => {
                    tracing::error!(source = %shared.source, error = %e, "Failed to open segment");
                    if !note_failure(&shared, &mut failures) {
                        break;
                    }
                    sleep_while_recording(&shared, config.error_backoff, period);
                    continue;
                }
            }
        }

        let wait = pacer.time_until_deadline(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        if !shared.is_recording() {
            break;
        }

        let (Some(active), Some(frame)) = (segment.as_mut(), shared.latest_frame()) else {
            continue;
        };

        let repeated = last_written
            .as_ref()
            .is_some_and(|previous| Arc::ptr_eq(previous, &frame));

        if let Err(e) = active.write(&frame, repeated) {
            tracing::error!(source = %shared.source, error = %e, "Segment write failed");
            if let Some(failed) = segment.take() {
                finalize(&shared, failed);
            }
            if !note_failure(&shared, &mut failures) {
                break;
            }
            sleep_while_recording(&shared, config.error_backoff, period);
            continue;
        }

        failures = 0;
        last_written = Some(frame);
        window.record();

        let now = Instant::now();
        if let PaceOutcome::Reset { behind } = pacer.advance(now) {
            shared.schedule_reset();
            tracing::warn!(
                source = %shared.source,
                behind_ms = behind.as_millis() as u64,
                "Recorder fell behind, restarting frame schedule"
            );
        }

        if let Some(report) = window.maybe_report(now, config.stats_interval) {
            tracing::info!(
                source = %shared.source,
                expected = report.expected,
                actual = report.actual,
                dropped = report.dropped(),
                fps = report.fps(),
                "Recording rate"
            );
        }
    }

    if let Some(open) = segment.take() {
        finalize(&shared, open);
    }
}

fn finalize(shared: &Shared, segment: Segment) {
    match segment.finalize() {
        Ok(done) => {
            tracing::info!(
                source = %shared.source,
                path = %done.path.display(),
                frames = done.stats.frames_written,
                repeated = done.stats.repeated_frames,
                fps = done.stats.fps(),
                "Segment finalized"
            );
            shared.segment_finalized(done);
        }
        Err(e) => {
            tracing::error!(source = %shared.source, error = %e, "Failed to finalize segment");
        }
    }
}

/// Count a failure; returns `false` once the ceiling is reached and the
/// recorder has been moved back to idle
fn note_failure(shared: &Shared, failures: &mut u32) -> bool {
    *failures += 1;
    let max = shared.config.max_consecutive_failures;
    if max > 0 && *failures >= max {
        tracing::error!(
            source = %shared.source,
            failures = *failures,
            "Giving up on recording after repeated failures"
        );
        shared.abandon();
        return false;
    }
    true
}

/// Sleep for `total`, waking at least every `slice` to observe a stop
fn sleep_while_recording(shared: &Shared, total: Duration, slice: Duration) {
    let deadline = Instant::now() + total;
    while shared.is_recording() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(slice));
    }
}
