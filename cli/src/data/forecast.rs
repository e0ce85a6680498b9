//! Time-to-full forecast spliced onto a reconstructed timeline.
//!
//! The most recent charging segment is extended along its average slope
//! until it meets the 100% line. The forecast is only drawn when the segment
//! is long enough to trust and the result is plausible.

use tracing::debug;

use crate::data::timeline::{GraphGeometry, Slot, Timeline};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub seconds: u64,
    /// Pixels of synthetic line drawn after the gap.
    pub line_length: usize,
    /// Height change per pixel. Negative while charging.
    pub slope: f64,
    /// Start of the charging segment after the splice.
    pub session_start_index: usize,
}

impl Estimate {
    pub fn label(&self) -> String {
        format_hours_minutes(self.seconds)
    }
}

/// `"{h}h{mm}"`, e.g. `3h07`.
pub fn format_hours_minutes(secs: u64) -> String {
    let total_mins = secs / 60;
    format!("{}h{:02}", total_mins / 60, total_mins % 60)
}

/// Try to extend the leading charging segment up to the full line.
///
/// Returns the timeline unchanged with `None` when the segment is not charging,
/// shorter than the minimum session, not rising, already full, or when the
/// projection exceeds the plausibility limit. Otherwise returns a shifted copy
/// with the forecast drawn at the newest edge.
pub fn estimate(timeline: Timeline, geometry: &GraphGeometry) -> (Timeline, Option<Estimate>) {
    let Some(projection) = project(&timeline, geometry) else {
        return (timeline, None);
    };

    let room = projection.line_length + geometry.estimated_line_gap;
    let mut spliced = timeline.shifted_older(room);

    let last = spliced.capacity().saturating_sub(1);
    let origin = last.saturating_sub(projection.line_length);
    for k in 1..=projection.line_length {
        let y = (projection.start_height as f64 + projection.slope * k as f64).round() as i32;
        if y < geometry.top {
            break;
        }
        spliced.set(
            origin + k,
            Slot {
                height: y,
                charging: true,
                estimated: true,
            },
        );
    }

    let session_start_index = projection.segment_start.saturating_sub(room);
    spliced.session_start = Some(session_start_index);

    let estimate = Estimate {
        seconds: projection.seconds,
        line_length: projection.line_length,
        slope: projection.slope,
        session_start_index,
    };
    debug!(
        seconds = estimate.seconds,
        line_length = estimate.line_length,
        slope = estimate.slope,
        "Charge forecast spliced"
    );

    (spliced, Some(estimate))
}

struct Projection {
    segment_start: usize,
    start_height: i32,
    slope: f64,
    line_length: usize,
    seconds: u64,
}

fn project(timeline: &Timeline, geometry: &GraphGeometry) -> Option<Projection> {
    let segment = timeline.leading_segment?;
    if !segment.charging || segment.elapsed_secs < geometry.min_session_for_estimation_secs {
        return None;
    }

    let last = timeline.capacity().checked_sub(1)?;
    let distance = last.checked_sub(segment.start_index).filter(|d| *d > 0)?;
    let newest = timeline.slot(last)?.height;
    let oldest = timeline.slot(segment.start_index)?.height;

    let slope = (newest - oldest) as f64 / distance as f64;
    if slope >= 0.0 {
        return None;
    }

    let line_length = (-((newest - geometry.top) as f64) / slope).floor();
    if line_length < 1.0 {
        return None;
    }
    let line_length = line_length as usize;

    let seconds = geometry.pixels_to_secs(line_length);
    if seconds > geometry.max_plausible_estimation_secs {
        debug!(seconds, "Discarding implausible charge forecast");
        return None;
    }

    Some(Projection {
        segment_start: segment.start_index,
        start_height: newest,
        slope,
        line_length,
        seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::log_store::ActivityRecord;
    use crate::data::timeline::reconstruct;
    use pretty_assertions::assert_eq;

    fn record(level: i32, charging: bool, duration: u64) -> ActivityRecord {
        ActivityRecord::new("dev", level, duration, charging)
    }

    fn charging_from_40_to_60() -> Vec<ActivityRecord> {
        vec![
            record(60, true, 600),
            record(50, true, 600),
            record(40, true, 600),
            record(70, false, 3600),
        ]
    }

    #[test]
    fn test_charging_segment_estimate() {
        let g = GraphGeometry::default();
        let timeline = reconstruct(charging_from_40_to_60(), &g);
        let (spliced, estimate) = estimate(timeline, &g);
        let estimate = estimate.unwrap();

        assert_eq!(estimate.line_length, 127);
        assert_eq!(estimate.seconds, 3528);
        assert!((estimate.slope - (-65.0 / 64.0)).abs() < 1e-9);
        assert_eq!(estimate.session_start_index, 4452);
        assert_eq!(spliced.session_start, Some(4452));
        assert_eq!(estimate.label(), "0h58");

        let expected =
            -((g.level_to_height(60) - g.top) as f64) / estimate.slope * 16_200.0 / 583.0;
        assert!((estimate.seconds as f64 - expected).abs() < 30.0);
    }

    #[test]
    fn test_splice_layout() {
        let g = GraphGeometry::default();
        let timeline = reconstruct(charging_from_40_to_60(), &g);
        let (spliced, _) = estimate(timeline, &g);

        let newest_real = spliced.slot(4516).unwrap();
        assert_eq!(newest_real.height, 208);
        assert!(newest_real.charging);
        assert!(!newest_real.estimated);

        assert!(spliced.slots()[4517..4537].iter().all(Option::is_none));

        let forecast: Vec<_> = spliced.slots()[4537..].iter().flatten().collect();
        assert_eq!(forecast.len(), 127);
        assert!(forecast.iter().all(|s| s.estimated && s.charging));
        assert!(forecast.windows(2).all(|w| w[1].height <= w[0].height));
        assert!(forecast.iter().all(|s| s.height >= g.top));
        assert_eq!(forecast[126].height, g.top);
    }

    #[test]
    fn test_implausible_estimate_leaves_timeline_unchanged() {
        let g = GraphGeometry::default();
        let timeline = reconstruct(vec![record(51, true, 600), record(50, true, 1200)], &g);
        let (after, estimate) = estimate(timeline.clone(), &g);
        assert_eq!(estimate, None);
        assert_eq!(after, timeline);
    }

    #[test]
    fn test_short_segment_not_estimated() {
        let g = GraphGeometry::default();
        let timeline = reconstruct(vec![record(60, true, 600), record(40, true, 599)], &g);
        let (_, estimate) = estimate(timeline, &g);
        assert_eq!(estimate, None);
    }

    #[test]
    fn test_flat_or_discharging_not_estimated() {
        let g = GraphGeometry::default();

        let flat = reconstruct(vec![record(50, true, 1200), record(50, true, 1200)], &g);
        assert_eq!(estimate(flat, &g).1, None);

        let draining = reconstruct(vec![record(40, false, 1200), record(60, false, 1200)], &g);
        assert_eq!(estimate(draining, &g).1, None);
    }

    #[test]
    fn test_already_full_not_estimated() {
        let g = GraphGeometry::default();
        let timeline = reconstruct(vec![record(100, true, 1200), record(80, true, 1200)], &g);
        assert_eq!(estimate(timeline, &g).1, None);
    }

    #[test]
    fn test_estimation_is_deterministic() {
        let g = GraphGeometry::default();
        let a = estimate(reconstruct(charging_from_40_to_60(), &g), &g);
        let b = estimate(reconstruct(charging_from_40_to_60(), &g), &g);
        assert_eq!(a, b);
    }

    #[test]
    fn test_format_hours_minutes() {
        assert_eq!(format_hours_minutes(0), "0h00");
        assert_eq!(format_hours_minutes(3528), "0h58");
        assert_eq!(format_hours_minutes(11_220), "3h07");
    }
}
