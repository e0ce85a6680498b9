//! Pixel timeline rebuilt from the activity log.
//!
//! The log stores segments as `(level, duration)` pairs. To draw them, the
//! history is walked newest-first and laid out right to left on a fixed-width
//! buffer of pixel slots, `pages * width` wide. One page covers
//! `duration_secs` seconds.

use serde::{Deserialize, Serialize};

use crate::data::log_store::ActivityRecord;

/// Dimensions of the history graph and the estimation knobs tied to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphGeometry {
    /// Pixels per page.
    pub width: usize,
    /// Vertical pixel range between 0% and 100%.
    pub height: i32,
    /// Y of the 100% line.
    pub top: i32,
    /// Seconds represented by one page.
    pub duration_secs: u64,
    pub pages: usize,
    pub min_session_for_estimation_secs: u64,
    pub max_plausible_estimation_secs: u64,
    /// Empty pixels between real data and the forecast line.
    pub estimated_line_gap: usize,
    /// Paging steps per page width.
    pub page_scroll_smoothness: usize,
}

impl Default for GraphGeometry {
    fn default() -> Self {
        Self {
            width: 583,
            height: 324,
            top: 79,
            duration_secs: 16_200,
            pages: 8,
            min_session_for_estimation_secs: 1_200,
            max_plausible_estimation_secs: 54_000,
            estimated_line_gap: 20,
            page_scroll_smoothness: 12,
        }
    }
}

impl GraphGeometry {
    pub fn capacity(&self) -> usize {
        self.width * self.pages
    }

    /// Seconds to pixels, floored.
    pub fn pixel_offset(&self, secs: u64) -> usize {
        let duration = self.duration_secs.max(1) as u128;
        (secs as u128 * self.width as u128 / duration) as usize
    }

    /// Pixels to seconds, floored.
    pub fn pixels_to_secs(&self, pixels: usize) -> u64 {
        let width = self.width.max(1) as u128;
        (pixels as u128 * self.duration_secs as u128 / width) as u64
    }

    /// Y coordinate of a charge level. Higher charge sits closer to `top`.
    ///
    /// Levels are clamped here rather than when logged, so gauges that drift
    /// past 100% keep their raw value in the store.
    pub fn level_to_height(&self, level: i32) -> i32 {
        let level = level.clamp(0, 100);
        self.top + (100 - level) * self.height / 100
    }
}

/// One drawn pixel column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub height: i32,
    pub charging: bool,
    pub estimated: bool,
}

/// The most recent run of records sharing one charging state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub start_index: usize,
    pub charging: bool,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    slots: Vec<Option<Slot>>,
    /// Level of the newest record, unclamped.
    pub newest_level: Option<i32>,
    pub leading_segment: Option<SegmentSpan>,
    /// Viewport anchor, set once a forecast has been spliced in.
    pub session_start: Option<usize>,
}

impl Timeline {
    pub fn empty(geometry: &GraphGeometry) -> Self {
        Self {
            slots: vec![None; geometry.capacity()],
            newest_level: None,
            leading_segment: None,
            session_start: None,
        }
    }

    pub fn slots(&self) -> &[Option<Slot>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.newest_level.is_none()
    }

    /// Copy of this timeline moved `shift` pixels toward the oldest edge.
    ///
    /// Slots pushed past index 0 are dropped and the newest `shift` slots
    /// come back empty.
    pub fn shifted_older(&self, shift: usize) -> Self {
        let capacity = self.slots.len();
        let mut slots = vec![None; capacity];
        if shift < capacity {
            slots[..capacity - shift].copy_from_slice(&self.slots[shift..]);
        }

        Self {
            slots,
            newest_level: self.newest_level,
            leading_segment: self.leading_segment.map(|span| SegmentSpan {
                start_index: span.start_index.saturating_sub(shift),
                ..span
            }),
            session_start: self.session_start.map(|i| i.saturating_sub(shift)),
        }
    }

    pub(crate) fn set(&mut self, index: usize, slot: Slot) {
        if let Some(cell) = self.slots.get_mut(index) {
            *cell = Some(slot);
        }
    }
}

/// Lay out records, newest first, onto a fresh timeline.
///
/// Each record owns the pixels from the start of its span up to the start of
/// the next newer record; the newest record runs to the last pixel. Pixels a
/// newer record already claimed are never overwritten. The walk stops at the
/// first record that reaches past the oldest pixel, which is clipped to index 0.
pub fn reconstruct<I>(records: I, geometry: &GraphGeometry) -> Timeline
where
    I: IntoIterator<Item = ActivityRecord>,
{
    let mut timeline = Timeline::empty(geometry);
    let capacity = timeline.capacity();
    if capacity == 0 {
        return timeline;
    }

    let last = capacity - 1;
    let mut total_secs: u64 = 0;
    let mut newer_edge = capacity;
    let mut leading_open = true;

    for record in records {
        total_secs = total_secs.saturating_add(record.duration);
        let offset = geometry.pixel_offset(total_secs);
        let clipped = offset > last;
        let index = if clipped { 0 } else { last - offset };

        let slot = Slot {
            height: geometry.level_to_height(record.level),
            charging: record.charging,
            estimated: false,
        };
        for cell in &mut timeline.slots[index..newer_edge] {
            if cell.is_none() {
                *cell = Some(slot);
            }
        }

        if timeline.newest_level.is_none() {
            timeline.newest_level = Some(record.level);
        }

        if leading_open {
            match timeline.leading_segment.as_mut() {
                None => {
                    timeline.leading_segment = Some(SegmentSpan {
                        start_index: index,
                        charging: record.charging,
                        elapsed_secs: record.duration,
                    });
                }
                Some(span) if span.charging == record.charging => {
                    span.start_index = index;
                    span.elapsed_secs += record.duration;
                }
                Some(_) => leading_open = false,
            }
        }

        newer_edge = index;
        if clipped {
            break;
        }
    }

    timeline
}
