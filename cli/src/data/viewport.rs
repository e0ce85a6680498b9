use std::fmt;
use std::str::FromStr;

use crate::data::timeline::{GraphGeometry, Slot, Timeline};

/// Horizontal zoom of the history graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zoom {
    Hours16,
    #[default]
    Hours8,
    Hours4,
}

impl Zoom {
    /// Seconds covered by one axis segment.
    pub fn segment_secs(self) -> u64 {
        match self {
            Zoom::Hours16 => 7200,
            Zoom::Hours8 => 3600,
            Zoom::Hours4 => 1800,
        }
    }

    /// Timeline slots per drawn column.
    pub fn step(self) -> usize {
        match self {
            Zoom::Hours16 => 4,
            Zoom::Hours8 => 2,
            Zoom::Hours4 => 1,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Zoom::Hours16 => "Last 16 hours",
            Zoom::Hours8 => "Last 8 hours",
            Zoom::Hours4 => "Last 4 hours",
        }
    }

    pub fn axis_labels(self) -> [&'static str; 4] {
        match self {
            Zoom::Hours16 => ["4h", "8h", "12h", "16h"],
            Zoom::Hours8 => ["2h", "4h", "6h", "8h"],
            Zoom::Hours4 => ["1h", "2h", "3h", "4h"],
        }
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Zoom::Hours16 => "16h",
            Zoom::Hours8 => "8h",
            Zoom::Hours4 => "4h",
        };
        f.write_str(label)
    }
}

impl FromStr for Zoom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "16h" | "16" => Ok(Zoom::Hours16),
            "8h" | "8" => Ok(Zoom::Hours8),
            "4h" | "4" => Ok(Zoom::Hours4),
            other => Err(format!("unknown zoom '{other}', expected 16h, 8h or 4h")),
        }
    }
}

/// Which part of the timeline is on screen.
///
/// Page 0 shows the newest data. Each page step moves the window
/// `1 / page_scroll_smoothness` of a screen further into the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    zoom: Zoom,
    page: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Zoom::default())
    }
}

impl Viewport {
    pub fn new(zoom: Zoom) -> Self {
        Self { zoom, page: 0 }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_zoom(&mut self, zoom: Zoom) {
        if zoom != self.zoom {
            self.zoom = zoom;
            self.page = 0;
        }
    }

    pub fn set_page(&mut self, page: usize, geometry: &GraphGeometry) {
        self.page = page.min(self.max_page(geometry));
    }

    pub fn max_page(&self, geometry: &GraphGeometry) -> usize {
        let smoothness = geometry.page_scroll_smoothness;
        (geometry.pages * smoothness / self.zoom.step()).saturating_sub(smoothness)
    }

    /// Slots covered by one screen at this zoom.
    fn span(&self, geometry: &GraphGeometry) -> usize {
        geometry.width * self.zoom.step()
    }

    /// First timeline index on screen.
    ///
    /// Anchored on the charging session start when a forecast was spliced in,
    /// otherwise on one screen before the newest slot.
    pub fn window_start(&self, timeline: &Timeline, geometry: &GraphGeometry) -> usize {
        let span = self.span(geometry);
        let anchor = timeline
            .session_start
            .unwrap_or_else(|| timeline.capacity().saturating_sub(span));
        let scroll = self.page * span / geometry.page_scroll_smoothness.max(1);
        anchor.saturating_sub(scroll)
    }

    /// Every `step`-th slot from the window start, at most one screen wide.
    pub fn visible<'a>(
        &self,
        timeline: &'a Timeline,
        geometry: &GraphGeometry,
    ) -> impl Iterator<Item = Option<&'a Slot>> + 'a {
        let start = self.window_start(timeline, geometry);
        timeline
            .slots()
            .iter()
            .skip(start)
            .step_by(self.zoom.step())
            .take(geometry.width)
            .map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::forecast::estimate;
    use crate::data::log_store::ActivityRecord;
    use crate::data::timeline::reconstruct;

    #[test]
    fn test_zoom_parsing_and_labels() {
        assert_eq!("16h".parse::<Zoom>().unwrap(), Zoom::Hours16);
        assert_eq!("4".parse::<Zoom>().unwrap(), Zoom::Hours4);
        assert!("2h".parse::<Zoom>().is_err());
        assert_eq!(Zoom::default().to_string(), "8h");
        assert_eq!(Zoom::Hours8.axis_labels(), ["2h", "4h", "6h", "8h"]);
    }

    #[test]
    fn test_max_page() {
        let g = GraphGeometry::default();
        assert_eq!(Viewport::new(Zoom::Hours16).max_page(&g), 12);
        assert_eq!(Viewport::new(Zoom::Hours8).max_page(&g), 36);
        assert_eq!(Viewport::new(Zoom::Hours4).max_page(&g), 84);
    }

    #[test]
    fn test_window_without_forecast() {
        let g = GraphGeometry::default();
        let timeline = Timeline::empty(&g);

        assert_eq!(Viewport::new(Zoom::Hours16).window_start(&timeline, &g), 2332);
        assert_eq!(Viewport::new(Zoom::Hours8).window_start(&timeline, &g), 3498);
        assert_eq!(Viewport::new(Zoom::Hours4).window_start(&timeline, &g), 4081);

        let mut viewport = Viewport::new(Zoom::Hours8);
        viewport.set_page(1, &g);
        assert_eq!(viewport.window_start(&timeline, &g), 3401);

        viewport.set_page(1000, &g);
        assert_eq!(viewport.page(), 36);
        assert_eq!(viewport.window_start(&timeline, &g), 0);
    }

    #[test]
    fn test_zoom_resets_page() {
        let g = GraphGeometry::default();
        let mut viewport = Viewport::new(Zoom::Hours8);
        viewport.set_page(5, &g);
        viewport.set_zoom(Zoom::Hours8);
        assert_eq!(viewport.page(), 5);
        viewport.set_zoom(Zoom::Hours4);
        assert_eq!(viewport.page(), 0);
    }

    #[test]
    fn test_window_anchored_on_forecast_session() {
        let g = GraphGeometry::default();
        let records = vec![
            ActivityRecord::new("dev", 60, 600, true),
            ActivityRecord::new("dev", 50, 600, true),
            ActivityRecord::new("dev", 40, 600, true),
        ];
        let (timeline, estimate) = estimate(reconstruct(records, &g), &g);
        let anchor = estimate.unwrap().session_start_index;

        let viewport = Viewport::new(Zoom::Hours4);
        assert_eq!(viewport.window_start(&timeline, &g), anchor);

        let visible: Vec<_> = viewport.visible(&timeline, &g).collect();
        assert_eq!(visible.len(), g.capacity() - anchor);
        assert_eq!(visible[0], timeline.slot(anchor));
        assert!(visible.last().unwrap().unwrap().estimated);
    }

    #[test]
    fn test_visible_stops_at_newest_slot() {
        let g = GraphGeometry::default();
        let timeline = Timeline::empty(&g);
        let mut viewport = Viewport::new(Zoom::Hours16);
        assert_eq!(viewport.visible(&timeline, &g).count(), 583);

        viewport.set_zoom(Zoom::Hours8);
        assert_eq!(viewport.visible(&timeline, &g).count(), 583);
    }
}
