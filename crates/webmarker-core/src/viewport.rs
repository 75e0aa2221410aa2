//! Drawing surface sizing from page geometry.
//!
//! The surface grows in whole tiles as the user scrolls and refuses pages
//! taller than a fixed ceiling.

use kurbo::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height step for the surface.
pub const TILE_SIZE: f64 = 7500.0;

/// Tallest surface supported.
pub const HEIGHT_CEILING: f64 = 25000.0;

/// Shown to the user when the ceiling is exceeded.
pub const UNSUPPORTED_HEIGHT_MESSAGE: &str =
    "Web Marker does not support pages with this height. Please try again on a different website.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("surface height {height} exceeds the supported maximum of {ceiling}")]
    GeometryLimitExceeded { height: f64, ceiling: f64 },
}

/// Measurements of the host page, in CSS pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageGeometry {
    pub body_scroll_height: f64,
    pub body_offset_height: f64,
    pub doc_client_height: f64,
    pub doc_scroll_height: f64,
    pub doc_offset_height: f64,
    pub scroll_top: f64,
    pub viewport_height: f64,
    /// Natural page width.
    pub page_width: f64,
    /// Scroll width of the designated content container, when the page has one.
    pub container_scroll_width: Option<f64>,
}

impl PageGeometry {
    /// A plain page of the given size scrolled to the top.
    pub fn simple(width: f64, height: f64, viewport_height: f64) -> Self {
        Self {
            body_scroll_height: height,
            doc_scroll_height: height,
            viewport_height,
            page_width: width,
            ..Self::default()
        }
    }

    /// True maximum content height.
    pub fn content_height(&self) -> f64 {
        [
            self.body_scroll_height,
            self.body_offset_height,
            self.doc_client_height,
            self.doc_scroll_height,
            self.doc_offset_height,
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }

    /// Bottom edge of the visible viewport.
    pub fn visible_bottom(&self) -> f64 {
        self.scroll_top + self.viewport_height
    }

    /// Surface width: the container wins because some pages scroll an inner region.
    pub fn surface_width(&self) -> f64 {
        self.container_scroll_width.unwrap_or(self.page_width)
    }
}

/// Resize applied by a scroll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportChange {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl ViewportChange {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

/// Tracks the surface size for one overlay session.
#[derive(Debug, Clone)]
pub struct ViewportMonitor {
    tile: f64,
    ceiling: f64,
    size: Size,
}

impl ViewportMonitor {
    /// Initial sizing with the standard tile and ceiling.
    pub fn initial(geometry: &PageGeometry) -> Result<Self, ViewportError> {
        Self::with_limits(geometry, TILE_SIZE, HEIGHT_CEILING)
    }

    pub fn with_limits(
        geometry: &PageGeometry,
        tile: f64,
        ceiling: f64,
    ) -> Result<Self, ViewportError> {
        let wanted = geometry.content_height().max(geometry.visible_bottom());
        let height = ((wanted / tile).ceil() * tile).max(tile);
        let monitor = Self {
            tile,
            ceiling,
            size: Size::new(geometry.surface_width(), height),
        };
        monitor.check_ceiling()?;
        log::info!("Surface created with width: {} height: {}", monitor.size.width, height);
        Ok(monitor)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    fn check_ceiling(&self) -> Result<(), ViewportError> {
        if self.size.height > self.ceiling {
            return Err(ViewportError::GeometryLimitExceeded {
                height: self.size.height,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    /// React to a scroll tick.
    ///
    /// Re-syncs the width to the content container and grows the height by one
    /// tile (capped at the content height) when the viewport bottom passes the
    /// surface. Never shrinks.
    pub fn on_scroll(&mut self, geometry: &PageGeometry) -> Result<ViewportChange, ViewportError> {
        let mut change = ViewportChange::default();

        if let Some(width) = geometry.container_scroll_width {
            if width != self.size.width {
                log::debug!("Updating surface width from {} to {}", self.size.width, width);
                self.size.width = width;
                change.width = Some(width);
            }
        }

        if geometry.visible_bottom() > self.size.height {
            let grown = (self.size.height + self.tile).min(geometry.content_height());
            if grown > self.size.height {
                self.size.height = grown;
                change.height = Some(grown);
            }
        }

        self.check_ceiling()?;
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_page_gets_one_tile() {
        let monitor =
            ViewportMonitor::initial(&PageGeometry::simple(1280.0, 3000.0, 800.0)).unwrap();
        assert_eq!(monitor.height(), 7500.0);
        assert_eq!(monitor.width(), 1280.0);
    }

    #[test]
    fn test_initial_height_rounds_up_to_tile() {
        let monitor =
            ViewportMonitor::initial(&PageGeometry::simple(1280.0, 9000.0, 800.0)).unwrap();
        assert_eq!(monitor.height(), 15000.0);

        let exact =
            ViewportMonitor::initial(&PageGeometry::simple(1280.0, 15000.0, 800.0)).unwrap();
        assert_eq!(exact.height(), 15000.0);
    }

    #[test]
    fn test_scroll_position_counts() {
        let geometry = PageGeometry {
            scroll_top: 7000.0,
            ..PageGeometry::simple(1000.0, 2000.0, 900.0)
        };
        let monitor = ViewportMonitor::initial(&geometry).unwrap();
        assert_eq!(monitor.height(), 15000.0);
    }

    #[test]
    fn test_largest_measurement_wins() {
        let geometry = PageGeometry {
            body_offset_height: 100.0,
            doc_client_height: 8000.0,
            doc_offset_height: 50.0,
            ..PageGeometry::simple(1000.0, 200.0, 700.0)
        };
        assert_eq!(geometry.content_height(), 8000.0);
    }

    #[test]
    fn test_ceiling_rejects_tall_pages() {
        let result = ViewportMonitor::initial(&PageGeometry::simple(1000.0, 26000.0, 800.0));
        assert_eq!(
            result.unwrap_err(),
            ViewportError::GeometryLimitExceeded {
                height: 30000.0,
                ceiling: 25000.0
            }
        );
    }

    #[test]
    fn test_pages_past_the_last_full_tile_are_refused() {
        let fits = ViewportMonitor::initial(&PageGeometry::simple(1000.0, 22500.0, 800.0)).unwrap();
        assert_eq!(fits.height(), 22500.0);

        // Below the ceiling, but the next tile boundary is above it
        let result = ViewportMonitor::initial(&PageGeometry::simple(1000.0, 23000.0, 800.0));
        assert!(matches!(
            result,
            Err(ViewportError::GeometryLimitExceeded { height, .. }) if height == 30000.0
        ));
    }

    #[test]
    fn test_container_width_takes_precedence() {
        let geometry = PageGeometry {
            container_scroll_width: Some(4200.0),
            ..PageGeometry::simple(1000.0, 500.0, 700.0)
        };
        let monitor = ViewportMonitor::initial(&geometry).unwrap();
        assert_eq!(monitor.width(), 4200.0);
    }

    #[test]
    fn test_growth_is_one_tile() {
        let mut geometry = PageGeometry::simple(1000.0, 20000.0, 800.0);
        geometry.body_scroll_height = 100.0;
        geometry.doc_scroll_height = 100.0;
        let mut monitor = ViewportMonitor::initial(&geometry).unwrap();
        assert_eq!(monitor.height(), 7500.0);

        // Page grew after load
        geometry.doc_scroll_height = 20000.0;
        geometry.scroll_top = 7000.0;
        let change = monitor.on_scroll(&geometry).unwrap();
        assert_eq!(change.height, Some(15000.0));
        assert_eq!(monitor.height(), 15000.0);

        // Not past the bottom yet
        geometry.scroll_top = 10000.0;
        assert!(monitor.on_scroll(&geometry).unwrap().is_empty());
    }

    #[test]
    fn test_growth_capped_at_content_height() {
        let mut geometry = PageGeometry::simple(1000.0, 100.0, 800.0);
        let mut monitor = ViewportMonitor::initial(&geometry).unwrap();

        geometry.doc_scroll_height = 9000.0;
        geometry.scroll_top = 7000.0;
        let change = monitor.on_scroll(&geometry).unwrap();
        assert_eq!(change.height, Some(9000.0));

        // Already at the content height: no further growth
        geometry.scroll_top = 8500.0;
        assert_eq!(monitor.on_scroll(&geometry).unwrap().height, None);
        assert_eq!(monitor.height(), 9000.0);
    }

    #[test]
    fn test_growth_past_ceiling_fails() {
        let mut geometry = PageGeometry::simple(1000.0, 22000.0, 800.0);
        let mut monitor = ViewportMonitor::initial(&geometry).unwrap();
        assert_eq!(monitor.height(), 22500.0);

        geometry.doc_scroll_height = 40000.0;
        geometry.scroll_top = 22000.0;
        assert!(matches!(
            monitor.on_scroll(&geometry),
            Err(ViewportError::GeometryLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_width_resync_on_scroll() {
        let mut geometry = PageGeometry {
            container_scroll_width: Some(3000.0),
            ..PageGeometry::simple(1000.0, 500.0, 700.0)
        };
        let mut monitor = ViewportMonitor::initial(&geometry).unwrap();

        geometry.container_scroll_width = Some(3600.0);
        let change = monitor.on_scroll(&geometry).unwrap();
        assert_eq!(change.width, Some(3600.0));
        assert_eq!(monitor.width(), 3600.0);
        assert!(monitor.on_scroll(&geometry).unwrap().is_empty());
    }
}
