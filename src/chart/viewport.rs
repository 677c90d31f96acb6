//! Mapping between data space (hours, ppm) and pixel space.

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// Smallest span allowed on either axis, prevents division by zero.
const MIN_DATA_RANGE: f64 = 0.001;

/// A point in data space: x is hours relative to now, y is the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

impl DataPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Data space bounds (min/max x and y values)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl DataBounds {
    pub const fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Bounds for a trailing window: x spans `[-hours, 0]`, y spans
    /// `[0, nice_ceiling(max * 1.1)]` and is never negative.
    pub fn trailing(hours: f64, points: &[DataPoint]) -> Self {
        let y_peak = points.iter().map(|p| p.y).fold(0.0_f64, f64::max);
        let y_max = nice_ceiling((y_peak * 1.1).max(1.0));
        Self::new(-hours.max(MIN_DATA_RANGE), 0.0, 0.0, y_max)
    }

    pub fn x_range(&self) -> f64 {
        (self.x_max - self.x_min).max(MIN_DATA_RANGE)
    }

    pub fn y_range(&self) -> f64 {
        (self.y_max - self.y_min).max(MIN_DATA_RANGE)
    }

    pub fn contains(&self, point: DataPoint) -> bool {
        point.x >= self.x_min && point.x <= self.x_max && point.y >= self.y_min && point.y <= self.y_max
    }
}

/// Smallest of 1, 2, 2.5, 5 or 10 times a power of ten that is `>= value`.
pub fn nice_ceiling(value: f64) -> f64 {
    if value <= 0.0 || !value.is_finite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(value.log10().floor());
    [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|step| step * magnitude)
        .find(|candidate| *candidate >= value)
        .unwrap_or(10.0 * magnitude)
}

/// Padding around the plot area for labels and margins
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportPadding {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl ViewportPadding {
    pub const fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

/// Viewport for transforming data coordinates to screen coordinates
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    data_bounds: DataBounds,
    screen_bounds: Rectangle,
    padding: ViewportPadding,
}

impl Viewport {
    pub fn new(data_bounds: DataBounds, screen_bounds: Rectangle, padding: ViewportPadding) -> Self {
        Self {
            data_bounds,
            screen_bounds,
            padding,
        }
    }

    /// Get the plot area (screen bounds minus padding)
    pub fn plot_area(&self) -> Rectangle {
        let top_left = Point::new(
            self.screen_bounds.top_left.x + self.padding.left as i32,
            self.screen_bounds.top_left.y + self.padding.top as i32,
        );

        let width = self
            .screen_bounds
            .size
            .width
            .saturating_sub(self.padding.left + self.padding.right);
        let height = self
            .screen_bounds
            .size
            .height
            .saturating_sub(self.padding.top + self.padding.bottom);

        Rectangle::new(top_left, Size::new(width, height))
    }

    /// Transform a data point to screen coordinates
    ///
    /// Returns None if the point is outside the data bounds.
    pub fn data_to_screen(&self, point: DataPoint) -> Option<Point> {
        if !self.data_bounds.contains(point) {
            return None;
        }
        let plot_area = self.plot_area();

        let x_norm = (point.x - self.data_bounds.x_min) / self.data_bounds.x_range();
        let y_norm = (point.y - self.data_bounds.y_min) / self.data_bounds.y_range();

        // Screen y grows downward
        let screen_x = plot_area.top_left.x + (x_norm * plot_area.size.width as f64).round() as i32;
        let screen_y =
            plot_area.top_left.y + ((1.0 - y_norm) * plot_area.size.height as f64).round() as i32;

        Some(Point::new(screen_x, screen_y))
    }

    pub fn data_bounds(&self) -> &DataBounds {
        &self.data_bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(
            DataBounds::new(-48.0, 0.0, 0.0, 100.0),
            Rectangle::new(Point::zero(), Size::new(140, 120)),
            ViewportPadding::new(10, 10, 10, 30),
        )
    }

    #[test]
    fn test_plot_area() {
        let area = viewport().plot_area();
        assert_eq!(area.top_left, Point::new(30, 10));
        assert_eq!(area.size, Size::new(100, 100));
    }

    #[test]
    fn test_corners_map_to_plot_edges() {
        let vp = viewport();
        assert_eq!(vp.data_to_screen(DataPoint::new(-48.0, 0.0)), Some(Point::new(30, 110)));
        assert_eq!(vp.data_to_screen(DataPoint::new(0.0, 100.0)), Some(Point::new(130, 10)));
        assert_eq!(vp.data_to_screen(DataPoint::new(-24.0, 50.0)), Some(Point::new(80, 60)));
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let vp = viewport();
        assert_eq!(vp.data_to_screen(DataPoint::new(1.0, 10.0)), None);
        assert_eq!(vp.data_to_screen(DataPoint::new(-49.0, 10.0)), None);
    }

    #[test]
    fn test_trailing_bounds_are_non_negative() {
        let bounds = DataBounds::trailing(48.0, &[DataPoint::new(-1.0, 420.0)]);
        assert_eq!(bounds.x_min, -48.0);
        assert_eq!(bounds.x_max, 0.0);
        assert_eq!(bounds.y_min, 0.0);
        assert_eq!(bounds.y_max, 500.0);

        let empty = DataBounds::trailing(48.0, &[]);
        assert_eq!(empty.y_max, 1.0);
    }

    #[test]
    fn test_nice_ceiling() {
        assert_eq!(nice_ceiling(0.0), 1.0);
        assert_eq!(nice_ceiling(1.0), 1.0);
        assert_eq!(nice_ceiling(1.1), 2.0);
        assert_eq!(nice_ceiling(2.2), 2.5);
        assert_eq!(nice_ceiling(462.0), 500.0);
        assert_eq!(nice_ceiling(7.0), 10.0);
    }
}
