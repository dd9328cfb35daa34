use crate::core::geo::{LatLng, LatLngBounds, Point};
use serde::{Deserialize, Serialize};

/// Manages the current view of the map: center, zoom, and screen dimensions.
///
/// Components never store a viewport; they read it from the map on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 18.0),
            size,
            min_zoom: 0.0,
            max_zoom: 18.0,
        }
    }

    /// Sets the center of the viewport, clamped to world bounds
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(
            LatLng::clamp_lat(center.lat),
            center.lng.clamp(-180.0, 180.0),
        );
    }

    /// Sets the zoom level, clamping to valid range
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets the zoom limits
    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
    }

    /// Projects a LatLng to world pixel coordinates at the given zoom level
    /// (Web Mercator, EPSG:3857)
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let z = zoom.unwrap_or(self.zoom);
        let scale = 256.0 * 2_f64.powf(z);

        let mercator = LatLng::new(LatLng::clamp_lat(lat_lng.lat), lat_lng.lng).to_mercator();
        let world = 2.0 * std::f64::consts::PI * 6378137.0;

        let pixel_x = (mercator.x + world / 2.0) / world * scale;
        let pixel_y = (-mercator.y + world / 2.0) / world * scale;

        Point::new(pixel_x, pixel_y)
    }

    /// Unprojects world pixel coordinates back to LatLng at the given zoom
    /// level
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let z = zoom.unwrap_or(self.zoom);
        let scale = 256.0 * 2_f64.powf(z);
        let world = 2.0 * std::f64::consts::PI * 6378137.0;

        let x = pixel.x / scale * world - world / 2.0;
        let y = world / 2.0 - pixel.y / scale * world;

        LatLng::from_mercator(Point::new(x, y))
    }

    /// Converts screen pixel coordinates back to geographical coordinates
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        let origin = self.project(&self.center, None);
        let projected = Point::new(
            pixel.x - self.size.x / 2.0 + origin.x,
            pixel.y - self.size.y / 2.0 + origin.y,
        );
        self.unproject(&projected, None)
    }

    /// Gets the current viewport bounds in geographical coordinates.
    /// This is the envelope used as the spatial filter for viewport queries.
    pub fn bounds(&self) -> LatLngBounds {
        let nw = self.pixel_to_lat_lng(&Point::new(0.0, 0.0));
        let se = self.pixel_to_lat_lng(&Point::new(self.size.x, self.size.y));

        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }

    /// Fits the viewport to contain the given bounds
    pub fn fit_bounds(&mut self, bounds: &LatLngBounds, padding: Option<f64>) {
        let padding = padding.unwrap_or(20.0);

        self.set_center(bounds.center());

        let usable = Point::new(self.size.x - 2.0 * padding, self.size.y - 2.0 * padding);

        // Walk the integer zoom levels and keep the deepest one where the
        // bounds still fit inside the padded viewport.
        let mut best_zoom = self.min_zoom;
        for test_zoom in (self.min_zoom as i32)..=(self.max_zoom as i32) {
            let zoom = test_zoom as f64;

            let nw = self.project(
                &LatLng::new(bounds.north_east.lat, bounds.south_west.lng),
                Some(zoom),
            );
            let se = self.project(
                &LatLng::new(bounds.south_west.lat, bounds.north_east.lng),
                Some(zoom),
            );

            let width = (se.x - nw.x).abs();
            let height = (se.y - nw.y).abs();

            if width <= usable.x && height <= usable.y {
                best_zoom = zoom;
            } else {
                break;
            }
        }

        self.set_zoom(best_zoom);
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0.0, Point::new(800.0, 600.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_creation() {
        let viewport = Viewport::new(
            LatLng::new(-34.9011, -56.1645),
            10.0,
            Point::new(800.0, 600.0),
        );

        assert_eq!(viewport.zoom, 10.0);
        assert_eq!(viewport.center.lat, -34.9011);
        assert_eq!(viewport.size.x, 800.0);
    }

    #[test]
    fn test_coordinate_conversion() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1.0, Point::new(512.0, 512.0));

        let center_pixel = Point::new(256.0, 256.0);
        let center_lat_lng = viewport.pixel_to_lat_lng(&center_pixel);

        assert!((center_lat_lng.lat - 0.0).abs() < 0.01);
        assert!((center_lat_lng.lng - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_bounds_contain_center() {
        let viewport = Viewport::new(
            LatLng::new(-34.9011, -56.1645),
            13.0,
            Point::new(800.0, 600.0),
        );
        let bounds = viewport.bounds();
        assert!(bounds.contains(&viewport.center));
        assert!(bounds.south_west.lat < bounds.north_east.lat);
        assert!(bounds.south_west.lng < bounds.north_east.lng);
    }

    #[test]
    fn test_zoom_limits() {
        let mut viewport = Viewport::default();
        viewport.set_zoom_limits(2.0, 15.0);

        viewport.set_zoom(1.0); // Below minimum
        assert_eq!(viewport.zoom, 2.0);

        viewport.set_zoom(20.0); // Above maximum
        assert_eq!(viewport.zoom, 15.0);
    }

    #[test]
    fn test_fit_bounds_recenters() {
        let mut viewport = Viewport::new(LatLng::new(0.0, 0.0), 3.0, Point::new(800.0, 600.0));
        let bounds = LatLngBounds::from_coords(-35.0, -58.5, -30.0, -53.0);

        viewport.fit_bounds(&bounds, None);

        let center = bounds.center();
        assert!((viewport.center.lat - center.lat).abs() < 1e-9);
        assert!((viewport.center.lng - center.lng).abs() < 1e-9);
        assert!(viewport.zoom > 3.0);
    }
}
