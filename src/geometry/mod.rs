//! Planar coordinates and raster georeferencing.

use crate::error::{Rl2Error, Rl2Result};

/// SRID value marking a raster (or a georeference) without a spatial
/// reference system
pub const GEOREFERENCING_NONE: i32 = -1;

/// A simple 2D point with x and y coordinates.
///
/// # Example
///
/// ```rust
/// use rasterlite::Point;
///
/// let p = Point::new(-122.4, 37.8);
/// assert_eq!(p.x, -122.4);
///
/// let p2: Point = (-122.4, 37.8).into();
/// assert_eq!(p, p2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    #[must_use]
    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Convert to a tuple (x, y).
    #[inline]
    #[must_use]
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::origin()
    }
}

impl From<(f64, f64)> for Point {
    #[inline]
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for (f64, f64) {
    #[inline]
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Axis-aligned bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    #[must_use] pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[must_use] pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use] pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use] pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    #[must_use] pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Raster corner used to anchor a georeference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

/// Origin + resolution placement of a raster in its SRS.
///
/// Every way of georeferencing a raster (center point, any corner, or an
/// explicit frame) normalizes to the upper-left corner of pixel (0, 0)
/// plus horizontal and vertical resolution. Rows grow downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Georeference {
    pub srid: i32,
    pub horz_res: f64,
    pub vert_res: f64,
    pub upper_left: Point,
}

fn check_resolution(horz_res: f64, vert_res: f64) -> Rl2Result<()> {
    if !(horz_res.is_finite() && horz_res > 0.0 && vert_res.is_finite() && vert_res > 0.0) {
        return Err(Rl2Error::out_of_range(format!(
            "resolution ({horz_res}, {vert_res}) must be positive"
        )));
    }
    Ok(())
}

impl Georeference {
    /// Anchor the raster's upper-left corner at `upper_left`
    pub fn new(srid: i32, horz_res: f64, vert_res: f64, upper_left: Point) -> Rl2Result<Self> {
        check_resolution(horz_res, vert_res)?;
        Ok(Self {
            srid,
            horz_res,
            vert_res,
            upper_left,
        })
    }

    /// Center the `width` x `height` raster on `center`
    pub fn from_center(
        srid: i32,
        horz_res: f64,
        vert_res: f64,
        center: Point,
        width: usize,
        height: usize,
    ) -> Rl2Result<Self> {
        check_resolution(horz_res, vert_res)?;
        let half_w = width as f64 * horz_res / 2.0;
        let half_h = height as f64 * vert_res / 2.0;
        Self::new(
            srid,
            horz_res,
            vert_res,
            Point::new(center.x - half_w, center.y + half_h),
        )
    }

    /// Pin one corner of the `width` x `height` raster at `point`
    pub fn from_corner(
        srid: i32,
        horz_res: f64,
        vert_res: f64,
        corner: Corner,
        point: Point,
        width: usize,
        height: usize,
    ) -> Rl2Result<Self> {
        check_resolution(horz_res, vert_res)?;
        let span_x = width as f64 * horz_res;
        let span_y = height as f64 * vert_res;
        let upper_left = match corner {
            Corner::UpperLeft => point,
            Corner::UpperRight => Point::new(point.x - span_x, point.y),
            Corner::LowerLeft => Point::new(point.x, point.y + span_y),
            Corner::LowerRight => Point::new(point.x - span_x, point.y + span_y),
        };
        Self::new(srid, horz_res, vert_res, upper_left)
    }

    /// Stretch the `width` x `height` raster over `frame`
    pub fn from_frame(srid: i32, frame: Extent, width: usize, height: usize) -> Rl2Result<Self> {
        if width == 0 || height == 0 {
            return Err(Rl2Error::out_of_range("cannot frame an empty raster"));
        }
        let horz_res = frame.width() / width as f64;
        let vert_res = frame.height() / height as f64;
        Self::new(srid, horz_res, vert_res, Point::new(frame.min_x, frame.max_y))
    }

    #[must_use] pub fn has_srid(&self) -> bool {
        self.srid != GEOREFERENCING_NONE
    }

    /// Bounding extent of a `width` x `height` raster
    #[must_use] pub fn extent(&self, width: usize, height: usize) -> Extent {
        Extent::new(
            self.upper_left.x,
            self.upper_left.y - height as f64 * self.vert_res,
            self.upper_left.x + width as f64 * self.horz_res,
            self.upper_left.y,
        )
    }

    /// World coordinate of the (fractional) pixel position `(col, row)`
    #[must_use] pub fn pixel_to_world(&self, col: f64, row: f64) -> Point {
        Point::new(
            self.upper_left.x + col * self.horz_res,
            self.upper_left.y - row * self.vert_res,
        )
    }

    /// Fractional `(col, row)` of a world coordinate
    #[must_use] pub fn world_to_pixel(&self, p: Point) -> (f64, f64) {
        (
            (p.x - self.upper_left.x) / self.horz_res,
            (self.upper_left.y - p.y) / self.vert_res,
        )
    }

    /// Same placement at a coarser pyramid scale
    #[must_use] pub fn scaled(&self, factor: u32) -> Self {
        Self {
            horz_res: self.horz_res * f64::from(factor),
            vert_res: self.vert_res * f64::from(factor),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_conversions() {
        let p: Point = (5.0, 10.0).into();
        assert_eq!(p.to_tuple(), (5.0, 10.0));
        assert_eq!(Point::default(), Point::origin());
    }

    #[test]
    fn test_extent() {
        let e = Extent::new(0.0, 0.0, 10.0, 4.0);
        assert_eq!(e.width(), 10.0);
        assert_eq!(e.height(), 4.0);
        assert_eq!(e.center(), Point::new(5.0, 2.0));
        assert!(e.contains(&Point::new(10.0, 4.0)));
        assert!(!e.contains(&Point::new(10.1, 4.0)));
    }

    #[test]
    fn test_center_and_corners_agree() {
        let from_center =
            Georeference::from_center(4326, 0.5, 0.25, Point::new(10.0, 20.0), 8, 4).unwrap();
        let expected = Extent::new(8.0, 19.5, 12.0, 20.5);
        assert_eq!(from_center.extent(8, 4), expected);

        for (corner, point) in [
            (Corner::UpperLeft, Point::new(8.0, 20.5)),
            (Corner::UpperRight, Point::new(12.0, 20.5)),
            (Corner::LowerLeft, Point::new(8.0, 19.5)),
            (Corner::LowerRight, Point::new(12.0, 19.5)),
        ] {
            let georef = Georeference::from_corner(4326, 0.5, 0.25, corner, point, 8, 4).unwrap();
            assert_eq!(georef, from_center, "{corner:?} anchor must normalize to the same origin");
        }
    }

    #[test]
    fn test_frame() {
        let frame = Extent::new(100.0, 200.0, 164.0, 232.0);
        let georef = Georeference::from_frame(3857, frame, 64, 32).unwrap();
        assert_eq!(georef.horz_res, 1.0);
        assert_eq!(georef.vert_res, 1.0);
        assert_eq!(georef.extent(64, 32), frame);

        let degenerate = Extent::new(0.0, 0.0, 0.0, 10.0);
        assert!(Georeference::from_frame(3857, degenerate, 4, 4).is_err());
        assert!(Georeference::from_frame(3857, frame, 0, 4).is_err());
    }

    #[test]
    fn test_pixel_world_roundtrip() {
        let georef = Georeference::new(GEOREFERENCING_NONE, 2.0, 3.0, Point::new(-10.0, 10.0)).unwrap();
        assert!(!georef.has_srid());
        let world = georef.pixel_to_world(1.5, 2.0);
        assert_eq!(world, Point::new(-7.0, 4.0));
        assert_eq!(georef.world_to_pixel(world), (1.5, 2.0));
    }

    #[test]
    fn test_invalid_resolution() {
        assert!(Georeference::new(4326, 0.0, 1.0, Point::origin()).is_err());
        assert!(Georeference::new(4326, 1.0, f64::NAN, Point::origin()).is_err());
    }

    #[test]
    fn test_scaled() {
        let georef = Georeference::new(4326, 1.0, 2.0, Point::new(5.0, 5.0)).unwrap();
        let half = georef.scaled(2);
        assert_eq!(half.horz_res, 2.0);
        assert_eq!(half.vert_res, 4.0);
        assert_eq!(half.upper_left, georef.upper_left);
    }
}
