use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};

/// Control points per scan line.
pub const POINTS_PER_LINE: usize = 51;
/// Pixel sample of the first control point on each line.
pub const FIRST_POINT_SAMPLE: f64 = 25.0;
/// Pixel spacing between control points.
pub const POINT_STEP: f64 = 40.0;

/// Geolocation control-point grid for one N1B acquisition.
///
/// 51 (longitude, latitude) control points per scan line at samples
/// 25, 65, ..., 2025, plus a per-line acquisition time (UTC milliseconds)
/// and satellite altitude (km). Populated line-by-line during decode,
/// optionally corrected afterward (see [crate::correct]), then read-only.
#[derive(Debug, Clone)]
pub struct LocalizationGrid {
    longitudes: Array2<f64>,
    latitudes: Array2<f64>,
    times: Vec<i64>,
    altitudes: Vec<f32>,
}

impl LocalizationGrid {
    pub fn new(lines: usize) -> Self {
        LocalizationGrid {
            longitudes: Array2::zeros((lines, POINTS_PER_LINE)),
            latitudes: Array2::zeros((lines, POINTS_PER_LINE)),
            times: vec![0; lines],
            altitudes: vec![0.0; lines],
        }
    }

    /// Scan lines.
    pub fn height(&self) -> usize {
        self.times.len()
    }

    /// Control points per line.
    pub fn width(&self) -> usize {
        POINTS_PER_LINE
    }

    /// Control point as (longitude, latitude) degrees.
    pub fn point(&self, line: usize, point: usize) -> (f64, f64) {
        (self.longitudes[[line, point]], self.latitudes[[line, point]])
    }

    pub fn set_point(&mut self, line: usize, point: usize, longitude: f64, latitude: f64) {
        self.longitudes[[line, point]] = longitude;
        self.latitudes[[line, point]] = latitude;
    }

    /// Acquisition time of a line, UTC milliseconds.
    pub fn time(&self, line: usize) -> i64 {
        self.times[line]
    }

    pub fn set_time(&mut self, line: usize, millis: i64) {
        self.times[line] = millis;
    }

    /// Satellite altitude over a line, km.
    pub fn altitude(&self, line: usize) -> f32 {
        self.altitudes[line]
    }

    pub fn set_altitude(&mut self, line: usize, km: f32) {
        self.altitudes[line] = km;
    }

    /// Geographic position of an arbitrary pixel sample on a line, through
    /// the inverse of the control-point spacing transform and linear
    /// interpolation between the two bracketing points.
    pub fn geographic_at(&self, line: usize, sample: f64) -> (f64, f64) {
        let col = ((sample - FIRST_POINT_SAMPLE) / POINT_STEP)
            .clamp(0.0, (POINTS_PER_LINE - 1) as f64);
        let left = col.floor() as usize;
        let right = (left + 1).min(POINTS_PER_LINE - 1);
        let frac = col - left as f64;
        let (lon0, lat0) = self.point(line, left);
        let (lon1, lat1) = self.point(line, right);
        (lon0 + (lon1 - lon0) * frac, lat0 + (lat1 - lat0) * frac)
    }

    /// Repair antimeridian wraparounds so longitudes vary continuously
    /// along each scan line.
    pub fn remove_singularities(&mut self) {
        let mut repaired = 0usize;
        for mut row in self.longitudes.rows_mut() {
            for point in 1..POINTS_PER_LINE {
                let prev = row[point - 1];
                let jump = row[point] - prev;
                if jump > 180.0 {
                    row[point] -= 360.0;
                    repaired += 1;
                } else if jump < -180.0 {
                    row[point] += 360.0;
                    repaired += 1;
                }
            }
        }
        if repaired > 0 {
            debug!("repaired {repaired} antimeridian singularities");
        }
    }

    /// Verify the per-line time sequence is non-decreasing.
    ///
    /// # Errors
    /// [Error::NonMonotonicTime] naming the first offending line.
    pub fn check_time_monotonic(&self) -> Result<()> {
        for line in 1..self.times.len() {
            if self.times[line] < self.times[line - 1] {
                return Err(Error::NonMonotonicTime(line));
            }
        }
        Ok(())
    }

    /// Shift every control point of one line.
    pub fn translate_line(&mut self, line: usize, dx: f64, dy: f64) {
        for point in 0..POINTS_PER_LINE {
            self.longitudes[[line, point]] += dx;
            self.latitudes[[line, point]] += dy;
        }
    }

    /// Shift every control point of the grid.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.longitudes += dx;
        self.latitudes += dy;
    }

    /// Rotate every control point about the grid's central control point.
    pub fn rotate(&mut self, radians: f64) {
        let center_line = self.height() / 2;
        let (cx, cy) = self.point(center_line, POINTS_PER_LINE / 2);
        let (sin, cos) = radians.sin_cos();
        for line in 0..self.height() {
            for point in 0..POINTS_PER_LINE {
                let (x, y) = self.point(line, point);
                let (dx, dy) = (x - cx, y - cy);
                self.set_point(
                    line,
                    point,
                    cx + dx * cos - dy * sin,
                    cy + dx * sin + dy * cos,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_grid(lines: usize) -> LocalizationGrid {
        let mut grid = LocalizationGrid::new(lines);
        for line in 0..lines {
            for point in 0..POINTS_PER_LINE {
                grid.set_point(line, point, point as f64, line as f64);
            }
            grid.set_time(line, 1000 * line as i64);
        }
        grid
    }

    #[test]
    fn test_geographic_at_control_points() {
        let grid = ramp_grid(3);
        // sample 25 is control point 0, sample 65 is point 1
        assert_eq!(grid.geographic_at(1, 25.0), (0.0, 1.0));
        assert_eq!(grid.geographic_at(1, 65.0), (1.0, 1.0));
        // halfway between points 0 and 1
        let (lon, _) = grid.geographic_at(1, 45.0);
        assert!((lon - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_geographic_at_clamps() {
        let grid = ramp_grid(2);
        assert_eq!(grid.geographic_at(0, 0.0), (0.0, 0.0));
        assert_eq!(grid.geographic_at(0, 5000.0), (50.0, 0.0));
    }

    #[test]
    fn test_remove_singularities_unwraps() {
        let mut grid = LocalizationGrid::new(1);
        for point in 0..POINTS_PER_LINE {
            // crosses the antimeridian between points 2 and 3
            let lon = if point < 3 { 179.0 + point as f64 * 0.5 } else { -179.5 };
            grid.set_point(0, point, lon, 0.0);
        }
        grid.remove_singularities();
        let (lon, _) = grid.point(0, 3);
        assert!((lon - 180.5).abs() < 1e-12);
        for point in 1..POINTS_PER_LINE {
            let jump = grid.point(0, point).0 - grid.point(0, point - 1).0;
            assert!(jump.abs() <= 180.0);
        }
    }

    #[test]
    fn test_time_monotonic() {
        let mut grid = ramp_grid(4);
        assert!(grid.check_time_monotonic().is_ok());
        grid.set_time(2, 500);
        assert!(matches!(
            grid.check_time_monotonic(),
            Err(Error::NonMonotonicTime(2))
        ));
    }

    #[test]
    fn test_translate_and_rotate() {
        let mut grid = ramp_grid(3);
        grid.translate(1.5, -0.5);
        assert_eq!(grid.point(0, 0), (1.5, -0.5));

        let mut grid = ramp_grid(3);
        let center = grid.point(1, POINTS_PER_LINE / 2);
        grid.rotate(std::f64::consts::FRAC_PI_2);
        // the pivot stays put
        let rotated_center = grid.point(1, POINTS_PER_LINE / 2);
        assert!((rotated_center.0 - center.0).abs() < 1e-12);
        assert!((rotated_center.1 - center.1).abs() < 1e-12);
        // a point one step east of the pivot moves one step north
        let east = grid.point(1, POINTS_PER_LINE / 2 + 1);
        assert!((east.0 - center.0).abs() < 1e-12);
        assert!((east.1 - (center.1 + 1.0)).abs() < 1e-12);
    }
}
