use tracing::debug;

use crate::bulletin::OrbitBulletin;
use crate::error::Result;
use crate::grid::LocalizationGrid;
use crate::time::Time;

/// Pixel sample of the sub-satellite (nadir) point.
pub const NADIR_SAMPLE: f64 = 1024.0;

/// Refines a [LocalizationGrid] against an orbit bulletin.
///
/// The on-board ephemeris the control points were computed from drifts by
/// a roughly constant offset per pass; comparing each line's nadir point
/// with the bulletin's position at the line's timestamp recovers that
/// offset.
pub struct GeolocationCorrector<'a> {
    bulletin: &'a OrbitBulletin,
}

impl<'a> GeolocationCorrector<'a> {
    pub fn new(bulletin: &'a OrbitBulletin) -> Self {
        GeolocationCorrector { bulletin }
    }

    /// Shift every scan line onto the bulletin's ground track and replace
    /// the per-line altitude with the bulletin's. Returns the mean applied
    /// (longitude, latitude) offset in degrees as a diagnostic.
    pub fn correct(&self, grid: &mut LocalizationGrid) -> Result<(f64, f64)> {
        let lines = grid.height();
        if lines == 0 {
            return Ok((0.0, 0.0));
        }

        let mut sum = (0.0f64, 0.0f64);
        for line in 0..lines {
            let time = Time::from_utc_millis(grid.time(line));
            let reference = self.bulletin.geographic_coordinate(&time)?;
            let (nadir_lon, nadir_lat) = grid.geographic_at(line, NADIR_SAMPLE);
            let dx = reference.longitude - nadir_lon;
            let dy = reference.latitude - nadir_lat;
            grid.translate_line(line, dx, dy);
            grid.set_altitude(line, reference.height as f32);
            sum.0 += dx;
            sum.1 += dy;
        }

        let mean = (sum.0 / lines as f64, sum.1 / lines as f64);
        debug!(
            "applied bulletin correction, mean offset ({:.5}, {:.5}) deg",
            mean.0, mean.1
        );
        Ok(mean)
    }
}

/// Apply one constant offset to the whole grid; the manual fallback when no
/// bulletin covers the pass.
pub fn translate(grid: &mut LocalizationGrid, dx: f64, dy: f64) {
    grid.translate(dx, dy);
}

// TODO: retire once the bulletin correction also estimates yaw; kept for
// manual calibration against landmarks.
pub fn rotate(grid: &mut LocalizationGrid, radians: f64) {
    grid.rotate(radians);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulletin::TIME_INTERVAL;
    use crate::geo::Geographic;
    use crate::grid::POINTS_PER_LINE;

    /// Bulletin whose records sit exactly over the given geographic points.
    fn bulletin_over(points: &[Geographic]) -> OrbitBulletin {
        let mut text = String::from(
            "BULLETIN: SATPOS\n\
             SATELLITE: NOAA 16\n\
             SATELLITE_CODE: NL\n\
             PROCESSING_CENTER: CMS\n\
             BULLETIN_DATE: 2001-06-01T00:00:00Z\n\
             START_TIME: 2001-06-01T00:00:00Z\n\
             END_TIME: 2001-06-02T12:00:00Z\n\
             RECORD_COUNT: 2\n\
             ORBIT_NUMBER: 3511\n\
             SEMI_MAJOR_AXIS: 7228.0\n\
             ECCENTRICITY: 0.0011\n\
             INCLINATION: 98.77\n\
             MEAN_ANOMALY: 110.0\n\
             ARGUMENT_OF_PERIGEE: 250.0\n\
             RIGHT_ASCENSION: 205.0\n\
             NODAL_PERIOD: 102.1\n\
             NODAL_LONGITUDE: -34.5\n\
             SUBSATELLITE_POINT: -61.5 16.25\n\
             REFERENCE_FRAME: GREENWICH\n\
             ELLIPSOID: WGS84\n\
             ASCENDING_NODE_TIME: 2001-06-01T00:12:00Z\n\
             STATION: LANNION\n",
        );
        for point in points {
            let p = point.to_geocentric();
            text.push_str(&format!("{} {} {} 0.0 0.0 0.0\n", p.x, p.y, p.z));
        }
        OrbitBulletin::from_reader(text.as_bytes(), "SATPOS_NL_20010601.TXT").unwrap()
    }

    fn flat_grid(lines: usize, lon: f64, lat: f64, day_start: i64) -> LocalizationGrid {
        let mut grid = LocalizationGrid::new(lines);
        for line in 0..lines {
            for point in 0..POINTS_PER_LINE {
                grid.set_point(line, point, lon, lat);
            }
            grid.set_time(line, day_start + line as i64 * TIME_INTERVAL);
            grid.set_altitude(line, 0.0);
        }
        grid
    }

    #[test]
    fn test_correct_applies_per_line_offset() {
        let bulletin = bulletin_over(&[
            Geographic::new(-60.5, 17.25, 850.0),
            Geographic::new(-60.5, 16.25, 850.0),
        ]);
        let day_start = bulletin.day_start().utc_millis();
        let mut grid = flat_grid(2, -61.5, 16.25, day_start);

        let (dx, dy) = GeolocationCorrector::new(&bulletin).correct(&mut grid).unwrap();
        assert!((dx - 1.0).abs() < 1e-6);
        assert!((dy - 0.5).abs() < 1e-6);

        // line 0 shifted by (+1, +1), line 1 by (+1, 0)
        let (lon, lat) = grid.point(0, 10);
        assert!((lon - -60.5).abs() < 1e-6);
        assert!((lat - 17.25).abs() < 1e-6);
        let (lon, lat) = grid.point(1, 10);
        assert!((lon - -60.5).abs() < 1e-6);
        assert!((lat - 16.25).abs() < 1e-6);

        // altitude overwritten from the bulletin
        assert!((f64::from(grid.altitude(0)) - 850.0).abs() < 1e-3);
    }

    #[test]
    fn test_correct_fails_outside_bulletin() {
        let bulletin = bulletin_over(&[Geographic::new(0.0, 0.0, 850.0)]);
        let mut grid = flat_grid(1, 0.0, 0.0, bulletin.day_start().utc_millis());
        grid.set_time(0, bulletin.day_start().utc_millis() + 10 * TIME_INTERVAL);
        assert!(GeolocationCorrector::new(&bulletin).correct(&mut grid).is_err());
    }

    #[test]
    fn test_manual_modes() {
        let bulletin = bulletin_over(&[Geographic::new(0.0, 0.0, 850.0)]);
        let mut grid = flat_grid(1, 10.0, 20.0, bulletin.day_start().utc_millis());
        translate(&mut grid, -0.25, 0.75);
        assert_eq!(grid.point(0, 0), (9.75, 20.75));
        // a flat grid is invariant under rotation about its own center
        rotate(&mut grid, 1.0);
        let (lon, lat) = grid.point(0, 50);
        assert!((lon - 9.75).abs() < 1e-9);
        assert!((lat - 20.75).abs() < 1e-9);
    }
}
