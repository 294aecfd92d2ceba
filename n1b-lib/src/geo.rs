//! Geocentric/geographic conversion over the WGS84 ellipsoid.
//!
//! Orbit bulletins tabulate satellite state vectors in a Greenwich-fixed
//! geocentric frame in kilometres; the localization grid and the correction
//! pass work in geographic degrees. Only the conversions those two callers
//! need are provided here.

use serde::Serialize;

/// Earth-centered, Greenwich-fixed cartesian position in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geocentric {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Geographic position: degrees, height in kilometres above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

/// WGS84 semi-major axis, km.
const SEMI_MAJOR_KM: f64 = 6378.137;
/// WGS84 first eccentricity squared.
const E2: f64 = 6.6943799901377997e-3;

impl Geocentric {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Geocentric { x, y, z }
    }

    /// Convert to geographic coordinates.
    ///
    /// Closed-form conversion after
    /// Olson, D. K. (1996). Converting Earth-Centered, Earth-Fixed
    /// Coordinates to Geodetic Coordinates. IEEE Transactions on Aerospace
    /// and Electronic Systems, 32(1), 473-476.
    pub fn to_geographic(&self) -> Geographic {
        let a = SEMI_MAJOR_KM;
        let a1 = a * E2;
        let a2 = a1 * a1;
        let a3 = a1 * E2 / 2.0;
        let a4 = 2.5 * a2;
        let a5 = a1 + a3;
        let a6 = 1.0 - E2;

        let (x, y, z) = (self.x, self.y, self.z);
        let zp = z.abs();
        let w2 = x * x + y * y;
        let w = w2.sqrt();
        let z2 = z * z;
        let r2 = w2 + z2;
        let r = r2.sqrt();

        // degenerate near the geocenter; nothing we decode gets here
        if r < 100.0 {
            return Geographic {
                longitude: 0.0,
                latitude: 0.0,
                height: 0.0,
            };
        }

        let lon = y.atan2(x);
        let s2 = z2 / r2;
        let c2 = w2 / r2;
        let mut u = a2 / r;
        let mut v = a3 - a4 / r;

        let c;
        let s;
        let ss;
        let mut lat;
        if c2 > 0.3 {
            s = (zp / r) * (1.0 + c2 * (a1 + u + s2 * v) / r);
            lat = s.asin();
            ss = s * s;
            c = (1.0 - ss).sqrt();
        } else {
            c = (w / r) * (1.0 - s2 * (a5 - u - c2 * v) / r);
            lat = c.acos();
            ss = 1.0 - c * c;
            s = ss.sqrt();
        }

        let g = 1.0 - E2 * ss;
        let rg = a / g.sqrt();
        let rf = a6 * rg;
        u = w - rg * c;
        v = zp - rf * s;
        let f = c * u + s * v;
        let m = c * v - s * u;
        let p = m / (rf / g + f);

        lat += p;
        let height = f + m * p / 2.0;
        if z < 0.0 {
            lat = -lat;
        }

        Geographic {
            longitude: lon.to_degrees(),
            latitude: lat.to_degrees(),
            height,
        }
    }
}

impl Geographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Geographic {
            longitude,
            latitude,
            height,
        }
    }

    /// Convert to the geocentric frame.
    pub fn to_geocentric(&self) -> Geocentric {
        let lon = self.longitude.to_radians();
        let lat = self.latitude.to_radians();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = SEMI_MAJOR_KM / (1.0 - E2 * sin_lat * sin_lat).sqrt();
        Geocentric {
            x: (n + self.height) * cos_lat * lon.cos(),
            y: (n + self.height) * cos_lat * lon.sin(),
            z: (n * (1.0 - E2) + self.height) * sin_lat,
        }
    }
}

impl std::fmt::Display for Geographic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.4}, {:.4}, {:.3}km)",
            self.longitude, self.latitude, self.height
        )
    }
}
