use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use hifitime::Epoch;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geo::{Geocentric, Geographic};
use crate::satellite::Satellite;
use crate::time::Time;

/// Milliseconds between tabulated ephemeris records.
pub const TIME_INTERVAL: i64 = 60_000;

/// One tabulated satellite state: position in km, velocity in km/s, in the
/// Greenwich-fixed geocentric frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EphemerisRecord {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// Value of one bulletin header field.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Str(String),
    Date(Time),
    Number(f64),
    Point { longitude: f64, latitude: f64 },
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaValue::Str(s) => write!(f, "{s}"),
            MetaValue::Date(d) => write!(f, "{d}"),
            MetaValue::Number(n) => write!(f, "{n}"),
            MetaValue::Point {
                longitude,
                latitude,
            } => write!(f, "{longitude} {latitude}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MetaKind {
    Str,
    Date,
    Number,
    Point,
}

/// The bulletin header schema: 22 typed fields, in this exact order.
const META_SCHEMA: [(&str, MetaKind); 22] = [
    ("BULLETIN", MetaKind::Str),
    ("SATELLITE", MetaKind::Str),
    ("SATELLITE_CODE", MetaKind::Str),
    ("PROCESSING_CENTER", MetaKind::Str),
    ("BULLETIN_DATE", MetaKind::Date),
    ("START_TIME", MetaKind::Date),
    ("END_TIME", MetaKind::Date),
    ("RECORD_COUNT", MetaKind::Number),
    ("ORBIT_NUMBER", MetaKind::Number),
    ("SEMI_MAJOR_AXIS", MetaKind::Number),
    ("ECCENTRICITY", MetaKind::Number),
    ("INCLINATION", MetaKind::Number),
    ("MEAN_ANOMALY", MetaKind::Number),
    ("ARGUMENT_OF_PERIGEE", MetaKind::Number),
    ("RIGHT_ASCENSION", MetaKind::Number),
    ("NODAL_PERIOD", MetaKind::Number),
    ("NODAL_LONGITUDE", MetaKind::Number),
    ("SUBSATELLITE_POINT", MetaKind::Point),
    ("REFERENCE_FRAME", MetaKind::Str),
    ("ELLIPSOID", MetaKind::Str),
    ("ASCENDING_NODE_TIME", MetaKind::Date),
    ("STATION", MetaKind::Str),
];

/// A parsed SATPOS orbit bulletin.
///
/// A bulletin tabulates satellite state vectors every [TIME_INTERVAL] over
/// a 36-hour window starting at 00:00 UTC of the bulletin day; `#`-comment
/// and blank lines are ignored everywhere.
#[derive(Debug, Clone)]
pub struct OrbitBulletin {
    name: String,
    meta: Vec<(&'static str, MetaValue)>,
    day_start: Time,
    records: Vec<EphemerisRecord>,
}

/// The canonical bulletin file name for a satellite and day.
pub fn filename(satellite: &Satellite, date: &Time) -> String {
    format!(
        "SATPOS_{}_{}.TXT",
        satellite.code,
        date.format_utc("%Y%m%d")
    )
}

impl OrbitBulletin {
    /// Parse a bulletin from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        Self::from_reader(BufReader::new(File::open(path)?), &name)
    }

    /// Locate and parse the bulletin for `satellite` on `date`'s UTC day in
    /// `dir`. The on-disk name is matched case-insensitively.
    pub fn find<P: AsRef<Path>>(dir: P, satellite: &Satellite, date: &Time) -> Result<Self> {
        let wanted = filename(satellite, date);
        let pattern =
            Regex::new(&format!("(?i)^{}$", regex::escape(&wanted))).expect("literal pattern");
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if pattern.is_match(&entry.file_name().to_string_lossy()) {
                debug!("found orbit bulletin {:?}", entry.path());
                return Self::open(entry.path());
            }
        }
        Err(Error::BulletinNotFound(wanted))
    }

    /// Parse a bulletin. `name` is used to annotate parse errors.
    pub fn from_reader<R: BufRead>(reader: R, name: &str) -> Result<Self> {
        let error = |line: usize, reason: String| Error::BulletinParse {
            file: name.to_string(),
            line,
            reason,
        };

        let mut schema = META_SCHEMA.iter();
        let mut meta: Vec<(&'static str, MetaValue)> = Vec::new();
        let mut records: Vec<EphemerisRecord> = Vec::new();
        let mut last_line = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let lineno = index + 1;
            last_line = lineno;
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if let Some(&(field, kind)) = schema.next() {
                let (key, value) = text
                    .split_once(':')
                    .ok_or_else(|| error(lineno, format!("expected '{field}: <value>'")))?;
                if !key.trim().eq_ignore_ascii_case(field) {
                    return Err(error(
                        lineno,
                        format!("expected header field {field}, found {}", key.trim()),
                    ));
                }
                meta.push((field, parse_meta(value.trim(), kind).map_err(|reason| error(lineno, reason))?));
            } else {
                records.push(parse_record(text).map_err(|reason| error(lineno, reason))?);
            }
        }

        if let Some(&(field, _)) = schema.next() {
            return Err(error(
                last_line,
                format!("truncated header: missing {field}"),
            ));
        }

        let day_start = match meta.iter().find(|(name, _)| *name == "BULLETIN_DATE") {
            Some((_, MetaValue::Date(date))) => date.start_of_day(),
            _ => unreachable!("schema guarantees BULLETIN_DATE"),
        };

        debug!("parsed bulletin {name}: {} records", records.len());
        Ok(OrbitBulletin {
            name: name.to_string(),
            meta,
            day_start,
            records,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header field by name.
    pub fn meta(&self, name: &str) -> Option<&MetaValue> {
        self.meta
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// All header fields in declared order.
    pub fn meta_fields(&self) -> &[(&'static str, MetaValue)] {
        &self.meta
    }

    pub fn records(&self) -> &[EphemerisRecord] {
        &self.records
    }

    /// 00:00 UTC of the bulletin day; the origin of the record index.
    pub fn day_start(&self) -> Time {
        self.day_start
    }

    /// Satellite position at `time` in the geocentric frame, km.
    ///
    /// On a tabulated instant the tabulated position is returned verbatim;
    /// between instants, per-axis constant-acceleration interpolation is
    /// applied between the bracketing records.
    pub fn geocentric_coordinate(&self, time: &Time) -> Result<Geocentric> {
        let out_of_range = || Error::EphemerisOutOfRange(time.to_string());

        let millis = time.utc_millis() - self.day_start.utc_millis();
        if millis < 0 {
            return Err(out_of_range());
        }
        let row = usize::try_from(millis / TIME_INTERVAL).map_err(|_| out_of_range())?;
        let rem = millis % TIME_INTERVAL;

        if rem == 0 {
            let record = self.records.get(row).ok_or_else(out_of_range)?;
            let [x, y, z] = record.position;
            return Ok(Geocentric::new(x, y, z));
        }

        let r0 = self.records.get(row).ok_or_else(out_of_range)?;
        let r1 = self.records.get(row + 1).ok_or_else(out_of_range)?;
        let t = rem as f64 / 1_000.0;
        let dt = TIME_INTERVAL as f64 / 1_000.0;
        let mut position = [0f64; 3];
        for axis in 0..3 {
            let acceleration = (r1.velocity[axis] - r0.velocity[axis]) / dt;
            position[axis] =
                r0.position[axis] + r0.velocity[axis] * t + 0.5 * acceleration * t * t;
        }
        Ok(Geocentric::new(position[0], position[1], position[2]))
    }

    /// Satellite position at `time` as geographic degrees and km.
    pub fn geographic_coordinate(&self, time: &Time) -> Result<Geographic> {
        Ok(self.geocentric_coordinate(time)?.to_geographic())
    }
}

fn parse_meta(value: &str, kind: MetaKind) -> std::result::Result<MetaValue, String> {
    match kind {
        MetaKind::Str => Ok(MetaValue::Str(value.to_string())),
        MetaKind::Date => Epoch::from_str(value)
            .map(|epoch| MetaValue::Date(Time::from_epoch(epoch)))
            .map_err(|e| format!("bad date {value:?}: {e}")),
        MetaKind::Number => value
            .parse::<f64>()
            .map(MetaValue::Number)
            .map_err(|e| format!("bad number {value:?}: {e}")),
        MetaKind::Point => {
            let mut it = value.split_whitespace();
            let longitude = it
                .next()
                .and_then(|tok| tok.parse::<f64>().ok())
                .ok_or_else(|| format!("bad point {value:?}"))?;
            let latitude = it
                .next()
                .and_then(|tok| tok.parse::<f64>().ok())
                .ok_or_else(|| format!("bad point {value:?}"))?;
            if it.next().is_some() {
                return Err(format!("bad point {value:?}"));
            }
            Ok(MetaValue::Point {
                longitude,
                latitude,
            })
        }
    }
}

fn parse_record(text: &str) -> std::result::Result<EphemerisRecord, String> {
    let mut values = [0f64; 6];
    let mut count = 0;
    for token in text.split_whitespace() {
        if count == values.len() {
            return Err(format!("expected 6 values, found more in {text:?}"));
        }
        values[count] = token
            .parse::<f64>()
            .map_err(|e| format!("bad number {token:?}: {e}"))?;
        count += 1;
    }
    if count != values.len() {
        return Err(format!("expected 6 values, found {count}"));
    }
    Ok(EphemerisRecord {
        position: [values[0], values[1], values[2]],
        velocity: [values[3], values[4], values[5]],
    })
}
