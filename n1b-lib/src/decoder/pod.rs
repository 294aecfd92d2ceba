use std::io::{Read, Seek};

use ndarray::Array2;
use tracing::debug;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::format::{self, Format};
use crate::geo::Geocentric;
use crate::grid::{LocalizationGrid, POINTS_PER_LINE};

use super::{invalid_channel, unpack_video, Direction, Metadata, PIXELS_PER_LINE};

/// Earth-location coordinates are signed 128ths of a degree.
const EARTH_LOCATION_SCALE: f64 = 128.0;
/// Header Cartesian state vector scales, to km and km/s.
const CARTESIAN_POSITION_SCALE: f64 = 1e4;

/// Decoder for the POD-era layouts: AJ and AJ-Canaries.
///
/// The two variants share every field table; the Canaries archive differs
/// only in the time-code year base, which [Format::header_date_codec] and
/// [Format::data_date_codec] capture.
pub struct PodDecoder<R: Read + Seek> {
    stream: R,
    format: Format,
    meta: Metadata,
    /// One satellite altitude for the whole pass, derived from the header
    /// epoch state vector. Coarser than the KLM per-line field but the POD
    /// records carry nothing better.
    altitude_km: f32,
}

fn video_phase(channel: Channel) -> Option<usize> {
    match channel {
        Channel::Ch1 => Some(0),
        Channel::Ch2 => Some(1),
        Channel::Ch3 => Some(2),
        Channel::Ch4 => Some(3),
        Channel::Ch5 => Some(4),
        _ => None,
    }
}

impl<R: Read + Seek> PodDecoder<R> {
    pub(super) fn new(mut stream: R, format: Format) -> Result<Self> {
        assert!(!format.is_klm(), "PodDecoder given a KLM format");

        let tbm = format::tbm(format);
        let header = format::header(format);
        let data = format::data(format);
        let header_base = tbm.size();
        let data_base = header_base + header.size();

        let spacecraft_code = tbm.get("SPACECRAFT")?.read_string(&mut stream, 0)?;
        let spacecraft = crate::satellite::by_name(&spacecraft_code)?;

        let codec = format.header_date_codec();
        let start_time = header
            .get("START_TIME")?
            .read_date(&mut stream, header_base, codec)?;
        let end_time = header
            .get("END_TIME")?
            .read_date(&mut stream, header_base, codec)?;
        let scan_lines = header
            .get("NUMBER_OF_SCANS")?
            .read_u16(&mut stream, header_base)? as usize;
        if scan_lines == 0 {
            return Err(Error::NotEnoughBytes("data records"));
        }

        // First control-point latitude of the first and last data records.
        let location = data.get("EARTH_LOCATION")?;
        let latitude_field = Field::new(location.offset, 2);
        let stride = data.size();
        let first = f64::from(latitude_field.read_i16(&mut stream, data_base)?)
            / EARTH_LOCATION_SCALE;
        let last = f64::from(
            latitude_field.read_i16(&mut stream, data_base + (scan_lines as u64 - 1) * stride)?,
        ) / EARTH_LOCATION_SCALE;
        let direction = if first < last {
            Direction::SouthToNorth
        } else {
            Direction::NorthToSouth
        };

        let x = f64::from(header.get("CARTESIAN_X")?.read_i32(&mut stream, header_base)?)
            / CARTESIAN_POSITION_SCALE;
        let y = f64::from(header.get("CARTESIAN_Y")?.read_i32(&mut stream, header_base)?)
            / CARTESIAN_POSITION_SCALE;
        let z = f64::from(header.get("CARTESIAN_Z")?.read_i32(&mut stream, header_base)?)
            / CARTESIAN_POSITION_SCALE;
        let altitude_km = Geocentric::new(x, y, z).to_geographic().height as f32;

        let meta = Metadata {
            format,
            spacecraft,
            start_time,
            end_time,
            scan_lines,
            direction,
            dataset_name: header.get("DATA_SET_NAME")?.read_string(&mut stream, header_base)?,
            processing_block: tbm.get("PROCESSING_BLOCK_ID")?.read_string(&mut stream, 0)?,
        };
        debug!(
            "bound {} decoder: {} {} lines, {}",
            format, meta.spacecraft, meta.scan_lines, meta.direction
        );

        Ok(PodDecoder {
            stream,
            format,
            meta,
            altitude_km,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn data_base(&self) -> u64 {
        format::tbm(self.format).size() + format::header(self.format).size()
    }

    fn record_base(&self, line: usize) -> u64 {
        self.data_base() + line as u64 * format::data(self.format).size()
    }

    /// Slope/intercept grid (lines x 2) for a visible channel.
    pub fn visible_calibration(&mut self, channel: Channel) -> Result<Array2<f64>> {
        let suffix = match channel {
            Channel::Ch1 => "CH1",
            Channel::Ch2 => "CH2",
            Channel::Ch3 => "CH3",
            _ => {
                return Err(invalid_channel(
                    channel,
                    &[Channel::Ch1, Channel::Ch2, Channel::Ch3],
                ))
            }
        };
        let data = format::data(self.format);
        let slope = data.get(&format!("SLOPE_{suffix}"))?;
        let intercept = data.get(&format!("INTERCEPT_{suffix}"))?;

        let lines = self.meta.scan_lines;
        let mut grid = Array2::zeros((lines, 2));
        for line in 0..lines {
            let base = self.record_base(line);
            grid[[line, 0]] =
                f64::from(slope.read_i32(&mut self.stream, base)?) / f64::from(1u32 << 30);
            grid[[line, 1]] =
                f64::from(intercept.read_i32(&mut self.stream, base)?) / f64::from(1u32 << 22);
        }
        Ok(grid)
    }

    /// Radiance coefficient grid (lines x 3) for a thermal channel.
    pub fn thermal_calibration(&mut self, channel: Channel) -> Result<Array2<f64>> {
        let suffix = match channel {
            Channel::Ch4 => "CH4",
            Channel::Ch5 => "CH5",
            _ => return Err(invalid_channel(channel, &[Channel::Ch4, Channel::Ch5])),
        };
        let data = format::data(self.format);
        let coefficients = [
            data.get(&format!("IR_COEFFICIENT_1_{suffix}"))?,
            data.get(&format!("IR_COEFFICIENT_2_{suffix}"))?,
            data.get(&format!("IR_COEFFICIENT_3_{suffix}"))?,
        ];

        let lines = self.meta.scan_lines;
        let mut grid = Array2::zeros((lines, 3));
        for line in 0..lines {
            let base = self.record_base(line);
            for (k, field) in coefficients.iter().enumerate() {
                grid[[line, k]] = f64::from(field.read_i32(&mut self.stream, base)?) / 1e6;
            }
        }
        Ok(grid)
    }

    /// Unpack one channel's samples into a (lines x 2048) raster.
    pub fn read_channel(&mut self, channel: Channel) -> Result<Array2<u16>> {
        let Some(phase) = video_phase(channel) else {
            return Err(invalid_channel(channel, Channel::set_for(self.format)));
        };
        let video = format::data(self.format).get("VIDEO_DATA")?;

        let lines = self.meta.scan_lines;
        let mut raster = Array2::zeros((lines, PIXELS_PER_LINE));
        for line in 0..lines {
            let base = self.record_base(line);
            let buf = video.read_bytes(&mut self.stream, base)?;
            let mut row = raster.row_mut(line);
            let row = row.as_slice_mut().expect("raster rows are contiguous");
            unpack_video(&buf, phase, row)?;
        }
        Ok(raster)
    }

    /// Per-line solar zenith angles in degrees (lines x 51), stored as
    /// half-degree bytes alongside the control points.
    pub fn solar_zenith_angles(&mut self) -> Result<Array2<f32>> {
        let field = format::data(self.format).get("SOLAR_ZENITH_ANGLES")?;
        let lines = self.meta.scan_lines;
        let mut grid = Array2::zeros((lines, field.size as usize));
        for line in 0..lines {
            let base = self.record_base(line);
            let buf = field.read_bytes(&mut self.stream, base)?;
            for (k, byte) in buf.iter().enumerate() {
                grid[[line, k]] = f32::from(*byte) / 2.0;
            }
        }
        Ok(grid)
    }

    /// Decode the localization grid. The POD records carry no per-line
    /// altitude, so the header-derived value is reused for every line.
    pub fn localization_grid(&mut self) -> Result<LocalizationGrid> {
        let data = format::data(self.format);
        let time_code = data.get("TIME_CODE")?;
        let location = data.get("EARTH_LOCATION")?;
        let codec = self.format.data_date_codec();

        let lines = self.meta.scan_lines;
        let mut grid = LocalizationGrid::new(lines);
        for line in 0..lines {
            let base = self.record_base(line);
            let time = time_code.read_date(&mut self.stream, base, codec)?;
            grid.set_time(line, time.utc_millis());
            grid.set_altitude(line, self.altitude_km);

            let buf = location.read_bytes(&mut self.stream, base)?;
            for point in 0..POINTS_PER_LINE {
                let at = point * 4;
                let lat = f64::from(i16::from_be_bytes([buf[at], buf[at + 1]]))
                    / EARTH_LOCATION_SCALE;
                let lon = f64::from(i16::from_be_bytes([buf[at + 2], buf[at + 3]]))
                    / EARTH_LOCATION_SCALE;
                grid.set_point(line, point, lon, lat);
            }
        }

        grid.remove_singularities();
        grid.check_time_monotonic()?;
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::field::DateCodec;
    use crate::time::Time;

    /// Build a minimal synthetic AJ file: TBM + header + `lines` data records.
    fn synthetic_aj(lines: usize) -> Vec<u8> {
        let tbm = format::tbm(Format::Aj);
        let header = format::header(Format::Aj);
        let data = format::data(Format::Aj);
        let total = tbm.size() + header.size() + lines as u64 * data.size();
        let mut buf = vec![0u8; total as usize];

        let put = |buf: &mut [u8], field: Field, base: u64, bytes: &[u8]| {
            let start = (base + field.offset) as usize;
            buf[start..start + bytes.len()].copy_from_slice(bytes);
        };

        put(&mut buf, tbm.get("SPACECRAFT").unwrap(), 0, b"NJ");
        put(&mut buf, tbm.get("PROCESSING_BLOCK_ID").unwrap(), 0, b"B2632021");

        let header_base = tbm.size();
        let start = Time::from_components(1999, 310, 39_600_000).unwrap();
        let end = Time::from_components(1999, 310, 40_500_000).unwrap();
        put(
            &mut buf,
            header.get("START_TIME").unwrap(),
            header_base,
            &crate::field::encode_date(&start, DateCodec::V3).unwrap(),
        );
        put(
            &mut buf,
            header.get("END_TIME").unwrap(),
            header_base,
            &crate::field::encode_date(&end, DateCodec::V3).unwrap(),
        );
        put(
            &mut buf,
            header.get("NUMBER_OF_SCANS").unwrap(),
            header_base,
            &(lines as u16).to_be_bytes(),
        );
        // a roughly 850km orbit over the equator
        put(
            &mut buf,
            header.get("CARTESIAN_X").unwrap(),
            header_base,
            &(72_280_000i32).to_be_bytes(),
        );

        let data_base = header_base + header.size();
        for line in 0..lines {
            let base = data_base + line as u64 * data.size();
            let time = Time::from_utc_millis(start.utc_millis() + 500 * line as i64);
            put(
                &mut buf,
                data.get("TIME_CODE").unwrap(),
                base,
                &crate::field::encode_date(&time, DateCodec::V3).unwrap(),
            );
            let location = data.get("EARTH_LOCATION").unwrap();
            for point in 0..POINTS_PER_LINE {
                // descending pass: latitude falls with line number
                let lat = (1280 - 64 * line as i16 - point as i16).to_be_bytes();
                let lon = (-2560 + 32 * point as i16).to_be_bytes();
                let field = Field::new(location.offset + point as u64 * 4, 4);
                put(&mut buf, field, base, &[lat[0], lat[1], lon[0], lon[1]]);
            }
            put(
                &mut buf,
                data.get("SLOPE_CH1").unwrap(),
                base,
                &(1i32 << 30).to_be_bytes(),
            );
            put(
                &mut buf,
                data.get("INTERCEPT_CH1").unwrap(),
                base,
                &(-(1i32 << 22)).to_be_bytes(),
            );
            put(
                &mut buf,
                data.get("IR_COEFFICIENT_2_CH4").unwrap(),
                base,
                &(2_500_000i32).to_be_bytes(),
            );
        }
        buf
    }

    #[test]
    fn test_metadata() {
        let decoder = PodDecoder::new(Cursor::new(synthetic_aj(3)), Format::Aj).unwrap();
        let meta = decoder.metadata();
        assert_eq!(meta.spacecraft.name, "NOAA 14");
        assert_eq!(meta.scan_lines, 3);
        assert_eq!(meta.direction, Direction::NorthToSouth);
        assert_eq!(meta.start_time.day_of_year(), 310);
        assert_eq!(meta.processing_block, "B2632021");
    }

    #[test]
    fn test_calibration_scaling() {
        let mut decoder = PodDecoder::new(Cursor::new(synthetic_aj(2)), Format::Aj).unwrap();
        let visible = decoder.visible_calibration(Channel::Ch1).unwrap();
        assert_eq!(visible.dim(), (2, 2));
        assert_eq!(visible[[0, 0]], 1.0);
        assert_eq!(visible[[0, 1]], -1.0);

        let thermal = decoder.thermal_calibration(Channel::Ch4).unwrap();
        assert_eq!(thermal.dim(), (2, 3));
        assert_eq!(thermal[[1, 1]], 2.5);
    }

    #[test]
    fn test_channel_argument_checks() {
        let mut decoder = PodDecoder::new(Cursor::new(synthetic_aj(1)), Format::Aj).unwrap();
        assert!(matches!(
            decoder.visible_calibration(Channel::Ch4),
            Err(Error::InvalidChannel { .. })
        ));
        assert!(matches!(
            decoder.thermal_calibration(Channel::Ch3),
            Err(Error::InvalidChannel { .. })
        ));
        // 3A does not exist in the POD channel set
        assert!(matches!(
            decoder.read_channel(Channel::Ch3A),
            Err(Error::InvalidChannel { .. })
        ));
    }

    #[test]
    fn test_localization_grid() {
        let mut decoder = PodDecoder::new(Cursor::new(synthetic_aj(2)), Format::Aj).unwrap();
        let grid = decoder.localization_grid().unwrap();
        assert_eq!(grid.height(), 2);
        let (lon, lat) = grid.point(0, 0);
        assert_eq!(lat, 10.0); // 1280 / 128
        assert_eq!(lon, -20.0); // -2560 / 128
        assert!(grid.time(1) > grid.time(0));
        // both lines carry the header-derived altitude
        assert_eq!(grid.altitude(0), grid.altitude(1));
        assert!((f64::from(grid.altitude(0)) - 849.863).abs() < 0.5);
    }

    #[test]
    fn test_read_channel_shape() {
        let mut decoder = PodDecoder::new(Cursor::new(synthetic_aj(2)), Format::Aj).unwrap();
        let raster = decoder.read_channel(Channel::Ch2).unwrap();
        assert_eq!(raster.dim(), (2, PIXELS_PER_LINE));
        // synthetic video field is all zeros
        assert_eq!(raster[[0, 0]], 0);
    }
}
