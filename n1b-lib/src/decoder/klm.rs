use std::io::{Read, Seek};

use ndarray::Array2;
use serde::Serialize;
use tracing::debug;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::format::{self, Format};
use crate::grid::{LocalizationGrid, POINTS_PER_LINE};

use super::{invalid_channel, unpack_video, Direction, Metadata, PIXELS_PER_LINE};

/// Earth-location coordinates are signed 1E-4 degrees.
const EARTH_LOCATION_SCALE: f64 = 1e4;
/// Spacecraft altitude is unsigned tenths of a km.
const ALTITUDE_SCALE: f32 = 10.0;

/// Header-level radiance-to-temperature constants for one thermal channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermalConstants {
    pub central_wavenumber: f64,
    pub constant1: f64,
    pub constant2: f64,
}

/// Decoder for the KLM layout (NOAA 15 and later).
pub struct KlmDecoder<R: Read + Seek> {
    stream: R,
    meta: Metadata,
}

const FORMAT: Format = Format::Klm;

fn video_phase(channel: Channel) -> Option<usize> {
    // 3A and 3B share the band-3 slot and therefore the phase.
    match channel {
        Channel::Ch1 => Some(0),
        Channel::Ch3A | Channel::Ch3B => Some(1),
        Channel::Ch2 => Some(2),
        Channel::Ch4 => Some(3),
        Channel::Ch5 => Some(4),
        Channel::Ch3 => None,
    }
}

/// Word position of a channel within each 3-word back-scan telemetry cycle.
fn back_scan_offset(channel: Channel) -> Option<usize> {
    match channel {
        Channel::Ch3B => Some(0),
        Channel::Ch4 => Some(1),
        Channel::Ch5 => Some(2),
        _ => None,
    }
}

/// Word position of a channel within each 5-word space-data telemetry cycle.
fn space_data_offset(channel: Channel) -> Option<usize> {
    match channel {
        Channel::Ch1 => Some(0),
        Channel::Ch2 => Some(1),
        Channel::Ch3A | Channel::Ch3B => Some(2),
        Channel::Ch4 => Some(3),
        Channel::Ch5 => Some(4),
        Channel::Ch3 => None,
    }
}

impl<R: Read + Seek> KlmDecoder<R> {
    pub(super) fn new(mut stream: R) -> Result<Self> {
        let ars = format::tbm(FORMAT);
        let header = format::header(FORMAT);
        let data = format::data(FORMAT);
        let header_base = ars.size();
        let data_base = header_base + header.size();

        let spacecraft_code = ars.get("SPACECRAFT")?.read_string(&mut stream, 0)?;
        let spacecraft = crate::satellite::by_name(&spacecraft_code)?;

        let codec = FORMAT.header_date_codec();
        let start_time = header
            .get("START_TIME")?
            .read_date(&mut stream, header_base, codec)?;
        let end_time = header
            .get("END_TIME")?
            .read_date(&mut stream, header_base, codec)?;
        let scan_lines = header
            .get("DATA_RECORD_COUNT")?
            .read_u16(&mut stream, header_base)? as usize;
        if scan_lines == 0 {
            return Err(Error::NotEnoughBytes("data records"));
        }

        let location = data.get("EARTH_LOCATION")?;
        let latitude_field = Field::new(location.offset, 4);
        let stride = data.size();
        let first =
            f64::from(latitude_field.read_i32(&mut stream, data_base)?) / EARTH_LOCATION_SCALE;
        let last = f64::from(
            latitude_field.read_i32(&mut stream, data_base + (scan_lines as u64 - 1) * stride)?,
        ) / EARTH_LOCATION_SCALE;
        let direction = if first < last {
            Direction::SouthToNorth
        } else {
            Direction::NorthToSouth
        };

        let meta = Metadata {
            format: FORMAT,
            spacecraft,
            start_time,
            end_time,
            scan_lines,
            direction,
            dataset_name: header
                .get("DATA_SET_NAME")?
                .read_string(&mut stream, header_base)?,
            processing_block: ars.get("PROCESSING_BLOCK_ID")?.read_string(&mut stream, 0)?,
        };
        debug!(
            "bound KLM decoder: {} {} lines, {}",
            meta.spacecraft, meta.scan_lines, meta.direction
        );

        Ok(KlmDecoder { stream, meta })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn header_base(&self) -> u64 {
        format::tbm(FORMAT).size()
    }

    fn record_base(&self, line: usize) -> u64 {
        self.header_base() + format::header(FORMAT).size()
            + line as u64 * format::data(FORMAT).size()
    }

    /// Operational calibration grid (lines x 5) for a visible channel:
    /// slope 1, intercept 1, slope 2, intercept 2, intersection count.
    pub fn visible_calibration(&mut self, channel: Channel) -> Result<Array2<f64>> {
        let suffix = match channel {
            Channel::Ch1 => "CH1",
            Channel::Ch2 => "CH2",
            Channel::Ch3A => "CH3A",
            _ => {
                return Err(invalid_channel(
                    channel,
                    &[Channel::Ch1, Channel::Ch2, Channel::Ch3A],
                ))
            }
        };
        let data = format::data(FORMAT);
        let fields = [
            (data.get(&format!("SLOPE_1_{suffix}"))?, 1e7),
            (data.get(&format!("INTERCEPT_1_{suffix}"))?, 1e6),
            (data.get(&format!("SLOPE_2_{suffix}"))?, 1e7),
            (data.get(&format!("INTERCEPT_2_{suffix}"))?, 1e6),
            (data.get(&format!("INTERSECTION_{suffix}"))?, 1.0),
        ];

        let lines = self.meta.scan_lines;
        let mut grid = Array2::zeros((lines, 5));
        for line in 0..lines {
            let base = self.record_base(line);
            for (k, (field, scale)) in fields.iter().enumerate() {
                grid[[line, k]] = f64::from(field.read_i32(&mut self.stream, base)?) / scale;
            }
        }
        Ok(grid)
    }

    /// Operational radiance coefficient grid (lines x 3) for a thermal
    /// channel.
    pub fn thermal_calibration(&mut self, channel: Channel) -> Result<Array2<f64>> {
        let suffix = match channel {
            Channel::Ch3B => "CH3B",
            Channel::Ch4 => "CH4",
            Channel::Ch5 => "CH5",
            _ => {
                return Err(invalid_channel(
                    channel,
                    &[Channel::Ch3B, Channel::Ch4, Channel::Ch5],
                ))
            }
        };
        let data = format::data(FORMAT);
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

    /// Header central wavenumber and radiance constants for a thermal
    /// channel.
    pub fn thermal_constants(&mut self, channel: Channel) -> Result<ThermalConstants> {
        let (prefix, wavenumber_scale) = match channel {
            Channel::Ch3B => ("CH3B", 1e2),
            Channel::Ch4 => ("CH4", 1e3),
            Channel::Ch5 => ("CH5", 1e3),
            _ => {
                return Err(invalid_channel(
                    channel,
                    &[Channel::Ch3B, Channel::Ch4, Channel::Ch5],
                ))
            }
        };
        let header = format::header(FORMAT);
        let base = self.header_base();
        Ok(ThermalConstants {
            central_wavenumber: f64::from(
                header
                    .get(&format!("{prefix}_CENTRAL_WAVENUMBER"))?
                    .read_i32(&mut self.stream, base)?,
            ) / wavenumber_scale,
            constant1: f64::from(
                header
                    .get(&format!("{prefix}_CONSTANT1"))?
                    .read_i32(&mut self.stream, base)?,
            ) / 1e5,
            constant2: f64::from(
                header
                    .get(&format!("{prefix}_CONSTANT2"))?
                    .read_i32(&mut self.stream, base)?,
            ) / 1e6,
        })
    }

    /// Which of 3A/3B channel 3 was transmitting on a given scan line,
    /// from bit 7 of the digital-B word.
    pub fn channel3_state(&mut self, line: usize) -> Result<Channel> {
        let field = format::data(FORMAT).get("AVHRR_DIGITAL_B_DATA")?;
        let base = self.record_base(line);
        let word = field.read_u16(&mut self.stream, base)?;
        if (word >> 7) & 1 == 1 {
            Ok(Channel::Ch3B)
        } else {
            Ok(Channel::Ch3A)
        }
    }

    /// Unpack one channel's samples into a (lines x 2048) raster.
    ///
    /// For 3A and 3B, lines transmitted in the other band-3 state are left
    /// zero-filled rather than failing the read.
    pub fn read_channel(&mut self, channel: Channel) -> Result<Array2<u16>> {
        let Some(phase) = video_phase(channel) else {
            return Err(invalid_channel(channel, Channel::set_for(FORMAT)));
        };
        let video = format::data(FORMAT).get("VIDEO_DATA")?;
        let split_band = matches!(channel, Channel::Ch3A | Channel::Ch3B);

        let lines = self.meta.scan_lines;
        let mut skipped = 0usize;
        let mut raster = Array2::zeros((lines, PIXELS_PER_LINE));
        for line in 0..lines {
            if split_band && self.channel3_state(line)? != channel {
                skipped += 1;
                continue;
            }
            let base = self.record_base(line);
            let buf = video.read_bytes(&mut self.stream, base)?;
            let mut row = raster.row_mut(line);
            let row = row.as_slice_mut().expect("raster rows are contiguous");
            unpack_video(&buf, phase, row)?;
        }
        if skipped > 0 {
            debug!("channel {channel}: skipped {skipped} lines in the other band-3 state");
        }
        Ok(raster)
    }

    /// Back-scan telemetry words (lines x 10) for a thermal channel, for
    /// external recalibration.
    pub fn back_scan(&mut self, channel: Channel) -> Result<Array2<u16>> {
        let Some(offset) = back_scan_offset(channel) else {
            return Err(invalid_channel(
                channel,
                &[Channel::Ch3B, Channel::Ch4, Channel::Ch5],
            ));
        };
        self.telemetry_words("BACK_SCAN", offset, 3)
    }

    /// Space-view telemetry words (lines x 10) for a channel, for external
    /// recalibration.
    pub fn space_data(&mut self, channel: Channel) -> Result<Array2<u16>> {
        let Some(offset) = space_data_offset(channel) else {
            return Err(invalid_channel(channel, Channel::set_for(FORMAT)));
        };
        self.telemetry_words("SPACE_DATA", offset, 5)
    }

    /// Platinum resistance thermometer readings (lines x 5) for the
    /// internal calibration target.
    pub fn prt_readings(&mut self) -> Result<Array2<u16>> {
        self.telemetry_words("PRT_TELEMETRY", 0, 1)
    }

    /// Extract every `cycle`-th big-endian word of a telemetry field,
    /// starting at word `offset`, across all scan lines.
    fn telemetry_words(
        &mut self,
        name: &'static str,
        offset: usize,
        cycle: usize,
    ) -> Result<Array2<u16>> {
        let field = format::data(FORMAT).get(name)?;
        let words_per_line = field.size as usize / 2 / cycle;

        let lines = self.meta.scan_lines;
        let mut grid = Array2::zeros((lines, words_per_line));
        for line in 0..lines {
            let base = self.record_base(line);
            let buf = field.read_bytes(&mut self.stream, base)?;
            for k in 0..words_per_line {
                let at = (offset + k * cycle) * 2;
                grid[[line, k]] = u16::from_be_bytes([buf[at], buf[at + 1]]);
            }
        }
        Ok(grid)
    }

    /// Decode the localization grid with the per-line altitude field.
    pub fn localization_grid(&mut self) -> Result<LocalizationGrid> {
        let data = format::data(FORMAT);
        let time_code = data.get("TIME_CODE")?;
        let altitude = data.get("SPACECRAFT_ALTITUDE")?;
        let location = data.get("EARTH_LOCATION")?;
        let codec = FORMAT.data_date_codec();

        let lines = self.meta.scan_lines;
        let mut grid = LocalizationGrid::new(lines);
        for line in 0..lines {
            let base = self.record_base(line);
            let time = time_code.read_date(&mut self.stream, base, codec)?;
            grid.set_time(line, time.utc_millis());
            grid.set_altitude(
                line,
                f32::from(altitude.read_u16(&mut self.stream, base)?) / ALTITUDE_SCALE,
            );

            let buf = location.read_bytes(&mut self.stream, base)?;
            for point in 0..POINTS_PER_LINE {
                let at = point * 8;
                let lat = f64::from(i32::from_be_bytes([
                    buf[at],
                    buf[at + 1],
                    buf[at + 2],
                    buf[at + 3],
                ])) / EARTH_LOCATION_SCALE;
                let lon = f64::from(i32::from_be_bytes([
                    buf[at + 4],
                    buf[at + 5],
                    buf[at + 6],
                    buf[at + 7],
                ])) / EARTH_LOCATION_SCALE;
                grid.set_point(line, point, lon, lat);
            }
        }

        grid.remove_singularities();
        grid.check_time_monotonic()?;
        Ok(grid)
    }
}
