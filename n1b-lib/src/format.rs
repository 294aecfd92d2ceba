use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::field::{DateCodec, Field};

/// The N1B format generations this crate decodes.
///
/// `AjCanaries` is the AJ layout as archived by the Canaries receiving
/// station; its only behavioral difference is the time-code year base
/// ([DateCodec::V4] instead of [DateCodec::V3]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Format {
    Aj,
    AjCanaries,
    Klm,
}

impl Format {
    pub fn is_klm(&self) -> bool {
        matches!(self, Format::Klm)
    }

    /// Codec for the header start/stop time fields.
    pub fn header_date_codec(&self) -> DateCodec {
        match self {
            Format::Aj => DateCodec::V3,
            Format::AjCanaries => DateCodec::V4,
            Format::Klm => DateCodec::V1,
        }
    }

    /// Codec for the per-scan-line time code.
    pub fn data_date_codec(&self) -> DateCodec {
        match self {
            Format::Aj => DateCodec::V3,
            Format::AjCanaries => DateCodec::V4,
            Format::Klm => DateCodec::V2,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Aj => write!(f, "AJ"),
            Format::AjCanaries => write!(f, "AJ-Canaries"),
            Format::Klm => write!(f, "KLM"),
        }
    }
}

/// An ordered table of named fixed-offset fields making up one record
/// section (TBM/ARS block, header record or data record).
///
/// Offsets chain: each added field starts where the previous one ended,
/// plus an optional skip. Tables are built once (see [tbm], [header],
/// [data]) and never mutated afterward, so they are safe to share across
/// decoder instances and threads.
#[derive(Debug)]
pub struct SectionLayout {
    name: &'static str,
    fields: HashMap<&'static str, Field>,
    end: u64,
    size: u64,
}

impl SectionLayout {
    fn new(name: &'static str) -> Self {
        SectionLayout {
            name,
            fields: HashMap::default(),
            end: 0,
            size: 0,
        }
    }

    fn add(&mut self, name: &'static str, size: u32) -> &mut Self {
        self.add_skip(name, 0, size)
    }

    fn add_skip(&mut self, name: &'static str, skip: u64, size: u32) -> &mut Self {
        let offset = self.end + skip;
        let prev = self.fields.insert(name, Field::new(offset, size));
        assert!(
            prev.is_none(),
            "duplicate field {name} in section {}",
            self.name
        );
        self.end = offset + u64::from(size);
        self.size = self.size.max(self.end);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a field by name.
    ///
    /// # Errors
    /// [Error::FieldNotFound] when the section has no such field.
    pub fn get(&self, name: &str) -> Result<Field> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| Error::FieldNotFound {
                section: self.name.to_string(),
                name: name.to_string(),
            })
    }

    /// Total section byte length; the fixed record stride when scanning.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// TBM/ARS block table for a format.
pub fn tbm(format: Format) -> &'static SectionLayout {
    if format.is_klm() {
        &KLM_ARS
    } else {
        &AJ_TBM
    }
}

/// Header record table for a format.
pub fn header(format: Format) -> &'static SectionLayout {
    if format.is_klm() {
        &KLM_HEADER
    } else {
        &AJ_HEADER
    }
}

/// Data record table for a format.
pub fn data(format: Format) -> &'static SectionLayout {
    if format.is_klm() {
        &KLM_DATA
    } else {
        &AJ_DATA
    }
}

lazy_static! {
    static ref AJ_TBM: SectionLayout = build_tbm("AJ TBM", 2);
    static ref KLM_ARS: SectionLayout = build_tbm("KLM ARS", 392);
    static ref AJ_HEADER: SectionLayout = build_aj_header();
    static ref KLM_HEADER: SectionLayout = build_klm_header();
    static ref AJ_DATA: SectionLayout = build_aj_data();
    static ref KLM_DATA: SectionLayout = build_klm_data();
}

/// The TBM block and the KLM ARS block share the 122-byte TBM layout; the
/// ARS block pads it out to 512 bytes. The leading dataset-name characters
/// are cataloged as their components (`NSS.LHRR.NJ.D99310.S1057.E1112.
/// B2632021.GC`), with the separator dots skipped.
fn build_tbm(name: &'static str, trailing: u32) -> SectionLayout {
    let mut s = SectionLayout::new(name);
    s.add_skip("PROCESSING_CENTER", 30, 3)
        .add_skip("DATA_TYPE", 1, 4)
        .add_skip("SPACECRAFT", 1, 2)
        .add_skip("START_YEAR_DAY", 1, 6)
        .add_skip("START_TIME", 1, 5)
        .add_skip("END_TIME", 1, 5)
        .add_skip("PROCESSING_BLOCK_ID", 1, 8)
        .add_skip("SOURCE", 1, 2)
        .add_skip("SELECT_FLAG", 2, 2)
        .add("BEGINNING_LATITUDE", 3)
        .add("ENDING_LATITUDE", 3)
        .add("BEGINNING_LONGITUDE", 4)
        .add("ENDING_LONGITUDE", 4)
        .add("START_HOUR", 2)
        .add("START_MINUTE", 2)
        .add("NUMBER_OF_MINUTES", 3)
        .add("APPENDED_DATA_FLAG", 1)
        .add("CHANNEL_SELECT", 20)
        .add("SENSOR_DATA_WORD_SIZE", 2)
        .add("SPARE", trailing);
    s
}

fn build_aj_header() -> SectionLayout {
    let mut s = SectionLayout::new("AJ header");
    s.add("SPACECRAFT_ID", 1)
        .add("DATA_TYPE", 1)
        .add("START_TIME", 6)
        .add_skip("NUMBER_OF_SCANS", 2, 2)
        .add("END_TIME", 6)
        .add("PROCESSING_BLOCK_ID", 7)
        .add("RAMP_CALIBRATION", 1)
        .add("NUMBER_OF_DATA_GAPS", 2)
        .add("DACS_QUALITY", 6)
        .add("CALIBRATION_PARAMETER_ID", 2)
        .add("DACS_STATUS", 1)
        .add_skip("ATTITUDE_CORRECTION", 1, 1)
        .add("NADIR_LOCATION_TOLERANCE", 1)
        .add("DATA_SET_NAME", 44)
        .add("EPOCH_YEAR", 2)
        .add("EPOCH_DAY", 2)
        .add("EPOCH_TIME", 4)
        .add("SEMI_MAJOR_AXIS", 4)
        .add("ECCENTRICITY", 4)
        .add("INCLINATION", 4)
        .add("ARGUMENT_OF_PERIGEE", 4)
        .add("RIGHT_ASCENSION", 4)
        .add("MEAN_ANOMALY", 4)
        .add("CARTESIAN_X", 4)
        .add("CARTESIAN_Y", 4)
        .add("CARTESIAN_Z", 4)
        .add("CARTESIAN_X_DOT", 4)
        .add("CARTESIAN_Y_DOT", 4)
        .add("CARTESIAN_Z_DOT", 4)
        .add("SPARE", 14660);
    s
}

fn build_klm_header() -> SectionLayout {
    let mut s = SectionLayout::new("KLM header");
    s.add("DATA_SET_CREATION_SITE", 3)
        .add_skip("FORMAT_VERSION", 1, 2)
        .add("FORMAT_VERSION_YEAR", 2)
        .add("FORMAT_VERSION_DAY", 2)
        .add("LOGICAL_RECORD_LENGTH", 2)
        .add("BLOCK_SIZE", 2)
        .add("HEADER_RECORD_COUNT", 2)
        .add_skip("DATA_SET_NAME", 6, 42)
        .add("PROCESSING_BLOCK_ID", 8)
        .add("SPACECRAFT_ID", 2)
        .add("INSTRUMENT_ID", 2)
        .add("DATA_TYPE", 2)
        .add("TIP_SOURCE", 2)
        .add("START_DAY_COUNT", 4)
        .add("START_TIME", 8)
        .add("END_DAY_COUNT", 4)
        .add("END_TIME", 8)
        .add_skip("DATA_RECORD_COUNT", 24, 2)
        .add("CALIBRATED_SCANS_COUNT", 2)
        .add("MISSING_LINES_COUNT", 2)
        .add("DATA_GAPS_COUNT", 2)
        .add_skip("CH3B_CENTRAL_WAVENUMBER", 144, 4)
        .add("CH3B_CONSTANT1", 4)
        .add("CH3B_CONSTANT2", 4)
        .add("CH4_CENTRAL_WAVENUMBER", 4)
        .add("CH4_CONSTANT1", 4)
        .add("CH4_CONSTANT2", 4)
        .add("CH5_CENTRAL_WAVENUMBER", 4)
        .add("CH5_CONSTANT1", 4)
        .add("CH5_CONSTANT2", 4)
        .add_skip("REFERENCE_ELLIPSOID", 12, 8)
        .add("SPARE", 15536);
    s
}

fn build_aj_data() -> SectionLayout {
    let mut s = SectionLayout::new("AJ data");
    s.add("SCAN_LINE_NUMBER", 2)
        .add("TIME_CODE", 6)
        .add("QUALITY_INDICATORS", 4)
        .add("SLOPE_CH1", 4)
        .add("INTERCEPT_CH1", 4)
        .add("SLOPE_CH2", 4)
        .add("INTERCEPT_CH2", 4)
        .add("SLOPE_CH3", 4)
        .add("INTERCEPT_CH3", 4)
        .add("IR_COEFFICIENT_1_CH4", 4)
        .add("IR_COEFFICIENT_2_CH4", 4)
        .add("IR_COEFFICIENT_3_CH4", 4)
        .add("IR_COEFFICIENT_1_CH5", 4)
        .add("IR_COEFFICIENT_2_CH5", 4)
        .add("IR_COEFFICIENT_3_CH5", 4)
        .add("SOLAR_ZENITH_COUNT", 1)
        .add("SOLAR_ZENITH_ANGLES", 51)
        .add("EARTH_LOCATION", 204)
        .add("TELEMETRY", 140)
        .add("VIDEO_DATA", 13656)
        .add("CLOCK_DRIFT_DELTA", 2)
        .add("SPARE", 686);
    s
}

fn build_klm_data() -> SectionLayout {
    let mut s = SectionLayout::new("KLM data");
    s.add("SCAN_LINE_NUMBER", 2)
        .add("TIME_CODE", 10)
        .add("SCAN_LINE_BIT_FIELD", 2)
        .add_skip("QUALITY_INDICATOR_BIT_FIELD", 10, 4)
        .add("SCAN_LINE_QUALITY_FLAGS", 4)
        .add("CALIBRATION_QUALITY_FLAGS", 6)
        .add("FRAME_SYNC_ERROR_COUNT", 2)
        .add_skip("SLOPE_1_CH1", 8, 4)
        .add("INTERCEPT_1_CH1", 4)
        .add("SLOPE_2_CH1", 4)
        .add("INTERCEPT_2_CH1", 4)
        .add("INTERSECTION_CH1", 4)
        .add("SLOPE_1_CH2", 4)
        .add("INTERCEPT_1_CH2", 4)
        .add("SLOPE_2_CH2", 4)
        .add("INTERCEPT_2_CH2", 4)
        .add("INTERSECTION_CH2", 4)
        .add("SLOPE_1_CH3A", 4)
        .add("INTERCEPT_1_CH3A", 4)
        .add("SLOPE_2_CH3A", 4)
        .add("INTERCEPT_2_CH3A", 4)
        .add("INTERSECTION_CH3A", 4)
        .add_skip("IR_COEFFICIENT_1_CH3B", 120, 4)
        .add("IR_COEFFICIENT_2_CH3B", 4)
        .add("IR_COEFFICIENT_3_CH3B", 4)
        .add("IR_COEFFICIENT_1_CH4", 4)
        .add("IR_COEFFICIENT_2_CH4", 4)
        .add("IR_COEFFICIENT_3_CH4", 4)
        .add("IR_COEFFICIENT_1_CH5", 4)
        .add("IR_COEFFICIENT_2_CH5", 4)
        .add("IR_COEFFICIENT_3_CH5", 4)
        .add_skip("NAVIGATION_STATUS", 40, 4)
        .add_skip("SPACECRAFT_ALTITUDE", 18, 2)
        .add("ANGULAR_RELATIONSHIPS", 306)
        .add_skip("EARTH_LOCATION", 6, 408)
        .add_skip("AVHRR_DIGITAL_B_DATA", 8, 2)
        .add_skip("VIDEO_DATA", 206, 13720)
        .add("BACK_SCAN", 60)
        .add("SPACE_DATA", 100)
        .add("PRT_TELEMETRY", 10)
        .add("SPARE", 718);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_chain() {
        let mut s = SectionLayout::new("test");
        s.add("a", 4).add("b", 2).add_skip("c", 3, 5);
        assert_eq!(s.get("a").unwrap(), Field::new(0, 4));
        assert_eq!(s.get("b").unwrap(), Field::new(4, 2));
        assert_eq!(s.get("c").unwrap(), Field::new(9, 5));
        assert_eq!(s.size(), 14);
    }

    #[test]
    #[should_panic(expected = "duplicate field")]
    fn test_duplicate_name_panics() {
        let mut s = SectionLayout::new("test");
        s.add("a", 4).add("a", 2);
    }

    #[test]
    fn test_get_missing() {
        let s = SectionLayout::new("empty");
        assert!(matches!(
            s.get("nope"),
            Err(Error::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_section_sizes() {
        assert_eq!(tbm(Format::Aj).size(), 122);
        assert_eq!(tbm(Format::AjCanaries).size(), 122);
        assert_eq!(tbm(Format::Klm).size(), 512);
        assert_eq!(header(Format::Aj).size(), 14800);
        assert_eq!(data(Format::Aj).size(), 14800);
        assert_eq!(header(Format::Klm).size(), 15872);
        assert_eq!(data(Format::Klm).size(), 15872);
    }

    #[test]
    fn test_known_offsets() {
        // spot checks against the published record layouts
        assert_eq!(tbm(Format::Aj).get("SPACECRAFT").unwrap().offset, 39);
        assert_eq!(header(Format::Klm).get("SPACECRAFT_ID").unwrap().offset, 72);
        assert_eq!(header(Format::Klm).get("START_TIME").unwrap().offset, 84);
        assert_eq!(
            header(Format::Klm).get("DATA_RECORD_COUNT").unwrap().offset,
            128
        );
        assert_eq!(header(Format::Aj).get("NUMBER_OF_SCANS").unwrap().offset, 10);
        assert_eq!(
            data(Format::Klm)
                .get("SPACECRAFT_ALTITUDE")
                .unwrap()
                .offset,
            326
        );
        assert_eq!(data(Format::Klm).get("EARTH_LOCATION").unwrap().offset, 640);
        assert_eq!(data(Format::Klm).get("VIDEO_DATA").unwrap().offset, 1264);
    }

    #[test]
    fn test_date_codecs_per_format() {
        assert_eq!(Format::Aj.header_date_codec(), DateCodec::V3);
        assert_eq!(Format::AjCanaries.header_date_codec(), DateCodec::V4);
        assert_eq!(Format::Klm.header_date_codec(), DateCodec::V1);
        assert_eq!(Format::Klm.data_date_codec(), DateCodec::V2);
    }
}
