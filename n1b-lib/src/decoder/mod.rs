mod klm;
mod pod;

use std::io::{Read, Seek, SeekFrom};

use ndarray::Array2;
use serde::Serialize;

pub use klm::{KlmDecoder, ThermalConstants};
pub use pod::PodDecoder;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::grid::LocalizationGrid;
use crate::satellite::Satellite;
use crate::time::Time;

/// Samples per scan line.
pub const PIXELS_PER_LINE: usize = 2048;

/// Ground-track direction of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    NorthToSouth,
    SouthToNorth,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::NorthToSouth => write!(f, "North-South"),
            Direction::SouthToNorth => write!(f, "South-North"),
        }
    }
}

/// Acquisition metadata, fully decoded when the decoder binds its stream.
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub format: Format,
    pub spacecraft: &'static Satellite,
    pub start_time: Time,
    pub end_time: Time,
    /// Scan line count; bounds every per-line loop.
    pub scan_lines: usize,
    pub direction: Direction,
    pub dataset_name: String,
    pub processing_block: String,
}

/// Identify the format variant from the first 14 bytes of the stream.
///
/// All-0x00 is AJ, all-0x20 AJ-Canaries, all-0x30 KLM. The check is known
/// to be fragile but matches what the receiving stations actually emit;
/// anything cleverer would change which archives decode. Zero or multiple
/// matches fail closed.
pub fn detect<R: Read + Seek>(stream: &mut R) -> Result<Format> {
    stream.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 14];
    stream.read_exact(&mut magic)?;
    classify(
        &magic,
        &[
            (0x00, Format::Aj),
            (0x20, Format::AjCanaries),
            (0x30, Format::Klm),
        ],
    )
}

fn classify(magic: &[u8; 14], patterns: &[(u8, Format)]) -> Result<Format> {
    let mut matched = Vec::new();
    for (byte, format) in patterns {
        if magic.iter().all(|b| b == byte) {
            matched.push(*format);
        }
    }
    match matched.as_slice() {
        [format] => Ok(*format),
        [] => Err(Error::UnknownFormat),
        _ => Err(Error::AmbiguousFormat),
    }
}

/// A decoder for one open N1B stream, detected and bound by [open].
pub enum Decoder<R: Read + Seek> {
    Pod(PodDecoder<R>),
    Klm(KlmDecoder<R>),
}

/// Detect the format of `stream` and bind a decoder to it.
///
/// Metadata is parsed here, exactly once; a failure leaves no usable
/// decoder behind.
pub fn open<R: Read + Seek>(mut stream: R) -> Result<Decoder<R>> {
    match detect(&mut stream)? {
        Format::Klm => Ok(Decoder::Klm(KlmDecoder::new(stream)?)),
        format => Ok(Decoder::Pod(PodDecoder::new(stream, format)?)),
    }
}

impl<R: Read + Seek> Decoder<R> {
    pub fn format(&self) -> Format {
        match self {
            Decoder::Pod(d) => d.format(),
            Decoder::Klm(_) => Format::Klm,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Decoder::Pod(d) => d.metadata(),
            Decoder::Klm(d) => d.metadata(),
        }
    }

    pub fn channels(&self) -> &'static [Channel] {
        Channel::set_for(self.format())
    }

    /// Extract one channel's samples as a (scan_lines x 2048) raster.
    ///
    /// Only image index 0 exists in an N1B file; the index argument mirrors
    /// the multi-image reader interface upstream consumers expect.
    pub fn read_channel(&mut self, image_index: usize, channel: Channel) -> Result<Array2<u16>> {
        if image_index != 0 {
            return Err(Error::ImageIndexOutOfRange(image_index));
        }
        match self {
            Decoder::Pod(d) => d.read_channel(channel),
            Decoder::Klm(d) => d.read_channel(channel),
        }
    }

    /// Per-line slope/intercept-style coefficients for a visible channel.
    pub fn visible_calibration(&mut self, channel: Channel) -> Result<Array2<f64>> {
        match self {
            Decoder::Pod(d) => d.visible_calibration(channel),
            Decoder::Klm(d) => d.visible_calibration(channel),
        }
    }

    /// Per-line (a0, a1, a2) radiance coefficients for a thermal channel.
    pub fn thermal_calibration(&mut self, channel: Channel) -> Result<Array2<f64>> {
        match self {
            Decoder::Pod(d) => d.thermal_calibration(channel),
            Decoder::Klm(d) => d.thermal_calibration(channel),
        }
    }

    /// Decode the control-point grid, repair singularities, and verify the
    /// per-line time sequence.
    pub fn localization_grid(&mut self) -> Result<LocalizationGrid> {
        match self {
            Decoder::Pod(d) => d.localization_grid(),
            Decoder::Klm(d) => d.localization_grid(),
        }
    }
}

/// The 5-step packed-video cycle.
///
/// Each step consumes one big-endian 4-byte word; steps 0, 1 and 3 emit the
/// 10-bit field at shifts 20, 10 and 0 respectively, steps 2 and 4 emit
/// nothing. A channel enters the cycle at its fixed phase (see the variant
/// phase tables); these positions are as published for the transmission
/// frame and are not derivable from the record layout.
const VIDEO_CYCLE: [Option<u32>; 5] = [Some(20), Some(10), None, Some(0), None];

/// Unpack `out.len()` 10-bit samples for the channel phase `phase` from the
/// packed video field of one scan line.
pub(crate) fn unpack_video(buf: &[u8], phase: usize, out: &mut [u16]) -> Result<()> {
    debug_assert!(phase < VIDEO_CYCLE.len());
    let mut words = buf.chunks_exact(4);
    let mut step = phase;
    let mut filled = 0;
    while filled < out.len() {
        let word = words
            .next()
            .ok_or(Error::NotEnoughBytes("packed video field"))?;
        let word = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        if let Some(shift) = VIDEO_CYCLE[step] {
            out[filled] = ((word >> shift) & 0x3FF) as u16;
            filled += 1;
        }
        step = (step + 1) % VIDEO_CYCLE.len();
    }
    Ok(())
}

pub(crate) fn invalid_channel(got: Channel, valid: &[Channel]) -> Error {
    Error::InvalidChannel {
        got: got.label().to_string(),
        valid: Channel::list(valid),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn header_of(byte: u8) -> Cursor<Vec<u8>> {
        Cursor::new(vec![byte; 32])
    }

    #[test]
    fn test_detect_variants() {
        assert_eq!(detect(&mut header_of(0x00)).unwrap(), Format::Aj);
        assert_eq!(detect(&mut header_of(0x20)).unwrap(), Format::AjCanaries);
        assert_eq!(detect(&mut header_of(0x30)).unwrap(), Format::Klm);
    }

    #[test]
    fn test_detect_rejects_mixed() {
        let mut stream = Cursor::new(b"NSS.LHRR.NJ.D99310.S1057".to_vec());
        assert!(matches!(detect(&mut stream), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_classify_fails_closed_on_multiple_matches() {
        // not reachable through the real pattern table, which is the point:
        // a double match must never silently pick a winner
        let magic = [0x20u8; 14];
        assert!(matches!(
            classify(&magic, &[(0x20, Format::Aj), (0x20, Format::Klm)]),
            Err(Error::AmbiguousFormat)
        ));
    }

    #[test]
    fn test_detect_rejects_short() {
        let mut stream = Cursor::new(vec![0u8; 4]);
        assert!(matches!(detect(&mut stream), Err(Error::Io(_))));
    }

    #[test]
    fn test_unpack_phase0() {
        // one word holding 10-bit values 0x2AA / 0x155 / 0x0F0 at shifts 20/10/0
        let word: u32 = (0x2AA << 20) | (0x155 << 10) | 0x0F0;
        let buf: Vec<u8> = word.to_be_bytes().repeat(8);
        let mut out = [0u16; 3];
        unpack_video(&buf, 0, &mut out).unwrap();
        assert_eq!(out, [0x2AA, 0x155, 0x0F0]);
    }

    #[test]
    fn test_unpack_phases_skip_without_emitting() {
        // five distinct words; emitting steps pick words 0, 1 and 3
        let mut buf = Vec::new();
        for w in 1u32..=5 {
            buf.extend_from_slice(&(w << 20 | w << 10 | w).to_be_bytes());
        }
        let mut out = [0u16; 3];
        unpack_video(&buf, 0, &mut out).unwrap();
        assert_eq!(out, [1, 2, 4]);

        // phase 2 starts on a skip step: first sample comes from word 1
        buf.extend(std::iter::repeat(0u8).take(20));
        let mut out = [0u16; 2];
        unpack_video(&buf, 2, &mut out).unwrap();
        assert_eq!(out, [2, 4]);
    }

    #[test]
    fn test_unpack_exhaustion_is_an_error() {
        let buf = [0u8; 8]; // two words only
        let mut out = [0u16; 3];
        assert!(matches!(
            unpack_video(&buf, 0, &mut out),
            Err(Error::NotEnoughBytes(_))
        ));
    }
}
