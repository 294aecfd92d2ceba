use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use n1b::Channel;

pub fn dump(input: PathBuf, channel: Channel, output: Option<PathBuf>) -> Result<()> {
    let file = File::open(&input).with_context(|| format!("opening {input:?}"))?;
    let mut decoder = n1b::open(BufReader::new(file))?;
    let raster = decoder.read_channel(0, channel)?;

    let (min, max) = raster
        .iter()
        .fold((u16::MAX, u16::MIN), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    info!(
        "channel {channel}: {} lines x {} samples, values in [{min}, {max}]",
        raster.nrows(),
        raster.ncols()
    );

    let output = output.unwrap_or_else(|| input.with_extension(format!("ch{channel}.raw")));
    let mut writer = BufWriter::new(
        File::create(&output).with_context(|| format!("creating {output:?}"))?,
    );
    for sample in raster.iter() {
        writer.write_all(&sample.to_be_bytes())?;
    }
    writer.flush()?;
    info!("saved {output:?}");

    Ok(())
}
