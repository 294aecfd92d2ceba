use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

pub fn info<P: AsRef<Path>>(input: P) -> Result<()> {
    let file = File::open(&input).with_context(|| format!("opening {:?}", input.as_ref()))?;
    let decoder = n1b::open(BufReader::new(file))?;

    print!("{}", serde_json::to_string_pretty(decoder.metadata())?);

    Ok(())
}
