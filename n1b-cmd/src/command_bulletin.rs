use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use hifitime::Epoch;

use n1b::{OrbitBulletin, Time};

pub fn bulletin(input: PathBuf, at: Option<String>) -> Result<()> {
    let bulletin = OrbitBulletin::open(&input)?;

    for (name, value) in bulletin.meta_fields() {
        println!("{name}: {value}");
    }
    println!("RECORDS: {}", bulletin.records().len());

    if let Some(at) = at {
        let epoch =
            Epoch::from_str(&at).map_err(|e| anyhow!("unparseable timestamp {at:?}: {e}"))?;
        let time = Time::from_epoch(epoch);
        let position = bulletin.geographic_coordinate(&time)?;
        println!("POSITION AT {time}: {position}");
    }

    Ok(())
}
