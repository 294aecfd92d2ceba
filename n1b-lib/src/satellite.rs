use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::{Error, Result};

/// One NOAA polar orbiter.
///
/// `id` is the NOAA mission number, which doubles as the registry index.
/// `code` is the two-letter spacecraft code found in the TBM/ARS dataset
/// name ("NJ" for NOAA 14, "NL" for NOAA 16, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Satellite {
    pub id: u8,
    pub code: &'static str,
    pub name: &'static str,
}

impl Satellite {
    /// Spacecraft from NOAA 15 on fly the AVHRR/3 instrument and downlink
    /// the KLM record layout; everything older is the POD (AJ) family.
    pub fn is_klm(&self) -> bool {
        self.id >= 15
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

const REGISTRY_LEN: usize = 18;

lazy_static! {
    static ref REGISTRY: [Option<Satellite>; REGISTRY_LEN] = {
        let mut table: [Option<Satellite>; REGISTRY_LEN] = [None; REGISTRY_LEN];
        for (id, code) in [
            (6u8, "NA"),
            (7, "NC"),
            (8, "NE"),
            (9, "NF"),
            (10, "NG"),
            (11, "NH"),
            (12, "ND"),
            (13, "NI"),
            (14, "NJ"),
            (15, "NK"),
            (16, "NL"),
            (17, "NM"),
        ] {
            let name: &'static str = Box::leak(format!("NOAA {id}").into_boxed_str());
            table[id as usize] = Some(Satellite { id, code, name });
        }
        table
    };
}

/// Look up a satellite by NOAA mission number.
///
/// # Errors
/// [Error::UnknownSatellite] for ids outside the registry or never flown.
pub fn by_id(id: usize) -> Result<&'static Satellite> {
    REGISTRY
        .get(id)
        .and_then(|entry| entry.as_ref())
        .ok_or_else(|| Error::UnknownSatellite(id.to_string()))
}

/// Look up a satellite by display name or two-letter code,
/// case-insensitive and trimmed.
pub fn by_name(name: &str) -> Result<&'static Satellite> {
    let wanted = name.trim();
    REGISTRY
        .iter()
        .flatten()
        .find(|sat| sat.name.eq_ignore_ascii_case(wanted) || sat.code.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| Error::UnknownSatellite(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_return_the_same_entry() {
        let by_id = by_id(16).unwrap();
        let by_full_name = by_name(" noaa 16 ").unwrap();
        let by_code = by_name("nl").unwrap();
        assert!(std::ptr::eq(by_id, by_full_name));
        assert!(std::ptr::eq(by_id, by_code));
        assert_eq!(by_id.code, "NL");
    }

    #[test]
    fn test_missing_ids() {
        assert!(matches!(by_id(99), Err(Error::UnknownSatellite(_))));
        assert!(matches!(by_id(5), Err(Error::UnknownSatellite(_))));
        assert!(matches!(by_name("METOP-A"), Err(Error::UnknownSatellite(_))));
    }

    #[test]
    fn test_family_split() {
        assert!(!by_id(14).unwrap().is_klm());
        assert!(by_id(15).unwrap().is_klm());
        assert!(by_id(17).unwrap().is_klm());
    }
}
