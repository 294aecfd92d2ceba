use serde::Serialize;

use crate::error::Error;
use crate::format::Format;

/// The AVHRR sensor channels.
///
/// The POD-era instrument carries channels 1-5; the KLM-era AVHRR/3 splits
/// channel 3 into 3A (1.6 um, daytime) and 3B (3.7 um, nighttime), switched
/// per scan line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch3A,
    Ch3B,
    Ch4,
    Ch5,
}

impl Channel {
    /// Thermal (infrared) channels are calibrated with the 3-coefficient
    /// radiance grids; all others use slope/intercept.
    pub fn is_thermal(&self) -> bool {
        matches!(self, Channel::Ch3B | Channel::Ch4 | Channel::Ch5)
    }

    /// The channel set carried by a format.
    pub fn set_for(format: Format) -> &'static [Channel] {
        if format.is_klm() {
            &[
                Channel::Ch1,
                Channel::Ch2,
                Channel::Ch3A,
                Channel::Ch3B,
                Channel::Ch4,
                Channel::Ch5,
            ]
        } else {
            &[
                Channel::Ch1,
                Channel::Ch2,
                Channel::Ch3,
                Channel::Ch4,
                Channel::Ch5,
            ]
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Ch1 => "1",
            Channel::Ch2 => "2",
            Channel::Ch3 => "3",
            Channel::Ch3A => "3A",
            Channel::Ch3B => "3B",
            Channel::Ch4 => "4",
            Channel::Ch5 => "5",
        }
    }

    pub(crate) fn list(channels: &[Channel]) -> String {
        channels
            .iter()
            .map(Channel::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1" => Ok(Channel::Ch1),
            "2" => Ok(Channel::Ch2),
            "3" => Ok(Channel::Ch3),
            "3A" => Ok(Channel::Ch3A),
            "3B" => Ok(Channel::Ch3B),
            "4" => Ok(Channel::Ch4),
            "5" => Ok(Channel::Ch5),
            other => Err(Error::InvalidChannel {
                got: other.to_string(),
                valid: "1, 2, 3, 3A, 3B, 4, 5".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thermal_classification() {
        for ch in Channel::set_for(Format::Klm) {
            assert_eq!(
                ch.is_thermal(),
                matches!(ch, Channel::Ch3B | Channel::Ch4 | Channel::Ch5),
                "channel {ch}"
            );
        }
    }

    #[test]
    fn test_aj_set_has_single_channel_3() {
        let set = Channel::set_for(Format::Aj);
        assert_eq!(set.len(), 5);
        assert!(set.contains(&Channel::Ch3));
        assert!(!set.contains(&Channel::Ch3A));
        assert!(!set.contains(&Channel::Ch3B));
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(" 3a ".parse::<Channel>().unwrap(), Channel::Ch3A);
        assert!("6".parse::<Channel>().is_err());
    }
}
