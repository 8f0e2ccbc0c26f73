use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Order in which a conversation's shards are enumerated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Oldest shard first.
    Ascending,
    /// Newest shard first.
    Descending,
}

impl ScanDirection {
    pub fn reversed(self) -> Self {
        match self {
            ScanDirection::Ascending => ScanDirection::Descending,
            ScanDirection::Descending => ScanDirection::Ascending,
        }
    }
}

/// Sort-order form: `1` ascending, `-1` descending.
impl TryFrom<i64> for ScanDirection {
    type Error = TypeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ScanDirection::Ascending),
            -1 => Ok(ScanDirection::Descending),
            other => Err(TypeError::InvalidDirection(other.to_string())),
        }
    }
}

impl FromStr for ScanDirection {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" | "ascending" => Ok(ScanDirection::Ascending),
            "desc" | "descending" => Ok(ScanDirection::Descending),
            other => Err(TypeError::InvalidDirection(other.to_owned())),
        }
    }
}

impl fmt::Display for ScanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanDirection::Ascending => "ascending",
            ScanDirection::Descending => "descending",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_conversion() {
        assert_eq!(ScanDirection::try_from(1).unwrap(), ScanDirection::Ascending);
        assert_eq!(ScanDirection::try_from(-1).unwrap(), ScanDirection::Descending);
        for bad in [0, 2, -2, i64::MIN] {
            assert!(matches!(
                ScanDirection::try_from(bad),
                Err(TypeError::InvalidDirection(_))
            ));
        }
    }

    #[test]
    fn parse_names() {
        assert_eq!("asc".parse::<ScanDirection>().unwrap(), ScanDirection::Ascending);
        assert_eq!("descending".parse::<ScanDirection>().unwrap(), ScanDirection::Descending);
        assert!("sideways".parse::<ScanDirection>().is_err());
    }

    #[test]
    fn reversed_flips() {
        assert_eq!(ScanDirection::Ascending.reversed(), ScanDirection::Descending);
    }
}
