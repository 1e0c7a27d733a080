use serde::{Deserialize, Serialize};

/// Health of a collateral or of the basket as a whole.
///
/// Ordered from best to worst, so `max` over a set yields the worst status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CollateralStatus {
    Sound,
    Iffy,
    Disabled,
}

impl CollateralStatus {
    /// Decode the protocol's on-chain enum ordinal.
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(CollateralStatus::Sound),
            1 => Some(CollateralStatus::Iffy),
            2 => Some(CollateralStatus::Disabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollateralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollateralStatus::Sound => write!(f, "SOUND"),
            CollateralStatus::Iffy => write!(f, "IFFY"),
            CollateralStatus::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// Auction mechanism a trader launches revenue trades with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    DutchAuction,
    BatchAuction,
}

impl TradeKind {
    /// The protocol's on-chain enum ordinal.
    pub fn ordinal(self) -> u8 {
        match self {
            TradeKind::DutchAuction => 0,
            TradeKind::BatchAuction => 1,
        }
    }
}

impl std::str::FromStr for TradeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dutch" | "dutch_auction" => Ok(TradeKind::DutchAuction),
            "batch" | "batch_auction" => Ok(TradeKind::BatchAuction),
            other => Err(format!("unknown trade kind: {other}")),
        }
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeKind::DutchAuction => write!(f, "dutch_auction"),
            TradeKind::BatchAuction => write!(f, "batch_auction"),
        }
    }
}
