//! Win patterns and the immutable audit record of a bingo claim.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::CardId;
use super::id::{GameId, PlayerId, RoomId};

/// A named rule defining which cells must be marked to win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinPattern {
    /// All 24 non-free cells.
    FullHouse,
    /// Any single row.
    Row,
    /// Any single column.
    Column,
    /// Either diagonal.
    Diagonal,
    /// All four corners.
    Corners,
    /// Any row, column, or diagonal.
    Line,
    /// A line or the four corners.
    LineAndCorners,
}

impl WinPattern {
    /// Wire name of the pattern.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullHouse => "FULL_HOUSE",
            Self::Row => "ROW",
            Self::Column => "COLUMN",
            Self::Diagonal => "DIAGONAL",
            Self::Corners => "CORNERS",
            Self::Line => "LINE",
            Self::LineAndCorners => "LINE_AND_CORNERS",
        }
    }
}

impl fmt::Display for WinPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WinPattern {
    type Err = String;

    /// Parse a pattern name, case-insensitively; `-` and spaces count as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "FULL_HOUSE" => Ok(Self::FullHouse),
            "ROW" => Ok(Self::Row),
            "COLUMN" => Ok(Self::Column),
            "DIAGONAL" => Ok(Self::Diagonal),
            "CORNERS" => Ok(Self::Corners),
            "LINE" => Ok(Self::Line),
            "LINE_AND_CORNERS" => Ok(Self::LineAndCorners),
            _ => Err(format!("Unknown win pattern: '{s}'")),
        }
    }
}

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimOutcome {
    /// The claim won the game.
    Won,
    /// The claim was rejected.
    Rejected,
}

impl ClaimOutcome {
    /// Wire name of the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Won => "WON",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Audit entry for one win or invalid-claim attempt. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Game the claim targeted.
    pub game_id: GameId,
    /// Room hosting the game.
    pub room_id: RoomId,
    /// Claimed card.
    pub card_id: CardId,
    /// Claimant.
    pub player_id: PlayerId,
    /// Claimant display name.
    pub player_name: String,
    /// Requested pattern as sent, kept verbatim for unknown names.
    pub pattern: String,
    /// Marked numbers submitted with the claim.
    pub marked_numbers: BTreeSet<u8>,
    /// Outcome of the claim.
    pub outcome: ClaimOutcome,
    /// Rejection code, if rejected.
    pub error: Option<String>,
    /// When the claim was recorded.
    pub created_at: DateTime<Utc>,
}

impl ClaimRecord {
    /// Whether the claim won.
    pub fn is_win(&self) -> bool {
        self.outcome == ClaimOutcome::Won
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_parse_is_case_insensitive() {
        assert_eq!("full_house".parse::<WinPattern>().unwrap(), WinPattern::FullHouse);
        assert_eq!("Line-And-Corners".parse::<WinPattern>().unwrap(), WinPattern::LineAndCorners);
        assert_eq!(" row ".parse::<WinPattern>().unwrap(), WinPattern::Row);
    }

    #[test]
    fn test_unknown_pattern_rejected() {
        assert!("X_SHAPE".parse::<WinPattern>().is_err());
        assert!("".parse::<WinPattern>().is_err());
    }

    #[test]
    fn test_pattern_serde_uses_wire_name() {
        let json = serde_json::to_string(&WinPattern::LineAndCorners).unwrap();
        assert_eq!(json, "\"LINE_AND_CORNERS\"");
    }
}
