//! Modulation Labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Modulation scheme detected by a classifier.
///
/// Declaration order is significant: majority votes break ties in favour of
/// the variant declared first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModType {
    #[serde(rename = "AM_DSB_FC")]
    AmDsbFc,
    #[serde(rename = "AM_DSB_SC")]
    AmDsbSc,
    #[serde(rename = "AM_USB_FC")]
    AmUsbFc,
    #[serde(rename = "AM_USB_SC")]
    AmUsbSc,
    #[serde(rename = "AM_LSB_FC")]
    AmLsbFc,
    #[serde(rename = "AM_LSB_SC")]
    AmLsbSc,
    #[serde(rename = "FM")]
    Fm,
    #[serde(rename = "MPSK")]
    Mpsk,
    #[serde(rename = "PSK_2")]
    Psk2,
    #[serde(rename = "MASK")]
    Mask,
    #[serde(rename = "ASK_2")]
    Ask2,
    #[serde(rename = "MQAM")]
    Mqam,
}

/// Label text that does not name a modulation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown modulation label: {0}")]
pub struct ParseModTypeError(pub String);

impl ModType {
    /// Number of labels
    pub const COUNT: usize = 12;

    /// Every label in declaration order
    pub const ALL: [ModType; Self::COUNT] = [
        ModType::AmDsbFc,
        ModType::AmDsbSc,
        ModType::AmUsbFc,
        ModType::AmUsbSc,
        ModType::AmLsbFc,
        ModType::AmLsbSc,
        ModType::Fm,
        ModType::Mpsk,
        ModType::Psk2,
        ModType::Mask,
        ModType::Ask2,
        ModType::Mqam,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ModType::AmDsbFc => "AM_DSB_FC",
            ModType::AmDsbSc => "AM_DSB_SC",
            ModType::AmUsbFc => "AM_USB_FC",
            ModType::AmUsbSc => "AM_USB_SC",
            ModType::AmLsbFc => "AM_LSB_FC",
            ModType::AmLsbSc => "AM_LSB_SC",
            ModType::Fm => "FM",
            ModType::Mpsk => "MPSK",
            ModType::Psk2 => "PSK_2",
            ModType::Mask => "MASK",
            ModType::Ask2 => "ASK_2",
            ModType::Mqam => "MQAM",
        }
    }

    /// Position in declaration order
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label at a declaration-order position
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Most frequent label; ties go to the label declared first.
    ///
    /// Returns `None` for an empty sequence.
    pub fn majority<I>(labels: I) -> Option<Self>
    where
        I: IntoIterator<Item = ModType>,
    {
        let mut tally = [0usize; Self::COUNT];
        for label in labels {
            tally[label.index()] += 1;
        }

        let mut winner = None;
        let mut best = 0;
        for label in Self::ALL {
            let count = tally[label.index()];
            // Strictly greater keeps the earlier label on ties
            if count > best {
                best = count;
                winner = Some(label);
            }
        }
        winner
    }
}

impl fmt::Display for ModType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModType {
    type Err = ParseModTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseModTypeError(s.to_string()))
    }
}
