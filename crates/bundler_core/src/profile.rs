use std::fmt;

use serde::{Deserialize, Serialize};

/// Named compressor preset, ordered from least to most size-reductive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    /// 300 dpi, colour preserving; largest output.
    Prepress,
    /// 300 dpi.
    Printer,
    /// 150 dpi.
    Ebook,
    /// 72 dpi.
    #[default]
    Screen,
    /// 50 dpi greyscale with font and image deduplication. Not offered on the
    /// command line; used as the fallback pass for oversized outputs.
    Aggressive,
}

impl QualityProfile {
    pub const SELECTABLE: [QualityProfile; 4] = [
        QualityProfile::Screen,
        QualityProfile::Ebook,
        QualityProfile::Printer,
        QualityProfile::Prepress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QualityProfile::Prepress => "prepress",
            QualityProfile::Printer => "printer",
            QualityProfile::Ebook => "ebook",
            QualityProfile::Screen => "screen",
            QualityProfile::Aggressive => "aggressive",
        }
    }

    pub fn image_dpi(self) -> u32 {
        match self {
            QualityProfile::Prepress | QualityProfile::Printer => 300,
            QualityProfile::Ebook => 150,
            QualityProfile::Screen => 72,
            QualityProfile::Aggressive => 50,
        }
    }

    /// True when `self` shrinks at least as hard as `other`.
    pub fn is_at_least_as_aggressive_as(self, other: QualityProfile) -> bool {
        self >= other
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
