//! Asset kind enumeration.

/// Kind of media an asset holds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Still image (JPEG, HEIC, RAW, etc.)
    #[default]
    #[display("image")]
    Image,
    /// Video (MP4, MOV, etc.)
    #[display("video")]
    Video,
}

impl AssetKind {
    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
        }
    }

    /// Short label used by the `filetype` template variable.
    pub fn short_label(&self) -> &'static str {
        match self {
            AssetKind::Image => "IMG",
            AssetKind::Video => "VID",
        }
    }

    /// Long label used by the `filetypefull` template variable.
    pub fn long_label(&self) -> &'static str {
        match self {
            AssetKind::Image => "IMAGE",
            AssetKind::Video => "VIDEO",
        }
    }
}

impl std::str::FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AssetKind::Image),
            "video" => Ok(AssetKind::Video),
            _ => Err(format!("Unknown asset kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_round_trips_through_str() {
        for kind in AssetKind::iter() {
            assert_eq!(kind.as_str().parse::<AssetKind>(), Ok(kind));
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
