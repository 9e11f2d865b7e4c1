use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Layout primitive kinds. Kinds share geometry and differ only in
    /// scoring weight and classification rule.
    RegionKind {
        TextBlock => "text_block",
        Seal => "seal",
        Logo => "logo",
        Border => "border",
        Signature => "signature",
    }
);

impl RegionKind {
    pub const ALL: [RegionKind; 5] = [
        RegionKind::TextBlock,
        RegionKind::Seal,
        RegionKind::Logo,
        RegionKind::Border,
        RegionKind::Signature,
    ];

    /// Position in `ALL`, used for fixed-layout encodings.
    pub fn index(&self) -> usize {
        match self {
            Self::TextBlock => 0,
            Self::Seal => 1,
            Self::Logo => 2,
            Self::Border => 3,
            Self::Signature => 4,
        }
    }

    /// Seals, logos and signatures: the regions a forger pastes or removes.
    pub fn is_emblem_like(&self) -> bool {
        matches!(self, Self::Seal | Self::Logo | Self::Signature)
    }
}

str_enum!(
    /// Verdict derived from the forgery score by configured thresholds.
    Status {
        Authentic => "authentic",
        Suspicious => "suspicious",
        Fake => "fake",
    }
);

str_enum!(
    /// Which signal tripped a suspicious zone. Rendering to prose is a UI concern.
    ReasonCode {
        PositionShift => "position_shift",
        ScaleMismatch => "scale_mismatch",
        ConfidenceDrop => "confidence_drop",
        RegionOverlap => "region_overlap",
        MissingExpectedRegion => "missing_expected_region",
        UnexpectedRegion => "unexpected_region",
        ImplausibleCount => "implausible_count",
    }
);

str_enum!(
    /// Where the caller's template resolver gets its records from.
    TemplateSource {
        LocalDatabase => "local_database",
        InstitutionRegistry => "institution_registry",
        Fixture => "fixture",
        Unspecified => "none",
    }
);

str_enum!(SealPosition {
    TopLeft => "top_left",
    TopCenter => "top_center",
    TopRight => "top_right",
    MiddleLeft => "middle_left",
    Center => "center",
    MiddleRight => "middle_right",
    BottomLeft => "bottom_left",
    BottomCenter => "bottom_center",
    BottomRight => "bottom_right",
    Absent => "absent",
});

str_enum!(TextAlignment {
    LeftAligned => "left_aligned",
    CenterAligned => "center_aligned",
    Justified => "justified",
    Irregular => "irregular",
    Absent => "absent",
});

str_enum!(LogoIntegrity {
    Intact => "intact",
    PartiallyDamaged => "partially_damaged",
    Suspicious => "suspicious",
    Absent => "absent",
});

str_enum!(
    /// Profile-level flags that explain an unusual score without failing it.
    ProfileDiagnostic {
        NoTextBlocks => "no_text_blocks",
        LowConfidenceNormalization => "low_confidence_normalization",
    }
);

str_enum!(NormalizationWarning {
    BlankPage => "blank_page",
    DarkPage => "dark_page",
    LowContrast => "low_contrast",
    LowResolution => "low_resolution",
    NoReliableSkew => "no_reliable_skew",
});

str_enum!(
    /// Container format actually decoded, after magic-byte sniffing.
    DocumentFormat {
        Png => "png",
        Jpeg => "jpeg",
        Tiff => "tiff",
        Pdf => "pdf",
    }
);

str_enum!(
    /// Format the caller claims. Magic bytes win when they disagree.
    DeclaredFormat {
        Auto => "auto",
        Png => "png",
        Jpeg => "jpeg",
        Tiff => "tiff",
        Pdf => "pdf",
    }
);

impl DeclaredFormat {
    pub fn as_document_format(&self) -> Option<DocumentFormat> {
        match self {
            Self::Auto => None,
            Self::Png => Some(DocumentFormat::Png),
            Self::Jpeg => Some(DocumentFormat::Jpeg),
            Self::Tiff => Some(DocumentFormat::Tiff),
            Self::Pdf => Some(DocumentFormat::Pdf),
        }
    }

    /// Guess from a file extension; unknown extensions fall back to `Auto`.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "tif" | "tiff" => Self::Tiff,
            "pdf" => Self::Pdf,
            _ => Self::Auto,
        }
    }
}

str_enum!(
    /// Which profile a suspicious zone points into.
    ZoneSource {
        Observed => "observed",
        Reference => "reference",
    }
);
