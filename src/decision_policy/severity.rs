use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SeverityClass {
    ExtremelyMild,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub foreground: &'static str,
    pub background: &'static str,
}

struct SeverityInfo {
    label: &'static str,
    recommendations: &'static [&'static str],
    palette: Palette,
}

const TABLE: [SeverityInfo; SeverityClass::COUNT] = [
    SeverityInfo {
        label: "Extremely Mild",
        recommendations: &[
            "Continue with basic skincare routine",
            "Gentle cleanser once or twice daily",
            "Apply moisturizer with SPF during the day",
        ],
        palette: Palette {
            foreground: "#10b981",
            background: "#d1fae5",
        },
    },
    SeverityInfo {
        label: "Mild",
        recommendations: &[
            "Use a gentle cleanser twice daily",
            "Apply over-the-counter benzoyl peroxide (2.5%)",
            "Moisturize with non-comedogenic products",
        ],
        palette: Palette {
            foreground: "#f59e0b",
            background: "#fef3c7",
        },
    },
    SeverityInfo {
        label: "Moderate",
        recommendations: &[
            "Consider topical retinoids",
            "Use benzoyl peroxide or salicylic acid consistently",
            "Consider consulting a dermatologist for prescription options",
        ],
        palette: Palette {
            foreground: "#f97316",
            background: "#ffedd5",
        },
    },
    SeverityInfo {
        label: "Severe",
        recommendations: &[
            "Consult a dermatologist as soon as possible",
            "Prescription treatments may be necessary",
            "Avoid picking or squeezing acne lesions",
            "Consider oral medication options",
        ],
        palette: Palette {
            foreground: "#ef4444",
            background: "#fee2e2",
        },
    },
];

impl SeverityClass {
    pub const COUNT: usize = 4;

    pub const ALL: [SeverityClass; SeverityClass::COUNT] = [
        SeverityClass::ExtremelyMild,
        SeverityClass::Mild,
        SeverityClass::Moderate,
        SeverityClass::Severe,
    ];

    /// Class for a position in the model's output vector.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        TABLE[self.index()].label
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        TABLE[self.index()].recommendations
    }

    pub fn palette(&self) -> Palette {
        TABLE[self.index()].palette
    }

    /// Moderate and severe results carry a "see a dermatologist" advisory.
    pub fn advises_dermatologist(&self) -> bool {
        self.level() >= 2
    }
}

impl fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
