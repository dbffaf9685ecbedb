use serde::{Deserialize, Serialize};
use std::fmt;

/// Differentiation state of a stem cell. Every non-`Virgin` label is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Virgin,
    Endoderm,
    Mesoderm,
    Ectoderm,
}

impl Label {
    pub fn is_virgin(self) -> bool {
        self == Label::Virgin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Virgin => "virgin",
            Label::Endoderm => "endoderm",
            Label::Mesoderm => "mesoderm",
            Label::Ectoderm => "ectoderm",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
