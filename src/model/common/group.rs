use std::fmt::Display;

use rand::Rng;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// The experimental condition a participant is assigned to.
///
/// Stored as an integer so exports and manual queries stay compact.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Group {
    NoImage = 0,
    WithImage = 1,
}

impl Group {
    /// Assign a group by a fair coin flip.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Self::WithImage
        } else {
            Self::NoImage
        }
    }

    /// Should articles be displayed with their image?
    pub fn image_shown(self) -> bool {
        self == Self::WithImage
    }
}

impl Display for Group {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::NoImage => "no-image",
                Self::WithImage => "with-image",
            }
        )
    }
}
