use std::fmt::Display;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 5;

/// A rating on the fixed 1-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Score(u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Score must be between {MIN_SCORE} and {MAX_SCORE}, got {0}")]
pub struct ScoreOutOfRange(pub i64);

impl Score {
    /// Every valid score, in ascending order.
    pub fn scale() -> Vec<Score> {
        (MIN_SCORE..=MAX_SCORE).map(|s| Score(s as u8)).collect()
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = ScoreOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (MIN_SCORE..=MAX_SCORE).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScoreOutOfRange(value))
        }
    }
}

impl From<Score> for i32 {
    fn from(score: Score) -> Self {
        score.0.into()
    }
}

impl From<Score> for Bson {
    fn from(score: Score) -> Self {
        Bson::Int32(score.into())
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{doc, from_document, to_document};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        score: Score,
    }

    #[test]
    fn bounds() {
        assert_eq!(Score::try_from(0), Err(ScoreOutOfRange(0)));
        assert_eq!(Score::try_from(6), Err(ScoreOutOfRange(6)));
        assert_eq!(Score::try_from(-3), Err(ScoreOutOfRange(-3)));
        assert_eq!(Score::try_from(1).unwrap().value(), 1);
        assert_eq!(Score::try_from(5).unwrap().value(), 5);
    }

    #[test]
    fn scale_is_one_to_five() {
        let values: Vec<u8> = Score::scale().into_iter().map(Score::value).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn stored_as_bson_integer() {
        let wrapper = Wrapper {
            score: Score::try_from(4).unwrap(),
        };
        assert_eq!(to_document(&wrapper).unwrap(), doc! { "score": 4 });

        let back: Wrapper = from_document(doc! { "score": 4_i64 }).unwrap();
        assert_eq!(back, wrapper);
        assert!(from_document::<Wrapper>(doc! { "score": 9 }).is_err());
        assert!(from_document::<Wrapper>(doc! { "score": "4" }).is_err());
    }
}
