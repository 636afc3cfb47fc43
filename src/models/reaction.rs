//! Reader reactions to an article: likes/dislikes, ratings and favourites

use serde::{Deserialize, Serialize};

/// Lowest accepted rating
pub const MIN_RATING: i32 = 1;
/// Highest accepted rating
pub const MAX_RATING: i32 = 5;

/// A reader's opinion of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opinion {
    Like,
    Dislike,
}

impl Opinion {
    pub fn from_like_flag(like: bool) -> Self {
        if like {
            Self::Like
        } else {
            Self::Dislike
        }
    }

    pub fn is_like(self) -> bool {
        self == Self::Like
    }

    /// Past-tense verb used in user-facing messages
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Like => "liked",
            Self::Dislike => "disliked",
        }
    }
}

/// Aggregated reactions for one article
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
    pub favourites: i64,
}

/// Sum and count of all ratings of an article
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingTotals {
    pub sum: i64,
    pub count: i64,
}

impl RatingTotals {
    /// Mean rounded to two decimals, `None` when unrated
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let mean = self.sum as f64 / self.count as f64;
        Some((mean * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rounds_to_two_decimals() {
        assert_eq!(RatingTotals { sum: 0, count: 0 }.average(), None);
        assert_eq!(RatingTotals { sum: 10, count: 3 }.average(), Some(3.33));
        assert_eq!(RatingTotals { sum: 14, count: 3 }.average(), Some(4.67));
        assert_eq!(RatingTotals { sum: 5, count: 1 }.average(), Some(5.0));
    }

    #[test]
    fn test_opinion_wording() {
        assert_eq!(Opinion::from_like_flag(true).past_tense(), "liked");
        assert_eq!(Opinion::from_like_flag(false).past_tense(), "disliked");
        assert!(!Opinion::Dislike.is_like());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// The average of valid ratings always lies within the rating scale.
        #[test]
        fn average_within_scale(ratings in prop::collection::vec(MIN_RATING..=MAX_RATING, 1..50)) {
            let totals = RatingTotals {
                sum: ratings.iter().map(|r| *r as i64).sum(),
                count: ratings.len() as i64,
            };
            let avg = totals.average().unwrap();
            prop_assert!(avg >= MIN_RATING as f64 && avg <= MAX_RATING as f64);
        }
    }
}
