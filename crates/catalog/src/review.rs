use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use exactmatch_core::{BatteryId, DomainError, DomainResult, Entity, ReviewId, UserId};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A customer's review of a battery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub battery_id: BatteryId,
    pub user_id: UserId,
    /// Author's username at the time the review was written.
    pub user_name: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Review as submitted by a customer. The author comes from the request
/// identity, never from the body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewReview {
    #[serde(alias = "battery")]
    pub battery_id: BatteryId,
    pub rating: u8,
    pub title: String,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self) -> DomainResult<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(DomainError::validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if self.comment.trim().is_empty() {
            return Err(DomainError::validation("comment must not be empty"));
        }
        Ok(())
    }

    pub fn into_review(
        self,
        id: ReviewId,
        user_id: UserId,
        user_name: String,
        is_verified_purchase: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Review> {
        self.validate()?;
        Ok(Review {
            id,
            battery_id: self.battery_id,
            user_id,
            user_name,
            rating: self.rating,
            title: self.title.trim().to_string(),
            comment: self.comment,
            is_verified_purchase,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Read-only rating aggregate for one battery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReviewSummary {
    /// Mean rating to one decimal place; `0.0` with no reviews.
    pub average_rating: f64,
    pub review_count: u32,
}

impl ReviewSummary {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0u32), |(sum, count), r| (sum + u64::from(r), count + 1));

        if count == 0 {
            return Self {
                average_rating: 0.0,
                review_count: 0,
            };
        }

        let average = (Decimal::from(sum) / Decimal::from(count))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven);

        Self {
            average_rating: average.to_f64().unwrap_or(0.0),
            review_count: count,
        }
    }

    pub fn of<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        Self::from_ratings(reviews.into_iter().map(|r| r.rating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn new_review(rating: u8) -> NewReview {
        NewReview {
            battery_id: BatteryId::new(),
            rating,
            title: "Starts every time".to_string(),
            comment: "Survived a -20C winter.".to_string(),
        }
    }

    #[test]
    fn empty_summary_is_zero() {
        let s = ReviewSummary::from_ratings([]);
        assert_eq!(s.average_rating, 0.0);
        assert_eq!(s.review_count, 0);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        let s = ReviewSummary::from_ratings([5, 4, 4]);
        assert_eq!(s.average_rating, 4.3);
        assert_eq!(s.review_count, 3);

        // 4.25 -> 4.2 (half to even)
        let s = ReviewSummary::from_ratings([5, 4, 4, 4]);
        assert_eq!(s.average_rating, 4.2);
    }

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        assert!(new_review(0).validate().is_err());
        assert!(new_review(6).validate().is_err());
        assert!(new_review(1).validate().is_ok());
        assert!(new_review(5).validate().is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut r = new_review(4);
        r.title = "  ".to_string();
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));
    }

    proptest! {
        #[test]
        fn average_stays_within_rating_bounds(ratings in proptest::collection::vec(1u8..=5, 1..50)) {
            let s = ReviewSummary::from_ratings(ratings.iter().copied());
            prop_assert_eq!(s.review_count as usize, ratings.len());
            prop_assert!(s.average_rating >= 1.0 && s.average_rating <= 5.0);
        }
    }
}
