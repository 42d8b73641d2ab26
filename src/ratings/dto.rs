use serde::Deserialize;

use crate::error::ApiError;
use crate::validate::{non_empty, positive_id, Validate};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

fn check_score(rating: f64) -> Result<(), ApiError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }
    Ok(())
}

/// New top-level rating. The subject id is sent as `recipe_id` or `product_id`.
#[derive(Debug, Deserialize)]
pub struct RatingInput {
    #[serde(alias = "recipe_id", alias = "product_id")]
    pub subject_id: i64,
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
}

impl Validate for RatingInput {
    fn validate(&self) -> Result<(), ApiError> {
        positive_id("subject id", self.subject_id)?;
        check_score(self.rating)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyInput {
    pub comment: String,
}

impl Validate for ReplyInput {
    fn validate(&self) -> Result<(), ApiError> {
        non_empty("comment", &self.comment)
    }
}

/// Edit of an existing rating or reply. Replies ignore `rating`.
#[derive(Debug, Deserialize)]
pub struct RatingUpdate {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub comment: String,
}

impl Validate for RatingUpdate {
    fn validate(&self) -> Result<(), ApiError> {
        match self.rating {
            Some(r) => check_score(r),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subject_id_accepts_either_name() {
        let r: RatingInput =
            serde_json::from_value(json!({ "recipe_id": 4, "rating": 5 })).unwrap();
        assert_eq!(r.subject_id, 4);
        let p: RatingInput =
            serde_json::from_value(json!({ "product_id": 9, "rating": 3.5, "comment": "ok" }))
                .unwrap();
        assert_eq!(p.subject_id, 9);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn score_outside_range_is_rejected() {
        for bad in [0.0, 5.5, -1.0] {
            let r = RatingInput { subject_id: 1, rating: bad, comment: String::new() };
            assert!(r.validate().is_err(), "{bad} accepted");
        }
        assert!(RatingUpdate { rating: Some(6.0), comment: String::new() }.validate().is_err());
        assert!(RatingUpdate { rating: None, comment: "edited".into() }.validate().is_ok());
    }

    #[test]
    fn reply_needs_a_comment() {
        assert!(ReplyInput { comment: " ".into() }.validate().is_err());
    }
}
