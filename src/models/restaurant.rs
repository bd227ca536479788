// src/models/restaurant.rs
use crate::error::ClubError;
use crate::models::review::Review;
use serde::{Deserialize, Serialize};

/// A restaurant visited by a group. Its name is the key it is stored under.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Restaurant {
    pub lat: f64,
    pub lon: f64,
    // Categories the restaurant is scored on. Missing in older snapshots,
    // filled in from the deployment's list when the store is loaded.
    #[serde(default)]
    pub categories: Vec<String>,
    pub reviews: Vec<Review>, // Submission order, resubmissions update in place
}

impl Restaurant {
    pub fn new(lat: f64, lon: f64, categories: Vec<String>) -> Self {
        Self {
            lat,
            lon,
            categories,
            reviews: Vec::new(),
        }
    }

    // NaN and infinities serialize as null and would not load back
    pub fn check_coordinates(lat: f64, lon: f64) -> Result<(), ClubError> {
        if lat.is_finite() && lon.is_finite() {
            Ok(())
        } else {
            Err(ClubError::InvalidCoordinates { lat, lon })
        }
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn review_by(&self, reviewer: &str) -> Option<&Review> {
        self.reviews.iter().find(|r| r.is_by(reviewer))
    }

    pub fn review_by_mut(&mut self, reviewer: &str) -> Option<&mut Review> {
        self.reviews.iter_mut().find(|r| r.is_by(reviewer))
    }
}
