//! Pure aggregation over a restaurant's reviews.
//!
//! Nothing here touches the store; callers pass in the review slices they
//! already resolved.

use crate::error::ClubError;
use crate::models::{Group, Restaurant, Review};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantScore {
    pub categories: Vec<String>,
    pub averages: Vec<f64>,
    pub total: f64,
    pub top_comment: Option<String>,
    pub review_count: usize,
}

// One bar group in the comparison chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub restaurant: String,
    pub averages: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRestaurant {
    pub restaurant: String,
    pub total: f64,
    pub review_count: usize,
}

/// Mean of each category column. All zeros when there are no reviews.
pub fn category_averages(
    reviews: &[Review],
    category_count: usize,
) -> Result<Vec<f64>, ClubError> {
    let mut sums = vec![0u32; category_count];
    for review in reviews {
        if review.votes.len() != category_count {
            return Err(ClubError::InvalidReviewShape {
                expected: category_count,
                votes: review.votes.len(),
                comments: review.category_comments.len(),
            });
        }
        for (sum, vote) in sums.iter_mut().zip(&review.votes) {
            *sum += u32::from(*vote);
        }
    }
    if reviews.is_empty() {
        return Ok(vec![0.0; category_count]);
    }
    let count = reviews.len() as f64;
    Ok(sums.into_iter().map(|sum| f64::from(sum) / count).collect())
}

/// Mean vote across every review and category, scaled by 10 into [0, 100].
pub fn total_score(reviews: &[Review], category_count: usize) -> f64 {
    if reviews.is_empty() || category_count == 0 {
        return 0.0;
    }
    let sum: u64 = reviews
        .iter()
        .flat_map(|r| r.votes.iter())
        .map(|&v| u64::from(v))
        .sum();
    let total_votes = (reviews.len() * category_count) as f64;
    (sum as f64 / total_votes) * 10.0
}

/// Comment of the review with the most comment votes. The first review
/// wins ties, and empty comments are not skipped.
pub fn top_comment(reviews: &[Review]) -> Option<&str> {
    let mut best: Option<&Review> = None;
    for review in reviews {
        match best {
            Some(current) if review.comment_votes <= current.comment_votes => {}
            _ => best = Some(review),
        }
    }
    best.map(|r| r.comment.as_str())
}

pub fn summarize(restaurant: &Restaurant) -> Result<RestaurantScore, ClubError> {
    let count = restaurant.category_count();
    Ok(RestaurantScore {
        categories: restaurant.categories.clone(),
        averages: category_averages(&restaurant.reviews, count)?,
        total: total_score(&restaurant.reviews, count),
        top_comment: top_comment(&restaurant.reviews).map(str::to_string),
        review_count: restaurant.reviews.len(),
    })
}

/// Category averages for the named restaurants, in request order.
/// Restaurants nobody has reviewed yet are left out of the comparison.
pub fn compare(
    group_name: &str,
    group: &Group,
    names: &[String],
) -> Result<Vec<Comparison>, ClubError> {
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let restaurant = group
            .restaurants
            .get(name)
            .ok_or_else(|| ClubError::RestaurantNotFound {
                group: group_name.to_string(),
                restaurant: name.clone(),
            })?;
        if restaurant.reviews.is_empty() {
            continue;
        }
        rows.push(Comparison {
            restaurant: name.clone(),
            averages: category_averages(&restaurant.reviews, restaurant.category_count())?,
        });
    }
    Ok(rows)
}

/// Every restaurant in the group, best total score first.
pub fn ranking(group: &Group) -> Vec<RankedRestaurant> {
    let mut ranked: Vec<RankedRestaurant> = group
        .restaurants
        .iter()
        .map(|(name, r)| RankedRestaurant {
            restaurant: name.clone(),
            total: total_score(&r.reviews, r.category_count()),
            review_count: r.reviews.len(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.restaurant.cmp(&b.restaurant))
    });
    ranked
}
