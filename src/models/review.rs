// src/models/review.rs
use crate::error::ClubError;
use serde::{Deserialize, Serialize};

/// Highest score a reviewer can give a single category.
pub const MAX_VOTE: u8 = 10;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub reviewer: String,               // Identity of the member who wrote the review
    pub votes: Vec<u8>,                 // One score (0-10) per category
    pub category_comments: Vec<String>, // One note per category, aligned with `votes`
    pub comment: String,                // Free-form "comment of the evening"
    #[serde(default)]
    pub comment_votes: u32,             // Votes this comment collected from the group
}

impl Review {
    /// Builds a fresh review with no comment votes after checking its shape
    /// against the restaurant's category count.
    pub fn new(
        reviewer: impl Into<String>,
        votes: Vec<u8>,
        category_comments: Vec<String>,
        comment: impl Into<String>,
        category_count: usize,
    ) -> Result<Self, ClubError> {
        Self::check_shape(&votes, &category_comments, category_count)?;
        Ok(Self {
            reviewer: reviewer.into(),
            votes,
            category_comments,
            comment: comment.into(),
            comment_votes: 0,
        })
    }

    pub fn check_shape(
        votes: &[u8],
        category_comments: &[String],
        category_count: usize,
    ) -> Result<(), ClubError> {
        if votes.len() != category_count || category_comments.len() != category_count {
            return Err(ClubError::InvalidReviewShape {
                expected: category_count,
                votes: votes.len(),
                comments: category_comments.len(),
            });
        }
        if let Some((index, &value)) = votes.iter().enumerate().find(|(_, v)| **v > MAX_VOTE) {
            return Err(ClubError::VoteOutOfRange { index, value });
        }
        Ok(())
    }

    pub fn is_by(&self, reviewer: &str) -> bool {
        self.reviewer == reviewer
    }
}
