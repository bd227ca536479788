use crate::error::{ClubError, PersistenceError};
use crate::models::{Group, Restaurant, Review, Snapshot};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Whether an upsert appended a new review or rewrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewUpsert {
    Created,
    Updated,
}

// Row for the map layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

// Row for the spider-plot layer: one reviewer's votes across the categories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerScores {
    pub reviewer: String,
    pub votes: Vec<u8>,
}

/// In-memory registry of groups, their restaurants and reviews.
///
/// Every mutation validates before touching state, so a rejected call leaves
/// the store exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStore {
    categories: Vec<String>,
    allow_self_vote: bool,
    groups: Snapshot,
}

impl GroupStore {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            categories,
            allow_self_vote: false,
            groups: Snapshot::new(),
        }
    }

    pub fn with_self_votes(mut self, allow: bool) -> Self {
        self.allow_self_vote = allow;
        self
    }

    /// Rebuilds a store from a loaded snapshot. Restaurants saved before the
    /// category list was stored alongside them adopt the deployment's list;
    /// any review that disagrees with its restaurant's categories, or a second
    /// review by the same reviewer, is rejected.
    pub fn from_snapshot(
        categories: Vec<String>,
        mut groups: Snapshot,
    ) -> Result<Self, PersistenceError> {
        for (group_name, group) in groups.iter_mut() {
            for (restaurant_name, restaurant) in group.restaurants.iter_mut() {
                if restaurant.categories.is_empty() {
                    debug!(
                        group = %group_name,
                        restaurant = %restaurant_name,
                        "adopting deployment categories"
                    );
                    restaurant.categories = categories.clone();
                }
                let schema_error = |reason: String| PersistenceError::Schema {
                    group: group_name.clone(),
                    restaurant: restaurant_name.clone(),
                    reason,
                };
                let expected = restaurant.category_count();
                let mut reviewers = HashSet::new();
                for review in &restaurant.reviews {
                    Review::check_shape(&review.votes, &review.category_comments, expected)
                        .map_err(|err| {
                            schema_error(format!("review by '{}': {}", review.reviewer, err))
                        })?;
                    if !reviewers.insert(review.reviewer.as_str()) {
                        return Err(schema_error(format!(
                            "'{}' has more than one review",
                            review.reviewer
                        )));
                    }
                }
            }
        }
        Ok(Self {
            categories,
            allow_self_vote: false,
            groups,
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.groups
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn allows_self_vote(&self) -> bool {
        self.allow_self_vote
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &Group)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), group))
    }

    pub fn group(&self, name: &str) -> Result<&Group, ClubError> {
        self.groups
            .get(name)
            .ok_or_else(|| ClubError::GroupNotFound(name.to_string()))
    }

    pub fn restaurant(&self, group: &str, name: &str) -> Result<&Restaurant, ClubError> {
        self.group(group)?
            .restaurants
            .get(name)
            .ok_or_else(|| restaurant_not_found(group, name))
    }

    pub fn reviews(&self, group: &str, restaurant: &str) -> Result<&[Review], ClubError> {
        Ok(&self.restaurant(group, restaurant)?.reviews)
    }

    pub fn locations(&self, group: &str) -> Result<Vec<Location>, ClubError> {
        Ok(self
            .group(group)?
            .restaurants
            .iter()
            .map(|(name, r)| Location {
                name: name.clone(),
                lat: r.lat,
                lon: r.lon,
            })
            .collect())
    }

    pub fn reviewer_scores(
        &self,
        group: &str,
        restaurant: &str,
    ) -> Result<Vec<ReviewerScores>, ClubError> {
        Ok(self
            .reviews(group, restaurant)?
            .iter()
            .map(|r| ReviewerScores {
                reviewer: r.reviewer.clone(),
                votes: r.votes.clone(),
            })
            .collect())
    }

    pub fn create_group(&mut self, name: &str, members: Vec<String>) -> Result<(), ClubError> {
        if self.groups.contains_key(name) {
            return Err(ClubError::DuplicateGroup(name.to_string()));
        }
        debug!(group = name, members = members.len(), "creating group");
        self.groups.insert(name.to_string(), Group::new(members));
        Ok(())
    }

    pub fn add_restaurant(
        &mut self,
        group: &str,
        name: &str,
        lat: f64,
        lon: f64,
    ) -> Result<(), ClubError> {
        Restaurant::check_coordinates(lat, lon)?;
        let categories = self.categories.clone();
        let restaurants = &mut self.group_mut(group)?.restaurants;
        if restaurants.contains_key(name) {
            return Err(ClubError::DuplicateRestaurant {
                group: group.to_string(),
                restaurant: name.to_string(),
            });
        }
        debug!(group, restaurant = name, lat, lon, "adding restaurant");
        restaurants.insert(name.to_string(), Restaurant::new(lat, lon, categories));
        Ok(())
    }

    /// Records `reviewer`'s review. A reviewer has at most one review per
    /// restaurant: resubmitting rewrites votes and comments in place and keeps
    /// the comment votes already collected.
    pub fn upsert_review(
        &mut self,
        group: &str,
        restaurant: &str,
        reviewer: &str,
        votes: Vec<u8>,
        category_comments: Vec<String>,
        comment: &str,
    ) -> Result<ReviewUpsert, ClubError> {
        let target = self.restaurant_mut(group, restaurant)?;
        let expected = target.category_count();
        Review::check_shape(&votes, &category_comments, expected)?;

        if let Some(existing) = target.review_by_mut(reviewer) {
            debug!(group, restaurant, reviewer, "updating review");
            existing.votes = votes;
            existing.category_comments = category_comments;
            existing.comment = comment.to_string();
            return Ok(ReviewUpsert::Updated);
        }

        debug!(group, restaurant, reviewer, "adding review");
        target
            .reviews
            .push(Review::new(reviewer, votes, category_comments, comment, expected)?);
        Ok(ReviewUpsert::Created)
    }

    /// Gives `target_reviewer`'s comment one more vote and returns the new count.
    pub fn vote_comment(
        &mut self,
        group: &str,
        restaurant: &str,
        voter: &str,
        target_reviewer: &str,
    ) -> Result<u32, ClubError> {
        let allow_self_vote = self.allow_self_vote;
        let review = self
            .restaurant_mut(group, restaurant)?
            .review_by_mut(target_reviewer)
            .ok_or_else(|| ClubError::ReviewNotFound {
                restaurant: restaurant.to_string(),
                reviewer: target_reviewer.to_string(),
            })?;
        if !allow_self_vote && voter == target_reviewer {
            return Err(ClubError::SelfVote(voter.to_string()));
        }
        review.comment_votes += 1;
        debug!(
            group,
            restaurant,
            voter,
            target_reviewer,
            votes = review.comment_votes,
            "comment vote"
        );
        Ok(review.comment_votes)
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut Group, ClubError> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| ClubError::GroupNotFound(name.to_string()))
    }

    fn restaurant_mut(&mut self, group: &str, name: &str) -> Result<&mut Restaurant, ClubError> {
        self.group_mut(group)?
            .restaurants
            .get_mut(name)
            .ok_or_else(|| restaurant_not_found(group, name))
    }
}

fn restaurant_not_found(group: &str, restaurant: &str) -> ClubError {
    ClubError::RestaurantNotFound {
        group: group.to_string(),
        restaurant: restaurant.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn categories() -> Vec<String> {
        ["Price", "Quality", "Service", "Location"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn notes(text: &str) -> Vec<String> {
        vec![text.to_string(); 4]
    }

    // Store with one group and one restaurant
    fn seeded_store() -> GroupStore {
        let mut store = GroupStore::new(categories());
        store
            .create_group("friday", vec!["anna".into(), "marco".into(), "anna".into()])
            .unwrap();
        store.add_restaurant("friday", "Da Mario", 45.46, 9.19).unwrap();
        store
    }

    #[test]
    fn test_create_group_preserves_member_order() {
        let store = seeded_store();
        let group = store.group("friday").unwrap();
        assert_eq!(group.members, vec!["anna", "marco", "anna"]);
        assert_eq!(group.restaurants.len(), 1);
    }

    #[test]
    fn test_duplicate_group_leaves_store_unchanged() {
        let mut store = seeded_store();
        let before = store.clone();

        let err = store.create_group("friday", vec!["luca".into()]).unwrap_err();
        assert!(matches!(err, ClubError::DuplicateGroup(ref name) if name == "friday"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store, before);
    }

    #[test]
    fn test_add_restaurant_requires_group_and_unique_name() {
        let mut store = seeded_store();

        let err = store.add_restaurant("sunday", "Da Mario", 0.0, 0.0).unwrap_err();
        assert!(matches!(err, ClubError::GroupNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.add_restaurant("friday", "Da Mario", 1.0, 1.0).unwrap_err();
        assert!(err.is_duplicate());

        let restaurant = store.restaurant("friday", "Da Mario").unwrap();
        assert_eq!(restaurant.lat, 45.46);
        assert_eq!(restaurant.categories, categories());
        assert!(restaurant.reviews.is_empty());
    }

    #[test]
    fn test_add_restaurant_rejects_non_finite_coordinates() {
        let mut store = seeded_store();
        let before = store.snapshot().clone();

        for (lat, lon) in [(f64::NAN, 9.0), (45.0, f64::INFINITY), (f64::NEG_INFINITY, f64::NAN)] {
            let err = store.add_restaurant("friday", "Nowhere", lat, lon).unwrap_err();
            assert!(matches!(err, ClubError::InvalidCoordinates { .. }));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        // Checked before the group lookup
        let err = store.add_restaurant("sunday", "Nowhere", f64::NAN, 0.0).unwrap_err();
        assert!(matches!(err, ClubError::InvalidCoordinates { .. }));
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn test_same_restaurant_name_in_two_groups() {
        let mut store = seeded_store();
        store.create_group("sunday", vec![]).unwrap();
        store.add_restaurant("sunday", "Da Mario", 1.0, 2.0).unwrap();
        assert_eq!(store.restaurant("sunday", "Da Mario").unwrap().lon, 2.0);
        assert_eq!(store.restaurant("friday", "Da Mario").unwrap().lon, 9.19);
    }

    #[test]
    fn test_upsert_review_twice_updates_in_place() {
        let mut store = seeded_store();
        let first = store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7, 10], notes("ok"), "first")
            .unwrap();
        assert_eq!(first, ReviewUpsert::Created);
        store
            .upsert_review("friday", "Da Mario", "marco", vec![5, 5, 5, 5], notes(""), "meh")
            .unwrap();
        store.vote_comment("friday", "Da Mario", "marco", "anna").unwrap();

        let second = store
            .upsert_review(
                "friday",
                "Da Mario",
                "anna",
                vec![1, 2, 3, 4],
                notes("again"),
                "second",
            )
            .unwrap();
        assert_eq!(second, ReviewUpsert::Updated);

        let reviews = store.reviews("friday", "Da Mario").unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].reviewer, "anna");
        assert_eq!(reviews[0].votes, vec![1, 2, 3, 4]);
        assert_eq!(reviews[0].category_comments, notes("again"));
        assert_eq!(reviews[0].comment, "second");
        assert_eq!(reviews[0].comment_votes, 1);
    }

    #[test]
    fn test_upsert_review_rejects_bad_shape() {
        let mut store = seeded_store();
        let before = store.clone();

        let err = store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7], notes(""), "")
            .unwrap_err();
        assert!(matches!(err, ClubError::InvalidReviewShape { expected: 4, .. }));

        let err = store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7, 10], vec![], "")
            .unwrap_err();
        assert!(matches!(err, ClubError::InvalidReviewShape { comments: 0, .. }));

        let err = store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 70, 10], notes(""), "")
            .unwrap_err();
        assert!(matches!(err, ClubError::VoteOutOfRange { index: 2, value: 70 }));

        assert_eq!(store, before);
    }

    #[test]
    fn test_upsert_review_unknown_restaurant() {
        let mut store = seeded_store();
        let err = store
            .upsert_review("friday", "Nowhere", "anna", vec![1, 1, 1, 1], notes(""), "")
            .unwrap_err();
        assert!(matches!(err, ClubError::RestaurantNotFound { .. }));
    }

    #[test]
    fn test_vote_comment_increments_by_one() {
        let mut store = seeded_store();
        store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7, 10], notes(""), "pasta!")
            .unwrap();

        assert_eq!(store.vote_comment("friday", "Da Mario", "marco", "anna").unwrap(), 1);
        assert_eq!(store.vote_comment("friday", "Da Mario", "luca", "anna").unwrap(), 2);
        assert_eq!(store.reviews("friday", "Da Mario").unwrap()[0].comment_votes, 2);
    }

    #[test]
    fn test_vote_comment_unknown_target() {
        let mut store = seeded_store();
        let err = store
            .vote_comment("friday", "Da Mario", "marco", "ghost")
            .unwrap_err();
        assert!(matches!(
            err,
            ClubError::ReviewNotFound { ref reviewer, .. } if reviewer == "ghost"
        ));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_self_vote_follows_policy() {
        let mut store = seeded_store();
        store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7, 10], notes(""), "mine")
            .unwrap();

        let err = store.vote_comment("friday", "Da Mario", "anna", "anna").unwrap_err();
        assert!(matches!(err, ClubError::SelfVote(_)));
        assert_eq!(store.reviews("friday", "Da Mario").unwrap()[0].comment_votes, 0);

        let mut store = store.with_self_votes(true);
        assert_eq!(store.vote_comment("friday", "Da Mario", "anna", "anna").unwrap(), 1);
    }

    #[test]
    fn test_read_accessors_for_rendering() {
        let mut store = seeded_store();
        store.add_restaurant("friday", "Bella Napoli", 40.85, 14.26).unwrap();
        store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7, 10], notes(""), "")
            .unwrap();

        let locations = store.locations("friday").unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].name, "Bella Napoli");

        let scores = store.reviewer_scores("friday", "Da Mario").unwrap();
        assert_eq!(
            scores,
            vec![ReviewerScores { reviewer: "anna".into(), votes: vec![8, 9, 7, 10] }]
        );
    }

    #[test]
    fn test_from_snapshot_adopts_categories_for_legacy_restaurants() {
        let mut legacy = seeded_store().snapshot().clone();
        let restaurant = legacy
            .get_mut("friday")
            .and_then(|g| g.restaurants.get_mut("Da Mario"))
            .unwrap();
        restaurant.categories.clear();
        restaurant.reviews.push(Review {
            reviewer: "anna".into(),
            votes: vec![1, 2, 3, 4],
            category_comments: notes(""),
            comment: String::new(),
            comment_votes: 3,
        });

        let store = GroupStore::from_snapshot(categories(), legacy).unwrap();
        assert_eq!(store.restaurant("friday", "Da Mario").unwrap().categories, categories());
    }

    #[test]
    fn test_from_snapshot_rejects_mismatched_reviews() {
        let mut broken = seeded_store().snapshot().clone();
        broken
            .get_mut("friday")
            .and_then(|g| g.restaurants.get_mut("Da Mario"))
            .unwrap()
            .reviews
            .push(Review {
                reviewer: "anna".into(),
                votes: vec![1, 2, 3],
                category_comments: vec![String::new(); 3],
                comment: String::new(),
                comment_votes: 0,
            });

        let err = GroupStore::from_snapshot(categories(), broken).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Schema { ref restaurant, .. } if restaurant == "Da Mario"
        ));
    }

    #[test]
    fn test_from_snapshot_rejects_duplicate_reviewers() {
        let mut store = seeded_store();
        store
            .upsert_review("friday", "Da Mario", "anna", vec![8, 9, 7, 10], notes(""), "first")
            .unwrap();
        let mut broken = store.snapshot().clone();
        let reviews = &mut broken
            .get_mut("friday")
            .and_then(|g| g.restaurants.get_mut("Da Mario"))
            .unwrap()
            .reviews;
        let mut twin = reviews[0].clone();
        twin.comment = "second opinion".into();
        reviews.push(twin);

        let err = GroupStore::from_snapshot(categories(), broken).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Schema { ref reason, .. } if reason.contains("more than one review")
        ));
    }
}
