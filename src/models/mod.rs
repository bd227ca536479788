pub mod group;
pub mod restaurant;
pub mod review;

pub use group::{Group, Snapshot};
pub use restaurant::Restaurant;
pub use review::Review;
