// src/models/group.rs
use crate::models::restaurant::Restaurant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The complete persisted state: group name -> group.
pub type Snapshot = BTreeMap<String, Group>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub members: Vec<String>,                     // Display order, duplicates allowed
    pub restaurants: BTreeMap<String, Restaurant>, // Restaurant name -> restaurant
}

impl Group {
    pub fn new(members: Vec<String>) -> Self {
        Self {
            members,
            restaurants: BTreeMap::new(),
        }
    }
}
