use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::models::TOTAL_COMPANY;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("unknown director: {0}")]
    UnknownDirector(String),
    #[error("store {store} is assigned to both {first} and {second}")]
    OverlappingStore {
        store: String,
        first: String,
        second: String,
    },
    #[error("director {0:?} is listed more than once")]
    DuplicateDirector(String),
    #[error("director name {0:?} is reserved for the company total")]
    ReservedName(String),
    #[error("store {store:?} has the same name as director {director:?}")]
    StoreNamedAfterDirector { store: String, director: String },
    #[error("roster has no directors")]
    Empty,
    #[error("failed to read roster file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse roster file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Director {
    pub name: String,
    pub stores: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Roster {
    directors: Vec<Director>,
}

impl Roster {
    pub fn new(directors: Vec<Director>) -> Result<Self, RosterError> {
        if directors.is_empty() {
            return Err(RosterError::Empty);
        }
        // Director names and store ids share one namespace in a roll-up.
        let mut names: HashSet<String> = HashSet::new();
        for director in &directors {
            if director.name.trim().eq_ignore_ascii_case(TOTAL_COMPANY) {
                return Err(RosterError::ReservedName(director.name.clone()));
            }
            if !names.insert(director.name.to_ascii_lowercase()) {
                return Err(RosterError::DuplicateDirector(director.name.clone()));
            }
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for director in &directors {
            for store in &director.stores {
                if let Some(first) = owners.insert(store.as_str(), director.name.as_str()) {
                    return Err(RosterError::OverlappingStore {
                        store: store.clone(),
                        first: first.to_string(),
                        second: director.name.clone(),
                    });
                }
                if names.contains(&store.to_ascii_lowercase()) {
                    let owner = directors
                        .iter()
                        .find(|d| d.name.eq_ignore_ascii_case(store))
                        .map_or_else(|| store.clone(), |d| d.name.clone());
                    return Err(RosterError::StoreNamedAfterDirector {
                        store: store.clone(),
                        director: owner,
                    });
                }
            }
        }
        Ok(Self { directors })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, RosterError> {
        let raw = std::fs::read_to_string(path)?;
        let directors: Vec<Director> = serde_json::from_str(&raw)?;
        Self::new(directors)
    }

    pub fn builtin() -> Self {
        let director = |name: &str, stores: &[&str]| Director {
            name: name.to_string(),
            stores: stores.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            directors: vec![
                director("North Region", &["1001", "1002", "1003", "1004"]),
                director("Central Region", &["2001", "2002", "2003"]),
                director("South Region", &["3001", "3002", "3003", "3004"]),
            ],
        }
    }

    pub fn directors(&self) -> &[Director] {
        &self.directors
    }

    pub fn stores_for(&self, director: &str) -> Result<HashSet<String>, RosterError> {
        self.directors
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(director))
            .map(|d| d.stores.iter().cloned().collect())
            .ok_or_else(|| RosterError::UnknownDirector(director.to_string()))
    }

    /// Canonical director name for case-insensitive input.
    pub fn director_name(&self, director: &str) -> Result<&str, RosterError> {
        self.directors
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(director))
            .map(|d| d.name.as_str())
            .ok_or_else(|| RosterError::UnknownDirector(director.to_string()))
    }

    pub fn all_stores(&self) -> HashSet<String> {
        self.directors
            .iter()
            .flat_map(|d| d.stores.iter().cloned())
            .collect()
    }

    pub fn sorted_stores(&self) -> BTreeSet<String> {
        self.all_stores().into_iter().collect()
    }

    pub fn contains_store(&self, store_id: &str) -> bool {
        self.directors
            .iter()
            .any(|d| d.stores.iter().any(|s| s == store_id))
    }
}
