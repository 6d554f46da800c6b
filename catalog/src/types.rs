use serde::Serialize;
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

/// Display name used when neither the listing nor the name lookup supplied one.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum IdError {
    #[error("is required")]
    Missing,
    #[error("must be a positive integer, got `{0}`")]
    Invalid(String),
}

fn parse_positive(s: &str) -> Result<NonZeroU64, IdError> {
    if s.is_empty() {
        return Err(IdError::Missing);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdError::Invalid(s.to_string()));
    }
    s.parse::<NonZeroU64>()
        .map_err(|_| IdError::Invalid(s.to_string()))
}

/// The account a query is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(NonZeroU64);

/// A gamepass, as addressed by the inventory endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GamepassId(NonZeroU64);

macro_rules! positive_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: u64) -> Option<Self> {
                NonZeroU64::new(id).map(Self)
            }

            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl FromStr for $ty {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_positive(s).map(Self)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

positive_id!(UserId);
positive_id!(GamepassId);

/// A record read off an upstream listing page. Listing sources yield
/// experiences; the gamepass listing is read with the same shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemRecord {
    pub id: u64,
    pub name: Option<String>,
    pub place_id: Option<u64>,
}

impl ItemRecord {
    /// Fills fields this record is missing from a later duplicate of it.
    pub fn fill_from(&mut self, other: ItemRecord) {
        if self.name.is_none() {
            self.name = other.name;
        }
        if self.place_id.is_none() {
            self.place_id = other.place_id;
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_NAME)
    }
}

/// A gamepass belonging to an experience.
#[derive(Clone, Debug, PartialEq)]
pub struct SubItemRecord {
    pub id: u64,
    pub name: Option<String>,
}

impl From<ItemRecord> for SubItemRecord {
    fn from(record: ItemRecord) -> Self {
        SubItemRecord {
            id: record.id,
            name: record.name,
        }
    }
}

/// Result of resolving the gamepasses of a single experience.
#[derive(Clone, Debug, PartialEq)]
pub enum FanoutOutcome {
    Resolved(Vec<SubItemRecord>),
    Failed(String),
}

/// One experience joined with one of its gamepasses.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateEntry {
    pub experience_id: u64,
    pub experience_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<u64>,
    pub gamepass_id: u64,
    pub gamepass_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Experiences that went through fan-out.
    pub items_processed: usize,
    /// Experiences that contributed no gamepasses, failed lookups included.
    pub items_without_children: usize,
    pub children_found: usize,
    pub failed_lookups: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub entries: Vec<AggregateEntry>,
    pub summary: Summary,
}

/// A gamepass from the configured catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct GamepassRef {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedGamepasses {
    pub gamepasses: Vec<GamepassRef>,
    pub failed_lookups: usize,
}
