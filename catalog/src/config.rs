//! Pipeline configuration.
//!
//! The listing, fan-out, name lookup and ownership endpoints are all plain
//! url templates plus a description of where the interesting fields live in
//! the upstream JSON. Switching the pipeline to a different pair of upstream
//! endpoints is a configuration change, not a code change.
//!
//! ```yaml
//! sources:
//!   - name: public
//!     url: "https://games.roblox.com/v2/users/{userId}/games?accessFilter=Public&limit=50"
//!     records:
//!       place_id: rootPlace.id
//! children:
//!   url: "https://games.roblox.com/v1/games/{id}/game-passes?limit=100"
//!   paginated: true
//! max_pages: 20
//! request_delay_ms: 100
//! ```
use crate::errors::TemplateError;
use crate::types::GamepassRef;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const MAX_FANOUT_CONCURRENCY: usize = 8;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("at least one listing source is required")]
    NoSources,

    #[error("empty listing source name")]
    EmptySourceName,

    #[error("duplicate listing source name: {0}")]
    DuplicateSource(String),

    #[error("invalid url template for {what}: {error}")]
    InvalidTemplate { what: String, error: TemplateError },

    #[error("{0} must be greater than 0")]
    Zero(&'static str),
}

/// A dotted path into a JSON document, e.g. `rootPlace.id`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(from = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn lookup<'a>(&self, value: &'a JsonValue) -> Option<&'a JsonValue> {
        self.0
            .iter()
            .try_fold(value, |current, segment| current.get(segment.as_str()))
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        FieldPath(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::from(path.to_string())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A url with `{name}` placeholders.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(from = "String")]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<Url, TemplateError> {
        let mut rendered = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| TemplateError::Unterminated(self.0.clone()))?;
            let name = &after[..end];
            let value = vars
                .iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| *value)
                .ok_or_else(|| TemplateError::Unbound(name.to_string()))?;
            rendered.push_str(value);
            rest = &after[end + 1..];
        }
        rendered.push_str(rest);

        Ok(Url::parse(&rendered)?)
    }

    /// Renders with every allowed placeholder bound to a dummy id.
    fn check(&self, what: &str, placeholders: &[&str]) -> Result<(), ValidationError> {
        let vars: Vec<(&str, &str)> = placeholders.iter().map(|name| (*name, "1")).collect();
        self.render(&vars)
            .map(|_| ())
            .map_err(|error| ValidationError::InvalidTemplate {
                what: what.to_string(),
                error,
            })
    }
}

impl From<String> for UrlTemplate {
    fn from(template: String) -> Self {
        UrlTemplate(template)
    }
}

impl From<&str> for UrlTemplate {
    fn from(template: &str) -> Self {
        UrlTemplate(template.to_string())
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where records and the continuation cursor live in a listing response.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordFields {
    pub list: FieldPath,
    pub id: FieldPath,
    pub name: FieldPath,
    pub place_id: Option<FieldPath>,
    pub cursor: FieldPath,
}

impl Default for RecordFields {
    fn default() -> Self {
        RecordFields {
            list: "data".into(),
            id: "id".into(),
            name: "name".into(),
            place_id: None,
            cursor: "nextPageCursor".into(),
        }
    }
}

/// A cursor-paginated listing of the experiences of a user.
///
/// Placeholders: `{userId}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ListingSource {
    pub name: String,
    pub url: UrlTemplate,
    /// Sends the session cookie; skipped entirely when none is configured.
    #[serde(default)]
    pub authenticated: bool,
    /// A failure of an optional source is logged and the source ignored.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub records: RecordFields,
}

/// The gamepass listing of a single experience.
///
/// Placeholders: `{id}` and `{placeId}`. Experiences without a place id
/// cannot be resolved by a template that uses `{placeId}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChildListing {
    pub url: UrlTemplate,
    #[serde(default)]
    pub paginated: bool,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub records: RecordFields,
}

/// Batch lookup of experience names by id.
///
/// Placeholders: `{ids}`, a comma separated list.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NameLookup {
    pub url: UrlTemplate,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub records: RecordFields,
}

/// Per-user inventory lookup of a single gamepass.
///
/// Placeholders: `{userId}` and `{gamepassId}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct OwnershipCheck {
    pub url: UrlTemplate,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default = "default_list")]
    pub list: FieldPath,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Listing sources in precedence order; the first one to list an
    /// experience wins when several list the same one.
    pub sources: Vec<ListingSource>,
    pub children: ChildListing,
    pub names: Option<NameLookup>,
    pub ownership: OwnershipCheck,
    /// Catalog checked by the owned query.
    pub gamepasses: Vec<GamepassRef>,
    /// Hard ceiling on pages fetched per paginated listing.
    pub max_pages: usize,
    /// Courtesy delay between consecutive upstream calls.
    pub request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub fanout_concurrency: usize,
    pub user_agent: String,
}

fn default_batch_size() -> usize {
    50
}

fn default_list() -> FieldPath {
    "data".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sources: vec![
                ListingSource {
                    name: "public".into(),
                    url: "https://games.roblox.com/v2/users/{userId}/games?accessFilter=Public&limit=50&sortOrder=Asc".into(),
                    authenticated: false,
                    optional: false,
                    records: RecordFields {
                        place_id: Some("rootPlace.id".into()),
                        ..RecordFields::default()
                    },
                },
                ListingSource {
                    name: "private".into(),
                    url: "https://games.roblox.com/v2/users/{userId}/games?accessFilter=All&limit=50&sortOrder=Asc".into(),
                    authenticated: true,
                    optional: true,
                    records: RecordFields {
                        place_id: Some("rootPlace.id".into()),
                        ..RecordFields::default()
                    },
                },
            ],
            children: ChildListing {
                url: "https://games.roblox.com/v1/games/{id}/game-passes?limit=100&sortOrder=Asc"
                    .into(),
                paginated: true,
                authenticated: false,
                records: RecordFields::default(),
            },
            names: Some(NameLookup {
                url: "https://games.roblox.com/v1/games?universeIds={ids}".into(),
                batch_size: default_batch_size(),
                records: RecordFields::default(),
            }),
            ownership: OwnershipCheck {
                url: "https://inventory.roblox.com/v1/users/{userId}/items/GamePass/{gamepassId}"
                    .into(),
                authenticated: false,
                list: default_list(),
            },
            gamepasses: Vec::new(),
            max_pages: 20,
            request_delay_ms: 100,
            request_timeout_ms: 5000,
            fanout_concurrency: 1,
            user_agent: concat!("passport/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sources.is_empty() {
            return Err(ValidationError::NoSources);
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.is_empty() {
                return Err(ValidationError::EmptySourceName);
            }
            if !names.insert(&source.name) {
                return Err(ValidationError::DuplicateSource(source.name.clone()));
            }
            source
                .url
                .check(&format!("source `{}`", source.name), &["userId"])?;
        }

        self.children.url.check("children", &["id", "placeId"])?;
        self.ownership
            .url
            .check("ownership", &["userId", "gamepassId"])?;

        if let Some(names) = &self.names {
            names.url.check("names", &["ids"])?;
            if names.batch_size == 0 {
                return Err(ValidationError::Zero("names.batch_size"));
            }
        }

        if self.max_pages == 0 {
            return Err(ValidationError::Zero("max_pages"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::Zero("request_timeout_ms"));
        }
        if self.fanout_concurrency == 0 {
            return Err(ValidationError::Zero("fanout_concurrency"));
        }

        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fanout_concurrency(&self) -> usize {
        self.fanout_concurrency.clamp(1, MAX_FANOUT_CONCURRENCY)
    }
}
