use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// An identifier scheme under which an entity may carry zero or one value.
///
/// The declaration order is the matching priority: the tracking service's own
/// id first, then the content databases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum IdNamespace {
    Trakt,
    Imdb,
    Tmdb,
    Tvdb,
}

/// Namespaces compared (and backfilled) for movies.
pub const MOVIE_NAMESPACES: &[IdNamespace] = &[IdNamespace::Trakt, IdNamespace::Imdb, IdNamespace::Tmdb];

/// Namespaces compared (and backfilled) for shows. TVDB only identifies shows.
pub const SHOW_NAMESPACES: &[IdNamespace] = &[
    IdNamespace::Trakt,
    IdNamespace::Imdb,
    IdNamespace::Tmdb,
    IdNamespace::Tvdb,
];

impl fmt::Display for IdNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdNamespace::Trakt => "trakt",
            IdNamespace::Imdb => "imdb",
            IdNamespace::Tmdb => "tmdb",
            IdNamespace::Tvdb => "tvdb",
        };
        f.write_str(name)
    }
}

/// A single id value, either textual (IMDb) or numeric (everything else).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValue {
    Text(String),
    Number(u64),
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::Text(s) => f.write_str(s),
            IdValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// The external identifiers known for one entity (the identity set).
///
/// "Absent", `0` and blank strings are equivalent: every constructor and
/// [`MediaIds::normalized`] collapse them to `None`, so the rest of the engine
/// only ever has to test for `Some`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<u32>,
}

impl MediaIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trakt(mut self, id: u64) -> Self {
        self.trakt = Some(id).filter(|v| *v != 0);
        self
    }

    pub fn with_imdb(mut self, id: impl Into<String>) -> Self {
        self.imdb = clean_imdb(Some(id.into()));
        self
    }

    pub fn with_tmdb(mut self, id: u32) -> Self {
        self.tmdb = Some(id).filter(|v| *v != 0);
        self
    }

    pub fn with_tvdb(mut self, id: u32) -> Self {
        self.tvdb = Some(id).filter(|v| *v != 0);
        self
    }

    /// Collapse zero and blank values to `None`.
    ///
    /// Data read from disk or from the wire goes through this once, so that
    /// `Some(0)` or `Some("")` can never be mistaken for a real id.
    pub fn normalized(self) -> Self {
        Self {
            trakt: self.trakt.filter(|v| *v != 0),
            imdb: clean_imdb(self.imdb),
            tmdb: self.tmdb.filter(|v| *v != 0),
            tvdb: self.tvdb.filter(|v| *v != 0),
        }
    }

    /// Value held in the given namespace, if any.
    pub fn get(&self, namespace: IdNamespace) -> Option<IdValue> {
        match namespace {
            IdNamespace::Trakt => self.trakt.filter(|v| *v != 0).map(IdValue::Number),
            IdNamespace::Imdb => self
                .imdb
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| IdValue::Text(s.to_string())),
            IdNamespace::Tmdb => self.tmdb.filter(|v| *v != 0).map(|v| IdValue::Number(v as u64)),
            IdNamespace::Tvdb => self.tvdb.filter(|v| *v != 0).map(|v| IdValue::Number(v as u64)),
        }
    }

    pub fn has(&self, namespace: IdNamespace) -> bool {
        self.get(namespace).is_some()
    }

    /// Copy `other`'s value into `namespace` if this set has none there.
    ///
    /// Returns true if a value was copied. A present value is never replaced.
    pub fn fill_from(&mut self, other: &MediaIds, namespace: IdNamespace) -> bool {
        if self.has(namespace) || !other.has(namespace) {
            return false;
        }
        match namespace {
            IdNamespace::Trakt => self.trakt = other.trakt,
            IdNamespace::Imdb => self.imdb = clean_imdb(other.imdb.clone()),
            IdNamespace::Tmdb => self.tmdb = other.tmdb,
            IdNamespace::Tvdb => self.tvdb = other.tvdb,
        }
        true
    }

    /// True if no namespace holds a value ("unscraped").
    pub fn is_empty(&self) -> bool {
        !self.has_any()
    }

    /// True if at least one namespace holds a value. This is the outbound
    /// eligibility rule.
    pub fn has_any(&self) -> bool {
        SHOW_NAMESPACES.iter().any(|ns| self.has(*ns))
    }

    /// Short human-readable form for logs, e.g. `trakt:42 imdb:tt0001`.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = SHOW_NAMESPACES
            .iter()
            .filter_map(|ns| self.get(*ns).map(|v| format!("{}:{}", ns, v)))
            .collect();
        if parts.is_empty() {
            "<no ids>".to_string()
        } else {
            parts.join(" ")
        }
    }
}

impl Hash for MediaIds {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trakt.hash(state);
        self.imdb.hash(state);
        self.tmdb.hash(state);
        self.tvdb.hash(state);
    }
}

/// Trim, strip slashes (the service sometimes returns `/tt0001/`) and drop blanks.
fn clean_imdb(id: Option<String>) -> Option<String> {
    id.map(|s| s.replace('/', "").trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_blank_are_absent() {
        let ids = MediaIds {
            trakt: Some(0),
            imdb: Some("  ".to_string()),
            tmdb: Some(0),
            tvdb: None,
        };
        assert!(ids.is_empty());
        assert_eq!(ids.clone().normalized(), MediaIds::new());
        assert!(!ids.has(IdNamespace::Imdb));
    }

    #[test]
    fn test_builder_filters_zero() {
        let ids = MediaIds::new().with_trakt(0).with_tmdb(555);
        assert_eq!(ids.trakt, None);
        assert_eq!(ids.tmdb, Some(555));
        assert!(ids.has_any());
    }

    #[test]
    fn test_imdb_slashes_removed() {
        let ids = MediaIds::new().with_imdb("/tt0001/");
        assert_eq!(ids.imdb.as_deref(), Some("tt0001"));
    }

    #[test]
    fn test_fill_from_only_fills_empty() {
        let mut local = MediaIds::new().with_imdb("tt0001");
        let remote = MediaIds::new().with_imdb("tt9999").with_trakt(42);

        assert!(!local.fill_from(&remote, IdNamespace::Imdb));
        assert!(local.fill_from(&remote, IdNamespace::Trakt));
        assert!(!local.fill_from(&remote, IdNamespace::Tmdb));

        assert_eq!(local.imdb.as_deref(), Some("tt0001"));
        assert_eq!(local.trakt, Some(42));
    }

    #[test]
    fn test_describe() {
        let ids = MediaIds::new().with_trakt(42).with_imdb("tt0001");
        assert_eq!(ids.describe(), "trakt:42 imdb:tt0001");
        assert_eq!(MediaIds::new().describe(), "<no ids>");
    }
}
