//! Inclusion/exclusion filters.
//!
//! A [`Filter`] matches either a regular expression or a literal keyword
//! against an entry's file name or full path. Each filter is restricted to
//! files, directories, or both; for entries of any other kind it abstains and
//! never blocks them.
//!
//! Whitelist filters pass entries that match and blacklist filters pass
//! entries that don't: `passes == (matches == whitelist)`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Which match algorithm a filter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Regex,
    Keyword,
}

/// What part of the path a filter is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Application {
    /// Only the final path component
    Filenames,
    /// The full path string
    Paths,
}

/// Which kind of entry a filter has an opinion on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Files,
    Directory,
    Both,
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterType::Regex => write!(f, "REGEX"),
            FilterType::Keyword => write!(f, "KEYWORD"),
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Application::Filenames => write!(f, "FILENAMES"),
            Application::Paths => write!(f, "PATHS"),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Files => write!(f, "FILES"),
            ItemType::Directory => write!(f, "DIRECTORY"),
            ItemType::Both => write!(f, "BOTH"),
        }
    }
}

impl FromStr for FilterType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "REGEX" => Ok(FilterType::Regex),
            "KEYWORD" => Ok(FilterType::Keyword),
            _ => Err(EngineError::InvalidFilterType {
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Application {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "FILENAMES" => Ok(Application::Filenames),
            "PATHS" => Ok(Application::Paths),
            _ => Err(EngineError::InvalidApplication {
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for ItemType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "FILES" => Ok(ItemType::Files),
            "DIRECTORY" => Ok(ItemType::Directory),
            "BOTH" => Ok(ItemType::Both),
            _ => Err(EngineError::InvalidItemType {
                value: s.to_string(),
            }),
        }
    }
}

/// The match algorithm together with its data.
#[derive(Debug, Clone)]
pub enum FilterKind {
    /// Pattern matched at the start of the subject
    Regex { pattern: String, compiled: Regex },
    /// Literal substring
    Keyword(String),
}

impl FilterKind {
    fn matches(&self, subject: &str) -> bool {
        match self {
            // Leftmost-first search: a match exists at offset 0 iff the first match starts there.
            FilterKind::Regex { compiled, .. } => {
                compiled.find(subject).is_some_and(|m| m.start() == 0)
            }
            FilterKind::Keyword(keyword) => subject.contains(keyword.as_str()),
        }
    }
}

/// A single inclusion/exclusion rule.
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    kind: FilterKind,
    application: Application,
    item_type: ItemType,
    whitelist: bool,
}

impl Filter {
    /// Build a filter, compiling regex data eagerly.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRegex` if `filter_type` is `Regex` and
    /// `data` is not a valid pattern.
    pub fn new(
        name: impl Into<String>,
        filter_type: FilterType,
        data: impl Into<String>,
        application: Application,
        item_type: ItemType,
        whitelist: bool,
    ) -> Result<Self> {
        let name = name.into();
        let data = data.into();
        let kind = match filter_type {
            FilterType::Regex => {
                let compiled = Regex::new(&data).map_err(|source| EngineError::InvalidRegex {
                    name: name.clone(),
                    pattern: data.clone(),
                    source,
                })?;
                FilterKind::Regex {
                    pattern: data,
                    compiled,
                }
            }
            FilterType::Keyword => FilterKind::Keyword(data),
        };

        Ok(Filter {
            name,
            kind,
            application,
            item_type,
            whitelist,
        })
    }

    /// Shorthand for a regex filter.
    pub fn regex(
        name: impl Into<String>,
        pattern: impl Into<String>,
        application: Application,
        item_type: ItemType,
        whitelist: bool,
    ) -> Result<Self> {
        Self::new(name, FilterType::Regex, pattern, application, item_type, whitelist)
    }

    /// Shorthand for a keyword filter. Never fails.
    pub fn keyword(
        name: impl Into<String>,
        keyword: impl Into<String>,
        application: Application,
        item_type: ItemType,
        whitelist: bool,
    ) -> Self {
        Filter {
            name: name.into(),
            kind: FilterKind::Keyword(keyword.into()),
            application,
            item_type,
            whitelist,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn filter_type(&self) -> FilterType {
        match self.kind {
            FilterKind::Regex { .. } => FilterType::Regex,
            FilterKind::Keyword(_) => FilterType::Keyword,
        }
    }

    /// Raw regex pattern or keyword.
    pub fn data(&self) -> &str {
        match &self.kind {
            FilterKind::Regex { pattern, .. } => pattern,
            FilterKind::Keyword(keyword) => keyword,
        }
    }

    pub fn application(&self) -> Application {
        self.application
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn is_whitelist(&self) -> bool {
        self.whitelist
    }

    /// Whether this filter has an opinion on `path`, judged by the entry's
    /// kind on disk.
    pub fn applies_to_item(&self, path: &Path) -> bool {
        match self.item_type {
            ItemType::Both => true,
            ItemType::Files => path.is_file(),
            ItemType::Directory => path.is_dir(),
        }
    }

    /// Raw pattern match, ignoring item type and whitelist polarity.
    pub fn matches(&self, path: &Path) -> bool {
        let subject = match self.application {
            Application::Filenames => path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default(),
            Application::Paths => path.to_string_lossy(),
        };
        self.kind.matches(&subject)
    }

    /// Whether `path` survives this filter. Abstaining counts as passing.
    pub fn passes(&self, path: &Path) -> bool {
        if !self.applies_to_item(path) {
            return true;
        }
        self.matches(path) == self.whitelist
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {} on {} {}: {:?}]",
            self.name,
            if self.whitelist { "include" } else { "exclude" },
            self.filter_type(),
            self.item_type,
            self.application,
            self.data()
        )
    }
}

/// Persisted form of a [`Filter`], with every field as a plain string or bool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub name: String,
    pub filter_type: String,
    pub data: String,
    pub application: String,
    pub item_type: String,
    pub whitelist: bool,
}

impl From<&Filter> for FilterRecord {
    fn from(filter: &Filter) -> Self {
        FilterRecord {
            name: filter.name.clone(),
            filter_type: filter.filter_type().to_string(),
            data: filter.data().to_string(),
            application: filter.application.to_string(),
            item_type: filter.item_type.to_string(),
            whitelist: filter.whitelist,
        }
    }
}

impl TryFrom<&FilterRecord> for Filter {
    type Error = EngineError;

    fn try_from(record: &FilterRecord) -> Result<Self> {
        Filter::new(
            record.name.clone(),
            record.filter_type.parse()?,
            record.data.clone(),
            record.application.parse()?,
            record.item_type.parse()?,
            record.whitelist,
        )
    }
}
