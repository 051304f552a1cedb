// src/catalog/mod.rs

pub mod period;
pub mod sources;
pub mod template;

pub use period::{default_months, expand, PeriodGrid};
pub use sources::{read_configured_sources, SourceFile, OTHERS_GROUP, PREFIXES_GROUP};
pub use template::{Placeholder, UrlTemplate};

use tracing::{debug, info};

/// The ordered download list: primary dataset URLs, then each "other"
/// dataset in configured order, then static URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub primary: Vec<String>,
    pub others: Vec<String>,
    pub statics: Vec<String>,
}

impl Catalog {
    /// Expand the primary patterns for `primary_key` and the shared "other"
    /// patterns once per key in `other_keys`; statics pass through as-is.
    pub fn build(
        grid: &PeriodGrid,
        primary_key: &str,
        primary_patterns: &[UrlTemplate],
        other_keys: &[String],
        other_patterns: &[UrlTemplate],
        statics: Vec<String>,
    ) -> Self {
        let primary = grid.expand(primary_patterns, primary_key);
        let others = other_keys
            .iter()
            .flat_map(|key| grid.expand(other_patterns, key))
            .collect();
        Self {
            primary,
            others,
            statics,
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.others.len() + self.statics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn urls(&self) -> impl Iterator<Item = &String> {
        self.primary
            .iter()
            .chain(self.others.iter())
            .chain(self.statics.iter())
    }

    pub fn into_urls(self) -> Vec<String> {
        let mut all = self.primary;
        all.extend(self.others);
        all.extend(self.statics);
        all
    }

    /// Log the size of each source and, at debug level, every URL.
    pub fn log_listing(&self) {
        for (label, urls) in [
            ("dynamic", &self.primary),
            ("dynamic (others)", &self.others),
            ("static", &self.statics),
        ] {
            info!(source = label, count = urls.len(), "URLs generated");
            for (i, url) in urls.iter().enumerate() {
                debug!("{}) {}", i + 1, url);
            }
        }
        info!(count = self.len(), "URLs generated (all)");
    }
}
