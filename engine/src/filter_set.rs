//! Combination of filters into a single accept/reject decision.

use std::path::Path;

use tracing::trace;

use crate::error::Result;
use crate::filter::{Filter, FilterRecord};

/// An ordered list of filters evaluated with logical AND.
///
/// Filters that do not apply to an entry's kind abstain, so orthogonal rules
/// (e.g. "exclude directories named X" and "only files containing Y") can be
/// stacked without interfering.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        FilterSet { filters }
    }

    /// Compile persisted records, failing on the first invalid one.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FilterRecord>) -> Result<Self> {
        let filters = records
            .into_iter()
            .map(Filter::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(FilterSet { filters })
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn to_records(&self) -> Vec<FilterRecord> {
        self.filters.iter().map(FilterRecord::from).collect()
    }

    /// True iff every filter passes `path`. An empty set accepts everything.
    pub fn evaluate(&self, path: &Path) -> bool {
        match self.filters.iter().find(|f| !f.passes(path)) {
            Some(rejecting) => {
                trace!(path = %path.display(), filter = rejecting.name(), "rejected by filter");
                false
            }
            None => true,
        }
    }

    /// Borrow this set as a tree-building predicate.
    pub fn predicate(&self) -> impl Fn(&Path) -> bool + '_ {
        move |path| self.evaluate(path)
    }
}

impl From<Vec<Filter>> for FilterSet {
    fn from(filters: Vec<Filter>) -> Self {
        FilterSet::new(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Application, ItemType};
    use std::fs;

    #[test]
    fn test_empty_set_accepts_everything() {
        let set = FilterSet::default();
        assert!(set.is_empty());
        assert!(set.evaluate(Path::new("/anything/at/all")));
    }

    #[test]
    fn test_all_filters_must_pass() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let report = temp_dir.path().join("report.txt");
        let draft = temp_dir.path().join("report-draft.txt");
        fs::write(&report, b"x").expect("Failed to write report");
        fs::write(&draft, b"x").expect("Failed to write draft");

        let set = FilterSet::new(vec![
            Filter::regex("reports", "report", Application::Filenames, ItemType::Files, true)
                .unwrap(),
            Filter::keyword("drafts", "draft", Application::Filenames, ItemType::Files, false),
        ]);

        assert!(set.evaluate(&report));
        assert!(!set.evaluate(&draft));
    }

    #[test]
    fn test_orthogonal_filters_do_not_interfere() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let cache = temp_dir.path().join("cache");
        let docs = temp_dir.path().join("docs");
        fs::create_dir(&cache).expect("Failed to create cache");
        fs::create_dir(&docs).expect("Failed to create docs");
        let notes = docs.join("notes.md");
        let image = docs.join("image.png");
        fs::write(&notes, b"x").expect("Failed to write notes");
        fs::write(&image, b"x").expect("Failed to write image");

        let set = FilterSet::new(vec![
            Filter::keyword(
                "no-cache",
                "cache",
                Application::Filenames,
                ItemType::Directory,
                false,
            ),
            Filter::keyword("markdown", ".md", Application::Filenames, ItemType::Files, true),
        ]);

        assert!(!set.evaluate(&cache));
        // The files-only whitelist abstains on directories
        assert!(set.evaluate(&docs));
        assert!(set.evaluate(&notes));
        assert!(!set.evaluate(&image));
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = Filter::keyword("a", "x", Application::Filenames, ItemType::Both, true);
        let b = Filter::keyword("b", "y", Application::Filenames, ItemType::Both, false);
        let forward = FilterSet::new(vec![a.clone(), b.clone()]);
        let reverse = FilterSet::new(vec![b, a]);

        for name in ["x", "xy", "y", "z"] {
            let path = Path::new(name);
            assert_eq!(forward.evaluate(path), reverse.evaluate(path));
        }
    }

    #[test]
    fn test_from_records_rejects_invalid() {
        let good = FilterRecord {
            name: "a".into(),
            filter_type: "KEYWORD".into(),
            data: "tmp".into(),
            application: "FILENAMES".into(),
            item_type: "BOTH".into(),
            whitelist: false,
        };
        let mut bad = good.clone();
        bad.application = "CONTENTS".into();

        assert_eq!(FilterSet::from_records(&[good.clone()]).unwrap().len(), 1);
        assert!(FilterSet::from_records(&[good, bad]).is_err());
    }
}
