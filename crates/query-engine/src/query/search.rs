//! Search data source: the strings a bare search word is matched against.

use std::fmt;
use std::sync::Arc;

use crate::types::StringComparison;

type SearchFn<T> = dyn Fn(&T, &dyn Fn(&str) -> bool) -> bool + Send + Sync;

/// Yields the searchable strings of an element.
pub struct SearchSource<T> {
    matcher: Arc<SearchFn<T>>,
    comparison: Option<StringComparison>,
}

impl<T> Clone for SearchSource<T> {
    fn clone(&self) -> Self {
        Self {
            matcher: Arc::clone(&self.matcher),
            comparison: self.comparison,
        }
    }
}

impl<T: 'static> SearchSource<T> {
    pub(crate) fn new<I, S, F>(source: F, comparison: Option<StringComparison>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        let matcher: Arc<SearchFn<T>> = Arc::new(move |item: &T, test: &dyn Fn(&str) -> bool| {
            source(item).into_iter().any(|value| test(value.as_ref()))
        });
        Self {
            matcher,
            comparison,
        }
    }
}

impl<T> SearchSource<T> {
    /// Comparison declared by the source, overriding the engine default.
    pub fn comparison(&self) -> Option<StringComparison> {
        self.comparison
    }

    /// Whether any string of `item` matches `word`.
    pub(crate) fn matches(
        &self,
        item: &T,
        word: &str,
        exact: bool,
        comparison: StringComparison,
    ) -> bool {
        let comparison = self.comparison.unwrap_or(comparison);
        if exact {
            (self.matcher)(item, &|value: &str| comparison.equals(value, word))
        } else {
            (self.matcher)(item, &|value: &str| comparison.contains(value, word))
        }
    }
}

impl<T> fmt::Debug for SearchSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSource")
            .field("comparison", &self.comparison)
            .finish()
    }
}
