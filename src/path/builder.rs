//! Fluent composition of absolute storage paths.

use super::escape::escape_element;

/// Builds an absolute storage path one segment at a time.
///
/// Blank segments are skipped, so optional parts can be appended without
/// checks at the call site.
///
/// ```rust
/// # use repocache::path::StoragePathBuilder;
/// let path = StoragePathBuilder::new()
///     .segment("repositories")
///     .element("libs:release")
///     .segment("")
///     .relative("org/acme/1.0")
///     .build();
/// assert_eq!(path, "/repositories/libs%3Arelease/org/acme/1.0");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StoragePathBuilder {
    path: String,
}

impl StoragePathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already-escaped segment.
    pub fn segment(mut self, segment: &str) -> Self {
        let segment = segment.trim();
        if !segment.is_empty() {
            self.path.push('/');
            self.path.push_str(segment);
        }
        self
    }

    /// Append already-escaped segments in order.
    pub fn segments<'a>(self, segments: impl IntoIterator<Item = &'a str>) -> Self {
        segments.into_iter().fold(self, Self::segment)
    }

    /// Escape a single element and append it.
    pub fn element(self, name: &str) -> Self {
        let escaped = escape_element(name);
        self.segment(&escaped)
    }

    /// Append a `/`-separated relative path, escaping each element.
    pub fn relative(self, path: &str) -> Self {
        path.split('/').fold(self, Self::element)
    }

    pub fn build(self) -> String {
        if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path
        }
    }
}
