/// One cursor-delimited slice of a result set.
///
/// `after` is present exactly when more results exist beyond this page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub after: Option<String>,
}

impl<T> Page<T> {
    /// A complete result with no continuation.
    pub fn single(data: Vec<T>) -> Self {
        Self { data, after: None }
    }

    pub fn has_more(&self) -> bool {
        self.after.is_some()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            after: self.after,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::single(Vec::new())
    }
}
