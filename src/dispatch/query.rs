use crate::schema::PredicateValue;
use crate::transport::FilePart;
use crate::{Error, Result};
use std::time::Duration;

/// How the caller wants to consume the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Buffered,
    /// Text lines with line endings stripped.
    Lines,
    /// 100 KiB chunks.
    Chunks,
}

/// One request-class invocation: the class name plus keyword predicates.
///
/// ```
/// use spacetrack::{Query, schema::inclusive_range};
///
/// let q = Query::new("gp")
///     .predicate("norad_cat_id", [25544, 41335])
///     .predicate("epoch", inclusive_range("2024-01-01", "2024-01-02"))
///     .predicate("orderby", "epoch desc");
/// assert_eq!(q.predicates().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    class: String,
    controller: Option<String>,
    predicates: Vec<(String, PredicateValue)>,
    iter_lines: bool,
    iter_content: bool,
    parse_types: bool,
    coerce: bool,
    timeout: Option<Duration>,
    file: Option<FilePart>,
}

impl Query {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Default::default()
        }
    }

    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Add a keyword predicate. Repeating a key replaces the earlier value.
    pub fn predicate(mut self, key: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.predicates.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.predicates.push((key, value)),
        }
        self
    }

    pub fn iter_lines(mut self) -> Self {
        self.iter_lines = true;
        self
    }

    pub fn iter_content(mut self) -> Self {
        self.iter_content = true;
        self
    }

    /// Convert result values using predicate types (JSON responses only).
    pub fn parse_types(mut self) -> Self {
        self.parse_types = true;
        self
    }

    /// Coerce string predicate values to the predicate's type before encoding.
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// File for upload request classes.
    pub fn file(mut self, file: FilePart) -> Self {
        self.file = Some(file);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn controller_hint(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    pub fn predicates(&self) -> &[(String, PredicateValue)] {
        &self.predicates
    }

    pub fn has_predicate(&self, key: &str) -> bool {
        self.predicates.iter().any(|(k, _)| k == key)
    }

    pub fn wants_parse_types(&self) -> bool {
        self.parse_types
    }

    pub fn wants_coercion(&self) -> bool {
        self.coerce
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn file_part(&self) -> Option<&FilePart> {
        self.file.as_ref()
    }

    /// The response mode, rejecting contradictory flags.
    pub fn mode(&self) -> Result<ResponseMode> {
        match (self.iter_lines, self.iter_content) {
            (true, true) => Err(Error::InvalidOptions(
                "iter_lines and iter_content cannot both be set".into(),
            )),
            (true, false) => Ok(ResponseMode::Lines),
            (false, true) => Ok(ResponseMode::Chunks),
            (false, false) => Ok(ResponseMode::Buffered),
        }
    }
}
