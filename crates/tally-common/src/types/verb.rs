//! Metered HTTP verbs

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method a usage event is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVerb {
    Get,
    Post,
}

impl HttpVerb {
    /// Every metered verb, in report order
    pub const ALL: [HttpVerb; 2] = [HttpVerb::Get, HttpVerb::Post];

    /// Lowercase key used in persisted and reported documents
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
        }
    }

    /// Map an HTTP method name to a metered verb, if it is one
    pub fn from_method(method: &str) -> Option<Self> {
        if method.eq_ignore_ascii_case("GET") {
            Some(HttpVerb::Get)
        } else if method.eq_ignore_ascii_case("POST") {
            Some(HttpVerb::Post)
        } else {
            None
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpVerb::Get => write!(f, "GET"),
            HttpVerb::Post => write!(f, "POST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_method() {
        assert_eq!(HttpVerb::from_method("GET"), Some(HttpVerb::Get));
        assert_eq!(HttpVerb::from_method("post"), Some(HttpVerb::Post));
        assert_eq!(HttpVerb::from_method("PUT"), None);
    }

    #[test]
    fn test_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&HttpVerb::Post).unwrap(), "\"post\"");
        let verb: HttpVerb = serde_json::from_str("\"get\"").unwrap();
        assert_eq!(verb, HttpVerb::Get);
    }
}
