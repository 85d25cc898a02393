//! Route pattern compiled from a resource's base path.
//!
//! `/users/:userId/orders` compiles to a regex that binds `userId` and
//! accepts one optional trailing segment, which is read as the item ID.

use std::collections::HashMap;

use mockgrid_core::EngineError;
use regex::Regex;

/// Path parameters bound by a match, e.g. `userId -> "u1"`.
pub type PathParams = HashMap<String, String>;

/// Outcome of matching a request path against a resource route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Trailing segment after the base path, if present.
    pub item_id: Option<String>,
    pub params: PathParams,
}

/// Compiled form of a base path.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compiles `base_path`. The path must start with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for paths that do not start
    /// with `/`, contain empty parameter names, or fail to compile.
    pub fn compile(base_path: &str) -> Result<Self, EngineError> {
        if !base_path.starts_with('/') {
            return Err(EngineError::invalid_config(format!(
                "basePath '{base_path}' must start with '/'"
            )));
        }

        let mut pattern = String::from("^");
        let mut param_names = Vec::new();
        for segment in base_path.trim_end_matches('/').split('/').skip(1) {
            pattern.push('/');
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(EngineError::invalid_config(format!(
                        "basePath '{base_path}' has an unnamed parameter"
                    )));
                }
                param_names.push(name.to_string());
                pattern.push_str("([^/]+)");
            } else {
                pattern.push_str(&regex::escape(segment));
            }
        }
        pattern.push_str("(?:/([^/]+))?/?$");

        let regex = Regex::new(&pattern).map_err(|e| {
            EngineError::invalid_config(format!("basePath '{base_path}' is not routable: {e}"))
        })?;
        Ok(Self { regex, param_names })
    }

    /// Names of the `:param` segments, in order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Matches `path` (query string already removed).
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let caps = self.regex.captures(path)?;
        let params = self
            .param_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| caps.get(i + 1).map(|m| (name.clone(), m.as_str().to_string())))
            .collect();
        let item_id = caps
            .get(self.param_names.len() + 1)
            .map(|m| m.as_str().to_string());
        Some(PathMatch { item_id, params })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn matches_collection_and_item() {
        let p = PathPattern::compile("/api/users").unwrap();
        let m = p.matches("/api/users").unwrap();
        assert_eq!(m.item_id, None);
        assert!(m.params.is_empty());

        let m = p.matches("/api/users/42").unwrap();
        assert_eq!(m.item_id.as_deref(), Some("42"));

        assert!(p.matches("/api/users/").is_some());
        assert!(p.matches("/api/users/42/extra").is_none());
        assert!(p.matches("/api/usersx").is_none());
    }

    #[test]
    fn binds_parameters() {
        let p = PathPattern::compile("/users/:userId/orders").unwrap();
        assert_eq!(p.param_names(), ["userId".to_string()]);

        let m = p.matches("/users/u1/orders/o9").unwrap();
        assert_eq!(m.params.get("userId").map(String::as_str), Some("u1"));
        assert_eq!(m.item_id.as_deref(), Some("o9"));
        assert!(p.matches("/users/u1").is_none());
    }

    #[test]
    fn escapes_literal_segments() {
        let p = PathPattern::compile("/v1.0/items").unwrap();
        assert!(p.matches("/v1.0/items").is_some());
        assert!(p.matches("/v1x0/items").is_none());
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(PathPattern::compile("users").is_err());
        assert!(PathPattern::compile("/users/:/x").is_err());
    }

    proptest! {
        #[test]
        fn any_segment_binds_verbatim(parent in "[A-Za-z0-9_.~-]{1,12}", id in "[A-Za-z0-9_.~-]{1,12}") {
            let p = PathPattern::compile("/users/:userId/orders").unwrap();
            let m = p.matches(&format!("/users/{parent}/orders/{id}")).unwrap();
            prop_assert_eq!(m.params.get("userId"), Some(&parent));
            prop_assert_eq!(m.item_id, Some(id));
        }
    }
}
