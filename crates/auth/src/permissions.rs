//! Grant views assembled from relational rows.
//!
//! Three shapes exist because callers need different levels of detail: admin
//! tooling wants identifiers, listings want human-readable labels, and the
//! token claim wants the flattest path→methods map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use restgate_core::{MethodId, ResourceId};

/// Permission category holding REST path→methods grants.
pub const REST_CATEGORY: &str = "REST";

/// One resource with the identifiers of the methods granted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsIds {
    pub resource_id: ResourceId,
    pub method_ids: Vec<MethodId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub id: MethodId,
    pub name: String,
}

/// One resource with its granted methods, labels joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsWithDescriptions {
    pub resource: Resource,
    pub methods: Vec<Method>,
}

/// Resource path → method names, in the order the rows delivered them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestPathsMethods(BTreeMap<String, Vec<String>>);

impl RestPathsMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `method` to the list for `path`, creating the entry if needed.
    pub fn push(&mut self, path: impl Into<String>, method: impl Into<String>) {
        self.0.entry(path.into()).or_default().push(method.into());
    }

    pub fn methods(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }

    /// Exact path match; method names compare case-insensitively.
    pub fn allows(&self, path: &str, method: &str) -> bool {
        self.methods(path)
            .is_some_and(|methods| methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(path, methods)| (path.as_str(), methods.as_slice()))
    }

    /// Total number of (path, method) pairs.
    pub fn grant_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl From<BTreeMap<String, Vec<String>>> for RestPathsMethods {
    fn from(value: BTreeMap<String, Vec<String>>) -> Self {
        Self(value)
    }
}

impl FromIterator<(String, String)> for RestPathsMethods {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = RestPathsMethods::new();
        for (path, method) in iter {
            map.push(path, method);
        }
        map
    }
}

/// Permission category → grants. This is the payload of the permissions claim.
///
/// Only [`REST_CATEGORY`] is populated today; other protocol categories slot in
/// without changing the claim schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPermissions(BTreeMap<String, RestPathsMethods>);

impl UserPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rest(rest: RestPathsMethods) -> Self {
        let mut perms = Self::new();
        perms.insert_category(REST_CATEGORY, rest);
        perms
    }

    pub fn insert_category(&mut self, category: impl Into<String>, grants: RestPathsMethods) {
        self.0.insert(category.into(), grants);
    }

    pub fn category(&self, category: &str) -> Option<&RestPathsMethods> {
        self.0.get(category)
    }

    pub fn rest(&self) -> Option<&RestPathsMethods> {
        self.category(REST_CATEGORY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RestPathsMethods {
        [
            ("/orders".to_string(), "GET".to_string()),
            ("/orders".to_string(), "POST".to_string()),
            ("/users".to_string(), "GET".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn push_preserves_method_order() {
        let mut map = RestPathsMethods::new();
        map.push("/a", "POST");
        map.push("/a", "DELETE");
        map.push("/a", "GET");
        assert_eq!(map.methods("/a").unwrap(), ["POST", "DELETE", "GET"]);
    }

    #[test]
    fn allows_is_exact_on_path() {
        let map = sample();
        assert!(map.allows("/orders", "post"));
        assert!(!map.allows("/orders/", "POST"));
        assert!(!map.allows("/users", "DELETE"));
        assert_eq!(map.grant_count(), 3);
    }

    #[test]
    fn user_permissions_json_shape() {
        let perms = UserPermissions::from_rest(sample());
        let json = serde_json::to_value(&perms).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "REST": {
                    "/orders": ["GET", "POST"],
                    "/users": ["GET"]
                }
            })
        );

        let back: UserPermissions = serde_json::from_value(json).unwrap();
        assert_eq!(back, perms);
    }
}
