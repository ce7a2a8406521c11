//! Role-set logic for entitlement checks.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Roles required when a deployment configures none.
pub const DEFAULT_REQUIRED_ROLES: [&str; 2] = ["service.workflow.user", "service.workflow.admin"];

/// One authorization group as returned by the entitlement service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

/// Set of role names a caller must hold, all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    required: BTreeSet<String>,
}

impl RoleRequirement {
    /// Builds a requirement from role names; falls back to
    /// [`DEFAULT_REQUIRED_ROLES`] when `roles` is empty.
    #[must_use]
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        if required.is_empty() {
            return Self::default();
        }
        Self { required }
    }

    #[must_use]
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    /// Required roles absent from `granted`, in sorted order.
    #[must_use]
    pub fn missing(&self, granted: &HashSet<String>) -> Vec<String> {
        self.required
            .iter()
            .filter(|role| !granted.contains(*role))
            .cloned()
            .collect()
    }

    /// Exact-name set containment; extra granted roles are fine.
    #[must_use]
    pub fn is_satisfied_by(&self, granted: &HashSet<String>) -> bool {
        self.required.iter().all(|role| granted.contains(role))
    }
}

impl Default for RoleRequirement {
    fn default() -> Self {
        Self {
            required: DEFAULT_REQUIRED_ROLES.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

/// Collapses groups into a set of names; order and duplicates are irrelevant.
#[must_use]
pub fn granted_roles(groups: &[Group]) -> HashSet<String> {
    groups.iter().map(|g| g.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> Vec<Group> {
        names
            .iter()
            .map(|n| Group {
                name: (*n).to_string(),
            })
            .collect()
    }

    #[test]
    fn exact_set_is_satisfied() {
        let req = RoleRequirement::new(["A", "B"]);
        assert!(req.is_satisfied_by(&granted_roles(&groups(&["A", "B"]))));
    }

    #[test]
    fn subset_is_not_satisfied() {
        let req = RoleRequirement::new(["A", "B"]);
        let granted = granted_roles(&groups(&["A"]));
        assert!(!req.is_satisfied_by(&granted));
        assert_eq!(req.missing(&granted), vec!["B".to_string()]);
    }

    #[test]
    fn superset_is_satisfied() {
        let req = RoleRequirement::new(["A", "B"]);
        assert!(req.is_satisfied_by(&granted_roles(&groups(&["C", "B", "A"]))));
    }

    #[test]
    fn duplicates_do_not_count_twice() {
        let req = RoleRequirement::new(["A", "B"]);
        assert!(!req.is_satisfied_by(&granted_roles(&groups(&["A", "A"]))));
    }

    #[test]
    fn empty_configuration_uses_defaults() {
        let req = RoleRequirement::new(Vec::<String>::new());
        let roles: Vec<&str> = req.roles().collect();
        assert_eq!(roles, vec!["service.workflow.admin", "service.workflow.user"]);
    }

    #[test]
    fn group_list_decodes_from_json() {
        let decoded: Vec<Group> =
            serde_json::from_str(r#"[{"name":"service.workflow.user"},{"name":"x","id":3}]"#)
                .unwrap();
        assert_eq!(decoded, groups(&["service.workflow.user", "x"]));
    }
}
