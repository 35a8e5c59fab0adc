use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Annotation, CallerContext, Project};

/// How reads report a private project the caller may not see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivateAccess {
    /// Pretend the project does not exist.
    #[default]
    Conceal,
    /// Report that the project exists but access is denied.
    Deny,
}

/// Namespaces whose private projects a caller may see.
///
/// The same list drives the in-process check and the SQL predicate, so
/// both paths always agree on what is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    privileged: Vec<String>,
}

impl Visibility {
    pub fn for_caller(caller: &CallerContext) -> Self {
        let mut privileged: Vec<String> = caller.admin_of().iter().cloned().collect();
        if let Some(ns) = caller.namespace() {
            if !privileged.iter().any(|p| p == ns) {
                privileged.push(ns.to_string());
            }
        }
        privileged.sort();
        Self { privileged }
    }

    pub fn public_only() -> Self {
        Self::default()
    }

    pub fn privileged_namespaces(&self) -> &[String] {
        &self.privileged
    }

    pub fn admits(&self, namespace: &str, is_private: bool) -> bool {
        !is_private || self.privileged.iter().any(|ns| ns == namespace)
    }
}

/// Returns true if the caller can see a project in `namespace`.
/// Public projects are visible to everyone.
pub fn can_see(caller: &CallerContext, namespace: &str, is_private: bool) -> bool {
    if !is_private {
        return true;
    }
    if caller.namespace() == Some(namespace) {
        return true;
    }
    caller.admin_of().contains(namespace)
}

pub fn is_visible(project: &Project, caller: &CallerContext) -> bool {
    can_see(caller, project.key.namespace(), project.is_private)
}

pub fn is_annotation_visible(annotation: &Annotation, caller: &CallerContext) -> bool {
    can_see(caller, &annotation.namespace, annotation.is_private)
}

/// Applies the private-access policy to a single resolved item.
pub fn reveal<T>(
    item: T,
    visible: bool,
    what: impl std::fmt::Display,
    policy: PrivateAccess,
) -> Result<T> {
    if visible {
        return Ok(item);
    }
    match policy {
        PrivateAccess::Conceal => Err(Error::ProjectNotFound(what.to_string())),
        PrivateAccess::Deny => Err(Error::AccessDenied(what.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_visible_to_everyone() {
        assert!(can_see(&CallerContext::anonymous(), "lab", false));
        assert!(can_see(&CallerContext::owner("other"), "lab", false));
    }

    #[test]
    fn test_private_visible_to_owner_and_admin_only() {
        assert!(!can_see(&CallerContext::anonymous(), "lab", true));
        assert!(!can_see(&CallerContext::owner("other"), "lab", true));
        assert!(can_see(&CallerContext::owner("lab"), "lab", true));
        assert!(can_see(
            &CallerContext::owner("other").with_admin_of(["lab"]),
            "lab",
            true
        ));
    }

    #[test]
    fn test_visibility_agrees_with_can_see() {
        let callers = [
            CallerContext::anonymous(),
            CallerContext::owner("lab"),
            CallerContext::owner("geo").with_admin_of(["lab", "core"]),
            CallerContext::anonymous().with_admin_of(["core"]),
        ];
        for caller in &callers {
            let visibility = Visibility::for_caller(caller);
            for ns in ["lab", "geo", "core", "other"] {
                for private in [false, true] {
                    assert_eq!(
                        visibility.admits(ns, private),
                        can_see(caller, ns, private),
                        "{caller:?} {ns} {private}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_privileged_namespaces_are_deduplicated() {
        let caller = CallerContext::owner("lab").with_admin_of(["lab", "geo"]);
        let visibility = Visibility::for_caller(&caller);
        assert_eq!(visibility.privileged_namespaces(), ["geo", "lab"]);
        assert!(Visibility::public_only().privileged_namespaces().is_empty());
    }

    #[test]
    fn test_reveal_policy() {
        assert_eq!(reveal(1, true, "x", PrivateAccess::Conceal).unwrap(), 1);
        assert!(matches!(
            reveal(1, false, "lab/p:default", PrivateAccess::Conceal),
            Err(Error::ProjectNotFound(_))
        ));
        assert!(matches!(
            reveal(1, false, "lab/p:default", PrivateAccess::Deny),
            Err(Error::AccessDenied(_))
        ));
    }
}
