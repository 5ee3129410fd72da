// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reserved namespace registry.
//!
//! Certain namespaces belong to the cluster itself and must never be touched
//! by tenant-facing policy, regardless of any annotation a tenant could set.

/// Namespace names reserved for the cluster.
pub const FORBIDDEN_NAMES: &[&str] = &["openshift", "kubernetes", "kube"];

/// Namespace name prefixes reserved for the cluster.
pub const FORBIDDEN_PREFIXES: &[&str] = &["openshift-", "kubernetes-", "kube-"];

/// Returns true if the namespace name is reserved, either by exact match or
/// by reserved prefix.
pub fn is_namespace_reserved(name: &str) -> bool {
    if FORBIDDEN_NAMES.contains(&name) {
        return true;
    }
    FORBIDDEN_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_names_are_reserved() {
        assert!(is_namespace_reserved("openshift"));
        assert!(is_namespace_reserved("kubernetes"));
        assert!(is_namespace_reserved("kube"));
    }

    #[test]
    fn test_prefixes_are_reserved() {
        assert!(is_namespace_reserved("openshift-infra"));
        assert!(is_namespace_reserved("kube-system"));
        assert!(is_namespace_reserved("kubernetes-dashboard"));
    }

    #[test]
    fn test_tenant_namespaces_are_not_reserved() {
        assert!(!is_namespace_reserved("default"));
        assert!(!is_namespace_reserved("web"));
        // reserved only as a prefix match, not a substring match
        assert!(!is_namespace_reserved("my-kube"));
        assert!(!is_namespace_reserved("openshiftish"));
    }
}
