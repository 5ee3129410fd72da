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

//! Core Kubernetes API types (Pod, Container, LimitRange, Namespace).

use crate::api::resource::Quantity;
use std::any::Any;
use std::collections::HashMap;

/// Name of the CPU resource dimension.
pub const RESOURCE_CPU: &str = "cpu";

/// Name of the memory resource dimension.
pub const RESOURCE_MEMORY: &str = "memory";

/// ResourceList is a map of resource names to quantities.
pub type ResourceList = HashMap<String, Quantity>;

/// ApiObject is a trait for Kubernetes API objects that can be used in admission.
pub trait ApiObject: Send + Sync {
    /// Returns the object as Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the object as mutable Any for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the kind of this object.
    fn kind(&self) -> &str;
}

// ============================================================================
// Resource Types
// ============================================================================

/// ResourceRequirements describes the compute resource requirements.
///
/// Requests and limits are independent maps; either may be partially
/// populated for any subset of resource dimensions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceRequirements {
    /// Requests describes the minimum amount of compute resources required.
    pub requests: ResourceList,
    /// Limits describes the maximum amount of compute resources allowed.
    pub limits: ResourceList,
}

// ============================================================================
// Container and Pod
// ============================================================================

/// Container represents a single container in a pod.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    /// Name of the container.
    pub name: String,
    /// Container image name.
    pub image: String,
    /// Compute resources required by this container.
    pub resources: ResourceRequirements,
}

impl Container {
    /// Create a new container with the given name and image.
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            resources: ResourceRequirements::default(),
        }
    }
}

/// PodSpec describes the specification of a pod.
///
/// Init containers run, in order, before the regular containers; admission
/// processes each list independently and in sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PodSpec {
    /// List of initialization containers.
    pub init_containers: Vec<Container>,
    /// List of containers.
    pub containers: Vec<Container>,
}

/// Pod represents a Kubernetes Pod.
#[derive(Debug, Clone, PartialEq)]
pub struct Pod {
    /// Name of the pod.
    pub name: String,
    /// Namespace of the pod.
    pub namespace: String,
    /// Pod specification.
    pub spec: PodSpec,
    /// Annotations is an unstructured key value map.
    pub annotations: HashMap<String, String>,
}

impl Pod {
    /// Create a new pod with the given name and namespace.
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            spec: PodSpec::default(),
            annotations: HashMap::new(),
        }
    }
}

impl ApiObject for Pod {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "Pod"
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// Namespace represents a Kubernetes Namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub name: String,
    /// Annotations is an unstructured key value map.
    pub annotations: HashMap<String, String>,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            annotations: HashMap::new(),
        }
    }

    /// Create a namespace carrying a single annotation.
    pub fn with_annotation(name: &str, key: &str, value: &str) -> Self {
        let mut ns = Self::new(name);
        ns.annotations.insert(key.to_string(), value.to_string());
        ns
    }
}

impl ApiObject for Namespace {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "Namespace"
    }
}

// ============================================================================
// LimitRange
// ============================================================================

/// LimitType represents the granularity a limit range item applies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Pod,
    Container,
}

/// LimitRangeItem declares usage bounds for one limit type.
#[derive(Debug, Clone, Default)]
pub struct LimitRangeItem {
    pub limit_type: Option<LimitType>,
    /// Min is the smallest usage allowed per declared resource dimension.
    pub min: ResourceList,
}

/// LimitRangeSpec defines the usage limits declared by a LimitRange.
#[derive(Debug, Clone, Default)]
pub struct LimitRangeSpec {
    pub limits: Vec<LimitRangeItem>,
}

/// LimitRange represents a namespace-scoped resource usage policy object.
#[derive(Debug, Clone)]
pub struct LimitRange {
    pub name: String,
    pub namespace: String,
    pub spec: LimitRangeSpec,
}

impl LimitRange {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            spec: LimitRangeSpec::default(),
        }
    }
}

impl ApiObject for LimitRange {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "LimitRange"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_as_api_object() {
        let pod = Pod::new("test", "default");
        let obj: &dyn ApiObject = &pod;
        assert_eq!(obj.kind(), "Pod");

        let downcast = obj.as_any().downcast_ref::<Pod>();
        assert!(downcast.is_some());
        assert_eq!(downcast.unwrap().name, "test");
    }

    #[test]
    fn test_resource_requirements_independent_maps() {
        let mut resources = ResourceRequirements::default();
        resources
            .limits
            .insert(RESOURCE_MEMORY.to_string(), "1Gi".parse().unwrap());

        assert!(resources.requests.get(RESOURCE_MEMORY).is_none());
        assert_eq!(
            resources.limits.get(RESOURCE_MEMORY).unwrap().value(),
            1073741824
        );
    }

    #[test]
    fn test_namespace_with_annotation() {
        let ns = Namespace::with_annotation("web", "team", "frontend");
        assert_eq!(
            ns.annotations.get("team").map(String::as_str),
            Some("frontend")
        );
        assert_eq!(ns.kind(), "Namespace");
    }

    #[test]
    fn test_limit_range_defaults_to_no_items() {
        let lr = LimitRange::new("limits", "web");
        assert!(lr.spec.limits.is_empty());
        assert_eq!(lr.kind(), "LimitRange");
    }
}
