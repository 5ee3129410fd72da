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

//! ClusterResourceOverride admission controller in Rust
//!
//! This crate provides a Rust implementation of the cluster resource override
//! admission controller, originally implemented in Go. For every pod-creation
//! request it computes corrected CPU/memory requests and limits from
//! configured ratios, clamps them against per-namespace LimitRange minimums,
//! and re-verifies the computation during the validating admission phase.

pub mod admission;
pub mod api;
pub mod plugins;
pub mod project;

// Re-export commonly used types
pub use admission::{
    Attributes, AttributesRecord, Handler, Interface, MutationInterface, Operation,
    ValidationInterface,
};
pub use api::core::{Container, LimitRange, Namespace, Pod, PodSpec, ResourceRequirements};
pub use api::resource::{Format, Quantity};
pub use plugins::clusterresourceoverride::ClusterResourceOverride;
