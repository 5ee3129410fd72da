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

//! ClusterResourceOverride admission controller.
//!
//! This admission controller configurably overrides container resource
//! requests and limits on pod creation: a memory request derived from the
//! memory limit, a CPU limit derived from the memory limit, and a CPU request
//! derived from the CPU limit. Derived values are clamped against absolute
//! floors and against the namespace's LimitRange minimums.
//!
//! The controller runs in both admission phases. The mutating phase writes
//! the derived values; the validating phase recomputes them and rejects the
//! pod if any value was altered in between. Both phases share one planning
//! function, so they cannot disagree about what the values should be.

pub mod config;

use crate::admission::{
    AdmissionError, AdmissionResult, Attributes, FieldError, Handler, Interface,
    MutationInterface, Operation, Plugins, ValidationInterface,
};
use crate::api::core::{
    LimitRange, LimitType, Namespace, Pod, ResourceRequirements, RESOURCE_CPU, RESOURCE_MEMORY,
};
use crate::api::resource::{Format, Quantity};
use crate::admission::attributes::GroupResource;
use crate::project::is_namespace_reserved;
use config::OverrideConfig;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Plugin name for the ClusterResourceOverride admission controller.
pub const PLUGIN_NAME: &str = "ClusterResourceOverride";

/// Namespace annotation controlling whether the override applies there.
/// A present value other than exactly "true" disables the override.
pub const CLUSTER_RESOURCE_OVERRIDE_ANNOTATION: &str =
    "autoscaling.openshift.io/cluster-resource-override-enabled";

/// 1000 millicores per 1 GiB of memory.
const CPU_BASE_SCALE_FACTOR: f64 = 1000.0 / (1024.0 * 1024.0 * 1024.0);

/// Smallest CPU quantity the override will ever produce.
const CPU_FLOOR: Quantity = Quantity::new_milli(1, Format::DecimalSI);

/// Smallest memory quantity the override will ever produce.
const MEM_FLOOR: Quantity = Quantity::new(1 << 20, Format::BinarySI);

/// Register the ClusterResourceOverride plugin with the plugin registry.
///
/// Without a configuration stream the plugin is registered inert, matching
/// the behavior of an unconfigured deployment.
pub fn register(plugins: &Plugins) {
    plugins.register(PLUGIN_NAME, |config_reader: Option<&mut dyn Read>| {
        let file_config = match config_reader {
            Some(reader) => config::read_config(reader)?,
            None => None,
        };
        if file_config.is_none() {
            debug!(plugin = PLUGIN_NAME, "not configured, plugin will be inert");
        }
        let internal = file_config.as_ref().map(OverrideConfig::from_config);
        Ok(Arc::new(ClusterResourceOverride::new(internal)) as Arc<dyn Interface>)
    });
}

// ============================================================================
// Lookup seams
// ============================================================================

/// Trait for namespace lookup.
pub trait NamespaceLister: Send + Sync {
    fn get(&self, name: &str) -> Option<Namespace>;
}

/// Trait for listing the limit ranges scoped to a namespace.
///
/// An empty list is a normal state. A returned error means the listing
/// itself failed and the request must be rejected rather than processed
/// with guessed floors.
pub trait LimitRangeLister: Send + Sync {
    fn list(&self, namespace: &str) -> AdmissionResult<Vec<LimitRange>>;
}

/// In-memory namespace store for testing.
#[derive(Debug, Default)]
pub struct InMemoryNamespaceStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl InMemoryNamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, ns: Namespace) {
        self.namespaces
            .write()
            .expect("namespace store lock poisoned")
            .insert(ns.name.clone(), ns);
    }
}

impl NamespaceLister for InMemoryNamespaceStore {
    fn get(&self, name: &str) -> Option<Namespace> {
        self.namespaces
            .read()
            .expect("namespace store lock poisoned")
            .get(name)
            .cloned()
    }
}

/// In-memory limit range store for testing.
#[derive(Debug, Default)]
pub struct InMemoryLimitRangeStore {
    ranges: RwLock<HashMap<String, Vec<LimitRange>>>,
}

impl InMemoryLimitRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, range: LimitRange) {
        self.ranges
            .write()
            .expect("limit range store lock poisoned")
            .entry(range.namespace.clone())
            .or_default()
            .push(range);
    }
}

impl LimitRangeLister for InMemoryLimitRangeStore {
    fn list(&self, namespace: &str) -> AdmissionResult<Vec<LimitRange>> {
        Ok(self
            .ranges
            .read()
            .expect("limit range store lock poisoned")
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// ClusterResourceOverride overrides container resource requests and limits
/// from configured ratios, clamped against namespace LimitRange minimums.
pub struct ClusterResourceOverride {
    handler: Handler,
    config: Option<OverrideConfig>,
    namespace_lister: Option<Arc<dyn NamespaceLister>>,
    limit_range_lister: Option<Arc<dyn LimitRangeLister>>,
}

/// The namespace-wide minimums derived from LimitRange policy, per dimension.
/// `None` means no policy object declares a minimum for that dimension.
#[derive(Debug, Clone, Copy, Default)]
struct NamespaceFloors {
    cpu: Option<Quantity>,
    memory: Option<Quantity>,
}

impl ClusterResourceOverride {
    /// Create a new ClusterResourceOverride admission controller.
    /// Without a configuration the controller admits everything untouched.
    pub fn new(config: Option<OverrideConfig>) -> Self {
        Self {
            handler: Handler::new_create(),
            config,
            namespace_lister: None,
            limit_range_lister: None,
        }
    }

    /// Attach a namespace lister.
    pub fn with_namespace_lister(mut self, lister: Arc<dyn NamespaceLister>) -> Self {
        self.namespace_lister = Some(lister);
        self
    }

    /// Attach a limit range lister.
    pub fn with_limit_range_lister(mut self, lister: Arc<dyn LimitRangeLister>) -> Self {
        self.limit_range_lister = Some(lister);
        self
    }

    /// Decide whether the override applies to this request, and resolve the
    /// namespace floors when it does. `Ok(None)` is a clean pass-through.
    ///
    /// The annotation check runs before the reservation check, and the
    /// reservation can never be overridden by the annotation. Floors are
    /// re-derived on every call; the two admission phases may be separated
    /// by other mutating plugins and must not share derived state.
    fn applicable_scope(
        &self,
        attributes: &dyn Attributes,
    ) -> AdmissionResult<Option<(OverrideConfig, NamespaceFloors)>> {
        let config = match self.config {
            Some(config) => config,
            None => return Ok(None),
        };
        if attributes.get_resource().group_resource() != GroupResource::new("", "pods")
            || !attributes.get_subresource().is_empty()
        {
            return Ok(None);
        }

        let namespace = attributes.get_namespace();
        if let Some(lister) = &self.namespace_lister {
            let ns = match lister.get(namespace) {
                Some(ns) => ns,
                None => {
                    warn!(namespace, "error retrieving namespace");
                    return Err(AdmissionError::not_found("Namespace", namespace));
                }
            };
            if let Some(enabled) = ns.annotations.get(CLUSTER_RESOURCE_OVERRIDE_ANNOTATION) {
                if enabled != "true" {
                    debug!(namespace, "override disabled by namespace annotation");
                    return Ok(None);
                }
            }
        }
        if is_namespace_reserved(namespace) {
            debug!(namespace, "skipping reserved namespace");
            return Ok(None);
        }

        let limit_ranges = match &self.limit_range_lister {
            Some(lister) => lister.list(namespace)?,
            None => Vec::new(),
        };
        let floors = NamespaceFloors {
            cpu: min_resource_limits(&limit_ranges, RESOURCE_CPU),
            memory: min_resource_limits(&limit_ranges, RESOURCE_MEMORY),
        };
        Ok(Some((config, floors)))
    }
}

impl Interface for ClusterResourceOverride {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }
}

impl MutationInterface for ClusterResourceOverride {
    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        let (config, floors) = match self.applicable_scope(attributes)? {
            Some(scope) => scope,
            None => return Ok(()),
        };

        let (pod_name, namespace) = (
            attributes.get_name().to_string(),
            attributes.get_namespace().to_string(),
        );
        let obj = match attributes.get_object_mut() {
            Some(o) => o,
            None => return Ok(()),
        };
        let pod = match obj.as_any_mut().downcast_mut::<Pod>() {
            Some(p) => p,
            None => {
                return Err(AdmissionError::bad_request(
                    "expected Pod but got a different object type",
                ));
            }
        };
        debug!(pod = %pod_name, %namespace, "overriding container resources");

        for container in pod
            .spec
            .init_containers
            .iter_mut()
            .chain(pod.spec.containers.iter_mut())
        {
            let planned = plan_container_overrides(&config, &container.resources, &floors);
            apply_overrides(&mut container.resources, &planned);
        }
        Ok(())
    }
}

impl ValidationInterface for ClusterResourceOverride {
    fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()> {
        let (config, floors) = match self.applicable_scope(attributes)? {
            Some(scope) => scope,
            None => return Ok(()),
        };

        let obj = match attributes.get_object() {
            Some(o) => o,
            None => return Ok(()),
        };
        let pod = match obj.as_any().downcast_ref::<Pod>() {
            Some(p) => p,
            None => {
                return Err(AdmissionError::bad_request(
                    "expected Pod but got a different object type",
                ));
            }
        };

        let container_sets = [
            ("spec.initContainers", &pod.spec.init_containers),
            ("spec.containers", &pod.spec.containers),
        ];
        for (path, containers) in container_sets {
            for (i, container) in containers.iter().enumerate() {
                let planned = plan_container_overrides(&config, &container.resources, &floors);
                verify_overrides(&container.resources, &planned).map_err(|violation| {
                    AdmissionError::forbidden(
                        pod.name.clone(),
                        pod.namespace.clone(),
                        "pods",
                        FieldError::invalid(
                            format!(
                                "{}[{}].resources.{}.{}",
                                path,
                                i,
                                violation.target.field(),
                                violation.resource
                            ),
                            violation.to_string(),
                        ),
                    )
                })?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Override planning
// ============================================================================

/// Which resource map an override lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideTarget {
    Requests,
    Limits,
}

impl OverrideTarget {
    fn field(self) -> &'static str {
        match self {
            OverrideTarget::Requests => "requests",
            OverrideTarget::Limits => "limits",
        }
    }
}

/// One quantity the override engine decided a container must carry.
#[derive(Debug, Clone)]
struct PlannedOverride {
    target: OverrideTarget,
    resource: &'static str,
    value: Quantity,
}

/// A verification failure: the object no longer carries a planned quantity.
#[derive(Debug)]
struct OverrideViolation {
    target: OverrideTarget,
    resource: &'static str,
    expected: Quantity,
    observed: Option<Quantity>,
}

impl fmt::Display for OverrideViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.observed {
            Some(observed) => write!(
                f,
                "mutated, expected \"{}\", observed \"{}\"",
                self.expected, observed
            ),
            None => write!(f, "mutated, expected \"{}\", now absent", self.expected),
        }
    }
}

/// Compute the overrides for one container.
///
/// The three derivations are independent and each requires both its input
/// limit and an active ratio. The memory limit is snapshotted up front; the
/// CPU limit is read after the second derivation so a freshly derived CPU
/// limit feeds the CPU request in the same pass.
fn plan_container_overrides(
    config: &OverrideConfig,
    resources: &ResourceRequirements,
    floors: &NamespaceFloors,
) -> Vec<PlannedOverride> {
    let mut planned = Vec::new();
    let mem_limit = resources.limits.get(RESOURCE_MEMORY).copied();

    if let (Some(mem_limit), Some(ratio)) = (mem_limit, config.memory_request_to_limit_ratio()) {
        // memory is measured in whole bytes; round the derived request down
        // to a whole unit of the limit's scale rather than leaving raw bytes
        let percent = (ratio * 100.0).round() as i64;
        let mut amount = mem_limit.value() * percent / 100;
        let unit = match mem_limit.format() {
            Format::BinarySI => 1 << 20,
            Format::DecimalSI => 1_000_000,
        };
        amount -= amount % unit;
        let value = clamp_to_floors(
            Quantity::new(amount, mem_limit.format()),
            MEM_FLOOR,
            floors.memory,
            RESOURCE_MEMORY,
        );
        planned.push(PlannedOverride {
            target: OverrideTarget::Requests,
            resource: RESOURCE_MEMORY,
            value,
        });
    }

    if let (Some(mem_limit), Some(ratio)) = (mem_limit, config.limit_cpu_to_memory_ratio()) {
        let amount = (mem_limit.value() as f64 * ratio * CPU_BASE_SCALE_FACTOR) as i64;
        let value = clamp_to_floors(
            Quantity::new_milli(amount, Format::DecimalSI),
            CPU_FLOOR,
            floors.cpu,
            RESOURCE_CPU,
        );
        planned.push(PlannedOverride {
            target: OverrideTarget::Limits,
            resource: RESOURCE_CPU,
            value,
        });
    }

    // read the CPU limit fresh: a limit planned above wins over the declared one
    let cpu_limit = planned
        .iter()
        .find(|p| p.target == OverrideTarget::Limits && p.resource == RESOURCE_CPU)
        .map(|p| p.value)
        .or_else(|| resources.limits.get(RESOURCE_CPU).copied());
    if let (Some(cpu_limit), Some(ratio)) = (cpu_limit, config.cpu_request_to_limit_ratio()) {
        let amount = (cpu_limit.milli_value() as f64 * ratio) as i64;
        let value = clamp_to_floors(
            Quantity::new_milli(amount, cpu_limit.format()),
            CPU_FLOOR,
            floors.cpu,
            RESOURCE_CPU,
        );
        planned.push(PlannedOverride {
            target: OverrideTarget::Requests,
            resource: RESOURCE_CPU,
            value,
        });
    }

    planned
}

/// Clamp a derived quantity up to the absolute floor and then up to the
/// namespace floor, when one is set.
fn clamp_to_floors(
    mut value: Quantity,
    absolute_floor: Quantity,
    namespace_floor: Option<Quantity>,
    resource: &str,
) -> Quantity {
    if absolute_floor > value {
        value = absolute_floor;
    }
    if let Some(floor) = namespace_floor {
        if value < floor {
            debug!(
                resource,
                value = %value,
                floor = %floor,
                "derived value below namespace minimum, clamping"
            );
            value = floor;
        }
    }
    value
}

/// Mutating-phase arm of the applier: insert-or-overwrite each planned value.
fn apply_overrides(resources: &mut ResourceRequirements, planned: &[PlannedOverride]) {
    for p in planned {
        let list = match p.target {
            OverrideTarget::Requests => &mut resources.requests,
            OverrideTarget::Limits => &mut resources.limits,
        };
        list.insert(p.resource.to_string(), p.value);
    }
}

/// Validating-phase arm of the applier: every planned value must already be
/// present and numerically equal. Comparison is by quantity value, never by
/// representation.
fn verify_overrides(
    resources: &ResourceRequirements,
    planned: &[PlannedOverride],
) -> Result<(), OverrideViolation> {
    for p in planned {
        let list = match p.target {
            OverrideTarget::Requests => &resources.requests,
            OverrideTarget::Limits => &resources.limits,
        };
        match list.get(p.resource) {
            Some(observed) if *observed == p.value => {}
            observed => {
                return Err(OverrideViolation {
                    target: p.target,
                    resource: p.resource,
                    expected: p.value,
                    observed: observed.copied(),
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Floor resolution
// ============================================================================

/// The smallest per-container minimum declared for `resource_name` across
/// all limit ranges. `None` when no limit range declares one.
///
/// The returned quantity is a copy; it never aliases the policy objects.
fn min_resource_limits(limit_ranges: &[LimitRange], resource_name: &str) -> Option<Quantity> {
    let mut min: Option<Quantity> = None;
    for limit_range in limit_ranges {
        for item in &limit_range.spec.limits {
            if item.limit_type != Some(LimitType::Container) {
                continue;
            }
            if let Some(declared) = item.min.get(resource_name) {
                match min {
                    Some(current) if *declared >= current => {}
                    _ => min = Some(*declared),
                }
            }
        }
    }
    min
}

// ============================================================================
// Tests
// ============================================================================
