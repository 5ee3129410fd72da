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

//! Admission error types.

use std::fmt;
use thiserror::Error;

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// AdmissionError represents errors that can occur during admission.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// BadRequest indicates a malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Forbidden indicates the request is not allowed.
    #[error("{0}")]
    Forbidden(ForbiddenError),

    /// Aggregate represents multiple errors.
    #[error("{0}")]
    Aggregate(AggregateError),

    /// Internal represents an internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// NotFound indicates a resource was not found.
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },
}

impl AdmissionError {
    /// Create a new BadRequest error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AdmissionError::BadRequest(msg.into())
    }

    /// Create a new Forbidden error.
    pub fn forbidden(
        name: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
        field_error: FieldError,
    ) -> Self {
        AdmissionError::Forbidden(ForbiddenError {
            name: name.into(),
            namespace: namespace.into(),
            resource: resource.into(),
            field_error,
        })
    }

    /// Create an aggregate error from multiple field errors.
    pub fn aggregate(errors: Vec<FieldError>) -> Self {
        AdmissionError::Aggregate(AggregateError { errors })
    }

    /// Create a NotFound error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        AdmissionError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal_error(msg: impl Into<String>) -> Self {
        AdmissionError::Internal(msg.into())
    }
}

/// ForbiddenError represents a forbidden admission error with field details.
#[derive(Debug)]
pub struct ForbiddenError {
    pub name: String,
    pub namespace: String,
    pub resource: String,
    pub field_error: FieldError,
}

impl fmt::Display for ForbiddenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" is forbidden: {}",
            self.resource, self.name, self.field_error
        )
    }
}

/// FieldError represents a field-level error.
#[derive(Debug)]
pub struct FieldError {
    pub field: String,
    pub error_type: FieldErrorType,
    pub detail: String,
}

impl FieldError {
    /// An invalid-value error for the given field.
    pub fn invalid(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error_type: FieldErrorType::Invalid,
            detail: detail.into(),
        }
    }

    /// A policy-forbidden error for the given field.
    pub fn forbidden(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error_type: FieldErrorType::Forbidden,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_type {
            FieldErrorType::Invalid => {
                write!(f, "{}: Invalid value: {}", self.field, self.detail)
            }
            FieldErrorType::Forbidden => {
                write!(f, "{}: Forbidden: {}", self.field, self.detail)
            }
        }
    }
}

/// FieldErrorType represents the type of field error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorType {
    /// Invalid indicates an invalid value.
    Invalid,
    /// Forbidden indicates a value the policy never accepts.
    Forbidden,
}

/// AggregateError represents multiple field errors.
#[derive(Debug)]
pub struct AggregateError {
    pub errors: Vec<FieldError>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error_strings: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", error_strings.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_error_display() {
        let err = AdmissionError::forbidden(
            "test-pod",
            "default",
            "pods",
            FieldError::invalid(
                "spec.containers[0].resources.requests.cpu",
                "mutated, expected \"200m\", observed \"300m\"",
            ),
        );
        let msg = err.to_string();
        assert!(msg.contains("pods \"test-pod\" is forbidden"));
        assert!(msg.contains("spec.containers[0].resources.requests.cpu"));
        assert!(msg.contains("expected \"200m\""));
    }

    #[test]
    fn test_field_error_forbidden_display() {
        let err = FieldError::forbidden("limitCPUToMemoryPercent", "may not all be zero");
        assert_eq!(
            err.to_string(),
            "limitCPUToMemoryPercent: Forbidden: may not all be zero"
        );
    }

    #[test]
    fn test_aggregate_error_display() {
        let errors = vec![
            FieldError::invalid("cpuRequestToLimitPercent", "110: must be between 0 and 100"),
            FieldError::invalid("memoryRequestToLimitPercent", "-5: must be between 0 and 100"),
        ];
        let err = AdmissionError::aggregate(errors);
        let msg = err.to_string();
        assert!(msg.starts_with('['));
        assert!(msg.ends_with(']'));
        assert!(msg.contains("cpuRequestToLimitPercent"));
        assert!(msg.contains("memoryRequestToLimitPercent"));
    }
}
