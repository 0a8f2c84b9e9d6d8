//! # Published Capability Surface
//!
//! A resolved archive publishes named operations (editors, generators,
//! reviewers, handlers). This module assembles that surface from the raw
//! operations a loader extracted: each operation runs through a fixed
//! pipeline of pure transformations in order, and the manifest's
//! [`excludes`](crate::manifest::SurfaceExcludes) then hide named operations
//! from the surface without touching the dependency graph underneath.
//!
//! The transformations are deliberately plain functions applied in a fixed
//! order rather than a decorator stack; each takes an operation and returns
//! the adjusted operation.

use crate::Coordinate;
use crate::manifest::SurfaceExcludes;

//================================================================================================
// Types
//================================================================================================

/// The category an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Transforms an existing project.
    Editor,
    /// Creates a new project.
    Generator,
    /// Inspects a project and reports.
    Reviewer,
    /// Reacts to an external event.
    Handler,
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// The parameter name.
    pub name: String,
    /// The declared default value, if any.
    pub default: Option<String>,
    /// Whether a caller must supply a value.
    pub required: bool,
}

/// One operation published by a resolved archive.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The operation's name; qualified with its archive's coordinates once
    /// assembled into a surface.
    pub name: String,
    /// The operation's category.
    pub kind: OperationKind,
    /// The declared parameters.
    pub parameters: Vec<Parameter>,
    /// The archive the operation came from, attached during assembly.
    pub provenance: Option<Coordinate>,
}

/// The assembled, pruned set of operations an archive publishes.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySurface {
    operations: Vec<Operation>,
}

//================================================================================================
// Impls
//================================================================================================

impl Operation {
    /// Creates a raw operation as a loader would hand it over.
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: Vec::new(),
            provenance: None,
        }
    }

    /// Returns self with another declared parameter.
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        default: Option<&str>,
        required: bool,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            default: default.map(Into::into),
            required,
        });
        self
    }
}

impl CapabilitySurface {
    /// Assembles the surface an archive publishes: excluded names are dropped
    /// first, then every remaining operation runs through the transformation
    /// pipeline.
    pub fn assemble(
        archive: &Coordinate,
        operations: Vec<Operation>,
        excludes: &SurfaceExcludes,
    ) -> Self {
        let operations = operations
            .into_iter()
            .filter(|op| {
                let hidden = excluded_names(excludes, op.kind).contains(&op.name);
                if hidden {
                    tracing::debug!(name = %op.name, kind = ?op.kind, "hidden from surface");
                }
                !hidden
            })
            .map(|op| qualify_name(apply_parameter_defaults(attach_provenance(op, archive)), archive))
            .collect();
        Self { operations }
    }

    /// The published operations.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Looks an operation up by its qualified name.
    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Records which archive contributed the operation.
fn attach_provenance(mut op: Operation, archive: &Coordinate) -> Operation {
    op.provenance = Some(archive.clone());
    op
}

/// A parameter that carries a default no longer needs a caller-supplied
/// value.
fn apply_parameter_defaults(mut op: Operation) -> Operation {
    for parameter in &mut op.parameters {
        if parameter.default.is_some() {
            parameter.required = false;
        }
    }
    op
}

/// Qualifies the operation name with its archive's group and artifact.
fn qualify_name(mut op: Operation, archive: &Coordinate) -> Operation {
    op.name = format!("{}.{}.{}", archive.group(), archive.artifact(), op.name);
    op
}

fn excluded_names(excludes: &SurfaceExcludes, kind: OperationKind) -> &[String] {
    match kind {
        OperationKind::Editor => &excludes.editors,
        OperationKind::Generator => &excludes.generators,
        OperationKind::Reviewer => &excludes.reviewers,
        OperationKind::Handler => &excludes.handlers,
    }
}
