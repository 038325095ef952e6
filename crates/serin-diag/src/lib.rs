//! Error reporting and diagnostics for Serin.
//!
//! This crate provides structured diagnostics with source location tracking.
//! Key invariant: no inference variables in user-facing output.
//!
//! Diagnostics are created by other crates (for example, `serin-check`) and
//! rendered here for display.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Expression type does not match the expected type.
    TypeMismatch,
    /// A referenced name has no matching declaration.
    UndefinedName,
    /// A name resolves to more than one declaration.
    AmbiguousUse,
    /// A declaration depends on its own type.
    CircularDependency,
    /// A trait refines itself, directly or transitively.
    CircularRefinement,
    /// A non-void function returns without a value.
    MissingReturnValue,
    /// The result of a non-void expression statement is ignored.
    UnusedResult,
    /// A conformance list names something that is not a trait.
    ConformanceToNonTrait,
    /// Two parameters of one entity share a name.
    DuplicateParameterName,
    /// Two captures of one function share a name.
    DuplicateCaptureName,
    /// Two operator declarations share notation and name in a module.
    DuplicateOperator,
    /// The same conformance is declared twice in overlapping scopes.
    RedundantConformance,
    /// A conformance does not satisfy a trait requirement.
    UnsatisfiedRequirement,
    /// `Self` is used outside a type scope.
    InvalidSelfReference,
    /// A call applies something that is not callable.
    NotCallable,
    /// Wrong number of static arguments for a generic declaration.
    GenericArgumentCount,
    /// Argument labels do not match parameter labels.
    ArgumentLabelMismatch,
    /// An extension or conformance targets a built-in type.
    CannotExtendBuiltin,
    /// A mutating bundle variant does not return `(self, value)`.
    MutatingBundleReturn,
    /// A sum type expression has no elements.
    EmptySumType,
    /// A sum type expression has exactly one element.
    SingletonSumType,
    /// A sum type element denotes a value instead of a type.
    ValueInSumType,
    /// A where-clause constraint is malformed.
    InvalidConstraint,
    /// Inference finished with an unsolved type variable.
    NoContextToInfer,
    /// A type position names a value declaration.
    NameRefersToValue,
    /// An associated type is used outside its trait's domain.
    InvalidAssociatedType,
    /// A required type annotation is missing.
    MissingAnnotation,
    /// Two distinct declarations match one implicit capture.
    AmbiguousCapture,
    /// The construct is recognized but not supported yet.
    Unsupported,
}

impl Category {
    pub const ALL: [Category; 29] = [
        Category::TypeMismatch,
        Category::UndefinedName,
        Category::AmbiguousUse,
        Category::CircularDependency,
        Category::CircularRefinement,
        Category::MissingReturnValue,
        Category::UnusedResult,
        Category::ConformanceToNonTrait,
        Category::DuplicateParameterName,
        Category::DuplicateCaptureName,
        Category::DuplicateOperator,
        Category::RedundantConformance,
        Category::UnsatisfiedRequirement,
        Category::InvalidSelfReference,
        Category::NotCallable,
        Category::GenericArgumentCount,
        Category::ArgumentLabelMismatch,
        Category::CannotExtendBuiltin,
        Category::MutatingBundleReturn,
        Category::EmptySumType,
        Category::SingletonSumType,
        Category::ValueInSumType,
        Category::InvalidConstraint,
        Category::NoContextToInfer,
        Category::NameRefersToValue,
        Category::InvalidAssociatedType,
        Category::MissingAnnotation,
        Category::AmbiguousCapture,
        Category::Unsupported,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::TypeMismatch => "type_mismatch",
            Category::UndefinedName => "undefined_name",
            Category::AmbiguousUse => "ambiguous_use",
            Category::CircularDependency => "circular_dependency",
            Category::CircularRefinement => "circular_refinement",
            Category::MissingReturnValue => "missing_return_value",
            Category::UnusedResult => "unused_result",
            Category::ConformanceToNonTrait => "conformance_to_non_trait",
            Category::DuplicateParameterName => "duplicate_parameter_name",
            Category::DuplicateCaptureName => "duplicate_capture_name",
            Category::DuplicateOperator => "duplicate_operator",
            Category::RedundantConformance => "redundant_conformance",
            Category::UnsatisfiedRequirement => "unsatisfied_requirement",
            Category::InvalidSelfReference => "invalid_self_reference",
            Category::NotCallable => "not_callable",
            Category::GenericArgumentCount => "generic_argument_count",
            Category::ArgumentLabelMismatch => "argument_label_mismatch",
            Category::CannotExtendBuiltin => "cannot_extend_builtin",
            Category::MutatingBundleReturn => "mutating_bundle_return",
            Category::EmptySumType => "empty_sum_type",
            Category::SingletonSumType => "singleton_sum_type",
            Category::ValueInSumType => "value_in_sum_type",
            Category::InvalidConstraint => "invalid_constraint",
            Category::NoContextToInfer => "no_context_to_infer",
            Category::NameRefersToValue => "name_refers_to_value",
            Category::InvalidAssociatedType => "invalid_associated_type",
            Category::MissingAnnotation => "missing_annotation",
            Category::AmbiguousCapture => "ambiguous_capture",
            Category::Unsupported => "unsupported",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::TypeMismatch => "E0001",
            Category::UndefinedName => "E0002",
            Category::AmbiguousUse => "E0003",
            Category::CircularDependency => "E0004",
            Category::CircularRefinement => "E0005",
            Category::MissingReturnValue => "E0006",
            Category::UnusedResult => "E0007",
            Category::ConformanceToNonTrait => "E0008",
            Category::DuplicateParameterName => "E0009",
            Category::DuplicateCaptureName => "E0010",
            Category::DuplicateOperator => "E0011",
            Category::RedundantConformance => "E0012",
            Category::UnsatisfiedRequirement => "E0013",
            Category::InvalidSelfReference => "E0014",
            Category::NotCallable => "E0015",
            Category::GenericArgumentCount => "E0016",
            Category::ArgumentLabelMismatch => "E0017",
            Category::CannotExtendBuiltin => "E0018",
            Category::MutatingBundleReturn => "E0019",
            Category::EmptySumType => "E0020",
            Category::SingletonSumType => "E0021",
            Category::ValueInSumType => "E0022",
            Category::InvalidConstraint => "E0023",
            Category::NoContextToInfer => "E0024",
            Category::NameRefersToValue => "E0025",
            Category::InvalidAssociatedType => "E0026",
            Category::MissingAnnotation => "E0027",
            Category::AmbiguousCapture => "E0028",
            Category::Unsupported => "E0029",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of serin-ast's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. Callers convert from `serin-ast` spans to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
///
/// Every diagnostic carries enough context to produce an actionable error
/// message without exposing internal checker state.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0001).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Additional labeled spans (e.g., "previous declaration is here").
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagLabel {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn note(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Note,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_builder() {
        let loc = SourceLocation {
            file_id: 0,
            start: 10,
            end: 20,
        };
        let diag = Diagnostic::error(Category::UndefinedName, "undefined name `frobnicate`")
            .at(loc)
            .with_help("check the spelling or import the defining module");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("E0002"));
        assert_eq!(diag.category, Category::UndefinedName);
        assert!(diag.message.contains("frobnicate"));
        assert!(diag.help.unwrap().contains("spelling"));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::error(Category::TypeMismatch, "expected `Int`, found `Bool`");
        let s = format!("{diag}");
        assert!(s.starts_with("error[E0001]: expected `Int`"));
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(
                codes.insert(cat.code()),
                "duplicate diagnostic code detected: {}",
                cat.code()
            );
        }
    }
}
