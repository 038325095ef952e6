//! Type representations for Serin.
//!
//! This crate defines the semantic types used by the checker. These are
//! distinct from syntactic annotations (which live in `serin-ast`): a
//! semantic type references declarations by arena index and carries no
//! source location.
//!
//! The algebra is closed. Every term exposes a [`TypeFlags`] summary used
//! to skip work (no variables to substitute, already canonical) and a
//! [`Type::transform`] fold that the checker builds substitution, opening,
//! and skolemization on top of.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serin_ast::{AccessEffect, Ast, DeclId, ExprId, Name, index_key};

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Structural properties of a type term, closed under union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeFlags(u8);

impl TypeFlags {
    pub const EMPTY: TypeFlags = TypeFlags(0);
    pub const HAS_ERROR: TypeFlags = TypeFlags(1 << 0);
    pub const HAS_VARIABLE: TypeFlags = TypeFlags(1 << 1);
    pub const HAS_SKOLEM: TypeFlags = TypeFlags(1 << 2);
    pub const HAS_GENERIC_TYPE_PARAMETER: TypeFlags = TypeFlags(1 << 3);
    pub const HAS_GENERIC_VALUE_PARAMETER: TypeFlags = TypeFlags(1 << 4);
    pub const NOT_CANONICAL: TypeFlags = TypeFlags(1 << 5);

    pub fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for TypeFlags {
    type Output = TypeFlags;

    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for TypeFlags {
    fn bitor_assign(&mut self, rhs: TypeFlags) {
        self.0 |= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Identifiers and small sets
// ---------------------------------------------------------------------------

/// Unique identifier for an inference variable. Identity-based equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVariable(pub u64);

/// The set of access effects a method bundle or subscript implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    const ORDER: [AccessEffect; 5] = [
        AccessEffect::Let,
        AccessEffect::Inout,
        AccessEffect::Set,
        AccessEffect::Sink,
        AccessEffect::Yielded,
    ];

    fn bit(effect: AccessEffect) -> u8 {
        match effect {
            AccessEffect::Let => 1 << 0,
            AccessEffect::Inout => 1 << 1,
            AccessEffect::Set => 1 << 2,
            AccessEffect::Sink => 1 << 3,
            AccessEffect::Yielded => 1 << 4,
        }
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, effect: AccessEffect) {
        self.0 |= Self::bit(effect);
    }

    pub fn contains(self, effect: AccessEffect) -> bool {
        self.0 & Self::bit(effect) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in the fixed `let, inout, set, sink, yielded` order.
    pub fn iter(self) -> impl Iterator<Item = AccessEffect> {
        Self::ORDER.into_iter().filter(move |&e| self.contains(e))
    }
}

impl FromIterator<AccessEffect> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = AccessEffect>>(iter: I) -> Self {
        let mut set = Self::empty();
        for e in iter {
            set.insert(e);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// A symbolic value-level term. Value-generic arguments are never
/// evaluated by the checker; they stay as placeholders for later stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueTerm {
    /// A reference to a generic value parameter or associated value.
    Parameter(DeclId),
    /// An arbitrary expression, kept by node id.
    Expr(ExprId),
}

/// An argument of a bound generic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericArgument {
    Type(Type),
    Value(ValueTerm),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallableParameter {
    pub label: Option<Name>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleElement {
    pub label: Option<Name>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LambdaType {
    pub receiver_effect: AccessEffect,
    pub environment: Box<Type>,
    pub inputs: Vec<CallableParameter>,
    pub output: Box<Type>,
}

impl LambdaType {
    /// A thin lambda: empty environment, `let` receiver.
    pub fn thin(inputs: Vec<CallableParameter>, output: Type) -> Self {
        Self {
            receiver_effect: AccessEffect::Let,
            environment: Box::new(Type::void()),
            inputs,
            output: Box::new(output),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = Option<&str>> {
        self.inputs.iter().map(|p| p.label.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    pub capabilities: CapabilitySet,
    pub receiver: Box<Type>,
    pub inputs: Vec<CallableParameter>,
    pub output: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptType {
    pub is_property: bool,
    pub capabilities: CapabilitySet,
    pub environment: Box<Type>,
    pub inputs: Vec<CallableParameter>,
    pub output: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterType {
    pub convention: AccessEffect,
    pub bare: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteType {
    pub effect: AccessEffect,
    pub projectee: Box<Type>,
}

/// A built-in type, visible when the builtin module is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// The `Builtin` module itself, usable as a name-resolution domain.
    Module,
    /// An opaque machine pointer.
    Ptr,
    /// A machine word.
    Word,
    /// An integer of the given bit width.
    I(u32),
    Float32,
    Float64,
}

impl BuiltinType {
    /// Parse a builtin type name (`ptr`, `word`, `i64`, `float64`, …).
    pub fn parse(name: &str) -> Option<BuiltinType> {
        match name {
            "ptr" => Some(BuiltinType::Ptr),
            "word" => Some(BuiltinType::Word),
            "float32" => Some(BuiltinType::Float32),
            "float64" => Some(BuiltinType::Float64),
            _ => {
                let width = name.strip_prefix('i')?.parse().ok()?;
                Some(BuiltinType::I(width))
            }
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltinType::Module => write!(f, "Builtin"),
            BuiltinType::Ptr => write!(f, "Builtin.ptr"),
            BuiltinType::Word => write!(f, "Builtin.word"),
            BuiltinType::I(w) => write!(f, "Builtin.i{w}"),
            BuiltinType::Float32 => write!(f, "Builtin.float32"),
            BuiltinType::Float64 => write!(f, "Builtin.float64"),
        }
    }
}

/// A semantic type term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The top type; every type is a subtype of it.
    Any,
    /// A fresh inference hole.
    Variable(TypeVariable),
    /// A rigid stand-in for the generic parameter it references.
    Skolem(DeclId),
    GenericTypeParameter(DeclId),
    GenericValueParameter(DeclId),
    AssociatedType { decl: DeclId, domain: Box<Type> },
    AssociatedValue { decl: DeclId, domain: Box<Type> },
    Product(DeclId),
    Trait(DeclId),
    /// Unfolds to `aliased`; not canonical by definition.
    TypeAlias { decl: DeclId, aliased: Box<Type> },
    BoundGeneric {
        base: Box<Type>,
        arguments: Vec<GenericArgument>,
    },
    Lambda(LambdaType),
    Method(MethodType),
    Subscript(SubscriptType),
    Parameter(ParameterType),
    Remote(RemoteType),
    Tuple(Vec<TupleElement>),
    /// Unordered elements; canonical form is sorted and deduplicated.
    /// The empty sum is `Never`.
    Sum(Vec<Type>),
    /// `subject` viewed through its conformance to the trait `lens`.
    ConformanceLens { subject: Box<Type>, lens: DeclId },
    Metatype(Box<Type>),
    Builtin(BuiltinType),
    /// Bottom marker; propagates without diagnosing.
    Error,
}

/// Action returned by a [`Type::transform`] callback.
pub enum TransformAction {
    /// Recurse into the term's parts.
    StepInto,
    /// Replace the whole term and stop descending.
    StepOver(Type),
}

impl Type {
    pub fn void() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn never() -> Type {
        Type::Sum(Vec::new())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Tuple(elements) if elements.is_empty())
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Sum(elements) if elements.is_empty())
    }

    pub fn is_error(&self) -> bool {
        self.flags().contains(TypeFlags::HAS_ERROR)
    }

    pub fn has_variable(&self) -> bool {
        self.flags().contains(TypeFlags::HAS_VARIABLE)
    }

    pub fn has_skolem(&self) -> bool {
        self.flags().contains(TypeFlags::HAS_SKOLEM)
    }

    pub fn has_generic_parameter(&self) -> bool {
        let flags = self.flags();
        flags.contains(TypeFlags::HAS_GENERIC_TYPE_PARAMETER)
            || flags.contains(TypeFlags::HAS_GENERIC_VALUE_PARAMETER)
    }

    pub fn is_canonical(&self) -> bool {
        !self.flags().contains(TypeFlags::NOT_CANONICAL)
    }

    /// Strip an outer parameter-convention wrapper, if any.
    pub fn bare(&self) -> &Type {
        match self {
            Type::Parameter(p) => &p.bare,
            _ => self,
        }
    }

    /// Build a sum from arbitrary elements; callers diagnose arity.
    /// The result is already canonical with respect to ordering.
    pub fn sum(elements: impl IntoIterator<Item = Type>) -> Type {
        let mut elements: Vec<Type> = elements.into_iter().map(|e| e.canonical()).collect();
        elements.sort_by(identity_cmp);
        elements.dedup();
        if elements.len() == 1 {
            elements.pop().expect("length checked")
        } else {
            Type::Sum(elements)
        }
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    pub fn flags(&self) -> TypeFlags {
        let mut flags = TypeFlags::EMPTY;
        match self {
            Type::Any | Type::Builtin(_) => {}
            Type::Variable(_) => flags |= TypeFlags::HAS_VARIABLE,
            Type::Skolem(_) => flags |= TypeFlags::HAS_SKOLEM,
            Type::GenericTypeParameter(_) => flags |= TypeFlags::HAS_GENERIC_TYPE_PARAMETER,
            Type::GenericValueParameter(_) => flags |= TypeFlags::HAS_GENERIC_VALUE_PARAMETER,
            Type::AssociatedType { domain, .. } | Type::AssociatedValue { domain, .. } => {
                flags |= domain.flags();
            }
            Type::Product(_) | Type::Trait(_) => {}
            Type::TypeAlias { aliased, .. } => {
                flags |= aliased.flags() | TypeFlags::NOT_CANONICAL;
            }
            Type::BoundGeneric { base, arguments } => {
                flags |= base.flags();
                if arguments.is_empty() {
                    flags |= TypeFlags::NOT_CANONICAL;
                }
                for a in arguments {
                    match a {
                        GenericArgument::Type(t) => flags |= t.flags(),
                        GenericArgument::Value(ValueTerm::Parameter(_)) => {
                            flags |= TypeFlags::HAS_GENERIC_VALUE_PARAMETER;
                        }
                        GenericArgument::Value(ValueTerm::Expr(_)) => {}
                    }
                }
            }
            Type::Lambda(l) => {
                flags |= l.environment.flags() | l.output.flags();
                for p in &l.inputs {
                    flags |= p.ty.flags();
                }
            }
            Type::Method(m) => {
                flags |= m.receiver.flags() | m.output.flags();
                for p in &m.inputs {
                    flags |= p.ty.flags();
                }
            }
            Type::Subscript(s) => {
                flags |= s.environment.flags() | s.output.flags();
                for p in &s.inputs {
                    flags |= p.ty.flags();
                }
            }
            Type::Parameter(p) => flags |= p.bare.flags(),
            Type::Remote(r) => flags |= r.projectee.flags(),
            Type::Tuple(elements) => {
                for e in elements {
                    flags |= e.ty.flags();
                }
            }
            Type::Sum(elements) => {
                if elements.len() == 1 {
                    flags |= TypeFlags::NOT_CANONICAL;
                }
                let mut sorted = true;
                for window in elements.windows(2) {
                    if identity_cmp(&window[0], &window[1]) != Ordering::Less {
                        sorted = false;
                    }
                }
                if !sorted {
                    flags |= TypeFlags::NOT_CANONICAL;
                }
                for e in elements {
                    flags |= e.flags();
                }
            }
            Type::ConformanceLens { subject, .. } => flags |= subject.flags(),
            Type::Metatype(t) => flags |= t.flags(),
            Type::Error => flags |= TypeFlags::HAS_ERROR,
        }
        flags
    }

    // -----------------------------------------------------------------------
    // Canonicalization
    // -----------------------------------------------------------------------

    /// The representative of this type's equivalence class: aliases
    /// unfolded, sum elements sorted and deduplicated, argument-less
    /// bound generics collapsed to their base.
    pub fn canonical(&self) -> Type {
        if self.is_canonical() {
            return self.clone();
        }
        match self {
            Type::TypeAlias { aliased, .. } => aliased.canonical(),
            Type::Sum(elements) => Type::sum(elements.iter().cloned()),
            Type::BoundGeneric { base, arguments } if arguments.is_empty() => base.canonical(),
            _ => self.mapping_parts(&mut |part| part.canonical()),
        }
    }

    // -----------------------------------------------------------------------
    // Transformation
    // -----------------------------------------------------------------------

    /// Fold over the term. `f` decides per node whether to recurse
    /// ([`TransformAction::StepInto`]) or substitute a replacement and
    /// stop ([`TransformAction::StepOver`]).
    pub fn transform(&self, f: &mut impl FnMut(&Type) -> TransformAction) -> Type {
        match f(self) {
            TransformAction::StepOver(t) => t,
            TransformAction::StepInto => self.mapping_parts(&mut |part| part.transform(f)),
        }
    }

    /// Rebuild the term with `f` applied to each direct part.
    fn mapping_parts(&self, f: &mut impl FnMut(&Type) -> Type) -> Type {
        match self {
            Type::Any
            | Type::Variable(_)
            | Type::Skolem(_)
            | Type::GenericTypeParameter(_)
            | Type::GenericValueParameter(_)
            | Type::Product(_)
            | Type::Trait(_)
            | Type::Builtin(_)
            | Type::Error => self.clone(),
            Type::AssociatedType { decl, domain } => Type::AssociatedType {
                decl: *decl,
                domain: Box::new(f(domain)),
            },
            Type::AssociatedValue { decl, domain } => Type::AssociatedValue {
                decl: *decl,
                domain: Box::new(f(domain)),
            },
            Type::TypeAlias { decl, aliased } => Type::TypeAlias {
                decl: *decl,
                aliased: Box::new(f(aliased)),
            },
            Type::BoundGeneric { base, arguments } => Type::BoundGeneric {
                base: Box::new(f(base)),
                arguments: arguments
                    .iter()
                    .map(|a| match a {
                        GenericArgument::Type(t) => GenericArgument::Type(f(t)),
                        GenericArgument::Value(v) => GenericArgument::Value(v.clone()),
                    })
                    .collect(),
            },
            Type::Lambda(l) => Type::Lambda(LambdaType {
                receiver_effect: l.receiver_effect,
                environment: Box::new(f(&l.environment)),
                inputs: map_parameters(&l.inputs, f),
                output: Box::new(f(&l.output)),
            }),
            Type::Method(m) => Type::Method(MethodType {
                capabilities: m.capabilities,
                receiver: Box::new(f(&m.receiver)),
                inputs: map_parameters(&m.inputs, f),
                output: Box::new(f(&m.output)),
            }),
            Type::Subscript(s) => Type::Subscript(SubscriptType {
                is_property: s.is_property,
                capabilities: s.capabilities,
                environment: Box::new(f(&s.environment)),
                inputs: map_parameters(&s.inputs, f),
                output: Box::new(f(&s.output)),
            }),
            Type::Parameter(p) => Type::Parameter(ParameterType {
                convention: p.convention,
                bare: Box::new(f(&p.bare)),
            }),
            Type::Remote(r) => Type::Remote(RemoteType {
                effect: r.effect,
                projectee: Box::new(f(&r.projectee)),
            }),
            Type::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|e| TupleElement {
                        label: e.label.clone(),
                        ty: f(&e.ty),
                    })
                    .collect(),
            ),
            Type::Sum(elements) => Type::Sum(elements.iter().map(|e| f(e)).collect()),
            Type::ConformanceLens { subject, lens } => Type::ConformanceLens {
                subject: Box::new(f(subject)),
                lens: *lens,
            },
            Type::Metatype(t) => Type::Metatype(Box::new(f(t))),
        }
    }

    // -----------------------------------------------------------------------
    // Substitution
    // -----------------------------------------------------------------------

    /// Substitute generic parameters by declaration.
    ///
    /// Associated-type projections whose domain becomes concrete are left
    /// in place; the checker completes them with a member lookup.
    pub fn specialized(&self, substitutions: &GenericSubstitutions) -> Type {
        if !self.has_generic_parameter() {
            return self.clone();
        }
        self.transform(&mut |t| match t {
            Type::GenericTypeParameter(d) => match substitutions.types.get(d) {
                Some(replacement) => TransformAction::StepOver(replacement.clone()),
                None => TransformAction::StepInto,
            },
            Type::BoundGeneric { base, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|a| match a {
                        GenericArgument::Type(ty) => {
                            GenericArgument::Type(ty.specialized(substitutions))
                        }
                        GenericArgument::Value(ValueTerm::Parameter(d)) => GenericArgument::Value(
                            substitutions
                                .values
                                .get(d)
                                .cloned()
                                .unwrap_or(ValueTerm::Parameter(*d)),
                        ),
                        GenericArgument::Value(v) => GenericArgument::Value(v.clone()),
                    })
                    .collect();
                TransformAction::StepOver(Type::BoundGeneric {
                    base: Box::new(base.specialized(substitutions)),
                    arguments,
                })
            }
            _ => TransformAction::StepInto,
        })
    }

    /// Substitute inference variables from an assignment map.
    pub fn substituting_variables(&self, assignments: &HashMap<TypeVariable, Type>) -> Type {
        if !self.has_variable() {
            return self.clone();
        }
        self.transform(&mut |t| match t {
            Type::Variable(v) => match assignments.get(v) {
                // The replacement may itself contain assigned variables.
                Some(replacement) => {
                    TransformAction::StepOver(replacement.substituting_variables(assignments))
                }
                None => TransformAction::StepInto,
            },
            _ => TransformAction::StepInto,
        })
    }

    /// Collect the free inference variables of the term.
    pub fn free_variables(&self) -> Vec<TypeVariable> {
        let mut out = Vec::new();
        self.transform(&mut |t| {
            if let Type::Variable(v) = t {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            TransformAction::StepInto
        });
        out
    }

    /// Render the type against the AST's declaration names.
    pub fn display<'a>(&'a self, ast: &'a Ast) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, ast }
    }
}

fn map_parameters(
    inputs: &[CallableParameter],
    f: &mut impl FnMut(&Type) -> Type,
) -> Vec<CallableParameter> {
    inputs
        .iter()
        .map(|p| CallableParameter {
            label: p.label.clone(),
            ty: f(&p.ty),
        })
        .collect()
}

/// Maps generic parameter declarations to their arguments.
#[derive(Debug, Clone, Default)]
pub struct GenericSubstitutions {
    pub types: HashMap<DeclId, Type>,
    pub values: HashMap<DeclId, ValueTerm>,
}

// ---------------------------------------------------------------------------
// Identity ordering
// ---------------------------------------------------------------------------

fn rank(t: &Type) -> u8 {
    match t {
        Type::Any => 0,
        Type::Variable(_) => 1,
        Type::Skolem(_) => 2,
        Type::GenericTypeParameter(_) => 3,
        Type::GenericValueParameter(_) => 4,
        Type::AssociatedType { .. } => 5,
        Type::AssociatedValue { .. } => 6,
        Type::Product(_) => 7,
        Type::Trait(_) => 8,
        Type::TypeAlias { .. } => 9,
        Type::BoundGeneric { .. } => 10,
        Type::Lambda(_) => 11,
        Type::Method(_) => 12,
        Type::Subscript(_) => 13,
        Type::Parameter(_) => 14,
        Type::Remote(_) => 15,
        Type::Tuple(_) => 16,
        Type::Sum(_) => 17,
        Type::ConformanceLens { .. } => 18,
        Type::Metatype(_) => 19,
        Type::Builtin(_) => 20,
        Type::Error => 21,
    }
}

fn builtin_rank(b: BuiltinType) -> (u8, u32) {
    match b {
        BuiltinType::Module => (0, 0),
        BuiltinType::Ptr => (1, 0),
        BuiltinType::Word => (2, 0),
        BuiltinType::I(w) => (3, w),
        BuiltinType::Float32 => (4, 0),
        BuiltinType::Float64 => (5, 0),
    }
}

/// A total, deterministic ordering on type identity, used to sort sum
/// elements into canonical form and break ties reproducibly.
pub fn identity_cmp(a: &Type, b: &Type) -> Ordering {
    match (a, b) {
        (Type::Variable(x), Type::Variable(y)) => x.cmp(y),
        (Type::Skolem(x), Type::Skolem(y))
        | (Type::GenericTypeParameter(x), Type::GenericTypeParameter(y))
        | (Type::GenericValueParameter(x), Type::GenericValueParameter(y))
        | (Type::Product(x), Type::Product(y))
        | (Type::Trait(x), Type::Trait(y)) => index_key(*x).cmp(&index_key(*y)),
        (
            Type::AssociatedType { decl: xd, domain: xs },
            Type::AssociatedType { decl: yd, domain: ys },
        )
        | (
            Type::AssociatedValue { decl: xd, domain: xs },
            Type::AssociatedValue { decl: yd, domain: ys },
        ) => index_key(*xd)
            .cmp(&index_key(*yd))
            .then_with(|| identity_cmp(xs, ys)),
        (
            Type::TypeAlias { decl: xd, aliased: xs },
            Type::TypeAlias { decl: yd, aliased: ys },
        ) => index_key(*xd)
            .cmp(&index_key(*yd))
            .then_with(|| identity_cmp(xs, ys)),
        (
            Type::BoundGeneric { base: xb, arguments: xa },
            Type::BoundGeneric { base: yb, arguments: ya },
        ) => identity_cmp(xb, yb).then_with(|| cmp_arguments(xa, ya)),
        (Type::Lambda(x), Type::Lambda(y)) => x
            .receiver_effect
            .cmp(&y.receiver_effect)
            .then_with(|| identity_cmp(&x.environment, &y.environment))
            .then_with(|| cmp_parameters(&x.inputs, &y.inputs))
            .then_with(|| identity_cmp(&x.output, &y.output)),
        (Type::Method(x), Type::Method(y)) => x
            .capabilities
            .0
            .cmp(&y.capabilities.0)
            .then_with(|| identity_cmp(&x.receiver, &y.receiver))
            .then_with(|| cmp_parameters(&x.inputs, &y.inputs))
            .then_with(|| identity_cmp(&x.output, &y.output)),
        (Type::Subscript(x), Type::Subscript(y)) => x
            .is_property
            .cmp(&y.is_property)
            .then_with(|| x.capabilities.0.cmp(&y.capabilities.0))
            .then_with(|| identity_cmp(&x.environment, &y.environment))
            .then_with(|| cmp_parameters(&x.inputs, &y.inputs))
            .then_with(|| identity_cmp(&x.output, &y.output)),
        (Type::Parameter(x), Type::Parameter(y)) => x
            .convention
            .cmp(&y.convention)
            .then_with(|| identity_cmp(&x.bare, &y.bare)),
        (Type::Remote(x), Type::Remote(y)) => x
            .effect
            .cmp(&y.effect)
            .then_with(|| identity_cmp(&x.projectee, &y.projectee)),
        (Type::Tuple(x), Type::Tuple(y)) => {
            let mut order = x.len().cmp(&y.len());
            for (xe, ye) in x.iter().zip(y.iter()) {
                if order != Ordering::Equal {
                    break;
                }
                order = xe
                    .label
                    .cmp(&ye.label)
                    .then_with(|| identity_cmp(&xe.ty, &ye.ty));
            }
            order
        }
        (Type::Sum(x), Type::Sum(y)) => {
            let mut order = x.len().cmp(&y.len());
            for (xe, ye) in x.iter().zip(y.iter()) {
                if order != Ordering::Equal {
                    break;
                }
                order = identity_cmp(xe, ye);
            }
            order
        }
        (
            Type::ConformanceLens { subject: xs, lens: xl },
            Type::ConformanceLens { subject: ys, lens: yl },
        ) => identity_cmp(xs, ys).then_with(|| index_key(*xl).cmp(&index_key(*yl))),
        (Type::Metatype(x), Type::Metatype(y)) => identity_cmp(x, y),
        (Type::Builtin(x), Type::Builtin(y)) => builtin_rank(*x).cmp(&builtin_rank(*y)),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn cmp_arguments(x: &[GenericArgument], y: &[GenericArgument]) -> Ordering {
    let mut order = x.len().cmp(&y.len());
    for (xa, ya) in x.iter().zip(y.iter()) {
        if order != Ordering::Equal {
            break;
        }
        order = match (xa, ya) {
            (GenericArgument::Type(xt), GenericArgument::Type(yt)) => identity_cmp(xt, yt),
            (GenericArgument::Type(_), GenericArgument::Value(_)) => Ordering::Less,
            (GenericArgument::Value(_), GenericArgument::Type(_)) => Ordering::Greater,
            (GenericArgument::Value(xv), GenericArgument::Value(yv)) => cmp_values(xv, yv),
        };
    }
    order
}

fn cmp_values(x: &ValueTerm, y: &ValueTerm) -> Ordering {
    match (x, y) {
        (ValueTerm::Parameter(xd), ValueTerm::Parameter(yd)) => {
            index_key(*xd).cmp(&index_key(*yd))
        }
        (ValueTerm::Expr(xe), ValueTerm::Expr(ye)) => index_key(*xe).cmp(&index_key(*ye)),
        (ValueTerm::Parameter(_), ValueTerm::Expr(_)) => Ordering::Less,
        (ValueTerm::Expr(_), ValueTerm::Parameter(_)) => Ordering::Greater,
    }
}

fn cmp_parameters(x: &[CallableParameter], y: &[CallableParameter]) -> Ordering {
    let mut order = x.len().cmp(&y.len());
    for (xp, yp) in x.iter().zip(y.iter()) {
        if order != Ordering::Equal {
            break;
        }
        order = xp
            .label
            .cmp(&yp.label)
            .then_with(|| identity_cmp(&xp.ty, &yp.ty));
    }
    order
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Renders a type for diagnostics. Inference variables never leak: an
/// unsolved hole prints as `_`.
pub struct TypeDisplay<'a> {
    ty: &'a Type,
    ast: &'a Ast,
}

impl TypeDisplay<'_> {
    fn name_of(&self, d: DeclId) -> &str {
        self.ast.decl_name(d).unwrap_or("_")
    }

    fn fmt_parameters(
        &self,
        f: &mut fmt::Formatter<'_>,
        inputs: &[CallableParameter],
    ) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(label) = &p.label {
                write!(f, "{label}: ")?;
            }
            write!(f, "{}", p.ty.display(self.ast))?;
        }
        write!(f, ")")
    }

    fn fmt_capabilities(
        &self,
        f: &mut fmt::Formatter<'_>,
        capabilities: CapabilitySet,
    ) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, e) in capabilities.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::Any => write!(f, "Any"),
            Type::Variable(_) => write!(f, "_"),
            Type::Skolem(d)
            | Type::GenericTypeParameter(d)
            | Type::GenericValueParameter(d) => {
                write!(f, "{}", self.name_of(*d))
            }
            Type::AssociatedType { decl, domain } | Type::AssociatedValue { decl, domain } => {
                write!(f, "{}.{}", domain.display(self.ast), self.name_of(*decl))
            }
            Type::Product(d) | Type::Trait(d) => write!(f, "{}", self.name_of(*d)),
            Type::TypeAlias { decl, .. } => write!(f, "{}", self.name_of(*decl)),
            Type::BoundGeneric { base, arguments } => {
                write!(f, "{}<", base.display(self.ast))?;
                for (i, a) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match a {
                        GenericArgument::Type(t) => write!(f, "{}", t.display(self.ast))?,
                        GenericArgument::Value(ValueTerm::Parameter(d)) => {
                            write!(f, "{}", self.name_of(*d))?
                        }
                        GenericArgument::Value(ValueTerm::Expr(_)) => write!(f, "_")?,
                    }
                }
                write!(f, ">")
            }
            Type::Lambda(l) => {
                write!(f, "[{}]", l.environment.display(self.ast))?;
                self.fmt_parameters(f, &l.inputs)?;
                if l.receiver_effect != AccessEffect::Let {
                    write!(f, " {}", l.receiver_effect)?;
                }
                write!(f, " -> {}", l.output.display(self.ast))
            }
            Type::Method(m) => {
                write!(f, "method ")?;
                self.fmt_parameters(f, &m.inputs)?;
                write!(f, " -> {} ", m.output.display(self.ast))?;
                self.fmt_capabilities(f, m.capabilities)
            }
            Type::Subscript(s) => {
                if s.is_property {
                    write!(f, "property {} ", s.output.display(self.ast))?;
                } else {
                    write!(f, "subscript ")?;
                    self.fmt_parameters(f, &s.inputs)?;
                    write!(f, ": {} ", s.output.display(self.ast))?;
                }
                self.fmt_capabilities(f, s.capabilities)
            }
            Type::Parameter(p) => {
                write!(f, "{} {}", p.convention, p.bare.display(self.ast))
            }
            Type::Remote(r) => {
                write!(f, "remote {} {}", r.effect, r.projectee.display(self.ast))
            }
            Type::Tuple(elements) => {
                write!(f, "{{")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(label) = &e.label {
                        write!(f, "{label}: ")?;
                    }
                    write!(f, "{}", e.ty.display(self.ast))?;
                }
                write!(f, "}}")
            }
            Type::Sum(elements) => {
                if elements.is_empty() {
                    return write!(f, "Never");
                }
                write!(f, "Sum<")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e.display(self.ast))?;
                }
                write!(f, ">")
            }
            Type::ConformanceLens { subject, lens } => {
                write!(f, "{}::{}", subject.display(self.ast), self.name_of(*lens))
            }
            Type::Metatype(t) => write!(f, "Metatype<{}>", t.display(self.ast)),
            Type::Builtin(b) => write!(f, "{b}"),
            Type::Error => write!(f, "<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serin_ast::{DeclKind, FileId, ProductDecl, Span, TypeAliasDecl, TypeExprKind};

    fn span() -> Span {
        Span::new(FileId(0), 0, 1)
    }

    fn product(ast: &mut Ast, name: &str) -> DeclId {
        ast.alloc_decl(
            DeclKind::Product(ProductDecl {
                ident: name.into(),
                generics: None,
                conformances: Vec::new(),
                members: Vec::new(),
                memberwise_init: None,
            }),
            span(),
        )
    }

    #[test]
    fn canonical_unfolds_aliases() {
        let mut ast = Ast::new();
        let a = product(&mut ast, "A");
        let aliased_expr = ast.alloc_type_expr(TypeExprKind::Wildcard, span());
        let alias_decl = ast.alloc_decl(
            DeclKind::TypeAlias(TypeAliasDecl {
                ident: "B".into(),
                generics: None,
                aliased: aliased_expr,
            }),
            span(),
        );

        let alias = Type::TypeAlias {
            decl: alias_decl,
            aliased: Box::new(Type::Product(a)),
        };
        assert!(!alias.is_canonical());
        assert_eq!(alias.canonical(), Type::Product(a));
        // Idempotence.
        assert_eq!(alias.canonical().canonical(), alias.canonical());
    }

    #[test]
    fn sum_construction_sorts_and_dedups() {
        let mut ast = Ast::new();
        let a = product(&mut ast, "A");
        let b = product(&mut ast, "B");

        let left = Type::sum([Type::Product(b), Type::Product(a), Type::Product(b)]);
        let right = Type::sum([Type::Product(a), Type::Product(b)]);
        assert_eq!(left, right);
        assert!(left.is_canonical());
    }

    #[test]
    fn singleton_sum_collapses() {
        let mut ast = Ast::new();
        let a = product(&mut ast, "A");
        assert_eq!(Type::sum([Type::Product(a)]), Type::Product(a));
    }

    #[test]
    fn flags_propagate_through_compounds() {
        let hole = Type::Variable(TypeVariable(0));
        let lambda = Type::Lambda(LambdaType::thin(
            vec![CallableParameter {
                label: None,
                ty: Type::Parameter(ParameterType {
                    convention: AccessEffect::Let,
                    bare: Box::new(hole),
                }),
            }],
            Type::Error,
        ));
        assert!(lambda.has_variable());
        assert!(lambda.is_error());
        assert!(!lambda.has_skolem());
    }

    #[test]
    fn variable_substitution_is_transitive() {
        let v0 = TypeVariable(0);
        let v1 = TypeVariable(1);
        let mut assignments = HashMap::new();
        assignments.insert(v0, Type::Variable(v1));
        assignments.insert(v1, Type::void());

        let t = Type::Metatype(Box::new(Type::Variable(v0)));
        assert_eq!(
            t.substituting_variables(&assignments),
            Type::Metatype(Box::new(Type::void()))
        );
    }

    #[test]
    fn substitution_commutes_with_canonicalization() {
        let mut ast = Ast::new();
        let a = product(&mut ast, "A");
        let aliased_expr = ast.alloc_type_expr(TypeExprKind::Wildcard, span());
        let alias_decl = ast.alloc_decl(
            DeclKind::TypeAlias(TypeAliasDecl {
                ident: "B".into(),
                generics: None,
                aliased: aliased_expr,
            }),
            span(),
        );
        let v = TypeVariable(7);
        let alias = Type::TypeAlias {
            decl: alias_decl,
            aliased: Box::new(Type::Variable(v)),
        };
        let mut assignments = HashMap::new();
        assignments.insert(v, Type::Product(a));

        let subst_then_canon = alias.substituting_variables(&assignments).canonical();
        let canon_then_subst = alias.canonical().substituting_variables(&assignments);
        assert_eq!(subst_then_canon, canon_then_subst);
    }
}
