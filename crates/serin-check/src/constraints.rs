//! Typing constraints and their causes.
//!
//! Constraint generation walks an expression once and emits these; the
//! solver searches for a minimum-penalty satisfying assignment. Every
//! constraint carries a [`ConstraintCause`] so a conflict can point at
//! the source construct that produced it.

use serin_ast::{Ast, DeclId, ExprId, Name, ScopeId, Span};
use serin_types::{CallableParameter, Type};

use crate::DeclRef;

/// Why a constraint exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CauseKind {
    /// A declared annotation or bound.
    Annotation,
    /// Argument-to-parameter compatibility.
    Argument,
    /// The two sides of an assignment.
    Assignment,
    /// A binding pattern against its initializer.
    BindingInitializer,
    /// Branches of a conditional expression.
    Branch,
    /// A cast operand against the target type.
    Cast,
    /// A loop or conditional condition.
    Condition,
    /// A literal's defaulting behavior.
    Literal,
    /// Member access on a domain.
    Member,
    /// An infix operator use.
    OperatorUse,
    /// A returned value against the declared output.
    Return,
    /// A yielded value against the subscript output.
    Yield,
    /// Structure propagated through a pattern or tuple.
    Structural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintCause {
    pub kind: CauseKind,
    pub span: Span,
}

impl ConstraintCause {
    pub fn new(kind: CauseKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A typing constraint.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `lhs = rhs`
    Equality {
        lhs: Type,
        rhs: Type,
        cause: ConstraintCause,
    },
    /// `sub <: sup`
    Subtyping {
        sub: Type,
        sup: Type,
        cause: ConstraintCause,
    },
    /// Argument/parameter compatibility under the parameter's convention.
    Parameter {
        arg: Type,
        param: Type,
        cause: ConstraintCause,
    },
    /// `subject` conforms to every trait in `traits`.
    Conformance {
        subject: Type,
        traits: Vec<DeclId>,
        cause: ConstraintCause,
    },
    /// `callee` is callable with the given arguments and output.
    FunctionCall {
        callee: Type,
        arguments: Vec<CallableParameter>,
        output: Type,
        cause: ConstraintCause,
    },
    /// `name` names a member of `subject` whose type is `member_type`.
    Member {
        subject: Type,
        name: Name,
        expr: ExprId,
        member_type: Type,
        scope: ScopeId,
        cause: ConstraintCause,
    },
    /// Disjunction over candidate declarations for one name expression.
    Overload {
        expr: ExprId,
        choices: Vec<OverloadChoice>,
        cause: ConstraintCause,
    },
    /// General weighted alternatives.
    Disjunction {
        choices: Vec<DisjunctionChoice>,
        cause: ConstraintCause,
    },
    /// `subject` defaults to `default` unless something else constrains
    /// it to a type conforming to `literal_trait`.
    Literal {
        subject: Type,
        default: Type,
        literal_trait: Option<DeclId>,
        cause: ConstraintCause,
    },
    /// A symbolic value-level predicate, reserved for later evaluation.
    Predicate {
        expr: ExprId,
        cause: ConstraintCause,
    },
}

#[derive(Debug, Clone)]
pub struct OverloadChoice {
    pub reference: Option<DeclRef>,
    pub constraints: Vec<Constraint>,
    pub penalty: u32,
}

#[derive(Debug, Clone)]
pub struct DisjunctionChoice {
    pub constraints: Vec<Constraint>,
    pub penalty: u32,
}

impl Constraint {
    pub fn cause(&self) -> ConstraintCause {
        match self {
            Constraint::Equality { cause, .. }
            | Constraint::Subtyping { cause, .. }
            | Constraint::Parameter { cause, .. }
            | Constraint::Conformance { cause, .. }
            | Constraint::FunctionCall { cause, .. }
            | Constraint::Member { cause, .. }
            | Constraint::Overload { cause, .. }
            | Constraint::Disjunction { cause, .. }
            | Constraint::Literal { cause, .. }
            | Constraint::Predicate { cause, .. } => *cause,
        }
    }

    /// Whether the solver must branch to discharge this constraint.
    pub fn is_disjunctive(&self) -> bool {
        matches!(
            self,
            Constraint::Overload { .. } | Constraint::Disjunction { .. }
        )
    }

    /// A compact rendering for traces.
    pub fn describe(&self, ast: &Ast) -> String {
        match self {
            Constraint::Equality { lhs, rhs, .. } => {
                format!("{} == {}", lhs.display(ast), rhs.display(ast))
            }
            Constraint::Subtyping { sub, sup, .. } => {
                format!("{} <: {}", sub.display(ast), sup.display(ast))
            }
            Constraint::Parameter { arg, param, .. } => {
                format!("{} ~parameter~ {}", arg.display(ast), param.display(ast))
            }
            Constraint::Conformance { subject, traits, .. } => {
                let names: Vec<&str> = traits
                    .iter()
                    .map(|&t| ast.decl_name(t).unwrap_or("_"))
                    .collect();
                format!("{}: {}", subject.display(ast), names.join(" & "))
            }
            Constraint::FunctionCall {
                callee, output, ..
            } => format!(
                "callable {} -> {}",
                callee.display(ast),
                output.display(ast)
            ),
            Constraint::Member { subject, name, .. } => {
                format!("{}.{name}", subject.display(ast))
            }
            Constraint::Overload { choices, .. } => {
                format!("overload with {} choice(s)", choices.len())
            }
            Constraint::Disjunction { choices, .. } => {
                format!("disjunction with {} choice(s)", choices.len())
            }
            Constraint::Literal {
                subject, default, ..
            } => format!(
                "{} defaults to {}",
                subject.display(ast),
                default.display(ast)
            ),
            Constraint::Predicate { .. } => "value predicate".to_string(),
        }
    }
}
