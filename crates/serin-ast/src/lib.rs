//! AST node definitions, source spans, and the scoped program for Serin.
//!
//! Nodes live in typed arenas and reference each other through `la_arena`
//! indices; the AST is a cyclic graph flattened into index space, so no
//! node ever holds a back-pointer. Every node carries a [`Span`].
//!
//! The parser producing these nodes is a separate concern; the checker
//! consumes an immutable [`ScopedProgram`] built on top of a finished
//! [`Ast`].

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

mod scope;

pub use scope::{ScopeData, ScopeId, ScopeKind, ScopedProgram};

/// Identifies a source file in the compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for checker-generated nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }

    /// Whether `line` falls inside this span, interpreting `start`/`end`
    /// as line-resolution coordinates. Used by inference tracing.
    pub fn covers_offset(self, file: FileId, offset: u32) -> bool {
        self.file == file && self.start <= offset && offset < self.end.max(self.start + 1)
    }
}

/// A value paired with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// An identifier or label.
pub type Name = SmolStr;

// ---------------------------------------------------------------------------
// Node ids
// ---------------------------------------------------------------------------

pub type Decl = Spanned<DeclKind>;
pub type Expr = Spanned<ExprKind>;
pub type Pattern = Spanned<PatternKind>;
pub type Stmt = Spanned<StmtKind>;
pub type TypeExpr = Spanned<TypeExprKind>;

pub type DeclId = Idx<Decl>;
pub type ExprId = Idx<Expr>;
pub type PatternId = Idx<Pattern>;
pub type StmtId = Idx<Stmt>;
pub type TypeExprId = Idx<TypeExpr>;

/// Stable ordering key for an arena index.
///
/// `la_arena` indices hash but do not expose their payload; canonical
/// orderings (sum-element sorting, tie-breaks) go through this.
pub fn index_key<T>(idx: Idx<T>) -> u32 {
    u32::from(idx.into_raw())
}

// ---------------------------------------------------------------------------
// Access effects and introducers
// ---------------------------------------------------------------------------

/// A parameter or receiver convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessEffect {
    Let,
    Inout,
    Set,
    Sink,
    Yielded,
}

impl AccessEffect {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessEffect::Let => "let",
            AccessEffect::Inout => "inout",
            AccessEffect::Set => "set",
            AccessEffect::Sink => "sink",
            AccessEffect::Yielded => "yielded",
        }
    }
}

impl std::fmt::Display for AccessEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a binding introduces its variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingIntroducer {
    Let,
    Var,
    SinkLet,
    Inout,
}

impl BindingIntroducer {
    /// The capture convention implied by this introducer.
    pub fn capture_effect(self) -> Option<AccessEffect> {
        match self {
            BindingIntroducer::Let => Some(AccessEffect::Let),
            BindingIntroducer::Inout => Some(AccessEffect::Inout),
            // `sink let` and `var` captures move the value into the
            // environment rather than projecting it.
            BindingIntroducer::SinkLet | BindingIntroducer::Var => None,
        }
    }
}

/// Fixity of an operator declaration or operator function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorNotation {
    Infix,
    Prefix,
    Postfix,
}

impl OperatorNotation {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorNotation::Infix => "infix",
            OperatorNotation::Prefix => "prefix",
            OperatorNotation::Postfix => "postfix",
        }
    }
}

/// Precedence group of an infix operator declaration.
///
/// Binding power increases down the list; sequence folding groups
/// higher-power operators first and treats equal power as left-associative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrecedenceGroup {
    Assignment,
    Disjunction,
    Conjunction,
    Comparison,
    Fallback,
    Range,
    Addition,
    Multiplication,
    Shift,
}

impl PrecedenceGroup {
    pub fn power(self) -> u8 {
        match self {
            PrecedenceGroup::Assignment => 1,
            PrecedenceGroup::Disjunction => 2,
            PrecedenceGroup::Conjunction => 3,
            PrecedenceGroup::Comparison => 4,
            PrecedenceGroup::Fallback => 5,
            PrecedenceGroup::Range => 6,
            PrecedenceGroup::Addition => 7,
            PrecedenceGroup::Multiplication => 8,
            PrecedenceGroup::Shift => 9,
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Module(ModuleDecl),
    Product(ProductDecl),
    Trait(TraitDecl),
    TypeAlias(TypeAliasDecl),
    Binding(BindingDecl),
    Var(VarDecl),
    Function(FunctionDecl),
    Initializer(InitializerDecl),
    Method(MethodDecl),
    MethodImpl(MethodImplDecl),
    Subscript(SubscriptDecl),
    SubscriptImpl(SubscriptImplDecl),
    Parameter(ParameterDecl),
    GenericParameter(GenericParameterDecl),
    AssociatedType(AssociatedTypeDecl),
    AssociatedValue(AssociatedValueDecl),
    Conformance(ConformanceDecl),
    Extension(ExtensionDecl),
    Operator(OperatorDecl),
    Namespace(NamespaceDecl),
}

/// A module: a named collection of translation units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub ident: Name,
    pub units: Vec<TranslationUnit>,
}

/// One source file worth of top-level declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub file: FileId,
    pub decls: Vec<DeclId>,
}

/// A nominal product type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDecl {
    pub ident: Name,
    pub generics: Option<GenericClause>,
    pub conformances: Vec<TypeExprId>,
    pub members: Vec<DeclId>,
    /// Synthesized by [`ScopedProgram::new`] before checking begins.
    pub memberwise_init: Option<DeclId>,
}

/// A trait declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDecl {
    pub ident: Name,
    pub refinements: Vec<TypeExprId>,
    pub members: Vec<DeclId>,
    /// The implicit `Self` parameter, synthesized by [`ScopedProgram::new`].
    pub self_parameter: Option<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAliasDecl {
    pub ident: Name,
    pub generics: Option<GenericClause>,
    pub aliased: TypeExprId,
}

/// A binding declaration: an introducer, a pattern, and an optional
/// initializer. The variables it declares are separate [`VarDecl`] nodes
/// reachable through the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDecl {
    pub pattern: PatternId,
    pub initializer: Option<ExprId>,
    pub is_static: bool,
}

/// A single variable introduced by a binding pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub ident: Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionBody {
    Expr(ExprId),
    Block(StmtId),
}

/// A free or member function, or the underlying declaration of a lambda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// Absent for anonymous lambda declarations.
    pub ident: Option<Name>,
    /// Present when the function implements an operator.
    pub notation: Option<OperatorNotation>,
    pub is_static: bool,
    /// Declared receiver effect; `None` defaults to `let` for members.
    pub receiver_effect: Option<AccessEffect>,
    pub generics: Option<GenericClause>,
    /// Explicit captures, as binding declarations.
    pub explicit_captures: Vec<DeclId>,
    pub parameters: Vec<DeclId>,
    pub output: Option<TypeExprId>,
    pub body: Option<FunctionBody>,
    /// True for lambda literals: unannotated parameters become fresh
    /// parameter types instead of diagnosing a missing annotation.
    pub is_in_expr_context: bool,
    /// True for trait requirements the checker may synthesize a witness for.
    pub is_synthesizable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub parameters: Vec<DeclId>,
    pub generics: Option<GenericClause>,
    pub body: Option<StmtId>,
    pub is_memberwise: bool,
}

/// A method bundle: one name, several access-effect variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub ident: Name,
    pub notation: Option<OperatorNotation>,
    pub generics: Option<GenericClause>,
    pub parameters: Vec<DeclId>,
    pub output: Option<TypeExprId>,
    pub impls: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImplDecl {
    pub effect: AccessEffect,
    pub body: Option<FunctionBody>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptDecl {
    /// `None` renders as `[]`.
    pub ident: Option<Name>,
    /// Property subscripts have no parameter list.
    pub is_property: bool,
    pub generics: Option<GenericClause>,
    pub explicit_captures: Vec<DeclId>,
    pub parameters: Vec<DeclId>,
    pub output: TypeExprId,
    pub impls: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptImplDecl {
    pub effect: AccessEffect,
    pub body: Option<FunctionBody>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDecl {
    /// Argument label; `None` is positional-only.
    pub label: Option<Name>,
    pub ident: Name,
    pub convention: AccessEffect,
    pub annotation: Option<TypeExprId>,
    pub default_value: Option<ExprId>,
}

/// A generic parameter. The first annotation decides whether it is a type
/// parameter (trait bound) or a value parameter (value type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameterDecl {
    pub ident: Name,
    pub annotations: Vec<TypeExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedTypeDecl {
    pub ident: Name,
    pub conformances: Vec<TypeExprId>,
    pub default_value: Option<TypeExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedValueDecl {
    pub ident: Name,
    pub annotation: TypeExprId,
}

/// A conformance declaration: `conformance Subject: T, U { ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceDecl {
    pub subject: TypeExprId,
    pub conformances: Vec<TypeExprId>,
    pub where_clauses: Vec<WhereClause>,
    pub members: Vec<DeclId>,
}

/// A standalone extension: `extension Subject { ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDecl {
    pub subject: TypeExprId,
    pub where_clauses: Vec<WhereClause>,
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDecl {
    pub notation: OperatorNotation,
    pub ident: Name,
    pub precedence_group: Option<PrecedenceGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub ident: Name,
    pub members: Vec<DeclId>,
}

/// Generic parameters plus where-clause constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericClause {
    pub parameters: Vec<DeclId>,
    pub where_clauses: Vec<WhereClause>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub span: Span,
    pub kind: WhereClauseKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhereClauseKind {
    /// `L == R`
    Equality { lhs: TypeExprId, rhs: TypeExprId },
    /// `T: P & Q`
    Conformance {
        subject: TypeExprId,
        traits: Vec<TypeExprId>,
    },
    /// A value-level predicate, kept symbolic.
    Predicate { expr: ExprId },
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    BooleanLiteral(bool),
    /// Kept textual; evaluation happens downstream.
    IntegerLiteral(SmolStr),
    FloatLiteral(SmolStr),
    StringLiteral(SmolStr),
    Name(NameExpr),
    Call(CallExpr),
    SubscriptCall(SubscriptCallExpr),
    /// The underlying anonymous function declaration.
    Lambda(DeclId),
    Cast(CastExpr),
    /// `&subject` — marks the subject as mutably used.
    Inout(InoutExpr),
    Tuple(TupleExpr),
    /// An unfolded infix chain; folded by the checker using operator
    /// precedence.
    Sequence(SequenceExpr),
    Conditional(ConditionalExpr),
}

/// The domain of a name expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameDomain {
    /// `foo` — no domain; resolved by unqualified lookup.
    None,
    /// `bar.foo` — explicit domain expression.
    Explicit(ExprId),
    /// `.foo` — domain inferred from the expected type.
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExpr {
    pub domain: NameDomain,
    pub ident: Name,
    pub notation: Option<OperatorNotation>,
    /// Static (generic) arguments: `foo<Int, n>`.
    pub arguments: Vec<TypeExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledArgument {
    pub label: Option<Name>,
    pub value: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: ExprId,
    pub arguments: Vec<LabeledArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptCallExpr {
    pub callee: ExprId,
    pub arguments: Vec<LabeledArgument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// `e as T` — the operand must be a subtype of the target.
    Up,
    /// `e as! T` — checked at run time.
    Down,
    /// `e as* T` — reinterpret a built-in pointer.
    PointerConversion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastExpr {
    pub subject: ExprId,
    pub target: TypeExprId,
    pub kind: CastKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InoutExpr {
    pub subject: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleExpr {
    pub elements: Vec<TupleExprElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleExprElement {
    pub label: Option<Name>,
    pub value: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceExpr {
    pub head: ExprId,
    pub tail: Vec<SequenceTail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTail {
    /// A name expression denoting the infix operator.
    pub operator: ExprId,
    pub operand: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    Expr(ExprId),
    Block(StmtId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionItem {
    Expr(ExprId),
    /// `if let pattern = value`.
    Binding(DeclId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalExpr {
    pub conditions: Vec<ConditionItem>,
    pub success: Branch,
    pub failure: Option<Branch>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// Introducer + optional annotation over a subpattern.
    Binding {
        introducer: BindingIntroducer,
        annotation: Option<TypeExprId>,
        subpattern: PatternId,
    },
    /// Binds one variable.
    Name { var: DeclId },
    Tuple { elements: Vec<TuplePatternElement> },
    Wildcard,
    /// Matches the value of an expression.
    Expr(ExprId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuplePatternElement {
    pub label: Option<Name>,
    pub pattern: PatternId,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Brace(Vec<StmtId>),
    Assign { lhs: ExprId, rhs: ExprId },
    Conditional {
        conditions: Vec<ConditionItem>,
        success: StmtId,
        failure: Option<StmtId>,
    },
    While {
        conditions: Vec<ConditionItem>,
        body: StmtId,
    },
    DoWhile { body: StmtId, condition: ExprId },
    Return(Option<ExprId>),
    Yield(ExprId),
    Discard(ExprId),
    Decl(DeclId),
    Expr(ExprId),
}

// ---------------------------------------------------------------------------
// Type expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExprKind {
    Name(NameTypeExpr),
    Tuple(Vec<TupleTypeElement>),
    Lambda(LambdaTypeExpr),
    /// `T::P` — view `T` through its conformance to `P`.
    ConformanceLens {
        subject: TypeExprId,
        lens: TypeExprId,
    },
    /// Convention-wrapped parameter annotation: `inout Int`.
    Parameter {
        convention: AccessEffect,
        bare: TypeExprId,
    },
    /// `_` — a hole to be inferred.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTypeExpr {
    pub domain: Option<TypeExprId>,
    pub ident: Name,
    pub arguments: Vec<TypeExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleTypeElement {
    pub label: Option<Name>,
    pub value: TypeExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaTypeExpr {
    pub receiver_effect: Option<AccessEffect>,
    pub environment: Option<TypeExprId>,
    pub parameters: Vec<LambdaTypeParameter>,
    pub output: TypeExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaTypeParameter {
    pub label: Option<Name>,
    pub convention: AccessEffect,
    pub bare: TypeExprId,
}

// ---------------------------------------------------------------------------
// The AST
// ---------------------------------------------------------------------------

/// Arena storage for every node of a program under compilation.
#[derive(Debug, Default, Clone)]
pub struct Ast {
    pub decls: Arena<Decl>,
    pub exprs: Arena<Expr>,
    pub patterns: Arena<Pattern>,
    pub stmts: Arena<Stmt>,
    pub type_exprs: Arena<TypeExpr>,
    /// Module declarations, in insertion order.
    pub modules: Vec<DeclId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_decl(&mut self, kind: DeclKind, span: Span) -> DeclId {
        let id = self.decls.alloc(Spanned::new(kind, span));
        if matches!(self.decls[id].node, DeclKind::Module(_)) {
            self.modules.push(id);
        }
        id
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.exprs.alloc(Spanned::new(kind, span))
    }

    pub fn alloc_pattern(&mut self, kind: PatternKind, span: Span) -> PatternId {
        self.patterns.alloc(Spanned::new(kind, span))
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.stmts.alloc(Spanned::new(kind, span))
    }

    pub fn alloc_type_expr(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.type_exprs.alloc(Spanned::new(kind, span))
    }

    /// The base name a declaration introduces, if any.
    pub fn decl_name(&self, d: DeclId) -> Option<&str> {
        match &self.decls[d].node {
            DeclKind::Module(m) => Some(&m.ident),
            DeclKind::Product(p) => Some(&p.ident),
            DeclKind::Trait(t) => Some(&t.ident),
            DeclKind::TypeAlias(a) => Some(&a.ident),
            DeclKind::Var(v) => Some(&v.ident),
            DeclKind::Function(f) => f.ident.as_deref(),
            DeclKind::Initializer(_) => Some("init"),
            DeclKind::Method(m) => Some(&m.ident),
            DeclKind::Subscript(s) => Some(s.ident.as_deref().unwrap_or("[]")),
            DeclKind::Parameter(p) => Some(&p.ident),
            DeclKind::GenericParameter(g) => Some(&g.ident),
            DeclKind::AssociatedType(a) => Some(&a.ident),
            DeclKind::AssociatedValue(a) => Some(&a.ident),
            DeclKind::Operator(o) => Some(&o.ident),
            DeclKind::Namespace(n) => Some(&n.ident),
            DeclKind::Binding(_)
            | DeclKind::Conformance(_)
            | DeclKind::Extension(_)
            | DeclKind::MethodImpl(_)
            | DeclKind::SubscriptImpl(_) => None,
        }
    }

    /// The variables a binding pattern introduces, in source order.
    pub fn pattern_vars(&self, p: PatternId) -> Vec<DeclId> {
        let mut out = Vec::new();
        self.collect_pattern_vars(p, &mut out);
        out
    }

    fn collect_pattern_vars(&self, p: PatternId, out: &mut Vec<DeclId>) {
        match &self.patterns[p].node {
            PatternKind::Binding { subpattern, .. } => self.collect_pattern_vars(*subpattern, out),
            PatternKind::Name { var } => out.push(*var),
            PatternKind::Tuple { elements } => {
                for e in elements {
                    self.collect_pattern_vars(e.pattern, out);
                }
            }
            PatternKind::Wildcard | PatternKind::Expr(_) => {}
        }
    }

    /// The stored (non-static) binding members of a product, in order.
    pub fn stored_bindings(&self, product: DeclId) -> Vec<DeclId> {
        let DeclKind::Product(p) = &self.decls[product].node else {
            return Vec::new();
        };
        p.members
            .iter()
            .copied()
            .filter(|&m| matches!(&self.decls[m].node, DeclKind::Binding(b) if !b.is_static))
            .collect()
    }

    pub fn decl_span(&self, d: DeclId) -> Span {
        self.decls[d].span
    }

    pub fn expr_span(&self, e: ExprId) -> Span {
        self.exprs[e].span
    }
}
