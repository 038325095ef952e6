//! The Serin type checker.
//!
//! This crate implements semantic analysis over a [`ScopedProgram`]:
//! declaration realization, trait-conformance checking, constraint-based
//! expression inference with overload resolution, name resolution, and
//! generic-environment construction.
//!
//! The engine is a single value, [`TypeChecker`], owning all mutable
//! state. Work is demand-driven: realizing or checking a declaration is
//! memoized through a per-declaration request state that doubles as the
//! re-entrancy guard, so cyclic dependencies terminate with a diagnostic
//! instead of recursing forever.

pub mod captures;
pub mod conformance;
pub mod constraints;
pub mod env;
pub mod infer;
pub mod names;
pub mod realize;
pub mod solver;
pub mod trace;

use std::collections::{HashMap, HashSet};

use serin_ast::{
    AccessEffect, DeclId, DeclKind, ExprId, FileId, FunctionBody, Name, ScopeId, ScopedProgram,
    Span, StmtId, StmtKind, WhereClauseKind,
};
use serin_types::{BuiltinType, LambdaType, TupleElement, Type, TypeVariable};

pub use serin_diag::{Category, Diagnostic, DiagnosticError, SourceLocation};

use conformance::TypeRelations;
use constraints::{Constraint, ConstraintCause};
use env::EnvironmentState;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A line position used to scope inference tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub file: FileId,
    pub offset: u32,
}

/// Options passed at construction; the checker has no other knobs.
#[derive(Debug, Clone, Default)]
pub struct CheckerConfig {
    /// Enables resolution of `Builtin` as a module and of built-in
    /// function and type names.
    pub builtin_module_visible: bool,
    /// When a typing subject's site covers this position, a trace of
    /// constraint generation and solving is written to standard output.
    pub trace_inference_at: Option<SourcePosition>,
}

// ---------------------------------------------------------------------------
// Request states and references
// ---------------------------------------------------------------------------

/// Lifecycle of a declaration inside the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    TypeRealizationStarted,
    TypeRealizationCompleted,
    TypeCheckingStarted,
    Success,
    Failure,
}

/// What a name expression resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclRef {
    Direct(DeclId),
    Member(DeclId),
    BuiltinType(BuiltinType),
    BuiltinFunction(BuiltinFunction),
}

impl DeclRef {
    pub fn decl(&self) -> Option<DeclId> {
        match self {
            DeclRef::Direct(d) | DeclRef::Member(d) => Some(*d),
            _ => None,
        }
    }
}

/// A built-in function, identified by its full name (e.g. `add_word`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: Name,
    pub ty: LambdaType,
}

/// One implicit capture of a local function or subscript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitCapture {
    pub name: Name,
    pub effect: AccessEffect,
    pub referent: DeclRef,
}

/// A sequence expression folded into a binary tree by operator precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldedSequence {
    Leaf(ExprId),
    Node {
        /// The operator's name expression.
        callee: ExprId,
        lhs: Box<FoldedSequence>,
        rhs: Box<FoldedSequence>,
    },
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The result of checking: everything downstream lowering needs.
#[derive(Debug)]
pub struct TypedProgram {
    pub decl_types: HashMap<DeclId, Type>,
    pub expr_types: HashMap<ExprId, Type>,
    pub referred_decls: HashMap<ExprId, DeclRef>,
    pub implicit_captures: HashMap<DeclId, Vec<ImplicitCapture>>,
    pub folded_sequence_exprs: HashMap<ExprId, FoldedSequence>,
    pub relations: TypeRelations,
}

// ---------------------------------------------------------------------------
// Body context
// ---------------------------------------------------------------------------

/// The enclosing callable's expectations while checking statements.
#[derive(Debug, Clone, Default)]
pub(crate) struct BodyContext {
    pub output: Option<Type>,
    pub yield_type: Option<Type>,
}

// ---------------------------------------------------------------------------
// The checker
// ---------------------------------------------------------------------------

/// The semantic-analysis engine. One instance checks one program.
pub struct TypeChecker<'p> {
    pub(crate) program: &'p ScopedProgram,
    pub(crate) config: CheckerConfig,
    pub(crate) diagnostics: Vec<Diagnostic>,

    pub(crate) decl_types: HashMap<DeclId, Type>,
    pub(crate) decl_requests: HashMap<DeclId, RequestState>,
    pub(crate) expr_types: HashMap<ExprId, Type>,
    pub(crate) referred_decls: HashMap<ExprId, DeclRef>,
    pub(crate) implicit_captures: HashMap<DeclId, Vec<ImplicitCapture>>,
    pub(crate) folded_sequence_exprs: HashMap<ExprId, FoldedSequence>,
    pub(crate) relations: TypeRelations,
    pub(crate) environments: HashMap<DeclId, EnvironmentState>,

    pub(crate) bindings_under_checking: HashSet<DeclId>,
    pub(crate) extensions_under_binding: HashSet<DeclId>,
    pub(crate) member_lookup_tables: HashMap<(Type, ScopeId), HashMap<Name, Vec<DeclId>>>,

    /// Tentative types of pattern variables while their binding is being
    /// inferred; reified into `decl_types` once the solver succeeds.
    pub(crate) tentative_var_types: HashMap<DeclId, Type>,

    next_variable: u64,
}

impl<'p> TypeChecker<'p> {
    pub fn new(program: &'p ScopedProgram, config: CheckerConfig) -> Self {
        Self {
            program,
            config,
            diagnostics: Vec::new(),
            decl_types: HashMap::new(),
            decl_requests: HashMap::new(),
            expr_types: HashMap::new(),
            referred_decls: HashMap::new(),
            implicit_captures: HashMap::new(),
            folded_sequence_exprs: HashMap::new(),
            relations: TypeRelations::default(),
            environments: HashMap::new(),
            bindings_under_checking: HashSet::new(),
            extensions_under_binding: HashSet::new(),
            member_lookup_tables: HashMap::new(),
            tentative_var_types: HashMap::new(),
            next_variable: 0,
        }
    }

    pub fn program(&self) -> &'p ScopedProgram {
        self.program
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn request_state(&self, d: DeclId) -> Option<RequestState> {
        self.decl_requests.get(&d).copied()
    }

    /// The recorded type of an expression, if inference reached it.
    pub fn type_of_expr(&self, e: ExprId) -> Option<&Type> {
        self.expr_types.get(&e)
    }

    /// The recorded overarching type of a declaration.
    pub fn type_of_decl(&self, d: DeclId) -> Option<&Type> {
        self.decl_types.get(&d)
    }

    pub fn referred_decl(&self, e: ExprId) -> Option<&DeclRef> {
        self.referred_decls.get(&e)
    }

    /// Render a type against this program's AST.
    pub fn show_type(&self, t: &Type) -> String {
        self.show(t)
    }

    /// The folded form of a sequence expression, if one was computed.
    pub fn folded_sequence(&self, e: ExprId) -> Option<&FoldedSequence> {
        self.folded_sequence_exprs.get(&e)
    }

    /// The conformance registry.
    pub fn relations(&self) -> &TypeRelations {
        &self.relations
    }

    /// The request states of every declaration touched so far.
    pub fn request_states(&self) -> impl Iterator<Item = RequestState> + '_ {
        self.decl_requests.values().copied()
    }

    /// The implicit captures recorded for a local function or subscript.
    pub fn implicit_captures_of(&self, d: DeclId) -> Option<&[ImplicitCapture]> {
        self.implicit_captures.get(&d).map(Vec::as_slice)
    }

    /// Consume the checker, producing the typed program and diagnostics.
    pub fn into_typed_program(self) -> (TypedProgram, Vec<Diagnostic>) {
        (
            TypedProgram {
                decl_types: self.decl_types,
                expr_types: self.expr_types,
                referred_decls: self.referred_decls,
                implicit_captures: self.implicit_captures,
                folded_sequence_exprs: self.folded_sequence_exprs,
                relations: self.relations,
            },
            self.diagnostics,
        )
    }

    // -----------------------------------------------------------------------
    // Small shared helpers
    // -----------------------------------------------------------------------

    pub(crate) fn loc(&self, span: Span) -> SourceLocation {
        SourceLocation {
            file_id: span.file.0,
            start: span.start,
            end: span.end,
        }
    }

    pub(crate) fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub(crate) fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub(crate) fn fresh_variable(&mut self) -> Type {
        let v = TypeVariable(self.next_variable);
        self.next_variable += 1;
        Type::Variable(v)
    }

    /// Display a type against the program's AST.
    pub(crate) fn show(&self, t: &Type) -> String {
        format!("{}", t.display(self.program.ast()))
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Check every module of the program.
    pub fn check_all(&mut self) -> bool {
        let mut ok = true;
        for module in self.program.ast().modules.clone() {
            ok &= self.check_module(module);
        }
        ok
    }

    /// Check one module. Returns `false` when any contained declaration
    /// fails or an error diagnostic is produced.
    pub fn check_module(&mut self, module: DeclId) -> bool {
        let errors_before = self.error_count();
        self.check_operator_uniqueness(module);

        let DeclKind::Module(m) = &self.program.ast().decls[module].node else {
            return false;
        };
        let decls: Vec<DeclId> = m.units.iter().flat_map(|u| u.decls.clone()).collect();
        for d in decls {
            self.check_decl(d);
        }
        self.decl_requests.insert(module, RequestState::Success);
        self.error_count() == errors_before
    }

    /// Enforce at most one operator declaration per (notation, name) in a
    /// module. Operator overloading is not implemented.
    fn check_operator_uniqueness(&mut self, module: DeclId) {
        let DeclKind::Module(m) = &self.program.ast().decls[module].node else {
            return;
        };
        let mut seen: HashMap<(&'static str, Name), Span> = HashMap::new();
        let mut dups = Vec::new();
        for unit in &m.units {
            for &d in &unit.decls {
                if let DeclKind::Operator(op) = &self.program.ast().decls[d].node {
                    let key = (op.notation.as_str(), op.ident.clone());
                    let span = self.program.ast().decl_span(d);
                    if let Some(&previous) = seen.get(&key) {
                        dups.push((op.ident.clone(), span, previous));
                    } else {
                        seen.insert(key, span);
                    }
                }
            }
        }
        for (name, span, previous) in dups {
            let previous_loc = self.loc(previous);
            let diag = Diagnostic::error(
                Category::DuplicateOperator,
                format!("duplicate operator declaration `{name}`"),
            )
            .at(self.loc(span))
            .with_label(previous_loc, "previous declaration is here");
            self.report(diag);
        }
    }

    // -----------------------------------------------------------------------
    // Declaration checking
    // -----------------------------------------------------------------------

    /// Verify a declaration's body and members, assuming realization.
    pub fn check_decl(&mut self, d: DeclId) {
        match self.decl_requests.get(&d).copied() {
            Some(RequestState::Success | RequestState::Failure) => return,
            Some(RequestState::TypeCheckingStarted) => {
                self.report_cycle(d);
                self.decl_requests.insert(d, RequestState::Failure);
                return;
            }
            _ => {}
        }

        // Bindings have no realize/check split; `realize_decl` routes
        // through `check_binding`, which manages its own states.
        if matches!(self.program.ast().decls[d].node, DeclKind::Binding(_)) {
            self.realize_decl(d);
            return;
        }

        let ty = self.realize_decl(d);
        if matches!(
            self.decl_requests.get(&d),
            Some(RequestState::Success | RequestState::Failure)
        ) {
            return;
        }
        self.decl_requests.insert(d, RequestState::TypeCheckingStarted);

        let errors_before = self.error_count();
        self.check_decl_parts(d, &ty);
        let failed = ty.is_error() || self.error_count() > errors_before;

        // An inner cycle may have already demoted this declaration.
        if matches!(
            self.decl_requests.get(&d),
            Some(RequestState::TypeCheckingStarted)
        ) {
            self.decl_requests.insert(
                d,
                if failed {
                    RequestState::Failure
                } else {
                    RequestState::Success
                },
            );
        }
    }

    pub(crate) fn report_cycle(&mut self, d: DeclId) {
        let span = self.program.ast().decl_span(d);
        let name = self
            .program
            .ast()
            .decl_name(d)
            .map(|n| format!("`{n}`"))
            .unwrap_or_else(|| "this declaration".to_string());
        let diag = Diagnostic::error(
            Category::CircularDependency,
            format!("circular dependency involving {name}"),
        )
        .at(self.loc(span));
        self.report(diag);
    }

    fn check_decl_parts(&mut self, d: DeclId, ty: &Type) {
        match self.program.ast().decls[d].node.clone() {
            DeclKind::Module(_) => {}
            DeclKind::Product(p) => {
                if let Some(g) = &p.generics {
                    self.check_generic_clause(d, g);
                }
                let model = self.self_type_of_decl(d);
                for &m in &p.members {
                    self.check_decl(m);
                }
                if !p.conformances.is_empty() {
                    self.check_conformance_list(model, d, &p.conformances, false);
                }
            }
            DeclKind::Trait(t) => {
                // Building the environment validates the refinement closure.
                self.environment_of(d);
                for &m in &t.members {
                    self.check_decl(m);
                }
            }
            DeclKind::TypeAlias(_) => {}
            DeclKind::Binding(_) => unreachable!("bindings are routed through check_binding"),
            DeclKind::Var(_) => {}
            DeclKind::Function(f) => {
                if let Some(g) = &f.generics {
                    self.check_generic_clause(d, g);
                }
                // Generic parameters are rigid inside the body.
                let output = match ty {
                    Type::Lambda(l) => self.skolemized(&l.output),
                    _ => Type::Error,
                };
                let ctx = BodyContext {
                    output: Some(output.clone()),
                    yield_type: None,
                };
                match f.body {
                    Some(FunctionBody::Block(b)) => self.check_stmt(b, &ctx),
                    Some(FunctionBody::Expr(e)) => {
                        self.check_expression_body(e, output, false);
                    }
                    None => {}
                }
            }
            DeclKind::Initializer(i) => {
                if let Some(b) = i.body {
                    let ctx = BodyContext {
                        output: Some(Type::void()),
                        yield_type: None,
                    };
                    self.check_stmt(b, &ctx);
                }
            }
            DeclKind::Method(m) => {
                if let Some(g) = &m.generics {
                    self.check_generic_clause(d, g);
                }
                for &i in &m.impls {
                    self.check_decl(i);
                }
            }
            DeclKind::MethodImpl(i) => {
                let (output, mutating) = match ty {
                    Type::Lambda(l) => (
                        self.skolemized(&l.output),
                        matches!(i.effect, AccessEffect::Inout | AccessEffect::Set),
                    ),
                    _ => (Type::Error, false),
                };
                let ctx = BodyContext {
                    output: Some(output.clone()),
                    yield_type: None,
                };
                match i.body {
                    Some(FunctionBody::Block(b)) => self.check_stmt(b, &ctx),
                    Some(FunctionBody::Expr(e)) => {
                        self.check_expression_body(e, output, mutating);
                    }
                    None => {}
                }
            }
            DeclKind::Subscript(s) => {
                if let Some(g) = &s.generics {
                    self.check_generic_clause(d, g);
                }
                for &i in &s.impls {
                    self.check_decl(i);
                }
            }
            DeclKind::SubscriptImpl(i) => {
                let output = match ty {
                    Type::Subscript(s) => self.skolemized(&s.output),
                    _ => Type::Error,
                };
                let ctx = BodyContext {
                    output: None,
                    yield_type: Some(output.clone()),
                };
                match i.body {
                    Some(FunctionBody::Block(b)) => self.check_stmt(b, &ctx),
                    Some(FunctionBody::Expr(e)) => {
                        self.check_expression_body(e, output, false);
                    }
                    None => {}
                }
            }
            DeclKind::Parameter(_)
            | DeclKind::GenericParameter(_)
            | DeclKind::AssociatedType(_)
            | DeclKind::AssociatedValue(_)
            | DeclKind::Operator(_) => {}
            DeclKind::Conformance(c) => {
                let model = self.realize_subject(d, c.subject);
                for &m in &c.members {
                    self.check_decl(m);
                }
                if !model.is_error() {
                    self.check_conformance_list(
                        model,
                        d,
                        &c.conformances,
                        !c.where_clauses.is_empty(),
                    );
                }
            }
            DeclKind::Extension(e) => {
                let model = self.realize_subject(d, e.subject);
                if matches!(model.canonical(), Type::Builtin(_)) {
                    let span = self.program.ast().decl_span(d);
                    let diag = Diagnostic::error(
                        Category::CannotExtendBuiltin,
                        "built-in types cannot be extended",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                }
                for &m in &e.members {
                    self.check_decl(m);
                }
            }
            DeclKind::Namespace(n) => {
                for &m in &n.members {
                    self.check_decl(m);
                }
            }
        }
    }

    /// Validate a generic clause: parameter bounds must name traits and
    /// where clauses must be well-formed.
    fn check_generic_clause(&mut self, owner: DeclId, clause: &serin_ast::GenericClause) {
        let _ = owner;
        for &p in &clause.parameters {
            self.realize_decl(p);
        }
        for w in clause.where_clauses.clone() {
            match w.kind {
                WhereClauseKind::Equality { lhs, rhs } => {
                    let l = self.realize_type_expr(lhs);
                    let r = self.realize_type_expr(rhs);
                    if !l.is_error() && !r.is_error() && !l.has_generic_parameter()
                        && !r.has_generic_parameter()
                        && l.canonical() != r.canonical()
                    {
                        let diag = Diagnostic::error(
                            Category::InvalidConstraint,
                            "invalid equality constraint between unrelated types",
                        )
                        .at(self.loc(w.span));
                        self.report(diag);
                    }
                }
                WhereClauseKind::Conformance { subject, traits } => {
                    let _ = self.realize_type_expr(subject);
                    for t in traits {
                        let ty = self.realize_type_expr(t);
                        if !ty.is_error() && !matches!(ty.canonical(), Type::Trait(_)) {
                            let shown = self.show(&ty);
                            let diag = Diagnostic::error(
                                Category::ConformanceToNonTrait,
                                format!("conformance to non-trait type `{shown}`"),
                            )
                            .at(self.loc(w.span));
                            self.report(diag);
                        }
                    }
                }
                WhereClauseKind::Predicate { .. } => {
                    // Value-level predicates stay symbolic until a later
                    // stage can evaluate them.
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    pub(crate) fn check_stmt(&mut self, s: StmtId, ctx: &BodyContext) {
        match self.program.ast().stmts[s].node.clone() {
            StmtKind::Brace(children) => {
                for child in children {
                    self.check_stmt(child, ctx);
                }
            }
            StmtKind::Assign { lhs, rhs } => {
                let span = self.program.ast().stmts[s].span;
                self.check_assign(lhs, rhs, span, ctx);
            }
            StmtKind::Conditional {
                conditions,
                success,
                failure,
            } => {
                for c in conditions {
                    self.check_condition(c, ctx);
                }
                self.check_stmt(success, ctx);
                if let Some(f) = failure {
                    self.check_stmt(f, ctx);
                }
            }
            StmtKind::While { conditions, body } => {
                for c in conditions {
                    self.check_condition(c, ctx);
                }
                self.check_stmt(body, ctx);
            }
            StmtKind::DoWhile { body, condition } => {
                self.check_stmt(body, ctx);
                self.check_bool_condition(condition, ctx);
            }
            StmtKind::Return(value) => {
                let span = self.program.ast().stmts[s].span;
                let output = ctx.output.clone().unwrap_or(Type::Error);
                match value {
                    Some(v) => {
                        let cause = ConstraintCause::new(
                            constraints::CauseKind::Return,
                            self.program.ast().expr_span(v),
                        );
                        self.solution_typing(v, Some(output.clone()), Vec::new(), ctx);
                        let actual = self.expr_types.get(&v).cloned().unwrap_or(Type::Error);
                        self.require_subtype(&actual, &output, cause);
                    }
                    None => {
                        if !output.is_void() && !output.is_error() {
                            let shown = self.show(&output);
                            let diag = Diagnostic::error(
                                Category::MissingReturnValue,
                                format!("missing return value of type `{shown}`"),
                            )
                            .at(self.loc(span));
                            self.report(diag);
                        }
                    }
                }
            }
            StmtKind::Yield(v) => {
                let output = ctx.yield_type.clone().unwrap_or(Type::Error);
                let cause = ConstraintCause::new(
                    constraints::CauseKind::Yield,
                    self.program.ast().expr_span(v),
                );
                self.solution_typing(v, Some(output.clone()), Vec::new(), ctx);
                let actual = self.expr_types.get(&v).cloned().unwrap_or(Type::Error);
                self.require_subtype(&actual, &output, cause);
            }
            StmtKind::Discard(v) => {
                self.solution_typing(v, None, Vec::new(), ctx);
            }
            StmtKind::Decl(d) => self.check_decl(d),
            StmtKind::Expr(e) => {
                self.solution_typing(e, None, Vec::new(), ctx);
                let ty = self.expr_types.get(&e).cloned().unwrap_or(Type::Error);
                let c = ty.canonical();
                if !c.is_void() && !c.is_never() && !c.is_error() {
                    let span = self.program.ast().expr_span(e);
                    let shown = self.show(&ty);
                    let diag = Diagnostic::warning(
                        Category::UnusedResult,
                        format!("unused result of type `{shown}`"),
                    )
                    .at(self.loc(span));
                    self.report(diag);
                }
            }
        }
    }

    fn check_condition(&mut self, c: serin_ast::ConditionItem, ctx: &BodyContext) {
        match c {
            serin_ast::ConditionItem::Expr(e) => self.check_bool_condition(e, ctx),
            serin_ast::ConditionItem::Binding(d) => {
                self.realize_decl(d);
            }
        }
    }

    fn check_bool_condition(&mut self, e: ExprId, ctx: &BodyContext) {
        let scope = self.program.expr_scope(e);
        let expected = self.core_type("Bool", scope);
        self.solution_typing(e, expected.clone(), Vec::new(), ctx);
        if let (Some(expected), Some(actual)) = (expected, self.expr_types.get(&e).cloned()) {
            let cause = ConstraintCause::new(
                constraints::CauseKind::Condition,
                self.program.ast().expr_span(e),
            );
            self.require_equal(&actual, &expected, cause);
        }
    }

    /// After-the-fact structural check for statement positions whose
    /// constraint already went through the solver; only diagnoses when the
    /// reified types are concrete and provably incompatible.
    fn require_subtype(&mut self, sub: &Type, sup: &Type, cause: ConstraintCause) {
        if sub.has_variable() || sup.has_variable() {
            return;
        }
        if solver::is_trivial_subtype(sub, sup) {
            return;
        }
        let sub_shown = self.show(sub);
        let sup_shown = self.show(sup);
        let diag = Diagnostic::error(
            Category::TypeMismatch,
            format!("expected `{sup_shown}`, found `{sub_shown}`"),
        )
        .at(self.loc(cause.span));
        self.report(diag);
    }

    fn require_equal(&mut self, lhs: &Type, rhs: &Type, cause: ConstraintCause) {
        if lhs.has_variable() || rhs.has_variable() || lhs.is_error() || rhs.is_error() {
            return;
        }
        if lhs.canonical() != rhs.canonical() {
            let lhs_shown = self.show(lhs);
            let rhs_shown = self.show(rhs);
            let diag = Diagnostic::error(
                Category::TypeMismatch,
                format!("expected `{rhs_shown}`, found `{lhs_shown}`"),
            )
            .at(self.loc(cause.span));
            self.report(diag);
        }
    }

    /// Check a single-expression body against the declared output. The
    /// body may alternatively have type `Never` (at a one-unit penalty).
    fn check_expression_body(&mut self, body: ExprId, output: Type, mutating_bundle: bool) {
        let span = self.program.ast().expr_span(body);
        let cause = ConstraintCause::new(constraints::CauseKind::Return, span);
        let ty = self.fresh_variable();
        let alternatives = Constraint::Disjunction {
            choices: vec![
                constraints::DisjunctionChoice {
                    constraints: vec![Constraint::Subtyping {
                        sub: ty.clone(),
                        sup: output.clone(),
                        cause: cause.clone(),
                    }],
                    penalty: 0,
                },
                constraints::DisjunctionChoice {
                    constraints: vec![Constraint::Equality {
                        lhs: ty.clone(),
                        rhs: Type::never(),
                        cause: cause.clone(),
                    }],
                    penalty: 1,
                },
            ],
            cause: cause.clone(),
        };
        let errors_before = self.error_count();
        self.solution_typing_with_root_type(body, ty, Some(output.clone()), vec![alternatives]);
        if mutating_bundle && self.error_count() > errors_before {
            let shown = self.show(&output);
            let diag = Diagnostic::error(
                Category::MutatingBundleReturn,
                format!("mutating bundle variant must return `{shown}`"),
            )
            .at(self.loc(span))
            .with_help("return a `(self, value)` pair from `inout` and `set` variants");
            self.report(diag);
        }
    }

    // -----------------------------------------------------------------------
    // Bindings
    // -----------------------------------------------------------------------

    /// Infer and check a binding declaration. Bindings have no
    /// realize/check split: this both computes the pattern type and
    /// verifies the initializer.
    pub(crate) fn check_binding(&mut self, d: DeclId) -> Type {
        match self.decl_requests.get(&d).copied() {
            Some(RequestState::Success | RequestState::Failure) => {
                return self.decl_types.get(&d).cloned().unwrap_or(Type::Error);
            }
            Some(_) => {
                self.report_cycle(d);
                self.fail_binding(d);
                return Type::Error;
            }
            None => {}
        }
        self.decl_requests
            .insert(d, RequestState::TypeRealizationStarted);

        let DeclKind::Binding(b) = self.program.ast().decls[d].node.clone() else {
            unreachable!("caller dispatches on kind");
        };

        // The initializer must not see the binding's own variables.
        self.bindings_under_checking.insert(d);
        let result = self.check_binding_inner(d, &b);
        self.bindings_under_checking.remove(&d);

        let failed = result.is_error();
        self.decl_types.insert(d, result.clone());
        self.decl_requests.insert(
            d,
            if failed {
                RequestState::Failure
            } else {
                RequestState::Success
            },
        );
        result
    }

    fn check_binding_inner(&mut self, d: DeclId, b: &serin_ast::BindingDecl) -> Type {
        let annotated = self.pattern_has_annotation(b.pattern);
        let shape = self.pattern_shape(b.pattern, None);
        let vars = self.program.ast().pattern_vars(b.pattern);

        match b.initializer {
            Some(init) => {
                let span = self.program.ast().expr_span(init);
                let cause =
                    ConstraintCause::new(constraints::CauseKind::BindingInitializer, span);
                let ty = self.fresh_variable();
                let relate = if annotated {
                    Constraint::Subtyping {
                        sub: ty.clone(),
                        sup: shape.clone(),
                        cause,
                    }
                } else {
                    Constraint::Equality {
                        lhs: ty.clone(),
                        rhs: shape.clone(),
                        cause,
                    }
                };
                let outcome = self.solution_typing_with_root_type(
                    init,
                    ty,
                    Some(shape.clone()),
                    vec![relate],
                );
                let mut result = outcome
                    .as_ref()
                    .map(|sol| sol.reify(&shape))
                    .unwrap_or(Type::Error);
                if result.has_variable() {
                    result = Type::Error;
                }
                for v in vars {
                    let reified = match (&outcome, self.tentative_var_types.get(&v)) {
                        (Some(sol), Some(t)) => {
                            let t = sol.reify(t);
                            if t.has_variable() { Type::Error } else { t }
                        }
                        _ => Type::Error,
                    };
                    self.decl_types.insert(v, reified);
                    self.decl_requests.insert(
                        v,
                        if self.decl_types[&v].is_error() {
                            RequestState::Failure
                        } else {
                            RequestState::Success
                        },
                    );
                    self.tentative_var_types.remove(&v);
                }
                result
            }
            None => {
                if shape.has_variable() {
                    let span = self.program.ast().decl_span(d);
                    let diag = Diagnostic::error(
                        Category::MissingAnnotation,
                        "binding without initializer requires a complete type annotation",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    self.fail_binding_vars(&vars);
                    Type::Error
                } else {
                    for v in vars {
                        let t = self
                            .tentative_var_types
                            .remove(&v)
                            .unwrap_or_else(|| shape.clone());
                        self.decl_types.insert(v, t);
                        self.decl_requests.insert(v, RequestState::Success);
                    }
                    shape
                }
            }
        }
    }

    fn fail_binding(&mut self, d: DeclId) {
        self.decl_types.insert(d, Type::Error);
        self.decl_requests.insert(d, RequestState::Failure);
        let DeclKind::Binding(b) = &self.program.ast().decls[d].node else {
            return;
        };
        let vars = self.program.ast().pattern_vars(b.pattern);
        self.fail_binding_vars(&vars);
    }

    fn fail_binding_vars(&mut self, vars: &[DeclId]) {
        for &v in vars {
            self.decl_types.insert(v, Type::Error);
            self.decl_requests.insert(v, RequestState::Failure);
            self.tentative_var_types.remove(&v);
        }
    }

    fn pattern_has_annotation(&self, p: serin_ast::PatternId) -> bool {
        match &self.program.ast().patterns[p].node {
            serin_ast::PatternKind::Binding { annotation, .. } => annotation.is_some(),
            _ => false,
        }
    }

    /// Infer the shape of a pattern, assigning tentative types to every
    /// variable it introduces.
    pub(crate) fn pattern_shape(
        &mut self,
        p: serin_ast::PatternId,
        expected: Option<&Type>,
    ) -> Type {
        match self.program.ast().patterns[p].node.clone() {
            serin_ast::PatternKind::Binding {
                annotation,
                subpattern,
                ..
            } => {
                let shape = match annotation {
                    Some(a) => self.realize_type_expr(a),
                    None => match expected {
                        Some(t) => t.clone(),
                        None => self.fresh_variable(),
                    },
                };
                self.pattern_shape(subpattern, Some(&shape));
                shape
            }
            serin_ast::PatternKind::Name { var } => {
                let t = match expected {
                    Some(t) => t.clone(),
                    None => self.fresh_variable(),
                };
                self.tentative_var_types.insert(var, t.clone());
                t
            }
            serin_ast::PatternKind::Tuple { elements } => {
                let expected_elements = match expected.map(Type::canonical) {
                    Some(Type::Tuple(es)) if es.len() == elements.len() => Some(es),
                    _ => None,
                };
                let mut out = Vec::with_capacity(elements.len());
                for (i, e) in elements.iter().enumerate() {
                    let hint = expected_elements.as_ref().map(|es| es[i].ty.clone());
                    let ty = self.pattern_shape(e.pattern, hint.as_ref());
                    out.push(TupleElement {
                        label: e.label.clone(),
                        ty,
                    });
                }
                Type::Tuple(out)
            }
            serin_ast::PatternKind::Wildcard => match expected {
                Some(t) => t.clone(),
                None => self.fresh_variable(),
            },
            serin_ast::PatternKind::Expr(_) => match expected {
                Some(t) => t.clone(),
                None => self.fresh_variable(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Core names
    // -----------------------------------------------------------------------

    /// Resolve a core type (e.g. `Bool`, `Int`) by unqualified lookup
    /// from `scope`. Returns the instance type, not its metatype.
    pub(crate) fn core_type(&mut self, name: &str, scope: ScopeId) -> Option<Type> {
        let decls = self.lookup_unqualified(name, scope);
        let d = *decls.first()?;
        match self.realize_decl(d) {
            Type::Metatype(inner) => Some(*inner),
            _ => None,
        }
    }

    /// Resolve a core trait (e.g. `ExpressibleByIntegerLiteral`).
    pub(crate) fn core_trait(&mut self, name: &str, scope: ScopeId) -> Option<DeclId> {
        let decls = self.lookup_unqualified(name, scope);
        decls
            .into_iter()
            .find(|&d| matches!(self.program.ast().decls[d].node, DeclKind::Trait(_)))
    }
}

#[cfg(test)]
mod check_tests;

#[cfg(test)]
mod prop_tests;
