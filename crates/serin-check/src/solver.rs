//! The constraint solver.
//!
//! Solving is a branch-and-bound search over disjunction choices, scored
//! lexicographically by `(error count, penalty sum)` with a stable
//! tie-break on discovery order. Non-branching constraints are
//! simplified eagerly; constraints blocked on unresolved variables are
//! parked and woken whenever an assignment lands. At quiescence the
//! solver defaults literals, forces structure onto variable callees, and
//! finally reports whatever still cannot make progress.

use std::collections::{HashMap, VecDeque};

use serin_ast::{ExprId, ScopeId};
use serin_diag::{Category, Diagnostic};
use serin_types::{
    CallableParameter, GenericArgument, LambdaType, ParameterType, Type, TypeVariable,
};

use crate::constraints::{Constraint, ConstraintCause};
use crate::trace::{InferenceTracer, TracePhase, TraceStep};
use crate::{DeclRef, TypeChecker};

/// The outcome of a solver run.
#[derive(Debug, Clone, Default)]
pub(crate) struct Solution {
    pub assignments: HashMap<TypeVariable, Type>,
    pub bindings: HashMap<ExprId, DeclRef>,
    pub diagnostics: Vec<Diagnostic>,
    pub penalties: u32,
}

impl Solution {
    pub fn reify(&self, t: &Type) -> Type {
        t.substituting_variables(&self.assignments)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Lexicographic quality: fewer errors first, then fewer penalties.
    pub fn score(&self) -> (usize, u32) {
        (self.error_count(), self.penalties)
    }
}

/// Whether `sub <: sup` holds without further evidence.
pub(crate) fn is_trivial_subtype(sub: &Type, sup: &Type) -> bool {
    let sub = sub.canonical();
    let sup = sup.canonical();
    if sub.is_error() || sup.is_error() {
        return true;
    }
    if sub == sup || matches!(sup, Type::Any) || sub.is_never() {
        return true;
    }
    match (&sub, &sup) {
        (Type::Sum(xs), Type::Sum(ys)) => xs.iter().all(|x| ys.contains(x)),
        (_, Type::Sum(ys)) => ys.contains(&sub),
        _ => false,
    }
}

#[derive(Debug, Clone, Default)]
struct SolverState {
    fresh: VecDeque<Constraint>,
    stale: Vec<Constraint>,
    branches: Vec<Constraint>,
    assignments: HashMap<TypeVariable, Type>,
    bindings: HashMap<ExprId, DeclRef>,
    diagnostics: Vec<Diagnostic>,
    penalties: u32,
    woke: bool,
}

impl SolverState {
    fn resolve(&self, t: &Type) -> Type {
        t.substituting_variables(&self.assignments).canonical()
    }

    fn bind(&mut self, v: TypeVariable, t: Type) {
        self.assignments.insert(v, t);
        self.woke = true;
    }

    fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    fn diagnose(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }
}

impl TypeChecker<'_> {
    /// Solve a constraint system rooted at `scope`.
    pub(crate) fn solve_constraints(
        &mut self,
        constraints: Vec<Constraint>,
        bindings: HashMap<ExprId, DeclRef>,
        scope: ScopeId,
        tracer: &mut InferenceTracer,
    ) -> Solution {
        let state = SolverState {
            fresh: constraints.into(),
            bindings,
            ..SolverState::default()
        };
        let mut best: Option<(usize, u32)> = None;
        self.solve_state(state, scope, &mut best, tracer)
    }

    fn solve_state(
        &mut self,
        mut state: SolverState,
        scope: ScopeId,
        best: &mut Option<(usize, u32)>,
        tracer: &mut InferenceTracer,
    ) -> Solution {
        loop {
            while let Some(c) = state.fresh.pop_front() {
                if tracer.is_enabled() {
                    let detail = c.describe(self.program.ast());
                    tracer.emit(TraceStep::new(TracePhase::Solve, "simplify", detail));
                }
                self.simplify(c, &mut state, scope);
            }
            if state.woke {
                state.woke = false;
                let stale = std::mem::take(&mut state.stale);
                state.fresh.extend(stale);
                if !state.fresh.is_empty() {
                    continue;
                }
            }
            if !state.branches.is_empty() {
                return self.explore_branches(state, scope, best, tracer);
            }
            if self.apply_fallback(&mut state, scope) {
                continue;
            }
            break;
        }
        let solution = Solution {
            assignments: state.assignments,
            bindings: state.bindings,
            diagnostics: state.diagnostics,
            penalties: state.penalties,
        };
        let score = solution.score();
        if best.map(|b| score < b).unwrap_or(true) {
            *best = Some(score);
        }
        solution
    }

    fn explore_branches(
        &mut self,
        mut state: SolverState,
        scope: ScopeId,
        best: &mut Option<(usize, u32)>,
        tracer: &mut InferenceTracer,
    ) -> Solution {
        let branch = state.branches.remove(0);
        let choices: Vec<(Option<(ExprId, DeclRef)>, Vec<Constraint>, u32)> = match branch {
            Constraint::Overload { expr, choices, .. } => choices
                .into_iter()
                .map(|c| (c.reference.map(|r| (expr, r)), c.constraints, c.penalty))
                .collect(),
            Constraint::Disjunction { choices, .. } => choices
                .into_iter()
                .map(|c| (None, c.constraints, c.penalty))
                .collect(),
            _ => unreachable!("only disjunctive constraints are parked as branches"),
        };
        if tracer.is_enabled() {
            tracer.emit(TraceStep::new(
                TracePhase::Solve,
                "branch",
                format!("{} choice(s)", choices.len()),
            ));
        }

        let mut chosen: Option<Solution> = None;
        for (binding, constraints, penalty) in choices {
            let mut child = state.clone();
            child.penalties += penalty;
            if let Some((expr, reference)) = binding {
                child.bindings.insert(expr, reference);
            }
            child.fresh.extend(constraints);

            // Bound: a child that already scores worse than the best
            // finished solution cannot win.
            if let Some(b) = *best {
                let lower = (child.error_count(), child.penalties);
                if chosen.is_some() && lower > b {
                    continue;
                }
            }
            let candidate = self.solve_state(child, scope, best, tracer);
            let better = match &chosen {
                None => true,
                Some(current) => candidate.score() < current.score(),
            };
            if better {
                chosen = Some(candidate);
            }
        }
        chosen.expect("disjunctions have at least one choice")
    }

    // -----------------------------------------------------------------------
    // Simplification
    // -----------------------------------------------------------------------

    fn simplify(&mut self, c: Constraint, state: &mut SolverState, scope: ScopeId) {
        match c {
            Constraint::Equality { lhs, rhs, cause } => {
                self.unify(&lhs, &rhs, cause, state);
            }
            Constraint::Subtyping { sub, sup, cause } => {
                let s = state.resolve(&sub);
                let t = state.resolve(&sup);
                if is_trivial_subtype(&s, &t) {
                    return;
                }
                if s.has_variable() || t.has_variable() {
                    state.stale.push(Constraint::Subtyping { sub, sup, cause });
                    return;
                }
                self.unify(&s, &t, cause, state);
            }
            Constraint::Parameter { arg, param, cause } => {
                let p = state.resolve(&param);
                match p {
                    Type::Variable(_) => {
                        state.stale.push(Constraint::Parameter { arg, param, cause });
                    }
                    Type::Error => {}
                    Type::Parameter(pt) => {
                        state.fresh.push_back(Constraint::Subtyping {
                            sub: arg,
                            sup: (*pt.bare).clone(),
                            cause,
                        });
                    }
                    other => {
                        state.fresh.push_back(Constraint::Subtyping {
                            sub: arg,
                            sup: other,
                            cause,
                        });
                    }
                }
            }
            Constraint::Conformance {
                subject,
                traits,
                cause,
            } => {
                let s = state.resolve(&subject);
                if s.is_error() {
                    return;
                }
                if s.has_variable() {
                    state.stale.push(Constraint::Conformance {
                        subject,
                        traits,
                        cause,
                    });
                    return;
                }
                let conformed = self.conformed_traits(&s, scope);
                for t in traits {
                    if !conformed.contains(&t) {
                        let subject_shown = self.show(&s);
                        let trait_name = self
                            .program
                            .ast()
                            .decl_name(t)
                            .unwrap_or("_")
                            .to_string();
                        state.diagnose(
                            Diagnostic::error(
                                Category::UnsatisfiedRequirement,
                                format!(
                                    "`{subject_shown}` does not conform to trait `{trait_name}`"
                                ),
                            )
                            .at(self.loc(cause.span)),
                        );
                    }
                }
            }
            Constraint::FunctionCall {
                callee,
                arguments,
                output,
                cause,
            } => {
                let c = state.resolve(&callee);
                match c {
                    Type::Variable(_) => {
                        state.stale.push(Constraint::FunctionCall {
                            callee,
                            arguments,
                            output,
                            cause,
                        });
                    }
                    Type::Error => self.unify(&output, &Type::Error, cause, state),
                    Type::Lambda(l) => {
                        self.apply_callable(&l.inputs, &l.output, &arguments, &output, cause, state);
                    }
                    Type::Method(m) => {
                        self.apply_callable(&m.inputs, &m.output, &arguments, &output, cause, state);
                    }
                    Type::Subscript(s) => {
                        self.apply_callable(&s.inputs, &s.output, &arguments, &output, cause, state);
                    }
                    other => {
                        let shown = self.show(&other);
                        state.diagnose(
                            Diagnostic::error(
                                Category::NotCallable,
                                format!("cannot call value of non-callable type `{shown}`"),
                            )
                            .at(self.loc(cause.span)),
                        );
                        self.unify(&output, &Type::Error, cause, state);
                    }
                }
            }
            Constraint::Member {
                subject,
                name,
                expr,
                member_type,
                scope: member_scope,
                cause,
            } => {
                let s = state.resolve(&subject);
                if s.is_error() {
                    self.unify(&member_type, &Type::Error, cause, state);
                    return;
                }
                if s.has_variable() {
                    state.stale.push(Constraint::Member {
                        subject,
                        name,
                        expr,
                        member_type,
                        scope: member_scope,
                        cause,
                    });
                    return;
                }
                let decls = self.lookup_member(&s, &name, member_scope);
                if decls.is_empty() {
                    let shown = self.show(&s);
                    state.diagnose(
                        Diagnostic::error(
                            Category::UndefinedName,
                            format!("type `{shown}` has no member `{name}`"),
                        )
                        .at(self.loc(cause.span)),
                    );
                    self.unify(&member_type, &Type::Error, cause, state);
                    return;
                }
                let mut choices = Vec::new();
                for d in decls {
                    let realized = self.realize_decl(d).bare().clone();
                    let instantiated = self.instantiate(realized, member_scope, cause.span);
                    let mut constraints = instantiated.constraints;
                    constraints.push(Constraint::Equality {
                        lhs: member_type.clone(),
                        rhs: instantiated.shape,
                        cause,
                    });
                    choices.push(crate::constraints::OverloadChoice {
                        reference: Some(DeclRef::Member(d)),
                        constraints,
                        penalty: 0,
                    });
                }
                if choices.len() == 1 {
                    let choice = choices.pop().expect("length checked");
                    if let Some(r) = choice.reference {
                        state.bindings.insert(expr, r);
                    }
                    state.fresh.extend(choice.constraints);
                } else {
                    state.branches.push(Constraint::Overload {
                        expr,
                        choices,
                        cause,
                    });
                }
            }
            c @ (Constraint::Overload { .. } | Constraint::Disjunction { .. }) => {
                state.branches.push(c);
            }
            Constraint::Literal {
                subject,
                default,
                literal_trait,
                cause,
            } => {
                let s = state.resolve(&subject);
                if s.has_variable() {
                    state.stale.push(Constraint::Literal {
                        subject,
                        default,
                        literal_trait,
                        cause,
                    });
                    return;
                }
                if s.is_error() || s == state.resolve(&default) {
                    return;
                }
                match literal_trait {
                    Some(t) => state.fresh.push_back(Constraint::Conformance {
                        subject: s,
                        traits: vec![t],
                        cause,
                    }),
                    None => self.unify(&s, &default, cause, state),
                }
            }
            Constraint::Predicate { .. } => {
                // Reserved for symbolic evaluation; trivially satisfied.
            }
        }
    }

    fn apply_callable(
        &mut self,
        inputs: &[CallableParameter],
        declared_output: &Type,
        arguments: &[CallableParameter],
        output: &Type,
        cause: ConstraintCause,
        state: &mut SolverState,
    ) {
        if inputs.len() != arguments.len()
            || inputs
                .iter()
                .zip(arguments.iter())
                .any(|(p, a)| p.label != a.label)
        {
            let expected: Vec<&str> = inputs
                .iter()
                .map(|p| p.label.as_deref().unwrap_or("_"))
                .collect();
            let found: Vec<&str> = arguments
                .iter()
                .map(|p| p.label.as_deref().unwrap_or("_"))
                .collect();
            state.diagnose(
                Diagnostic::error(
                    Category::ArgumentLabelMismatch,
                    format!(
                        "argument labels ({}) do not match parameters ({})",
                        found.join(", "),
                        expected.join(", ")
                    ),
                )
                .at(self.loc(cause.span)),
            );
            self.unify(output, &Type::Error, cause, state);
            return;
        }
        for (p, a) in inputs.iter().zip(arguments.iter()) {
            state.fresh.push_back(Constraint::Parameter {
                arg: a.ty.clone(),
                param: p.ty.clone(),
                cause,
            });
        }
        self.unify(output, declared_output, cause, state);
    }

    // -----------------------------------------------------------------------
    // Quiescence fallbacks
    // -----------------------------------------------------------------------

    /// Make one unit of progress on a parked constraint. Returns `false`
    /// when nothing remains to try.
    fn apply_fallback(&mut self, state: &mut SolverState, _scope: ScopeId) -> bool {
        // A subtyping constraint still involving variables degrades to
        // equality; it counts as a constraining source for literals, so
        // it goes first.
        if let Some(pos) = state
            .stale
            .iter()
            .position(|c| matches!(c, Constraint::Subtyping { .. }))
        {
            let Constraint::Subtyping { sub, sup, cause } = state.stale.remove(pos) else {
                unreachable!()
            };
            self.unify(&sub, &sup, cause, state);
            return true;
        }
        // Literals default once nothing else constrains their subject.
        if let Some(pos) = state
            .stale
            .iter()
            .position(|c| matches!(c, Constraint::Literal { .. }))
        {
            let Constraint::Literal {
                subject,
                default,
                cause,
                ..
            } = state.stale.remove(pos)
            else {
                unreachable!()
            };
            self.unify(&subject, &default, cause, state);
            return true;
        }
        // A call through a still-unknown callee forces a lambda shape.
        if let Some(pos) = state
            .stale
            .iter()
            .position(|c| matches!(c, Constraint::FunctionCall { .. }))
        {
            let Constraint::FunctionCall {
                callee,
                arguments,
                output,
                cause,
            } = state.stale.remove(pos)
            else {
                unreachable!()
            };
            let shape = Type::Lambda(LambdaType {
                receiver_effect: serin_ast::AccessEffect::Let,
                environment: Box::new(self.fresh_variable()),
                inputs: arguments
                    .iter()
                    .map(|a| CallableParameter {
                        label: a.label.clone(),
                        ty: Type::Parameter(ParameterType {
                            convention: serin_ast::AccessEffect::Let,
                            bare: Box::new(a.ty.clone()),
                        }),
                    })
                    .collect(),
                output: Box::new(output),
            });
            self.unify(&callee, &shape, cause, state);
            return true;
        }
        // A parameter whose shape never materialized adopts the
        // argument's type under the default convention.
        if let Some(pos) = state
            .stale
            .iter()
            .position(|c| matches!(c, Constraint::Parameter { .. }))
        {
            let Constraint::Parameter { arg, param, cause } = state.stale.remove(pos) else {
                unreachable!()
            };
            let shape = Type::Parameter(ParameterType {
                convention: serin_ast::AccessEffect::Let,
                bare: Box::new(arg),
            });
            self.unify(&param, &shape, cause, state);
            return true;
        }
        // Whatever remains cannot be decided.
        if let Some(c) = state.stale.pop() {
            if !matches!(c, Constraint::Predicate { .. }) {
                state.diagnose(
                    Diagnostic::error(
                        Category::NoContextToInfer,
                        "not enough context to infer a type here",
                    )
                    .at(self.loc(c.cause().span)),
                );
            }
            return true;
        }
        false
    }

    // -----------------------------------------------------------------------
    // Unification
    // -----------------------------------------------------------------------

    fn unify(&mut self, a: &Type, b: &Type, cause: ConstraintCause, state: &mut SolverState) {
        let a = state.resolve(a);
        let b = state.resolve(b);
        if a == b {
            return;
        }
        match (&a, &b) {
            (Type::Error, _) | (_, Type::Error) => {}
            (Type::Variable(v), t) | (t, Type::Variable(v)) => {
                if t.free_variables().contains(v) {
                    state.diagnose(
                        Diagnostic::error(
                            Category::TypeMismatch,
                            "infinite type detected (a type cannot contain itself)",
                        )
                        .at(self.loc(cause.span)),
                    );
                    return;
                }
                state.bind(*v, t.clone());
            }
            (Type::Tuple(xs), Type::Tuple(ys))
                if xs.len() == ys.len()
                    && xs.iter().zip(ys.iter()).all(|(x, y)| x.label == y.label) =>
            {
                for (x, y) in xs.clone().iter().zip(ys.clone().iter()) {
                    self.unify(&x.ty, &y.ty, cause, state);
                }
            }
            (Type::Lambda(x), Type::Lambda(y))
                if x.inputs.len() == y.inputs.len()
                    && x.inputs
                        .iter()
                        .zip(y.inputs.iter())
                        .all(|(p, q)| p.label == q.label) =>
            {
                let (x, y) = (x.clone(), y.clone());
                self.unify(&x.environment, &y.environment, cause, state);
                for (p, q) in x.inputs.iter().zip(y.inputs.iter()) {
                    self.unify(&p.ty, &q.ty, cause, state);
                }
                self.unify(&x.output, &y.output, cause, state);
            }
            (Type::Parameter(x), Type::Parameter(y)) if x.convention == y.convention => {
                let (x, y) = (x.clone(), y.clone());
                self.unify(&x.bare, &y.bare, cause, state);
            }
            (Type::Remote(x), Type::Remote(y)) if x.effect == y.effect => {
                let (x, y) = (x.clone(), y.clone());
                self.unify(&x.projectee, &y.projectee, cause, state);
            }
            (Type::Metatype(x), Type::Metatype(y)) => {
                let (x, y) = (x.clone(), y.clone());
                self.unify(&x, &y, cause, state);
            }
            (
                Type::BoundGeneric {
                    base: xb,
                    arguments: xa,
                },
                Type::BoundGeneric {
                    base: yb,
                    arguments: ya,
                },
            ) if xa.len() == ya.len() => {
                let (xb, yb) = (xb.clone(), yb.clone());
                let (xa, ya) = (xa.clone(), ya.clone());
                self.unify(&xb, &yb, cause, state);
                for (x, y) in xa.iter().zip(ya.iter()) {
                    match (x, y) {
                        (GenericArgument::Type(xt), GenericArgument::Type(yt)) => {
                            self.unify(xt, yt, cause, state);
                        }
                        (GenericArgument::Value(xv), GenericArgument::Value(yv)) if xv == yv => {}
                        _ => self.mismatch(&a, &b, cause, state),
                    }
                }
            }
            (
                Type::AssociatedType {
                    decl: xd,
                    domain: xs,
                },
                Type::AssociatedType {
                    decl: yd,
                    domain: ys,
                },
            ) if xd == yd => {
                let (xs, ys) = (xs.clone(), ys.clone());
                self.unify(&xs, &ys, cause, state);
            }
            (
                Type::ConformanceLens {
                    subject: xs,
                    lens: xl,
                },
                Type::ConformanceLens {
                    subject: ys,
                    lens: yl,
                },
            ) if xl == yl => {
                let (xs, ys) = (xs.clone(), ys.clone());
                self.unify(&xs, &ys, cause, state);
            }
            (Type::Sum(xs), Type::Sum(ys)) if xs.len() == ys.len() => {
                let (xs, ys) = (xs.clone(), ys.clone());
                for (x, y) in xs.iter().zip(ys.iter()) {
                    self.unify(x, y, cause, state);
                }
            }
            _ => self.mismatch(&a, &b, cause, state),
        }
    }

    fn mismatch(&mut self, a: &Type, b: &Type, cause: ConstraintCause, state: &mut SolverState) {
        let found = self.show(a);
        let expected = self.show(b);
        state.diagnose(
            Diagnostic::error(
                Category::TypeMismatch,
                format!("expected `{expected}`, found `{found}`"),
            )
            .at(self.loc(cause.span)),
        );
    }
}
