//! Constraint generation and the typing entry points.
//!
//! A [`Generator`] walks one expression tree, recording a tentative type
//! for every node and emitting constraints. The collected system runs
//! through the solver; the chosen solution is then reified into
//! `expr_types` and `referred_decls`, and deferred queries (lambda-body
//! checks, block branches) are drained.

use std::collections::HashMap;

use serin_ast::{
    Branch, CallExpr, CastKind, ConditionItem, DeclId, DeclKind, ExprId, ExprKind, FunctionBody,
    NameDomain, NameExpr, OperatorNotation, ScopeId, SequenceTail, Span, StmtId,
};
use serin_diag::{Category, Diagnostic};
use serin_types::{CallableParameter, TupleElement, Type};

use crate::constraints::{CauseKind, Constraint, ConstraintCause, OverloadChoice};
use crate::names::{NameResolutionResult, ResolvedComponent};
use crate::solver::Solution;
use crate::trace::{InferenceTracer, TracePhase, TraceStep};
use crate::{BodyContext, DeclRef, FoldedSequence, TypeChecker};

/// A typing obligation scheduled during generation and resolved after
/// the solver returns.
#[derive(Debug, Clone)]
pub(crate) enum DeferredQuery {
    /// Check a declaration through the ordinary request machinery.
    CheckDecl(DeclId),
    /// A lambda whose output was inferred inline: reify its type and
    /// close its request without re-walking the body.
    CompleteLambda { decl: DeclId, ty: Type },
    /// A block branch of a conditional expression.
    CheckStmt { stmt: StmtId, ctx: BodyContext },
}

impl TypeChecker<'_> {
    pub(crate) fn tracing_covers(&self, span: Span) -> bool {
        match self.config.trace_inference_at {
            Some(p) => span.covers_offset(p.file, p.offset),
            None => false,
        }
    }

    /// Type `subject` (with an optional expectation), solve, and commit.
    pub(crate) fn solution_typing(
        &mut self,
        subject: ExprId,
        expected: Option<Type>,
        extra: Vec<Constraint>,
        ctx: &BodyContext,
    ) -> Option<Solution> {
        let scope = self.program.expr_scope(subject);
        let span = self.program.ast().expr_span(subject);
        self.run_system(scope, span, ctx, |g| {
            g.constraints.extend(extra);
            g.visit(subject, expected.as_ref());
        })
    }

    /// Like [`Self::solution_typing`], with an extra variable equated to
    /// the subject's type so the caller can relate it to other shapes.
    pub(crate) fn solution_typing_with_root_type(
        &mut self,
        subject: ExprId,
        root: Type,
        expected: Option<Type>,
        extra: Vec<Constraint>,
    ) -> Option<Solution> {
        let scope = self.program.expr_scope(subject);
        let span = self.program.ast().expr_span(subject);
        let ctx = BodyContext::default();
        self.run_system(scope, span, &ctx, |g| {
            g.constraints.extend(extra);
            let cause = ConstraintCause::new(CauseKind::Structural, span);
            let ty = g.visit(subject, expected.as_ref());
            g.constraints.push(Constraint::Equality {
                lhs: root,
                rhs: ty,
                cause,
            });
        })
    }

    /// Type both sides of an assignment in one system.
    pub(crate) fn check_assign(&mut self, lhs: ExprId, rhs: ExprId, span: Span, ctx: &BodyContext) {
        let scope = self.program.expr_scope(lhs);
        let sinkable = self.core_trait("Sinkable", scope);
        self.run_system(scope, span, ctx, |g| {
            let cause = ConstraintCause::new(CauseKind::Assignment, span);
            let lt = g.visit(lhs, None);
            let rt = g.visit(rhs, Some(&lt));
            if let Some(t) = sinkable {
                g.constraints.push(Constraint::Conformance {
                    subject: lt.clone(),
                    traits: vec![t],
                    cause,
                });
            }
            g.constraints.push(Constraint::Subtyping {
                sub: rt,
                sup: lt,
                cause,
            });
        });
    }

    fn run_system(
        &mut self,
        scope: ScopeId,
        span: Span,
        ctx: &BodyContext,
        build: impl FnOnce(&mut Generator<'_, '_>),
    ) -> Option<Solution> {
        let errors_before = self.error_count();
        let tracing = self.tracing_covers(span);
        let mut tracer = InferenceTracer::new(tracing);

        let mut generator = Generator {
            checker: self,
            constraints: Vec::new(),
            inferred: HashMap::new(),
            bindings: HashMap::new(),
            deferred: Vec::new(),
            ctx: ctx.clone(),
        };
        build(&mut generator);
        let Generator {
            constraints,
            inferred,
            bindings,
            deferred,
            ..
        } = generator;
        let failed_generation = self.error_count() > errors_before;

        if tracing {
            for c in &constraints {
                let detail = c.describe(self.program.ast());
                tracer.emit(TraceStep::new(TracePhase::Generate, "constraint", detail));
            }
        }

        let solution = self.solve_constraints(constraints, bindings, scope, &mut tracer);

        // Reify: every typed node gets its substituted type; unresolved
        // variables in the chosen solution are reported once per node.
        let mut unresolved = 0usize;
        for (e, t) in inferred {
            let mut reified = solution.reify(&t);
            if reified.has_variable() {
                unresolved += 1;
                let at = self.loc(self.program.ast().expr_span(e));
                let diag =
                    Diagnostic::error(Category::NoContextToInfer, "not enough context to infer a type here")
                        .at(at);
                self.report(diag);
                reified = Type::Error;
            }
            if tracing {
                tracer.emit(TraceStep::new(
                    TracePhase::Reify,
                    "expression",
                    self.show(&reified),
                ));
            }
            self.expr_types.insert(e, reified);
        }
        for (e, r) in &solution.bindings {
            self.referred_decls.insert(*e, r.clone());
        }
        self.diagnostics.extend(solution.diagnostics.iter().cloned());

        for q in deferred {
            self.run_deferred(q, &solution);
        }

        let success = !failed_generation && solution.error_count() == 0 && unresolved == 0;
        success.then_some(solution)
    }

    fn run_deferred(&mut self, q: DeferredQuery, solution: &Solution) {
        match q {
            DeferredQuery::CheckDecl(d) => self.check_decl(d),
            DeferredQuery::CompleteLambda { decl, ty } => {
                let reified = solution.reify(&ty);
                // Parameters were realized with fresh holes; close them.
                if let DeclKind::Function(f) = self.program.ast().decls[decl].node.clone() {
                    for p in f.parameters {
                        if let Some(t) = self.decl_types.get(&p) {
                            let t = solution.reify(t);
                            self.decl_types.insert(p, t);
                        }
                    }
                }
                if reified.has_variable() {
                    let at = self.loc(self.program.ast().decl_span(decl));
                    let diag = Diagnostic::error(
                        Category::NoContextToInfer,
                        "not enough context to infer the type of this lambda",
                    )
                    .at(at);
                    self.report(diag);
                    self.decl_types.insert(decl, Type::Error);
                    self.decl_requests
                        .insert(decl, crate::RequestState::Failure);
                } else {
                    self.decl_types.insert(decl, reified);
                    self.decl_requests
                        .insert(decl, crate::RequestState::Success);
                }
            }
            DeferredQuery::CheckStmt { stmt, ctx } => self.check_stmt(stmt, &ctx),
        }
    }

    // -----------------------------------------------------------------------
    // Sequence folding
    // -----------------------------------------------------------------------

    /// Fold an infix chain into a binary tree by operator precedence.
    /// Folded forms are memoized.
    pub(crate) fn fold_sequence(&mut self, e: ExprId) -> FoldedSequence {
        if let Some(f) = self.folded_sequence_exprs.get(&e) {
            return f.clone();
        }
        let ExprKind::Sequence(s) = self.program.ast().exprs[e].node.clone() else {
            return FoldedSequence::Leaf(e);
        };
        let scope = self.program.expr_scope(e);
        let mut powers = HashMap::new();
        for t in &s.tail {
            let power = self.operator_power(t.operator, scope);
            powers.insert(t.operator, power);
        }
        let mut pos = 0usize;
        let folded =
            self.fold_tail(FoldedSequence::Leaf(s.head), &s.tail, &mut pos, 0, &powers);
        self.folded_sequence_exprs.insert(e, folded.clone());
        folded
    }

    fn operator_power(&mut self, operator: ExprId, scope: ScopeId) -> u8 {
        let ExprKind::Name(n) = &self.program.ast().exprs[operator].node else {
            return 0;
        };
        let ident = n.ident.clone();
        match self.lookup_operator(&ident, OperatorNotation::Infix, scope) {
            Some(d) => match &self.program.ast().decls[d].node {
                DeclKind::Operator(op) => op
                    .precedence_group
                    .map(|g| g.power())
                    .unwrap_or(u8::MAX),
                _ => 0,
            },
            None => {
                let at = self.loc(self.program.ast().expr_span(operator));
                let diag = Diagnostic::error(
                    Category::UndefinedName,
                    format!("undefined infix operator `{ident}`"),
                )
                .at(at);
                self.report(diag);
                0
            }
        }
    }

    fn fold_tail(
        &mut self,
        mut lhs: FoldedSequence,
        tail: &[SequenceTail],
        pos: &mut usize,
        min_power: u8,
        powers: &HashMap<ExprId, u8>,
    ) -> FoldedSequence {
        while *pos < tail.len() {
            let t = &tail[*pos];
            let power = powers[&t.operator];
            if power < min_power {
                break;
            }
            *pos += 1;
            let mut rhs = FoldedSequence::Leaf(t.operand);
            while *pos < tail.len() {
                let next = powers[&tail[*pos].operator];
                if next > power {
                    rhs = self.fold_tail(rhs, tail, pos, next, powers);
                } else {
                    break;
                }
            }
            lhs = FoldedSequence::Node {
                callee: t.operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        lhs
    }
}

// ---------------------------------------------------------------------------
// The generator
// ---------------------------------------------------------------------------

pub(crate) struct Generator<'c, 'p> {
    pub(crate) checker: &'c mut TypeChecker<'p>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) inferred: HashMap<ExprId, Type>,
    pub(crate) bindings: HashMap<ExprId, DeclRef>,
    pub(crate) deferred: Vec<DeferredQuery>,
    ctx: BodyContext,
}

impl Generator<'_, '_> {
    fn cause(&self, kind: CauseKind, e: ExprId) -> ConstraintCause {
        ConstraintCause::new(kind, self.checker.program.ast().expr_span(e))
    }

    fn fresh(&mut self) -> Type {
        self.checker.fresh_variable()
    }

    fn set(&mut self, e: ExprId, t: Type) -> Type {
        self.inferred.insert(e, t.clone());
        t
    }

    fn constrain(&mut self, c: Constraint) {
        self.constraints.push(c);
    }

    /// Walk one expression, emitting constraints. `expected` is a
    /// top-down hint; the returned type is recorded for the node.
    pub(crate) fn visit(&mut self, e: ExprId, expected: Option<&Type>) -> Type {
        match self.checker.program.ast().exprs[e].node.clone() {
            ExprKind::BooleanLiteral(_) => {
                let t = self.literal_core_type(e, "Bool");
                self.set(e, t)
            }
            ExprKind::IntegerLiteral(_) => {
                let t = self.literal(e, expected, "Int", "ExpressibleByIntegerLiteral");
                self.set(e, t)
            }
            ExprKind::FloatLiteral(_) => {
                let t = self.literal(e, expected, "Float64", "ExpressibleByFloatLiteral");
                self.set(e, t)
            }
            ExprKind::StringLiteral(_) => {
                let t = self.literal(e, expected, "String", "ExpressibleByStringLiteral");
                self.set(e, t)
            }
            ExprKind::Name(n) => self.visit_name(e, n, expected),
            ExprKind::Call(c) => self.visit_call(e, c, expected),
            ExprKind::SubscriptCall(c) => self.visit_subscript_call(e, c),
            ExprKind::Lambda(decl) => self.visit_lambda(e, decl, expected),
            ExprKind::Cast(c) => {
                let target = self.checker.realize_type_expr(c.target);
                let cause = self.cause(CauseKind::Cast, e);
                match c.kind {
                    CastKind::Up => {
                        let st = self.visit(c.subject, Some(&target));
                        self.constrain(Constraint::Subtyping {
                            sub: st,
                            sup: target.clone(),
                            cause,
                        });
                    }
                    CastKind::Down => {
                        // Checked dynamically; the operand is unconstrained.
                        self.visit(c.subject, None);
                    }
                    CastKind::PointerConversion => {
                        let st = self.visit(c.subject, None);
                        self.constrain(Constraint::Equality {
                            lhs: st,
                            rhs: Type::Builtin(serin_types::BuiltinType::Ptr),
                            cause,
                        });
                    }
                }
                self.set(e, target)
            }
            ExprKind::Inout(i) => {
                // Mutable-use marking is capture analysis's concern; the
                // expression types as its subject.
                let t = self.visit(i.subject, expected);
                self.set(e, t)
            }
            ExprKind::Tuple(t) => {
                let expected_elements = match expected.map(Type::canonical) {
                    Some(Type::Tuple(es))
                        if es.len() == t.elements.len()
                            && es
                                .iter()
                                .zip(t.elements.iter())
                                .all(|(x, y)| x.label == y.label) =>
                    {
                        Some(es)
                    }
                    _ => None,
                };
                let mut elements = Vec::with_capacity(t.elements.len());
                for (i, el) in t.elements.iter().enumerate() {
                    let hint = expected_elements.as_ref().map(|es| es[i].ty.clone());
                    let ty = self.visit(el.value, hint.as_ref());
                    elements.push(TupleElement {
                        label: el.label.clone(),
                        ty,
                    });
                }
                self.set(e, Type::Tuple(elements))
            }
            ExprKind::Sequence(_) => {
                let folded = self.checker.fold_sequence(e);
                let t = self.infer_folded(&folded);
                self.set(e, t)
            }
            ExprKind::Conditional(c) => {
                for cond in &c.conditions {
                    self.visit_condition(cond);
                }
                let both_exprs = matches!(
                    (&c.success, &c.failure),
                    (Branch::Expr(_), Some(Branch::Expr(_)))
                );
                let t = if both_exprs {
                    let (Branch::Expr(se), Some(Branch::Expr(fe))) = (&c.success, &c.failure)
                    else {
                        unreachable!()
                    };
                    let st = self.visit(*se, expected);
                    let ft = self.visit(*fe, expected);
                    let cause = self.cause(CauseKind::Branch, e);
                    self.constrain(Constraint::Equality {
                        lhs: st.clone(),
                        rhs: ft,
                        cause,
                    });
                    st
                } else {
                    self.visit_branch(&c.success);
                    if let Some(f) = &c.failure {
                        self.visit_branch(f);
                    }
                    Type::void()
                };
                self.set(e, t)
            }
        }
    }

    fn visit_branch(&mut self, b: &Branch) {
        match b {
            Branch::Expr(e) => {
                self.visit(*e, None);
            }
            Branch::Block(s) => self.deferred.push(DeferredQuery::CheckStmt {
                stmt: *s,
                ctx: self.ctx.clone(),
            }),
        }
    }

    fn visit_condition(&mut self, c: &ConditionItem) {
        match c {
            ConditionItem::Expr(ce) => {
                let scope = self.checker.program.expr_scope(*ce);
                let expected = self.checker.core_type("Bool", scope);
                let t = self.visit(*ce, expected.as_ref());
                if let Some(b) = expected {
                    let cause = self.cause(CauseKind::Condition, *ce);
                    self.constrain(Constraint::Equality {
                        lhs: t,
                        rhs: b,
                        cause,
                    });
                }
            }
            ConditionItem::Binding(d) => {
                self.checker.check_binding(*d);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Literals
    // -----------------------------------------------------------------------

    fn literal_core_type(&mut self, e: ExprId, name: &str) -> Type {
        let scope = self.checker.program.expr_scope(e);
        match self.checker.core_type(name, scope) {
            Some(t) => t,
            None => {
                let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                let diag =
                    Diagnostic::error(Category::UndefinedName, format!("undefined name `{name}`"))
                        .at(at);
                self.checker.report(diag);
                Type::Error
            }
        }
    }

    fn literal(
        &mut self,
        e: ExprId,
        expected: Option<&Type>,
        default_name: &str,
        trait_name: &str,
    ) -> Type {
        let scope = self.checker.program.expr_scope(e);
        let Some(default) = self.checker.core_type(default_name, scope) else {
            let at = self.checker.loc(self.checker.program.ast().expr_span(e));
            let diag = Diagnostic::error(
                Category::UndefinedName,
                format!("undefined name `{default_name}`"),
            )
            .at(at);
            self.checker.report(diag);
            return Type::Error;
        };
        let literal_trait = self.checker.core_trait(trait_name, scope);
        let subject = match expected {
            Some(t) => t.clone(),
            None => self.fresh(),
        };
        let cause = self.cause(CauseKind::Literal, e);
        self.constrain(Constraint::Literal {
            subject: subject.clone(),
            default,
            literal_trait,
            cause,
        });
        subject
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    fn visit_name(&mut self, e: ExprId, n: NameExpr, expected: Option<&Type>) -> Type {
        // Unroll the dotted chain to its root.
        let mut chain = vec![e];
        loop {
            let ExprKind::Name(cur) = &self.checker.program.ast().exprs[*chain.last().unwrap()].node
            else {
                break;
            };
            match cur.domain {
                NameDomain::Explicit(d)
                    if matches!(
                        self.checker.program.ast().exprs[d].node,
                        ExprKind::Name(_)
                    ) =>
                {
                    chain.push(d);
                }
                _ => break,
            }
        }
        chain.reverse();
        let ExprKind::Name(root) = self.checker.program.ast().exprs[chain[0]].node.clone() else {
            unreachable!("chain holds name expressions");
        };

        match root.domain {
            NameDomain::Explicit(dom) => {
                // The root hangs off an arbitrary expression; every
                // component resolves through a member constraint.
                let dt = self.visit(dom, None);
                return self.member_chain(dt, &chain);
            }
            NameDomain::Implicit => {
                let Some(exp) = expected else {
                    let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                    let diag = Diagnostic::error(
                        Category::NoContextToInfer,
                        format!("cannot infer the domain of `.{}`", n.ident),
                    )
                    .at(at);
                    self.checker.report(diag);
                    return self.set(e, Type::Error);
                };
                return self.member_chain(exp.clone(), &chain);
            }
            NameDomain::None => {}
        }

        match self.checker.resolve_name(e) {
            NameResolutionResult::Done(resolved) => {
                let last = self.apply_resolved(resolved);
                // The last component is `e` itself; its type was set by
                // apply_resolved.
                last
            }
            NameResolutionResult::Inexecutable {
                resolved,
                unresolved,
            } => {
                let mut parent = self.apply_resolved(resolved);
                for comp in unresolved {
                    let ExprKind::Name(cn) = self.checker.program.ast().exprs[comp].node.clone()
                    else {
                        continue;
                    };
                    let comp_scope = self.checker.program.expr_scope(comp);
                    let member_type = self.fresh();
                    let comp_cause = self.cause(CauseKind::Member, comp);
                    self.constrain(Constraint::Member {
                        subject: parent.clone(),
                        name: cn.ident.clone(),
                        expr: comp,
                        member_type: member_type.clone(),
                        scope: comp_scope,
                        cause: comp_cause,
                    });
                    self.set(comp, member_type.clone());
                    parent = member_type;
                }
                parent
            }
            NameResolutionResult::Failed => self.set(e, Type::Error),
        }
    }

    /// Resolve every component of a dotted chain through member
    /// constraints, threading each member type as the next subject.
    fn member_chain(&mut self, base: Type, chain: &[ExprId]) -> Type {
        let mut parent = base;
        for &comp in chain {
            let ExprKind::Name(cn) = self.checker.program.ast().exprs[comp].node.clone() else {
                continue;
            };
            let comp_scope = self.checker.program.expr_scope(comp);
            let cause = self.cause(CauseKind::Member, comp);
            let member_type = self.fresh();
            self.constrain(Constraint::Member {
                subject: parent.clone(),
                name: cn.ident.clone(),
                expr: comp,
                member_type: member_type.clone(),
                scope: comp_scope,
                cause,
            });
            self.set(comp, member_type.clone());
            parent = member_type;
        }
        parent
    }

    fn apply_resolved(&mut self, components: Vec<ResolvedComponent>) -> Type {
        let mut last = Type::Error;
        for comp in components {
            let cause = self.cause(CauseKind::Member, comp.expr);
            if comp.candidates.len() == 1 {
                let c = comp.candidates.into_iter().next().expect("length checked");
                self.constraints.extend(c.constraints);
                if let Some(r) = c.reference {
                    self.bindings.insert(comp.expr, r);
                }
                self.set(comp.expr, c.ty.clone());
                last = c.ty;
            } else {
                let tv = self.fresh();
                let choices = comp
                    .candidates
                    .into_iter()
                    .map(|c| {
                        let mut constraints = c.constraints;
                        constraints.push(Constraint::Equality {
                            lhs: tv.clone(),
                            rhs: c.ty,
                            cause,
                        });
                        OverloadChoice {
                            reference: c.reference,
                            constraints,
                            penalty: 0,
                        }
                    })
                    .collect();
                self.constrain(Constraint::Overload {
                    expr: comp.expr,
                    choices,
                    cause,
                });
                self.set(comp.expr, tv.clone());
                last = tv;
            }
        }
        last
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    fn visit_call(&mut self, e: ExprId, c: CallExpr, expected: Option<&Type>) -> Type {
        let callee_ty = self.visit(c.callee, None);
        let cause = self.cause(CauseKind::Argument, e);
        match callee_ty.canonical() {
            Type::Error => self.set(e, Type::Error),
            Type::Metatype(instance)
                if matches!(
                    self.checker.program.ast().exprs[c.callee].node,
                    ExprKind::Name(_)
                ) =>
            {
                self.visit_initializer_call(e, &c, *instance, cause)
            }
            Type::Lambda(l) => {
                if l.inputs.len() != c.arguments.len()
                    || l
                        .inputs
                        .iter()
                        .zip(c.arguments.iter())
                        .any(|(p, a)| p.label != a.label)
                {
                    self.diagnose_labels(e, &l.inputs.iter().map(|p| p.label.clone()).collect::<Vec<_>>(), &c);
                    return self.set(e, Type::Error);
                }
                for (p, a) in l.inputs.iter().zip(c.arguments.iter()) {
                    let hint = p.ty.bare().clone();
                    let at = self.visit(a.value, Some(&hint));
                    self.constrain(Constraint::Parameter {
                        arg: at,
                        param: p.ty.clone(),
                        cause,
                    });
                }
                self.set(e, (*l.output).clone())
            }
            Type::Method(m) => {
                if m.inputs.len() != c.arguments.len()
                    || m
                        .inputs
                        .iter()
                        .zip(c.arguments.iter())
                        .any(|(p, a)| p.label != a.label)
                {
                    self.diagnose_labels(e, &m.inputs.iter().map(|p| p.label.clone()).collect::<Vec<_>>(), &c);
                    return self.set(e, Type::Error);
                }
                for (p, a) in m.inputs.iter().zip(c.arguments.iter()) {
                    let hint = p.ty.bare().clone();
                    let at = self.visit(a.value, Some(&hint));
                    self.constrain(Constraint::Parameter {
                        arg: at,
                        param: p.ty.clone(),
                        cause,
                    });
                }
                self.set(e, (*m.output).clone())
            }
            Type::Variable(_) => {
                let mut arguments = Vec::with_capacity(c.arguments.len());
                for a in &c.arguments {
                    let at = self.visit(a.value, None);
                    arguments.push(CallableParameter {
                        label: a.label.clone(),
                        ty: at,
                    });
                }
                let output = match expected {
                    Some(t) => t.clone(),
                    None => self.fresh(),
                };
                self.constrain(Constraint::FunctionCall {
                    callee: callee_ty,
                    arguments,
                    output: output.clone(),
                    cause,
                });
                self.set(e, output)
            }
            other => {
                let shown = self.checker.show(&other);
                let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                let diag = Diagnostic::error(
                    Category::NotCallable,
                    format!("cannot call value of non-callable type `{shown}`"),
                )
                .at(at);
                self.checker.report(diag);
                self.set(e, Type::Error)
            }
        }
    }

    /// A call whose callee names a nominal type is sugar for a call to
    /// one of its initializers, with `self` passed implicitly.
    fn visit_initializer_call(
        &mut self,
        e: ExprId,
        c: &CallExpr,
        instance: Type,
        cause: ConstraintCause,
    ) -> Type {
        let scope = self.checker.program.expr_scope(e);
        let span = self.checker.program.ast().expr_span(e);
        let init_decls = self.checker.lookup_member(&instance, "init", scope);
        let mut choices = Vec::new();
        let callee_ty = self.fresh();
        for d in init_decls {
            let realized = self.checker.realize_decl(d);
            let instantiated = self.checker.instantiate(realized, scope, span);
            let Type::Lambda(l) = instantiated.shape else {
                continue;
            };
            let Some((receiver, rest)) = l.inputs.split_first() else {
                continue;
            };
            // The constructor's visible shape drops `self` and produces
            // the constructed value.
            let adjusted = Type::Lambda(serin_types::LambdaType {
                receiver_effect: l.receiver_effect,
                environment: l.environment.clone(),
                inputs: rest.to_vec(),
                output: Box::new(receiver.ty.bare().clone()),
            });
            let mut constraints = instantiated.constraints;
            constraints.push(Constraint::Equality {
                lhs: callee_ty.clone(),
                rhs: adjusted,
                cause,
            });
            choices.push(OverloadChoice {
                reference: Some(DeclRef::Member(d)),
                constraints,
                penalty: 0,
            });
        }
        if choices.is_empty() {
            let shown = self.checker.show(&instance);
            let at = self.checker.loc(span);
            let diag = Diagnostic::error(
                Category::UndefinedName,
                format!("type `{shown}` has no matching initializer"),
            )
            .at(at);
            self.checker.report(diag);
            return self.set(e, Type::Error);
        }
        self.constrain(Constraint::Overload {
            expr: c.callee,
            choices,
            cause,
        });

        let mut arguments = Vec::with_capacity(c.arguments.len());
        for a in &c.arguments {
            let at = self.visit(a.value, None);
            arguments.push(CallableParameter {
                label: a.label.clone(),
                ty: at,
            });
        }
        let output = self.fresh();
        self.constrain(Constraint::FunctionCall {
            callee: callee_ty,
            arguments,
            output: output.clone(),
            cause,
        });
        self.set(e, output)
    }

    fn visit_subscript_call(&mut self, e: ExprId, c: serin_ast::SubscriptCallExpr) -> Type {
        let callee_ty = self.visit(c.callee, None);
        let cause = self.cause(CauseKind::Argument, e);
        match callee_ty.canonical() {
            Type::Error => self.set(e, Type::Error),
            Type::Metatype(_) => {
                // Buffer-type sugar on a nominal metatype is a stub until
                // symbolic evaluation exists.
                let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                let diag = Diagnostic::error(
                    Category::Unsupported,
                    "buffer type expressions are not supported yet",
                )
                .at(at);
                self.checker.report(diag);
                self.set(e, Type::Error)
            }
            Type::Subscript(s) => {
                if s.inputs.len() != c.arguments.len()
                    || s
                        .inputs
                        .iter()
                        .zip(c.arguments.iter())
                        .any(|(p, a)| p.label != a.label)
                {
                    let expected: Vec<&str> = s
                        .inputs
                        .iter()
                        .map(|p| p.label.as_deref().unwrap_or("_"))
                        .collect();
                    let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                    let diag = Diagnostic::error(
                        Category::ArgumentLabelMismatch,
                        format!(
                            "subscript arguments do not match parameters ({})",
                            expected.join(", ")
                        ),
                    )
                    .at(at);
                    self.checker.report(diag);
                    return self.set(e, Type::Error);
                }
                for (p, a) in s.inputs.iter().zip(c.arguments.iter()) {
                    let hint = p.ty.bare().clone();
                    let at = self.visit(a.value, Some(&hint));
                    self.constrain(Constraint::Parameter {
                        arg: at,
                        param: p.ty.clone(),
                        cause,
                    });
                }
                self.set(e, (*s.output).clone())
            }
            Type::Variable(_) => {
                let mut arguments = Vec::with_capacity(c.arguments.len());
                for a in &c.arguments {
                    let at = self.visit(a.value, None);
                    arguments.push(CallableParameter {
                        label: a.label.clone(),
                        ty: at,
                    });
                }
                let output = self.fresh();
                self.constrain(Constraint::FunctionCall {
                    callee: callee_ty,
                    arguments,
                    output: output.clone(),
                    cause,
                });
                self.set(e, output)
            }
            other => {
                let shown = self.checker.show(&other);
                let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                let diag = Diagnostic::error(
                    Category::NotCallable,
                    format!("type `{shown}` has no subscripts"),
                )
                .at(at);
                self.checker.report(diag);
                self.set(e, Type::Error)
            }
        }
    }

    fn diagnose_labels(&mut self, e: ExprId, expected: &[Option<serin_ast::Name>], c: &CallExpr) {
        let expected: Vec<&str> = expected
            .iter()
            .map(|l| l.as_deref().unwrap_or("_"))
            .collect();
        let found: Vec<&str> = c
            .arguments
            .iter()
            .map(|a| a.label.as_deref().unwrap_or("_"))
            .collect();
        let at = self.checker.loc(self.checker.program.ast().expr_span(e));
        let diag = Diagnostic::error(
            Category::ArgumentLabelMismatch,
            format!(
                "argument labels ({}) do not match parameters ({})",
                found.join(", "),
                expected.join(", ")
            ),
        )
        .at(at);
        self.checker.report(diag);
    }

    // -----------------------------------------------------------------------
    // Lambdas
    // -----------------------------------------------------------------------

    fn visit_lambda(&mut self, e: ExprId, decl: DeclId, expected: Option<&Type>) -> Type {
        let ty = self.checker.realize_decl(decl);
        let Type::Lambda(l) = ty.clone() else {
            return self.set(e, Type::Error);
        };
        let cause = self.cause(CauseKind::Annotation, e);

        if let Some(exp) = expected {
            if let Type::Lambda(le) = exp.canonical() {
                if le.inputs.len() != l.inputs.len() {
                    let at = self.checker.loc(self.checker.program.ast().expr_span(e));
                    let diag = Diagnostic::error(
                        Category::ArgumentLabelMismatch,
                        format!(
                            "lambda takes {} parameter(s) but {} are expected",
                            l.inputs.len(),
                            le.inputs.len()
                        ),
                    )
                    .at(at);
                    self.checker.report(diag);
                    return self.set(e, Type::Error);
                }
                self.constrain(Constraint::Equality {
                    lhs: ty.clone(),
                    rhs: exp.clone(),
                    cause,
                });
            }
        }

        let DeclKind::Function(f) = self.checker.program.ast().decls[decl].node.clone() else {
            return self.set(e, Type::Error);
        };
        let output_unknown = f.output.is_none();
        match (output_unknown, &f.body) {
            (true, Some(FunctionBody::Expr(body))) => {
                // Infer the single-expression body inline; the deferred
                // query closes the declaration from the solution.
                let hint = (*l.output).clone();
                let bt = self.visit(*body, Some(&hint));
                self.constrain(Constraint::Equality {
                    lhs: bt,
                    rhs: (*l.output).clone(),
                    cause,
                });
                self.deferred.push(DeferredQuery::CompleteLambda {
                    decl,
                    ty: ty.clone(),
                });
            }
            _ => self.deferred.push(DeferredQuery::CheckDecl(decl)),
        }
        self.set(e, ty)
    }

    // -----------------------------------------------------------------------
    // Sequences
    // -----------------------------------------------------------------------

    fn infer_folded(&mut self, f: &FoldedSequence) -> Type {
        match f {
            FoldedSequence::Leaf(e) => self.visit(*e, None),
            FoldedSequence::Node { callee, lhs, rhs } => {
                let lt = self.infer_folded(lhs);
                let rt = self.infer_folded(rhs);
                let ExprKind::Name(n) = self.checker.program.ast().exprs[*callee].node.clone()
                else {
                    return Type::Error;
                };
                let scope = self.checker.program.expr_scope(*callee);
                let cause = self.cause(CauseKind::OperatorUse, *callee);
                let callee_ty = self.fresh();
                let output = self.fresh();
                // The operator is a member of the left operand's type.
                self.constrain(Constraint::Member {
                    subject: lt,
                    name: n.ident.clone(),
                    expr: *callee,
                    member_type: callee_ty.clone(),
                    scope,
                    cause,
                });
                self.constrain(Constraint::FunctionCall {
                    callee: callee_ty.clone(),
                    arguments: vec![CallableParameter {
                        label: None,
                        ty: rt,
                    }],
                    output: output.clone(),
                    cause,
                });
                self.set(*callee, callee_ty);
                output
            }
        }
    }
}
