//! Implicit-capture analysis for local functions and subscripts.
//!
//! Walks a declaration's body collecting domain-less name uses, marks
//! the roots of `inout` expressions (and assignment targets) as mutable,
//! and collapses the uses to one capture per name. Uses inside nested
//! type scopes are invisible; nested local functions are walked so their
//! free names propagate outward.

use std::collections::{HashMap, HashSet};

use serin_ast::{
    Branch, ConditionItem, DeclId, DeclKind, ExprId, ExprKind, FunctionBody, Name, ScopedProgram,
    StmtId, StmtKind,
};
use serin_diag::{Category, Diagnostic};
use serin_types::Type;

use crate::{DeclRef, ImplicitCapture, TypeChecker};

struct UseCollector<'p> {
    program: &'p ScopedProgram,
    uses: Vec<(ExprId, Name)>,
    mutable: HashSet<ExprId>,
}

impl<'p> UseCollector<'p> {
    fn new(program: &'p ScopedProgram) -> Self {
        Self {
            program,
            uses: Vec::new(),
            mutable: HashSet::new(),
        }
    }

    fn walk_decl(&mut self, d: DeclId) {
        match self.program.ast().decls[d].node.clone() {
            DeclKind::Function(f) => match f.body {
                Some(FunctionBody::Expr(e)) => self.walk_expr(e),
                Some(FunctionBody::Block(s)) => self.walk_stmt(s),
                None => {}
            },
            DeclKind::Subscript(s) => {
                for i in s.impls {
                    self.walk_decl(i);
                }
            }
            DeclKind::SubscriptImpl(i) => match i.body {
                Some(FunctionBody::Expr(e)) => self.walk_expr(e),
                Some(FunctionBody::Block(s)) => self.walk_stmt(s),
                None => {}
            },
            DeclKind::Binding(b) => {
                if let Some(init) = b.initializer {
                    self.walk_expr(init);
                }
            }
            // Nested type scopes are opaque to capture analysis.
            DeclKind::Product(_)
            | DeclKind::Trait(_)
            | DeclKind::TypeAlias(_)
            | DeclKind::Conformance(_)
            | DeclKind::Extension(_)
            | DeclKind::Namespace(_) => {}
            _ => {}
        }
    }

    fn walk_stmt(&mut self, s: StmtId) {
        match self.program.ast().stmts[s].node.clone() {
            StmtKind::Brace(children) => {
                for c in children {
                    self.walk_stmt(c);
                }
            }
            StmtKind::Assign { lhs, rhs } => {
                self.mark_root(lhs);
                self.walk_expr(lhs);
                self.walk_expr(rhs);
            }
            StmtKind::Conditional {
                conditions,
                success,
                failure,
            } => {
                for c in conditions {
                    self.walk_condition(c);
                }
                self.walk_stmt(success);
                if let Some(f) = failure {
                    self.walk_stmt(f);
                }
            }
            StmtKind::While { conditions, body } => {
                for c in conditions {
                    self.walk_condition(c);
                }
                self.walk_stmt(body);
            }
            StmtKind::DoWhile { body, condition } => {
                self.walk_stmt(body);
                self.walk_expr(condition);
            }
            StmtKind::Return(v) => {
                if let Some(v) = v {
                    self.walk_expr(v);
                }
            }
            StmtKind::Yield(v) | StmtKind::Discard(v) | StmtKind::Expr(v) => self.walk_expr(v),
            StmtKind::Decl(d) => self.walk_decl(d),
        }
    }

    fn walk_condition(&mut self, c: ConditionItem) {
        match c {
            ConditionItem::Expr(e) => self.walk_expr(e),
            ConditionItem::Binding(d) => self.walk_decl(d),
        }
    }

    fn walk_expr(&mut self, e: ExprId) {
        match self.program.ast().exprs[e].node.clone() {
            ExprKind::BooleanLiteral(_)
            | ExprKind::IntegerLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_) => {}
            ExprKind::Name(n) => match n.domain {
                serin_ast::NameDomain::None => {
                    self.uses.push((e, n.ident));
                }
                serin_ast::NameDomain::Explicit(d) => self.walk_expr(d),
                serin_ast::NameDomain::Implicit => {}
            },
            ExprKind::Call(c) => {
                self.walk_expr(c.callee);
                for a in c.arguments {
                    self.walk_expr(a.value);
                }
            }
            ExprKind::SubscriptCall(c) => {
                self.walk_expr(c.callee);
                for a in c.arguments {
                    self.walk_expr(a.value);
                }
            }
            ExprKind::Lambda(d) => self.walk_decl(d),
            ExprKind::Cast(c) => self.walk_expr(c.subject),
            ExprKind::Inout(i) => {
                self.mark_root(i.subject);
                self.walk_expr(i.subject);
            }
            ExprKind::Tuple(t) => {
                for el in t.elements {
                    self.walk_expr(el.value);
                }
            }
            ExprKind::Sequence(s) => {
                self.walk_expr(s.head);
                for t in s.tail {
                    self.walk_expr(t.operand);
                }
            }
            ExprKind::Conditional(c) => {
                for cond in c.conditions {
                    self.walk_condition(cond);
                }
                self.walk_branch(c.success);
                if let Some(f) = c.failure {
                    self.walk_branch(f);
                }
            }
        }
    }

    fn walk_branch(&mut self, b: Branch) {
        match b {
            Branch::Expr(e) => self.walk_expr(e),
            Branch::Block(s) => self.walk_stmt(s),
        }
    }

    /// Find the root of a mutated expression and mark it.
    fn mark_root(&mut self, e: ExprId) {
        match &self.program.ast().exprs[e].node {
            ExprKind::Name(n) => match n.domain {
                serin_ast::NameDomain::None => {
                    self.mutable.insert(e);
                }
                serin_ast::NameDomain::Explicit(d) => self.mark_root(d),
                serin_ast::NameDomain::Implicit => {}
            },
            ExprKind::SubscriptCall(c) => self.mark_root(c.callee),
            ExprKind::Inout(i) => self.mark_root(i.subject),
            _ => {}
        }
    }
}

impl TypeChecker<'_> {
    /// Discover the implicit captures of a local function or subscript.
    pub(crate) fn collect_captures(&mut self, d: DeclId) -> Vec<ImplicitCapture> {
        let mut collector = UseCollector::new(self.program);
        collector.walk_decl(d);
        let UseCollector { uses, mutable, .. } = collector;

        struct Entry {
            referent: DeclId,
            mutable: bool,
        }
        let mut order: Vec<Name> = Vec::new();
        let mut entries: HashMap<Name, Entry> = HashMap::new();
        let mut ambiguous: HashSet<Name> = HashSet::new();

        for (expr, name) in uses {
            if ambiguous.contains(&name) {
                continue;
            }
            let scope = self.program.expr_scope(expr);
            let decls = self.lookup_unqualified(&name, scope);
            let mut viable: Vec<DeclId> = Vec::new();
            for r in decls {
                if self.is_capturable(d, r) && !viable.contains(&r) {
                    viable.push(r);
                }
            }
            match viable.len() {
                0 => {}
                1 => {
                    let referent = viable[0];
                    let is_mutable = mutable.contains(&expr);
                    match entries.get_mut(&name) {
                        Some(entry) => entry.mutable |= is_mutable,
                        None => {
                            order.push(name.clone());
                            entries.insert(
                                name.clone(),
                                Entry {
                                    referent,
                                    mutable: is_mutable,
                                },
                            );
                        }
                    }
                }
                _ => {
                    ambiguous.insert(name.clone());
                    entries.remove(&name);
                    order.retain(|n| n != &name);
                    let at = self.loc(self.program.ast().expr_span(expr));
                    let diag = Diagnostic::error(
                        Category::AmbiguousCapture,
                        format!("implicit capture of `{name}` is ambiguous"),
                    )
                    .at(at)
                    .with_help("name the intended declaration in an explicit capture list");
                    self.report(diag);
                }
            }
        }

        order
            .into_iter()
            .map(|name| {
                let entry = &entries[&name];
                ImplicitCapture {
                    name,
                    effect: if entry.mutable {
                        serin_ast::AccessEffect::Inout
                    } else {
                        serin_ast::AccessEffect::Let
                    },
                    referent: DeclRef::Direct(entry.referent),
                }
            })
            .collect()
    }

    /// Whether `r` is a declaration `d` can implicitly capture.
    fn is_capturable(&mut self, d: DeclId, r: DeclId) -> bool {
        // Only value declarations are capturable.
        match self.program.ast().decls[r].node {
            DeclKind::Var(_) | DeclKind::Parameter(_) | DeclKind::Function(_) => {}
            _ => return false,
        }
        let r_scope = self.program.decl_scope(r);
        if self.program.is_contained(r_scope, d) {
            return false;
        }
        if self.program.is_global(r) {
            return false;
        }
        if self.program.is_member(r) {
            // A cross-receiver reference is filtered, not diagnosed here.
            if !self.program.is_member(d) {
                return false;
            }
            let r_owner = self.program.innermost_type_scope(self.program.decl_scope(r));
            let d_owner = self.program.innermost_type_scope(self.program.decl_scope(d));
            if r_owner != d_owner {
                return false;
            }
        }
        // Capture-less functions need no environment and are not captured.
        if matches!(self.program.ast().decls[r].node, DeclKind::Function(_)) {
            if let Type::Lambda(l) = self.realize_decl(r) {
                if l.environment.is_void() {
                    return false;
                }
            }
        }
        true
    }
}
