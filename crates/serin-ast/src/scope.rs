//! Scope tree construction and lexical queries over a finished AST.
//!
//! A [`ScopedProgram`] owns the AST plus the maps the checker navigates:
//! scope parents, scope contents, the scope of every node, and the
//! variable-to-binding relation. Construction also performs the one
//! mutation checking relies on: synthesis of memberwise initializers and
//! trait `Self` parameters. After `new` returns, the program is immutable.

use std::collections::HashMap;

use crate::{
    Ast, BindingDecl, Branch, ConditionItem, DeclId, DeclKind, ExprId, ExprKind, FunctionBody,
    GenericClause, GenericParameterDecl, InitializerDecl, NameDomain, PatternId, PatternKind, Span,
    StmtId, StmtKind, TypeExprId, TypeExprKind, WhereClauseKind,
};

/// Identifies a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module(DeclId),
    TranslationUnit { module: DeclId, index: u32 },
    Decl(DeclId),
    Brace(StmtId),
}

#[derive(Debug, Clone)]
pub struct ScopeData {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Declarations directly contained in this scope, in source order.
    pub decls: Vec<DeclId>,
}

/// An immutable AST together with its scope structure.
#[derive(Debug)]
pub struct ScopedProgram {
    ast: Ast,
    scopes: Vec<ScopeData>,
    decl_scope: HashMap<DeclId, ScopeId>,
    introduced_scope: HashMap<DeclId, ScopeId>,
    expr_scope: HashMap<ExprId, ScopeId>,
    pattern_scope: HashMap<PatternId, ScopeId>,
    stmt_scope: HashMap<StmtId, ScopeId>,
    type_expr_scope: HashMap<TypeExprId, ScopeId>,
    var_binding: HashMap<DeclId, DeclId>,
}

impl ScopedProgram {
    /// Prepare `ast` (synthesize memberwise initializers and trait `Self`
    /// parameters) and derive the scope structure.
    pub fn new(mut ast: Ast) -> Self {
        prepare(&mut ast);
        let mut builder = Builder {
            ast: &ast,
            scopes: Vec::new(),
            decl_scope: HashMap::new(),
            introduced_scope: HashMap::new(),
            expr_scope: HashMap::new(),
            pattern_scope: HashMap::new(),
            stmt_scope: HashMap::new(),
            type_expr_scope: HashMap::new(),
            var_binding: HashMap::new(),
        };
        for module in ast.modules.clone() {
            builder.walk_module(module);
        }
        Self {
            scopes: builder.scopes,
            decl_scope: builder.decl_scope,
            introduced_scope: builder.introduced_scope,
            expr_scope: builder.expr_scope,
            pattern_scope: builder.pattern_scope,
            stmt_scope: builder.stmt_scope,
            type_expr_scope: builder.type_expr_scope,
            var_binding: builder.var_binding,
            ast,
        }
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn scope_kind(&self, s: ScopeId) -> ScopeKind {
        self.scopes[s.0 as usize].kind
    }

    pub fn scope_parent(&self, s: ScopeId) -> Option<ScopeId> {
        self.scopes[s.0 as usize].parent
    }

    /// Declarations directly contained in `s`, in source order.
    pub fn scope_decls(&self, s: ScopeId) -> &[DeclId] {
        &self.scopes[s.0 as usize].decls
    }

    /// The scope that lexically contains `d`.
    pub fn decl_scope(&self, d: DeclId) -> ScopeId {
        self.decl_scope[&d]
    }

    /// The scope `d` introduces, if it introduces one.
    pub fn scope_introducing(&self, d: DeclId) -> Option<ScopeId> {
        self.introduced_scope.get(&d).copied()
    }

    pub fn expr_scope(&self, e: ExprId) -> ScopeId {
        self.expr_scope[&e]
    }

    pub fn pattern_scope(&self, p: PatternId) -> ScopeId {
        self.pattern_scope[&p]
    }

    pub fn stmt_scope(&self, s: StmtId) -> ScopeId {
        self.stmt_scope[&s]
    }

    pub fn type_expr_scope(&self, t: TypeExprId) -> ScopeId {
        self.type_expr_scope[&t]
    }

    /// The binding declaration that introduces variable `v`.
    pub fn var_binding(&self, v: DeclId) -> Option<DeclId> {
        self.var_binding.get(&v).copied()
    }

    /// `s` followed by its ancestors, innermost first.
    pub fn scopes_from(&self, s: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        let mut next = Some(s);
        std::iter::from_fn(move || {
            let cur = next?;
            next = self.scope_parent(cur);
            Some(cur)
        })
    }

    /// The translation-unit scopes of a module, in declaration order.
    pub fn module_unit_scopes(&self, module: DeclId) -> Vec<ScopeId> {
        (0..self.scopes.len())
            .filter(|&i| {
                matches!(
                    self.scopes[i].kind,
                    ScopeKind::TranslationUnit { module: m, .. } if m == module
                )
            })
            .map(|i| ScopeId(i as u32))
            .collect()
    }

    /// The module declaration whose scope contains `s`.
    pub fn module_containing(&self, s: ScopeId) -> DeclId {
        for scope in self.scopes_from(s) {
            if let ScopeKind::Module(m) = self.scope_kind(scope) {
                return m;
            }
        }
        unreachable!("every scope is rooted in a module")
    }

    /// Whether `s` is inside the scope introduced by `decl`.
    pub fn is_contained(&self, s: ScopeId, decl: DeclId) -> bool {
        let Some(target) = self.scope_introducing(decl) else {
            return false;
        };
        self.scopes_from(s).any(|a| a == target)
    }

    /// Whether `d` is a member of a type declaration (directly, or through
    /// a conformance or extension).
    pub fn is_member(&self, d: DeclId) -> bool {
        let Some(&scope) = self.decl_scope.get(&d) else {
            return false;
        };
        match self.scope_kind(scope) {
            ScopeKind::Decl(owner) => matches!(
                self.ast.decls[owner].node,
                DeclKind::Product(_)
                    | DeclKind::Trait(_)
                    | DeclKind::Conformance(_)
                    | DeclKind::Extension(_)
            ),
            _ => false,
        }
    }

    /// Whether `d` is a non-static member.
    pub fn is_non_static_member(&self, d: DeclId) -> bool {
        if !self.is_member(d) {
            return false;
        }
        match &self.ast.decls[d].node {
            DeclKind::Function(f) => !f.is_static,
            DeclKind::Binding(b) => !b.is_static,
            DeclKind::Initializer(_) | DeclKind::Method(_) | DeclKind::Subscript(_) => true,
            _ => true,
        }
    }

    /// Whether a use site in `s` may refer to members without an explicit
    /// receiver: the innermost callable in the chain is a non-static
    /// member, or the site sits directly in a type declaration.
    pub fn is_member_context(&self, s: ScopeId) -> bool {
        for scope in self.scopes_from(s) {
            match self.scope_kind(scope) {
                ScopeKind::Decl(d) => match &self.ast.decls[d].node {
                    DeclKind::Function(_)
                    | DeclKind::Initializer(_)
                    | DeclKind::Method(_)
                    | DeclKind::MethodImpl(_)
                    | DeclKind::Subscript(_)
                    | DeclKind::SubscriptImpl(_) => return self.is_non_static_member(d),
                    DeclKind::Product(_)
                    | DeclKind::Trait(_)
                    | DeclKind::Conformance(_)
                    | DeclKind::Extension(_) => return true,
                    _ => {}
                },
                ScopeKind::Module(_) | ScopeKind::TranslationUnit { .. } => return false,
                ScopeKind::Brace(_) => {}
            }
        }
        false
    }

    /// Whether `d` is a trait requirement (a bodiless member of a trait).
    pub fn is_requirement(&self, d: DeclId) -> bool {
        let Some(&scope) = self.decl_scope.get(&d) else {
            return false;
        };
        let ScopeKind::Decl(owner) = self.scope_kind(scope) else {
            return false;
        };
        if !matches!(self.ast.decls[owner].node, DeclKind::Trait(_)) {
            return false;
        }
        match &self.ast.decls[d].node {
            DeclKind::Function(f) => f.body.is_none(),
            DeclKind::Initializer(i) => i.body.is_none(),
            DeclKind::Method(m) => m.impls.iter().all(|&i| {
                matches!(&self.ast.decls[i].node, DeclKind::MethodImpl(v) if v.body.is_none())
            }),
            DeclKind::Subscript(s) => s.impls.iter().all(|&i| {
                matches!(&self.ast.decls[i].node, DeclKind::SubscriptImpl(v) if v.body.is_none())
            }),
            DeclKind::AssociatedType(_) | DeclKind::AssociatedValue(_) => true,
            _ => false,
        }
    }

    /// Whether a requirement may be satisfied by a synthesized witness.
    pub fn is_synthesizable(&self, d: DeclId) -> bool {
        self.is_requirement(d)
            && matches!(&self.ast.decls[d].node, DeclKind::Function(f) if f.is_synthesizable)
    }

    /// Whether `d` is declared inside a callable's body.
    pub fn is_local(&self, d: DeclId) -> bool {
        let Some(&scope) = self.decl_scope.get(&d) else {
            return false;
        };
        for s in self.scopes_from(scope) {
            match self.scope_kind(s) {
                ScopeKind::Brace(_) => return true,
                ScopeKind::Decl(owner) => match self.ast.decls[owner].node {
                    DeclKind::Function(_)
                    | DeclKind::Initializer(_)
                    | DeclKind::MethodImpl(_)
                    | DeclKind::SubscriptImpl(_) => return true,
                    _ => return false,
                },
                ScopeKind::Module(_) | ScopeKind::TranslationUnit { .. } => return false,
            }
        }
        false
    }

    /// Whether `d` lives at module, translation-unit, or namespace level.
    pub fn is_global(&self, d: DeclId) -> bool {
        let Some(&scope) = self.decl_scope.get(&d) else {
            return false;
        };
        for s in self.scopes_from(scope) {
            match self.scope_kind(s) {
                ScopeKind::Module(_) | ScopeKind::TranslationUnit { .. } => return true,
                ScopeKind::Decl(owner) => {
                    if !matches!(self.ast.decls[owner].node, DeclKind::Namespace(_)) {
                        return false;
                    }
                }
                ScopeKind::Brace(_) => return false,
            }
        }
        false
    }

    /// The innermost type declaration whose scope contains `s`.
    pub fn innermost_type_scope(&self, s: ScopeId) -> Option<DeclId> {
        for scope in self.scopes_from(s) {
            if let ScopeKind::Decl(d) = self.scope_kind(scope) {
                if matches!(
                    self.ast.decls[d].node,
                    DeclKind::Product(_)
                        | DeclKind::Trait(_)
                        | DeclKind::Conformance(_)
                        | DeclKind::Extension(_)
                ) {
                    return Some(d);
                }
            }
        }
        None
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

// ---------------------------------------------------------------------------
// AST preparation
// ---------------------------------------------------------------------------

/// Synthesize the declarations checking assumes exist: one memberwise
/// initializer per product and one `Self` parameter per trait.
fn prepare(ast: &mut Ast) {
    let decl_ids: Vec<DeclId> = ast.decls.iter().map(|(id, _)| id).collect();
    for d in decl_ids {
        let span = ast.decls[d].span;
        let needs_init = matches!(
            &ast.decls[d].node,
            DeclKind::Product(p) if p.memberwise_init.is_none()
        );
        if needs_init {
            let init = ast.alloc_decl(
                DeclKind::Initializer(InitializerDecl {
                    parameters: Vec::new(),
                    generics: None,
                    body: None,
                    is_memberwise: true,
                }),
                span,
            );
            let DeclKind::Product(p) = &mut ast.decls[d].node else {
                unreachable!("kind checked above");
            };
            p.memberwise_init = Some(init);
            p.members.push(init);
        }
        let needs_self = matches!(
            &ast.decls[d].node,
            DeclKind::Trait(t) if t.self_parameter.is_none()
        );
        if needs_self {
            let self_param = ast.alloc_decl(
                DeclKind::GenericParameter(GenericParameterDecl {
                    ident: "Self".into(),
                    annotations: Vec::new(),
                }),
                span,
            );
            let DeclKind::Trait(t) = &mut ast.decls[d].node else {
                unreachable!("kind checked above");
            };
            t.self_parameter = Some(self_param);
        }
    }
}

// ---------------------------------------------------------------------------
// Scope tree builder
// ---------------------------------------------------------------------------

struct Builder<'a> {
    ast: &'a Ast,
    scopes: Vec<ScopeData>,
    decl_scope: HashMap<DeclId, ScopeId>,
    introduced_scope: HashMap<DeclId, ScopeId>,
    expr_scope: HashMap<ExprId, ScopeId>,
    pattern_scope: HashMap<PatternId, ScopeId>,
    stmt_scope: HashMap<StmtId, ScopeId>,
    type_expr_scope: HashMap<TypeExprId, ScopeId>,
    var_binding: HashMap<DeclId, DeclId>,
}

impl<'a> Builder<'a> {
    fn push_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            kind,
            parent,
            decls: Vec::new(),
        });
        id
    }

    fn record_decl(&mut self, d: DeclId, scope: ScopeId) {
        self.decl_scope.insert(d, scope);
        self.scopes[scope.0 as usize].decls.push(d);
    }

    fn walk_module(&mut self, module: DeclId) {
        let module_scope = self.push_scope(ScopeKind::Module(module), None);
        self.introduced_scope.insert(module, module_scope);
        let DeclKind::Module(m) = &self.ast.decls[module].node else {
            unreachable!("module list holds module declarations");
        };
        for (index, unit) in m.units.iter().enumerate() {
            let unit_scope = self.push_scope(
                ScopeKind::TranslationUnit {
                    module,
                    index: index as u32,
                },
                Some(module_scope),
            );
            for &d in &unit.decls {
                self.walk_decl(d, unit_scope);
            }
        }
    }

    fn walk_decl(&mut self, d: DeclId, scope: ScopeId) {
        self.record_decl(d, scope);
        match &self.ast.decls[d].node {
            DeclKind::Module(_) => unreachable!("modules are roots"),
            DeclKind::Product(p) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                // The conformance list is resolved outside the subject.
                for &c in &p.conformances {
                    self.walk_type_expr(c, scope);
                }
                if let Some(g) = &p.generics {
                    self.walk_generic_clause(g, inner);
                }
                for &m in &p.members {
                    self.walk_decl(m, inner);
                }
            }
            DeclKind::Trait(t) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                for &r in &t.refinements {
                    self.walk_type_expr(r, scope);
                }
                if let Some(sp) = t.self_parameter {
                    self.record_decl(sp, inner);
                }
                for &m in &t.members {
                    self.walk_decl(m, inner);
                }
            }
            DeclKind::TypeAlias(a) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                if let Some(g) = &a.generics {
                    self.walk_generic_clause(g, inner);
                }
                self.walk_type_expr(a.aliased, inner);
            }
            DeclKind::Binding(b) => {
                let b = b.clone();
                self.walk_binding(d, &b, scope);
            }
            DeclKind::Var(_) => {
                // Recorded while walking the enclosing binding pattern.
            }
            DeclKind::Function(f) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                if let Some(g) = &f.generics {
                    self.walk_generic_clause(g, inner);
                }
                for &c in &f.explicit_captures {
                    self.walk_decl(c, inner);
                }
                for &p in &f.parameters {
                    self.walk_decl(p, inner);
                }
                if let Some(out) = f.output {
                    self.walk_type_expr(out, inner);
                }
                match &f.body {
                    Some(FunctionBody::Expr(e)) => self.walk_expr(*e, inner),
                    Some(FunctionBody::Block(s)) => self.walk_stmt(*s, inner),
                    None => {}
                }
            }
            DeclKind::Initializer(i) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                if let Some(g) = &i.generics {
                    self.walk_generic_clause(g, inner);
                }
                for &p in &i.parameters {
                    self.walk_decl(p, inner);
                }
                if let Some(b) = i.body {
                    self.walk_stmt(b, inner);
                }
            }
            DeclKind::Method(m) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                if let Some(g) = &m.generics {
                    self.walk_generic_clause(g, inner);
                }
                for &p in &m.parameters {
                    self.walk_decl(p, inner);
                }
                if let Some(out) = m.output {
                    self.walk_type_expr(out, inner);
                }
                for &i in &m.impls {
                    self.walk_decl(i, inner);
                }
            }
            DeclKind::MethodImpl(i) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                match &i.body {
                    Some(FunctionBody::Expr(e)) => self.walk_expr(*e, inner),
                    Some(FunctionBody::Block(s)) => self.walk_stmt(*s, inner),
                    None => {}
                }
            }
            DeclKind::Subscript(s) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                if let Some(g) = &s.generics {
                    self.walk_generic_clause(g, inner);
                }
                for &c in &s.explicit_captures {
                    self.walk_decl(c, inner);
                }
                for &p in &s.parameters {
                    self.walk_decl(p, inner);
                }
                self.walk_type_expr(s.output, inner);
                for &i in &s.impls {
                    self.walk_decl(i, inner);
                }
            }
            DeclKind::SubscriptImpl(i) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                match &i.body {
                    Some(FunctionBody::Expr(e)) => self.walk_expr(*e, inner),
                    Some(FunctionBody::Block(s)) => self.walk_stmt(*s, inner),
                    None => {}
                }
            }
            DeclKind::Parameter(p) => {
                if let Some(a) = p.annotation {
                    self.walk_type_expr(a, scope);
                }
                if let Some(dv) = p.default_value {
                    self.walk_expr(dv, scope);
                }
            }
            DeclKind::GenericParameter(g) => {
                for &a in &g.annotations {
                    self.walk_type_expr(a, scope);
                }
            }
            DeclKind::AssociatedType(a) => {
                for &c in &a.conformances {
                    self.walk_type_expr(c, scope);
                }
                if let Some(dv) = a.default_value {
                    self.walk_type_expr(dv, scope);
                }
            }
            DeclKind::AssociatedValue(a) => {
                self.walk_type_expr(a.annotation, scope);
            }
            DeclKind::Conformance(c) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                self.walk_type_expr(c.subject, scope);
                for &t in &c.conformances {
                    self.walk_type_expr(t, scope);
                }
                for w in &c.where_clauses {
                    self.walk_where_clause(w.kind.clone(), inner);
                }
                for &m in &c.members {
                    self.walk_decl(m, inner);
                }
            }
            DeclKind::Extension(e) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                self.walk_type_expr(e.subject, scope);
                for w in &e.where_clauses {
                    self.walk_where_clause(w.kind.clone(), inner);
                }
                for &m in &e.members {
                    self.walk_decl(m, inner);
                }
            }
            DeclKind::Operator(_) => {}
            DeclKind::Namespace(n) => {
                let inner = self.push_scope(ScopeKind::Decl(d), Some(scope));
                self.introduced_scope.insert(d, inner);
                for &m in &n.members {
                    self.walk_decl(m, inner);
                }
            }
        }
    }

    fn walk_binding(&mut self, binding: DeclId, b: &BindingDecl, scope: ScopeId) {
        self.walk_pattern(b.pattern, binding, scope);
        if let Some(init) = b.initializer {
            self.walk_expr(init, scope);
        }
    }

    fn walk_generic_clause(&mut self, clause: &GenericClause, scope: ScopeId) {
        for &p in &clause.parameters {
            self.walk_decl(p, scope);
        }
        for w in &clause.where_clauses {
            self.walk_where_clause(w.kind.clone(), scope);
        }
    }

    fn walk_where_clause(&mut self, kind: WhereClauseKind, scope: ScopeId) {
        match kind {
            WhereClauseKind::Equality { lhs, rhs } => {
                self.walk_type_expr(lhs, scope);
                self.walk_type_expr(rhs, scope);
            }
            WhereClauseKind::Conformance { subject, traits } => {
                self.walk_type_expr(subject, scope);
                for t in traits {
                    self.walk_type_expr(t, scope);
                }
            }
            WhereClauseKind::Predicate { expr } => self.walk_expr(expr, scope),
        }
    }

    fn walk_pattern(&mut self, p: PatternId, binding: DeclId, scope: ScopeId) {
        self.pattern_scope.insert(p, scope);
        match &self.ast.patterns[p].node {
            PatternKind::Binding {
                annotation,
                subpattern,
                ..
            } => {
                if let Some(a) = *annotation {
                    self.walk_type_expr(a, scope);
                }
                self.walk_pattern(*subpattern, binding, scope);
            }
            PatternKind::Name { var } => {
                self.record_decl(*var, scope);
                self.var_binding.insert(*var, binding);
            }
            PatternKind::Tuple { elements } => {
                for e in elements.clone() {
                    self.walk_pattern(e.pattern, binding, scope);
                }
            }
            PatternKind::Wildcard => {}
            PatternKind::Expr(e) => self.walk_expr(*e, scope),
        }
    }

    fn walk_stmt(&mut self, s: StmtId, scope: ScopeId) {
        self.stmt_scope.insert(s, scope);
        match self.ast.stmts[s].node.clone() {
            StmtKind::Brace(stmts) => {
                let inner = self.push_scope(ScopeKind::Brace(s), Some(scope));
                for child in stmts {
                    self.walk_stmt(child, inner);
                }
            }
            StmtKind::Assign { lhs, rhs } => {
                self.walk_expr(lhs, scope);
                self.walk_expr(rhs, scope);
            }
            StmtKind::Conditional {
                conditions,
                success,
                failure,
            } => {
                for c in conditions {
                    self.walk_condition(c, scope);
                }
                self.walk_stmt(success, scope);
                if let Some(f) = failure {
                    self.walk_stmt(f, scope);
                }
            }
            StmtKind::While { conditions, body } => {
                for c in conditions {
                    self.walk_condition(c, scope);
                }
                self.walk_stmt(body, scope);
            }
            StmtKind::DoWhile { body, condition } => {
                self.walk_stmt(body, scope);
                self.walk_expr(condition, scope);
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.walk_expr(v, scope);
                }
            }
            StmtKind::Yield(v) | StmtKind::Discard(v) | StmtKind::Expr(v) => {
                self.walk_expr(v, scope)
            }
            StmtKind::Decl(d) => self.walk_decl(d, scope),
        }
    }

    fn walk_condition(&mut self, c: ConditionItem, scope: ScopeId) {
        match c {
            ConditionItem::Expr(e) => self.walk_expr(e, scope),
            ConditionItem::Binding(d) => self.walk_decl(d, scope),
        }
    }

    fn walk_expr(&mut self, e: ExprId, scope: ScopeId) {
        self.expr_scope.insert(e, scope);
        match self.ast.exprs[e].node.clone() {
            ExprKind::BooleanLiteral(_)
            | ExprKind::IntegerLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_) => {}
            ExprKind::Name(n) => {
                if let NameDomain::Explicit(domain) = n.domain {
                    self.walk_expr(domain, scope);
                }
                for a in n.arguments {
                    self.walk_type_expr(a, scope);
                }
            }
            ExprKind::Call(c) => {
                self.walk_expr(c.callee, scope);
                for a in c.arguments {
                    self.walk_expr(a.value, scope);
                }
            }
            ExprKind::SubscriptCall(c) => {
                self.walk_expr(c.callee, scope);
                for a in c.arguments {
                    self.walk_expr(a.value, scope);
                }
            }
            ExprKind::Lambda(d) => self.walk_decl(d, scope),
            ExprKind::Cast(c) => {
                self.walk_expr(c.subject, scope);
                self.walk_type_expr(c.target, scope);
            }
            ExprKind::Inout(i) => self.walk_expr(i.subject, scope),
            ExprKind::Tuple(t) => {
                for el in t.elements {
                    self.walk_expr(el.value, scope);
                }
            }
            ExprKind::Sequence(s) => {
                self.walk_expr(s.head, scope);
                for t in s.tail {
                    self.walk_expr(t.operator, scope);
                    self.walk_expr(t.operand, scope);
                }
            }
            ExprKind::Conditional(c) => {
                for cond in c.conditions {
                    self.walk_condition(cond, scope);
                }
                self.walk_branch(c.success, scope);
                if let Some(f) = c.failure {
                    self.walk_branch(f, scope);
                }
            }
        }
    }

    fn walk_branch(&mut self, b: Branch, scope: ScopeId) {
        match b {
            Branch::Expr(e) => self.walk_expr(e, scope),
            Branch::Block(s) => self.walk_stmt(s, scope),
        }
    }

    fn walk_type_expr(&mut self, t: TypeExprId, scope: ScopeId) {
        self.type_expr_scope.insert(t, scope);
        match self.ast.type_exprs[t].node.clone() {
            TypeExprKind::Name(n) => {
                if let Some(d) = n.domain {
                    self.walk_type_expr(d, scope);
                }
                for a in n.arguments {
                    self.walk_type_expr(a, scope);
                }
            }
            TypeExprKind::Tuple(elements) => {
                for el in elements {
                    self.walk_type_expr(el.value, scope);
                }
            }
            TypeExprKind::Lambda(l) => {
                if let Some(env) = l.environment {
                    self.walk_type_expr(env, scope);
                }
                for p in l.parameters {
                    self.walk_type_expr(p.bare, scope);
                }
                self.walk_type_expr(l.output, scope);
            }
            TypeExprKind::ConformanceLens { subject, lens } => {
                self.walk_type_expr(subject, scope);
                self.walk_type_expr(lens, scope);
            }
            TypeExprKind::Parameter { bare, .. } => self.walk_type_expr(bare, scope),
            TypeExprKind::Wildcard => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileId, ModuleDecl, ProductDecl, TraitDecl, TranslationUnit, VarDecl};

    fn span() -> Span {
        Span::new(FileId(0), 0, 1)
    }

    #[test]
    fn memberwise_init_is_synthesized() {
        let mut ast = Ast::new();
        let var = ast.alloc_decl(DeclKind::Var(VarDecl { ident: "x".into() }), span());
        let pattern = ast.alloc_pattern(PatternKind::Name { var }, span());
        let pattern = ast.alloc_pattern(
            PatternKind::Binding {
                introducer: crate::BindingIntroducer::Var,
                annotation: None,
                subpattern: pattern,
            },
            span(),
        );
        let binding = ast.alloc_decl(
            DeclKind::Binding(BindingDecl {
                pattern,
                initializer: None,
                is_static: false,
            }),
            span(),
        );
        let product = ast.alloc_decl(
            DeclKind::Product(ProductDecl {
                ident: "A".into(),
                generics: None,
                conformances: Vec::new(),
                members: vec![binding],
                memberwise_init: None,
            }),
            span(),
        );
        ast.alloc_decl(
            DeclKind::Module(ModuleDecl {
                ident: "main".into(),
                units: vec![TranslationUnit {
                    file: FileId(0),
                    decls: vec![product],
                }],
            }),
            span(),
        );

        let program = ScopedProgram::new(ast);
        let DeclKind::Product(p) = &program.ast().decls[product].node else {
            panic!("expected product");
        };
        let init = p.memberwise_init.expect("memberwise init synthesized");
        assert!(p.members.contains(&init));
        assert!(program.is_member(init));
    }

    #[test]
    fn trait_scope_holds_self_parameter() {
        let mut ast = Ast::new();
        let tr = ast.alloc_decl(
            DeclKind::Trait(TraitDecl {
                ident: "P".into(),
                refinements: Vec::new(),
                members: Vec::new(),
                self_parameter: None,
            }),
            span(),
        );
        ast.alloc_decl(
            DeclKind::Module(ModuleDecl {
                ident: "main".into(),
                units: vec![TranslationUnit {
                    file: FileId(0),
                    decls: vec![tr],
                }],
            }),
            span(),
        );

        let program = ScopedProgram::new(ast);
        let DeclKind::Trait(t) = &program.ast().decls[tr].node else {
            panic!("expected trait");
        };
        let self_param = t.self_parameter.expect("Self synthesized");
        let trait_scope = program.scope_introducing(tr).unwrap();
        assert!(program.scope_decls(trait_scope).contains(&self_param));
        assert_eq!(program.ast().decl_name(self_param), Some("Self"));
    }
}
