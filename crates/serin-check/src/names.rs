//! Name resolution: unqualified lookup, member lookup, conformance
//! closures, and nominal-prefix resolution with candidate construction.
//!
//! Lookups are pure over the AST except for memoized member tables,
//! which are bypassed (not poisoned) while an extension subject is being
//! bound.

use std::collections::HashMap;

use serin_ast::{
    DeclId, DeclKind, ExprId, ExprKind, Name, NameDomain, NameExpr, OperatorNotation, ScopeId,
    ScopeKind, Span, WhereClauseKind,
};
use serin_diag::{Category, Diagnostic};
use serin_types::{BuiltinType, CallableParameter, LambdaType, ParameterType, Type};

use crate::constraints::Constraint;
use crate::{BuiltinFunction, DeclRef, TypeChecker};

/// One way a name component may resolve, with its instantiated type and
/// the side constraints instantiation incurred.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Absent for magic type names that denote no declaration.
    pub reference: Option<DeclRef>,
    pub ty: Type,
    pub constraints: Vec<Constraint>,
}

/// A component of a dotted name with its viable candidates.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedComponent {
    pub expr: ExprId,
    pub candidates: Vec<Candidate>,
}

/// Outcome of nominal-prefix resolution.
#[derive(Debug, Clone)]
pub(crate) enum NameResolutionResult {
    /// Every component resolved.
    Done(Vec<ResolvedComponent>),
    /// Resolution stopped early; the solver finishes the suffix through
    /// member constraints.
    Inexecutable {
        resolved: Vec<ResolvedComponent>,
        unresolved: Vec<ExprId>,
    },
    /// A component had no candidates; diagnosed already.
    Failed,
}

/// How the parent of a name component constrains its resolution.
#[derive(Debug, Clone)]
enum ParentRef {
    /// Qualified lookup in a type's member space.
    Type(Type),
    /// Lookup in a module or namespace declaration space.
    Space(DeclId),
}

impl TypeChecker<'_> {
    // -----------------------------------------------------------------------
    // Names introduced in a scope
    // -----------------------------------------------------------------------

    /// Whether a declaration may be overloaded by other declarations of
    /// the same name (function-kind declarations only).
    pub(crate) fn is_overloadable(&self, d: DeclId) -> bool {
        matches!(
            self.program.ast().decls[d].node,
            DeclKind::Function(_)
                | DeclKind::Method(_)
                | DeclKind::Subscript(_)
                | DeclKind::Initializer(_)
        )
    }

    /// The names a scope introduces, per declaration kind.
    pub(crate) fn names_introduced_in(&self, scope: ScopeId) -> HashMap<Name, Vec<DeclId>> {
        let mut out: HashMap<Name, Vec<DeclId>> = HashMap::new();
        match self.program.scope_kind(scope) {
            ScopeKind::Module(m) => {
                // A module introduces the union of its translation units,
                // read through the unit scopes so that variables of
                // top-level bindings are included.
                for unit_scope in self.program.module_unit_scopes(m) {
                    for &d in self.program.scope_decls(unit_scope) {
                        self.add_introduced_name(d, &mut out);
                    }
                }
            }
            _ => {
                for &d in self.program.scope_decls(scope) {
                    self.add_introduced_name(d, &mut out);
                }
            }
        }
        out
    }

    fn add_introduced_name(&self, d: DeclId, out: &mut HashMap<Name, Vec<DeclId>>) {
        let name: Option<Name> = match &self.program.ast().decls[d].node {
            DeclKind::Product(p) => Some(p.ident.clone()),
            DeclKind::Trait(t) => Some(t.ident.clone()),
            DeclKind::TypeAlias(a) => Some(a.ident.clone()),
            DeclKind::Var(v) => Some(v.ident.clone()),
            DeclKind::Parameter(p) => Some(p.ident.clone()),
            DeclKind::Namespace(n) => Some(n.ident.clone()),
            DeclKind::AssociatedType(a) => Some(a.ident.clone()),
            DeclKind::AssociatedValue(a) => Some(a.ident.clone()),
            DeclKind::GenericParameter(g) => Some(g.ident.clone()),
            DeclKind::Function(f) => f.ident.clone(),
            DeclKind::Initializer(_) => Some("init".into()),
            DeclKind::Method(m) => Some(m.ident.clone()),
            DeclKind::Subscript(s) => Some(s.ident.clone().unwrap_or_else(|| "[]".into())),
            // Exposed through the containing binding, operator lookup,
            // or the bundle; they introduce no name of their own.
            DeclKind::Binding(_)
            | DeclKind::Conformance(_)
            | DeclKind::Extension(_)
            | DeclKind::MethodImpl(_)
            | DeclKind::SubscriptImpl(_)
            | DeclKind::Operator(_)
            | DeclKind::Module(_) => None,
        };
        if let Some(name) = name {
            out.entry(name).or_default().push(d);
        }
    }

    // -----------------------------------------------------------------------
    // Unqualified lookup
    // -----------------------------------------------------------------------

    /// Whether lookup must hide `d` because its binding's initializer is
    /// currently being inferred.
    fn is_hidden_from_lookup(&self, d: DeclId) -> bool {
        if !matches!(self.program.ast().decls[d].node, DeclKind::Var(_)) {
            return false;
        }
        match self.program.var_binding(d) {
            Some(b) => self.bindings_under_checking.contains(&b),
            None => false,
        }
    }

    /// Walk outer scopes from the use site; a non-overloadable match
    /// shadows everything further out.
    pub(crate) fn lookup_unqualified(&mut self, name: &str, scope: ScopeId) -> Vec<DeclId> {
        let mut matches: Vec<DeclId> = Vec::new();
        let chain: Vec<ScopeId> = self.program.scopes_from(scope).collect();
        let own_module = self.program.module_containing(scope);
        for s in chain {
            // File scopes are skipped; the module root unions all units.
            if matches!(
                self.program.scope_kind(s),
                ScopeKind::TranslationUnit { .. }
            ) {
                continue;
            }
            let introduced = self.names_introduced_in(s);
            if let Some(ds) = introduced.get(name) {
                for &d in ds {
                    if self.is_hidden_from_lookup(d) || matches.contains(&d) {
                        continue;
                    }
                    matches.push(d);
                }
            }
            if !matches.is_empty() && matches.iter().any(|&d| !self.is_overloadable(d)) {
                return matches;
            }
        }
        if matches.is_empty() {
            // Search the other modules, then module names themselves.
            for &m in &self.program.ast().modules {
                if m == own_module {
                    continue;
                }
                if let Some(ms) = self.program.scope_introducing(m) {
                    if let Some(ds) = self.names_introduced_in(ms).get(name) {
                        for &d in ds {
                            if !matches.contains(&d) {
                                matches.push(d);
                            }
                        }
                    }
                }
            }
        }
        if matches.is_empty() {
            for &m in &self.program.ast().modules {
                if self.program.ast().decl_name(m) == Some(name) {
                    matches.push(m);
                }
            }
        }
        matches
    }

    // -----------------------------------------------------------------------
    // Member lookup
    // -----------------------------------------------------------------------

    /// Look up `name` as a member of `ty`, as seen from `scope`.
    /// Memoized by `(canonical type, scope)` when no extension subject is
    /// currently being bound.
    pub(crate) fn lookup_member(&mut self, ty: &Type, name: &str, scope: ScopeId) -> Vec<DeclId> {
        fn strip_projections(ty: &Type) -> &Type {
            match ty {
                Type::Parameter(p) => strip_projections(&p.bare),
                Type::Remote(r) => strip_projections(&r.projectee),
                _ => ty,
            }
        }
        let subject = strip_projections(ty).canonical();

        let memoizable = self.extensions_under_binding.is_empty();
        if memoizable {
            if let Some(table) = self.member_lookup_tables.get(&(subject.clone(), scope)) {
                if let Some(found) = table.get(name) {
                    return found.clone();
                }
            }
        }
        let found = self.compute_members(&subject, name, scope);
        if memoizable {
            self.member_lookup_tables
                .entry((subject, scope))
                .or_default()
                .insert(name.into(), found.clone());
        }
        found
    }

    fn compute_members(&mut self, subject: &Type, name: &str, scope: ScopeId) -> Vec<DeclId> {
        match subject {
            Type::BoundGeneric { base, .. } => return self.compute_members(base, name, scope),
            Type::Metatype(inner) => return self.compute_members(inner, name, scope),
            Type::ConformanceLens { lens, .. } => {
                return self.compute_members(&Type::Trait(*lens), name, scope);
            }
            _ => {}
        }

        let mut out: Vec<DeclId> = Vec::new();
        let nominal_owner = match subject {
            Type::Product(d) | Type::Trait(d) => Some(*d),
            _ => None,
        };
        if let Some(owner) = nominal_owner {
            if let Some(s) = self.program.scope_introducing(owner) {
                if let Some(ds) = self.names_introduced_in(s).get(name) {
                    out.extend(ds.iter().copied());
                }
            }
        }

        for e in self.extensions_of(subject, scope) {
            if let Some(s) = self.program.scope_introducing(e) {
                if let Some(ds) = self.names_introduced_in(s).get(name) {
                    for &d in ds {
                        if !out.contains(&d) {
                            out.push(d);
                        }
                    }
                }
            }
        }

        // Inherited members apply only while nothing non-overloadable
        // froze the result.
        if out.iter().all(|&d| self.is_overloadable(d)) {
            for t in self.conformed_traits(subject, scope) {
                if nominal_owner == Some(t) {
                    continue;
                }
                if let Some(s) = self.program.scope_introducing(t) {
                    if let Some(ds) = self.names_introduced_in(s).get(name) {
                        for &d in ds {
                            if !out.contains(&d) {
                                out.push(d);
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Extension and conformance declarations of `subject` exposed at
    /// `scope`, in AST order.
    pub(crate) fn extensions_of(&mut self, subject: &Type, scope: ScopeId) -> Vec<DeclId> {
        let subject = subject.canonical();
        let mut candidates: Vec<DeclId> = Vec::new();
        let mut push_scope_decls = |checker: &Self, s: ScopeId, out: &mut Vec<DeclId>| {
            for &d in checker.program.scope_decls(s) {
                if matches!(
                    checker.program.ast().decls[d].node,
                    DeclKind::Extension(_) | DeclKind::Conformance(_)
                ) && !out.contains(&d)
                {
                    out.push(d);
                }
            }
        };
        for s in self.program.scopes_from(scope).collect::<Vec<_>>() {
            match self.program.scope_kind(s) {
                ScopeKind::Module(m) => {
                    let DeclKind::Module(module) = &self.program.ast().decls[m].node else {
                        continue;
                    };
                    for unit in &module.units {
                        for &d in &unit.decls {
                            if matches!(
                                self.program.ast().decls[d].node,
                                DeclKind::Extension(_) | DeclKind::Conformance(_)
                            ) && !candidates.contains(&d)
                            {
                                candidates.push(d);
                            }
                        }
                    }
                }
                _ => push_scope_decls(self, s, &mut candidates),
            }
        }
        let own_module = self.program.module_containing(scope);
        for &m in &self.program.ast().modules.clone() {
            if m == own_module {
                continue;
            }
            let DeclKind::Module(module) = &self.program.ast().decls[m].node else {
                continue;
            };
            for unit in &module.units {
                for &d in &unit.decls {
                    if matches!(
                        self.program.ast().decls[d].node,
                        DeclKind::Extension(_) | DeclKind::Conformance(_)
                    ) && !candidates.contains(&d)
                    {
                        candidates.push(d);
                    }
                }
            }
        }

        let mut out = Vec::new();
        for e in candidates {
            if self.extensions_under_binding.contains(&e) {
                continue;
            }
            let subject_expr = match &self.program.ast().decls[e].node {
                DeclKind::Extension(x) => x.subject,
                DeclKind::Conformance(c) => c.subject,
                _ => continue,
            };
            let extended = self.realize_subject(e, subject_expr);
            if !extended.is_error() && extended.canonical() == subject {
                out.push(e);
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Conformance closure
    // -----------------------------------------------------------------------

    /// The refinement closure of a trait, including the trait itself.
    /// `None` when the refinement graph is cyclic (diagnosed here).
    pub(crate) fn trait_refinement_closure(&mut self, t: DeclId) -> Option<Vec<DeclId>> {
        let mut out = Vec::new();
        let mut visiting = Vec::new();
        if self.refinement_closure_rec(t, &mut visiting, &mut out) {
            Some(out)
        } else {
            None
        }
    }

    fn refinement_closure_rec(
        &mut self,
        t: DeclId,
        visiting: &mut Vec<DeclId>,
        out: &mut Vec<DeclId>,
    ) -> bool {
        if visiting.contains(&t) {
            let span = self.program.ast().decl_span(t);
            let name = self.program.ast().decl_name(t).unwrap_or("_").to_string();
            let diag = Diagnostic::error(
                Category::CircularRefinement,
                format!("trait `{name}` refines itself"),
            )
            .at(self.loc(span));
            self.report(diag);
            return false;
        }
        if out.contains(&t) {
            return true;
        }
        out.push(t);
        visiting.push(t);
        let DeclKind::Trait(decl) = self.program.ast().decls[t].node.clone() else {
            visiting.pop();
            return true;
        };
        let mut ok = true;
        for r in decl.refinements {
            if let Type::Trait(refined) = self.realize_type_expr(r).canonical() {
                ok &= self.refinement_closure_rec(refined, visiting, out);
            }
        }
        visiting.pop();
        ok
    }

    /// Every trait `ty` conforms to, as seen from `scope`.
    pub(crate) fn conformed_traits(&mut self, ty: &Type, scope: ScopeId) -> Vec<DeclId> {
        let ty = ty.canonical();
        let mut out: Vec<DeclId> = Vec::new();
        let mut add_closure = |checker: &mut Self, t: DeclId, out: &mut Vec<DeclId>| {
            if let Some(closure) = checker.trait_refinement_closure(t) {
                for c in closure {
                    if !out.contains(&c) {
                        out.push(c);
                    }
                }
            }
        };

        match &ty {
            Type::GenericTypeParameter(p) | Type::Skolem(p) => {
                // At trait scope, `Self` conforms to the trait alone
                // (plus its refinements).
                let owner_scope = self.program.decl_scope(*p);
                if let ScopeKind::Decl(owner) = self.program.scope_kind(owner_scope) {
                    if matches!(self.program.ast().decls[owner].node, DeclKind::Trait(_)) {
                        let is_self = matches!(
                            &self.program.ast().decls[owner].node,
                            DeclKind::Trait(t) if t.self_parameter == Some(*p)
                        );
                        if is_self {
                            add_closure(self, owner, &mut out);
                            return out;
                        }
                    }
                }
                for t in self.parameter_bound_traits(*p) {
                    add_closure(self, t, &mut out);
                }
                for t in self.where_clause_bounds(*p) {
                    add_closure(self, t, &mut out);
                }
            }
            Type::Product(d) => {
                let DeclKind::Product(p) = self.program.ast().decls[*d].node.clone() else {
                    return out;
                };
                for c in p.conformances {
                    if let Type::Trait(t) = self.realize_type_expr(c).canonical() {
                        add_closure(self, t, &mut out);
                    }
                }
                for t in self.extension_conformances(&ty, scope) {
                    add_closure(self, t, &mut out);
                }
            }
            Type::Trait(d) => {
                add_closure(self, *d, &mut out);
            }
            Type::BoundGeneric { base, .. } => {
                return self.conformed_traits(base, scope);
            }
            _ => {
                let extra = self.extension_conformances(&ty, scope);
                for t in extra {
                    add_closure(self, t, &mut out);
                }
            }
        }
        out
    }

    /// Traits declared by conformance declarations on `ty`.
    fn extension_conformances(&mut self, ty: &Type, scope: ScopeId) -> Vec<DeclId> {
        let mut out = Vec::new();
        for e in self.extensions_of(ty, scope) {
            let DeclKind::Conformance(c) = self.program.ast().decls[e].node.clone() else {
                continue;
            };
            for t in c.conformances {
                if let Type::Trait(td) = self.realize_type_expr(t).canonical() {
                    if !out.contains(&td) {
                        out.push(td);
                    }
                }
            }
        }
        out
    }

    /// Trait bounds a where clause places on a generic parameter.
    fn where_clause_bounds(&mut self, p: DeclId) -> Vec<DeclId> {
        let owner_scope = self.program.decl_scope(p);
        let ScopeKind::Decl(owner) = self.program.scope_kind(owner_scope) else {
            return Vec::new();
        };
        let clauses = match &self.program.ast().decls[owner].node {
            DeclKind::Product(x) => x.generics.clone(),
            DeclKind::TypeAlias(x) => x.generics.clone(),
            DeclKind::Function(x) => x.generics.clone(),
            DeclKind::Method(x) => x.generics.clone(),
            DeclKind::Subscript(x) => x.generics.clone(),
            DeclKind::Initializer(x) => x.generics.clone(),
            _ => None,
        };
        let Some(clause) = clauses else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for w in clause.where_clauses {
            let WhereClauseKind::Conformance { subject, traits } = w.kind else {
                continue;
            };
            if self.realize_type_expr(subject).canonical() != Type::GenericTypeParameter(p) {
                continue;
            }
            for t in traits {
                if let Type::Trait(td) = self.realize_type_expr(t).canonical() {
                    if !out.contains(&td) {
                        out.push(td);
                    }
                }
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Operator lookup
    // -----------------------------------------------------------------------

    /// Find the operator declaration for `name` with the given fixity.
    /// The current module is searched first, then the others in order.
    pub(crate) fn lookup_operator(
        &mut self,
        name: &str,
        notation: OperatorNotation,
        scope: ScopeId,
    ) -> Option<DeclId> {
        let own_module = self.program.module_containing(scope);
        let mut modules = vec![own_module];
        for &m in &self.program.ast().modules {
            if m != own_module {
                modules.push(m);
            }
        }
        for m in modules {
            let DeclKind::Module(module) = &self.program.ast().decls[m].node else {
                continue;
            };
            for unit in &module.units {
                for &d in &unit.decls {
                    if let DeclKind::Operator(op) = &self.program.ast().decls[d].node {
                        if op.ident == name && op.notation == notation {
                            return Some(d);
                        }
                    }
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Nominal prefix resolution
    // -----------------------------------------------------------------------

    /// Resolve a dotted name expression from the outermost domain inward.
    pub(crate) fn resolve_name(&mut self, expr: ExprId) -> NameResolutionResult {
        let mut chain = vec![expr];
        loop {
            let ExprKind::Name(n) = &self.program.ast().exprs[*chain.last().unwrap()].node else {
                break;
            };
            match n.domain {
                NameDomain::Explicit(d)
                    if matches!(self.program.ast().exprs[d].node, ExprKind::Name(_)) =>
                {
                    chain.push(d);
                }
                _ => break,
            }
        }
        chain.reverse();

        let scope = self.program.expr_scope(expr);
        let mut parent: Option<ParentRef> = None;
        let mut resolved = Vec::new();

        for (i, &comp) in chain.iter().enumerate() {
            let ExprKind::Name(n) = self.program.ast().exprs[comp].node.clone() else {
                unreachable!("chain holds name expressions");
            };
            let span = self.program.ast().expr_span(comp);
            let mut candidates = self.resolve_component(&n, parent.as_ref(), scope, span);
            if candidates.is_empty()
                && parent.is_none()
                && matches!(n.domain, NameDomain::None)
            {
                if let Some(c) = self.magic_name_candidate(&n, scope, span) {
                    candidates.push(c);
                }
            }
            if candidates.is_empty() {
                let diag = Diagnostic::error(
                    Category::UndefinedName,
                    format!("undefined name `{}`", n.ident),
                )
                .at(self.loc(span));
                self.report(diag);
                return NameResolutionResult::Failed;
            }
            if candidates.len() >= 2 || candidates[0].ty.has_variable() {
                resolved.push(ResolvedComponent {
                    expr: comp,
                    candidates,
                });
                return NameResolutionResult::Inexecutable {
                    resolved,
                    unresolved: chain[i + 1..].to_vec(),
                };
            }

            let sole = &candidates[0];
            parent = Some(match sole.reference.as_ref().and_then(DeclRef::decl) {
                Some(d)
                    if matches!(
                        self.program.ast().decls[d].node,
                        DeclKind::Module(_) | DeclKind::Namespace(_)
                    ) =>
                {
                    ParentRef::Space(d)
                }
                _ => match &sole.ty {
                    // A direct nominal reference threads its instance type.
                    Type::Metatype(inner) => ParentRef::Type((**inner).clone()),
                    other => ParentRef::Type(other.clone()),
                },
            });
            resolved.push(ResolvedComponent {
                expr: comp,
                candidates,
            });
        }
        NameResolutionResult::Done(resolved)
    }

    fn resolve_component(
        &mut self,
        n: &NameExpr,
        parent: Option<&ParentRef>,
        scope: ScopeId,
        span: Span,
    ) -> Vec<Candidate> {
        match parent {
            None => {
                let decls = self.lookup_unqualified(&n.ident, scope);
                self.candidates_from_decls(&decls, n, false, scope, span)
            }
            Some(ParentRef::Space(space)) => {
                let decls = match self.program.scope_introducing(*space) {
                    Some(s) => self
                        .names_introduced_in(s)
                        .get(n.ident.as_str())
                        .cloned()
                        .unwrap_or_default(),
                    None => Vec::new(),
                };
                self.candidates_from_decls(&decls, n, false, scope, span)
            }
            Some(ParentRef::Type(t)) if *t == Type::Builtin(BuiltinType::Module) => {
                self.builtin_candidates(n)
            }
            Some(ParentRef::Type(t)) => {
                let decls = self.lookup_member(&t.clone(), &n.ident, scope);
                self.candidates_from_decls(&decls, n, true, scope, span)
            }
        }
    }

    /// Build candidates from declarations: realize, erase the outer
    /// parameter convention, apply static arguments, instantiate.
    pub(crate) fn candidates_from_decls(
        &mut self,
        decls: &[DeclId],
        n: &NameExpr,
        member_domain: bool,
        scope: ScopeId,
        span: Span,
    ) -> Vec<Candidate> {
        let mut out = Vec::new();
        for &d in decls {
            if matches!(
                self.program.ast().decls[d].node,
                DeclKind::Module(_) | DeclKind::Namespace(_)
            ) {
                out.push(Candidate {
                    reference: Some(DeclRef::Direct(d)),
                    ty: Type::void(),
                    constraints: Vec::new(),
                });
                continue;
            }
            let realized = self.realize_decl(d);
            let unwrapped = realized.bare().clone();
            let with_args = match unwrapped {
                Type::Metatype(inner) => {
                    let applied = self.apply_static_arguments(d, *inner, &n.arguments, span);
                    Type::Metatype(Box::new(applied))
                }
                other if !n.arguments.is_empty() => {
                    // Explicit arguments on a callable pin its parameters.
                    let params = self.generic_parameters_of(d);
                    if params.len() != n.arguments.len() {
                        let name = self.program.ast().decl_name(d).unwrap_or("_").to_string();
                        let diag = Diagnostic::error(
                            Category::GenericArgumentCount,
                            format!(
                                "`{name}` expects {} generic argument(s), found {}",
                                params.len(),
                                n.arguments.len()
                            ),
                        )
                        .at(self.loc(span));
                        self.report(diag);
                        Type::Error
                    } else {
                        let arguments = self.realize_generic_arguments(&n.arguments);
                        let mut subs = serin_types::GenericSubstitutions::default();
                        for (&p, a) in params.iter().zip(arguments.iter()) {
                            match a {
                                serin_types::GenericArgument::Type(t) => {
                                    subs.types.insert(p, t.clone());
                                }
                                serin_types::GenericArgument::Value(v) => {
                                    subs.values.insert(p, v.clone());
                                }
                            }
                        }
                        other.specialized(&subs)
                    }
                }
                other => other,
            };
            let instantiated = self.instantiate(with_args, scope, span);
            let reference = if self.program.is_member(d)
                && (member_domain || self.program.is_member_context(scope))
            {
                DeclRef::Member(d)
            } else {
                DeclRef::Direct(d)
            };
            out.push(Candidate {
                reference: Some(reference),
                ty: instantiated.shape,
                constraints: instantiated.constraints,
            });
        }
        out
    }

    /// Resolve magic type names in expression position: the candidate's
    /// type is the metatype of the denoted type.
    fn magic_name_candidate(
        &mut self,
        n: &NameExpr,
        scope: ScopeId,
        span: Span,
    ) -> Option<Candidate> {
        let is_magic = matches!(
            n.ident.as_str(),
            "Any" | "Never" | "Self" | "Metatype" | "Sum" | "Builtin"
        );
        if !is_magic {
            return None;
        }
        if n.ident == "Builtin" {
            if !self.config.builtin_module_visible {
                return None;
            }
            return Some(Candidate {
                reference: Some(DeclRef::BuiltinType(BuiltinType::Module)),
                ty: Type::Builtin(BuiltinType::Module),
                constraints: Vec::new(),
            });
        }
        let type_expr = serin_ast::NameTypeExpr {
            domain: None,
            ident: n.ident.clone(),
            arguments: n.arguments.clone(),
        };
        let denoted = self.magic_type_name(&type_expr, scope, span);
        Some(Candidate {
            reference: None,
            ty: Type::Metatype(Box::new(denoted)),
            constraints: Vec::new(),
        })
    }

    /// Candidates under the `Builtin` domain: types and functions.
    fn builtin_candidates(&mut self, n: &NameExpr) -> Vec<Candidate> {
        if !self.config.builtin_module_visible {
            return Vec::new();
        }
        if let Some(b) = BuiltinType::parse(&n.ident) {
            return vec![Candidate {
                reference: Some(DeclRef::BuiltinType(b)),
                ty: Type::Metatype(Box::new(Type::Builtin(b))),
                constraints: Vec::new(),
            }];
        }
        if let Some(f) = builtin_function(&n.ident) {
            return vec![Candidate {
                reference: Some(DeclRef::BuiltinFunction(f.clone())),
                ty: Type::Lambda(f.ty),
                constraints: Vec::new(),
            }];
        }
        Vec::new()
    }
}

/// The built-in function table: `<op>_<type>` names over machine types.
pub(crate) fn builtin_function(name: &str) -> Option<BuiltinFunction> {
    let (op, ty_name) = name.split_once('_')?;
    let operand = BuiltinType::parse(ty_name)?;
    if matches!(operand, BuiltinType::Module) {
        return None;
    }
    let operand = Type::Builtin(operand);
    let bool_ty = Type::Builtin(BuiltinType::I(1));
    let binary = |output: Type| {
        LambdaType::thin(
            vec![
                CallableParameter {
                    label: None,
                    ty: Type::Parameter(ParameterType {
                        convention: serin_ast::AccessEffect::Let,
                        bare: Box::new(operand.clone()),
                    }),
                },
                CallableParameter {
                    label: None,
                    ty: Type::Parameter(ParameterType {
                        convention: serin_ast::AccessEffect::Let,
                        bare: Box::new(operand.clone()),
                    }),
                },
            ],
            output,
        )
    };
    let ty = match op {
        "add" | "sub" | "mul" | "div" | "rem" => binary(operand.clone()),
        "eq" | "ne" | "lt" | "le" | "gt" | "ge" => binary(bool_ty),
        "zeroinitializer" => LambdaType::thin(Vec::new(), operand.clone()),
        _ => return None,
    };
    Some(BuiltinFunction {
        name: name.into(),
        ty,
    })
}
