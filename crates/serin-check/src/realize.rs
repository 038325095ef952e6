//! Declaration realization: computing overarching types on demand.
//!
//! Realization never enters function bodies. Every request is memoized
//! through `decl_requests`; re-entry while a realization is in flight is
//! a circular dependency, diagnosed once and recorded as `Error`.

use serin_ast::{
    AccessEffect, DeclId, DeclKind, FunctionBody, FunctionDecl, InitializerDecl, MethodDecl,
    ScopeId, ScopeKind, Span, SubscriptDecl, TypeExprId, TypeExprKind,
};
use serin_diag::{Category, Diagnostic};
use serin_types::{
    CallableParameter, CapabilitySet, GenericArgument, GenericSubstitutions, LambdaType,
    MethodType, ParameterType, RemoteType, SubscriptType, TransformAction, TupleElement, Type,
    ValueTerm,
};

use crate::constraints::{CauseKind, Constraint, ConstraintCause};
use crate::{RequestState, TypeChecker};

/// A type whose quantified parameters were opened or skolemized for a
/// use site, together with the constraints the opening incurred.
#[derive(Debug, Clone)]
pub(crate) struct InstantiatedType {
    pub shape: Type,
    pub constraints: Vec<Constraint>,
}

impl TypeChecker<'_> {
    // -----------------------------------------------------------------------
    // Entry
    // -----------------------------------------------------------------------

    /// Compute (or recall) the overarching type of a declaration.
    pub fn realize_decl(&mut self, d: DeclId) -> Type {
        match &self.program.ast().decls[d].node {
            DeclKind::Binding(_) => return self.check_binding(d),
            DeclKind::Var(_) => return self.realize_var(d),
            _ => {}
        }
        if let Some(t) = self.decl_types.get(&d) {
            return t.clone();
        }
        if matches!(
            self.decl_requests.get(&d),
            Some(RequestState::TypeRealizationStarted)
        ) {
            self.report_cycle(d);
            self.decl_types.insert(d, Type::Error);
            self.decl_requests.insert(d, RequestState::Failure);
            return Type::Error;
        }
        self.decl_requests
            .insert(d, RequestState::TypeRealizationStarted);
        let ty = self.realize_uncached(d);
        // An inner cycle may already have recorded a failure for `d`.
        self.decl_types.entry(d).or_insert_with(|| ty.clone());
        if matches!(
            self.decl_requests.get(&d),
            Some(RequestState::TypeRealizationStarted)
        ) {
            self.decl_requests
                .insert(d, RequestState::TypeRealizationCompleted);
        }
        self.decl_types[&d].clone()
    }

    /// Variables are populated transitively through their binding.
    fn realize_var(&mut self, v: DeclId) -> Type {
        if let Some(t) = self.decl_types.get(&v) {
            return t.clone();
        }
        if let Some(t) = self.tentative_var_types.get(&v) {
            return t.clone();
        }
        match self.program.var_binding(v) {
            Some(b) => {
                self.check_binding(b);
                self.decl_types.get(&v).cloned().unwrap_or(Type::Error)
            }
            None => Type::Error,
        }
    }

    fn realize_uncached(&mut self, d: DeclId) -> Type {
        let span = self.program.ast().decl_span(d);
        match self.program.ast().decls[d].node.clone() {
            DeclKind::Module(_) | DeclKind::Operator(_) | DeclKind::Namespace(_) => Type::void(),
            DeclKind::Binding(_) | DeclKind::Var(_) => unreachable!("routed in realize_decl"),
            DeclKind::Product(_) => {
                let instance = self.self_type_of_decl(d);
                Type::Metatype(Box::new(instance))
            }
            DeclKind::Trait(_) => Type::Metatype(Box::new(Type::Trait(d))),
            DeclKind::TypeAlias(a) => {
                let subject = self.realize_type_expr(a.aliased);
                Type::Metatype(Box::new(Type::TypeAlias {
                    decl: d,
                    aliased: Box::new(subject),
                }))
            }
            DeclKind::Function(f) => self.realize_function_type(d, &f),
            DeclKind::Initializer(i) => self.realize_initializer_type(d, &i),
            DeclKind::Method(m) => self.realize_method_type(d, &m),
            DeclKind::MethodImpl(_) | DeclKind::SubscriptImpl(_) => {
                // Populated while realizing the containing bundle.
                let scope = self.program.decl_scope(d);
                if let ScopeKind::Decl(owner) = self.program.scope_kind(scope) {
                    self.realize_decl(owner);
                }
                self.decl_types.get(&d).cloned().unwrap_or(Type::Error)
            }
            DeclKind::Subscript(s) => self.realize_subscript_type(d, &s),
            DeclKind::Parameter(_) => self.realize_parameter(d, false),
            DeclKind::GenericParameter(g) => {
                if g.annotations.is_empty() {
                    return Type::Metatype(Box::new(Type::GenericTypeParameter(d)));
                }
                let first = self.realize_type_expr(g.annotations[0]);
                if matches!(first.canonical(), Type::Trait(_)) {
                    // A type parameter; remaining annotations are bounds.
                    for &a in &g.annotations[1..] {
                        let ty = self.realize_type_expr(a);
                        if !ty.is_error() && !matches!(ty.canonical(), Type::Trait(_)) {
                            let shown = self.show(&ty);
                            let diag = Diagnostic::error(
                                Category::ConformanceToNonTrait,
                                format!("conformance to non-trait type `{shown}`"),
                            )
                            .at(self.loc(span));
                            self.report(diag);
                        }
                    }
                    Type::Metatype(Box::new(Type::GenericTypeParameter(d)))
                } else {
                    if g.annotations.len() > 1 {
                        let diag = Diagnostic::error(
                            Category::InvalidConstraint,
                            "a generic value parameter accepts a single type annotation",
                        )
                        .at(self.loc(span));
                        self.report(diag);
                        return Type::Error;
                    }
                    first
                }
            }
            DeclKind::AssociatedType(_) => match self.enclosing_trait_self(d) {
                Some(self_param) => Type::Metatype(Box::new(Type::AssociatedType {
                    decl: d,
                    domain: Box::new(Type::GenericTypeParameter(self_param)),
                })),
                None => {
                    let diag = Diagnostic::error(
                        Category::InvalidAssociatedType,
                        "associated types are only allowed inside traits",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    Type::Error
                }
            },
            DeclKind::AssociatedValue(_) => match self.enclosing_trait_self(d) {
                Some(self_param) => Type::Metatype(Box::new(Type::AssociatedValue {
                    decl: d,
                    domain: Box::new(Type::GenericTypeParameter(self_param)),
                })),
                None => {
                    let diag = Diagnostic::error(
                        Category::InvalidAssociatedType,
                        "associated values are only allowed inside traits",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    Type::Error
                }
            },
            DeclKind::Conformance(c) => {
                let subject = self.realize_subject(d, c.subject);
                Type::Metatype(Box::new(subject))
            }
            DeclKind::Extension(e) => {
                let subject = self.realize_subject(d, e.subject);
                Type::Metatype(Box::new(subject))
            }
        }
    }

    fn enclosing_trait_self(&self, d: DeclId) -> Option<DeclId> {
        let scope = self.program.decl_scope(d);
        let ScopeKind::Decl(owner) = self.program.scope_kind(scope) else {
            return None;
        };
        match &self.program.ast().decls[owner].node {
            DeclKind::Trait(t) => t.self_parameter,
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Self types
    // -----------------------------------------------------------------------

    /// The instance type a type declaration denotes for its own members.
    pub(crate) fn self_type_of_decl(&mut self, d: DeclId) -> Type {
        match self.program.ast().decls[d].node.clone() {
            DeclKind::Product(p) => {
                let params = p.generics.map(|g| g.parameters).unwrap_or_default();
                if params.is_empty() {
                    Type::Product(d)
                } else {
                    let arguments = params
                        .iter()
                        .map(|&gp| match self.realize_decl(gp) {
                            Type::Metatype(inner)
                                if matches!(*inner, Type::GenericTypeParameter(_)) =>
                            {
                                GenericArgument::Type(*inner)
                            }
                            _ => GenericArgument::Value(ValueTerm::Parameter(gp)),
                        })
                        .collect();
                    Type::BoundGeneric {
                        base: Box::new(Type::Product(d)),
                        arguments,
                    }
                }
            }
            DeclKind::Trait(t) => match t.self_parameter {
                Some(sp) => Type::GenericTypeParameter(sp),
                None => Type::Error,
            },
            DeclKind::Conformance(c) => self.realize_subject(d, c.subject),
            DeclKind::Extension(e) => self.realize_subject(d, e.subject),
            _ => Type::Error,
        }
    }

    /// Resolve `Self` by walking outward to the first type scope.
    pub(crate) fn self_type_at(&mut self, scope: ScopeId) -> Option<Type> {
        let owner = self.program.innermost_type_scope(scope)?;
        Some(self.self_type_of_decl(owner))
    }

    /// Realize the subject of an extension or conformance declaration,
    /// guarding against recursion through the extended type.
    pub(crate) fn realize_subject(&mut self, d: DeclId, subject: TypeExprId) -> Type {
        if self.extensions_under_binding.contains(&d) {
            return Type::Error;
        }
        self.extensions_under_binding.insert(d);
        let ty = self.realize_type_expr(subject);
        self.extensions_under_binding.remove(&d);
        ty
    }

    // -----------------------------------------------------------------------
    // Callable declarations
    // -----------------------------------------------------------------------

    pub(crate) fn realize_parameter(&mut self, p: DeclId, in_expr_context: bool) -> Type {
        if let Some(t) = self.decl_types.get(&p) {
            return t.clone();
        }
        let span = self.program.ast().decl_span(p);
        let DeclKind::Parameter(pd) = self.program.ast().decls[p].node.clone() else {
            return Type::Error;
        };
        let ty = match pd.annotation {
            Some(a) => {
                let realized = self.realize_type_expr(a);
                let wrapped = match realized {
                    Type::Parameter(pt) => Type::Parameter(pt),
                    bare => Type::Parameter(ParameterType {
                        convention: pd.convention,
                        bare: Box::new(bare),
                    }),
                };
                if wrapped.has_variable() && !in_expr_context {
                    let diag = Diagnostic::error(
                        Category::MissingAnnotation,
                        "parameter type cannot be left to inference here",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    Type::Error
                } else {
                    wrapped
                }
            }
            None if in_expr_context => Type::Parameter(ParameterType {
                convention: pd.convention,
                bare: Box::new(self.fresh_variable()),
            }),
            None => {
                let diag = Diagnostic::error(
                    Category::MissingAnnotation,
                    format!("parameter `{}` requires a type annotation", pd.ident),
                )
                .at(self.loc(span));
                self.report(diag);
                Type::Error
            }
        };
        self.decl_types.insert(p, ty.clone());
        self.decl_requests
            .insert(p, RequestState::TypeRealizationCompleted);
        ty
    }

    fn realize_inputs(&mut self, parameters: &[DeclId], in_expr_context: bool) -> Vec<CallableParameter> {
        let mut seen: Vec<(String, Span)> = Vec::new();
        let mut inputs = Vec::with_capacity(parameters.len());
        for &p in parameters {
            let span = self.program.ast().decl_span(p);
            let DeclKind::Parameter(pd) = &self.program.ast().decls[p].node else {
                continue;
            };
            let ident = pd.ident.to_string();
            let label = pd.label.clone();
            if let Some((_, previous)) = seen.iter().find(|(n, _)| *n == ident) {
                let previous_loc = self.loc(*previous);
                let diag = Diagnostic::error(
                    Category::DuplicateParameterName,
                    format!("duplicate parameter name `{ident}`"),
                )
                .at(self.loc(span))
                .with_label(previous_loc, "first declared here");
                self.report(diag);
            } else {
                seen.push((ident, span));
            }
            let ty = self.realize_parameter(p, in_expr_context);
            inputs.push(CallableParameter { label, ty });
        }
        inputs
    }

    fn receiver_element(&mut self, d: DeclId, effect: AccessEffect) -> Option<TupleElement> {
        let scope = self.program.decl_scope(d);
        let receiver = self.self_type_at(scope)?;
        let ty = if effect == AccessEffect::Sink {
            receiver
        } else {
            Type::Remote(RemoteType {
                effect,
                projectee: Box::new(receiver),
            })
        };
        Some(TupleElement {
            label: Some("self".into()),
            ty,
        })
    }

    fn capture_elements(&mut self, d: DeclId, explicit: &[DeclId]) -> Vec<TupleElement> {
        let mut elements = Vec::new();
        let mut seen: Vec<(String, Span)> = Vec::new();
        for &c in explicit {
            let span = self.program.ast().decl_span(c);
            let DeclKind::Binding(b) = &self.program.ast().decls[c].node else {
                continue;
            };
            let introducer = match &self.program.ast().patterns[b.pattern].node {
                serin_ast::PatternKind::Binding { introducer, .. } => *introducer,
                _ => serin_ast::BindingIntroducer::Let,
            };
            let vars = self.program.ast().pattern_vars(b.pattern);
            let name = vars
                .first()
                .and_then(|&v| self.program.ast().decl_name(v))
                .map(smol_str::SmolStr::from);
            if let Some(n) = &name {
                if let Some((_, previous)) = seen.iter().find(|(s, _)| s == n.as_str()) {
                    let previous_loc = self.loc(*previous);
                    let diag = Diagnostic::error(
                        Category::DuplicateCaptureName,
                        format!("duplicate capture name `{n}`"),
                    )
                    .at(self.loc(span))
                    .with_label(previous_loc, "first captured here");
                    self.report(diag);
                } else {
                    seen.push((n.to_string(), span));
                }
            }
            let ty = self.realize_decl(c);
            let element_ty = match introducer.capture_effect() {
                Some(effect) => Type::Remote(RemoteType {
                    effect,
                    projectee: Box::new(ty),
                }),
                None => ty,
            };
            elements.push(TupleElement {
                label: name,
                ty: element_ty,
            });
        }
        // Implicit captures apply to local functions only.
        if self.program.is_local(d) {
            let captures = self.collect_captures(d);
            for cap in &captures {
                let referent_ty = match cap.referent.decl() {
                    Some(r) => self.realize_decl(r).bare().clone(),
                    None => Type::Error,
                };
                elements.push(TupleElement {
                    label: Some(cap.name.clone()),
                    ty: Type::Remote(RemoteType {
                        effect: cap.effect,
                        projectee: Box::new(referent_ty),
                    }),
                });
            }
            self.implicit_captures.insert(d, captures);
        }
        elements
    }

    fn realize_function_type(&mut self, d: DeclId, f: &FunctionDecl) -> Type {
        let inputs = self.realize_inputs(&f.parameters, f.is_in_expr_context);
        let output = match f.output {
            Some(o) => self.realize_type_expr(o),
            None if f.is_in_expr_context && matches!(f.body, Some(FunctionBody::Expr(_))) => {
                self.fresh_variable()
            }
            None => Type::void(),
        };

        let environment = if self.program.is_non_static_member(d) {
            let effect = f.receiver_effect.unwrap_or(AccessEffect::Let);
            match self.receiver_element(d, effect) {
                Some(e) => Type::Tuple(vec![e]),
                None => Type::Error,
            }
        } else {
            Type::Tuple(self.capture_elements(d, &f.explicit_captures))
        };

        Type::Lambda(LambdaType {
            receiver_effect: f.receiver_effect.unwrap_or(AccessEffect::Let),
            environment: Box::new(environment),
            inputs,
            output: Box::new(output),
        })
    }

    fn realize_initializer_type(&mut self, d: DeclId, i: &InitializerDecl) -> Type {
        let scope = self.program.decl_scope(d);
        let receiver = self.self_type_at(scope).unwrap_or(Type::Error);
        let self_input = CallableParameter {
            label: Some("self".into()),
            ty: Type::Parameter(ParameterType {
                convention: AccessEffect::Set,
                bare: Box::new(receiver),
            }),
        };

        let mut inputs = vec![self_input];
        if i.is_memberwise {
            // One `sink` parameter per stored binding, in source order.
            let owner = match self.program.scope_kind(scope) {
                ScopeKind::Decl(owner) => owner,
                _ => return Type::Error,
            };
            for binding in self.program.ast().stored_bindings(owner) {
                let DeclKind::Binding(b) = &self.program.ast().decls[binding].node else {
                    continue;
                };
                let vars = self.program.ast().pattern_vars(b.pattern);
                for v in vars {
                    let label = self
                        .program
                        .ast()
                        .decl_name(v)
                        .map(smol_str::SmolStr::from);
                    let ty = self.realize_decl(v);
                    inputs.push(CallableParameter {
                        label,
                        ty: Type::Parameter(ParameterType {
                            convention: AccessEffect::Sink,
                            bare: Box::new(ty),
                        }),
                    });
                }
            }
        } else {
            inputs.extend(self.realize_inputs(&i.parameters, false));
        }

        Type::Lambda(LambdaType {
            receiver_effect: AccessEffect::Let,
            environment: Box::new(Type::void()),
            inputs,
            output: Box::new(Type::void()),
        })
    }

    fn realize_method_type(&mut self, d: DeclId, m: &MethodDecl) -> Type {
        let scope = self.program.decl_scope(d);
        let receiver = self.self_type_at(scope).unwrap_or(Type::Error);
        let inputs = self.realize_inputs(&m.parameters, false);
        let output = match m.output {
            Some(o) => self.realize_type_expr(o),
            None => Type::void(),
        };

        let mut capabilities = CapabilitySet::empty();
        for &i in &m.impls {
            let DeclKind::MethodImpl(v) = &self.program.ast().decls[i].node else {
                continue;
            };
            capabilities.insert(v.effect);

            let self_element = if v.effect == AccessEffect::Sink {
                TupleElement {
                    label: Some("self".into()),
                    ty: receiver.clone(),
                }
            } else {
                TupleElement {
                    label: Some("self".into()),
                    ty: Type::Remote(RemoteType {
                        effect: v.effect,
                        projectee: Box::new(receiver.clone()),
                    }),
                }
            };
            // Mutating variants produce the updated receiver next to the
            // declared output.
            let variant_output = match v.effect {
                AccessEffect::Inout | AccessEffect::Set => Type::Tuple(vec![
                    TupleElement {
                        label: None,
                        ty: receiver.clone(),
                    },
                    TupleElement {
                        label: None,
                        ty: output.clone(),
                    },
                ]),
                _ => output.clone(),
            };
            let variant = Type::Lambda(LambdaType {
                receiver_effect: v.effect,
                environment: Box::new(Type::Tuple(vec![self_element])),
                inputs: inputs.clone(),
                output: Box::new(variant_output),
            });
            self.decl_types.insert(i, variant);
            self.decl_requests
                .insert(i, RequestState::TypeRealizationCompleted);
        }

        Type::Method(MethodType {
            capabilities,
            receiver: Box::new(receiver),
            inputs,
            output: Box::new(output),
        })
    }

    fn realize_subscript_type(&mut self, d: DeclId, s: &SubscriptDecl) -> Type {
        let inputs = if s.is_property {
            Vec::new()
        } else {
            self.realize_inputs(&s.parameters, false)
        };
        let output = self.realize_type_expr(s.output);

        let environment = if self.program.is_non_static_member(d) {
            match self.receiver_element(d, AccessEffect::Let) {
                Some(e) => Type::Tuple(vec![e]),
                None => Type::Error,
            }
        } else {
            Type::Tuple(self.capture_elements(d, &s.explicit_captures))
        };

        let mut capabilities = CapabilitySet::empty();
        for &i in &s.impls {
            let DeclKind::SubscriptImpl(v) = &self.program.ast().decls[i].node else {
                continue;
            };
            capabilities.insert(v.effect);
            let variant = Type::Subscript(SubscriptType {
                is_property: s.is_property,
                capabilities: CapabilitySet::from_iter([v.effect]),
                environment: Box::new(environment.clone()),
                inputs: inputs.clone(),
                output: Box::new(output.clone()),
            });
            self.decl_types.insert(i, variant);
            self.decl_requests
                .insert(i, RequestState::TypeRealizationCompleted);
        }

        Type::Subscript(SubscriptType {
            is_property: s.is_property,
            capabilities,
            environment: Box::new(environment),
            inputs,
            output: Box::new(output),
        })
    }

    // -----------------------------------------------------------------------
    // Type expressions
    // -----------------------------------------------------------------------

    /// Realize a syntactic type annotation into a semantic type.
    pub(crate) fn realize_type_expr(&mut self, t: TypeExprId) -> Type {
        let scope = self.program.type_expr_scope(t);
        let span = self.program.ast().type_exprs[t].span;
        match self.program.ast().type_exprs[t].node.clone() {
            TypeExprKind::Name(n) => self.realize_name_type_expr(&n, scope, span),
            TypeExprKind::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|e| TupleElement {
                        label: e.label.clone(),
                        ty: self.realize_type_expr(e.value),
                    })
                    .collect(),
            ),
            TypeExprKind::Lambda(l) => {
                let environment = match l.environment {
                    Some(env) => self.realize_type_expr(env),
                    None => Type::void(),
                };
                let inputs = l
                    .parameters
                    .iter()
                    .map(|p| CallableParameter {
                        label: p.label.clone(),
                        ty: Type::Parameter(ParameterType {
                            convention: p.convention,
                            bare: Box::new(self.realize_type_expr(p.bare)),
                        }),
                    })
                    .collect();
                let output = self.realize_type_expr(l.output);
                Type::Lambda(LambdaType {
                    receiver_effect: l.receiver_effect.unwrap_or(AccessEffect::Let),
                    environment: Box::new(environment),
                    inputs,
                    output: Box::new(output),
                })
            }
            TypeExprKind::ConformanceLens { subject, lens } => {
                let s = self.realize_type_expr(subject);
                let l = self.realize_type_expr(lens);
                match l.canonical() {
                    Type::Trait(td) => Type::ConformanceLens {
                        subject: Box::new(s),
                        lens: td,
                    },
                    Type::Error => Type::Error,
                    other => {
                        let shown = self.show(&other);
                        let diag = Diagnostic::error(
                            Category::ConformanceToNonTrait,
                            format!("`{shown}` is not a trait and cannot be used as a lens"),
                        )
                        .at(self.loc(span));
                        self.report(diag);
                        Type::Error
                    }
                }
            }
            TypeExprKind::Parameter { convention, bare } => Type::Parameter(ParameterType {
                convention,
                bare: Box::new(self.realize_type_expr(bare)),
            }),
            TypeExprKind::Wildcard => self.fresh_variable(),
        }
    }

    fn realize_name_type_expr(
        &mut self,
        n: &serin_ast::NameTypeExpr,
        scope: ScopeId,
        span: Span,
    ) -> Type {
        if let Some(domain) = n.domain {
            let parent = self.realize_type_expr(domain);
            if parent.is_error() {
                return Type::Error;
            }
            if parent == Type::Builtin(serin_types::BuiltinType::Module) {
                return match serin_types::BuiltinType::parse(&n.ident) {
                    Some(b) if self.config.builtin_module_visible => Type::Builtin(b),
                    _ => {
                        let diag = Diagnostic::error(
                            Category::UndefinedName,
                            format!("undefined built-in type `{}`", n.ident),
                        )
                        .at(self.loc(span));
                        self.report(diag);
                        Type::Error
                    }
                };
            }
            let decls = self.lookup_member(&parent, &n.ident, scope);
            return self.interpret_type_candidates(&decls, n, scope, span);
        }

        let decls = self.lookup_unqualified(&n.ident, scope);
        if decls.is_empty() {
            return self.magic_type_name(n, scope, span);
        }
        self.interpret_type_candidates(&decls, n, scope, span)
    }

    fn interpret_type_candidates(
        &mut self,
        decls: &[DeclId],
        n: &serin_ast::NameTypeExpr,
        _scope: ScopeId,
        span: Span,
    ) -> Type {
        if decls.is_empty() {
            let diag = Diagnostic::error(
                Category::UndefinedName,
                format!("undefined name `{}` in type position", n.ident),
            )
            .at(self.loc(span));
            self.report(diag);
            return Type::Error;
        }
        if decls.len() > 1 {
            let diag = Diagnostic::error(
                Category::AmbiguousUse,
                format!("ambiguous use of `{}` in type position", n.ident),
            )
            .at(self.loc(span));
            self.report(diag);
            return Type::Error;
        }
        let d = decls[0];
        match self.realize_decl(d) {
            Type::Metatype(inner) => self.apply_static_arguments(d, *inner, &n.arguments, span),
            Type::Error => Type::Error,
            _ => {
                let diag = Diagnostic::error(
                    Category::NameRefersToValue,
                    format!("`{}` refers to a value but is used as a type", n.ident),
                )
                .at(self.loc(span));
                self.report(diag);
                Type::Error
            }
        }
    }

    pub(crate) fn magic_type_name(
        &mut self,
        n: &serin_ast::NameTypeExpr,
        scope: ScopeId,
        span: Span,
    ) -> Type {
        match n.ident.as_str() {
            "Any" => Type::Any,
            "Never" => Type::never(),
            "Self" => match self.self_type_at(scope) {
                Some(t) => t,
                None => {
                    let diag = Diagnostic::error(
                        Category::InvalidSelfReference,
                        "`Self` is not available in this context",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    Type::Error
                }
            },
            "Metatype" => match n.arguments.len() {
                0 => Type::Metatype(Box::new(self.fresh_variable())),
                1 => {
                    let inner = self.realize_type_expr(n.arguments[0]);
                    Type::Metatype(Box::new(inner))
                }
                _ => {
                    let diag = Diagnostic::error(
                        Category::GenericArgumentCount,
                        "`Metatype` accepts at most one argument",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    Type::Error
                }
            },
            "Sum" => self.realize_sum_type(n, span),
            "Builtin" if self.config.builtin_module_visible => {
                Type::Builtin(serin_types::BuiltinType::Module)
            }
            _ => {
                let diag = Diagnostic::error(
                    Category::UndefinedName,
                    format!("undefined name `{}` in type position", n.ident),
                )
                .at(self.loc(span));
                self.report(diag);
                Type::Error
            }
        }
    }

    fn realize_sum_type(&mut self, n: &serin_ast::NameTypeExpr, span: Span) -> Type {
        let arguments = self.realize_generic_arguments(&n.arguments);
        let mut elements = Vec::with_capacity(arguments.len());
        let mut invalid = false;
        for a in arguments {
            match a {
                GenericArgument::Type(t) if t.is_error() => invalid = true,
                GenericArgument::Type(t) => elements.push(t),
                GenericArgument::Value(_) => {
                    let diag = Diagnostic::error(
                        Category::ValueInSumType,
                        "sum type elements must be types, not values",
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    invalid = true;
                }
            }
        }
        if invalid {
            return Type::Error;
        }
        match elements.len() {
            0 => {
                let diag = Diagnostic::warning(
                    Category::EmptySumType,
                    "sum type with no elements is `Never`",
                )
                .at(self.loc(span));
                self.report(diag);
                Type::never()
            }
            1 => {
                let diag = Diagnostic::error(
                    Category::SingletonSumType,
                    "sum type with a single element is invalid",
                )
                .at(self.loc(span))
                .with_help("use the element type directly");
                self.report(diag);
                Type::Error
            }
            _ => Type::sum(elements),
        }
    }

    // -----------------------------------------------------------------------
    // Static arguments
    // -----------------------------------------------------------------------

    /// The generic parameters a declaration introduces.
    pub(crate) fn generic_parameters_of(&self, d: DeclId) -> Vec<DeclId> {
        match &self.program.ast().decls[d].node {
            DeclKind::Product(p) => p.generics.as_ref().map(|g| g.parameters.clone()),
            DeclKind::TypeAlias(a) => a.generics.as_ref().map(|g| g.parameters.clone()),
            DeclKind::Function(f) => f.generics.as_ref().map(|g| g.parameters.clone()),
            DeclKind::Method(m) => m.generics.as_ref().map(|g| g.parameters.clone()),
            DeclKind::Subscript(s) => s.generics.as_ref().map(|g| g.parameters.clone()),
            DeclKind::Initializer(i) => i.generics.as_ref().map(|g| g.parameters.clone()),
            _ => None,
        }
        .unwrap_or_default()
    }

    /// Realize static arguments, keeping value references symbolic.
    pub(crate) fn realize_generic_arguments(
        &mut self,
        args: &[TypeExprId],
    ) -> Vec<GenericArgument> {
        args.iter()
            .map(|&a| {
                if let TypeExprKind::Name(n) = &self.program.ast().type_exprs[a].node {
                    if n.domain.is_none() && n.arguments.is_empty() {
                        let scope = self.program.type_expr_scope(a);
                        let decls = self.lookup_unqualified(&n.ident.clone(), scope);
                        if decls.len() == 1 {
                            let d = decls[0];
                            let is_value = match &self.program.ast().decls[d].node {
                                DeclKind::GenericParameter(_) => {
                                    !matches!(self.realize_decl(d), Type::Metatype(_))
                                }
                                DeclKind::AssociatedValue(_) => true,
                                _ => false,
                            };
                            if is_value {
                                return GenericArgument::Value(ValueTerm::Parameter(d));
                            }
                        }
                    }
                }
                GenericArgument::Type(self.realize_type_expr(a))
            })
            .collect()
    }

    /// Apply explicit static arguments to a realized nominal type.
    pub(crate) fn apply_static_arguments(
        &mut self,
        d: DeclId,
        inner: Type,
        args: &[TypeExprId],
        span: Span,
    ) -> Type {
        if args.is_empty() {
            return inner;
        }
        let params = self.generic_parameters_of(d);
        if params.len() != args.len() {
            let name = self.program.ast().decl_name(d).unwrap_or("_").to_string();
            let diag = Diagnostic::error(
                Category::GenericArgumentCount,
                format!(
                    "`{name}` expects {} generic argument(s), found {}",
                    params.len(),
                    args.len()
                ),
            )
            .at(self.loc(span));
            self.report(diag);
            return Type::Error;
        }
        let arguments = self.realize_generic_arguments(args);
        let mut substitutions = GenericSubstitutions::default();
        for (&p, a) in params.iter().zip(arguments.iter()) {
            match a {
                GenericArgument::Type(t) => {
                    substitutions.types.insert(p, t.clone());
                }
                GenericArgument::Value(v) => {
                    substitutions.values.insert(p, v.clone());
                }
            }
        }
        inner.specialized(&substitutions)
    }

    // -----------------------------------------------------------------------
    // Instantiation
    // -----------------------------------------------------------------------

    /// Open or skolemize the generic parameters of `ty` for a use at
    /// `scope`: parameters whose introducing scope contains the use site
    /// stay rigid (skolems); all others become fresh variables, one per
    /// distinct parameter.
    pub(crate) fn instantiate(&mut self, ty: Type, scope: ScopeId, span: Span) -> InstantiatedType {
        if !ty.has_generic_parameter() {
            return InstantiatedType {
                shape: ty,
                constraints: Vec::new(),
            };
        }
        let mut params: Vec<DeclId> = Vec::new();
        ty.transform(&mut |t| {
            if let Type::GenericTypeParameter(p) = t {
                if !params.contains(p) {
                    params.push(*p);
                }
            }
            TransformAction::StepInto
        });

        let mut substitutions = GenericSubstitutions::default();
        let mut constraints = Vec::new();
        for p in params {
            let introducing = self.program.decl_scope(p);
            let rigid = self.program.scopes_from(scope).any(|s| s == introducing);
            if rigid {
                substitutions.types.insert(p, Type::Skolem(p));
            } else {
                let v = self.fresh_variable();
                let traits = self.parameter_bound_traits(p);
                if !traits.is_empty() {
                    constraints.push(Constraint::Conformance {
                        subject: v.clone(),
                        traits,
                        cause: ConstraintCause::new(CauseKind::Annotation, span),
                    });
                }
                substitutions.types.insert(p, v);
            }
        }
        InstantiatedType {
            shape: ty.specialized(&substitutions),
            constraints,
        }
    }

    /// The realized trait bounds declared on a generic type parameter.
    pub(crate) fn parameter_bound_traits(&mut self, p: DeclId) -> Vec<DeclId> {
        let DeclKind::GenericParameter(g) = self.program.ast().decls[p].node.clone() else {
            return Vec::new();
        };
        let mut traits = Vec::new();
        for a in g.annotations {
            if let Type::Trait(td) = self.realize_type_expr(a).canonical() {
                if !traits.contains(&td) {
                    traits.push(td);
                }
            }
        }
        traits
    }

    /// Complete associated-type projections whose domain has become
    /// concrete: `A.B` resolves by looking `B` up as a member of the
    /// substituted domain and continuing with its realized type.
    pub(crate) fn resolved_projections(&mut self, ty: &Type, scope: ScopeId) -> Type {
        ty.transform(&mut |t| match t {
            Type::AssociatedType { decl, domain }
                if !domain.has_generic_parameter() && !domain.has_variable() =>
            {
                let Some(name) = self.program.ast().decl_name(*decl).map(str::to_string) else {
                    return TransformAction::StepInto;
                };
                let members = self.lookup_member(domain, &name, scope);
                let witnesses: Vec<DeclId> = members
                    .into_iter()
                    .filter(|&m| m != *decl)
                    .collect();
                if witnesses.len() != 1 {
                    return TransformAction::StepInto;
                }
                match self.realize_decl(witnesses[0]) {
                    Type::Metatype(inner) => {
                        let resolved = self.resolved_projections(&inner, scope);
                        TransformAction::StepOver(resolved)
                    }
                    _ => TransformAction::StepInto,
                }
            }
            _ => TransformAction::StepInto,
        })
    }

    /// Replace every generic type parameter with its skolem: inside the
    /// declaring scope, parameters are rigid.
    pub fn skolemized(&self, ty: &Type) -> Type {
        if !ty.has_generic_parameter() {
            return ty.clone();
        }
        ty.transform(&mut |t| match t {
            Type::GenericTypeParameter(p) => TransformAction::StepOver(Type::Skolem(*p)),
            _ => TransformAction::StepInto,
        })
    }

    /// Open every generic type parameter to a fresh variable, reusing the
    /// same variable for repeat occurrences.
    pub fn open(&mut self, ty: Type) -> Type {
        if !ty.has_generic_parameter() {
            return ty;
        }
        let mut params: Vec<DeclId> = Vec::new();
        ty.transform(&mut |t| {
            if let Type::GenericTypeParameter(p) = t {
                if !params.contains(p) {
                    params.push(*p);
                }
            }
            TransformAction::StepInto
        });
        let mut substitutions = GenericSubstitutions::default();
        for p in params {
            let v = self.fresh_variable();
            substitutions.types.insert(p, v);
        }
        ty.specialized(&substitutions)
    }
}
