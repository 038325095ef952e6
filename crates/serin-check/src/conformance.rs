//! Trait-conformance checking and the conformance registry.
//!
//! A conformance is proven by matching every trait requirement against a
//! member of the conforming type whose canonical instantiated type equals
//! the requirement's type after substituting `Self` with the model.
//! Registered conformances are indexed by the canonical model; duplicate
//! registrations against the same trait in overlapping scopes are
//! rejected with a pointer at the earlier site.

use std::collections::HashMap;

use serin_ast::{DeclId, DeclKind, ScopeId, Span, TypeExprId};
use serin_diag::{Category, Diagnostic};
use serin_types::{GenericSubstitutions, Type};

use crate::{DeclRef, TypeChecker};

/// A proven (or failed) conformance of a model to a trait.
#[derive(Debug, Clone)]
pub struct Conformance {
    /// Canonical conforming type.
    pub model: Type,
    pub trait_decl: DeclId,
    /// The scope the conformance is declared in.
    pub scope: ScopeId,
    /// Where the conformance was declared.
    pub origin: Span,
    /// Requirement → witness. Synthesized witnesses map a requirement to
    /// itself.
    pub implementations: HashMap<DeclId, DeclRef>,
    /// Declared on an extension with a where clause; constraints are not
    /// checked yet.
    pub is_conditional: bool,
}

/// Canonicalization-aware conformance registry.
#[derive(Debug, Default)]
pub struct TypeRelations {
    /// Registered conformances, indexed by canonical model.
    conformances: HashMap<Type, Vec<Conformance>>,
}

impl TypeRelations {
    /// All conformances registered for a canonical model.
    pub fn conformances_of(&self, model: &Type) -> &[Conformance] {
        self.conformances
            .get(&model.canonical())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find a registered conformance of `model` to `trait_decl`.
    pub fn conformance(&self, model: &Type, trait_decl: DeclId) -> Option<&Conformance> {
        self.conformances_of(model)
            .iter()
            .find(|c| c.trait_decl == trait_decl)
    }

    /// Register a conformance unless one to the same trait already exists
    /// in an overlapping scope; returns the earlier site on rejection.
    pub fn insert_conformance(
        &mut self,
        conformance: Conformance,
        overlaps: impl Fn(ScopeId, ScopeId) -> bool,
    ) -> Result<(), Span> {
        let entry = self
            .conformances
            .entry(conformance.model.canonical())
            .or_default();
        if let Some(existing) = entry
            .iter()
            .find(|c| c.trait_decl == conformance.trait_decl && overlaps(c.scope, conformance.scope))
        {
            return Err(existing.origin);
        }
        entry.push(conformance);
        Ok(())
    }
}

impl TypeChecker<'_> {
    /// Check the conformance list of a type or conformance declaration,
    /// registering one [`Conformance`] per named trait.
    pub(crate) fn check_conformance_list(
        &mut self,
        model: Type,
        site: DeclId,
        conformances: &[TypeExprId],
        is_conditional: bool,
    ) {
        let scope = self.program.decl_scope(site);
        let span = self.program.ast().decl_span(site);
        let model = model.canonical();
        if model.is_error() {
            return;
        }

        if is_conditional {
            // TODO: check the extension's where clause against the model
            // once symbolic evaluation lands; conformances from
            // conditional extensions are accepted unconditionally.
            let diag = Diagnostic::warning(
                Category::Unsupported,
                "constraints on conditional conformances are not checked yet",
            )
            .at(self.loc(span));
            self.report(diag);
        }

        for &c in conformances {
            let realized = self.realize_type_expr(c);
            let trait_decl = match realized.canonical() {
                Type::Trait(t) => t,
                Type::Error => continue,
                other => {
                    let shown = self.show(&other);
                    let diag = Diagnostic::error(
                        Category::ConformanceToNonTrait,
                        format!("conformance to non-trait type `{shown}`"),
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    continue;
                }
            };
            self.check_one_conformance(&model, trait_decl, site, scope, span, is_conditional);
        }
    }

    fn check_one_conformance(
        &mut self,
        model: &Type,
        trait_decl: DeclId,
        _site: DeclId,
        scope: ScopeId,
        span: Span,
        is_conditional: bool,
    ) {
        let DeclKind::Trait(trait_node) = self.program.ast().decls[trait_decl].node.clone() else {
            return;
        };
        let trait_name = trait_node.ident.clone();

        let mut implementations = HashMap::new();
        let mut notes: Vec<Diagnostic> = Vec::new();

        for &requirement in &trait_node.members {
            if !self.program.is_requirement(requirement) {
                continue;
            }
            match self.witness_for(model, trait_decl, requirement, scope) {
                WitnessSearch::Unique(witness) => {
                    implementations.insert(requirement, witness);
                }
                WitnessSearch::Synthesized => {
                    implementations.insert(requirement, DeclRef::Direct(requirement));
                }
                WitnessSearch::Missing => {
                    let name = self
                        .program
                        .ast()
                        .decl_name(requirement)
                        .unwrap_or("_")
                        .to_string();
                    let requirement_loc = self.loc(self.program.ast().decl_span(requirement));
                    notes.push(
                        Diagnostic::note(
                            Category::UnsatisfiedRequirement,
                            format!("requirement `{name}` is not satisfied"),
                        )
                        .at(requirement_loc),
                    );
                }
                WitnessSearch::Ambiguous => {
                    let name = self
                        .program
                        .ast()
                        .decl_name(requirement)
                        .unwrap_or("_")
                        .to_string();
                    let diag = Diagnostic::error(
                        Category::Unsupported,
                        format!(
                            "multiple members match requirement `{name}`; witness ranking is \
                             not implemented"
                        ),
                    )
                    .at(self.loc(span));
                    self.report(diag);
                    return;
                }
            }
        }

        if !notes.is_empty() {
            let model_shown = self.show(model);
            let diag = Diagnostic::error(
                Category::UnsatisfiedRequirement,
                format!("`{model_shown}` does not conform to trait `{trait_name}`"),
            )
            .at(self.loc(span));
            self.report(diag);
            for note in notes {
                self.report(note);
            }
            return;
        }

        let conformance = Conformance {
            model: model.clone(),
            trait_decl,
            scope,
            origin: span,
            implementations,
            is_conditional,
        };
        let outcome = {
            let program = self.program;
            self.relations.insert_conformance(conformance, |a, b| {
                program.module_containing(a) == program.module_containing(b)
            })
        };
        if let Err(previous) = outcome {
            let model_shown = self.show(model);
            let previous_loc = self.loc(previous);
            let diag = Diagnostic::error(
                Category::RedundantConformance,
                format!("redundant conformance of `{model_shown}` to `{trait_name}`"),
            )
            .at(self.loc(span))
            .with_label(previous_loc, "already declared here");
            self.report(diag);
        }
    }

    fn witness_for(
        &mut self,
        model: &Type,
        trait_decl: DeclId,
        requirement: DeclId,
        scope: ScopeId,
    ) -> WitnessSearch {
        let Some(name) = self
            .program
            .ast()
            .decl_name(requirement)
            .map(str::to_string)
        else {
            return WitnessSearch::Missing;
        };

        // Associated types are witnessed by any type member of that name.
        if matches!(
            self.program.ast().decls[requirement].node,
            DeclKind::AssociatedType(_) | DeclKind::AssociatedValue(_)
        ) {
            let members = self.lookup_member(model, &name, scope);
            let types: Vec<DeclId> = members
                .into_iter()
                .filter(|&m| {
                    m != requirement
                        && matches!(
                            self.program.ast().decls[m].node,
                            DeclKind::Product(_)
                                | DeclKind::TypeAlias(_)
                                | DeclKind::Var(_)
                                | DeclKind::Binding(_)
                        )
                })
                .collect();
            return match types.len() {
                0 => WitnessSearch::Missing,
                1 => WitnessSearch::Unique(DeclRef::Member(types[0])),
                _ => WitnessSearch::Ambiguous,
            };
        }

        // Specialize the requirement's type with `Self := model`, then
        // complete any associated-type projections it exposes.
        let requirement_ty = self.realize_decl(requirement);
        let expected = match self.trait_self_parameter(trait_decl) {
            Some(self_param) => {
                let mut subs = GenericSubstitutions::default();
                subs.types.insert(self_param, model.clone());
                let specialized = requirement_ty.specialized(&subs);
                self.resolved_projections(&specialized, scope).canonical()
            }
            None => requirement_ty.canonical(),
        };

        let members = self.lookup_member(model, &name, scope);
        let mut matching = Vec::new();
        for m in members {
            if m == requirement {
                continue;
            }
            let member_ty = self.realize_decl(m).bare().clone().canonical();
            if member_ty == expected {
                matching.push(m);
            }
        }
        match matching.len() {
            0 => {
                if self.program.is_synthesizable(requirement) {
                    WitnessSearch::Synthesized
                } else {
                    WitnessSearch::Missing
                }
            }
            1 => WitnessSearch::Unique(DeclRef::Member(matching[0])),
            _ => WitnessSearch::Ambiguous,
        }
    }

    fn trait_self_parameter(&self, trait_decl: DeclId) -> Option<DeclId> {
        match &self.program.ast().decls[trait_decl].node {
            DeclKind::Trait(t) => t.self_parameter,
            _ => None,
        }
    }
}

enum WitnessSearch {
    Unique(DeclRef),
    Synthesized,
    Missing,
    Ambiguous,
}
