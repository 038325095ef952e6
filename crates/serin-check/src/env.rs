//! Generic environments: the constraints a declaration's generic clause
//! places on its parameters.
//!
//! Environments are memoized with an in-progress marker so that a trait
//! whose refinement closure loops back on itself resolves to `None`
//! instead of recursing, and later uses of that trait see the failure
//! without diagnosing it again.

use std::rc::Rc;

use serin_ast::{DeclId, DeclKind, ExprId, WhereClauseKind};
use serin_types::Type;

use crate::TypeChecker;

/// A realized generic clause.
#[derive(Debug, Clone)]
pub struct GenericEnvironment {
    /// Parameters in declaration order.
    pub parameters: Vec<DeclId>,
    pub constraints: Vec<GenericConstraint>,
}

/// One constraint of a generic environment.
#[derive(Debug, Clone)]
pub enum GenericConstraint {
    Equality { lhs: Type, rhs: Type },
    Conformance { subject: Type, traits: Vec<DeclId> },
    /// A value-level predicate, kept symbolic.
    Predicate { expr: ExprId },
}

/// Memoization state of an environment request.
#[derive(Debug, Clone)]
pub enum EnvironmentState {
    InProgress,
    Done(Option<Rc<GenericEnvironment>>),
}

impl TypeChecker<'_> {
    /// The generic environment of a declaration, or `None` when it could
    /// not be built (e.g. a circular trait refinement).
    pub(crate) fn environment_of(&mut self, d: DeclId) -> Option<Rc<GenericEnvironment>> {
        match self.environments.get(&d) {
            Some(EnvironmentState::Done(env)) => return env.clone(),
            Some(EnvironmentState::InProgress) => return None,
            None => {}
        }
        self.environments.insert(d, EnvironmentState::InProgress);
        let env = self.build_environment(d).map(Rc::new);
        self.environments
            .insert(d, EnvironmentState::Done(env.clone()));
        env
    }

    fn build_environment(&mut self, d: DeclId) -> Option<GenericEnvironment> {
        match self.program.ast().decls[d].node.clone() {
            DeclKind::Trait(t) => {
                let self_parameter = t.self_parameter?;
                // `Self` conforms to the trait; circular refinements make
                // the whole environment unavailable.
                let closure = self.trait_refinement_closure(d)?;
                let constraints = vec![GenericConstraint::Conformance {
                    subject: Type::GenericTypeParameter(self_parameter),
                    traits: closure,
                }];
                Some(GenericEnvironment {
                    parameters: vec![self_parameter],
                    constraints,
                })
            }
            DeclKind::Product(x) => self.clause_environment(x.generics),
            DeclKind::TypeAlias(x) => self.clause_environment(x.generics),
            DeclKind::Function(x) => self.clause_environment(x.generics),
            DeclKind::Method(x) => self.clause_environment(x.generics),
            DeclKind::Subscript(x) => self.clause_environment(x.generics),
            DeclKind::Initializer(x) => self.clause_environment(x.generics),
            _ => Some(GenericEnvironment {
                parameters: Vec::new(),
                constraints: Vec::new(),
            }),
        }
    }

    fn clause_environment(
        &mut self,
        clause: Option<serin_ast::GenericClause>,
    ) -> Option<GenericEnvironment> {
        let Some(clause) = clause else {
            return Some(GenericEnvironment {
                parameters: Vec::new(),
                constraints: Vec::new(),
            });
        };
        let mut constraints = Vec::new();
        // Declared conformances on each parameter, in declaration order.
        for &p in &clause.parameters {
            let traits = self.parameter_bound_traits(p);
            if !traits.is_empty() {
                constraints.push(GenericConstraint::Conformance {
                    subject: Type::GenericTypeParameter(p),
                    traits,
                });
            }
        }
        for w in clause.where_clauses {
            match w.kind {
                WhereClauseKind::Equality { lhs, rhs } => {
                    let lhs = self.realize_type_expr(lhs);
                    let rhs = self.realize_type_expr(rhs);
                    constraints.push(GenericConstraint::Equality { lhs, rhs });
                }
                WhereClauseKind::Conformance { subject, traits } => {
                    let subject = self.realize_type_expr(subject);
                    let mut resolved = Vec::new();
                    for t in traits {
                        if let Type::Trait(td) = self.realize_type_expr(t).canonical() {
                            resolved.push(td);
                        }
                    }
                    if !resolved.is_empty() {
                        constraints.push(GenericConstraint::Conformance {
                            subject,
                            traits: resolved,
                        });
                    }
                }
                WhereClauseKind::Predicate { expr } => {
                    constraints.push(GenericConstraint::Predicate { expr });
                }
            }
        }
        Some(GenericEnvironment {
            parameters: clause.parameters,
            constraints,
        })
    }
}
