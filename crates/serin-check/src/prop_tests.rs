//! Property tests for the type algebra using proptest.
//!
//! These stress invariants that must hold for ANY type, not just
//! hand-picked examples:
//!
//! 1. Canonicalization idempotence: canonical(canonical(t)) == canonical(t)
//! 2. Equivalence through canonical forms is reflexive and stable under
//!    element order for sums
//! 3. Substitution commutes with canonicalization
//! 4. Substituting every free variable clears the variable flag
//! 5. Trivial subtyping is reflexive and respects `Any` as top

use std::collections::HashMap;

use proptest::prelude::*;
use serin_ast::AccessEffect;
use serin_types::{
    BuiltinType, CallableParameter, LambdaType, ParameterType, RemoteType, TupleElement, Type,
    TypeVariable,
};

use crate::solver::is_trivial_subtype;

fn arb_leaf() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Any),
        Just(Type::Error),
        Just(Type::Builtin(BuiltinType::Word)),
        Just(Type::Builtin(BuiltinType::Ptr)),
        Just(Type::Builtin(BuiltinType::I(1))),
        Just(Type::Builtin(BuiltinType::I(64))),
        Just(Type::Builtin(BuiltinType::Float64)),
        (0u64..4).prop_map(|v| Type::Variable(TypeVariable(v))),
        Just(Type::void()),
        Just(Type::never()),
    ]
}

fn arb_type() -> impl Strategy<Value = Type> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(|tys| {
                Type::Tuple(
                    tys.into_iter()
                        .map(|ty| TupleElement { label: None, ty })
                        .collect(),
                )
            }),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Type::Sum),
            inner.clone().prop_map(|t| Type::Metatype(Box::new(t))),
            inner.clone().prop_map(|t| {
                Type::Parameter(ParameterType {
                    convention: AccessEffect::Let,
                    bare: Box::new(t),
                })
            }),
            inner.clone().prop_map(|t| {
                Type::Remote(RemoteType {
                    effect: AccessEffect::Inout,
                    projectee: Box::new(t),
                })
            }),
            (prop::collection::vec(inner.clone(), 0..3), inner.clone()).prop_map(
                |(params, output)| {
                    Type::Lambda(LambdaType::thin(
                        params
                            .into_iter()
                            .map(|ty| CallableParameter { label: None, ty })
                            .collect(),
                        output,
                    ))
                }
            ),
        ]
    })
}

/// A substitution binding every variable the generators can produce.
fn full_substitution() -> HashMap<TypeVariable, Type> {
    let mut out = HashMap::new();
    out.insert(TypeVariable(0), Type::Builtin(BuiltinType::Word));
    out.insert(TypeVariable(1), Type::void());
    out.insert(TypeVariable(2), Type::Builtin(BuiltinType::Float64));
    out.insert(TypeVariable(3), Type::never());
    out
}

proptest! {
    #[test]
    fn canonicalization_is_idempotent(t in arb_type()) {
        let once = t.canonical();
        let twice = once.canonical();
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.is_canonical());
    }

    #[test]
    fn sum_order_is_irrelevant_after_canonicalization(
        mut elements in prop::collection::vec(arb_leaf(), 0..4),
    ) {
        let forward = Type::Sum(elements.clone()).canonical();
        elements.reverse();
        let backward = Type::Sum(elements).canonical();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn substitution_commutes_with_canonicalization(t in arb_type()) {
        let subs = full_substitution();
        let canon_then_subst = t.canonical().substituting_variables(&subs).canonical();
        let subst_then_canon = t.substituting_variables(&subs).canonical();
        prop_assert_eq!(canon_then_subst, subst_then_canon);
    }

    #[test]
    fn full_substitution_clears_the_variable_flag(t in arb_type()) {
        let subs = full_substitution();
        let grounded = t.substituting_variables(&subs);
        prop_assert!(!grounded.has_variable());
        prop_assert!(grounded.free_variables().is_empty());
    }

    #[test]
    fn trivial_subtyping_is_reflexive_and_bounded(t in arb_type()) {
        prop_assert!(is_trivial_subtype(&t, &t));
        prop_assert!(is_trivial_subtype(&t, &Type::Any));
        prop_assert!(is_trivial_subtype(&Type::never(), &t));
    }

    #[test]
    fn flags_survive_structural_rebuild(t in arb_type()) {
        // Rebuilding through the identity transform preserves the term
        // and therefore its flags.
        let rebuilt = t.transform(&mut |_| serin_types::TransformAction::StepInto);
        prop_assert_eq!(t.flags(), rebuilt.flags());
        prop_assert_eq!(t, rebuilt);
    }
}
