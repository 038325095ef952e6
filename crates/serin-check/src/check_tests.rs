//! End-to-end checker tests over hand-built ASTs.
//!
//! Each test constructs a scoped program by hand and checks the types,
//! bindings, and diagnostics the engine produces. This is verbose but
//! precise — we know exactly what we're testing.

use serin_ast::*;
use serin_types::Type;

use crate::{CheckerConfig, DeclRef, RequestState, TypeChecker};

// ---------------------------------------------------------------------------
// Builder helpers
// ---------------------------------------------------------------------------

struct B {
    ast: Ast,
    next: u32,
}

impl B {
    fn new() -> Self {
        Self {
            ast: Ast::new(),
            next: 0,
        }
    }

    fn span(&mut self) -> Span {
        self.next += 2;
        Span::new(FileId(0), self.next - 2, self.next - 1)
    }

    fn name_ty(&mut self, name: &str) -> TypeExprId {
        let span = self.span();
        self.ast.alloc_type_expr(
            TypeExprKind::Name(NameTypeExpr {
                domain: None,
                ident: name.into(),
                arguments: Vec::new(),
            }),
            span,
        )
    }

    fn name_ty_args(&mut self, name: &str, arguments: Vec<TypeExprId>) -> TypeExprId {
        let span = self.span();
        self.ast.alloc_type_expr(
            TypeExprKind::Name(NameTypeExpr {
                domain: None,
                ident: name.into(),
                arguments,
            }),
            span,
        )
    }

    fn lambda_ty(&mut self, params: Vec<TypeExprId>, output: TypeExprId) -> TypeExprId {
        let span = self.span();
        let parameters = params
            .into_iter()
            .map(|bare| LambdaTypeParameter {
                label: None,
                convention: AccessEffect::Let,
                bare,
            })
            .collect();
        self.ast.alloc_type_expr(
            TypeExprKind::Lambda(LambdaTypeExpr {
                receiver_effect: None,
                environment: None,
                parameters,
                output,
            }),
            span,
        )
    }

    fn product(
        &mut self,
        name: &str,
        conformances: Vec<TypeExprId>,
        members: Vec<DeclId>,
    ) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(
            DeclKind::Product(ProductDecl {
                ident: name.into(),
                generics: None,
                conformances,
                members,
                memberwise_init: None,
            }),
            span,
        )
    }

    fn trait_decl(
        &mut self,
        name: &str,
        refinements: Vec<TypeExprId>,
        members: Vec<DeclId>,
    ) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(
            DeclKind::Trait(TraitDecl {
                ident: name.into(),
                refinements,
                members,
                self_parameter: None,
            }),
            span,
        )
    }

    fn type_alias(&mut self, name: &str, aliased: TypeExprId) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(
            DeclKind::TypeAlias(TypeAliasDecl {
                ident: name.into(),
                generics: None,
                aliased,
            }),
            span,
        )
    }

    fn operator(&mut self, name: &str, group: PrecedenceGroup) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(
            DeclKind::Operator(OperatorDecl {
                notation: OperatorNotation::Infix,
                ident: name.into(),
                precedence_group: Some(group),
            }),
            span,
        )
    }

    fn param(&mut self, label: Option<&str>, name: &str, annotation: Option<TypeExprId>) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(
            DeclKind::Parameter(ParameterDecl {
                label: label.map(Into::into),
                ident: name.into(),
                convention: AccessEffect::Let,
                annotation,
                default_value: None,
            }),
            span,
        )
    }

    fn function(&mut self, f: FunctionDecl) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(DeclKind::Function(f), span)
    }

    fn simple_fun(
        &mut self,
        name: &str,
        parameters: Vec<DeclId>,
        output: Option<TypeExprId>,
        body: Option<FunctionBody>,
    ) -> DeclId {
        self.function(FunctionDecl {
            ident: Some(name.into()),
            notation: None,
            is_static: false,
            receiver_effect: None,
            generics: None,
            explicit_captures: Vec::new(),
            parameters,
            output,
            body,
            is_in_expr_context: false,
            is_synthesizable: false,
        })
    }

    fn binding(
        &mut self,
        introducer: BindingIntroducer,
        name: &str,
        annotation: Option<TypeExprId>,
        initializer: Option<ExprId>,
    ) -> (DeclId, DeclId) {
        let span = self.span();
        let var = self
            .ast
            .alloc_decl(DeclKind::Var(VarDecl { ident: name.into() }), span);
        let name_pattern = self.ast.alloc_pattern(PatternKind::Name { var }, span);
        let pattern = self.ast.alloc_pattern(
            PatternKind::Binding {
                introducer,
                annotation,
                subpattern: name_pattern,
            },
            span,
        );
        let binding = self.ast.alloc_decl(
            DeclKind::Binding(BindingDecl {
                pattern,
                initializer,
                is_static: false,
            }),
            span,
        );
        (binding, var)
    }

    fn module(&mut self, name: &str, decls: Vec<DeclId>) -> DeclId {
        let span = self.span();
        self.ast.alloc_decl(
            DeclKind::Module(ModuleDecl {
                ident: name.into(),
                units: vec![TranslationUnit {
                    file: FileId(0),
                    decls,
                }],
            }),
            span,
        )
    }

    fn int(&mut self, text: &str) -> ExprId {
        let span = self.span();
        self.ast
            .alloc_expr(ExprKind::IntegerLiteral(text.into()), span)
    }

    fn name(&mut self, ident: &str) -> ExprId {
        let span = self.span();
        self.ast.alloc_expr(
            ExprKind::Name(NameExpr {
                domain: NameDomain::None,
                ident: ident.into(),
                notation: None,
                arguments: Vec::new(),
            }),
            span,
        )
    }

    fn operator_name(&mut self, ident: &str) -> ExprId {
        let span = self.span();
        self.ast.alloc_expr(
            ExprKind::Name(NameExpr {
                domain: NameDomain::None,
                ident: ident.into(),
                notation: Some(OperatorNotation::Infix),
                arguments: Vec::new(),
            }),
            span,
        )
    }

    fn call(&mut self, callee: ExprId, args: Vec<(Option<&str>, ExprId)>) -> ExprId {
        let span = self.span();
        let arguments = args
            .into_iter()
            .map(|(label, value)| LabeledArgument {
                label: label.map(Into::into),
                value,
            })
            .collect();
        self.ast
            .alloc_expr(ExprKind::Call(CallExpr { callee, arguments }), span)
    }

    fn seq(&mut self, head: ExprId, tail: Vec<(&str, ExprId)>) -> ExprId {
        let span = self.span();
        let tail = tail
            .into_iter()
            .map(|(op, operand)| {
                let operator = self.operator_name(op);
                SequenceTail { operator, operand }
            })
            .collect();
        self.ast
            .alloc_expr(ExprKind::Sequence(SequenceExpr { head, tail }), span)
    }

    fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        let span = self.span();
        self.ast.alloc_stmt(StmtKind::Return(value), span)
    }

    fn brace(&mut self, stmts: Vec<StmtId>) -> StmtId {
        let span = self.span();
        self.ast.alloc_stmt(StmtKind::Brace(stmts), span)
    }

    fn decl_stmt(&mut self, d: DeclId) -> StmtId {
        let span = self.span();
        self.ast.alloc_stmt(StmtKind::Decl(d), span)
    }

    fn finish(self) -> ScopedProgram {
        ScopedProgram::new(self.ast)
    }
}

/// A core module with the declarations literal typing relies on:
/// `Bool`, `Int: ExpressibleByIntegerLiteral` with a member `+`, and the
/// `+` operator declaration.
fn core_module(b: &mut B) -> (DeclId, DeclId, DeclId) {
    let lit_trait = b.trait_decl("ExpressibleByIntegerLiteral", Vec::new(), Vec::new());
    let bool_ty = b.product("Bool", Vec::new(), Vec::new());

    let int_output = b.name_ty("Int");
    let int_annotation = b.name_ty("Int");
    let other = b.param(None, "other", Some(int_annotation));
    let plus = b.function(FunctionDecl {
        ident: Some("+".into()),
        notation: Some(OperatorNotation::Infix),
        is_static: false,
        receiver_effect: None,
        generics: None,
        explicit_captures: Vec::new(),
        parameters: vec![other],
        output: Some(int_output),
        body: None,
        is_in_expr_context: false,
        is_synthesizable: false,
    });
    let int_conformance = b.name_ty("ExpressibleByIntegerLiteral");
    let int_ty = b.product("Int", vec![int_conformance], vec![plus]);
    let plus_op = b.operator("+", PrecedenceGroup::Addition);

    b.module("core", vec![lit_trait, bool_ty, int_ty, plus_op]);
    (bool_ty, int_ty, plus)
}

fn checked(program: &ScopedProgram) -> TypeChecker<'_> {
    let mut checker = TypeChecker::new(program, CheckerConfig::default());
    checker.check_all();
    checker
}

fn error_count(checker: &TypeChecker<'_>) -> usize {
    checker.diagnostics().iter().filter(|d| d.is_error()).count()
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn empty_main_checks_with_a_thin_lambda_type() {
    let mut b = B::new();
    let body = b.brace(Vec::new());
    let main = b.simple_fun("main", Vec::new(), None, Some(FunctionBody::Block(body)));
    b.module("main", vec![main]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all());
    assert!(checker.diagnostics().is_empty());

    let Some(Type::Lambda(l)) = checker.type_of_decl(main) else {
        panic!("expected a lambda type for main");
    };
    assert!(l.environment.is_void());
    assert!(l.inputs.is_empty());
    assert!(l.output.is_void());
    assert_eq!(checker.request_state(main), Some(RequestState::Success));
}

#[test]
fn operator_chain_binds_to_the_member_operator() {
    let mut b = B::new();
    core_module(&mut b);

    // public fun f(_ x: Int) -> Int { return x + 1 }
    let x_annotation = b.name_ty("Int");
    let x = b.param(None, "x", Some(x_annotation));
    let x_use = b.name("x");
    let one = b.int("1");
    let sum = b.seq(x_use, vec![("+", one)]);
    let ret = b.ret(Some(sum));
    let body = b.brace(vec![ret]);
    let output = b.name_ty("Int");
    let f = b.simple_fun("f", vec![x], Some(output), Some(FunctionBody::Block(body)));
    b.module("main", vec![f]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all(), "{:#?}", checker.diagnostics());
    assert_eq!(error_count(&checker), 0);

    // `x + 1` has type Int, and `+` resolved to the member operator.
    let sum_ty = checker.type_of_expr(sum).expect("sequence typed");
    assert_eq!(checker.show_type(sum_ty), "Int");
    let folded = checker
        .folded_sequence(sum)
        .expect("sequence folded by precedence");
    let crate::FoldedSequence::Node { callee, .. } = folded else {
        panic!("expected a folded node");
    };
    match checker.referred_decl(*callee) {
        Some(DeclRef::Member(d)) => {
            assert_eq!(program.ast().decl_name(*d), Some("+"));
        }
        other => panic!("expected a member reference for `+`, got {other:?}"),
    }
}

#[test]
fn generic_call_opens_and_reifies_the_parameter() {
    let mut b = B::new();
    core_module(&mut b);

    // fun id<T>(_ x: T) -> T { return x }
    let span = b.span();
    let t_param = b.ast.alloc_decl(
        DeclKind::GenericParameter(GenericParameterDecl {
            ident: "T".into(),
            annotations: Vec::new(),
        }),
        span,
    );
    let t_annotation = b.name_ty("T");
    let x = b.param(None, "x", Some(t_annotation));
    let x_use = b.name("x");
    let ret = b.ret(Some(x_use));
    let body = b.brace(vec![ret]);
    let t_output = b.name_ty("T");
    let id = b.function(FunctionDecl {
        ident: Some("id".into()),
        notation: None,
        is_static: false,
        receiver_effect: None,
        generics: Some(GenericClause {
            parameters: vec![t_param],
            where_clauses: Vec::new(),
        }),
        explicit_captures: Vec::new(),
        parameters: vec![x],
        output: Some(t_output),
        body: Some(FunctionBody::Block(body)),
        is_in_expr_context: false,
        is_synthesizable: false,
    });

    // let a = id(42)
    let id_use = b.name("id");
    let forty_two = b.int("42");
    let call = b.call(id_use, vec![(None, forty_two)]);
    let (a_binding, a_var) = b.binding(BindingIntroducer::Let, "a", None, Some(call));
    b.module("main", vec![id, a_binding]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all(), "{:#?}", checker.diagnostics());

    let call_ty = checker.type_of_expr(call).expect("call typed");
    assert_eq!(checker.show_type(call_ty), "Int");
    let a_ty = checker.type_of_decl(a_var).expect("variable reified");
    assert_eq!(checker.show_type(a_ty), "Int");
}

#[test]
fn memberwise_initializer_call_produces_the_product() {
    let mut b = B::new();
    core_module(&mut b);

    // type A { var x: Int }
    let x_annotation = b.name_ty("Int");
    let (x_binding, _x_var) = b.binding(BindingIntroducer::Var, "x", Some(x_annotation), None);
    let a = b.product("A", Vec::new(), vec![x_binding]);

    // let a = A(x: 1)
    let a_use = b.name("A");
    let one = b.int("1");
    let call = b.call(a_use, vec![(Some("x"), one)]);
    let (value_binding, value_var) = b.binding(BindingIntroducer::Let, "a", None, Some(call));
    b.module("main", vec![a, value_binding]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all(), "{:#?}", checker.diagnostics());

    // The synthesized initializer carries labels [self, x].
    let DeclKind::Product(p) = &program.ast().decls[a].node else {
        panic!("expected product");
    };
    let init = p.memberwise_init.expect("memberwise init synthesized");
    let Some(Type::Lambda(l)) = checker.type_of_decl(init) else {
        panic!("expected initializer lambda");
    };
    let labels: Vec<Option<&str>> = l.labels().collect();
    assert_eq!(labels, vec![Some("self"), Some("x")]);

    assert_eq!(checker.type_of_decl(value_var), Some(&Type::Product(a)));
    assert_eq!(checker.referred_decl(a_use), Some(&DeclRef::Member(init)));
}

#[test]
fn conformance_closure_includes_refined_traits_once() {
    let mut b = B::new();

    // trait P {}; type B: P {}; trait Q: P {}
    let p = b.trait_decl("P", Vec::new(), Vec::new());
    let p_use = b.name_ty("P");
    let model = b.product("B", vec![p_use], Vec::new());
    let p_refined = b.name_ty("P");
    let q = b.trait_decl("Q", vec![p_refined], Vec::new());
    b.module("main", vec![p, model, q]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all(), "{:#?}", checker.diagnostics());
    // Re-checking is a no-op; the registry keeps a single record.
    assert!(checker.check_all());

    let scope = program.scope_introducing(model).unwrap();
    let conformed = checker.conformed_traits(&Type::Product(model), scope);
    assert_eq!(conformed, vec![p]);

    let registered = checker.relations().conformances_of(&Type::Product(model));
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].trait_decl, p);

    let q_closure = checker.conformed_traits(&Type::Trait(q), scope);
    assert!(q_closure.contains(&q) && q_closure.contains(&p));
}

#[test]
fn singleton_sum_fails_one_member_but_not_the_type() {
    let mut b = B::new();
    core_module(&mut b);

    // type C { fun f() -> Sum<Int> {}; fun g() {} }
    let int_arg = b.name_ty("Int");
    let bad_sum = b.name_ty_args("Sum", vec![int_arg]);
    let f_body = b.brace(Vec::new());
    let f = b.simple_fun("f", Vec::new(), Some(bad_sum), Some(FunctionBody::Block(f_body)));
    let g_body = b.brace(Vec::new());
    let g = b.simple_fun("g", Vec::new(), None, Some(FunctionBody::Block(g_body)));
    let c = b.product("C", Vec::new(), vec![f, g]);
    b.module("main", vec![c]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(!checker.check_all());

    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::SingletonSumType
    }));
    assert!(checker.type_of_decl(f).unwrap().is_error());
    assert_eq!(checker.request_state(f), Some(RequestState::Failure));
    // The sibling member is unaffected.
    assert_eq!(checker.request_state(g), Some(RequestState::Success));
}

#[test]
fn self_refining_trait_reports_circular_refinement() {
    let mut b = B::new();
    let r_use = b.name_ty("R");
    let r = b.trait_decl("R", vec![r_use], Vec::new());
    b.module("main", vec![r]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(!checker.check_all());

    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::CircularRefinement
    }));
    // The environment is unavailable but later requests terminate.
    assert!(checker.environment_of(r).is_none());
    assert!(checker.environment_of(r).is_none());
}

#[test]
fn lambda_against_expected_type_infers_its_parameter() {
    let mut b = B::new();
    core_module(&mut b);

    // let g: (Int) -> Int = { (x) in x + 1 }
    let x = b.param(None, "x", None);
    let x_use = b.name("x");
    let one = b.int("1");
    let body = b.seq(x_use, vec![("+", one)]);
    let lambda_decl = b.function(FunctionDecl {
        ident: None,
        notation: None,
        is_static: false,
        receiver_effect: None,
        generics: None,
        explicit_captures: Vec::new(),
        parameters: vec![x],
        output: None,
        body: Some(FunctionBody::Expr(body)),
        is_in_expr_context: true,
        is_synthesizable: false,
    });
    let span = b.span();
    let lambda = b.ast.alloc_expr(ExprKind::Lambda(lambda_decl), span);

    let int_in = b.name_ty("Int");
    let int_out = b.name_ty("Int");
    let annotation = b.lambda_ty(vec![int_in], int_out);
    let (g_binding, g_var) = b.binding(BindingIntroducer::Let, "g", Some(annotation), Some(lambda));
    b.module("main", vec![g_binding]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all(), "{:#?}", checker.diagnostics());

    let body_ty = checker.type_of_expr(body).expect("body typed");
    assert_eq!(checker.show_type(body_ty), "Int");
    let x_ty = checker.type_of_decl(x).expect("parameter reified");
    assert_eq!(checker.show_type(x_ty), "let Int");
    let g_ty = checker.type_of_decl(g_var).expect("binding reified");
    assert!(matches!(g_ty, Type::Lambda(_)));
    assert_eq!(
        checker.request_state(lambda_decl),
        Some(RequestState::Success)
    );
}

// ---------------------------------------------------------------------------
// Universal properties
// ---------------------------------------------------------------------------

#[test]
fn checking_is_deterministic_across_runs() {
    fn build() -> (ScopedProgram, DeclId) {
        let mut b = B::new();
        core_module(&mut b);
        let x_annotation = b.name_ty("Int");
        let x = b.param(None, "x", Some(x_annotation));
        let x_use = b.name("x");
        let one = b.int("1");
        let sum = b.seq(x_use, vec![("+", one)]);
        let ret = b.ret(Some(sum));
        let body = b.brace(vec![ret]);
        let output = b.name_ty("Int");
        let f = b.simple_fun("f", vec![x], Some(output), Some(FunctionBody::Block(body)));
        b.module("main", vec![f]);
        (b.finish(), f)
    }

    let (p1, f1) = build();
    let (p2, f2) = build();
    let c1 = checked(&p1);
    let c2 = checked(&p2);
    let d1: Vec<String> = c1.diagnostics().iter().map(|d| d.to_string()).collect();
    let d2: Vec<String> = c2.diagnostics().iter().map(|d| d.to_string()).collect();
    assert_eq!(d1, d2);
    assert_eq!(
        c1.show_type(c1.type_of_decl(f1).unwrap()),
        c2.show_type(c2.type_of_decl(f2).unwrap()),
    );
}

#[test]
fn realize_is_idempotent() {
    let mut b = B::new();
    core_module(&mut b);
    let body = b.brace(Vec::new());
    let f = b.simple_fun("f", Vec::new(), None, Some(FunctionBody::Block(body)));
    b.module("main", vec![f]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    let first = checker.realize_decl(f);
    let second = checker.realize_decl(f);
    assert_eq!(first, second);
    assert!(checker.diagnostics().is_empty());
}

#[test]
fn alias_cycle_terminates_with_a_diagnostic() {
    let mut b = B::new();
    let b_use = b.name_ty("Bee");
    let a = b.type_alias("Aye", b_use);
    let a_use = b.name_ty("Aye");
    let bee = b.type_alias("Bee", a_use);
    b.module("main", vec![a, bee]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(!checker.check_all());
    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::CircularDependency
    }));
    // No declaration is left in an in-progress state.
    for state in checker.request_states() {
        assert!(!matches!(
            state,
            RequestState::TypeRealizationStarted | RequestState::TypeCheckingStarted
        ));
    }
}

#[test]
fn binding_initializer_cannot_see_its_own_variables() {
    let mut b = B::new();
    core_module(&mut b);
    let x_use = b.name("x");
    let (binding, _var) = b.binding(BindingIntroducer::Let, "x", None, Some(x_use));
    b.module("main", vec![binding]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(!checker.check_all());
    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::UndefinedName
    }));
}

#[test]
fn extensions_broaden_member_lookup() {
    fn base(with_extension: bool) -> (ScopedProgram, DeclId) {
        let mut b = B::new();
        let a = b.product("A", Vec::new(), Vec::new());
        let mut decls = vec![a];
        if with_extension {
            let body = b.brace(Vec::new());
            let f = b.simple_fun("f", Vec::new(), None, Some(FunctionBody::Block(body)));
            let subject = b.name_ty("A");
            let span = b.span();
            let ext = b.ast.alloc_decl(
                DeclKind::Extension(ExtensionDecl {
                    subject,
                    where_clauses: Vec::new(),
                    members: vec![f],
                }),
                span,
            );
            decls.push(ext);
        }
        b.module("main", decls);
        (b.finish(), a)
    }

    let (without, a1) = base(false);
    let mut c1 = TypeChecker::new(&without, CheckerConfig::default());
    let scope1 = without.scope_introducing(without.ast().modules[0]).unwrap();
    let before = c1.lookup_member(&Type::Product(a1), "f", scope1);

    let (with, a2) = base(true);
    let mut c2 = TypeChecker::new(&with, CheckerConfig::default());
    let scope2 = with.scope_introducing(with.ast().modules[0]).unwrap();
    let after = c2.lookup_member(&Type::Product(a2), "f", scope2);

    assert!(before.is_empty());
    assert_eq!(after.len(), 1);
}

#[test]
fn duplicate_conformance_in_one_module_is_redundant() {
    let mut b = B::new();
    let p = b.trait_decl("P", Vec::new(), Vec::new());
    let p_use = b.name_ty("P");
    let model = b.product("B", vec![p_use], Vec::new());
    let subject = b.name_ty("B");
    let p_again = b.name_ty("P");
    let span = b.span();
    let conf = b.ast.alloc_decl(
        DeclKind::Conformance(ConformanceDecl {
            subject,
            conformances: vec![p_again],
            where_clauses: Vec::new(),
            members: Vec::new(),
        }),
        span,
    );
    b.module("main", vec![p, model, conf]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(!checker.check_all());
    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::RedundantConformance
    }));
}

#[test]
fn duplicate_operators_are_rejected() {
    let mut b = B::new();
    let first = b.operator("+", PrecedenceGroup::Addition);
    let second = b.operator("+", PrecedenceGroup::Addition);
    b.module("main", vec![first, second]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(!checker.check_all());
    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::DuplicateOperator
    }));
}

#[test]
fn unused_expression_results_warn() {
    let mut b = B::new();
    core_module(&mut b);
    let one = b.int("1");
    let span = b.span();
    let stmt = b.ast.alloc_stmt(StmtKind::Expr(one), span);
    let body = b.brace(vec![stmt]);
    let f = b.simple_fun("f", Vec::new(), None, Some(FunctionBody::Block(body)));
    b.module("main", vec![f]);
    let program = b.finish();

    let checker = {
        let mut c = TypeChecker::new(&program, CheckerConfig::default());
        c.check_all();
        c
    };
    assert!(checker.diagnostics().iter().any(|d| {
        d.category == serin_diag::Category::UnusedResult && !d.is_error()
    }));
}

#[test]
fn local_function_captures_outer_variable() {
    let mut b = B::new();
    core_module(&mut b);

    // fun outer() { let y: Int = 1; fun inner() -> Int { return y + 1 } }
    let y_annotation = b.name_ty("Int");
    let one = b.int("1");
    let (y_binding, _y_var) =
        b.binding(BindingIntroducer::Let, "y", Some(y_annotation), Some(one));
    let y_stmt = b.decl_stmt(y_binding);

    let y_use = b.name("y");
    let one_more = b.int("1");
    let sum = b.seq(y_use, vec![("+", one_more)]);
    let ret = b.ret(Some(sum));
    let inner_body = b.brace(vec![ret]);
    let int_out = b.name_ty("Int");
    let inner = b.simple_fun(
        "inner",
        Vec::new(),
        Some(int_out),
        Some(FunctionBody::Block(inner_body)),
    );
    let inner_stmt = b.decl_stmt(inner);

    let outer_body = b.brace(vec![y_stmt, inner_stmt]);
    let outer = b.simple_fun("outer", Vec::new(), None, Some(FunctionBody::Block(outer_body)));
    b.module("main", vec![outer]);
    let program = b.finish();

    let mut checker = TypeChecker::new(&program, CheckerConfig::default());
    assert!(checker.check_all(), "{:#?}", checker.diagnostics());

    let captures = checker.implicit_captures_of(inner).expect("captures recorded");
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].name, "y");
    assert_eq!(captures[0].effect, AccessEffect::Let);
}
