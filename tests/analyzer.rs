//! The analyzer passes used together with type evaluation: every statically
//! computable outcome of a program must lie within the program's computed type.
#![cfg(feature = "reader")]
#![expect(clippy::unwrap_used)] // test code OK

use lits::analyzer::{calculate_outcomes, find_unresolved_symbols};
use lits::ast::Ast;
use lits::parser::parse;
use lits::{Params, Type, Value, get_data_type, run};

fn type_params(bindings: &[(&'static str, Type)]) -> Params {
    Params {
        globals: bindings
            .iter()
            .map(|(name, t)| (*name, Value::Type(t.clone())))
            .collect(),
        ..Params::default()
    }
}

#[test]
fn test_outcomes_lie_within_the_program_type() {
    let test_cases: Vec<(&str, Vec<(&'static str, Type)>)> = vec![
        ("(if x (+ 1 2) \"a\")", vec![("x", Type::BOOLEAN)]),
        ("(cond x 1 y -2.5 :else nil)", vec![("x", Type::BOOLEAN), ("y", Type::UNKNOWN)]),
        ("(when x (* 2 3))", vec![("x", Type::TRUTHY.or(&Type::NIL))]),
        ("(or x 0)", vec![("x", Type::FALSY)]),
        ("(and x (count [1 2]))", vec![("x", Type::BOOLEAN)]),
        ("(?? x \"default\")", vec![("x", Type::NIL)]),
        ("(- (if x 1 2) (if y 3 4))", vec![("x", Type::BOOLEAN), ("y", Type::BOOLEAN)]),
    ];

    for (i, (source, bindings)) in test_cases.into_iter().enumerate() {
        let ast = parse(source).unwrap();
        let program_type = get_data_type(&ast, &type_params(&bindings)).unwrap();
        let outcomes = calculate_outcomes(&ast.body[0], &Params::default()).unwrap();
        assert!(!outcomes.is_empty(), "Test case {} failed: no outcomes", i + 1);

        for outcome in outcomes {
            let outcome_ast = Ast::new(vec![outcome.clone()]);
            // Outcomes that still mention host bindings are not static
            if !find_unresolved_symbols(&outcome_ast, &Params::default()).is_empty() {
                continue;
            }
            let value = run(&outcome_ast, &Params::default()).unwrap();
            assert!(
                Type::of(&value).is(&program_type),
                "Test case {} failed: outcome {outcome} of {source} is {value}, outside {program_type}",
                i + 1
            );
        }
    }
}

#[test]
fn test_host_bindings_resolve_symbols() {
    let ast = parse("(defn total [items] (reduce + (map price items))) (total cart)").unwrap();

    let unresolved: Vec<String> = find_unresolved_symbols(&ast, &Params::default())
        .into_iter()
        .map(|u| u.symbol)
        .collect();
    assert_eq!(unresolved, vec!["price", "cart"]);

    let params = type_params(&[("price", Type::FUNCTION), ("cart", Type::ARRAY)]);
    assert!(find_unresolved_symbols(&ast, &params).is_empty());
}

#[test]
fn test_static_tests_prune_branches() {
    let params = Params {
        globals: [("limit", Value::from(10))].into_iter().collect(),
        ..Params::default()
    };
    let ast = parse("(if (> limit 5) :large (if x :medium :small))").unwrap();
    let outcomes: Vec<String> = calculate_outcomes(&ast.body[0], &params)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(outcomes, vec!["\"large\""]);

    let outcomes = calculate_outcomes(&ast.body[0], &Params::default()).unwrap();
    assert_eq!(outcomes.len(), 3);
}
