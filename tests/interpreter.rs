use std::rc::Rc;

use loxpp::prelude::*;

fn make_expression(source: &'static str) -> Expr {
    let tokens = Scanner::new("<test>", source)
        .scan_tokens()
        .expect("failed to scan the source");
    let mut parser = Parser::new(tokens);
    let stmt = parser.parse().pop().expect("no statement was created");
    let stmt = Rc::try_unwrap(stmt).expect("statement is shared");

    match stmt.kind {
        StmtKind::Expression { expr } => expr,
        _ => panic!("statement is not an expression"),
    }
}

macro_rules! assert_literal {
    ($source:literal, $expected:expr, $lit_type:path) => {
        let mut ipr = Interpreter::new();
        let expr = make_expression($source);
        let res = ipr.evaluate_expr(&expr);
        assert!(res.is_ok());
        assert_eq!(res.unwrap(), $lit_type($expected));
    };
}

macro_rules! assert_number {
    ($source:literal, $expected:expr) => {
        assert_literal!($source, $expected, Object::Number);
    };
}

macro_rules! assert_string {
    ($source:literal, $expected:expr) => {
        assert_literal!($source, $expected, Object::Str);
    };
}

macro_rules! assert_boolean {
    ($source:literal, $expected:expr) => {
        assert_literal!($source, $expected, Object::Boolean);
    };
}

#[test]
fn unary_minus() {
    assert_number!("-3.14;", -3.14);
}

#[test]
fn unary_bang() {
    assert_boolean!("!true;", false);
    assert_boolean!("!false;", true);
    assert_boolean!("!0;", true);
    assert_boolean!("!2;", false);
}

#[test]
fn binary_plus_numbers() {
    assert_number!("10 + 20;", 30.0);
}

#[test]
fn binary_plus_strings() {
    assert_string!(r#" "Hello " + "World!"; "#, "Hello World!".to_string());
}

#[test]
fn binary_minus() {
    assert_number!("10 - 20;", -10.0);
}

#[test]
fn binary_star() {
    assert_number!("10 * 20;", 200.0);
}

#[test]
fn binary_star_repeats_strings() {
    assert_string!(r#" 2 * "ab"; "#, "abab".to_string());
    assert_string!(r#" "ab" * 2; "#, "abab".to_string());
}

#[test]
fn binary_slash() {
    assert_number!("10 / 20;", 0.5);
}

#[test]
fn binary_percent() {
    assert_number!("10 % 3;", 1.0);
    assert_number!("10.9 % 3.9;", 1.0);
}

#[test]
fn binary_greater() {
    assert_boolean!("10 > 20;", false);
    assert_boolean!("20 > 10;", true);
}

#[test]
fn binary_greater_equal() {
    assert_boolean!("10 >= 20;", false);
    assert_boolean!("20 >= 10;", true);
}

#[test]
fn binary_less() {
    assert_boolean!("10 < 20;", true);
    assert_boolean!("20 < 10;", false);
}

#[test]
fn binary_less_equal() {
    assert_boolean!("10 <= 20;", true);
    assert_boolean!("20 <= 10;", false);
}

#[test]
fn binary_comparisons_cover_strings() {
    assert_boolean!(r#" "abc" < "abd"; "#, true);
    assert_boolean!(r#" "b" >= "a"; "#, true);
}

#[test]
fn binary_equal_equal() {
    assert_boolean!("10 == 20;", false);
    assert_boolean!("10 == 10;", true);
    assert_boolean!("nil == nil;", true);
}

#[test]
fn binary_bang_equal() {
    assert_boolean!("10 != 20;", true);
    assert_boolean!("10 != 10;", false);
}

#[test]
fn ternary_expression() {
    assert_number!("1 > 0 ? 10 : 20;", 10.0);
    assert_number!("0 > 1 ? 10 : 20;", 20.0);
}

#[test]
fn logic_normalizes_to_boolean() {
    assert_boolean!("1 or 0;", true);
    assert_boolean!("0 or 0;", false);
    assert_boolean!("1 and 2;", true);
    assert_boolean!("1 and 0;", false);
}

#[test]
fn radix_literals() {
    assert_number!("0x1F;", 31.0);
    assert_number!("0b110;", 6.0);
}

#[test]
fn division_by_zero_errors() {
    let mut ipr = Interpreter::new();
    let expr = make_expression("1 / 0;");
    assert!(ipr.evaluate_expr(&expr).is_err());
}

#[test]
fn comparing_mixed_kinds_errors() {
    let mut ipr = Interpreter::new();
    let expr = make_expression(r#" 1 < "a"; "#);
    assert!(ipr.evaluate_expr(&expr).is_err());
}
