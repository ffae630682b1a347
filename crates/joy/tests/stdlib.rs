//! The embedded standard libraries load at startup and their words work.

use joyc::eval::{Evaluator, SharedOutput};
use joyc::Value;

fn eval_with_stdlib(source: &str) -> Vec<Value> {
    let sink = SharedOutput::new();
    let mut ev = Evaluator::with_output(Box::new(sink));
    ev.load_stdlib().expect("standard library must load");
    ev.run(source).unwrap();
    ev.stack.items().to_vec()
}

#[test]
fn stdlib_loads_quietly() {
    let sink = SharedOutput::new();
    let mut ev = Evaluator::with_output(Box::new(sink.clone()));
    ev.load_stdlib().unwrap();
    // Library loading produces no program output and leaves the stack empty.
    assert_eq!(sink.contents(), "");
    assert!(ev.stack.is_empty());
}

#[test]
fn base_library_words() {
    assert_eq!(eval_with_stdlib("3 squared"), vec![Value::Int(9)]);
    assert_eq!(eval_with_stdlib("3 cubed"), vec![Value::Int(27)]);
    assert_eq!(eval_with_stdlib("4 even"), vec![Value::Bool(true)]);
    assert_eq!(eval_with_stdlib("4 odd"), vec![Value::Bool(false)]);
    assert_eq!(eval_with_stdlib("5 positive"), vec![Value::Bool(true)]);
    assert_eq!(eval_with_stdlib("-5 negative"), vec![Value::Bool(true)]);
    assert_eq!(eval_with_stdlib("1 2 pop2"), Vec::<Value>::new());
    assert_eq!(
        eval_with_stdlib("7 unitlist"),
        vec![Value::List(vec![Value::Int(7)])]
    );
    assert_eq!(
        eval_with_stdlib("1 2 pairlist"),
        vec![Value::List(vec![Value::Int(1), Value::Int(2)])]
    );
    assert_eq!(eval_with_stdlib("truth falsity"), vec![
        Value::Bool(true),
        Value::Bool(false)
    ]);
}

#[test]
fn aggregate_library_words() {
    assert_eq!(eval_with_stdlib("[1 2 3 4] sum"), vec![Value::Int(10)]);
    assert_eq!(eval_with_stdlib("[1 2 3 4] product"), vec![Value::Int(24)]);
    assert_eq!(eval_with_stdlib("[1 2 3] length"), vec![Value::Int(3)]);
    assert_eq!(
        eval_with_stdlib("[1 2 3] reverselist"),
        vec![Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])]
    );
    assert_eq!(eval_with_stdlib("[1 2 3] second"), vec![Value::Int(2)]);
    assert_eq!(eval_with_stdlib("[1 2 3] third"), vec![Value::Int(3)]);
    assert_eq!(eval_with_stdlib("[1 2 3] last"), vec![Value::Int(3)]);
    assert_eq!(eval_with_stdlib("[1 2 3 4] sumlist"), vec![Value::Int(10)]);
    assert_eq!(eval_with_stdlib("[3 9 2] maxlist"), vec![Value::Int(9)]);
    assert_eq!(
        eval_with_stdlib("[1] [2] [3] concat3"),
        vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
    );
    assert_eq!(
        eval_with_stdlib("\"ab\" elements"),
        vec![Value::List(vec![Value::Char('a'), Value::Char('b')])]
    );
}

#[test]
fn dip2_runs_two_below() {
    assert_eq!(
        eval_with_stdlib("10 1 2 [succ] dip2"),
        vec![Value::Int(11), Value::Int(1), Value::Int(2)]
    );
}

#[test]
fn user_definitions_can_shadow_stdlib_words() {
    assert_eq!(
        eval_with_stdlib("DEFINE squared == pop 0 . 9 squared"),
        vec![Value::Int(0)]
    );
}
