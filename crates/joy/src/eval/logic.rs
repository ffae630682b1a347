//! Comparison and boolean primitives.
//!
//! Comparisons use the total value ordering, so strings and lists compare
//! lexicographically and mixed kinds never fail. The boolean connectives
//! double as bitmask operations when every operand is a SET.

use std::cmp::Ordering;
use std::collections::HashMap;

use joy_core::{JoyError, Value};

use super::{Evaluator, Primitive};

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("<", |ev| comparison(ev, "<", &[Ordering::Less]));
    table.insert(">", |ev| comparison(ev, ">", &[Ordering::Greater]));
    table.insert("<=", |ev| {
        comparison(ev, "<=", &[Ordering::Less, Ordering::Equal])
    });
    table.insert(">=", |ev| {
        comparison(ev, ">=", &[Ordering::Greater, Ordering::Equal])
    });
    table.insert("=", eq);
    table.insert("!=", ne);
    table.insert("equal", eq);
    table.insert("compare", compare);
    table.insert("and", and);
    table.insert("or", or);
    table.insert("xor", xor);
    table.insert("not", not);
}

fn binary(ev: &mut Evaluator, op: &str) -> Result<(Value, Value), JoyError> {
    let mut vs = ev.stack.pop_n(op, 2)?;
    let b = vs.remove(0);
    let a = vs.remove(0);
    Ok((a, b))
}

fn comparison(ev: &mut Evaluator, op: &str, accept: &[Ordering]) -> Result<(), JoyError> {
    let (a, b) = binary(ev, op)?;
    let ord = a.compare(&b);
    ev.stack.push(Value::Bool(accept.contains(&ord)));
    Ok(())
}

fn eq(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "=")?;
    ev.stack.push(Value::Bool(a.joy_eq(&b)));
    Ok(())
}

fn ne(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "!=")?;
    ev.stack.push(Value::Bool(!a.joy_eq(&b)));
    Ok(())
}

/// A B -> -1 | 0 | 1
fn compare(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "compare")?;
    let result = match a.compare(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    ev.stack.push(Value::Int(result));
    Ok(())
}

fn and(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "and")?;
    let result = match (&a, &b) {
        (Value::Set(x), Value::Set(y)) => Value::Set(x & y),
        _ => Value::Bool(a.truthy() && b.truthy()),
    };
    ev.stack.push(result);
    Ok(())
}

fn or(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "or")?;
    let result = match (&a, &b) {
        (Value::Set(x), Value::Set(y)) => Value::Set(x | y),
        _ => Value::Bool(a.truthy() || b.truthy()),
    };
    ev.stack.push(result);
    Ok(())
}

fn xor(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "xor")?;
    let result = match (&a, &b) {
        (Value::Set(x), Value::Set(y)) => Value::Set(x ^ y),
        _ => Value::Bool(a.truthy() != b.truthy()),
    };
    ev.stack.push(result);
    Ok(())
}

fn not(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("not")?;
    let result = match a {
        Value::Set(x) => Value::Set(!x),
        other => Value::Bool(!other.truthy()),
    };
    ev.stack.push(result);
    Ok(())
}
