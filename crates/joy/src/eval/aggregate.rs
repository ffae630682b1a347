//! Aggregate primitives over LIST, QUOTATION, STRING, and SET.
//!
//! Operations preserve the outer kind where possible: STRING in, STRING
//! out when all elements are characters; SET in, SET out; LIST/QUOTATION
//! keep their own tag. Mixing dissimilar kinds in a concatenation is a
//! domain error; `first`/`rest`/`uncons` on an empty aggregate likewise.

use std::collections::HashMap;

use joy_core::value::SET_MAX;
use joy_core::{JoyError, Value};

use super::{elements, Evaluator, Primitive};

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("cons", cons);
    table.insert("swons", swons);
    table.insert("first", first);
    table.insert("rest", rest);
    table.insert("uncons", uncons);
    table.insert("unswons", unswons);
    table.insert("null", null);
    table.insert("small", small);
    table.insert("size", size);
    table.insert("concat", concat);
    table.insert("swoncat", swoncat);
    table.insert("enconcat", enconcat);
    table.insert("reverse", reverse);
    table.insert("at", at);
    table.insert("of", of);
    table.insert("take", take);
    table.insert("drop", drop_word);
    table.insert("in", in_word);
    table.insert("has", has);
}

/// Same aggregate family: the two list-likes together, strings together,
/// sets together.
fn same_family(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (
            Value::List(_) | Value::Quotation(_),
            Value::List(_) | Value::Quotation(_)
        ) | (Value::String(_), Value::String(_))
            | (Value::Set(_), Value::Set(_))
    )
}

/// Validate an element for insertion into a set.
fn set_element(x: &Value, op: &str) -> Result<i64, JoyError> {
    match x {
        Value::Int(n) if (0..=SET_MAX).contains(n) => Ok(*n),
        Value::Int(n) => Err(JoyError::domain(
            op,
            format!("set member {} out of range 0..63", n),
        )),
        other => Err(JoyError::type_error(op, "integer", other.type_name())),
    }
}

fn prepend(x: Value, agg: Value, op: &str) -> Result<Value, JoyError> {
    if let Value::Set(bits) = agg {
        let m = set_element(&x, op)?;
        return Ok(Value::Set(bits | (1 << m)));
    }
    let mut items = elements(&agg, op)?;
    items.insert(0, x);
    Ok(Value::rebuild_like(items, &agg))
}

/// X A -> [X | A]
fn cons(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("cons", 2)?;
    let agg = vs.remove(0);
    let x = vs.remove(0);
    let result = prepend(x, agg, "cons")?;
    ev.stack.push(result);
    Ok(())
}

/// A X -> [X | A]
fn swons(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("swons", 2)?;
    let x = vs.remove(0);
    let agg = vs.remove(0);
    let result = prepend(x, agg, "swons")?;
    ev.stack.push(result);
    Ok(())
}

fn first(ev: &mut Evaluator) -> Result<(), JoyError> {
    let agg = ev.stack.pop("first")?;
    let items = elements(&agg, "first")?;
    match items.into_iter().next() {
        Some(head) => {
            ev.stack.push(head);
            Ok(())
        }
        None => Err(JoyError::domain("first", "empty aggregate")),
    }
}

fn rest(ev: &mut Evaluator) -> Result<(), JoyError> {
    let agg = ev.stack.pop("rest")?;
    let items = elements(&agg, "rest")?;
    if items.is_empty() {
        return Err(JoyError::domain("rest", "empty aggregate"));
    }
    ev.stack.push(Value::rebuild_like(items[1..].to_vec(), &agg));
    Ok(())
}

/// A -> X A'
fn uncons(ev: &mut Evaluator) -> Result<(), JoyError> {
    let agg = ev.stack.pop("uncons")?;
    let items = elements(&agg, "uncons")?;
    if items.is_empty() {
        return Err(JoyError::domain("uncons", "empty aggregate"));
    }
    ev.stack.push(items[0].clone());
    ev.stack.push(Value::rebuild_like(items[1..].to_vec(), &agg));
    Ok(())
}

/// A -> A' X
fn unswons(ev: &mut Evaluator) -> Result<(), JoyError> {
    let agg = ev.stack.pop("unswons")?;
    let items = elements(&agg, "unswons")?;
    if items.is_empty() {
        return Err(JoyError::domain("unswons", "empty aggregate"));
    }
    ev.stack.push(Value::rebuild_like(items[1..].to_vec(), &agg));
    ev.stack.push(items[0].clone());
    Ok(())
}

/// Empty aggregate, zero numeric, false, and the zero char are all null.
fn null(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("null")?;
    let result = match &x {
        Value::Int(n) => *n == 0,
        Value::Float(f) => *f == 0.0,
        Value::Bool(b) => !b,
        Value::Char(c) => *c as u32 == 0,
        Value::File(h) => h.is_null(),
        other => match other.elements() {
            Some(items) => items.is_empty(),
            None => false,
        },
    };
    ev.stack.push(Value::Bool(result));
    Ok(())
}

/// Aggregate with 0 or 1 elements, or numeric below 2.
fn small(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("small")?;
    let result = match &x {
        Value::Int(n) => *n < 2,
        Value::Float(f) => *f < 2.0,
        Value::Bool(_) => true,
        Value::Char(c) => (*c as u32) < 2,
        other => match other.elements() {
            Some(items) => items.len() <= 1,
            None => false,
        },
    };
    ev.stack.push(Value::Bool(result));
    Ok(())
}

fn size(ev: &mut Evaluator) -> Result<(), JoyError> {
    let agg = ev.stack.pop("size")?;
    let items = elements(&agg, "size")?;
    ev.stack.push(Value::Int(items.len() as i64));
    Ok(())
}

fn concat_values(a: Value, b: Value, op: &str) -> Result<Value, JoyError> {
    if !same_family(&a, &b) {
        return Err(JoyError::domain(
            op,
            format!("cannot concatenate {} and {}", a.type_name(), b.type_name()),
        ));
    }
    if let (Value::Set(x), Value::Set(y)) = (&a, &b) {
        return Ok(Value::Set(x | y));
    }
    let mut items = elements(&a, op)?;
    items.extend(elements(&b, op)?);
    Ok(Value::rebuild_like(items, &a))
}

/// A1 A2 -> A1 ++ A2
fn concat(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("concat", 2)?;
    let b = vs.remove(0);
    let a = vs.remove(0);
    let result = concat_values(a, b, "concat")?;
    ev.stack.push(result);
    Ok(())
}

/// A1 A2 -> A2 ++ A1
fn swoncat(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("swoncat", 2)?;
    let b = vs.remove(0);
    let a = vs.remove(0);
    let result = concat_values(b, a, "swoncat")?;
    ev.stack.push(result);
    Ok(())
}

/// X A1 A2 -> A1 ++ [X] ++ A2
fn enconcat(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("enconcat", 3)?;
    let a2 = vs.remove(0);
    let a1 = vs.remove(0);
    let x = vs.remove(0);
    let with_x = prepend(x, a2, "enconcat")?;
    let result = concat_values(a1, with_x, "enconcat")?;
    ev.stack.push(result);
    Ok(())
}

fn reverse(ev: &mut Evaluator) -> Result<(), JoyError> {
    let agg = ev.stack.pop("reverse")?;
    let mut items = elements(&agg, "reverse")?;
    items.reverse();
    ev.stack.push(Value::rebuild_like(items, &agg));
    Ok(())
}

fn index_into(agg: &Value, n: &Value, op: &str) -> Result<Value, JoyError> {
    let idx = match n {
        Value::Int(i) => *i,
        other => return Err(JoyError::type_error(op, "integer", other.type_name())),
    };
    let items = elements(agg, op)?;
    if idx < 0 || idx as usize >= items.len() {
        return Err(JoyError::domain(
            op,
            format!("index {} out of bounds for size {}", idx, items.len()),
        ));
    }
    Ok(items[idx as usize].clone())
}

/// A N -> A[N]
fn at(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("at", 2)?;
    let n = vs.remove(0);
    let agg = vs.remove(0);
    let result = index_into(&agg, &n, "at")?;
    ev.stack.push(result);
    Ok(())
}

/// N A -> A[N]
fn of(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("of", 2)?;
    let agg = vs.remove(0);
    let n = vs.remove(0);
    let result = index_into(&agg, &n, "of")?;
    ev.stack.push(result);
    Ok(())
}

/// A N -> first N elements (clamped)
fn take(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("take", 2)?;
    let n = vs.remove(0);
    let agg = vs.remove(0);
    let count = match n {
        Value::Int(i) => i.max(0) as usize,
        other => return Err(JoyError::type_error("take", "integer", other.type_name())),
    };
    let items = elements(&agg, "take")?;
    let kept = items.into_iter().take(count).collect();
    ev.stack.push(Value::rebuild_like(kept, &agg));
    Ok(())
}

/// A N -> all but the first N elements (clamped)
fn drop_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("drop", 2)?;
    let n = vs.remove(0);
    let agg = vs.remove(0);
    let count = match n {
        Value::Int(i) => i.max(0) as usize,
        other => return Err(JoyError::type_error("drop", "integer", other.type_name())),
    };
    let items = elements(&agg, "drop")?;
    let kept = items.into_iter().skip(count).collect();
    ev.stack.push(Value::rebuild_like(kept, &agg));
    Ok(())
}

fn membership(agg: &Value, x: &Value, op: &str) -> Result<bool, JoyError> {
    match agg {
        Value::Set(bits) => Ok(match x {
            Value::Int(n) if (0..=SET_MAX).contains(n) => bits & (1 << n) != 0,
            _ => false,
        }),
        _ => {
            let items = elements(agg, op)?;
            Ok(items.iter().any(|item| item.joy_eq(x)))
        }
    }
}

/// X A -> B
fn in_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("in", 2)?;
    let agg = vs.remove(0);
    let x = vs.remove(0);
    let result = membership(&agg, &x, "in")?;
    ev.stack.push(Value::Bool(result));
    Ok(())
}

/// A X -> B
fn has(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("has", 2)?;
    let x = vs.remove(0);
    let agg = vs.remove(0);
    let result = membership(&agg, &x, "has")?;
    ev.stack.push(Value::Bool(result));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{Evaluator, SharedOutput};
    use joy_core::{JoyError, Value};

    fn run(source: &str) -> Vec<Value> {
        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run(source).unwrap();
        ev.stack.items().to_vec()
    }

    fn run_err(source: &str) -> JoyError {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run(source).unwrap_err()
    }

    #[test]
    fn test_cons_and_swons() {
        assert_eq!(
            run("1 [2 3] cons"),
            vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
        );
        assert_eq!(
            run("[2 3] 1 swons"),
            vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
        );
    }

    #[test]
    fn test_cons_on_set_and_string() {
        assert_eq!(run("1 {2 3} cons"), vec![Value::Set(0b1110)]);
        assert_eq!(run("'a \"bc\" cons"), vec![Value::String("abc".into())]);
    }

    #[test]
    fn test_cons_set_rejects_bad_members() {
        assert!(matches!(run_err("64 {} cons"), JoyError::Domain { .. }));
        assert!(matches!(run_err("'a {} cons"), JoyError::Type { .. }));
    }

    #[test]
    fn test_first_rest_uncons() {
        assert_eq!(run("[1 2 3] first"), vec![Value::Int(1)]);
        assert_eq!(
            run("[1 2 3] rest"),
            vec![Value::List(vec![Value::Int(2), Value::Int(3)])]
        );
        assert_eq!(
            run("[1 2 3] uncons"),
            vec![
                Value::Int(1),
                Value::List(vec![Value::Int(2), Value::Int(3)])
            ]
        );
        assert_eq!(
            run("[1 2 3] unswons"),
            vec![
                Value::List(vec![Value::Int(2), Value::Int(3)]),
                Value::Int(1)
            ]
        );
        assert_eq!(run("\"abc\" first"), vec![Value::Char('a')]);
        assert_eq!(run("\"abc\" rest"), vec![Value::String("bc".into())]);
        assert_eq!(run("{1 2 3} first"), vec![Value::Int(1)]);
    }

    #[test]
    fn test_uncons_cons_round_trip() {
        assert_eq!(
            run("[1 2 3] uncons cons"),
            vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
        );
    }

    #[test]
    fn test_empty_aggregate_errors() {
        assert!(matches!(run_err("[] first"), JoyError::Domain { .. }));
        assert!(matches!(run_err("[] rest"), JoyError::Domain { .. }));
        assert!(matches!(run_err("\"\" uncons"), JoyError::Domain { .. }));
    }

    #[test]
    fn test_null_and_small() {
        assert_eq!(run("[] null"), vec![Value::Bool(true)]);
        assert_eq!(run("0 null"), vec![Value::Bool(true)]);
        assert_eq!(run("0.0 null"), vec![Value::Bool(true)]);
        assert_eq!(run("false null"), vec![Value::Bool(true)]);
        assert_eq!(run("{} null"), vec![Value::Bool(true)]);
        assert_eq!(run("[1] null"), vec![Value::Bool(false)]);
        assert_eq!(run("[] small"), vec![Value::Bool(true)]);
        assert_eq!(run("[1] small"), vec![Value::Bool(true)]);
        assert_eq!(run("[1 2] small"), vec![Value::Bool(false)]);
        assert_eq!(run("1 small"), vec![Value::Bool(true)]);
        assert_eq!(run("2 small"), vec![Value::Bool(false)]);
    }

    #[test]
    fn test_size() {
        assert_eq!(run("[1 2 3] size"), vec![Value::Int(3)]);
        assert_eq!(run("\"test\" size"), vec![Value::Int(4)]);
        assert_eq!(run("{1 5} size"), vec![Value::Int(2)]);
        assert_eq!(run("[] size"), vec![Value::Int(0)]);
    }

    #[test]
    fn test_concat_kind_preservation() {
        assert_eq!(
            run("[1] [2] concat"),
            vec![Value::List(vec![Value::Int(1), Value::Int(2)])]
        );
        assert_eq!(run("\"ab\" \"cd\" concat"), vec![Value::String("abcd".into())]);
        assert_eq!(run("{1} {2} concat"), vec![Value::Set(0b110)]);
        assert_eq!(run("\"ab\" \"cd\" swoncat"), vec![Value::String("cdab".into())]);
    }

    #[test]
    fn test_concat_dissimilar_kinds_is_error() {
        assert!(matches!(run_err("\"ab\" [1] concat"), JoyError::Domain { .. }));
        assert!(matches!(
            run_err("1 \"a\" [2] enconcat"),
            JoyError::Domain { .. }
        ));
    }

    #[test]
    fn test_enconcat() {
        assert_eq!(
            run("2 [1] [3] enconcat"),
            vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
        );
    }

    #[test]
    fn test_reverse() {
        assert_eq!(
            run("[1 2 3] reverse"),
            vec![Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])]
        );
        assert_eq!(run("\"abc\" reverse"), vec![Value::String("cba".into())]);
    }

    #[test]
    fn test_indexing() {
        assert_eq!(run("[10 20 30] 1 at"), vec![Value::Int(20)]);
        assert_eq!(run("1 [10 20 30] of"), vec![Value::Int(20)]);
        assert_eq!(run("\"abc\" 2 at"), vec![Value::Char('c')]);
        assert!(matches!(run_err("[1] 5 at"), JoyError::Domain { .. }));
        assert!(matches!(run_err("[1] -1 at"), JoyError::Domain { .. }));
    }

    #[test]
    fn test_take_and_drop() {
        assert_eq!(
            run("[1 2 3 4] 2 take"),
            vec![Value::List(vec![Value::Int(1), Value::Int(2)])]
        );
        assert_eq!(
            run("[1 2 3 4] 2 drop"),
            vec![Value::List(vec![Value::Int(3), Value::Int(4)])]
        );
        assert_eq!(run("\"test\" 2 take"), vec![Value::String("te".into())]);
        // Over-length counts clamp.
        assert_eq!(run("[1] 5 drop"), vec![Value::List(vec![])]);
    }

    #[test]
    fn test_membership() {
        assert_eq!(run("2 [1 2 3] in"), vec![Value::Bool(true)]);
        assert_eq!(run("[1 2 3] 2 has"), vec![Value::Bool(true)]);
        assert_eq!(run("{1 2} 2 has"), vec![Value::Bool(true)]);
        assert_eq!(run("{} 2 has"), vec![Value::Bool(false)]);
        assert_eq!(run("'b \"abc\" in"), vec![Value::Bool(true)]);
        assert_eq!(run("9 [1 2] in"), vec![Value::Bool(false)]);
    }
}
