//! Type predicates and type-directed conditionals.

use std::collections::HashMap;

use joy_core::{JoyError, Value};

use super::{expect_quotation, Evaluator, Primitive};

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("integer", |ev| predicate(ev, "integer"));
    table.insert("float", |ev| predicate(ev, "float"));
    table.insert("char", |ev| predicate(ev, "char"));
    table.insert("string", |ev| predicate(ev, "string"));
    table.insert("list", |ev| predicate(ev, "list"));
    table.insert("logical", |ev| predicate(ev, "logical"));
    table.insert("set", |ev| predicate(ev, "set"));
    table.insert("file", |ev| predicate(ev, "file"));
    table.insert("leaf", leaf);
    table.insert("user", user);
    table.insert("sametype", sametype);
    table.insert("typeof", typeof_word);

    table.insert("ifinteger", |ev| if_type(ev, "ifinteger"));
    table.insert("iffloat", |ev| if_type(ev, "iffloat"));
    table.insert("ifchar", |ev| if_type(ev, "ifchar"));
    table.insert("ifstring", |ev| if_type(ev, "ifstring"));
    table.insert("iflist", |ev| if_type(ev, "iflist"));
    table.insert("iflogical", |ev| if_type(ev, "iflogical"));
    table.insert("ifset", |ev| if_type(ev, "ifset"));
    table.insert("iffile", |ev| if_type(ev, "iffile"));
}

fn kind_matches(value: &Value, kind: &str) -> bool {
    match kind {
        "integer" | "ifinteger" => matches!(value, Value::Int(_)),
        "float" | "iffloat" => matches!(value, Value::Float(_)),
        "char" | "ifchar" => matches!(value, Value::Char(_)),
        "string" | "ifstring" => matches!(value, Value::String(_)),
        // `list` means list-shaped: LIST and QUOTATION both qualify.
        "list" | "iflist" => matches!(value, Value::List(_) | Value::Quotation(_)),
        "logical" | "iflogical" => matches!(value, Value::Bool(_)),
        "set" | "ifset" => matches!(value, Value::Set(_)),
        "file" | "iffile" => matches!(value, Value::File(_)),
        _ => false,
    }
}

fn predicate(ev: &mut Evaluator, kind: &'static str) -> Result<(), JoyError> {
    let x = ev.stack.pop(kind)?;
    ev.stack.push(Value::Bool(kind_matches(&x, kind)));
    Ok(())
}

/// An atom: anything that is not list-shaped.
fn leaf(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("leaf")?;
    let is_branch = matches!(x, Value::List(_) | Value::Quotation(_));
    ev.stack.push(Value::Bool(!is_branch));
    Ok(())
}

/// Is X a user-defined symbol?
fn user(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("user")?;
    let result = match x {
        Value::Symbol(name) => ev.definition(&name).is_some(),
        _ => false,
    };
    ev.stack.push(Value::Bool(result));
    Ok(())
}

fn sametype(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("sametype", 2)?;
    let b = vs.remove(0);
    let a = vs.remove(0);
    ev.stack.push(Value::Bool(a.type_name() == b.type_name()));
    Ok(())
}

/// The historical Joy type codes; QUOTATION reports as list.
fn typeof_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("typeof")?;
    let code = match x {
        Value::List(_) | Value::Quotation(_) => 0,
        Value::Bool(_) => 1,
        Value::Char(_) => 2,
        Value::Int(_) => 3,
        Value::Set(_) => 4,
        Value::String(_) => 5,
        Value::Symbol(_) => 6,
        Value::Float(_) => 7,
        Value::File(_) => 8,
    };
    ev.stack.push(Value::Int(code));
    Ok(())
}

/// X [T] [F] -> ... with X left in place; T runs when X has the kind the
/// word names, F otherwise.
fn if_type(ev: &mut Evaluator, op: &'static str) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n(op, 3)?;
    let f_quot = vs.remove(0);
    let t_quot = vs.remove(0);
    let x = vs.remove(0);
    let matched = kind_matches(&x, op);
    ev.stack.push(x);
    let branch = expect_quotation(if matched { t_quot } else { f_quot }, op)?;
    ev.execute_quotation(&branch)
}
