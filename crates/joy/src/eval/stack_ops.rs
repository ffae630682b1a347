//! Stack manipulation primitives.
//!
//! dup, pop, swap, over, dup2, rollup, rolldown, rotate, their `...d`
//! variants (which work one slot below TOS by saving and restoring the
//! top), stack/unstack, id, choice.

use std::collections::HashMap;

use joy_core::{JoyError, Value};

use super::{Evaluator, Primitive};

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("dup", dup);
    table.insert("dup2", dup2);
    table.insert("pop", pop);
    table.insert("id", id);
    table.insert("swap", swap);
    table.insert("over", over);
    table.insert("rotate", rotate);
    table.insert("rollup", rollup);
    table.insert("rolldown", rolldown);
    table.insert("dupd", dupd);
    table.insert("popd", popd);
    table.insert("swapd", swapd);
    table.insert("rollupd", rollupd);
    table.insert("rolldownd", rolldownd);
    table.insert("rotated", rotated);
    table.insert("stack", stack);
    table.insert("unstack", unstack);
    table.insert("newstack", newstack);
    table.insert("choice", choice);
}

fn dup(ev: &mut Evaluator) -> Result<(), JoyError> {
    let top = ev.stack.peek("dup", 0)?.clone();
    ev.stack.push(top);
    Ok(())
}

/// X Y -> X Y X Y
fn dup2(ev: &mut Evaluator) -> Result<(), JoyError> {
    let y = ev.stack.peek("dup2", 0)?.clone();
    let x = ev.stack.peek("dup2", 1)?.clone();
    ev.stack.push(x);
    ev.stack.push(y);
    Ok(())
}

fn pop(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.pop("pop")?;
    Ok(())
}

fn id(_ev: &mut Evaluator) -> Result<(), JoyError> {
    Ok(())
}

fn swap(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("swap", 2)?;
    let y = vs.remove(0);
    let x = vs.remove(0);
    ev.stack.push(y);
    ev.stack.push(x);
    Ok(())
}

/// X Y -> X Y X
fn over(ev: &mut Evaluator) -> Result<(), JoyError> {
    let second = ev.stack.peek("over", 1)?.clone();
    ev.stack.push(second);
    Ok(())
}

/// X Y Z -> Z Y X
fn rotate(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("rotate", 3)?;
    let z = vs.remove(0);
    let y = vs.remove(0);
    let x = vs.remove(0);
    ev.stack.push(z);
    ev.stack.push(y);
    ev.stack.push(x);
    Ok(())
}

/// X Y Z -> Z X Y
fn rollup(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("rollup", 3)?;
    let z = vs.remove(0);
    let y = vs.remove(0);
    let x = vs.remove(0);
    ev.stack.push(z);
    ev.stack.push(x);
    ev.stack.push(y);
    Ok(())
}

/// X Y Z -> Y Z X
fn rolldown(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("rolldown", 3)?;
    let z = vs.remove(0);
    let y = vs.remove(0);
    let x = vs.remove(0);
    ev.stack.push(y);
    ev.stack.push(z);
    ev.stack.push(x);
    Ok(())
}

/// Run `op` with TOS set aside, then put it back.
fn under_top(
    ev: &mut Evaluator,
    name: &str,
    op: fn(&mut Evaluator) -> Result<(), JoyError>,
) -> Result<(), JoyError> {
    let top = ev.stack.pop(name)?;
    let result = op(ev);
    ev.stack.push(top);
    result
}

/// X Y -> X X Y
fn dupd(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.require("dupd", 2)?;
    under_top(ev, "dupd", dup)
}

/// X Y -> Y
fn popd(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.require("popd", 2)?;
    under_top(ev, "popd", pop)
}

/// X Y Z -> Y X Z
fn swapd(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.require("swapd", 3)?;
    under_top(ev, "swapd", swap)
}

/// X Y Z W -> Z X Y W
fn rollupd(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.require("rollupd", 4)?;
    under_top(ev, "rollupd", rollup)
}

/// X Y Z W -> Y Z X W
fn rolldownd(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.require("rolldownd", 4)?;
    under_top(ev, "rolldownd", rolldown)
}

/// X Y Z W -> Z Y X W
fn rotated(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.require("rotated", 4)?;
    under_top(ev, "rotated", rotate)
}

/// .. -> .. [..]  (snapshot, TOS first)
fn stack(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut items = ev.stack.snapshot();
    items.reverse();
    ev.stack.push(Value::List(items));
    Ok(())
}

/// [X Y ..] -> X Y ..  (replace the stack; the list is TOS-first)
fn unstack(ev: &mut Evaluator) -> Result<(), JoyError> {
    let list = ev.stack.pop("unstack")?;
    let items = match list {
        Value::List(items) | Value::Quotation(items) => items,
        other => return Err(JoyError::type_error("unstack", "list", other.type_name())),
    };
    ev.stack.clear();
    for item in items.into_iter().rev() {
        ev.stack.push(item);
    }
    Ok(())
}

fn newstack(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.clear();
    Ok(())
}

/// B T F -> T or F
fn choice(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("choice", 3)?;
    let f = vs.remove(0);
    let t = vs.remove(0);
    let b = vs.remove(0);
    ev.stack.push(if b.truthy() { t } else { f });
    Ok(())
}
