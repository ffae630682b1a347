//! Higher-order combinators.
//!
//! Quotation (i, x, dip...), conditional (ifte, branch, cond...), loop
//! (times, while, loop), aggregate (map, filter, split, step, fold,
//! some/all), arity and application (nullary..ternary, unary2..4,
//! app1..app4, cleave, construct, infra), recursion (linrec, tailrec,
//! binrec, primrec, genrec, condlinrec, condnestrec), and tree
//! (treestep, treerec, treegenrec) combinators.
//!
//! Every predicate probe runs under snapshot/restore: the stack is deep
//! copied before and reinstated after, so predicates cannot leak scratch
//! values. `linrec` and `tailrec` are iterative — the pending step count
//! lives in a counter, not on the host stack.

use std::collections::HashMap;

use joy_core::{JoyError, Value};

use super::{elements, expect_quotation, Evaluator, Primitive};

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("i", i_comb);
    table.insert("x", x_comb);
    table.insert("dip", dip);
    table.insert("dipd", dipd);
    table.insert("dipdd", dipdd);
    table.insert("keep", keep);

    table.insert("nullary", nullary);
    table.insert("unary", unary);
    table.insert("unary2", |ev| unary_n(ev, "unary2", 2));
    table.insert("unary3", |ev| unary_n(ev, "unary3", 3));
    table.insert("unary4", |ev| unary_n(ev, "unary4", 4));
    table.insert("binary", binary);
    table.insert("ternary", ternary);

    table.insert("app1", app1);
    table.insert("app11", app11);
    table.insert("app12", app12);
    table.insert("app2", |ev| unary_n(ev, "app2", 2));
    table.insert("app3", |ev| unary_n(ev, "app3", 3));
    table.insert("app4", |ev| unary_n(ev, "app4", 4));
    table.insert("cleave", cleave);
    table.insert("bi", bi);
    table.insert("tri", tri);
    table.insert("spread", spread);
    table.insert("construct", construct);
    table.insert("compose", compose);
    table.insert("infra", infra);

    table.insert("ifte", ifte);
    table.insert("branch", branch);
    table.insert("cond", cond);
    table.insert("case", case);
    table.insert("opcase", opcase);

    table.insert("times", times);
    table.insert("while", while_comb);
    table.insert("loop", loop_comb);

    table.insert("step", step);
    table.insert("each", step);
    table.insert("map", map);
    table.insert("filter", filter);
    table.insert("split", split);
    table.insert("fold", fold);
    table.insert("some", some);
    table.insert("any", some);
    table.insert("all", all);

    table.insert("primrec", primrec);
    table.insert("linrec", linrec);
    table.insert("tailrec", tailrec);
    table.insert("binrec", binrec);
    table.insert("genrec", genrec);
    table.insert("condlinrec", |ev| cond_rec_entry(ev, "condlinrec"));
    table.insert("condnestrec", |ev| cond_rec_entry(ev, "condnestrec"));

    table.insert("treestep", treestep);
    table.insert("treerec", treerec);
    table.insert("treegenrec", treegenrec);
}

/// View a value as a term sequence: quotations and lists give their
/// terms, anything else is a one-term sequence.
fn as_terms(value: &Value) -> Vec<Value> {
    match value {
        Value::Quotation(terms) | Value::List(terms) => terms.clone(),
        other => vec![other.clone()],
    }
}

/// Pop a quotation and the values under it, TOS-first after the quotation.
fn pop_quot_and(
    ev: &mut Evaluator,
    op: &str,
    n: usize,
) -> Result<(Vec<Value>, Vec<Value>), JoyError> {
    let mut vs = ev.stack.pop_n(op, n + 1)?;
    let quot = expect_quotation(vs.remove(0), op)?;
    Ok((quot, vs))
}

// ---------------------------------------------------------------------------
// Quotation combinators
// ---------------------------------------------------------------------------

/// [P] -> ...
fn i_comb(ev: &mut Evaluator) -> Result<(), JoyError> {
    let quot = expect_quotation(ev.stack.pop("i")?, "i")?;
    ev.execute_quotation(&quot)
}

/// [P] -> ... [P]  (execute without consuming)
fn x_comb(ev: &mut Evaluator) -> Result<(), JoyError> {
    let quot = expect_quotation(ev.stack.peek("x", 0)?.clone(), "x")?;
    ev.execute_quotation(&quot)
}

/// X [P] -> ... X
fn dip(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut saved) = pop_quot_and(ev, "dip", 1)?;
    let x = saved.remove(0);
    ev.execute_quotation(&quot)?;
    ev.stack.push(x);
    Ok(())
}

/// X Y [P] -> ... X Y
fn dipd(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut saved) = pop_quot_and(ev, "dipd", 2)?;
    let y = saved.remove(0);
    let x = saved.remove(0);
    ev.execute_quotation(&quot)?;
    ev.stack.push(x);
    ev.stack.push(y);
    Ok(())
}

/// X Y Z [P] -> ... X Y Z
fn dipdd(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut saved) = pop_quot_and(ev, "dipdd", 3)?;
    let z = saved.remove(0);
    let y = saved.remove(0);
    let x = saved.remove(0);
    ev.execute_quotation(&quot)?;
    ev.stack.push(x);
    ev.stack.push(y);
    ev.stack.push(z);
    Ok(())
}

/// X [P] -> ... X
fn keep(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut saved) = pop_quot_and(ev, "keep", 1)?;
    let x = saved.remove(0);
    ev.stack.push(x.clone());
    ev.execute_quotation(&quot)?;
    ev.stack.push(x);
    Ok(())
}

// ---------------------------------------------------------------------------
// Arity combinators
// ---------------------------------------------------------------------------

/// Run `quot` with `args` (bottom-first) pushed onto a saved stack, keep
/// exactly one result, reinstate the saved stack.
fn apply_isolated(
    ev: &mut Evaluator,
    quot: &[Value],
    args: &[Value],
) -> Result<Value, JoyError> {
    let saved = ev.stack.snapshot();
    for arg in args {
        ev.stack.push(arg.clone());
    }
    ev.execute_quotation(quot)?;
    let result = ev.stack.pop("apply")?;
    ev.stack.restore(saved);
    Ok(result)
}

/// [P] -> R
fn nullary(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, _) = pop_quot_and(ev, "nullary", 0)?;
    let result = apply_isolated(ev, &quot, &[])?;
    ev.stack.push(result);
    Ok(())
}

/// X [P] -> R
fn unary(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "unary", 1)?;
    let x = args.remove(0);
    let result = apply_isolated(ev, &quot, &[x])?;
    ev.stack.push(result);
    Ok(())
}

/// X1 .. Xn [P] -> R1 .. Rn, P applied to each argument independently.
fn unary_n(ev: &mut Evaluator, op: &str, n: usize) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, op, n)?;
    args.reverse(); // bottom-first
    let mut results = Vec::with_capacity(n);
    for arg in args {
        results.push(apply_isolated(ev, &quot, &[arg])?);
    }
    for result in results {
        ev.stack.push(result);
    }
    Ok(())
}

/// X Y [P] -> R
fn binary(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "binary", 2)?;
    let y = args.remove(0);
    let x = args.remove(0);
    let result = apply_isolated(ev, &quot, &[x, y])?;
    ev.stack.push(result);
    Ok(())
}

/// X Y Z [P] -> R
fn ternary(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "ternary", 3)?;
    let z = args.remove(0);
    let y = args.remove(0);
    let x = args.remove(0);
    let result = apply_isolated(ev, &quot, &[x, y, z])?;
    ev.stack.push(result);
    Ok(())
}

// ---------------------------------------------------------------------------
// Application combinators
// ---------------------------------------------------------------------------

/// X [P] -> ...  (P runs with X back on top; no isolation)
fn app1(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "app1", 1)?;
    let x = args.remove(0);
    ev.stack.push(x);
    ev.execute_quotation(&quot)
}

/// X Y [P] -> ...
fn app11(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "app11", 2)?;
    let y = args.remove(0);
    let x = args.remove(0);
    ev.stack.push(x);
    ev.stack.push(y);
    ev.execute_quotation(&quot)
}

/// X Y1 Y2 [P] -> R1 R2, P applied to (X, Y1) and to (X, Y2).
fn app12(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "app12", 3)?;
    let y2 = args.remove(0);
    let y1 = args.remove(0);
    let x = args.remove(0);
    let r1 = apply_isolated(ev, &quot, &[x.clone(), y1])?;
    let r2 = apply_isolated(ev, &quot, &[x, y2])?;
    ev.stack.push(r1);
    ev.stack.push(r2);
    Ok(())
}

/// X [P1] [P2] -> R1 R2
fn cleave(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("cleave", 3)?;
    let p2 = expect_quotation(vs.remove(0), "cleave")?;
    let p1 = expect_quotation(vs.remove(0), "cleave")?;
    let x = vs.remove(0);
    let r1 = apply_isolated(ev, &p1, std::slice::from_ref(&x))?;
    let r2 = apply_isolated(ev, &p2, std::slice::from_ref(&x))?;
    ev.stack.push(r1);
    ev.stack.push(r2);
    Ok(())
}

/// X [P] [Q] -> ..., P then Q each run with X pushed back (no isolation).
fn bi(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("bi", 3)?;
    let q = expect_quotation(vs.remove(0), "bi")?;
    let p = expect_quotation(vs.remove(0), "bi")?;
    let x = vs.remove(0);
    ev.stack.push(x.clone());
    ev.execute_quotation(&p)?;
    ev.stack.push(x);
    ev.execute_quotation(&q)
}

/// X [P] [Q] [R] -> ..., like `bi` with three quotations.
fn tri(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("tri", 4)?;
    let r = expect_quotation(vs.remove(0), "tri")?;
    let q = expect_quotation(vs.remove(0), "tri")?;
    let p = expect_quotation(vs.remove(0), "tri")?;
    let x = vs.remove(0);
    ev.stack.push(x.clone());
    ev.execute_quotation(&p)?;
    ev.stack.push(x.clone());
    ev.execute_quotation(&q)?;
    ev.stack.push(x);
    ev.execute_quotation(&r)
}

/// X Y .. [[P1] [P2] ..] -> ..., Pi applied to the i-th value.
fn spread(ev: &mut Evaluator) -> Result<(), JoyError> {
    let quots = ev.stack.pop("spread")?;
    let quot_list = elements(&quots, "spread")?;
    if quot_list.is_empty() {
        return Ok(());
    }
    let mut values = ev.stack.pop_n("spread", quot_list.len())?;
    values.reverse(); // bottom-first
    for (value, quot) in values.into_iter().zip(quot_list) {
        let quot = expect_quotation(quot, "spread")?;
        ev.stack.push(value);
        ev.execute_quotation(&quot)?;
    }
    Ok(())
}

/// [P] [[P1] [P2] ..] -> R1 R2 ..
///
/// P runs once to set up a shared context; each Pi then runs on a copy of
/// that context and contributes one result to the original stack.
fn construct(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("construct", 2)?;
    let quots = elements(&vs.remove(0), "construct")?;
    let p = expect_quotation(vs.remove(0), "construct")?;

    let mut original = ev.stack.snapshot();
    ev.execute_quotation(&p)?;
    let context = ev.stack.snapshot();

    for quot in quots {
        let quot = expect_quotation(quot, "construct")?;
        ev.stack.restore(context.clone());
        ev.execute_quotation(&quot)?;
        original.push(ev.stack.pop("construct")?);
    }
    ev.stack.restore(original);
    Ok(())
}

/// [P] [Q] -> [P Q]
fn compose(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("compose", 2)?;
    let q = expect_quotation(vs.remove(0), "compose")?;
    let mut p = expect_quotation(vs.remove(0), "compose")?;
    p.extend(q);
    ev.stack.push(Value::Quotation(p));
    Ok(())
}

/// L [P] -> L'  (run P with L as the whole stack, TOS-first)
fn infra(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "infra", 1)?;
    let list = args.remove(0);
    let items = elements(&list, "infra")?;

    let saved = ev.stack.snapshot();
    let mut upside_down = items;
    upside_down.reverse(); // list is TOS-first, the stack is bottom-first
    ev.stack.restore(upside_down);
    let result = ev.execute_quotation(&quot);
    let mut final_items = ev.stack.snapshot();
    ev.stack.restore(saved);
    result?;
    final_items.reverse();
    ev.stack.push(Value::List(final_items));
    Ok(())
}

// ---------------------------------------------------------------------------
// Conditional combinators
// ---------------------------------------------------------------------------

/// [C] [T] [F] -> ...
fn ifte(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("ifte", 3)?;
    let f = expect_quotation(vs.remove(0), "ifte")?;
    let t = expect_quotation(vs.remove(0), "ifte")?;
    let c = expect_quotation(vs.remove(0), "ifte")?;
    if ev.probe(&c)? {
        ev.execute_quotation(&t)
    } else {
        ev.execute_quotation(&f)
    }
}

/// B [T] [F] -> ...  (B is a prior-computed value, no snapshot needed)
fn branch(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("branch", 3)?;
    let f = expect_quotation(vs.remove(0), "branch")?;
    let t = expect_quotation(vs.remove(0), "branch")?;
    let b = vs.remove(0);
    if b.truthy() {
        ev.execute_quotation(&t)
    } else {
        ev.execute_quotation(&f)
    }
}

/// Execute a clause body element: quotations run, other terms dispatch.
fn execute_part(ev: &mut Evaluator, part: &Value) -> Result<(), JoyError> {
    match part {
        Value::Quotation(terms) | Value::List(terms) => ev.execute_quotation(terms),
        other => ev.execute_term(other),
    }
}

/// [[P1] T1..] [[P2] T2..] .. [Dflt..] on TOS as a clause list.
fn cond(ev: &mut Evaluator) -> Result<(), JoyError> {
    let clauses = elements(&ev.stack.pop("cond")?, "cond")?;
    if clauses.is_empty() {
        return Ok(());
    }
    let last = clauses.len() - 1;
    for (idx, clause) in clauses.iter().enumerate() {
        let terms = as_terms(clause);
        if terms.is_empty() {
            continue;
        }
        if idx == last {
            // Default clause: the whole clause is the body.
            for part in &terms {
                execute_part(ev, part)?;
            }
            return Ok(());
        }
        let predicate = as_terms(&terms[0]);
        if ev.probe(&predicate)? {
            for part in &terms[1..] {
                execute_part(ev, part)?;
            }
            return Ok(());
        }
    }
    Ok(())
}

/// X [[V1 B1..] [V2 B2..] .. [D..]] -> ...
///
/// Matched clauses consume X; the default clause keeps X on the stack and
/// runs in full.
fn case(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("case", 2)?;
    let clauses = elements(&vs.remove(0), "case")?;
    let x = vs.remove(0);
    if clauses.is_empty() {
        return Ok(());
    }
    let last = clauses.len() - 1;
    for (idx, clause) in clauses.iter().enumerate() {
        let terms = as_terms(clause);
        if idx == last {
            ev.stack.push(x);
            for part in &terms {
                execute_part(ev, part)?;
            }
            return Ok(());
        }
        if terms.len() < 2 {
            continue;
        }
        if terms[0].joy_eq(&x) {
            for part in &terms[1..] {
                execute_part(ev, part)?;
            }
            return Ok(());
        }
    }
    Ok(())
}

/// X [..[Pattern Body..]..] -> [Body..], selecting on the kind of X.
fn opcase(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("opcase", 2)?;
    let clauses = elements(&vs.remove(0), "opcase")?;
    let x = vs.remove(0);
    if clauses.is_empty() {
        ev.stack.push(Value::List(vec![]));
        return Ok(());
    }
    let last = clauses.len() - 1;
    for (idx, clause) in clauses.iter().enumerate() {
        let terms = as_terms(clause);
        if idx == last {
            ev.stack.push(Value::List(terms));
            return Ok(());
        }
        if terms.is_empty() {
            continue;
        }
        let pattern = &terms[0];
        let matched = match (pattern, &x) {
            (Value::Symbol(p), Value::Symbol(q)) => p == q,
            _ => pattern.type_name() == x.type_name(),
        };
        if matched {
            ev.stack.push(Value::List(terms[1..].to_vec()));
            return Ok(());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loop combinators
// ---------------------------------------------------------------------------

/// N [P] -> ...
fn times(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "times", 1)?;
    let n = match args.remove(0) {
        Value::Int(n) => n,
        other => return Err(JoyError::type_error("times", "integer", other.type_name())),
    };
    for _ in 0..n.max(0) {
        ev.execute_quotation(&quot)?;
    }
    Ok(())
}

/// [C] [B] -> ...
fn while_comb(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("while", 2)?;
    let body = expect_quotation(vs.remove(0), "while")?;
    let cond = expect_quotation(vs.remove(0), "while")?;
    while ev.probe(&cond)? {
        ev.execute_quotation(&body)?;
    }
    Ok(())
}

/// [B] -> ..., repeating B while it leaves truth on top (consumed).
fn loop_comb(ev: &mut Evaluator) -> Result<(), JoyError> {
    let quot = expect_quotation(ev.stack.pop("loop")?, "loop")?;
    loop {
        ev.execute_quotation(&quot)?;
        if !ev.stack.pop("loop")?.truthy() {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Aggregate combinators
// ---------------------------------------------------------------------------

/// A [P] -> ..., P run for effect on each element, left to right.
fn step(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "step", 1)?;
    let items = elements(&args.remove(0), "step")?;
    for item in items {
        ev.stack.push(item);
        ev.execute_quotation(&quot)?;
    }
    Ok(())
}

/// A [P] -> A', collecting P's result for each element; the outer kind is
/// preserved where the results allow it.
fn map(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "map", 1)?;
    let agg = args.remove(0);
    let items = elements(&agg, "map")?;
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(apply_isolated(ev, &quot, &[item])?);
    }
    ev.stack.push(Value::rebuild_like(results, &agg));
    Ok(())
}

/// A [P] -> A', keeping elements whose P result is truthy.
fn filter(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "filter", 1)?;
    let agg = args.remove(0);
    let items = elements(&agg, "filter")?;
    let mut kept = Vec::new();
    for item in items {
        if apply_isolated(ev, &quot, std::slice::from_ref(&item))?.truthy() {
            kept.push(item);
        }
    }
    ev.stack.push(Value::rebuild_like(kept, &agg));
    Ok(())
}

/// A [P] -> A1 A2, keepers then rejects, both of the original kind.
fn split(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "split", 1)?;
    let agg = args.remove(0);
    let items = elements(&agg, "split")?;
    let mut keepers = Vec::new();
    let mut rejects = Vec::new();
    for item in items {
        if apply_isolated(ev, &quot, std::slice::from_ref(&item))?.truthy() {
            keepers.push(item);
        } else {
            rejects.push(item);
        }
    }
    ev.stack.push(Value::rebuild_like(keepers, &agg));
    ev.stack.push(Value::rebuild_like(rejects, &agg));
    Ok(())
}

/// A I [P] -> R. Push I; for each element push it and run P.
fn fold(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("fold", 3)?;
    let quot = expect_quotation(vs.remove(0), "fold")?;
    let init = vs.remove(0);
    let items = elements(&vs.remove(0), "fold")?;
    ev.stack.push(init);
    for item in items {
        ev.stack.push(item);
        ev.execute_quotation(&quot)?;
    }
    Ok(())
}

/// A [P] -> B, short-circuit existential. Empty aggregate gives false.
fn some(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "some", 1)?;
    let items = elements(&args.remove(0), "some")?;
    for item in items {
        if apply_isolated(ev, &quot, &[item])?.truthy() {
            ev.stack.push(Value::Bool(true));
            return Ok(());
        }
    }
    ev.stack.push(Value::Bool(false));
    Ok(())
}

/// A [P] -> B, short-circuit universal. Empty aggregate gives true.
fn all(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "all", 1)?;
    let items = elements(&args.remove(0), "all")?;
    for item in items {
        if !apply_isolated(ev, &quot, &[item])?.truthy() {
            ev.stack.push(Value::Bool(false));
            return Ok(());
        }
    }
    ev.stack.push(Value::Bool(true));
    Ok(())
}

// ---------------------------------------------------------------------------
// Recursion combinators
// ---------------------------------------------------------------------------

/// The members of X for primitive recursion: 1..n for an integer, the
/// elements for an aggregate.
fn primrec_members(x: &Value) -> Result<Vec<Value>, JoyError> {
    match x {
        Value::Int(n) => Ok((1..=*n).map(Value::Int).collect()),
        other => elements(other, "primrec"),
    }
}

/// X [I] [C] -> R. Run I to seed, then for each member push it and run C.
fn primrec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("primrec", 3)?;
    let combine = expect_quotation(vs.remove(0), "primrec")?;
    let init = expect_quotation(vs.remove(0), "primrec")?;
    let members = primrec_members(&vs.remove(0))?;
    ev.execute_quotation(&init)?;
    for member in members {
        ev.stack.push(member);
        ev.execute_quotation(&combine)?;
    }
    Ok(())
}

/// [P] [T] [R1] [R2] -> ...
///
/// Iterative: run R1 until P holds, run T, then unwind the counted
/// pending R2 invocations. Space on the host stack is O(1).
fn linrec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("linrec", 4)?;
    let r2 = expect_quotation(vs.remove(0), "linrec")?;
    let r1 = expect_quotation(vs.remove(0), "linrec")?;
    let t = expect_quotation(vs.remove(0), "linrec")?;
    let p = expect_quotation(vs.remove(0), "linrec")?;

    let mut pending: u64 = 0;
    loop {
        if ev.probe(&p)? {
            ev.execute_quotation(&t)?;
            break;
        }
        ev.execute_quotation(&r1)?;
        pending += 1;
    }
    for _ in 0..pending {
        ev.execute_quotation(&r2)?;
    }
    Ok(())
}

/// [P] [T] [R1] -> ...  (linrec with an empty R2: a pure loop)
fn tailrec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("tailrec", 3)?;
    let r1 = expect_quotation(vs.remove(0), "tailrec")?;
    let t = expect_quotation(vs.remove(0), "tailrec")?;
    let p = expect_quotation(vs.remove(0), "tailrec")?;

    loop {
        if ev.probe(&p)? {
            return ev.execute_quotation(&t);
        }
        ev.execute_quotation(&r1)?;
    }
}

/// [P] [T] [R1] [R2] -> ...  (divide and conquer)
fn binrec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("binrec", 4)?;
    let r2 = expect_quotation(vs.remove(0), "binrec")?;
    let r1 = expect_quotation(vs.remove(0), "binrec")?;
    let t = expect_quotation(vs.remove(0), "binrec")?;
    let p = expect_quotation(vs.remove(0), "binrec")?;
    binrec_aux(ev, &p, &t, &r1, &r2)
}

fn binrec_aux(
    ev: &mut Evaluator,
    p: &[Value],
    t: &[Value],
    r1: &[Value],
    r2: &[Value],
) -> Result<(), JoyError> {
    if ev.probe(p)? {
        return ev.execute_quotation(t);
    }
    ev.execute_quotation(r1)?;
    let second = ev.stack.pop("binrec")?;
    binrec_aux(ev, p, t, r1, r2)?;
    let first_result = ev.stack.pop("binrec")?;
    ev.stack.push(second);
    binrec_aux(ev, p, t, r1, r2)?;
    ev.stack.push(first_result);
    ev.execute_quotation(r2)
}

/// [P] [T] [R1] [R2] -> ...
///
/// On the recursive arm, R2 runs with the reified program
/// `[[P] [T] [R1] [R2] genrec]` on top, so it chooses when to recurse.
fn genrec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("genrec", 4)?;
    let r2 = expect_quotation(vs.remove(0), "genrec")?;
    let r1 = expect_quotation(vs.remove(0), "genrec")?;
    let t = expect_quotation(vs.remove(0), "genrec")?;
    let p = expect_quotation(vs.remove(0), "genrec")?;

    if ev.probe(&p)? {
        return ev.execute_quotation(&t);
    }
    ev.execute_quotation(&r1)?;
    let reified = Value::Quotation(vec![
        Value::Quotation(p),
        Value::Quotation(t),
        Value::Quotation(r1.clone()),
        Value::Quotation(r2.clone()),
        Value::Symbol("genrec".into()),
    ]);
    ev.stack.push(reified);
    ev.execute_quotation(&r2)
}

/// Shared implementation of `condlinrec` and `condnestrec`.
///
/// Clause list: non-final clauses are `[[B] R1 R2 ..]`, the final clause
/// is the default `[R1 R2 ..]`. The first clause whose B holds (probed
/// under snapshot/restore) is chosen, its B dropped; then its first part
/// runs, and each remaining part runs after a recursion on the *same*
/// clause list, which never changes across frames.
fn cond_rec_entry(ev: &mut Evaluator, op: &'static str) -> Result<(), JoyError> {
    let clauses = elements(&ev.stack.pop(op)?, op)?;
    if clauses.is_empty() {
        return Ok(());
    }
    cond_rec(ev, &clauses)
}

fn cond_rec(ev: &mut Evaluator, clauses: &[Value]) -> Result<(), JoyError> {
    let last = clauses.len() - 1;
    let mut chosen = last;
    let mut matched = false;
    for (idx, clause) in clauses[..last].iter().enumerate() {
        let terms = as_terms(clause);
        if terms.is_empty() {
            continue;
        }
        if ev.probe(&as_terms(&terms[0]))? {
            chosen = idx;
            matched = true;
            break;
        }
    }

    let terms = as_terms(&clauses[chosen]);
    let parts = if matched { &terms[1..] } else { &terms[..] };
    if parts.is_empty() {
        return Ok(());
    }
    execute_part(ev, &parts[0])?;
    for part in &parts[1..] {
        cond_rec(ev, clauses)?;
        execute_part(ev, part)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tree combinators
// ---------------------------------------------------------------------------

/// T [P] -> ..., P applied to every leaf of the tree.
fn treestep(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (quot, mut args) = pop_quot_and(ev, "treestep", 1)?;
    let tree = args.remove(0);
    treestep_aux(ev, &tree, &quot)
}

fn treestep_aux(ev: &mut Evaluator, node: &Value, quot: &[Value]) -> Result<(), JoyError> {
    match node {
        Value::List(items) | Value::Quotation(items) => {
            for item in items {
                treestep_aux(ev, item, quot)?;
            }
            Ok(())
        }
        leaf => {
            ev.stack.push(leaf.clone());
            ev.execute_quotation(quot)
        }
    }
}

/// T [O] [C] -> ...
///
/// Leaves run O; at a branch the node and the reified `[[O] [C] treerec]`
/// are pushed and C runs.
fn treerec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("treerec", 3)?;
    let c = expect_quotation(vs.remove(0), "treerec")?;
    let o = expect_quotation(vs.remove(0), "treerec")?;
    let tree = vs.remove(0);

    if matches!(tree, Value::List(_) | Value::Quotation(_)) {
        ev.stack.push(tree);
        let reified = Value::Quotation(vec![
            Value::Quotation(o),
            Value::Quotation(c.clone()),
            Value::Symbol("treerec".into()),
        ]);
        ev.stack.push(reified);
        ev.execute_quotation(&c)
    } else {
        ev.stack.push(tree);
        ev.execute_quotation(&o)
    }
}

/// T [O1] [O2] [C] -> ...
///
/// Leaves run O1; at a branch O2 runs first, then the reified
/// `[[O1] [O2] [C] treegenrec]` is pushed and C runs.
fn treegenrec(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("treegenrec", 4)?;
    let c = expect_quotation(vs.remove(0), "treegenrec")?;
    let o2 = expect_quotation(vs.remove(0), "treegenrec")?;
    let o1 = expect_quotation(vs.remove(0), "treegenrec")?;
    let tree = vs.remove(0);

    if matches!(tree, Value::List(_) | Value::Quotation(_)) {
        ev.stack.push(tree);
        ev.execute_quotation(&o2)?;
        let reified = Value::Quotation(vec![
            Value::Quotation(o1),
            Value::Quotation(o2.clone()),
            Value::Quotation(c.clone()),
            Value::Symbol("treegenrec".into()),
        ]);
        ev.stack.push(reified);
        ev.execute_quotation(&c)
    } else {
        ev.stack.push(tree);
        ev.execute_quotation(&o1)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Evaluator, SharedOutput};
    use joy_core::Value;

    fn run(source: &str) -> Vec<Value> {
        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run(source).unwrap();
        ev.stack.items().to_vec()
    }

    #[test]
    fn test_i_executes_terms_in_sequence() {
        assert_eq!(run("[1 2 +] i"), vec![Value::Int(3)]);
        // A list works just as well as a quotation.
        assert_eq!(run("[1 2 +] [] concat i"), vec![Value::Int(3)]);
    }

    #[test]
    fn test_x_keeps_the_quotation() {
        assert_eq!(
            run("[7] x"),
            vec![Value::Quotation(vec![Value::Int(7)]), Value::Int(7)]
        );
    }

    #[test]
    fn test_dip_family() {
        assert_eq!(
            run("1 2 9 [+] dip"),
            vec![Value::Int(3), Value::Int(9)]
        );
        assert_eq!(
            run("1 2 8 9 [10 *] dipd"),
            vec![Value::Int(10), Value::Int(8), Value::Int(9)]
        );
        assert_eq!(
            run("1 7 8 9 [10 *] dipdd"),
            vec![Value::Int(10), Value::Int(7), Value::Int(8), Value::Int(9)]
        );
    }

    #[test]
    fn test_keep() {
        assert_eq!(run("5 [1 +] keep"), vec![Value::Int(6), Value::Int(5)]);
    }

    #[test]
    fn test_arity_combinators_isolate_scratch() {
        // nullary sees the stack but restores it fully.
        assert_eq!(
            run("1 2 [+] nullary"),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(run("5 [dup *] unary"), vec![Value::Int(25)]);
        assert_eq!(run("2 3 [+] binary"), vec![Value::Int(5)]);
        assert_eq!(run("1 2 3 [+ +] ternary"), vec![Value::Int(6)]);
    }

    #[test]
    fn test_unary_n_applies_independently() {
        assert_eq!(
            run("2 3 [dup *] unary2"),
            vec![Value::Int(4), Value::Int(9)]
        );
        assert_eq!(
            run("1 2 3 [10 *] unary3"),
            vec![Value::Int(10), Value::Int(20), Value::Int(30)]
        );
        assert_eq!(
            run("1 2 3 4 [neg] unary4"),
            vec![Value::Int(-1), Value::Int(-2), Value::Int(-3), Value::Int(-4)]
        );
    }

    #[test]
    fn test_app_family() {
        assert_eq!(run("5 [dup *] app1"), vec![Value::Int(25)]);
        assert_eq!(run("2 3 [+] app11"), vec![Value::Int(5)]);
        assert_eq!(
            run("10 1 2 [+] app12"),
            vec![Value::Int(11), Value::Int(12)]
        );
        assert_eq!(run("2 3 [dup *] app2"), vec![Value::Int(4), Value::Int(9)]);
    }

    #[test]
    fn test_cleave_and_tri() {
        assert_eq!(
            run("5 [1 +] [2 *] cleave"),
            vec![Value::Int(6), Value::Int(10)]
        );
        assert_eq!(
            run("5 [1 +] [2 *] [neg] tri"),
            vec![Value::Int(6), Value::Int(10), Value::Int(-5)]
        );
    }

    #[test]
    fn test_spread() {
        assert_eq!(
            run("1 2 [[10 +] [20 +]] spread"),
            vec![Value::Int(11), Value::Int(22)]
        );
    }

    #[test]
    fn test_construct() {
        // P pushes a shared 10; each branch consumes a copy of that context.
        assert_eq!(
            run("[10] [[1 +] [2 +]] construct"),
            vec![Value::Int(11), Value::Int(12)]
        );
    }

    #[test]
    fn test_compose() {
        assert_eq!(run("[1] [2 +] compose i"), vec![Value::Int(3)]);
    }

    #[test]
    fn test_infra() {
        // [1 2 3] is TOS-first: the stack under Q is 3 2 1 with 1 on top.
        assert_eq!(
            run("[1 2 3] [+] infra"),
            vec![Value::List(vec![Value::Int(3), Value::Int(3)])]
        );
    }

    #[test]
    fn test_ifte_snapshot_discipline() {
        // The predicate's scratch values leak nowhere.
        assert_eq!(
            run("10 [100 pop dup 0 >] [1 +] [1 -] ifte"),
            vec![Value::Int(11)]
        );
        assert_eq!(run("0 [0 >] [1] [2] ifte"), vec![Value::Int(0), Value::Int(2)]);
    }

    #[test]
    fn test_ifte_branch_agreement() {
        // [C] [T] [F] ifte == C [T] [F] branch for a pure C.
        assert_eq!(run("5 [3 >] [1] [2] ifte"), run("5 dup 3 > [1] [2] branch"));
    }

    #[test]
    fn test_branch() {
        assert_eq!(run("true [1] [2] branch"), vec![Value::Int(1)]);
        assert_eq!(run("false [1] [2] branch"), vec![Value::Int(2)]);
    }

    #[test]
    fn test_cond() {
        let src = "2 [ [[0 =] \"zero\"] [[1 =] \"one\"] [\"many\"] ] cond";
        assert_eq!(run(src), vec![Value::Int(2), Value::String("many".into())]);
        let src = "1 [ [[0 =] \"zero\"] [[1 =] \"one\"] [\"many\"] ] cond";
        assert_eq!(run(src), vec![Value::Int(1), Value::String("one".into())]);
    }

    #[test]
    fn test_case() {
        let src = "2 [ [1 \"one\"] [2 \"two\"] [\"default\"] ] case";
        assert_eq!(run(src), vec![Value::String("two".into())]);
        let src = "9 [ [1 \"one\"] [\"default\"] ] case";
        assert_eq!(run(src), vec![Value::Int(9), Value::String("default".into())]);
    }

    #[test]
    fn test_opcase() {
        let src = "5 [ [0 \"int\"] ['a \"char\"] [\"other\"] ] opcase";
        assert_eq!(
            run(src),
            vec![Value::List(vec![Value::String("int".into())])]
        );
    }

    #[test]
    fn test_times() {
        assert_eq!(run("0 5 [1 +] times"), vec![Value::Int(5)]);
        assert_eq!(run("0 -3 [1 +] times"), vec![Value::Int(0)]);
    }

    #[test]
    fn test_while() {
        assert_eq!(run("1 [dup 100 <] [2 *] while"), vec![Value::Int(128)]);
    }

    #[test]
    fn test_loop() {
        assert_eq!(
            run("1 [2 * dup 100 <] loop"),
            vec![Value::Int(128)]
        );
    }

    #[test]
    fn test_step_left_to_right() {
        assert_eq!(run("0 [1 2 3] [+] step"), vec![Value::Int(6)]);
        assert_eq!(
            run("[] \"ab\" [swons] step"),
            vec![Value::List(vec![Value::Char('b'), Value::Char('a')])]
        );
    }

    #[test]
    fn test_map_kind_preservation() {
        assert_eq!(
            run("[1 2 3] [dup *] map"),
            vec![Value::List(vec![Value::Int(1), Value::Int(4), Value::Int(9)])]
        );
        assert_eq!(
            run("\"abc\" [succ chr] map"),
            vec![Value::String("bcd".into())]
        );
        assert_eq!(run("{1 2} [1 +] map"), vec![Value::Set(0b1100)]);
    }

    #[test]
    fn test_filter_type_preserving() {
        assert_eq!(run("\"test\" ['t <] filter"), vec![Value::String("es".into())]);
        assert_eq!(
            run("[1 2 3 4] [2 rem 0 =] filter"),
            vec![Value::List(vec![Value::Int(2), Value::Int(4)])]
        );
        assert_eq!(run("{1 2 3} [1 >] filter"), vec![Value::Set(0b1100)]);
    }

    #[test]
    fn test_split() {
        assert_eq!(
            run("[1 2 3 4] [2 >] split"),
            vec![
                Value::List(vec![Value::Int(3), Value::Int(4)]),
                Value::List(vec![Value::Int(1), Value::Int(2)]),
            ]
        );
    }

    #[test]
    fn test_fold() {
        assert_eq!(run("[1 2 3 4] 0 [+] fold"), vec![Value::Int(10)]);
        assert_eq!(run("[] 7 [+] fold"), vec![Value::Int(7)]);
    }

    #[test]
    fn test_some_and_all() {
        assert_eq!(run("[1 2 3] [2 =] some"), vec![Value::Bool(true)]);
        assert_eq!(run("[1 3] [2 =] some"), vec![Value::Bool(false)]);
        assert_eq!(run("[1 2 3] [0 >] all"), vec![Value::Bool(true)]);
        assert_eq!(run("[1 -2 3] [0 >] all"), vec![Value::Bool(false)]);
        // Boundary: empty aggregate.
        assert_eq!(run("[] [0 >] some"), vec![Value::Bool(false)]);
        assert_eq!(run("[] [0 >] all"), vec![Value::Bool(true)]);
    }

    #[test]
    fn test_primrec_factorial() {
        assert_eq!(run("5 [1] [*] primrec"), vec![Value::Int(120)]);
        assert_eq!(run("0 [1] [*] primrec"), vec![Value::Int(1)]);
        assert_eq!(run("[1 2 3] [0] [+] primrec"), vec![Value::Int(6)]);
    }

    #[test]
    fn test_linrec_factorial() {
        assert_eq!(
            run("5 [null] [succ] [dup pred] [*] linrec"),
            vec![Value::Int(120)]
        );
    }

    #[test]
    fn test_linrec_is_iterative() {
        // Deep enough to blow a recursive implementation's host stack.
        assert_eq!(
            run("0 100000 [null] [pop] [pred] [] linrec"),
            vec![Value::Int(0)]
        );
    }

    #[test]
    fn test_tailrec_countdown() {
        assert_eq!(
            run("100000 [null] [] [pred] tailrec"),
            vec![Value::Int(0)]
        );
    }

    #[test]
    fn test_binrec_fibonacci() {
        let fib = "10 [small] [] [pred dup pred] [+] binrec";
        assert_eq!(run(fib), vec![Value::Int(55)]);
    }

    #[test]
    fn test_binrec_quicksort() {
        let qsort = "[6 1 4 3] [small] [] [uncons [<=] split] [enconcat] binrec";
        assert_eq!(
            run(qsort),
            vec![Value::List(vec![
                Value::Int(1),
                Value::Int(3),
                Value::Int(4),
                Value::Int(6)
            ])]
        );
    }

    #[test]
    fn test_genrec_factorial() {
        let fact = "5 [null] [succ] [dup pred] [i *] genrec";
        assert_eq!(run(fact), vec![Value::Int(120)]);
    }

    #[test]
    fn test_genrec_can_decline_to_recurse() {
        // R2 drops the reified quotation: no recursion happens.
        assert_eq!(
            run("9 [null] [] [id] [pop pop 1] genrec"),
            vec![Value::Int(1)]
        );
    }

    #[test]
    fn test_condlinrec_sum() {
        let sum = "[1 2 3 4] [ [[null] [pop 0]] [[uncons] [+]] ] condlinrec";
        assert_eq!(run(sum), vec![Value::Int(10)]);
    }

    #[test]
    fn test_condnestrec_factorial() {
        let fact = "5 [ [[null] [pop 1]] [[dup pred] [*]] ] condnestrec";
        assert_eq!(run(fact), vec![Value::Int(120)]);
    }

    #[test]
    fn test_treestep_sums_leaves() {
        assert_eq!(
            run("0 [1 [2 [3 4]] 5] [+] treestep"),
            vec![Value::Int(15)]
        );
    }

    #[test]
    fn test_treerec_sums_leaves() {
        // Leaves add into the accumulator; branches step over children
        // with the reified recursion.
        assert_eq!(
            run("0 [1 [2 3] 4] [+] [step] treerec"),
            vec![Value::Int(10)]
        );
    }

    #[test]
    fn test_treegenrec_flattens() {
        assert_eq!(
            run("[1 [2 3] 4] [] [] [step] treegenrec"),
            vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
    }
}
