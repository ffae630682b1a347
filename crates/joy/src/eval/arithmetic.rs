//! Arithmetic and math primitives.
//!
//! Integer arithmetic wraps (two's complement) so the evaluator agrees
//! with the compiled runtime; INTEGER promotes to FLOAT whenever either
//! operand is a FLOAT. Division and remainder follow C semantics
//! (truncation toward zero) and report a domain error on zero divisors.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};

use joy_core::{JoyError, Value};

use super::{numeric, numeric_binary, Evaluator, Num, Primitive};

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("+", add);
    table.insert("-", sub);
    table.insert("*", mul);
    table.insert("/", div);
    table.insert("rem", rem);
    table.insert("div", divmod);
    table.insert("abs", abs);
    table.insert("neg", neg);
    table.insert("sign", sign);
    table.insert("succ", succ);
    table.insert("pred", pred);
    table.insert("max", max);
    table.insert("min", min);

    table.insert("sin", |ev| unary_math(ev, "sin", f64::sin));
    table.insert("cos", |ev| unary_math(ev, "cos", f64::cos));
    table.insert("tan", |ev| unary_math(ev, "tan", f64::tan));
    table.insert("asin", |ev| unary_math(ev, "asin", f64::asin));
    table.insert("acos", |ev| unary_math(ev, "acos", f64::acos));
    table.insert("atan", |ev| unary_math(ev, "atan", f64::atan));
    table.insert("sinh", |ev| unary_math(ev, "sinh", f64::sinh));
    table.insert("cosh", |ev| unary_math(ev, "cosh", f64::cosh));
    table.insert("tanh", |ev| unary_math(ev, "tanh", f64::tanh));
    table.insert("exp", |ev| unary_math(ev, "exp", f64::exp));
    table.insert("log", |ev| unary_math(ev, "log", f64::ln));
    table.insert("log10", |ev| unary_math(ev, "log10", f64::log10));
    table.insert("sqrt", |ev| unary_math(ev, "sqrt", f64::sqrt));
    table.insert("floor", |ev| unary_math(ev, "floor", f64::floor));
    table.insert("ceil", |ev| unary_math(ev, "ceil", f64::ceil));
    table.insert("trunc", |ev| unary_math(ev, "trunc", f64::trunc));
    table.insert("round", |ev| unary_math(ev, "round", f64::round));
    table.insert("atan2", atan2);
    table.insert("pow", pow);
    table.insert("frexp", frexp_word);
    table.insert("ldexp", ldexp_word);
    table.insert("modf", modf_word);

    table.insert("rand", rand_word);
    table.insert("srand", srand_word);
}

fn binary(ev: &mut Evaluator, op: &str) -> Result<(Value, Value), JoyError> {
    let mut vs = ev.stack.pop_n(op, 2)?;
    let b = vs.remove(0);
    let a = vs.remove(0);
    Ok((a, b))
}

fn add(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "+")?;
    let result = numeric_binary("+", &a, &b, i64::wrapping_add, |x, y| x + y)?;
    ev.stack.push(result);
    Ok(())
}

fn sub(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "-")?;
    let result = numeric_binary("-", &a, &b, i64::wrapping_sub, |x, y| x - y)?;
    ev.stack.push(result);
    Ok(())
}

fn mul(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "*")?;
    let result = numeric_binary("*", &a, &b, i64::wrapping_mul, |x, y| x * y)?;
    ev.stack.push(result);
    Ok(())
}

/// True division for floats, truncating division for two integers.
fn div(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "/")?;
    let result = match (numeric(&a, "/")?, numeric(&b, "/")?) {
        (Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(JoyError::domain("/", "division by zero"));
            }
            Value::Int(x.wrapping_div(y))
        }
        (x, y) => {
            let yv = y.as_f64();
            if yv == 0.0 {
                return Err(JoyError::domain("/", "division by zero"));
            }
            Value::Float(x.as_f64() / yv)
        }
    };
    ev.stack.push(result);
    Ok(())
}

/// Integer remainder only.
fn rem(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "rem")?;
    match (numeric(&a, "rem")?, numeric(&b, "rem")?) {
        (Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(JoyError::domain("rem", "division by zero"));
            }
            ev.stack.push(Value::Int(x.wrapping_rem(y)));
            Ok(())
        }
        _ => Err(JoyError::type_error("rem", "integer", "float")),
    }
}

/// N1 N2 -> quotient remainder
fn divmod(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "div")?;
    match (numeric(&a, "div")?, numeric(&b, "div")?) {
        (Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(JoyError::domain("div", "division by zero"));
            }
            ev.stack.push(Value::Int(x.wrapping_div(y)));
            ev.stack.push(Value::Int(x.wrapping_rem(y)));
            Ok(())
        }
        _ => Err(JoyError::type_error("div", "integer", "float")),
    }
}

fn abs(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("abs")?;
    let result = match numeric(&a, "abs")? {
        Num::Int(n) => Value::Int(n.wrapping_abs()),
        Num::Float(x) => Value::Float(x.abs()),
    };
    ev.stack.push(result);
    Ok(())
}

fn neg(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("neg")?;
    let result = match numeric(&a, "neg")? {
        Num::Int(n) => Value::Int(n.wrapping_neg()),
        Num::Float(x) => Value::Float(-x),
    };
    ev.stack.push(result);
    Ok(())
}

fn sign(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("sign")?;
    let v = numeric(&a, "sign")?.as_f64();
    let result = if v < 0.0 {
        -1
    } else if v > 0.0 {
        1
    } else {
        0
    };
    ev.stack.push(Value::Int(result));
    Ok(())
}

fn succ(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("succ")?;
    let result = match numeric(&a, "succ")? {
        Num::Int(n) => Value::Int(n.wrapping_add(1)),
        Num::Float(x) => Value::Float(x + 1.0),
    };
    ev.stack.push(result);
    Ok(())
}

fn pred(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("pred")?;
    let result = match numeric(&a, "pred")? {
        Num::Int(n) => Value::Int(n.wrapping_sub(1)),
        Num::Float(x) => Value::Float(x - 1.0),
    };
    ev.stack.push(result);
    Ok(())
}

fn max(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "max")?;
    let result = match (numeric(&a, "max")?, numeric(&b, "max")?) {
        (Num::Int(x), Num::Int(y)) => Value::Int(x.max(y)),
        (x, y) => Value::Float(x.as_f64().max(y.as_f64())),
    };
    ev.stack.push(result);
    Ok(())
}

fn min(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "min")?;
    let result = match (numeric(&a, "min")?, numeric(&b, "min")?) {
        (Num::Int(x), Num::Int(y)) => Value::Int(x.min(y)),
        (x, y) => Value::Float(x.as_f64().min(y.as_f64())),
    };
    ev.stack.push(result);
    Ok(())
}

fn unary_math(ev: &mut Evaluator, op: &str, f: fn(f64) -> f64) -> Result<(), JoyError> {
    let a = ev.stack.pop(op)?;
    let x = numeric(&a, op)?.as_f64();
    ev.stack.push(Value::Float(f(x)));
    Ok(())
}

fn atan2(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "atan2")?;
    let x = numeric(&a, "atan2")?.as_f64();
    let y = numeric(&b, "atan2")?.as_f64();
    ev.stack.push(Value::Float(x.atan2(y)));
    Ok(())
}

fn pow(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "pow")?;
    let x = numeric(&a, "pow")?.as_f64();
    let y = numeric(&b, "pow")?.as_f64();
    ev.stack.push(Value::Float(x.powf(y)));
    Ok(())
}

/// F -> M E with F = M * 2^E and 0.5 <= |M| < 1 (0, inf, nan pass through).
fn frexp_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("frexp")?;
    let x = numeric(&a, "frexp")?.as_f64();
    let (m, e) = frexp(x);
    ev.stack.push(Value::Float(m));
    ev.stack.push(Value::Int(e as i64));
    Ok(())
}

fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || x.is_nan() || x.is_infinite() {
        return (x, 0);
    }
    let mut e = x.abs().log2().floor() as i32 + 1;
    let mut m = x / (2f64).powi(e);
    if m.abs() >= 1.0 {
        m /= 2.0;
        e += 1;
    }
    if m.abs() < 0.5 {
        m *= 2.0;
        e -= 1;
    }
    (m, e)
}

/// F I -> F * 2^I
fn ldexp_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let (a, b) = binary(ev, "ldexp")?;
    let x = numeric(&a, "ldexp")?.as_f64();
    let e = match numeric(&b, "ldexp")? {
        Num::Int(n) => n as i32,
        Num::Float(_) => return Err(JoyError::type_error("ldexp", "integer", "float")),
    };
    ev.stack.push(Value::Float(x * (2f64).powi(e)));
    Ok(())
}

/// F -> FRAC INT
fn modf_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let a = ev.stack.pop("modf")?;
    let x = numeric(&a, "modf")?.as_f64();
    ev.stack.push(Value::Float(x.fract()));
    ev.stack.push(Value::Float(x.trunc()));
    Ok(())
}

fn rand_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let n = ev.rng.gen_range(0..2_147_483_648i64);
    ev.stack.push(Value::Int(n));
    Ok(())
}

fn srand_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let seed = ev.stack.pop("srand")?;
    match seed {
        Value::Int(n) => {
            ev.rng = rand::rngs::StdRng::seed_from_u64(n as u64);
            Ok(())
        }
        other => Err(JoyError::type_error("srand", "integer", other.type_name())),
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

    fn run_err(source: &str) -> joy_core::JoyError {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run(source).unwrap_err()
    }

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(run("2 3 +"), vec![Value::Int(5)]);
        assert_eq!(run("7 2 -"), vec![Value::Int(5)]);
        assert_eq!(run("6 7 *"), vec![Value::Int(42)]);
        assert_eq!(run("7 2 /"), vec![Value::Int(3)]);
        assert_eq!(run("7 2 rem"), vec![Value::Int(1)]);
    }

    #[test]
    fn test_float_promotion() {
        assert_eq!(run("1 2.5 +"), vec![Value::Float(3.5)]);
        assert_eq!(run("7.0 2 /"), vec![Value::Float(3.5)]);
        assert_eq!(run("2.0 3 *"), vec![Value::Float(6.0)]);
    }

    #[test]
    fn test_char_and_bool_ordinals() {
        assert_eq!(run("'a 1 +"), vec![Value::Int(98)]);
        assert_eq!(run("true 2 +"), vec![Value::Int(3)]);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(run_err("1 0 /"), joy_core::JoyError::Domain { .. }));
        assert!(matches!(run_err("1 0 rem"), joy_core::JoyError::Domain { .. }));
    }

    #[test]
    fn test_rem_rejects_floats() {
        assert!(matches!(run_err("1.5 2 rem"), joy_core::JoyError::Type { .. }));
    }

    #[test]
    fn test_div_pushes_quotient_and_remainder() {
        assert_eq!(run("7 2 div"), vec![Value::Int(3), Value::Int(1)]);
    }

    #[test]
    fn test_sign_abs_neg() {
        assert_eq!(run("-5 abs"), vec![Value::Int(5)]);
        assert_eq!(run("5 neg"), vec![Value::Int(-5)]);
        assert_eq!(run("-3 sign"), vec![Value::Int(-1)]);
        assert_eq!(run("0 sign"), vec![Value::Int(0)]);
        assert_eq!(run("9 sign"), vec![Value::Int(1)]);
    }

    #[test]
    fn test_succ_pred_max_min() {
        assert_eq!(run("4 succ"), vec![Value::Int(5)]);
        assert_eq!(run("4 pred"), vec![Value::Int(3)]);
        assert_eq!(run("3 9 max"), vec![Value::Int(9)]);
        assert_eq!(run("3 9 min"), vec![Value::Int(3)]);
        assert_eq!(run("3 2.5 max"), vec![Value::Float(3.0)]);
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(run("0.0 sin"), vec![Value::Float(0.0)]);
        assert_eq!(run("9.0 sqrt"), vec![Value::Float(3.0)]);
        assert_eq!(run("2.7 floor"), vec![Value::Float(2.0)]);
        assert_eq!(run("2.2 ceil"), vec![Value::Float(3.0)]);
        assert_eq!(run("2.0 3.0 pow"), vec![Value::Float(8.0)]);
    }

    #[test]
    fn test_frexp_ldexp_round_trip() {
        // 6.0 = 0.75 * 2^3
        assert_eq!(run("6.0 frexp"), vec![Value::Float(0.75), Value::Int(3)]);
        assert_eq!(run("0.75 3 ldexp"), vec![Value::Float(6.0)]);
    }

    #[test]
    fn test_modf() {
        assert_eq!(run("2.5 modf"), vec![Value::Float(0.5), Value::Float(2.0)]);
    }

    #[test]
    fn test_srand_is_deterministic() {
        let a = run("42 srand rand rand");
        let b = run("42 srand rand rand");
        assert_eq!(a, b);
    }

    #[test]
    fn test_integer_wrapping() {
        assert_eq!(
            run("9223372036854775807 1 +"),
            vec![Value::Int(i64::MIN)]
        );
    }
}
