//! System, time, formatting, conversion, and reflection primitives.
//!
//! Time structs cross the boundary as 9-integer lists in C `struct tm`
//! field order: sec, min, hour, mday, mon, year, wday, yday, isdst.

use std::collections::HashMap;
use std::ffi::CString;
use std::time::{SystemTime, UNIX_EPOCH};

use joy_core::{JoyError, Value};

use super::{Evaluator, Primitive};
use crate::parser;

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert("time", time);
    table.insert("clock", clock);
    table.insert("localtime", |ev| tm_split(ev, "localtime"));
    table.insert("gmtime", |ev| tm_split(ev, "gmtime"));
    table.insert("mktime", mktime);
    table.insert("strftime", strftime);

    table.insert("getenv", getenv);
    table.insert("system", system);
    table.insert("argc", argc);
    table.insert("argv", argv);

    table.insert("abort", abort);
    table.insert("quit", quit);
    table.insert("gc", gc);

    table.insert("format", format_word);
    table.insert("formatf", formatf);
    table.insert("strtol", strtol);
    table.insert("strtod", strtod);
    table.insert("chr", chr);
    table.insert("ord", ord);

    table.insert("intern", intern);
    table.insert("name", name);
    table.insert("body", body);
    table.insert("assign", assign);
    table.insert("unassign", unassign);
    table.insert("include", include);

    table.insert("maxint", maxint);
    table.insert("autoput", |ev| get_flag(ev, Flag::Autoput));
    table.insert("undeferror", |ev| get_flag(ev, Flag::Undeferror));
    table.insert("echo", |ev| get_flag(ev, Flag::Echo));
    table.insert("setautoput", |ev| set_flag(ev, Flag::Autoput));
    table.insert("setundeferror", |ev| set_flag(ev, Flag::Undeferror));
    table.insert("setecho", |ev| set_flag(ev, Flag::Echo));
    table.insert("__settracegc", settracegc);
    table.insert("conts", conts);
    table.insert("undefs", undefs);

    table.insert("help", help);
    table.insert("helpdetail", helpdetail);
    table.insert("manual", manual);
}

/// Run a shell-escape line; the exit status is discarded.
pub(crate) fn run_shell(cmd: &str) {
    if cmd.is_empty() {
        return;
    }
    let _ = std::process::Command::new("sh").arg("-c").arg(cmd).status();
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

fn time(ev: &mut Evaluator) -> Result<(), JoyError> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    ev.stack.push(Value::Int(secs));
    Ok(())
}

fn clock(ev: &mut Evaluator) -> Result<(), JoyError> {
    let ticks = unsafe { libc::clock() };
    ev.stack.push(Value::Int(ticks as i64));
    Ok(())
}

fn tm_to_list(tm: &libc::tm) -> Value {
    Value::List(vec![
        Value::Int(tm.tm_sec as i64),
        Value::Int(tm.tm_min as i64),
        Value::Int(tm.tm_hour as i64),
        Value::Int(tm.tm_mday as i64),
        Value::Int(tm.tm_mon as i64),
        Value::Int(tm.tm_year as i64),
        Value::Int(tm.tm_wday as i64),
        Value::Int(tm.tm_yday as i64),
        Value::Int(tm.tm_isdst as i64),
    ])
}

fn list_to_tm(value: &Value, op: &str) -> Result<libc::tm, JoyError> {
    let items = match value {
        Value::List(items) | Value::Quotation(items) => items,
        other => return Err(JoyError::type_error(op, "list", other.type_name())),
    };
    if items.len() < 9 {
        return Err(JoyError::domain(op, "time list needs 9 integers"));
    }
    let mut fields = [0i64; 9];
    for (i, item) in items.iter().take(9).enumerate() {
        fields[i] = match item {
            Value::Int(n) => *n,
            Value::Bool(b) => i64::from(*b),
            other => return Err(JoyError::type_error(op, "integer", other.type_name())),
        };
    }
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    tm.tm_sec = fields[0] as libc::c_int;
    tm.tm_min = fields[1] as libc::c_int;
    tm.tm_hour = fields[2] as libc::c_int;
    tm.tm_mday = fields[3] as libc::c_int;
    tm.tm_mon = fields[4] as libc::c_int;
    tm.tm_year = fields[5] as libc::c_int;
    tm.tm_wday = fields[6] as libc::c_int;
    tm.tm_yday = fields[7] as libc::c_int;
    tm.tm_isdst = fields[8] as libc::c_int;
    Ok(tm)
}

/// I -> [sec min hour mday mon year wday yday isdst]
fn tm_split(ev: &mut Evaluator, op: &'static str) -> Result<(), JoyError> {
    let t = match ev.stack.pop(op)? {
        Value::Int(n) => n,
        other => return Err(JoyError::type_error(op, "integer", other.type_name())),
    };
    let time_val = t as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        if op == "localtime" {
            libc::localtime_r(&time_val, &mut tm);
        } else {
            libc::gmtime_r(&time_val, &mut tm);
        }
    }
    ev.stack.push(tm_to_list(&tm));
    Ok(())
}

/// [T] -> I
fn mktime(ev: &mut Evaluator) -> Result<(), JoyError> {
    let list = ev.stack.pop("mktime")?;
    let mut tm = list_to_tm(&list, "mktime")?;
    let t = unsafe { libc::mktime(&mut tm) };
    ev.stack.push(Value::Int(t as i64));
    Ok(())
}

/// [T] S -> S
fn strftime(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("strftime", 2)?;
    let fmt = match vs.remove(0) {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("strftime", "string", other.type_name())),
    };
    let tm = list_to_tm(&vs.remove(0), "strftime")?;
    let c_fmt = CString::new(fmt).map_err(|_| JoyError::domain("strftime", "bad format"))?;
    let mut buf = vec![0u8; 256];
    let written = unsafe {
        libc::strftime(
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            c_fmt.as_ptr(),
            &tm,
        )
    };
    buf.truncate(written);
    ev.stack
        .push(Value::String(String::from_utf8_lossy(&buf).into_owned()));
    Ok(())
}

// ---------------------------------------------------------------------------
// Environment and process
// ---------------------------------------------------------------------------

/// S -> VALUE | ""
fn getenv(ev: &mut Evaluator) -> Result<(), JoyError> {
    let var = match ev.stack.pop("getenv")? {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("getenv", "string", other.type_name())),
    };
    let value = std::env::var(&var).unwrap_or_default();
    ev.stack.push(Value::String(value));
    Ok(())
}

/// CMD -> STATUS
fn system(ev: &mut Evaluator) -> Result<(), JoyError> {
    let cmd = match ev.stack.pop("system")? {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("system", "string", other.type_name())),
    };
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(&cmd)
        .status()
        .map(|s| s.code().unwrap_or(-1))
        .unwrap_or(-1);
    ev.stack.push(Value::Int(status as i64));
    Ok(())
}

fn argc(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.push(Value::Int(ev.args.len() as i64));
    Ok(())
}

fn argv(ev: &mut Evaluator) -> Result<(), JoyError> {
    let args: Vec<Value> = ev.args.iter().cloned().map(Value::String).collect();
    ev.stack.push(Value::List(args));
    Ok(())
}

fn abort(_ev: &mut Evaluator) -> Result<(), JoyError> {
    Err(JoyError::Exit(1))
}

fn quit(_ev: &mut Evaluator) -> Result<(), JoyError> {
    Err(JoyError::Exit(0))
}

fn gc(_ev: &mut Evaluator) -> Result<(), JoyError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting and conversions
// ---------------------------------------------------------------------------

/// N C I J -> S. Integer formatting: d/i decimal, o octal, x/X hex, with
/// min-digits J and field width I.
fn format_word(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("format", 4)?;
    let prec = int_arg(vs.remove(0), "format")?;
    let width = int_arg(vs.remove(0), "format")?;
    let spec = char_arg(vs.remove(0), "format")?;
    let n = match vs.remove(0) {
        Value::Int(n) => n,
        Value::Float(x) => x as i64,
        Value::Char(c) => c as i64,
        other => return Err(JoyError::type_error("format", "numeric", other.type_name())),
    };

    let digits = match spec {
        'd' | 'i' => format!("{}", n.unsigned_abs()),
        'o' => format!("{:o}", n),
        'x' => format!("{:x}", n),
        'X' => format!("{:X}", n),
        other => {
            return Err(JoyError::domain(
                "format",
                format!("unknown conversion '{}'", other),
            ));
        }
    };
    let mut body = if prec > 0 && (prec as usize) > digits.len() {
        format!("{}{}", "0".repeat(prec as usize - digits.len()), digits)
    } else {
        digits
    };
    if matches!(spec, 'd' | 'i') && n < 0 {
        body = format!("-{}", body);
    }
    let padded = if (width as usize) > body.len() {
        format!("{}{}", " ".repeat(width as usize - body.len()), body)
    } else {
        body
    };
    ev.stack.push(Value::String(padded));
    Ok(())
}

/// F C I J -> S. Float formatting: f fixed, e scientific, g shortest.
fn formatf(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("formatf", 4)?;
    let prec = int_arg(vs.remove(0), "formatf")? as usize;
    let width = int_arg(vs.remove(0), "formatf")? as usize;
    let spec = char_arg(vs.remove(0), "formatf")?;
    let x = match vs.remove(0) {
        Value::Float(x) => x,
        Value::Int(n) => n as f64,
        other => return Err(JoyError::type_error("formatf", "numeric", other.type_name())),
    };

    let body = match spec {
        'f' | 'F' => format!("{:.*}", prec, x),
        'e' | 'E' => {
            let s = c_style_exp(x, prec);
            if spec == 'E' { s.to_uppercase() } else { s }
        }
        'g' | 'G' => format!("{}", x),
        other => {
            return Err(JoyError::domain(
                "formatf",
                format!("unknown conversion '{}'", other),
            ));
        }
    };
    let padded = if width > body.len() {
        format!("{}{}", " ".repeat(width - body.len()), body)
    } else {
        body
    };
    ev.stack.push(Value::String(padded));
    Ok(())
}

/// C-style %e: mantissa with `prec` digits, sign and two-digit exponent.
fn c_style_exp(x: f64, prec: usize) -> String {
    let formatted = format!("{:.*e}", prec, x);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ('-', rest),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}

fn int_arg(value: Value, op: &str) -> Result<i64, JoyError> {
    match value {
        Value::Int(n) => Ok(n),
        other => Err(JoyError::type_error(op, "integer", other.type_name())),
    }
}

fn char_arg(value: Value, op: &str) -> Result<char, JoyError> {
    match value {
        Value::Char(c) => Ok(c),
        Value::Int(n) => char::from_u32(n as u32)
            .ok_or_else(|| JoyError::domain(op, format!("bad character code {}", n))),
        other => Err(JoyError::type_error(op, "char", other.type_name())),
    }
}

/// S I -> N. Base 0 auto-detects the C prefixes (0x hex, leading 0
/// octal). Unparsable input gives 0.
fn strtol(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("strtol", 2)?;
    let base = int_arg(vs.remove(0), "strtol")?;
    let s = match vs.remove(0) {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("strtol", "string", other.type_name())),
    };
    ev.stack.push(Value::Int(parse_int(&s, base)));
    Ok(())
}

fn parse_int(s: &str, base: i64) -> i64 {
    let trimmed = s.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (radix, digits) = match base {
        0 => {
            if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
                (16, hex)
            } else if rest.len() > 1 && rest.starts_with('0') {
                (8, &rest[1..])
            } else {
                (10, rest)
            }
        }
        16 => (
            16,
            rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest),
        ),
        b if (2..=36).contains(&b) => (b as u32, rest),
        _ => return 0,
    };
    match i64::from_str_radix(digits, radix as u32) {
        Ok(n) => {
            if negative {
                -n
            } else {
                n
            }
        }
        Err(_) => 0,
    }
}

/// S -> F. Unparsable input gives 0.0.
fn strtod(ev: &mut Evaluator) -> Result<(), JoyError> {
    let s = match ev.stack.pop("strtod")? {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("strtod", "string", other.type_name())),
    };
    ev.stack
        .push(Value::Float(s.trim().parse::<f64>().unwrap_or(0.0)));
    Ok(())
}

/// I -> C
fn chr(ev: &mut Evaluator) -> Result<(), JoyError> {
    let n = int_arg(ev.stack.pop("chr")?, "chr")?;
    let c = char::from_u32((n.rem_euclid(256)) as u32)
        .ok_or_else(|| JoyError::domain("chr", format!("bad character code {}", n)))?;
    ev.stack.push(Value::Char(c));
    Ok(())
}

/// C -> I
fn ord(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("ord")?;
    let n = match &x {
        Value::Char(c) => *c as i64,
        Value::String(s) if !s.is_empty() => s.chars().next().unwrap() as i64,
        Value::Int(n) => *n,
        other => return Err(JoyError::type_error("ord", "char or string", other.type_name())),
    };
    ev.stack.push(Value::Int(n));
    Ok(())
}

// ---------------------------------------------------------------------------
// Reflection
// ---------------------------------------------------------------------------

/// S -> A
fn intern(ev: &mut Evaluator) -> Result<(), JoyError> {
    let s = match ev.stack.pop("intern")? {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("intern", "string", other.type_name())),
    };
    ev.stack.push(Value::Symbol(s));
    Ok(())
}

/// X -> S: the name for a symbol, the kind name for everything else.
fn name(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("name")?;
    let s = match x {
        Value::Symbol(n) => n,
        other => other.type_name().to_string(),
    };
    ev.stack.push(Value::String(s));
    Ok(())
}

fn symbol_name(value: Value, op: &str) -> Result<String, JoyError> {
    match value {
        Value::Symbol(n) | Value::String(n) => Ok(n),
        other => Err(JoyError::type_error(op, "symbol or string", other.type_name())),
    }
}

/// U -> [P]: the body of a user word, the empty quotation for anything
/// else (primitives included).
fn body(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("body")?;
    let body = match x {
        Value::Symbol(n) | Value::String(n) => {
            ev.definition(&n).cloned().unwrap_or_default()
        }
        _ => Vec::new(),
    };
    ev.stack.push(Value::Quotation(body));
    Ok(())
}

/// X N -> : define N to push X.
fn assign(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("assign", 2)?;
    let name = symbol_name(vs.remove(0), "assign")?;
    let value = vs.remove(0);
    ev.define(&name, vec![value]);
    Ok(())
}

/// N -> : remove a user binding.
fn unassign(ev: &mut Evaluator) -> Result<(), JoyError> {
    let name = symbol_name(ev.stack.pop("unassign")?, "unassign")?;
    ev.unassign(&name);
    Ok(())
}

/// S -> : load and run a Joy file at evaluation time.
fn include(ev: &mut Evaluator) -> Result<(), JoyError> {
    let path = match ev.stack.pop("include")? {
        Value::String(s) => s,
        other => return Err(JoyError::type_error("include", "string", other.type_name())),
    };
    let source = std::fs::read_to_string(&path)
        .map_err(|e| JoyError::domain("include", format!("{}: {}", path, e)))?;
    let program = parser::parse(&source)?;
    ev.run_program(&program)
}

// ---------------------------------------------------------------------------
// Interpreter state
// ---------------------------------------------------------------------------

fn maxint(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.push(Value::Int(i64::MAX));
    Ok(())
}

enum Flag {
    Autoput,
    Undeferror,
    Echo,
}

fn get_flag(ev: &mut Evaluator, flag: Flag) -> Result<(), JoyError> {
    let value = match flag {
        Flag::Autoput => i64::from(ev.autoput),
        Flag::Undeferror => i64::from(ev.undeferror),
        Flag::Echo => ev.echo,
    };
    ev.stack.push(Value::Int(value));
    Ok(())
}

fn set_flag(ev: &mut Evaluator, flag: Flag) -> Result<(), JoyError> {
    let op = match flag {
        Flag::Autoput => "setautoput",
        Flag::Undeferror => "setundeferror",
        Flag::Echo => "setecho",
    };
    let x = ev.stack.pop(op)?;
    match flag {
        Flag::Autoput => ev.autoput = x.truthy(),
        Flag::Undeferror => ev.undeferror = x.truthy(),
        Flag::Echo => {
            ev.echo = match x {
                Value::Int(n) => n.clamp(0, 3),
                other => i64::from(other.truthy()),
            }
        }
    }
    Ok(())
}

fn settracegc(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.pop("__settracegc")?;
    Ok(())
}

fn conts(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.stack.push(Value::List(vec![]));
    Ok(())
}

/// -> L: the words that evaluated as no-ops while `undeferror` was off.
fn undefs(ev: &mut Evaluator) -> Result<(), JoyError> {
    let names: Vec<Value> = ev
        .undefs()
        .iter()
        .cloned()
        .map(Value::String)
        .collect();
    ev.stack.push(Value::List(names));
    Ok(())
}

// ---------------------------------------------------------------------------
// Help
// ---------------------------------------------------------------------------

fn help(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut text = String::new();
    let user_names: Vec<String> = ev.definition_names().iter().map(|s| s.to_string()).collect();
    if !user_names.is_empty() {
        text.push_str("User definitions:\n");
        for name in &user_names {
            text.push_str(&format!("  {}\n", name));
        }
        text.push('\n');
    }
    text.push_str("Primitives:\n");
    for name in super::primitive_names() {
        text.push_str(&format!("  {}\n", name));
    }
    ev.emit(&text);
    Ok(())
}

/// [S1 S2 ..] -> : one line of classification per listed symbol.
fn helpdetail(ev: &mut Evaluator) -> Result<(), JoyError> {
    let symbols = ev.stack.pop("helpdetail")?;
    let items = match symbols {
        Value::List(items) | Value::Quotation(items) => items,
        other => {
            return Err(JoyError::type_error("helpdetail", "list", other.type_name()));
        }
    };
    let mut text = String::new();
    for item in items {
        let name = match item {
            Value::Symbol(n) | Value::String(n) => n,
            _ => continue,
        };
        if super::primitive(&name).is_some() {
            text.push_str(&format!("{} : (primitive)\n", name));
        } else if ev.definition(&name).is_some() {
            text.push_str(&format!("{} : (user-defined)\n", name));
        } else {
            text.push_str(&format!("{} : (undefined)\n", name));
        }
    }
    ev.emit(&text);
    Ok(())
}

fn manual(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut text = String::from("Joy primitives\n==============\n");
    for name in super::primitive_names() {
        text.push_str(&format!("{}\n", name));
    }
    ev.emit(&text);
    Ok(())
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
    fn test_time_and_clock_push_integers() {
        let items = run("time clock");
        assert!(matches!(items[0], Value::Int(n) if n > 0));
        assert!(matches!(items[1], Value::Int(_)));
    }

    #[test]
    fn test_localtime_gmtime_mktime_round_trip() {
        // A fixed instant survives gmtime/localtime + mktime.
        let items = run("86400 localtime mktime");
        assert_eq!(items, vec![Value::Int(86400)]);
        let items = run("86400 gmtime size");
        assert_eq!(items, vec![Value::Int(9)]);
    }

    #[test]
    fn test_strftime() {
        let items = run("0 gmtime \"%Y\" strftime");
        // tm_year 70 renders as 1970.
        assert_eq!(items, vec![Value::String("1970".into())]);
    }

    #[test]
    fn test_getenv_missing_is_empty_string() {
        assert_eq!(
            run("\"JOY_NO_SUCH_VAR_12345\" getenv"),
            vec![Value::String("".into())]
        );
    }

    #[test]
    fn test_system_status() {
        assert_eq!(run("\"exit 3\" system"), vec![Value::Int(3)]);
        assert_eq!(run("\"true\" system"), vec![Value::Int(0)]);
    }

    #[test]
    fn test_quit_and_abort_carry_exit_codes() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        assert_eq!(ev.run("quit"), Err(joy_core::JoyError::Exit(0)));
        assert_eq!(ev.run("abort"), Err(joy_core::JoyError::Exit(1)));
    }

    #[test]
    fn test_format() {
        assert_eq!(run("42 'd 5 0 format"), vec![Value::String("   42".into())]);
        assert_eq!(run("42 'x 0 0 format"), vec![Value::String("2a".into())]);
        assert_eq!(run("-7 'd 0 3 format"), vec![Value::String("-007".into())]);
        assert_eq!(run("8 'o 0 0 format"), vec![Value::String("10".into())]);
    }

    #[test]
    fn test_formatf() {
        assert_eq!(
            run("2.5 'f 0 2 formatf"),
            vec![Value::String("2.50".into())]
        );
        assert_eq!(
            run("150.0 'e 0 2 formatf"),
            vec![Value::String("1.50e+02".into())]
        );
    }

    #[test]
    fn test_strtol() {
        assert_eq!(run("\"123\" 10 strtol"), vec![Value::Int(123)]);
        assert_eq!(run("\"ff\" 16 strtol"), vec![Value::Int(255)]);
        assert_eq!(run("\"0x1f\" 0 strtol"), vec![Value::Int(31)]);
        assert_eq!(run("\"017\" 0 strtol"), vec![Value::Int(15)]);
        assert_eq!(run("\"-42\" 10 strtol"), vec![Value::Int(-42)]);
        assert_eq!(run("\"bogus\" 10 strtol"), vec![Value::Int(0)]);
    }

    #[test]
    fn test_strtod() {
        assert_eq!(run("\"2.5\" strtod"), vec![Value::Float(2.5)]);
        assert_eq!(run("\"bogus\" strtod"), vec![Value::Float(0.0)]);
    }

    #[test]
    fn test_chr_ord_round_trip() {
        assert_eq!(run("65 chr"), vec![Value::Char('A')]);
        assert_eq!(run("'A ord"), vec![Value::Int(65)]);
        assert_eq!(run("321 chr ord"), vec![Value::Int(65)]); // mod 256
    }

    #[test]
    fn test_intern_name_round_trip() {
        assert_eq!(run("\"dup\" intern name"), vec![Value::String("dup".into())]);
        // Non-symbols report their kind.
        assert_eq!(run("42 name"), vec![Value::String("integer".into())]);
        assert_eq!(run("[1] name"), vec![Value::String("list".into())]);
    }

    #[test]
    fn test_body_and_user_definitions() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run("DEFINE sq == dup * .").unwrap();
        ev.run("\"sq\" intern body").unwrap();
        assert_eq!(
            ev.stack.items(),
            &[Value::Quotation(vec![
                Value::Symbol("dup".into()),
                Value::Symbol("*".into())
            ])]
        );
        // Primitives have an empty body.
        ev.stack.clear();
        ev.run("\"dup\" intern body").unwrap();
        assert_eq!(ev.stack.items(), &[Value::Quotation(vec![])]);
    }

    #[test]
    fn test_assign_and_unassign() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run("42 \"answer\" intern assign answer").unwrap();
        assert_eq!(ev.stack.items(), &[Value::Int(42)]);
        ev.run("\"answer\" intern unassign").unwrap();
        assert!(ev.run("answer").is_err());
    }

    #[test]
    fn test_flags() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run("autoput undeferror echo").unwrap();
        assert_eq!(
            ev.stack.items(),
            &[Value::Int(1), Value::Int(1), Value::Int(0)]
        );
        ev.stack.clear();
        ev.run("0 setautoput 0 setundeferror 2 setecho").unwrap();
        assert!(!ev.autoput);
        assert!(!ev.undeferror);
        assert_eq!(ev.echo, 2);
    }

    #[test]
    fn test_undefs_accessor() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run("0 setundeferror mystery undefs").unwrap();
        assert_eq!(
            ev.stack.items(),
            &[Value::List(vec![Value::String("mystery".into())])]
        );
    }

    #[test]
    fn test_maxint() {
        assert_eq!(run("maxint"), vec![Value::Int(i64::MAX)]);
    }

    #[test]
    fn test_include_runs_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.joy");
        std::fs::write(&path, "DEFINE seven == 7 .").unwrap();
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run(&format!("\"{}\" include seven", path.display()))
            .unwrap();
        assert_eq!(ev.stack.items(), &[Value::Int(7)]);
    }
}
