//! Console and file I/O primitives.
//!
//! I/O failures never raise: `fopen` pushes boolean false, and the file
//! words are no-ops with sentinel results on a null handle (-1 for
//! `fgetch`, the empty list for `fgets`, false for predicates). Programs
//! are expected to test these values.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use joy_core::{FileHandle, JoyError, Value};

use super::{Evaluator, Primitive};
use crate::parser;

pub(crate) fn register(table: &mut HashMap<&'static str, Primitive>) {
    table.insert(".", print_top);
    table.insert("put", put);
    table.insert("putln", putln);
    table.insert("putch", putch);
    table.insert("putchars", putchars);
    table.insert("newline", newline);

    table.insert("get", get);
    table.insert("getch", getch);
    table.insert("getline", getline);

    table.insert("stdin", |ev| push_handle(ev, FileHandle::Stdin));
    table.insert("stdout", |ev| push_handle(ev, FileHandle::Stdout));
    table.insert("stderr", |ev| push_handle(ev, FileHandle::Stderr));

    table.insert("fopen", fopen);
    table.insert("fclose", fclose);
    table.insert("fflush", fflush);
    table.insert("feof", feof);
    table.insert("ferror", ferror);
    table.insert("fgetch", fgetch);
    table.insert("fgets", fgets);
    table.insert("fread", fread);
    table.insert("fput", fput);
    table.insert("fputch", fputch);
    table.insert("fputchars", fputchars);
    table.insert("fputstring", fputchars);
    table.insert("fwrite", fwrite);
    table.insert("fseek", fseek);
    table.insert("ftell", ftell);
    table.insert("fremove", fremove);
    table.insert("frename", frename);
}

// ---------------------------------------------------------------------------
// Console output
// ---------------------------------------------------------------------------

/// Print TOS with a newline and pop it; a no-op on an empty stack (the
/// same spelling terminates definition blocks, so an empty-stack `.` must
/// be harmless).
fn print_top(ev: &mut Evaluator) -> Result<(), JoyError> {
    if ev.stack.is_empty() {
        return Ok(());
    }
    let x = ev.stack.pop(".")?;
    let text = format!("{}\n", x);
    ev.emit(&text);
    Ok(())
}

fn put(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("put")?;
    let text = format!("{}", x);
    ev.emit(&text);
    Ok(())
}

fn putln(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("putln")?;
    let text = format!("{}\n", x);
    ev.emit(&text);
    Ok(())
}

/// Print the character with code N (or the char itself), without quotes.
fn putch(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("putch")?;
    let c = match x {
        Value::Char(c) => c,
        Value::Int(n) => char::from_u32(n as u32)
            .ok_or_else(|| JoyError::domain("putch", format!("bad character code {}", n)))?,
        other => return Err(JoyError::type_error("putch", "char or integer", other.type_name())),
    };
    let text = c.to_string();
    ev.emit(&text);
    Ok(())
}

/// Print a string without quotes.
fn putchars(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("putchars")?;
    match x {
        Value::String(s) => {
            ev.emit(&s);
            Ok(())
        }
        other => Err(JoyError::type_error("putchars", "string", other.type_name())),
    }
}

fn newline(ev: &mut Evaluator) -> Result<(), JoyError> {
    ev.emit("\n");
    Ok(())
}

// ---------------------------------------------------------------------------
// Console input
// ---------------------------------------------------------------------------

/// Read one line from stdin, parse it, and push the resulting terms
/// (symbols are pushed as SYMBOL values, not executed).
fn get(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return Ok(());
    }
    let program = parser::parse(&line)?;
    for term in &program.terms {
        if let crate::ast::Term::Value(value) = term {
            ev.stack.push(value.clone());
        }
    }
    Ok(())
}

fn getch(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut buf = [0u8; 1];
    let value = match std::io::stdin().read(&mut buf) {
        Ok(1) => Value::Char(buf[0] as char),
        _ => Value::Int(-1),
    };
    ev.stack.push(value);
    Ok(())
}

fn getline(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    ev.stack.push(Value::String(line));
    Ok(())
}

// ---------------------------------------------------------------------------
// File handles
// ---------------------------------------------------------------------------

fn push_handle(ev: &mut Evaluator, handle: FileHandle) -> Result<(), JoyError> {
    ev.stack.push(Value::File(handle));
    Ok(())
}

fn peek_file(ev: &mut Evaluator, op: &str) -> Result<FileHandle, JoyError> {
    match ev.stack.peek(op, 0)? {
        Value::File(h) => Ok(h.clone()),
        other => Err(JoyError::type_error(op, "file", other.type_name())),
    }
}

fn pop_file(ev: &mut Evaluator, op: &str) -> Result<FileHandle, JoyError> {
    match ev.stack.pop(op)? {
        Value::File(h) => Ok(h),
        other => Err(JoyError::type_error(op, "file", other.type_name())),
    }
}

fn expect_string(value: Value, op: &str) -> Result<String, JoyError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(JoyError::type_error(op, "string", other.type_name())),
    }
}

/// Write text through a handle. Stdout goes through the evaluator's
/// output sink so program output stays ordered; null handles swallow.
fn write_handle(ev: &mut Evaluator, handle: &FileHandle, text: &str) {
    match handle {
        FileHandle::Stdout => ev.emit(text),
        FileHandle::Stderr => eprint!("{}", text),
        FileHandle::Handle(h) => {
            if let Some(file) = h.borrow_mut().as_mut() {
                let _ = file.write_all(text.as_bytes());
            }
        }
        FileHandle::Stdin | FileHandle::Null => {}
    }
}

fn read_byte(handle: &FileHandle) -> Option<u8> {
    let mut buf = [0u8; 1];
    match handle {
        FileHandle::Stdin => match std::io::stdin().read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        },
        FileHandle::Handle(h) => {
            let mut borrowed = h.borrow_mut();
            let file = borrowed.as_mut()?;
            match file.read(&mut buf) {
                Ok(1) => Some(buf[0]),
                _ => None,
            }
        }
        _ => None,
    }
}

/// P M -> HANDLE | false
fn fopen(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("fopen", 2)?;
    let mode = expect_string(vs.remove(0), "fopen")?;
    let path = expect_string(vs.remove(0), "fopen")?;

    let core: String = mode.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
    let mut opts = OpenOptions::new();
    match core.as_str() {
        "r" => opts.read(true),
        "r+" => opts.read(true).write(true),
        "w" => opts.write(true).create(true).truncate(true),
        "w+" => opts.read(true).write(true).create(true).truncate(true),
        "a" => opts.append(true).create(true),
        "a+" => opts.read(true).append(true).create(true),
        _ => {
            ev.stack.push(Value::Bool(false));
            return Ok(());
        }
    };
    match opts.open(&path) {
        Ok(file) => ev.stack.push(Value::File(FileHandle::open(file))),
        Err(_) => ev.stack.push(Value::Bool(false)),
    }
    Ok(())
}

/// HANDLE ->  (releases the OS resource; standard streams are left alone)
fn fclose(ev: &mut Evaluator) -> Result<(), JoyError> {
    let handle = pop_file(ev, "fclose")?;
    if let FileHandle::Handle(h) = handle {
        h.borrow_mut().take();
    }
    Ok(())
}

/// HANDLE -> HANDLE
fn fflush(ev: &mut Evaluator) -> Result<(), JoyError> {
    let handle = peek_file(ev, "fflush")?;
    match handle {
        FileHandle::Stdout => ev.flush_output(),
        FileHandle::Handle(h) => {
            if let Some(file) = h.borrow_mut().as_mut() {
                let _ = file.flush();
            }
        }
        _ => {}
    }
    Ok(())
}

/// HANDLE -> HANDLE BOOL
fn feof(ev: &mut Evaluator) -> Result<(), JoyError> {
    let handle = peek_file(ev, "feof")?;
    let at_eof = match &handle {
        FileHandle::Handle(h) => {
            let mut borrowed = h.borrow_mut();
            match borrowed.as_mut() {
                Some(file) => {
                    let pos = file.stream_position().ok();
                    let mut buf = [0u8; 1];
                    let eof = !matches!(file.read(&mut buf), Ok(1));
                    if !eof {
                        if let Some(p) = pos {
                            let _ = file.seek(SeekFrom::Start(p));
                        }
                    }
                    eof
                }
                None => false,
            }
        }
        _ => false,
    };
    ev.stack.push(Value::Bool(at_eof));
    Ok(())
}

/// HANDLE -> HANDLE BOOL
fn ferror(ev: &mut Evaluator) -> Result<(), JoyError> {
    peek_file(ev, "ferror")?;
    ev.stack.push(Value::Bool(false));
    Ok(())
}

/// HANDLE -> HANDLE CHAR | -1
fn fgetch(ev: &mut Evaluator) -> Result<(), JoyError> {
    let handle = peek_file(ev, "fgetch")?;
    let value = match read_byte(&handle) {
        Some(b) => Value::Char(b as char),
        None => Value::Int(-1),
    };
    ev.stack.push(value);
    Ok(())
}

/// HANDLE -> HANDLE LIST  (one line as characters; empty list at EOF)
fn fgets(ev: &mut Evaluator) -> Result<(), JoyError> {
    let handle = peek_file(ev, "fgets")?;
    let mut chars = Vec::new();
    while let Some(b) = read_byte(&handle) {
        chars.push(Value::Char(b as char));
        if b == b'\n' {
            break;
        }
    }
    ev.stack.push(Value::List(chars));
    Ok(())
}

/// HANDLE N -> HANDLE LIST  (N bytes as integers)
fn fread(ev: &mut Evaluator) -> Result<(), JoyError> {
    let count = ev.stack.pop("fread")?;
    let n = match count {
        Value::Int(n) => n.max(0),
        other => return Err(JoyError::type_error("fread", "integer", other.type_name())),
    };
    let handle = peek_file(ev, "fread")?;
    let mut bytes = Vec::new();
    for _ in 0..n {
        match read_byte(&handle) {
            Some(b) => bytes.push(Value::Int(b as i64)),
            None => break,
        }
    }
    ev.stack.push(Value::List(bytes));
    Ok(())
}

/// HANDLE X -> HANDLE  (the canonical print syntax of X)
fn fput(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("fput")?;
    let handle = peek_file(ev, "fput")?;
    let text = format!("{}", x);
    write_handle(ev, &handle, &text);
    Ok(())
}

/// HANDLE C -> HANDLE
fn fputch(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("fputch")?;
    let c = match x {
        Value::Char(c) => c,
        Value::Int(n) => char::from_u32(n as u32)
            .ok_or_else(|| JoyError::domain("fputch", format!("bad character code {}", n)))?,
        other => {
            return Err(JoyError::type_error("fputch", "char or integer", other.type_name()));
        }
    };
    let handle = peek_file(ev, "fputch")?;
    write_handle(ev, &handle, &c.to_string());
    Ok(())
}

/// HANDLE S -> HANDLE  (string, or list of chars/codes, without quotes)
fn fputchars(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("fputchars")?;
    let text = match x {
        Value::String(s) => s,
        Value::List(items) | Value::Quotation(items) => {
            let mut out = String::new();
            for item in items {
                match item {
                    Value::Char(c) => out.push(c),
                    Value::Int(n) => {
                        if let Some(c) = char::from_u32(n as u32) {
                            out.push(c);
                        }
                    }
                    _ => {}
                }
            }
            out
        }
        other => {
            return Err(JoyError::type_error("fputchars", "string or list", other.type_name()));
        }
    };
    let handle = peek_file(ev, "fputchars")?;
    write_handle(ev, &handle, &text);
    Ok(())
}

/// HANDLE L -> HANDLE  (list of byte values)
fn fwrite(ev: &mut Evaluator) -> Result<(), JoyError> {
    let x = ev.stack.pop("fwrite")?;
    let items = match x {
        Value::List(items) | Value::Quotation(items) => items,
        other => return Err(JoyError::type_error("fwrite", "list", other.type_name())),
    };
    let mut text = String::new();
    for item in items {
        match item {
            Value::Int(n) => text.push((n as u8) as char),
            Value::Char(c) => text.push(c),
            _ => {}
        }
    }
    let handle = peek_file(ev, "fwrite")?;
    write_handle(ev, &handle, &text);
    Ok(())
}

/// HANDLE POS WHENCE -> HANDLE BOOL
fn fseek(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("fseek", 2)?;
    let whence = vs.remove(0);
    let pos = vs.remove(0);
    let (pos, whence) = match (pos, whence) {
        (Value::Int(p), Value::Int(w)) => (p, w),
        _ => return Err(JoyError::type_error("fseek", "integer", "other")),
    };
    let handle = peek_file(ev, "fseek")?;
    let ok = match &handle {
        FileHandle::Handle(h) => {
            let mut borrowed = h.borrow_mut();
            match borrowed.as_mut() {
                Some(file) => {
                    let target = match whence {
                        0 => SeekFrom::Start(pos.max(0) as u64),
                        1 => SeekFrom::Current(pos),
                        2 => SeekFrom::End(pos),
                        _ => {
                            ev.stack.push(Value::Bool(false));
                            return Ok(());
                        }
                    };
                    file.seek(target).is_ok()
                }
                None => false,
            }
        }
        _ => false,
    };
    ev.stack.push(Value::Bool(ok));
    Ok(())
}

/// HANDLE -> HANDLE POS
fn ftell(ev: &mut Evaluator) -> Result<(), JoyError> {
    let handle = peek_file(ev, "ftell")?;
    let pos = match &handle {
        FileHandle::Handle(h) => {
            let mut borrowed = h.borrow_mut();
            match borrowed.as_mut() {
                Some(file) => file.stream_position().map(|p| p as i64).unwrap_or(-1),
                None => -1,
            }
        }
        _ => -1,
    };
    ev.stack.push(Value::Int(pos));
    Ok(())
}

/// P -> BOOL
fn fremove(ev: &mut Evaluator) -> Result<(), JoyError> {
    let path = expect_string(ev.stack.pop("fremove")?, "fremove")?;
    ev.stack.push(Value::Bool(std::fs::remove_file(path).is_ok()));
    Ok(())
}

/// P1 P2 -> BOOL
fn frename(ev: &mut Evaluator) -> Result<(), JoyError> {
    let mut vs = ev.stack.pop_n("frename", 2)?;
    let to = expect_string(vs.remove(0), "frename")?;
    let from = expect_string(vs.remove(0), "frename")?;
    ev.stack.push(Value::Bool(std::fs::rename(from, to).is_ok()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{Evaluator, SharedOutput};
    use joy_core::Value;
    use std::io::Write as _;

    fn output_of(source: &str) -> String {
        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out.clone()));
        ev.run(source).unwrap();
        out.contents()
    }

    #[test]
    fn test_print_top() {
        assert_eq!(output_of("2 3 + ."), "5\n");
        assert_eq!(output_of("[1 2 3] ."), "[1 2 3]\n");
        assert_eq!(output_of("\"hi\" ."), "\"hi\"\n");
        // No-op on empty stack.
        assert_eq!(output_of("."), "");
    }

    #[test]
    fn test_put_family() {
        assert_eq!(output_of("1 put 2 put"), "12");
        assert_eq!(output_of("5 putln"), "5\n");
        assert_eq!(output_of("65 putch 'b putch"), "Ab");
        assert_eq!(output_of("\"raw\" putchars"), "raw");
        assert_eq!(output_of("newline"), "\n");
    }

    #[test]
    fn test_standard_streams_push_handles() {
        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run("stdin stdout stderr").unwrap();
        assert_eq!(ev.stack.depth(), 3);
        assert!(matches!(ev.stack.items()[0], Value::File(_)));
    }

    #[test]
    fn test_fput_to_stdout_handle() {
        assert_eq!(output_of("stdout 42 fput pop"), "42");
    }

    #[test]
    fn test_fopen_missing_file_pushes_false() {
        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run("\"/no/such/path\" \"r\" fopen").unwrap();
        assert_eq!(ev.stack.items(), &[Value::Bool(false)]);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"ab\ncd\n")
            .unwrap();
        let path = path.display().to_string();

        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run(&format!("\"{}\" \"r\" fopen", path)).unwrap();
        assert!(matches!(ev.stack.items()[0], Value::File(_)));

        ev.run("fgetch").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::Char('a'));
        ev.run("pop fgets").unwrap();
        assert_eq!(
            *ev.stack.peek(".", 0).unwrap(),
            Value::List(vec![Value::Char('b'), Value::Char('\n')])
        );
        ev.run("pop feof").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::Bool(false));
        ev.run("pop 0 0 fseek").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::Bool(true));
        ev.run("pop ftell").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::Int(0));
        ev.run("pop 2 fread").unwrap();
        assert_eq!(
            *ev.stack.peek(".", 0).unwrap(),
            Value::List(vec![Value::Int(97), Value::Int(98)])
        );
        ev.run("pop fclose").unwrap();
        assert!(ev.stack.is_empty());
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.txt").display().to_string();

        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run(&format!(
            "\"{}\" \"w\" fopen \"hello \" fputchars 'x fputch fflush fclose",
            path
        ))
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello x");
    }

    #[test]
    fn test_fremove_and_frename() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        std::fs::write(&a, "x").unwrap();
        let b = dir.path().join("b.txt");

        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run(&format!(
            "\"{}\" \"{}\" frename",
            a.display(),
            b.display()
        ))
        .unwrap();
        assert_eq!(ev.stack.items(), &[Value::Bool(true)]);
        assert!(b.exists());

        ev.stack.clear();
        ev.run(&format!("\"{}\" fremove", b.display())).unwrap();
        assert_eq!(ev.stack.items(), &[Value::Bool(true)]);
        assert!(!b.exists());
    }

    #[test]
    fn test_closed_handle_is_noop_with_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.txt");
        std::fs::write(&path, "data").unwrap();

        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out));
        ev.run(&format!("\"{}\" \"r\" fopen dup fclose", path.display()))
            .unwrap();
        // The surviving copy of the handle is now null.
        ev.run("fgetch").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::Int(-1));
        ev.run("pop fgets").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::List(vec![]));
        ev.run("pop feof").unwrap();
        assert_eq!(*ev.stack.peek(".", 0).unwrap(), Value::Bool(false));
    }
}
