//! Emits the C translation unit for a lowered program.
//!
//! Layout of the generated file: pool storage, pool builder, forward
//! declarations, one function per user word, then `main` wiring runtime
//! init, primitive registration, pool construction, dictionary entries
//! for every user word, and the top-level term sequence.

use std::fmt::Write as _;

use super::converter::{CConst, CItem, CProgram, CTerm};

pub struct Emitter {
    out: String,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter { out: String::new() }
    }

    pub fn emit(mut self, program: &CProgram) -> String {
        self.header();
        self.pool_storage(program);
        self.pool_builder(program);
        self.word_declarations(program);
        self.word_functions(program);
        self.main_function(program);
        self.out
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn header(&mut self) {
        self.line("/* Generated by joy compile - do not edit. */");
        self.line("#include \"joy_runtime.h\"");
        self.line("#include <math.h>");
        self.line("");
    }

    fn pool_storage(&mut self, program: &CProgram) {
        if program.pool.is_empty() {
            return;
        }
        let _ = writeln!(
            self.out,
            "static JoyValue joy_pool[{}];",
            program.pool.len()
        );
        self.line("");
    }

    fn pool_builder(&mut self, program: &CProgram) {
        if program.pool.is_empty() {
            return;
        }
        self.line("static void joy_build_pool(void) {");
        for (index, constant) in program.pool.iter().enumerate() {
            let (items, ctor) = match constant {
                CConst::List(items) => (items, "joy_list_from"),
                CConst::Quotation(items) => (items, "joy_quotation_from"),
            };
            if items.is_empty() {
                let _ = writeln!(self.out, "    joy_pool[{}] = {}(NULL, 0);", index, ctor);
                continue;
            }
            self.line("    {");
            let _ = writeln!(self.out, "        JoyValue items[{}];", items.len());
            for (i, item) in items.iter().enumerate() {
                let _ = writeln!(self.out, "        items[{}] = {};", i, item_expr(item));
            }
            let _ = writeln!(
                self.out,
                "        joy_pool[{}] = {}(items, {});",
                index,
                ctor,
                items.len()
            );
            self.line("    }");
        }
        self.line("}");
        self.line("");
    }

    fn word_declarations(&mut self, program: &CProgram) {
        for def in &program.definitions {
            let _ = writeln!(self.out, "static void {}(JoyContext* ctx);", def.c_name);
        }
        if !program.definitions.is_empty() {
            self.line("");
        }
    }

    fn word_functions(&mut self, program: &CProgram) {
        for def in &program.definitions {
            let _ = writeln!(self.out, "/* {} */", def.name);
            let _ = writeln!(self.out, "static void {}(JoyContext* ctx) {{", def.c_name);
            for term in &def.terms {
                let stmt = term_statement(term);
                let _ = writeln!(self.out, "    {}", stmt);
            }
            self.line("}");
            self.line("");
        }
    }

    fn main_function(&mut self, program: &CProgram) {
        self.line("int main(int argc, char** argv) {");
        self.line("    JoyContext* ctx = joy_context_new();");
        self.line("    joy_register_primitives(ctx);");
        self.line("    joy_set_argv(argc, argv);");
        if !program.pool.is_empty() {
            self.line("    joy_build_pool();");
        }
        for def in &program.definitions {
            let _ = writeln!(
                self.out,
                "    joy_dict_define_quotation(ctx->dictionary, {}, joy_pool[{}].data.seq);",
                c_string(&def.name),
                def.body_pool
            );
        }
        for term in &program.main_terms {
            let stmt = term_statement(term);
            let _ = writeln!(self.out, "    {}", stmt);
        }
        self.line("    joy_context_free(ctx);");
        self.line("    return 0;");
        self.line("}");
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter::new()
    }
}

fn term_statement(term: &CTerm) -> String {
    match term {
        CTerm::PushInt(n) => format!(
            "joy_stack_push(ctx->stack, joy_integer(INT64_C({})));",
            n
        ),
        CTerm::PushFloat(x) => format!("joy_stack_push(ctx->stack, joy_float({}));", float_expr(*x)),
        CTerm::PushBool(b) => format!("joy_stack_push(ctx->stack, joy_boolean({}));", b),
        CTerm::PushChar(c) => format!("joy_stack_push(ctx->stack, joy_char({}));", c_char(*c)),
        CTerm::PushString(s) => {
            format!("joy_stack_push(ctx->stack, joy_string({}));", c_string(s))
        }
        CTerm::PushSet(bits) => format!(
            "joy_stack_push(ctx->stack, joy_set_bits(UINT64_C({:#x})));",
            bits
        ),
        CTerm::PushPool(index) => format!(
            "joy_stack_push(ctx->stack, joy_value_copy(joy_pool[{}]));",
            index
        ),
        CTerm::CallUser(c_name) => format!("{}(ctx);", c_name),
        CTerm::CallSymbol(name) => format!("joy_execute_symbol(ctx, {});", c_string(name)),
        CTerm::Shell(cmd) => format!("joy_shell(ctx, {});", c_string(cmd)),
    }
}

fn item_expr(item: &CItem) -> String {
    match item {
        CItem::Int(n) => format!("joy_integer(INT64_C({}))", n),
        CItem::Float(x) => format!("joy_float({})", float_expr(*x)),
        CItem::Bool(b) => format!("joy_boolean({})", b),
        CItem::Char(c) => format!("joy_char({})", c_char(*c)),
        CItem::String(s) => format!("joy_string({})", c_string(s)),
        CItem::Set(bits) => format!("joy_set_bits(UINT64_C({:#x}))", bits),
        CItem::Symbol(name) => format!("joy_symbol({})", c_string(name)),
        CItem::Pool(index) => format!("joy_value_copy(joy_pool[{}])", index),
    }
}

fn float_expr(x: f64) -> String {
    if x.is_nan() {
        "NAN".to_string()
    } else if x.is_infinite() {
        if x > 0.0 {
            "INFINITY".to_string()
        } else {
            "-INFINITY".to_string()
        }
    } else {
        // {:?} keeps a decimal point or exponent, so this stays a double.
        format!("{:?}", x)
    }
}

fn c_char(c: char) -> String {
    match c {
        '\n' => "'\\n'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\'' => "'\\''".to_string(),
        c if (' '..='~').contains(&c) => format!("'{}'", c),
        other => format!("{}", other as u32),
    }
}

fn c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (' '..='~').contains(&c) => out.push(c),
            other => {
                for byte in other.to_string().bytes() {
                    out.push_str(&format!("\\{:03o}", byte));
                }
            }
        }
    }
    out.push('"');
    out
}
