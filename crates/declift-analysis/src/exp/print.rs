//! Infix rendering of expressions.
//!
//! Sub-expressions of infix operators are parenthesized. Bracketed forms
//! (`r[..]`, `m[..]`) and the function-like operators supply their own
//! delimiters, so their operands are printed bare.

use std::fmt::{self, Write};

use super::{ConstValue, Exp, ExpKind, Oper};

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f)
    }
}

impl Exp {
    /// Render to a string. Same text as `Display`.
    pub fn prints(&self) -> String {
        self.to_string()
    }

    /// Render with the size of a typed node appended in angle brackets,
    /// e.g. `*32* r[8]<32>`.
    pub fn print_typed(&self) -> String {
        let mut s = self.to_string();
        if let ExpKind::Typed { ty, .. } = &self.kind {
            let _ = write!(s, "<{}>", ty.size());
        }
        s
    }

    /// Render for high level output: `r[10]` becomes `r10` and `v[5]`
    /// becomes `v5`. Only a leading bracket pair is collapsed.
    pub fn print_as_hl(&self) -> String {
        let mut s = self.print_typed();
        if s.len() >= 4 && s.as_bytes()[1] == b'[' {
            s.remove(1);
            s.pop();
        }
        s
    }

    fn print<W: Write>(&self, out: &mut W) -> fmt::Result {
        match &self.kind {
            ExpKind::Const(value) => print_const(value, out),
            ExpKind::Terminal(op) => match op.terminal_str() {
                Some(s) => out.write_str(s),
                None => out.write_str(op.name()),
            },
            ExpKind::Unary { op, sub1 } => print_unary(*op, sub1, out),
            ExpKind::Binary { op, sub1, sub2 } => print_binary(*op, sub1, sub2, out),
            ExpKind::Ternary { op, sub1, sub2, sub3 } => print_ternary(*op, sub1, sub2, sub3, out),
            ExpKind::Typed { ty, sub1 } => {
                write!(out, "*{}* ", ty.size())?;
                sub1.print(out)
            }
            ExpKind::Assign { size, lhs, rhs } => {
                write!(out, "*{}* ", size)?;
                lhs.print(out)?;
                out.write_str(" := ")?;
                rhs.print(out)
            }
            ExpKind::FlagDef { params, rtl } => {
                out.write_str("flagdef(")?;
                params.print(out)?;
                out.write_str(") {")?;
                for (i, e) in rtl.exps.iter().enumerate() {
                    out.write_str(if i == 0 { " " } else { "; " })?;
                    e.print(out)?;
                }
                out.write_str(" }")
            }
        }
    }

    /// Print as the operand of another operator.
    fn printr<W: Write>(&self, out: &mut W) -> fmt::Result {
        let bare = match &self.kind {
            ExpKind::Binary { op, .. } => matches!(op, Oper::Size | Oper::List),
            ExpKind::Ternary { op, .. } => op.ternary_function_str().is_some(),
            _ => true,
        };
        if bare {
            return self.print(out);
        }
        out.write_char('(')?;
        self.print(out)?;
        out.write_char(')')
    }

    /// Strings print without their quotes.
    fn print_no_quotes<W: Write>(&self, out: &mut W) -> fmt::Result {
        match &self.kind {
            ExpKind::Const(ConstValue::Str(s)) => out.write_str(s),
            _ => self.print(out),
        }
    }
}

fn print_const<W: Write>(value: &ConstValue, out: &mut W) -> fmt::Result {
    match value {
        ConstValue::Int(k) => write!(out, "{}", k),
        ConstValue::Float(d) => out.write_str(&format_g(*d)),
        ConstValue::Str(s) => write!(out, "\"{}\"", s),
        ConstValue::CodeAddr(a) => write!(out, "0x{:x}", a),
    }
}

fn print_unary<W: Write>(op: Oper, p1: &Exp, out: &mut W) -> fmt::Result {
    match op {
        Oper::RegOf | Oper::MemOf | Oper::AddrOf | Oper::Var => {
            out.write_str(match op {
                Oper::RegOf => "r[",
                Oper::MemOf => "m[",
                Oper::AddrOf => "a[",
                _ => "v[",
            })?;
            if op == Oper::Var {
                p1.print_no_quotes(out)?;
            } else {
                p1.print(out)?;
            }
            out.write_char(']')
        }
        Oper::Not | Oper::LNot | Oper::Neg => {
            out.write_str(match op {
                Oper::Not => "~",
                Oper::LNot => "L~",
                _ => "-",
            })?;
            p1.printr(out)
        }
        Oper::SignExt => {
            p1.printr(out)?;
            out.write_char('!')
        }
        Oper::SgnEx => {
            p1.printr(out)?;
            out.write_str("! ")
        }
        Oper::Temp | Oper::Local | Oper::Param => p1.print_no_quotes(out),
        Oper::Phi => {
            out.write_str("phi(")?;
            p1.print(out)?;
            out.write_char(')')
        }
        _ => {
            let name = op.unary_function_str().unwrap_or_else(|| op.name());
            write!(out, "{}(", name)?;
            p1.printr(out)?;
            out.write_char(')')
        }
    }
}

fn print_binary<W: Write>(op: Oper, p1: &Exp, p2: &Exp, out: &mut W) -> fmt::Result {
    match op {
        Oper::Size => {
            p2.printr(out)?;
            out.write_char('{')?;
            p1.printr(out)?;
            out.write_char('}')
        }
        Oper::FlagCall => {
            p1.print_no_quotes(out)?;
            out.write_str("( ")?;
            p2.printr(out)?;
            out.write_str(" )")
        }
        Oper::ExpTable | Oper::NameTable => {
            out.write_str(if op == Oper::ExpTable { "exptable(" } else { "nametable(" })?;
            p1.print(out)?;
            out.write_str(", ")?;
            p2.print(out)?;
            out.write_char(')')
        }
        Oper::List => {
            p1.print(out)?;
            if !p2.is_nil() {
                out.write_str(", ")?;
            }
            p2.print(out)
        }
        Oper::Subscript => {
            p1.printr(out)?;
            out.write_char('.')?;
            p2.print(out)
        }
        _ => {
            p1.printr(out)?;
            match op.infix_str() {
                Some(s) => write!(out, " {} ", s)?,
                None => write!(out, " {} ", op.name())?,
            }
            p2.printr(out)
        }
    }
}

fn print_ternary<W: Write>(op: Oper, p1: &Exp, p2: &Exp, p3: &Exp, out: &mut W) -> fmt::Result {
    if let Some(name) = op.ternary_function_str() {
        write!(out, "{}(", name)?;
        p1.print(out)?;
        out.write_char(',')?;
        p2.print(out)?;
        out.write_char(',')?;
        p3.print(out)?;
        return out.write_char(')');
    }
    p1.printr(out)?;
    match op {
        Oper::Tern => {
            out.write_str(" ? ")?;
            p2.printr(out)?;
            out.write_str(" : ")?;
            p3.print(out)
        }
        Oper::At => {
            out.write_char('@')?;
            p2.printr(out)?;
            out.write_char(':')?;
            p3.printr(out)
        }
        _ => {
            write!(out, " {} ", op.name())?;
            p2.printr(out)?;
            out.write_str(", ")?;
            p3.printr(out)
        }
    }
}

/// Format a float like C's `%g`: six significant digits, trailing zeros
/// dropped, scientific notation for very small or large magnitudes.
pub(crate) fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.5e}", value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs());
    }
    let decimals = (5 - exp).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
