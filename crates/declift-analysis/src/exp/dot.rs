//! Graphviz export of expression trees, for debugging.
//!
//! Each node is named after its address, `e` followed by hex digits, so two
//! dumps of the same live tree agree on node names.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use declift_core::output::dot::{escape_record_field, format_port_edge};
use declift_core::DotConfig;
use log::warn;

use super::print::format_g;
use super::{ConstValue, Exp, ExpKind, Oper};

impl Exp {
    /// Write this tree as `digraph Exp`.
    pub fn write_dot<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let config = DotConfig::expression();
        out.write_all(config.header("Exp").as_bytes())?;
        self.append_dot(out)?;
        out.write_all(config.footer().as_bytes())
    }

    /// Write this tree to a new DOT file at `path`. A file that cannot be
    /// written is reported through the log.
    pub fn create_dot_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let result = File::create(path).and_then(|file| {
            let mut out = BufWriter::new(file);
            self.write_dot(&mut out)?;
            out.flush()
        });
        if let Err(err) = result {
            warn!("could not write dot file {}: {}", path.display(), err);
        }
    }

    fn dot_id(&self) -> String {
        format!("e{:x}", self as *const Exp as usize)
    }

    fn dot_head(&self, name: &str) -> String {
        format!("{}\\n0x{:x}", name, self as *const Exp as usize)
    }

    fn append_dot<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let id = self.dot_id();
        let head = self.dot_head(self.oper().name());
        match &self.kind {
            ExpKind::Const(value) => {
                let text = match value {
                    ConstValue::Int(k) => k.to_string(),
                    ConstValue::Float(f) => format_g(*f),
                    ConstValue::Str(s) => format!("\\\"{}\\\"", escape_record_field(s)),
                    ConstValue::CodeAddr(a) => format!("0x{:x}", a),
                };
                writeln!(out, "    {} [shape=record,label=\"{{{} | {} }}\"];", id, head, text)
            }
            ExpKind::Terminal(op) => {
                let head = if *op == Oper::Wild { self.dot_head("WILD") } else { head };
                writeln!(out, "    {} [shape=parallelogram,label=\"{}\"];", id, head)
            }
            ExpKind::Unary { sub1, .. } => {
                writeln!(out, "    {} [shape=record,label=\"{{{} | <p1> }}\"];", id, head)?;
                self.append_children(out, &[&**sub1])
            }
            ExpKind::Binary { sub1, sub2, .. } => {
                writeln!(out, "    {} [shape=record,label=\"{{{} | {{<p1> | <p2>}} }}\"];", id, head)?;
                self.append_children(out, &[&**sub1, &**sub2])
            }
            ExpKind::Ternary { sub1, sub2, sub3, .. } => {
                writeln!(
                    out,
                    "    {} [shape=record,label=\"{{{} | {{<p1> | <p2> | <p3>}} }}\"];",
                    id, head
                )?;
                self.append_children(out, &[&**sub1, &**sub2, &**sub3])
            }
            ExpKind::Typed { ty, sub1 } => {
                let ctype = escape_record_field(&ty.ctype(false));
                writeln!(out, "    {} [shape=record,label=\"{{{} | {} | <p1> }}\"];", id, head, ctype)?;
                self.append_children(out, &[&**sub1])
            }
            ExpKind::Assign { size, lhs, rhs } => {
                writeln!(
                    out,
                    "    {} [shape=record,label=\"{{{} | {} | {{<p1> | <p2>}} }}\"];",
                    id, head, size
                )?;
                self.append_children(out, &[&**lhs, &**rhs])
            }
            ExpKind::FlagDef { params, rtl } => {
                let ports: String = (0..rtl.len()).map(|i| format!("| <r{}> ", i)).collect();
                writeln!(
                    out,
                    "    {} [shape=record,label=\"{{{} | {{ RTL {}}} | <p1> }}\"];",
                    id, head, ports
                )?;
                self.append_children(out, &[&**params])?;
                for (i, e) in rtl.exps.iter().enumerate() {
                    e.append_dot(out)?;
                    out.write_all(format_port_edge(&id, &format!("r{}", i), &e.dot_id()).as_bytes())?;
                }
                Ok(())
            }
        }
    }

    /// Emit each child followed by the edge from its port `p1`, `p2`, ...
    fn append_children<W: Write>(&self, out: &mut W, children: &[&Exp]) -> io::Result<()> {
        let id = self.dot_id();
        for (i, child) in children.iter().enumerate() {
            child.append_dot(out)?;
            out.write_all(format_port_edge(&id, &format!("p{}", i + 1), &child.dot_id()).as_bytes())?;
        }
        Ok(())
    }
}
