//! Expression serialization.
//!
//! An expression is written in pre-order as one record per node. The record
//! tag gives the node shape and the operator field its [`Oper`] code; child
//! nodes, types and RTLs are nested records inside the body. A record that
//! cannot be understood is logged and dropped, along with every node above
//! it, and the reader carries on after it.

use declift_core::{CodecError, RecordReader, RecordWriter};
use declift_types::{read_type, write_type, TypeEnv};
use log::warn;

use super::{ConstValue, Exp, ExpKind, Oper, Rtl};

pub const CONST_TAG: u8 = b'C';
pub const TERMINAL_TAG: u8 = b't';
pub const UNARY_TAG: u8 = b'U';
pub const BINARY_TAG: u8 = b'B';
pub const TERNARY_TAG: u8 = b'T';
pub const TYPED_TAG: u8 = b'y';
pub const ASSIGN_TAG: u8 = b'A';
pub const FLAG_DEF_TAG: u8 = b'F';
/// Tag of an RTL record. Its operator field holds the RTL's address.
pub const RTL_TAG: u8 = b'R';

/// Append `e` to `w`.
pub fn write_exp(w: &mut RecordWriter, e: &Exp) {
    let op = u64::from(e.oper().code());
    match &e.kind {
        ExpKind::Const(value) => w.record(CONST_TAG, op, |w| match value {
            ConstValue::Int(k) => w.write_sleb(i64::from(*k)),
            ConstValue::Float(f) => w.write_f64(*f),
            ConstValue::Str(s) => w.write_str(s),
            ConstValue::CodeAddr(a) => w.write_uleb(u64::from(*a)),
        }),
        ExpKind::Terminal(_) => w.record(TERMINAL_TAG, op, |_| {}),
        ExpKind::Unary { sub1, .. } => w.record(UNARY_TAG, op, |w| write_exp(w, sub1)),
        ExpKind::Binary { sub1, sub2, .. } => w.record(BINARY_TAG, op, |w| {
            write_exp(w, sub1);
            write_exp(w, sub2);
        }),
        ExpKind::Ternary { sub1, sub2, sub3, .. } => w.record(TERNARY_TAG, op, |w| {
            write_exp(w, sub1);
            write_exp(w, sub2);
            write_exp(w, sub3);
        }),
        ExpKind::Typed { ty, sub1 } => w.record(TYPED_TAG, op, |w| {
            write_type(w, ty);
            write_exp(w, sub1);
        }),
        ExpKind::Assign { size, lhs, rhs } => w.record(ASSIGN_TAG, op, |w| {
            w.write_uleb(u64::from(*size));
            write_exp(w, lhs);
            write_exp(w, rhs);
        }),
        ExpKind::FlagDef { params, rtl } => w.record(FLAG_DEF_TAG, op, |w| {
            write_exp(w, params);
            write_rtl(w, rtl);
        }),
    }
}

fn write_rtl(w: &mut RecordWriter, rtl: &Rtl) {
    w.record(RTL_TAG, u64::from(rtl.address), |w| {
        w.write_uleb(rtl.exps.len() as u64);
        for e in &rtl.exps {
            write_exp(w, e);
        }
    });
}

/// Serialize a single expression.
pub fn encode_exp(e: &Exp) -> Vec<u8> {
    let mut w = RecordWriter::new();
    write_exp(&mut w, e);
    w.into_bytes()
}

/// Read the next expression record. Named types are bound to `env`.
///
/// Returns `Ok(None)` when the record or anything nested in it could not be
/// understood; the reader is still positioned after the record. Malformed
/// framing is an error.
pub fn read_exp(r: &mut RecordReader<'_>, env: &TypeEnv) -> Result<Option<Exp>, CodecError> {
    let mut record = r.read_record()?;
    let Some(op) = Oper::from_code(record.oper) else {
        warn!("skipping expression record with unknown operator {}", record.oper);
        return Ok(None);
    };

    let body = &mut record.body;
    let e = match record.tag {
        CONST_TAG => match op {
            Oper::IntConst => {
                let k = i32::try_from(body.read_sleb()?)
                    .map_err(|_| CodecError::InvalidValue("integer constant out of range"))?;
                Exp::int(k)
            }
            Oper::FltConst => Exp::float(body.read_f64()?),
            Oper::StrConst => Exp::str(body.read_str()?),
            Oper::CodeAddr => {
                let a = u32::try_from(body.read_uleb()?)
                    .map_err(|_| CodecError::InvalidValue("code address out of range"))?;
                Exp::code_addr(a)
            }
            _ => {
                warn!("skipping constant record with operator {}", op);
                return Ok(None);
            }
        },
        TERMINAL_TAG => Exp::terminal(op),
        UNARY_TAG => match read_exp(body, env)? {
            Some(sub1) => Exp::unary(op, sub1),
            None => return Ok(None),
        },
        BINARY_TAG => match (read_exp(body, env)?, read_exp(body, env)?) {
            (Some(sub1), Some(sub2)) => Exp::binary(op, sub1, sub2),
            _ => return Ok(None),
        },
        TERNARY_TAG => match (read_exp(body, env)?, read_exp(body, env)?, read_exp(body, env)?) {
            (Some(sub1), Some(sub2), Some(sub3)) => Exp::ternary(op, sub1, sub2, sub3),
            _ => return Ok(None),
        },
        TYPED_TAG => match (read_type(body, env)?, read_exp(body, env)?) {
            (Some(ty), Some(sub1)) => Exp::typed(ty, sub1),
            _ => return Ok(None),
        },
        ASSIGN_TAG => {
            let size = u32::try_from(body.read_uleb()?)
                .map_err(|_| CodecError::InvalidValue("assignment size out of range"))?;
            match (read_exp(body, env)?, read_exp(body, env)?) {
                (Some(lhs), Some(rhs)) => Exp::assign(size, lhs, rhs),
                _ => return Ok(None),
            }
        }
        FLAG_DEF_TAG => match (read_exp(body, env)?, read_rtl(body, env)?) {
            (Some(params), Some(rtl)) => Exp::flag_def(params, rtl),
            _ => return Ok(None),
        },
        tag => {
            warn!("skipping expression record with unknown tag {:#x}", tag);
            return Ok(None);
        }
    };
    Ok(Some(e))
}

fn read_rtl(r: &mut RecordReader<'_>, env: &TypeEnv) -> Result<Option<Rtl>, CodecError> {
    let mut record = r.read_record()?;
    if record.tag != RTL_TAG {
        warn!("skipping record with tag {:#x} where an RTL was expected", record.tag);
        return Ok(None);
    }
    let address = u32::try_from(record.oper).map_err(|_| CodecError::InvalidValue("RTL address out of range"))?;
    let body = &mut record.body;
    let count = body.read_uleb()?;
    let mut exps = Vec::new();
    for _ in 0..count {
        match read_exp(body, env)? {
            Some(e) => exps.push(e),
            None => return Ok(None),
        }
    }
    Ok(Some(Rtl::new(address, exps)))
}

/// Deserialize a single expression.
pub fn decode_exp(data: &[u8], env: &TypeEnv) -> Result<Option<Exp>, CodecError> {
    read_exp(&mut RecordReader::new(data), env)
}
