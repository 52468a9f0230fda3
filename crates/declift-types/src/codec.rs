//! Type serialization.
//!
//! Every type is one record tagged [`TYPE_TAG`] whose operator field is the
//! [`TypeKind`] code; component types are nested records. A record with an
//! unknown kind is logged and skipped, and so is any type that contains one.

use declift_core::{CodecError, RecordReader, RecordWriter};
use log::warn;

use crate::compound::{CompoundType, Field};
use crate::env::TypeEnv;
use crate::types::{FuncType, Parameter, Signature, SharedType, Type, TypeKind, UnionType};

/// Record tag of a serialized type.
pub const TYPE_TAG: u8 = b'Y';

/// Append `ty` to `w`.
pub fn write_type(w: &mut RecordWriter, ty: &SharedType) {
    let t = ty.borrow();
    w.record(TYPE_TAG, u64::from(t.kind().code()), |w| match &*t {
        Type::Void | Type::Boolean | Type::Char => {}
        Type::Integer(i) => {
            w.write_uleb(i.size as u64);
            w.write_sleb(i64::from(i.signedness));
        }
        Type::Float(f) => w.write_uleb(f.size as u64),
        Type::Size(s) => w.write_uleb(s.size as u64),
        Type::Pointer(p) => write_type(w, &p.points_to),
        Type::Array(a) => {
            w.write_uleb(a.length as u64);
            write_type(w, &a.base);
        }
        Type::Named(n) => w.write_str(n.name()),
        Type::Compound(c) => {
            w.write_u8(u8::from(c.is_generic()));
            w.write_uleb(u64::from(c.next_generic_member()));
            w.write_uleb(c.len() as u64);
            for field in c.fields() {
                w.write_str(&field.name);
                write_type(w, &field.ty);
            }
        }
        Type::Union(u) => {
            w.write_uleb(u.len() as u64);
            for member in u.members() {
                w.write_str(&member.name);
                write_type(w, &member.ty);
            }
        }
        Type::Upper(base) | Type::Lower(base) => write_type(w, base),
        Type::Func(func) => match &func.signature {
            None => w.write_u8(0),
            Some(sig) => {
                w.write_u8(1);
                w.write_str(&sig.name);
                w.write_uleb(sig.returns.len() as u64);
                for ret in &sig.returns {
                    write_type(w, ret);
                }
                w.write_uleb(sig.params.len() as u64);
                for param in &sig.params {
                    w.write_str(&param.name);
                    write_type(w, &param.ty);
                }
            }
        },
    });
}

/// Serialize a single type.
pub fn encode_type(ty: &SharedType) -> Vec<u8> {
    let mut w = RecordWriter::new();
    write_type(&mut w, ty);
    w.into_bytes()
}

/// Read the next type record. Named types are bound to `env`.
///
/// Returns `Ok(None)` when the record, or one of its components, could not
/// be understood; the reader is still positioned after the record.
pub fn read_type(r: &mut RecordReader<'_>, env: &TypeEnv) -> Result<Option<SharedType>, CodecError> {
    let mut record = r.read_record()?;
    if record.tag != TYPE_TAG {
        warn!("skipping record with tag {:#x} where a type was expected", record.tag);
        return Ok(None);
    }
    let Some(kind) = u8::try_from(record.oper).ok().and_then(TypeKind::from_code) else {
        warn!("skipping type record of unknown kind {}", record.oper);
        return Ok(None);
    };

    let body = &mut record.body;
    let ty = match kind {
        TypeKind::Void => SharedType::void(),
        TypeKind::Boolean => SharedType::boolean(),
        TypeKind::Char => SharedType::char(),
        TypeKind::Integer => {
            let size = body.read_uleb()? as usize;
            let signedness = i32::try_from(body.read_sleb()?)
                .map_err(|_| CodecError::InvalidValue("integer signedness out of range"))?;
            SharedType::integer(size, signedness)
        }
        TypeKind::Float => SharedType::float(body.read_uleb()? as usize),
        TypeKind::Size => SharedType::size_only(body.read_uleb()? as usize),
        TypeKind::Pointer => match read_type(body, env)? {
            Some(pointee) => SharedType::pointer(pointee),
            None => return Ok(None),
        },
        TypeKind::Array => {
            let length = body.read_uleb()? as usize;
            match read_type(body, env)? {
                Some(base) => SharedType::array(base, length),
                None => return Ok(None),
            }
        }
        TypeKind::Named => env.named(body.read_str()?),
        TypeKind::Compound => {
            let generic = body.read_u8()? != 0;
            let next = u32::try_from(body.read_uleb()?)
                .map_err(|_| CodecError::InvalidValue("generic member counter out of range"))?;
            let count = body.read_uleb()?;
            let mut fields = Vec::new();
            for _ in 0..count {
                let name = body.read_str()?;
                match read_type(body, env)? {
                    Some(ty) => fields.push(Field::new(ty, name)),
                    None => return Ok(None),
                }
            }
            SharedType::compound(CompoundType::from_parts(fields, generic, next))
        }
        TypeKind::Union => {
            let count = body.read_uleb()?;
            let mut union = UnionType::new();
            for _ in 0..count {
                let name = body.read_str()?;
                match read_type(body, env)? {
                    Some(ty) => {
                        union.add_type(ty, name);
                    }
                    None => return Ok(None),
                }
            }
            SharedType::union(union)
        }
        TypeKind::Upper | TypeKind::Lower => match read_type(body, env)? {
            Some(base) if kind == TypeKind::Upper => SharedType::upper(base),
            Some(base) => SharedType::lower(base),
            None => return Ok(None),
        },
        TypeKind::Func => {
            if body.read_u8()? == 0 {
                SharedType::func(None)
            } else {
                let mut sig = Signature::new(body.read_str()?);
                for _ in 0..body.read_uleb()? {
                    match read_type(body, env)? {
                        Some(ty) => sig.returns.push(ty),
                        None => return Ok(None),
                    }
                }
                for _ in 0..body.read_uleb()? {
                    let name = body.read_str()?;
                    match read_type(body, env)? {
                        Some(ty) => sig.params.push(Parameter { name, ty }),
                        None => return Ok(None),
                    }
                }
                SharedType::new(Type::Func(FuncType {
                    signature: Some(sig),
                }))
            }
        }
    };
    Ok(Some(ty))
}

/// Deserialize a single type.
pub fn decode_type(data: &[u8], env: &TypeEnv) -> Result<Option<SharedType>, CodecError> {
    read_type(&mut RecordReader::new(data), env)
}
