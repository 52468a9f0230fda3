//! Decompiler type representation.
//!
//! Types model partial knowledge: an integer may still have unknown size or
//! signedness, a [`Type::Size`] only records a width, and a [`Type::Union`]
//! holds alternatives that could not be reconciled. Types are shared through
//! [`SharedType`], a reference-counted cell. Mutating a shared type in place
//! (`set_size`, compound member updates) is visible to every holder; callers
//! that need an independent copy call [`SharedType::deep_clone`] first.
//! Lattice operations (`meet_with`, `merge_with`, `create_union`) never
//! mutate their operands and return either an existing handle or a new one.

use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::compound::CompoundType;
use crate::env::EnvRef;

/// Width of a pointer, in bits.
pub const STD_SIZE: usize = 32;

/// Length of an array whose bound is not known.
pub const NO_BOUND: usize = 9_999_999;

/// Kind tag of a type. The declaration order is the ordering used by
/// [`Type::cmp_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeKind {
    Void = 0,
    Func = 1,
    Boolean = 2,
    Char = 3,
    Integer = 4,
    Float = 5,
    Pointer = 6,
    Array = 7,
    Named = 8,
    Compound = 9,
    Union = 10,
    Size = 11,
    Upper = 12,
    Lower = 13,
}

impl TypeKind {
    const ALL: [TypeKind; 14] = [
        TypeKind::Void,
        TypeKind::Func,
        TypeKind::Boolean,
        TypeKind::Char,
        TypeKind::Integer,
        TypeKind::Float,
        TypeKind::Pointer,
        TypeKind::Array,
        TypeKind::Named,
        TypeKind::Compound,
        TypeKind::Union,
        TypeKind::Size,
        TypeKind::Upper,
        TypeKind::Lower,
    ];

    /// Serialized code of this kind.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Kind for a serialized code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeKind::Void => "void",
            TypeKind::Func => "function",
            TypeKind::Boolean => "boolean",
            TypeKind::Char => "char",
            TypeKind::Integer => "integer",
            TypeKind::Float => "float",
            TypeKind::Pointer => "pointer",
            TypeKind::Array => "array",
            TypeKind::Named => "named",
            TypeKind::Compound => "compound",
            TypeKind::Union => "union",
            TypeKind::Size => "size",
            TypeKind::Upper => "upper",
            TypeKind::Lower => "lower",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type in the lattice.
#[derive(Debug)]
pub enum Type {
    /// Bottom of the lattice: nothing is known.
    Void,
    /// Function (code) type.
    Func(FuncType),
    Boolean,
    Char,
    /// Integer with possibly unknown size (0) and signedness (0).
    Integer(IntegerType),
    Float(FloatType),
    Pointer(PointerType),
    Array(ArrayType),
    /// Alias resolved through a [`TypeEnv`](crate::TypeEnv).
    Named(NamedType),
    Compound(CompoundType),
    Union(UnionType),
    /// Only the width is known.
    Size(SizeType),
    /// Upper half of the base type.
    Upper(SharedType),
    /// Lower half of the base type.
    Lower(SharedType),
}

/// Integer type.
///
/// `signedness` is positive for signed, negative for unsigned and zero when
/// unknown. Only its sign is significant for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerType {
    /// Size in bits, 0 if unknown.
    pub size: usize,
    pub signedness: i32,
}

impl IntegerType {
    pub fn new(size: usize, signedness: i32) -> Self {
        Self { size, signedness }
    }

    /// True unless known to be unsigned.
    pub fn is_signed(&self) -> bool {
        self.signedness >= 0
    }

    /// True unless known to be signed.
    pub fn is_unsigned(&self) -> bool {
        self.signedness <= 0
    }

    /// Record one more piece of evidence that the value is signed
    /// (`bump_signed(1)`) or unsigned (`bump_signed(-1)`).
    pub fn bump_signed(&mut self, delta: i32) {
        self.signedness += delta;
    }
}

/// Floating point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatType {
    pub size: usize,
}

/// Size-only type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeType {
    pub size: usize,
}

/// Pointer type.
#[derive(Debug)]
pub struct PointerType {
    pub points_to: SharedType,
}

/// Array type.
#[derive(Debug)]
pub struct ArrayType {
    pub base: SharedType,
    /// Element count, [`NO_BOUND`] when unknown.
    pub length: usize,
}

impl ArrayType {
    pub fn is_unbounded(&self) -> bool {
        self.length == NO_BOUND
    }

    /// Element count that keeps the array's byte size when its elements
    /// become `new_base`. Void elements count as one byte.
    pub fn convert_length(&self, new_base: &SharedType) -> usize {
        if self.is_unbounded() {
            return NO_BOUND;
        }
        let old_bytes = (self.base.size() / 8).max(1) * self.length;
        let new_elem = (new_base.size() / 8).max(1);
        old_bytes / new_elem
    }

    /// Replace the element type, converting the length so the byte size is
    /// preserved.
    pub fn set_base(&mut self, base: SharedType) {
        self.length = self.convert_length(&base);
        self.base = base;
    }
}

/// A named alias. Resolution goes through the environment that created it.
pub struct NamedType {
    pub(crate) name: String,
    pub(crate) env: EnvRef,
}

impl NamedType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type this alias ultimately refers to, following alias chains.
    /// Returns `None` for unknown names, cycles, or a dropped environment.
    pub fn resolves_to(&self) -> Option<SharedType> {
        self.env.resolve(&self.name)
    }

    fn deep_clone(&self) -> NamedType {
        NamedType {
            name: self.name.clone(),
            env: self.env.clone(),
        }
    }
}

impl fmt::Debug for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedType").field(&self.name).finish()
    }
}

/// A function parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: SharedType,
}

/// Function signature carried by [`Type::Func`].
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub returns: Vec<SharedType>,
    pub params: Vec<Parameter>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            returns: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn with_return(mut self, ty: SharedType) -> Self {
        self.returns.push(ty);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: SharedType) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            ty,
        });
        self
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.returns == other.returns
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }
}

/// Function type.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub signature: Option<Signature>,
}

/// One alternative of a union.
#[derive(Debug)]
pub struct UnionElement {
    pub ty: SharedType,
    pub name: String,
}

/// Union of alternatives.
///
/// Alternatives are de-duplicated by their (non-final) C rendering, so two
/// distinct types that render identically collapse into one member.
#[derive(Debug, Default)]
pub struct UnionType {
    members: Vec<UnionElement>,
}

impl UnionType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[UnionElement] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add an alternative. Nested unions are flattened. Returns whether a
    /// new member was added.
    pub fn add_type(&mut self, ty: SharedType, name: impl Into<String>) -> bool {
        if let Type::Union(nested) = &*ty.borrow() {
            let mut added = false;
            for member in &nested.members {
                added |= self.add_type(member.ty.clone(), member.name.clone());
            }
            return added;
        }
        let key = ty.ctype(false);
        if self.members.iter().any(|m| m.ty.ctype(false) == key) {
            return false;
        }
        self.members.push(UnionElement {
            ty,
            name: name.into(),
        });
        true
    }

    /// Add an alternative under a generated member name.
    pub fn add_alternative(&mut self, ty: SharedType) -> bool {
        let name = format!("x{}", self.members.len());
        self.add_type(ty, name)
    }

    /// Index of the member equal to `ty`.
    pub fn find_type(&self, ty: &SharedType) -> Option<usize> {
        self.members.iter().position(|m| m.ty == *ty)
    }

    pub(crate) fn set_member_type(&mut self, index: usize, ty: SharedType) {
        self.members[index].ty = ty;
    }

    pub(crate) fn deep_clone(&self) -> UnionType {
        UnionType {
            members: self
                .members
                .iter()
                .map(|m| UnionElement {
                    ty: m.ty.deep_clone(),
                    name: m.name.clone(),
                })
                .collect(),
        }
    }
}

impl Type {
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Void => TypeKind::Void,
            Type::Func(_) => TypeKind::Func,
            Type::Boolean => TypeKind::Boolean,
            Type::Char => TypeKind::Char,
            Type::Integer(_) => TypeKind::Integer,
            Type::Float(_) => TypeKind::Float,
            Type::Pointer(_) => TypeKind::Pointer,
            Type::Array(_) => TypeKind::Array,
            Type::Named(_) => TypeKind::Named,
            Type::Compound(_) => TypeKind::Compound,
            Type::Union(_) => TypeKind::Union,
            Type::Size(_) => TypeKind::Size,
            Type::Upper(_) => TypeKind::Upper,
            Type::Lower(_) => TypeKind::Lower,
        }
    }

    /// Integer-like type for a width: 1 bit is a boolean, 8 bits not known
    /// to be unsigned is a char, anything else an integer.
    pub fn new_integer_like(size: usize, signedness: i32) -> Type {
        match size {
            1 => Type::Boolean,
            8 if signedness >= 0 => Type::Char,
            _ => Type::Integer(IntegerType::new(size, signedness)),
        }
    }

    /// Size in bits.
    pub fn size(&self) -> usize {
        match self {
            Type::Void | Type::Func(_) => 0,
            Type::Boolean => 1,
            Type::Char => 8,
            Type::Integer(i) => i.size,
            Type::Float(f) => f.size,
            Type::Size(s) => s.size,
            Type::Pointer(_) => STD_SIZE,
            Type::Array(a) => a.base.size().saturating_mul(a.length),
            Type::Named(n) => match n.resolves_to() {
                Some(ty) => ty.size(),
                None => {
                    debug!("unknown size for named type {}", n.name);
                    0
                }
            },
            Type::Compound(c) => c.size(),
            Type::Union(u) => u.members.iter().map(|m| m.ty.size()).max().unwrap_or(0),
            Type::Upper(base) | Type::Lower(base) => base.size() / 2,
        }
    }

    /// Size in bytes, rounded up.
    pub fn bytes(&self) -> usize {
        (self.size() + 7) / 8
    }

    /// Change the width of a sized type.
    ///
    /// For halves the base is resized to twice `size`, so both halves stay
    /// consistent.
    ///
    /// # Panics
    ///
    /// Panics for kinds without an adjustable width, and for pointers when
    /// `size` is not [`STD_SIZE`].
    pub fn set_size(&mut self, size: usize) {
        match self {
            Type::Integer(i) => i.size = size,
            Type::Float(f) => f.size = size,
            Type::Size(s) => s.size = size,
            Type::Pointer(_) => assert_eq!(size, STD_SIZE, "pointers are {} bits", STD_SIZE),
            Type::Upper(base) | Type::Lower(base) => base.borrow_mut().set_size(size * 2),
            Type::Named(n) => match n.resolves_to() {
                Some(ty) => ty.borrow_mut().set_size(size),
                None => debug!("set_size on unresolved named type {}", n.name),
            },
            other => panic!("set_size({}) on {} type", size, other.kind()),
        }
    }

    /// False while essential information (sign, width, base type) is still
    /// unknown.
    pub fn is_complete(&self) -> bool {
        match self {
            Type::Integer(i) => i.signedness != 0 && i.size != 0,
            Type::Size(_) => false,
            Type::Upper(base) | Type::Lower(base) => base.is_complete(),
            Type::Named(n) => n.resolves_to().map_or(true, |ty| ty.is_complete()),
            _ => true,
        }
    }

    /// C rendering. With `final_form` false, guesses are marked with
    /// comments instead of silently picking a default.
    pub fn ctype(&self, final_form: bool) -> String {
        match self {
            Type::Void => "void".to_string(),
            Type::Boolean => "bool".to_string(),
            Type::Char => "char".to_string(),
            Type::Integer(i) => integer_ctype(i, final_form),
            Type::Float(f) => match f.size {
                32 => "float".to_string(),
                _ => "double".to_string(),
            },
            Type::Pointer(p) => {
                let mut s = p.points_to.ctype(final_form);
                if p.points_to.borrow().kind() == TypeKind::Pointer {
                    s.push('*');
                } else {
                    s.push_str(" *");
                }
                s
            }
            Type::Array(a) => {
                let len = if a.is_unbounded() {
                    String::new()
                } else {
                    a.length.to_string()
                };
                format!("{}[{}]", a.base.ctype(final_form), len)
            }
            Type::Named(n) => n.name.clone(),
            Type::Compound(c) => {
                let mut s = String::from("struct { ");
                for field in c.fields() {
                    s.push_str(&field.ty.ctype(final_form));
                    if !field.name.is_empty() {
                        s.push(' ');
                        s.push_str(&field.name);
                    }
                    s.push_str("; ");
                }
                s.push('}');
                s
            }
            Type::Union(u) => {
                let mut s = String::from("union { ");
                for member in &u.members {
                    s.push_str(&member.ty.ctype(final_form));
                    s.push(' ');
                    s.push_str(&member.name);
                    s.push_str("; ");
                }
                s.push('}');
                s
            }
            Type::Size(s) => format!("__size{}", s.size),
            Type::Upper(base) => format!("/*upper*/({})", base.ctype(final_form)),
            Type::Lower(base) => format!("/*lower*/({})", base.ctype(final_form)),
            Type::Func(func) => match &func.signature {
                None => "void (void)".to_string(),
                Some(sig) => {
                    let ret = sig
                        .returns
                        .first()
                        .map_or_else(|| "void".to_string(), |t| t.ctype(final_form));
                    let params = sig
                        .params
                        .iter()
                        .map(|p| p.ty.ctype(final_form))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{} ({})", ret, params)
                }
            },
        }
    }

    /// Prefix used when naming temporaries of this type.
    pub fn temp_name(&self) -> &'static str {
        match self {
            Type::Integer(i) => match i.size {
                1 | 8 => "tmpb",
                16 => "tmph",
                32 => "tmpi",
                64 => "tmpl",
                _ => "tmp",
            },
            Type::Float(f) => match f.size {
                32 => "tmpf",
                64 => "tmpd",
                80 => "tmpF",
                128 => "tmpD",
                _ => "tmp",
            },
            _ => "tmp",
        }
    }

    /// Total order: kind first, then kind specific fields.
    pub fn cmp_order(&self, other: &Type) -> Ordering {
        let by_kind = self.kind().cmp(&other.kind());
        if by_kind != Ordering::Equal {
            return by_kind;
        }
        match (self, other) {
            (Type::Integer(a), Type::Integer(b)) => a
                .size
                .cmp(&b.size)
                .then(a.signedness.cmp(&b.signedness)),
            (Type::Float(a), Type::Float(b)) => a.size.cmp(&b.size),
            (Type::Size(a), Type::Size(b)) => a.size.cmp(&b.size),
            (Type::Pointer(a), Type::Pointer(b)) => a.points_to.cmp_order(&b.points_to),
            (Type::Array(a), Type::Array(b)) => a
                .base
                .cmp_order(&b.base)
                .then(a.length.cmp(&b.length)),
            (Type::Named(a), Type::Named(b)) => a.name.cmp(&b.name),
            (Type::Compound(a), Type::Compound(b)) => a.size().cmp(&b.size()).then_with(|| {
                for (fa, fb) in a.fields().iter().zip(b.fields()) {
                    let ord = fa.ty.cmp_order(&fb.ty).then_with(|| fa.name.cmp(&fb.name));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }),
            (Type::Union(a), Type::Union(b)) => a.len().cmp(&b.len()),
            (Type::Upper(a), Type::Upper(b)) | (Type::Lower(a), Type::Lower(b)) => a.cmp_order(b),
            (Type::Func(a), Type::Func(b)) => {
                let name = |f: &FuncType| f.signature.as_ref().map(|s| s.name.clone());
                name(a).cmp(&name(b))
            }
            _ => Ordering::Equal,
        }
    }

    /// Copy that shares nothing with `self`.
    pub fn deep_clone(&self) -> Type {
        match self {
            Type::Void => Type::Void,
            Type::Boolean => Type::Boolean,
            Type::Char => Type::Char,
            Type::Func(f) => Type::Func(f.clone()),
            Type::Integer(i) => Type::Integer(*i),
            Type::Float(f) => Type::Float(*f),
            Type::Size(s) => Type::Size(*s),
            Type::Pointer(p) => Type::Pointer(PointerType {
                points_to: p.points_to.deep_clone(),
            }),
            Type::Array(a) => Type::Array(ArrayType {
                base: a.base.deep_clone(),
                length: a.length,
            }),
            Type::Named(n) => Type::Named(n.deep_clone()),
            Type::Compound(c) => Type::Compound(c.deep_clone()),
            Type::Union(u) => Type::Union(u.deep_clone()),
            Type::Upper(base) => Type::Upper(base.deep_clone()),
            Type::Lower(base) => Type::Lower(base.deep_clone()),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Type::Compound(_))
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Type::Union(_))
    }

    /// The compound behind this type.
    ///
    /// # Panics
    ///
    /// Panics if the type is not a compound.
    pub fn as_compound(&self) -> &CompoundType {
        match self {
            Type::Compound(c) => c,
            other => panic!("expected a compound type, found {}", other.kind()),
        }
    }

    /// The array behind this type.
    ///
    /// # Panics
    ///
    /// Panics if the type is not an array.
    pub fn as_array(&self) -> &ArrayType {
        match self {
            Type::Array(a) => a,
            other => panic!("expected an array type, found {}", other.kind()),
        }
    }

    /// The pointer behind this type.
    ///
    /// # Panics
    ///
    /// Panics if the type is not a pointer.
    pub fn as_pointer(&self) -> &PointerType {
        match self {
            Type::Pointer(p) => p,
            other => panic!("expected a pointer type, found {}", other.kind()),
        }
    }
}

fn integer_ctype(i: &IntegerType, final_form: bool) -> String {
    if i.signedness >= 0 {
        let mut s = String::new();
        if !final_form && i.signedness == 0 {
            s.push_str("/*signed?*/");
        }
        match i.size {
            32 => s.push_str("int"),
            16 => s.push_str("short"),
            8 => s.push_str("char"),
            1 => s.push_str("bool"),
            64 => s.push_str("long long"),
            _ => {
                if !final_form {
                    s.push('?');
                }
                s.push_str("int");
            }
        }
        s
    } else {
        match i.size {
            32 => "unsigned int".to_string(),
            16 => "unsigned short".to_string(),
            8 => "unsigned char".to_string(),
            1 => "bool".to_string(),
            64 => "unsigned long long".to_string(),
            _ if final_form => "unsigned int".to_string(),
            _ => "?unsigned int".to_string(),
        }
    }
}

impl PartialEq for Type {
    /// Structural equality. An integer or float of unknown size (0) matches
    /// any width; integer signedness compares by sign only.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Void, Type::Void)
            | (Type::Boolean, Type::Boolean)
            | (Type::Char, Type::Char) => true,
            (Type::Func(a), Type::Func(b)) => a == b,
            (Type::Integer(a), Type::Integer(b)) => {
                (a.size == 0 || b.size == 0 || a.size == b.size)
                    && a.signedness.signum() == b.signedness.signum()
            }
            (Type::Float(a), Type::Float(b)) => a.size == 0 || b.size == 0 || a.size == b.size,
            (Type::Size(a), Type::Size(b)) => a.size == b.size,
            (Type::Pointer(a), Type::Pointer(b)) => a.points_to == b.points_to,
            (Type::Array(a), Type::Array(b)) => a.base == b.base && a.length == b.length,
            (Type::Named(a), Type::Named(b)) => a.name == b.name,
            (Type::Compound(a), Type::Compound(b)) => {
                a.len() == b.len()
                    && a.fields()
                        .iter()
                        .zip(b.fields())
                        .all(|(fa, fb)| fa.ty == fb.ty)
            }
            (Type::Union(a), Type::Union(b)) => {
                a.len() == b.len() && a.members.iter().all(|m| b.find_type(&m.ty).is_some())
            }
            (Type::Upper(a), Type::Upper(b)) | (Type::Lower(a), Type::Lower(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ctype(false))
    }
}

/// Shared, interior-mutable handle to a [`Type`].
#[derive(Clone)]
pub struct SharedType(Rc<RefCell<Type>>);

impl SharedType {
    pub fn new(ty: Type) -> Self {
        SharedType(Rc::new(RefCell::new(ty)))
    }

    pub fn void() -> Self {
        Self::new(Type::Void)
    }

    pub fn boolean() -> Self {
        Self::new(Type::Boolean)
    }

    pub fn char() -> Self {
        Self::new(Type::Char)
    }

    pub fn integer(size: usize, signedness: i32) -> Self {
        Self::new(Type::Integer(IntegerType::new(size, signedness)))
    }

    pub fn float(size: usize) -> Self {
        Self::new(Type::Float(FloatType { size }))
    }

    pub fn size_only(size: usize) -> Self {
        Self::new(Type::Size(SizeType { size }))
    }

    pub fn pointer(points_to: SharedType) -> Self {
        Self::new(Type::Pointer(PointerType { points_to }))
    }

    pub fn array(base: SharedType, length: usize) -> Self {
        Self::new(Type::Array(ArrayType { base, length }))
    }

    pub fn unbounded_array(base: SharedType) -> Self {
        Self::array(base, NO_BOUND)
    }

    pub fn func(signature: Option<Signature>) -> Self {
        Self::new(Type::Func(FuncType { signature }))
    }

    pub fn compound(compound: CompoundType) -> Self {
        Self::new(Type::Compound(compound))
    }

    pub fn union(union: UnionType) -> Self {
        Self::new(Type::Union(union))
    }

    pub fn upper(base: SharedType) -> Self {
        Self::new(Type::Upper(base))
    }

    pub fn lower(base: SharedType) -> Self {
        Self::new(Type::Lower(base))
    }

    pub fn new_integer_like(size: usize, signedness: i32) -> Self {
        Self::new(Type::new_integer_like(size, signedness))
    }

    pub fn borrow(&self) -> Ref<'_, Type> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Type> {
        self.0.borrow_mut()
    }

    /// Whether both handles refer to the same type object.
    pub fn ptr_eq(&self, other: &SharedType) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Independent copy; nothing is shared with `self`.
    pub fn deep_clone(&self) -> SharedType {
        SharedType::new(self.borrow().deep_clone())
    }

    pub fn kind(&self) -> TypeKind {
        self.borrow().kind()
    }

    pub fn size(&self) -> usize {
        self.borrow().size()
    }

    pub fn bytes(&self) -> usize {
        self.borrow().bytes()
    }

    /// Resize in place; visible to every holder of this handle.
    pub fn set_size(&self, size: usize) {
        self.borrow_mut().set_size(size);
    }

    pub fn is_complete(&self) -> bool {
        self.borrow().is_complete()
    }

    pub fn ctype(&self, final_form: bool) -> String {
        self.borrow().ctype(final_form)
    }

    pub fn temp_name(&self) -> &'static str {
        self.borrow().temp_name()
    }

    pub fn cmp_order(&self, other: &SharedType) -> Ordering {
        self.borrow().cmp_order(&other.borrow())
    }

    /// Follow named aliases. Returns `self` when this is not an alias or
    /// when the alias cannot be resolved.
    pub fn resolve(&self) -> SharedType {
        let target = match &*self.borrow() {
            Type::Named(n) => n.resolves_to(),
            _ => None,
        };
        target.unwrap_or_else(|| self.clone())
    }

    /// Kind after alias resolution.
    pub fn resolved_kind(&self) -> TypeKind {
        self.resolve().kind()
    }

    pub fn resolves_to(&self, kind: TypeKind) -> bool {
        self.resolved_kind() == kind
    }

    pub fn resolves_to_void(&self) -> bool {
        self.resolves_to(TypeKind::Void)
    }

    pub fn resolves_to_integer(&self) -> bool {
        self.resolves_to(TypeKind::Integer)
    }

    pub fn resolves_to_pointer(&self) -> bool {
        self.resolves_to(TypeKind::Pointer)
    }

    pub fn resolves_to_compound(&self) -> bool {
        self.resolves_to(TypeKind::Compound)
    }

    pub fn resolves_to_array(&self) -> bool {
        self.resolves_to(TypeKind::Array)
    }

    pub fn resolves_to_union(&self) -> bool {
        self.resolves_to(TypeKind::Union)
    }

    /// Whether this is an array without a known bound.
    pub fn is_unbounded_array(&self) -> bool {
        matches!(&*self.resolve().borrow(), Type::Array(a) if a.is_unbounded())
    }

    /// Borrow the compound behind this handle.
    ///
    /// # Panics
    ///
    /// Panics if the type is not a compound.
    pub fn compound_ref(&self) -> Ref<'_, CompoundType> {
        Ref::map(self.borrow(), Type::as_compound)
    }

    /// Mutably borrow the compound behind this handle.
    ///
    /// # Panics
    ///
    /// Panics if the type is not a compound.
    pub fn compound_mut(&self) -> RefMut<'_, CompoundType> {
        RefMut::map(self.borrow_mut(), |ty| match ty {
            Type::Compound(c) => c,
            other => panic!("expected a compound type, found {}", other.kind()),
        })
    }

    /// Mutably borrow the array behind this handle.
    ///
    /// # Panics
    ///
    /// Panics if the type is not an array.
    pub fn array_mut(&self) -> RefMut<'_, ArrayType> {
        RefMut::map(self.borrow_mut(), |ty| match ty {
            Type::Array(a) => a,
            other => panic!("expected an array type, found {}", other.kind()),
        })
    }

    /// Number of pointer levels before a non-pointer pointee.
    pub fn pointer_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.clone();
        loop {
            let next = match &*current.borrow() {
                Type::Pointer(p) => p.points_to.clone(),
                _ => return depth,
            };
            depth += 1;
            current = next;
        }
    }

    /// Innermost pointee of a chain of pointers.
    pub fn final_points_to(&self) -> SharedType {
        let mut current = self.clone();
        loop {
            let next = match &*current.borrow() {
                Type::Pointer(p) => p.points_to.clone(),
                _ => break,
            };
            current = next;
        }
        current
    }

    /// Whether this is a pointer to a fresh type variable (`alphaN`).
    pub fn points_to_alpha(&self) -> bool {
        match &*self.borrow() {
            Type::Pointer(p) => {
                matches!(&*p.points_to.borrow(), Type::Named(n) if n.name.starts_with("alpha"))
            }
            _ => false,
        }
    }

    /// Pointer to char, or pointer to an array of char.
    pub fn is_c_string(&self) -> bool {
        let resolved = self.resolve();
        let pointee = match &*resolved.borrow() {
            Type::Pointer(p) => p.points_to.resolve(),
            _ => return false,
        };
        let element = match &*pointee.borrow() {
            Type::Char => return true,
            Type::Array(a) => a.base.clone(),
            _ => return false,
        };
        element.resolved_kind() == TypeKind::Char
    }

    /// Type obtained by dereferencing a value of this type: the pointee of
    /// a pointer, the union of the members' pointees for a union, `Void`
    /// for anything else.
    pub fn dereference(&self) -> SharedType {
        let resolved = self.resolve();
        let ty = resolved.borrow();
        match &*ty {
            Type::Pointer(p) => p.points_to.clone(),
            Type::Union(u) => {
                let mut result = UnionType::new();
                for member in u.members() {
                    result.add_alternative(member.ty.dereference().deep_clone());
                }
                SharedType::union(result)
            }
            _ => SharedType::void(),
        }
    }
}

impl PartialEq for SharedType {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.borrow() == *other.borrow()
    }
}

impl From<Type> for SharedType {
    fn from(ty: Type) -> Self {
        SharedType::new(ty)
    }
}

impl fmt::Debug for SharedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.borrow(), f)
    }
}

impl fmt::Display for SharedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.borrow(), f)
    }
}
