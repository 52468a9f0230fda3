//! Type compatibility.
//!
//! Compatibility asks whether two observations could describe the same
//! storage. It is asymmetric at the implementation level: aggregates
//! (compounds, arrays, unions) always decide for themselves, whichever side
//! they are on.

use crate::types::{SharedType, Type, TypeKind, STD_SIZE};

impl SharedType {
    /// Whether `other` is compatible with this type.
    ///
    /// `all` only matters for aggregates: an array or compound is normally
    /// compatible with its element or first member; with `all` set a
    /// compound requires every member to be compatible and an array never
    /// matches a bare element.
    pub fn is_compatible_with(&self, other: &SharedType, all: bool) -> bool {
        match other.resolved_kind() {
            TypeKind::Compound | TypeKind::Array | TypeKind::Union => other.is_compatible(self, all),
            _ => self.is_compatible(other, all),
        }
    }

    /// Compatibility from this type's point of view.
    pub fn is_compatible(&self, other: &SharedType, all: bool) -> bool {
        let other_kind = other.resolved_kind();
        if other_kind == TypeKind::Void {
            return true;
        }

        let this = self.borrow();
        match &*this {
            Type::Void => true,
            Type::Named(named) => {
                if let Type::Named(o) = &*other.borrow() {
                    if o.name == named.name {
                        return true;
                    }
                }
                match named.resolves_to() {
                    Some(target) => target.is_compatible_with(other, all),
                    None => *this == *other.borrow(),
                }
            }
            Type::Union(u) => {
                let other_resolved = other.resolve();
                if self.ptr_eq(&other_resolved) {
                    return true;
                }
                if let Type::Union(ou) = &*other_resolved.borrow() {
                    // Compatible when the smaller is covered by the larger
                    return if u.len() < ou.len() {
                        u.members().iter().all(|m| other_resolved.is_compatible(&m.ty, all))
                    } else {
                        ou.members().iter().all(|m| self.is_compatible(&m.ty, all))
                    };
                }
                u.members().iter().any(|m| other.is_compatible_with(&m.ty, all))
            }
            _ if other_kind == TypeKind::Union => other.is_compatible_with(self, all),
            Type::Boolean => {
                other_kind == TypeKind::Boolean || other_size_is(other, TypeKind::Size, 1)
            }
            Type::Char => match other_kind {
                TypeKind::Char | TypeKind::Integer => true,
                TypeKind::Size => other.size() == 8,
                TypeKind::Array => self.is_compatible_with(&array_base(other), all),
                _ => false,
            },
            Type::Integer(i) => match other_kind {
                TypeKind::Integer | TypeKind::Char => true,
                TypeKind::Size => other.size() == i.size,
                _ => false,
            },
            Type::Float(f) => match other_kind {
                TypeKind::Float => true,
                TypeKind::Size => other.size() == f.size,
                TypeKind::Array => self.is_compatible_with(&array_base(other), all),
                _ => false,
            },
            Type::Size(s) => match other_kind {
                TypeKind::Func => false,
                TypeKind::Array => {
                    let size = other.size();
                    size == s.size || size == 0 || self.is_compatible_with(&array_base(other), all)
                }
                _ => {
                    let size = other.size();
                    size == s.size || size == 0
                }
            },
            Type::Func(func) => {
                if *this == *other.resolve().borrow() {
                    return true;
                }
                if other_size_is(other, TypeKind::Size, STD_SIZE) {
                    return true;
                }
                match &*other.resolve().borrow() {
                    Type::Func(o) => func.signature.is_some() && o.signature == func.signature,
                    _ => false,
                }
            }
            Type::Pointer(p) => {
                if other_size_is(other, TypeKind::Size, STD_SIZE) {
                    return true;
                }
                match &*other.resolve().borrow() {
                    Type::Pointer(o) => p.points_to.is_compatible_with(&o.points_to, false),
                    _ => false,
                }
            }
            Type::Array(a) => {
                if let Type::Array(o) = &*other.resolve().borrow() {
                    if a.base.is_compatible_with(&o.base, false) {
                        return true;
                    }
                }
                !all && a.base.is_compatible_with(other, false)
            }
            Type::Compound(c) => {
                let other_resolved = other.resolve();
                let other_ty = other_resolved.borrow();
                match &*other_ty {
                    Type::Compound(oc) => {
                        c.len() == oc.len()
                            && c.fields()
                                .iter()
                                .zip(oc.fields())
                                .all(|(a, b)| a.ty.is_compatible_with(&b.ty, false))
                    }
                    _ if all => c.fields().iter().all(|f| f.ty.is_compatible_with(other, false)),
                    _ => c
                        .fields()
                        .first()
                        .map_or(false, |f| f.ty.is_compatible_with(other, false)),
                }
            }
            Type::Upper(base) | Type::Lower(base) => {
                let other_resolved = other.resolve();
                let other_ty = other_resolved.borrow();
                match (&*this, &*other_ty) {
                    (Type::Upper(_), Type::Upper(ob)) | (Type::Lower(_), Type::Lower(ob)) => {
                        base.is_compatible_with(ob, false)
                    }
                    _ => false,
                }
            }
        }
    }
}

fn other_size_is(ty: &SharedType, kind: TypeKind, size: usize) -> bool {
    ty.resolved_kind() == kind && ty.size() == size
}

fn array_base(ty: &SharedType) -> SharedType {
    ty.resolve().borrow().as_array().base.clone()
}

#[cfg(test)]
mod tests {
    use crate::compound::CompoundType;
    use crate::types::{SharedType, UnionType};
    use crate::TypeEnv;

    #[test]
    fn test_scalar_compatibility() {
        let int32 = SharedType::integer(32, 1);
        assert!(int32.is_compatible_with(&SharedType::integer(16, -1), false));
        assert!(int32.is_compatible_with(&SharedType::char(), false));
        assert!(int32.is_compatible_with(&SharedType::size_only(32), false));
        assert!(!int32.is_compatible_with(&SharedType::size_only(16), false));
        assert!(!int32.is_compatible_with(&SharedType::float(32), false));
        assert!(SharedType::void().is_compatible_with(&SharedType::float(32), false));
        assert!(SharedType::float(64).is_compatible_with(&SharedType::void(), false));
        assert!(!SharedType::boolean().is_compatible_with(&SharedType::char(), false));
    }

    #[test]
    fn test_pointer_compatibility() {
        let pint = SharedType::pointer(SharedType::integer(32, 1));
        let pchar = SharedType::pointer(SharedType::char());
        let pfloat = SharedType::pointer(SharedType::float(32));
        assert!(pint.is_compatible_with(&pchar, false));
        assert!(!pint.is_compatible_with(&pfloat, false));
        assert!(pint.is_compatible_with(&SharedType::size_only(32), false));
        assert!(!pint.is_compatible_with(&SharedType::integer(32, 1), false));
    }

    #[test]
    fn test_compound_first_member_unless_all() {
        let s = SharedType::compound(
            CompoundType::new()
                .with_field(SharedType::integer(32, 1), "a")
                .with_field(SharedType::float(64), "b"),
        );
        let int = SharedType::integer(32, -1);
        assert!(int.is_compatible_with(&s, false));
        assert!(s.is_compatible_with(&int, false));
        assert!(!int.is_compatible_with(&s, true));

        let all_ints = SharedType::compound(
            CompoundType::new()
                .with_field(SharedType::integer(32, 1), "a")
                .with_field(SharedType::integer(16, 1), "b"),
        );
        assert!(all_ints.is_compatible(&int, true));
        assert!(!SharedType::compound(CompoundType::new()).is_compatible(&int, false));
    }

    #[test]
    fn test_array_element_compatibility() {
        let arr = SharedType::array(SharedType::char(), 16);
        assert!(arr.is_compatible_with(&SharedType::char(), false));
        assert!(!arr.is_compatible_with(&SharedType::char(), true));
        assert!(arr.is_compatible_with(&SharedType::array(SharedType::integer(8, -1), 4), true));
    }

    #[test]
    fn test_union_compatibility() {
        let mut u = UnionType::new();
        u.add_alternative(SharedType::integer(32, 1));
        u.add_alternative(SharedType::pointer(SharedType::char()));
        let u = SharedType::union(u);
        assert!(u.is_compatible_with(&SharedType::char(), false));
        assert!(!SharedType::float(32).is_compatible_with(&u, false));
        assert!(u.is_compatible_with(&u.deep_clone(), false));
    }

    #[test]
    fn test_named_compatibility() {
        let env = TypeEnv::new();
        env.add_named_type("dword", &SharedType::integer(32, -1));
        assert!(env.named("dword").is_compatible_with(&SharedType::integer(32, 1), false));
        assert!(env.named("undef").is_compatible_with(&env.named("undef"), false));
        assert!(!env.named("undef").is_compatible_with(&SharedType::char(), false));
    }
}
