//! Type environment.
//!
//! The environment maps alias names to types. Named types created through
//! [`TypeEnv::named`] resolve against the environment that created them, so
//! independent analysis runs (for example two target architectures in one
//! process) use independent environments, and [`TypeEnv::clear`] resets a
//! run without touching any other.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::warn;

use crate::types::{NamedType, SharedType, Type};

/// Longest alias chain followed before giving up.
const MAX_ALIAS_DEPTH: usize = 64;

#[derive(Default)]
struct EnvState {
    named: IndexMap<String, SharedType>,
    next_alpha: u32,
}

impl EnvState {
    fn resolve(&self, name: &str) -> Option<SharedType> {
        let mut current = name.to_string();
        for _ in 0..MAX_ALIAS_DEPTH {
            let ty = self.named.get(&current)?.clone();
            let next = match &*ty.borrow() {
                Type::Named(n) => n.name.clone(),
                _ => return Some(ty.clone()),
            };
            current = next;
        }
        None
    }
}

/// Table of named types shared by one analysis session.
///
/// Cloning a `TypeEnv` yields another handle to the same table.
#[derive(Clone, Default)]
pub struct TypeEnv {
    state: Rc<RefCell<EnvState>>,
}

/// Weak back reference held by named types.
#[derive(Clone, Default)]
pub(crate) struct EnvRef(Weak<RefCell<EnvState>>);

impl EnvRef {
    pub(crate) fn resolve(&self, name: &str) -> Option<SharedType> {
        let state = self.0.upgrade()?;
        let resolved = state.borrow().resolve(name);
        resolved
    }
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// A named type bound to this environment. The name does not need to be
    /// defined yet.
    pub fn named(&self, name: impl Into<String>) -> SharedType {
        SharedType::new(Type::Named(NamedType {
            name: name.into(),
            env: EnvRef(Rc::downgrade(&self.state)),
        }))
    }

    /// Define `name` as `ty`.
    ///
    /// Redefining a name with a different type keeps the first definition
    /// and logs a warning. When `ty`'s rendering is itself a defined name
    /// (`typedef a b` after `typedef int a`), `name` is bound to a copy of
    /// that definition rather than to the alias.
    pub fn add_named_type(&self, name: &str, ty: &SharedType) {
        if let Some(previous) = self.get_named_type(name) {
            if previous != *ty {
                warn!(
                    "redefinition of type {}: {} (previous definition {})",
                    name,
                    ty.ctype(false),
                    previous.ctype(false)
                );
            }
            return;
        }

        let stored = match self.get_named_type(&ty.ctype(false)) {
            Some(aliased) => aliased.deep_clone(),
            None => ty.deep_clone(),
        };
        self.state.borrow_mut().named.insert(name.to_string(), stored);
    }

    /// Direct definition of `name`, without following aliases.
    pub fn get_named_type(&self, name: &str) -> Option<SharedType> {
        self.state.borrow().named.get(name).cloned()
    }

    /// Definition of `name` after following alias chains.
    pub fn resolve(&self, name: &str) -> Option<SharedType> {
        self.state.borrow().resolve(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.borrow().named.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Defined names in definition order.
    pub fn names(&self) -> Vec<String> {
        self.state.borrow().named.keys().cloned().collect()
    }

    /// Forget every definition and restart type variable numbering.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.named.clear();
        state.next_alpha = 0;
    }

    /// A fresh type variable `alphaN`.
    pub fn alpha(&self) -> SharedType {
        let n = {
            let mut state = self.state.borrow_mut();
            let n = state.next_alpha;
            state.next_alpha += 1;
            n
        };
        self.named(format!("alpha{}", n))
    }

    /// Pointer to a fresh type variable.
    pub fn ptr_alpha(&self) -> SharedType {
        SharedType::pointer(self.alpha())
    }

    /// One `name -> type` line per definition.
    pub fn dump_names(&self) -> String {
        let state = self.state.borrow();
        let mut out = String::new();
        for (name, ty) in &state.named {
            out.push_str(&format!("{} -> {}\n", name, ty.ctype(false)));
        }
        out
    }
}

impl fmt::Debug for TypeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEnv")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_named_resolution() {
        let env = TypeEnv::new();
        let size_t = env.named("size_t");
        assert!(size_t.borrow().is_complete());
        assert_eq!(size_t.size(), 0);

        env.add_named_type("size_t", &SharedType::integer(32, -1));
        assert_eq!(size_t.size(), 32);
        assert!(size_t.resolves_to_integer());
        assert_eq!(size_t.ctype(true), "size_t");
    }

    #[test]
    fn test_alias_chain() {
        let env = TypeEnv::new();
        env.add_named_type("a", &SharedType::integer(16, 1));
        env.add_named_type("b", &env.named("a"));
        // b was bound to a copy of a's definition
        assert_eq!(env.get_named_type("b").map(|t| t.kind()), Some(TypeKind::Integer));

        env.add_named_type("c", &env.named("d"));
        env.add_named_type("d", &SharedType::float(64));
        assert_eq!(env.resolve("c").map(|t| t.size()), Some(64));
    }

    #[test]
    fn test_alias_cycle_is_unresolved() {
        let env = TypeEnv::new();
        env.add_named_type("x", &env.named("y"));
        env.add_named_type("y", &env.named("x"));
        assert!(env.resolve("x").is_none());
        assert_eq!(env.named("x").resolved_kind(), TypeKind::Named);
    }

    #[test]
    fn test_redefinition_keeps_first() {
        let env = TypeEnv::new();
        env.add_named_type("word", &SharedType::integer(16, -1));
        env.add_named_type("word", &SharedType::integer(32, -1));
        assert_eq!(env.resolve("word").map(|t| t.size()), Some(16));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_clear_isolates_runs() {
        let env = TypeEnv::new();
        let other = TypeEnv::new();
        env.add_named_type("reg_t", &SharedType::integer(32, 1));
        other.add_named_type("reg_t", &SharedType::integer(64, 1));

        let reg = env.named("reg_t");
        assert_eq!(reg.size(), 32);
        assert_eq!(other.named("reg_t").size(), 64);

        env.clear();
        assert!(env.is_empty());
        assert_eq!(reg.size(), 0);
        assert_eq!(other.named("reg_t").size(), 64);
    }

    #[test]
    fn test_alpha_numbering() {
        let env = TypeEnv::new();
        assert_eq!(env.alpha().ctype(true), "alpha0");
        assert_eq!(env.alpha().ctype(true), "alpha1");
        env.clear();
        assert_eq!(env.alpha().ctype(true), "alpha0");
    }

    #[test]
    fn test_dropped_env_leaves_names_unresolved() {
        let named = {
            let env = TypeEnv::new();
            env.add_named_type("t", &SharedType::char());
            env.named("t")
        };
        assert_eq!(named.resolved_kind(), TypeKind::Named);
    }

    #[test]
    fn test_dump_names() {
        let env = TypeEnv::new();
        env.add_named_type("u8", &SharedType::integer(8, -1));
        env.add_named_type("flag", &SharedType::boolean());
        assert_eq!(env.dump_names(), "u8 -> unsigned char\nflag -> bool\n");
    }
}
