//! Expression trees.
//!
//! An [`Exp`] exclusively owns its children; only the type attached to a
//! typed node is shared. Rewrites consume the tree and hand back the result,
//! so promoting a child over its parent ("become") is a move, not a copy.

mod arith;
mod assign;
pub mod codec;
mod dot;
pub mod oper;
mod print;
mod search;
mod simplify;

pub use arith::{accumulate, Terms};
pub use assign::{may_alias, Statement};
pub use codec::{decode_exp, encode_exp, read_exp, write_exp};
pub use oper::Oper;
pub use simplify::SimplifyConfig;

use declift_types::SharedType;
use std::cmp::Ordering;

/// An expression node.
#[derive(Debug, Clone)]
pub struct Exp {
    pub kind: ExpKind,
}

/// The shape of an expression node.
#[derive(Debug, Clone)]
pub enum ExpKind {
    /// Integer, float, string or code address literal.
    Const(ConstValue),

    /// Zero-arity symbol such as `%pc`, `%afp` or the wildcard.
    Terminal(Oper),

    Unary {
        op: Oper,
        sub1: Box<Exp>,
    },

    Binary {
        op: Oper,
        sub1: Box<Exp>,
        sub2: Box<Exp>,
    },

    Ternary {
        op: Oper,
        sub1: Box<Exp>,
        sub2: Box<Exp>,
        sub3: Box<Exp>,
    },

    /// A value with an attached type. The type is shared with whoever else
    /// holds it.
    Typed {
        ty: SharedType,
        sub1: Box<Exp>,
    },

    /// `lhs := rhs` with the width of the transfer in bits.
    Assign {
        size: u32,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
    },

    /// Definition of a flag function: its parameter list and the RTL that
    /// computes the flags.
    FlagDef {
        params: Box<Exp>,
        rtl: Rtl,
    },
}

/// Literal payload of a constant node.
#[derive(Debug, Clone)]
pub enum ConstValue {
    Int(i32),
    Float(f64),
    Str(String),
    CodeAddr(u32),
}

impl ConstValue {
    /// Operator a constant of this value carries.
    pub fn oper(&self) -> Oper {
        match self {
            ConstValue::Int(_) => Oper::IntConst,
            ConstValue::Float(_) => Oper::FltConst,
            ConstValue::Str(_) => Oper::StrConst,
            ConstValue::CodeAddr(_) => Oper::CodeAddr,
        }
    }
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstValue::Int(a), ConstValue::Int(b)) => a == b,
            (ConstValue::Float(a), ConstValue::Float(b)) => a == b,
            (ConstValue::Str(a), ConstValue::Str(b)) => a == b,
            (ConstValue::CodeAddr(a), ConstValue::CodeAddr(b)) => a == b,
            _ => false,
        }
    }
}

/// A register transfer list: the effects of one instruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rtl {
    pub address: u32,
    pub exps: Vec<Exp>,
}

impl Rtl {
    pub fn new(address: u32, exps: Vec<Exp>) -> Self {
        Self { address, exps }
    }

    pub fn len(&self) -> usize {
        self.exps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exps.is_empty()
    }
}

impl Exp {
    pub fn new(kind: ExpKind) -> Self {
        Self { kind }
    }

    // --- Construction ---

    /// Creates an integer constant.
    pub fn int(value: i32) -> Self {
        Self::new(ExpKind::Const(ConstValue::Int(value)))
    }

    /// Creates a floating point constant.
    pub fn float(value: f64) -> Self {
        Self::new(ExpKind::Const(ConstValue::Float(value)))
    }

    /// Creates a string constant.
    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ExpKind::Const(ConstValue::Str(value.into())))
    }

    /// Creates a code address constant.
    pub fn code_addr(addr: u32) -> Self {
        Self::new(ExpKind::Const(ConstValue::CodeAddr(addr)))
    }

    pub fn terminal(op: Oper) -> Self {
        Self::new(ExpKind::Terminal(op))
    }

    /// The wildcard, which equals anything.
    pub fn wild() -> Self {
        Self::terminal(Oper::Wild)
    }

    pub fn nil() -> Self {
        Self::terminal(Oper::Nil)
    }

    pub fn unary(op: Oper, sub1: Exp) -> Self {
        Self::new(ExpKind::Unary {
            op,
            sub1: Box::new(sub1),
        })
    }

    pub fn binary(op: Oper, sub1: Exp, sub2: Exp) -> Self {
        Self::new(ExpKind::Binary {
            op,
            sub1: Box::new(sub1),
            sub2: Box::new(sub2),
        })
    }

    pub fn ternary(op: Oper, sub1: Exp, sub2: Exp, sub3: Exp) -> Self {
        Self::new(ExpKind::Ternary {
            op,
            sub1: Box::new(sub1),
            sub2: Box::new(sub2),
            sub3: Box::new(sub3),
        })
    }

    pub fn typed(ty: SharedType, sub1: Exp) -> Self {
        Self::new(ExpKind::Typed {
            ty,
            sub1: Box::new(sub1),
        })
    }

    /// Creates an assignment of `size` bits.
    pub fn assign(size: u32, lhs: Exp, rhs: Exp) -> Self {
        Self::new(ExpKind::Assign {
            size,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn flag_def(params: Exp, rtl: Rtl) -> Self {
        Self::new(ExpKind::FlagDef {
            params: Box::new(params),
            rtl,
        })
    }

    /// `r[k]`
    pub fn reg_of(k: i32) -> Self {
        Self::unary(Oper::RegOf, Self::int(k))
    }

    /// `m[addr]`
    pub fn mem_of(addr: Exp) -> Self {
        Self::unary(Oper::MemOf, addr)
    }

    /// `a[e]`
    pub fn addr_of(e: Exp) -> Self {
        Self::unary(Oper::AddrOf, e)
    }

    /// `v[k]`
    pub fn var(k: i32) -> Self {
        Self::unary(Oper::Var, Self::int(k))
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::unary(Oper::Local, Self::str(name))
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self::unary(Oper::Param, Self::str(name))
    }

    pub fn temp(name: impl Into<String>) -> Self {
        Self::unary(Oper::Temp, Self::str(name))
    }

    /// `lhs + rhs`
    pub fn plus(lhs: Exp, rhs: Exp) -> Self {
        Self::binary(Oper::Plus, lhs, rhs)
    }

    /// `lhs - rhs`
    pub fn minus(lhs: Exp, rhs: Exp) -> Self {
        Self::binary(Oper::Minus, lhs, rhs)
    }

    // --- Accessors ---

    /// Operator of this node.
    pub fn oper(&self) -> Oper {
        match &self.kind {
            ExpKind::Const(value) => value.oper(),
            ExpKind::Terminal(op)
            | ExpKind::Unary { op, .. }
            | ExpKind::Binary { op, .. }
            | ExpKind::Ternary { op, .. } => *op,
            ExpKind::Typed { .. } => Oper::TypedExp,
            ExpKind::Assign { .. } => Oper::AssignExp,
            ExpKind::FlagDef { .. } => Oper::FlagDef,
        }
    }

    /// Change the operator of a terminal, unary, binary or ternary node.
    ///
    /// # Panics
    ///
    /// Panics on constants, typed nodes, assignments and flag definitions,
    /// whose operator is fixed by their shape.
    pub fn set_oper(&mut self, new_op: Oper) {
        let old = self.oper();
        match &mut self.kind {
            ExpKind::Terminal(op)
            | ExpKind::Unary { op, .. }
            | ExpKind::Binary { op, .. }
            | ExpKind::Ternary { op, .. } => *op = new_op,
            _ => panic!("cannot change the operator of a {} node", old),
        }
    }

    /// Number of children.
    pub fn arity(&self) -> usize {
        match &self.kind {
            ExpKind::Const(_) | ExpKind::Terminal(_) => 0,
            ExpKind::Unary { .. } | ExpKind::Typed { .. } | ExpKind::FlagDef { .. } => 1,
            ExpKind::Binary { .. } | ExpKind::Assign { .. } => 2,
            ExpKind::Ternary { .. } => 3,
        }
    }

    /// Child `index`, counting from zero.
    pub fn child(&self, index: usize) -> Option<&Exp> {
        match (&self.kind, index) {
            (ExpKind::Unary { sub1, .. }, 0)
            | (ExpKind::Binary { sub1, .. }, 0)
            | (ExpKind::Ternary { sub1, .. }, 0)
            | (ExpKind::Typed { sub1, .. }, 0)
            | (ExpKind::FlagDef { params: sub1, .. }, 0)
            | (ExpKind::Assign { lhs: sub1, .. }, 0) => Some(sub1),
            (ExpKind::Binary { sub2, .. }, 1)
            | (ExpKind::Ternary { sub2, .. }, 1)
            | (ExpKind::Assign { rhs: sub2, .. }, 1) => Some(sub2),
            (ExpKind::Ternary { sub3, .. }, 2) => Some(sub3),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Exp> {
        match (&mut self.kind, index) {
            (ExpKind::Unary { sub1, .. }, 0)
            | (ExpKind::Binary { sub1, .. }, 0)
            | (ExpKind::Ternary { sub1, .. }, 0)
            | (ExpKind::Typed { sub1, .. }, 0)
            | (ExpKind::FlagDef { params: sub1, .. }, 0)
            | (ExpKind::Assign { lhs: sub1, .. }, 0) => Some(sub1),
            (ExpKind::Binary { sub2, .. }, 1)
            | (ExpKind::Ternary { sub2, .. }, 1)
            | (ExpKind::Assign { rhs: sub2, .. }, 1) => Some(sub2),
            (ExpKind::Ternary { sub3, .. }, 2) => Some(sub3),
            _ => None,
        }
    }

    pub fn sub1(&self) -> Option<&Exp> {
        self.child(0)
    }

    pub fn sub2(&self) -> Option<&Exp> {
        self.child(1)
    }

    pub fn sub3(&self) -> Option<&Exp> {
        self.child(2)
    }

    pub fn sub1_mut(&mut self) -> Option<&mut Exp> {
        self.child_mut(0)
    }

    pub fn sub2_mut(&mut self) -> Option<&mut Exp> {
        self.child_mut(1)
    }

    pub fn sub3_mut(&mut self) -> Option<&mut Exp> {
        self.child_mut(2)
    }

    /// Replace child `index`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if the node has no such child.
    pub fn set_child(&mut self, index: usize, e: Exp) -> Exp {
        let op = self.oper();
        match self.child_mut(index) {
            Some(slot) => std::mem::replace(slot, e),
            None => panic!("{} has no child {}", op, index),
        }
    }

    pub fn set_sub1(&mut self, e: Exp) -> Exp {
        self.set_child(0, e)
    }

    pub fn set_sub2(&mut self, e: Exp) -> Exp {
        self.set_child(1, e)
    }

    pub fn set_sub3(&mut self, e: Exp) -> Exp {
        self.set_child(2, e)
    }

    /// Swap the two children of a binary node. Other nodes are left alone.
    pub fn commute(&mut self) {
        if let ExpKind::Binary { sub1, sub2, .. } = &mut self.kind {
            std::mem::swap(sub1, sub2);
        }
    }

    /// Discard this node and everything but child `index`, which is returned.
    ///
    /// # Panics
    ///
    /// Panics if the node has no such child.
    pub fn become_child(self, index: usize) -> Exp {
        let op = self.oper();
        let child = match (self.kind, index) {
            (ExpKind::Unary { sub1, .. }, 0)
            | (ExpKind::Binary { sub1, .. }, 0)
            | (ExpKind::Ternary { sub1, .. }, 0)
            | (ExpKind::Typed { sub1, .. }, 0)
            | (ExpKind::FlagDef { params: sub1, .. }, 0)
            | (ExpKind::Assign { lhs: sub1, .. }, 0) => sub1,
            (ExpKind::Binary { sub2, .. }, 1)
            | (ExpKind::Ternary { sub2, .. }, 1)
            | (ExpKind::Assign { rhs: sub2, .. }, 1) => sub2,
            (ExpKind::Ternary { sub3, .. }, 2) => sub3,
            _ => panic!("{} has no child {}", op, index),
        };
        *child
    }

    pub fn become_sub1(self) -> Exp {
        self.become_child(0)
    }

    pub fn become_sub2(self) -> Exp {
        self.become_child(1)
    }

    pub fn become_sub3(self) -> Exp {
        self.become_child(2)
    }

    /// Rebuild this node with `f` applied to each child, left to right.
    pub fn map_children(self, mut f: impl FnMut(Exp) -> Exp) -> Exp {
        let kind = match self.kind {
            ExpKind::Unary { op, sub1 } => ExpKind::Unary {
                op,
                sub1: Box::new(f(*sub1)),
            },
            ExpKind::Binary { op, sub1, sub2 } => ExpKind::Binary {
                op,
                sub1: Box::new(f(*sub1)),
                sub2: Box::new(f(*sub2)),
            },
            ExpKind::Ternary { op, sub1, sub2, sub3 } => ExpKind::Ternary {
                op,
                sub1: Box::new(f(*sub1)),
                sub2: Box::new(f(*sub2)),
                sub3: Box::new(f(*sub3)),
            },
            ExpKind::Typed { ty, sub1 } => ExpKind::Typed {
                ty,
                sub1: Box::new(f(*sub1)),
            },
            ExpKind::Assign { size, lhs, rhs } => ExpKind::Assign {
                size,
                lhs: Box::new(f(*lhs)),
                rhs: Box::new(f(*rhs)),
            },
            ExpKind::FlagDef { params, rtl } => ExpKind::FlagDef {
                params: Box::new(f(*params)),
                rtl,
            },
            leaf @ (ExpKind::Const(_) | ExpKind::Terminal(_)) => leaf,
        };
        Exp::new(kind)
    }

    /// Split a binary node (or assignment) into its two children.
    ///
    /// # Panics
    ///
    /// Panics on any other shape.
    pub fn into_pair(self) -> (Exp, Exp) {
        let op = self.oper();
        match self.kind {
            ExpKind::Binary { sub1, sub2, .. } => (*sub1, *sub2),
            ExpKind::Assign { lhs, rhs, .. } => (*lhs, *rhs),
            _ => panic!("{} is not a binary node", op),
        }
    }

    /// Integer value of an integer constant.
    pub fn int_value(&self) -> Option<i32> {
        match &self.kind {
            ExpKind::Const(ConstValue::Int(k)) => Some(*k),
            _ => None,
        }
    }

    /// Set the value of an integer constant.
    ///
    /// # Panics
    ///
    /// Panics if this is not an integer constant.
    pub fn set_int(&mut self, value: i32) {
        let op = self.oper();
        match &mut self.kind {
            ExpKind::Const(ConstValue::Int(k)) => *k = value,
            _ => panic!("set_int on {}", op),
        }
    }

    /// String payload of a string constant.
    pub fn str_value(&self) -> Option<&str> {
        match &self.kind {
            ExpKind::Const(ConstValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Type attached to a typed node.
    pub fn ty(&self) -> Option<&SharedType> {
        match &self.kind {
            ExpKind::Typed { ty, .. } => Some(ty),
            _ => None,
        }
    }

    pub fn set_ty(&mut self, new_ty: SharedType) {
        if let ExpKind::Typed { ty, .. } = &mut self.kind {
            *ty = new_ty;
        }
    }

    /// Transfer width of an assignment.
    pub fn assign_size(&self) -> Option<u32> {
        match &self.kind {
            ExpKind::Assign { size, .. } => Some(*size),
            _ => None,
        }
    }

    pub fn rtl(&self) -> Option<&Rtl> {
        match &self.kind {
            ExpKind::FlagDef { rtl, .. } => Some(rtl),
            _ => None,
        }
    }

    // --- Predicates ---

    pub fn is_int_const(&self) -> bool {
        self.oper() == Oper::IntConst
    }

    pub fn is_mem_of(&self) -> bool {
        self.oper() == Oper::MemOf
    }

    pub fn is_reg_of(&self) -> bool {
        self.oper() == Oper::RegOf
    }

    pub fn is_nil(&self) -> bool {
        self.oper() == Oper::Nil
    }

    pub fn is_wild(&self) -> bool {
        self.oper() == Oper::Wild
    }

    pub fn is_assign(&self) -> bool {
        matches!(self.kind, ExpKind::Assign { .. })
    }

    /// `r[K]` for an integer constant `K`.
    pub fn is_reg_of_k(&self) -> bool {
        self.is_reg_of() && self.sub1().is_some_and(Exp::is_int_const)
    }

    /// `r[n]`
    pub fn is_reg_n(&self, n: i32) -> bool {
        self.is_reg_of() && self.sub1().and_then(Exp::int_value) == Some(n)
    }

    /// `%afp`, `%afp + k` or `%afp - k`, possibly under a type or an
    /// `a[m[...]]` pair.
    pub fn is_afp_term(&self) -> bool {
        let mut cur = self;
        if let ExpKind::Typed { sub1, .. } = &cur.kind {
            cur = sub1;
        }
        if cur.oper() == Oper::AddrOf {
            if let Some(inner) = cur.sub1().filter(|e| e.is_mem_of()) {
                if let Some(addr) = inner.sub1() {
                    cur = addr;
                }
            }
        }
        match &cur.kind {
            ExpKind::Terminal(Oper::AFP) => true,
            ExpKind::Binary {
                op: Oper::Plus | Oper::Minus,
                sub1,
                sub2,
            } => sub1.oper() == Oper::AFP && sub2.is_int_const(),
            _ => false,
        }
    }

    /// `k` for `v[k]`.
    ///
    /// # Panics
    ///
    /// Panics if this is not a `v[...]` over an integer.
    pub fn var_index(&self) -> i32 {
        match (&self.kind, self.sub1().and_then(Exp::int_value)) {
            (ExpKind::Unary { op: Oper::Var, .. }, Some(k)) => k,
            _ => panic!("var_index on {}", self.oper()),
        }
    }

    /// The guard of a guarded expression.
    pub fn guard(&self) -> Option<&Exp> {
        match &self.kind {
            ExpKind::Unary {
                op: Oper::Guard,
                sub1,
            } => Some(sub1),
            _ => None,
        }
    }

    // --- Comparison ---

    /// Equality that looks through a type on `other`.
    pub fn eq_ignore_type(&self, other: &Exp) -> bool {
        let this = match &self.kind {
            ExpKind::Typed { sub1, .. } => sub1,
            _ => self,
        };
        this == strip_type(other)
    }

    /// Total order used to canonicalize and sort expressions.
    ///
    /// The operator code decides first, then children from left to right.
    /// The wildcard is ordered like any other terminal.
    pub fn cmp_order(&self, other: &Exp) -> Ordering {
        let by_oper = self.oper().cmp(&other.oper());
        if by_oper != Ordering::Equal {
            return by_oper;
        }
        match (&self.kind, &other.kind) {
            (ExpKind::Const(a), ExpKind::Const(b)) => cmp_const(a, b),
            (ExpKind::Typed { ty: ta, sub1: a }, ExpKind::Typed { ty: tb, sub1: b }) => {
                ta.cmp_order(tb).then_with(|| a.cmp_order(b))
            }
            (
                ExpKind::Assign { size: sa, lhs: la, rhs: ra },
                ExpKind::Assign { size: sb, lhs: lb, rhs: rb },
            ) => sa
                .cmp(sb)
                .then_with(|| la.cmp_order(lb))
                .then_with(|| ra.cmp_order(rb)),
            _ => {
                let by_shape = shape_rank(self).cmp(&shape_rank(other));
                if by_shape != Ordering::Equal {
                    return by_shape;
                }
                for i in 0..self.arity() {
                    if let (Some(a), Some(b)) = (self.child(i), other.child(i)) {
                        let ord = a.cmp_order(b);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
                Ordering::Equal
            }
        }
    }

    /// Strictly less under [`cmp_order`](Self::cmp_order).
    pub fn less(&self, other: &Exp) -> bool {
        self.cmp_order(other) == Ordering::Less
    }
}

fn strip_type(e: &Exp) -> &Exp {
    match &e.kind {
        ExpKind::Typed { sub1, .. } => sub1,
        _ => e,
    }
}

fn shape_rank(e: &Exp) -> u8 {
    match e.kind {
        ExpKind::Const(_) => 0,
        ExpKind::Terminal(_) => 1,
        ExpKind::Unary { .. } => 2,
        ExpKind::Binary { .. } => 3,
        ExpKind::Ternary { .. } => 4,
        ExpKind::Typed { .. } => 5,
        ExpKind::Assign { .. } => 6,
        ExpKind::FlagDef { .. } => 7,
    }
}

fn cmp_const(a: &ConstValue, b: &ConstValue) -> Ordering {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => x.cmp(y),
        (ConstValue::Float(x), ConstValue::Float(y)) => x.total_cmp(y),
        (ConstValue::Str(x), ConstValue::Str(y)) => x.cmp(y),
        (ConstValue::CodeAddr(x), ConstValue::CodeAddr(y)) => x.cmp(y),
        _ => a.oper().cmp(&b.oper()),
    }
}

/// Structural equality. A wildcard on either side equals anything, and a
/// typed node only equals a typed node with an equal type.
impl PartialEq for Exp {
    fn eq(&self, other: &Self) -> bool {
        if self.is_wild() || other.is_wild() {
            return true;
        }
        match (&self.kind, &other.kind) {
            (ExpKind::Const(a), ExpKind::Const(b)) => a == b,
            (ExpKind::Terminal(a), ExpKind::Terminal(b)) => a == b,
            (ExpKind::Unary { op: oa, sub1: a }, ExpKind::Unary { op: ob, sub1: b }) => {
                oa == ob && a == b
            }
            (
                ExpKind::Binary { op: oa, sub1: a1, sub2: a2 },
                ExpKind::Binary { op: ob, sub1: b1, sub2: b2 },
            ) => oa == ob && a1 == b1 && a2 == b2,
            (
                ExpKind::Ternary { op: oa, sub1: a1, sub2: a2, sub3: a3 },
                ExpKind::Ternary { op: ob, sub1: b1, sub2: b2, sub3: b3 },
            ) => oa == ob && a1 == b1 && a2 == b2 && a3 == b3,
            (ExpKind::Typed { ty: ta, sub1: a }, ExpKind::Typed { ty: tb, sub1: b }) => {
                ta == tb && a == b
            }
            (
                ExpKind::Assign { size: sa, lhs: la, rhs: ra },
                ExpKind::Assign { size: sb, lhs: lb, rhs: rb },
            ) => sa == sb && la == lb && ra == rb,
            (
                ExpKind::FlagDef { params: pa, rtl: ra },
                ExpKind::FlagDef { params: pb, rtl: rb },
            ) => pa == pb && ra == rb,
            _ => false,
        }
    }
}
