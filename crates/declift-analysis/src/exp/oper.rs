//! Expression operators.
//!
//! Every node of an expression tree carries one [`Oper`]. The numeric code is
//! what gets serialized and what orders expressions, so variants must only
//! ever be appended.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opers {
    ($($(#[$meta:meta])* $name:ident = $code:literal,)*) => {
        /// Operator tag of an expression node.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Oper {
            $($(#[$meta])* $name = $code,)*
        }

        impl Oper {
            /// Every operator, in code order.
            pub const ALL: &'static [Oper] = &[$(Oper::$name,)*];

            /// Stable numeric code.
            pub fn code(self) -> u16 {
                self as u16
            }

            pub fn from_code(code: u64) -> Option<Self> {
                match code {
                    $($code => Some(Oper::$name),)*
                    _ => None,
                }
            }

            /// Debug name, e.g. `opPlus`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Oper::$name => concat!("op", stringify!($name)),)*
                }
            }
        }
    };
}

opers! {
    /// Matches any expression in searches.
    Wild = 0,
    Plus = 1,
    Minus = 2,
    /// Unsigned multiply.
    Mult = 3,
    /// Unsigned divide.
    Div = 4,
    FPlus = 5,
    FMinus = 6,
    FMult = 7,
    FDiv = 8,
    /// Signed multiply.
    Mults = 9,
    /// Signed divide.
    Divs = 10,
    /// Unsigned remainder.
    Mod = 11,
    /// Signed remainder.
    Mods = 12,
    Neg = 13,
    /// Logical and.
    And = 14,
    /// Logical or.
    Or = 15,
    Equals = 16,
    NotEqual = 17,
    Less = 18,
    Gtr = 19,
    LessEq = 20,
    GtrEq = 21,
    LessUns = 22,
    GtrUns = 23,
    LessEqUns = 24,
    GtrEqUns = 25,
    /// Bitwise complement.
    Not = 26,
    /// Logical not.
    LNot = 27,
    /// Postfix sign extension, `x!`.
    SignExt = 28,
    BitAnd = 29,
    BitOr = 30,
    BitXor = 31,
    ShiftL = 32,
    ShiftR = 33,
    ShiftRA = 34,
    RotateL = 35,
    RotateR = 36,
    RotateLC = 37,
    RotateRC = 38,
    TypedExp = 39,
    NameTable = 40,
    OpTable = 41,
    Successor = 42,
    Tern = 43,
    At = 44,
    RegOf = 45,
    MemOf = 46,
    AddrOf = 47,
    Var = 48,
    Phi = 49,
    Subscript = 50,
    Param = 51,
    Local = 52,
    Temp = 53,
    Size = 54,
    List = 55,
    FlagCall = 56,
    FlagDef = 57,
    ExpTable = 58,
    Nil = 59,
    Guard = 60,
    AssignExp = 61,
    Truncu = 62,
    Truncs = 63,
    Zfill = 64,
    SgnEx = 65,
    Fsize = 66,
    Itof = 67,
    Ftoi = 68,
    Fround = 69,
    Fpush = 70,
    Fpop = 71,
    Sin = 72,
    Cos = 73,
    Tan = 74,
    ArcTan = 75,
    Log2 = 76,
    Log10 = 77,
    Loge = 78,
    Sqrt = 79,
    SQRTs = 80,
    SQRTd = 81,
    SQRTq = 82,
    Execute = 83,
    MachFtr = 84,
    IntConst = 85,
    FltConst = 86,
    StrConst = 87,
    CodeAddr = 88,
    PC = 89,
    AFP = 90,
    AGP = 91,
    Flags = 92,
    CF = 93,
    ZF = 94,
    OF = 95,
    NF = 96,
    Anull = 97,
}

impl Oper {
    /// Signed, unsigned and equality comparisons.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Oper::Equals
                | Oper::NotEqual
                | Oper::Less
                | Oper::Gtr
                | Oper::LessEq
                | Oper::GtrEq
                | Oper::LessUns
                | Oper::GtrUns
                | Oper::LessEqUns
                | Oper::GtrEqUns
        )
    }

    /// Infix spelling of a binary operator, without surrounding spaces.
    pub fn infix_str(self) -> Option<&'static str> {
        let s = match self {
            Oper::Plus => "+",
            Oper::Minus => "-",
            Oper::Mult => "*",
            Oper::Mults => "*!",
            Oper::Div => "/",
            Oper::Divs => "/!",
            Oper::Mod => "%",
            Oper::Mods => "%!",
            Oper::FPlus => "+f",
            Oper::FMinus => "-f",
            Oper::FMult => "*f",
            Oper::FDiv => "/f",
            Oper::And => "and",
            Oper::Or => "or",
            Oper::BitAnd => "&",
            Oper::BitOr => "|",
            Oper::BitXor => "^",
            Oper::Equals => "=",
            Oper::NotEqual => "~=",
            Oper::Less => "<",
            Oper::Gtr => ">",
            Oper::LessEq => "<=",
            Oper::GtrEq => ">=",
            Oper::LessUns => "<u",
            Oper::GtrUns => ">u",
            Oper::LessEqUns => "<=u",
            Oper::GtrEqUns => ">=u",
            Oper::ShiftL => "<<",
            Oper::ShiftR => ">>",
            Oper::ShiftRA => ">>A",
            Oper::RotateL => "rl",
            Oper::RotateR => "rr",
            Oper::RotateLC => "rlc",
            Oper::RotateRC => "rrc",
            _ => return None,
        };
        Some(s)
    }

    /// Spelling of a terminal operator. `Nil` prints as nothing.
    pub fn terminal_str(self) -> Option<&'static str> {
        let s = match self {
            Oper::PC => "%pc",
            Oper::Flags => "%flags",
            Oper::CF => "%CF",
            Oper::ZF => "%ZF",
            Oper::OF => "%OF",
            Oper::NF => "%NF",
            Oper::AFP => "%afp",
            Oper::AGP => "%agp",
            Oper::Wild => "WILD",
            Oper::Anull => "%anul",
            Oper::Fpush => "FPUSH",
            Oper::Fpop => "FPOP",
            Oper::Nil => "",
            _ => return None,
        };
        Some(s)
    }

    /// Name of a unary operator printed in call form, `name(x)`.
    pub fn unary_function_str(self) -> Option<&'static str> {
        let s = match self {
            Oper::SQRTs => "SQRTs",
            Oper::SQRTd => "SQRTd",
            Oper::SQRTq => "SQRTq",
            Oper::Sqrt => "sqrt",
            Oper::Sin => "sin",
            Oper::Cos => "cos",
            Oper::Tan => "tan",
            Oper::ArcTan => "arctan",
            Oper::Log2 => "log2",
            Oper::Log10 => "log10",
            Oper::Loge => "loge",
            Oper::Execute => "execute",
            Oper::MachFtr => "machine",
            Oper::Successor => "succ",
            _ => return None,
        };
        Some(s)
    }

    /// Name of a ternary operator printed in call form, `name(a,b,c)`.
    pub fn ternary_function_str(self) -> Option<&'static str> {
        let s = match self {
            Oper::Truncu => "truncu",
            Oper::Truncs => "truncs",
            Oper::Zfill => "zfill",
            Oper::SgnEx => "sgnex",
            Oper::Fsize => "fsize",
            Oper::Itof => "itof",
            Oper::Ftoi => "ftoi",
            Oper::Fround => "fround",
            Oper::OpTable => "optable",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for Oper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
