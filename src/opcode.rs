//! Opcode vocabulary, primitive indices, and the cell packing shared with every runtime decoder.
//!
//! Opcode and primitive numbers are a wire contract: existing values never change, new entries
//! are only appended.

use std::fmt;
use std::sync::OnceLock;

use ahash::AHashMap;

use crate::error::{CompileError, CompileResult};

/// Bits reserved for the opcode in a packed cell.
pub const OP_BITS: u32 = 8;
/// Largest payload that fits beside the opcode.
pub const MAX_ARG: u32 = (1 << (32 - OP_BITS)) - 1;
/// Raw value stored in a length cell whose count is only known after native verification.
pub const UNRESOLVED_LENGTH: u32 = u32::MAX;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    Primitive = 1,
    Pointer = 3,
    Array = 5,
    OpenArray = 7,
    StructUnion = 9,
    Enum = 11,
    Typename = 13,
    Function = 15,
    FunctionEnd = 17,
    Noop = 19,
    BitField = 21,
    /// Entry point taking a variable argument tuple.
    CallVarargs = 23,
    /// Entry point taking no arguments.
    CallNoArgs = 25,
    /// Entry point taking exactly one argument.
    CallOneArg = 27,
}

impl OpCode {
    pub const ALL: [OpCode; 14] = [
        OpCode::Primitive,
        OpCode::Pointer,
        OpCode::Array,
        OpCode::OpenArray,
        OpCode::StructUnion,
        OpCode::Enum,
        OpCode::Typename,
        OpCode::Function,
        OpCode::FunctionEnd,
        OpCode::Noop,
        OpCode::BitField,
        OpCode::CallVarargs,
        OpCode::CallNoArgs,
        OpCode::CallOneArg,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Display name used by the diagnostic rendering.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Primitive => "PRIMITIVE",
            OpCode::Pointer => "POINTER",
            OpCode::Array => "ARRAY",
            OpCode::OpenArray => "OPEN_ARRAY",
            OpCode::StructUnion => "STRUCT_UNION",
            OpCode::Enum => "ENUM",
            OpCode::Typename => "TYPENAME",
            OpCode::Function => "FUNCTION",
            OpCode::FunctionEnd => "FUNCTION_END",
            OpCode::Noop => "NOOP",
            OpCode::BitField => "BITFIELD",
            OpCode::CallVarargs => "CALL_V",
            OpCode::CallNoArgs => "CALL_N",
            OpCode::CallOneArg => "CALL_O",
        }
    }

    /// Identifier used for the constant in generated C sources.
    pub fn c_identifier(self) -> String {
        format!("_TYPETAB_OP_{}", self.name())
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn encode(op: u8, arg: u32) -> u32 {
    (op as u32) | (arg << OP_BITS)
}

pub fn decode(word: u32) -> (u8, u32) {
    ((word & 0xFF) as u8, word >> OP_BITS)
}

/// One cell of a compiled type table. Cells without an opcode carry a raw count (array length
/// or bit-field width) for the cell right before them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CffiOp {
    op: Option<OpCode>,
    arg: u32,
}

impl CffiOp {
    pub fn new(op: OpCode, arg: usize) -> CompileResult<Self> {
        if arg > MAX_ARG as usize {
            return Err(CompileError::EncodingOverflow {
                op: Some(op),
                value: arg,
            });
        }
        Ok(Self {
            op: Some(op),
            arg: arg as u32,
        })
    }

    pub fn length(count: usize) -> CompileResult<Self> {
        if count >= UNRESOLVED_LENGTH as usize {
            return Err(CompileError::EncodingOverflow { op: None, value: count });
        }
        Ok(Self {
            op: None,
            arg: count as u32,
        })
    }

    pub fn unresolved_length() -> Self {
        Self {
            op: None,
            arg: UNRESOLVED_LENGTH,
        }
    }

    pub fn op(self) -> Option<OpCode> {
        self.op
    }

    pub fn arg(self) -> u32 {
        self.arg
    }

    pub fn is_unresolved_length(self) -> bool {
        self.op.is_none() && self.arg == UNRESOLVED_LENGTH
    }

    pub fn as_word(self) -> u32 {
        match self.op {
            Some(op) => encode(op.code(), self.arg),
            None => self.arg,
        }
    }

    /// Decodes an opcode cell. Length cells cannot be told apart from their value alone and
    /// decode as whatever opcode their low byte happens to match.
    pub fn from_word(word: u32) -> Option<Self> {
        let (code, arg) = decode(word);
        OpCode::from_code(code).map(|op| Self { op: Some(op), arg })
    }
}

impl fmt::Display for CffiOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Some(op) => write!(f, "({} {})", op.name(), self.arg),
            None if self.arg == UNRESOLVED_LENGTH => f.write_str("(None ...)"),
            None => write!(f, "(None {})", self.arg),
        }
    }
}

const PRIMITIVE_NAMES: [&str; 48] = [
    "void",
    "_Bool",
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "unsigned long long",
    "float",
    "double",
    "long double",
    "wchar_t",
    "int8_t",
    "uint8_t",
    "int16_t",
    "uint16_t",
    "int32_t",
    "uint32_t",
    "int64_t",
    "uint64_t",
    "intptr_t",
    "uintptr_t",
    "ptrdiff_t",
    "size_t",
    "ssize_t",
    "int_least8_t",
    "uint_least8_t",
    "int_least16_t",
    "uint_least16_t",
    "int_least32_t",
    "uint_least32_t",
    "int_least64_t",
    "uint_least64_t",
    "int_fast8_t",
    "uint_fast8_t",
    "int_fast16_t",
    "uint_fast16_t",
    "int_fast32_t",
    "uint_fast32_t",
    "int_fast64_t",
    "uint_fast64_t",
    "intmax_t",
    "uintmax_t",
];

/// Alternate spellings accepted on lookup; they resolve to the canonical index.
const PRIMITIVE_ALIASES: [(&str, u8); 6] = [
    ("bool", Primitive::BOOL.0),
    ("short int", Primitive::SHORT.0),
    ("unsigned", Primitive::UINT.0),
    ("long int", Primitive::LONG.0),
    ("unsigned long int", Primitive::ULONG.0),
    ("long long int", Primitive::LONGLONG.0),
];

fn primitive_lookup() -> &'static AHashMap<&'static str, u8> {
    static LOOKUP: OnceLock<AHashMap<&'static str, u8>> = OnceLock::new();
    LOOKUP.get_or_init(|| {
        let mut map = AHashMap::with_capacity(PRIMITIVE_NAMES.len() + PRIMITIVE_ALIASES.len());
        for (index, name) in PRIMITIVE_NAMES.iter().enumerate() {
            map.insert(*name, index as u8);
        }
        for (alias, index) in PRIMITIVE_ALIASES {
            map.insert(alias, index);
        }
        map
    })
}

/// Process-wide primitive index. Identical across every table so primitives can be shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Primitive(u8);

impl Primitive {
    pub const VOID: Self = Self(0);
    pub const BOOL: Self = Self(1);
    pub const CHAR: Self = Self(2);
    pub const SCHAR: Self = Self(3);
    pub const UCHAR: Self = Self(4);
    pub const SHORT: Self = Self(5);
    pub const USHORT: Self = Self(6);
    pub const INT: Self = Self(7);
    pub const UINT: Self = Self(8);
    pub const LONG: Self = Self(9);
    pub const ULONG: Self = Self(10);
    pub const LONGLONG: Self = Self(11);
    pub const ULONGLONG: Self = Self(12);
    pub const FLOAT: Self = Self(13);
    pub const DOUBLE: Self = Self(14);
    pub const LONGDOUBLE: Self = Self(15);
    pub const WCHAR: Self = Self(16);
    pub const INT32: Self = Self(21);
    pub const SIZE: Self = Self(28);
    pub const UINTMAX: Self = Self(47);

    pub fn from_name(name: &str) -> Option<Self> {
        primitive_lookup().get(name).copied().map(Self)
    }

    pub fn from_index(index: u8) -> Option<Self> {
        ((index as usize) < PRIMITIVE_NAMES.len()).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        PRIMITIVE_NAMES[self.0 as usize]
    }

    pub fn is_void(self) -> bool {
        self == Self::VOID
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::VOID | Self::FLOAT | Self::DOUBLE | Self::LONGDOUBLE)
    }
}
