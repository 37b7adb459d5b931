//! Read-only state inspection.
//!
//! Debuggers and tests look at a machine between instructions through
//! dotted paths such as `cpu.pc` or `memory.$5800`. A query never touches
//! contention, breakpoints or the display cursor.

use std::fmt;

/// The answer to a state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    /// A register or memory byte.
    U8(u8),
    /// An address or register pair.
    U16(u16),
    /// A T-state or frame count.
    U32(u32),
    U64(u64),
    Text(&'static str),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "${v:02X}"),
            Value::U16(v) => write!(f, "${v:04X}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from!(bool => Bool, u8 => U8, u16 => U16, u32 => U32, u64 => U64, &'static str => Text);

/// A component whose state can be inspected by path.
pub trait Observable {
    /// Look up one property. `None` for paths the component does not know.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path [`query`](Self::query) answers, with `<...>` marking
    /// a parameter.
    fn query_paths(&self) -> &'static [&'static str];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_and_words_print_as_spectrum_hex() {
        assert_eq!(Value::U8(0x0A).to_string(), "$0A");
        assert_eq!(Value::U16(0x4000).to_string(), "$4000");
        assert_eq!(Value::U32(69_888).to_string(), "69888");
        assert_eq!(Value::from("48K").to_string(), "48K");
    }
}
