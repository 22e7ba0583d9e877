//! Raw and typed argument values.

use crate::shorty::TypeTag;
use crate::sys::jni;

/// A heap reference as the runtime stores it in frames and argument arrays.
///
/// ART compresses references to 32 bits. A `RawObject` is *not* registered
/// with the runtime: it is only valid until the next suspension point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawObject(pub u32);

impl RawObject {
    pub const NULL: RawObject = RawObject(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A primitive value tagged with its type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Byte(_) => TypeTag::Byte,
            Value::Char(_) => TypeTag::Char,
            Value::Short(_) => TypeTag::Short,
            Value::Int(_) => TypeTag::Int,
            Value::Long(_) => TypeTag::Long,
            Value::Float(_) => TypeTag::Float,
            Value::Double(_) => TypeTag::Double,
        }
    }

    /// Reads a value of type `tag` from a raw 64-bit pattern.
    ///
    /// Narrow types use the low bits. Returns `None` for `void` and references.
    pub fn from_bits(tag: TypeTag, bits: u64) -> Option<Value> {
        Some(match tag {
            TypeTag::Boolean => Value::Boolean(bits as u8 != 0),
            TypeTag::Byte => Value::Byte(bits as i8),
            TypeTag::Char => Value::Char(bits as u16),
            TypeTag::Short => Value::Short(bits as i16),
            TypeTag::Int => Value::Int(bits as i32),
            TypeTag::Long => Value::Long(bits as i64),
            TypeTag::Float => Value::Float(f32::from_bits(bits as u32)),
            TypeTag::Double => Value::Double(f64::from_bits(bits)),
            TypeTag::Void | TypeTag::Reference => return None,
        })
    }

    /// The 64-bit pattern returned through the calling convention's result channel.
    ///
    /// Signed integers are sign-extended, `boolean` and `char` zero-extended,
    /// floats carry their IEEE bits in the low word.
    pub fn to_bits(self) -> u64 {
        match self {
            Value::Boolean(z) => z as u64,
            Value::Byte(b) => b as i64 as u64,
            Value::Char(c) => c as u64,
            Value::Short(s) => s as i64 as u64,
            Value::Int(i) => i as i64 as u64,
            Value::Long(j) => j as u64,
            Value::Float(f) => f.to_bits() as u64,
            Value::Double(d) => d.to_bits(),
        }
    }

    pub fn to_jvalue(self) -> jni::jvalue {
        match self {
            Value::Boolean(z) => jni::jvalue { z: z as jni::jboolean },
            Value::Byte(b) => jni::jvalue { b },
            Value::Char(c) => jni::jvalue { c },
            Value::Short(s) => jni::jvalue { s },
            Value::Int(i) => jni::jvalue { i },
            Value::Long(j) => jni::jvalue { j },
            Value::Float(f) => jni::jvalue { f },
            Value::Double(d) => jni::jvalue { d },
        }
    }
}
