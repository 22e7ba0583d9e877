//! Method type descriptors in compact ("shorty") form.
//!
//! A shorty is one character per type, return type first:
//! `"VIL"` is `void m(int, Object)`, `"JDZ"` is `long m(double, boolean)`.
//! Every reference type (objects and arrays) collapses to `L`.

use std::fmt;

use crate::error::{HookError, Result};

/// The kind of a return value or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl TypeTag {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'V' => TypeTag::Void,
            'Z' => TypeTag::Boolean,
            'B' => TypeTag::Byte,
            'C' => TypeTag::Char,
            'S' => TypeTag::Short,
            'I' => TypeTag::Int,
            'J' => TypeTag::Long,
            'F' => TypeTag::Float,
            'D' => TypeTag::Double,
            'L' => TypeTag::Reference,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            TypeTag::Void => 'V',
            TypeTag::Boolean => 'Z',
            TypeTag::Byte => 'B',
            TypeTag::Char => 'C',
            TypeTag::Short => 'S',
            TypeTag::Int => 'I',
            TypeTag::Long => 'J',
            TypeTag::Float => 'F',
            TypeTag::Double => 'D',
            TypeTag::Reference => 'L',
        }
    }

    /// Long and double occupy two 32-bit argument slots.
    pub fn is_wide(self) -> bool {
        matches!(self, TypeTag::Long | TypeTag::Double)
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, TypeTag::Void | TypeTag::Reference)
    }

    /// Number of 32-bit slots a value of this type occupies.
    pub fn slot_count(self) -> usize {
        match self {
            TypeTag::Void => 0,
            TypeTag::Long | TypeTag::Double => 2,
            _ => 1,
        }
    }

    /// Binary name of the wrapper class used to box this primitive.
    pub fn wrapper_class(self) -> Option<&'static str> {
        Some(match self {
            TypeTag::Boolean => "java/lang/Boolean",
            TypeTag::Byte => "java/lang/Byte",
            TypeTag::Char => "java/lang/Character",
            TypeTag::Short => "java/lang/Short",
            TypeTag::Int => "java/lang/Integer",
            TypeTag::Long => "java/lang/Long",
            TypeTag::Float => "java/lang/Float",
            TypeTag::Double => "java/lang/Double",
            TypeTag::Void | TypeTag::Reference => return None,
        })
    }

    /// The `<primitive>Value()` accessor on the wrapper class, with its signature.
    pub fn unbox_method(self) -> Option<(&'static str, &'static str)> {
        Some(match self {
            TypeTag::Boolean => ("booleanValue", "()Z"),
            TypeTag::Byte => ("byteValue", "()B"),
            TypeTag::Char => ("charValue", "()C"),
            TypeTag::Short => ("shortValue", "()S"),
            TypeTag::Int => ("intValue", "()I"),
            TypeTag::Long => ("longValue", "()J"),
            TypeTag::Float => ("floatValue", "()F"),
            TypeTag::Double => ("doubleValue", "()D"),
            TypeTag::Void | TypeTag::Reference => return None,
        })
    }

    /// Signature of the static `valueOf` factory on the wrapper class.
    pub fn value_of_signature(self) -> Option<&'static str> {
        Some(match self {
            TypeTag::Boolean => "(Z)Ljava/lang/Boolean;",
            TypeTag::Byte => "(B)Ljava/lang/Byte;",
            TypeTag::Char => "(C)Ljava/lang/Character;",
            TypeTag::Short => "(S)Ljava/lang/Short;",
            TypeTag::Int => "(I)Ljava/lang/Integer;",
            TypeTag::Long => "(J)Ljava/lang/Long;",
            TypeTag::Float => "(F)Ljava/lang/Float;",
            TypeTag::Double => "(D)Ljava/lang/Double;",
            TypeTag::Void | TypeTag::Reference => return None,
        })
    }

    /// The eight primitive tags, in shorty order.
    pub const PRIMITIVES: [TypeTag; 8] = [
        TypeTag::Boolean,
        TypeTag::Byte,
        TypeTag::Char,
        TypeTag::Short,
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::Float,
        TypeTag::Double,
    ];
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Void => "void",
            TypeTag::Boolean => "boolean",
            TypeTag::Byte => "byte",
            TypeTag::Char => "char",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Return tag followed by the parameter tags of one method.
///
/// The receiver of an instance method is not part of the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    tags: Vec<TypeTag>,
}

impl TypeDescriptor {
    /// Parses a shorty such as `"VIJL"`.
    ///
    /// Shorties come from runtime metadata, so a malformed one is a contract
    /// violation and reported as [`HookError::MalformedDescriptor`].
    pub fn parse(shorty: &str) -> Result<Self> {
        let mut tags = Vec::with_capacity(shorty.len());
        for (i, c) in shorty.chars().enumerate() {
            let tag = TypeTag::from_char(c)
                .ok_or_else(|| HookError::MalformedDescriptor(shorty.to_string()))?;
            if i > 0 && tag == TypeTag::Void {
                return Err(HookError::MalformedDescriptor(shorty.to_string()));
            }
            tags.push(tag);
        }
        if tags.is_empty() {
            return Err(HookError::MalformedDescriptor(shorty.to_string()));
        }
        Ok(TypeDescriptor { tags })
    }

    /// Converts a full method descriptor such as `"(I[JLjava/lang/String;)V"`.
    pub fn from_signature(signature: &str) -> Result<Self> {
        let malformed = || HookError::MalformedDescriptor(signature.to_string());
        let bytes = signature.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed());
        }

        let mut params = Vec::new();
        let mut pos = 1;
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let (tag, next) = field_type(bytes, pos).ok_or_else(malformed)?;
                    if tag == TypeTag::Void {
                        return Err(malformed());
                    }
                    params.push(tag);
                    pos = next;
                }
                None => return Err(malformed()),
            }
        }

        let (ret, end) = field_type(bytes, pos).ok_or_else(malformed)?;
        if end != bytes.len() {
            return Err(malformed());
        }

        let mut tags = Vec::with_capacity(params.len() + 1);
        tags.push(ret);
        tags.extend(params);
        Ok(TypeDescriptor { tags })
    }

    pub fn return_type(&self) -> TypeTag {
        self.tags[0]
    }

    pub fn params(&self) -> &[TypeTag] {
        &self.tags[1..]
    }

    pub fn param_count(&self) -> usize {
        self.tags.len() - 1
    }

    /// Total 32-bit slots for the parameters, plus one for a receiver.
    pub fn slot_count(&self, is_static: bool) -> usize {
        let receiver = if is_static { 0 } else { 1 };
        receiver + self.params().iter().map(|t| t.slot_count()).sum::<usize>()
    }

    /// The compact form, e.g. `"VIJL"`.
    pub fn shorty(&self) -> String {
        self.tags.iter().map(|t| t.as_char()).collect()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tag in &self.tags {
            write!(f, "{}", tag.as_char())?;
        }
        Ok(())
    }
}

// One field type starting at `pos`; returns the tag and the index after it.
fn field_type(bytes: &[u8], pos: usize) -> Option<(TypeTag, usize)> {
    match *bytes.get(pos)? {
        b'[' => {
            let mut end = pos;
            while bytes.get(end) == Some(&b'[') {
                end += 1;
            }
            let (element, next) = field_type(bytes, end)?;
            if element == TypeTag::Void {
                return None;
            }
            Some((TypeTag::Reference, next))
        }
        b'L' => {
            let semi = bytes[pos..].iter().position(|&b| b == b';')?;
            if semi == 1 {
                return None;
            }
            Some((TypeTag::Reference, pos + semi + 1))
        }
        c => {
            let tag = TypeTag::from_char(c as char)?;
            Some((tag, pos + 1))
        }
    }
}
