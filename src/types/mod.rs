//! Descriptor parsing and type-name conventions.
//!
//! Type names are plain strings: classes use slash-separated binary names
//! (`java/lang/String`), primitives use their Java keywords (`int`), and
//! arrays append one `[]` per dimension (`java/lang/String[][]`).

use std::str::FromStr;

/// The type name used when no more precise type is known.
pub const UNKNOWN_TYPE: &str = "java/lang/Object";

/// The array counterpart of [`UNKNOWN_TYPE`].
pub const UNKNOWN_ARRAY_TYPE: &str = "java/lang/Object[]";

/// Suffix marking one array dimension in a type name.
pub const ARRAY_SUFFIX: &str = "[]";

/// An error raised when a field or method descriptor is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid descriptor: {descriptor}")]
pub struct InvalidDescriptor {
    /// The offending descriptor string.
    pub descriptor: String,
}

/// A parsed JVM type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JvmType {
    /// The type name (e.g., `int`, `java/lang/String`, `long[]`).
    pub name: String,
    /// The number of words a value of this type occupies (1 or 2).
    pub width: u8,
    /// Whether the type is a class or array type.
    pub is_reference: bool,
}

impl JvmType {
    /// Creates a reference type with the given name.
    #[must_use]
    pub fn reference<S: Into<String>>(name: S) -> Self {
        JvmType {
            name: name.into(),
            width: 1,
            is_reference: true,
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// The declared parameter types, in order. The receiver is not included.
    pub parameters: Vec<JvmType>,
    /// The return type. `None` for `void`.
    pub return_type: Option<JvmType>,
}

impl FromStr for MethodDescriptor {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(invalid(descriptor));
        }
        let mut pos = 1;
        let mut parameters = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => parameters.push(parse_component(descriptor, &mut pos)?),
                None => return Err(invalid(descriptor)),
            }
        }
        let return_type = if bytes.get(pos) == Some(&b'V') {
            pos += 1;
            None
        } else {
            Some(parse_component(descriptor, &mut pos)?)
        };
        if pos == bytes.len() {
            Ok(MethodDescriptor {
                parameters,
                return_type,
            })
        } else {
            Err(invalid(descriptor))
        }
    }
}

/// Parses a field descriptor into a [`JvmType`].
///
/// # Errors
/// Returns [`InvalidDescriptor`] if the descriptor is malformed or has
/// trailing characters.
pub fn parse_field_descriptor(descriptor: &str) -> Result<JvmType, InvalidDescriptor> {
    let mut pos = 0;
    let parsed = parse_component(descriptor, &mut pos)?;
    if pos == descriptor.len() {
        Ok(parsed)
    } else {
        Err(invalid(descriptor))
    }
}

/// Converts a field descriptor into a type name.
///
/// # Errors
/// Returns [`InvalidDescriptor`] if the descriptor is malformed.
pub fn type_name(descriptor: &str) -> Result<String, InvalidDescriptor> {
    parse_field_descriptor(descriptor).map(|t| t.name)
}

/// Returns `true` if the type name denotes an array type.
#[must_use]
pub fn is_array_type_name(name: &str) -> bool {
    name.ends_with(ARRAY_SUFFIX)
}

/// Strips all array dimensions from a type name.
#[must_use]
pub fn strip_array_suffix(name: &str) -> &str {
    let mut base = name;
    while let Some(stripped) = base.strip_suffix(ARRAY_SUFFIX) {
        base = stripped;
    }
    base
}

/// Returns `true` for the names of primitive types and `void`.
#[must_use]
pub fn is_primitive_type_name(name: &str) -> bool {
    matches!(
        name,
        "boolean" | "byte" | "char" | "short" | "int" | "long" | "float" | "double" | "void"
    )
}

fn invalid(descriptor: &str) -> InvalidDescriptor {
    InvalidDescriptor {
        descriptor: descriptor.to_owned(),
    }
}

fn parse_component(descriptor: &str, pos: &mut usize) -> Result<JvmType, InvalidDescriptor> {
    let bytes = descriptor.as_bytes();
    let mut dimensions = 0usize;
    while bytes.get(*pos) == Some(&b'[') {
        dimensions += 1;
        *pos += 1;
    }
    let (name, width) = match bytes.get(*pos) {
        Some(b'Z') => ("boolean".to_owned(), 1),
        Some(b'B') => ("byte".to_owned(), 1),
        Some(b'C') => ("char".to_owned(), 1),
        Some(b'S') => ("short".to_owned(), 1),
        Some(b'I') => ("int".to_owned(), 1),
        Some(b'J') => ("long".to_owned(), 2),
        Some(b'F') => ("float".to_owned(), 1),
        Some(b'D') => ("double".to_owned(), 2),
        Some(b'L') => {
            let rest = &descriptor[*pos + 1..];
            let Some(end) = rest.find(';') else {
                return Err(invalid(descriptor));
            };
            if end == 0 {
                return Err(invalid(descriptor));
            }
            let name = rest[..end].to_owned();
            *pos += 1 + end; // adjusted below together with the tag byte
            (name, 1)
        }
        _ => return Err(invalid(descriptor)),
    };
    *pos += 1;
    if dimensions > 0 {
        let mut array_name = name;
        for _ in 0..dimensions {
            array_name.push_str(ARRAY_SUFFIX);
        }
        Ok(JvmType {
            name: array_name,
            width: 1,
            is_reference: true,
        })
    } else {
        let is_reference = width == 1 && bytes[*pos - 1] == b';';
        Ok(JvmType {
            name,
            width,
            is_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive_descriptors() {
        let int = parse_field_descriptor("I").unwrap();
        assert_eq!(int.name, "int");
        assert_eq!(int.width, 1);
        assert!(!int.is_reference);

        let long = parse_field_descriptor("J").unwrap();
        assert_eq!(long.name, "long");
        assert_eq!(long.width, 2);
    }

    #[test]
    fn parses_class_and_array_descriptors() {
        let string = parse_field_descriptor("Ljava/lang/String;").unwrap();
        assert_eq!(string.name, "java/lang/String");
        assert!(string.is_reference);

        let matrix = parse_field_descriptor("[[D").unwrap();
        assert_eq!(matrix.name, "double[][]");
        assert_eq!(matrix.width, 1);
        assert!(matrix.is_reference);

        let strings = parse_field_descriptor("[Ljava/lang/String;").unwrap();
        assert_eq!(strings.name, "java/lang/String[]");
    }

    #[test]
    fn parses_method_descriptors() {
        let desc: MethodDescriptor = "(Ljava/lang/String;[IJ)V".parse().unwrap();
        assert_eq!(desc.parameters.len(), 3);
        assert_eq!(desc.parameters[0].name, "java/lang/String");
        assert_eq!(desc.parameters[1].name, "int[]");
        assert_eq!(desc.parameters[2].name, "long");
        assert_eq!(desc.parameters[2].width, 2);
        assert!(desc.return_type.is_none());

        let desc: MethodDescriptor = "()Ljava/lang/Object;".parse().unwrap();
        assert!(desc.parameters.is_empty());
        assert_eq!(desc.return_type.unwrap().name, "java/lang/Object");
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_field_descriptor("X").is_err());
        assert!(parse_field_descriptor("II").is_err());
        assert!("(I".parse::<MethodDescriptor>().is_err());
        assert!("(I)VV".parse::<MethodDescriptor>().is_err());
    }

    #[test]
    fn array_name_helpers() {
        assert!(is_array_type_name("int[]"));
        assert!(!is_array_type_name("java/lang/Object"));
        assert_eq!(strip_array_suffix("java/lang/String[][]"), "java/lang/String");
        assert_eq!(strip_array_suffix("int"), "int");
    }
}
