use crate::class_file::ConstantPool;
use crate::errors::Error;
use crate::util::Width;
use crate::verifier::VerificationType;
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self, Error> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(_) => Err(Error::BadDescriptor(source.to_string())),
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Byte
            | BaseType::Char
            | BaseType::Float
            | BaseType::Int
            | BaseType::Short
            | BaseType::Boolean => 1,
            BaseType::Double | BaseType::Long => 2,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        let typ = match source.peek() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            other => {
                return Err(Error::BadDescriptor(format!(
                    "expected base type, found {other:?}"
                )))
            }
        };
        let _ = source.next();
        Ok(typ)
    }
}

/// Type of a class field, method argument, or method return
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),

    /// Object type, carrying the binary class name (eg. `java/lang/String`)
    Object(String),

    Array(Box<FieldType>),
}

impl FieldType {
    pub const OBJECT: &'static str = "java/lang/Object";

    /// The class name that goes in a `CONSTANT_Class_info` for this type, if it is a reference
    /// type. Object types use the plain binary name while array types use the full descriptor.
    pub fn class_internal_name(&self) -> Option<String> {
        match self {
            FieldType::Base(_) => None,
            FieldType::Object(name) => Some(name.clone()),
            FieldType::Array(_) => Some(self.render()),
        }
    }

    /// Verification type of a value of this type, interning the class constant for reference
    /// types
    pub fn verification_type(
        &self,
        constants: &mut ConstantPool,
    ) -> Result<VerificationType, Error> {
        Ok(match self {
            FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Object(_) | FieldType::Array(_) => {
                let name = self.class_internal_name().unwrap();
                VerificationType::Object(constants.get_class_of(&name)?)
            }
        })
    }
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base) => base.width(),
            FieldType::Object(_) | FieldType::Array(_) => 1,
        }
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base) => base.render_to(write_to),
            FieldType::Object(name) => {
                write_to.push('L');
                write_to.push_str(name);
                write_to.push(';');
            }
            FieldType::Array(elem) => {
                write_to.push('[');
                elem.render_to(write_to);
            }
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.peek() {
            Some('L') => {
                let _ = source.next();
                let mut name = String::new();
                loop {
                    match source.next() {
                        Some(';') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(Error::BadDescriptor(
                                "object descriptor missing ';'".to_string(),
                            ))
                        }
                    }
                }
                Ok(FieldType::Object(name))
            }
            Some('[') => {
                let _ = source.next();
                let elem = FieldType::parse_from(source)?;
                Ok(FieldType::Array(Box::new(elem)))
            }
            _ => Ok(FieldType::Base(BaseType::parse_from(source)?)),
        }
    }
}

/// Signature of a method
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDescriptor {
    /// Argument types
    pub parameters: Vec<FieldType>,

    /// Return type (`None` for `void`)
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Total number of stack/local slots the parameters occupy
    pub fn parameter_slots(&self) -> usize {
        self.parameters.iter().map(Width::width).sum()
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        if source.next() != Some('(') {
            return Err(Error::BadDescriptor(
                "method descriptor missing '('".to_string(),
            ));
        }
        let mut parameters = vec![];
        while source.peek() != Some(&')') {
            if source.peek().is_none() {
                return Err(Error::BadDescriptor(
                    "method descriptor missing ')'".to_string(),
                ));
            }
            parameters.push(FieldType::parse_from(source)?);
        }
        let _ = source.next();
        let return_type = if source.peek() == Some(&'V') {
            let _ = source.next();
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn field_descriptor_round_trips() {
        for descriptor in ["I", "J", "Ljava/lang/String;", "[[D", "[Ljava/lang/Object;"] {
            let parsed = FieldType::parse(descriptor).unwrap();
            assert_eq!(parsed.render(), descriptor);
        }
    }

    #[test]
    fn method_descriptor_parses() {
        let descriptor = MethodDescriptor::parse("(IJLjava/lang/String;)V").unwrap();
        assert_eq!(
            descriptor.parameters,
            vec![
                FieldType::Base(BaseType::Int),
                FieldType::Base(BaseType::Long),
                FieldType::Object("java/lang/String".to_string()),
            ]
        );
        assert_eq!(descriptor.return_type, None);
        assert_eq!(descriptor.parameter_slots(), 4);
    }

    #[test]
    fn leftover_input_is_rejected() {
        assert!(FieldType::parse("II").is_err());
        assert!(MethodDescriptor::parse("()VX").is_err());
    }

    #[test]
    fn array_class_name_is_the_descriptor() {
        let array = FieldType::parse("[I").unwrap();
        assert_eq!(array.class_internal_name().unwrap(), "[I");
        let object = FieldType::parse("Ljava/lang/String;").unwrap();
        assert_eq!(object.class_internal_name().unwrap(), "java/lang/String");
    }
}
