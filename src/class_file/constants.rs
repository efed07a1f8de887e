use crate::binary::{Deserialize, Serialize};
use crate::class_file::attribute::{Attribute, AttributeInfo};
use crate::errors::{Error, ParseError};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;

/// Class file constant pool builder
///
/// The pool is append only: entries are deduplicated on insertion and never removed or mutated.
/// Once class file writing begins the pool is consumed into a plain [`OffsetVec`] and no further
/// entries can be added.
pub struct ConstantPool {
    constants: OffsetVec<Constant>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    field_refs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), FieldRefConstantIndex>,
    method_refs:
        HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
    method_handles: HashMap<(HandleKind, ConstantIndex), ConstantIndex>,
    method_types: HashMap<Utf8ConstantIndex, ConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), InvokeDynamicConstantIndex>,
}

impl ConstantPool {
    /// Make a fresh empty constant pool
    pub fn new() -> ConstantPool {
        ConstantPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            field_refs: HashMap::new(),
            method_refs: HashMap::new(),
            method_handles: HashMap::new(),
            method_types: HashMap::new(),
            invoke_dynamics: HashMap::new(),
        }
    }

    /// Number of entries in the pool (`long`/`double` count once)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Look up an entry by its 1-based index
    ///
    /// Returns `None` for index 0, out of range indices, and the unusable slot following a
    /// `long`/`double` entry.
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants
            .get_offset(Offset(index.0 as usize))
            .map(|(_, constant)| constant)
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: indexing starts at 1, the pool count must fit in a `u16`, and some constants take
    /// two index slots.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }

        Ok(ConstantIndex(self.constants.push(constant).0 as u16))
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Get or insert an entry, deduplicating against structurally equal entries
    ///
    /// This is the generic entry point; the typed `get_*` methods below are usually more
    /// convenient (and return typed indices).
    pub fn insert(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        match constant {
            Constant::Utf8(text) => Ok(self.get_utf8(text)?.into()),
            Constant::Integer(value) => self.get_integer(value),
            Constant::Float(value) => self.get_float(value),
            Constant::Long(value) => self.get_long(value),
            Constant::Double(value) => self.get_double(value),
            Constant::Class(name) => Ok(self.get_class(name)?.into()),
            Constant::String(utf8) => Ok(self.get_string(utf8)?.into()),
            Constant::FieldRef(class, name_and_type) => {
                Ok(self.get_field_ref(class, name_and_type)?.into())
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => Ok(self
                .get_method_ref(class, name_and_type, is_interface)?
                .into()),
            Constant::NameAndType { name, descriptor } => {
                Ok(self.get_name_and_type(name, descriptor)?.into())
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => self.get_method_handle(handle_kind, member),
            Constant::MethodType { descriptor } => self.get_method_type(descriptor),
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => Ok(self
                .get_invoke_dynamic(bootstrap_method, method_descriptor)?
                .into()),
        }
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, Error> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from the constant pool
    pub fn get_class(&mut self, name: Utf8ConstantIndex) -> Result<ClassConstantIndex, Error> {
        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(name))?);
            self.classes.insert(name, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant, starting from the binary class name
    pub fn get_class_of(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        self.get_class(name)
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(&mut self, utf8: Utf8ConstantIndex) -> Result<StringConstantIndex, Error> {
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let idx = StringConstantIndex(self.push_constant(Constant::String(utf8))?);
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    pub fn get_integer(&mut self, value: i32) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.integers.get(&value) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Integer(value))?;
            self.integers.insert(value, idx);
            Ok(idx)
        }
    }

    /// Get or insert a float constant (deduplicated on the bit pattern, so `NaN`s and signed
    /// zeros are distinguished)
    pub fn get_float(&mut self, value: f32) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.floats.get(&value.to_bits()) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Float(value))?;
            self.floats.insert(value.to_bits(), idx);
            Ok(idx)
        }
    }

    pub fn get_long(&mut self, value: i64) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.longs.get(&value) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Long(value))?;
            self.longs.insert(value, idx);
            Ok(idx)
        }
    }

    pub fn get_double(&mut self, value: f64) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.doubles.get(&value.to_bits()) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Double(value))?;
            self.doubles.insert(value.to_bits(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a field reference constant from the constant pool
    pub fn get_field_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<FieldRefConstantIndex, Error> {
        let key = (class, name_and_type);
        if let Some(idx) = self.field_refs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::FieldRef(class, name_and_type);
            let idx = FieldRefConstantIndex(self.push_constant(constant)?);
            self.field_refs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method reference constant from the constant pool
    pub fn get_method_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let key = (class, name_and_type, is_interface);
        if let Some(idx) = self.method_refs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            };
            let idx = MethodRefConstantIndex(self.push_constant(constant)?);
            self.method_refs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method handle constant from the constant pool
    pub fn get_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, Error> {
        let key = (handle_kind, member);
        if let Some(idx) = self.method_handles.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodHandle {
                handle_kind,
                member,
            };
            let idx = self.push_constant(constant)?;
            self.method_handles.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method type constant from the constant pool
    pub fn get_method_type(&mut self, descriptor: Utf8ConstantIndex) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.method_types.get(&descriptor) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodType { descriptor };
            let idx = self.push_constant(constant)?;
            self.method_types.insert(descriptor, idx);
            Ok(idx)
        }
    }

    /// Get or insert an invoke dynamic constant from the constant pool
    pub fn get_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    ) -> Result<InvokeDynamicConstantIndex, Error> {
        let key = (bootstrap_method, method_descriptor);
        if let Some(idx) = self.invoke_dynamics.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            };
            let idx = InvokeDynamicConstantIndex(self.push_constant(constant)?);
            self.invoke_dynamics.insert(key, idx);
            Ok(idx)
        }
    }

    /// Wrap a typed attribute body into an [`Attribute`], interning its name
    pub fn get_attribute(&mut self, info: AttributeInfo) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(info.name())?;
        Ok(Attribute { name_index, info })
    }

    /// Text behind a utf8 constant
    pub fn utf8_text(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.get(index.into()) {
            Some(Constant::Utf8(text)) => Ok(text),
            _ => Err(Error::MissingConstant(index.into())),
        }
    }

    /// Name and descriptor strings behind a name & type constant
    pub fn name_and_type_parts(
        &self,
        index: NameAndTypeConstantIndex,
    ) -> Result<(&str, &str), Error> {
        match self.get(index.into()) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8_text(*name)?, self.utf8_text(*descriptor)?))
            }
            _ => Err(Error::MissingConstant(index.into())),
        }
    }

    /// Class, member name, and descriptor behind a field reference
    pub fn field_ref_parts(
        &self,
        index: FieldRefConstantIndex,
    ) -> Result<(ClassConstantIndex, &str, &str), Error> {
        match self.get(index.into()) {
            Some(Constant::FieldRef(class, name_and_type)) => {
                let (name, descriptor) = self.name_and_type_parts(*name_and_type)?;
                Ok((*class, name, descriptor))
            }
            _ => Err(Error::MissingConstant(index.into())),
        }
    }

    /// Class, member name, and descriptor behind a method reference
    pub fn method_ref_parts(
        &self,
        index: MethodRefConstantIndex,
    ) -> Result<(ClassConstantIndex, &str, &str), Error> {
        match self.get(index.into()) {
            Some(Constant::MethodRef {
                class,
                name_and_type,
                ..
            }) => {
                let (name, descriptor) = self.name_and_type_parts(*name_and_type)?;
                Ok((*class, name, descriptor))
            }
            _ => Err(Error::MissingConstant(index.into())),
        }
    }

    /// Method descriptor string behind an invoke dynamic constant
    pub fn invoke_dynamic_descriptor(
        &self,
        index: InvokeDynamicConstantIndex,
    ) -> Result<&str, Error> {
        match self.get(index.into()) {
            Some(Constant::InvokeDynamic {
                method_descriptor, ..
            }) => Ok(self.name_and_type_parts(*method_descriptor)?.1),
            _ => Err(Error::MissingConstant(index.into())),
        }
    }
}

impl Default for ConstantPool {
    fn default() -> ConstantPool {
        ConstantPool::new()
    }
}

/// Constants as in the constant pool
///
/// Note: constant kinds added after Java 8 for dynamically-computed constants (`Dynamic`,
/// `Module`, `Package`) are not included.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the null character
    /// `\u{0000}` and the encoding of supplementary characters is different).
    Utf8(String),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the handle kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the spec:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(utf8) => {
                8u8.serialize(writer)?;
                utf8.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Constant, ParseError> {
        let constant = match u8::parse(reader)? {
            1 => {
                let length = u16::parse(reader)?;
                let mut buffer = vec![0u8; length as usize];
                reader.read_exact(&mut buffer)?;
                Constant::Utf8(decode_modified_utf8(&buffer)?)
            }
            3 => Constant::Integer(i32::parse(reader)?),
            4 => Constant::Float(f32::parse(reader)?),
            5 => Constant::Long(i64::parse(reader)?),
            6 => Constant::Double(f64::parse(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::parse(reader)?),
            8 => Constant::String(Utf8ConstantIndex::parse(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::parse(reader)?,
                NameAndTypeConstantIndex::parse(reader)?,
            ),
            tag @ (10 | 11) => Constant::MethodRef {
                class: ClassConstantIndex::parse(reader)?,
                name_and_type: NameAndTypeConstantIndex::parse(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::parse(reader)?,
                descriptor: Utf8ConstantIndex::parse(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: HandleKind::parse(reader)?,
                member: ConstantIndex::parse(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::parse(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::parse(reader)?,
                method_descriptor: NameAndTypeConstantIndex::parse(reader)?,
            },
            tag => return Err(ParseError::UnknownConstantTag(tag)),
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u{0000}` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x1F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Supplementary characters come out of the 3-byte decoder as surrogate code units, which then
/// get paired back up. Unpaired surrogates, embedded null bytes, and 4-byte sequences are all
/// rejected.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ParseError> {
    fn continuation(bytes: &[u8], at: usize) -> Result<u32, ParseError> {
        match bytes.get(at) {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Ok((b & 0x3F) as u32),
            Some(b) => Err(ParseError::ModifiedUtf8(format!(
                "expected continuation byte, found 0x{b:02x}"
            ))),
            None => Err(ParseError::ModifiedUtf8(
                "truncated multi-byte sequence".to_string(),
            )),
        }
    }

    fn three_byte(bytes: &[u8], at: usize) -> Result<u32, ParseError> {
        let b = bytes[at] as u32;
        Ok((b & 0x0F) << 12 | continuation(bytes, at + 1)? << 6 | continuation(bytes, at + 2)?)
    }

    let mut decoded = String::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let code: u32 = if b & 0b1000_0000 == 0 {
            if b == 0 {
                return Err(ParseError::ModifiedUtf8("embedded null byte".to_string()));
            }
            i += 1;
            b as u32
        } else if b & 0b1110_0000 == 0b1100_0000 {
            let code = ((b & 0x1F) as u32) << 6 | continuation(bytes, i + 1)?;
            i += 2;
            code
        } else if b & 0b1111_0000 == 0b1110_0000 {
            let code = three_byte(bytes, i)?;
            i += 3;
            if (0xD800..=0xDBFF).contains(&code) {
                // High surrogate: the low surrogate must follow as another 3-byte sequence
                match bytes.get(i) {
                    Some(b2) if b2 & 0b1111_0000 == 0b1110_0000 => (),
                    _ => {
                        return Err(ParseError::ModifiedUtf8(
                            "unpaired high surrogate".to_string(),
                        ))
                    }
                }
                let low = three_byte(bytes, i)?;
                i += 3;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(ParseError::ModifiedUtf8(
                        "unpaired high surrogate".to_string(),
                    ));
                }
                0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00)
            } else if (0xDC00..=0xDFFF).contains(&code) {
                return Err(ParseError::ModifiedUtf8(
                    "unpaired low surrogate".to_string(),
                ));
            } else {
                code
            }
        } else {
            return Err(ParseError::ModifiedUtf8(format!(
                "invalid leading byte 0x{b:02x}"
            )));
        };

        match char::from_u32(code) {
            Some(c) => decoded.push(c),
            None => {
                return Err(ParseError::ModifiedUtf8(format!(
                    "invalid code point {code:#x}"
                )))
            }
        }
    }
    Ok(decoded)
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StringConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct FieldRefConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct InvokeDynamicConstantIndex(pub ConstantIndex);

impl ClassConstantIndex {
    /// Zero index, used in exception handlers as the "catch everything" marker
    pub const CATCH_ALL: ClassConstantIndex = ClassConstantIndex(ConstantIndex(0));
}

macro_rules! delegate_constant_index {
    ($name:ident) => {
        impl From<$name> for ConstantIndex {
            fn from(index: $name) -> ConstantIndex {
                index.0
            }
        }

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self, ParseError> {
                Ok($name(ConstantIndex::parse(reader)?))
            }
        }
    };
}

delegate_constant_index!(Utf8ConstantIndex);
delegate_constant_index!(StringConstantIndex);
delegate_constant_index!(NameAndTypeConstantIndex);
delegate_constant_index!(ClassConstantIndex);
delegate_constant_index!(FieldRefConstantIndex);
delegate_constant_index!(MethodRefConstantIndex);
delegate_constant_index!(InvokeDynamicConstantIndex);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<ConstantIndex, ParseError> {
        Ok(ConstantIndex(u16::parse(reader)?))
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

impl Deserialize for HandleKind {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<HandleKind, ParseError> {
        Ok(match u8::parse(reader)? {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            kind => return Err(ParseError::UnknownHandleKind(kind)),
        })
    }
}

/// The pool count is one more than the number of index slots used, and `long`/`double` entries
/// use two slots each.
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, _, constant) in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for OffsetVec<Constant> {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<OffsetVec<Constant>, ParseError> {
        let count = u16::parse(reader)? as usize;
        let mut constants: OffsetVec<Constant> = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count {
            constants.push(Constant::parse(reader)?);
        }
        // A wide final entry can overshoot the declared count by one slot
        if constants.offset_len().0 != count {
            return Err(ParseError::ConstantPoolCountMismatch {
                declared: count as u16,
                found: constants.offset_len().0,
            });
        }
        Ok(constants)
    }
}

/// Look up a utf8 constant in an already-built pool (parser side)
pub fn utf8_at(constants: &OffsetVec<Constant>, index: Utf8ConstantIndex) -> Result<&str, ParseError> {
    let raw: ConstantIndex = index.into();
    match constants.get_offset(Offset(raw.0 as usize)) {
        Some((_, Constant::Utf8(text))) => Ok(text),
        Some(_) => Err(ParseError::WrongConstantKind {
            index: raw.0,
            expected: "Utf8",
        }),
        None => Err(ParseError::BadConstantIndex(raw.0)),
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;

    #[test]
    fn utf8_is_deduplicated() {
        let mut constants = ConstantPool::new();
        let first = constants.get_utf8("out").unwrap();
        let second = constants.get_utf8("out").unwrap();
        assert_eq!(first, second);
        assert_eq!(ConstantIndex::from(first), ConstantIndex(1));
        assert_eq!(constants.len(), 1);
    }

    #[test]
    fn distinct_entries_get_distinct_indices() {
        let mut constants = ConstantPool::new();
        let foo = constants.get_utf8("foo").unwrap();
        let bar = constants.get_utf8("bar").unwrap();
        assert_ne!(foo, bar);
        assert_eq!(ConstantIndex::from(bar), ConstantIndex(2));
    }

    #[test]
    fn longs_occupy_two_slots() {
        let mut constants = ConstantPool::new();
        let long = constants.get_long(42).unwrap();
        let next = constants.get_utf8("after").unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(ConstantIndex::from(next), ConstantIndex(3));

        // The slot after the long is unusable
        assert!(constants.get(ConstantIndex(2)).is_none());
        assert!(matches!(
            constants.get(ConstantIndex(1)),
            Some(Constant::Long(42))
        ));
    }

    #[test]
    fn generic_insert_agrees_with_typed_getters() {
        let mut constants = ConstantPool::new();
        let via_typed = constants.get_integer(7).unwrap();
        let via_insert = constants.insert(Constant::Integer(7)).unwrap();
        assert_eq!(via_typed, via_insert);
    }

    #[test]
    fn float_dedup_uses_bit_patterns() {
        let mut constants = ConstantPool::new();
        let pos = constants.get_float(0.0).unwrap();
        let neg = constants.get_float(-0.0).unwrap();
        assert_ne!(pos, neg);
    }

    #[test]
    fn wide_entry_straddling_the_pool_end_is_rejected() {
        // Count 2 leaves room for one slot, but the Long entry takes two
        let bytes = vec![0u8, 2, 5, 0, 0, 0, 0, 0, 0, 0, 1];
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(
            <OffsetVec<Constant>>::parse(&mut cursor),
            Err(ParseError::ConstantPoolCountMismatch {
                declared: 2,
                found: 3,
            })
        ));
    }
}

#[cfg(test)]
mod modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(
            encode_modified_utf8("hel10_World"),
            vec![104, 101, 108, 49, 48, 95, 87, 111, 114, 108, 100]
        );
    }

    #[test]
    fn two_and_three_byte_encodings() {
        assert_eq!(
            encode_modified_utf8("ĄǍǞǠǺȀȂȦȺӐӒ"),
            vec![
                196, 132, 199, 141, 199, 158, 199, 160, 199, 186, 200, 128, 200, 130, 200, 166,
                200, 186, 211, 144, 211, 146
            ]
        );
    }

    #[test]
    fn supplementary_characters() {
        assert_eq!(
            encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"),
            vec![
                237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237,
                191, 191
            ]
        );
    }

    #[test]
    fn decode_inverts_encode() {
        for input in ["", "foo", "a\x00a", "Ąऄ", "\u{10000}\u{dffff}\u{10FFFF}"] {
            let encoded = encode_modified_utf8(input);
            assert_eq!(decode_modified_utf8(&encoded).unwrap(), input);
        }
    }

    #[test]
    fn decode_rejects_malformed_input() {
        // Embedded null
        assert!(decode_modified_utf8(&[97, 0, 97]).is_err());
        // Truncated 2-byte sequence
        assert!(decode_modified_utf8(&[0b1100_0010]).is_err());
        // Unpaired high surrogate
        assert!(decode_modified_utf8(&[237, 160, 128]).is_err());
        // 4-byte UTF-8 is not legal modified UTF-8
        assert!(decode_modified_utf8(&[0xF0, 0x90, 0x80, 0x80]).is_err());
    }
}
