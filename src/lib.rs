//! Assembler and parser for JVM class files
//!
//! The [`class_file`] module models the binary format: a [`ClassFile`](class_file::ClassFile)
//! holds a constant pool, fields, methods, and attributes, and serializes to (or parses from)
//! the class file wire format. The [`code`] module assembles method bodies from symbolic
//! instructions, computing branch offsets, stack/locals maximums, and stack map frames along the
//! way. Constants are interned through a [`ConstantPool`](class_file::ConstantPool), which
//! deduplicates entries and hands back typed indices.
//!
//! ```
//! use jasm::access_flags::{ClassAccessFlags, MethodAccessFlags};
//! use jasm::class_file::{AttributeInfo, ClassFile, ConstantPool, Method, Version};
//! use jasm::code::{assemble, Instruction};
//! use jasm::util::OffsetVec;
//!
//! # fn main() -> Result<(), jasm::errors::Error> {
//! let mut constants = ConstantPool::new();
//! let this_class = constants.get_class_of("Answer")?;
//! let super_class = constants.get_class_of("java/lang/Object")?;
//! let name_index = constants.get_utf8("answer")?;
//! let descriptor_index = constants.get_utf8("()I")?;
//!
//! let code = assemble(
//!     &[Instruction::iconst(42)?, Instruction::IReturn],
//!     &mut constants,
//!     OffsetVec::new(),
//! )?;
//!
//! let class = ClassFile {
//!     version: Version::JAVA8,
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     this_class,
//!     super_class,
//!     interfaces: vec![],
//!     fields: vec![],
//!     methods: vec![Method {
//!         access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!         name_index,
//!         descriptor_index,
//!         attributes: vec![constants.get_attribute(AttributeInfo::Code(code))?],
//!     }],
//!     attributes: vec![],
//!     constants: constants.into_offset_vec(),
//! };
//! # let _ = class;
//! # Ok(())
//! # }
//! ```

pub mod access_flags;
pub mod binary;
pub mod class_file;
pub mod code;
pub mod descriptors;
pub mod errors;
pub mod util;
pub mod verifier;
