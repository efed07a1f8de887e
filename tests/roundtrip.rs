use jasm::access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use jasm::binary::Serialize;
use jasm::class_file::{
    AttributeInfo, ClassFile, ConstantPool, Field, Method, SourceFile, Version,
};
use jasm::code::{assemble, Instruction, LabelGenerator};
use jasm::errors::Error;
use jasm::util::OffsetVec;
use jasm::verifier::VerificationType;

/// Build a small but representative class: a field, a constructor, a branching static method,
/// and a method with an exception handler and string constants.
fn build_class() -> Result<ClassFile, Error> {
    let mut constants = ConstantPool::new();
    let mut labels = LabelGenerator::new();

    let this_class = constants.get_class_of("Counter")?;
    let super_class = constants.get_class_of("java/lang/Object")?;

    // void <init>() { super(); }
    let object_init = {
        let name = constants.get_utf8("<init>")?;
        let descriptor = constants.get_utf8("()V")?;
        let name_and_type = constants.get_name_and_type(name, descriptor)?;
        constants.get_method_ref(super_class, name_and_type, false)?
    };
    let constructor_code = assemble(
        &[
            Instruction::ALoad(0),
            Instruction::InvokeSpecial(object_init),
            Instruction::Return,
        ],
        &mut constants,
        [VerificationType::UninitializedThis]
            .into_iter()
            .collect::<OffsetVec<VerificationType>>(),
    )?;
    let constructor = Method {
        access_flags: MethodAccessFlags::PUBLIC,
        name_index: constants.get_utf8("<init>")?,
        descriptor_index: constants.get_utf8("()V")?,
        attributes: vec![constants.get_attribute(AttributeInfo::Code(constructor_code))?],
    };

    // static int count;
    let count_field = {
        let name = constants.get_utf8("count")?;
        let descriptor = constants.get_utf8("I")?;
        let name_and_type = constants.get_name_and_type(name, descriptor)?;
        constants.get_field_ref(this_class, name_and_type)?
    };
    let field = Field {
        access_flags: FieldAccessFlags::STATIC,
        name_index: constants.get_utf8("count")?,
        descriptor_index: constants.get_utf8("I")?,
        attributes: vec![],
    };

    // static void bump() { count = count + 1; }
    let bump_code = assemble(
        &[
            Instruction::GetStatic(count_field),
            Instruction::iconst(1)?,
            Instruction::IAdd,
            Instruction::PutStatic(count_field),
            Instruction::Return,
        ],
        &mut constants,
        OffsetVec::new(),
    )?;
    let bump = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name_index: constants.get_utf8("bump")?,
        descriptor_index: constants.get_utf8("()V")?,
        attributes: vec![constants.get_attribute(AttributeInfo::Code(bump_code))?],
    };

    // static int max(int a, int b) { return a >= b ? a : b; }
    let take_first = labels.fresh_label();
    let max_code = assemble(
        &[
            Instruction::ILoad(0),
            Instruction::ILoad(1),
            Instruction::IfICmp(jasm::code::OrdComparison::GE, take_first),
            Instruction::ILoad(1),
            Instruction::IReturn,
            Instruction::PlaceLabel(take_first),
            Instruction::ILoad(0),
            Instruction::IReturn,
        ],
        &mut constants,
        [VerificationType::Integer, VerificationType::Integer]
            .into_iter()
            .collect::<OffsetVec<VerificationType>>(),
    )?;
    let max = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name_index: constants.get_utf8("max")?,
        descriptor_index: constants.get_utf8("(II)I")?,
        attributes: vec![constants.get_attribute(AttributeInfo::Code(max_code))?],
    };

    // static String describe() { try { return "ok"; } catch (Throwable t) { return "failed"; } }
    let ok = {
        let utf8 = constants.get_utf8("ok")?;
        constants.get_string(utf8)?
    };
    let failed = {
        let utf8 = constants.get_utf8("failed")?;
        constants.get_string(utf8)?
    };
    let handler = labels.fresh_label();
    let describe_code = assemble(
        &[
            Instruction::CatchRangeStart {
                handler,
                catch_type: None,
            },
            Instruction::Ldc(ok.into()),
            Instruction::AReturn,
            Instruction::CatchRangeEnd,
            Instruction::PlaceLabel(handler),
            Instruction::Pop,
            Instruction::Ldc(failed.into()),
            Instruction::AReturn,
        ],
        &mut constants,
        OffsetVec::new(),
    )?;
    let describe = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name_index: constants.get_utf8("describe")?,
        descriptor_index: constants.get_utf8("()Ljava/lang/String;")?,
        attributes: vec![constants.get_attribute(AttributeInfo::Code(describe_code))?],
    };

    // static int classify(int x) { switch (x) { case 0: return 0; case 1: return 1; default: return -1; } }
    let case_zero = labels.fresh_label();
    let case_one = labels.fresh_label();
    let fallthrough = labels.fresh_label();
    let classify_code = assemble(
        &[
            Instruction::ILoad(0),
            Instruction::TableSwitch {
                default: fallthrough,
                low: 0,
                targets: vec![case_zero, case_one],
            },
            Instruction::PlaceLabel(case_zero),
            Instruction::IConst0,
            Instruction::IReturn,
            Instruction::PlaceLabel(case_one),
            Instruction::IConst1,
            Instruction::IReturn,
            Instruction::PlaceLabel(fallthrough),
            Instruction::IConstM1,
            Instruction::IReturn,
        ],
        &mut constants,
        [VerificationType::Integer]
            .into_iter()
            .collect::<OffsetVec<VerificationType>>(),
    )?;
    let classify = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name_index: constants.get_utf8("classify")?,
        descriptor_index: constants.get_utf8("(I)I")?,
        attributes: vec![constants.get_attribute(AttributeInfo::Code(classify_code))?],
    };

    let source_file = {
        let utf8 = constants.get_utf8("Counter.java")?;
        constants.get_attribute(AttributeInfo::SourceFile(SourceFile(utf8)))?
    };

    Ok(ClassFile {
        version: Version::JAVA8,
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![field],
        methods: vec![constructor, bump, max, describe, classify],
        attributes: vec![source_file],
        constants: constants.into_offset_vec(),
    })
}

#[test]
fn class_survives_a_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let class = build_class().unwrap();

    let mut bytes: Vec<u8> = vec![];
    class.serialize(&mut bytes).unwrap();

    // Header: magic, then minor and major version
    assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x34]);

    let reparsed = ClassFile::parse_bytes(&bytes).unwrap();
    assert_eq!(class, reparsed);
}

#[test]
fn reserialized_class_is_byte_identical() {
    let class = build_class().unwrap();

    let mut first: Vec<u8> = vec![];
    class.serialize(&mut first).unwrap();

    let reparsed = ClassFile::parse_bytes(&first).unwrap();
    let mut second: Vec<u8> = vec![];
    reparsed.serialize(&mut second).unwrap();

    assert_eq!(first, second);
}

#[test]
fn repeated_interning_reuses_pool_entries() {
    let mut constants = ConstantPool::new();
    let first = constants.get_utf8("java/lang/Object").unwrap();
    let second = constants.get_utf8("java/lang/Object").unwrap();
    assert_eq!(first, second);

    let class_once = constants.get_class_of("java/lang/Object").unwrap();
    let class_again = constants.get_class_of("java/lang/Object").unwrap();
    assert_eq!(class_once, class_again);
}
