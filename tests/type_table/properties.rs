use typetab::opcode::{MAX_ARG, decode, encode};
use typetab::recompiler::TableReader;
use typetab::{CffiOp, Interface, OpCode};

use crate::{compiled, rendered};

fn mixed_interface() -> Interface {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let char_ty = ffi.types().primitive("char").unwrap();
    let char_ptr = ffi.types().pointer(char_ty);
    let node = ffi.types().struct_tag("node").unwrap();
    let node_ptr = ffi.types().pointer(node);
    let node = ffi
        .types()
        .structure("node")
        .field("name", char_ptr)
        .field("next", node_ptr)
        .finish()
        .unwrap();
    ffi.declare_tag(node).unwrap();
    let lookup = ffi.types().function(node_ptr).args([node_ptr, char_ptr]).finish();
    let printf = ffi.types().function(int).arg(char_ptr).variadic().finish();
    ffi.declare_function("lookup", lookup).unwrap();
    ffi.declare_function("printf", printf).unwrap();
    ffi
}

#[test]
fn compilation_is_deterministic() {
    let ffi = mixed_interface();
    let first = compiled(&ffi);
    let second = compiled(&ffi);
    assert_eq!(first.words(), second.words());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(
        compiled(&mixed_interface()).to_string(),
        first.to_string(),
        "a rebuilt interface compiles to the same table"
    );
}

#[test]
fn shared_argument_types_use_noop() {
    let mut ffi = Interface::new();
    let void = ffi.types().void();
    let int = ffi.types().primitive("int").unwrap();
    let long = ffi.types().primitive("long").unwrap();
    let int_ptr = ffi.types().pointer(int);
    let f = ffi.types().function(void).arg(int_ptr).finish();
    let g = ffi.types().function(void).args([int_ptr, long]).finish();
    ffi.declare_function("f", f).unwrap();
    ffi.declare_function("g", g).unwrap();

    let table = compiled(&ffi);
    assert_eq!(
        table.to_string(),
        "(FUNCTION 8)(POINTER 7)(FUNCTION_END 0)\
         (FUNCTION 8)(NOOP 1)(PRIMITIVE 9)(FUNCTION_END 0)\
         (PRIMITIVE 7)(PRIMITIVE 0)"
    );
    let reader = TableReader::new(&table);
    let (args, variadic) = reader.function_args(3).expect("g is a function");
    assert_eq!(args, vec![1, 5]);
    assert!(!variadic);
}

#[test]
fn primitive_arguments_are_never_shared() {
    let mut ffi = Interface::new();
    let void = ffi.types().void();
    let int = ffi.types().primitive("int").unwrap();
    let long = ffi.types().primitive("long").unwrap();
    let f = ffi.types().function(int).arg(long).finish();
    let g = ffi.types().function(void).arg(long).finish();
    ffi.declare_function("f", f).unwrap();
    ffi.declare_function("g", g).unwrap();

    let table = rendered(&ffi);
    assert_eq!(
        table,
        "(FUNCTION 6)(PRIMITIVE 9)(FUNCTION_END 0)\
         (FUNCTION 7)(PRIMITIVE 9)(FUNCTION_END 0)\
         (PRIMITIVE 7)(PRIMITIVE 0)"
    );
    assert!(!table.contains("NOOP"));
}

#[test]
fn every_function_spelling_decodes_back() {
    let ffi = mixed_interface();
    let table = compiled(&ffi);
    let reader = TableReader::new(&table);
    let lookup = table.index_of("lookup").expect("lookup");
    let printf = table.index_of("printf").expect("printf");
    assert_eq!(
        reader.type_name(lookup).as_deref(),
        Some("struct node *()(struct node *, char *)")
    );
    assert_eq!(reader.type_name(printf).as_deref(), Some("int()(char *, ...)"));
}

#[test]
fn cells_decode_to_what_was_encoded() {
    for op in OpCode::ALL {
        for arg in [0, 1, 0xFF, 0x100, 0xABCD, MAX_ARG] {
            assert_eq!(decode(encode(op.code(), arg)), (op.code(), arg));
            let cell = CffiOp::new(op, arg as usize).expect("fits");
            assert_eq!(CffiOp::from_word(cell.as_word()), Some(cell), "{op} {arg}");
        }
    }
}
