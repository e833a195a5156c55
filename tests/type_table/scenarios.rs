use hex_literal::hex;
use typetab::Interface;

use crate::{compiled, rendered};

#[test]
fn single_primitive_argument() {
    let mut ffi = Interface::new();
    let double = ffi.types().primitive("double").unwrap();
    let sig = ffi.types().function(double).arg(double).finish();
    ffi.declare_function("sin", sig).unwrap();

    let table = compiled(&ffi);
    assert_eq!(table.to_string(), "(FUNCTION 1)(PRIMITIVE 14)(FUNCTION_END 0)");
    let bytes: Vec<u8> = table.words().iter().flat_map(|word| word.to_le_bytes()).collect();
    assert_eq!(
        bytes,
        hex!("0f010000 010e0000 11000000"),
        "cells pack the opcode into the low byte"
    );
}

#[test]
fn repeated_pointer_argument_is_compressed() {
    let mut ffi = Interface::new();
    let double = ffi.types().primitive("double").unwrap();
    let ptr = ffi.types().pointer(double);
    let sig = ffi.types().function(double).args([ptr, ptr]).finish();
    ffi.declare_function("sin", sig).unwrap();
    assert_eq!(
        rendered(&ffi),
        "(FUNCTION 4)(POINTER 4)(NOOP 1)(FUNCTION_END 0)(PRIMITIVE 14)"
    );
}

#[test]
fn repeated_primitive_argument_is_emitted_in_full() {
    let mut ffi = Interface::new();
    let double = ffi.types().primitive("double").unwrap();
    let sig = ffi.types().function(double).args([double, double]).finish();
    ffi.declare_function("sin", sig).unwrap();
    assert_eq!(
        rendered(&ffi),
        "(FUNCTION 1)(PRIMITIVE 14)(PRIMITIVE 14)(FUNCTION_END 0)"
    );
}

#[test]
fn fixed_array_variable() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let arr = ffi.types().array(int, 100);
    ffi.declare_variable("a", arr).unwrap();
    assert_eq!(rendered(&ffi), "(PRIMITIVE 7)(ARRAY 0)(None 100)");
}

#[test]
fn struct_pointer_argument() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let long = ffi.types().primitive("long").unwrap();
    let foo = ffi
        .types()
        .structure("foo_s")
        .field("a", int)
        .field("b", long)
        .finish()
        .unwrap();
    ffi.declare_tag(foo).unwrap();
    let ptr = ffi.types().pointer(foo);
    let sig = ffi.types().function(int).arg(ptr).finish();
    ffi.declare_function("f", sig).unwrap();

    let table = compiled(&ffi);
    assert_eq!(
        table.to_string(),
        "(FUNCTION 3)(POINTER 5)(FUNCTION_END 0)(PRIMITIVE 7)(PRIMITIVE 9)(STRUCT_UNION 0)"
    );
    assert_eq!(table.index_of("struct foo_s"), Some(5));
    let entry = table.struct_union("struct foo_s").expect("side table");
    let fields: Vec<(&str, u32)> = entry
        .fields
        .iter()
        .map(|field| (field.name.as_str(), field.type_index))
        .collect();
    assert_eq!(fields, vec![("a", 3), ("b", 4)]);
}

#[test]
fn variadic_function() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let sig = ffi.types().function(int).arg(int).variadic().finish();
    ffi.declare_function("sin", sig).unwrap();

    let table = compiled(&ffi);
    assert_eq!(table.to_string(), "(FUNCTION 1)(PRIMITIVE 7)(FUNCTION_END 1)");
    let entry = table.global("sin").expect("global");
    assert_eq!(entry.entry_op().unwrap().to_string(), "(CALL_V 0)");
}

#[test]
fn opaque_struct_is_a_single_cell() {
    let mut ffi = Interface::new();
    let foo = ffi.types().opaque_struct("foo_s").unwrap();
    ffi.declare_tag(foo).unwrap();
    let table = compiled(&ffi);
    assert_eq!(table.to_string(), "(STRUCT_UNION 0)");
    assert!(table.struct_unions()[0].is_opaque());
}

#[test]
fn array_parameters_decay_to_pointers() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let arr = ffi.types().array(int, 8);
    let sig = ffi.types().function(int).arg(arr).finish();
    ffi.declare_function("sum", sig).unwrap();
    assert_eq!(
        rendered(&ffi),
        "(FUNCTION 3)(POINTER 3)(FUNCTION_END 0)(PRIMITIVE 7)",
        "int sum(int[8]) is int sum(int *)"
    );
}

#[test]
fn pointer_to_array_and_array_of_pointers_differ() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let arr = ffi.types().array(int, 4);
    let ptr_to_arr = ffi.types().pointer(arr);
    let int_ptr = ffi.types().pointer(int);
    let arr_of_ptr = ffi.types().array(int_ptr, 4);
    ffi.declare_variable("p", ptr_to_arr).unwrap();
    ffi.declare_variable("q", arr_of_ptr).unwrap();
    assert_eq!(
        rendered(&ffi),
        "(PRIMITIVE 7)(POINTER 0)(ARRAY 1)(None 4)(POINTER 5)(ARRAY 0)(None 4)",
        "spellings order as int, int *, int *[4], int(*)[4], int[4]"
    );
}
