use std::thread;

use typetab::{CompileError, Interface};
use typetab::recompiler::TableReader;

use crate::{compiled, rendered};

#[test]
fn structs_referencing_each_other_by_pointer() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let short = ffi.types().primitive("short").unwrap();
    let foo = ffi
        .types()
        .structure("foo_s")
        .field("b", int)
        .field("a", short)
        .finish()
        .unwrap();
    let foo_ptr = ffi.types().pointer(foo);
    let bar = ffi.types().structure("bar_s").field("f", foo_ptr).finish().unwrap();
    ffi.declare_tag(foo).unwrap();
    ffi.declare_tag(bar).unwrap();

    let table = compiled(&ffi);
    assert_eq!(
        table.to_string(),
        "(PRIMITIVE 7)(PRIMITIVE 5)(STRUCT_UNION 0)(STRUCT_UNION 1)(POINTER 3)"
    );
    let names: Vec<String> = table.struct_unions().iter().map(|entry| entry.c_name()).collect();
    assert_eq!(names, vec!["struct bar_s", "struct foo_s"], "side table follows walk order");
    assert_eq!(table.struct_union("struct bar_s").unwrap().fields[0].type_index, 4);
}

#[test]
fn typedef_of_double_pointer() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let ptr = ffi.types().pointer(int);
    let ptr_ptr = ffi.types().pointer(ptr);
    ffi.declare_typedef("foo_t", ptr_ptr).unwrap();

    let table = compiled(&ffi);
    assert_eq!(table.to_string(), "(PRIMITIVE 7)(POINTER 0)(POINTER 1)");
    assert_eq!(table.index_of("foo_t"), Some(2));
    let reader = TableReader::new(&table);
    assert_eq!(reader.type_name(2).as_deref(), Some("int * *"));
}

#[test]
fn pointer_result() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let ptr = ffi.types().pointer(int);
    let sig = ffi.types().function(ptr).finish();
    ffi.declare_function("foo", sig).unwrap();
    assert_eq!(rendered(&ffi), "(FUNCTION 3)(FUNCTION_END 0)(PRIMITIVE 7)(POINTER 2)");
}

#[test]
fn unknown_length_fields_get_their_own_cells() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let a = ffi.types().unresolved_array(int);
    let b = ffi.types().unresolved_array(int);
    assert_ne!(a, b, "every [...] array is distinct");
    let foo = ffi.types().structure("foo_s").field("a", a).field("b", b).finish().unwrap();
    ffi.declare_tag(foo).unwrap();

    let table = compiled(&ffi);
    assert_eq!(
        table.to_string(),
        "(PRIMITIVE 7)(ARRAY 0)(None ...)(ARRAY 0)(None ...)(STRUCT_UNION 0)"
    );
    let owners: Vec<(u32, &str)> = table
        .unresolved_lengths()
        .iter()
        .map(|length| (length.cell, length.owner.as_str()))
        .collect();
    assert_eq!(owners, vec![(2, "struct foo_s.a"), (4, "struct foo_s.b")]);
}

#[test]
fn unknown_length_globals() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let aa = ffi.types().unresolved_array(int);
    let bb = ffi.types().unresolved_array(int);
    ffi.declare_variable("aa", aa).unwrap();
    ffi.declare_variable("bb", bb).unwrap();

    let table = compiled(&ffi);
    assert_eq!(table.to_string(), "(PRIMITIVE 7)(ARRAY 0)(None ...)(ARRAY 0)(None ...)");
    assert_eq!(table.unresolved_lengths()[1].owner, "bb");
    assert_eq!(table.index_of("bb"), Some(3));
}

#[test]
fn global_listing_is_sorted() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let sig = ffi.types().function(int).arg(int).finish();
    ffi.declare_function("ff", sig).unwrap();
    ffi.declare_variable("aa", int).unwrap();
    ffi.declare_constant("my_constant", int).unwrap();

    let table = compiled(&ffi);
    let names: Vec<&str> = table.globals().iter().map(|global| global.name.as_str()).collect();
    assert_eq!(names, vec!["aa", "ff", "my_constant"]);
}

#[test]
fn separate_interfaces_compile_independently() {
    let build = || {
        let mut ffi = Interface::new();
        let foo = ffi.types().opaque_struct("foo_s").unwrap();
        ffi.declare_tag(foo).unwrap();
        let long = ffi.types().primitive("long").unwrap();
        let int = ffi.types().primitive("int").unwrap();
        let sig = ffi.types().function(long).arg(int).variadic().finish();
        let fnptr = ffi.types().pointer(sig);
        ffi.declare_variable("cb", fnptr).unwrap();
        ffi
    };
    let first = build();
    let second = build();
    let (left, right) = thread::scope(|scope| {
        let left = scope.spawn(|| compiled(&first));
        let right = scope.spawn(|| compiled(&second));
        (left.join().unwrap(), right.join().unwrap())
    });
    assert_eq!(left.to_string(), right.to_string());
    assert_eq!(left.fingerprint(), right.fingerprint());
}

#[test]
fn struct_and_enum_cannot_share_a_tag() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let foo = ffi.types().structure("foo").field("x", int).finish().unwrap();
    ffi.declare_tag(foo).unwrap();
    let err = ffi.types().enumeration("foo").variant("A", 0).finish().unwrap_err();
    assert_eq!(err, CompileError::DuplicateTag("enum foo".into()));

    let table = compiled(&ffi);
    assert_eq!(table.to_string(), "(PRIMITIVE 7)(STRUCT_UNION 0)");
    assert!(table.enums().is_empty(), "the rejected enum never reaches the table");
}
