//! Verification rounds against a scripted toolchain that answers like a native build would.

use std::fs;

use tempfile::{TempDir, tempdir};
use typetab::verify::{
    BuildRequest, LayoutReport, NativeToolchain, StructLayout, VerifyConfig, VerifyResult,
};
use typetab::{CompiledTable, Interface, VerifyDriver, VerifyError, collect_type_table};

/// Stands in for a C compiler: it answers with a fixed report and remembers what it built.
struct ScriptedToolchain {
    native: LayoutReport,
    sources: Vec<String>,
}

impl ScriptedToolchain {
    fn new(native: LayoutReport) -> Self {
        Self {
            native,
            sources: Vec::new(),
        }
    }
}

impl NativeToolchain for ScriptedToolchain {
    fn build(&mut self, request: &BuildRequest<'_>) -> VerifyResult<LayoutReport> {
        self.sources.push(fs::read_to_string(request.source_path)?);
        Ok(self.native.clone())
    }
}

fn driver(native: LayoutReport) -> (TempDir, VerifyDriver<ScriptedToolchain>) {
    let dir = tempdir().expect("tempdir");
    let config = VerifyConfig::default().with_tmpdir(dir.path());
    let driver = VerifyDriver::with_config(ScriptedToolchain::new(native), config);
    (dir, driver)
}

fn compile(ffi: &Interface) -> CompiledTable {
    collect_type_table(ffi).expect("compile")
}

#[test]
fn missing_function_is_a_link_failure() {
    let mut ffi = Interface::new();
    let void = ffi.types().void();
    let sig = ffi.types().function(void).finish();
    ffi.declare_function("some_completely_unknown_function", sig).unwrap();
    let (_dir, mut driver) = driver(LayoutReport::new());

    let err = driver.verify(&compile(&ffi)).unwrap_err();
    assert!(
        matches!(err, VerifyError::LinkFailure { ref symbol } if symbol == "some_completely_unknown_function"),
        "unexpected error: {err}"
    );
}

#[test]
fn math_functions_link() {
    let mut ffi = Interface::new();
    let float = ffi.types().primitive("float").unwrap();
    let double = ffi.types().primitive("double").unwrap();
    let sin = ffi.types().function(float).arg(double).finish();
    let cos = ffi.types().function(double).arg(double).finish();
    ffi.declare_function("sin", sin).unwrap();
    ffi.declare_function("cos", cos).unwrap();
    let (_dir, driver) = driver(LayoutReport::new().with_symbols(["sin", "cos"]));
    let mut driver = driver.preamble("#include <math.h>");

    driver.verify(&compile(&ffi)).expect("verified");
    let source = &driver.toolchain().sources[0];
    assert!(source.contains("#include <math.h>"));
    assert!(source.contains("(void *)&cos,"));
    assert!(source.contains("(void *)&sin,"));
}

#[test]
fn dotdotdot_field_lengths_come_from_the_native_struct() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let a = ffi.types().unresolved_array(int);
    let b = ffi.types().unresolved_array(int);
    let foo = ffi.types().structure("foo_s").field("a", a).field("b", b).finish().unwrap();
    ffi.declare_tag(foo).unwrap();
    let table = compile(&ffi);

    let native = LayoutReport::new()
        .with_struct("struct foo_s", StructLayout::new((42 + 11) * 4, 4, [0, 42 * 4]))
        .with_length("struct foo_s.a", 42)
        .with_length("struct foo_s.b", 11);
    let (_dir, mut driver) = driver(native);
    let layout = driver.verify(&table).expect("verified");

    assert_eq!(layout.sizeof("struct foo_s").unwrap(), (42 + 11) * 4);
    assert_eq!(layout.offsetof("struct foo_s", "b").unwrap(), 168);
    let words = layout.patched_words(&table);
    assert_eq!((words[2], words[4]), (42, 11));
}

#[test]
fn dotdotdot_global_arrays() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    let aa = ffi.types().unresolved_array(int);
    let bb = ffi.types().unresolved_array(int);
    ffi.declare_variable("aa", aa).unwrap();
    ffi.declare_variable("bb", bb).unwrap();
    let table = compile(&ffi);

    let native = LayoutReport::new()
        .with_symbols(["aa", "bb"])
        .with_length("aa", 41)
        .with_length("bb", 12);
    let (_dir, mut driver) = driver(native);
    let layout = driver.verify(&table).expect("verified");
    assert_eq!(layout.length_of("aa").unwrap(), 41);
    assert_eq!(layout.length_of("bb").unwrap(), 12);
    assert!(driver.toolchain().sources[0].contains("sizeof(bb) / sizeof(bb[0])"));
}

#[test]
fn reordered_native_fields_still_verify() {
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
    ffi.declare_tag(foo).unwrap();

    // struct foo_s { short a; int b; } natively.
    let native = LayoutReport::new().with_struct("struct foo_s", StructLayout::new(8, 4, [4, 0]));
    let (_dir, mut driver) = driver(native);
    let layout = driver.verify(&compile(&ffi)).expect("verified");
    assert_eq!(layout.offsetof("struct foo_s", "b").unwrap(), 4);
    assert_eq!(layout.offsetof("struct foo_s", "a").unwrap(), 0);
}

#[test]
fn opaque_struct_has_no_size() {
    let mut ffi = Interface::new();
    let foo = ffi.types().opaque_union("foo_s").unwrap();
    ffi.declare_tag(foo).unwrap();
    let (_dir, mut driver) = driver(LayoutReport::new());
    let layout = driver.verify(&compile(&ffi)).expect("nothing to verify");
    assert!(matches!(layout.sizeof("union foo_s"), Err(VerifyError::Missing(_))));
}

#[test]
fn same_table_reuses_its_module() {
    let mut ffi = Interface::new();
    let int = ffi.types().primitive("int").unwrap();
    ffi.declare_variable("aa", int).unwrap();
    let table = compile(&ffi);
    let (dir, mut driver) = driver(LayoutReport::new().with_symbol("aa"));

    driver.verify(&table).expect("first");
    driver.verify(&table).expect("second");
    let generated: Vec<_> = fs::read_dir(dir.path())
        .expect("tmpdir")
        .filter_map(Result::ok)
        .collect();
    assert_eq!(generated.len(), 1, "one module per fingerprint");
    assert_eq!(driver.toolchain().sources[0], driver.toolchain().sources[1]);
}
