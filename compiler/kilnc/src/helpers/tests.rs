#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_emit::{OperationBodyData, RenderError, Renderer, TextRenderer, TrampolineBodyData};
use kiln_ops::HelperRegistry;
use pretty_assertions::assert_eq;

use super::generate_helper_library;

#[test]
fn one_declaration_per_body() {
    let registry = HelperRegistry::global();
    let library = generate_helper_library(registry, &TextRenderer).unwrap();

    let expected: usize = registry
        .operation_tables()
        .map(|(_, _, sets)| sets.specialized.len())
        .chain(registry.comparison_tables().map(|(_, sets)| sets.specialized.len()))
        .sum();
    assert_eq!(library.len(), expected);
    assert_eq!(library.header.lines().count(), expected);
    for (declaration, name) in library.header.lines().zip(&library.helpers) {
        assert!(declaration.starts_with("extern "));
        assert!(declaration.contains(&format!(" {name}(")) || declaration.contains(&format!("*{name}(")));
        assert!(declaration.ends_with(");"));
    }
}

#[test]
fn bodies_define_the_internal_and_public_names() {
    let library = generate_helper_library(HelperRegistry::global(), &TextRenderer).unwrap();
    let name = "BINARY_OPERATION_ADD_OBJECT_LONG_LONG";
    assert!(library.helpers.iter().any(|helper| helper == name));
    assert!(library.source.contains(&format!("static PyObject *_{name}(PyObject *operand1, PyObject *operand2) {{")));
    assert!(library.source.contains(&format!("PyObject *{name}(PyObject *operand1, PyObject *operand2) {{")));
}

#[test]
fn order_is_operator_major_with_comparisons_last() {
    let library = generate_helper_library(HelperRegistry::global(), &TextRenderer).unwrap();
    let first_inplace = library
        .helpers
        .iter()
        .position(|name| name.starts_with("INPLACE_OPERATION_ADD_"))
        .unwrap();
    let last_binary_add = library
        .helpers
        .iter()
        .rposition(|name| name.starts_with("BINARY_OPERATION_ADD_"))
        .unwrap();
    assert!(last_binary_add < first_inplace);

    let first_compare = library
        .helpers
        .iter()
        .position(|name| name.starts_with("RICH_COMPARE_"))
        .unwrap();
    assert!(library.helpers[first_compare..]
        .iter()
        .all(|name| name.starts_with("RICH_COMPARE_")));
}

#[test]
fn generation_is_deterministic() {
    let registry = HelperRegistry::global();
    let first = generate_helper_library(registry, &TextRenderer).unwrap();
    let second = generate_helper_library(registry, &TextRenderer).unwrap();
    assert_eq!(first, second);
}

struct Refusing;

impl Renderer for Refusing {
    fn render_operation(&self, data: &OperationBodyData) -> Result<String, RenderError> {
        Err(RenderError::UnsupportedHelper {
            name: data.name.clone(),
        })
    }

    fn render_trampoline(&self, _: &TrampolineBodyData) -> Result<String, RenderError> {
        Ok(String::new())
    }
}

#[test]
fn renderer_failures_stop_generation() {
    let err = generate_helper_library(HelperRegistry::global(), &Refusing).unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedHelper { .. }));
}
