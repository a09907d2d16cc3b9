//! Rendering of helper and trampoline bodies.
//!
//! Emission decides *what* body is needed and collects the facts into
//! [`OperationBodyData`] / [`TrampolineBodyData`]. A [`Renderer`] turns
//! those into source text. [`TextRenderer`] is the built-in renderer
//! targeting the C runtime API.

use kiln_calls::TrampolineKey;
use kiln_ir::{BinaryOp, OperationMode, ResultShape, Shape};
use kiln_ops::{HelperId, HelperKind};

use crate::RenderError;

/// Turns structured body descriptions into source text.
pub trait Renderer {
    fn render_operation(&self, data: &OperationBodyData) -> Result<String, RenderError>;

    fn render_trampoline(&self, data: &TrampolineBodyData) -> Result<String, RenderError>;
}

/// What to compute in a specialized operation or comparison helper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationBodyData {
    pub id: HelperId,
    /// Public helper name.
    pub name: String,
    /// C return type.
    pub returns: &'static str,
    pub left: Shape,
    pub right: Shape,
    /// Runtime function producing the object result.
    pub api: String,
    /// Trailing argument of `api`, if it takes three.
    pub api_extra: Option<&'static str>,
}

impl OperationBodyData {
    pub fn new(id: HelperId) -> Self {
        let (returns, api, api_extra) = match id.kind {
            HelperKind::Operation(mode, op) => {
                let returns = match (mode, id.result) {
                    (OperationMode::Inplace, _) | (OperationMode::Binary, None) => "bool",
                    (OperationMode::Binary, Some(result)) => result.c_type(),
                };
                let inplace = if mode == OperationMode::Inplace {
                    "InPlace"
                } else {
                    ""
                };
                let extra = (op == BinaryOp::Pow).then_some("Py_None");
                (
                    returns,
                    format!("PyNumber_{inplace}{}", number_api_name(op)),
                    extra,
                )
            }
            HelperKind::Comparison(cmp) => {
                let result = id.result.unwrap_or(ResultShape::Object);
                let api = if result == ResultShape::CBool {
                    "PyObject_RichCompareBool"
                } else {
                    "PyObject_RichCompare"
                };
                (result.c_type(), api.to_owned(), Some(cmp.runtime_constant()))
            }
        };
        Self {
            id,
            name: id.to_string(),
            returns,
            left: id.left,
            right: id.right,
            api,
            api_extra,
        }
    }

    pub fn is_inplace(&self) -> bool {
        matches!(self.id.kind, HelperKind::Operation(OperationMode::Inplace, _))
    }

    pub fn result(&self) -> Option<ResultShape> {
        self.id.result
    }
}

fn number_api_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "Add",
        BinaryOp::Sub => "Subtract",
        BinaryOp::Mult => "Multiply",
        BinaryOp::FloorDiv => "FloorDivide",
        BinaryOp::TrueDiv => "TrueDivide",
        BinaryOp::OldDiv => "Divide",
        BinaryOp::Mod => "Remainder",
        BinaryOp::Divmod => "Divmod",
        BinaryOp::Pow => "Power",
        BinaryOp::LShift => "Lshift",
        BinaryOp::RShift => "Rshift",
        BinaryOp::BitAnd => "And",
        BinaryOp::BitOr => "Or",
        BinaryOp::BitXor => "Xor",
        BinaryOp::MatMult => "MatrixMultiply",
    }
}

/// One count-parameterized call helper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrampolineBodyData {
    pub key: TrampolineKey,
    pub name: String,
}

impl TrampolineBodyData {
    pub fn new(key: TrampolineKey) -> Self {
        Self {
            key,
            name: key.helper_name(),
        }
    }
}

/// `<c_type> <name>` with pointer types kept tight.
pub fn c_param(c_type: &str, name: &str) -> String {
    if c_type.ends_with('*') {
        format!("{c_type}{name}")
    } else {
        format!("{c_type} {name}")
    }
}

/// Expression boxing a machine value, `None` for boxed shapes.
pub fn box_expression(shape: Shape, value: &str) -> Option<String> {
    match shape {
        Shape::CLong => Some(format!("PyLong_FromLong({value})")),
        Shape::Digit => Some(format!("PyLong_FromLong((long){value})")),
        Shape::CFloat => Some(format!("PyFloat_FromDouble({value})")),
        _ => None,
    }
}

#[derive(Default)]
struct Lines {
    text: String,
}

impl Lines {
    fn line(&mut self, depth: usize, text: &str) {
        if !text.is_empty() {
            for _ in 0..depth {
                self.text.push_str("    ");
            }
            self.text.push_str(text);
        }
        self.text.push('\n');
    }

    fn finish(self) -> String {
        self.text
    }
}

/// Renders C source for the runtime API.
#[derive(Copy, Clone, Debug, Default)]
pub struct TextRenderer;

impl TextRenderer {
    fn failure_return(data: &OperationBodyData, out: &mut Lines, depth: usize) {
        if data.is_inplace() {
            out.line(depth, "return false;");
            return;
        }
        match data.result() {
            Some(ResultShape::NBool) => out.line(depth, "return NUITKA_BOOL_EXCEPTION;"),
            Some(ResultShape::NiLong) => {
                out.line(depth, "nuitka_ilong error;");
                out.line(depth, "error.validity = NUITKA_ILONG_EXCEPTION;");
                out.line(depth, "return error;");
            }
            Some(ResultShape::CBool) => {
                out.line(depth, "NUITKA_CANNOT_GET_HERE(\"boxing failed\");");
                out.line(depth, "return false;");
            }
            Some(ResultShape::Object) | None => out.line(depth, "return NULL;"),
        }
    }

    fn operand_checks(out: &mut Lines, expr: &str, shape: Shape) {
        if !shape.is_boxed() {
            return;
        }
        out.line(1, &format!("CHECK_OBJECT({expr});"));
        if let Some(check) = shape.info().check_exact {
            out.line(1, &format!("assert({check}({expr}));"));
        }
    }

    /// Box `expr` if needed, returning the object expression to use.
    fn boxed_operand(
        data: &OperationBodyData,
        out: &mut Lines,
        expr: &str,
        param: &str,
        shape: Shape,
        boxes: &mut Vec<String>,
    ) -> String {
        let Some(boxing) = box_expression(shape, expr) else {
            return expr.to_owned();
        };
        let name = format!("{param}_object");
        out.line(1, &format!("PyObject *{name} = {boxing};"));
        out.line(1, &format!("if (unlikely({name} == NULL)) {{"));
        for previous in boxes.iter() {
            out.line(2, &format!("Py_DECREF({previous});"));
        }
        Self::failure_return(data, out, 2);
        out.line(1, "}");
        boxes.push(name.clone());
        name
    }
}

impl Renderer for TextRenderer {
    fn render_operation(&self, data: &OperationBodyData) -> Result<String, RenderError> {
        let inplace = data.is_inplace();
        let left_param = if inplace {
            "PyObject **operand1".to_owned()
        } else {
            c_param(data.left.c_type(), "operand1")
        };
        let params = format!("{left_param}, {}", c_param(data.right.c_type(), "operand2"));
        let internal = format!("_{}", data.name);
        let left_expr = if inplace { "*operand1" } else { "operand1" };

        let mut out = Lines::default();
        out.line(0, &format!("static {}({params}) {{", c_param(data.returns, &internal)));
        if inplace {
            out.line(1, "assert(operand1);");
        }
        Self::operand_checks(&mut out, left_expr, data.left);
        Self::operand_checks(&mut out, "operand2", data.right);
        out.line(0, "");

        let mut boxes = Vec::new();
        let a = Self::boxed_operand(data, &mut out, left_expr, "operand1", data.left, &mut boxes);
        let b = Self::boxed_operand(data, &mut out, "operand2", "operand2", data.right, &mut boxes);
        let args = match data.api_extra {
            Some(extra) => format!("{a}, {b}, {extra}"),
            None => format!("{a}, {b}"),
        };

        if data.result() == Some(ResultShape::CBool) {
            out.line(1, &format!("int truth = {}({args});", data.api));
            for name in &boxes {
                out.line(1, &format!("Py_DECREF({name});"));
            }
            out.line(1, "assert(truth != -1);");
            out.line(1, "return truth == 1;");
        } else {
            out.line(1, &format!("PyObject *x = {}({args});", data.api));
            for name in &boxes {
                out.line(1, &format!("Py_DECREF({name});"));
            }
            out.line(0, "");
            if inplace {
                out.line(1, "if (unlikely(x == NULL)) {");
                out.line(2, "return false;");
                out.line(1, "}");
                out.line(1, "Py_DECREF(*operand1);");
                out.line(1, "*operand1 = x;");
                out.line(1, "return true;");
            } else {
                match data.result() {
                    Some(ResultShape::NBool) => {
                        out.line(1, "if (unlikely(x == NULL)) {");
                        out.line(2, "return NUITKA_BOOL_EXCEPTION;");
                        out.line(1, "}");
                        out.line(1, "int truth = CHECK_IF_TRUE(x);");
                        out.line(1, "Py_DECREF(x);");
                        out.line(1, "if (unlikely(truth == -1)) {");
                        out.line(2, "return NUITKA_BOOL_EXCEPTION;");
                        out.line(1, "}");
                        out.line(1, "return truth == 1 ? NUITKA_BOOL_TRUE : NUITKA_BOOL_FALSE;");
                    }
                    Some(ResultShape::NiLong) => {
                        out.line(1, "nuitka_ilong r;");
                        out.line(1, "if (unlikely(x == NULL)) {");
                        out.line(2, "r.validity = NUITKA_ILONG_EXCEPTION;");
                        out.line(2, "return r;");
                        out.line(1, "}");
                        out.line(1, "SET_NILONG_OBJECT_VALUE(&r, x);");
                        out.line(1, "return r;");
                    }
                    Some(ResultShape::Object) => out.line(1, "return x;"),
                    Some(ResultShape::CBool) | None => {
                        return Err(RenderError::UnsupportedHelper {
                            name: data.name.clone(),
                        })
                    }
                }
            }
        }
        out.line(0, "}");
        out.line(0, "");
        out.line(0, &format!("{}({params}) {{", c_param(data.returns, &data.name)));
        out.line(1, &format!("return {internal}(operand1, operand2);"));
        out.line(0, "}");
        Ok(out.finish())
    }

    fn render_trampoline(&self, data: &TrampolineBodyData) -> Result<String, RenderError> {
        let name = &data.name;
        let n = data.key.count();
        let mut out = Lines::default();
        match data.key {
            TrampolineKey::Positional(_) => {
                out.line(
                    0,
                    &format!(
                        "PyObject *{name}(PyThreadState *tstate, PyObject *called, PyObject *const *args) {{"
                    ),
                );
                out.line(1, "CHECK_OBJECT(called);");
                out.line(1, &format!("CHECK_OBJECTS(args, {n});"));
                out.line(0, "");
                out.line(1, &format!("return PyObject_Vectorcall(called, args, {n}, NULL);"));
            }
            TrampolineKey::PositionalTuple(_) => {
                out.line(
                    0,
                    &format!(
                        "PyObject *{name}(PyThreadState *tstate, PyObject *called, PyObject *pos_args) {{"
                    ),
                );
                out.line(1, "CHECK_OBJECT(called);");
                out.line(1, "assert(PyTuple_CheckExact(pos_args));");
                out.line(1, &format!("assert(PyTuple_GET_SIZE(pos_args) == {n});"));
                out.line(0, "");
                out.line(
                    1,
                    &format!(
                        "return PyObject_Vectorcall(called, &PyTuple_GET_ITEM(pos_args, 0), {n}, NULL);"
                    ),
                );
            }
            TrampolineKey::Method(_) => {
                out.line(
                    0,
                    &format!(
                        "PyObject *{name}(PyThreadState *tstate, PyObject *source, PyObject *attr_name, PyObject *const *args) {{"
                    ),
                );
                out.line(1, "CHECK_OBJECT(source);");
                out.line(1, "CHECK_OBJECT(attr_name);");
                out.line(1, &format!("CHECK_OBJECTS(args, {n});"));
                out.line(0, "");
                out.line(1, "PyObject *called = LOOKUP_ATTRIBUTE(tstate, source, attr_name);");
                out.line(1, "if (unlikely(called == NULL)) {");
                out.line(2, "return NULL;");
                out.line(1, "}");
                out.line(1, &format!("PyObject *result = PyObject_Vectorcall(called, args, {n}, NULL);"));
                out.line(1, "Py_DECREF(called);");
                out.line(1, "return result;");
            }
            TrampolineKey::Mixed {
                has_tuple,
                has_dict_values,
                ..
            } => {
                let (positional, array) = if has_tuple {
                    ("PyObject *pos_args", "&PyTuple_GET_ITEM(pos_args, 0)")
                } else {
                    ("PyObject *const *args", "args")
                };
                let values = if has_dict_values {
                    ", PyObject *const *kw_values"
                } else {
                    ""
                };
                out.line(
                    0,
                    &format!(
                        "PyObject *{name}(PyThreadState *tstate, PyObject *called, {positional}{values}, PyObject *kw_names) {{"
                    ),
                );
                out.line(1, "CHECK_OBJECT(called);");
                out.line(1, "CHECK_OBJECT(kw_names);");
                out.line(0, "");
                if has_dict_values {
                    out.line(1, "Py_ssize_t nkw = PyTuple_GET_SIZE(kw_names);");
                    out.line(
                        1,
                        &format!("NUITKA_DYNAMIC_ARRAY_DECL(vectorcall_args, PyObject *, {n} + nkw);"),
                    );
                    out.line(
                        1,
                        &format!("memcpy(vectorcall_args, {array}, {n} * sizeof(PyObject *));"),
                    );
                    out.line(
                        1,
                        &format!("memcpy(&vectorcall_args[{n}], kw_values, nkw * sizeof(PyObject *));"),
                    );
                    out.line(
                        1,
                        &format!("return PyObject_Vectorcall(called, vectorcall_args, {n}, kw_names);"),
                    );
                } else {
                    out.line(
                        1,
                        &format!("return PyObject_Vectorcall(called, {array}, {n}, kw_names);"),
                    );
                }
            }
        }
        out.line(0, "}");
        Ok(out.finish())
    }
}
