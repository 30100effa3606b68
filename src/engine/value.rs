//! Runtime value model and environments
//!
//! Objects and environments are shared `Arc<Mutex<..>>` references so the
//! debugger can inspect them from the client thread while the interpreter
//! thread is suspended at a pause point.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::ast::FunctionDef;

/// Shared reference to a runtime object.
pub type ObjectRef = Arc<Mutex<ObjectData>>;

/// Shared reference to a function value.
pub type FunctionRef = Arc<FunctionValue>;

/// Shared reference to an environment record.
pub type EnvRef = Arc<Mutex<EnvData>>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(FunctionRef),
    Object(ObjectRef),
}

/// A function value: definition plus captured environment.
pub struct FunctionValue {
    pub def: Arc<FunctionDef>,
    pub closure: EnvRef,
}

/// Whether an object is a plain object or an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Array,
}

/// A property slot: plain data or a lazy getter.
#[derive(Clone)]
pub enum Property {
    Data(Value),
    Getter(FunctionRef),
}

/// A property descriptor handed to the debugger for lazy getter expansion.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub getter: FunctionRef,
}

/// Backing storage for objects and arrays.
pub struct ObjectData {
    pub kind: ObjectKind,
    /// Indexed storage; only used when `kind == Array`.
    pub elements: Vec<Value>,
    /// Named properties in insertion order.
    pub props: Vec<(String, Property)>,
}

impl ObjectData {
    pub fn new_object() -> Self {
        Self {
            kind: ObjectKind::Plain,
            elements: Vec::new(),
            props: Vec::new(),
        }
    }

    pub fn new_array(elements: Vec<Value>) -> Self {
        Self {
            kind: ObjectKind::Array,
            elements,
            props: Vec::new(),
        }
    }

    pub fn get_prop(&self, name: &str) -> Option<&Property> {
        self.props.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    /// Insert or overwrite a data property, preserving insertion order.
    pub fn set_prop(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.props.iter_mut().find(|(n, _)| n == name) {
            slot.1 = Property::Data(value);
        } else {
            self.props.push((name.to_string(), Property::Data(value)));
        }
    }

    pub fn set_getter(&mut self, name: &str, getter: FunctionRef) {
        if let Some(slot) = self.props.iter_mut().find(|(n, _)| n == name) {
            slot.1 = Property::Getter(getter);
        } else {
            self.props.push((name.to_string(), Property::Getter(getter)));
        }
    }
}

/// An environment record: bindings plus parent scope.
pub struct EnvData {
    pub slots: Vec<(String, Value)>,
    pub parent: Option<EnvRef>,
}

/// Create a new environment with an optional parent.
pub fn env_new(parent: Option<EnvRef>) -> EnvRef {
    Arc::new(Mutex::new(EnvData {
        slots: Vec::new(),
        parent,
    }))
}

/// Define (or redefine) a binding in this environment.
pub fn env_define(env: &EnvRef, name: &str, value: Value) {
    let mut data = env.lock().unwrap();
    if let Some(slot) = data.slots.iter_mut().find(|(n, _)| n == name) {
        slot.1 = value;
    } else {
        data.slots.push((name.to_string(), value));
    }
}

/// Look a name up through the environment chain.
pub fn env_lookup(env: &EnvRef, name: &str) -> Option<Value> {
    let data = env.lock().unwrap();
    if let Some((_, value)) = data.slots.iter().find(|(n, _)| n == name) {
        return Some(value.clone());
    }
    let parent = data.parent.clone()?;
    drop(data);
    env_lookup(&parent, name)
}

/// Assign to an existing binding; when none exists anywhere in the chain the
/// binding is created on the outermost (global) environment.
pub fn env_assign(env: &EnvRef, name: &str, value: Value) {
    let mut current = env.clone();
    loop {
        let mut data = current.lock().unwrap();
        if let Some(slot) = data.slots.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
            return;
        }
        match data.parent.clone() {
            Some(parent) => {
                drop(data);
                current = parent;
            }
            None => {
                data.slots.push((name.to_string(), value));
                return;
            }
        }
    }
}

/// Assign to a binding reachable from `env`; `false` if no such binding.
pub fn env_assign_existing(env: &EnvRef, name: &str, value: Value) -> bool {
    let mut current = env.clone();
    loop {
        let mut data = current.lock().unwrap();
        if let Some(slot) = data.slots.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
            return true;
        }
        match data.parent.clone() {
            Some(parent) => {
                drop(data);
                current = parent;
            }
            None => return false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            Value::Object(obj) => match obj.lock().unwrap().kind {
                ObjectKind::Plain => "object",
                ObjectKind::Array => "array",
            },
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Function(_) | Value::Object(_) => true,
        }
    }

    /// String conversion used by concatenation and log messages (unquoted).
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Function(f) => match &f.def.name {
                Some(name) => format!("function {name}()"),
                None => "function ()".to_string(),
            },
            Value::Object(obj) => {
                let data = obj.lock().unwrap();
                match data.kind {
                    ObjectKind::Array => preview_array(&data),
                    ObjectKind::Plain => preview_object(&data),
                }
            }
        }
    }

    /// Display form for variable listings: strings quoted, objects previewed.
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(s) => format!("'{s}'"),
            other => other.to_string_value(),
        }
    }
}

/// Number-to-string with integral values rendered without a fraction.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format!("{n}")
    }
}

fn preview_array(data: &ObjectData) -> String {
    let mut parts = Vec::new();
    for value in data.elements.iter().take(5) {
        parts.push(short_display(value));
    }
    if data.elements.len() > 5 {
        parts.push("…".to_string());
    }
    format!("[{}]", parts.join(", "))
}

fn preview_object(data: &ObjectData) -> String {
    let mut parts = Vec::new();
    for (name, prop) in data.props.iter().take(3) {
        match prop {
            Property::Data(value) => parts.push(format!("{name}: {}", short_display(value))),
            Property::Getter(_) => parts.push(format!("{name}: (getter)")),
        }
    }
    if data.props.len() > 3 {
        parts.push("…".to_string());
    }
    format!("{{{}}}", parts.join(", "))
}

// try_lock: a self-referencing object would re-enter its own mutex here.
fn short_display(value: &Value) -> String {
    match value {
        Value::Object(obj) => match obj.try_lock() {
            Ok(data) => match data.kind {
                ObjectKind::Array => "[…]".to_string(),
                ObjectKind::Plain => "{…}".to_string(),
            },
            Err(_) => "{…}".to_string(),
        },
        Value::Str(s) => format!("'{s}'"),
        other => other.to_string_value(),
    }
}

/// Strict equality (`===`).
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Loose equality (`==`): null and undefined compare equal, numbers and
/// numeric strings coerce, everything else falls back to strict equality.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
        (Value::Number(n), Value::Str(s)) | (Value::Str(s), Value::Number(n)) => {
            s.trim().parse::<f64>().map(|p| p == *n).unwrap_or(false)
        }
        (Value::Bool(b), other) | (other, Value::Bool(b)) => {
            let n = if *b { 1.0 } else { 0.0 };
            loose_eq(&Value::Number(n), other)
        }
        _ => strict_eq(a, b),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_integral() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_env_assign_creates_global() {
        let globals = env_new(None);
        let local = env_new(Some(globals.clone()));
        env_assign(&local, "x", Value::Number(7.0));
        // Undeclared assignment lands on the outermost environment.
        assert!(matches!(env_lookup(&globals, "x"), Some(Value::Number(n)) if n == 7.0));
        assert!(local.lock().unwrap().slots.is_empty());
    }

    #[test]
    fn test_env_shadowing() {
        let globals = env_new(None);
        env_define(&globals, "x", Value::Number(1.0));
        let local = env_new(Some(globals.clone()));
        env_define(&local, "x", Value::Number(2.0));
        assert!(matches!(env_lookup(&local, "x"), Some(Value::Number(n)) if n == 2.0));
        env_assign(&local, "x", Value::Number(3.0));
        assert!(matches!(env_lookup(&globals, "x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn test_strict_vs_loose_equality() {
        assert!(loose_eq(&Value::Null, &Value::Undefined));
        assert!(!strict_eq(&Value::Null, &Value::Undefined));
        assert!(loose_eq(&Value::Number(2.0), &Value::Str("2".into())));
        assert!(!strict_eq(&Value::Number(2.0), &Value::Str("2".into())));
    }

    #[test]
    fn test_object_preview() {
        let mut obj = ObjectData::new_object();
        obj.set_prop("a", Value::Number(1.0));
        obj.set_prop("b", Value::Str("x".into()));
        assert_eq!(preview_object(&obj), "{a: 1, b: 'x'}");
    }
}
