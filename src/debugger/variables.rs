//! Variable store
//!
//! A monotonic registry assigning stable integer handles to inspectable
//! runtime containers: scopes, objects, array-likes and lazy property
//! descriptors. Handles are container identities, never value identities —
//! registering the same object twice yields two distinct handles. Entries
//! survive across pauses and are dropped only at session end or explicit
//! clear; handle `0` is reserved for "not expandable".

use std::collections::HashMap;

use crate::common::{Error, Result};
use crate::engine::value::{
    env_assign_existing, ObjectKind, Property, PropertyDescriptor,
};
use crate::engine::{Evaluator, FrameSnapshot, ObjectRef, Value};

/// A named scope backed by an environment record.
#[derive(Clone)]
pub struct DebugScope {
    pub name: String,
    pub env: crate::engine::EnvRef,
}

/// An inspectable container held by the store.
#[derive(Clone)]
pub enum VariableContainer {
    Scope {
        scope: DebugScope,
        frame: Option<FrameSnapshot>,
    },
    Object(ObjectRef),
    ArrayLike(ObjectRef),
    Property {
        descriptor: PropertyDescriptor,
        owner: ObjectRef,
    },
}

/// A materialized value: the closed union handed to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueInfo {
    Null,
    Primitive {
        value: String,
        type_name: &'static str,
    },
    Array {
        handle: i64,
        preview: String,
        length: usize,
    },
    Function {
        name: String,
    },
    Object {
        handle: i64,
        preview: String,
    },
    /// An uninvoked getter; expanding the handle runs it.
    Getter {
        handle: i64,
    },
}

impl ValueInfo {
    /// Display string for a variable listing.
    pub fn display(&self) -> String {
        match self {
            ValueInfo::Null => "null".to_string(),
            ValueInfo::Primitive { value, .. } => value.clone(),
            ValueInfo::Array { preview, .. } => preview.clone(),
            ValueInfo::Function { name } => format!("function {name}()"),
            ValueInfo::Object { preview, .. } => preview.clone(),
            ValueInfo::Getter { .. } => "(...)".to_string(),
        }
    }

    /// The variable reference, `0` when not expandable.
    pub fn handle(&self) -> i64 {
        match self {
            ValueInfo::Array { handle, .. }
            | ValueInfo::Object { handle, .. }
            | ValueInfo::Getter { handle } => *handle,
            _ => 0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueInfo::Null => "null",
            ValueInfo::Primitive { type_name, .. } => type_name,
            ValueInfo::Array { .. } => "array",
            ValueInfo::Function { .. } => "function",
            ValueInfo::Object { .. } => "object",
            ValueInfo::Getter { .. } => "getter",
        }
    }
}

pub struct VariableStore {
    containers: HashMap<i64, VariableContainer>,
    next_handle: i64,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            containers: HashMap::new(),
            next_handle: 1,
        }
    }

    fn insert(&mut self, container: VariableContainer) -> i64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.containers.insert(handle, container);
        handle
    }

    pub fn add_scope(&mut self, scope: DebugScope, frame: Option<FrameSnapshot>) -> i64 {
        self.insert(VariableContainer::Scope { scope, frame })
    }

    pub fn add_object(&mut self, object: ObjectRef) -> i64 {
        self.insert(VariableContainer::Object(object))
    }

    pub fn add_array_like(&mut self, object: ObjectRef) -> i64 {
        self.insert(VariableContainer::ArrayLike(object))
    }

    pub fn add_property(&mut self, descriptor: PropertyDescriptor, owner: ObjectRef) -> i64 {
        self.insert(VariableContainer::Property { descriptor, owner })
    }

    pub fn get(&self, handle: i64) -> Result<&VariableContainer> {
        self.containers
            .get(&handle)
            .ok_or(Error::UnknownHandle(handle))
    }

    /// Drop every container. Called at session end.
    pub fn clear(&mut self) {
        self.containers.clear();
    }

    /// Materialize a runtime value, registering a container for expandable
    /// ones.
    pub fn create_value(&mut self, value: &Value) -> ValueInfo {
        match value {
            Value::Null => ValueInfo::Null,
            Value::Undefined | Value::Bool(_) | Value::Number(_) | Value::Str(_) => {
                ValueInfo::Primitive {
                    value: value.to_display(),
                    type_name: value.type_name(),
                }
            }
            Value::Function(f) => ValueInfo::Function {
                name: f.def.name.clone().unwrap_or_else(|| "(anonymous)".into()),
            },
            Value::Object(obj) => {
                let (kind, length) = {
                    let data = obj.lock().unwrap();
                    (data.kind, data.elements.len())
                };
                let preview = value.to_string_value();
                match kind {
                    ObjectKind::Array => ValueInfo::Array {
                        handle: self.add_array_like(obj.clone()),
                        preview,
                        length,
                    },
                    ObjectKind::Plain => ValueInfo::Object {
                        handle: self.add_object(obj.clone()),
                        preview,
                    },
                }
            }
        }
    }

    /// Materialize a property without invoking getters: a getter becomes an
    /// expandable `Getter` handle that runs only on expansion.
    pub fn create_property_value(
        &mut self,
        name: &str,
        property: &Property,
        owner: &ObjectRef,
    ) -> ValueInfo {
        match property {
            Property::Data(value) => self.create_value(value),
            Property::Getter(getter) => ValueInfo::Getter {
                handle: self.add_property(
                    PropertyDescriptor {
                        name: name.to_string(),
                        getter: getter.clone(),
                    },
                    owner.clone(),
                ),
            },
        }
    }

    /// Enumerate a container's members.
    pub fn children(
        &mut self,
        handle: i64,
        evaluator: &dyn Evaluator,
    ) -> Result<Vec<(String, ValueInfo)>> {
        let container = self.get(handle)?.clone();
        match container {
            VariableContainer::Scope { scope, .. } => {
                let slots: Vec<(String, Value)> = scope.env.lock().unwrap().slots.clone();
                Ok(slots
                    .into_iter()
                    .map(|(name, value)| {
                        let info = self.create_value(&value);
                        (name, info)
                    })
                    .collect())
            }
            VariableContainer::Object(obj) => {
                let props: Vec<(String, Property)> = obj.lock().unwrap().props.clone();
                Ok(props
                    .into_iter()
                    .map(|(name, prop)| {
                        let info = self.create_property_value(&name, &prop, &obj);
                        (name, info)
                    })
                    .collect())
            }
            VariableContainer::ArrayLike(obj) => {
                let elements: Vec<Value> = obj.lock().unwrap().elements.clone();
                let mut children = Vec::with_capacity(elements.len() + 1);
                children.push((
                    "length".to_string(),
                    ValueInfo::Primitive {
                        value: elements.len().to_string(),
                        type_name: "number",
                    },
                ));
                for (i, value) in elements.iter().enumerate() {
                    let info = self.create_value(value);
                    children.push((i.to_string(), info));
                }
                Ok(children)
            }
            VariableContainer::Property { descriptor, owner } => {
                let value = evaluator.invoke_getter(&descriptor.getter, &owner)?;
                let info = self.create_value(&value);
                Ok(vec![("(result)".to_string(), info)])
            }
        }
    }

    /// Assign a member of a container and re-materialize the result.
    pub fn set_variable(
        &mut self,
        parent_handle: i64,
        name: &str,
        value: Value,
    ) -> Result<ValueInfo> {
        let container = self.get(parent_handle)?.clone();
        match container {
            VariableContainer::Scope { scope, .. } => {
                if !env_assign_existing(&scope.env, name, value.clone()) {
                    return Err(Error::Evaluation(format!("{name} is not defined")));
                }
            }
            VariableContainer::Object(obj) => {
                let mut data = obj.lock().unwrap();
                if matches!(data.get_prop(name), Some(Property::Getter(_))) {
                    return Err(Error::ReadOnly(name.to_string()));
                }
                data.set_prop(name, value.clone());
            }
            VariableContainer::ArrayLike(obj) => {
                if name == "length" {
                    return Err(Error::ReadOnly(name.to_string()));
                }
                let mut data = obj.lock().unwrap();
                if let Ok(index) = name.parse::<usize>() {
                    if index >= data.elements.len() {
                        data.elements.resize(index + 1, Value::Undefined);
                    }
                    data.elements[index] = value.clone();
                } else {
                    data.set_prop(name, value.clone());
                }
            }
            VariableContainer::Property { .. } => {
                return Err(Error::ReadOnly(name.to_string()));
            }
        }
        Ok(self.create_value(&value))
    }
}
