//! Named-to-positional parameter transformation and validation

use serde_json::{Map, Value};
use shared::{BridgeMethodDescriptor, CallStyle, ParamDescriptor};

/// Turn request params into the handler's argument list
///
/// Positional methods get one argument per declared parameter, in declared
/// order. Structured methods get a single object holding the declared
/// parameters. Params may arrive as an object keyed by name or as an array in
/// declared order; undeclared keys are dropped.
pub fn transform_params(descriptor: &BridgeMethodDescriptor, params: &Value) -> Result<Vec<Value>, String> {
    let mut resolved = Vec::with_capacity(descriptor.params.len());

    for (index, param) in descriptor.params.iter().enumerate() {
        let supplied = match params {
            Value::Object(map) => map.get(&param.name),
            Value::Array(items) => items.get(index),
            _ => None,
        }
        .filter(|value| !value.is_null());

        let value = resolve_value(descriptor, param, supplied)?;
        resolved.push((param.name.clone(), value));
    }

    match descriptor.call_style {
        CallStyle::Positional => Ok(resolved.into_iter().map(|(_, value)| value).collect()),
        CallStyle::Structured => {
            let object: Map<String, Value> = resolved
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect();
            Ok(vec![Value::Object(object)])
        }
    }
}

fn resolve_value(
    descriptor: &BridgeMethodDescriptor,
    param: &ParamDescriptor,
    supplied: Option<&Value>,
) -> Result<Value, String> {
    let value = match (supplied, &param.default) {
        (Some(value), _) => value.clone(),
        (None, Some(default)) => return Ok(default.clone()),
        (None, None) if param.required => {
            return Err(format!(
                "Missing required parameter '{}' for {}",
                param.name,
                descriptor.qualified_name()
            ));
        }
        (None, None) => return Ok(Value::Null),
    };

    if !param.param_type.accepts(&value) {
        return Err(format!(
            "Parameter '{}' of {} expects {}, got {}",
            param.name,
            descriptor.qualified_name(),
            param.param_type,
            json_type_name(&value)
        ));
    }

    Ok(value)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
