//! Reverse-RPC bridge vocabulary
//!
//! Descriptors are what the worker (and an LLM prompt built from them) sees of
//! the host's callable surface. Results are always values, never errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::messages::envelope::MessageKind;

/// Declared JSON type of a bridge parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    /// Whether a JSON value satisfies this declared type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        };
        write!(f, "{name}")
    }
}

/// How named parameters are handed to the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStyle {
    /// One argument per declared parameter, in declaration order
    #[default]
    Positional,
    /// A single object argument holding every declared parameter
    Structured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub description: String,
}

impl ParamDescriptor {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: true,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: false,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// One allow-listed, remotely callable host capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMethodDescriptor {
    pub service: String,
    pub method: String,
    pub description: String,
    pub params: Vec<ParamDescriptor>,
    pub returns: String,
    #[serde(default)]
    pub call_style: CallStyle,
}

impl BridgeMethodDescriptor {
    pub fn new(service: &str, method: &str, description: &str) -> Self {
        Self {
            service: service.to_string(),
            method: method.to_string(),
            description: description.to_string(),
            params: Vec::new(),
            returns: String::new(),
            call_style: CallStyle::Positional,
        }
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, returns: &str) -> Self {
        self.returns = returns.to_string();
        self
    }

    pub fn structured(mut self) -> Self {
        self.call_style = CallStyle::Structured;
        self
    }

    /// `service.method`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}

/// Outcome of one bridge invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCallResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeCallResult {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Turn into the `FRONTEND_BRIDGE_RESPONSE` payload for a request
    pub fn into_response(self, request_id: impl Into<String>) -> MessageKind {
        MessageKind::FrontendBridgeResponse {
            success: self.success,
            request_id: request_id.into(),
            result: self.result,
            error: self.error,
        }
    }
}
