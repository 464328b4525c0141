//! Built-in arithmetic tool.
//!
//! Always present in the tool catalog. Division follows IEEE-754, so
//! dividing by zero yields `Infinity` (or `NaN` for `0 / 0`) rather than
//! an error.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::catalog::Tool;
use super::tool::ToolDefinition;
use crate::error::ChatError;

/// Name the calculator is registered under.
pub const CALCULATOR_TOOL: &str = "calculator";

/// Arithmetic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// `number1 + number2`
    Add,
    /// `number1 - number2`
    Subtract,
    /// `number1 * number2`
    Multiply,
    /// `number1 / number2`
    Divide,
}

/// Calculator arguments as sent by the model.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CalculatorArgs {
    /// The type of operation to execute.
    pub operation: Operation,
    /// The first number to operate on.
    pub number1: f64,
    /// The second number to operate on.
    pub number2: f64,
}

impl CalculatorArgs {
    /// Applies the operation.
    #[must_use]
    pub fn evaluate(&self) -> f64 {
        match self.operation {
            Operation::Add => self.number1 + self.number2,
            Operation::Subtract => self.number1 - self.number2,
            Operation::Multiply => self.number1 * self.number2,
            Operation::Divide => self.number1 / self.number2,
        }
    }
}

/// Formats a result the way callers expect numbers on the wire: integral
/// values without a fractional part, non-finite values spelled out, and
/// magnitudes at or above `1e21` or below `1e-6` in exponent form
/// (`1e+22`, `1.5e-7`). Negative zero prints as `0`.
#[must_use]
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 {
        "0".to_string()
    } else if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{value:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        format!("{value}")
    }
}

/// The arithmetic tool.
#[derive(Debug, Clone)]
pub struct Calculator {
    definition: ToolDefinition,
}

impl Calculator {
    /// Creates the calculator with its generated input schema.
    #[must_use]
    pub fn new() -> Self {
        let mut parameters = serde_json::to_value(schemars::schema_for!(CalculatorArgs))
            .unwrap_or_else(|_| json!({"type": "object"}));
        if let Some(obj) = parameters.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }

        Self {
            definition: ToolDefinition {
                name: CALCULATOR_TOOL.to_string(),
                description: "Perform basic arithmetic: add, subtract, multiply or divide two numbers."
                    .to_string(),
                parameters,
            },
        }
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for Calculator {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ChatError> {
        let args: CalculatorArgs =
            serde_json::from_value(arguments).map_err(|e| ChatError::ToolExecution {
                name: CALCULATOR_TOOL.to_string(),
                message: format!("invalid arguments: {e}"),
            })?;
        Ok(Value::String(format_number(args.evaluate())))
    }
}
