//! Calculator tool: one arithmetic operation on two numbers.
//!
//! Supported operations: `add`, `sub`, `mul`, `div`. Division by zero and
//! unknown operations come back as `{"error": ...}` payloads so the model
//! can correct itself.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;

pub struct CalculatorTool;

#[derive(Debug, Deserialize)]
struct CalculatorArgs {
    first_num: f64,
    second_num: f64,
    operation: String,
}

/// Apply `operation` to the operands.
///
/// Results that overflow to infinity (or come out NaN) are errors: JSON has
/// no representation for them.
pub fn calculate(first_num: f64, second_num: f64, operation: &str) -> Result<f64, String> {
    let result = match operation {
        "add" => Ok(first_num + second_num),
        "sub" => Ok(first_num - second_num),
        "mul" => Ok(first_num * second_num),
        "div" => {
            if second_num == 0.0 {
                return Err("Division by zero is not allowed".into());
            }
            Ok(first_num / second_num)
        }
        other => Err(format!("Unsupported operation '{other}'")),
    }?;
    if !result.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(result)
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform a basic arithmetic operation on two numbers. Supported operations: add, sub, mul, div"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "first_num": {
                    "type": "number",
                    "description": "The left operand"
                },
                "second_num": {
                    "type": "number",
                    "description": "The right operand"
                },
                "operation": {
                    "type": "string",
                    "enum": ["add", "sub", "mul", "div"],
                    "description": "The operation to apply"
                }
            },
            "required": ["first_num", "second_num", "operation"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: CalculatorArgs = parse_arguments(self.name(), arguments)?;

        match calculate(args.first_num, args.second_num, &args.operation) {
            Ok(result) => {
                let mut data = serde_json::Map::new();
                data.insert("first_num".into(), args.first_num.into());
                data.insert("second_num".into(), args.second_num.into());
                data.insert("operation".into(), args.operation.into());
                data.insert("result".into(), result.into());
                Ok(ToolResult::structured(data))
            }
            Err(message) => Ok(ToolResult::error(message)),
        }
    }
}
