use async_trait::async_trait;
use mcp::{BoxError, InputSchema, PropertySchema, Tool};
use rand::Rng;
use serde_json::{Map, Value, json};

/// Rolls a die with a configurable number of sides.
pub struct Dice {
    schema: InputSchema,
}

impl Dice {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::object().property(
                "sides",
                PropertySchema::integer()
                    .description("Number of sides on the die")
                    .minimum(1)
                    .default(6),
            ),
        }
    }
}

#[async_trait]
impl Tool for Dice {
    fn name(&self) -> &str {
        "dice"
    }

    fn description(&self) -> &str {
        "Roll a die and return the result"
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, BoxError> {
        let sides = arguments
            .get("sides")
            .and_then(Value::as_f64)
            .ok_or("sides must be an integer")? as i64;
        let result = rand::thread_rng().gen_range(1..=sides);
        Ok(json!({ "result": result, "sides": sides }))
    }
}
