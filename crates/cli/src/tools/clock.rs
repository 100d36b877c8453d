use async_trait::async_trait;
use chrono::Utc;
use mcp::{BoxError, InputSchema, PropertySchema, Tool};
use serde_json::{Map, Value, json};

/// Reports the current UTC time.
pub struct Clock {
    schema: InputSchema,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::object().property(
                "format",
                PropertySchema::string()
                    .description("rfc3339 timestamp or unix seconds")
                    .one_of(["rfc3339", "unix"])
                    .default("rfc3339"),
            ),
        }
    }
}

#[async_trait]
impl Tool for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Get the current date and time (UTC)"
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, BoxError> {
        let now = Utc::now();
        let now = match arguments.get("format").and_then(Value::as_str) {
            Some("unix") => json!(now.timestamp()),
            _ => json!(now.to_rfc3339()),
        };
        Ok(json!({ "now": now }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn default_format_is_rfc3339() {
        let clock = Clock::new();
        let args = clock.input_schema().validate(&Map::new()).unwrap();
        let out = clock.invoke(args).await.unwrap();
        DateTime::parse_from_rfc3339(out["now"].as_str().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn unix_format() {
        let mut args = Map::new();
        args.insert("format".into(), json!("unix"));
        let out = Clock::new().invoke(args).await.unwrap();
        assert!(out["now"].as_i64().unwrap() > 1_600_000_000);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut args = Map::new();
        args.insert("format".into(), json!("iso"));
        assert!(Clock::new().input_schema().validate(&args).is_err());
    }
}
