use async_trait::async_trait;
use mcp::{BoxError, InputSchema, PropertySchema, Tool};
use serde_json::{Map, Value, json};

const CONDITIONS: [&str; 5] = ["sunny", "partly cloudy", "overcast", "light rain", "windy"];

/// Stub forecast. The same city always gets the same weather.
pub struct Weather {
    schema: InputSchema,
}

impl Weather {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::object()
                .property("city", PropertySchema::string().description("City name"))
                .property(
                    "units",
                    PropertySchema::string()
                        .one_of(["celsius", "fahrenheit"])
                        .default("celsius"),
                )
                .required(["city"]),
        }
    }
}

#[async_trait]
impl Tool for Weather {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city"
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, BoxError> {
        let city = arguments
            .get("city")
            .and_then(Value::as_str)
            .ok_or("city must be a string")?;
        let units = arguments
            .get("units")
            .and_then(Value::as_str)
            .unwrap_or("celsius");

        let seed = city
            .to_lowercase()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let celsius = (seed % 35) as i64 - 5;
        let temperature = match units {
            "fahrenheit" => celsius * 9 / 5 + 32,
            _ => celsius,
        };

        Ok(json!({
            "city": city,
            "units": units,
            "temperature": temperature,
            "conditions": CONDITIONS[(seed / 35) as usize % CONDITIONS.len()],
        }))
    }
}
