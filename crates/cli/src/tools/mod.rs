//! Demo tools served by `toolhost serve`.

mod clock;
mod dice;
mod weather;

use mcp::{ToolError, ToolRegistry};
use tracing::Span;

pub use clock::Clock;
pub use dice::Dice;
pub use weather::Weather;

/// Registry holding every demo tool.
pub async fn demo_registry(span: Span) -> Result<ToolRegistry, ToolError> {
    let registry = ToolRegistry::new().with_span(span);
    registry.register(Dice::new(), false).await?;
    registry.register(Clock::new(), false).await?;
    registry.register(Weather::new(), false).await?;
    Ok(registry)
}
