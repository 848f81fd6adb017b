use anyhow::Result;
use macrostrat_mcp::McpServerState;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging MUST go to stderr; stdout carries protocol frames
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("macrostrat_mcp=info".parse()?)
                .add_directive("macrostrat_lib=info".parse()?),
        )
        .init();

    let state = McpServerState::new()?;
    info!(version = env!("CARGO_PKG_VERSION"), "macrostrat MCP server listening on stdio");
    state.serve_stdio().await?;
    Ok(())
}
