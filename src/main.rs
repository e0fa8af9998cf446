use anyhow::Result;
use cakeorders::app::handler;

#[tokio::main]
async fn main() -> Result<()> {
    handler::init().await
}
