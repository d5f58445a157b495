use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    easeprobe_engine::cmd::start().await
}
