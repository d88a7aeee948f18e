#[tokio::main]
async fn main() -> anyhow::Result<()> {
    archiver::run_server().await
}
