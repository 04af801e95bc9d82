#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ads_uploader_server::start().await
}
