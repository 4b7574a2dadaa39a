#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wagate_lib::run().await
}
