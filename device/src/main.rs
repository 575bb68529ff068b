mod clock;
mod console;
mod host;
mod tone;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
