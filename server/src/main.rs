use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("AMB_CONFIG").ok().map(PathBuf::from);
    let config = config::resolve(path.as_deref())?;
    server::run(config).await
}
