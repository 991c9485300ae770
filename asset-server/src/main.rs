use asset_server::{AssetServer, LedgerStorage, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 工作目录, 日志)
    let config = setup_environment()?;

    tracing::info!(
        work_dir = %config.work_dir,
        defer_mode = %config.transfer_defer_mode,
        horizon_secs = config.transfer_horizon_secs,
        "Asset server starting..."
    );

    // 2. 打开账本数据库
    let storage = LedgerStorage::open(config.database_path())?;
    tracing::info!(stats = ?storage.get_stats()?, "Ledger opened");

    // 3. 启动流水线
    let server = AssetServer::start(config, storage).await?;

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
