use anyhow::Result;
use std::path::Path;
use steward_core::config::Config;

pub fn run(root: &Path, port: u16) -> Result<()> {
    let config = Config::load(root)?;
    let org = config.org.name;

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();

        println!("steward API for '{org}' → http://localhost:{actual_port}");

        tokio::select! {
            res = steward_server::serve_on(root_buf, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
