use anyhow::Context;
use btexd::Backend;
use tower_lsp::{LspService, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init()
        .context("failed to initialize logging")?;

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    log::info!("btexd {} listening on stdio", env!("CARGO_PKG_VERSION"));
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}
