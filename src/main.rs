use courier::config::Config;
use courier::http::request::Request;
use courier::http::response::Response;
use courier::server;

/// Replies with a short summary of what was received.
fn echo(req: &Request, resp: &mut Response) -> anyhow::Result<()> {
    resp.set_header("Content-Type", "text/plain");
    resp.body = format!(
        "{} {} from {}:{}\n{} header(s), {} body byte(s)\n",
        req.method,
        req.path,
        req.source,
        req.source_port,
        req.headers.len(),
        req.body.len()
    )
    .into_bytes();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.max_level()?)
        .init();

    tokio::select! {
        res = server::listener::run(&cfg.server, echo) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
