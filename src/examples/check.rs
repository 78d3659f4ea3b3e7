//! Check one proxy and print the result as JSON.
//!
//! ```text
//! RUST_LOG=debug cargo run --example check -- socks5://127.0.0.1:1080 https://httpbin.org/ip
//! ```

use proxy_probe::{ProbeOptions, ProxyChecker};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let proxy = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: check <proxy-url> [test-url]"))?;

    let mut options = ProbeOptions::new()
        .attempts(3)
        .retry(1)
        .connect_timeout(Duration::from_secs(3));
    if let Some(url) = args.next() {
        options = options.url(url);
    }

    println!("Checking {}...", proxy);
    let checker = ProxyChecker::new();
    let result = checker.check_url(&proxy, options).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
