//! `brewery-demo`: serves one request against the demo application and
//! prints the raw HTTP response.
//!
//! ```text
//! brewery-demo GET /tea/origin/japan
//! brewery-demo --header "Authorization:Bearer ada" GET /admin/orders
//! RUST_LOG=debug brewery-demo GET /
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "brewery-demo", version)]
#[command(about = "Serve one request against the Brewery demo application")]
struct Cli {
    /// Application root holding brewery.yaml
    #[arg(long, default_value = env!("CARGO_MANIFEST_DIR"))]
    root: PathBuf,

    /// Request header, may be repeated
    #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Request method, e.g. GET
    method: String,

    /// Request path, e.g. /tea/origin/japan
    path: String,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".into());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = brewery_example::app(&cli.root)?;

    let mut request = http::Request::builder()
        .method(cli.method.to_uppercase().as_str())
        .uri(cli.path.as_str());
    for (name, value) in &cli.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = app.handle_http(request.body(String::new())?);

    print!("{}", response.to_http_string());
    Ok(())
}
