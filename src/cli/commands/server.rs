use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub async fn serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    crate::server::serve(config).await
}

/// GET {url}/health and report the result. A degraded server is an error.
pub async fn ping(url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let endpoint = format!("{}/health", url.trim_end_matches('/'));
    let res = client
        .get(&endpoint)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", endpoint))?;

    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
        OutputFormat::Text => {
            let state = body["data"]["status"].as_str().unwrap_or("unknown");
            println!("{} {} ({})", endpoint, status, state);
        }
    }

    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("server at {} is unhealthy: {}", url, status)
    }
}
