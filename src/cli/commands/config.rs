use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub fn show(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let redacted = config.redacted();
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&redacted)?),
        OutputFormat::Text => println!("{:#?}", redacted),
    }

    if let Err(e) = config.validate() {
        eprintln!("warning: {}", e);
    }
    Ok(())
}
