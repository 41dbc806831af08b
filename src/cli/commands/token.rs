use serde_json::{json, Value};

use crate::auth::{generate_jwt, Identity, IdentityKind};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

fn parse_kind(kind: &str) -> anyhow::Result<IdentityKind> {
    match kind {
        "user" => Ok(IdentityKind::User),
        "staff" => Ok(IdentityKind::Staff),
        "apikey" => Ok(IdentityKind::ApiKey),
        other => anyhow::bail!("unknown identity type '{}' (expected user, staff or apikey)", other),
    }
}

pub fn mint(
    config: &AppConfig,
    id: i64,
    kind: &str,
    name: Option<String>,
    email: Option<String>,
    admin: bool,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let kind = parse_kind(kind)?;
    let identity = Identity {
        id,
        kind,
        username: None,
        name,
        email,
        is_admin: admin && kind == IdentityKind::Staff,
        dept_id: None,
        role_id: None,
        permissions: match kind {
            IdentityKind::User => Value::Null,
            _ => json!({}),
        },
    };

    let token = generate_jwt(identity, &config.security).map_err(|e| anyhow::anyhow!("{}", e))?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "token": token, "expires_in_hours": config.security.jwt_expiry_hours })
        ),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
