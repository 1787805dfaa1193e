use crate::cli::OutputFormat;
use crate::config::{self, AppConfig};

const MASK: &str = "********";

fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some(MASK));
            }
            url.into()
        }
        Err(_) => MASK.to_string(),
    }
}

/// Copy of the configuration safe to print
pub fn masked(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    shown.cache.url = mask_url(&config.cache.url);
    shown.records.url = mask_url(&config.records.url);
    shown.security.seed_admin_password = MASK.to_string();
    shown
}

pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let shown = masked(config::config());
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        OutputFormat::Text => {
            println!("environment:      {:?}", shown.environment);
            println!("cache:            {}", shown.cache.url);
            println!("secret key:       {}", shown.cache.secret_key);
            println!("records:          {}", shown.records.url);
            println!("auth port:        {}", shown.server.auth_port);
            println!("inventory port:   {}", shown.server.inventory_port);
            println!("token expiry:     {}h", shown.security.token_expiry_hours);
            println!(
                "bootstrap retry:  {}s (x{}, max {}s)",
                shown.bootstrap.retry_delay_secs,
                shown.bootstrap.retry_multiplier,
                shown.bootstrap.retry_max_delay_secs
            );
        }
    }
    Ok(())
}
