use anyhow::{anyhow, Context, Result};
use std::env;

use crate::payments::providers::wxpay::config::WxPayConfigInput;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub wxpay: WxPayConfigInput,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let wxpay = WxPayConfigInput::from_env().context("Invalid WeChat Pay configuration")?;

        let config = Config { server, wxpay };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate port range
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        self.wxpay
            .validate()
            .context("Invalid WeChat Pay configuration")?;

        // The provider only calls back over https in production
        if self.server.environment == "production" {
            if !self.wxpay.notify_url.starts_with("https://") {
                return Err(anyhow!(
                    "WXPAY_NOTIFY_URL must use https in production, got {}",
                    self.wxpay.notify_url
                ));
            }
            if self.wxpay.use_sandbox {
                return Err(anyhow!("WXPAY_USE_SANDBOX cannot be enabled in production"));
            }
        }

        Ok(())
    }
}
