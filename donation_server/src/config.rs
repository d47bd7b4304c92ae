use std::{env, net::IpAddr};

use dpg_common::{helpers::parse_boolean_flag, Secret};
use log::*;

const DEFAULT_DPG_HOST: &str = "127.0.0.1";
const DEFAULT_DPG_PORT: u16 = 8480;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Paystack webhook configuration.
    pub paystack: PaystackConfig,
}

#[derive(Clone, Debug, Default)]
pub struct PaystackConfig {
    /// The secret key used to verify webhook signatures. Shared with the Paystack dashboard.
    pub secret_key: Secret<String>,
    /// Signature verification can be switched off for local testing by setting `DPG_PAYSTACK_HMAC_CHECKS` to
    /// "0" or "false". It is on by default and must stay on in production.
    pub hmac_checks: bool,
    /// If supplied, requests against the webhook endpoint are checked against a whitelist of Paystack IP
    /// addresses. To explicitly disable the whitelist, set `DPG_PAYSTACK_IP_WHITELIST` to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DPG_HOST.to_string(),
            port: DEFAULT_DPG_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            paystack: PaystackConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DPG_HOST").ok().unwrap_or_else(|| DEFAULT_DPG_HOST.into());
        let port = env::var("DPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DPG_PORT. {e} Using the default, {DEFAULT_DPG_PORT}, instead."
                    );
                    DEFAULT_DPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DPG_PORT);
        let database_url = env::var("DPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DPG_DATABASE_URL is not set. Please set it to the URL for the donations database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("DPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("DPG_USE_FORWARDED").ok(), false);
        let paystack = PaystackConfig::from_env_or_default();
        Self { host, port, database_url, use_x_forwarded_for, use_forwarded, paystack }
    }
}

impl PaystackConfig {
    pub fn from_env_or_default() -> Self {
        let secret_key = env::var("DPG_PAYSTACK_SECRET_KEY").map(Secret::new).unwrap_or_else(|_| {
            warn!(
                "🪛️ DPG_PAYSTACK_SECRET_KEY is not set. Webhook signature verification will reject every \
                 delivery until it is configured."
            );
            Secret::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("DPG_PAYSTACK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🪛️ Paystack signature verification is DISABLED. Do not run this configuration in production.");
        }
        let whitelist = configure_ip_whitelist();
        Self { secret_key, hmac_checks, whitelist }
    }
}

fn configure_ip_whitelist() -> Option<Vec<IpAddr>> {
    match env::var("DPG_PAYSTACK_IP_WHITELIST") {
        Ok(s) if ["false", "none", "0"].contains(&s.to_lowercase().as_str()) => {
            info!("🪛️ The Paystack IP whitelist is explicitly disabled.");
            None
        },
        Ok(s) => {
            let ips = s
                .split(',')
                .filter_map(|ip| {
                    ip.trim()
                        .parse::<IpAddr>()
                        .map_err(|e| {
                            warn!("🪛️ Ignoring invalid IP address '{ip}' in DPG_PAYSTACK_IP_WHITELIST. {e}");
                            e
                        })
                        .ok()
                })
                .collect::<Vec<IpAddr>>();
            if ips.is_empty() {
                warn!("🪛️ DPG_PAYSTACK_IP_WHITELIST contained no valid addresses. The whitelist is disabled.");
                None
            } else {
                info!("🪛️ Webhook deliveries are restricted to {} whitelisted address(es).", ips.len());
                Some(ips)
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whitelist_parsing() {
        env::set_var("DPG_PAYSTACK_IP_WHITELIST", "52.31.139.75, 52.49.173.169,nonsense");
        let ips = configure_ip_whitelist().unwrap();
        assert_eq!(ips.len(), 2);
        env::set_var("DPG_PAYSTACK_IP_WHITELIST", "none");
        assert!(configure_ip_whitelist().is_none());
        env::remove_var("DPG_PAYSTACK_IP_WHITELIST");
        assert!(configure_ip_whitelist().is_none());
    }
}
