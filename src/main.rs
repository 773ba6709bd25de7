mod app;
mod config;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use spotwatch::PolicyFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Stream new spot instance prices for a set of policies")]
struct Args {
    /// Path to config file (optional)
    #[arg(long)]
    config: Option<String>,

    /// Price history service endpoint (overrides config)
    #[arg(long)]
    endpoint: Option<String>,

    /// Region of an ad-hoc policy, added to any configured policies
    #[arg(long)]
    region: Option<String>,

    /// Instance type filter for the ad-hoc policy
    #[arg(long)]
    instance_type: Option<String>,

    /// Product description filter for the ad-hoc policy
    #[arg(long)]
    product_description: Option<String>,

    /// Availability zone filter for the ad-hoc policy
    #[arg(long)]
    availability_zone: Option<String>,

    /// Seconds between incremental polls (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: Option<u64>,

    /// Print new prices as JSON lines instead of log lines
    #[arg(long)]
    json: bool,
}

impl Args {
    fn adhoc_policy(&self) -> Option<PolicyFilter> {
        let region = self.region.clone()?;
        Some(PolicyFilter {
            region,
            availability_zone: self.availability_zone.clone(),
            instance_type: self.instance_type.clone(),
            product_description: self.product_description.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    // Priority: CLI args > Config file > Defaults
    let mut app_cfg = if let Some(config_path) = &args.config {
        let cfg = config::Config::from_file(config_path)?;
        let mut app_cfg = app::AppCfg::from_config(cfg, args.json)?;
        if let Some(endpoint) = &args.endpoint {
            app_cfg.endpoint = endpoint.clone();
        }
        app_cfg
    } else {
        let endpoint = args
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--endpoint is required when not using --config"))?;
        app::AppCfg::from_cli_args(endpoint, args.json)
    };

    if let Some(secs) = args.poll_interval_secs {
        app_cfg.poller.poll_interval = Duration::from_secs(secs);
    }
    if let Some(policy) = args.adhoc_policy() {
        app_cfg.policies.push(policy);
    }

    app::run(app_cfg).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_poll_interval_flag_is_rejected() {
        let result = Args::try_parse_from(["spotwatch", "--endpoint", "http://localhost", "--poll-interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_adhoc_policy_from_flags() {
        let args = Args::try_parse_from([
            "spotwatch",
            "--region",
            "us-east-1",
            "--instance-type",
            "m5.large",
            "--poll-interval-secs",
            "15",
        ])
        .unwrap();

        assert_eq!(args.poll_interval_secs, Some(15));
        let policy = args.adhoc_policy().unwrap();
        assert_eq!(policy.region, "us-east-1");
        assert_eq!(policy.instance_type.as_deref(), Some("m5.large"));
        assert_eq!(policy.availability_zone, None);
    }
}
