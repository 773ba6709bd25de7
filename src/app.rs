// src/app.rs
use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use spotwatch::infrastructure::price_client::{EnvCredentials, HttpClientFactory};
use spotwatch::{Monitor, PolicyFilter, PollerConfig};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub endpoint: String,
    pub api_key_env: String,
    pub request_timeout: Duration,
    pub poller: PollerConfig,
    pub policies: Vec<PolicyFilter>,
    /// Print each point as a JSON line on stdout
    pub json: bool,
}

impl AppCfg {
    pub fn from_config(cfg: Config, json: bool) -> Result<Self> {
        Ok(Self {
            endpoint: cfg.client.endpoint,
            api_key_env: cfg.client.api_key_env,
            request_timeout: Duration::from_millis(cfg.client.timeout_ms),
            poller: PollerConfig::try_from(&cfg.poller)?,
            policies: cfg.policies,
            json,
        })
    }

    pub fn from_cli_args(endpoint: String, json: bool) -> Self {
        Self {
            endpoint,
            api_key_env: EnvCredentials::DEFAULT_VAR.to_string(),
            request_timeout: Duration::from_secs(10),
            poller: PollerConfig::default(),
            policies: Vec::new(),
            json,
        }
    }
}

pub async fn run(app_cfg: AppCfg) -> Result<()> {
    info!("Starting spot price monitor");
    info!("Configuration: {:?}", app_cfg);

    if app_cfg.policies.is_empty() {
        bail!("no policies configured; pass --region or add [[policies]] to the config file");
    }

    let factory = HttpClientFactory::new(
        app_cfg.endpoint.clone(),
        app_cfg.request_timeout,
        Arc::new(EnvCredentials::new(app_cfg.api_key_env.clone())),
    );
    let monitor = Monitor::new(Arc::new(factory), app_cfg.poller.clone());

    let mut streams = Vec::with_capacity(app_cfg.policies.len());
    for filter in app_cfg.policies.iter().cloned() {
        let subscription = monitor.add_policy(filter.clone()).await?;
        info!("Watching {} as policy {}", filter, subscription.handle);
        let handle = subscription.handle;
        streams.push(subscription.stream.map(move |item| (handle, item)).boxed());
    }

    let total = streams.len();
    let mut merged = stream::select_all(streams);
    let mut failures = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
            next = merged.next() => match next {
                Some((handle, Ok(point))) => {
                    if app_cfg.json {
                        println!("{}", serde_json::to_string(&point)?);
                    } else {
                        info!(
                            policy = %handle,
                            zone = %point.availability_zone,
                            instance_type = %point.instance_type,
                            product = %point.product_description,
                            price = point.price,
                            timestamp = %point.timestamp,
                            "new spot price"
                        );
                    }
                }
                Some((handle, Err(err))) => {
                    failures += 1;
                    error!(policy = %handle, "policy terminated: {}", err);
                }
                None => {
                    warn!("All policy streams closed");
                    break;
                }
            }
        }
    }

    monitor.shutdown().await;

    if failures == total {
        bail!("all {} policies failed", total);
    }
    Ok(())
}
