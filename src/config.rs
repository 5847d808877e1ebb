use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub results_file: PathBuf,
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub downstream_url: String,
    pub downstream_timeout_secs: u64,
    pub forward_timeout_secs: u64,
    /// Margine oltre i timeout prima che un job nel registry sia considerato orfano
    pub lease_grace_secs: u64,
    /// URL pubblico del servizio, usato per costruire il callback verso il receiver
    pub public_url: Option<String>,
    pub workers: usize,
    pub poll_interval_ms: u64,
    pub redis_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub submit_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            results_file: PathBuf::from("job_results.json"),
            retention_secs: 600,
            sweep_interval_secs: 300,
            downstream_url: "http://localhost:5678/webhook/vra-webhook".to_string(),
            downstream_timeout_secs: 600,
            forward_timeout_secs: 10,
            lease_grace_secs: 30,
            public_url: None,
            workers: 4,
            poll_interval_ms: 500,
            redis_url: None,
            jwt_secret: None,
            submit_rate_limit: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("TASKGATE_HOST") {
            config.host = host;
        }

        if let Some(port) = parse_env("TASKGATE_PORT") {
            config.port = port;
        }

        if let Ok(path) = std::env::var("TASKGATE_RESULTS_FILE") {
            config.results_file = PathBuf::from(path);
        }

        if let Some(secs) = parse_env("TASKGATE_RETENTION_SECS") {
            config.retention_secs = secs;
        }

        if let Some(secs) = parse_env("TASKGATE_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = secs;
        }

        if let Ok(url) = std::env::var("TASKGATE_DOWNSTREAM_URL") {
            config.downstream_url = url;
        }

        if let Some(secs) = parse_env("TASKGATE_DOWNSTREAM_TIMEOUT_SECS") {
            config.downstream_timeout_secs = secs;
        }

        if let Some(secs) = parse_env("TASKGATE_FORWARD_TIMEOUT_SECS") {
            config.forward_timeout_secs = secs;
        }

        if let Some(secs) = parse_env("TASKGATE_LEASE_GRACE_SECS") {
            config.lease_grace_secs = secs;
        }

        if let Ok(url) = std::env::var("TASKGATE_PUBLIC_URL") {
            let url = url.trim_end_matches('/').to_string();
            if !url.is_empty() {
                config.public_url = Some(url);
            }
        }

        if let Some(workers) = parse_env::<usize>("TASKGATE_WORKERS") {
            // Almeno un worker, altrimenti nessun job arriverebbe mai a stato terminale
            config.workers = workers.max(1);
        }

        if let Some(ms) = parse_env("TASKGATE_POLL_INTERVAL_MS") {
            config.poll_interval_ms = ms;
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.is_empty() {
                config.redis_url = Some(url);
            }
        }

        if let Ok(secret) = std::env::var("TASKGATE_JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = Some(secret);
            }
        }

        if let Some(limit) = parse_env::<u32>("TASKGATE_SUBMIT_RATE_LIMIT") {
            if limit > 0 {
                config.submit_rate_limit = limit;
            }
        }

        config
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_secs(self.downstream_timeout_secs)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    /// Durata massima di un job nel registry: chiamata a valle, inoltro e margine
    pub fn registry_lease(&self) -> Duration {
        Duration::from_secs(
            self.downstream_timeout_secs
                .saturating_add(self.forward_timeout_secs)
                .saturating_add(self.lease_grace_secs),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// URL del receiver interno, se il servizio è raggiungibile dall'esterno
    pub fn receiver_url(&self) -> Option<String> {
        self.public_url
            .as_ref()
            .map(|base| format!("{}/dashboard_webhook_receiver", base))
    }

    /// URL della pagina viewer per un job
    pub fn viewer_url(&self, job_id: &str) -> Option<String> {
        self.public_url
            .as_ref()
            .map(|base| format!("{}/view_webhook/{}", base, job_id))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
