//! The probe engine: attempt slots, retries and result assembly.

use log::{debug, info, warn};

use crate::config::{ProbeConfig, ProbeOptions};
use crate::error::CheckError;
use crate::proxy::ProxyEndpoint;
use crate::result::{PhaseReport, ProxyCheckResult};
use crate::stats::{Latency, Sample};
use crate::strategy::{Dispatcher, Probe, Target, Timeouts};

/// Checks proxies by running a configurable number of probes through them.
///
/// Attempts run strictly one after another so that measurements do not
/// contend with each other. Independent checkers, or independent calls on the
/// same checker, may run concurrently.
pub struct ProxyChecker<P = Dispatcher> {
    probe: P,
}

impl ProxyChecker<Dispatcher> {
    /// Create a checker that talks to real proxies.
    pub fn new() -> Self {
        Self::with_probe(Dispatcher::new())
    }
}

impl Default for ProxyChecker<Dispatcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Probe> ProxyChecker<P> {
    /// Create a checker around a custom probe implementation.
    pub fn with_probe(probe: P) -> Self {
        Self { probe }
    }

    /// Check `endpoint`, merging `options` over the defaults.
    pub async fn check(
        &self,
        endpoint: &ProxyEndpoint,
        options: ProbeOptions,
    ) -> Result<ProxyCheckResult, CheckError> {
        self.run(endpoint, &options.merge()).await
    }

    /// Parse a proxy URL such as `socks5://127.0.0.1:1080` and check it.
    pub async fn check_url(
        &self,
        proxy: &str,
        options: ProbeOptions,
    ) -> Result<ProxyCheckResult, CheckError> {
        let endpoint = ProxyEndpoint::parse(proxy)?;
        self.check(&endpoint, options).await
    }

    /// Run a check with a complete configuration.
    ///
    /// Fails only when the configuration itself is unusable. An unreachable or
    /// broken proxy still yields a result, with quality `None`.
    pub async fn run(
        &self,
        endpoint: &ProxyEndpoint,
        config: &ProbeConfig,
    ) -> Result<ProxyCheckResult, CheckError> {
        let target = Target::parse(&config.url)?;
        let timeouts = Timeouts::from(config);

        let mut connection = Vec::with_capacity(config.attempts);
        let mut response = Vec::with_capacity(config.attempts);

        for slot in 0..config.attempts {
            match self.attempt(endpoint, &target, &timeouts, config.retry, slot).await {
                Some(latency) => {
                    connection.push(Sample::Measured(latency.connection));
                    response.push(Sample::Measured(latency.response));
                }
                None => {
                    connection.push(Sample::Failed);
                    response.push(Sample::Failed);
                }
            }
        }

        let result = ProxyCheckResult {
            proxy: endpoint.clone(),
            url: config.url.clone(),
            connection: PhaseReport::from_samples(connection),
            response: PhaseReport::from_samples(response),
        };

        info!(
            "Proxy {} checked against {}: {}/{} attempts succeeded, connection {:?}, response {:?}",
            endpoint,
            config.url,
            result.response.successes(),
            config.attempts,
            result.connection.quality,
            result.response.quality
        );

        Ok(result)
    }

    /// One attempt slot: probe until success or until the retries run out.
    async fn attempt(
        &self,
        endpoint: &ProxyEndpoint,
        target: &Target,
        timeouts: &Timeouts,
        retry_limit: usize,
        slot: usize,
    ) -> Option<Latency> {
        let mut retries = 0;

        loop {
            match self.probe.probe(endpoint, target, timeouts).await {
                Ok(latency) => {
                    debug!(
                        "Proxy {} attempt {}: connection {:?}, response {:?}",
                        endpoint,
                        slot + 1,
                        latency.connection,
                        latency.response
                    );
                    return Some(latency);
                }
                Err(err) => {
                    retries += 1;
                    if retries > retry_limit {
                        warn!(
                            "Proxy {} attempt {} failed after {} tries: {}",
                            endpoint,
                            slot + 1,
                            retries,
                            err
                        );
                        return None;
                    }
                    debug!(
                        "Proxy {} attempt {} try {} failed: {}",
                        endpoint,
                        slot + 1,
                        retries,
                        err
                    );
                }
            }
        }
    }
}
