//! Command execution.

use crate::Commands;
use colored::Colorize;
use framewire_client::{Client, ClientError, ConnectionConfig};
use std::time::{Duration, Instant};

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl | Commands::Load { .. } => unreachable!(),

        Commands::Ping { count } => {
            let mut lines = Vec::new();
            for i in 0..count.max(1) {
                let latency = client.ping().await?;
                lines.push(format!(
                    "{} seq={} time={}ms",
                    "PONG".green(),
                    i + 1,
                    latency.as_millis()
                ));
            }
            Ok(lines.join("\n"))
        }

        Commands::Hello { name, body } => {
            let response = client.hello(&name, &body).await?;
            Ok(format_greeting(response.body.as_deref()))
        }
    }
}

pub fn format_greeting(body: Option<&str>) -> String {
    match body {
        Some(text) => format!("{} {}", "OK".green(), text),
        None => "OK".green().to_string(),
    }
}

/// Latency summary for a load run.
#[derive(Debug)]
pub struct LoadReport {
    pub connections: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Sorted ascending.
    latencies: Vec<Duration>,
}

impl LoadReport {
    fn new(connections: usize, mut latencies: Vec<Duration>, failed: usize, elapsed: Duration) -> Self {
        latencies.sort_unstable();
        Self {
            connections,
            completed: latencies.len(),
            failed,
            elapsed,
            latencies,
        }
    }

    /// Requests completed per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.completed as f64 / secs
        }
    }

    /// Nearest-rank percentile, `p` in 0..=100.
    pub fn percentile(&self, p: f64) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let rank = ((p / 100.0) * self.latencies.len() as f64).ceil() as usize;
        let index = rank.clamp(1, self.latencies.len()) - 1;
        self.latencies[index]
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "Load test complete".bold())?;
        writeln!(f, "  connections: {}", self.connections)?;
        writeln!(
            f,
            "  requests:    {} ok, {} failed",
            self.completed.to_string().green(),
            if self.failed == 0 {
                self.failed.to_string().normal()
            } else {
                self.failed.to_string().red()
            }
        )?;
        writeln!(f, "  elapsed:     {:.2?}", self.elapsed)?;
        writeln!(f, "  throughput:  {:.0} req/s", self.throughput())?;
        write!(
            f,
            "  latency:     p50={:.2?} p95={:.2?} p99={:.2?} max={:.2?}",
            self.percentile(50.0),
            self.percentile(95.0),
            self.percentile(99.0),
            self.percentile(100.0)
        )
    }
}

async fn ping_worker(config: ConnectionConfig, requests: usize) -> Result<(Vec<Duration>, usize), ClientError> {
    let client = Client::new(config);
    client.connect_and_listen().await?;

    let mut latencies = Vec::with_capacity(requests);
    let mut failed = 0;
    for _ in 0..requests {
        let start = Instant::now();
        match client.ping().await {
            Ok(_) => latencies.push(start.elapsed()),
            Err(e) if e.is_retryable() && client.is_connected() => failed += 1,
            Err(e) => {
                client.close().await.ok();
                return Err(e);
            }
        }
    }

    client.close().await?;
    Ok((latencies, failed))
}

/// Runs `connections` concurrent clients, each sending `requests` pings.
pub async fn load(
    config: ConnectionConfig,
    connections: usize,
    requests: usize,
) -> Result<LoadReport, Box<dyn std::error::Error>> {
    let connections = connections.max(1);
    println!(
        "Running {} connections x {} pings against {}...",
        connections.to_string().cyan(),
        requests.to_string().cyan(),
        config.addr
    );

    let start = Instant::now();
    let workers: Vec<_> = (0..connections)
        .map(|_| tokio::spawn(ping_worker(config.clone(), requests)))
        .collect();

    let mut latencies = Vec::with_capacity(connections * requests);
    let mut failed = 0;
    for worker in workers {
        match worker.await? {
            Ok((samples, errors)) => {
                latencies.extend(samples);
                failed += errors;
            }
            Err(e) => {
                tracing::warn!("load worker failed: {}", e);
                failed += requests;
            }
        }
    }

    Ok(LoadReport::new(connections, latencies, failed, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(millis: &[u64]) -> LoadReport {
        let latencies = millis.iter().map(|ms| Duration::from_millis(*ms)).collect();
        LoadReport::new(1, latencies, 0, Duration::from_secs(2))
    }

    #[test]
    fn test_percentiles() {
        let report = report(&[5, 1, 4, 2, 3, 10, 9, 8, 7, 6]);
        assert_eq!(report.percentile(50.0), Duration::from_millis(5));
        assert_eq!(report.percentile(90.0), Duration::from_millis(9));
        assert_eq!(report.percentile(100.0), Duration::from_millis(10));
        assert_eq!(report.percentile(0.0), Duration::from_millis(1));
    }

    #[test]
    fn test_empty_report() {
        let report = report(&[]);
        assert_eq!(report.percentile(99.0), Duration::ZERO);
        assert_eq!(report.completed, 0);
    }

    #[test]
    fn test_throughput() {
        let report = report(&[1, 1, 1, 1]);
        assert_eq!(report.throughput(), 2.0);
    }
}
