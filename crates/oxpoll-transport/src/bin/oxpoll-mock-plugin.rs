//! Mock protocol plugin for local runs and integration tests.
//!
//! Speaks the plugin wire protocol on stdin/stdout: one JSON object per
//! line. Discovery requests are answered with a fake system description,
//! polling requests with fake counters. Fault injection flags simulate
//! an unreliable transport: `--drop-rate` silently swallows requests,
//! `--fail-rate` answers with `status=fail`, `--latency-ms` delays every
//! reply.

use anyhow::{anyhow, bail, Context, Result};
use oxpoll_common::types::OutboundRequest;
use serde_json::{json, Value};
use std::env;
use std::io::{BufRead, Write};

#[derive(Debug)]
struct Config {
    fail_rate: f64,
    drop_rate: f64,
    latency_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fail_rate: 0.0,
            drop_rate: 0.0,
            latency_ms: 0,
        }
    }
}

fn usage() {
    eprintln!(
        "Usage:\n  oxpoll-mock-plugin [options]\n\nOptions:\n  --fail-rate <0.0-1.0>   fraction of requests answered with status=fail (default: 0)\n  --drop-rate <0.0-1.0>   fraction of requests silently dropped (default: 0)\n  --latency-ms <n>        delay before each reply (default: 0)\n  -h, --help              show this help"
    );
}

fn parse_cli() -> Result<Option<Config>> {
    let mut config = Config::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--fail-rate" => {
                config.fail_rate = parse_rate(&next_value(&mut args, "--fail-rate")?)?;
            }
            "--drop-rate" => {
                config.drop_rate = parse_rate(&next_value(&mut args, "--drop-rate")?)?;
            }
            "--latency-ms" => {
                config.latency_ms = next_value(&mut args, "--latency-ms")?
                    .parse::<u64>()
                    .context("invalid number for --latency-ms")?;
            }
            _ => bail!("unknown argument: {arg}"),
        }
    }

    Ok(Some(config))
}

fn next_value<I>(args: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}

fn parse_rate(value: &str) -> Result<f64> {
    let rate = value
        .parse::<f64>()
        .with_context(|| format!("invalid rate: {value}"))?;
    if !(0.0..=1.0).contains(&rate) {
        bail!("rate must be within 0.0..=1.0: {value}");
    }
    Ok(rate)
}

fn discovery_reply(correlation_id: &str, ip: &str, system_type: &str, failed: bool) -> Value {
    if failed {
        return json!({
            "requestType": "discovery",
            "correlationId": correlation_id,
            "status": "fail",
            "error": "mock: credential check failed",
        });
    }
    json!({
        "requestType": "discovery",
        "correlationId": correlation_id,
        "status": "success",
        "data": {
            "systemName": format!("mock-{system_type}-{ip}"),
            "vendor": "oxpoll-mock",
            "uptimeSecs": 86_400,
            "interfaces": 4,
        },
    })
}

fn polling_reply(job_id: i64, failed: bool) -> Value {
    if failed {
        return json!({
            "requestType": "polling",
            "jobId": job_id,
            "status": "fail",
            "error": "mock: device unreachable",
        });
    }
    json!({
        "requestType": "polling",
        "jobId": job_id,
        "status": "success",
        "data": {
            "cpu.usage": 20.0 + rand::random::<f64>() * 60.0,
            "memory.used_percent": 30.0 + rand::random::<f64>() * 40.0,
            "network.bytes_recv": (rand::random::<u32>() % 1_000_000) as f64,
            "network.bytes_sent": (rand::random::<u32>() % 1_000_000) as f64,
        },
    })
}

fn write_reply(reply: &Value) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, reply)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let config = match parse_cli()? {
        Some(config) => config,
        None => {
            usage();
            return Ok(());
        }
    };

    eprintln!(
        "[mock-plugin] started fail_rate={} drop_rate={} latency_ms={}",
        config.fail_rate, config.drop_rate, config.latency_ms
    );

    let stdin = std::io::stdin().lock();
    for line in stdin.lines() {
        let line = line.context("failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }

        let request: OutboundRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("[mock-plugin] unparseable request ({e}): {line}");
                continue;
            }
        };

        if rand::random::<f64>() < config.drop_rate {
            eprintln!("[mock-plugin] dropping request");
            continue;
        }
        if config.latency_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(config.latency_ms));
        }
        let failed = rand::random::<f64>() < config.fail_rate;

        let reply = match &request {
            OutboundRequest::Discovery {
                correlation_id,
                ip,
                system_type,
                ..
            } => discovery_reply(correlation_id, ip, system_type, failed),
            OutboundRequest::Polling { job_id, .. } => polling_reply(*job_id, failed),
        };
        write_reply(&reply)?;
    }

    Ok(())
}
