use clap::{Parser, ValueEnum};
use surge::{BrokerOptions, RunConfig, TemplateConfig, counters::DEFAULT_COUNTERS};

/// Which sink the workers write to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// JSON lines on standard output, one writer thread per worker.
    Stdout,
    /// Acknowledge everything without writing; measures the generator alone.
    Discard,
}

/// Command-line configuration for the `surge` binary.
///
/// Every value can also come from a `SURGE_*` environment variable or a
/// `.env` file in the working directory. Flags win over the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "surge",
    version,
    about = "Rate-limited traffic generator for message brokers"
)]
pub struct CliArgs {
    /// Target messages per second.
    ///
    /// Environment variable: `SURGE_RPS`
    #[arg(long, env = "SURGE_RPS", default_value_t = 100)]
    pub rps: u64,

    /// Length of the run window in seconds, warmup included.
    ///
    /// Environment variable: `SURGE_DURATION_SEC`
    #[arg(long, env = "SURGE_DURATION_SEC", default_value_t = 60)]
    pub duration_sec: u64,

    /// Minimum payload size. Shorter payloads are padded with `x`; longer ones
    /// are sent as-is.
    ///
    /// Environment variable: `SURGE_MESSAGE_SIZE_BYTES`
    #[arg(long, env = "SURGE_MESSAGE_SIZE_BYTES", default_value_t = 256)]
    pub message_size_bytes: usize,

    /// Prefix of every message key; the sequence number is appended.
    ///
    /// Environment variable: `SURGE_KEY_PREFIX`
    #[arg(long, env = "SURGE_KEY_PREFIX", default_value_t = String::from("key-"))]
    pub key_prefix: String,

    /// Payload template. `{seq}` and `{ts}` are substituted per message.
    ///
    /// Environment variable: `SURGE_PAYLOAD_TEMPLATE`
    #[arg(long, env = "SURGE_PAYLOAD_TEMPLATE", default_value_t = String::from("{ts}|{seq}"))]
    pub payload_template: String,

    /// Number of workers. Each opens its own sink connection.
    ///
    /// Environment variable: `SURGE_CONCURRENCY`
    #[arg(long, env = "SURGE_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Capacity of the work queue between the generator and the workers.
    ///
    /// When the queue is full the generator blocks, so a slow sink lowers the
    /// achieved rate instead of growing memory.
    ///
    /// Environment variable: `SURGE_MAX_IN_FLIGHT`
    #[arg(long, env = "SURGE_MAX_IN_FLIGHT", default_value_t = 1000)]
    pub max_in_flight: usize,

    /// Idle seconds at the start of the window before generation begins.
    ///
    /// Environment variable: `SURGE_WARMUP_SEC`
    #[arg(long, env = "SURGE_WARMUP_SEC", default_value_t = 0)]
    pub warmup_sec: u64,

    /// Count messages without opening sink connections or sending anything.
    ///
    /// Environment variable: `SURGE_DRY_RUN`
    #[arg(long, env = "SURGE_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Comma-separated counters to record and report.
    ///
    /// Environment variable: `SURGE_COUNTERS`
    #[arg(
        long,
        env = "SURGE_COUNTERS",
        value_delimiter = ',',
        default_values_t = DEFAULT_COUNTERS.map(String::from)
    )]
    pub counters: Vec<String>,

    /// Seconds between counter reports. Zero is treated as one.
    ///
    /// Environment variable: `SURGE_REPORT_INTERVAL_SEC`
    #[arg(long, env = "SURGE_REPORT_INTERVAL_SEC", default_value_t = 5)]
    pub report_interval_sec: u64,

    /// Destination topic handed to the sink with every message.
    ///
    /// Environment variable: `SURGE_TOPIC`
    #[arg(long, env = "SURGE_TOPIC", default_value_t = String::from("load-topic"))]
    pub topic: String,

    /// Sink the workers write to.
    ///
    /// Environment variable: `SURGE_SINK`
    #[arg(long, env = "SURGE_SINK", value_enum, default_value_t = SinkKind::Stdout)]
    pub sink: SinkKind,

    /// Broker connection option passed through to the sink. Repeatable.
    ///
    /// Example: `--broker-opt bootstrap.servers=localhost:9092`
    #[arg(long = "broker-opt", value_name = "KEY=VALUE", value_parser = parse_broker_opt)]
    pub broker_opts: Vec<(String, String)>,

    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `SURGE_LOG_LEVEL`
    #[arg(long, env = "SURGE_LOG_LEVEL", default_value_t = String::from("info"))]
    pub log_level: String,
}

fn parse_broker_opt(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub run: RunConfig,
    pub template: TemplateConfig,
    pub sink: SinkKind,
    pub broker_options: BrokerOptions,
    pub log_level: String,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let enabled_counters = args
            .counters
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        let run = RunConfig {
            rps: args.rps,
            duration_sec: args.duration_sec,
            concurrency: args.concurrency,
            max_in_flight: args.max_in_flight,
            warmup_sec: args.warmup_sec,
            dry_run: args.dry_run,
            enabled_counters,
            report_interval_sec: args.report_interval_sec,
            topic: args.topic,
        };
        run.validate()?;

        Ok(Self {
            run,
            template: TemplateConfig {
                payload_template: args.payload_template,
                message_size_bytes: args.message_size_bytes,
                key_prefix: args.key_prefix,
            },
            sink: args.sink,
            broker_options: args.broker_opts.into_iter().collect(),
            log_level: args.log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<CliConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("surge").chain(args.iter().copied()))?;
        CliConfig::try_from(args)
    }

    #[test]
    fn defaults_match_the_library() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.run, RunConfig::default());
        assert_eq!(config.template, TemplateConfig::default());
        assert_eq!(config.sink, SinkKind::Stdout);
        assert!(config.broker_options.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--rps",
            "250",
            "--duration-sec",
            "10",
            "--concurrency",
            "4",
            "--dry-run",
            "--counters",
            "sent,acked",
            "--sink",
            "discard",
            "--topic",
            "orders",
        ])
        .unwrap();

        assert_eq!(config.run.rps, 250);
        assert_eq!(config.run.duration_sec, 10);
        assert_eq!(config.run.concurrency, 4);
        assert!(config.run.dry_run);
        assert_eq!(config.run.topic, "orders");
        assert_eq!(config.sink, SinkKind::Discard);
        assert_eq!(
            config.run.enabled_counters.iter().collect::<Vec<_>>(),
            ["acked", "sent"]
        );
    }

    #[test]
    fn broker_opts_are_collected() {
        let config = parse(&[
            "--broker-opt",
            "bootstrap.servers=localhost:9092",
            "--broker-opt",
            "acks = all",
        ])
        .unwrap();

        assert_eq!(
            config.broker_options.get("bootstrap.servers").map(String::as_str),
            Some("localhost:9092")
        );
        assert_eq!(config.broker_options.get("acks").map(String::as_str), Some("all"));
    }

    #[test]
    fn malformed_broker_opt_is_rejected() {
        assert!(parse(&["--broker-opt", "no-equals-sign"]).is_err());
        assert!(parse(&["--broker-opt", "=value"]).is_err());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let err = parse(&["--rps", "0"]).unwrap_err();
        assert!(err.to_string().contains("rps must be > 0"), "{err}");
    }
}
