//! Process configuration: flag/env parsing (`--tag`, human-readable size
//! strings) for the data plane's construction arguments — ticker list,
//! TCP bind address, the two multicast groups, snapshot interval, and CPU
//! core pins (§6's "process interface" is constructor arguments; this is
//! how the two demo executables gather them).

use crate::error::ConfigError;
use crate::number_tool::parse_human_readable_u32;
use crate::types::TickerId;

#[derive(Debug, Clone)]
pub struct McastEndpoint {
    pub interface: String,
    pub group: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub instance_tag: String,
    pub tickers: Vec<TickerId>,
    pub tcp_bind_addr: String,
    pub incremental: McastEndpoint,
    pub snapshot: McastEndpoint,
    pub snapshot_interval_secs: u64,
    pub core_pins: Vec<usize>,
    pub max_orders_per_ticker: u32,
    pub max_levels_per_ticker: u32,
}

impl EngineConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::from_iter(std::env::args().skip(1))
    }

    pub fn from_iter<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ConfigError> {
        let mut instance_tag = None;
        let mut tickers_str = None;
        let mut tcp_bind_addr = None;
        let mut inc_group = None;
        let mut inc_port = None;
        let mut snap_group = None;
        let mut snap_port = None;
        let mut iface = "0.0.0.0".to_string();
        let mut snapshot_interval_secs = 60u64;
        let mut core_pins_str = None;
        let mut max_orders_str = None;
        let mut max_levels_str = None;

        let args: Vec<String> = args.into_iter().collect();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut take_value = |name: &'static str| -> Result<String, ConfigError> {
                args.get(i + 1)
                    .cloned()
                    .ok_or(ConfigError::MissingArgument(name))
            };
            match flag {
                "--tag" => {
                    instance_tag = Some(take_value("--tag")?);
                    i += 1;
                }
                "--tickers" => {
                    tickers_str = Some(take_value("--tickers")?);
                    i += 1;
                }
                "--tcp-bind" => {
                    tcp_bind_addr = Some(take_value("--tcp-bind")?);
                    i += 1;
                }
                "--iface" => {
                    iface = take_value("--iface")?;
                    i += 1;
                }
                "--incremental-group" => {
                    inc_group = Some(take_value("--incremental-group")?);
                    i += 1;
                }
                "--incremental-port" => {
                    inc_port = Some(take_value("--incremental-port")?);
                    i += 1;
                }
                "--snapshot-group" => {
                    snap_group = Some(take_value("--snapshot-group")?);
                    i += 1;
                }
                "--snapshot-port" => {
                    snap_port = Some(take_value("--snapshot-port")?);
                    i += 1;
                }
                "--snapshot-interval-secs" => {
                    let v = take_value("--snapshot-interval-secs")?;
                    snapshot_interval_secs = v.parse().map_err(|_| ConfigError::InvalidValue {
                        flag: "--snapshot-interval-secs",
                        value: v.clone(),
                        reason: "must be an integer number of seconds".to_string(),
                    })?;
                    i += 1;
                }
                "--core-pins" => {
                    core_pins_str = Some(take_value("--core-pins")?);
                    i += 1;
                }
                "--max-orders-per-ticker" => {
                    max_orders_str = Some(take_value("--max-orders-per-ticker")?);
                    i += 1;
                }
                "--max-levels-per-ticker" => {
                    max_levels_str = Some(take_value("--max-levels-per-ticker")?);
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }

        let instance_tag = instance_tag
            .or_else(|| std::env::var("INST_NAME").ok())
            .unwrap_or_else(|| "DEFAULT".to_string());
        if instance_tag.len() > 16 {
            return Err(ConfigError::InvalidValue {
                flag: "--tag",
                value: instance_tag,
                reason: "exceeds maximum length of 16 characters".to_string(),
            });
        }

        let tickers = match tickers_str {
            Some(s) => parse_ticker_list(&s)?,
            None => vec![0],
        };

        let tcp_bind_addr = tcp_bind_addr.unwrap_or_else(|| "0.0.0.0:9001".to_string());

        let incremental = McastEndpoint {
            interface: iface.clone(),
            group: inc_group.unwrap_or_else(|| "239.0.0.1".to_string()),
            port: parse_port(inc_port, 20_000, "--incremental-port")?,
        };
        let snapshot = McastEndpoint {
            interface: iface,
            group: snap_group.unwrap_or_else(|| "239.0.0.2".to_string()),
            port: parse_port(snap_port, 20_001, "--snapshot-port")?,
        };

        let core_pins = match core_pins_str {
            Some(s) => s
                .split(',')
                .filter(|p| !p.is_empty())
                .map(|p| {
                    p.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                        flag: "--core-pins",
                        value: s.clone(),
                        reason: "must be a comma-separated list of core indices".to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let max_orders_per_ticker = parse_size_flag(max_orders_str, "--max-orders-per-ticker", 1 << 16)?;
        let max_levels_per_ticker = parse_size_flag(max_levels_str, "--max-levels-per-ticker", 1024)?;

        Ok(EngineConfig {
            instance_tag,
            tickers,
            tcp_bind_addr,
            incremental,
            snapshot,
            snapshot_interval_secs,
            core_pins,
            max_orders_per_ticker,
            max_levels_per_ticker,
        })
    }
}

fn parse_port(value: Option<String>, default: u16, flag: &'static str) -> Result<u16, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
            flag,
            value: v,
            reason: "must be a valid u16 port".to_string(),
        }),
    }
}

fn parse_size_flag(value: Option<String>, flag: &'static str, default: u32) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => parse_human_readable_u32(&v).map_err(|reason| ConfigError::InvalidValue {
            flag,
            value: v,
            reason: reason.to_string(),
        }),
    }
}

fn parse_ticker_list(s: &str) -> Result<Vec<TickerId>, ConfigError> {
    s.split(',')
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.trim().parse::<TickerId>().map_err(|_| ConfigError::InvalidValue {
                flag: "--tickers",
                value: s.to_string(),
                reason: "must be a comma-separated list of ticker ids".to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_args_given() {
        let config = EngineConfig::from_iter(std::iter::empty()).unwrap();
        assert_eq!(config.tickers, vec![0]);
        assert_eq!(config.snapshot_interval_secs, 60);
    }

    #[test]
    fn parses_ticker_list_and_sizes() {
        let args = vec![
            "--tickers".to_string(),
            "0,1,2".to_string(),
            "--max-orders-per-ticker".to_string(),
            "2M".to_string(),
        ];
        let config = EngineConfig::from_iter(args).unwrap();
        assert_eq!(config.tickers, vec![0, 1, 2]);
        assert_eq!(config.max_orders_per_ticker, 2_000_000);
    }

    #[test]
    fn rejects_tag_over_16_chars() {
        let args = vec!["--tag".to_string(), "this-tag-is-too-long".to_string()];
        assert!(EngineConfig::from_iter(args).is_err());
    }
}
