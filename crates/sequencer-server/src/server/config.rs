use core::time::Duration;

use anyhow::bail;
use clap::Parser;
use sequencer::validate_node_id;

/// Runtime configuration for the `sequencer-server` binary.
///
/// Every value is read once at startup, from CLI arguments or the matching
/// environment variable, and is fixed for the lifetime of the process.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sequencer-server",
    version,
    about = "An HTTP service handing out Snowflake-style IDs"
)]
pub struct CliArgs {
    /// TCP port to listen on.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Interface address to bind.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Verbose, human-oriented logging. Release mode logs at `info` in a
    /// compact format.
    ///
    /// Environment variable: `DEBUG`
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Use this node ID instead of deriving one from the host's network
    /// interfaces. Must lie in `0..=1023`.
    ///
    /// Environment variable: `NODE_ID`
    #[arg(long, env = "NODE_ID", allow_negative_numbers = true)]
    pub node_id: Option<i64>,

    /// Deadline for a single request, in milliseconds. A request still
    /// waiting when it expires is answered with `408 Request Timeout`.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub debug: bool,
    pub node_id: Option<i64>,
    pub request_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.port == 0 {
            bail!("PORT must be greater than 0");
        }

        if args.request_timeout_ms == 0 {
            bail!("REQUEST_TIMEOUT_MS must be greater than 0");
        }

        if let Some(node_id) = args.node_id {
            validate_node_id(node_id)?;
        }

        Ok(Self {
            server_addr: format!("{}:{}", args.host, args.port),
            debug: args.debug,
            node_id: args.node_id,
            request_timeout: Duration::from_millis(args.request_timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs {
            port: 8000,
            host: "0.0.0.0".into(),
            debug: false,
            node_id: None,
            request_timeout_ms: 5000,
        }
    }

    #[test]
    fn defaults_are_accepted() {
        let config = ServerConfig::try_from(args()).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8000");
        assert!(!config.debug);
        assert_eq!(config.node_id, None);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_port_is_rejected() {
        let err = ServerConfig::try_from(CliArgs { port: 0, ..args() }).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ServerConfig::try_from(CliArgs {
            request_timeout_ms: 0,
            ..args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_MS"));
    }

    #[test]
    fn node_id_must_fit_the_layout() {
        for bad in [-1, 1024] {
            assert!(
                ServerConfig::try_from(CliArgs {
                    node_id: Some(bad),
                    ..args()
                })
                .is_err()
            );
        }
        let config = ServerConfig::try_from(CliArgs {
            node_id: Some(1023),
            ..args()
        })
        .unwrap();
        assert_eq!(config.node_id, Some(1023));
    }

    #[test]
    fn cli_flags_are_parsed() {
        let args = CliArgs::try_parse_from([
            "sequencer-server",
            "--port",
            "9000",
            "--host",
            "127.0.0.1",
            "--debug",
            "--node-id",
            "17",
            "--request-timeout-ms",
            "250",
        ])
        .unwrap();
        let config = ServerConfig::try_from(args).unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:9000");
        assert!(config.debug);
        assert_eq!(config.node_id, Some(17));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
    }
}
