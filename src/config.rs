//! Command line and environment configuration.

use crate::codec::CompressibleTypes;
use crate::error::{Error, Result};
use crate::pool::EncoderPool;
use clap::Parser;
use flate2::Compression;
use std::net::SocketAddr;

/// Server settings, read from flags or environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "gzip-asset-server")]
#[command(about = "Serve embedded static assets with gzip compression", long_about = None)]
#[command(version)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(short, long, env = "ASSET_SERVER_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ASSET_SERVER_LOG", default_value = "info")]
    pub log_level: String,

    /// Gzip compression level (0-9)
    #[arg(
        long,
        env = "ASSET_SERVER_GZIP_LEVEL",
        default_value_t = 6,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    pub gzip_level: u32,

    /// MIME type prefix eligible for compression; repeat to replace the defaults
    #[arg(long = "compressible-type", value_name = "PREFIX")]
    pub compressible_types: Vec<String>,
}

impl ServerConfig {
    /// Returns the configured compressible types, or the defaults if none were given.
    pub fn compressible_types(&self) -> Result<CompressibleTypes> {
        if self.compressible_types.is_empty() {
            return Ok(CompressibleTypes::default());
        }
        if let Some(bad) = self
            .compressible_types
            .iter()
            .find(|p| p.trim().is_empty() || !p.is_ascii())
        {
            return Err(Error::Config(format!(
                "compressible type {bad:?} must be a non-empty ASCII prefix"
            )));
        }
        Ok(CompressibleTypes::new(
            self.compressible_types.iter().map(|p| p.trim()),
        ))
    }

    /// Builds the encoder pool for the configured gzip level.
    pub fn encoder_pool(&self) -> EncoderPool {
        EncoderPool::new(Compression::new(self.gzip_level))
    }

    /// Parses the configured log level.
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| Error::Config(format!("unknown log level {:?}", self.log_level)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["gzip-asset-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--listen", "0.0.0.0:8080"]);
        assert_eq!(config.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.gzip_level, 6);
        assert_eq!(
            config.compressible_types().unwrap().prefixes().count(),
            crate::codec::DEFAULT_COMPRESSIBLE_TYPES.len()
        );
    }

    #[test]
    fn test_custom_types_replace_defaults() {
        let config = parse(&[
            "--compressible-type",
            "text/",
            "--compressible-type",
            " application/wasm ",
        ]);
        let types = config.compressible_types().unwrap();
        assert_eq!(
            types.prefixes().collect::<Vec<_>>(),
            vec!["text/", "application/wasm"]
        );
        assert!(!types.matches("application/json"));
    }

    #[test]
    fn test_empty_type_rejected() {
        let config = parse(&["--compressible-type", " "]);
        assert!(matches!(config.compressible_types(), Err(Error::Config(_))));
    }

    #[test]
    fn test_gzip_level_range() {
        let argv = ["gzip-asset-server", "--gzip-level", "12"];
        assert!(ServerConfig::try_parse_from(argv).is_err());
        assert_eq!(parse(&["--gzip-level", "9"]).gzip_level, 9);
    }

    #[test]
    fn test_every_setting_has_env_var() {
        let command = ServerConfig::command();
        let env = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|name| name.to_string_lossy().into_owned())
        };
        assert_eq!(env("listen").as_deref(), Some("ASSET_SERVER_LISTEN"));
        assert_eq!(env("log_level").as_deref(), Some("ASSET_SERVER_LOG"));
        assert_eq!(env("gzip_level").as_deref(), Some("ASSET_SERVER_GZIP_LEVEL"));
    }

    #[test]
    fn test_log_level() {
        assert_eq!(
            parse(&["--log-level", "debug"]).log_level().unwrap(),
            tracing::Level::DEBUG
        );
        assert!(parse(&["--log-level", "chatty"]).log_level().is_err());
    }
}
