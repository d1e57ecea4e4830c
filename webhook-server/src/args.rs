use crate::admission::Admission;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// `LOG_LEVEL` value that turns on verbose request logging.
const DEBUG_LOG_LEVEL: &str = "debug";

#[derive(Debug, Parser)]
#[clap(
    name = "webhook-server",
    about = "A validating admission webhook that rejects pods with an invalid name"
)]
pub struct Args {
    /// Verbosity. `debug` logs every AdmissionReview received; any other
    /// value leaves request bodies out of the logs.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(long, default_value = "0.0.0.0:8443")]
    server_addr: SocketAddr,

    /// PEM-encoded private key.
    #[clap(long, default_value = "/run/secrets/tls/tls.key")]
    server_tls_key: PathBuf,

    /// PEM-encoded certificate chain.
    #[clap(long, default_value = "/run/secrets/tls/tls.crt")]
    server_tls_certs: PathBuf,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            server_addr,
            server_tls_key,
            server_tls_certs,
        } = self;

        let debug_enabled = is_debug(&log_level);
        log_format.try_init(log_filter(debug_enabled)?)?;

        let (shutdown, drain) = kubert::shutdown::sigint_or_sigterm()?;

        // Binding loads the key and certificates, so unreadable TLS assets
        // fail startup before anything is served.
        let bound = server_args(server_addr, &server_tls_key, &server_tls_certs)?
            .bind()
            .await
            .with_context(|| {
                format!(
                    "failed to start server on {server_addr} with key {} and certificates {}",
                    server_tls_key.display(),
                    server_tls_certs.display(),
                )
            })?;
        let addr = bound.local_addr();
        bound.spawn(Admission::new(debug_enabled), drain);
        info!(
            %addr,
            debug = debug_enabled,
            "Starting validating admission webhook server"
        );

        // Block until a shutdown signal arrives and in-flight connections
        // have been drained.
        if shutdown.signaled().await.is_err() {
            bail!("Aborted");
        }
        debug!("Shutdown complete");

        Ok(())
    }
}

fn is_debug(log_level: &str) -> bool {
    log_level == DEBUG_LOG_LEVEL
}

fn log_filter(debug_enabled: bool) -> Result<kubert::LogFilter> {
    let directives = if debug_enabled {
        "webhook_server=debug,info"
    } else {
        "webhook_server=info,warn"
    };
    Ok(directives.parse()?)
}

fn server_args(
    server_addr: SocketAddr,
    tls_key: &Path,
    tls_certs: &Path,
) -> Result<kubert::ServerArgs> {
    Ok(kubert::ServerArgs {
        server_addr,
        server_tls_key: Some(tls_key.display().to_string().parse()?),
        server_tls_certs: Some(tls_certs.display().to_string().parse()?),
    })
}
