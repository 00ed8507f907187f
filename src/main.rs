//! clapi CLI entrypoint
//! Loads a service description and serves its operations over HTTP.
#![deny(unsafe_code)]

// Internal imports (std, crate)
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clapi::application::SpecLoader;
use clapi::infrastructure::{FileSpecLoader, ShellCommandExecutor, build_security_checks, http};
use clapi::{Gateway, ServiceSpec};

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clapi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Serve the operations of a service description over HTTP
    Serve {
        /// Path to the OpenAPI 3.0 or Swagger 2.0 document (YAML or JSON)
        #[arg(long, env = "SPEC")]
        spec: PathBuf,
        /// Address to bind
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: IpAddr,
        /// Port to bind; defaults to the port declared by the document
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// Seconds after which a running command is killed
        #[arg(long, env = "CLAPI_TIMEOUT_SECS", default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Load and validate a service description
    Validate {
        /// Path to the OpenAPI 3.0 or Swagger 2.0 document (YAML or JSON)
        #[arg(long, env = "SPEC")]
        spec: PathBuf,
    },
    /// List the operations of a service description
    Routes {
        /// Path to the OpenAPI 3.0 or Swagger 2.0 document (YAML or JSON)
        #[arg(long, env = "SPEC")]
        spec: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            spec,
            host,
            port,
            timeout_secs,
        } => {
            let spec = load_spec(&spec).await?;
            let port = port.unwrap_or_else(|| spec.port());
            if spec.uses_https() {
                info!("x-ssl is configured; terminate TLS in front of this server");
            }
            let checks =
                build_security_checks(&spec).context("Failed to set up security checks")?;
            let executor = ShellCommandExecutor::new().with_timeout(Duration::from_secs(timeout_secs));
            let gateway = Gateway::new(Arc::new(spec), Arc::new(executor), checks)
                .context("Failed to set up gateway")?;

            http::serve(Arc::new(gateway), SocketAddr::new(host, port))
                .await
                .context("HTTP server failed")?;
        }
        Commands::Validate { spec } => {
            let loaded = load_spec(&spec).await?;
            build_security_checks(&loaded).context("Failed to set up security checks")?;
            println!(
                "{} is valid: {} operations",
                spec.display(),
                loaded.operations().len()
            );
        }
        Commands::Routes { spec } => {
            let loaded = load_spec(&spec).await?;
            let base_path = loaded.base_path();
            for operation in loaded.operations() {
                println!(
                    "{:<8} {base_path}{}",
                    operation.method.as_str().to_ascii_uppercase(),
                    operation.path
                );
            }
        }
    }

    Ok(())
}

async fn load_spec(path: &std::path::Path) -> anyhow::Result<ServiceSpec> {
    let source = path
        .to_str()
        .with_context(|| format!("Spec path is not valid UTF-8: {}", path.display()))?;
    let spec = FileSpecLoader::new()
        .load(source)
        .await
        .with_context(|| format!("Failed to load service description {source}"))?;
    info!(
        "Loaded {} with {} operations",
        spec.title().unwrap_or(source),
        spec.operations().len()
    );
    Ok(spec)
}
