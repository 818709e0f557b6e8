use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use ec2_tag_propagator::aws::AwsGateway;
use ec2_tag_propagator::config::{Command, Config};
use ec2_tag_propagator::{event, logging, sweep};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args();
    logging::init(&config.log_format, &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT"),
        build_date = env!("BUILD_DATE"),
        "EC2 Tag Propagator starting"
    );

    let gateway = match AwsGateway::new(config.region.as_deref(), &config.metric_namespace).await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "Failed to initialize AWS gateway");
            std::process::exit(1);
        }
    };

    config.display(gateway.region());

    match &config.command {
        Command::Sweep => {
            let summary = match sweep::run(&gateway, &config.propagate_tag_keys, config.dry_run)
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    error!(error = %e, "Sweep failed");
                    return Err(e);
                }
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Event { payload } => {
            let raw = read_payload(payload.as_deref())?;
            let outcome = event::handle_event(
                &gateway,
                &config.required_tag_keys,
                &config.derivation_rule(),
                config.dry_run,
                &raw,
            )
            .await;

            match outcome {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                Err(e) => {
                    error!(error = %e, "Event handling failed");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}

fn read_payload(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trigger payload from {}", path.display())),
        None => {
            info!("Reading trigger payload from stdin");
            std::io::read_to_string(std::io::stdin())
                .context("Failed to read trigger payload from stdin")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"detail": {{"instance-id": "i-1"}}}}"#).expect("write payload");

        let raw = read_payload(Some(file.path())).unwrap();

        assert!(raw.contains("instance-id"));
    }

    #[test]
    fn test_read_payload_missing_file_fails_with_path_context() {
        let err = read_payload(Some(Path::new("/nonexistent/trigger.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/trigger.json"));
    }
}
