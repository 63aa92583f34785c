//! Raw queries against the release service

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use apictl_update::{HttpVersionOracle, NextUpdateReply, Platform, UpdateRequest};
use console::style;
use tokio_util::sync::CancellationToken;

use super::load_config;
use crate::cli::{GetCommands, NextUpdateArgs};
use crate::output;

pub async fn run(command: GetCommands, api_url: Option<&str>, cancel: &CancellationToken) -> Result<()> {
    match command {
        GetCommands::NextUpdate(args) => next_update(args, api_url, cancel).await,
    }
}

/// Print whatever the service offers, newer or not
async fn next_update(args: NextUpdateArgs, api_url: Option<&str>, cancel: &CancellationToken) -> Result<()> {
    let config = load_config(api_url)?;
    let request = build_request(args, &config.update.project_name, config.update.machine_id)?;
    let oracle = HttpVersionOracle::from_config(&config)?;

    let spinner = output::spinner("Querying release service...");
    let reply = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            spinner.finish_and_clear();
            bail!("Cancelled");
        }
        reply = oracle.query(&request) => reply,
    };
    spinner.finish_and_clear();
    let reply = reply.with_context(|| format!("GetNextUpdate against {} failed", oracle.api_url()))?;

    write_reply(&reply, &request, &mut io::stdout().lock(), &mut io::stderr().lock())
}

/// Version JSON on `out`, one document per line; everything else on `log`
fn write_reply(
    reply: &NextUpdateReply,
    request: &UpdateRequest,
    out: &mut impl Write,
    log: &mut impl Write,
) -> Result<()> {
    if reply.machine_id != request.machine_id {
        writeln!(log, "a machine id was assigned: {}", reply.machine_id)?;
    }

    let Some(descriptor) = &reply.descriptor else {
        writeln!(
            log,
            "no update offered for {} {} on {}",
            request.project_name, request.current_version, request.platform
        )?;
        return Ok(());
    };

    serde_json::to_writer(&mut *out, &descriptor.next_version)?;
    writeln!(out)?;

    writeln!(log, "version {} is available here:", style(&descriptor.next_version).bold().for_stderr())?;
    writeln!(log, "- url: {}", descriptor.artifact_url)?;
    writeln!(log, "- sha256: {}", descriptor.sha256)?;
    writeln!(log, "- sig: {}", descriptor.signature.as_deref().unwrap_or(""))?;
    Ok(())
}

fn build_request(args: NextUpdateArgs, default_project: &str, default_machine_id: i64) -> Result<UpdateRequest> {
    let host = Platform::current();
    Ok(UpdateRequest {
        project_name: args.project.unwrap_or_else(|| default_project.to_string()),
        current_version: args.current.to_version()?,
        platform: Platform::new(
            args.arch.unwrap_or(host.architecture),
            args.os.unwrap_or(host.operating_system),
        ),
        machine_id: args.machine_id.unwrap_or(default_machine_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::VersionFields;
    use apictl_update::{UpdateDescriptor, Version};

    fn request() -> UpdateRequest {
        UpdateRequest {
            project_name: "apictl".into(),
            current_version: Version::new(0, 9, 0),
            platform: Platform::new("amd64", "linux"),
            machine_id: -1,
        }
    }

    fn offered() -> UpdateDescriptor {
        UpdateDescriptor {
            next_version: Version::parse("0.10.0-rc.1").unwrap(),
            artifact_url: "https://dl.example.com/apictl-linux-amd64".into(),
            sha256: "ab".repeat(32),
            signature: Some("c2ln".into()),
            platform: Platform::new("amd64", "linux"),
        }
    }

    #[test]
    fn test_reply_stdout_is_only_version_json() {
        let reply = NextUpdateReply {
            descriptor: Some(offered()),
            machine_id: 77,
        };
        let (mut out, mut log) = (Vec::new(), Vec::new());

        write_reply(&reply, &request(), &mut out, &mut log).unwrap();

        let version: Version = serde_json::from_slice(&out).unwrap();
        assert_eq!(version, offered().next_version);
        assert_eq!(out.iter().filter(|b| **b == b'\n').count(), 1);

        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("a machine id was assigned: 77"));
        assert!(log.contains("- url: https://dl.example.com/apictl-linux-amd64"));
        assert!(log.contains(&format!("- sha256: {}", "ab".repeat(32))));
        assert!(log.contains("- sig: c2ln"));
    }

    #[test]
    fn test_no_offer_writes_nothing_to_stdout() {
        let reply = NextUpdateReply {
            descriptor: None,
            machine_id: -1,
        };
        let (mut out, mut log) = (Vec::new(), Vec::new());

        write_reply(&reply, &request(), &mut out, &mut log).unwrap();

        assert!(out.is_empty());
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("no update offered"));
        assert!(!log.contains("machine id"));
    }

    #[test]
    fn test_build_request_uses_flags() {
        let args = NextUpdateArgs {
            project: Some("humanlog".into()),
            arch: Some("arm64".into()),
            os: Some("darwin".into()),
            current: VersionFields {
                semver: Some("0.7.1".into()),
                ..VersionFields::default()
            },
            machine_id: Some(42),
        };
        let request = build_request(args, "apictl", -1).unwrap();
        assert_eq!(request.project_name, "humanlog");
        assert_eq!(request.platform, Platform::new("arm64", "darwin"));
        assert_eq!(request.current_version, Version::new(0, 7, 1));
        assert_eq!(request.machine_id, 42);
    }

    #[test]
    fn test_build_request_defaults() {
        let args = NextUpdateArgs {
            project: None,
            arch: None,
            os: None,
            current: VersionFields::default(),
            machine_id: None,
        };
        let request = build_request(args, "apictl", -1).unwrap();
        assert_eq!(request.project_name, "apictl");
        assert_eq!(request.platform, Platform::current());
        assert_eq!(request.current_version, Version::new(0, 0, 0));
        assert_eq!(request.machine_id, -1);
    }
}
