//! Version commands: check, update, and JSON conversion

use std::io::Read;

use anyhow::{Context, Result};
use apictl_core::RuntimeConfig;
use apictl_update::{
    HttpVersionOracle, Platform, UpdateCoordinator, UpdateError, UpdateOutcome, Version, VERSION,
};
use dialoguer::Confirm;
use tokio_util::sync::CancellationToken;

use super::load_config;
use crate::cli::{VersionCheckArgs, VersionCommands, VersionFields, VersionUpdateArgs};
use crate::output;

pub async fn run(
    command: VersionCommands,
    api_url: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        VersionCommands::Check(args) => check(args, api_url, cancel).await,
        VersionCommands::Update(args) => update(args, api_url, cancel).await,
        VersionCommands::ToJson(fields) => to_json(&fields),
        VersionCommands::FromJson => {
            let version = read_version(std::io::stdin().lock())?;
            println!("{}", version);
            Ok(())
        }
    }
}

fn current_version() -> Result<Version> {
    Version::parse(VERSION).with_context(|| format!("Build version {} is not valid semver", VERSION))
}

fn coordinator(config: &RuntimeConfig) -> Result<UpdateCoordinator> {
    let oracle = HttpVersionOracle::from_config(config)?;
    Ok(UpdateCoordinator::from_config(oracle, config)?)
}

async fn check(args: VersionCheckArgs, api_url: Option<&str>, cancel: &CancellationToken) -> Result<()> {
    let mut config = load_config(api_url)?;
    if let Some(id) = args.machine_id {
        config.update.machine_id = id;
    }

    let current = current_version()?;
    let coordinator = coordinator(&config)?;

    let spinner = output::spinner("Checking for updates...");
    let offered = coordinator
        .check(&config.update.project_name, &current, &Platform::current(), cancel)
        .await;
    spinner.finish_and_clear();

    match offered.context("Update check failed")? {
        Some(descriptor) => {
            output::info(&format!("You are running {}", current));
            output::success(&format!(
                "A newer version is available: {}",
                descriptor.next_version
            ));
            output::descriptor(&descriptor);
            output::info("Run 'apictl version update' to install it");
        }
        None => output::success(&format!("Already running the latest version ({})", current)),
    }

    Ok(())
}

async fn update(args: VersionUpdateArgs, api_url: Option<&str>, cancel: &CancellationToken) -> Result<()> {
    let mut config = load_config(api_url)?;
    if let Some(id) = args.machine_id {
        config.update.machine_id = id;
    }
    if args.keep_backup {
        config.update.keep_backup = true;
    }
    if args.no_verify_swap {
        config.update.verify_swap = false;
    }

    let current = current_version()?;
    let coordinator = coordinator(&config)?;

    let spinner = output::spinner("Checking for updates...");
    let offered = coordinator
        .check(&config.update.project_name, &current, &Platform::current(), cancel)
        .await;
    spinner.finish_and_clear();

    let Some(descriptor) = offered.context("Update check failed")? else {
        output::success(&format!("Already running the latest version ({})", current));
        return Ok(());
    };

    output::header(&format!("Update {} -> {}", current, descriptor.next_version));
    output::descriptor(&descriptor);
    println!();

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Install apictl {}?", descriptor.next_version))
            .default(true)
            .interact()?;
        if !confirmed {
            output::info("Update cancelled");
            return Ok(());
        }
    }

    match coordinator.apply(&current, &descriptor, cancel).await {
        Ok(UpdateOutcome::Updated { to, backup, .. }) => {
            output::success(&format!("Updated apictl to {}", to));
            if let Some(backup) = backup {
                output::kv("Previous binary", &backup.display().to_string());
            }
            Ok(())
        }
        Ok(UpdateOutcome::UpToDate { current }) => {
            output::success(&format!("Already running the latest version ({})", current));
            Ok(())
        }
        Err(err) => Err(report_failure(err)),
    }
}

/// Tell the operator what state the binary is in, then hand the error up
fn report_failure(err: UpdateError) -> anyhow::Error {
    match &err {
        UpdateError::Fatal { target, backup, .. } => {
            output::error("UPDATE FAILED AND THE PREVIOUS BINARY COULD NOT BE RESTORED");
            output::error(&format!("Your previous apictl is saved at {}", backup.display()));
            output::error(&format!(
                "Restore it by hand: mv '{}' '{}'",
                backup.display(),
                target.display()
            ));
        }
        UpdateError::SwapFailed { .. } => {
            output::warning("The new binary could not be installed; the previous one was restored");
        }
        UpdateError::Cancelled => {
            output::warning("Update cancelled; the installed binary was not changed");
        }
        _ => {}
    }
    anyhow::Error::new(err).context("Update failed")
}

fn to_json(fields: &VersionFields) -> Result<()> {
    let version = fields.to_version()?;
    println!("{}", serde_json::to_string_pretty(&version)?);
    Ok(())
}

fn read_version(reader: impl Read) -> Result<Version> {
    serde_json::from_reader(reader).context("Input is not a valid version JSON document")
}
