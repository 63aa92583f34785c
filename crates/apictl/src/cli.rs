//! CLI argument definitions using clap

use apictl_update::{ParseError, Version};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apictl")]
#[command(author, version, about = "Command-line client for the humanlog API", long_about = None)]
pub struct Cli {
    /// Base URL of the API (overrides runtime.yaml)
    #[arg(long, env = "APICTL_API_URL", global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check, install, and convert apictl versions
    #[command(subcommand)]
    Version(VersionCommands),

    /// Query the release service directly
    #[command(subcommand)]
    Get(GetCommands),
}

// Version commands
#[derive(Subcommand, Debug)]
pub enum VersionCommands {
    /// Report whether a newer apictl is available
    Check(VersionCheckArgs),

    /// Download, verify, and install the newest apictl over this binary
    Update(VersionUpdateArgs),

    /// Print a version as JSON
    ToJson(VersionFields),

    /// Read version JSON on stdin and print it as a semver string
    FromJson,
}

#[derive(Args, Debug)]
pub struct VersionCheckArgs {
    /// Machine id to report (-1 asks the service to assign one)
    #[arg(long, allow_negative_numbers = true)]
    pub machine_id: Option<i64>,
}

#[derive(Args, Debug)]
pub struct VersionUpdateArgs {
    /// Machine id to report (-1 asks the service to assign one)
    #[arg(long, allow_negative_numbers = true)]
    pub machine_id: Option<i64>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Keep the previous binary next to the new one
    #[arg(long)]
    pub keep_backup: bool,

    /// Skip re-hashing the installed binary after the swap
    #[arg(long)]
    pub no_verify_swap: bool,
}

/// A version, either as one string or field by field
#[derive(Args, Debug, Clone, Default)]
pub struct VersionFields {
    /// Full version, e.g. v1.2.3-beta.1+build.5
    #[arg(
        long = "version",
        value_name = "SEMVER",
        conflicts_with_all = ["major", "minor", "patch", "pre", "build"]
    )]
    pub semver: Option<String>,

    #[arg(long)]
    pub major: Option<u64>,

    #[arg(long)]
    pub minor: Option<u64>,

    #[arg(long)]
    pub patch: Option<u64>,

    /// Prerelease identifiers; repeatable, each value split on '.'
    #[arg(long, value_name = "IDENTS")]
    pub pre: Vec<String>,

    /// Build metadata
    #[arg(long)]
    pub build: Option<String>,
}

impl VersionFields {
    /// Resolve to a [`Version`]; missing numeric fields are zero
    pub fn to_version(&self) -> Result<Version, ParseError> {
        if let Some(text) = &self.semver {
            return Version::parse(text);
        }

        let version = Version::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        )
        .with_prereleases(self.pre.iter().flat_map(|p| p.split('.')))?;

        match &self.build {
            Some(build) => version.with_build(build.clone()),
            None => Ok(version),
        }
    }
}

// Get commands
#[derive(Subcommand, Debug)]
pub enum GetCommands {
    /// Ask the release service for the update after a given version
    NextUpdate(NextUpdateArgs),
}

#[derive(Args, Debug)]
pub struct NextUpdateArgs {
    /// Project name (defaults to update.project-name)
    #[arg(long)]
    pub project: Option<String>,

    /// Machine architecture, e.g. amd64 (defaults to this machine)
    #[arg(long)]
    pub arch: Option<String>,

    /// Operating system, e.g. linux (defaults to this machine)
    #[arg(long)]
    pub os: Option<String>,

    #[command(flatten)]
    pub current: VersionFields,

    /// Machine id to report (-1 asks the service to assign one)
    #[arg(long, allow_negative_numbers = true)]
    pub machine_id: Option<i64>,
}
