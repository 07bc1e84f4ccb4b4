use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "sso")]
#[command(about = "Suite session bootstrap - recover, inspect and clear suite sessions")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Profile directory holding cookies, device storage and identities
	#[arg(long, global = true, value_name = "DIR")]
	pub profile: Option<PathBuf>,

	/// Suite configuration file (JSON)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Simulate a page load: bootstrap, then the SSO bridge
	Load {
		origin: String,
		/// Override the bootstrap timeout (ms)
		#[arg(long)]
		timeout_ms: Option<u64>,
		/// Skip the SSO bridge for this load
		#[arg(long)]
		no_bridge: bool,
	},

	/// Show session record, device cache and persisted identity
	Status { origin: String },

	/// Show how an origin resolves against the suite topology
	Resolve { origin: String },

	/// Inspect or clear the device session cache
	Cache {
		#[command(subcommand)]
		action: CacheAction,
	},

	/// Sign out locally on an origin
	SignOut { origin: String },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
	/// Show the cached value and its age
	Show { origin: String },
	/// Remove the cached value
	Clear { origin: String },
}

impl Commands {
	/// Dotted name reported in the result envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Load { .. } => "load",
			Commands::Status { .. } => "status",
			Commands::Resolve { .. } => "resolve",
			Commands::Cache {
				action: CacheAction::Show { .. },
			} => "cache.show",
			Commands::Cache {
				action: CacheAction::Clear { .. },
			} => "cache.clear",
			Commands::SignOut { .. } => "sign-out",
		}
	}

	pub fn origin(&self) -> &str {
		match self {
			Commands::Load { origin, .. }
			| Commands::Status { origin }
			| Commands::Resolve { origin }
			| Commands::Cache {
				action: CacheAction::Show { origin } | CacheAction::Clear { origin },
			}
			| Commands::SignOut { origin } => origin,
		}
	}
}
