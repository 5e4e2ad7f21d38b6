// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Deliver a single event through a single provider.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use notifier_core::Context;
use notifier_providers::{provider_types, Factory};
use tracing::{info, warn};

mod config;
mod logging;

use logging::LogFormat;

/// Notification dispatcher - send events to chat, incident, bus and git hosts.
#[derive(Parser, Debug)]
#[command(name = "notifier", about = "Deliver events through notification providers", version)]
struct Args {
	/// Log output format
	#[arg(long, value_enum, env = "NOTIFIER_LOG_FORMAT", default_value = "text", global = true)]
	log_format: LogFormat,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Post one event through the provider described by a TOML file
	Send {
		/// Provider file (TOML)
		#[arg(long)]
		provider: PathBuf,

		/// Event file (JSON), or `-` for stdin
		#[arg(long)]
		event: PathBuf,

		/// Give up after this many seconds
		#[arg(long)]
		timeout_secs: Option<u64>,
	},
	/// List the provider types this build knows about
	Providers,
}

async fn send(provider: PathBuf, event: PathBuf, timeout_secs: Option<u64>) -> Result<()> {
	let instance = config::load_provider(&provider)?;
	let event = config::load_event(&event)?;
	event.validate().context("invalid event")?;

	let notifier = Factory::from_instance(&instance)
		.notifier(&instance.provider_type)
		.with_context(|| format!("building {} provider '{}'", instance.provider_type, instance.name))?;

	let ctx = match timeout_secs {
		Some(secs) => Context::background().with_timeout(Duration::from_secs(secs)),
		None => Context::background(),
	};

	let interrupt = ctx.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("interrupted, cancelling delivery");
			interrupt.cancel();
		}
	});

	notifier
		.post(&ctx, &event)
		.await
		.with_context(|| format!("{} delivery failed", instance.provider_type))?;

	info!(
		provider = %instance.provider_type,
		object = %event.object_key(),
		"event delivered"
	);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	logging::init(args.log_format);

	match args.command {
		Command::Send {
			provider,
			event,
			timeout_secs,
		} => send(provider, event, timeout_secs).await,
		Command::Providers => {
			for provider_type in provider_types() {
				println!("{provider_type}");
			}
			Ok(())
		}
	}
}
