use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use ember_app::{AnalyticsStatus, AppContext, Bootstrap};
use ember_kernel::Settings;
use ember_platform::MemoryDispatcher;
use serde_json::{Map, Value};

#[derive(Parser, Debug)]
#[command(name = "ember-cli", version, about = "Inspect and exercise the Ember client bootstrap")]
struct Cli {
    /// Environment overlay to load (local, staging, production).
    #[arg(long, global = true)]
    env: Option<String>,

    /// Directory holding base.toml and the environment overlays.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration.
    Check,
    /// Initialize the app and analytics and report their state.
    Init {
        /// Keep analytics traffic in memory.
        #[arg(long)]
        dry_run: bool,
    },
    /// Log one analytics event and flush it.
    Event {
        name: String,
        /// Event parameter as key=value; values that parse as JSON keep their type.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_with(cli.config_dir, cli.env)
        .with_context(|| "failed to load Ember settings")?;
    ember_telemetry::init(&settings.telemetry).ok();

    tracing::debug!(
        env = settings.environment.as_str(),
        command = ?cli.command,
        "ember-cli starting"
    );

    match cli.command {
        Command::Check => check(&settings),
        Command::Init { dry_run } => {
            let (ctx, _) = bootstrap(settings, dry_run)?;
            report(&ctx);
            Ok(())
        }
        Command::Event {
            name,
            params,
            dry_run,
        } => event(settings, &name, params, dry_run),
    }
}

fn check(settings: &Settings) -> anyhow::Result<()> {
    let firebase = &settings.firebase;
    let transport = if settings.analytics.api_secret().is_some() {
        "measurement-protocol"
    } else {
        "none"
    };

    println!("configuration ok");
    println!("  environment:         {}", settings.environment.as_str());
    println!("  app:                 {}", settings.app.name);
    println!("  project_id:          {}", firebase.project_id);
    println!("  auth_domain:         {}", firebase.auth_domain);
    println!("  storage_bucket:      {}", firebase.storage_bucket);
    println!("  messaging_sender_id: {}", firebase.messaging_sender_id);
    println!("  app_id:              {}", firebase.app_id);
    println!(
        "  measurement_id:      {}",
        firebase.measurement_id().unwrap_or("(none)")
    );
    println!("  api_key:             {}", firebase.redacted_api_key());
    println!(
        "  analytics:           enabled={} required={} transport={}",
        settings.analytics.enabled, settings.analytics.required, transport
    );
    Ok(())
}

fn bootstrap(
    settings: Settings,
    dry_run: bool,
) -> anyhow::Result<(AppContext, Option<Arc<MemoryDispatcher>>)> {
    if dry_run {
        let dispatcher = Arc::new(MemoryDispatcher::new());
        let ctx = Bootstrap::new()
            .dispatcher(dispatcher.clone())
            .run(settings)?;
        Ok((ctx, Some(dispatcher)))
    } else {
        Ok((Bootstrap::new().run(settings)?, None))
    }
}

fn report(ctx: &AppContext) {
    let app = ctx.app();
    println!("app:         {} (instance {})", app.name(), app.id());
    println!("project_id:  {}", app.options().project_id);
    println!("sdk_version: {}", ember_platform::SDK_VERSION);
    println!("analytics:   {}", ctx.analytics_status());
}

fn event(
    settings: Settings,
    name: &str,
    params: Vec<(String, Value)>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let (ctx, recorded) = bootstrap(settings, dry_run)?;
    let analytics = match ctx.analytics_status() {
        AnalyticsStatus::Enabled(analytics) => analytics,
        AnalyticsStatus::Unavailable { reason } => bail!("cannot log event: {reason}"),
    };

    let params: Map<String, Value> = params.into_iter().collect();
    analytics
        .log_event(name, params)
        .with_context(|| format!("failed to log event '{name}'"))?;
    let sent = analytics.flush().with_context(|| "failed to flush analytics")?;

    println!("sent {sent} event(s)");
    if let Some(dispatcher) = recorded {
        for batch in dispatcher.batches() {
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
    }
    Ok(())
}

fn parse_param(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        bail!("parameter name must not be empty");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
