use anyhow::Context;
use ember_kernel::Settings;

fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load Ember settings")?;
    ember_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = settings.environment.as_str(),
        project_id = %settings.firebase.project_id,
        sdk_version = ember_platform::SDK_VERSION,
        "ember-app bootstrap starting"
    );

    let ctx = ember_app::bootstrap(settings)?;

    if let Some(analytics) = ctx.analytics() {
        analytics
            .flush()
            .with_context(|| "failed to flush analytics on shutdown")?;
    }

    tracing::info!(
        app = %ctx.app().name(),
        app_instance = %ctx.app().id(),
        analytics = %ctx.analytics_status(),
        "ember-app bootstrap complete"
    );
    Ok(())
}
