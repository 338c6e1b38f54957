use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ember_kernel::{AppSettings, FirebaseSettings};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::analytics::Analytics;
use crate::error::AppError;
use crate::lock;

static GLOBAL_REGISTRY: Lazy<AppRegistry> = Lazy::new(AppRegistry::new);

/// Handle to an initialized app.
///
/// Clones share one instance; equality is identity, so two handles compare
/// equal only when they come from the same initialization.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

struct AppInner {
    name: String,
    id: Uuid,
    options: FirebaseSettings,
    settings: AppSettings,
    deleted: AtomicBool,
    analytics: Mutex<Option<Analytics>>,
}

impl App {
    fn new(options: FirebaseSettings, settings: AppSettings) -> Self {
        Self {
            inner: Arc::new(AppInner {
                name: settings.name.clone(),
                id: Uuid::now_v7(),
                options,
                settings,
                deleted: AtomicBool::new(false),
                analytics: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Identifier minted when this handle was created.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn options(&self) -> &FirebaseSettings {
        &self.inner.options
    }

    pub fn settings(&self) -> &AppSettings {
        &self.inner.settings
    }

    pub fn automatic_data_collection_enabled(&self) -> bool {
        self.inner.settings.automatic_data_collection_enabled
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::SeqCst)
    }

    pub(crate) fn analytics_slot(&self) -> &Mutex<Option<Analytics>> {
        &self.inner.analytics
    }

    fn mark_deleted(&self) {
        self.inner.deleted.store(true, Ordering::SeqCst);
        // Dropping the component breaks the app <-> analytics reference cycle.
        lock(&self.inner.analytics).take();
    }
}

impl PartialEq for App {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for App {}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("project_id", &self.inner.options.project_id)
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

/// Named apps known to this process.
///
/// [`AppRegistry::global`] is the process-wide instance used by the free
/// functions; separate registries are useful where isolation matters.
pub struct AppRegistry {
    apps: Mutex<HashMap<String, App>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self {
            apps: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static AppRegistry {
        &GLOBAL_REGISTRY
    }

    /// Create the app named by `settings.name`.
    ///
    /// Re-initializing a live name with identical options and settings hands
    /// back the existing handle. Anything else for that name is a
    /// [`AppError::DuplicateApp`].
    pub fn initialize_app(
        &self,
        options: FirebaseSettings,
        settings: AppSettings,
    ) -> Result<App, AppError> {
        if settings.name.trim().is_empty() {
            return Err(AppError::InvalidAppName);
        }
        options.validate()?;

        let mut apps = lock(&self.apps);
        if let Some(existing) = apps.get(&settings.name) {
            if existing.options() == &options && existing.settings() == &settings {
                tracing::debug!(app = %settings.name, "app already initialized, reusing handle");
                return Ok(existing.clone());
            }
            return Err(AppError::DuplicateApp {
                name: settings.name,
            });
        }

        let app = App::new(options, settings);
        tracing::info!(
            app = %app.name(),
            app_instance = %app.id(),
            project_id = %app.options().project_id,
            "app initialized"
        );
        apps.insert(app.name().to_string(), app.clone());
        Ok(app)
    }

    pub fn get_app(&self, name: &str) -> Result<App, AppError> {
        lock(&self.apps)
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NoApp {
                name: name.to_string(),
            })
    }

    /// Live apps ordered by name.
    pub fn apps(&self) -> Vec<App> {
        let mut apps: Vec<App> = lock(&self.apps).values().cloned().collect();
        apps.sort_by(|a, b| a.name().cmp(b.name()));
        apps
    }

    /// Mark `app` deleted and free its name for a fresh initialization.
    pub fn delete_app(&self, app: &App) -> Result<(), AppError> {
        if app.is_deleted() {
            return Err(AppError::AppDeleted {
                name: app.name().to_string(),
            });
        }

        let mut apps = lock(&self.apps);
        if apps.get(app.name()) == Some(app) {
            apps.remove(app.name());
        }
        drop(apps);

        app.mark_deleted();
        tracing::info!(app = %app.name(), "app deleted");
        Ok(())
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn initialize_app(options: FirebaseSettings, settings: AppSettings) -> Result<App, AppError> {
    AppRegistry::global().initialize_app(options, settings)
}

pub fn get_app(name: &str) -> Result<App, AppError> {
    AppRegistry::global().get_app(name)
}

pub fn get_apps() -> Vec<App> {
    AppRegistry::global().apps()
}

pub fn delete_app(app: &App) -> Result<(), AppError> {
    AppRegistry::global().delete_app(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::options;
    use ember_kernel::{ConfigError, DEFAULT_APP_NAME};

    #[test]
    fn initialize_registers_default_app() {
        let registry = AppRegistry::new();
        let app = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();

        assert_eq!(app.name(), DEFAULT_APP_NAME);
        assert_eq!(app.options().project_id, "lockers-test");
        assert!(app.automatic_data_collection_enabled());
        assert_eq!(registry.apps(), vec![app]);
    }

    #[test]
    fn lookups_return_the_same_instance() {
        let registry = AppRegistry::new();
        let app = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();

        let first = registry.get_app(DEFAULT_APP_NAME).unwrap();
        let second = registry.get_app(DEFAULT_APP_NAME).unwrap();
        assert_eq!(first, app);
        assert_eq!(first, second);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn identical_reinitialization_is_idempotent() {
        let registry = AppRegistry::new();
        let first = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();
        let second = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.apps().len(), 1);
    }

    #[test]
    fn conflicting_reinitialization_is_a_duplicate() {
        let registry = AppRegistry::new();
        registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();

        let mut other = options();
        other.storage_bucket = "other-bucket".to_string();
        let err = registry
            .initialize_app(other, AppSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            AppError::DuplicateApp {
                name: DEFAULT_APP_NAME.to_string()
            }
        );

        let settings = AppSettings {
            automatic_data_collection_enabled: false,
            ..AppSettings::default()
        };
        assert!(matches!(
            registry.initialize_app(options(), settings),
            Err(AppError::DuplicateApp { .. })
        ));
    }

    #[test]
    fn named_apps_coexist() {
        let registry = AppRegistry::new();
        let default = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();
        let secondary = registry
            .initialize_app(options(), AppSettings::named("secondary"))
            .unwrap();

        assert_ne!(default, secondary);
        let names: Vec<String> = registry
            .apps()
            .iter()
            .map(|app| app.name().to_string())
            .collect();
        assert_eq!(names, vec![DEFAULT_APP_NAME, "secondary"]);
    }

    #[test]
    fn invalid_options_are_rejected_before_registration() {
        let registry = AppRegistry::new();
        let mut bad = options();
        bad.project_id.clear();

        let err = registry
            .initialize_app(bad, AppSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidOptions(ConfigError::MissingField {
                field: "project_id"
            })
        );
        assert!(registry.apps().is_empty());
    }

    #[test]
    fn blank_name_is_rejected() {
        let registry = AppRegistry::new();
        let err = registry
            .initialize_app(options(), AppSettings::named("  "))
            .unwrap_err();
        assert_eq!(err, AppError::InvalidAppName);
    }

    #[test]
    fn missing_app_lookup_fails() {
        let registry = AppRegistry::new();
        assert_eq!(
            registry.get_app("nope").unwrap_err(),
            AppError::NoApp {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn delete_frees_the_name() {
        let registry = AppRegistry::new();
        let app = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();

        registry.delete_app(&app).unwrap();
        assert!(app.is_deleted());
        assert!(registry.apps().is_empty());
        assert!(matches!(
            registry.delete_app(&app),
            Err(AppError::AppDeleted { .. })
        ));

        let fresh = registry
            .initialize_app(options(), AppSettings::default())
            .unwrap();
        assert_ne!(fresh, app);
        assert!(!fresh.is_deleted());
    }

    #[test]
    fn global_registry_is_shared() {
        let name = "global-registry-test";
        let app = initialize_app(options(), AppSettings::named(name)).unwrap();
        assert_eq!(get_app(name).unwrap(), app);
        assert!(get_apps().contains(&app));
        delete_app(&app).unwrap();
        assert!(get_app(name).is_err());
    }
}
