use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_PERM_PREFIX: &str = "access_view_";
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Which name the access middleware derives for a resolved view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewNaming {
    /// Bound class for class-based views, else the callable. Same as the synchronizer.
    #[default]
    Class,
    /// Always the callable's own module and name.
    Callable,
}

impl ViewNaming {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "class" => Some(Self::Class),
            "callable" => Some(Self::Callable),
            _ => None,
        }
    }
}

/// `app_label.model` of the model every view permission is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub app_label: String,
    pub model: String,
}

impl ModelRef {
    pub fn parse(value: &str) -> Option<Self> {
        let (app_label, model) = value.trim().split_once('.')?;
        if app_label.is_empty() || model.is_empty() || model.contains('.') {
            return None;
        }
        Some(Self {
            app_label: app_label.to_string(),
            model: model.to_lowercase(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub perm_prefix: String,
    pub ignore_list: BTreeSet<String>,
    pub view_naming: ViewNaming,
    pub root_urlconf: Option<PathBuf>,
    pub language_code: String,
    pub locale_paths: Vec<PathBuf>,
    pub user_model: ModelRef,
    pub installed_apps: Option<BTreeSet<String>>,
    pub database_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            perm_prefix: DEFAULT_PERM_PREFIX.to_string(),
            ignore_list: BTreeSet::new(),
            view_naming: ViewNaming::default(),
            root_urlconf: None,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            locale_paths: Vec::new(),
            user_model: ModelRef {
                app_label: "auth".to_string(),
                model: "user".to_string(),
            },
            installed_apps: None,
            database_url: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset and blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(prefix) = get("VIEW_PERMS_PREFIX") {
            settings.perm_prefix = prefix;
        }
        if let Some(list) = get("VIEW_PERMS_IGNORE_LIST") {
            settings.ignore_list = split_list(&list).collect();
        }
        if let Some(naming) = get("VIEW_PERMS_NAMING") {
            settings.view_naming = ViewNaming::parse(&naming).ok_or(ConfigError::Invalid {
                key: "VIEW_PERMS_NAMING",
                expected: "'class' or 'callable'",
                value: naming,
            })?;
        }
        settings.root_urlconf = get("ROOT_URLCONF").map(PathBuf::from);
        if let Some(language) = get("LANGUAGE_CODE") {
            settings.language_code = language.trim().to_string();
        }
        if let Some(paths) = get("LOCALE_PATHS") {
            settings.locale_paths = split_list(&paths).map(PathBuf::from).collect();
        }
        if let Some(model) = get("AUTH_USER_MODEL") {
            settings.user_model = ModelRef::parse(&model).ok_or(ConfigError::Invalid {
                key: "AUTH_USER_MODEL",
                expected: "of the form 'app_label.model'",
                value: model,
            })?;
        }
        settings.installed_apps = get("INSTALLED_APPS").map(|apps| split_list(&apps).collect());
        settings.database_url = get("DATABASE_URL");

        Ok(settings)
    }

    pub fn is_ignored(&self, view_name: &str) -> bool {
        self.ignore_list.contains(view_name)
    }

    pub fn perm_codename(&self, view_name: &str) -> String {
        format!("{}{}", self.perm_prefix, view_name)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.perm_prefix, "access_view_");
        assert_eq!(settings.language_code, "en");
        assert_eq!(settings.view_naming, ViewNaming::Class);
        assert_eq!(settings.user_model.app_label, "auth");
        assert_eq!(settings.user_model.model, "user");
        assert!(settings.ignore_list.is_empty());
        assert!(settings.installed_apps.is_none());
    }

    #[test]
    fn ignore_list_is_comma_separated_and_trimmed() {
        let settings = settings_from(&[(
            "VIEW_PERMS_IGNORE_LIST",
            " blog.views.home , ,accounts.views.LoginView",
        )])
        .unwrap();
        assert!(settings.is_ignored("blog.views.home"));
        assert!(settings.is_ignored("accounts.views.LoginView"));
        assert_eq!(settings.ignore_list.len(), 2);
    }

    #[test]
    fn custom_prefix_feeds_codenames() {
        let settings = settings_from(&[("VIEW_PERMS_PREFIX", "can_open_")]).unwrap();
        assert_eq!(settings.perm_codename("blog.views.post_detail"), "can_open_blog.views.post_detail");
    }

    #[test]
    fn rejects_malformed_user_model_and_naming() {
        let err = settings_from(&[("AUTH_USER_MODEL", "user")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "AUTH_USER_MODEL", .. }));
        assert!(err.to_string().contains("'user'"));
        assert!(settings_from(&[("VIEW_PERMS_NAMING", "both")]).is_err());

        let settings = settings_from(&[("AUTH_USER_MODEL", "accounts.Member")]).unwrap();
        assert_eq!(settings.user_model.model, "member");
    }
}
