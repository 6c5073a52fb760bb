//! Message catalogs for permission display names.
//!
//! English is the source language. Extra catalogs are JSON objects mapping
//! message ids to translations, stored as `<dir>/<language>.json` under any
//! of the configured locale paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const SOURCE_LANGUAGE: &str = "en";

/// Display name of every view permission; `%(view_name)s` is substituted.
pub const PERMISSION_NAME_MSGID: &str = "Can access view %(view_name)s";

#[derive(Debug, thiserror::Error)]
pub enum I18nError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_json(path: &Path) -> Result<Self, I18nError> {
        let raw = std::fs::read_to_string(path).map_err(|source| I18nError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let messages = serde_json::from_str(&raw).map_err(|source| I18nError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { messages })
    }

    pub fn get(&self, msgid: &str) -> Option<&str> {
        self.messages.get(msgid).map(String::as_str)
    }

    pub fn insert(&mut self, msgid: impl Into<String>, msgstr: impl Into<String>) {
        self.messages.insert(msgid.into(), msgstr.into());
    }

    fn merge(&mut self, other: Catalog) {
        self.messages.extend(other.messages);
    }
}

fn builtin_catalogs() -> HashMap<String, Catalog> {
    let entries = [
        ("de", "Kann Ansicht %(view_name)s aufrufen"),
        ("es", "Puede acceder a la vista %(view_name)s"),
        ("fr", "Peut accéder à la vue %(view_name)s"),
        ("fa", "می‌تواند به نمای %(view_name)s دسترسی داشته باشد"),
    ];

    entries
        .into_iter()
        .map(|(language, msgstr)| {
            let mut catalog = Catalog::new();
            catalog.insert(PERMISSION_NAME_MSGID, msgstr);
            (language.to_string(), catalog)
        })
        .collect()
}

/// `en_US` and `EN-us` both become `en-us`.
pub fn normalize_language(code: &str) -> String {
    code.trim().replace('_', "-").to_lowercase()
}

/// Owns the catalogs and the language activated for the current run.
#[derive(Debug, Clone)]
pub struct Translator {
    default_language: String,
    active: String,
    catalogs: HashMap<String, Catalog>,
}

impl Translator {
    pub fn new(default_language: &str) -> Self {
        let default_language = normalize_language(default_language);
        Self {
            active: default_language.clone(),
            default_language,
            catalogs: builtin_catalogs(),
        }
    }

    /// Like [`Translator::new`], plus every `<language>.json` found in `locale_paths`.
    /// Missing directories are skipped.
    pub fn with_locale_paths(default_language: &str, locale_paths: &[PathBuf]) -> Result<Self, I18nError> {
        let mut translator = Self::new(default_language);

        for dir in locale_paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "skipping locale path");
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();

            for file in files {
                let Some(language) = file.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                let language = language.to_string();
                translator.add_catalog(&language, Catalog::load_json(&file)?);
                tracing::debug!(language = %language, path = %file.display(), "catalog loaded");
            }
        }

        Ok(translator)
    }

    pub fn add_catalog(&mut self, language: &str, catalog: Catalog) {
        self.catalogs
            .entry(normalize_language(language))
            .or_default()
            .merge(catalog);
    }

    pub fn supports(&self, language: &str) -> bool {
        self.catalog_key(&normalize_language(language)).is_some()
    }

    /// Activates `language` when a catalog exists for it (or its base
    /// language), else the default language. Returns the active language.
    pub fn activate(&mut self, language: &str) -> &str {
        let requested = normalize_language(language);
        self.active = if self.supports(&requested) {
            requested
        } else {
            tracing::warn!(
                requested = %requested,
                fallback = %self.default_language,
                "no catalog for language, using default"
            );
            self.default_language.clone()
        };
        &self.active
    }

    pub fn language(&self) -> &str {
        &self.active
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn gettext(&self, msgid: &str) -> String {
        self.catalog_key(&self.active)
            .and_then(|key| self.catalogs.get(key))
            .and_then(|catalog| catalog.get(msgid))
            .unwrap_or(msgid)
            .to_string()
    }

    /// Display name for a view permission in the active language.
    pub fn permission_name(&self, view_name: &str) -> String {
        let view_name = self.gettext(view_name);
        interpolate(&self.gettext(PERMISSION_NAME_MSGID), &[("view_name", &view_name)])
    }

    fn catalog_key<'a>(&'a self, language: &'a str) -> Option<&'a str> {
        if self.catalogs.contains_key(language) {
            return Some(language);
        }
        let base = language.split('-').next().unwrap_or(language);
        if self.catalogs.contains_key(base) {
            return Some(base);
        }
        // the source language needs no catalog
        (base == SOURCE_LANGUAGE).then_some(language)
    }
}

/// Replaces `%(key)s` placeholders.
pub fn interpolate(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("%({key})s"), value)
    })
}
