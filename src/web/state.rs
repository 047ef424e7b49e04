use crate::services::upload::{MediaStore, UploadPolicy};
use crate::Config;
use anyhow::Result;
use std::collections::HashMap;
use tera::{Tera, Value};

pub struct AppState {
    pub config: Config,
    pub templates: Tera,
    pub store: MediaStore,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let policy = UploadPolicy::new(config.media.max_upload_bytes()?);
        let store = MediaStore::new(config.media.upload_dir.clone(), policy);
        Self::with_store(config, store)
    }

    /// Builds state around an existing store, e.g. one with a fixed clock.
    pub fn with_store(config: Config, store: MediaStore) -> Result<Self> {
        Ok(Self {
            config,
            templates: load_templates()?,
            store,
        })
    }
}

pub fn load_templates() -> Result<Tera> {
    let mut templates = Tera::default();

    templates.register_filter("format_date", format_date_filter);
    templates.add_raw_templates(vec![(
        "index.html",
        include_str!("../../templates/index.html"),
    )])?;

    Ok(templates)
}

fn format_date_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let date_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format_date requires a string"))?;

    let format = args
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("%Y-%m-%d %H:%M");

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date_str) {
        return Ok(Value::String(dt.format(format).to_string()));
    }

    Ok(Value::String(date_str.to_string()))
}
