use crate::app_config::AppConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use workstudy::{ChangeHub, Portal, Store};

pub struct AppEnv {
    pub portal: Portal,
    pub hourly_rate: f64,
}

impl AppEnv {
    pub fn new(app_config: &AppConfig) -> Result<Self> {
        let store = {
            let adapter = app_config.storage.adapter()?;
            Arc::new(Store::open(adapter, ChangeHub::new()))
        };
        info!(
            backend = ?app_config.storage.backend,
            data_dir = %app_config.storage.data_dir.display(),
            "Opened portal store"
        );
        Ok(Self {
            portal: Portal::new(store),
            hourly_rate: app_config.hourly_rate,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        self.portal.store()
    }
}
