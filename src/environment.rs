use std::sync::Arc;

use log::Logger;

use crate::db::Db;
use crate::urls::Urls;

/// Everything a route handler needs.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub urls: Arc<Urls>,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db + Send + Sync>,
        urls: Arc<Urls>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            urls,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub(crate) page_size: u32,
}

impl Config {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    pub fn new(page_size: u32) -> Self {
        Self { page_size }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(Config::DEFAULT_PAGE_SIZE)
    }
}
