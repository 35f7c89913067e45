use statekeep_persist::DEFAULT_IDENTITY_KEY;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend row holding the installation identity the payload key is
    /// derived from.
    pub identity_key: String,
    /// Run the observer/expiration sweep after every update pass.
    pub sweep_on_consume: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            sweep_on_consume: true,
        }
    }
}
