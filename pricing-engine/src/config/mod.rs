mod settings;

pub use settings::{
    EngineSettings, ProvidersSettings, Settings, TierRefreshMs, TierThresholds,
};
