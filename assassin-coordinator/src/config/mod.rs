//! Configuration loading and validation.

mod settings;

pub use settings::{
    ApiSettings, ContractSettings, DatabaseSettings, GameSettings, LoggingSettings, RpcSettings,
    Settings,
};
