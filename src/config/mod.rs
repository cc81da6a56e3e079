mod settings;
mod validation;

pub use settings::{
    ArangoSettings, ApplicationSettings, DatabaseSettings, IndexerSettings, Settings,
};
pub use validation::validate_settings;
