pub mod error;
pub mod occupancy;
pub mod request;
pub mod service;
pub mod settings;

pub use error::{DecoderError, ErrorClass, GenerationError, RequestError, ResultError, SettingsError};
pub use occupancy::{OccupancyResult, ShapeDecoder, ShapeModel};
pub use request::OccupancyRequest;
pub use service::{ModelStatus, OccupancyService};
pub use settings::ServiceSettings;
