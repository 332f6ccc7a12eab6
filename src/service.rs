// Model slot and request handling for whichever serving layer hosts the crate.
// The model is installed once (after an external loader finishes) and every
// generation runs on a blocking worker, one at a time per model.

use crate::error::GenerationError;
use crate::occupancy::decoder::ShapeModel;
use crate::occupancy::pipeline::generate_occupancy_field;
use crate::occupancy::result::OccupancyResult;
use crate::request::{truncate_prompt, OccupancyRequest};
use crate::settings::ServiceSettings;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Loading,
    Ready { version: String },
    Failed(String),
}

impl ModelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelStatus::Ready { .. })
    }
}

struct LoadedModel {
    model: ShapeModel,
    /// Held for the whole pipeline run so batches of two requests never
    /// interleave on the same decoder.
    run_lock: Mutex<()>,
}

pub struct OccupancyService {
    settings: ServiceSettings,
    model: OnceCell<Arc<LoadedModel>>,
    load_failure: OnceCell<String>,
    started: Instant,
}

impl OccupancyService {
    /// Service with an empty model slot; requests fail as unavailable until
    /// [`Self::install_model`] is called.
    pub fn new(settings: ServiceSettings) -> Self {
        Self {
            settings,
            model: OnceCell::new(),
            load_failure: OnceCell::new(),
            started: Instant::now(),
        }
    }

    pub fn with_model(settings: ServiceSettings, model: ShapeModel) -> Self {
        let service = Self::new(settings);
        // Slot is empty on a fresh service
        let _ = service.install_model(model);
        service
    }

    /// Puts a loaded model in the slot. The slot can be filled only once; a
    /// second model is handed back.
    pub fn install_model(&self, model: ShapeModel) -> Result<(), ShapeModel> {
        let version = model.version().to_string();
        let loaded = Arc::new(LoadedModel {
            model,
            run_lock: Mutex::new(()),
        });

        self.model
            .set(loaded)
            .map_err(|rejected| match Arc::try_unwrap(rejected) {
                Ok(loaded) => loaded.model,
                Err(shared) => shared.model.clone(),
            })?;

        log::info!("Model {} ready", version);
        Ok(())
    }

    /// Records that the external loader gave up. Only the first reason is kept.
    pub fn mark_load_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("Model failed to load: {}", reason);
        let _ = self.load_failure.set(reason);
    }

    pub fn status(&self) -> ModelStatus {
        if let Some(loaded) = self.model.get() {
            return ModelStatus::Ready {
                version: loaded.model.version().to_string(),
            };
        }
        match self.load_failure.get() {
            Some(reason) => ModelStatus::Failed(reason.clone()),
            None => ModelStatus::Loading,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Handles one generation request.
    ///
    /// Availability is checked before the request is validated, so a service
    /// without a model answers every request as unavailable.
    pub async fn generate(
        &self,
        request: OccupancyRequest,
    ) -> Result<OccupancyResult, GenerationError> {
        let request_id = Uuid::new_v4();

        let loaded = match self.model.get() {
            Some(loaded) => Arc::clone(loaded),
            None => {
                let reason = match self.load_failure.get() {
                    Some(reason) => format!("Model failed to load: {}", reason),
                    None => "Model not loaded yet".to_string(),
                };
                log::warn!("[{}] Rejected: {}", request_id, reason);
                return Err(GenerationError::ModelUnavailable(reason));
            }
        };

        if let Err(err) = request.validate_with_prompt_limit(self.settings.max_prompt_len) {
            log::warn!("[{}] Invalid request: {}", request_id, err);
            return Err(err.into());
        }

        log::info!(
            "[{}] Generating: prompt='{}', resolution={}, seed={:?}",
            request_id,
            truncate_prompt(&request.prompt, 50),
            request.grid_resolution,
            request.seed
        );

        let batch_size = self.settings.batch_size;
        let task = tokio::task::spawn_blocking(move || {
            let _guard = loaded
                .run_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            generate_occupancy_field(&loaded.model, &request, batch_size)
        });

        let joined = match self.settings.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    log::error!("[{}] Timed out after {:?}", request_id, limit);
                    return Err(GenerationError::Timeout(limit));
                }
            },
            None => task.await,
        };

        let outcome = joined.map_err(|e| GenerationError::Worker(e.to_string()))?;

        match &outcome {
            Ok(result) => log::info!(
                "[{}] Done: {} voxels in {:.2}s",
                request_id,
                result.occupied_count(),
                result.metadata.generation_time_secs
            ),
            Err(err) => log::error!("[{}] {}", request_id, err),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let service = OccupancyService::new(ServiceSettings::default());
        assert_eq!(service.status(), ModelStatus::Loading);

        service.mark_load_failed("checkpoint missing");
        assert_eq!(
            service.status(),
            ModelStatus::Failed("checkpoint missing".to_string())
        );

        let model = ShapeModel::procedural("v1", &Default::default());
        assert!(service.install_model(model.clone()).is_ok());
        assert!(service.status().is_ready());

        let second = service.install_model(model).unwrap_err();
        assert_eq!(second.version(), "v1");
    }
}
