//! Model options and the feature roadmap.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::domain::collections::{FEATURES, MODELS, SUBSCRIBERS};
use crate::domain::{Caller, Feature, ModelOption};
use crate::error::DomainError;
use crate::ports::{DocPath, DocumentStore, FieldOp, to_fields};

const SUBSCRIBER_COUNT: &str = "subscriberCount";

#[derive(Clone)]
pub struct RoadmapService {
    store: Arc<dyn DocumentStore>,
}

impl RoadmapService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list_models(&self) -> Vec<ModelOption> {
        match self.store.list(MODELS).await {
            Ok(docs) => {
                let mut models: Vec<ModelOption> =
                    docs.iter().filter_map(|doc| doc.decode().ok()).collect();
                models.sort_by(|a, b| a.label.cmp(&b.label));
                models
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read models");
                Vec::new()
            }
        }
    }

    pub async fn list_features(&self) -> Vec<Feature> {
        let docs = match self.store.list(FEATURES).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read features");
                return Vec::new();
            }
        };
        docs.iter()
            .filter_map(|doc| {
                doc.decode::<Feature>().ok().map(|mut feature| {
                    feature.id = doc.path.id.clone();
                    feature
                })
            })
            .collect()
    }

    /// Flips the caller's notification opt-in. Returns the new state.
    ///
    /// The subscriber document and the counter are two separate writes.
    pub async fn toggle_feature_subscription(
        &self,
        caller: &Caller,
        feature_id: &str,
    ) -> Result<bool, DomainError> {
        let user_id = &caller.require()?.user_id;
        let feature_path = DocPath::new(FEATURES, feature_id);
        if self.store.get(&feature_path).await?.is_none() {
            return Err(DomainError::not_found("feature", feature_id));
        }

        let subscriber_path = feature_path.child(SUBSCRIBERS, user_id.as_str());
        let subscribed = self.store.get(&subscriber_path).await?.is_some();

        let delta = if subscribed {
            self.store.delete(&subscriber_path).await?;
            -1
        } else {
            let record = json!({ "userId": user_id, "subscribedAt": Utc::now() });
            self.store.set(&subscriber_path, to_fields(&record)?).await?;
            1
        };
        self.store
            .update(
                &feature_path,
                vec![(SUBSCRIBER_COUNT.to_string(), FieldOp::Increment(delta))],
            )
            .await?;

        tracing::info!(
            feature_id = %feature_id,
            user_id = %user_id,
            subscribed = !subscribed,
            "Feature subscription toggled"
        );
        Ok(!subscribed)
    }
}
