//! Request channels
//!
//! [`ValidationDispatcher`] is the terminal handler of the pipeline: it maps a
//! channel name and its first positional argument onto a registry operation
//! and serializes the answer.
//!
//! | Channel               | Payload                              | Answer                  |
//! |-----------------------|--------------------------------------|-------------------------|
//! | `validation:run`      | `{validationName, ou?, period?, ..}` | `ExecutionResponse`     |
//! | `validation:get-all`  | `{ou?}`                              | metadata by sequence    |
//! | `validation:run-all`  | `{ou, period?, ..}`                  | `ExecutionResponse[]`   |
//! | `validation:preview`  | `{validationName, ou?, period?}`     | `PreviewInfo`           |
//! | `validation:stats`    | none                                 | `RegistryStatistics`    |

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PipelineError, ProcessorError};
use crate::middleware::{Handler, HandlerResult, Invocation};
use crate::registry::ValidationRegistry;
use crate::types::ValidationOptions;

pub const RUN: &str = "validation:run";
pub const GET_ALL: &str = "validation:get-all";
pub const RUN_ALL: &str = "validation:run-all";
pub const PREVIEW: &str = "validation:preview";
pub const STATS: &str = "validation:stats";

pub const ALL: [&str; 5] = [RUN, GET_ALL, RUN_ALL, PREVIEW, STATS];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedRequest {
    validation_name: String,
    #[serde(flatten)]
    options: ValidationOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScopeRequest {
    ou: Option<String>,
}

/// Terminal handler dispatching channels to the registry
#[derive(Clone)]
pub struct ValidationDispatcher {
    registry: Arc<ValidationRegistry>,
}

impl ValidationDispatcher {
    pub fn new(registry: Arc<ValidationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ValidationRegistry> {
        &self.registry
    }
}

/// Deserialize the first positional argument; missing or null reads as `{}`
fn payload<T: DeserializeOwned>(invocation: &Invocation) -> Result<T, PipelineError> {
    let value = match invocation.payload() {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value.clone(),
    };
    Ok(serde_json::from_value(value)?)
}

fn to_value<T: Serialize>(value: &T) -> HandlerResult {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl Handler for ValidationDispatcher {
    async fn call(&self, invocation: &mut Invocation) -> HandlerResult {
        debug!(channel = %invocation.channel, "Dispatching");

        match invocation.channel.as_str() {
            RUN => {
                let request: NamedRequest = payload(invocation)?;
                let response = self
                    .registry
                    .execute(&request.validation_name, &request.options)
                    .await;
                to_value(&response)
            }
            GET_ALL => {
                let request: ScopeRequest = payload(invocation)?;
                to_value(&self.registry.metadata(request.ou.as_deref()).await)
            }
            RUN_ALL => {
                let options: ValidationOptions = payload(invocation)?;
                let ou = options
                    .ou
                    .clone()
                    .ok_or_else(|| PipelineError::InvalidArguments("ou is required".to_string()))?;
                to_value(&self.registry.execute_all_for_ou(&ou, &options).await)
            }
            PREVIEW => {
                let request: NamedRequest = payload(invocation)?;
                match self
                    .registry
                    .preview(&request.validation_name, &request.options)
                    .await
                {
                    Ok(preview) => to_value(&preview),
                    Err(e @ ProcessorError::NotFound(_)) => {
                        Err(PipelineError::InvalidArguments(e.to_string()))
                    }
                    Err(e) => Err(anyhow::Error::from(e).into()),
                }
            }
            STATS => to_value(&self.registry.statistics().await),
            other => Err(PipelineError::UnknownChannel(other.to_string())),
        }
    }
}
