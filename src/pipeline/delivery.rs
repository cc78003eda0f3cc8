use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{
    ACTION_COMPLETE, ACTION_DEAD_LETTER, ACTION_USER_CALLBACK, AckMode, Outcome, PipelineOptions,
    Settlement, UnprocessedPolicy,
};
use crate::client::{
    Delivery, DeliveryMode, DeserializationErrorDetail, ErrorDetail, MaterializedEnvelope,
    MessageHandler,
};
use crate::message::codec::envelope_from_bytes;
use crate::message::{ContentTypes, Envelope};
use crate::utils::error::{BusError, Result};

const UNPROCESSED_REASON: &str = "message was not processed by its handler";

/// Runs one handler over received messages.
pub struct DeliveryPipeline {
    handler: Arc<dyn MessageHandler>,
    content_types: Arc<ContentTypes>,
    options: PipelineOptions,
    client_id: String,
}

impl DeliveryPipeline {
    pub fn new(
        handler: Arc<dyn MessageHandler>,
        content_types: Arc<ContentTypes>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            handler,
            content_types,
            options,
            client_id: Uuid::new_v4().to_string(),
        }
    }

    /// Identifies this receiver in `ErrorDetail::client_id`.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Processes a message body as received from a transport.
    pub async fn process_raw(
        &self,
        bytes: &[u8],
        entity_path: &str,
        settlement: &dyn Settlement,
    ) -> Result<Outcome> {
        let (raw, decoded) = envelope_from_bytes(bytes);
        match decoded {
            Ok(envelope) => self.dispatch(envelope, entity_path, settlement).await,
            Err(error) => {
                self.deserialization_failed(error, raw, entity_path, settlement)
                    .await
            }
        }
    }

    /// Processes an envelope handed over by an emulator entity.
    pub async fn process_envelope(
        &self,
        envelope: Envelope,
        entity_path: &str,
        settlement: &dyn Settlement,
    ) -> Result<Outcome> {
        self.dispatch(envelope, entity_path, settlement).await
    }

    /// Hands `error` to the handler's `process_error`. A panic there is
    /// logged and swallowed.
    pub fn report_error(&self, error: &BusError, action: &str, entity_path: &str) {
        error!(entity = %entity_path, action = %action, error = %error, "message processing failed");
        let detail = ErrorDetail {
            error: error.to_string(),
            action: action.to_string(),
            endpoint: self.options.endpoint.clone(),
            entity_path: entity_path.to_string(),
            client_id: self.client_id.clone(),
        };
        let handler = &self.handler;
        if catch_unwind(AssertUnwindSafe(|| handler.process_error(&detail))).is_err() {
            error!(entity = %entity_path, "error handler panicked");
        }
    }

    async fn dispatch(
        &self,
        envelope: Envelope,
        entity_path: &str,
        settlement: &dyn Settlement,
    ) -> Result<Outcome> {
        let content = match self.content_types.materialize(&envelope) {
            Ok(content) => content,
            Err(error) => {
                let message = envelope.to_string();
                return self
                    .deserialization_failed(error, message, entity_path, settlement)
                    .await;
            }
        };

        let delivery = match self.handler.registration().mode {
            DeliveryMode::Content => Delivery::Content(content),
            DeliveryMode::Message => Delivery::Message(MaterializedEnvelope { envelope, content }),
        };

        let result = AssertUnwindSafe(self.handler.process_message(delivery))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(true)) => {
                if self.options.ack_mode == AckMode::Manual {
                    self.complete(entity_path, settlement).await;
                }
                Ok(Outcome::Completed)
            }
            Ok(Ok(false)) => match self.options.unprocessed {
                UnprocessedPolicy::LeaveUncompleted => {
                    debug!(entity = %entity_path, "handler left message unprocessed");
                    Ok(Outcome::Unprocessed)
                }
                UnprocessedPolicy::DeadLetter => {
                    if self.dead_letter(UNPROCESSED_REASON, entity_path, settlement).await {
                        Ok(Outcome::DeadLettered)
                    } else {
                        Ok(Outcome::Unprocessed)
                    }
                }
            },
            Ok(Err(e)) => {
                let error = BusError::Processing(e.to_string());
                self.report_error(&error, ACTION_USER_CALLBACK, entity_path);
                Ok(Outcome::Failed)
            }
            Err(payload) => {
                let error = BusError::Processing(panic_message(&*payload));
                self.report_error(&error, ACTION_USER_CALLBACK, entity_path);
                Ok(Outcome::Failed)
            }
        }
    }

    async fn deserialization_failed(
        &self,
        error: BusError,
        message: String,
        entity_path: &str,
        settlement: &dyn Settlement,
    ) -> Result<Outcome> {
        let error = match error {
            BusError::Deserialization(_) => error,
            other => BusError::Deserialization(other.to_string()),
        };
        warn!(entity = %entity_path, error = %error, "message could not be deserialized");

        let detail = DeserializationErrorDetail {
            error: error.to_string(),
            message,
        };
        let handler = &self.handler;
        let resolved = catch_unwind(AssertUnwindSafe(|| {
            handler.process_deserialization_error(&detail)
        }))
        .unwrap_or_else(|_| {
            error!(entity = %entity_path, "deserialization error handler panicked");
            false
        });

        if !resolved {
            return Err(error);
        }
        if self.options.ack_mode == AckMode::Manual {
            self.complete(entity_path, settlement).await;
        }
        Ok(Outcome::Discarded)
    }

    async fn complete(&self, entity_path: &str, settlement: &dyn Settlement) -> bool {
        match settlement.complete().await {
            Ok(()) => true,
            Err(e) => {
                self.report_error(&e, ACTION_COMPLETE, entity_path);
                false
            }
        }
    }

    async fn dead_letter(
        &self,
        reason: &str,
        entity_path: &str,
        settlement: &dyn Settlement,
    ) -> bool {
        match settlement.dead_letter(reason).await {
            Ok(()) => true,
            Err(e) => {
                self.report_error(&e, ACTION_DEAD_LETTER, entity_path);
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("handler panicked: {text}")
    } else {
        "handler panicked".to_string()
    }
}
