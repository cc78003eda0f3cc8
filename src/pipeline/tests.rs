use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ACTION_COMPLETE, ACTION_USER_CALLBACK, AckMode, DeliveryPipeline, Outcome, PipelineOptions,
    Settlement, UnprocessedPolicy,
};
use crate::client::{
    Delivery, DeliveryMode, DeserializationErrorDetail, ErrorDetail, HandlerRegistration,
    HandlerResult, MessageHandler,
};
use crate::message::{ContentTypes, Envelope};
use crate::utils::error::{BusError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OrderPlaced {
    id: u32,
}

#[derive(Clone, Copy)]
enum Reply {
    Processed(bool),
    Fail,
    Panic,
}

struct TestHandler {
    registration: HandlerRegistration,
    reply: Reply,
    absorb_deserialization: bool,
    panic_on_error: bool,
    deliveries: Mutex<Vec<Delivery>>,
    errors: Mutex<Vec<ErrorDetail>>,
    deserialization_errors: Mutex<Vec<DeserializationErrorDetail>>,
}

impl TestHandler {
    fn new(mode: DeliveryMode, reply: Reply) -> Self {
        Self {
            registration: HandlerRegistration::queue("orders", mode),
            reply,
            absorb_deserialization: false,
            panic_on_error: false,
            deliveries: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            deserialization_errors: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageHandler for TestHandler {
    fn registration(&self) -> &HandlerRegistration {
        &self.registration
    }

    async fn process_message(&self, delivery: Delivery) -> HandlerResult<bool> {
        self.deliveries.lock().unwrap().push(delivery);
        match self.reply {
            Reply::Processed(processed) => Ok(processed),
            Reply::Fail => Err("handler failed".into()),
            Reply::Panic => panic!("boom"),
        }
    }

    fn process_error(&self, detail: &ErrorDetail) {
        self.errors.lock().unwrap().push(detail.clone());
        if self.panic_on_error {
            panic!("error handler broke");
        }
    }

    fn process_deserialization_error(&self, detail: &DeserializationErrorDetail) -> bool {
        self.deserialization_errors
            .lock()
            .unwrap()
            .push(detail.clone());
        self.absorb_deserialization
    }
}

#[derive(Default)]
struct RecordingSettlement {
    completed: AtomicUsize,
    dead_lettered: Mutex<Vec<String>>,
    fail_complete: bool,
}

#[async_trait]
impl Settlement for RecordingSettlement {
    async fn complete(&self) -> Result<()> {
        if self.fail_complete {
            return Err(BusError::Processing("lock expired".to_string()));
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dead_letter(&self, reason: &str) -> Result<()> {
        self.dead_lettered.lock().unwrap().push(reason.to_string());
        Ok(())
    }
}

fn content_types() -> Arc<ContentTypes> {
    Arc::new(ContentTypes::new().register::<OrderPlaced>())
}

fn pipeline(handler: &Arc<TestHandler>, options: PipelineOptions) -> DeliveryPipeline {
    DeliveryPipeline::new(handler.clone(), content_types(), options)
}

fn order() -> Envelope {
    Envelope::create(&OrderPlaced { id: 42 }).unwrap()
}

#[tokio::test]
async fn test_content_mode_completes_on_true() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(true)));
    let settlement = RecordingSettlement::default();

    let outcome = pipeline(&handler, PipelineOptions::default())
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 1);
    let deliveries = handler.deliveries.lock().unwrap();
    assert!(matches!(deliveries[0], Delivery::Content(_)));
    assert_eq!(
        deliveries[0].content().downcast_ref::<OrderPlaced>(),
        Some(&OrderPlaced { id: 42 })
    );
}

#[tokio::test]
async fn test_message_mode_passes_the_envelope() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Message, Reply::Processed(true)));
    let settlement = RecordingSettlement::default();
    let envelope = order();

    pipeline(&handler, PipelineOptions::default())
        .process_envelope(envelope.clone(), "orders", &settlement)
        .await
        .unwrap();

    let deliveries = handler.deliveries.lock().unwrap();
    assert_eq!(deliveries[0].envelope(), Some(&envelope));
    assert!(deliveries[0].content().is::<OrderPlaced>());
}

#[tokio::test]
async fn test_auto_ack_skips_completion() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(true)));
    let settlement = RecordingSettlement::default();
    let options = PipelineOptions {
        ack_mode: AckMode::Auto,
        ..PipelineOptions::default()
    };

    let outcome = pipeline(&handler, options)
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_false_leaves_message_uncompleted_by_default() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(false)));
    let settlement = RecordingSettlement::default();

    let outcome = pipeline(&handler, PipelineOptions::default())
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Unprocessed);
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 0);
    assert!(settlement.dead_lettered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_false_dead_letters_when_configured() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(false)));
    let settlement = RecordingSettlement::default();
    let options = PipelineOptions {
        unprocessed: UnprocessedPolicy::DeadLetter,
        ..PipelineOptions::default()
    };

    let outcome = pipeline(&handler, options)
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::DeadLettered);
    assert_eq!(settlement.dead_lettered.lock().unwrap().len(), 1);
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_error_is_reported() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Fail));
    let settlement = RecordingSettlement::default();
    let pipeline = pipeline(&handler, PipelineOptions::default());

    let outcome = pipeline
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 0);
    let errors = handler.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].action, ACTION_USER_CALLBACK);
    assert_eq!(errors[0].entity_path, "orders");
    assert_eq!(errors[0].endpoint, "sb://embus.local");
    assert_eq!(errors[0].client_id, pipeline.client_id());
    assert!(errors[0].error.contains("handler failed"));
}

#[tokio::test]
async fn test_handler_panic_is_reported() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Panic));
    let settlement = RecordingSettlement::default();

    let outcome = pipeline(&handler, PipelineOptions::default())
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Failed);
    let errors = handler.errors.lock().unwrap();
    assert!(errors[0].error.contains("boom"));
}

#[tokio::test]
async fn test_deserialization_error_absorbed() {
    let mut handler = TestHandler::new(DeliveryMode::Content, Reply::Processed(true));
    handler.absorb_deserialization = true;
    let handler = Arc::new(handler);
    let settlement = RecordingSettlement::default();
    let unknown = Envelope::create("not an order").unwrap();

    let outcome = pipeline(&handler, PipelineOptions::default())
        .process_envelope(unknown, "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Discarded);
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 1);
    assert!(handler.deliveries.lock().unwrap().is_empty());
    assert_eq!(handler.deserialization_errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_deserialization_error_propagated() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(true)));
    let settlement = RecordingSettlement::default();
    let mut broken = order();
    broken.set_serialized_content::<OrderPlaced>(r#"{"id":"forty-two"}"#);

    let err = pipeline(&handler, PipelineOptions::default())
        .process_envelope(broken.clone(), "orders", &settlement)
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Deserialization(_)));
    assert_eq!(settlement.completed.load(Ordering::SeqCst), 0);
    assert!(handler.deliveries.lock().unwrap().is_empty());
    let details = handler.deserialization_errors.lock().unwrap();
    assert_eq!(details[0].message, broken.to_string());
}

#[tokio::test]
async fn test_completion_failure_is_not_fatal() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(true)));
    let settlement = RecordingSettlement {
        fail_complete: true,
        ..RecordingSettlement::default()
    };

    let outcome = pipeline(&handler, PipelineOptions::default())
        .process_envelope(order(), "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    let errors = handler.errors.lock().unwrap();
    assert_eq!(errors[0].action, ACTION_COMPLETE);
}

#[tokio::test]
async fn test_process_raw_decodes_bytes() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(true)));
    let settlement = RecordingSettlement::default();
    let bytes = order().to_string().into_bytes();

    let outcome = pipeline(&handler, PipelineOptions::default())
        .process_raw(&bytes, "orders", &settlement)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
}

#[tokio::test]
async fn test_process_raw_reports_malformed_body() {
    let handler = Arc::new(TestHandler::new(DeliveryMode::Content, Reply::Processed(true)));
    let settlement = RecordingSettlement::default();

    let err = pipeline(&handler, PipelineOptions::default())
        .process_raw(b"{ not an envelope", "orders", &settlement)
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Deserialization(_)));
    let details = handler.deserialization_errors.lock().unwrap();
    assert_eq!(details[0].message, "{ not an envelope");
}

#[test]
fn test_panicking_error_handler_is_swallowed() {
    let mut handler = TestHandler::new(DeliveryMode::Content, Reply::Processed(true));
    handler.panic_on_error = true;
    let handler = Arc::new(handler);

    pipeline(&handler, PipelineOptions::default()).report_error(
        &BusError::Processing("x".to_string()),
        ACTION_USER_CALLBACK,
        "orders",
    );

    assert_eq!(handler.errors.lock().unwrap().len(), 1);
}
