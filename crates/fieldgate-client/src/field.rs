//! Per-field validation controller
//!
//! Runs on a single-threaded event loop (a tokio `LocalSet`). The only
//! suspension points are the debounce timer and the validation request.
//!
//! - input while touched restarts the debounce timer; one timer per field
//! - a new request cancels the previous one; only the newest verdict applies
//! - focus marks the field touched and clears the displayed error
//! - blur and [`ClientFieldController::validate`] skip the timer
//!
//! Every transition is published on the field's [`EventBus`].

use fieldgate_core::{FieldValidationRequest, LookupCheck, Related};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::events::{EventBus, ValidationEvent, ValidationEventKind};
use crate::transport::{TransportError, TransportReply, ValidationTransport};

/// Shown when a request fails for reasons unrelated to the value
pub const TRANSIENT_MESSAGE: &str = "Could not validate right now, please try again";

/// When input starts a validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationTrigger {
    /// Wait for the input to go idle
    #[default]
    Debounced,
    /// Validate on every change
    Immediate,
    /// Input only records the value; leaving the field validates
    OnBlur,
    /// Only [`ClientFieldController::validate`] (and so form submit) validates
    OnSubmit,
}

#[derive(Debug, Clone)]
pub struct FieldOptions {
    pub trigger: ValidationTrigger,
    pub debounce: Duration,
    /// Upper bound on one validation request
    pub timeout: Duration,
    pub required: bool,
    pub check: Option<LookupCheck>,
    pub exclude_id: Option<String>,
    pub locale: Option<String>,
    /// Other fields whose values are sent along for cross-field rules
    pub related_fields: Vec<String>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            trigger: ValidationTrigger::Debounced,
            debounce: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
            required: false,
            check: None,
            exclude_id: None,
            locale: None,
            related_fields: Vec::new(),
        }
    }
}

impl FieldOptions {
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.trigger = ValidationTrigger::Immediate;
        self
    }

    pub fn trigger(mut self, trigger: ValidationTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn check(mut self, check: LookupCheck) -> Self {
        self.check = Some(check);
        self
    }

    pub fn exclude_id(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn depends_on(mut self, field: impl Into<String>) -> Self {
        self.related_fields.push(field.into());
        self
    }
}

/// Client-side state of one field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldState {
    pub value: String,
    pub touched: bool,
    pub valid: bool,
    /// First message to display, if any
    pub error: Option<String>,
    pub validating: bool,
    /// `error` is a transport problem, not a verdict on the value
    pub transient: bool,
    /// `error` came from a rejected form submission
    pub server_error: bool,
    /// When the last verdict on the value arrived
    pub last_validated: Option<Instant>,
}

pub(crate) type RelatedSource = Rc<dyn Fn(&[String]) -> Related>;

struct Inner {
    name: String,
    options: FieldOptions,
    transport: Rc<dyn ValidationTransport>,
    state: RefCell<FieldState>,
    timer: RefCell<Option<JoinHandle<()>>>,
    in_flight: RefCell<Option<CancelToken>>,
    seq: Cell<u64>,
    related: RefCell<Option<RelatedSource>>,
    events: RefCell<EventBus>,
}

impl Inner {
    fn emit(&self, kind: ValidationEventKind, errors: Vec<String>) {
        let bus = self.events.borrow().clone();
        bus.emit(ValidationEvent::new(self.name.clone(), kind).with_errors(errors));
    }
}

/// Cheap to clone; clones share the same field
#[derive(Clone)]
pub struct ClientFieldController {
    inner: Rc<Inner>,
}

impl fmt::Debug for ClientFieldController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFieldController")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl ClientFieldController {
    pub fn new(name: impl Into<String>, transport: Rc<dyn ValidationTransport>, options: FieldOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                name: name.into(),
                options,
                transport,
                state: RefCell::new(FieldState::default()),
                timer: RefCell::new(None),
                in_flight: RefCell::new(None),
                seq: Cell::new(0),
                related: RefCell::new(None),
                events: RefCell::new(EventBus::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &FieldOptions {
        &self.inner.options
    }

    pub fn is_required(&self) -> bool {
        self.inner.options.required
    }

    pub fn state(&self) -> FieldState {
        self.inner.state.borrow().clone()
    }

    pub fn value(&self) -> String {
        self.inner.state.borrow().value.clone()
    }

    /// A debounce timer is armed or a request is outstanding
    pub fn is_pending(&self) -> bool {
        self.inner.timer.borrow().is_some() || self.inner.in_flight.borrow().is_some()
    }

    pub(crate) fn set_related_source(&self, source: RelatedSource) {
        *self.inner.related.borrow_mut() = Some(source);
    }

    /// Bus this field publishes its lifecycle events on
    pub fn events(&self) -> EventBus {
        self.inner.events.borrow().clone()
    }

    /// Publish on a shared bus instead of the field's own
    pub fn set_event_bus(&self, bus: EventBus) {
        *self.inner.events.borrow_mut() = bus;
    }

    /// Focus marks the field touched and clears the displayed error
    pub fn focus(&self) {
        let cleared = {
            let mut state = self.inner.state.borrow_mut();
            state.touched = true;
            state.transient = false;
            state.server_error = false;
            state.error.take().is_some()
        };

        if cleared {
            self.inner.emit(ValidationEventKind::Clear, Vec::new());
        }
    }

    /// Record a new value. While touched this (re)starts validation and
    /// cancels any request for the previous value.
    pub fn input(&self, value: impl Into<String>) {
        let touched = {
            let mut state = self.inner.state.borrow_mut();
            state.value = value.into();
            state.touched
        };

        self.cancel_in_flight();
        if !touched {
            return;
        }

        match self.inner.options.trigger {
            ValidationTrigger::Debounced => self.arm_timer(),
            ValidationTrigger::Immediate => self.spawn_validation(),
            ValidationTrigger::OnBlur | ValidationTrigger::OnSubmit => {}
        }
    }

    /// Leaving the field validates right away, unless the field only
    /// validates on submit
    pub fn blur(&self) {
        self.inner.state.borrow_mut().touched = true;
        if self.inner.options.trigger != ValidationTrigger::OnSubmit {
            self.spawn_validation();
        }
    }

    /// Validate now, bypassing the debounce timer, and wait for the verdict
    pub async fn validate(&self) -> FieldState {
        self.inner.state.borrow_mut().touched = true;
        self.disarm_timer();
        run_validation(self.inner.clone()).await;
        self.state()
    }

    /// Drop the timer and any outstanding request
    pub fn cancel_pending(&self) {
        let had_timer = self.disarm_timer();
        if !self.cancel_in_flight() && had_timer {
            self.inner.emit(ValidationEventKind::Cancel, Vec::new());
        }
    }

    /// Show a message from a rejected submission without re-running rules
    pub fn set_server_error(&self, message: impl Into<String>) {
        let message = message.into();
        {
            let mut state = self.inner.state.borrow_mut();
            state.valid = false;
            state.error = Some(message.clone());
            state.transient = false;
            state.server_error = true;
        }
        self.inner.emit(ValidationEventKind::Error, vec![message]);
    }

    pub fn clear_server_error(&self) {
        let cleared = {
            let mut state = self.inner.state.borrow_mut();
            let cleared = state.server_error;
            if cleared {
                state.error = None;
                state.server_error = false;
            }
            cleared
        };

        if cleared {
            self.inner.emit(ValidationEventKind::Clear, Vec::new());
        }
    }

    fn arm_timer(&self) {
        let inner = self.inner.clone();
        let delay = inner.options.debounce;

        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            inner.timer.borrow_mut().take();
            run_validation(inner).await;
        });

        if let Some(previous) = self.inner.timer.borrow_mut().replace(handle) {
            previous.abort();
        }
    }

    fn disarm_timer(&self) -> bool {
        match self.inner.timer.borrow_mut().take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    fn spawn_validation(&self) {
        self.disarm_timer();
        let inner = self.inner.clone();
        tokio::task::spawn_local(async move {
            run_validation(inner).await;
        });
    }

    /// Cancel the outstanding request, if any
    fn cancel_in_flight(&self) -> bool {
        let Some(token) = self.inner.in_flight.borrow_mut().take() else {
            return false;
        };
        token.cancel();
        self.inner.state.borrow_mut().validating = false;
        self.inner.emit(ValidationEventKind::Cancel, Vec::new());
        true
    }
}

async fn run_validation(inner: Rc<Inner>) {
    let seq = inner.seq.get() + 1;
    inner.seq.set(seq);

    let token = CancelToken::new();
    let previous = inner.in_flight.borrow_mut().replace(token.clone());
    if let Some(previous) = previous {
        previous.cancel();
        inner.emit(ValidationEventKind::Cancel, Vec::new());
    }

    let request = build_request(&inner);
    inner.state.borrow_mut().validating = true;
    inner.emit(ValidationEventKind::Start, Vec::new());

    let outcome = match tokio::time::timeout(
        inner.options.timeout,
        inner.transport.validate(&inner.name, &request, &token),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    };

    if token.is_cancelled() || inner.seq.get() != seq {
        debug!(field = %inner.name, seq, "stale validation response dropped");
        return;
    }
    inner.in_flight.borrow_mut().take();

    let (kind, errors) = {
        let mut state = inner.state.borrow_mut();
        state.validating = false;

        match outcome {
            Ok(TransportReply::Valid) => {
                state.valid = true;
                state.error = None;
                state.transient = false;
                state.server_error = false;
                state.last_validated = Some(Instant::now());
                (ValidationEventKind::Success, Vec::new())
            }
            Ok(TransportReply::Invalid(errors)) => {
                state.valid = false;
                state.error = errors
                    .first_message(&inner.name)
                    .or_else(|| errors.first().map(|e| e.message.as_str()))
                    .map(str::to_string);
                state.transient = false;
                state.server_error = false;
                state.last_validated = Some(Instant::now());
                let messages = errors.iter().map(|e| e.message.clone()).collect();
                (ValidationEventKind::Error, messages)
            }
            Ok(TransportReply::RateLimited) => {
                debug!(field = %inner.name, "rate limited, keeping previous verdict");
                (ValidationEventKind::Cancel, Vec::new())
            }
            Err(TransportError::Cancelled) => (ValidationEventKind::Cancel, Vec::new()),
            Err(err) => {
                debug!(field = %inner.name, error = %err, "validation request failed");
                state.valid = false;
                state.error = Some(TRANSIENT_MESSAGE.to_string());
                state.transient = true;
                state.server_error = false;
                (ValidationEventKind::Error, vec![TRANSIENT_MESSAGE.to_string()])
            }
        }
    };

    inner.emit(kind, errors);
}

fn build_request(inner: &Inner) -> FieldValidationRequest {
    let related = match inner.related.borrow().as_ref() {
        Some(source) if !inner.options.related_fields.is_empty() => source(&inner.options.related_fields),
        _ => Related::new(),
    };

    FieldValidationRequest {
        value: inner.state.borrow().value.clone(),
        related,
        check: inner.options.check,
        exclude_id: inner.options.exclude_id.clone(),
        locale: inner.options.locale.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fieldgate_core::{ErrorSet, ValidationError};
    use tokio::task::LocalSet;

    /// Replies after a fixed delay: values containing '@' are valid
    struct EchoTransport {
        delay: Duration,
        seen: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl ValidationTransport for EchoTransport {
        async fn validate(
            &self,
            field: &str,
            request: &FieldValidationRequest,
            _cancel: &CancelToken,
        ) -> Result<TransportReply, TransportError> {
            self.seen.borrow_mut().push(request.value.clone());
            tokio::time::sleep(self.delay).await;
            if request.value.contains('@') {
                Ok(TransportReply::Valid)
            } else {
                let error = ValidationError::new(field, "invalid_email", "Email must be a valid email address");
                Ok(TransportReply::Invalid(ErrorSet::new().with(error)))
            }
        }
    }

    fn controller(delay_ms: u64, options: FieldOptions) -> (ClientFieldController, Rc<EchoTransport>) {
        let transport = Rc::new(EchoTransport {
            delay: Duration::from_millis(delay_ms),
            seen: RefCell::new(Vec::new()),
        });
        (ClientFieldController::new("email", transport.clone(), options), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_before_focus_does_not_validate() {
        LocalSet::new()
            .run_until(async {
                let (field, transport) = controller(10, FieldOptions::default());
                field.input("a@b.co");
                tokio::time::sleep(Duration::from_secs(1)).await;

                assert!(transport.seen.borrow().is_empty());
                assert_eq!(field.value(), "a@b.co");
                assert!(!field.state().touched);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_clears_error() {
        LocalSet::new()
            .run_until(async {
                let (field, _) = controller(10, FieldOptions::default());
                field.input("nope");
                let state = field.validate().await;
                assert_eq!(state.error.as_deref(), Some("Email must be a valid email address"));

                field.focus();
                let state = field.state();
                assert!(state.touched);
                assert_eq!(state.error, None);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_trigger_skips_debounce() {
        LocalSet::new()
            .run_until(async {
                let (field, transport) = controller(10, FieldOptions::default().immediate());
                field.focus();
                field.input("a@b.co");

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(*transport.seen.borrow(), vec!["a@b.co".to_string()]);
                assert!(field.state().valid);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_validates_without_waiting() {
        LocalSet::new()
            .run_until(async {
                let (field, transport) = controller(10, FieldOptions::default());
                field.focus();
                field.input("a@b.co");
                field.blur();

                tokio::time::sleep(Duration::from_millis(20)).await;
                assert_eq!(transport.seen.borrow().len(), 1);
                assert!(field.state().valid);
                assert!(!field.is_pending());

                // the debounce timer was disarmed by blur
                tokio::time::sleep(Duration::from_secs(1)).await;
                assert_eq!(transport.seen.borrow().len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_validating_flag_during_request() {
        LocalSet::new()
            .run_until(async {
                let (field, _) = controller(200, FieldOptions::default());
                field.focus();
                field.input("a@b.co");
                field.blur();

                tokio::time::sleep(Duration::from_millis(100)).await;
                assert!(field.state().validating);
                assert!(field.is_pending());

                tokio::time::sleep(Duration::from_millis(200)).await;
                assert!(!field.state().validating);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_transient_message() {
        LocalSet::new()
            .run_until(async {
                let options = FieldOptions::default().timeout(Duration::from_secs(5));
                let (field, _) = controller(10_000, options);

                let state = field.validate().await;
                assert!(!state.validating);
                assert!(!state.valid);
                assert!(state.transient);
                assert_eq!(state.error.as_deref(), Some(TRANSIENT_MESSAGE));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_blur_trigger_waits_for_blur() {
        LocalSet::new()
            .run_until(async {
                let options = FieldOptions::default().trigger(ValidationTrigger::OnBlur);
                let (field, transport) = controller(10, options);
                field.focus();
                field.input("a@b.co");

                tokio::time::sleep(Duration::from_secs(1)).await;
                assert!(transport.seen.borrow().is_empty());
                assert!(!field.is_pending());

                field.blur();
                tokio::time::sleep(Duration::from_millis(20)).await;
                assert_eq!(*transport.seen.borrow(), vec!["a@b.co".to_string()]);
                assert!(field.state().valid);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_submit_trigger_ignores_input_and_blur() {
        LocalSet::new()
            .run_until(async {
                let options = FieldOptions::default().trigger(ValidationTrigger::OnSubmit);
                let (field, transport) = controller(10, options);
                field.focus();
                field.input("nope");
                field.blur();

                tokio::time::sleep(Duration::from_secs(1)).await;
                assert!(transport.seen.borrow().is_empty());
                assert!(field.state().touched);

                let state = field.validate().await;
                assert!(!state.valid);
                assert_eq!(transport.seen.borrow().len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events() {
        LocalSet::new()
            .run_until(async {
                let (field, _) = controller(10, FieldOptions::default());
                let kinds = Rc::new(RefCell::new(Vec::new()));
                let sink = kinds.clone();
                field
                    .events()
                    .subscribe("email", move |e| sink.borrow_mut().push(e.kind));

                field.input("nope");
                field.validate().await;
                field.focus();
                field.input("a@b.co");
                field.validate().await;

                assert_eq!(
                    *kinds.borrow(),
                    vec![
                        ValidationEventKind::Start,
                        ValidationEventKind::Error,
                        ValidationEventKind::Clear,
                        ValidationEventKind::Start,
                        ValidationEventKind::Success,
                    ]
                );
                let errors = &field.events().events_for("email")[1].errors;
                assert_eq!(*errors, vec!["Email must be a valid email address".to_string()]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_request_emits_cancel() {
        LocalSet::new()
            .run_until(async {
                let (field, _) = controller(200, FieldOptions::default().immediate());
                field.focus();
                field.input("first@b.co");
                tokio::time::sleep(Duration::from_millis(50)).await;
                assert!(field.state().validating);

                field.input("second@b.co");
                tokio::time::sleep(Duration::from_millis(500)).await;

                let kinds: Vec<_> = field.events().history().into_iter().map(|e| e.kind).collect();
                assert_eq!(
                    kinds,
                    vec![
                        ValidationEventKind::Start,
                        ValidationEventKind::Cancel,
                        ValidationEventKind::Start,
                        ValidationEventKind::Success,
                    ]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_validated_tracks_verdicts_only() {
        LocalSet::new()
            .run_until(async {
                let (field, _) = controller(10, FieldOptions::default());
                assert_eq!(field.state().last_validated, None);

                let before = Instant::now();
                field.input("a@b.co");
                let state = field.validate().await;
                assert!(state.last_validated.is_some_and(|at| at >= before));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_overlay() {
        LocalSet::new()
            .run_until(async {
                let (field, _) = controller(10, FieldOptions::default());
                field.input("a@b.co");
                assert!(field.validate().await.valid);

                field.set_server_error("This email address is already taken");
                let state = field.state();
                assert!(!state.valid);
                assert!(state.server_error);

                field.clear_server_error();
                assert_eq!(field.state().error, None);
            })
            .await;
    }
}
