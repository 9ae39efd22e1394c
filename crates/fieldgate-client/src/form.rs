//! Whole-form validity and submission gating
//!
//! Validity is always recomputed from the registered fields, never stored:
//! the form is valid when no field is mid-request, every required field is
//! valid and every optional field holding a value is valid.

use fieldgate_core::{humanize, ErrorSet, Related};
use futures::future::join_all;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::events::EventBus;
use crate::field::{ClientFieldController, FieldState};
use crate::transport::TransportError;

/// One entry of the form-level error summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Derived snapshot of the form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValidity {
    pub total_fields: usize,
    pub valid_fields: usize,
    pub invalid_fields: usize,
    /// Fields with a request outstanding; counted in neither bucket above
    pub validating_fields: usize,
    /// Invalid fields in registration order
    pub errors: Vec<FieldIssue>,
    /// When each field last received a verdict
    pub last_validated: BTreeMap<String, Instant>,
}

impl FormValidity {
    pub fn is_valid(&self) -> bool {
        self.invalid_fields == 0 && self.validating_fields == 0
    }

    pub fn is_validating(&self) -> bool {
        self.validating_fields > 0
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("form has {} invalid field(s)", .0.invalid_fields)]
    Invalid(FormValidity),

    #[error("submission rejected with {} error(s)", .0.len())]
    Rejected(ErrorSet),

    #[error("a submission is already in progress")]
    InProgress,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

type FocusHandler = Box<dyn Fn(&str)>;

#[derive(Default)]
struct Inner {
    // registration order is document order
    fields: RefCell<Vec<ClientFieldController>>,
    submitting: Cell<bool>,
    focus_target: RefCell<Option<String>>,
    on_focus: RefCell<Option<FocusHandler>>,
    events: EventBus,
}

/// Clears the submitting flag however the submit future ends, including
/// being dropped mid-flight
struct SubmittingGuard<'a>(&'a Cell<bool>);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Clone, Default)]
pub struct FormController {
    inner: Rc<Inner>,
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; fields listed in its `related_fields` are read from this
    /// form when it builds a request. The field publishes its events on the
    /// form's bus from now on.
    pub fn register(&self, field: ClientFieldController) {
        field.set_event_bus(self.inner.events.clone());

        let form: Weak<Inner> = Rc::downgrade(&self.inner);
        field.set_related_source(Rc::new(move |names: &[String]| {
            let Some(form) = form.upgrade() else {
                return Related::new();
            };
            let fields = form.fields.borrow();
            names
                .iter()
                .filter_map(|name| {
                    fields
                        .iter()
                        .find(|f| f.name() == name)
                        .map(|f| (name.clone(), f.value()))
                })
                .collect()
        }));

        self.inner.fields.borrow_mut().push(field);
    }

    pub fn field(&self, name: &str) -> Option<ClientFieldController> {
        self.inner.fields.borrow().iter().find(|f| f.name() == name).cloned()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.inner.fields.borrow().iter().map(|f| f.name().to_string()).collect()
    }

    /// Lifecycle events of every registered field
    pub fn events(&self) -> EventBus {
        self.inner.events.clone()
    }

    /// Called with the field name whenever a blocked submit moves focus
    pub fn on_focus(&self, handler: impl Fn(&str) + 'static) {
        *self.inner.on_focus.borrow_mut() = Some(Box::new(handler));
    }

    /// Field focus was last moved to by a blocked submit
    pub fn focus_target(&self) -> Option<String> {
        self.inner.focus_target.borrow().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.get()
    }

    /// Current values keyed by field name
    pub fn values(&self) -> Related {
        self.inner
            .fields
            .borrow()
            .iter()
            .map(|f| (f.name().to_string(), f.value()))
            .collect()
    }

    /// Fields with an armed timer or an outstanding request
    pub fn pending_fields(&self) -> Vec<String> {
        self.inner
            .fields
            .borrow()
            .iter()
            .filter(|f| f.is_pending())
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn summary(&self) -> FormValidity {
        let fields = self.inner.fields.borrow();
        let mut summary = FormValidity {
            total_fields: fields.len(),
            ..FormValidity::default()
        };

        for field in fields.iter() {
            let state = field.state();
            if let Some(at) = state.last_validated {
                summary.last_validated.insert(field.name().to_string(), at);
            }

            if state.validating {
                summary.validating_fields += 1;
            } else if is_acceptable(field.is_required(), &state) {
                summary.valid_fields += 1;
            } else {
                summary.invalid_fields += 1;
                summary.errors.push(FieldIssue {
                    field: field.name().to_string(),
                    message: issue_message(field, &state),
                });
            }
        }

        summary
    }

    pub fn is_valid(&self) -> bool {
        self.summary().is_valid()
    }

    /// Force every field to validate now and wait for all verdicts
    pub async fn validate_all(&self) -> FormValidity {
        let fields = self.inner.fields.borrow().clone();
        join_all(fields.iter().map(|f| f.validate())).await;
        self.summary()
    }

    /// Validate everything, then hand the values to `send` if the form is
    /// valid. A blocked submit moves focus to the first invalid required
    /// field. A [`SubmitError::Rejected`] from `send` is overlaid onto the
    /// fields as-is; a successful send clears earlier overlays.
    pub async fn submit<F, Fut, T>(&self, send: F) -> Result<T, SubmitError>
    where
        F: FnOnce(Related) -> Fut,
        Fut: Future<Output = Result<T, SubmitError>>,
    {
        if self.inner.submitting.replace(true) {
            return Err(SubmitError::InProgress);
        }
        let _guard = SubmittingGuard(&self.inner.submitting);

        let summary = self.validate_all().await;
        if !summary.is_valid() {
            self.move_focus_to_first_invalid();
            debug!(invalid = summary.invalid_fields, "submit blocked");
            return Err(SubmitError::Invalid(summary));
        }

        let result = send(self.values()).await;
        match &result {
            Ok(_) => self.clear_server_errors(),
            Err(SubmitError::Rejected(errors)) => self.apply_server_errors(errors),
            Err(_) => {}
        }

        result
    }

    /// Overlay a server rejection: first message per field, no client rules run
    pub fn apply_server_errors(&self, errors: &ErrorSet) {
        for field in self.inner.fields.borrow().iter() {
            if let Some(message) = errors.first_message(field.name()) {
                field.set_server_error(message);
            }
        }
    }

    pub fn clear_server_errors(&self) {
        for field in self.inner.fields.borrow().iter() {
            field.clear_server_error();
        }
    }

    fn move_focus_to_first_invalid(&self) {
        let target = self
            .inner
            .fields
            .borrow()
            .iter()
            .find(|f| f.is_required() && !f.state().valid)
            .map(|f| f.name().to_string());

        if let (Some(name), Some(handler)) = (&target, self.inner.on_focus.borrow().as_ref()) {
            handler(name);
        }
        *self.inner.focus_target.borrow_mut() = target;
    }
}

fn is_acceptable(required: bool, state: &FieldState) -> bool {
    if required {
        state.valid
    } else {
        state.value.trim().is_empty() || state.valid
    }
}

fn issue_message(field: &ClientFieldController, state: &FieldState) -> String {
    if let Some(error) = &state.error {
        return error.clone();
    }
    if state.value.trim().is_empty() {
        format!("{} is required", humanize(field.name()))
    } else {
        format!("{} is invalid", humanize(field.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldOptions;
    use crate::transport::{TransportReply, ValidationTransport};
    use crate::CancelToken;
    use async_trait::async_trait;
    use fieldgate_core::FieldValidationRequest;

    /// Non-empty values are valid
    struct PresenceTransport;

    #[async_trait(?Send)]
    impl ValidationTransport for PresenceTransport {
        async fn validate(
            &self,
            _field: &str,
            request: &FieldValidationRequest,
            _cancel: &CancelToken,
        ) -> Result<TransportReply, TransportError> {
            if request.value.is_empty() {
                Ok(TransportReply::Invalid(ErrorSet::new()))
            } else {
                Ok(TransportReply::Valid)
            }
        }
    }

    fn form() -> FormController {
        let transport: Rc<dyn ValidationTransport> = Rc::new(PresenceTransport);
        let form = FormController::new();
        form.register(ClientFieldController::new("name", transport.clone(), FieldOptions::default().required()));
        form.register(ClientFieldController::new("nickname", transport.clone(), FieldOptions::default()));
        form.register(ClientFieldController::new("email", transport, FieldOptions::default().required()));
        form
    }

    #[test]
    fn test_empty_form_summary() {
        let summary = form().summary();
        assert_eq!(summary.total_fields, 3);
        // optional empty field counts as fine
        assert_eq!(summary.valid_fields, 1);
        assert_eq!(summary.invalid_fields, 2);
        assert_eq!(
            summary.errors,
            vec![
                FieldIssue { field: "name".into(), message: "Name is required".into() },
                FieldIssue { field: "email".into(), message: "Email is required".into() },
            ]
        );
    }

    #[test]
    fn test_optional_field_with_unverified_value_blocks() {
        let form = form();
        form.field("nickname").unwrap().input("neo");
        let summary = form.summary();
        assert_eq!(summary.invalid_fields, 3);
        assert_eq!(summary.errors[1].message, "Nickname is invalid");
    }

    #[test]
    fn test_validating_field_blocks_validity() {
        let validity = FormValidity {
            total_fields: 2,
            valid_fields: 1,
            validating_fields: 1,
            ..FormValidity::default()
        };
        assert!(!validity.is_valid());
        assert!(validity.is_validating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fields_share_the_form_bus() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let form = form();
                form.field("name").unwrap().input("Ada");
                let summary = form.validate_all().await;

                let fields: Vec<String> = form.events().history().into_iter().map(|e| e.field).collect();
                assert_eq!(fields.len(), 6);
                assert!(fields.contains(&"nickname".to_string()));
                assert_eq!(summary.last_validated.len(), 3);
                assert_eq!(summary.validating_fields, 0);
            })
            .await;
    }

    #[test]
    fn test_values_in_registration_order() {
        let form = form();
        assert_eq!(form.field_names(), vec!["name", "nickname", "email"]);
        form.field("email").unwrap().input("a@b.co");
        assert_eq!(form.values().get("email").map(String::as_str), Some("a@b.co"));
    }
}
