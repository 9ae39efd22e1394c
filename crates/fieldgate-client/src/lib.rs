//! # Fieldgate Client
//!
//! UI-side controllers for live field validation. Everything here runs on a
//! single-threaded event loop, so state is shared through `Rc` and `RefCell`
//! and background work goes through `tokio::task::spawn_local`.
//!
//! - **ClientFieldController**: touched tracking, debounce, cancel, verdicts
//! - **FormController**: derived form validity and submit gating
//! - **EventBus**: lifecycle events for UI listeners, with a bounded history
//! - **HttpTransport**: posts to the fieldgate server's validate endpoint

pub mod cancel;
pub mod events;
pub mod field;
pub mod form;
pub mod transport;

pub use cancel::CancelToken;
pub use events::{EventBus, ValidationEvent, ValidationEventKind};
pub use field::{ClientFieldController, FieldOptions, FieldState, ValidationTrigger, TRANSIENT_MESSAGE};
pub use form::{FieldIssue, FormController, FormValidity, SubmitError};
pub use transport::{HttpTransport, TransportError, TransportReply, ValidationTransport};
