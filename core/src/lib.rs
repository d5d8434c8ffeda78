//! API marshalling and resilient dispatch for the GoClimb backend.
//!
//! # Overview
//! Translates between Rust structs and the backend's snake_case wire JSON,
//! sends calls with the app-check attestation header, and turns every reply
//! into a typed envelope. Failures the caller is expected to handle come back
//! as values; nothing here panics on a bad network or a bad body.
//!
//! # Design
//! - `mapping` declares per-type `internal -> wire` tables; `model` composes
//!   nested sub-models through them; `date` normalizes wire dates.
//! - `envelope` is the `{success, message, errors, data}` reply shape.
//! - `request` builds `HttpRequest` values as plain data; `transport` and
//!   `token` are injected seams, so tests run without a network.
//! - `dispatcher` sends one call; `resilient` retries once without the token
//!   on 403 or when the first attempt got no reply.

pub mod config;
pub mod date;
pub mod diagnostics;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod http;
pub mod mapping;
pub mod model;
pub mod models;
pub mod request;
pub mod resilient;
pub mod token;
pub mod transport;

pub use config::ApiConfig;
pub use dispatcher::{DispatchResult, Dispatched, Dispatcher};
pub use envelope::{ApiResponse, BaseEnvelope, DataEnvelope, WireValue};
pub use error::{ConfigError, DispatchError, TokenError, TransportError};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
pub use mapping::{Field, FieldMapped, FieldMapping};
pub use model::{wrap_model, ModelSource};
pub use models::{ClimbLogModel, CragModel, PostModel, RouteModel, UserModel};
pub use request::{ApiRequest, RequestPayload, APP_CHECK_HEADER};
pub use resilient::{FallbackPolicy, Outcome, ResilientDispatcher};
pub use token::{NoToken, StaticToken, TokenProvider};
pub use transport::{ReqwestTransport, Transport};
