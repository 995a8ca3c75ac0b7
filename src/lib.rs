//! Clients for the SugarCRM web services.
//!
//! * [`legacy::Client`] talks to the session based `service/v4_1/rest.php`
//!   endpoint and logs in when it is built.
//! * [`oauth::Client`] talks to the versioned OAuth2 REST API and carries a
//!   bearer token installed with [`oauth::Client::get_token`].
//!
//! Both hand every response to [`interpret`], which decodes the body and maps
//! server error envelopes onto [`ClientError`].

pub mod hooks;
pub mod interpret;
pub mod legacy;
mod make_request;
pub mod models;
pub mod oauth;

pub use hooks::Hooks;
pub use interpret::{interpret, Payload, RawResponse};
pub use models::error;
pub use models::error::ClientError;
pub use models::{name_value_list, ErrorCode, NameValue, ParamKind};
