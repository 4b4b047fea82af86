//! # Transaction Requests
//!
//! What the merchant can ask the gateway to do, and how each request turns
//! into the flat field mapping the gateway signs.
//!
//! ```text
//! types.rs   : txnType / channelType code tables
//! request.rs : typed requests, required-field table, field projection
//! form.rs    : auto-submitting HTML form for desktop payments
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** a [`TransactionRequest`].
//! 2. **Project** it with [`TransactionRequest::to_fields`]; required fields
//!    are checked here.
//! 3. **Sign** the mapping with [`crate::signer::Signer::sign`].
//! 4. **Deliver** it: desktop payments through [`auto_submit_form`],
//!    everything else as a form-encoded POST by [`crate::client::GatewayClient`].

pub mod form;
pub mod request;
pub mod types;

pub use form::auto_submit_form;
pub use request::{
    check_required, make_order_id, validate_settle_date, FileTransferRequest, PayRequest,
    QueryRequest, RequestKind, ReversalRequest, TransactionRequest, REQUIRED_FIELDS,
};
pub use types::{ChannelType, TradeType};
