//! Drop data model
//!
//! Ids, persisted records, access records and the request/response shapes of
//! the drop service.

mod access;
mod ids;
mod record;
mod request;

pub use access::{AccessToken, Clearance};
pub use ids::{DropId, OwnerId, SessionId, TOKEN_SIZE, TokenValue};
pub use record::{
    ContentKind, Counter, DropRecord, DropStatus, ExpiryPolicy, FileSummary, Payload, Protection,
    StoredObject,
};
pub use request::{
    DeliveredContent, Delivery, FetchOutcome, FetchRequest, NewContent, NewDrop, NewFile,
    ObjectBody, ObjectPointer, PlainContent, SealedContent,
};
