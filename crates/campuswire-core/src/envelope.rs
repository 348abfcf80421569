//! The request/response envelope.
//!
//! Every frame on the wire carries exactly one [`Envelope`]. Requests and
//! responses share the shape; a response echoes the request's `msg_type` and
//! carries the outcome in [`Code`]. The payload stays an opaque JSON value;
//! its concrete shape is a private contract between a screen and the domain
//! handler it talks to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;

/// Operation selector for dispatch.
///
/// A string the current build does not know decodes as [`MsgType::Other`]
/// instead of failing, so the server can answer "unsupported operation"
/// rather than dropping the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MsgType {
    UserLogin,
    UserLogout,
    UserRegister,
    BookList,
    BookSearch,
    BookBorrow,
    BookReturn,
    RepairApply,
    RepairList,
    RepairUpdate,
    PaymentList,
    PaymentPay,
    CourseList,
    CourseEnroll,
    CourseDrop,
    ShopList,
    ShopOrder,
    EchoTest,
    /// Operation string not known to this build.
    Other(String),
}

impl MsgType {
    /// Wire name of the operation.
    pub fn wire_name(&self) -> &str {
        match self {
            MsgType::UserLogin => "USER_LOGIN",
            MsgType::UserLogout => "USER_LOGOUT",
            MsgType::UserRegister => "USER_REGISTER",
            MsgType::BookList => "BOOK_LIST",
            MsgType::BookSearch => "BOOK_SEARCH",
            MsgType::BookBorrow => "BOOK_BORROW",
            MsgType::BookReturn => "BOOK_RETURN",
            MsgType::RepairApply => "REPAIR_APPLY",
            MsgType::RepairList => "REPAIR_LIST",
            MsgType::RepairUpdate => "REPAIR_UPDATE",
            MsgType::PaymentList => "PAYMENT_LIST",
            MsgType::PaymentPay => "PAYMENT_PAY",
            MsgType::CourseList => "COURSE_LIST",
            MsgType::CourseEnroll => "COURSE_ENROLL",
            MsgType::CourseDrop => "COURSE_DROP",
            MsgType::ShopList => "SHOP_LIST",
            MsgType::ShopOrder => "SHOP_ORDER",
            MsgType::EchoTest => "ECHO_TEST",
            MsgType::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for MsgType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "USER_LOGIN" => MsgType::UserLogin,
            "USER_LOGOUT" => MsgType::UserLogout,
            "USER_REGISTER" => MsgType::UserRegister,
            "BOOK_LIST" => MsgType::BookList,
            "BOOK_SEARCH" => MsgType::BookSearch,
            "BOOK_BORROW" => MsgType::BookBorrow,
            "BOOK_RETURN" => MsgType::BookReturn,
            "REPAIR_APPLY" => MsgType::RepairApply,
            "REPAIR_LIST" => MsgType::RepairList,
            "REPAIR_UPDATE" => MsgType::RepairUpdate,
            "PAYMENT_LIST" => MsgType::PaymentList,
            "PAYMENT_PAY" => MsgType::PaymentPay,
            "COURSE_LIST" => MsgType::CourseList,
            "COURSE_ENROLL" => MsgType::CourseEnroll,
            "COURSE_DROP" => MsgType::CourseDrop,
            "SHOP_LIST" => MsgType::ShopList,
            "SHOP_ORDER" => MsgType::ShopOrder,
            "ECHO_TEST" => MsgType::EchoTest,
            _ => MsgType::Other(s),
        }
    }
}

impl From<MsgType> for String {
    fn from(t: MsgType) -> Self {
        t.wire_name().to_owned()
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Outcome discriminator carried on responses (stable wire strings).
///
/// Requests carry `Success`; the field only becomes meaningful on the way
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Success,
    Error,
    AuthFailed,
    NotAllowed,
    NotFound,
    Conflict,
}

impl Code {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Code::Success => "SUCCESS",
            Code::Error => "ERROR",
            Code::AuthFailed => "AUTH_FAILED",
            Code::NotAllowed => "NOT_ALLOWED",
            Code::NotFound => "NOT_FOUND",
            Code::Conflict => "CONFLICT",
        }
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One request or response. Immutable once built; the constructors below are
/// the only way envelopes come into existence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique within the originating process; tracing only, never used for
    /// correlation (the connection is the correlation unit).
    pub id: u64,
    /// Requested operation (field name is `type` on the wire).
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    /// Outcome; `Success` on requests.
    pub code: Code,
    /// Opaque payload, `null` when absent.
    #[serde(default)]
    pub payload: Value,
    /// Optional origin label (client name or connection id).
    #[serde(default)]
    pub sender: Option<String>,
    /// Creation time, millis since epoch. Informative only.
    pub timestamp: u64,
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(msg_type: MsgType, payload: Value) -> Self {
        Self {
            id: next_id(),
            msg_type,
            code: Code::Success,
            payload,
            sender: None,
            timestamp: now_ms(),
        }
    }

    /// Build a response envelope from scratch.
    pub fn response(msg_type: MsgType, code: Code, payload: Value) -> Self {
        Self {
            id: next_id(),
            msg_type,
            code,
            payload,
            sender: None,
            timestamp: now_ms(),
        }
    }

    /// Attach an origin label.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Successful reply to this request.
    pub fn reply_ok(&self, payload: Value) -> Self {
        Envelope::response(self.msg_type.clone(), Code::Success, payload)
    }

    /// Failure reply to this request: the error maps to a wire code and its
    /// message becomes the human-readable payload.
    pub fn reply_err(&self, err: &WireError) -> Self {
        Envelope::response(
            self.msg_type.clone(),
            err.code(),
            Value::String(err.to_string()),
        )
    }

    /// True when the response reports success.
    pub fn is_ok(&self) -> bool {
        self.code == Code::Success
    }
}
