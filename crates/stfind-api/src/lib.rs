// stfind-api: Async Rust client for the SmartThings Find web service
//
// Two remote services are involved: the Samsung account service, which runs
// the QR-code login (`login`), and the Find service, which serves devices
// and accepts operations (`FindClient`).

pub mod client;
mod devices;
pub mod endpoints;
pub mod error;
pub mod login;
pub mod models;
pub mod operations;
pub mod transport;

pub use client::{FindClient, SESSION_COOKIE};
pub use endpoints::Endpoints;
pub use error::{Error, FailureClass};
pub use login::{ApprovalStatus, LoginClient, PendingLogin};
pub use models::{DeviceOperations, EncLocation, FindDevice, Operation, PartLocation};
pub use transport::TransportConfig;
