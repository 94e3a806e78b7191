pub mod address;
pub mod config;
pub mod crypto;
pub mod message;
pub mod models;
pub mod nonce;
pub mod utils;

pub use self::address::{Address, AddressError};
pub use self::config::{Config, ConfigError, RunMode};
pub use self::crypto::{Signature, SignatureError};
pub use self::message::{MessageError, SignInMessage, TimeStamp, DEFAULT_STATEMENT};
pub use self::nonce::{Nonce, NonceError};
pub use self::utils::*;
