//! Satchel Session - request-scoped session store
//!
//! The engine behind a [`Session`]: a dot-path [`AttributeStore`], a
//! two-generation [`FlashRegistry`], identifier and CSRF token lifecycle,
//! and pluggable [`Codec`]s and [`SessionHandler`] backends.

pub mod attributes;
pub mod cast;
pub mod codec;
pub mod flash;
pub mod handler;
pub mod identifier;
pub mod manager;
pub mod store;

pub use attributes::{AttributeStore, KeyList};
pub use cast::{BackedEnum, Collection};
pub use codec::{codec_for, Codec, JsonCodec, NativeCodec};
pub use flash::FlashRegistry;
pub use handler::{
    ArrayHandler, CookieHandler, FileHandler, NullHandler, QueuedCookie, RequestAwareHandler,
    RequestContext, SessionHandler, StorageStats,
};
pub use identifier::IdentifierPolicy;
pub use manager::SessionManager;
pub use store::{
    Session, FLASH_KEY, OLD_INPUT_KEY, PASSWORD_CONFIRMED_KEY, PREVIOUS_URL_KEY, TOKEN_KEY,
};

// Re-export core types
pub use satchel_core::{SatchelConfig, SatchelError, SatchelResult};
