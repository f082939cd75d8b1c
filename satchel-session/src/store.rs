//! Session - the request-scoped store
//!
//! A [`Session`] moves between two states. `start()` pulls the payload
//! for the current identifier out of the handler and decodes it; `save()`
//! ages flash data, encodes the attributes and writes them back, leaving the
//! session unstarted again. Between those calls every operation is purely
//! in memory.

use crate::attributes::{AttributeStore, KeyList};
use crate::cast::{BackedEnum, Collection};
use crate::codec::Codec;
use crate::flash::FlashRegistry;
use crate::handler::{RequestContext, SessionHandler};
use crate::identifier::{random_alphanumeric, IdentifierPolicy};
use chrono::{NaiveDateTime, Utc};
use satchel_core::SatchelResult;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "_token";
pub const FLASH_KEY: &str = "_flash";
pub const OLD_INPUT_KEY: &str = "_old_input";
pub const PREVIOUS_URL_KEY: &str = "_previous.url";
pub const PASSWORD_CONFIRMED_KEY: &str = "auth.password_confirmed_at";
pub const TOKEN_LENGTH: usize = 40;

pub struct Session {
    id: String,
    name: String,
    attributes: AttributeStore,
    flash: FlashRegistry,
    started: bool,
    policy: IdentifierPolicy,
    codec: Box<dyn Codec>,
    handler: Arc<dyn SessionHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("started", &self.started)
            .field("codec", &self.codec.name())
            .field("attributes", &self.attributes.len())
            .finish()
    }
}

impl Session {
    /// Create an unstarted session with the default identifier policy
    ///
    /// An invalid or missing `id` is replaced with a fresh one.
    pub fn new(
        name: impl Into<String>,
        handler: Arc<dyn SessionHandler>,
        id: Option<&str>,
        codec: Box<dyn Codec>,
    ) -> Self {
        Self::with_policy(name, handler, id, codec, IdentifierPolicy::default())
    }

    pub fn with_policy(
        name: impl Into<String>,
        handler: Arc<dyn SessionHandler>,
        id: Option<&str>,
        codec: Box<dyn Codec>,
        policy: IdentifierPolicy,
    ) -> Self {
        let mut session = Self {
            id: String::new(),
            name: name.into(),
            attributes: AttributeStore::new(),
            flash: FlashRegistry::new(),
            started: false,
            policy,
            codec,
            handler,
        };
        session.set_id(id);
        session
    }

    // ----- lifecycle -----

    /// Load the session from the handler
    ///
    /// Calling it again before [`Session::save`] does nothing. A handler
    /// read failure or an undecodable payload yields an empty session.
    pub fn start(&mut self) -> bool {
        if self.started {
            return true;
        }

        self.load_session();

        if !self.has(TOKEN_KEY) {
            self.regenerate_token();
        }

        self.started = true;
        debug!(session_id = %self.id, "Session started");
        true
    }

    fn load_session(&mut self) {
        let payload = match self.handler.read(&self.id) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Session read failed, starting empty");
                Vec::new()
            }
        };

        let mut loaded = self.codec.decode(&payload);
        let persisted_flash = loaded
            .shift_remove(FLASH_KEY)
            .map(|value| FlashRegistry::from_value(&value))
            .unwrap_or_default();

        if !loaded.is_empty() {
            debug!(session_id = %self.id, keys = loaded.len(), "Loaded session payload");
        }

        let mut attributes = std::mem::take(&mut self.attributes).into_map();
        for (key, value) in loaded {
            attributes.insert(key, value);
        }
        self.attributes = AttributeStore::from(attributes);

        self.flash.merge(persisted_flash);
        self.flash.prune(&self.attributes);
    }

    /// Age flash data, encode the attributes and write them to the handler
    pub fn save(&mut self) -> SatchelResult<()> {
        self.age_flash_data();

        let mut payload = self.attributes.all().clone();
        payload.shift_remove(FLASH_KEY);
        payload.insert(FLASH_KEY.to_string(), self.flash.to_value());

        let bytes = self.codec.encode(&payload)?;
        self.handler.write(&self.id, &bytes)?;

        self.started = false;
        debug!(session_id = %self.id, bytes = bytes.len(), "Session saved");
        Ok(())
    }

    /// Move to a new identifier
    ///
    /// With `destroy`, the record under the old identifier is removed from
    /// the handler and the attributes are cleared. A failing destroy leaves
    /// the session untouched.
    pub fn migrate(&mut self, destroy: bool) -> SatchelResult<bool> {
        if destroy {
            self.handler.destroy(&self.id)?;
            self.attributes.flush();
            self.flash.reset();
        }

        let previous = std::mem::replace(&mut self.id, self.policy.generate());
        debug!(from = %previous, to = %self.id, destroy, "Session migrated");
        Ok(true)
    }

    /// New identifier, same attributes
    pub fn regenerate(&mut self) -> SatchelResult<bool> {
        self.migrate(false)
    }

    /// Clear everything, destroy the stored record and take a new identifier
    pub fn invalidate(&mut self) -> SatchelResult<bool> {
        self.flush();
        self.migrate(true)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ----- identity -----

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Use `id` if the identifier policy accepts it, otherwise a fresh one
    pub fn set_id(&mut self, id: Option<&str>) {
        match id {
            Some(id) if self.policy.is_valid(id) => self.id = id.to_string(),
            rejected => {
                if let Some(rejected) = rejected {
                    debug!(rejected, "Replacing invalid session identifier");
                }
                self.id = self.policy.generate();
            }
        }
    }

    pub fn is_valid_id(&self, id: &str) -> bool {
        self.policy.is_valid(id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ----- handler -----

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    pub fn handler_needs_request(&self) -> bool {
        self.handler.request_aware().is_some()
    }

    /// Hand `request` to a request-aware handler; returns false for any other handler
    pub fn set_request_on_handler(&self, request: RequestContext) -> bool {
        match self.handler.request_aware() {
            Some(handler) => {
                handler.set_request(request);
                true
            }
            None => false,
        }
    }

    // ----- attributes -----

    /// Every attribute, without flash bookkeeping
    pub fn all(&self) -> &Map<String, Value> {
        self.attributes.all()
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.attributes.get_or(key, default)
    }

    pub fn has(&self, keys: impl KeyList) -> bool {
        self.attributes.has(keys)
    }

    pub fn exists(&self, keys: impl KeyList) -> bool {
        self.attributes.exists(keys)
    }

    pub fn missing(&self, keys: impl KeyList) -> bool {
        self.attributes.missing(keys)
    }

    pub fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.put(key, value);
    }

    pub fn put_many(&mut self, values: Map<String, Value>) {
        self.attributes.put_many(values);
    }

    pub fn replace(&mut self, values: Map<String, Value>) {
        self.attributes.replace(values);
    }

    pub fn push(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.push(key, value);
    }

    pub fn increment(&mut self, key: &str, by: i64) -> Value {
        self.attributes.increment(key, by)
    }

    pub fn decrement(&mut self, key: &str, by: i64) -> Value {
        self.attributes.decrement(key, by)
    }

    /// Delete `key` and return its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.flash.discard(key);
        self.attributes.remove(key)
    }

    /// Delete `key`, returning its value or `default` when it was absent
    pub fn pull(&mut self, key: &str, default: impl Into<Value>) -> Value {
        self.remove(key).unwrap_or_else(|| default.into())
    }

    pub fn forget(&mut self, keys: impl KeyList) {
        let keys = keys.key_list();
        for key in &keys {
            self.flash.discard(key);
        }
        self.attributes.forget(keys);
    }

    pub fn forget_many(&mut self, keys: impl KeyList) {
        self.forget(keys);
    }

    pub fn only(&self, keys: impl KeyList) -> Map<String, Value> {
        self.attributes.only(keys)
    }

    /// Remove every attribute and all flash bookkeeping
    pub fn flush(&mut self) {
        self.attributes.flush();
        self.flash.reset();
    }

    /// Existing non-null value at `key`, or the stored result of `producer`
    pub fn remember<V, F>(&mut self, key: &str, producer: F) -> Value
    where
        V: Into<Value>,
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key).filter(|value| !value.is_null()) {
            return value.clone();
        }

        let value = producer().into();
        self.put(key, value.clone());
        value
    }

    // ----- typed accessors -----

    pub fn string(&self, key: &str, default: &str) -> String {
        self.attributes.string(key, default)
    }

    pub fn boolean(&self, key: &str, default: bool) -> bool {
        self.attributes.boolean(key, default)
    }

    pub fn integer(&self, key: &str, default: i64) -> i64 {
        self.attributes.integer(key, default)
    }

    pub fn float(&self, key: &str, default: f64) -> f64 {
        self.attributes.float(key, default)
    }

    pub fn date(&self, key: &str, format: Option<&str>) -> SatchelResult<Option<NaiveDateTime>> {
        self.attributes.date(key, format)
    }

    pub fn enum_value<E: BackedEnum>(&self, key: &str) -> Option<E> {
        self.attributes.enum_value(key)
    }

    pub fn collect(&self, key: Option<&str>) -> Collection {
        self.attributes.collect(key)
    }

    pub fn collect_only(&self, keys: impl KeyList) -> Collection {
        self.attributes.collect_only(keys)
    }

    // ----- flash -----

    /// Store `value` for this request and the next
    pub fn flash(&mut self, key: &str, value: impl Into<Value>) {
        self.put(key, value);
        self.flash.mark_new(key);
    }

    /// Store `value` for this request only
    pub fn now(&mut self, key: &str, value: impl Into<Value>) {
        self.put(key, value);
        self.flash.mark_now(key);
    }

    pub fn reflash(&mut self) {
        self.flash.reflash();
    }

    /// Keep the listed aging keys for one more request
    pub fn keep(&mut self, keys: impl KeyList) {
        self.flash.keep(keys.key_list());
    }

    /// Drop expired flash data and promote the current generation
    pub fn age_flash_data(&mut self) {
        self.flash.age(&mut self.attributes);
    }

    pub fn flash_registry(&self) -> &FlashRegistry {
        &self.flash
    }

    /// Flash the request input so the next request can repopulate a form
    pub fn flash_input(&mut self, input: Map<String, Value>) {
        self.flash(OLD_INPUT_KEY, Value::Object(input));
    }

    /// With no key, whether any old input exists; with a key, whether it
    /// holds a non-null value
    pub fn has_old_input(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => self
                .attributes
                .get(&old_input_path(key))
                .is_some_and(|value| !value.is_null()),
            None => !self.old_input().is_empty(),
        }
    }

    pub fn get_old_input(&self, key: &str, default: impl Into<Value>) -> Value {
        self.attributes.get_or(&old_input_path(key), default)
    }

    /// The whole old-input bag
    pub fn old_input(&self) -> Map<String, Value> {
        match self.attributes.get(OLD_INPUT_KEY) {
            Some(Value::Object(bag)) => bag.clone(),
            _ => Map::new(),
        }
    }

    // ----- reserved keys -----

    pub fn token(&self) -> Option<&str> {
        self.attributes.get(TOKEN_KEY).and_then(Value::as_str)
    }

    pub fn regenerate_token(&mut self) {
        self.put(TOKEN_KEY, random_alphanumeric(TOKEN_LENGTH));
    }

    pub fn previous_url(&self) -> Option<&str> {
        self.attributes.get(PREVIOUS_URL_KEY).and_then(Value::as_str)
    }

    pub fn set_previous_url(&mut self, url: impl Into<String>) {
        self.put(PREVIOUS_URL_KEY, url.into());
    }

    /// Record that the user just confirmed their password
    pub fn password_confirmed(&mut self) {
        self.put(PASSWORD_CONFIRMED_KEY, Utc::now().timestamp());
    }
}

fn old_input_path(key: &str) -> String {
    format!("{}.{}", OLD_INPUT_KEY, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::handler::{ArrayHandler, CookieHandler, NullHandler};
    use serde_json::json;

    fn session() -> Session {
        Session::new("name", Arc::new(NullHandler), None, Box::new(JsonCodec))
    }

    #[test]
    fn test_invalid_id_is_replaced() {
        let mut session = session();
        assert!(session.is_valid_id(session.id()));

        session.set_id(Some("wrong"));
        assert_ne!(session.id(), "wrong");
        assert!(session.is_valid_id(session.id()));

        session.set_id(None);
        assert!(session.is_valid_id(session.id()));

        let valid = "b".repeat(40);
        session.set_id(Some(&valid));
        assert_eq!(session.id(), valid);
    }

    #[test]
    fn test_start_is_idempotent() {
        let handler = Arc::new(ArrayHandler::new(60));
        let mut session = Session::new("name", handler.clone(), None, Box::new(JsonCodec));
        assert!(session.start());
        let token = session.token().unwrap().to_string();
        assert_eq!(token.len(), TOKEN_LENGTH);

        session.put("foo", "bar");
        handler.write(session.id(), br#"{"foo":"other"}"#).unwrap();
        session.start();

        assert_eq!(session.get("foo"), Some(&json!("bar")));
        assert_eq!(session.token(), Some(token.as_str()));
    }

    #[test]
    fn test_remove_discards_flash_tracking() {
        let mut session = session();
        session.flash("notice", "saved");
        assert!(session.flash_registry().is_new("notice"));

        assert_eq!(session.remove("notice"), Some(json!("saved")));
        assert!(session.flash_registry().is_empty());
    }

    #[test]
    fn test_old_input_bag() {
        let mut session = session();
        assert!(!session.has_old_input(None));
        assert!(session.old_input().is_empty());

        let input = match json!({"user": {"email": "a@b.c"}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        session.flash_input(input);

        assert!(session.has_old_input(Some("user.email")));
        assert_eq!(session.get_old_input("user.email", Value::Null), json!("a@b.c"));
        assert_eq!(session.old_input().len(), 1);
    }

    #[test]
    fn test_request_passthrough() {
        let session = session();
        assert!(!session.handler_needs_request());
        assert!(!session.set_request_on_handler(RequestContext::new()));

        let cookie = Session::new(
            "name",
            Arc::new(CookieHandler::new(60, false)),
            None,
            Box::new(JsonCodec),
        );
        assert!(cookie.handler_needs_request());
        assert!(cookie.set_request_on_handler(RequestContext::new()));
    }

    #[test]
    fn test_remember_ignores_null() {
        let mut session = session();
        session.put("key", Value::Null);
        let value = session.remember("key", || "fresh");
        assert_eq!(value, json!("fresh"));
        assert_eq!(session.get("key"), Some(&json!("fresh")));
    }

    #[test]
    fn test_debug_omits_values() {
        let mut session = session();
        session.put("secret", "hunter2");
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("Session"));
        assert!(!rendered.contains("hunter2"));
    }
}
