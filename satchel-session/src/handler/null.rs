//! Handler that persists nothing

use super::SessionHandler;
use satchel_core::SatchelResult;

/// Every read is empty and every write is dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl SessionHandler for NullHandler {
    fn read(&self, _id: &str) -> SatchelResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn write(&self, _id: &str, _payload: &[u8]) -> SatchelResult<()> {
        Ok(())
    }

    fn destroy(&self, _id: &str) -> SatchelResult<()> {
        Ok(())
    }
}
