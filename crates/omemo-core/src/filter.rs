//! Message filters
//!
//! A transport runs every inbound message through its input filters and
//! every outbound message through its output filters. A filter returns
//! `Ok(true)` when it handled the message.

use omemo_proto::ChatMessage;

use crate::{env::Environment, error::OmemoError, omemo::Omemo, store::OmemoStore};

/// Inspects and possibly rewrites inbound messages
pub trait InputFilter<T> {
    /// Error returned when the message was meant for this filter but could
    /// not be processed
    type Error;

    /// Process `message`. `Ok(false)` means it was not meant for this filter.
    fn input(&self, message: &mut T) -> Result<bool, Self::Error>;
}

/// Inspects and possibly rewrites outbound messages
pub trait OutputFilter<T> {
    /// Error returned when the message was meant for this filter but could
    /// not be processed
    type Error;

    /// Process `message`. `Ok(false)` means it was left untouched.
    fn output(&self, message: &mut T) -> Result<bool, Self::Error>;
}

/// Replaces an encrypted envelope with its plaintext body.
impl<S: OmemoStore, E: Environment> InputFilter<ChatMessage> for Omemo<S, E> {
    type Error = OmemoError;

    fn input(&self, message: &mut ChatMessage) -> Result<bool, OmemoError> {
        let Some(envelope) = message.encrypted.as_ref() else {
            return Ok(false);
        };

        let plaintext = self.decrypt(envelope)?;
        let body = String::from_utf8(plaintext).map_err(|_| OmemoError::InvalidBody)?;

        message.body = Some(body);
        message.encrypted = None;
        Ok(true)
    }
}

/// Encrypts a plaintext body for every device of every recipient.
impl<S: OmemoStore, E: Environment> OutputFilter<ChatMessage> for Omemo<S, E> {
    type Error = OmemoError;

    fn output(&self, message: &mut ChatMessage) -> Result<bool, OmemoError> {
        if message.encrypted.is_some() {
            return Ok(false);
        }
        let Some(body) = message.body.as_ref() else {
            return Ok(false);
        };

        let envelope = self.encrypt(&message.to, body.as_bytes())?;

        message.encrypted = Some(envelope);
        message.body = None;
        Ok(true)
    }
}
