//! OMEMO device manager
//!
//! [`Omemo`] owns the local device: it keeps our bundle, learns peer devices
//! and bundles from published documents, and turns plaintexts into
//! [`EncryptedEnvelope`]s and back, creating ratchet sessions on demand.
//!
//! # Critical Section
//!
//! Every operation that reads and writes the store runs under one mutex, so a
//! session is never loaded twice and saved out of order.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use omemo_crypto::{KEY_SIZE, cipher};
use omemo_proto::{
    BundleDocument, DeviceId, DeviceListDocument, EncryptedEnvelope, HeaderKey, OlmMessage,
    PeerId, PreKeyMessage, split_mac,
};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    bundle::OmemoBundle,
    config::OmemoConfig,
    env::Environment,
    error::{OmemoError, SessionError},
    handshake::{generate_key_pair, receiver_triple_dh, sender_triple_dh},
    session::RatchetSession,
    state::RatchetState,
    store::{OmemoStore, StoreError},
};

/// Local OMEMO device
///
/// # Invariants
///
/// - A session is saved before the envelope that advanced it is returned,
///   so no chain key is ever used twice.
/// - A one-time pre-key is removed from our bundle (and replaced) only after
///   the session it created is saved. If that removal fails, the next
///   pre-key message naming the key rebuilds the same session.
pub struct Omemo<S: OmemoStore, E: Environment> {
    store: S,
    env: E,
    config: OmemoConfig,
    device_id: DeviceId,
    critical: Mutex<()>,
    bundle_changed: AtomicBool,
}

impl<S: OmemoStore, E: Environment> Omemo<S, E> {
    /// Load our device from `store`, generating and saving a fresh bundle on
    /// first use.
    ///
    /// # Errors
    ///
    /// - `Store` if the bundle cannot be loaded or saved
    pub fn new(store: S, env: E, config: OmemoConfig) -> Result<Self, OmemoError> {
        let device_id = match store.current_device_bundle()? {
            Some(bundle) => bundle.device_id(),
            None => {
                let bundle = OmemoBundle::generate(&env, config.pre_key_count);
                store.save_current_device_bundle(&bundle)?;
                tracing::info!(device = %bundle.device_id(), "generated device bundle");
                bundle.device_id()
            }
        };

        Ok(Self {
            store,
            env,
            config,
            device_id,
            critical: Mutex::new(()),
            bundle_changed: AtomicBool::new(true),
        })
    }

    /// Our device id.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Configuration in effect.
    pub fn config(&self) -> &OmemoConfig {
        &self.config
    }

    /// Device list to publish for `own_peer`: this device only.
    pub fn device_list(&self, own_peer: &PeerId) -> DeviceListDocument {
        DeviceListDocument { peer: own_peer.clone(), devices: vec![self.device_id] }
    }

    /// Our bundle as a publishable document.
    ///
    /// # Errors
    ///
    /// - `Store` if the bundle cannot be loaded
    pub fn bundle_document(&self) -> Result<BundleDocument, OmemoError> {
        let _guard = self.lock();
        Ok(self.current_bundle()?.to_document())
    }

    /// Our bundle document if it changed since the last call (or was never
    /// published).
    ///
    /// # Errors
    ///
    /// - `Store` if the bundle cannot be loaded; the change stays pending
    pub fn take_bundle_publish(&self) -> Result<Option<BundleDocument>, OmemoError> {
        let _guard = self.lock();
        if !self.bundle_changed.load(Ordering::Acquire) {
            return Ok(None);
        }

        let document = self.current_bundle()?.to_document();
        self.bundle_changed.store(false, Ordering::Release);
        Ok(Some(document))
    }

    /// Record the devices a peer advertises. Our own device is skipped.
    ///
    /// # Errors
    ///
    /// - `Store` if a device id cannot be saved
    pub fn handle_device_list(&self, document: &DeviceListDocument) -> Result<(), OmemoError> {
        let _guard = self.lock();
        for &device in &document.devices {
            if device == self.device_id {
                continue;
            }
            self.store.save_device_id(&document.peer, device)?;
        }

        tracing::debug!(
            peer = %document.peer,
            devices = document.devices.len(),
            "device list updated"
        );
        Ok(())
    }

    /// Record a peer's published bundle. Returns false if it is our own.
    ///
    /// # Errors
    ///
    /// - `InvalidBundle` if a key in the document is malformed
    /// - `Store` if the bundle cannot be saved
    pub fn handle_bundle(&self, document: &BundleDocument) -> Result<bool, OmemoError> {
        if document.device_id == self.device_id {
            tracing::debug!("ignoring our own bundle");
            return Ok(false);
        }

        let bundle = OmemoBundle::from_document(document).map_err(OmemoError::InvalidBundle)?;

        let _guard = self.lock();
        self.store.save_bundle(bundle.device_id(), &bundle)?;

        tracing::debug!(
            device = %bundle.device_id(),
            pre_keys = bundle.pre_keys().len(),
            "bundle updated"
        );
        Ok(true)
    }

    /// Encrypt `plaintext` for every known device of every recipient.
    ///
    /// The body is encrypted once under a fresh key. That key is sent through
    /// each device's session, as a pre-key message until the device has
    /// answered. Devices without a session and without a usable bundle are
    /// skipped.
    ///
    /// # Errors
    ///
    /// - `Store` on any store failure; sessions already saved for earlier
    ///   devices stay advanced
    /// - `Session` if a ratchet operation fails
    pub fn encrypt(
        &self,
        recipients: &[PeerId],
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope, OmemoError> {
        let _guard = self.lock();

        let mut body_key: [u8; KEY_SIZE] = self.env.random_array();
        let iv: [u8; cipher::IV_SIZE] = self.env.random_array();
        let payload = cipher::encrypt(&body_key, &iv, plaintext).map_err(OmemoError::Payload)?;

        let result = self.encrypt_body_key(recipients, &body_key);
        body_key.zeroize();
        let keys = result?;

        tracing::debug!(recipients = keys.len(), len = payload.len(), "encrypted envelope");
        Ok(EncryptedEnvelope { sender_device_id: self.device_id, iv, keys, payload })
    }

    /// Decrypt an envelope addressed to this device.
    ///
    /// A pre-key entry naming one of our one-time pre-keys starts a new
    /// session; that pre-key is then removed and replaced. A pre-key entry
    /// naming a pre-key we no longer hold continues the existing session.
    ///
    /// # Errors
    ///
    /// - `NoMatchingSession` if the envelope has no entry for us, or no
    ///   session exists or can be built for the sender
    /// - `Session` if the ratchet rejects the message
    /// - `Payload` if the body does not decrypt under the recovered key; the
    ///   session and bundle are left as they were
    /// - `Store` on any store failure
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, OmemoError> {
        let _guard = self.lock();
        let sender = envelope.sender_device_id;

        let Some(header) = envelope.key_for(self.device_id) else {
            return Err(OmemoError::NoMatchingSession {
                sender,
                reason: "envelope carries no key for this device",
            });
        };

        let existing = self.store.session(sender)?;
        let (mut state, message, consumed) = if header.pre_key {
            self.pre_key_session(sender, &header.key, existing)?
        } else {
            let Some(state) = existing else {
                return Err(OmemoError::NoMatchingSession {
                    sender,
                    reason: "no session with sender",
                });
            };
            (state, header.key.clone(), None)
        };

        let body_key = Zeroizing::new(
            RatchetSession::new(&mut state, &self.env, &self.config)
                .read_message(&message, header.pre_key)?,
        );

        // A body that fails to decrypt must not use up the chain index or
        // the one-time pre-key
        let plaintext = cipher::decrypt(&body_key, &envelope.iv, &envelope.payload)
            .map_err(OmemoError::Payload)?;

        self.store.save_session(sender, &state)?;
        if let Some(bundle) = consumed {
            self.store.save_current_device_bundle(&bundle)?;
            self.bundle_changed.store(true, Ordering::Release);
            tracing::info!(
                sender = %sender,
                remaining = bundle.pre_keys().len(),
                "one-time pre-key consumed and replaced"
            );
        }

        tracing::debug!(sender = %sender, pre_key = header.pre_key, "decrypted envelope");
        Ok(plaintext)
    }

    fn encrypt_body_key(
        &self,
        recipients: &[PeerId],
        body_key: &[u8],
    ) -> Result<Vec<HeaderKey>, OmemoError> {
        let mut keys = Vec::new();

        for recipient in recipients {
            let devices = self.store.device_ids(recipient)?;
            if devices.is_empty() {
                tracing::warn!(peer = %recipient, "no known devices");
            }

            for device in devices {
                if device == self.device_id {
                    continue;
                }

                let (mut state, pre_key) = match self.store.session(device)? {
                    Some(state) => {
                        let pre_key = !state.is_established();
                        (state, pre_key)
                    }
                    None => match self.sender_session(device)? {
                        Some(state) => (state, true),
                        None => continue,
                    },
                };

                let mut session = RatchetSession::new(&mut state, &self.env, &self.config);
                let key = if pre_key {
                    session.create_pre_key_message(body_key)?
                } else {
                    session.create_message(body_key)?
                };
                self.store.save_session(device, &state)?;

                keys.push(HeaderKey { recipient_device_id: device, pre_key, key });
            }
        }

        Ok(keys)
    }

    /// New sender session against a random one-time pre-key of `device`.
    /// `None` if we have no usable bundle for it.
    fn sender_session(&self, device: DeviceId) -> Result<Option<RatchetState>, OmemoError> {
        let Some(their_bundle) = self.store.bundle(device)? else {
            tracing::warn!(device = %device, "no bundle for device, skipping");
            return Ok(None);
        };
        let Some(one_time_key) = their_bundle.random_pre_key(&self.env) else {
            tracing::warn!(device = %device, "bundle has no one-time pre-keys, skipping");
            return Ok(None);
        };

        let own = self.current_bundle()?;
        let ephemeral = generate_key_pair(&self.env);
        let secret = sender_triple_dh(
            own.identity_key(),
            &ephemeral,
            their_bundle.identity_key().public_key(),
            one_time_key.public_key(),
        )
        .map_err(SessionError::from)?;

        tracing::debug!(device = %device, "created sender session");
        Ok(Some(RatchetState::initialize_as_sender(
            &secret,
            own.identity_key().clone(),
            ephemeral,
            *one_time_key.public_key(),
            &self.env,
        )))
    }

    /// Session and inner message for a pre-key entry, plus our updated bundle
    /// if one of our one-time pre-keys was consumed.
    fn pre_key_session(
        &self,
        sender: DeviceId,
        bytes: &[u8],
        existing: Option<RatchetState>,
    ) -> Result<(RatchetState, Vec<u8>, Option<OmemoBundle>), OmemoError> {
        let pre_key = PreKeyMessage::decode(bytes)?;
        let mut bundle = self.current_bundle()?;

        let Some(one_time_key) = bundle.find_pre_key(&pre_key.one_time_key) else {
            return match existing {
                Some(state) => Ok((state, pre_key.message, None)),
                None => Err(OmemoError::NoMatchingSession {
                    sender,
                    reason: "unknown one-time pre-key",
                }),
            };
        };

        let secret = receiver_triple_dh(
            bundle.identity_key(),
            one_time_key,
            &pre_key.identity_key,
            &pre_key.base_key,
        )
        .map_err(SessionError::from)?;
        let (body, _) = split_mac(&pre_key.message)?;
        let inner = OlmMessage::decode(body)?;
        let state = RatchetState::initialize_as_receiver(&secret, &inner.ratchet_key)
            .map_err(SessionError::from)?;

        bundle.remove_pre_key(&pre_key.one_time_key);
        bundle.replenish(&self.env, self.config.pre_key_count);

        tracing::debug!(sender = %sender, "created receiver session");
        Ok((state, pre_key.message, Some(bundle)))
    }

    fn current_bundle(&self) -> Result<OmemoBundle, OmemoError> {
        Ok(self
            .store
            .current_device_bundle()?
            .ok_or(StoreError::NotFound("current device bundle"))?)
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.critical.lock().expect("Mutex poisoned")
    }
}
