//! Pass/nonce authentication for the ImobState service
//!
//! The peer first writes the nonce characteristic; whatever it writes is
//! ignored and the device publishes a freshly generated nonce instead. Only
//! then is a pass write accepted. A pass that does not match the device
//! credential byte for byte resets everything (fail closed). Malformed or
//! out-of-order writes are dropped without telling the peer.

use crate::cipher::CtrCipher;
use crate::credential::{Credential, CryptoKey};
use crate::error::CipherError;
use crate::nonce::NonceAuthority;
use crate::publish::{publish, publish_flag};
use crate::session::Session;
use imob_mcu::{validate_write, BlockCipher, Delay, GattServer, RandomSource};
use imob_proto::{format_address, Attribute, Block, PeerAddress, MAC_LEN, NONCE_LEN, PASS_LEN};
use log::*;

const DEFAULT_PASS: Block = [0u8; PASS_LEN];
const DEFAULT_NONCE: Block = [0u8; NONCE_LEN];
const DEFAULT_PEER: PeerAddress = [0u8; MAC_LEN];

/// Where the current link is in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No fresh nonce on this link
    Reset,
    /// A fresh nonce has been published, waiting for a pass
    NonceIssued,
    /// A pass was submitted but not (yet) confirmed
    PassPending,
    /// The submitted pass matched
    Authenticated,
}

pub struct Authenticator<C, R, D> {
    cipher: CtrCipher<C>,
    nonces: NonceAuthority<R, D>,
    credential: Credential,
    key: CryptoKey,
    pass: Block,
    nonce: Block,
    recent_peer: PeerAddress,
    pass_updated: bool,
    pass_usable: bool,
    nonce_updated: bool,
}

impl<C: BlockCipher, R: RandomSource, D: Delay> Authenticator<C, R, D> {
    pub fn new(
        cipher: CtrCipher<C>,
        nonces: NonceAuthority<R, D>,
        credential: Credential,
        key: CryptoKey,
    ) -> Self {
        Self {
            cipher,
            nonces,
            credential,
            key,
            pass: DEFAULT_PASS,
            nonce: DEFAULT_NONCE,
            recent_peer: DEFAULT_PEER,
            pass_updated: false,
            pass_usable: false,
            nonce_updated: false,
        }
    }

    pub fn state(&self, session: &Session) -> AuthState {
        if session.is_authenticated() {
            AuthState::Authenticated
        } else if self.pass_updated {
            AuthState::PassPending
        } else if self.nonce_updated {
            AuthState::NonceIssued
        } else {
            AuthState::Reset
        }
    }

    /// The nonce currently published to the peer
    pub fn nonce(&self) -> &Block {
        &self.nonce
    }

    /// The last pass submitted (cleared on reset)
    pub fn pass(&self) -> &Block {
        &self.pass
    }

    pub fn nonce_updated(&self) -> bool {
        self.nonce_updated
    }

    /// Drop authentication and clear the pass, both internally and on the
    /// pass characteristic
    pub fn reset_authentication_values<G: GattServer>(
        &mut self,
        session: &mut Session,
        gatt: &mut G,
    ) {
        self.update_authentication_value(false, session, gatt);
        self.pass_updated = false;
        self.pass_usable = false;
        self.pass = DEFAULT_PASS;
        publish(gatt, Attribute::Pass, &self.pass);
    }

    /// Handle a peer write. Every write, whatever its target, re-runs the
    /// pass check while a submitted pass is outstanding.
    pub fn on_data_written<G: GattServer>(
        &mut self,
        attribute: Attribute,
        data: &[u8],
        session: &mut Session,
        gatt: &mut G,
    ) {
        if matches!(attribute, Attribute::Pass | Attribute::Nonce | Attribute::Activation) {
            match validate_write(attribute, data) {
                Ok(()) => self.dispatch_write(attribute, data, session, gatt),
                Err(reason) => debug!("[AUTH] Dropped {} write: {}", attribute, reason),
            }
        }

        if self.pass_updated {
            self.check_pass(session, gatt);
        }
    }

    pub fn on_connect<G: GattServer>(
        &mut self,
        peer: PeerAddress,
        session: &mut Session,
        gatt: &mut G,
    ) {
        if peer != self.recent_peer {
            info!("[AUTH] New peer {}, nonce reset", format_address(&peer));
            self.recent_peer = peer;
            self.update_nonce_updated_value(false, gatt);
            self.nonce = DEFAULT_NONCE;
            publish(gatt, Attribute::Nonce, &self.nonce);
        } else {
            info!("[AUTH] Peer {} reconnected", format_address(&peer));
        }

        session.set_user_connected(true);
    }

    pub fn on_disconnect<G: GattServer>(&mut self, session: &mut Session, gatt: &mut G) {
        self.reset_authentication_values(session, gatt);
        session.set_user_connected(false);
    }

    /// Arm or disarm, publishing the new value
    pub fn update_activation_value<G: GattServer>(
        &mut self,
        armed: bool,
        session: &mut Session,
        gatt: &mut G,
    ) {
        if armed != session.is_activated() {
            info!("[AUTH] Device {}", if armed { "armed" } else { "disarmed" });
        }
        session.set_activated(armed);
        publish_flag(gatt, Attribute::Activation, armed);
    }

    fn dispatch_write<G: GattServer>(
        &mut self,
        attribute: Attribute,
        data: &[u8],
        session: &mut Session,
        gatt: &mut G,
    ) {
        match attribute {
            Attribute::Pass => {
                if !self.nonce_updated {
                    debug!("[AUTH] Dropped pass write: no fresh nonce on this link");
                    return;
                }
                let mut candidate = DEFAULT_PASS;
                candidate.copy_from_slice(data);
                self.on_pass_write(candidate);
            }
            Attribute::Nonce => self.on_nonce_write(gatt),
            Attribute::Activation => {
                if !session.is_authenticated() {
                    debug!("[AUTH] Dropped activation write: not authenticated");
                    return;
                }
                self.update_activation_value(data[0] == 1, session, gatt);
            }
            _ => {}
        }
    }

    fn on_pass_write(&mut self, candidate: Block) {
        self.pass_updated = true;
        self.pass = candidate;

        self.pass_usable = match self.round_trip_pass() {
            Ok(()) => true,
            Err(e) => {
                warn!("[AUTH] Cipher unavailable, pass cannot be checked: {}", e);
                false
            }
        };
    }

    /// The pass arrives in the clear. It is encrypted and decrypted again with
    /// the keystream of the current nonce, rewinding the counter in between,
    /// so the comparison sees the submitted bytes unchanged.
    fn round_trip_pass(&mut self) -> Result<(), CipherError> {
        self.cipher.init(&self.nonce, self.key.as_bytes());
        self.cipher.encrypt(&mut self.pass)?;
        self.cipher.init(&self.nonce, self.key.as_bytes());
        self.cipher.decrypt(&mut self.pass)
    }

    fn on_nonce_write<G: GattServer>(&mut self, gatt: &mut G) {
        // The peer's bytes are never used: the counter part is zeroed and
        // the random part comes from our own RNG.
        let mut fresh = DEFAULT_NONCE;
        match self.nonces.generate(&mut fresh) {
            Ok(()) => {
                self.nonce = fresh;
                self.update_nonce_updated_value(true, gatt);
                publish(gatt, Attribute::Nonce, &self.nonce);
                self.cipher.init(&self.nonce, self.key.as_bytes());
                info!("[AUTH] Issued fresh nonce");
            }
            Err(e) => {
                error!("[AUTH] Nonce generation failed: {}", e);
                self.nonce = DEFAULT_NONCE;
                self.update_nonce_updated_value(false, gatt);
                publish(gatt, Attribute::Nonce, &self.nonce);
            }
        }
    }

    fn check_pass<G: GattServer>(&mut self, session: &mut Session, gatt: &mut G) {
        if self.pass_usable && self.credential.matches(&self.pass) {
            if !session.is_authenticated() {
                info!("[AUTH] Pass accepted");
            }
            self.update_authentication_value(true, session, gatt);
            session.latch_initial_activation();
        } else {
            info!("[AUTH] Pass rejected");
            self.reset_authentication_values(session, gatt);
        }
    }

    fn update_authentication_value<G: GattServer>(
        &mut self,
        value: bool,
        session: &mut Session,
        gatt: &mut G,
    ) {
        session.set_authenticated(value);
        publish_flag(gatt, Attribute::Authentication, value);
    }

    fn update_nonce_updated_value<G: GattServer>(&mut self, value: bool, gatt: &mut G) {
        self.nonce_updated = value;
        publish_flag(gatt, Attribute::NonceUpdated, value);
    }
}
