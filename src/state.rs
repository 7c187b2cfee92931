//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::{IdentityVerifier, SessionSigner};
use crate::config::AccessFlags;
use crate::media::MediaHost;
use crate::store::{CartStore, CatalogStore, OrderStore, UserStore, WishlistStore};

/// Store clients and credential verifiers, injected once at startup.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub carts: Arc<dyn CartStore>,
    pub wishlists: Arc<dyn WishlistStore>,
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
    pub sessions: Arc<SessionSigner>,
    pub identity: Arc<dyn IdentityVerifier>,
    /// `None` when the media host is not configured.
    pub media: Option<Arc<dyn MediaHost>>,
    pub access: AccessFlags,
    pub secure_cookies: bool,
}

impl AppState {
    /// Wires every store trait to one backend.
    pub fn from_store<S>(store: Arc<S>, sessions: SessionSigner, identity: Arc<dyn IdentityVerifier>) -> Self
    where
        S: CatalogStore + CartStore + WishlistStore + UserStore + OrderStore + 'static,
    {
        Self {
            catalog: store.clone(),
            carts: store.clone(),
            wishlists: store.clone(),
            users: store.clone(),
            orders: store,
            sessions: Arc::new(sessions),
            identity,
            media: None,
            access: AccessFlags::default(),
            secure_cookies: false,
        }
    }

    pub fn with_media(mut self, media: Arc<dyn MediaHost>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}
