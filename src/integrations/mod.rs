//! External service integrations.

pub mod stripe_client {
    pub use crate::stripe_client::*;
}

pub mod stripe_models {
    pub use crate::stripe_models::*;
}

pub mod uploads {
    pub use crate::uploads::*;
}

pub mod link_preview {
    pub use crate::link_preview::*;
}
