// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod routes {
    pub use crate::routes::*;
}

pub mod session_handler {
    pub use crate::session_handler::*;
}

pub mod webhook_handler {
    pub use crate::webhook_handler::*;
}
