// Domain-layer modules and shared errors/models
pub mod rating {
    pub use crate::rating::*;
}

pub mod reconciler {
    pub use crate::reconciler::*;
}

pub mod route_guard {
    pub use crate::route_guard::*;
}

pub mod forms {
    pub use crate::forms::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
