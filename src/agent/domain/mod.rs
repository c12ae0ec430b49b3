//! Values owned by the desktop agent façade.

mod info;
mod opened;

pub use info::{
    FDC3_VERSION, ImplementationMetadata, OptionalFeatures, PROVIDER, PROVIDER_VERSION,
};
pub use opened::{MalformedOpenedContextId, OpenedContextId, OpenedContextStore};
