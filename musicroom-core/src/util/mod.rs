mod id;

pub use id::*;

use tokio::runtime::Handle;

/// Returns the handle of the tokio runtime the caller runs in, if any.
pub fn current_handle() -> Option<Handle> {
    Handle::try_current().ok()
}
