// Logging macros for every module; see `observability` for how the backend is chosen.

#[allow(unused_imports)]
pub(crate) use crate::observability::{log_debug as debug, log_info as info, log_warn as warn};
