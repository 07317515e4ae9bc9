//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `shadowlink_core::defaults`.

use shadowlink_core::defaults;

/// Generate default value functions that forward to shadowlink_core::defaults constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_local_port            => DEFAULT_LOCAL_PORT: u16,
    default_idle_timeout_secs     => DEFAULT_IDLE_TIMEOUT_SECS: u64,
    default_connect_timeout_secs  => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_workers               => DEFAULT_WORKERS: usize,
    default_relay_buffer_size     => DEFAULT_RELAY_BUFFER_SIZE: usize,
    default_max_pending_bytes     => DEFAULT_MAX_PENDING_BYTES: usize,
    // TCP socket options
    default_tcp_no_delay          => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs    => DEFAULT_TCP_KEEPALIVE_SECS: u64,
    default_tcp_prefer_ipv4       => DEFAULT_TCP_PREFER_IPV4: bool,
}

default_string_fns! {
    default_method        => DEFAULT_METHOD,
    default_local_address => DEFAULT_LOCAL_ADDRESS,
}
