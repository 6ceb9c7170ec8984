#[allow(unused)]
#[cfg(all(not(test), not(feature = "defmt"), not(feature = "test-utils")))]
mod no_defmt {
    #[macro_export]
    macro_rules! debug {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }

    #[macro_export]
    macro_rules! error {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }
}

#[cfg(all(not(test), not(feature = "test-utils"), feature = "defmt"))]
mod defmt {
    /// Log debug messages through [defmt::debug].
    ///
    /// On the host (tests or the `test-utils` feature) `eprintln!` is called instead, so only the
    /// `{}` / `{:?}` subset common to both can be used.
    #[macro_export]
    macro_rules! debug {
        ($($arg:expr),*) => {
            defmt::debug!($($arg,)*)
        };
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:expr),*) => {
            defmt::info!($($arg,)*)
        };
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:expr),*) => {
            defmt::warn!($($arg,)*)
        };
    }

    #[macro_export]
    macro_rules! error {
        ($($arg:expr),*) => {
            defmt::error!($($arg,)*)
        };
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod host {
    #[macro_export]
    macro_rules! debug {
        ($($arg:expr),*) => {{
            extern crate std;
            std::eprintln!("DEBUG: {}", format_args!($($arg,)*))
        }};
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:expr),*) => {{
            extern crate std;
            std::eprintln!("INFO: {}", format_args!($($arg,)*))
        }};
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:expr),*) => {{
            extern crate std;
            std::eprintln!("WARN: {}", format_args!($($arg,)*))
        }};
    }

    #[macro_export]
    macro_rules! error {
        ($($arg:expr),*) => {{
            extern crate std;
            if cfg!(test) {
                panic!("{}", format_args!($($arg,)*));
            } else {
                std::eprintln!("\nERROR: at ./{}:{}:{}:\n{}", file!(), line!(), column!(), format_args!($($arg,)*));
            }
        }};
    }
}
