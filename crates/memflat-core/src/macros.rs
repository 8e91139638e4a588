/// Macro to return early with an error
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($($arg)*)))
    };
}

/// Return early with an IR error attributed to `$span`
#[macro_export]
macro_rules! ir_bail {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::ir($span, format!($($arg)*)))
    };
}

/// Ensure an IR invariant holds, or return an IR error attributed to `$span`
#[macro_export]
macro_rules! ir_ensure {
    ($cond:expr, $span:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::ir_bail!($span, $($arg)*);
        }
    };
}
