use core::fmt::Arguments;

use cfg_if::cfg_if;

pub type LogHandler = fn(Arguments<'_>);

static mut LOG_HANDLER: Option<LogHandler> = None;

/// Install the process-wide log handler.
///
/// # Safety
/// Must only be called while no other thread can log, typically during
/// single-threaded startup.
pub unsafe fn set_handler(handler: LogHandler) {
    LOG_HANDLER = Some(handler);
}

/// # Safety
/// Same requirements as [`set_handler`].
pub unsafe fn clear_handler() {
    LOG_HANDLER = None;
}

#[doc(hidden)]
pub fn log_impl(args: Arguments<'_>) {
    let handler = unsafe { LOG_HANDLER };
    if let Some(log) = handler {
        log(args);
    }
}

#[doc(hidden)]
pub macro __log_term_fmt {
    ($term_fmt:expr, $fmt:expr, $($args:tt)*) => {
        $crate::log::log_impl(format_args!(concat!("\x1b[", $term_fmt, "m", $fmt, "\x1b[0m\n"), $($args)*))
    },
    ($term_fmt:expr, $fmt:expr) => {
        $crate::log::__log_term_fmt!($term_fmt, $fmt,)
    },
}

cfg_if! {
    if #[cfg(feature = "log-debug")] {
        pub macro debug($($args:tt)*) {
            $crate::log::__log_term_fmt!("2", $($args)*)
        }
    } else {
        pub macro debug($($args:tt)*) {}
    }
}

cfg_if! {
    if #[cfg(feature = "log-error")] {
        pub macro error($($args:tt)*) {
            $crate::log::__log_term_fmt!("1;31", $($args)*)
        }
    } else {
        pub macro error($($args:tt)*) {}
    }
}

cfg_if! {
    if #[cfg(feature = "log-critical")] {
        pub macro critical($($args:tt)*) {
            $crate::log::__log_term_fmt!("1;37;41", $($args)*)
        }
    } else {
        pub macro critical($($args:tt)*) {}
    }
}
