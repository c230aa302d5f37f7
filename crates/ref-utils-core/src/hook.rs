//! Panic reporting that does not leak grader internals.
//!
//! Students see the output of submission tests. The default panic hook prints
//! source locations from the grading script, so replace it with one that
//! prints only the message.

use crate::RefUtilsError;
use crate::output::print_err;
use std::any::Any;

/// Replace the panic hook with one that prints only the panic message in red
pub fn install_non_leaking_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        print_err(format!("[!] {}", panic_message(info.payload())));
    }));
}

/// Print a crate error the way submission tests show it
pub fn report(err: &RefUtilsError) {
    print_err(err.to_string());
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unexpected error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_extracted_from_payloads() {
        let static_payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(static_payload.as_ref()), "static message");

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(owned_payload.as_ref()), "owned message");

        let other_payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other_payload.as_ref()), "unexpected error");
    }
}
