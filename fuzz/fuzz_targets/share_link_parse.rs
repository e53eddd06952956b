//! Fuzz target for ShareLink::parse
//!
//! Share links arrive from QR scanners and pasted text, so every byte of them
//! is attacker controlled.
//!
//! # Invariants
//!
//! - Parsing NEVER panics
//! - A parsed link renders to a URL that parses back to the same link

#![no_main]

use libfuzzer_sys::fuzz_target;
use vanish_client::ShareLink;

fuzz_target!(|input: &str| {
    let Ok(link) = ShareLink::parse(input) else {
        return;
    };

    let rendered = link.to_url();
    let reparsed = ShareLink::parse(&rendered).expect("rendered link must parse");
    assert_eq!(reparsed, link);
});
