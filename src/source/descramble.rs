//! Repeating-key XOR used by MangaPlus to scramble page images.

use std::sync::LazyLock;

const MANGAPLUS_KEY_HEX: &str = "9fc7d58a868172d276677675ff6a8cb59457ae83d47523f779735c1acd7d76049f0eea3a6395308350d5853c81af23cd1e2d2fe356bb3bfded280fcbc76a05f9";

static MANGAPLUS_KEY: LazyLock<Vec<u8>> =
    LazyLock::new(|| hex::decode(MANGAPLUS_KEY_HEX).unwrap_or_default());

/// The fixed MangaPlus key as bytes.
pub fn mangaplus_key() -> &'static [u8] {
    &MANGAPLUS_KEY
}

/// XOR `data` in place with `key` repeated over its length. An empty key
/// leaves the data untouched.
pub fn xor_in_place(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

/// Recover a MangaPlus page from its scrambled bytes.
pub fn unscramble(mut data: Vec<u8>) -> Vec<u8> {
    xor_in_place(&mut data, mangaplus_key());
    data
}
