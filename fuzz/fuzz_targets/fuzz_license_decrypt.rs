#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First half as a license document, second half as ciphertext
    let (license, ciphertext) = data.split_at(data.len() / 2);
    if let Ok(license) = librms::EndUserLicense::from_slice(license) {
        if let Ok(plaintext) = license.decrypt(ciphertext) {
            assert_eq!(plaintext.len(), ciphertext.len() - ciphertext.len() % 16);
        }
    }
    let _ = librms::license::publishing_license(data);
});
