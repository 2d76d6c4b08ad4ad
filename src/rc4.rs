//! RC4 stream cipher.
//!
//! Encryption and decryption are the same operation. There is no IV and no
//! integrity protection; key management is the caller's problem.

use crate::errors::{CodecError, Result};

const SBOX_LEN: usize = 256;

/// Key-scheduled RC4 state.
#[derive(Clone)]
pub struct Rc4 {
    sbox: [u8; SBOX_LEN],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Run the key-scheduling algorithm over `key`.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(CodecError::EmptyKey);
        }

        let mut sbox = [0u8; SBOX_LEN];
        for (i, slot) in sbox.iter_mut().enumerate() {
            *slot = i as u8;
        }

        let mut j: u8 = 0;
        for i in 0..SBOX_LEN {
            j = j.wrapping_add(sbox[i]).wrapping_add(key[i % key.len()]);
            sbox.swap(i, j as usize);
        }

        Ok(Rc4 { sbox, i: 0, j: 0 })
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.sbox[self.i as usize]);
        self.sbox.swap(self.i as usize, self.j as usize);
        let k = self.sbox[self.i as usize].wrapping_add(self.sbox[self.j as usize]);
        self.sbox[k as usize]
    }

    /// XOR the next `data.len()` keystream bytes into `data`.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

// the permutation is key material
impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rc4").finish_non_exhaustive()
    }
}

/// Encrypt or decrypt `data` with a fresh key schedule for `key`.
pub fn apply(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut cipher = Rc4::new(key)?;
    let mut out = data.to_vec();
    cipher.apply_keystream(&mut out);
    Ok(out)
}

pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    apply(plaintext, key)
}

pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    apply(ciphertext, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            apply(b"Plaintext", b"Key").unwrap(),
            [0xbb, 0xf3, 0x16, 0xe8, 0xd9, 0x40, 0xaf, 0x0a, 0xd3]
        );
        assert_eq!(
            apply(b"pedia", b"Wiki").unwrap(),
            [0x10, 0x21, 0xbf, 0x04, 0x20]
        );
        assert_eq!(
            encrypt(b"Attack at dawn", b"Secret").unwrap(),
            [
                0x45, 0xa0, 0x1f, 0x64, 0x5f, 0xc3, 0x5b, 0x38, 0x35, 0x52, 0x54, 0x4b, 0x9b,
                0xf5
            ]
        );
    }

    #[test]
    fn test_involution() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for key in [&b"k"[..], b"a longer key", &[0u8; 256], &[0xffu8; 512]] {
            let ciphertext = apply(&data, key).unwrap();
            assert_ne!(ciphertext, data);
            assert_eq!(decrypt(&ciphertext, key).unwrap(), data);
        }
    }

    #[test]
    fn test_single_byte() {
        let ciphertext = apply(b"P", b"Key").unwrap();
        assert_eq!(ciphertext, [0xbb]);
        assert_eq!(apply(&ciphertext, b"Key").unwrap(), b"P");
    }

    #[test]
    fn test_empty_data_and_empty_key() {
        assert_eq!(apply(b"", b"key").unwrap(), b"");
        assert!(matches!(apply(b"data", b""), Err(CodecError::EmptyKey)));
        assert!(matches!(apply(b"", b""), Err(CodecError::EmptyKey)));
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data = b"split across several buffers within one call";
        let mut cipher = Rc4::new(b"stream").unwrap();
        let mut streamed = data.to_vec();
        let (head, tail) = streamed.split_at_mut(11);
        cipher.apply_keystream(head);
        cipher.apply_keystream(tail);
        assert_eq!(streamed, apply(data, b"stream").unwrap());
    }

    #[test]
    fn test_key_bytes_past_256_are_ignored() {
        let mut long_key = vec![7u8; 256];
        let short = apply(b"same keystream", &long_key).unwrap();
        long_key.extend_from_slice(b"ignored tail");
        assert_eq!(apply(b"same keystream", &long_key).unwrap(), short);
    }
}
