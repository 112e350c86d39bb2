//! Userinfo parsing and player fingerprinting.
//!
//! Userinfo is the game client's backslash-delimited key/value string:
//!
//! ```text
//! \name\claire\skin\female/athena\fov\90\ip\10.1.2.3:27901
//! ```

use sha2::{Digest, Sha256};

/// Length of a derived fingerprint, in hex characters
pub const FINGERPRINT_LEN: usize = 16;

/// Ordered key/value pairs parsed from a userinfo string.
///
/// A combined `ip` value such as `10.1.2.3:27901` is always split into `ip` and `port`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Userinfo {
    pairs: Vec<(String, String)>,
}

impl Userinfo {
    /// Parse a userinfo string. Never fails: a trailing key without a value is dropped.
    pub fn parse(raw: &str) -> Self {
        let mut info = Userinfo::default();
        let body = raw.strip_prefix('\\').unwrap_or(raw);
        if body.is_empty() {
            return info;
        }

        let tokens: Vec<&str> = body.split('\\').collect();
        for pair in tokens.chunks_exact(2) {
            info.set(pair[0], pair[1]);
        }

        if let Some((addr, port)) = info.get("ip").and_then(split_address) {
            info.set("ip", &addr);
            info.set("port", &port);
        }

        info
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `key`, or the empty string.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Integer value for `key`; missing or non-numeric values are zero.
    pub fn int(&self, key: &str) -> i32 {
        self.value(key).trim().parse().unwrap_or(0)
    }

    /// Insert or replace, keeping the original position of an existing key.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Serialize back to the backslash-delimited form.
    pub fn to_info_string(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.pairs {
            out.push('\\');
            out.push_str(k);
            out.push('\\');
            out.push_str(v);
        }
        out
    }

    /// The player's identity fingerprint.
    ///
    /// An explicit `phash` value is used verbatim, letting a player keep their stats
    /// across name changes. Otherwise it is derived from name, skin, fov and the
    /// address prefix; see [`derive_fingerprint`].
    pub fn fingerprint(&self) -> String {
        match self.get("phash").map(str::trim) {
            Some(phash) if !phash.is_empty() => phash.to_string(),
            _ => derive_fingerprint(
                self.value("name"),
                self.value("skin"),
                self.value("fov"),
                self.value("ip"),
            ),
        }
    }
}

/// Split `addr:port` (or `[v6]:port`) into its parts.
fn split_address(value: &str) -> Option<(String, String)> {
    let (addr, port) = value.rsplit_once(':')?;
    if addr.is_empty() {
        return None;
    }
    let addr = addr
        .strip_prefix('[')
        .and_then(|a| a.strip_suffix(']'))
        .unwrap_or(addr);
    Some((addr.to_string(), port.to_string()))
}

/// First three dot-separated octets of an address.
///
/// The last octet is left out so dynamic addresses on one subnet keep one identity.
/// Addresses with fewer parts are used whole.
pub fn address_prefix(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() >= 3 {
        parts[..3].join(".")
    } else {
        ip.to_string()
    }
}

/// Content-derived pseudo-identity.
///
/// This is not a credential: anyone who knows the inputs can reproduce it.
pub fn derive_fingerprint(name: &str, skin: &str, fov: &str, ip: &str) -> String {
    let material = format!("{}-{}-{}-{}", name, skin, fov, address_prefix(ip));
    let digest = Sha256::digest(material.as_bytes());
    hex::encode(&digest[..FINGERPRINT_LEN / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\\name\\claire\\skin\\female/athena\\fov\\90\\ip\\10.1.2.3:27901";

    #[test]
    fn test_parse_splits_address() {
        let info = Userinfo::parse(SAMPLE);
        assert_eq!(info.get("name"), Some("claire"));
        assert_eq!(info.get("ip"), Some("10.1.2.3"));
        assert_eq!(info.get("port"), Some("27901"));
        assert_eq!(info.int("fov"), 90);
        assert_eq!(info.int("port"), 27901);
    }

    #[test]
    fn test_odd_token_count_truncates() {
        let info = Userinfo::parse("\\name\\bob\\skin");
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("skin"), None);
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert!(Userinfo::parse("").is_empty());
        assert!(Userinfo::parse("\\").is_empty());
        let info = Userinfo::parse("\\ip\\:27901");
        assert_eq!(info.get("ip"), Some(":27901"));
        assert_eq!(info.get("port"), None);
    }

    #[test]
    fn test_non_numeric_defaults_to_zero() {
        let info = Userinfo::parse("\\fov\\wide\\ip\\1.2.3.4:abc");
        assert_eq!(info.int("fov"), 0);
        assert_eq!(info.int("port"), 0);
        assert_eq!(info.int("missing"), 0);
    }

    #[test]
    fn test_ipv6_address() {
        let info = Userinfo::parse("\\ip\\[2001:db8::1]:27901");
        assert_eq!(info.get("ip"), Some("2001:db8::1"));
        assert_eq!(info.get("port"), Some("27901"));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let info = Userinfo::parse("\\name\\a\\name\\b");
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("name"), Some("b"));
    }

    #[test]
    fn test_info_string_round_trip() {
        let info = Userinfo::parse(SAMPLE);
        let again = Userinfo::parse(&info.to_info_string());
        assert_eq!(info, again);
    }

    #[test]
    fn test_phash_used_verbatim() {
        let info = Userinfo::parse("\\name\\claire\\phash\\deadbeefcafe0001\\ip\\1.2.3.4:1");
        assert_eq!(info.fingerprint(), "deadbeefcafe0001");
    }

    #[test]
    fn test_fingerprint_ignores_last_octet() {
        let a = Userinfo::parse("\\name\\claire\\skin\\male/grunt\\fov\\90\\ip\\10.1.2.3:27901");
        let b = Userinfo::parse("\\name\\claire\\skin\\male/grunt\\fov\\90\\ip\\10.1.2.200:1");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_fingerprint_inputs_matter() {
        let base = derive_fingerprint("claire", "female/athena", "90", "10.1.2.3");
        assert_eq!(base, derive_fingerprint("claire", "female/athena", "90", "10.1.2.99"));
        assert_ne!(base, derive_fingerprint("claire2", "female/athena", "90", "10.1.2.3"));
        assert_ne!(base, derive_fingerprint("claire", "female/jezebel", "90", "10.1.2.3"));
        assert_ne!(base, derive_fingerprint("claire", "female/athena", "100", "10.1.2.3"));
        assert_ne!(base, derive_fingerprint("claire", "female/athena", "90", "10.1.9.3"));
    }

    #[test]
    fn test_address_prefix() {
        assert_eq!(address_prefix("192.168.1.77"), "192.168.1");
        assert_eq!(address_prefix("loopback"), "loopback");
        assert_eq!(address_prefix(""), "");
    }
}
