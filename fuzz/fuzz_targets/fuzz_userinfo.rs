#![no_main]

use libfuzzer_sys::fuzz_target;
use q2admind::session::Userinfo;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let info = Userinfo::parse(raw);
    let _ = info.fingerprint();

    // Serializing and re-parsing keeps every pair that survived the first parse
    let again = Userinfo::parse(&info.to_info_string());
    for (key, value) in info.iter() {
        if key != "ip" && key != "port" {
            assert_eq!(again.get(key), Some(value));
        }
    }
});
