#![no_main]

use libfuzzer_sys::fuzz_target;
use q2admind::config::{DaemonConfig, ServerEntry};
use q2admind::protocol::Hello;
use q2admind::{AdminContext, Session};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let config = DaemonConfig::default_with_overrides(|c| {
        c.servers.push(ServerEntry::new(1, 1, "fuzz", "127.0.0.1", 27910));
    });
    let ctx = Arc::new(AdminContext::standalone(&config));
    let hello = Hello {
        key: 1,
        version: 1,
        port: 27910,
        encrypted: false,
        max_players: 16,
    };
    let Ok(mut session) = Session::open(ctx, &hello) else {
        return;
    };

    // Any frame, well-formed or not, must leave the session usable
    let _ = session.receive(data);
    let _ = session.flush();
    session.close();
});
