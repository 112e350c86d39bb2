//! Bans, teleport and admin actions through a live session.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{connect, fixture, fixture_with, GameServer, Reply, CLAIRE};
use q2admind::config::{BanRule, ServerEntry};
use q2admind::core::{PlayerCommand, PrintLevel, ServerCommand};
use q2admind::policy::{check_bans, enforce_bans, BanList, BanScope};
use q2admind::protocol::Hello;
use q2admind::service::EventKind;
use q2admind::session::Session;

fn open(fx: &common::Fixture) -> Session {
    let hello = Hello {
        key: 1234,
        version: 1,
        port: 27910,
        encrypted: false,
        max_players: 16,
    };
    let mut session = Session::open(fx.ctx.clone(), &hello).unwrap();
    session.flush().unwrap();
    session
}

fn replies(session: &mut Session, server: &mut GameServer) -> Vec<Reply> {
    session
        .flush()
        .unwrap()
        .map(|frame| server.open(&frame))
        .unwrap_or_default()
}

fn teleport(server: &mut GameServer, slot: u8, destination: &str) -> Vec<u8> {
    server.frame(|m| {
        m.write_byte(ServerCommand::Command as u8);
        m.write_byte(PlayerCommand::Teleport as u8);
        m.write_byte(slot);
        m.write_string(destination);
    })
}

#[test]
fn test_ban_added_at_runtime_applies_to_next_connect() {
    let fx = fixture(None);
    let mut session = open(&fx);
    let mut server = GameServer::new();

    session
        .receive(&server.frame(|m| connect(m, 0, CLAIRE)))
        .unwrap();
    assert!(replies(&mut session, &mut server).is_empty());

    fx.ctx
        .global_bans_mut()
        .unwrap()
        .add("10.1.2.0/24", "subnet closed")
        .unwrap();

    session
        .receive(&server.frame(|m| connect(m, 1, "\\name\\bob\\ip\\10.1.2.200:27901")))
        .unwrap();
    assert_eq!(
        replies(&mut session, &mut server),
        vec![
            Reply::SayClient(
                1,
                PrintLevel::Chat,
                "Your IP/Userinfo matches a global ban: subnet closed\n".into()
            ),
            Reply::Command("kick 1".into()),
        ]
    );
    // the player already on the server is untouched
    assert!(session.players().find_player(0).is_some());
}

#[test]
fn test_local_bans_are_per_session() {
    let fx = fixture_with(None, |c| {
        c.servers[0].bans.push(BanRule {
            pattern: "10.1.2.3".into(),
            reason: "dm only".into(),
        });
    });
    let mut dm = open(&fx);
    let mut server = GameServer::new();
    dm.receive(&server.frame(|m| connect(m, 0, CLAIRE))).unwrap();
    let dm_replies = replies(&mut dm, &mut server);
    assert_eq!(dm_replies.last(), Some(&Reply::Command("kick 0".into())));

    let hello = Hello {
        key: 5678,
        version: 1,
        port: 27911,
        encrypted: false,
        max_players: 16,
    };
    let mut ctf = Session::open(fx.ctx.clone(), &hello).unwrap();
    ctf.flush().unwrap();
    ctf.receive(&server.frame(|m| connect(m, 0, CLAIRE))).unwrap();
    assert!(replies(&mut ctf, &mut server).is_empty());
}

#[test]
fn test_enforce_bans_reports_scope() {
    let fx = fixture(None);
    let mut session = open(&fx);
    let mut server = GameServer::new();
    session
        .receive(&server.frame(|m| connect(m, 3, CLAIRE)))
        .unwrap();
    session.flush().unwrap();

    assert_eq!(enforce_bans(&mut session, 3).unwrap(), None);
    session.local_bans_mut().add("10.1.*", "local rule").unwrap();
    let hit = enforce_bans(&mut session, 3).unwrap().unwrap();
    assert_eq!(hit.scope, BanScope::Local);
    assert_eq!(hit.reason, "local rule");

    // empty slots are never checked
    assert_eq!(enforce_bans(&mut session, 9).unwrap(), None);
}

#[test]
fn test_check_bans_global_first() {
    let mut global = BanList::new();
    global.add("10.0.0.0/8", "global").unwrap();
    let mut local = BanList::new();
    local.add("10.1.2.3", "local").unwrap();

    assert_eq!(check_bans(&global, &local, "10.1.2.3").unwrap().scope, BanScope::Global);
    assert_eq!(check_bans(&BanList::new(), &local, "10.1.2.3").unwrap().scope, BanScope::Local);
    assert!(check_bans(&global, &local, "192.168.1.1").is_none());
}

#[test]
fn test_teleport_follows_directory_changes() {
    let fx = fixture(None);
    let mut session = open(&fx);
    let mut server = GameServer::new();
    session
        .receive(&server.frame(|m| connect(m, 2, CLAIRE)))
        .unwrap();

    fx.ctx
        .directory_mut()
        .unwrap()
        .upsert(ServerEntry::new(9, 9999, "coop", "10.0.0.9", 27920));
    session.receive(&teleport(&mut server, 2, "coop")).unwrap();
    assert_eq!(
        replies(&mut session, &mut server),
        vec![Reply::Command("sv !stuff CL 2 connect 10.0.0.9:27920\n\n".into())]
    );

    fx.ctx.directory_mut().unwrap().remove("coop");
    session.receive(&teleport(&mut server, 2, "coop")).unwrap();
    assert_eq!(
        replies(&mut session, &mut server),
        vec![Reply::SayClient(2, PrintLevel::High, "Unknown destination\n".into())]
    );

    let audited: Vec<_> = fx
        .events
        .of_kind(EventKind::Command)
        .into_iter()
        .map(|e| e.detail)
        .collect();
    assert_eq!(
        audited,
        vec!["TELEPORT [2] claire -> coop", "TELEPORT [2] claire -> coop"]
    );
}

#[test]
fn test_teleport_to_disabled_server_is_unknown() {
    let fx = fixture_with(None, |c| c.servers[1].enabled = false);
    let mut session = open(&fx);
    let mut server = GameServer::new();
    session
        .receive(&server.frame(|m| connect(m, 2, CLAIRE)))
        .unwrap();
    session.receive(&teleport(&mut server, 2, "ctf")).unwrap();
    assert_eq!(
        replies(&mut session, &mut server),
        vec![Reply::SayClient(2, PrintLevel::High, "Unknown destination\n".into())]
    );
}

#[test]
fn test_admin_actions() {
    let fx = fixture(None);
    let mut session = open(&fx);
    let mut server = GameServer::new();
    session
        .receive(&server.frame(|m| connect(m, 4, CLAIRE)))
        .unwrap();

    session.mute_player(4, 60);
    session.mute_player(4, -1);
    session.stuff_player(4, "echo hi");
    session.say_all(PrintLevel::High, "map change soon");
    session.kick_player(4);
    // slot beyond capacity
    session.kick_player(400);

    assert_eq!(
        replies(&mut session, &mut server),
        vec![
            Reply::Command("sv !mute CL 4 60".into()),
            Reply::Command("sv !mute CL 4 PERM\n".into()),
            Reply::Command("sv !stuff CL 4 echo hi\n".into()),
            Reply::SayAll(PrintLevel::High, "map change soon".into()),
            Reply::Command("kick 4".into()),
        ]
    );

    let audited: Vec<_> = fx
        .events
        .of_kind(EventKind::Command)
        .into_iter()
        .map(|e| e.detail)
        .collect();
    assert_eq!(
        audited,
        vec![
            "MUTE [4] was muted (60s)",
            "MUTE [4] was muted (-1s)",
            "KICK [4] was kicked",
        ]
    );
}
