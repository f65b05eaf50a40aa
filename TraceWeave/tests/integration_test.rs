use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use serde_json::json;

use traceweave::database::Database;
use traceweave::database::types::{Dialog, Role, Talk};
use traceweave::pipeline::{self, PipelineConfig};
use traceweave::{quests, sources};

fn dialog(id: i64, role: Role, next: &[i64]) -> Dialog {
    Dialog {
        id,
        role,
        next_dialogs: next.to_vec(),
        trusted: true,
        ..Dialog::default()
    }
}

fn talk(id: i64, init: i64, next: &[i64]) -> Talk {
    Talk {
        id,
        init_dialog: Some(init),
        next_talks: next.to_vec(),
        trusted: true,
        ..Talk::default()
    }
}

fn process(db: &mut Database) {
    db.link_prev_talks();
    db.clean();
    quests::connect_quests(db, true);
    sources::build_sources(db);
    sources::connect_sources(db);
}

#[test]
fn player_fan_flattens_into_reading_order() {
    let mut db = Database::new();
    db.dialogs.insert(10, dialog(10, Role::Unknown, &[11, 12]));
    db.dialogs.insert(11, dialog(11, Role::Player, &[13]));
    db.dialogs.insert(12, dialog(12, Role::Player, &[13]));
    db.dialogs.insert(13, dialog(13, Role::Npc(5), &[]));
    db.talks.insert(1, talk(1, 10, &[]));

    process(&mut db);
    let source = &db.sources["talk_1"];
    assert_eq!(source.dialog_ids, BTreeSet::from([10, 11, 12, 13]));
    assert_eq!(source.traces, vec![vec![10, 11, 12, 13]]);
}

#[test]
fn chained_talks_produce_one_trace_across_the_boundary() {
    let mut db = Database::new();
    db.dialogs.insert(20, dialog(20, Role::Npc(1), &[]));
    db.dialogs.insert(21, dialog(21, Role::Npc(1), &[]));
    db.talks.insert(1, talk(1, 20, &[2]));
    db.talks.insert(2, talk(2, 21, &[]));

    process(&mut db);
    assert_eq!(db.sources["talk_1"].traces, vec![vec![20, 21]]);
}

#[test]
fn dialog_cycle_is_covered_by_a_single_trace() {
    let mut db = Database::new();
    db.dialogs.insert(30, dialog(30, Role::Npc(1), &[31]));
    db.dialogs.insert(31, dialog(31, Role::Npc(1), &[32]));
    db.dialogs.insert(32, dialog(32, Role::Npc(1), &[30]));

    process(&mut db);
    assert_eq!(db.sources["dialog_30"].traces, vec![vec![30, 31, 32]]);
}

#[test]
fn quest_cycle_removal_keeps_exactly_one_direction() {
    let mut db = Database::new();
    for (id, next) in [(300i64, 301i64), (301, 300)] {
        db.quests.insert(
            id,
            traceweave::database::types::Quest {
                id,
                suggested_next: vec![next],
                ..traceweave::database::types::Quest::default()
            },
        );
    }
    process(&mut db);
    assert_eq!(db.quests[&300].next_quests, vec![301]);
    assert!(db.quests[&301].next_quests.is_empty());
}

#[test]
fn trusted_dialog_merge_is_idempotent_then_conflicts() {
    let mut db = Database::new();
    let base = dialog(100, Role::Unknown, &[200]);
    db.add_dialog(base.clone()).unwrap();
    // Presenting the identical trusted record again is a no-op.
    db.add_dialog(base).unwrap();
    assert_eq!(db.dialogs.len(), 1);

    let mut update = dialog(100, Role::Npc(5), &[201]);
    update.role_name_hash = Some(42);
    db.add_dialog(update).unwrap();
    assert_eq!(db.dialogs[&100].role, Role::Npc(5));
    assert_eq!(db.dialogs[&100].role_name_hash, Some(42));
    assert_eq!(db.dialogs[&100].next_dialogs, vec![200, 201]);

    let mut conflict = dialog(100, Role::Npc(5), &[200, 201]);
    conflict.role_name_hash = Some(43);
    assert!(db.add_dialog(conflict).is_err());
}

#[test]
fn traces_cover_every_dialog_and_respect_endpoints() {
    // A branching graph with a side cycle exercises covering, folding, and
    // the coverage properties in one go.
    let mut db = Database::new();
    db.dialogs.insert(10, dialog(10, Role::Npc(1), &[11, 12]));
    db.dialogs.insert(11, dialog(11, Role::Player, &[14]));
    db.dialogs.insert(12, dialog(12, Role::Player, &[13]));
    db.dialogs.insert(13, dialog(13, Role::Npc(1), &[12, 14]));
    db.dialogs.insert(14, dialog(14, Role::Npc(1), &[]));
    db.talks.insert(1, talk(1, 10, &[]));

    process(&mut db);
    let source = &db.sources["talk_1"];
    let covered: BTreeSet<i64> = source.traces.iter().flatten().copied().collect();
    assert_eq!(covered, source.dialog_ids);
    for trace in &source.traces {
        assert_eq!(trace.first(), Some(&10));
        assert_eq!(trace.last(), Some(&14));
    }
}

#[test]
fn full_pipeline_runs_deterministically_over_a_dump() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let write = |rel: &str, value: &serde_json::Value| {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    };

    write(
        "ExcelBinOutput/TalkExcelConfigData.json",
        &json!([{"id": 1, "initDialog": 10, "nextTalks": []}]),
    );
    write(
        "BinOutput/Talk/Npc/1.json",
        &json!({
            "talkId": 1,
            "dialogList": [
                {"id": 10, "talkRole": {"type": "TALK_ROLE_NPC", "id": "5"},
                 "talkContentTextMapHash": 1000, "nextDialogs": [11, 12]},
                {"id": 11, "talkRole": {"type": "TALK_ROLE_PLAYER", "id": ""},
                 "talkContentTextMapHash": 1001, "nextDialogs": [13]},
                {"id": 12, "talkRole": {"type": "TALK_ROLE_PLAYER", "id": ""},
                 "talkContentTextMapHash": 1002, "nextDialogs": [13]},
                {"id": 13, "talkRole": {"type": "TALK_ROLE_NPC", "id": "5"},
                 "talkContentTextMapHash": 1003, "nextDialogs": []},
            ],
        }),
    );
    write(
        "ExcelBinOutput/NpcExcelConfigData.json",
        &json!([{"id": 5, "nameTextMapHash": 2000}]),
    );
    write(
        "TextMap/TextMapCHS.json",
        &json!({
            "1000": "你来了。",
            "1001": "是啊。",
            "1002": "路上耽搁了。",
            "1003": "进来吧。",
            "2000": "凯瑟琳",
        }),
    );

    let out_first = root.join("out1");
    let out_second = root.join("out2");
    for out in [&out_first, &out_second] {
        let config = PipelineConfig::new(root, out);
        pipeline::run(&config).unwrap();
    }
    let first = std::fs::read_to_string(out_first.join("dialog.json")).unwrap();
    let second = std::fs::read_to_string(out_second.join("dialog.json")).unwrap();
    assert_eq!(first, second);

    let document: serde_json::Value = serde_json::from_str(&first).unwrap();
    let source = &document["talk_1"];
    assert_eq!(source["quest_id"], json!(-1));
    let trace = &source["traces"][0];
    assert_eq!(trace[0]["role"], "凯瑟琳");
    assert_eq!(trace[0]["content"], "你来了。");
    // The player fan reads in order before the closing NPC line.
    assert_eq!(trace[1]["role"], "旅行者");
    assert_eq!(trace[2]["role"], "旅行者");
    assert_eq!(trace[3]["content"], "进来吧。");
}
