use kanban::{
    BoardSettings, Item, LaneChild, Locale, ParseOptions, format_board, item_from_title,
    parse_board_from_str, reparse_all_items,
};

const BOARD: &str = "---

kanban-plugin: basic

---

## Backlog (10)

- [ ] buy milk #errand @due(2024-01-01)
- [ ] write report [owner:: Ann] ^rep1
- [ ] multi line
    second line #later

### Someday

- [ ] learn piano

## Done

**Complete**
- [x] file taxes @{2024-04-15}


***

## Archive

- [x] old thing ^arch1

%% kanban:settings
```
{\"kanban-plugin\":\"basic\",\"move-tags\":true,\"move-task-metadata\":true,\"lane-collapse\":[false,true]}
```
%%";

fn parse(text: &str) -> kanban::Board {
    parse_board_from_str(None, text, &ParseOptions::default()).expect("board")
}

fn titles(items: impl Iterator<Item = impl std::ops::Deref<Target = Item>>) -> Vec<String> {
    items.map(|item| item.data.title.clone()).collect()
}

#[test]
fn parse_format_parse_is_stable() {
    let board = parse(BOARD);
    let once = format_board(&board, &Locale::default()).expect("format");
    let reparsed = parse(&once);
    let twice = format_board(&reparsed, &Locale::default()).expect("format again");
    assert_eq!(once, twice);

    assert_eq!(reparsed.lanes.len(), board.lanes.len());
    assert_eq!(reparsed.archive.len(), 1);
    assert_eq!(reparsed.settings, board.settings);
    assert_eq!(reparsed.frontmatter, board.frontmatter);
    // Unknown settings keys survive verbatim and in order.
    assert!(once.contains(
        "{\"kanban-plugin\":\"basic\",\"move-tags\":true,\"move-task-metadata\":true,\"lane-collapse\":[false,true]}"
    ));
}

#[test]
fn lanes_items_and_metadata_are_structured() {
    let board = parse(BOARD);
    board.validate().expect("valid hierarchy");

    let backlog = &board.lanes[0];
    assert_eq!(backlog.title, "Backlog");
    assert_eq!(backlog.max_items, Some(10));
    assert_eq!(
        titles(backlog.items()),
        vec!["buy milk", "write report [owner:: Ann]", "multi line\nsecond line"]
    );

    let milk = backlog.items().next().expect("milk");
    assert_eq!(milk.data.metadata.tags, vec!["#errand"]);
    assert_eq!(milk.data.metadata.inline_fields[0].key, "due");

    let report = backlog.items().nth(1).expect("report");
    assert_eq!(report.data.block_id.as_deref(), Some("rep1"));

    let someday = backlog.lanes().next().expect("nested lane");
    assert_eq!(someday.parent_id, Some(backlog.id));
    assert!(matches!(backlog.children.last(), Some(LaneChild::Lane(_))));

    let done = &board.lanes[1];
    assert!(done.should_mark_items_complete);
    assert_eq!(board.archive[0].data.block_id.as_deref(), Some("arch1"));
}

#[test]
fn block_ids_are_never_duplicated() {
    let board = parse(BOARD);
    let text = format_board(&board, &Locale::default()).expect("format");
    assert_eq!(text.matches("^rep1").count(), 1);
    assert_eq!(text.matches("^arch1").count(), 1);
}

#[test]
fn added_items_follow_lane_rules_and_survive_formatting() {
    let mut board = parse(BOARD);
    let done = board.lanes[1].id;
    let options = ParseOptions::default();
    let global = BoardSettings {
        done_char: Some('v'),
        ..BoardSettings::default()
    };

    let item = item_from_title("celebrate #party", &options.item_context(&board.settings))
        .expect("item");
    let id = board.insert_item(done, item, Some(&global)).expect("insert");

    let text = format_board(&board, &Locale::default()).expect("format");
    assert!(text.contains("- [v] celebrate #party\n"));
    let reparsed = parse(&text);
    let added = reparsed.lanes[1].items().last().expect("added");
    assert!(added.data.checked);
    assert_eq!(added.data.title, "celebrate");
    assert!(board.find_item(id).is_some());
}

#[test]
fn bulk_reparse_applies_new_settings() {
    let mut board = parse(BOARD);
    board.settings.move_tags = Some(false);
    let report = reparse_all_items(&board, &ParseOptions::default());
    assert!(report.failures.is_empty());
    let milk = report.board.lanes[0].items().next().expect("milk");
    assert_eq!(milk.data.title, "buy milk #errand");
    assert_eq!(milk.id, board.lanes[0].items().next().expect("milk").id);
}
